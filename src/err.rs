// ===== Types and Structures =====

use core::fmt;

use crate::sdhci::constant::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdError {
    Timeout,
    Crc,
    EndBit,
    Index,
    DataTimeout,
    DataCrc,
    DataEndBit,
    BusPower,
    Acmd12Error,
    AdmaError,
    CommandError(u32), // 未归类的错误位
    CardNotReady,
    UnsupportedCard,
    UnknownCsdVersion(u8),
    InvalidCsd,
    NoDevice,
    NoSuchUnit,
    InvalidArgument,
    ReadOnly,
    NotSupported,
    IoError,
}

impl SdError {
    /// Classify the error bits latched in the interrupt status register.
    pub fn from_int_status(status: u32) -> Self {
        if status & SDHC_INT_CMD_TIMEOUT != 0 {
            SdError::Timeout
        } else if status & SDHC_INT_CMD_CRC != 0 {
            SdError::Crc
        } else if status & SDHC_INT_CMD_END_BIT != 0 {
            SdError::EndBit
        } else if status & SDHC_INT_CMD_INDEX != 0 {
            SdError::Index
        } else if status & SDHC_INT_DATA_TIMEOUT != 0 {
            SdError::DataTimeout
        } else if status & SDHC_INT_DATA_CRC != 0 {
            SdError::DataCrc
        } else if status & SDHC_INT_DATA_END_BIT != 0 {
            SdError::DataEndBit
        } else if status & SDHC_INT_BUS_POWER != 0 {
            SdError::BusPower
        } else if status & SDHC_INT_AUTO_CMD_ERR != 0 {
            SdError::Acmd12Error
        } else if status & SDHC_INT_ADMA_ERR != 0 {
            SdError::AdmaError
        } else {
            SdError::CommandError(status)
        }
    }
}

impl fmt::Display for SdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdError::Timeout => write!(f, "Command timeout error"),
            SdError::Crc => write!(f, "Command CRC error"),
            SdError::EndBit => write!(f, "Command end bit error"),
            SdError::Index => write!(f, "Command index error"),
            SdError::DataTimeout => write!(f, "Data timeout error"),
            SdError::DataCrc => write!(f, "Data CRC error"),
            SdError::DataEndBit => write!(f, "Data end bit error"),
            SdError::BusPower => write!(f, "Current limit error"),
            SdError::Acmd12Error => write!(f, "Auto CMD12 error"),
            SdError::AdmaError => write!(f, "ADMA error"),
            SdError::CommandError(status) => write!(f, "Command error, INTSTAT = {:#x}", status),
            SdError::CardNotReady => write!(f, "Card not ready"),
            SdError::UnsupportedCard => write!(f, "Cannot detect card type"),
            SdError::UnknownCsdVersion(v) => write!(f, "Unknown CSD structure version {}", v),
            SdError::InvalidCsd => write!(f, "Invalid CSD contents"),
            SdError::NoDevice => write!(f, "No such device"),
            SdError::NoSuchUnit => write!(f, "No such unit"),
            SdError::InvalidArgument => write!(f, "Invalid argument"),
            SdError::ReadOnly => write!(f, "Read-only partition"),
            SdError::NotSupported => write!(f, "Inappropriate ioctl"),
            SdError::IoError => write!(f, "I/O error"),
        }
    }
}
