use bitflags::bitflags;
use log::{debug, warn};

use crate::err::SdError;
use crate::poll::poll_until;

use super::{constant::*, regs::SdhcRegs, SdHost};

/// Commands this driver issues. Application commands (ACMDn) are distinct
/// variants because they share an index with an ordinary command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GoIdle,
    AllSendCid,
    SendRelativeAddr,
    SwitchFunc,
    SetBusWidth,
    SelectCard,
    SendIfCond,
    SendCsd,
    SendCid,
    StopTransmission,
    SendStatus,
    SetBlockLen,
    ReadSingle,
    ReadMultiple,
    SetWrBlkEraseCount,
    WriteSingle,
    WriteMultiple,
    SendOpCond,
    App,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    None,
    /// 136-bit, CID/CSD
    R2,
    /// 48-bit
    R1,
    /// 48-bit with busy on DAT0
    R1b,
}

impl ResponseType {
    const fn bits(self) -> u32 {
        match self {
            ResponseType::None => 0,
            ResponseType::R2 => 1,
            ResponseType::R1 => 2,
            ResponseType::R1b => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDir {
    HostToCard,
    CardToHost,
}

/// Per-command encoding decisions for the mode register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdSpec {
    pub index: u8,
    pub response: ResponseType,
    pub crc_check: bool,
    pub index_check: bool,
    pub data_present: bool,
    /// Multi-block when more than one sector is requested.
    pub multi_block: bool,
    pub dir: DataDir,
    pub auto_stop: bool,
    pub block_count: bool,
    pub abort: bool,
}

impl CmdSpec {
    /// An R1 command with no data phase; everything else is a variation.
    const fn r1(index: u8) -> Self {
        Self {
            index,
            response: ResponseType::R1,
            crc_check: true,
            index_check: true,
            data_present: false,
            multi_block: false,
            dir: DataDir::HostToCard,
            auto_stop: false,
            block_count: false,
            abort: false,
        }
    }

    const fn r2(index: u8) -> Self {
        Self {
            response: ResponseType::R2,
            index_check: false,
            ..Self::r1(index)
        }
    }

    const fn read(index: u8, multi: bool) -> Self {
        Self {
            data_present: true,
            multi_block: multi,
            dir: DataDir::CardToHost,
            auto_stop: multi,
            block_count: true,
            ..Self::r1(index)
        }
    }

    const fn write(index: u8, multi: bool) -> Self {
        Self {
            data_present: true,
            multi_block: multi,
            auto_stop: multi,
            block_count: true,
            ..Self::r1(index)
        }
    }
}

bitflags! {
    /// Single-bit fields of the mode register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u32 {
        const BLOCK_COUNT_EN = 1 << 1;
        const AUTO_CMD12 = 1 << 2;
        const READ = 1 << 4;
        const MULTI_BLOCK = 1 << 5;
        const CRC_CHECK = 1 << 19;
        const INDEX_CHECK = 1 << 20;
        const DATA_PRESENT = 1 << 21;
        const ABORT = 3 << 22;
    }
}

const MODE_INDEX_SHIFT: u32 = 24;
const MODE_RESP_SHIFT: u32 = 16;

impl Command {
    pub const fn spec(self) -> CmdSpec {
        match self {
            Command::GoIdle => CmdSpec {
                response: ResponseType::None,
                ..CmdSpec::r1(SD_GO_IDLE_STATE)
            },
            Command::AllSendCid => CmdSpec::r2(SD_ALL_SEND_CID),
            Command::SendRelativeAddr => CmdSpec::r1(SD_SEND_RELATIVE_ADDR),
            Command::SwitchFunc => CmdSpec {
                data_present: true,
                dir: DataDir::CardToHost,
                block_count: true,
                ..CmdSpec::r1(SD_SWITCH_FUNC)
            },
            Command::SetBusWidth => CmdSpec::r1(SD_APP_SET_BUS_WIDTH),
            Command::SelectCard => CmdSpec {
                response: ResponseType::R1b,
                ..CmdSpec::r1(SD_SELECT_CARD)
            },
            Command::SendIfCond => CmdSpec::r1(SD_SEND_IF_COND),
            Command::SendCsd => CmdSpec::r2(SD_SEND_CSD),
            Command::SendCid => CmdSpec::r2(SD_SEND_CID),
            Command::StopTransmission => CmdSpec {
                response: ResponseType::R1b,
                abort: true,
                ..CmdSpec::r1(SD_STOP_TRANSMISSION)
            },
            Command::SendStatus => CmdSpec::r1(SD_SEND_STATUS),
            Command::SetBlockLen => CmdSpec::r1(SD_SET_BLOCKLEN),
            Command::ReadSingle => CmdSpec::read(SD_READ_SINGLE_BLOCK, false),
            Command::ReadMultiple => CmdSpec::read(SD_READ_MULTIPLE_BLOCK, true),
            Command::SetWrBlkEraseCount => CmdSpec::r1(SD_APP_SET_WR_BLK_ERASE_COUNT),
            Command::WriteSingle => CmdSpec::write(SD_WRITE_BLOCK, false),
            Command::WriteMultiple => CmdSpec::write(SD_WRITE_MULTIPLE_BLOCK, true),
            // OCR carries no CRC and the index field reads 0x3F
            Command::SendOpCond => CmdSpec {
                crc_check: false,
                index_check: false,
                ..CmdSpec::r1(SD_APP_OP_COND)
            },
            Command::App => CmdSpec::r1(SD_APP_CMD),
        }
    }

    /// Block size for the data phase; the switch status block is 64 bytes.
    pub const fn block_size(self) -> u32 {
        match self {
            Command::SwitchFunc => SWITCH_STATUS_LEN as u32,
            _ => SECTSIZE as u32,
        }
    }

    /// Mode register value that issues this command for `n_sectors` blocks.
    pub fn mode_word(self, n_sectors: u32) -> u32 {
        let spec = self.spec();
        let mut flags = ModeFlags::empty();

        flags.set(ModeFlags::ABORT, spec.abort);
        flags.set(ModeFlags::DATA_PRESENT, spec.data_present);
        flags.set(ModeFlags::INDEX_CHECK, spec.index_check);
        flags.set(ModeFlags::CRC_CHECK, spec.crc_check);
        flags.set(ModeFlags::MULTI_BLOCK, spec.multi_block && n_sectors > 1);
        flags.set(ModeFlags::READ, spec.dir == DataDir::CardToHost);
        flags.set(ModeFlags::AUTO_CMD12, spec.auto_stop);
        flags.set(ModeFlags::BLOCK_COUNT_EN, spec.block_count);

        ((spec.index as u32 & 0x3F) << MODE_INDEX_SHIFT)
            | (spec.response.bits() << MODE_RESP_SHIFT)
            | flags.bits()
    }
}

pub struct SdResponse {
    pub raw: [u32; 4],
}

impl SdResponse {
    pub fn as_r1(&self) -> u32 {
        self.raw[0]
    }

    pub fn as_r2(&self) -> [u32; 4] {
        self.raw
    }

    pub fn as_r3(&self) -> u32 {
        self.raw[0]
    }

    /// Published RCA, upper half of the R6 response.
    pub fn as_r6(&self) -> u16 {
        (self.raw[0] >> 16) as u16
    }

    pub fn as_r7(&self) -> u32 {
        self.raw[0]
    }
}

impl<R: SdhcRegs> SdHost<R> {
    /// Wait until neither the command nor the data line is inhibited.
    ///
    /// `limit` counts outer rounds of 100 status reads. The highest round
    /// count seen is kept in `stats.wait_ready`.
    pub(crate) fn wait_ready(&mut self, limit: u32) -> Result<u32, SdError> {
        let regs = &self.regs;
        let res = poll_until(Some(limit.saturating_mul(100).saturating_sub(1)), || {
            regs.read(SDHC_STAT1) & SDHC_STAT1_BUSY == 0
        });
        match res {
            Ok(polls) => {
                let rounds = polls / 100;
                self.stats.wait_ready = self.stats.wait_ready.max(rounds);
                Ok(rounds)
            }
            Err(_) => {
                self.stats.wait_ready = limit;
                warn!("sdhc:  wait_ready({}) failed", limit);
                Err(SdError::CardNotReady)
            }
        }
    }

    /// Issue one command. On success the response registers hold the card's
    /// reply for the caller to interpret.
    pub fn card_cmd(&mut self, cmd: Command, arg: u32, n_sectors: u32) -> Result<(), SdError> {
        if cmd != Command::GoIdle {
            let limit = self.config.cmd_ready_limit;
            if self.wait_ready(limit).is_err() {
                warn!("sdhc:  card not ready");
                return Err(SdError::CardNotReady);
            }
        }

        self.regs.write(SDHC_ARG, arg);
        self.regs
            .write(SDHC_BLKCON, cmd.block_size() | ((n_sectors & 0xFFFF) << 16));

        let mode = cmd.mode_word(n_sectors);

        // acknowledge anything stale, then enable what we poll for
        self.regs.write(SDHC_INTSTAT, SDHC_INT_ARM_MASK);
        self.regs.set_bits(SDHC_INTEN, SDHC_INT_ARM_MASK);

        debug!("sdhc:  {:?} arg {:#x} count {} mode {:#010x}", cmd, arg, n_sectors, mode);
        self.regs.write(SDHC_MODE, mode);

        let regs = &self.regs;
        let limit = self.config.completion_limit;
        poll_until(limit, || regs.read(SDHC_INTSTAT) & SDHC_INT_ARM_MASK != 0)?;

        let status = self.regs.read(SDHC_INTSTAT);
        if status & SDHC_INT_ERROR_MASK != 0 {
            debug!("sdhc:  {:?} failed, INTSTAT = {:#x}", cmd, status);
            return Err(SdError::from_int_status(status));
        }

        Ok(())
    }

    // Get response from the last command
    pub fn get_response(&self) -> SdResponse {
        SdResponse {
            raw: [
                self.regs.read(SDHC_RESP0),
                self.regs.read(SDHC_RESP1),
                self.regs.read(SDHC_RESP2),
                self.regs.read(SDHC_RESP3),
            ],
        }
    }
}
