// ===== Block Transfer Engine =====

use log::{debug, error};

use crate::err::SdError;
use crate::poll::poll_until;

use super::{cmd::Command, constant::*, regs::SdhcRegs, SdHost};

/// Number of 512-byte sectors needed to move `bcount` bytes, at least one.
pub fn sectors_for(bcount: usize) -> u32 {
    bcount.div_ceil(SECTSIZE).max(1) as u32
}

impl<R: SdhcRegs> SdHost<R> {
    /// Wait for an interrupt status bit, then acknowledge it.
    ///
    /// Error bits raised while waiting fail the transfer.
    fn wait_int(&mut self, bit: u32) -> Result<(), SdError> {
        let regs = &self.regs;
        poll_until(self.config.completion_limit, || {
            regs.read(SDHC_INTSTAT) & (bit | SDHC_INT_ERROR_MASK) != 0
        })?;

        let status = self.regs.read(SDHC_INTSTAT);
        if status & SDHC_INT_ERROR_MASK != 0 {
            self.regs.write(SDHC_INTSTAT, status & SDHC_INT_ERROR_MASK);
            return Err(SdError::from_int_status(status));
        }
        self.regs.write(SDHC_INTSTAT, bit);
        Ok(())
    }

    pub(crate) fn wait_read_ready(&mut self) -> Result<(), SdError> {
        self.wait_int(SDHC_INT_READ_READY)
    }

    /// Card address for sector `offset`: byte address unless the card is
    /// block addressed.
    fn data_address(&self, offset: u32) -> u32 {
        if self.card.is_block_addressed() {
            offset
        } else {
            offset << SECTSIZE_SHIFT
        }
    }

    /// Read `buf.len()` bytes starting at sector `offset`.
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), SdError> {
        self.with_activity(|host| host.read_sectors(offset, buf))
    }

    fn read_sectors(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), SdError> {
        let count = sectors_for(buf.len());
        let addr = self.data_address(offset);
        let cmd = if count > 1 {
            Command::ReadMultiple
        } else {
            Command::ReadSingle
        };

        if let Err(e) = self.card_cmd(cmd, addr, count) {
            error!("sdhc:  read of sector {} failed: {}", offset, e);
            return Err(e);
        }
        self.regs.write(SDHC_INTSTAT, SDHC_INT_CMD_DONE);

        for sector in 0..count as usize {
            self.wait_int(SDHC_INT_READ_READY)?;
            let base = sector * SECTSIZE;
            for w in 0..WORDS_PER_SECTOR {
                let word = self.regs.read(SDHC_DATA).to_le_bytes();
                let at = base + w * 4;
                // words past the caller's buffer are drained and dropped
                if at < buf.len() {
                    let n = (buf.len() - at).min(4);
                    buf[at..at + n].copy_from_slice(&word[..n]);
                }
            }
        }

        self.wait_int(SDHC_INT_XFER_DONE)?;
        debug!("sdhc:  read {} sector(s) at {}", count, offset);
        Ok(())
    }

    /// Write `buf` starting at sector `offset`. A partial last sector is
    /// padded with zeros.
    pub fn write(&mut self, offset: u32, buf: &[u8]) -> Result<(), SdError> {
        self.with_activity(|host| host.write_sectors(offset, buf))
    }

    fn write_sectors(&mut self, offset: u32, buf: &[u8]) -> Result<(), SdError> {
        let count = sectors_for(buf.len());
        let addr = self.data_address(offset);
        let rca = self.card.rca_arg();

        // pre-erase hint
        if let Err(e) = self
            .card_cmd(Command::App, rca, 0)
            .and_then(|_| self.card_cmd(Command::SetWrBlkEraseCount, count, 0))
        {
            error!("sdhc:  SET_WR_BLK_ERASE_COUNT failed: {}", e);
            return Err(e);
        }

        let cmd = if count > 1 {
            Command::WriteMultiple
        } else {
            Command::WriteSingle
        };
        if let Err(e) = self.card_cmd(cmd, addr, count) {
            error!("sdhc:  write of sector {} failed: {}", offset, e);
            return Err(e);
        }
        self.regs.write(SDHC_INTSTAT, SDHC_INT_CMD_DONE);

        for sector in 0..count as usize {
            self.wait_int(SDHC_INT_WRITE_READY)?;
            let base = sector * SECTSIZE;
            for w in 0..WORDS_PER_SECTOR {
                let at = base + w * 4;
                let mut word = [0u8; 4];
                if at < buf.len() {
                    let n = (buf.len() - at).min(4);
                    word[..n].copy_from_slice(&buf[at..at + n]);
                }
                self.regs.write(SDHC_DATA, u32::from_le_bytes(word));
            }
        }

        self.wait_int(SDHC_INT_XFER_DONE)?;
        debug!("sdhc:  wrote {} sector(s) at {}", count, offset);
        Ok(())
    }
}
