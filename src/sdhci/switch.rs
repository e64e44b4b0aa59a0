use log::{debug, info, warn};

use crate::err::SdError;
use crate::poll::poll_until;

use super::{cmd::Command, constant::*, regs::SdhcRegs, SdHost};

/// Smallest power-of-two divisor (1..=256) bringing `base_khz` to at most
/// `khz`, encoded as the CON2 divisor field.
pub fn divisor_field(base_khz: u32, khz: u32) -> (u32, u32) {
    let mut divisor = 1u32;
    while divisor < 256 {
        if base_khz / divisor <= khz {
            break;
        }
        divisor <<= 1;
    }
    (divisor, (divisor >> 1) & 0xFF)
}

impl<R: SdhcRegs> SdHost<R> {
    /// Reprogram the SD clock for `khz`.
    pub fn set_speed(&mut self, khz: u32) -> Result<(), SdError> {
        let (divisor, field) = divisor_field(self.config.base_khz, khz);
        info!("sdhc:  using clock divisor of {} to obtain {} kHz", divisor, khz);

        // stop clocks before touching the divisor
        self.regs.write(SDHC_CON2, 0);
        self.regs.set_bits(SDHC_CON2, SDHC_CON2_DATA_TIMEOUT_MAX);
        self.regs.set_bits(SDHC_CON2, field << SDHC_CON2_DIV_SHIFT);

        self.regs.set_bits(SDHC_CON2, SDHC_CON2_INT_CLK_EN);
        let regs = &self.regs;
        poll_until(self.config.completion_limit, || {
            regs.read(SDHC_CON2) & SDHC_CON2_INT_CLK_STABLE != 0
        })?;

        self.regs.set_bits(SDHC_CON2, SDHC_CON2_SD_CLK_EN);
        debug!("sdhc:  done waiting for clock");
        Ok(())
    }

    /// Controller clock for the card's TRAN_SPEED code.
    fn high_speed_khz(&self) -> u32 {
        match self.card.csd[3] {
            TRANS_SPEED_25MHZ => self.config.fast_khz,
            TRANS_SPEED_50MHZ => self.config.fastest_khz,
            TRANS_SPEED_100MHZ => {
                info!("sdhc:  fast clock 100MHz");
                self.config.fastest_khz
            }
            TRANS_SPEED_200MHZ => {
                info!("sdhc:  fast clock 200MHz");
                self.config.fastest_khz
            }
            other => {
                warn!("sdhc:  unknown speed csd[3] = {:02x}", other);
                self.config.fast_khz
            }
        }
    }

    /// Switch function group 1 to high speed with CMD6.
    ///
    /// Returns whether the card accepted the switch. The function group
    /// masks and current limit from the status block are recorded either way.
    pub fn high_speed(&mut self) -> Result<bool, SdError> {
        self.with_activity(|host| host.switch_high_speed())
    }

    fn switch_high_speed(&mut self) -> Result<bool, SdError> {
        debug!("sdhc:  sending SWITCH_FUNC");
        if let Err(e) = self.card_cmd(Command::SwitchFunc, SWITCH_HIGH_SPEED_ARG, 1) {
            warn!("sdhc:  SWITCH_FUNC failed: {}", e);
            return Err(e);
        }
        self.regs.write(SDHC_INTSTAT, SDHC_INT_CMD_DONE);

        let mut status = [0u8; SWITCH_STATUS_LEN];
        self.wait_read_ready()?;
        for chunk in status.chunks_exact_mut(4) {
            chunk.copy_from_slice(&self.regs.read(SDHC_DATA).to_le_bytes());
        }
        debug!("sdhc:  switch status {:02x?}", status);

        // at least 8 bus clocks before the new timing is valid
        crate::delay_spins(self.config.settle_spins);

        let switched = status[16] & 0xF == 1;
        if switched {
            let khz = self.high_speed_khz();
            self.set_speed(khz)?;
            self.regs.set_bits(SDHC_CON1, SDHC_CON1_HISPD);
        }

        self.card.max_current = u16::from_be_bytes([status[0], status[1]]);
        for (i, group) in self.card.group.iter_mut().enumerate() {
            let at = 12 - 2 * i;
            *group = u16::from_be_bytes([status[at], status[at + 1]]);
        }

        let g = &self.card.group;
        info!(
            "sdhc:  function groups {:x}/{:x}/{:x}/{:x}/{:x}/{:x}, max current {} mA",
            g[5] & 0x7fff,
            g[4] & 0x7fff,
            g[3] & 0x7fff,
            g[2] & 0x7fff,
            g[1] & 0x7fff,
            g[0] & 0x7fff,
            self.card.max_current
        );
        Ok(switched)
    }

    /// Move the card and the controller to a 4-bit data bus with ACMD6.
    pub fn bus_width_4bit(&mut self) -> Result<(), SdError> {
        let rca = self.card.rca_arg();
        // a failed CMD55 makes ACMD6 fail as well
        let _ = self.card_cmd(Command::App, rca, 0);
        self.card_cmd(Command::SetBusWidth, BUS_WIDTH_4BIT_ARG, 0)?;
        self.regs.set_bits(SDHC_CON1, SDHC_CON1_4BIT);
        Ok(())
    }
}
