//! Polled driver for the PIC32MZ Secure Digital Host Controller.
//!
//! Everything goes through [`SdhcRegs`], one command at a time, with
//! busy-wait polling in place of interrupts and PIO in place of DMA.

mod block;
mod cmd;
mod csd;
mod init;
mod switch;

pub mod constant;
pub mod regs;

#[cfg(test)]
pub(crate) mod sim;

use core::fmt::Display;

use log::info;

use crate::config::SdhcConfig;
use crate::led::{Activity, ActivityLed};
use alloc::boxed::Box;
use constant::*;
use regs::SdhcRegs;

pub use block::sectors_for;
pub use cmd::{CmdSpec, Command, DataDir, ModeFlags, ResponseType, SdResponse};
pub use csd::{csd_from_response, csd_sectors};
pub use init::InitState;
pub use switch::divisor_field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardType {
    #[default]
    Unknown,
    /// SD 1.x, no CMD8
    SdLegacy,
    /// SD 2.0 standard capacity
    SdII,
    /// SD 2.0 high capacity, block addressed
    SdHc,
}

/// What the driver knows about the inserted card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Card {
    pub card_type: CardType,
    pub csd: [u8; 16],
    pub cid: [u32; 4],
    pub ocr: u32,
    pub rca: u16,
    /// Function group support masks from the CMD6 status block, group 1 first.
    pub group: [u16; 6],
    /// Maximum current consumption in mA, 0 when unknown.
    pub max_current: u16,
    pub sectors: u32,
}

impl Card {
    /// RCA in the argument position used by addressed commands.
    pub fn rca_arg(&self) -> u32 {
        (self.rca as u32) << 16
    }

    pub fn is_block_addressed(&self) -> bool {
        self.card_type == CardType::SdHc
    }
}

/// Highest poll counts observed, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitStats {
    pub wait_ready: u32,
    pub send_op: u32,
}

// SD Host Controller structure
#[derive(Debug)]
pub struct SdHost<R: SdhcRegs> {
    regs: R,
    card: Card,
    config: SdhcConfig,
    stats: WaitStats,
    activity: Activity,
}

impl<R: SdhcRegs> Display for SdHost<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "SDHC Controller {{ card: {:?}, sectors: {}, rca: {:#x}, base: {} kHz }}",
            self.card.card_type, self.card.sectors, self.card.rca, self.config.base_khz
        )
    }
}

impl<R: SdhcRegs> SdHost<R> {
    pub fn new(regs: R, config: SdhcConfig) -> Self {
        Self {
            regs,
            card: Card::default(),
            config,
            stats: WaitStats::default(),
            activity: Activity::default(),
        }
    }

    pub fn with_led(mut self, led: Box<dyn ActivityLed>) -> Self {
        self.activity = Activity::new(Some(led));
        self
    }

    pub fn card(&self) -> &Card {
        &self.card
    }

    pub fn stats(&self) -> WaitStats {
        self.stats
    }

    pub fn config(&self) -> &SdhcConfig {
        &self.config
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Clock the controller and power the slot.
    pub fn power_on(&mut self) {
        self.regs.enable_ref_clock();
        self.regs.set_bits(SDHC_CON1, SDHC_CON1_POWER);
        info!("sdhc:  controller powered on");
    }

    /// Run `f` with the activity LED lit. The LED goes off however `f` exits.
    fn with_activity<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.activity.set(true);
        let res = f(self);
        self.activity.set(false);
        res
    }
}
