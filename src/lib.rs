#![cfg_attr(not(test), no_std)]

//! Block drivers for the PIC32MZ DA: an SD card behind the on-chip SDHC
//! controller and a DRAM region used as swap.

extern crate alloc;

use core::sync::atomic::{fence, Ordering};

pub mod blk;
pub mod config;
pub mod ddr;
pub mod disk;
pub mod err;
pub mod ipl;
pub mod led;
pub mod part;
pub mod poll;
pub mod sdhci;

pub use blk::{DiskIoctl, Direction, IoctlReply, OpenMode, Transfer};
pub use config::SdhcConfig;
pub use disk::{split_minor, SdhcDisk, UnitState};
pub use err::SdError;
pub use sdhci::SdHost;

/// Busy-wait for `n` loop iterations.
pub fn delay_spins(n: u32) {
    for _ in 0..n {
        // keeps the loop from being optimized away
        fence(Ordering::SeqCst);
    }
}
