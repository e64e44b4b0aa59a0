use super::constant::SDHC_BASE_ADDR;

/// Access to the SDHC register file.
///
/// Registers are addressed by their offset from the controller base. The
/// default read-modify-write helpers leave every bit outside `bits`
/// untouched; the interrupt status register is write-one-to-clear, so it
/// must be acknowledged with a plain [`SdhcRegs::write`] of the bits to clear.
pub trait SdhcRegs {
    fn read(&self, offset: u32) -> u32;

    fn write(&self, offset: u32, value: u32);

    fn set_bits(&self, offset: u32, bits: u32) {
        let value = self.read(offset);
        self.write(offset, value | bits);
    }

    fn clear_bits(&self, offset: u32, bits: u32) {
        let value = self.read(offset);
        self.write(offset, value & !bits);
    }

    /// Turn on the reference clock feeding the controller. Lives outside the
    /// SDHC block on most parts, so the default does nothing.
    fn enable_ref_clock(&self) {}
}

/// Memory-mapped register file of a real controller.
#[derive(Debug)]
pub struct MmioRegs {
    base_addr: usize,
    refclk_con: Option<usize>,
}

impl MmioRegs {
    /// # Safety
    ///
    /// `base_addr` must be the mapped base of an SDHC register block that no
    /// other code accesses.
    pub const unsafe fn new(base_addr: usize) -> Self {
        Self {
            base_addr,
            refclk_con: None,
        }
    }

    /// The PIC32MZ DA controller at its fixed KSEG1 address.
    ///
    /// # Safety
    ///
    /// Only one instance may exist.
    pub const unsafe fn pic32mz() -> Self {
        Self {
            base_addr: SDHC_BASE_ADDR,
            refclk_con: None,
        }
    }

    /// Address of the REFOxCON register gating the controller's reference clock.
    pub const fn with_ref_clock(mut self, refclk_con: usize) -> Self {
        self.refclk_con = Some(refclk_con);
        self
    }
}

impl SdhcRegs for MmioRegs {
    fn read(&self, offset: u32) -> u32 {
        unsafe { core::ptr::read_volatile((self.base_addr + offset as usize) as *const u32) }
    }

    fn write(&self, offset: u32, value: u32) {
        unsafe { core::ptr::write_volatile((self.base_addr + offset as usize) as *mut u32, value) }
    }

    fn enable_ref_clock(&self) {
        if let Some(addr) = self.refclk_con {
            let reg = addr as *mut u32;
            // module off, no divisor; then ON (bit 15)
            unsafe {
                core::ptr::write_volatile(reg, 0);
                core::ptr::write_volatile(reg, 1 << 15);
            }
        }
    }
}
