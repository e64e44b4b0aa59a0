/// Startup configuration of one SDHC unit.
///
/// Clock targets are in kHz. The retry limits count polls of the relevant
/// status register; `completion_limit` bounds the command-completion and
/// data-phase waits, which never give up when it is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdhcConfig {
    /// Controller base clock (CPU clock / 2 on the PIC32MZ).
    pub base_khz: u32,
    /// Identification-phase bus clock.
    pub ident_khz: u32,
    pub default_khz: u32,
    /// Default-speed ceiling of the SD bus.
    pub fast_khz: u32,
    /// Maximum the PIC32MZ SDHC supports.
    pub fastest_khz: u32,
    pub go_idle_retries: u32,
    pub cmd_ready_limit: u32,
    pub send_op_limit: u32,
    pub select_ready_limit: u32,
    pub completion_limit: Option<u32>,
    /// Busy-loop iterations standing in for 8 bus clocks after CMD6.
    pub settle_spins: u32,
}

impl Default for SdhcConfig {
    fn default() -> Self {
        Self {
            base_khz: 100_000,
            ident_khz: 400,
            default_khz: 12_500,
            fast_khz: 25_000,
            fastest_khz: 50_000,
            go_idle_retries: 4,
            cmd_ready_limit: 50,
            send_op_limit: 50,
            select_ready_limit: 100,
            completion_limit: None,
            settle_spins: 1_000_000,
        }
    }
}

impl SdhcConfig {
    /// Bound every otherwise unbounded wait, so a wedged card fails the
    /// request instead of hanging the caller.
    pub fn hardened(mut self, limit: u32) -> Self {
        self.completion_limit = Some(limit);
        self
    }
}
