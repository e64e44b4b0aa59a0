/// Interrupt priority control supplied by the host kernel.
///
/// `raise_bio` masks block-I/O interrupts and returns the previous level;
/// `restore` puts it back. Use [`IplGuard`] so the level is restored on
/// every exit path.
pub trait InterruptMask: Send + Sync {
    fn raise_bio(&self) -> u32;
    fn restore(&self, level: u32);
}

/// For single-context use, where nothing can preempt a transfer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMask;

impl InterruptMask for NoMask {
    fn raise_bio(&self) -> u32 {
        0
    }

    fn restore(&self, _level: u32) {}
}

pub struct IplGuard<'a, M: InterruptMask + ?Sized> {
    mask: &'a M,
    saved: u32,
}

impl<'a, M: InterruptMask + ?Sized> IplGuard<'a, M> {
    pub fn raise(mask: &'a M) -> Self {
        let saved = mask.raise_bio();
        Self { mask, saved }
    }
}

impl<M: InterruptMask + ?Sized> Drop for IplGuard<'_, M> {
    fn drop(&mut self) {
        self.mask.restore(self.saved);
    }
}
