//! DRAM pseudo-disk used as swap space.
//!
//! A fixed memory region is exposed as a single-unit disk; transfers are
//! plain copies. The DRAM controller itself is brought up once, through a
//! board-specific [`DdrBringUp`].

use alloc::boxed::Box;

use log::{debug, info};
use spin::{Mutex, Once};

use crate::blk::{clip, Clip, DiskIoctl, Direction, IoctlReply, Transfer};
use crate::err::SdError;
use crate::ipl::{InterruptMask, IplGuard};
use crate::led::{Activity, ActivityLed};
use crate::sdhci::constant::{SECTSIZE, SECTSIZE_SHIFT};

/// Only minor number the swap device answers to.
pub const DDR_MINOR: u32 = 1;

/// DRAM controller and PHY initialization, in the order it must run.
pub trait DdrBringUp: Send {
    /// Enable the DDR clock and wait for the PLL to lock.
    fn clock_init(&mut self);
    /// Power up the memory controller's power module.
    fn pmd_init(&mut self);
    /// Pad and delay-line configuration of the PHY.
    fn phy_init(&mut self);
    /// Timing registers, arbitration and the JEDEC command sequence.
    fn controller_init(&mut self);
    /// Self-calibration of the PHY; returns once it completes.
    fn phy_calibrate(&mut self);
}

/// Runs the DRAM bring-up at most once.
pub struct DdrController<D: DdrBringUp> {
    hw: Mutex<D>,
    done: Once,
}

impl<D: DdrBringUp> DdrController<D> {
    pub const fn new(hw: D) -> Self {
        Self {
            hw: Mutex::new(hw),
            done: Once::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.done.is_completed()
    }

    /// Bring the DRAM up unless that already happened. Returns whether this
    /// call did the work.
    pub fn initialize(&self) -> bool {
        if self.done.is_completed() {
            info!("ddr0:  already initialized");
            return false;
        }

        let mut ran = false;
        self.done.call_once(|| {
            info!("ddr0:  initializing ...");
            let mut hw = self.hw.lock();
            hw.clock_init();
            hw.pmd_init();
            hw.phy_init();
            hw.controller_init();
            hw.phy_calibrate();
            info!("ddr0:  done");
            ran = true;
        });
        ran
    }
}

pub struct DdrDisk<B, D: DdrBringUp, M: InterruptMask> {
    storage: Mutex<B>,
    sectors: u32,
    controller: DdrController<D>,
    activity: Mutex<Activity>,
    ipl: M,
}

impl<B, D, M> DdrDisk<B, D, M>
where
    B: AsRef<[u8]> + AsMut<[u8]> + Send,
    D: DdrBringUp,
    M: InterruptMask,
{
    /// `storage` is the swap region; whole sectors of it are usable.
    pub fn new(storage: B, hw: D, ipl: M) -> Self {
        let sectors = (storage.as_ref().len() / SECTSIZE) as u32;
        Self {
            storage: Mutex::new(storage),
            sectors,
            controller: DdrController::new(hw),
            activity: Mutex::new(Activity::default()),
            ipl,
        }
    }

    pub fn with_led(self, led: Box<dyn ActivityLed>) -> Self {
        *self.activity.lock() = Activity::new(Some(led));
        self
    }

    pub fn controller(&self) -> &DdrController<D> {
        &self.controller
    }

    /// Attach: bring the DRAM up. Only unit 0 exists.
    pub fn probe(&self, unit: usize) -> Result<(), SdError> {
        if unit != 0 {
            return Err(SdError::NoSuchUnit);
        }
        {
            let _ipl = IplGuard::raise(&self.ipl);
            self.controller.initialize();
        }
        info!("ddr0:  {} kbytes swap space", self.sectors / 2);
        Ok(())
    }

    pub fn open(&self, minor: u32) -> Result<(), SdError> {
        debug!("ddr0:  open minor = {}", minor);
        if minor != DDR_MINOR {
            return Err(SdError::NoDevice);
        }
        Ok(())
    }

    pub fn close(&self, _minor: u32) -> Result<(), SdError> {
        debug!("ddr0:  close");
        Ok(())
    }

    pub fn size(&self) -> u32 {
        self.sectors
    }

    pub fn strategy(&self, xfer: &mut Transfer<'_>) {
        match clip(xfer, self.sectors) {
            Ok(Clip::Proceed) => {}
            Ok(Clip::Eof) => return,
            Err(e) => {
                xfer.fail(e);
                return;
            }
        }

        let start = (xfer.blkno as usize) << SECTSIZE_SHIFT;
        let dir = xfer.dir;
        let data = xfer.payload();
        let len = data.len();

        self.activity.lock().set(true);
        let res = {
            let _ipl = IplGuard::raise(&self.ipl);
            let mut storage = self.storage.lock();
            match storage.as_mut().get_mut(start..start + len) {
                Some(mem) => {
                    match dir {
                        Direction::Read => data.copy_from_slice(mem),
                        Direction::Write => mem.copy_from_slice(data),
                    }
                    Ok(())
                }
                None => Err(SdError::InvalidArgument),
            }
        };
        self.activity.lock().set(false);

        if let Err(e) = res {
            xfer.fail(e);
        }
    }

    pub fn ioctl(&self, cmd: DiskIoctl) -> Result<IoctlReply, SdError> {
        match cmd {
            DiskIoctl::GetMediaSize => Ok(IoctlReply::MediaSize(self.sectors)),
            _ => Err(SdError::InvalidArgument),
        }
    }
}
