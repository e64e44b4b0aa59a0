//! Partitioned block device on top of the SDHC driver.
//!
//! Units are set up lazily: the first open, size query or probe powers the
//! controller, identifies the card, negotiates speed and bus width and
//! reads the partition table. A failed setup is retried on the next access.

use alloc::vec::Vec;

use log::{debug, error, info, warn};
use spin::{Mutex, MutexGuard};

use crate::blk::{clip, Clip, DiskIoctl, Direction, IoctlReply, OpenMode, Transfer};
use crate::err::SdError;
use crate::ipl::{InterruptMask, IplGuard};
use crate::part::{log_table, parse_mbr, Partition, NPARTITIONS, RAWPART};
use crate::sdhci::constant::{CSD_CCC_SWITCH, SECTSIZE};
use crate::sdhci::regs::SdhcRegs;
use crate::sdhci::{Card, CardType, SdHost, WaitStats};

/// Units addressable through a minor number.
pub const MAX_UNITS: usize = 2;

/// Split a minor number into unit (bit 3) and partition (bits 0-2).
pub const fn split_minor(minor: u32) -> (usize, usize) {
    (((minor & 8) >> 3) as usize, (minor & 7) as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

struct Unit<R: SdhcRegs> {
    index: usize,
    host: SdHost<R>,
    state: UnitState,
    part: [Partition; NPARTITIONS + 1],
    /// open/closed refcnt
    open: u32,
    /// label writable?
    wlabel: bool,
    copenpart: u32,
    bopenpart: u32,
    openpart: u32,
}

impl<R: SdhcRegs> Unit<R> {
    fn new(index: usize, host: SdHost<R>) -> Self {
        Self {
            index,
            host,
            state: UnitState::Uninitialized,
            part: [Partition::default(); NPARTITIONS + 1],
            open: 0,
            wlabel: false,
            copenpart: 0,
            bopenpart: 0,
            openpart: 0,
        }
    }

    fn setup<M: InterruptMask + ?Sized>(&mut self, ipl: &M) -> Result<(), SdError> {
        if self.state == UnitState::Ready {
            return Ok(());
        }

        self.state = UnitState::Initializing;
        match self.bring_up(ipl) {
            Ok(()) => {
                self.state = UnitState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("sdhc{}:  setup failed: {}", self.index, e);
                self.part = [Partition::default(); NPARTITIONS + 1];
                self.state = UnitState::Failed;
                Err(SdError::NoDevice)
            }
        }
    }

    fn bring_up<M: InterruptMask + ?Sized>(&mut self, ipl: &M) -> Result<(), SdError> {
        self.host.power_on();

        if let Err(e) = self.host.card_init() {
            error!("sdhc:  no SD card detected");
            return Err(e);
        }

        self.part = [Partition::default(); NPARTITIONS + 1];
        let sectors = match self.host.card_size() {
            Ok(n) => n,
            Err(e) => {
                error!("sdhc:  cannot get card size");
                return Err(e);
            }
        };
        self.part[RAWPART] = Partition::raw(sectors);

        if self.host.card().csd[4] & CSD_CCC_SWITCH != 0 {
            match self.host.high_speed() {
                Ok(true) => info!("sdhc:  switched to high speed mode"),
                Ok(false) => info!("sdhc:  card refused high speed mode"),
                Err(e) => warn!("sdhc:  high speed switch failed: {}", e),
            }
        }

        match self.host.bus_width_4bit() {
            Ok(()) => info!("sdhc:  Switched to 4-bit mode"),
            Err(e) => warn!("sdhc:  Could not switch to 4-bit mode: {}", e),
        }

        let kind = match self.host.card().card_type {
            CardType::SdHc => "SDHC",
            CardType::SdII => "II",
            _ => "I",
        };
        info!(
            "sdhc:  type {}, size {} kbytes, speed {} Mbit/sec",
            kind,
            sectors / 2,
            self.host.config().default_khz / 250
        );

        let mut sector = [0u8; SECTSIZE];
        {
            let _ipl = IplGuard::raise(ipl);
            if let Err(e) = self.host.read(0, &mut sector) {
                error!("sdhc:  cannot read partition table");
                return Err(e);
            }
        }
        if let Some(table) = parse_mbr(&sector) {
            self.part[1..].copy_from_slice(&table);
            log_table("sdhc", self.index, &self.part[1..]);
        }
        Ok(())
    }

    /// Open partitions other than `part` whose sector range meets it.
    fn overlapping_open(&self, part: usize) -> impl Iterator<Item = usize> + '_ {
        let this = self.part[part];
        (0..=NPARTITIONS).filter(move |&i| {
            i != part
                && i != RAWPART
                && self.openpart & (1 << i) != 0
                && self.part[i].overlaps(&this)
        })
    }
}

/// The SD disk driver: one unit per host controller.
pub struct SdhcDisk<R: SdhcRegs, M: InterruptMask> {
    units: Vec<Mutex<Unit<R>>>,
    ipl: M,
}

impl<R: SdhcRegs, M: InterruptMask> SdhcDisk<R, M> {
    pub fn new(hosts: impl IntoIterator<Item = SdHost<R>>, ipl: M) -> Self {
        let mut units = Vec::new();
        for (index, host) in hosts.into_iter().enumerate() {
            if index >= MAX_UNITS {
                warn!("sdhc:  ignoring controller {}, only {} units", index, MAX_UNITS);
                break;
            }
            units.push(Mutex::new(Unit::new(index, host)));
        }
        Self { units, ipl }
    }

    pub fn units(&self) -> usize {
        self.units.len()
    }

    fn unit(&self, unit: usize) -> Result<MutexGuard<'_, Unit<R>>, SdError> {
        self.units.get(unit).map(|u| u.lock()).ok_or(SdError::NoSuchUnit)
    }

    fn checked(&self, unit: usize, part: usize) -> Result<MutexGuard<'_, Unit<R>>, SdError> {
        if part > NPARTITIONS {
            return Err(SdError::NoSuchUnit);
        }
        self.unit(unit)
    }

    pub fn state(&self, unit: usize) -> Result<UnitState, SdError> {
        Ok(self.unit(unit)?.state)
    }

    pub fn card(&self, unit: usize) -> Result<Card, SdError> {
        Ok(self.unit(unit)?.host.card().clone())
    }

    pub fn stats(&self, unit: usize) -> Result<WaitStats, SdError> {
        Ok(self.unit(unit)?.host.stats())
    }

    /// Attach-time check that a card is present and usable.
    pub fn probe(&self, unit: usize) -> Result<(), SdError> {
        let mut u = self.unit(unit)?;
        u.setup(&self.ipl)
    }

    pub fn open(&self, unit: usize, part: usize, mode: OpenMode) -> Result<(), SdError> {
        let mut u = self.checked(unit, part)?;
        u.setup(&self.ipl)?;
        u.open += 1;

        let mask = 1 << part;
        if part != RAWPART && u.openpart & mask == 0 {
            for other in u.overlapping_open(part) {
                warn!(
                    "sdhc{}{}: overlaps open partition (sdhc{}{})",
                    unit,
                    (b'a' + part as u8 - 1) as char,
                    unit,
                    (b'a' + other as u8 - 1) as char
                );
            }
        }

        u.openpart |= mask;
        match mode {
            OpenMode::Char => u.copenpart |= mask,
            OpenMode::Block => u.bopenpart |= mask,
        }
        Ok(())
    }

    pub fn close(&self, unit: usize, part: usize, mode: OpenMode) -> Result<(), SdError> {
        let mut u = self.checked(unit, part)?;
        let mask = 1 << part;
        let opened = match mode {
            OpenMode::Char => &mut u.copenpart,
            OpenMode::Block => &mut u.bopenpart,
        };
        if *opened & mask == 0 {
            warn!("sdhc{}:  close of partition {} which is not open", unit, part);
            return Ok(());
        }
        *opened &= !mask;
        u.openpart = u.copenpart | u.bopenpart;
        u.open = u.open.saturating_sub(1);
        Ok(())
    }

    /// Sector count of a partition, setting the unit up first if needed.
    pub fn size(&self, unit: usize, part: usize) -> Result<u32, SdError> {
        let mut u = self.checked(unit, part)?;
        u.setup(&self.ipl)?;
        Ok(u.part[part].size)
    }

    /// Run one transfer synchronously. The outcome is left in `xfer`.
    pub fn strategy(&self, unit: usize, part: usize, xfer: &mut Transfer<'_>) {
        let mut u = match self.unit(unit) {
            Ok(u) if part <= NPARTITIONS => u,
            _ => {
                error!("sdhcstrategy: unit = {}, blkno = {}, bcount = {}", unit, xfer.blkno, xfer.bcount);
                xfer.fail(SdError::InvalidArgument);
                return;
            }
        };
        if u.state != UnitState::Ready {
            xfer.fail(SdError::NoDevice);
            return;
        }

        let offset = if u.open > 0 {
            let p = u.part[part];
            let Some(offset) = xfer.blkno.checked_add(p.offset) else {
                xfer.fail(SdError::InvalidArgument);
                return;
            };
            match clip(xfer, p.size) {
                Ok(Clip::Proceed) => {}
                Ok(Clip::Eof) => return,
                Err(e) => {
                    xfer.fail(e);
                    return;
                }
            }
            offset
        } else {
            debug!("sdhc{}:  reading the partition table", unit);
            0
        };
        if offset == 0 && xfer.dir == Direction::Write && !u.wlabel {
            // partition table
            xfer.fail(SdError::ReadOnly);
            return;
        }

        let _ipl = IplGuard::raise(&self.ipl);
        let dir = xfer.dir;
        let res = match dir {
            Direction::Read => u.host.read(offset, xfer.payload()),
            Direction::Write => u.host.write(offset, xfer.payload()),
        };
        if let Err(e) = res {
            error!("sdhc{}:  {:?} at sector {} failed: {}", unit, dir, offset, e);
            xfer.fail(SdError::IoError);
        }
    }

    pub fn ioctl(&self, unit: usize, part: usize, cmd: DiskIoctl) -> Result<IoctlReply, SdError> {
        let mut u = self.checked(unit, part)?;
        match cmd {
            DiskIoctl::GetPartition => Ok(IoctlReply::Partition(u.part[part])),
            DiskIoctl::SetWriteLabel(on) => {
                u.wlabel = on;
                Ok(IoctlReply::Done)
            }
            DiskIoctl::GetMediaSize => Err(SdError::NotSupported),
        }
    }
}
