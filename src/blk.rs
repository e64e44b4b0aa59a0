//! Request and control shapes shared by the SD and DRAM disks.

use crate::err::SdError;
use crate::part::Partition;
use crate::sdhci::constant::{SECTSIZE, SECTSIZE_SHIFT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// How a unit or partition is being opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Char,
    Block,
}

/// One block I/O request.
///
/// `blkno` is relative to the partition the request is issued on. On
/// completion `resid` holds the bytes not transferred and `error` the
/// failure, if any. Clipping at the partition end may shrink `bcount`.
#[derive(Debug)]
pub struct Transfer<'a> {
    pub dir: Direction,
    pub blkno: u32,
    pub data: &'a mut [u8],
    pub bcount: usize,
    pub resid: usize,
    pub error: Option<SdError>,
}

impl<'a> Transfer<'a> {
    pub fn new(dir: Direction, blkno: u32, data: &'a mut [u8]) -> Self {
        let bcount = data.len();
        Self {
            dir,
            blkno,
            data,
            bcount,
            resid: 0,
            error: None,
        }
    }

    pub fn read(blkno: u32, data: &'a mut [u8]) -> Self {
        Self::new(Direction::Read, blkno, data)
    }

    pub fn write(blkno: u32, data: &'a mut [u8]) -> Self {
        Self::new(Direction::Write, blkno, data)
    }

    /// Bytes the transfer engine moves.
    pub fn payload(&mut self) -> &mut [u8] {
        let n = self.bcount.min(self.data.len());
        &mut self.data[..n]
    }

    pub fn fail(&mut self, e: SdError) {
        self.error = Some(e);
        self.resid = self.bcount;
    }

    pub fn result(&self) -> Result<(), SdError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Outcome of fitting a request into a device of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clip {
    /// Go ahead, possibly with a reduced `bcount`.
    Proceed,
    /// The request starts exactly at the end; nothing to move.
    Eof,
}

/// Fit `xfer` into `max` sectors.
///
/// A request starting at `max` is an end of file with the whole byte count
/// left over; one starting past it is invalid; one straddling it is cut
/// down to the sectors that fit.
pub fn clip(xfer: &mut Transfer<'_>, max: u32) -> Result<Clip, SdError> {
    let sz = xfer.bcount.div_ceil(SECTSIZE) as i64;
    let blkno = xfer.blkno as i64;
    let max = max as i64;

    if blkno + sz <= max {
        return Ok(Clip::Proceed);
    }
    if blkno == max {
        xfer.resid = xfer.bcount;
        return Ok(Clip::Eof);
    }
    let sz = max - blkno;
    if sz <= 0 {
        return Err(SdError::InvalidArgument);
    }
    xfer.bcount = (sz as usize) << SECTSIZE_SHIFT;
    Ok(Clip::Proceed)
}

/// Control requests understood by the disks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskIoctl {
    /// Partition table entry of the addressed partition.
    GetPartition,
    /// Capacity in sectors.
    GetMediaSize,
    /// Allow or forbid writes to absolute sector 0.
    SetWriteLabel(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlReply {
    Partition(Partition),
    MediaSize(u32),
    Done,
}
