//! Register-level model of an SDHC controller with one card attached.
//!
//! Commands execute the moment the mode register is written. Interrupt
//! status is write-one-to-clear, data moves through a word FIFO and card
//! sectors live in a sparse map.

use core::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, VecDeque};

use super::constant::*;
use super::regs::SdhcRegs;
use super::{ModeFlags, SdHost};
use crate::config::SdhcConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimKind {
    Legacy,
    SdII,
    SdHc,
}

/// Card behaviour knobs plus the card's persistent state.
#[derive(Debug, Clone)]
pub struct SimCard {
    pub kind: SimKind,
    pub csd: [u8; 16],
    /// Overrides the CMD8 echo.
    pub if_cond_echo: Option<u32>,
    /// ACMD41 rounds answered with the busy bit clear.
    pub op_cond_busy_rounds: u32,
    /// Every command with this index times out.
    pub fail_index: Option<u8>,
    /// STAT1 reports the lines inhibited forever.
    pub busy_forever: bool,
    pub supports_high_speed: bool,
    pub reject_bus_width: bool,
    /// Reads raise a data CRC error.
    pub data_error: bool,
    /// Reads never signal data ready.
    pub stall_data: bool,
    pub sectors: HashMap<u32, [u8; SECTSIZE]>,
    pub bus_width: u8,
}

impl SimCard {
    pub const RCA: u16 = 0xB368;
    pub const CID: [u32; 4] = [0x2C3D_4E5F, 0x5344_3136, 0x4730_8012, 0x0003_5344];

    pub fn new(kind: SimKind) -> Self {
        // CSD v2, 25 MHz, class 10 supported, C_SIZE 59 (30 MiB)
        let mut csd = [0u8; 16];
        csd[0] = 0x40;
        csd[1] = 0x0E;
        csd[3] = TRANS_SPEED_25MHZ;
        csd[4] = 0x5B;
        csd[5] = 0x59;
        csd[9] = 59;
        Self {
            kind,
            csd,
            if_cond_echo: None,
            op_cond_busy_rounds: 0,
            fail_index: None,
            busy_forever: false,
            supports_high_speed: true,
            reject_bus_width: false,
            data_error: false,
            stall_data: false,
            sectors: HashMap::new(),
            bus_width: 1,
        }
    }

    /// Sectors reported by the default CSD.
    pub const DEFAULT_SECTORS: u32 = 60 << 10;

    /// Put `data` in sector `lba`, zero padded.
    pub fn with_sector(mut self, lba: u32, data: &[u8]) -> Self {
        let mut sector = [0u8; SECTSIZE];
        sector[..data.len()].copy_from_slice(data);
        self.sectors.insert(lba, sector);
        self
    }

    pub fn regs(self) -> SimRegs {
        SimRegs {
            state: RefCell::new(State {
                card: self,
                regs: [0; 32],
                app: false,
                op_rounds: 0,
                fifo: VecDeque::new(),
                read_blocks: 0,
                write: None,
                log: Vec::new(),
                writes: 0,
            }),
        }
    }

    pub fn host(self) -> SdHost<SimRegs> {
        self.host_with(SdhcConfig::default())
    }

    pub fn host_with(self, config: SdhcConfig) -> SdHost<SimRegs> {
        let config = SdhcConfig {
            settle_spins: 0,
            ..config
        };
        SdHost::new(self.regs(), config)
    }
}

/// CMD9 response registers carrying `csd`.
pub fn csd_response(csd: &[u8; 16]) -> [u32; 4] {
    let be = |at: usize| u32::from_be_bytes([csd[at], csd[at + 1], csd[at + 2], csd[at + 3]]);
    let r3 = ((csd[0] as u32) << 16) | ((csd[1] as u32) << 8) | csd[2] as u32;
    [be(11), be(7), be(3), r3]
}

#[derive(Debug)]
struct WriteXfer {
    lba: u32,
    left: u32,
    words: Vec<u32>,
}

#[derive(Debug)]
struct State {
    card: SimCard,
    regs: [u32; 32],
    app: bool,
    op_rounds: u32,
    fifo: VecDeque<u32>,
    /// Blocks still queued behind the one being drained.
    read_blocks: u32,
    write: Option<WriteXfer>,
    log: Vec<(u8, u32, u32)>,
    writes: usize,
}

impl State {
    fn reg(&mut self, offset: u32) -> &mut u32 {
        &mut self.regs[(offset / 4) as usize]
    }

    fn raise(&mut self, bits: u32) {
        *self.reg(SDHC_INTSTAT) |= bits;
    }

    fn respond(&mut self, r0: u32) {
        *self.reg(SDHC_RESP0) = r0;
    }

    fn lba(&self, arg: u32) -> u32 {
        match self.card.kind {
            SimKind::SdHc => arg,
            _ => arg >> SECTSIZE_SHIFT,
        }
    }

    fn switch_status(&self) -> [u8; SWITCH_STATUS_LEN] {
        let mut s = [0u8; SWITCH_STATUS_LEN];
        // 200 mA
        s[1] = 200;
        for group in 0..6 {
            let at = 12 - 2 * group;
            s[at] = 0x80;
            s[at + 1] = 0x01;
        }
        if self.card.supports_high_speed {
            s[13] = 0x03;
            s[16] = 0x01;
        } else {
            s[16] = 0x0F;
        }
        s
    }

    fn queue_block(&mut self, bytes: &[u8]) {
        for w in bytes.chunks_exact(4) {
            self.fifo
                .push_back(u32::from_le_bytes([w[0], w[1], w[2], w[3]]));
        }
    }

    fn execute(&mut self, mode: u32) {
        let index = ((mode >> 24) & 0x3F) as u8;
        let arg = *self.reg(SDHC_ARG);
        let count = (*self.reg(SDHC_BLKCON) >> 16).max(1);
        let flags = ModeFlags::from_bits_truncate(mode);
        self.log.push((index, arg, mode));

        let app = core::mem::replace(&mut self.app, false);
        if self.card.fail_index == Some(index) {
            self.raise(SDHC_INT_CMD_TIMEOUT);
            return;
        }

        match (app, index) {
            (_, SD_GO_IDLE_STATE) => {
                self.op_rounds = 0;
                self.fifo.clear();
                self.write = None;
            }
            (false, SD_SEND_IF_COND) => {
                if self.card.kind == SimKind::Legacy {
                    self.raise(SDHC_INT_CMD_TIMEOUT);
                    return;
                }
                let echo = self.card.if_cond_echo.unwrap_or(arg & 0xFFF);
                self.respond(echo);
            }
            (false, SD_APP_CMD) => {
                self.app = true;
                self.respond(0x0000_0120);
            }
            (true, SD_APP_OP_COND) => {
                if self.op_rounds < self.card.op_cond_busy_rounds {
                    self.op_rounds += 1;
                    self.respond(OCR_VOLTAGE_WINDOW);
                } else {
                    let ccs = match self.card.kind {
                        SimKind::SdHc if arg & OCR_HCS != 0 => OCR_HCS,
                        _ => 0,
                    };
                    self.respond(OCR_BUSY | ccs | OCR_VOLTAGE_WINDOW);
                }
            }
            (false, SD_ALL_SEND_CID) => {
                let cid = SimCard::CID;
                for (i, word) in cid.iter().enumerate() {
                    *self.reg(SDHC_RESP0 + 4 * i as u32) = *word;
                }
            }
            (false, SD_SEND_RELATIVE_ADDR) => self.respond((SimCard::RCA as u32) << 16),
            (false, SD_SEND_CSD) => {
                let resp = csd_response(&self.card.csd);
                for (i, word) in resp.iter().enumerate() {
                    *self.reg(SDHC_RESP0 + 4 * i as u32) = *word;
                }
            }
            (false, SD_SELECT_CARD) => self.respond(0x0000_0700),
            (false, SD_SWITCH_FUNC) if flags.contains(ModeFlags::DATA_PRESENT) => {
                let status = self.switch_status();
                self.queue_block(&status);
                self.read_blocks = 0;
                self.raise(SDHC_INT_READ_READY);
            }
            (true, SD_APP_SET_BUS_WIDTH) => {
                if self.card.reject_bus_width {
                    self.raise(SDHC_INT_CMD_INDEX);
                    return;
                }
                self.card.bus_width = if arg == BUS_WIDTH_4BIT_ARG { 4 } else { 1 };
            }
            (true, SD_APP_SET_WR_BLK_ERASE_COUNT) => self.respond(0x0000_0920),
            (false, SD_READ_SINGLE_BLOCK | SD_READ_MULTIPLE_BLOCK) => {
                if self.card.data_error {
                    self.raise(SDHC_INT_DATA_CRC);
                    return;
                }
                let first = self.lba(arg);
                for lba in first..first + count {
                    let sector = self.card.sectors.get(&lba).copied().unwrap_or([0; SECTSIZE]);
                    self.queue_block(&sector);
                }
                self.read_blocks = count - 1;
                if !self.card.stall_data {
                    self.raise(SDHC_INT_READ_READY);
                }
            }
            (false, SD_WRITE_BLOCK | SD_WRITE_MULTIPLE_BLOCK) => {
                self.write = Some(WriteXfer {
                    lba: self.lba(arg),
                    left: count,
                    words: Vec::new(),
                });
                self.raise(SDHC_INT_WRITE_READY);
            }
            (false, SD_STOP_TRANSMISSION | SD_SEND_STATUS | SD_SET_BLOCKLEN) => {
                self.respond(0x0000_0900)
            }
            _ => {
                self.raise(SDHC_INT_CMD_TIMEOUT);
                return;
            }
        }
        self.raise(SDHC_INT_CMD_DONE);
    }

    fn pop_data(&mut self) -> u32 {
        let word = self.fifo.pop_front().unwrap_or(0);
        let drained_block = self.fifo.len() % WORDS_PER_SECTOR == 0;
        if self.fifo.is_empty() {
            self.raise(SDHC_INT_XFER_DONE);
        } else if drained_block && self.read_blocks > 0 {
            self.read_blocks -= 1;
            self.raise(SDHC_INT_READ_READY);
        }
        word
    }

    fn push_data(&mut self, word: u32) {
        let Some(xfer) = self.write.as_mut() else {
            return;
        };
        xfer.words.push(word);
        if xfer.words.len() < WORDS_PER_SECTOR {
            return;
        }

        let mut sector = [0u8; SECTSIZE];
        for (bytes, w) in sector.chunks_exact_mut(4).zip(xfer.words.drain(..)) {
            bytes.copy_from_slice(&w.to_le_bytes());
        }
        let lba = xfer.lba;
        xfer.lba += 1;
        xfer.left -= 1;
        let done = xfer.left == 0;
        self.card.sectors.insert(lba, sector);

        if done {
            self.write = None;
            self.raise(SDHC_INT_XFER_DONE);
        } else {
            self.raise(SDHC_INT_WRITE_READY);
        }
    }
}

#[derive(Debug)]
pub struct SimRegs {
    state: RefCell<State>,
}

impl SimRegs {
    pub fn sim(&self) -> Ref<'_, SimCard> {
        Ref::map(self.state.borrow(), |s| &s.card)
    }

    /// Change card behaviour in the middle of a test.
    pub fn sim_mut(&self) -> RefMut<'_, SimCard> {
        RefMut::map(self.state.borrow_mut(), |s| &mut s.card)
    }

    /// Raw stored value of a register, without read side effects.
    pub fn peek(&self, offset: u32) -> u32 {
        self.state.borrow().regs[(offset / 4) as usize]
    }

    /// Arguments of every command issued with `index`, in order.
    pub fn sent_args(&self, index: u8) -> Vec<u32> {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|(i, _, _)| *i == index)
            .map(|(_, arg, _)| *arg)
            .collect()
    }

    pub fn last_command(&self, index: u8) -> Option<(u8, u32, u32)> {
        self.state
            .borrow()
            .log
            .iter()
            .rev()
            .find(|(i, _, _)| *i == index)
            .copied()
    }

    pub fn command_count(&self) -> usize {
        self.state.borrow().log.len()
    }

    /// Register writes seen so far.
    pub fn write_count(&self) -> usize {
        self.state.borrow().writes
    }

    pub fn clock_divisor_field(&self) -> u32 {
        (self.peek(SDHC_CON2) >> SDHC_CON2_DIV_SHIFT) & 0xFF
    }
}

impl SdhcRegs for SimRegs {
    fn read(&self, offset: u32) -> u32 {
        let mut s = self.state.borrow_mut();
        match offset {
            SDHC_STAT1 if s.card.busy_forever => SDHC_STAT1_BUSY,
            SDHC_DATA => s.pop_data(),
            _ => *s.reg(offset),
        }
    }

    fn write(&self, offset: u32, value: u32) {
        let mut s = self.state.borrow_mut();
        s.writes += 1;
        match offset {
            SDHC_INTSTAT => *s.reg(offset) &= !value,
            SDHC_MODE => {
                *s.reg(offset) = value;
                s.execute(value);
            }
            SDHC_DATA => s.push_data(value),
            SDHC_CON2 if value & SDHC_CON2_INT_CLK_EN != 0 => {
                *s.reg(offset) = value | SDHC_CON2_INT_CLK_STABLE
            }
            _ => *s.reg(offset) = value,
        }
    }
}
