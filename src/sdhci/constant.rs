#![allow(unused)]

// PIC32MZ DA SDHC register offsets, relative to the controller base (0xBF8E_C000)
pub const SDHC_BLKCON: u32 = 0x04;
pub const SDHC_ARG: u32 = 0x08;
pub const SDHC_MODE: u32 = 0x0C;
pub const SDHC_RESP0: u32 = 0x10;
pub const SDHC_RESP1: u32 = 0x14;
pub const SDHC_RESP2: u32 = 0x18;
pub const SDHC_RESP3: u32 = 0x1C;
pub const SDHC_DATA: u32 = 0x20;
pub const SDHC_STAT1: u32 = 0x24;
pub const SDHC_CON1: u32 = 0x28;
pub const SDHC_CON2: u32 = 0x2C;
pub const SDHC_INTSTAT: u32 = 0x30;
pub const SDHC_INTEN: u32 = 0x34;
pub const SDHC_INTSEN: u32 = 0x38;
pub const SDHC_STAT2: u32 = 0x3C;
pub const SDHC_CAP: u32 = 0x40;
pub const SDHC_MAXCAP: u32 = 0x48;

pub const SDHC_BASE_ADDR: usize = 0xBF8E_C000;

/*
 * End of controller registers.
 */

// STAT1: command / data line inhibit
pub const SDHC_STAT1_CMD_INHIBIT: u32 = 0x0000_0001;
pub const SDHC_STAT1_DATA_INHIBIT: u32 = 0x0000_0002;
pub const SDHC_STAT1_BUSY: u32 = SDHC_STAT1_CMD_INHIBIT | SDHC_STAT1_DATA_INHIBIT;

// CON1 host control
pub const SDHC_CON1_4BIT: u32 = 1 << 1;
pub const SDHC_CON1_HISPD: u32 = 1 << 2;
pub const SDHC_CON1_POWER: u32 = 1 << 8;

// CON2 clock control
pub const SDHC_CON2_INT_CLK_EN: u32 = 1 << 0;
pub const SDHC_CON2_INT_CLK_STABLE: u32 = 1 << 1;
pub const SDHC_CON2_SD_CLK_EN: u32 = 1 << 2;
pub const SDHC_CON2_DIV_SHIFT: u32 = 8;
pub const SDHC_CON2_DATA_TIMEOUT_MAX: u32 = 0x0F << 16;

// Interrupt status / enable bits
pub const SDHC_INT_CMD_DONE: u32 = 1 << 0;
pub const SDHC_INT_XFER_DONE: u32 = 1 << 1;
pub const SDHC_INT_WRITE_READY: u32 = 1 << 4;
pub const SDHC_INT_READ_READY: u32 = 1 << 5;
pub const SDHC_INT_CMD_TIMEOUT: u32 = 1 << 16;
pub const SDHC_INT_CMD_CRC: u32 = 1 << 17;
pub const SDHC_INT_CMD_END_BIT: u32 = 1 << 18;
pub const SDHC_INT_CMD_INDEX: u32 = 1 << 19;
pub const SDHC_INT_DATA_TIMEOUT: u32 = 1 << 20;
pub const SDHC_INT_DATA_CRC: u32 = 1 << 21;
pub const SDHC_INT_DATA_END_BIT: u32 = 1 << 22;
pub const SDHC_INT_BUS_POWER: u32 = 1 << 23;
pub const SDHC_INT_AUTO_CMD_ERR: u32 = 1 << 24;
pub const SDHC_INT_ADMA_ERR: u32 = 1 << 25;

pub const SDHC_INT_ERROR_MASK: u32 = 0x03FF_0000;
pub const SDHC_INT_ARM_MASK: u32 = 0x03FF_81FF;

// Block size written to BLKCON, count goes to the upper half
pub const SECTSIZE: usize = 512;
pub const SECTSIZE_SHIFT: u32 = 9;
pub const SWITCH_STATUS_LEN: usize = 64;
pub const WORDS_PER_SECTOR: usize = SECTSIZE / 4;

// SD command indices
pub const SD_GO_IDLE_STATE: u8 = 0;
pub const SD_ALL_SEND_CID: u8 = 2;
pub const SD_SEND_RELATIVE_ADDR: u8 = 3;
pub const SD_SWITCH_FUNC: u8 = 6;
pub const SD_APP_SET_BUS_WIDTH: u8 = 6;
pub const SD_SELECT_CARD: u8 = 7;
pub const SD_SEND_IF_COND: u8 = 8;
pub const SD_SEND_CSD: u8 = 9;
pub const SD_SEND_CID: u8 = 10;
pub const SD_STOP_TRANSMISSION: u8 = 12;
pub const SD_SEND_STATUS: u8 = 13;
pub const SD_SET_BLOCKLEN: u8 = 16;
pub const SD_READ_SINGLE_BLOCK: u8 = 17;
pub const SD_READ_MULTIPLE_BLOCK: u8 = 18;
pub const SD_APP_SET_WR_BLK_ERASE_COUNT: u8 = 23;
pub const SD_WRITE_BLOCK: u8 = 24;
pub const SD_WRITE_MULTIPLE_BLOCK: u8 = 25;
pub const SD_APP_OP_COND: u8 = 41;
pub const SD_APP_CMD: u8 = 55;

// CMD8 argument: 2.7-3.6V, check pattern 0xAA
pub const IF_COND_ARG: u32 = 0x1AA;
pub const IF_COND_CHECK_PATTERN: u32 = 0xAA;

// ACMD41 argument / OCR bits
pub const OCR_VOLTAGE_WINDOW: u32 = 0x00FF_8000;
pub const OCR_HCS: u32 = 1 << 30;
pub const OCR_BUSY: u32 = 1 << 31;
pub const OCR_SDHC_MASK: u32 = OCR_BUSY | OCR_HCS;

// CMD6: mode 1 (switch), function group 1 -> function 1 (high speed)
pub const SWITCH_HIGH_SPEED_ARG: u32 = 0x8000_0001;

// ACMD6: 4-bit bus
pub const BUS_WIDTH_4BIT_ARG: u32 = 2;

// CSD TRAN_SPEED codes
pub const TRANS_SPEED_25MHZ: u8 = 0x32;
pub const TRANS_SPEED_50MHZ: u8 = 0x5A;
pub const TRANS_SPEED_100MHZ: u8 = 0x0B;
pub const TRANS_SPEED_200MHZ: u8 = 0x2B;

// CSD byte 4, bit 6: command class 10 (switch) supported
pub const CSD_CCC_SWITCH: u8 = 0x40;
