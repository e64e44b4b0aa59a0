use log::{debug, error, info};

use crate::err::SdError;

use super::{cmd::Command, regs::SdhcRegs, SdHost};

/// Rebuild the CSD bytes from a CMD9 response.
///
/// The controller strips the CRC, so the 120 payload bits sit right-aligned
/// in RESP3..RESP0. Byte 0 is taken from bits 23:16 of RESP3, which makes
/// the low 24 bits of RESP3 significant even though the structure field
/// only occupies its top bits. Byte 15 (CRC) is always zero.
pub fn csd_from_response(resp: [u32; 4]) -> [u8; 16] {
    let [r0, r1, r2, r3] = resp;
    [
        (r3 >> 16) as u8,
        (r3 >> 8) as u8,
        r3 as u8,
        (r2 >> 24) as u8,
        (r2 >> 16) as u8,
        (r2 >> 8) as u8,
        r2 as u8,
        (r1 >> 24) as u8,
        (r1 >> 16) as u8,
        (r1 >> 8) as u8,
        r1 as u8,
        (r0 >> 24) as u8,
        (r0 >> 16) as u8,
        (r0 >> 8) as u8,
        r0 as u8,
        0,
    ]
}

/// Sector count described by a CSD.
pub fn csd_sectors(csd: &[u8; 16]) -> Result<u32, SdError> {
    match csd[0] >> 6 {
        // SDC ver 2.00
        1 => {
            let csize = csd[9] as u32 + ((csd[8] as u32) << 8) + 1;
            Ok(csize << 10)
        }
        // SDC ver 1.XX or MMC
        0 => {
            let n = (csd[5] & 15) as u32
                + ((csd[10] & 128) >> 7) as u32
                + (((csd[9] & 3) as u32) << 1)
                + 2;
            let csize = (csd[8] >> 6) as u32
                + ((csd[7] as u32) << 2)
                + (((csd[6] & 3) as u32) << 10)
                + 1;
            debug!("sdhc:  csize {} n {}", csize, n);
            if n < 9 {
                return Err(SdError::InvalidCsd);
            }
            csize.checked_shl(n - 9).ok_or(SdError::InvalidCsd)
        }
        v => Err(SdError::UnknownCsdVersion(v)),
    }
}

impl<R: SdhcRegs> SdHost<R> {
    /// Fetch the CSD into the card record.
    pub fn read_csd(&mut self) -> Result<(), SdError> {
        let rca = self.card.rca_arg();
        self.with_activity(|host| {
            if let Err(e) = host.card_cmd(Command::SendCsd, rca, 0) {
                error!("sdhc:  SEND_CSD failed: {}", e);
                return Err(e);
            }
            host.card.csd = csd_from_response(host.get_response().as_r2());
            debug!("sdhc:  CSD {:02x?}", host.card.csd);
            Ok(())
        })
    }

    /// Read the CSD, compute the sector count and select the card so it
    /// enters the transfer state.
    pub fn card_size(&mut self) -> Result<u32, SdError> {
        self.read_csd()?;

        let sectors = csd_sectors(&self.card.csd)?;
        info!("sdhc:  card size is {} MiB", sectors / 2048);

        let rca = self.card.rca_arg();
        if let Err(e) = self.card_cmd(Command::SelectCard, rca, 0) {
            error!("sdhc:  SELECT_CARD failed: {}", e);
            return Err(e);
        }
        // R1b: the card may still hold DAT0 low
        let limit = self.config.select_ready_limit;
        match self.wait_ready(limit) {
            Ok(count) => debug!("sdhc:  wait_ready returns, count = {}", count),
            Err(e) => debug!("sdhc:  wait_ready after select: {}", e),
        }

        self.card.sectors = sectors;
        Ok(sectors)
    }
}
