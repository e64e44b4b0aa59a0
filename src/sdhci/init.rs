use log::{debug, error, info};

use crate::err::SdError;

use super::{cmd::Command, constant::*, regs::SdhcRegs, Card, CardType, SdHost};

/// Card identification progress, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    PowerOn,
    Idle,
    VoltageCheck,
    OpCondPoll,
    Identified,
    AddressAssigned,
}

impl<R: SdhcRegs> SdHost<R> {
    /// Bring the card from power-on to an assigned relative address.
    ///
    /// On failure the card record is left as Unknown with zero sectors.
    pub fn card_init(&mut self) -> Result<(), SdError> {
        self.card = Card::default();

        let res = self.with_activity(|host| host.identify());
        if let Err(e) = res {
            self.card = Card::default();
            error!("sdhc:  card init failed: {}", e);
        }
        res
    }

    fn identify(&mut self) -> Result<(), SdError> {
        let mut state = InitState::PowerOn;

        // Slow speed: 400 kHz
        self.set_speed(self.config.ident_khz)?;

        let retries = self.config.go_idle_retries.max(1);
        if !(0..retries).any(|_| self.card_cmd(Command::GoIdle, 0, 0).is_ok()) {
            error!("sdhc:  GO_IDLE failed {} times", retries);
            return Err(SdError::CardNotReady);
        }
        state = self.advance(state, InitState::Idle);

        // CMD8 is illegal for 1.x cards
        let card_type = match self.card_cmd(Command::SendIfCond, IF_COND_ARG, 0) {
            Err(_) => CardType::SdLegacy,
            Ok(()) => {
                let echo = self.get_response().as_r7();
                if echo & 0xFF == IF_COND_CHECK_PATTERN {
                    CardType::SdII
                } else {
                    error!("sdhc:  cannot detect card type, response={:#x}", echo);
                    return Err(SdError::UnsupportedCard);
                }
            }
        };
        self.card.card_type = card_type;
        state = self.advance(state, InitState::VoltageCheck);

        let ocr_arg = match card_type {
            CardType::SdII => OCR_HCS | OCR_VOLTAGE_WINDOW,
            _ => OCR_VOLTAGE_WINDOW,
        };

        let mut round = 0;
        let ocr = loop {
            // CMD55 failures surface as an ACMD41 failure
            let _ = self.card_cmd(Command::App, 0, 0);
            let reply = self.card_cmd(Command::SendOpCond, ocr_arg, 0);
            let ocr = self.get_response().as_r3();
            if reply.is_ok() && ocr & OCR_BUSY != 0 {
                break ocr;
            }
            if round >= self.config.send_op_limit {
                error!("sdhc:  SEND_OP timed out, reply = {:?}, RESP0 = {:#x}", reply, ocr);
                return Err(SdError::Timeout);
            }
            round += 1;
        };
        self.stats.send_op = self.stats.send_op.max(round);
        state = self.advance(state, InitState::OpCondPoll);

        self.card.ocr = ocr;
        if card_type == CardType::SdII && ocr & OCR_SDHC_MASK == OCR_SDHC_MASK {
            self.card.card_type = CardType::SdHc;
        }

        // CID moves the card to identification state
        if let Err(e) = self.card_cmd(Command::AllSendCid, 0, 0) {
            error!("sdhc:  ALL_SEND_CID failed: {}", e);
            return Err(e);
        }
        self.card.cid = self.get_response().as_r2();
        state = self.advance(state, InitState::Identified);

        if let Err(e) = self.card_cmd(Command::SendRelativeAddr, 0, 0) {
            error!("sdhc:  SEND_RELATIVE_ADDR failed: {}", e);
            return Err(e);
        }
        self.card.rca = self.get_response().as_r6();
        self.advance(state, InitState::AddressAssigned);

        info!("sdhc:  {:?} card, rca {:#06x}", self.card.card_type, self.card.rca);
        Ok(())
    }

    fn advance(&self, from: InitState, to: InitState) -> InitState {
        debug!("sdhc:  {:?} -> {:?}", from, to);
        to
    }
}
