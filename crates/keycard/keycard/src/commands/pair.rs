use bytes::Bytes;
use keycard_apdu_core::{SecurityLevel, StatusWord};

use crate::{
    Error,
    constants::{CLA_GP, SECRET_LENGTH, ins},
};

const NO_AVAILABLE_SLOTS: StatusWord = StatusWord::new(0x6A, 0x84);

/// Card answer to the first PAIR step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairChallenge {
    /// Card proof of knowledge of the pairing secret
    pub cryptogram: [u8; SECRET_LENGTH],
    /// Challenge the client must answer
    pub challenge: [u8; SECRET_LENGTH],
}

/// Card answer to the final PAIR step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSlot {
    /// Allocated pairing index
    pub index: u8,
    /// Salt for the pairing key
    pub salt: [u8; SECRET_LENGTH],
}

keycard_command! {
    /// PAIR, first step: send the client challenge
    PairFirstStageCommand {
        cla: CLA_GP,
        ins: ins::PAIR,
        security: SecurityLevel::none(),
        success: PairChallenge,
        parse: |response| {
            if response.status() == NO_AVAILABLE_SLOTS {
                return Err(Error::NoAvailablePairingSlots);
            }
            if !response.is_success() {
                return Err(Error::Pairing("pairing failed on step 1"));
            }
            let (cryptogram, challenge): ([u8; SECRET_LENGTH], [u8; SECRET_LENGTH]) = response
                .payload()
                .split_first_chunk::<SECRET_LENGTH>()
                .and_then(|(cryptogram, rest)| Some((*cryptogram, rest.try_into().ok()?)))
                .ok_or(Error::Pairing("invalid pairing response"))?;
            Ok(PairChallenge { cryptogram, challenge })
        }
    }
}

impl PairFirstStageCommand {
    /// First step with the client challenge
    pub fn with_challenge(challenge: &[u8; SECRET_LENGTH]) -> Self {
        Self::new(0x00, 0x00).with_data(Bytes::copy_from_slice(challenge))
    }
}

keycard_command! {
    /// PAIR, final step: answer the card challenge
    PairFinalStageCommand {
        cla: CLA_GP,
        ins: ins::PAIR,
        security: SecurityLevel::none(),
        success: PairingSlot,
        parse: |response| {
            if !response.is_success() {
                return Err(Error::Pairing("pairing failed on step 2"));
            }
            let (index, salt): (u8, [u8; SECRET_LENGTH]) = response
                .payload()
                .split_first()
                .and_then(|(index, salt)| Some((*index, salt.try_into().ok()?)))
                .ok_or(Error::Pairing("invalid pairing response"))?;
            Ok(PairingSlot { index, salt })
        }
    }
}

impl PairFinalStageCommand {
    /// Final step with the client cryptogram
    pub fn with_cryptogram(cryptogram: &[u8; SECRET_LENGTH]) -> Self {
        Self::new(0x01, 0x00).with_data(Bytes::copy_from_slice(cryptogram))
    }
}
