use bytes::Bytes;
use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::constants::{CLA_GP, SECRET_LENGTH, ins};

const P1_START: u8 = 0x00;
const P1_ADD_ENTROPY: u8 = 0x01;
const P1_EXPORT: u8 = 0x02;
const P1_IMPORT: u8 = 0x03;

keycard_command! {
    /// DUPLICATE KEY command and its four phases
    ///
    /// Entropy is one-shot encrypted and sent without a secure channel; the
    /// other phases need a verified PIN.
    DuplicateKeyCommand {
        cla: CLA_GP,
        ins: ins::DUPLICATE_KEY,
        security: SecurityLevel::full(),
        success: Bytes,
        parse: |response| {
            check_status(&response)?;
            Ok(response.into_payload())
        }
    }
}

impl DuplicateKeyCommand {
    /// Start a duplication session expecting `entropy_count` contributions
    pub fn start(entropy_count: u8, first_entropy: &[u8; SECRET_LENGTH]) -> Self {
        Self::new(P1_START, entropy_count).with_data(Bytes::copy_from_slice(first_entropy))
    }

    /// Contribute one-shot encrypted entropy
    pub fn add_entropy(encrypted_entropy: Bytes) -> Self {
        Self::new(P1_ADD_ENTROPY, 0x00)
            .with_data(encrypted_entropy)
            .with_security_level(SecurityLevel::none())
    }

    /// Export the master key encrypted under the duplication key
    pub fn export() -> Self {
        Self::new(P1_EXPORT, 0x00)
    }

    /// Import a key exported by a card in the same duplication session
    pub fn import(exported: &[u8]) -> Self {
        Self::new(P1_IMPORT, 0x00).with_data(Bytes::copy_from_slice(exported))
    }
}
