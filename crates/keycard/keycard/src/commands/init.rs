use bytes::Bytes;
use keycard_apdu_core::{SecurityLevel, StatusWord};

use super::check_status;
use crate::{
    Error,
    constants::{CLA_GP, ins},
};

const ALREADY_INITIALIZED: StatusWord = StatusWord::new(0x6D, 0x00);

keycard_command! {
    /// INIT command, setting the PIN, PUK and pairing secret of a blank card
    ///
    /// The payload is one-shot encrypted since no secure channel exists yet.
    InitCommand {
        cla: CLA_GP,
        ins: ins::INIT,
        security: SecurityLevel::none(),
        success: (),
        parse: |response| {
            if response.status() == ALREADY_INITIALIZED {
                return Err(Error::AlreadyInitialized);
            }
            check_status(&response)
        }
    }
}

impl InitCommand {
    /// INIT carrying an already encrypted payload
    pub fn with_encrypted_payload(payload: Bytes) -> Self {
        Self::new(0x00, 0x00).with_data(payload)
    }
}
