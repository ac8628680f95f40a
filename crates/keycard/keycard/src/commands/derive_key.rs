use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    constants::{CLA_GP, ins},
    types::KeyPath,
};

keycard_command! {
    /// DERIVE KEY command, changing the current key
    DeriveKeyCommand {
        cla: CLA_GP,
        ins: ins::DERIVE_KEY,
        security: SecurityLevel::full(),
        success: (),
        parse: |response| {
            check_status(&response)
        }
    }
}

impl DeriveKeyCommand {
    /// Derive along `path`, starting from its source
    pub fn with_path(path: &KeyPath) -> Self {
        Self::new(path.source() as u8, 0x00).with_data(path.to_bytes())
    }
}
