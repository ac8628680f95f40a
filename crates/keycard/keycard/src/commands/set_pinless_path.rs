use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    Error, Result,
    constants::{CLA_GP, ins},
    types::{DeriveSource, KeyPath},
};

keycard_command! {
    /// SET PINLESS PATH command
    SetPinlessPathCommand {
        cla: CLA_GP,
        ins: ins::SET_PINLESS_PATH,
        security: SecurityLevel::full(),
        success: (),
        parse: |response| {
            check_status(&response)
        }
    }
}

impl SetPinlessPathCommand {
    /// Set the PIN-less path; it must be absolute
    pub fn with_path(path: &KeyPath) -> Result<Self> {
        if path.source() != DeriveSource::Master {
            return Err(Error::InvalidDerivationPath(
                "PIN-less path must start from the master key".to_string(),
            ));
        }
        Ok(Self::new(0x00, 0x00).with_data(path.to_bytes()))
    }

    /// Remove the PIN-less path
    pub fn clear() -> Self {
        Self::new(0x00, 0x00)
    }
}
