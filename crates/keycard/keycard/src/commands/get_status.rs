use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    constants::{CLA_GP, ins},
    types::{ApplicationStatus, KeyPath},
};

const P1_APPLICATION: u8 = 0x00;
const P1_KEY_PATH: u8 = 0x01;

keycard_command! {
    /// GET STATUS for the application status template
    GetApplicationStatusCommand {
        cla: CLA_GP,
        ins: ins::GET_STATUS,
        security: SecurityLevel::enc_mac(),
        success: ApplicationStatus,
        parse: |response| {
            check_status(&response)?;
            ApplicationStatus::try_from(response.payload())
        }
    }
}

impl Default for GetApplicationStatusCommand {
    fn default() -> Self {
        Self::new(P1_APPLICATION, 0x00)
    }
}

keycard_command! {
    /// GET STATUS for the current key path
    GetKeyPathCommand {
        cla: CLA_GP,
        ins: ins::GET_STATUS,
        security: SecurityLevel::enc_mac(),
        success: KeyPath,
        parse: |response| {
            check_status(&response)?;
            KeyPath::from_bytes(response.payload())
        }
    }
}

impl Default for GetKeyPathCommand {
    fn default() -> Self {
        Self::new(P1_KEY_PATH, 0x00)
    }
}
