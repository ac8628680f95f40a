use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    constants::{CLA_GP, ins},
    types::{ExportedKey, KeyPath},
};

const P1_CURRENT_KEY: u8 = 0x00;
const P1_DERIVE: u8 = 0x01;
const P1_DERIVE_AND_MAKE_CURRENT: u8 = 0x02;

const P2_PRIVATE_AND_PUBLIC: u8 = 0x00;
const P2_PUBLIC_ONLY: u8 = 0x01;

keycard_command! {
    /// EXPORT KEY command
    ExportKeyCommand {
        cla: CLA_GP,
        ins: ins::EXPORT_KEY,
        security: SecurityLevel::full(),
        success: ExportedKey,
        parse: |response| {
            check_status(&response)?;
            ExportedKey::try_from(response.payload())
        }
    }
}

const fn p2(public_only: bool) -> u8 {
    if public_only {
        P2_PUBLIC_ONLY
    } else {
        P2_PRIVATE_AND_PUBLIC
    }
}

impl ExportKeyCommand {
    /// Export the current key
    pub fn current(public_only: bool) -> Self {
        Self::new(P1_CURRENT_KEY, p2(public_only))
    }

    /// Export the key at `path`, optionally making it the current key
    pub fn with_path(path: &KeyPath, make_current: bool, public_only: bool) -> Self {
        let derive = if make_current {
            P1_DERIVE_AND_MAKE_CURRENT
        } else {
            P1_DERIVE
        };
        Self::new(path.source() as u8 | derive, p2(public_only)).with_data(path.to_bytes())
    }
}
