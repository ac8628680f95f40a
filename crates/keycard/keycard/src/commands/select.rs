use bytes::Bytes;
use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    constants::{CLA_ISO7816, ins},
    types::ApplicationInfo,
};

keycard_command! {
    /// SELECT command for the Keycard applet
    SelectCommand {
        cla: CLA_ISO7816,
        ins: ins::SELECT,
        security: SecurityLevel::none(),
        success: ApplicationInfo,
        parse: |response| {
            check_status(&response)?;
            ApplicationInfo::try_from(response.payload())
        }
    }
}

impl SelectCommand {
    /// Select the applet instance with the given AID
    pub fn with_aid(aid: &[u8]) -> Self {
        Self::new(0x04, 0x00)
            .with_data(Bytes::copy_from_slice(aid))
            .with_le(0)
    }
}
