use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::constants::{CLA_GP, ins};

keycard_command! {
    /// UNPAIR command, freeing a pairing slot
    UnpairCommand {
        cla: CLA_GP,
        ins: ins::UNPAIR,
        security: SecurityLevel::full(),
        success: (),
        parse: |response| {
            check_status(&response)
        }
    }
}

impl UnpairCommand {
    /// Free the slot at `index`
    pub fn with_index(index: u8) -> Self {
        Self::new(index, 0x00)
    }
}

#[cfg(test)]
mod tests {
    use keycard_apdu_core::ApduCommand;

    use super::*;

    #[test]
    fn test_unpair_command() {
        let command = UnpairCommand::with_index(3);
        assert_eq!(command.to_bytes().unwrap().as_ref(), &[0x80, 0x13, 0x03, 0x00, 0x00]);
        assert_eq!(command.required_security_level(), SecurityLevel::full());
    }
}
