use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    Error,
    constants::{CLA_GP, ins},
};

keycard_command! {
    /// GENERATE KEY command, answered with the new key UID
    GenerateKeyCommand {
        cla: CLA_GP,
        ins: ins::GENERATE_KEY,
        security: SecurityLevel::full(),
        success: [u8; 32],
        parse: |response| {
            check_status(&response)?;
            response
                .payload()
                .try_into()
                .map_err(|_| Error::InvalidData("Invalid key UID length"))
        }
    }
}

impl Default for GenerateKeyCommand {
    fn default() -> Self {
        Self::new(0x00, 0x00)
    }
}

keycard_command! {
    /// REMOVE KEY command
    RemoveKeyCommand {
        cla: CLA_GP,
        ins: ins::REMOVE_KEY,
        security: SecurityLevel::full(),
        success: (),
        parse: |response| {
            check_status(&response)
        }
    }
}

impl Default for RemoveKeyCommand {
    fn default() -> Self {
        Self::new(0x00, 0x00)
    }
}

#[cfg(test)]
mod tests {
    use keycard_apdu_core::ApduCommand;

    use super::*;

    #[test]
    fn test_generate_key_uid() {
        let mut raw = vec![0x0B; 32];
        raw.extend_from_slice(&[0x90, 0x00]);
        assert_eq!(GenerateKeyCommand::parse_response_raw(&raw).unwrap(), [0x0B; 32]);
        assert!(GenerateKeyCommand::parse_response_raw(&[0x90, 0x00]).is_err());
    }

    #[test]
    fn test_remove_key() {
        assert_eq!(
            RemoveKeyCommand::default().to_bytes().unwrap().as_ref(),
            &[0x80, 0xD3, 0x00, 0x00, 0x00]
        );
    }
}
