use bytes::Bytes;
use keycard_apdu_core::SecurityLevel;

use crate::{
    Error,
    constants::{CLA_GP, SECRET_LENGTH, ins},
};

keycard_command! {
    /// MUTUALLY AUTHENTICATE command, the first exchange on a new channel
    MutuallyAuthenticateCommand {
        cla: CLA_GP,
        ins: ins::MUTUALLY_AUTHENTICATE,
        security: SecurityLevel::enc_mac(),
        success: (),
        parse: |response| {
            if !response.is_success() {
                return Err(Error::Handshake("mutual authentication failed"));
            }
            if response.payload().len() != SECRET_LENGTH {
                return Err(Error::Handshake("invalid mutual authentication response"));
            }
            Ok(())
        }
    }
}

impl MutuallyAuthenticateCommand {
    /// Authenticate with a random challenge
    pub fn with_challenge(challenge: &[u8; SECRET_LENGTH]) -> Self {
        Self::new(0x00, 0x00).with_data(Bytes::copy_from_slice(challenge))
    }
}

#[cfg(test)]
mod tests {
    use keycard_apdu_core::ApduCommand;

    use super::*;

    #[test]
    fn test_response_length() {
        let mut raw = vec![0x00; 32];
        raw.extend_from_slice(&[0x90, 0x00]);
        assert!(MutuallyAuthenticateCommand::parse_response_raw(&raw).is_ok());
        assert!(matches!(
            MutuallyAuthenticateCommand::parse_response_raw(&[0x00, 0x90, 0x00]),
            Err(Error::Handshake(_))
        ));
        assert!(matches!(
            MutuallyAuthenticateCommand::parse_response_raw(&[0x69, 0x82]),
            Err(Error::Handshake(_))
        ));
    }
}
