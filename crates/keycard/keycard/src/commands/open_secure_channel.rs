use bytes::Bytes;
use keycard_apdu_core::SecurityLevel;

use crate::{
    Error,
    constants::{CLA_GP, ins},
};

keycard_command! {
    /// OPEN SECURE CHANNEL command
    ///
    /// Answered with the session salt followed by the initial chaining value.
    OpenSecureChannelCommand {
        cla: CLA_GP,
        ins: ins::OPEN_SECURE_CHANNEL,
        security: SecurityLevel::none(),
        success: Bytes,
        parse: |response| {
            if !response.is_success() {
                return Err(Error::Handshake("open secure channel failed"));
            }
            Ok(response.into_payload())
        }
    }
}

impl OpenSecureChannelCommand {
    /// Open a channel on `pairing_index` with the host ephemeral public key
    pub fn with_pairing_index_and_pubkey(pairing_index: u8, public_key: &[u8; 65]) -> Self {
        Self::new(pairing_index, 0x00)
            .with_data(Bytes::copy_from_slice(public_key))
            .with_le(0)
    }
}

#[cfg(test)]
mod tests {
    use keycard_apdu_core::ApduCommand;

    use super::*;

    #[test]
    fn test_open_secure_channel_encoding() {
        let command = OpenSecureChannelCommand::with_pairing_index_and_pubkey(2, &[0x04; 65]);
        let bytes = command.to_bytes().unwrap();
        assert_eq!(&bytes[..5], &[0x80, 0x10, 0x02, 0x00, 0x41]);
        assert_eq!(bytes.len(), 5 + 65 + 1);
    }

    #[test]
    fn test_open_secure_channel_rejected() {
        assert!(matches!(
            OpenSecureChannelCommand::parse_response_raw(&[0x6A, 0x86]),
            Err(Error::Handshake(_))
        ));
    }
}
