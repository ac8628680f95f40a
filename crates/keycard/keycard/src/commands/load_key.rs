use bytes::Bytes;
use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    Error, Result,
    constants::{CLA_GP, ins},
    types::Keypair,
};

const P1_EC: u8 = 0x01;
const P1_EXTENDED_EC: u8 = 0x02;
const P1_SEED: u8 = 0x03;

keycard_command! {
    /// LOAD KEY command
    ///
    /// Answered with the key UID of the new master key, or nothing on firmware
    /// that does not report it.
    LoadKeyCommand {
        cla: CLA_GP,
        ins: ins::LOAD_KEY,
        security: SecurityLevel::full(),
        success: Option<[u8; 32]>,
        parse: |response| {
            check_status(&response)?;
            match response.payload() {
                [] => Ok(None),
                uid => uid
                    .try_into()
                    .map(Some)
                    .map_err(|_| Error::InvalidData("Invalid key UID length")),
            }
        }
    }
}

impl LoadKeyCommand {
    /// Load a keypair, extended when it carries a chain code
    pub fn with_keypair(keypair: &Keypair) -> Result<Self> {
        let p1 = if keypair.is_extended() { P1_EXTENDED_EC } else { P1_EC };
        Ok(Self::new(p1, 0x00).with_data(keypair.to_tlv_bytes()?))
    }

    /// Load a BIP39 seed
    pub fn with_seed(seed: &[u8; 64]) -> Self {
        Self::new(P1_SEED, 0x00).with_data(Bytes::copy_from_slice(seed))
    }
}

#[cfg(test)]
mod tests {
    use k256::SecretKey;
    use keycard_apdu_core::ApduCommand;

    use super::*;

    #[test]
    fn test_load_key_p1() {
        let keypair = Keypair::from_private_key(SecretKey::from_slice(&[0x11; 32]).unwrap());
        assert_eq!(LoadKeyCommand::with_keypair(&keypair).unwrap().p1(), P1_EC);
        let extended = keypair.with_chain_code([0x01; 32]);
        assert_eq!(
            LoadKeyCommand::with_keypair(&extended).unwrap().p1(),
            P1_EXTENDED_EC
        );
        assert_eq!(LoadKeyCommand::with_seed(&[0x00; 64]).p1(), P1_SEED);
    }

    #[test]
    fn test_key_uid_response() {
        assert_eq!(LoadKeyCommand::parse_response_raw(&[0x90, 0x00]).unwrap(), None);
        let mut raw = vec![0x0A; 32];
        raw.extend_from_slice(&[0x90, 0x00]);
        assert_eq!(
            LoadKeyCommand::parse_response_raw(&raw).unwrap(),
            Some([0x0A; 32])
        );
        assert!(LoadKeyCommand::parse_response_raw(&[0x01, 0x90, 0x00]).is_err());
    }
}
