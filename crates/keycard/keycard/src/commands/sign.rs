use bytes::{BufMut, Bytes, BytesMut};
use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    constants::{CLA_GP, ins},
    types::KeyPath,
};

const P1_CURRENT_KEY: u8 = 0x00;
const P1_DERIVE: u8 = 0x01;
const P1_DERIVE_AND_MAKE_CURRENT: u8 = 0x02;
const P1_PINLESS: u8 = 0x03;

keycard_command! {
    /// SIGN command, answered with a signature template
    ///
    /// The template is returned raw; [`crate::types::RecoverableSignature`]
    /// parses it against the signed hash.
    SignCommand {
        cla: CLA_GP,
        ins: ins::SIGN,
        security: SecurityLevel::full(),
        success: Bytes,
        parse: |response| {
            check_status(&response)?;
            Ok(response.into_payload())
        }
    }
}

impl SignCommand {
    /// Sign with the current key
    pub fn with_current_key(hash: &[u8; 32]) -> Self {
        Self::new(P1_CURRENT_KEY, 0x00).with_data(Bytes::copy_from_slice(hash))
    }

    /// Sign with the key at `path`, optionally making it the current key
    pub fn with_path(hash: &[u8; 32], path: &KeyPath, make_current: bool) -> Self {
        let derive = if make_current {
            P1_DERIVE_AND_MAKE_CURRENT
        } else {
            P1_DERIVE
        };
        let path_bytes = path.to_bytes();
        let mut data = BytesMut::with_capacity(hash.len() + path_bytes.len());
        data.put_slice(hash);
        data.put_slice(&path_bytes);
        Self::new(path.source() as u8 | derive, 0x00).with_data(data.freeze())
    }

    /// Sign with the PIN-less path key, usable without a secure channel
    pub fn pinless(hash: &[u8; 32]) -> Self {
        Self::new(P1_PINLESS, 0x00)
            .with_data(Bytes::copy_from_slice(hash))
            .with_security_level(SecurityLevel::none())
    }
}

#[cfg(test)]
mod tests {
    use keycard_apdu_core::ApduCommand;

    use super::*;

    #[test]
    fn test_sign_with_master_path() {
        let path: KeyPath = "m/44'/60'/0'/0/0".parse().unwrap();
        let command = SignCommand::with_path(&[0x11; 32], &path, false);
        assert_eq!(command.p1(), 0x01);
        assert_eq!(command.data().len(), 32 + 20);
        assert_eq!(&command.data()[..32], &[0x11; 32]);

        let command = SignCommand::with_path(&[0x11; 32], &"../0".parse().unwrap(), true);
        assert_eq!(command.p1(), 0x42);
    }

    #[test]
    fn test_pinless() {
        let command = SignCommand::pinless(&[0x22; 32]);
        assert_eq!(command.p1(), P1_PINLESS);
        assert!(command.required_security_level().is_none());
        assert_eq!(
            SignCommand::with_current_key(&[0x22; 32]).required_security_level(),
            SecurityLevel::full()
        );
    }
}
