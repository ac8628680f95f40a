use bytes::{BufMut, Bytes, BytesMut};
use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    Error, Result,
    constants::{CLA_GP, ins},
};

keycard_command! {
    /// SET NDEF command, replacing the NDEF record the card exposes over NFC
    SetNdefCommand {
        cla: CLA_GP,
        ins: ins::SET_NDEF,
        security: SecurityLevel::full(),
        success: (),
        parse: |response| {
            check_status(&response)
        }
    }
}

impl SetNdefCommand {
    /// Set the NDEF data, adding the 2-byte length prefix when it is missing
    pub fn with_ndef(ndef: &[u8]) -> Result<Self> {
        let has_prefix = ndef.len() >= 2
            && usize::from(u16::from_be_bytes([ndef[0], ndef[1]])) == ndef.len() - 2;
        if has_prefix {
            return Ok(Self::new(0x00, 0x00).with_data(Bytes::copy_from_slice(ndef)));
        }

        let len = u16::try_from(ndef.len()).map_err(|_| Error::InvalidData("NDEF data too long"))?;
        let mut data = BytesMut::with_capacity(ndef.len() + 2);
        data.put_u16(len);
        data.put_slice(ndef);
        Ok(Self::new(0x00, 0x00).with_data(data.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use keycard_apdu_core::ApduCommand;

    use super::*;

    #[test]
    fn test_prefix_added() {
        let command = SetNdefCommand::with_ndef(&[0xD1, 0x01, 0x02]).unwrap();
        assert_eq!(command.data(), &[0x00, 0x03, 0xD1, 0x01, 0x02]);
    }

    #[test]
    fn test_prefix_kept() {
        let command = SetNdefCommand::with_ndef(&[0x00, 0x02, 0xAB, 0xCD]).unwrap();
        assert_eq!(command.data(), &[0x00, 0x02, 0xAB, 0xCD]);
    }
}
