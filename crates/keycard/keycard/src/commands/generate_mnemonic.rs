use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    Error, Result,
    constants::{CLA_GP, ins},
};

keycard_command! {
    /// GENERATE MNEMONIC command, answered with BIP39 word indexes
    GenerateMnemonicCommand {
        cla: CLA_GP,
        ins: ins::GENERATE_MNEMONIC,
        security: SecurityLevel::enc_mac(),
        success: Vec<u16>,
        parse: |response| {
            check_status(&response)?;
            let payload = response.payload();
            if payload.len() % 2 != 0 {
                return Err(Error::InvalidData("Odd mnemonic response length"));
            }
            Ok(payload
                .chunks_exact(2)
                .map(|word| u16::from_be_bytes([word[0], word[1]]))
                .collect())
        }
    }
}

impl GenerateMnemonicCommand {
    /// Mnemonic with a checksum of `checksum_size` bits (4 to 8, 12 to 24 words)
    pub fn with_checksum_size(checksum_size: u8) -> Result<Self> {
        if !(4..=8).contains(&checksum_size) {
            return Err(Error::InvalidData("Checksum size must be between 4 and 8"));
        }
        Ok(Self::new(checksum_size, 0x00))
    }
}

#[cfg(test)]
mod tests {
    use keycard_apdu_core::ApduCommand;

    use super::*;

    #[test]
    fn test_checksum_size_bounds() {
        assert!(GenerateMnemonicCommand::with_checksum_size(3).is_err());
        assert!(GenerateMnemonicCommand::with_checksum_size(9).is_err());
        assert_eq!(GenerateMnemonicCommand::with_checksum_size(4).unwrap().p1(), 4);
    }

    #[test]
    fn test_word_indexes() {
        let words = GenerateMnemonicCommand::parse_response_raw(&[0x07, 0xFF, 0x00, 0x01, 0x90, 0x00])
            .unwrap();
        assert_eq!(words, vec![2047, 1]);
        assert!(GenerateMnemonicCommand::parse_response_raw(&[0x07, 0x90, 0x00]).is_err());
    }
}
