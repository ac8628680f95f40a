use bytes::{BufMut, Bytes, BytesMut};
use keycard_apdu_core::SecurityLevel;

use super::check_status;
use crate::{
    Error,
    constants::{CLA_GP, ins},
    pairing::PairingSecret,
};

const P1_CHANGE_PIN: u8 = 0x00;
const P1_CHANGE_PUK: u8 = 0x01;
const P1_CHANGE_PAIRING_SECRET: u8 = 0x02;

keycard_command! {
    /// VERIFY PIN command
    VerifyPinCommand {
        cla: CLA_GP,
        ins: ins::VERIFY_PIN,
        security: SecurityLevel::enc_mac(),
        success: (),
        parse: |response| {
            if response.is_success() {
                Ok(())
            } else {
                Err(Error::from_verification_status(response.status()))
            }
        }
    }
}

impl VerifyPinCommand {
    /// Verify `pin`
    pub fn with_pin(pin: &str) -> Self {
        Self::new(0x00, 0x00).with_data(Bytes::copy_from_slice(pin.as_bytes()))
    }
}

keycard_command! {
    /// CHANGE PIN command, also used for the PUK and the pairing secret
    ChangePinCommand {
        cla: CLA_GP,
        ins: ins::CHANGE_PIN,
        security: SecurityLevel::full(),
        success: (),
        parse: |response| {
            check_status(&response)
        }
    }
}

impl ChangePinCommand {
    /// Change the PIN
    pub fn with_pin(pin: &str) -> Self {
        Self::new(P1_CHANGE_PIN, 0x00).with_data(Bytes::copy_from_slice(pin.as_bytes()))
    }

    /// Change the PUK
    pub fn with_puk(puk: &str) -> Self {
        Self::new(P1_CHANGE_PUK, 0x00).with_data(Bytes::copy_from_slice(puk.as_bytes()))
    }

    /// Change the pairing secret
    pub fn with_pairing_secret(secret: &PairingSecret) -> Self {
        Self::new(P1_CHANGE_PAIRING_SECRET, 0x00)
            .with_data(Bytes::copy_from_slice(secret.as_bytes()))
    }
}

keycard_command! {
    /// UNBLOCK PIN command: PUK followed by the new PIN
    UnblockPinCommand {
        cla: CLA_GP,
        ins: ins::UNBLOCK_PIN,
        security: SecurityLevel::enc_mac(),
        success: (),
        parse: |response| {
            if response.is_success() {
                Ok(())
            } else {
                Err(Error::from_verification_status(response.status()))
            }
        }
    }
}

impl UnblockPinCommand {
    /// Unblock with `puk` and set `new_pin`
    pub fn with_puk_and_pin(puk: &str, new_pin: &str) -> Self {
        let mut data = BytesMut::with_capacity(puk.len() + new_pin.len());
        data.put_slice(puk.as_bytes());
        data.put_slice(new_pin.as_bytes());
        Self::new(0x00, 0x00).with_data(data.freeze())
    }
}
