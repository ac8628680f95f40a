use base64::prelude::*;
use bytes::{BufMut, Bytes, BytesMut};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result, constants::SECRET_LENGTH, crypto::CryptoProvider, pairing::PairingSecret};

const PIN_LENGTH: usize = 6;
const PUK_LENGTH: usize = 12;
const MAX_PIN_NUMBER: u64 = 1_000_000;
const MAX_PUK_NUMBER: u64 = 1_000_000_000_000;
const PAIRING_PASSWORD_ENTROPY: usize = 12;

/// Fail unless `pin` is exactly six ASCII digits
pub fn validate_pin(pin: &str) -> Result<()> {
    validate_digits(pin, PIN_LENGTH, "PIN must be exactly 6 digits")
}

/// Fail unless `puk` is exactly twelve ASCII digits
pub fn validate_puk(puk: &str) -> Result<()> {
    validate_digits(puk, PUK_LENGTH, "PUK must be exactly 12 digits")
}

fn validate_digits(value: &str, length: usize, message: &'static str) -> Result<()> {
    if value.len() == length && value.bytes().all(|byte| byte.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::InvalidData(message))
    }
}

/// Credentials written to a blank card by INIT
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secrets {
    pin: String,
    puk: String,
    pairing_password: Option<String>,
    pairing_secret: PairingSecret,
}

impl Secrets {
    /// Secrets from a PIN, a PUK and a pairing password
    pub fn new(pin: &str, puk: &str, pairing_password: &str) -> Result<Self> {
        validate_pin(pin)?;
        validate_puk(puk)?;
        Ok(Self {
            pin: pin.to_string(),
            puk: puk.to_string(),
            pairing_password: Some(pairing_password.to_string()),
            pairing_secret: PairingSecret::from_password(pairing_password),
        })
    }

    /// Secrets with a raw pairing secret instead of a password
    pub fn with_pairing_secret(pin: &str, puk: &str, pairing_secret: PairingSecret) -> Result<Self> {
        validate_pin(pin)?;
        validate_puk(puk)?;
        Ok(Self {
            pin: pin.to_string(),
            puk: puk.to_string(),
            pairing_password: None,
            pairing_secret,
        })
    }

    /// Random PIN, PUK and pairing password
    pub fn generate<C: CryptoProvider + ?Sized>(crypto: &mut C) -> Self {
        let pin = random_below(crypto, MAX_PIN_NUMBER);
        let puk = random_below(crypto, MAX_PUK_NUMBER);

        let mut entropy = [0u8; PAIRING_PASSWORD_ENTROPY];
        crypto.fill_random(&mut entropy);
        let pairing_password = BASE64_URL_SAFE_NO_PAD.encode(entropy);
        entropy.zeroize();

        Self {
            pin: format!("{pin:06}"),
            puk: format!("{puk:012}"),
            pairing_secret: PairingSecret::from_password(&pairing_password),
            pairing_password: Some(pairing_password),
        }
    }

    /// The PIN
    pub fn pin(&self) -> &str {
        &self.pin
    }

    /// The PUK
    pub fn puk(&self) -> &str {
        &self.puk
    }

    /// The pairing password, unless the secret was given raw
    pub fn pairing_password(&self) -> Option<&str> {
        self.pairing_password.as_deref()
    }

    /// The pairing secret clients pair with
    pub const fn pairing_secret(&self) -> &PairingSecret {
        &self.pairing_secret
    }

    /// INIT payload: PIN, PUK, then the 32-byte pairing secret
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(PIN_LENGTH + PUK_LENGTH + SECRET_LENGTH);
        buffer.put_slice(self.pin.as_bytes());
        buffer.put_slice(self.puk.as_bytes());
        buffer.put_slice(self.pairing_secret.as_bytes());
        buffer.freeze()
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

/// Uniform value in `0..bound` by rejection sampling
fn random_below<C: CryptoProvider + ?Sized>(crypto: &mut C, bound: u64) -> u64 {
    let zone = u64::MAX - (u64::MAX % bound);
    loop {
        let mut bytes = [0u8; 8];
        crypto.fill_random(&mut bytes);
        let value = u64::from_be_bytes(bytes);
        if value < zone {
            return value % bound;
        }
    }
}
