//! Pairing: establishing a long-term pairing key with the card
//!
//! Both sides prove knowledge of the pairing secret through a
//! challenge-response exchange; the resulting pairing key is derived from the
//! secret and a salt chosen by the card.

use keycard_apdu_core::CardTransport;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    Error, Result,
    commands::{PairFinalStageCommand, PairFirstStageCommand, transmit},
    constants::SECRET_LENGTH,
    crypto::{CryptoProvider, Key},
    types::PairingInfo,
};

const PAIRING_PASSWORD_SALT: &[u8] = b"Keycard Pairing Password Salt";
const PAIRING_PASSWORD_ITERATIONS: u32 = 50_000;

/// The 32-byte secret shared between the card and its authorized clients
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PairingSecret(Key);

impl PairingSecret {
    /// Use raw secret bytes
    pub const fn from_bytes(bytes: Key) -> Self {
        Self(bytes)
    }

    /// Derive the secret from a pairing password
    ///
    /// The password is NFKD normalized, then stretched with
    /// PBKDF2-HMAC-SHA256 over a fixed salt.
    pub fn from_password(password: &str) -> Self {
        let mut normalized: String = password.nfkd().collect();
        let mut secret = [0u8; SECRET_LENGTH];
        pbkdf2_hmac::<Sha256>(
            normalized.as_bytes(),
            PAIRING_PASSWORD_SALT,
            PAIRING_PASSWORD_ITERATIONS,
            &mut secret,
        );
        normalized.zeroize();
        Self(secret)
    }

    /// Raw secret bytes
    pub const fn as_bytes(&self) -> &Key {
        &self.0
    }
}

impl std::fmt::Debug for PairingSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PairingSecret(..)")
    }
}

/// `SHA-256(secret || challenge)`, the proof each side sends the other
pub fn cryptogram<C: CryptoProvider + ?Sized>(
    crypto: &C,
    secret: &PairingSecret,
    challenge: &[u8; SECRET_LENGTH],
) -> Key {
    crypto.sha256(&[secret.as_bytes(), challenge])
}

/// Run the two PAIR steps and derive the pairing key
///
/// Fails with [`Error::Pairing`] when the card does not prove knowledge of
/// `secret`; no second step is sent in that case.
pub(crate) fn pair<T, C>(transport: &mut T, crypto: &mut C, secret: &PairingSecret) -> Result<PairingInfo>
where
    T: CardTransport + ?Sized,
    C: CryptoProvider + ?Sized,
{
    let client_challenge = crypto.random_secret();
    debug!("Sending first pairing step");
    let first = transmit(transport, &PairFirstStageCommand::with_challenge(&client_challenge))?;

    let expected = cryptogram(&*crypto, secret, &client_challenge);
    if !bool::from(expected.as_slice().ct_eq(first.cryptogram.as_slice())) {
        warn!("Card cryptogram does not match the pairing secret");
        return Err(Error::Pairing("invalid card cryptogram"));
    }

    let client_cryptogram = cryptogram(&*crypto, secret, &first.challenge);
    debug!("Sending final pairing step");
    let slot = transmit(
        transport,
        &PairFinalStageCommand::with_cryptogram(&client_cryptogram),
    )?;

    let key = crypto.sha256(&[secret.as_bytes(), &slot.salt]);
    debug!(index = slot.index, "Paired with card");
    Ok(PairingInfo::new(key, slot.index))
}
