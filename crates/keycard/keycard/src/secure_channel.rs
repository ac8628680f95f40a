//! Keycard secure channel: session key derivation and the protected transport
//!
//! Every protected exchange consumes the current [`ChainingValue`] and yields
//! the next one. The functions here are pure apart from the injected
//! [`CryptoProvider`]; [`crate::KeycardSession`] owns the state and threads
//! the chaining value through them.

use bytes::{BufMut, Bytes, BytesMut};
use keycard_apdu_core::{Command, Response};
use subtle::ConstantTimeEq;
use tracing::{trace, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    Error, Result,
    config::ChainBinding,
    constants::{BLOCK_SIZE, PAYLOAD_MAX_SIZE, SECRET_LENGTH},
    crypto::{Block, CryptoProvider, Key, SharedSecret},
};

/// Length of the OPEN SECURE CHANNEL response: salt followed by the initial chaining value
pub(crate) const OPEN_RESPONSE_LENGTH: usize = SECRET_LENGTH + BLOCK_SIZE;

/// Chaining value linking each protected message to the previous one
///
/// Initialized from the OPEN SECURE CHANNEL response, then replaced by the
/// MAC of every command and response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainingValue(Block);

impl ChainingValue {
    /// Wrap a raw block
    pub const fn new(block: Block) -> Self {
        Self(block)
    }

    /// Raw block
    pub const fn as_bytes(&self) -> &Block {
        &self.0
    }
}

/// Session encryption and MAC keys
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    enc: Key,
    mac: Key,
    #[zeroize(skip)]
    binding: ChainBinding,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    /// Create a key set from raw keys
    pub const fn from_raw(enc: Key, mac: Key, binding: ChainBinding) -> Self {
        Self { enc, mac, binding }
    }

    /// Derive session keys from the shared secret, pairing key, and salt.
    ///
    /// Keys are derived in accordance with the Keycard Secure Channel protocol:
    /// (K(E) | K(M)) = H(shared_secret | pairing_key | salt)
    ///
    /// # Arguments
    ///
    /// * `crypto` - Provider of the SHA-512 primitive.
    /// * `secret` - The ECDH shared secret.
    /// * `pairing_key` - The pairing key.
    /// * `salt` - The first 32 bytes of the OPEN SECURE CHANNEL response.
    /// * `binding` - The MAC chaining mode for this session.
    pub fn derive<C: CryptoProvider + ?Sized>(
        crypto: &C,
        secret: &SharedSecret,
        pairing_key: &Key,
        salt: &[u8; SECRET_LENGTH],
        binding: ChainBinding,
    ) -> Self {
        let mut digest = crypto.sha512(&[secret.as_bytes(), pairing_key, salt]);
        let mut enc = [0u8; SECRET_LENGTH];
        let mut mac = [0u8; SECRET_LENGTH];
        enc.copy_from_slice(&digest[..SECRET_LENGTH]);
        mac.copy_from_slice(&digest[SECRET_LENGTH..]);
        digest.zeroize();
        Self { enc, mac, binding }
    }

    /// Derive keys and the initial chaining value from an OPEN SECURE CHANNEL response
    pub fn from_open_response<C: CryptoProvider + ?Sized>(
        crypto: &C,
        secret: &SharedSecret,
        pairing_key: &Key,
        response: &[u8],
        binding: ChainBinding,
    ) -> Result<(Self, ChainingValue)> {
        let (salt, iv) = response
            .split_first_chunk::<SECRET_LENGTH>()
            .filter(|_| response.len() == OPEN_RESPONSE_LENGTH)
            .ok_or(Error::Handshake("invalid open secure channel response length"))?;
        let iv: Block = iv
            .try_into()
            .map_err(|_| Error::Handshake("invalid open secure channel response length"))?;
        Ok((
            Self::derive(crypto, secret, pairing_key, salt, binding),
            ChainingValue(iv),
        ))
    }

    /// MAC chaining mode
    pub const fn binding(&self) -> ChainBinding {
        self.binding
    }

    fn mac<C: CryptoProvider + ?Sized>(
        &self,
        crypto: &C,
        chaining: &ChainingValue,
        meta: &Block,
        ciphertext: &[u8],
    ) -> Block {
        let mut input = BytesMut::with_capacity(2 * BLOCK_SIZE + ciphertext.len());
        if self.binding == ChainBinding::Bound {
            input.put_slice(&chaining.0);
        }
        input.put_slice(meta);
        input.put_slice(ciphertext);
        crypto.cbc_mac(&self.mac, &input)
    }

    /// Protect a command
    ///
    /// Encrypts `plaintext` under the current chaining value, MACs the header
    /// and ciphertext and returns the command carrying `MAC || ciphertext`
    /// together with the next chaining value (the MAC).
    #[allow(clippy::too_many_arguments)]
    pub fn wrap<C: CryptoProvider + ?Sized>(
        &self,
        crypto: &C,
        chaining: &ChainingValue,
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        plaintext: &[u8],
    ) -> Result<(Command, ChainingValue)> {
        if plaintext.len() > PAYLOAD_MAX_SIZE {
            return Err(Error::InvalidData("Payload too long for the secure channel"));
        }

        let ciphertext = crypto.aes_cbc_encrypt(&self.enc, &chaining.0, plaintext);
        let lc = u8::try_from(ciphertext.len() + BLOCK_SIZE)
            .map_err(|_| Error::InvalidData("Payload too long for the secure channel"))?;

        let mut meta = [0u8; BLOCK_SIZE];
        meta[..5].copy_from_slice(&[cla, ins, p1, p2, lc]);
        let mac = self.mac(crypto, chaining, &meta, &ciphertext);

        let mut data = BytesMut::with_capacity(BLOCK_SIZE + ciphertext.len());
        data.put_slice(&mac);
        data.put_slice(&ciphertext);
        trace!(ins, payload = %hex::encode(&data), "Wrapped command");

        Ok((
            Command::new_with_data(cla, ins, p1, p2, data.freeze()),
            ChainingValue(mac),
        ))
    }

    /// Verify and decrypt a successful protected response
    ///
    /// The MAC is checked in constant time before anything is decrypted. The
    /// returned plaintext is the inner response, with its own status word.
    pub fn unwrap<C: CryptoProvider + ?Sized>(
        &self,
        crypto: &C,
        chaining: &ChainingValue,
        response: &Response,
    ) -> Result<(Bytes, ChainingValue)> {
        let data = response.payload();
        trace!(payload = %hex::encode(data), "Unwrapping response");

        let Some((received_mac, ciphertext)) = data.split_first_chunk::<BLOCK_SIZE>() else {
            warn!(len = data.len(), "Protected response too short");
            return Err(Error::Integrity("invalid MAC"));
        };
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            warn!(len = data.len(), "Protected response is not block aligned");
            return Err(Error::Integrity("invalid MAC"));
        }
        let len = u8::try_from(data.len()).map_err(|_| Error::Integrity("invalid MAC"))?;

        let mut meta = [0u8; BLOCK_SIZE];
        meta[0] = len;
        let expected = self.mac(crypto, chaining, &meta, ciphertext);

        if !bool::from(expected.as_slice().ct_eq(received_mac.as_slice())) {
            warn!("MAC verification failed for secure channel response");
            return Err(Error::Integrity("invalid MAC"));
        }

        let plaintext = crypto.aes_cbc_decrypt(&self.enc, &chaining.0, ciphertext)?;
        Ok((Bytes::from(plaintext), ChainingValue(expected)))
    }

    /// Card side of [`wrap`](Self::wrap): verify and decrypt a protected command
    #[cfg(test)]
    pub(crate) fn open_command<C: CryptoProvider + ?Sized>(
        &self,
        crypto: &C,
        chaining: &ChainingValue,
        command: &Command,
    ) -> Result<(Bytes, ChainingValue)> {
        let Some((received_mac, ciphertext)) = command.data.split_first_chunk::<BLOCK_SIZE>()
        else {
            return Err(Error::Integrity("invalid MAC"));
        };
        let mut meta = [0u8; BLOCK_SIZE];
        meta[..5].copy_from_slice(&[
            command.cla,
            command.ins,
            command.p1,
            command.p2,
            command.data.len() as u8,
        ]);
        let expected = self.mac(crypto, chaining, &meta, ciphertext);
        if !bool::from(expected.as_slice().ct_eq(received_mac.as_slice())) {
            return Err(Error::Integrity("invalid MAC"));
        }
        let plaintext = crypto.aes_cbc_decrypt(&self.enc, &chaining.0, ciphertext)?;
        Ok((Bytes::from(plaintext), ChainingValue(expected)))
    }

    /// Card side of [`unwrap`](Self::unwrap): protect an inner response
    #[cfg(test)]
    pub(crate) fn seal_response<C: CryptoProvider + ?Sized>(
        &self,
        crypto: &C,
        chaining: &ChainingValue,
        inner: &[u8],
    ) -> (Response, ChainingValue) {
        let ciphertext = crypto.aes_cbc_encrypt(&self.enc, &chaining.0, inner);
        let mut meta = [0u8; BLOCK_SIZE];
        meta[0] = (ciphertext.len() + BLOCK_SIZE) as u8;
        let mac = self.mac(crypto, chaining, &meta, &ciphertext);

        let mut data = BytesMut::with_capacity(BLOCK_SIZE + ciphertext.len());
        data.put_slice(&mac);
        data.put_slice(&ciphertext);
        (Response::success(data.freeze()), ChainingValue(mac))
    }
}

/// Encrypt a payload for a card without an open secure channel
///
/// Used by INIT and by the entropy step of key duplication. The key is the raw
/// ECDH shared secret and the output carries the host public key so the card
/// can compute the same secret:
/// `[65] [host public key (65)] [IV (16)] [ciphertext]`.
pub fn one_shot_encrypt<C: CryptoProvider + ?Sized>(
    crypto: &mut C,
    secret: &SharedSecret,
    host_public_key: &[u8; 65],
    plaintext: &[u8],
) -> Bytes {
    let iv = crypto.random_block();
    let ciphertext = crypto.aes_cbc_encrypt(secret.as_bytes(), &iv, plaintext);

    let mut out = BytesMut::with_capacity(1 + host_public_key.len() + BLOCK_SIZE + ciphertext.len());
    out.put_u8(host_public_key.len() as u8);
    out.put_slice(host_public_key);
    out.put_slice(&iv);
    out.put_slice(&ciphertext);
    out.freeze()
}
