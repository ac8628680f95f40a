//! Cryptographic capability used by the pairing engine and the secure channel
//!
//! The protocol code never reaches for a global RNG or cipher implementation.
//! Everything goes through a [`CryptoProvider`] handed to the session at
//! construction, which keeps the protocol deterministic under test.

use aes::Aes256;
use cbc_mac::{CbcMac, Mac};
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Iso7816};
use k256::{PublicKey, SecretKey};
use rand::{CryptoRng, RngCore, SeedableRng, rngs::StdRng};
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{
    Error, Result,
    constants::{BLOCK_SIZE, SECRET_LENGTH},
};

type Encryptor = cbc::Encryptor<Aes256>;
type Decryptor = cbc::Decryptor<Aes256>;

/// 256-bit symmetric key
pub type Key = [u8; SECRET_LENGTH];

/// One AES block: IVs, MACs and chaining values
pub type Block = [u8; BLOCK_SIZE];

/// ECDH output between the host's ephemeral key and the card's public key
///
/// Only the x-coordinate is kept. It is wiped when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(Key);

impl SharedSecret {
    /// Wrap raw secret bytes
    pub const fn from_bytes(bytes: Key) -> Self {
        Self(bytes)
    }

    /// Raw secret bytes
    pub const fn as_bytes(&self) -> &Key {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Cryptographic primitives the secure channel is built from
///
/// Implementations must be deterministic apart from [`fill_random`](Self::fill_random).
pub trait CryptoProvider {
    /// Fill `dest` with cryptographically secure random bytes
    fn fill_random(&mut self, dest: &mut [u8]);

    /// Generate an ephemeral secp256k1 private key
    fn generate_secret_key(&mut self) -> SecretKey {
        loop {
            let mut candidate = Zeroizing::new([0u8; SECRET_LENGTH]);
            self.fill_random(candidate.as_mut());
            // Zero and values above the group order are rejected, retry
            if let Ok(key) = SecretKey::from_slice(candidate.as_ref()) {
                return key;
            }
        }
    }

    /// Draw a random 32-byte value
    fn random_secret(&mut self) -> Key {
        let mut out = [0u8; SECRET_LENGTH];
        self.fill_random(&mut out);
        out
    }

    /// Draw a random AES block
    fn random_block(&mut self) -> Block {
        let mut out = [0u8; BLOCK_SIZE];
        self.fill_random(&mut out);
        out
    }

    /// ECDH between a private key and a peer public key
    fn ecdh(&self, private: &SecretKey, public: &PublicKey) -> SharedSecret;

    /// SHA-256 over the concatenation of `parts`
    fn sha256(&self, parts: &[&[u8]]) -> Key;

    /// SHA-512 over the concatenation of `parts`
    fn sha512(&self, parts: &[&[u8]]) -> [u8; 64];

    /// AES-256-CBC encryption with ISO 7816-4 padding
    fn aes_cbc_encrypt(&self, key: &Key, iv: &Block, plaintext: &[u8]) -> Vec<u8>;

    /// AES-256-CBC decryption, removing ISO 7816-4 padding
    fn aes_cbc_decrypt(&self, key: &Key, iv: &Block, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// AES-256 CBC-MAC with a zero IV over block aligned `data`
    fn cbc_mac(&self, key: &Key, data: &[u8]) -> Block;
}

/// [`CryptoProvider`] backed by the RustCrypto crates
///
/// The RNG is injectable; [`DefaultCrypto::new`] seeds a ChaCha based
/// [`StdRng`] from the operating system.
#[derive(Debug, Clone)]
pub struct DefaultCrypto<R = StdRng> {
    rng: R,
}

impl DefaultCrypto {
    /// Create a provider seeded from the operating system
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Default for DefaultCrypto {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore + CryptoRng> DefaultCrypto<R> {
    /// Create a provider drawing randomness from `rng`
    pub const fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngCore + CryptoRng> CryptoProvider for DefaultCrypto<R> {
    fn fill_random(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest);
    }

    fn ecdh(&self, private: &SecretKey, public: &PublicKey) -> SharedSecret {
        let shared =
            k256::ecdh::diffie_hellman(private.to_nonzero_scalar(), public.as_affine());
        SharedSecret((*shared.raw_secret_bytes()).into())
    }

    fn sha256(&self, parts: &[&[u8]]) -> Key {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().into()
    }

    fn sha512(&self, parts: &[&[u8]]) -> [u8; 64] {
        let mut hasher = Sha512::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().into()
    }

    fn aes_cbc_encrypt(&self, key: &Key, iv: &Block, plaintext: &[u8]) -> Vec<u8> {
        Encryptor::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Iso7816>(plaintext)
    }

    fn aes_cbc_decrypt(&self, key: &Key, iv: &Block, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(Error::Integrity("ciphertext is not block aligned"));
        }
        Decryptor::new(key.into(), iv.into())
            .decrypt_padded_vec_mut::<Iso7816>(ciphertext)
            .map_err(|_| Error::Integrity("invalid padding"))
    }

    fn cbc_mac(&self, key: &Key, data: &[u8]) -> Block {
        debug_assert_eq!(data.len() % BLOCK_SIZE, 0);
        let mut mac = <CbcMac<Aes256> as Mac>::new(key.into());
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}
