//! Keycard command set on top of an established session
//!
//! Each method checks the capability the applet must advertise, builds the
//! typed command and hands it to [`KeycardSession::execute`], which enforces
//! the channel and PIN preconditions.

use bytes::Bytes;
use keycard_apdu_core::{CardTransport, SecurityLevel};
use tracing::debug;

use crate::{
    Result,
    commands::{
        ChangePinCommand, DeriveKeyCommand, DuplicateKeyCommand, ExportKeyCommand,
        GenerateKeyCommand, GenerateMnemonicCommand, GetApplicationStatusCommand,
        GetKeyPathCommand, InitCommand, LoadKeyCommand, RemoveKeyCommand, SetNdefCommand,
        SetPinlessPathCommand, SignCommand,
    },
    constants::SECRET_LENGTH,
    crypto::CryptoProvider,
    pairing::PairingSecret,
    secrets::{Secrets, validate_pin, validate_puk},
    session::KeycardSession,
    types::{ApplicationStatus, Capability, ExportedKey, KeyPath, Keypair, RecoverableSignature},
};

impl<T: CardTransport, C: CryptoProvider> KeycardSession<T, C> {
    /// Initialize a blank card with `secrets`
    ///
    /// Select again afterwards to read the full application info.
    pub fn init(&mut self, secrets: &Secrets) -> Result<()> {
        self.require_capability(Capability::CredentialsManagement)?;
        let payload = self.one_shot_encrypt(&secrets.to_bytes())?;
        self.execute(&InitCommand::with_encrypted_payload(payload))?;
        debug!("Card initialized");
        Ok(())
    }

    /// PIN and PUK retry counters and whether a key is loaded
    pub fn get_status(&mut self) -> Result<ApplicationStatus> {
        let status = self.execute(&GetApplicationStatusCommand::default())?;
        self.record_pin_retries(status.pin_retry_count);
        Ok(status)
    }

    /// Path of the current key
    pub fn get_key_path(&mut self) -> Result<KeyPath> {
        self.execute(&GetKeyPathCommand::default())
    }

    /// Change the PIN
    pub fn change_pin(&mut self, pin: &str) -> Result<()> {
        self.require_capability(Capability::CredentialsManagement)?;
        validate_pin(pin)?;
        self.execute(&ChangePinCommand::with_pin(pin))
    }

    /// Change the PUK
    pub fn change_puk(&mut self, puk: &str) -> Result<()> {
        self.require_capability(Capability::CredentialsManagement)?;
        validate_puk(puk)?;
        self.execute(&ChangePinCommand::with_puk(puk))
    }

    /// Change the pairing secret; existing pairings stay valid
    pub fn change_pairing_secret(&mut self, secret: &PairingSecret) -> Result<()> {
        self.require_capability(Capability::CredentialsManagement)?;
        self.execute(&ChangePinCommand::with_pairing_secret(secret))
    }

    /// Load an EC keypair, optionally with a chain code
    ///
    /// Returns the new key UID.
    pub fn load_key(&mut self, keypair: &Keypair) -> Result<Option<[u8; 32]>> {
        self.require_capability(Capability::KeyManagement)?;
        self.execute(&LoadKeyCommand::with_keypair(keypair)?)
    }

    /// Load a 64-byte BIP39 seed as the master key
    pub fn load_seed(&mut self, seed: &[u8; 64]) -> Result<Option<[u8; 32]>> {
        self.require_capability(Capability::KeyManagement)?;
        self.execute(&LoadKeyCommand::with_seed(seed))
    }

    /// Derive a key and make it current
    pub fn derive_key(&mut self, path: &KeyPath) -> Result<()> {
        self.require_capability(Capability::KeyManagement)?;
        self.execute(&DeriveKeyCommand::with_path(path))
    }

    /// Have the card generate mnemonic word indexes
    pub fn generate_mnemonic(&mut self, checksum_size: u8) -> Result<Vec<u16>> {
        self.require_capability(Capability::KeyManagement)?;
        self.execute(&GenerateMnemonicCommand::with_checksum_size(checksum_size)?)
    }

    /// Generate a new master key on the card, returning its key UID
    pub fn generate_key(&mut self) -> Result<[u8; 32]> {
        self.require_capability(Capability::KeyManagement)?;
        self.execute(&GenerateKeyCommand::default())
    }

    /// Remove the master key
    pub fn remove_key(&mut self) -> Result<()> {
        self.require_capability(Capability::KeyManagement)?;
        self.execute(&RemoveKeyCommand::default())
    }

    /// Sign a 32-byte hash with the current key
    pub fn sign(&mut self, hash: &[u8; 32]) -> Result<RecoverableSignature> {
        let response = self.execute(&SignCommand::with_current_key(hash))?;
        RecoverableSignature::from_response(hash, &response)
    }

    /// Sign with the key at `path`, optionally making it current
    pub fn sign_with_path(
        &mut self,
        hash: &[u8; 32],
        path: &KeyPath,
        make_current: bool,
    ) -> Result<RecoverableSignature> {
        let response = self.execute(&SignCommand::with_path(hash, path, make_current))?;
        RecoverableSignature::from_response(hash, &response)
    }

    /// Sign with the PIN-less path, no PIN or channel needed
    ///
    /// Goes through the channel when one is open, since the applet then
    /// expects every command protected.
    pub fn sign_pinless(&mut self, hash: &[u8; 32]) -> Result<RecoverableSignature> {
        let mut command = SignCommand::pinless(hash);
        if self.is_open() {
            command = command.with_security_level(SecurityLevel::enc_mac());
        }
        let response = self.execute(&command)?;
        RecoverableSignature::from_response(hash, &response)
    }

    /// Set the path usable for PIN-less signing; `None` clears it
    pub fn set_pinless_path(&mut self, path: Option<&KeyPath>) -> Result<()> {
        let command = match path {
            Some(path) => SetPinlessPathCommand::with_path(path)?,
            None => SetPinlessPathCommand::clear(),
        };
        self.execute(&command)
    }

    /// Export the current key
    pub fn export_key(&mut self, public_only: bool) -> Result<ExportedKey> {
        self.execute(&ExportKeyCommand::current(public_only))
    }

    /// Export the key at `path`, optionally making it current
    pub fn export_key_with_path(
        &mut self,
        path: &KeyPath,
        make_current: bool,
        public_only: bool,
    ) -> Result<ExportedKey> {
        self.execute(&ExportKeyCommand::with_path(path, make_current, public_only))
    }

    /// Store an NDEF record
    pub fn set_ndef(&mut self, ndef: &[u8]) -> Result<()> {
        self.require_capability(Capability::Ndef)?;
        self.execute(&SetNdefCommand::with_ndef(ndef)?)
    }

    /// Start a duplication session expecting `entropy_count` contributions
    pub fn duplicate_key_start(
        &mut self,
        entropy_count: u8,
        first_entropy: &[u8; SECRET_LENGTH],
    ) -> Result<()> {
        self.require_capability(Capability::KeyManagement)?;
        self.execute(&DuplicateKeyCommand::start(entropy_count, first_entropy))?;
        Ok(())
    }

    /// Contribute entropy to a running duplication session
    ///
    /// Sent without a secure channel, one-shot encrypted.
    pub fn duplicate_key_add_entropy(&mut self, entropy: &[u8; SECRET_LENGTH]) -> Result<()> {
        self.require_capability(Capability::KeyManagement)?;
        let encrypted = self.one_shot_encrypt(entropy)?;
        self.execute(&DuplicateKeyCommand::add_entropy(encrypted))?;
        Ok(())
    }

    /// Export the master key encrypted under the duplication key
    pub fn duplicate_key_export(&mut self) -> Result<Bytes> {
        self.require_capability(Capability::KeyManagement)?;
        self.execute(&DuplicateKeyCommand::export())
    }

    /// Import a key exported by another card, returning its key UID
    pub fn duplicate_key_import(&mut self, exported: &[u8]) -> Result<Bytes> {
        self.require_capability(Capability::KeyManagement)?;
        self.execute(&DuplicateKeyCommand::import(exported))
    }
}
