//! Keycard session: applet selection, pairing and the secure channel
//!
//! A [`KeycardSession`] owns the transport and all per-card protocol state.
//! The ephemeral key pair is generated on every SELECT; pairing material is
//! either obtained through [`KeycardSession::pair`] or loaded with
//! [`KeycardSession::set_pairing`]; the session keys and the chaining value
//! exist only while the channel is open.

use std::fmt;

use bytes::Bytes;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use keycard_apdu_core::{
    ApduCommand, CardTransport, Command, Response, SecurityLevel,
    response::status::common::SECURITY_CONDITION_NOT_SATISFIED,
};
use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    commands::{
        MutuallyAuthenticateCommand, OpenSecureChannelCommand, SelectCommand, UnblockPinCommand,
        UnpairCommand, VerifyPinCommand, transmit,
    },
    config::KeycardConfig,
    crypto::{CryptoProvider, DefaultCrypto, SharedSecret},
    pairing::{self, PairingSecret},
    secure_channel::{self, ChainingValue, SessionKeys},
    types::{ApplicationInfo, Capability, PairingInfo},
};

/// Uncompressed SEC1 encoding of the host ephemeral public key
pub type HostPublicKey = [u8; 65];

/// Pairing and secure channel state of a session
#[derive(Debug, Default)]
pub enum ChannelState {
    /// No pairing key available
    #[default]
    Unpaired,
    /// Paired, channel closed
    Paired(PairingInfo),
    /// Channel open; every protected exchange advances `chaining`
    Open {
        /// Pairing the channel was opened with
        pairing: PairingInfo,
        /// Session keys
        keys: SessionKeys,
        /// MAC of the last protected message
        chaining: ChainingValue,
    },
}

impl ChannelState {
    /// Pairing info, if paired
    pub const fn pairing_info(&self) -> Option<&PairingInfo> {
        match self {
            Self::Unpaired => None,
            Self::Paired(pairing) | Self::Open { pairing, .. } => Some(pairing),
        }
    }

    /// Whether the secure channel is open
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Host half of the ECDH exchange, derived at SELECT
struct Ephemeral {
    public_key: HostPublicKey,
    secret: SharedSecret,
}

/// Host side of a Keycard session
pub struct KeycardSession<T, C = DefaultCrypto> {
    transport: T,
    crypto: C,
    config: KeycardConfig,
    application_info: Option<ApplicationInfo>,
    ephemeral: Option<Ephemeral>,
    state: ChannelState,
    security_level: SecurityLevel,
    /// Last PIN retry count reported by the card
    pin_retries: Option<u8>,
}

impl<T: CardTransport, C> fmt::Debug for KeycardSession<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycardSession")
            .field("transport", &self.transport)
            .field("state", &self.state)
            .field("security_level", &self.security_level)
            .field("pin_retries", &self.pin_retries)
            .finish_non_exhaustive()
    }
}

impl<T: CardTransport> KeycardSession<T> {
    /// Session with OS randomness and the default configuration
    pub fn with_transport(transport: T) -> Self {
        Self::new(transport, DefaultCrypto::new(), KeycardConfig::default())
    }
}

impl<T: CardTransport, C: CryptoProvider> KeycardSession<T, C> {
    /// Create a session; nothing is sent until [`select`](Self::select)
    pub fn new(transport: T, crypto: C, config: KeycardConfig) -> Self {
        Self {
            transport,
            crypto,
            config,
            application_info: None,
            ephemeral: None,
            state: ChannelState::Unpaired,
            security_level: SecurityLevel::none(),
            pin_retries: None,
        }
    }

    /// Underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport
    ///
    /// Bytes sent this way bypass the chaining state.
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the session, returning the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Session configuration
    pub const fn config(&self) -> &KeycardConfig {
        &self.config
    }

    /// Application info from the last SELECT
    pub const fn application_info(&self) -> Option<&ApplicationInfo> {
        self.application_info.as_ref()
    }

    /// Pairing and channel state
    pub const fn state(&self) -> &ChannelState {
        &self.state
    }

    /// Pairing info, if paired
    pub const fn pairing_info(&self) -> Option<&PairingInfo> {
        self.state.pairing_info()
    }

    /// Whether the secure channel is open
    pub const fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Protection currently provided: none, encrypted, or encrypted with a verified PIN
    pub const fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Last PIN retry count the card reported, if known
    pub const fn pin_retries(&self) -> Option<u8> {
        self.pin_retries
    }

    pub(crate) const fn record_pin_retries(&mut self, retries: u8) {
        self.pin_retries = Some(retries);
    }

    /// Host ephemeral public key sent to the card
    pub fn host_public_key(&self) -> Option<&HostPublicKey> {
        self.ephemeral.as_ref().map(|ephemeral| &ephemeral.public_key)
    }

    /// Fail unless the selected applet advertises `capability`
    pub(crate) fn require_capability(&self, capability: Capability) -> Result<()> {
        self.application_info
            .as_ref()
            .ok_or(Error::IllegalState("no applet selected"))?
            .capabilities
            .require(capability)
    }

    /// SELECT the applet and derive a fresh ephemeral key
    ///
    /// Any open channel is dropped and the PIN retry memory is cleared. A
    /// stored pairing survives so the channel can be reopened.
    pub fn select(&mut self) -> Result<ApplicationInfo> {
        self.close();
        self.application_info = None;
        self.ephemeral = None;
        self.pin_retries = None;

        let info = transmit(&mut self.transport, &SelectCommand::with_aid(&self.config.aid))?;

        if let Some(card_key) = &info.public_key {
            let secret_key = self.crypto.generate_secret_key();
            let public_key: HostPublicKey = secret_key
                .public_key()
                .to_encoded_point(false)
                .as_bytes()
                .try_into()
                .map_err(|_| Error::InvalidData("Invalid host public key encoding"))?;
            let secret = self.crypto.ecdh(&secret_key, card_key);
            self.ephemeral = Some(Ephemeral { public_key, secret });
        }

        debug!(
            initialized = info.is_initialized(),
            capabilities = %info.capabilities,
            "Selected Keycard applet"
        );
        self.application_info = Some(info.clone());
        Ok(info)
    }

    /// Encrypt `plaintext` for the card without a secure channel
    ///
    /// Uses the raw ECDH secret from the last SELECT, as INIT and the entropy
    /// step of key duplication require.
    pub fn one_shot_encrypt(&mut self, plaintext: &[u8]) -> Result<Bytes> {
        let Some(ephemeral) = &self.ephemeral else {
            return Err(Error::IllegalState("no secure channel key, select the applet first"));
        };
        Ok(secure_channel::one_shot_encrypt(
            &mut self.crypto,
            &ephemeral.secret,
            &ephemeral.public_key,
            plaintext,
        ))
    }

    /// Pair using `secret`
    ///
    /// On success the session is paired (channel closed). On failure the
    /// state is left unchanged.
    pub fn pair(&mut self, secret: &PairingSecret) -> Result<PairingInfo> {
        self.require_capability(Capability::SecureChannel)?;
        if self.is_open() {
            return Err(Error::IllegalState("secure channel already open"));
        }

        let info = pairing::pair(&mut self.transport, &mut self.crypto, secret)?;
        self.state = ChannelState::Paired(info.clone());
        Ok(info)
    }

    /// Use a previously stored pairing, closing any open channel
    pub fn set_pairing(&mut self, pairing: PairingInfo) {
        self.close();
        self.state = ChannelState::Paired(pairing);
    }

    /// Forget the pairing, closing any open channel
    pub fn clear_pairing(&mut self) {
        self.state = ChannelState::Unpaired;
        self.security_level = SecurityLevel::none();
    }

    /// Open the secure channel and mutually authenticate
    ///
    /// Requires a pairing and a prior SELECT. Every failure is reported as
    /// [`Error::Handshake`] unless the transport itself failed, and leaves
    /// the channel closed; the caller restarts from [`select`](Self::select).
    pub fn open_secure_channel(&mut self) -> Result<()> {
        if self.application_info.is_none() {
            return Err(Error::Handshake("applet not selected"));
        }
        self.require_capability(Capability::SecureChannel)?;
        self.close();
        let pairing = self
            .pairing_info()
            .cloned()
            .ok_or(Error::Handshake("not paired"))?;
        let Some(public_key) = self.ephemeral.as_ref().map(|ephemeral| ephemeral.public_key) else {
            return Err(Error::Handshake("card offers no secure channel key"));
        };

        debug!(index = pairing.index, "Opening secure channel");
        let response = transmit(
            &mut self.transport,
            &OpenSecureChannelCommand::with_pairing_index_and_pubkey(pairing.index, &public_key),
        )
        .map_err(|error| match error {
            Error::Communication(_) | Error::Handshake(_) => error,
            _ => Error::Handshake("malformed open secure channel response"),
        })?;

        let Some(ephemeral) = &self.ephemeral else {
            return Err(Error::Handshake("card offers no secure channel key"));
        };
        let (keys, chaining) = SessionKeys::from_open_response(
            &self.crypto,
            &ephemeral.secret,
            &pairing.key,
            &response,
            self.config.chain_binding,
        )?;
        self.state = ChannelState::Open {
            pairing,
            keys,
            chaining,
        };
        self.security_level = SecurityLevel::enc_mac();

        debug!("Starting mutual authentication");
        let challenge = self.crypto.random_secret();
        if let Err(error) = self.execute(&MutuallyAuthenticateCommand::with_challenge(&challenge)) {
            warn!(%error, "Mutual authentication failed");
            self.close();
            return Err(match error {
                Error::Communication(_) | Error::Handshake(_) => error,
                _ => Error::Handshake("mutual authentication failed"),
            });
        }

        info!("Secure channel opened");
        Ok(())
    }

    /// Close the channel locally, keeping the pairing
    pub fn close(&mut self) {
        self.state = match std::mem::take(&mut self.state) {
            ChannelState::Open { pairing, .. } => {
                debug!("Closing secure channel");
                ChannelState::Paired(pairing)
            }
            other => other,
        };
        self.security_level = SecurityLevel::none();
    }

    /// Protect a command for the open channel, advancing the chaining value
    ///
    /// Without an open channel the plaintext is passed through unchanged.
    pub fn wrap(&mut self, cla: u8, ins: u8, p1: u8, p2: u8, data: &[u8]) -> Result<Command> {
        match &mut self.state {
            ChannelState::Open { keys, chaining, .. } => {
                let (command, next) = keys.wrap(&self.crypto, chaining, cla, ins, p1, p2, data)?;
                *chaining = next;
                Ok(command)
            }
            _ => Ok(Command::try_new_with_data(
                cla,
                ins,
                p1,
                p2,
                Bytes::copy_from_slice(data),
            )?),
        }
    }

    /// Verify and decrypt a response to a command produced by [`wrap`](Self::wrap)
    ///
    /// Returns the inner response. Outer status 6982 closes the channel and
    /// the response is returned as received. Every other response must carry
    /// a valid MAC whatever its outer status; a missing or wrong MAC or a
    /// malformed inner response closes the channel.
    pub fn unwrap(&mut self, response: Response) -> Result<Response> {
        let ChannelState::Open { keys, chaining, .. } = &mut self.state else {
            return Ok(response);
        };

        if response.status() == SECURITY_CONDITION_NOT_SATISFIED {
            warn!("Card rejected protected command, closing secure channel");
            self.close();
            return Ok(response);
        }

        match keys.unwrap(&self.crypto, chaining, &response) {
            Ok((plaintext, next)) => {
                *chaining = next;
                Response::from_bytes(&plaintext).map_err(|error| {
                    self.close();
                    error.into()
                })
            }
            Err(error) => {
                self.close();
                Err(error)
            }
        }
    }

    /// Send a command through the secure channel and return the inner response
    ///
    /// Passes through unprotected when the channel is closed.
    pub fn transmit_protected(
        &mut self,
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: &[u8],
    ) -> Result<Response> {
        let command = self.wrap(cla, ins, p1, p2, data)?;
        let response = command
            .to_bytes()
            .map_err(Error::from)
            .and_then(|raw| Ok(self.transport.transmit_raw(&raw)?))
            .and_then(|raw| Ok(Response::from_bytes(&raw)?));
        match response {
            Ok(response) => self.unwrap(response),
            Err(error) => {
                self.close();
                Err(error)
            }
        }
    }

    /// Send a typed command, through the secure channel when it requires one
    pub fn execute<Cmd>(&mut self, command: &Cmd) -> Result<Cmd::Success>
    where
        Cmd: ApduCommand<Error = Error>,
    {
        let required = command.required_security_level();
        if !required.needs_channel() {
            return transmit(&mut self.transport, command);
        }
        if !self.is_open() {
            return Err(Error::SecureChannelNotOpen);
        }
        if !self.security_level.satisfies(&required) {
            return Err(Error::PinVerificationRequired);
        }

        let response = self.transmit_protected(
            command.class(),
            command.instruction(),
            command.p1(),
            command.p2(),
            command.data(),
        )?;
        Cmd::parse_response(response)
    }

    /// Verify the PIN, unlocking commands that need it
    ///
    /// Once the card reports no attempts left, further calls fail without
    /// contacting the card until a SELECT or a successful unblock.
    pub fn verify_pin(&mut self, pin: &str) -> Result<()> {
        if self.pin_retries == Some(0) {
            warn!("PIN is blocked, not sending VERIFY PIN");
            return Err(Error::Authentication {
                remaining_attempts: 0,
            });
        }

        match self.execute(&VerifyPinCommand::with_pin(pin)) {
            Ok(()) => {
                debug!("PIN verified");
                self.pin_retries = None;
                self.security_level = SecurityLevel::full();
                Ok(())
            }
            Err(Error::Authentication { remaining_attempts }) => {
                warn!(remaining_attempts, "Wrong PIN");
                self.pin_retries = Some(remaining_attempts);
                if self.is_open() {
                    self.security_level = SecurityLevel::enc_mac();
                }
                Err(Error::Authentication { remaining_attempts })
            }
            Err(error) => Err(error),
        }
    }

    /// Unblock the PIN with the PUK and set a new PIN
    pub fn unblock_pin(&mut self, puk: &str, new_pin: &str) -> Result<()> {
        self.execute(&UnblockPinCommand::with_puk_and_pin(puk, new_pin))?;
        debug!("PIN unblocked");
        self.pin_retries = None;
        self.security_level = SecurityLevel::full();
        Ok(())
    }

    /// Free the pairing slot `index`
    ///
    /// Unpairing the session's own slot leaves the session unpaired.
    pub fn unpair(&mut self, index: u8) -> Result<()> {
        self.execute(&UnpairCommand::with_index(index))?;
        debug!(index, "Unpaired slot");
        if self.pairing_info().is_some_and(|pairing| pairing.index == index) {
            self.close();
            self.clear_pairing();
        }
        Ok(())
    }

    /// Free every pairing slot except the session's own
    pub fn unpair_others(&mut self) -> Result<()> {
        let own = self
            .pairing_info()
            .map(|pairing| pairing.index)
            .ok_or(Error::IllegalState("not paired"))?;
        for index in (0..self.config.pairing_slots).filter(|index| *index != own) {
            self.execute(&UnpairCommand::with_index(index))?;
        }
        debug!(own, "Unpaired all other slots");
        Ok(())
    }
}
