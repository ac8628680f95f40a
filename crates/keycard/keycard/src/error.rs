use iso7816_tlv::TlvError;
use keycard_apdu_core::{CommandError, ResponseError, StatusWord, TransportError};

/// Result type for Keycard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Keycard operations
///
/// Variants are grouped by how a caller should react. Only
/// [`Error::Authentication`] with attempts left and the precondition errors
/// are worth retrying on the same session; everything else requires a fresh
/// selection or a fix on the caller's side.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport failed to deliver a command or its answer
    #[error("Communication error: {0}")]
    Communication(#[from] TransportError),

    /// Malformed response framing
    #[error("Format error: {0}")]
    Format(#[from] ResponseError),

    /// Command could not be framed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Response data did not have the expected shape
    #[error("Invalid data: {0}")]
    InvalidData(&'static str),

    /// TLV decoding failed
    #[error("TLV error: {0}")]
    Tlv(TlvError),

    /// Pairing exchange rejected, usually a wrong pairing secret
    #[error("Pairing error: {0}")]
    Pairing(&'static str),

    /// All pairing slots on the card are taken
    #[error("No available pairing slots")]
    NoAvailablePairingSlots,

    /// Opening the secure channel failed
    #[error("Handshake error: {0}")]
    Handshake(&'static str),

    /// MAC or padding check failed on a protected response
    #[error("Integrity error: {0}")]
    Integrity(&'static str),

    /// Wrong PIN or PUK
    #[error("Authentication failed, {remaining_attempts} attempts remaining")]
    Authentication {
        /// Attempts left before the credential is blocked
        remaining_attempts: u8,
    },

    /// Operation is not valid in the current protocol state
    #[error("Illegal state: {0}")]
    IllegalState(&'static str),

    /// A protected command was issued without an open secure channel
    #[error("Secure channel not open")]
    SecureChannelNotOpen,

    /// The command needs a verified PIN
    #[error("PIN verification required")]
    PinVerificationRequired,

    /// The card has already been initialized
    #[error("Card already initialized")]
    AlreadyInitialized,

    /// The applet does not advertise the capability the operation needs
    #[error("Card does not support {0}")]
    CapabilityNotSupported(&'static str),

    /// The card returned a status word with no specific meaning for the command
    #[error("Card returned status {0}: {desc}", desc = .0.description())]
    Status(StatusWord),

    /// Key path could not be parsed
    #[error("Invalid derivation path: {0}")]
    InvalidDerivationPath(String),

    /// Public or private key bytes were not valid secp256k1 values
    #[error(transparent)]
    EllipticCurve(#[from] k256::elliptic_curve::Error),

    /// Signature bytes could not be decoded or recovered
    #[error(transparent)]
    Signature(#[from] k256::ecdsa::Error),
}

impl From<TlvError> for Error {
    fn from(error: TlvError) -> Self {
        Self::Tlv(error)
    }
}

impl From<coins_bip32::Bip32Error> for Error {
    fn from(error: coins_bip32::Bip32Error) -> Self {
        Self::InvalidDerivationPath(error.to_string())
    }
}

impl Error {
    /// Whether retrying on the same session can succeed
    ///
    /// Integrity, handshake and pairing failures are terminal for the session.
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Authentication { remaining_attempts } => *remaining_attempts > 0,
            Self::SecureChannelNotOpen | Self::PinVerificationRequired => true,
            _ => false,
        }
    }

    /// Map a non-success status word from a PIN or PUK check
    pub(crate) const fn from_verification_status(status: StatusWord) -> Self {
        if let Some(remaining_attempts) = status.remaining_attempts() {
            Self::Authentication { remaining_attempts }
        } else if status.is_authentication_method_blocked() {
            Self::Authentication {
                remaining_attempts: 0,
            }
        } else {
            Self::Status(status)
        }
    }
}
