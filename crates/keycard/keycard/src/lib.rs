//! Host side of the Keycard applet protocol
//!
//! This crate pairs with a Keycard, opens its mutually authenticated secure
//! channel and drives the applet command set over any [`CardTransport`]:
//!
//! - [`KeycardSession`] owns the transport, the pairing and the channel state
//! - [`PairingSecret`] and [`Secrets`] carry the credentials set at INIT
//! - the [`commands`] module holds one typed command per instruction
//! - [`CardDuplicator`] runs card-to-card key duplication
//!
//! ```no_run
//! # fn run<T: keycard_host::CardTransport>(transport: T) -> keycard_host::Result<()> {
//! use keycard_host::{KeycardSession, PairingSecret};
//!
//! let mut session = KeycardSession::with_transport(transport);
//! session.select()?;
//! session.pair(&PairingSecret::from_password("KeycardDefaultPairing"))?;
//! session.open_secure_channel()?;
//! session.verify_pin("123456")?;
//! let signature = session.sign(&[0u8; 32])?;
//! # let _ = signature;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod application;
pub mod commands;
mod config;
mod constants;
mod crypto;
mod duplicator;
mod error;
mod pairing;
mod secrets;
mod secure_channel;
mod session;
#[cfg(test)]
mod test_utils;
mod types;

pub use config::{ChainBinding, KeycardConfig};
pub use constants::*;
pub use crypto::{Block, CryptoProvider, DefaultCrypto, Key, SharedSecret};
pub use duplicator::{CardDuplicator, DuplicatorCallback};
pub use error::{Error, Result};
pub use keycard_apdu_core::{CardTransport, SecurityLevel, TransportError};
pub use pairing::{PairingSecret, cryptogram};
pub use secrets::{Secrets, validate_pin, validate_puk};
pub use secure_channel::{ChainingValue, SessionKeys, one_shot_encrypt};
pub use session::{ChannelState, HostPublicKey, KeycardSession};
pub use types::*;
