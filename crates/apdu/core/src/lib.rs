//! Core types for APDU (Application Protocol Data Unit) exchanges with a card applet
//!
//! This crate provides the framing layer shared by higher level protocol crates:
//!
//! - Building and serializing commands with a fixed 5-byte header
//! - Splitting raw responses into payload and status word
//! - Interpreting status words
//! - The synchronous transport boundary that physical readers implement
//!
//! It holds no protocol state. Secure messaging lives in the crates built on top.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod response;
pub mod security;
pub mod transport;

pub use command::{ApduCommand, Command, CommandError, ExpectedLength};
pub use response::error::{ResponseError, StatusError};
pub use response::status::StatusWord;
pub use response::Response;
pub use security::SecurityLevel;
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, Command, Response,
        command::{ApduCommand, ExpectedLength},
        response::status::{StatusWord, common as status},
        security::SecurityLevel,
        transport::{CardTransport, TransportError},
    };
}
