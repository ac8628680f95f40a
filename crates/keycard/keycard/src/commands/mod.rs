//! Keycard APDU commands
//!
//! One type per instruction, each implementing [`ApduCommand`] with a typed
//! success value. Commands only describe the plaintext exchange; whether they
//! travel through the secure channel follows from
//! [`ApduCommand::required_security_level`].

/// Declare a Keycard command type
///
/// The generated struct carries P1, P2, the payload and an optional Le, plus
/// the security level it is sent at. Builders live next to each invocation.
macro_rules! keycard_command {
    (
        $(#[$meta:meta])*
        $name:ident {
            cla: $cla:expr,
            ins: $ins:expr,
            security: $security:expr,
            success: $success:ty,
            parse: |$response:ident| $parse:block $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name {
            p1: u8,
            p2: u8,
            data: ::bytes::Bytes,
            le: Option<u8>,
            security: ::keycard_apdu_core::SecurityLevel,
        }

        impl $name {
            /// Command with the given parameters and no payload
            pub fn new(p1: u8, p2: u8) -> Self {
                Self {
                    p1,
                    p2,
                    data: ::bytes::Bytes::new(),
                    le: None,
                    security: $security,
                }
            }

            /// Set the payload
            pub fn with_data(mut self, data: impl Into<::bytes::Bytes>) -> Self {
                self.data = data.into();
                self
            }

            /// Set the expected response length
            pub const fn with_le(mut self, le: u8) -> Self {
                self.le = Some(le);
                self
            }

            /// Override the security level the command is sent at
            pub const fn with_security_level(
                mut self,
                security: ::keycard_apdu_core::SecurityLevel,
            ) -> Self {
                self.security = security;
                self
            }
        }

        // Payloads may carry PINs and key material
        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("p1", &self.p1)
                    .field("p2", &self.p2)
                    .field("data_len", &self.data.len())
                    .finish_non_exhaustive()
            }
        }

        impl ::keycard_apdu_core::ApduCommand for $name {
            type Success = $success;
            type Error = $crate::Error;

            fn class(&self) -> u8 {
                $cla
            }

            fn instruction(&self) -> u8 {
                $ins
            }

            fn p1(&self) -> u8 {
                self.p1
            }

            fn p2(&self) -> u8 {
                self.p2
            }

            fn data(&self) -> &[u8] {
                &self.data
            }

            fn expected_length(&self) -> Option<u8> {
                self.le
            }

            fn required_security_level(&self) -> ::keycard_apdu_core::SecurityLevel {
                self.security
            }

            fn parse_response(
                $response: ::keycard_apdu_core::Response,
            ) -> $crate::Result<Self::Success> $parse
        }
    };
}

pub mod derive_key;
pub use derive_key::*;
pub mod duplicate_key;
pub use duplicate_key::*;
pub mod export_key;
pub use export_key::*;
pub mod generate_key;
pub use generate_key::*;
pub mod generate_mnemonic;
pub use generate_mnemonic::*;
pub mod get_status;
pub use get_status::*;
pub mod init;
pub use init::*;
pub mod load_key;
pub use load_key::*;
pub mod mutually_authenticate;
pub use mutually_authenticate::*;
pub mod open_secure_channel;
pub use open_secure_channel::*;
pub mod pair;
pub use pair::*;
pub mod pin;
pub use pin::*;
pub mod select;
pub use select::*;
pub mod set_ndef;
pub use set_ndef::*;
pub mod set_pinless_path;
pub use set_pinless_path::*;
pub mod sign;
pub use sign::*;
pub mod unpair;
pub use unpair::*;

use keycard_apdu_core::{ApduCommand, CardTransport, Response};
use tracing::debug;

use crate::{Error, Result};

/// Fail with [`Error::Status`] unless the response is 9000
pub(crate) fn check_status(response: &Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    debug!(%status, description = status.description(), "Command failed");
    Err(Error::Status(status))
}

/// Send an unprotected command straight through the transport
pub(crate) fn transmit<T, C>(transport: &mut T, command: &C) -> Result<C::Success>
where
    T: CardTransport + ?Sized,
    C: ApduCommand<Error = Error>,
{
    let response = transport.transmit_raw(&command.to_bytes()?)?;
    C::parse_response_raw(&response)
}
