//! APDU command definitions and traits
//!
//! Commands use the short form of ISO/IEC 7816-4 framing with an explicit
//! length byte: `CLA INS P1 P2 LC DATA [LE]`. LC is always written, even for
//! an empty payload, and LE is appended only when the command expects a
//! response length.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Response, ResponseError, SecurityLevel};

/// Expected length type for APDU commands
pub type ExpectedLength = u8;

/// Maximum payload carried by a short APDU
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Length of the fixed command header including LC
pub const HEADER_LEN: usize = 5;

/// Errors raised while building or decoding commands
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Raw command does not match its own length byte
    #[error("Invalid command length: {0}")]
    InvalidLength(usize),

    /// Payload does not fit a short APDU
    #[error("Command payload too long: {0} bytes")]
    PayloadTooLong(usize),
}

/// Core trait for APDU commands
///
/// Implementors describe the header and payload of a single command and how
/// the card's answer is turned into a typed result.
pub trait ApduCommand {
    /// Success response type
    type Success;

    /// Error response type
    type Error: From<ResponseError> + fmt::Debug;

    /// Command class (CLA)
    fn class(&self) -> u8;

    /// Instruction code (INS)
    fn instruction(&self) -> u8;

    /// First parameter (P1)
    fn p1(&self) -> u8;

    /// Second parameter (P2)
    fn p2(&self) -> u8;

    /// Command payload data, possibly empty
    fn data(&self) -> &[u8];

    /// Expected response length (optional)
    fn expected_length(&self) -> Option<ExpectedLength> {
        None
    }

    /// The security level that this command requires, defaulting to none
    fn required_security_level(&self) -> SecurityLevel {
        SecurityLevel::none()
    }

    /// Convert to raw APDU bytes
    ///
    /// Fails when the payload does not fit the single LC byte.
    fn to_bytes(&self) -> Result<Bytes, CommandError> {
        let data = self.data();
        if data.len() > MAX_PAYLOAD_LEN {
            return Err(CommandError::PayloadTooLong(data.len()));
        }

        let mut buffer = BytesMut::with_capacity(self.command_length());
        buffer.put_u8(self.class());
        buffer.put_u8(self.instruction());
        buffer.put_u8(self.p1());
        buffer.put_u8(self.p2());
        buffer.put_u8(data.len() as u8);
        buffer.put_slice(data);

        if let Some(le) = self.expected_length() {
            buffer.put_u8(le);
        }

        Ok(buffer.freeze())
    }

    /// Calculate length of serialized command
    fn command_length(&self) -> usize {
        HEADER_LEN + self.data().len() + usize::from(self.expected_length().is_some())
    }

    /// Convert to a generic Command
    fn to_command(&self) -> Command {
        Command {
            cla: self.class(),
            ins: self.instruction(),
            p1: self.p1(),
            p2: self.p2(),
            data: Bytes::copy_from_slice(self.data()),
            le: self.expected_length(),
        }
    }

    /// Parse response into the command's response type
    fn parse_response(response: Response) -> Result<Self::Success, Self::Error>;

    /// Parse raw bytes into the command's response type
    fn parse_response_raw(bytes: &[u8]) -> Result<Self::Success, Self::Error> {
        let response = Response::from_bytes(bytes)?;
        Self::parse_response(response)
    }
}

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data, possibly empty
    pub data: Bytes,
    /// Expected length (optional)
    pub le: Option<ExpectedLength>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Bytes::new(),
            le: None,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: ExpectedLength) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Bytes::new(),
            le: Some(le),
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Create a new command with a payload, rejecting payloads that do not fit a short APDU
    pub fn try_new_with_data<T: Into<Bytes>>(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: T,
    ) -> Result<Self, CommandError> {
        let data = data.into();
        if data.len() > MAX_PAYLOAD_LEN {
            return Err(CommandError::PayloadTooLong(data.len()));
        }
        Ok(Self::new(cla, ins, p1, p2).with_data(data))
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = data.into();
        self
    }

    /// Set the expected length field
    pub fn with_le(mut self, le: ExpectedLength) -> Self {
        self.le = Some(le);
        self
    }

    /// Parse a command from raw bytes
    pub fn from_bytes(raw: &[u8]) -> Result<Self, CommandError> {
        let [cla, ins, p1, p2, rest @ ..] = raw else {
            return Err(CommandError::InvalidLength(raw.len()));
        };

        let mut command = Self::new(*cla, *ins, *p1, *p2);

        let Some((&lc, body)) = rest.split_first() else {
            return Ok(command);
        };

        let lc = lc as usize;
        match body.len() {
            n if n == lc => {}
            n if n == lc + 1 => command.le = Some(body[lc]),
            _ => return Err(CommandError::InvalidLength(raw.len())),
        }
        command.data = Bytes::copy_from_slice(&body[..lc]);

        Ok(command)
    }
}

impl ApduCommand for Command {
    type Success = Response;
    type Error = ResponseError;

    fn class(&self) -> u8 {
        self.cla
    }

    fn instruction(&self) -> u8 {
        self.ins
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

    fn expected_length(&self) -> Option<ExpectedLength> {
        self.le
    }

    fn parse_response(response: Response) -> Result<Self::Success, Self::Error> {
        Ok(response)
    }
}
