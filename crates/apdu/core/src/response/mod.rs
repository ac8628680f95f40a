//! APDU response definitions
//!
//! A raw response is `DATA(n) SW1 SW2`. Parsing splits the trailing status
//! word off and keeps everything before it as the payload.

pub mod error;
pub mod status;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use error::{ResponseError, StatusError};
use status::StatusWord;

/// Basic APDU response structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response payload data
    payload: Bytes,
    /// Status word
    status: StatusWord,
}

impl Response {
    /// Create a new response with payload and status
    pub fn new(payload: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload: payload.into(),
            status: status.into(),
        }
    }

    /// Create a success response
    pub const fn success(payload: Bytes) -> Self {
        Self {
            payload,
            status: status::common::SUCCESS,
        }
    }

    /// Create an error response from a status word
    pub fn error(status: impl Into<StatusWord>) -> Self {
        Self {
            payload: Bytes::new(),
            status: status.into(),
        }
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(data: &[u8]) -> Result<Self, ResponseError> {
        let Some((payload, [sw1, sw2])) = data.split_last_chunk::<2>() else {
            trace!(len = data.len(), "Response too short");
            return Err(ResponseError::Incomplete);
        };

        let status = StatusWord::new(*sw1, *sw2);
        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = payload.len(),
            "Parsed APDU response"
        );

        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
            status,
        })
    }

    /// Get the response payload data
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the response, keeping the payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Get the status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Check if the response indicates success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Convert to a bytes result
    pub fn into_bytes_result(self) -> Result<Bytes, StatusError> {
        if self.is_success() {
            Ok(self.payload)
        } else {
            Err(StatusError::new(self.status.sw1, self.status.sw2))
        }
    }

    /// Serialize back into raw `DATA SW1 SW2` form
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.payload.len() + 2);
        buf.put_slice(&self.payload);
        buf.put_u8(self.status.sw1);
        buf.put_u8(self.status.sw2);
        buf.freeze()
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = ResponseError;

    fn try_from(data: &[u8]) -> Result<Self, ResponseError> {
        Self::from_bytes(data)
    }
}

impl From<Response> for Bytes {
    fn from(response: Response) -> Self {
        response.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_creation() {
        let resp = Response::new(Bytes::from_static(&[0x01, 0x02, 0x03]), (0x90, 0x00));
        assert_eq!(resp.payload(), &[0x01, 0x02, 0x03]);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
        assert!(resp.is_success());
    }

    #[test]
    fn test_response_from_bytes() {
        let resp = Response::from_bytes(&[0x01, 0x02, 0x03, 0x90, 0x00]).unwrap();
        assert_eq!(resp.payload(), &[0x01, 0x02, 0x03]);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
        assert!(resp.is_success());

        let resp = Response::from_bytes(&[0x90, 0x00]).unwrap();
        assert!(resp.payload().is_empty());
        assert!(resp.is_success());

        let resp = Response::from_bytes(&[0x63, 0xC2]).unwrap();
        assert!(!resp.is_success());
        assert_eq!(resp.status().remaining_attempts(), Some(2));
    }

    #[test]
    fn test_short_response_is_incomplete() {
        assert!(matches!(
            Response::from_bytes(&[0x01]),
            Err(ResponseError::Incomplete)
        ));
        assert!(matches!(
            Response::from_bytes(&[]),
            Err(ResponseError::Incomplete)
        ));
    }

    #[test]
    fn test_response_into_result() {
        let success = Response::success(Bytes::from_static(&[0x01, 0x02, 0x03]));
        assert_eq!(
            success.into_bytes_result().unwrap(),
            Bytes::from_static(&[0x01, 0x02, 0x03])
        );

        let error = Response::error((0x6A, 0x82));
        assert_eq!(error.into_bytes_result().unwrap_err().status.to_u16(), 0x6A82);
    }

    #[test]
    fn test_response_to_bytes() {
        let raw = [0xCA, 0xFE, 0x69, 0x82];
        let resp = Response::from_bytes(&raw).unwrap();
        assert_eq!(resp.to_bytes().as_ref(), &raw);
    }
}
