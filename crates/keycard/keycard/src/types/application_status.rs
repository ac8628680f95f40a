use std::fmt;

use crate::tags;

use super::{get_constructed_value, get_integer, get_primitive_value, parse_tlv};

/// Application status returned by GET STATUS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationStatus {
    /// Remaining PIN attempts
    pub pin_retry_count: u8,
    /// Remaining PUK attempts
    pub puk_retry_count: u8,
    /// Whether a master key is loaded
    pub key_initialized: bool,
}

impl TryFrom<&[u8]> for ApplicationStatus {
    type Error = crate::Error;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        let tlv = parse_tlv(data)?;
        let tlvs = get_constructed_value(tags::TEMPLATE_APPLICATION_STATUS, &tlv)?;
        let [pin, puk, initialized, ..] = tlvs else {
            return Err(Self::Error::InvalidData("Application status template too short"));
        };

        let retry_count = |tlv| {
            u8::try_from(get_integer(tags::OTHER, tlv)?)
                .map_err(|_| Self::Error::InvalidData("Invalid retry count"))
        };

        Ok(Self {
            pin_retry_count: retry_count(pin)?,
            puk_retry_count: retry_count(puk)?,
            key_initialized: get_primitive_value(tags::KEY_INITIALIZED, initialized)? == [0xFF],
        })
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Application Status:")?;
        writeln!(f, "  PIN retry count: {}", self.pin_retry_count)?;
        writeln!(f, "  PUK retry count: {}", self.puk_retry_count)?;
        write!(f, "  Key initialized: {}", self.key_initialized)
    }
}
