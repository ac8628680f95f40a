use derive_more::{Display, From, Into};
use iso7816_tlv::ber::Tlv;

use crate::tags;

use super::get_primitive_value;

/// Application version (major.minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, From, Into)]
#[display("{major}.{minor}")]
pub struct Version {
    /// Major revision
    pub major: u8,
    /// Minor revision
    pub minor: u8,
}

impl Version {
    /// Create a version
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl TryFrom<&Tlv> for Version {
    type Error = crate::Error;

    fn try_from(tlv: &Tlv) -> Result<Self, Self::Error> {
        match get_primitive_value(tags::OTHER, tlv)? {
            [major, minor] => Ok(Self::new(*major, *minor)),
            _ => Err(Self::Error::InvalidData("Invalid version length")),
        }
    }
}
