use std::fmt;

use iso7816_tlv::ber::Tlv;

use crate::{Error, Result, tags};

use super::get_primitive_value;

/// Capability flags for the keycard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Pairing and secure channel
    SecureChannel = 0x01,
    /// Key loading, generation and derivation
    KeyManagement = 0x02,
    /// PIN, PUK and pairing secret management
    CredentialsManagement = 0x04,
    /// NDEF record storage
    Ndef = 0x08,
}

impl Capability {
    const fn name(self) -> &'static str {
        match self {
            Self::SecureChannel => "Secure Channel",
            Self::KeyManagement => "Key Management",
            Self::CredentialsManagement => "Credentials Management",
            Self::Ndef => "NDEF",
        }
    }
}

/// Capabilities flags container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities(u8);

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = [
            Capability::SecureChannel,
            Capability::KeyManagement,
            Capability::CredentialsManagement,
            Capability::Ndef,
        ]
        .into_iter()
        .filter(|cap| self.has_capability(*cap))
        .map(Capability::name)
        .collect();
        write!(f, "{}", names.join(", "))
    }
}

impl Default for Capabilities {
    /// Cards that predate the capabilities tag support everything
    fn default() -> Self {
        Self(0x0F)
    }
}

impl Capabilities {
    /// Build a flag set from individual capabilities
    pub fn new(capabilities: &[Capability]) -> Self {
        Self(capabilities.iter().fold(0, |flags, &cap| flags | cap as u8))
    }

    /// Whether the flag is set
    pub const fn has_capability(&self, capability: Capability) -> bool {
        self.0 & capability as u8 != 0
    }

    /// Fail with [`Error::CapabilityNotSupported`] unless the flag is set
    pub const fn require(&self, capability: Capability) -> Result<()> {
        if self.has_capability(capability) {
            Ok(())
        } else {
            Err(Error::CapabilityNotSupported(capability.name()))
        }
    }

    /// Raw flag byte
    pub const fn bits(&self) -> u8 {
        self.0
    }
}

impl TryFrom<&Tlv> for Capabilities {
    type Error = Error;

    fn try_from(tlv: &Tlv) -> Result<Self> {
        match get_primitive_value(tags::CAPABILITIES, tlv)? {
            [flags] => Ok(Self(*flags)),
            _ => Err(Error::InvalidData("Invalid TLV for Capabilities")),
        }
    }
}

impl From<u8> for Capabilities {
    fn from(value: u8) -> Self {
        Self(value)
    }
}
