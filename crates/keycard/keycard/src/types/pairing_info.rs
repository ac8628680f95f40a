use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Pairing slot and key obtained from PAIR
///
/// The caller persists it to open secure channels in later sessions.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PairingInfo {
    /// Pairing key
    #[serde(with = "hex_key")]
    pub key: [u8; 32],
    /// Pairing slot index on the card
    pub index: u8,
}

impl PairingInfo {
    /// Create pairing info from a stored key and index
    pub const fn new(key: [u8; 32], index: u8) -> Self {
        Self { key, index }
    }
}

impl std::fmt::Debug for PairingInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingInfo")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(key: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(key))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("pairing key must be 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_round_trip() {
        let info = PairingInfo::new([0xAB; 32], 3);
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, format!("{{\"key\":\"{}\",\"index\":3}}", "ab".repeat(32)));
        assert_eq!(serde_json::from_str::<PairingInfo>(&json).unwrap(), info);
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(serde_json::from_str::<PairingInfo>(r#"{"key":"abcd","index":0}"#).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let info = PairingInfo::new([0xAB; 32], 1);
        let debug = format!("{info:?}");
        assert!(!debug.contains("171"));
        assert!(debug.contains("index: 1"));
    }
}
