//! Session configuration
//!
//! Everything here has a default. The default MAC chaining mode is
//! [`ChainBinding::Bound`], which deployed Keycard firmware does not speak:
//! sessions talking to real cards must set [`ChainBinding::Unbound`].

use serde::{Deserialize, Serialize};

use crate::constants::{KEYCARD_AID, PAIRING_MAX_CLIENT_COUNT};

/// How the chaining value enters the MAC of a protected message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainBinding {
    /// The MAC covers the chaining value followed by metadata and ciphertext
    ///
    /// Every MAC depends on all prior exchanges of the session, so a replayed
    /// or dropped message fails verification on the next exchange.
    #[default]
    Bound,
    /// Zero-IV CBC-MAC over metadata and ciphertext only
    ///
    /// Required for deployed Keycard cards, whose applet computes its MACs
    /// this way. With [`Bound`](Self::Bound) the first protected exchange
    /// (mutual authentication) fails against such a card. Replay protection
    /// then rests on the card side.
    Unbound,
}

/// Configuration for a [`crate::KeycardSession`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeycardConfig {
    /// Applet instance AID sent in SELECT
    #[serde(with = "hex_bytes")]
    pub aid: Vec<u8>,
    /// Number of pairing slots to sweep in `unpair_others`
    pub pairing_slots: u8,
    /// MAC chaining mode for the protected transport
    ///
    /// Set [`ChainBinding::Unbound`] when talking to a deployed Keycard.
    pub chain_binding: ChainBinding,
}

impl Default for KeycardConfig {
    fn default() -> Self {
        Self {
            aid: KEYCARD_AID.to_vec(),
            pairing_slots: PAIRING_MAX_CLIENT_COUNT,
            chain_binding: ChainBinding::default(),
        }
    }
}

impl KeycardConfig {
    /// Select a different applet instance
    pub fn with_aid(mut self, aid: impl Into<Vec<u8>>) -> Self {
        self.aid = aid.into();
        self
    }

    /// Select the applet instance with the given index (1-based)
    pub fn with_instance_index(mut self, index: u8) -> Self {
        let mut aid = KEYCARD_AID[..KEYCARD_AID.len() - 1].to_vec();
        aid.push(index);
        self.aid = aid;
        self
    }

    /// Override the number of pairing slots
    pub const fn with_pairing_slots(mut self, slots: u8) -> Self {
        self.pairing_slots = slots;
        self
    }

    /// Override the MAC chaining mode
    pub const fn with_chain_binding(mut self, binding: ChainBinding) -> Self {
        self.chain_binding = binding;
        self
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub(super) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(bytes))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(D::Error::custom)
    }
}
