use iso7816_tlv::ber::Tag;
use k256::{PublicKey, SecretKey, elliptic_curve::sec1::ToEncodedPoint};

use crate::{Error, Result, tags};

use super::{
    constructed, get_constructed_value, get_primitive_value, get_public_key, parse_tlv, primitive,
};

/// BIP32 chain code
pub type ChainCode = [u8; 32];

/// Keypair template (tag A1) as exchanged with LOAD KEY and EXPORT KEY
///
/// Every component is optional on the wire: exports may be public only, and
/// a loaded key may omit the public half or the chain code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keypair {
    /// Public key (tag 80)
    pub public_key: Option<PublicKey>,
    /// Private key (tag 81)
    pub private_key: Option<SecretKey>,
    /// Chain code (tag 82), present for extended keys
    pub chain_code: Option<ChainCode>,
}

/// Key material returned by EXPORT KEY
pub type ExportedKey = Keypair;

impl Keypair {
    /// Keypair from a private key, including the public key
    pub fn from_private_key(private_key: SecretKey) -> Self {
        Self {
            public_key: Some(private_key.public_key()),
            private_key: Some(private_key),
            chain_code: None,
        }
    }

    /// Attach a chain code, making this an extended key
    pub const fn with_chain_code(mut self, chain_code: ChainCode) -> Self {
        self.chain_code = Some(chain_code);
        self
    }

    /// Drop the public key so the card computes it
    pub fn without_public_key(mut self) -> Self {
        self.public_key = None;
        self
    }

    /// Whether a chain code is present
    pub const fn is_extended(&self) -> bool {
        self.chain_code.is_some()
    }

    /// Encode as a keypair template
    pub fn to_tlv_bytes(&self) -> Result<Vec<u8>> {
        let mut children = Vec::with_capacity(3);
        if let Some(public_key) = &self.public_key {
            children.push(primitive(
                tags::ECC_PUBLIC_KEY,
                public_key.to_encoded_point(false).as_bytes(),
            )?);
        }
        if let Some(private_key) = &self.private_key {
            children.push(primitive(tags::ECC_PRIVATE_KEY, &private_key.to_bytes())?);
        }
        if let Some(chain_code) = &self.chain_code {
            children.push(primitive(tags::CHAIN_CODE, chain_code)?);
        }
        Ok(constructed(tags::TEMPLATE_KEYPAIR, children)?.to_vec())
    }
}

impl TryFrom<&[u8]> for Keypair {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        let tlv = parse_tlv(data)?;
        let mut keypair = Self::default();

        for child in get_constructed_value(tags::TEMPLATE_KEYPAIR, &tlv)? {
            let tag = child.tag();
            if tag == &Tag::try_from(tags::ECC_PUBLIC_KEY)? {
                keypair.public_key = get_public_key(child)?;
            } else if tag == &Tag::try_from(tags::ECC_PRIVATE_KEY)? {
                let raw = get_primitive_value(tags::ECC_PRIVATE_KEY, child)?;
                keypair.private_key = Some(SecretKey::from_slice(raw)?);
            } else if tag == &Tag::try_from(tags::CHAIN_CODE)? {
                let raw = get_primitive_value(tags::CHAIN_CODE, child)?;
                keypair.chain_code = Some(
                    raw.try_into()
                        .map_err(|_| Error::InvalidData("Invalid chain code length"))?,
                );
            }
        }

        Ok(keypair)
    }
}
