mod application_info;
mod application_status;
mod capabilities;
mod key_path;
mod keypair;
mod pairing_info;
mod signature;
mod version;

pub use application_info::{ApplicationInfo, InstanceUid};
pub use application_status::ApplicationStatus;
pub use capabilities::{Capabilities, Capability};
pub use key_path::{DeriveSource, KeyPath};
pub use keypair::{ChainCode, ExportedKey, Keypair};
pub use pairing_info::PairingInfo;
pub use signature::RecoverableSignature;
pub use version::Version;

use iso7816_tlv::ber::{Tag, Tlv, Value};

use crate::{Error, Result};

/// Value of a primitive TLV, checking its tag
pub(crate) fn get_primitive_value(tag: u8, tlv: &Tlv) -> Result<&[u8]> {
    if tlv.tag() != &Tag::try_from(tag)? {
        return Err(Error::InvalidData("Invalid tag"));
    }
    match tlv.value() {
        Value::Primitive(bytes) => Ok(bytes.as_slice()),
        Value::Constructed(_) => Err(Error::InvalidData("Invalid value type")),
    }
}

/// Children of a constructed TLV, checking the template tag
pub(crate) fn get_constructed_value(tag: u8, tlv: &Tlv) -> Result<&[Tlv]> {
    if tlv.tag() != &Tag::try_from(tag)? {
        return Err(Error::InvalidData("Invalid template tag"));
    }
    match tlv.value() {
        Value::Constructed(tlvs) => Ok(tlvs.as_slice()),
        Value::Primitive(_) => Err(Error::InvalidData("TLV value was not constructed")),
    }
}

/// Big-endian unsigned integer from a primitive TLV
pub(crate) fn get_integer(tag: u8, tlv: &Tlv) -> Result<u32> {
    let bytes = get_primitive_value(tag, tlv)?;
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(Error::InvalidData("Invalid integer length"));
    }
    Ok(bytes.iter().fold(0, |acc, b| (acc << 8) | u32::from(*b)))
}

/// Parse a single top level TLV, rejecting trailing bytes
pub(crate) fn parse_tlv(data: &[u8]) -> Result<Tlv> {
    let (tlv, rest) = Tlv::parse(data);
    if !rest.is_empty() {
        return Err(Error::InvalidData("Trailing data after TLV"));
    }
    Ok(tlv?)
}

/// Build a primitive TLV
pub(crate) fn primitive(tag: u8, value: &[u8]) -> Result<Tlv> {
    Ok(Tlv::new(Tag::try_from(tag)?, Value::Primitive(value.to_vec()))?)
}

/// Build a constructed TLV
pub(crate) fn constructed(tag: u8, children: Vec<Tlv>) -> Result<Tlv> {
    Ok(Tlv::new(Tag::try_from(tag)?, Value::Constructed(children))?)
}

/// secp256k1 public key from a primitive TLV, empty meaning absent
pub(crate) fn get_public_key(tlv: &Tlv) -> Result<Option<k256::PublicKey>> {
    let value = get_primitive_value(crate::tags::ECC_PUBLIC_KEY, tlv)?;
    match value.len() {
        0 => Ok(None),
        65 => Ok(Some(k256::PublicKey::from_sec1_bytes(value)?)),
        _ => Err(Error::InvalidData("Invalid public key length")),
    }
}
