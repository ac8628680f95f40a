use std::fmt;

use iso7816_tlv::ber::Tag;

use crate::tags;

use super::{
    Capabilities, Capability, Version, get_constructed_value, get_integer, get_primitive_value,
    get_public_key, parse_tlv,
};

/// Applet instance UID, stable for the lifetime of the applet
pub type InstanceUid = [u8; 16];

/// Application info returned by SELECT
///
/// A card that has not received INIT only reports its secure channel
/// public key; every other field is then empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    /// Instance UID, `None` before INIT
    pub instance_uid: Option<InstanceUid>,
    /// Secure channel public key, `None` if the applet has no secure channel
    pub public_key: Option<k256::PublicKey>,
    /// Application version, `None` before INIT
    pub version: Option<Version>,
    /// Number of free pairing slots
    pub remaining_slots: u8,
    /// Key UID (SHA-256 of the master public key), `None` without a key
    pub key_uid: Option<[u8; 32]>,
    /// Supported capabilities
    pub capabilities: Capabilities,
}

impl ApplicationInfo {
    /// Whether the card has received INIT
    pub const fn is_initialized(&self) -> bool {
        self.instance_uid.is_some()
    }

    /// Whether a master key is loaded
    pub const fn has_master_key(&self) -> bool {
        self.key_uid.is_some()
    }
}

impl TryFrom<&[u8]> for ApplicationInfo {
    type Error = crate::Error;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        let tlv = parse_tlv(data)?;

        if tlv.tag() == &Tag::try_from(tags::ECC_PUBLIC_KEY)? {
            let public_key = get_public_key(&tlv)?;
            let mut capabilities = vec![Capability::CredentialsManagement];
            if public_key.is_some() {
                capabilities.push(Capability::SecureChannel);
            }
            return Ok(Self {
                instance_uid: None,
                public_key,
                version: None,
                remaining_slots: 0,
                key_uid: None,
                capabilities: Capabilities::new(&capabilities),
            });
        }

        let tlvs = get_constructed_value(tags::TEMPLATE_APPLICATION_INFO, &tlv)?;
        let [uid, public_key, version, slots, key_uid, rest @ ..] = tlvs else {
            return Err(Self::Error::InvalidData("Application info template too short"));
        };

        let instance_uid: InstanceUid = get_primitive_value(tags::INSTANCE_UID, uid)?
            .try_into()
            .map_err(|_| Self::Error::InvalidData("Invalid instance UID length"))?;
        let public_key = get_public_key(public_key)?;
        let version = Version::try_from(version)?;
        let remaining_slots = u8::try_from(get_integer(tags::OTHER, slots)?)
            .map_err(|_| Self::Error::InvalidData("Invalid pairing slot count"))?;
        let key_uid = {
            let raw = get_primitive_value(tags::KEY_UID, key_uid)?;
            match raw.len() {
                0 => None,
                32 => Some(
                    raw.try_into()
                        .map_err(|_| Self::Error::InvalidData("Invalid key UID length"))?,
                ),
                _ => return Err(Self::Error::InvalidData("Invalid key UID length")),
            }
        };
        let capabilities = match rest.first() {
            Some(tlv) => Capabilities::try_from(tlv)?,
            None => Capabilities::default(),
        };

        Ok(Self {
            instance_uid: Some(instance_uid),
            public_key,
            version: Some(version),
            remaining_slots,
            key_uid,
            capabilities,
        })
    }
}

impl fmt::Display for ApplicationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Application Info:")?;
        match (&self.instance_uid, &self.version) {
            (Some(uid), Some(version)) => {
                writeln!(f, "  Instance UID: {}", hex::encode(uid))?;
                writeln!(f, "  Version: {version}")?;
                writeln!(f, "  Remaining pairing slots: {}", self.remaining_slots)?;
            }
            _ => writeln!(f, "  Not initialized (use INIT)")?,
        }

        match &self.key_uid {
            Some(key_uid) => writeln!(f, "  Key UID: 0x{}", hex::encode(key_uid))?,
            None => writeln!(f, "  Key UID: None (Use GENERATE KEY)")?,
        }

        writeln!(f, "  Capabilities: {}", self.capabilities)?;

        write!(f, "  Secure channel public key: ")?;
        match &self.public_key {
            Some(public_key) => write!(f, "0x{}", hex::encode(public_key.to_sec1_bytes())),
            None => write!(f, "None"),
        }
    }
}

#[cfg(test)]
mod tests {
    use k256::SecretKey;
    use k256::elliptic_curve::sec1::ToEncodedPoint;

    use super::*;
    use crate::types::{constructed, primitive};

    fn public_key_bytes() -> Vec<u8> {
        let secret = SecretKey::from_slice(&[0x42; 32]).unwrap();
        secret.public_key().to_encoded_point(false).as_bytes().to_vec()
    }

    #[test]
    fn test_parse_initialized_card() {
        let template = constructed(
            tags::TEMPLATE_APPLICATION_INFO,
            vec![
                primitive(tags::INSTANCE_UID, &[0xAA; 16]).unwrap(),
                primitive(tags::ECC_PUBLIC_KEY, &public_key_bytes()).unwrap(),
                primitive(tags::OTHER, &[3, 1]).unwrap(),
                primitive(tags::OTHER, &[4]).unwrap(),
                primitive(tags::KEY_UID, &[]).unwrap(),
                primitive(tags::CAPABILITIES, &[0x03]).unwrap(),
            ],
        )
        .unwrap();

        let info = ApplicationInfo::try_from(template.to_vec().as_slice()).unwrap();
        assert!(info.is_initialized());
        assert!(!info.has_master_key());
        assert_eq!(info.instance_uid, Some([0xAA; 16]));
        assert_eq!(info.version, Some(Version::new(3, 1)));
        assert_eq!(info.remaining_slots, 4);
        assert!(info.public_key.is_some());
        assert!(!info.capabilities.has_capability(Capability::Ndef));
        assert!(info.to_string().contains("Version: 3.1"));
    }

    #[test]
    fn test_capabilities_default_when_absent() {
        let template = constructed(
            tags::TEMPLATE_APPLICATION_INFO,
            vec![
                primitive(tags::INSTANCE_UID, &[0x01; 16]).unwrap(),
                primitive(tags::ECC_PUBLIC_KEY, &[]).unwrap(),
                primitive(tags::OTHER, &[2, 2]).unwrap(),
                primitive(tags::OTHER, &[5]).unwrap(),
                primitive(tags::KEY_UID, &[0x07; 32]).unwrap(),
            ],
        )
        .unwrap();

        let info = ApplicationInfo::try_from(template.to_vec().as_slice()).unwrap();
        assert_eq!(info.capabilities, Capabilities::default());
        assert_eq!(info.key_uid, Some([0x07; 32]));
        assert!(info.public_key.is_none());
    }

    #[test]
    fn test_parse_uninitialized_card() {
        let tlv = primitive(tags::ECC_PUBLIC_KEY, &public_key_bytes()).unwrap();
        let info = ApplicationInfo::try_from(tlv.to_vec().as_slice()).unwrap();

        assert!(!info.is_initialized());
        assert!(info.public_key.is_some());
        assert!(info.capabilities.has_capability(Capability::SecureChannel));
        assert!(!info.capabilities.has_capability(Capability::KeyManagement));
    }

    #[test]
    fn test_truncated_template_rejected() {
        let template = constructed(
            tags::TEMPLATE_APPLICATION_INFO,
            vec![primitive(tags::INSTANCE_UID, &[0x01; 16]).unwrap()],
        )
        .unwrap();
        assert!(ApplicationInfo::try_from(template.to_vec().as_slice()).is_err());
    }
}
