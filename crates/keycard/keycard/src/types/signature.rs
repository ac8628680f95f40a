use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::{Error, Result, tags};

use super::{get_constructed_value, get_primitive_value, get_public_key, parse_tlv};

/// ECDSA signature with the signing public key and recovery id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// Public key of the signing key
    pub public_key: k256::PublicKey,
    /// Normalized `(r, s)` signature
    pub signature: Signature,
    /// Recovery id matching `public_key`
    pub recovery_id: RecoveryId,
}

impl RecoverableSignature {
    /// Parse a signature template (tag A0) for the given 32-byte hash
    ///
    /// The card does not return the recovery id; it is found by trying each
    /// candidate against the returned public key.
    pub fn from_response(hash: &[u8; 32], data: &[u8]) -> Result<Self> {
        let tlv = parse_tlv(data)?;
        let tlvs = get_constructed_value(tags::TEMPLATE_SIGNATURE, &tlv)?;
        let [public_key, signature, ..] = tlvs else {
            return Err(Error::InvalidData("Signature template too short"));
        };

        let public_key =
            get_public_key(public_key)?.ok_or(Error::InvalidData("Missing public key"))?;

        let [r, s, ..] = get_constructed_value(tags::ECDSA_SIGNATURE, signature)? else {
            return Err(Error::InvalidData("ECDSA signature too short"));
        };
        let r = scalar_bytes(get_primitive_value(tags::OTHER, r)?)?;
        let s = scalar_bytes(get_primitive_value(tags::OTHER, s)?)?;

        let mut signature = Signature::from_scalars(r, s)?;
        if let Some(normalized) = signature.normalize_s() {
            signature = normalized;
        }

        let recovery_id = RecoveryId::trial_recovery_from_prehash(
            &VerifyingKey::from(&public_key),
            hash,
            &signature,
        )?;

        Ok(Self {
            public_key,
            signature,
            recovery_id,
        })
    }

    /// `r || s || v` with `v` the raw recovery id
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&self.signature.to_bytes());
        out[64] = self.recovery_id.to_byte();
        out
    }
}

/// Left pad or strip a DER integer to 32 bytes
fn scalar_bytes(raw: &[u8]) -> Result<[u8; 32]> {
    let trimmed = match raw.iter().position(|b| *b != 0) {
        Some(start) => &raw[start..],
        None => &[][..],
    };
    if trimmed.len() > 32 {
        return Err(Error::InvalidData("Signature component too long"));
    }
    let mut out = [0u8; 32];
    out[32 - trimmed.len()..].copy_from_slice(trimmed);
    Ok(out)
}
