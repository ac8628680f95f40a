use std::{fmt, str::FromStr};

use bytes::{Bytes, BytesMut};
use coins_bip32::path::DerivationPath;

use crate::{Error, Result, constants::MAX_PATH_COMPONENTS};

const HARDENED_BIT: u32 = 0x8000_0000;

/// Starting point of a relative derivation, encoded in P1 of DERIVE KEY,
/// SIGN and EXPORT KEY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeriveSource {
    /// The master key (`m`)
    Master = 0x00,
    /// The parent of the current key (`..`)
    Parent = 0x40,
    /// The current key (`.` or no prefix)
    #[default]
    Current = 0x80,
}

impl DeriveSource {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Master => "m",
            Self::Parent => "..",
            Self::Current => ".",
        }
    }
}

/// A key path with its derivation source
///
/// Parsed from strings such as `m/44'/60'/0'/0/0`, `../1` or `0/2`. A path
/// without a source prefix is relative to the current key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPath {
    source: DeriveSource,
    path: DerivationPath,
}

impl KeyPath {
    /// Build a key path from a source and components
    pub fn new(source: DeriveSource, path: DerivationPath) -> Result<Self> {
        if path.len() > MAX_PATH_COMPONENTS {
            return Err(Error::InvalidDerivationPath(format!(
                "too many components: {}",
                path.len()
            )));
        }
        Ok(Self { source, path })
    }

    /// Path relative to the master key
    pub fn master(path: DerivationPath) -> Result<Self> {
        Self::new(DeriveSource::Master, path)
    }

    /// Derivation source
    pub const fn source(&self) -> DeriveSource {
        self.source
    }

    /// Path components
    pub const fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Whether the path has no components
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Components as big-endian 32-bit words, the wire form
    pub fn to_bytes(&self) -> Bytes {
        derivation_path_to_bytes(&self.path)
    }

    /// Parse the wire form of an absolute path, as returned by GET STATUS
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() % 4 != 0 {
            return Err(Error::InvalidData("Key path length not a multiple of 4"));
        }
        let components = data
            .chunks_exact(4)
            .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        Self::master(DerivationPath::from_iter(components))
    }
}

pub(crate) fn derivation_path_to_bytes(path: &DerivationPath) -> Bytes {
    path.iter()
        .fold(BytesMut::with_capacity(path.len() * 4), |mut bytes, component| {
            bytes.extend_from_slice(&component.to_be_bytes());
            bytes
        })
        .freeze()
}

fn parse_component(component: &str) -> Result<u32> {
    let (number, hardened) = match component
        .strip_suffix('\'')
        .or_else(|| component.strip_suffix('h'))
    {
        Some(number) => (number, true),
        None => (component, false),
    };

    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidDerivationPath(format!(
            "invalid component: {component}"
        )));
    }

    let index: u32 = number
        .parse()
        .map_err(|_| Error::InvalidDerivationPath(format!("invalid component: {component}")))?;
    if index & HARDENED_BIT != 0 {
        return Err(Error::InvalidDerivationPath(format!(
            "component out of range: {component}"
        )));
    }

    Ok(if hardened { index | HARDENED_BIT } else { index })
}

impl FromStr for KeyPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.split('/').peekable();
        let source = match tokens.peek() {
            Some(&"m") => DeriveSource::Master,
            Some(&"..") => DeriveSource::Parent,
            Some(&".") => DeriveSource::Current,
            _ => DeriveSource::Current,
        };
        if matches!(tokens.peek(), Some(&"m" | &".." | &".")) {
            tokens.next();
        }

        let components = tokens
            .filter(|token| !token.is_empty())
            .map(parse_component)
            .collect::<Result<Vec<_>>>()?;

        Self::new(source, DerivationPath::from_iter(components))
    }
}

impl TryFrom<&str> for KeyPath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source.prefix())?;
        for component in self.path.iter() {
            if component & HARDENED_BIT != 0 {
                write!(f, "/{}'", component & !HARDENED_BIT)?;
            } else {
                write!(f, "/{component}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_master_path() {
        let path: KeyPath = "m/44'/60'/0'/0/0".parse().unwrap();
        assert_eq!(path.source(), DeriveSource::Master);
        assert_eq!(path.path().len(), 5);
        assert_eq!(
            hex::encode(path.to_bytes()),
            "8000002c8000003c800000000000000000000000"
        );
        assert_eq!(path.to_string(), "m/44'/60'/0'/0/0");
    }

    #[test]
    fn test_parse_relative_paths() {
        let parent: KeyPath = "../1".parse().unwrap();
        assert_eq!(parent.source(), DeriveSource::Parent);
        assert_eq!(parent.to_bytes().as_ref(), &[0, 0, 0, 1]);

        let current: KeyPath = "./2h".parse().unwrap();
        assert_eq!(current.source(), DeriveSource::Current);
        assert_eq!(current.to_bytes().as_ref(), &[0x80, 0, 0, 2]);

        let bare: KeyPath = "0/2".parse().unwrap();
        assert_eq!(bare.source(), DeriveSource::Current);
        assert_eq!(bare.path().len(), 2);

        let root: KeyPath = "m".parse().unwrap();
        assert!(root.is_empty());
        assert_eq!(root.to_string(), "m");
    }

    #[test]
    fn test_rejects_invalid_paths() {
        assert!("m/1/2/3/4/5/6/7/8/9/10/11".parse::<KeyPath>().is_err());
        assert!("m/1/2/3/4/5/6/7/8/9/10".parse::<KeyPath>().is_ok());
        assert!("m/-1".parse::<KeyPath>().is_err());
        assert!("m/+1".parse::<KeyPath>().is_err());
        assert!("m/abc".parse::<KeyPath>().is_err());
        assert!("m/2147483648".parse::<KeyPath>().is_err());
    }

    #[test]
    fn test_from_bytes() {
        let path = KeyPath::from_bytes(&hex::decode("8000002c00000001").unwrap()).unwrap();
        assert_eq!(path.to_string(), "m/44'/1");
        assert!(KeyPath::from_bytes(&[0, 1, 2]).is_err());
        assert!(KeyPath::from_bytes(&[]).unwrap().is_empty());
    }
}
