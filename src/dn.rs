//! Distinguished names as they travel in LDAP PDUs.
//!
//! Only the syntax of RFC 4514 is checked. The text as received is kept so a
//! decoded name encodes back to the same bytes.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DnError {
    #[error("dn is not valid utf-8")]
    NotUtf8,
    #[error("empty rdn at position {0}")]
    EmptyRdn(usize),
    #[error("missing '=' in '{0}'")]
    MissingEquals(String),
    #[error("invalid attribute type '{0}'")]
    InvalidType(String),
    #[error("invalid escape sequence in '{0}'")]
    InvalidEscape(String),
    #[error("expected a single rdn, got {0}")]
    NotSingleRdn(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Dn {
    raw: String,
}

impl Dn {
    /// The zero-length name of the root DSE.
    pub fn root() -> Self {
        Self { raw: String::new() }
    }

    pub fn parse(s: &str) -> Result<Self, DnError> {
        if !s.is_empty() {
            for (pos, rdn) in split_unescaped(s, b',').into_iter().enumerate() {
                check_rdn(rdn, pos)?;
            }
        }
        Ok(Self { raw: s.to_owned() })
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, DnError> {
        let s = std::str::from_utf8(b).map_err(|_| DnError::NotUtf8)?;
        Self::parse(s)
    }

    pub fn is_root(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    /// The RDNs, most specific first.
    pub fn rdns(&self) -> Vec<&str> {
        if self.raw.is_empty() {
            return Vec::new();
        }
        split_unescaped(&self.raw, b',')
            .into_iter()
            .map(str::trim)
            .collect()
    }
}

impl FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dn::parse(s)
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A single relative distinguished name, as carried by ModifyDN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rdn {
    raw: String,
}

impl Rdn {
    /// Placeholder until the real RDN has been read.
    pub(crate) fn empty() -> Self {
        Self { raw: String::new() }
    }

    pub fn parse(s: &str) -> Result<Self, DnError> {
        let parts = split_unescaped(s, b',');
        if s.is_empty() || parts.len() != 1 {
            return Err(DnError::NotSingleRdn(if s.is_empty() { 0 } else { parts.len() }));
        }
        check_rdn(s, 0)?;
        Ok(Self { raw: s.to_owned() })
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self, DnError> {
        let s = std::str::from_utf8(b).map_err(|_| DnError::NotUtf8)?;
        Self::parse(s)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

pub fn parse_dn(b: &[u8]) -> Result<Dn, DnError> {
    Dn::from_bytes(b)
}

fn split_unescaped(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == sep => {
                parts.push(&s[start..i]);
                start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    parts.push(&s[start.min(s.len())..]);
    parts
}

fn check_rdn(rdn: &str, pos: usize) -> Result<(), DnError> {
    if rdn.trim().is_empty() {
        return Err(DnError::EmptyRdn(pos));
    }
    for ava in split_unescaped(rdn, b'+') {
        let (typ, value) = ava
            .split_once('=')
            .ok_or_else(|| DnError::MissingEquals(ava.to_owned()))?;
        let typ = typ.trim();
        if !is_attribute_type(typ) {
            return Err(DnError::InvalidType(typ.to_owned()));
        }
        check_value(value)?;
    }
    Ok(())
}

fn is_attribute_type(typ: &str) -> bool {
    let bytes = typ.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() => bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'-'),
        Some(b) if b.is_ascii_digit() => crate::asn1::is_oid(typ),
        _ => false,
    }
}

fn check_value(value: &str) -> Result<(), DnError> {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            match bytes.get(i + 1) {
                Some(b' ' | b'"' | b'#' | b'+' | b',' | b';' | b'<' | b'=' | b'>' | b'\\') => i += 2,
                Some(h) if h.is_ascii_hexdigit() => match bytes.get(i + 2) {
                    Some(l) if l.is_ascii_hexdigit() => i += 3,
                    _ => return Err(DnError::InvalidEscape(value.to_owned())),
                },
                _ => return Err(DnError::InvalidEscape(value.to_owned())),
            }
        } else {
            i += 1;
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(Dn::parse("").unwrap().is_root());
        let dn = Dn::parse("cn=John Smith+uid=js,ou=People,dc=example,dc=com").unwrap();
        assert_eq!(dn.rdns().len(), 4);
        assert_eq!(dn.rdns()[0], "cn=John Smith+uid=js");
        assert!(Dn::parse("cn=a\\,b,dc=test").is_ok());
        assert_eq!(Dn::parse("cn=a\\,b,dc=test").unwrap().rdns().len(), 2);
        assert!(Dn::parse("2.5.4.3=x").is_ok());
        assert!(Dn::parse("cn=\\4a\\6fhn").is_ok());
        assert!(Dn::parse("cn=").is_ok());
        assert_eq!(parse_dn(b"dc=test").unwrap().as_str(), "dc=test");
    }

    #[test]
    fn invalid_names() {
        assert_eq!(Dn::parse("test"), Err(DnError::MissingEquals("test".to_owned())));
        assert_eq!(Dn::parse("cn=a,,dc=b"), Err(DnError::EmptyRdn(1)));
        assert!(matches!(Dn::parse("1cn=a"), Err(DnError::InvalidType(_))));
        assert!(matches!(Dn::parse("cn=a\\zz"), Err(DnError::InvalidEscape(_))));
        assert_eq!(Dn::from_bytes(&[0xff, 0xfe]), Err(DnError::NotUtf8));
    }

    #[test]
    fn single_rdn() {
        assert!(Rdn::parse("cn=new").is_ok());
        assert_eq!(Rdn::parse("cn=a,dc=b"), Err(DnError::NotSingleRdn(2)));
        assert_eq!(Rdn::parse(""), Err(DnError::NotSingleRdn(0)));
    }
}
