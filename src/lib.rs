//! LDAPv3 message codec.
//!
//! Decoding is incremental: bytes can be fed in pieces of any size and a
//! message comes out once its outer SEQUENCE is complete. Encoding computes
//! every length first and then writes the message in one pass.

mod actions;
pub mod asn1;
pub mod codec;
pub mod config;
pub mod container;
pub mod control;
pub mod dn;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod grammar;
pub mod ldap;
pub mod tlv;
pub mod tokiou;

pub use codec::{decode, encode, encode_into, parse_message};
pub use config::DecoderConfig;
pub use container::DecodeContainer;
pub use error::{DecodeError, EncodeError, ReadError};
pub use ldap::LdapMessage;
