use thiserror::Error;

use crate::grammar::State;
use crate::ldap::LdapMessage;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed length: {0}")]
    MalformedLength(String),
    #[error("unexpected tag 0x{tag:02x} in state {state:?}")]
    UnexpectedTag { state: State, tag: u8 },
    #[error("invalid {field}: {reason}")]
    InvalidScalar { field: &'static str, reason: String },
    #[error("empty {0}")]
    EmptyRequiredField(&'static str),
    #[error("pdu length {length} exceeds the limit of {limit} bytes")]
    PduTooLarge { length: usize, limit: usize },
    /// A decode failure that already knows which reply the peer expects.
    #[error("{source}")]
    WithResponse {
        source: Box<DecodeError>,
        response: Box<LdapMessage>,
    },
}

impl DecodeError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::InvalidScalar {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        DecodeError::MalformedLength(reason.into())
    }

    pub(crate) fn with_response(self, response: LdapMessage) -> Self {
        match self {
            DecodeError::WithResponse { .. } => self,
            e => DecodeError::WithResponse {
                source: Box::new(e),
                response: Box::new(response),
            },
        }
    }

    /// The underlying failure, without any attached response.
    pub fn kind(&self) -> &DecodeError {
        match self {
            DecodeError::WithResponse { source, .. } => source.kind(),
            e => e,
        }
    }

    /// The reply a server should send before dropping the connection, if one
    /// could be derived from what was decoded so far.
    pub fn response(&self) -> Option<&LdapMessage> {
        match self {
            DecodeError::WithResponse { response, .. } => Some(response),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("output buffer holds {available} bytes but {required} are required")]
    EncodeOverflow { required: usize, available: usize },
    #[error("message id {0} is outside 0..=2147483647")]
    InvalidMessageId(u32),
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("{field} value {value} is out of range")]
    OutOfRange { field: &'static str, value: u64 },
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("connection closed in the middle of a pdu")]
    UnexpectedEof,
}
