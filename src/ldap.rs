use bytes::Bytes;

use crate::control::{Control, SyncInfoValue};
use crate::dn::{Dn, Rdn};
use crate::filter::Filter;

/// An attribute value. Whether the bytes are kept as text is decided by the
/// binary attribute detector at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Text(String),
    Binary(Bytes),
}

impl Value {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Text(s) => s.as_bytes(),
            Value::Binary(b) => b,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Value::Binary(_))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(Bytes::from(b))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<Value>,
}

impl Attribute {
    pub fn new(name: &str, values: Vec<Value>) -> Self {
        Self {
            name: name.to_owned(),
            values,
        }
    }
}

/// Result codes of RFC 4511 plus the ones later RFCs registered. Codes this
/// crate does not name survive decoding as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    OperationsError,
    ProtocolError,
    TimeLimitExceeded,
    SizeLimitExceeded,
    CompareFalse,
    CompareTrue,
    AuthMethodNotSupported,
    StrongerAuthRequired,
    Referral,
    AdminLimitExceeded,
    UnavailableCriticalExtension,
    ConfidentialityRequired,
    SaslBindInProgress,
    NoSuchAttribute,
    UndefinedAttributeType,
    InappropriateMatching,
    ConstraintViolation,
    AttributeOrValueExists,
    InvalidAttributeSyntax,
    NoSuchObject,
    AliasProblem,
    InvalidDnSyntax,
    AliasDereferencingProblem,
    InappropriateAuthentication,
    InvalidCredentials,
    InsufficientAccessRights,
    Busy,
    Unavailable,
    UnwillingToPerform,
    LoopDetect,
    NamingViolation,
    ObjectClassViolation,
    NotAllowedOnNonLeaf,
    NotAllowedOnRdn,
    EntryAlreadyExists,
    ObjectClassModsProhibited,
    AffectsMultipleDsas,
    Other80,
    Canceled,
    NoSuchOperation,
    TooLate,
    CannotCancel,
    AssertionFailed,
    AuthorizationDenied,
    SyncRefreshRequired,
    Other(u32),
}

macro_rules! result_codes {
    ($($variant:ident = $code:literal,)*) => {
        impl ResultCode {
            pub fn code(&self) -> u32 {
                match self {
                    $(ResultCode::$variant => $code,)*
                    ResultCode::Other(c) => *c,
                }
            }
        }

        impl From<u32> for ResultCode {
            fn from(code: u32) -> Self {
                match code {
                    $($code => ResultCode::$variant,)*
                    c => ResultCode::Other(c),
                }
            }
        }
    };
}

result_codes! {
    Success = 0,
    OperationsError = 1,
    ProtocolError = 2,
    TimeLimitExceeded = 3,
    SizeLimitExceeded = 4,
    CompareFalse = 5,
    CompareTrue = 6,
    AuthMethodNotSupported = 7,
    StrongerAuthRequired = 8,
    Referral = 10,
    AdminLimitExceeded = 11,
    UnavailableCriticalExtension = 12,
    ConfidentialityRequired = 13,
    SaslBindInProgress = 14,
    NoSuchAttribute = 16,
    UndefinedAttributeType = 17,
    InappropriateMatching = 18,
    ConstraintViolation = 19,
    AttributeOrValueExists = 20,
    InvalidAttributeSyntax = 21,
    NoSuchObject = 32,
    AliasProblem = 33,
    InvalidDnSyntax = 34,
    AliasDereferencingProblem = 36,
    InappropriateAuthentication = 48,
    InvalidCredentials = 49,
    InsufficientAccessRights = 50,
    Busy = 51,
    Unavailable = 52,
    UnwillingToPerform = 53,
    LoopDetect = 54,
    NamingViolation = 64,
    ObjectClassViolation = 65,
    NotAllowedOnNonLeaf = 66,
    NotAllowedOnRdn = 67,
    EntryAlreadyExists = 68,
    ObjectClassModsProhibited = 69,
    AffectsMultipleDsas = 71,
    Other80 = 80,
    Canceled = 118,
    NoSuchOperation = 119,
    TooLate = 120,
    CannotCancel = 121,
    AssertionFailed = 122,
    AuthorizationDenied = 123,
    SyncRefreshRequired = 4096,
}

impl Default for ResultCode {
    fn default() -> Self {
        ResultCode::Success
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapResult {
    pub code: ResultCode,
    pub matched_dn: Dn,
    pub message: String,
    /// Referral URIs; empty means the field is absent.
    pub referrals: Vec<String>,
}

impl LdapResult {
    pub fn new(code: ResultCode, matched_dn: Dn, message: &str) -> Self {
        Self {
            code,
            matched_dn,
            message: message.to_owned(),
            referrals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    BaseObject = 0,
    SingleLevel = 1,
    WholeSubtree = 2,
}

impl TryFrom<i64> for SearchScope {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SearchScope::BaseObject),
            1 => Ok(SearchScope::SingleLevel),
            2 => Ok(SearchScope::WholeSubtree),
            v => Err(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerefAliases {
    NeverDerefAliases = 0,
    DerefInSearching = 1,
    DerefFindingBaseObj = 2,
    DerefAlways = 3,
}

impl TryFrom<i64> for DerefAliases {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DerefAliases::NeverDerefAliases),
            1 => Ok(DerefAliases::DerefInSearching),
            2 => Ok(DerefAliases::DerefFindingBaseObj),
            3 => Ok(DerefAliases::DerefAlways),
            v => Err(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOperation {
    Add = 0,
    Delete = 1,
    Replace = 2,
    Increment = 3,
}

impl TryFrom<i64> for ModifyOperation {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ModifyOperation::Add),
            1 => Ok(ModifyOperation::Delete),
            2 => Ok(ModifyOperation::Replace),
            3 => Ok(ModifyOperation::Increment),
            v => Err(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub operation: ModifyOperation,
    pub attribute: Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Simple(Bytes),
    Sasl {
        mechanism: String,
        credentials: Option<Bytes>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgBind {
    pub version: u8,
    pub name: Dn,
    pub authentication: Authentication,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgBindResponse {
    pub result: LdapResult,
    pub server_sasl_creds: Option<Bytes>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgUnbind {
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgSearch {
    pub base_object: Dn,
    pub scope: SearchScope,
    pub deref: DerefAliases,
    pub size_limit: u32,
    pub time_limit: u32,
    pub types_only: bool,
    pub filter: Filter,
    pub attributes: Vec<String>,
}

/// A SearchResultEntry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgSearchResult {
    pub name: Dn,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgSearchResultDone {
    pub result: LdapResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgSearchResultReference {
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgModify {
    pub object: Dn,
    pub changes: Vec<Modification>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgModifyResponse {
    pub result: LdapResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgAdd {
    pub entry: Dn,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgAddResponse {
    pub result: LdapResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgDel {
    pub entry: Dn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgDelResponse {
    pub result: LdapResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgModifyDn {
    pub entry: Dn,
    pub new_rdn: Rdn,
    pub delete_old_rdn: bool,
    pub new_superior: Option<Dn>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgModifyDnResponse {
    pub result: LdapResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgCompare {
    pub entry: Dn,
    pub attribute: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgCompareResponse {
    pub result: LdapResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgAbandon {
    pub id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgExtended {
    pub name: String,
    pub value: Option<Bytes>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgExtendedResponse {
    pub result: LdapResult,
    pub name: Option<String>,
    pub value: Option<Bytes>,
}

/// Value of an IntermediateResponse. It is typed when the response name is
/// one this crate knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntermediateValue {
    SyncInfo(SyncInfoValue),
    Opaque(Bytes),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgIntermediate {
    pub name: Option<String>,
    pub value: Option<IntermediateValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageParams {
    Bind(MsgBind),
    BindResponse(MsgBindResponse),
    Unbind(MsgUnbind),
    Search(MsgSearch),
    SearchResult(MsgSearchResult),
    SearchResultDone(MsgSearchResultDone),
    SearchResultReference(MsgSearchResultReference),
    Modify(MsgModify),
    ModifyResponse(MsgModifyResponse),
    Add(MsgAdd),
    AddResponse(MsgAddResponse),
    Del(MsgDel),
    DelResponse(MsgDelResponse),
    ModifyDn(MsgModifyDn),
    ModifyDnResponse(MsgModifyDnResponse),
    Compare(MsgCompare),
    CompareResponse(MsgCompareResponse),
    Abandon(MsgAbandon),
    Extended(MsgExtended),
    ExtendedResponse(MsgExtendedResponse),
    Intermediate(MsgIntermediate),
}

impl MessageParams {
    pub fn name(&self) -> &'static str {
        match self {
            MessageParams::Bind(_) => "BindRequest",
            MessageParams::BindResponse(_) => "BindResponse",
            MessageParams::Unbind(_) => "UnbindRequest",
            MessageParams::Search(_) => "SearchRequest",
            MessageParams::SearchResult(_) => "SearchResultEntry",
            MessageParams::SearchResultDone(_) => "SearchResultDone",
            MessageParams::SearchResultReference(_) => "SearchResultReference",
            MessageParams::Modify(_) => "ModifyRequest",
            MessageParams::ModifyResponse(_) => "ModifyResponse",
            MessageParams::Add(_) => "AddRequest",
            MessageParams::AddResponse(_) => "AddResponse",
            MessageParams::Del(_) => "DelRequest",
            MessageParams::DelResponse(_) => "DelResponse",
            MessageParams::ModifyDn(_) => "ModifyDNRequest",
            MessageParams::ModifyDnResponse(_) => "ModifyDNResponse",
            MessageParams::Compare(_) => "CompareRequest",
            MessageParams::CompareResponse(_) => "CompareResponse",
            MessageParams::Abandon(_) => "AbandonRequest",
            MessageParams::Extended(_) => "ExtendedRequest",
            MessageParams::ExtendedResponse(_) => "ExtendedResponse",
            MessageParams::Intermediate(_) => "IntermediateResponse",
        }
    }

    /// The response a server sends back for this request with `result`, for
    /// requests that have exactly one.
    pub fn response(&self, result: LdapResult) -> Option<MessageParams> {
        Some(match self {
            MessageParams::Bind(_) => MessageParams::BindResponse(MsgBindResponse {
                result,
                server_sasl_creds: None,
            }),
            MessageParams::Search(_) => MessageParams::SearchResultDone(MsgSearchResultDone { result }),
            MessageParams::Modify(_) => MessageParams::ModifyResponse(MsgModifyResponse { result }),
            MessageParams::Add(_) => MessageParams::AddResponse(MsgAddResponse { result }),
            MessageParams::Del(_) => MessageParams::DelResponse(MsgDelResponse { result }),
            MessageParams::ModifyDn(_) => MessageParams::ModifyDnResponse(MsgModifyDnResponse { result }),
            MessageParams::Compare(_) => MessageParams::CompareResponse(MsgCompareResponse { result }),
            _ => return None,
        })
    }

    pub fn result(&self) -> Option<&LdapResult> {
        match self {
            MessageParams::BindResponse(r) => Some(&r.result),
            MessageParams::SearchResultDone(r) => Some(&r.result),
            MessageParams::ModifyResponse(r) => Some(&r.result),
            MessageParams::AddResponse(r) => Some(&r.result),
            MessageParams::DelResponse(r) => Some(&r.result),
            MessageParams::ModifyDnResponse(r) => Some(&r.result),
            MessageParams::CompareResponse(r) => Some(&r.result),
            MessageParams::ExtendedResponse(r) => Some(&r.result),
            _ => None,
        }
    }

    pub(crate) fn result_mut(&mut self) -> Option<&mut LdapResult> {
        match self {
            MessageParams::BindResponse(r) => Some(&mut r.result),
            MessageParams::SearchResultDone(r) => Some(&mut r.result),
            MessageParams::ModifyResponse(r) => Some(&mut r.result),
            MessageParams::AddResponse(r) => Some(&mut r.result),
            MessageParams::DelResponse(r) => Some(&mut r.result),
            MessageParams::ModifyDnResponse(r) => Some(&mut r.result),
            MessageParams::CompareResponse(r) => Some(&mut r.result),
            MessageParams::ExtendedResponse(r) => Some(&mut r.result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapMessage {
    pub id: u32,
    pub params: MessageParams,
    pub controls: Vec<Control>,
}

impl LdapMessage {
    pub fn new(id: u32, params: MessageParams) -> Self {
        Self {
            id,
            params,
            controls: Vec::new(),
        }
    }
}


#[test]
fn result_code_test() {
    assert_eq!(ResultCode::from(0), ResultCode::Success);
    assert_eq!(ResultCode::from(34), ResultCode::InvalidDnSyntax);
    assert_eq!(ResultCode::InvalidCredentials.code(), 49);
    assert_eq!(ResultCode::from(4096), ResultCode::SyncRefreshRequired);
    assert_eq!(ResultCode::from(16654), ResultCode::Other(16654));
    assert_eq!(ResultCode::Other(16654).code(), 16654);
}

#[test]
fn response_test() {
    let req = MessageParams::Del(MsgDel { entry: Dn::parse("dc=test").unwrap() });
    let resp = req
        .response(LdapResult::new(ResultCode::NoSuchObject, Dn::root(), "gone"))
        .unwrap();
    assert_eq!(resp.name(), "DelResponse");
    assert_eq!(resp.result().unwrap().code, ResultCode::NoSuchObject);
    assert!(MessageParams::Unbind(MsgUnbind {}).response(LdapResult::default()).is_none());
}
