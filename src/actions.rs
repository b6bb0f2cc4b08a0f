//! Actions run by the transitions of the grammar table.
//!
//! An action sees the token that triggered the transition and the container
//! before the token is accounted for: for a constructed token the innermost
//! level is still its parent.

use bytes::Bytes;
use log::warn;

use crate::asn1;
use crate::config::DecoderConfig;
use crate::container::{DecodeContainer, PendingControl};
use crate::control::{SyncInfoValue, SYNC_INFO};
use crate::dn::{Dn, Rdn};
use crate::error::DecodeError;
use crate::filter::{Connector, Filter, LeafKind};
use crate::grammar::State;
use crate::ldap::*;
use crate::tlv::Token;

type Outcome = Result<(), DecodeError>;

const MAX_INT: i64 = i32::MAX as i64;

/// Index of the protocol op level in the decode stack.
const OP_LEVEL: usize = 1;

/// The op under construction, which the grammar guarantees to be `$variant`.
macro_rules! op {
    ($c:expr, $variant:ident) => {
        match $c.params.as_mut() {
            Some(MessageParams::$variant(m)) => m,
            _ => {
                return Err(DecodeError::malformed(concat!(
                    "no ",
                    stringify!($variant),
                    " under construction"
                )))
            }
        }
    };
}

fn unexpected(c: &DecodeContainer, t: &Token) -> DecodeError {
    DecodeError::UnexpectedTag {
        state: c.state,
        tag: t.tag(),
    }
}

/// A tag that may either continue the innermost construct or follow it is
/// only accepted when the innermost open level is `level`.
fn expect_level(c: &DecodeContainer, t: &Token, level: State) -> Outcome {
    match c.stack.last() {
        Some(l) if l.state == level => Ok(()),
        _ => Err(unexpected(c, t)),
    }
}

fn non_empty(t: &Token, field: &'static str) -> Result<String, DecodeError> {
    if t.value.is_empty() {
        return Err(DecodeError::EmptyRequiredField(field));
    }
    asn1::parse_string(&t.value, field)
}

fn dn(t: &Token, field: &'static str) -> Result<Dn, DecodeError> {
    Dn::from_bytes(&t.value).map_err(|e| DecodeError::invalid(field, e.to_string()))
}

/// Values of binary attributes stay raw, others become text unless they are
/// not UTF-8.
fn value(config: &DecoderConfig, attribute: Option<&str>, raw: Bytes) -> Value {
    if attribute.is_some_and(|a| config.is_binary(a)) {
        return Value::Binary(raw);
    }
    match std::str::from_utf8(&raw) {
        Ok(s) => Value::Text(s.to_owned()),
        Err(_) => {
            warn!("value of {} is not utf-8, keeping it binary", attribute.unwrap_or("?"));
            Value::Binary(raw)
        }
    }
}

pub(crate) fn start_message(_c: &mut DecodeContainer, _t: &Token) -> Outcome {
    Ok(())
}

pub(crate) fn message_id(c: &mut DecodeContainer, t: &Token) -> Outcome {
    c.id = Some(asn1::parse_integer(&t.value, "message id", 0, MAX_INT)? as u32);
    Ok(())
}

// BindRequest

pub(crate) fn bind_request(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.params = Some(MessageParams::Bind(MsgBind {
        version: 0,
        name: Dn::root(),
        authentication: Authentication::Simple(Bytes::new()),
    }));
    Ok(())
}

pub(crate) fn bind_version(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let version = asn1::parse_integer(&t.value, "bind version", 1, 127)
        .map_err(|e| c.reply(e, ResultCode::ProtocolError))?;
    op!(c, Bind).version = version as u8;
    Ok(())
}

pub(crate) fn bind_name(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let name = dn(t, "bind name").map_err(|e| c.reply(e, ResultCode::InvalidCredentials))?;
    op!(c, Bind).name = name;
    Ok(())
}

pub(crate) fn bind_simple(c: &mut DecodeContainer, t: &Token) -> Outcome {
    op!(c, Bind).authentication = Authentication::Simple(t.value.clone());
    Ok(())
}

pub(crate) fn bind_sasl(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    op!(c, Bind).authentication = Authentication::Sasl {
        mechanism: String::new(),
        credentials: None,
    };
    Ok(())
}

pub(crate) fn sasl_mechanism(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let mechanism = asn1::parse_string(&t.value, "sasl mechanism")?;
    if let Authentication::Sasl { mechanism: m, .. } = &mut op!(c, Bind).authentication {
        *m = mechanism;
    }
    Ok(())
}

pub(crate) fn sasl_credentials(c: &mut DecodeContainer, t: &Token) -> Outcome {
    if let Authentication::Sasl { credentials, .. } = &mut op!(c, Bind).authentication {
        *credentials = Some(t.value.clone());
    }
    Ok(())
}

// LDAPResult

pub(crate) fn response_start(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let params = match t.tag() {
        asn1::BIND_RESPONSE => MessageParams::BindResponse(MsgBindResponse::default()),
        asn1::SEARCH_RESULT_DONE => MessageParams::SearchResultDone(MsgSearchResultDone::default()),
        asn1::MODIFY_RESPONSE => MessageParams::ModifyResponse(MsgModifyResponse::default()),
        asn1::ADD_RESPONSE => MessageParams::AddResponse(MsgAddResponse::default()),
        asn1::DEL_RESPONSE => MessageParams::DelResponse(MsgDelResponse::default()),
        asn1::MODIFY_DN_RESPONSE => MessageParams::ModifyDnResponse(MsgModifyDnResponse::default()),
        asn1::COMPARE_RESPONSE => MessageParams::CompareResponse(MsgCompareResponse::default()),
        asn1::EXTENDED_RESPONSE => MessageParams::ExtendedResponse(MsgExtendedResponse::default()),
        _ => return Err(unexpected(c, t)),
    };
    c.params = Some(params);
    Ok(())
}

fn result_mut(c: &mut DecodeContainer) -> Result<&mut LdapResult, DecodeError> {
    c.params
        .as_mut()
        .and_then(|p| p.result_mut())
        .ok_or_else(|| DecodeError::malformed("no response under construction"))
}

pub(crate) fn result_code(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let code = asn1::parse_integer(&t.value, "result code", 0, MAX_INT)?;
    result_mut(c)?.code = ResultCode::from(code as u32);
    Ok(())
}

pub(crate) fn matched_dn(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let matched = match Dn::from_bytes(&t.value) {
        Ok(dn) => dn,
        Err(e) => {
            warn!("ignoring invalid matched dn: {}", e);
            Dn::root()
        }
    };
    result_mut(c)?.matched_dn = matched;
    Ok(())
}

pub(crate) fn diagnostic_message(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let message = asn1::parse_string(&t.value, "diagnostic message")?;
    result_mut(c)?.message = message;
    Ok(())
}

pub(crate) fn referrals(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::LdapResponse)
}

pub(crate) fn referral(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::Referrals)?;
    let uri = non_empty(t, "referral")?;
    result_mut(c)?.referrals.push(uri);
    Ok(())
}

pub(crate) fn server_sasl_creds(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::LdapResponse)?;
    match c.params.as_mut() {
        Some(MessageParams::BindResponse(r)) => {
            r.server_sasl_creds = Some(t.value.clone());
            Ok(())
        }
        _ => Err(unexpected(c, t)),
    }
}

pub(crate) fn extended_response_name(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::LdapResponse)?;
    let name = asn1::parse_oid(&t.value, "response name")?;
    match c.params.as_mut() {
        Some(MessageParams::ExtendedResponse(r)) => {
            r.name = Some(name);
            Ok(())
        }
        _ => Err(unexpected(c, t)),
    }
}

pub(crate) fn extended_response_value(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::LdapResponse)?;
    match c.params.as_mut() {
        Some(MessageParams::ExtendedResponse(r)) => {
            r.value = Some(t.value.clone());
            Ok(())
        }
        _ => Err(unexpected(c, t)),
    }
}

// Primitive ops

pub(crate) fn unbind_request(c: &mut DecodeContainer, t: &Token) -> Outcome {
    if !t.value.is_empty() {
        return Err(DecodeError::invalid("unbind request", "NULL with content"));
    }
    c.params = Some(MessageParams::Unbind(MsgUnbind {}));
    Ok(())
}

pub(crate) fn del_request(c: &mut DecodeContainer, t: &Token) -> Outcome {
    c.params = Some(MessageParams::Del(MsgDel::default()));
    let entry = dn(t, "entry").map_err(|e| c.reply(e, ResultCode::InvalidDnSyntax))?;
    op!(c, Del).entry = entry;
    Ok(())
}

pub(crate) fn abandon_request(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let id = asn1::parse_integer(&t.value, "abandoned message id", 0, MAX_INT)?;
    c.params = Some(MessageParams::Abandon(MsgAbandon { id: id as u32 }));
    Ok(())
}

// SearchRequest

pub(crate) fn search_request(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.filter.clear();
    c.params = Some(MessageParams::Search(MsgSearch {
        base_object: Dn::root(),
        scope: SearchScope::BaseObject,
        deref: DerefAliases::NeverDerefAliases,
        size_limit: 0,
        time_limit: 0,
        types_only: false,
        filter: Filter::And(Vec::new()),
        attributes: Vec::new(),
    }));
    Ok(())
}

pub(crate) fn search_base(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let base = dn(t, "base object").map_err(|e| c.reply(e, ResultCode::InvalidDnSyntax))?;
    op!(c, Search).base_object = base;
    Ok(())
}

fn enumerated<T: TryFrom<i64, Error = i64>>(
    c: &DecodeContainer,
    t: &Token,
    field: &'static str,
) -> Result<T, DecodeError> {
    asn1::parse_integer(&t.value, field, i64::MIN, i64::MAX)
        .and_then(|v| T::try_from(v).map_err(|v| DecodeError::invalid(field, format!("unknown value {}", v))))
        .map_err(|e| c.reply(e, ResultCode::ProtocolError))
}

pub(crate) fn search_scope(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let scope = enumerated(c, t, "scope")?;
    op!(c, Search).scope = scope;
    Ok(())
}

pub(crate) fn search_deref(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let deref = enumerated(c, t, "deref aliases")?;
    op!(c, Search).deref = deref;
    Ok(())
}

pub(crate) fn size_limit(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let limit = asn1::parse_integer(&t.value, "size limit", 0, MAX_INT)
        .map_err(|e| c.reply(e, ResultCode::ProtocolError))?;
    op!(c, Search).size_limit = limit as u32;
    Ok(())
}

pub(crate) fn time_limit(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let limit = asn1::parse_integer(&t.value, "time limit", 0, MAX_INT)
        .map_err(|e| c.reply(e, ResultCode::ProtocolError))?;
    op!(c, Search).time_limit = limit as u32;
    Ok(())
}

pub(crate) fn types_only(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let types_only = asn1::parse_boolean(&t.value, "types only")?;
    op!(c, Search).types_only = types_only;
    Ok(())
}

// Filter

/// A filter element belongs to the innermost open connector, or to the
/// SearchRequest itself when none is open.
fn filter_position(c: &DecodeContainer, t: &Token) -> Outcome {
    let parent = c.filter.parent_level().unwrap_or(OP_LEVEL);
    if c.stack.len() != parent + 1 {
        return Err(unexpected(c, t));
    }
    Ok(())
}

fn open_connector(c: &mut DecodeContainer, t: &Token, connector: Connector) -> Outcome {
    filter_position(c, t)?;
    let level = c.stack.len();
    c.filter.open_connector(connector, level)
}

fn open_leaf(c: &mut DecodeContainer, t: &Token, kind: LeafKind) -> Outcome {
    filter_position(c, t)?;
    c.filter.open_leaf(kind)
}

pub(crate) fn filter_and(c: &mut DecodeContainer, t: &Token) -> Outcome {
    open_connector(c, t, Connector::And)
}

pub(crate) fn filter_or(c: &mut DecodeContainer, t: &Token) -> Outcome {
    open_connector(c, t, Connector::Or)
}

pub(crate) fn filter_not(c: &mut DecodeContainer, t: &Token) -> Outcome {
    open_connector(c, t, Connector::Not)
}

pub(crate) fn filter_equality(c: &mut DecodeContainer, t: &Token) -> Outcome {
    open_leaf(c, t, LeafKind::Equality)
}

pub(crate) fn filter_substrings(c: &mut DecodeContainer, t: &Token) -> Outcome {
    open_leaf(c, t, LeafKind::Substrings)
}

pub(crate) fn filter_greater_or_equal(c: &mut DecodeContainer, t: &Token) -> Outcome {
    open_leaf(c, t, LeafKind::GreaterOrEqual)
}

pub(crate) fn filter_less_or_equal(c: &mut DecodeContainer, t: &Token) -> Outcome {
    open_leaf(c, t, LeafKind::LessOrEqual)
}

pub(crate) fn filter_approx(c: &mut DecodeContainer, t: &Token) -> Outcome {
    open_leaf(c, t, LeafKind::Approx)
}

pub(crate) fn filter_extensible(c: &mut DecodeContainer, t: &Token) -> Outcome {
    open_leaf(c, t, LeafKind::Extensible)
}

pub(crate) fn filter_present(c: &mut DecodeContainer, t: &Token) -> Outcome {
    filter_position(c, t)?;
    let attribute = non_empty(t, "present attribute")?;
    c.filter.add_present(attribute)
}

pub(crate) fn assertion_attribute(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let attribute = non_empty(t, "assertion attribute")?;
    c.filter.leaf_mut()?.attribute = Some(attribute);
    Ok(())
}

pub(crate) fn assertion_value(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let leaf = c.filter.leaf_mut()?;
    leaf.value = Some(value(&c.config, leaf.attribute.as_deref(), t.value.clone()));
    Ok(())
}

pub(crate) fn substrings_type(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let attribute = non_empty(t, "substrings type")?;
    c.filter.leaf_mut()?.attribute = Some(attribute);
    Ok(())
}

pub(crate) fn substrings_seq(_c: &mut DecodeContainer, _t: &Token) -> Outcome {
    Ok(())
}

pub(crate) fn substring_initial(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::SubstringsSeq)?;
    let leaf = c.filter.leaf_mut()?;
    leaf.initial = Some(value(&c.config, leaf.attribute.as_deref(), t.value.clone()));
    Ok(())
}

pub(crate) fn substring_any(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::SubstringsSeq)?;
    let leaf = c.filter.leaf_mut()?;
    let v = value(&c.config, leaf.attribute.as_deref(), t.value.clone());
    leaf.any.push(v);
    Ok(())
}

pub(crate) fn substring_final(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::SubstringsSeq)?;
    let leaf = c.filter.leaf_mut()?;
    leaf.final_ = Some(value(&c.config, leaf.attribute.as_deref(), t.value.clone()));
    Ok(())
}

pub(crate) fn matching_rule(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let rule = non_empty(t, "matching rule")?;
    c.filter.leaf_mut()?.matching_rule = Some(rule);
    Ok(())
}

pub(crate) fn match_type(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let attribute = non_empty(t, "match type")?;
    c.filter.leaf_mut()?.attribute = Some(attribute);
    Ok(())
}

pub(crate) fn match_value(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let leaf = c.filter.leaf_mut()?;
    leaf.value = Some(value(&c.config, leaf.attribute.as_deref(), t.value.clone()));
    Ok(())
}

pub(crate) fn dn_attributes(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let dn_attributes = asn1::parse_boolean(&t.value, "dn attributes")?;
    c.filter.leaf_mut()?.dn_attributes = dn_attributes;
    Ok(())
}

pub(crate) fn search_attributes(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::SearchRequest)?;
    let filter = c.filter.finish()?;
    op!(c, Search).filter = filter;
    Ok(())
}

pub(crate) fn search_attribute(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::SearchAttributes)?;
    let attribute = asn1::parse_string(&t.value, "attribute selector")?;
    op!(c, Search).attributes.push(attribute);
    Ok(())
}

// SearchResultEntry, AddRequest and their attributes

pub(crate) fn search_result_entry(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.params = Some(MessageParams::SearchResult(MsgSearchResult::default()));
    Ok(())
}

pub(crate) fn entry_name(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let name = dn(t, "object name")?;
    op!(c, SearchResult).name = name;
    Ok(())
}

pub(crate) fn add_request(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.params = Some(MessageParams::Add(MsgAdd::default()));
    Ok(())
}

pub(crate) fn add_entry(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let entry = dn(t, "entry").map_err(|e| c.reply(e, ResultCode::NamingViolation))?;
    op!(c, Add).entry = entry;
    Ok(())
}

pub(crate) fn attribute_list(_c: &mut DecodeContainer, _t: &Token) -> Outcome {
    Ok(())
}

pub(crate) fn partial_attribute(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::AttributeList)?;
    c.attribute = Some(Attribute::default());
    Ok(())
}

pub(crate) fn attribute_type(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let name = non_empty(t, "attribute type")?;
    match c.attribute.as_mut() {
        Some(a) => a.name = name,
        None => return Err(DecodeError::malformed("attribute type outside of an attribute")),
    }
    Ok(())
}

pub(crate) fn attribute_vals(_c: &mut DecodeContainer, _t: &Token) -> Outcome {
    Ok(())
}

fn push_value(c: &mut DecodeContainer, t: &Token, vals: State) -> Outcome {
    expect_level(c, t, vals)?;
    let attribute = c
        .attribute
        .as_mut()
        .ok_or_else(|| DecodeError::malformed("value outside of an attribute"))?;
    let v = value(&c.config, Some(&attribute.name), t.value.clone());
    attribute.values.push(v);
    Ok(())
}

pub(crate) fn attribute_value(c: &mut DecodeContainer, t: &Token) -> Outcome {
    push_value(c, t, State::AttributeVals)
}

pub(crate) fn search_result_reference(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.params = Some(MessageParams::SearchResultReference(MsgSearchResultReference::default()));
    Ok(())
}

pub(crate) fn reference_uri(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::SearchResultReference)?;
    let uri = non_empty(t, "search reference uri")?;
    op!(c, SearchResultReference).uris.push(uri);
    Ok(())
}

// ModifyRequest

pub(crate) fn modify_request(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.params = Some(MessageParams::Modify(MsgModify::default()));
    Ok(())
}

pub(crate) fn modify_object(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let object = dn(t, "object").map_err(|e| c.reply(e, ResultCode::InvalidDnSyntax))?;
    op!(c, Modify).object = object;
    Ok(())
}

pub(crate) fn modify_changes(_c: &mut DecodeContainer, _t: &Token) -> Outcome {
    Ok(())
}

pub(crate) fn modify_change(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::ModifyChanges)?;
    c.operation = None;
    c.attribute = None;
    Ok(())
}

pub(crate) fn modify_operation(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let operation = enumerated(c, t, "modify operation")?;
    c.operation = Some(operation);
    Ok(())
}

pub(crate) fn modify_attribute(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.attribute = Some(Attribute::default());
    Ok(())
}

pub(crate) fn modify_attribute_value(c: &mut DecodeContainer, t: &Token) -> Outcome {
    push_value(c, t, State::ModifyAttributeVals)
}

// ModifyDNRequest

pub(crate) fn modify_dn_request(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.params = Some(MessageParams::ModifyDn(MsgModifyDn {
        entry: Dn::root(),
        new_rdn: Rdn::empty(),
        delete_old_rdn: false,
        new_superior: None,
    }));
    Ok(())
}

pub(crate) fn modify_dn_entry(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let entry = dn(t, "entry").map_err(|e| c.reply(e, ResultCode::InvalidDnSyntax))?;
    op!(c, ModifyDn).entry = entry;
    Ok(())
}

pub(crate) fn modify_dn_new_rdn(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let rdn = Rdn::from_bytes(&t.value)
        .map_err(|e| DecodeError::invalid("new rdn", e.to_string()))
        .map_err(|e| c.reply(e, ResultCode::InvalidDnSyntax))?;
    op!(c, ModifyDn).new_rdn = rdn;
    Ok(())
}

pub(crate) fn modify_dn_delete_old_rdn(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let delete_old_rdn = asn1::parse_boolean(&t.value, "delete old rdn")?;
    op!(c, ModifyDn).delete_old_rdn = delete_old_rdn;
    Ok(())
}

pub(crate) fn modify_dn_new_superior(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let superior = dn(t, "new superior").map_err(|e| c.reply(e, ResultCode::InvalidDnSyntax))?;
    op!(c, ModifyDn).new_superior = Some(superior);
    Ok(())
}

// CompareRequest

pub(crate) fn compare_request(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.params = Some(MessageParams::Compare(MsgCompare {
        entry: Dn::root(),
        attribute: String::new(),
        value: Value::Text(String::new()),
    }));
    Ok(())
}

pub(crate) fn compare_entry(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let entry = dn(t, "entry").map_err(|e| c.reply(e, ResultCode::InvalidDnSyntax))?;
    op!(c, Compare).entry = entry;
    Ok(())
}

pub(crate) fn compare_ava(_c: &mut DecodeContainer, _t: &Token) -> Outcome {
    Ok(())
}

pub(crate) fn compare_attribute(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let attribute = non_empty(t, "compare attribute")?;
    op!(c, Compare).attribute = attribute;
    Ok(())
}

pub(crate) fn compare_value(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let compare = op!(c, Compare);
    compare.value = value(&c.config, Some(&compare.attribute), t.value.clone());
    Ok(())
}

// ExtendedRequest and IntermediateResponse

pub(crate) fn extended_request(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.params = Some(MessageParams::Extended(MsgExtended::default()));
    Ok(())
}

pub(crate) fn extended_request_name(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let name = asn1::parse_oid(&t.value, "request name")?;
    op!(c, Extended).name = name;
    Ok(())
}

pub(crate) fn extended_request_value(c: &mut DecodeContainer, t: &Token) -> Outcome {
    op!(c, Extended).value = Some(t.value.clone());
    Ok(())
}

pub(crate) fn intermediate_response(c: &mut DecodeContainer, _t: &Token) -> Outcome {
    c.params = Some(MessageParams::Intermediate(MsgIntermediate::default()));
    Ok(())
}

pub(crate) fn intermediate_name(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let name = asn1::parse_oid(&t.value, "response name")?;
    op!(c, Intermediate).name = Some(name);
    Ok(())
}

pub(crate) fn intermediate_value(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let intermediate = op!(c, Intermediate);
    let value = match intermediate.name.as_deref() {
        Some(SYNC_INFO) => IntermediateValue::SyncInfo(SyncInfoValue::parse(&t.value)?),
        _ => IntermediateValue::Opaque(t.value.clone()),
    };
    intermediate.value = Some(value);
    Ok(())
}

// Controls

pub(crate) fn controls(c: &mut DecodeContainer, t: &Token) -> Outcome {
    if c.stack.len() != 1 {
        return Err(unexpected(c, t));
    }
    Ok(())
}

pub(crate) fn control(c: &mut DecodeContainer, t: &Token) -> Outcome {
    expect_level(c, t, State::Controls)?;
    c.control = Some(PendingControl::default());
    Ok(())
}

fn pending_control(c: &mut DecodeContainer) -> Result<&mut PendingControl, DecodeError> {
    c.control
        .as_mut()
        .ok_or_else(|| DecodeError::malformed("control field outside of a control"))
}

pub(crate) fn control_type(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let oid = asn1::parse_oid(&t.value, "control type")?;
    pending_control(c)?.oid = Some(oid);
    Ok(())
}

pub(crate) fn control_criticality(c: &mut DecodeContainer, t: &Token) -> Outcome {
    let critical = asn1::parse_boolean(&t.value, "criticality")?;
    pending_control(c)?.critical = critical;
    Ok(())
}

pub(crate) fn control_value(c: &mut DecodeContainer, t: &Token) -> Outcome {
    pending_control(c)?.value = Some(t.value.clone());
    Ok(())
}
