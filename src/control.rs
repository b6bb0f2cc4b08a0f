//! Request and response controls.
//!
//! Well-known controls are looked up in a process-wide registry keyed by
//! OID. Each entry builds an empty value that then parses the raw control
//! value. Controls with an unregistered OID keep their value as opaque bytes.

use std::collections::HashMap;

use bytes::Bytes;
use once_cell::sync::Lazy;

use crate::asn1;
use crate::dn::Dn;
use crate::encoder::Sink;
use crate::error::{DecodeError, EncodeError};
use crate::tlv::{self, Token};

pub const MANAGE_DSA_IT: &str = "2.16.840.1.113730.3.4.2";
pub const PAGED_RESULTS: &str = "1.2.840.113556.1.4.319";
pub const PERSISTENT_SEARCH: &str = "2.16.840.1.113730.3.4.3";
pub const ENTRY_CHANGE: &str = "2.16.840.1.113730.3.4.7";
pub const SUBENTRIES: &str = "1.3.6.1.4.1.4203.1.10.1";
pub const SYNC_REQUEST: &str = "1.3.6.1.4.1.4203.1.9.1.1";
/// Sync Info Message, sent as an IntermediateResponse name.
pub const SYNC_INFO: &str = "1.3.6.1.4.1.4203.1.9.1.4";

pub const CHANGE_ADD: u8 = 1;
pub const CHANGE_DELETE: u8 = 2;
pub const CHANGE_MODIFY: u8 = 4;
pub const CHANGE_MODDN: u8 = 8;

const SYNC_NEW_COOKIE: u8 = 0x80;
const SYNC_REFRESH_DELETE: u8 = 0xa1;
const SYNC_REFRESH_PRESENT: u8 = 0xa2;
const SYNC_ID_SET: u8 = 0xa3;

const FIELD: &str = "control value";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagedResults {
    pub size: u32,
    pub cookie: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistentSearch {
    /// Bit set of the CHANGE_* values.
    pub change_types: u8,
    pub changes_only: bool,
    pub return_ecs: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryChange {
    pub change_type: u8,
    pub previous_dn: Option<Dn>,
    pub change_number: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    RefreshOnly = 1,
    RefreshAndPersist = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub mode: SyncMode,
    pub cookie: Option<Bytes>,
    pub reload_hint: bool,
}

impl Default for SyncRequest {
    fn default() -> Self {
        Self {
            mode: SyncMode::RefreshOnly,
            cookie: None,
            reload_hint: false,
        }
    }
}

/// syncInfoValue of RFC 4533.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncInfoValue {
    NewCookie(Bytes),
    RefreshDelete {
        cookie: Option<Bytes>,
        refresh_done: bool,
    },
    RefreshPresent {
        cookie: Option<Bytes>,
        refresh_done: bool,
    },
    SyncIdSet {
        cookie: Option<Bytes>,
        refresh_deletes: bool,
        uuids: Vec<[u8; 16]>,
    },
}

impl Default for SyncInfoValue {
    fn default() -> Self {
        SyncInfoValue::NewCookie(Bytes::new())
    }
}

impl SyncInfoValue {
    pub fn parse(raw: &[u8]) -> Result<Self, DecodeError> {
        const INFO: &str = "sync info";
        let tokens = tlv::read_tokens(raw)?;
        let (choice, items) = match tokens.split_first() {
            Some((t, items)) if t.header.total_len() == Some(raw.len()) => (t, items),
            _ => return Err(DecodeError::invalid(INFO, "not a single choice")),
        };

        if choice.tag() == SYNC_NEW_COOKIE {
            return Ok(SyncInfoValue::NewCookie(choice.value.clone()));
        }

        let mut i = 0;
        let mut cookie = None;
        if let Some(t) = items.get(i).filter(|t| t.tag() == asn1::OCTET_STRING) {
            cookie = Some(t.value.clone());
            i += 1;
        }
        let info = match choice.tag() {
            SYNC_REFRESH_DELETE => SyncInfoValue::RefreshDelete {
                cookie,
                refresh_done: optional_boolean(items, &mut i, true, "refresh done")?,
            },
            SYNC_REFRESH_PRESENT => SyncInfoValue::RefreshPresent {
                cookie,
                refresh_done: optional_boolean(items, &mut i, true, "refresh done")?,
            },
            SYNC_ID_SET => {
                let refresh_deletes = optional_boolean(items, &mut i, false, "refresh deletes")?;
                let set = expect(items, i, asn1::SET)?;
                let members = &items[i + 1..];
                let content: usize = members.iter().filter_map(|t| t.header.total_len()).sum();
                if content != set.length() {
                    return Err(DecodeError::invalid(INFO, "trailing data"));
                }
                let mut uuids = Vec::with_capacity(members.len());
                for t in members {
                    if t.tag() != asn1::OCTET_STRING {
                        return Err(DecodeError::invalid("sync uuid", format!("unexpected tag 0x{:02x}", t.tag())));
                    }
                    let uuid = <[u8; 16]>::try_from(&t.value[..])
                        .map_err(|_| DecodeError::invalid("sync uuid", format!("{} bytes", t.value.len())))?;
                    uuids.push(uuid);
                }
                i = items.len();
                SyncInfoValue::SyncIdSet {
                    cookie,
                    refresh_deletes,
                    uuids,
                }
            }
            tag => return Err(DecodeError::invalid(INFO, format!("unknown choice 0x{:02x}", tag))),
        };
        if items.len() != i {
            return Err(DecodeError::invalid(INFO, "trailing data"));
        }
        Ok(info)
    }

    pub(crate) fn encode<S: Sink>(&self, s: &mut S) -> Result<(), EncodeError> {
        match self {
            SyncInfoValue::NewCookie(cookie) => s.octets(SYNC_NEW_COOKIE, cookie),
            SyncInfoValue::RefreshDelete { cookie, refresh_done } => {
                s.constructed(SYNC_REFRESH_DELETE, |s| refresh_phase(s, cookie, *refresh_done))
            }
            SyncInfoValue::RefreshPresent { cookie, refresh_done } => {
                s.constructed(SYNC_REFRESH_PRESENT, |s| refresh_phase(s, cookie, *refresh_done))
            }
            SyncInfoValue::SyncIdSet {
                cookie,
                refresh_deletes,
                uuids,
            } => s.constructed(SYNC_ID_SET, |s| {
                if let Some(cookie) = cookie {
                    s.octets(asn1::OCTET_STRING, cookie)?;
                }
                if *refresh_deletes {
                    s.boolean(asn1::BOOLEAN, true)?;
                }
                s.constructed(asn1::SET, |s| {
                    for uuid in uuids {
                        s.octets(asn1::OCTET_STRING, uuid)?;
                    }
                    Ok(())
                })
            }),
        }
    }
}

/// A BOOLEAN with a DEFAULT, read only when it is the next item.
fn optional_boolean(items: &[Token], i: &mut usize, default: bool, field: &'static str) -> Result<bool, DecodeError> {
    match items.get(*i).filter(|t| t.tag() == asn1::BOOLEAN) {
        Some(t) => {
            *i += 1;
            asn1::parse_boolean(&t.value, field)
        }
        None => Ok(default),
    }
}

fn refresh_phase<S: Sink>(s: &mut S, cookie: &Option<Bytes>, refresh_done: bool) -> Result<(), EncodeError> {
    if let Some(cookie) = cookie {
        s.octets(asn1::OCTET_STRING, cookie)?;
    }
    // DEFAULT TRUE
    if !refresh_done {
        s.boolean(asn1::BOOLEAN, false)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlValue {
    ManageDsaIt,
    PagedResults(PagedResults),
    PersistentSearch(PersistentSearch),
    EntryChange(EntryChange),
    Subentries(bool),
    SyncRequest(SyncRequest),
    SyncInfo(SyncInfoValue),
    /// Value of a control this crate does not know, kept verbatim.
    Opaque(Option<Bytes>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub oid: String,
    pub critical: bool,
    pub value: ControlValue,
}

impl Control {
    pub fn new(oid: &str, critical: bool, value: ControlValue) -> Self {
        Self {
            oid: oid.to_owned(),
            critical,
            value,
        }
    }

    pub fn opaque(oid: &str, critical: bool, value: Option<Bytes>) -> Self {
        Self::new(oid, critical, ControlValue::Opaque(value))
    }
}

pub type ControlFactory = fn() -> ControlValue;

static REGISTRY: Lazy<HashMap<&'static str, ControlFactory>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, ControlFactory> = HashMap::new();
    m.insert(MANAGE_DSA_IT, || ControlValue::ManageDsaIt);
    m.insert(PAGED_RESULTS, || ControlValue::PagedResults(PagedResults::default()));
    m.insert(PERSISTENT_SEARCH, || ControlValue::PersistentSearch(PersistentSearch::default()));
    m.insert(ENTRY_CHANGE, || ControlValue::EntryChange(EntryChange::default()));
    m.insert(SUBENTRIES, || ControlValue::Subentries(false));
    m.insert(SYNC_REQUEST, || ControlValue::SyncRequest(SyncRequest::default()));
    m.insert(SYNC_INFO, || ControlValue::SyncInfo(SyncInfoValue::default()));
    m
});

pub fn factory(oid: &str) -> Option<ControlFactory> {
    REGISTRY.get(oid).copied()
}

/// Builds the value of a control with `oid` from its raw bytes.
pub fn decode_value(oid: &str, raw: Option<Bytes>) -> Result<ControlValue, DecodeError> {
    match factory(oid) {
        Some(make) => make().parse(raw),
        None => Ok(ControlValue::Opaque(raw)),
    }
}

/// Items of a value that must be a single SEQUENCE spanning all of `raw`.
fn sequence_items(raw: &[u8]) -> Result<Vec<Token>, DecodeError> {
    let mut tokens = tlv::read_tokens(raw)?;
    match tokens.first() {
        Some(t) if t.tag() == asn1::SEQUENCE && t.header.total_len() == Some(raw.len()) => {
            tokens.remove(0);
            Ok(tokens)
        }
        _ => Err(DecodeError::invalid(FIELD, "not a single sequence")),
    }
}

fn expect<'a>(items: &'a [Token], i: usize, tag: u8) -> Result<&'a Token, DecodeError> {
    match items.get(i) {
        Some(t) if t.tag() == tag => Ok(t),
        Some(t) => Err(DecodeError::invalid(FIELD, format!("unexpected tag 0x{:02x}", t.tag()))),
        None => Err(DecodeError::invalid(FIELD, "truncated")),
    }
}

fn required(raw: Option<Bytes>) -> Result<Bytes, DecodeError> {
    raw.ok_or_else(|| DecodeError::invalid(FIELD, "missing"))
}

impl ControlValue {
    fn parse(self, raw: Option<Bytes>) -> Result<ControlValue, DecodeError> {
        Ok(match self {
            ControlValue::ManageDsaIt => match raw {
                Some(v) if !v.is_empty() => {
                    return Err(DecodeError::invalid(FIELD, "ManageDsaIT carries no value"))
                }
                _ => ControlValue::ManageDsaIt,
            },
            ControlValue::PagedResults(_) => {
                let raw = required(raw)?;
                let items = sequence_items(&raw)?;
                let size = expect(&items, 0, asn1::INTEGER)?;
                let cookie = expect(&items, 1, asn1::OCTET_STRING)?;
                if items.len() != 2 {
                    return Err(DecodeError::invalid(FIELD, "trailing data"));
                }
                ControlValue::PagedResults(PagedResults {
                    size: asn1::parse_integer(&size.value, "page size", 0, i32::MAX as i64)? as u32,
                    cookie: cookie.value.clone(),
                })
            }
            ControlValue::PersistentSearch(_) => {
                let raw = required(raw)?;
                let items = sequence_items(&raw)?;
                let change_types = expect(&items, 0, asn1::INTEGER)?;
                let changes_only = expect(&items, 1, asn1::BOOLEAN)?;
                let return_ecs = expect(&items, 2, asn1::BOOLEAN)?;
                if items.len() != 3 {
                    return Err(DecodeError::invalid(FIELD, "trailing data"));
                }
                ControlValue::PersistentSearch(PersistentSearch {
                    change_types: asn1::parse_integer(&change_types.value, "change types", 1, 15)? as u8,
                    changes_only: asn1::parse_boolean(&changes_only.value, "changes only")?,
                    return_ecs: asn1::parse_boolean(&return_ecs.value, "return ecs")?,
                })
            }
            ControlValue::EntryChange(_) => {
                let raw = required(raw)?;
                let items = sequence_items(&raw)?;
                let change_type = expect(&items, 0, asn1::ENUMERATED)?;
                let change_type = match asn1::parse_integer(&change_type.value, "change type", 1, 8)? as u8 {
                    t @ (CHANGE_ADD | CHANGE_DELETE | CHANGE_MODIFY | CHANGE_MODDN) => t,
                    t => return Err(DecodeError::invalid("change type", format!("{}", t))),
                };
                let mut entry = EntryChange {
                    change_type,
                    previous_dn: None,
                    change_number: None,
                };
                let mut i = 1;
                if let Some(t) = items.get(i).filter(|t| t.tag() == asn1::OCTET_STRING) {
                    let dn = Dn::from_bytes(&t.value)
                        .map_err(|e| DecodeError::invalid("previous dn", e.to_string()))?;
                    entry.previous_dn = Some(dn);
                    i += 1;
                }
                if let Some(t) = items.get(i).filter(|t| t.tag() == asn1::INTEGER) {
                    entry.change_number = Some(asn1::parse_integer(&t.value, "change number", i64::MIN, i64::MAX)?);
                    i += 1;
                }
                if items.len() != i {
                    return Err(DecodeError::invalid(FIELD, "trailing data"));
                }
                ControlValue::EntryChange(entry)
            }
            ControlValue::Subentries(_) => {
                let raw = required(raw)?;
                let items = tlv::read_tokens(&raw)?;
                let visibility = expect(&items, 0, asn1::BOOLEAN)?;
                if items.len() != 1 {
                    return Err(DecodeError::invalid(FIELD, "trailing data"));
                }
                ControlValue::Subentries(asn1::parse_boolean(&visibility.value, "visibility")?)
            }
            ControlValue::SyncRequest(_) => {
                let raw = required(raw)?;
                let items = sequence_items(&raw)?;
                let mode = expect(&items, 0, asn1::ENUMERATED)?;
                let mode = match asn1::parse_integer(&mode.value, "sync mode", 0, 3)? {
                    1 => SyncMode::RefreshOnly,
                    3 => SyncMode::RefreshAndPersist,
                    m => return Err(DecodeError::invalid("sync mode", format!("{}", m))),
                };
                let mut req = SyncRequest {
                    mode,
                    cookie: None,
                    reload_hint: false,
                };
                let mut i = 1;
                if let Some(t) = items.get(i).filter(|t| t.tag() == asn1::OCTET_STRING) {
                    req.cookie = Some(t.value.clone());
                    i += 1;
                }
                if let Some(t) = items.get(i).filter(|t| t.tag() == asn1::BOOLEAN) {
                    req.reload_hint = asn1::parse_boolean(&t.value, "reload hint")?;
                    i += 1;
                }
                if items.len() != i {
                    return Err(DecodeError::invalid(FIELD, "trailing data"));
                }
                ControlValue::SyncRequest(req)
            }
            ControlValue::SyncInfo(_) => ControlValue::SyncInfo(SyncInfoValue::parse(&required(raw)?)?),
            ControlValue::Opaque(_) => ControlValue::Opaque(raw),
        })
    }

    /// Writes the control value OCTET STRING, if the control has one.
    pub(crate) fn encode<S: Sink>(&self, s: &mut S) -> Result<(), EncodeError> {
        match self {
            ControlValue::ManageDsaIt | ControlValue::Opaque(None) => Ok(()),
            ControlValue::Opaque(Some(v)) => s.octets(asn1::OCTET_STRING, v),
            ControlValue::PagedResults(p) => s.constructed(asn1::OCTET_STRING, |s| {
                s.constructed(asn1::SEQUENCE, |s| {
                    s.integer(asn1::INTEGER, p.size as i64)?;
                    s.octets(asn1::OCTET_STRING, &p.cookie)
                })
            }),
            ControlValue::PersistentSearch(p) => s.constructed(asn1::OCTET_STRING, |s| {
                s.constructed(asn1::SEQUENCE, |s| {
                    s.integer(asn1::INTEGER, p.change_types as i64)?;
                    s.boolean(asn1::BOOLEAN, p.changes_only)?;
                    s.boolean(asn1::BOOLEAN, p.return_ecs)
                })
            }),
            ControlValue::EntryChange(e) => s.constructed(asn1::OCTET_STRING, |s| {
                s.constructed(asn1::SEQUENCE, |s| {
                    s.integer(asn1::ENUMERATED, e.change_type as i64)?;
                    if let Some(dn) = &e.previous_dn {
                        s.octets(asn1::OCTET_STRING, dn.as_bytes())?;
                    }
                    if let Some(n) = e.change_number {
                        s.integer(asn1::INTEGER, n)?;
                    }
                    Ok(())
                })
            }),
            ControlValue::Subentries(visibility) => {
                s.constructed(asn1::OCTET_STRING, |s| s.boolean(asn1::BOOLEAN, *visibility))
            }
            ControlValue::SyncInfo(info) => s.constructed(asn1::OCTET_STRING, |s| info.encode(s)),
            ControlValue::SyncRequest(r) => s.constructed(asn1::OCTET_STRING, |s| {
                s.constructed(asn1::SEQUENCE, |s| {
                    s.integer(asn1::ENUMERATED, r.mode as i64)?;
                    if let Some(cookie) = &r.cookie {
                        s.octets(asn1::OCTET_STRING, cookie)?;
                    }
                    if r.reload_hint {
                        s.boolean(asn1::BOOLEAN, true)?;
                    }
                    Ok(())
                })
            }),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn raw(s: &str) -> Option<Bytes> {
        Some(Bytes::from(hex::decode(s).unwrap()))
    }

    #[test]
    fn registry_lookup() {
        assert!(factory(PAGED_RESULTS).is_some());
        assert!(factory("1.2.3.4").is_none());
        assert_eq!(
            decode_value("1.2.3.4", raw("0102")).unwrap(),
            ControlValue::Opaque(raw("0102"))
        );
        assert_eq!(decode_value("1.2.3.4", None).unwrap(), ControlValue::Opaque(None));
        assert_eq!(decode_value(MANAGE_DSA_IT, None).unwrap(), ControlValue::ManageDsaIt);
        assert!(decode_value(MANAGE_DSA_IT, raw("00")).is_err());
    }

    #[test]
    fn paged_results() {
        let v = decode_value(PAGED_RESULTS, raw("30080202010004026162")).unwrap();
        assert_eq!(
            v,
            ControlValue::PagedResults(PagedResults {
                size: 256,
                cookie: Bytes::from_static(b"ab"),
            })
        );
        assert!(decode_value(PAGED_RESULTS, None).is_err());
        assert!(decode_value(PAGED_RESULTS, raw("3003020101")).is_err());
    }

    #[test]
    fn persistent_search_and_entry_change() {
        let v = decode_value(PERSISTENT_SEARCH, raw("3009020103010100010100")).unwrap();
        assert_eq!(
            v,
            ControlValue::PersistentSearch(PersistentSearch {
                change_types: 3,
                changes_only: false,
                return_ecs: false,
            })
        );
        let v = decode_value(ENTRY_CHANGE, raw("300f0a0108040764633d74657374020105")).unwrap();
        assert_eq!(
            v,
            ControlValue::EntryChange(EntryChange {
                change_type: CHANGE_MODDN,
                previous_dn: Some(Dn::parse("dc=test").unwrap()),
                change_number: Some(5),
            })
        );
        // sequence length one byte short of the value
        assert!(decode_value(ENTRY_CHANGE, raw("300e0a0108040764633d74657374020105")).is_err());
        assert!(decode_value(ENTRY_CHANGE, raw("30030a0103")).is_err());
    }

    #[test]
    fn sync_request_and_subentries() {
        let v = decode_value(SYNC_REQUEST, raw("30090a01030401630101ff")).unwrap();
        assert_eq!(
            v,
            ControlValue::SyncRequest(SyncRequest {
                mode: SyncMode::RefreshAndPersist,
                cookie: Some(Bytes::from_static(b"c")),
                reload_hint: true,
            })
        );
        assert_eq!(decode_value(SUBENTRIES, raw("0101ff")).unwrap(), ControlValue::Subentries(true));
        assert!(decode_value(SYNC_REQUEST, raw("30030a0102")).is_err());
    }

    #[test]
    fn sync_info() {
        let parse = |s: &str| SyncInfoValue::parse(&hex::decode(s).unwrap());
        assert_eq!(parse("800163").unwrap(), SyncInfoValue::NewCookie(Bytes::from_static(b"c")));
        assert_eq!(
            parse("a100").unwrap(),
            SyncInfoValue::RefreshDelete {
                cookie: None,
                refresh_done: true,
            }
        );
        assert_eq!(
            parse("a206040163010100").unwrap(),
            SyncInfoValue::RefreshPresent {
                cookie: Some(Bytes::from_static(b"c")),
                refresh_done: false,
            }
        );
        // refreshDeletes defaults to FALSE, empty uuid set
        assert_eq!(
            parse("a3023100").unwrap(),
            SyncInfoValue::SyncIdSet {
                cookie: None,
                refresh_deletes: false,
                uuids: vec![],
            }
        );
        assert_eq!(
            decode_value(SYNC_INFO, raw("a100")).unwrap(),
            ControlValue::SyncInfo(SyncInfoValue::RefreshDelete {
                cookie: None,
                refresh_done: true,
            })
        );
        assert!(decode_value(SYNC_INFO, None).is_err());
        // unknown choice
        assert!(parse("a400").is_err());
        // syncIdSet without its set
        assert!(parse("a303040163").is_err());
        // bytes after the choice
        assert!(parse("a1000000").is_err());
        // boolean after the set
        assert!(parse("a30531000101ff").is_err());
    }
}
