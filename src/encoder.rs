//! Two pass BER encoder.
//!
//! BER puts a length in front of every value, so the size of each
//! constructed node has to be known before its first byte is written. The
//! first pass walks the message and records the content length of every
//! constructed node in document order; the second pass walks it again in the
//! same order and writes headers from those recorded lengths. Both passes run
//! the same traversal over a `Sink`, so they cannot disagree.

use bytes::{BufMut, Bytes, BytesMut};

use crate::asn1;
use crate::control::Control;
use crate::error::EncodeError;
use crate::filter::{AttributeValueAssertion, Filter};
use crate::ldap::{Attribute, Authentication, IntermediateValue, LdapMessage, LdapResult, MessageParams};

const MAX_INT: u32 = i32::MAX as u32;

pub(crate) trait Sink: Sized {
    fn primitive(&mut self, tag: u8, value: &[u8]) -> Result<(), EncodeError>;

    fn constructed<F>(&mut self, tag: u8, f: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut Self) -> Result<(), EncodeError>;

    fn octets(&mut self, tag: u8, value: &[u8]) -> Result<(), EncodeError> {
        self.primitive(tag, value)
    }

    fn integer(&mut self, tag: u8, value: i64) -> Result<(), EncodeError> {
        let (buf, start) = asn1::integer_bytes(value);
        self.primitive(tag, &buf[start..])
    }

    fn boolean(&mut self, tag: u8, value: bool) -> Result<(), EncodeError> {
        self.primitive(tag, &[if value { 0xff } else { 0x00 }])
    }
}

struct LengthSink<'a> {
    lengths: &'a mut Vec<usize>,
    acc: usize,
}

impl Sink for LengthSink<'_> {
    fn primitive(&mut self, _tag: u8, value: &[u8]) -> Result<(), EncodeError> {
        self.acc += asn1::tlv_len(value.len());
        Ok(())
    }

    fn constructed<F>(&mut self, _tag: u8, f: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut Self) -> Result<(), EncodeError>,
    {
        let slot = self.lengths.len();
        self.lengths.push(0);
        let outer = std::mem::replace(&mut self.acc, 0);
        f(self)?;
        let content = self.acc;
        self.lengths[slot] = content;
        self.acc = outer + asn1::tlv_len(content);
        Ok(())
    }
}

struct WriteSink<'a, B> {
    lengths: &'a [usize],
    next: usize,
    out: &'a mut B,
}

impl<B: BufMut> Sink for WriteSink<'_, B> {
    fn primitive(&mut self, tag: u8, value: &[u8]) -> Result<(), EncodeError> {
        self.out.put_u8(tag);
        asn1::write_length(&mut *self.out, value.len());
        self.out.put_slice(value);
        Ok(())
    }

    fn constructed<F>(&mut self, tag: u8, f: F) -> Result<(), EncodeError>
    where
        F: FnOnce(&mut Self) -> Result<(), EncodeError>,
    {
        let len = *self
            .lengths
            .get(self.next)
            .ok_or(EncodeError::MissingField("computed length"))?;
        self.next += 1;
        self.out.put_u8(tag);
        asn1::write_length(&mut *self.out, len);
        f(self)
    }
}

/// Holds the lengths computed by the first pass for the second one.
#[derive(Debug, Default)]
pub struct Encoder {
    lengths: Vec<usize>,
    total: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// First pass: validates `msg` and returns its encoded size.
    pub fn compute_length(&mut self, msg: &LdapMessage) -> Result<usize, EncodeError> {
        self.lengths.clear();
        let mut sink = LengthSink {
            lengths: &mut self.lengths,
            acc: 0,
        };
        message(&mut sink, msg)?;
        self.total = sink.acc;
        Ok(self.total)
    }

    /// Second pass. `msg` must be the message last given to `compute_length`.
    pub fn write<B: BufMut>(&self, msg: &LdapMessage, out: &mut B) -> Result<(), EncodeError> {
        if out.remaining_mut() < self.total {
            return Err(EncodeError::EncodeOverflow {
                required: self.total,
                available: out.remaining_mut(),
            });
        }
        let mut sink = WriteSink {
            lengths: &self.lengths,
            next: 0,
            out,
        };
        message(&mut sink, msg)?;
        debug_assert_eq!(sink.next, self.lengths.len());
        Ok(())
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

pub fn encode(msg: &LdapMessage) -> Result<Bytes, EncodeError> {
    let mut encoder = Encoder::new();
    let total = encoder.compute_length(msg)?;
    let mut out = BytesMut::with_capacity(total);
    encoder.write(msg, &mut out)?;
    Ok(out.freeze())
}

/// Encodes into a caller provided buffer and returns the bytes written.
/// Nothing is written when the buffer is too small.
pub fn encode_into(msg: &LdapMessage, out: &mut [u8]) -> Result<usize, EncodeError> {
    let mut encoder = Encoder::new();
    let total = encoder.compute_length(msg)?;
    let mut cursor = &mut out[..];
    encoder.write(msg, &mut cursor)?;
    Ok(total)
}

fn check_int(field: &'static str, value: u32) -> Result<i64, EncodeError> {
    if value > MAX_INT {
        return Err(EncodeError::OutOfRange {
            field,
            value: value as u64,
        });
    }
    Ok(value as i64)
}

fn message<S: Sink>(s: &mut S, msg: &LdapMessage) -> Result<(), EncodeError> {
    if msg.id > MAX_INT {
        return Err(EncodeError::InvalidMessageId(msg.id));
    }
    s.constructed(asn1::SEQUENCE, |s| {
        s.integer(asn1::INTEGER, msg.id as i64)?;
        params(s, &msg.params)?;
        if !msg.controls.is_empty() {
            s.constructed(asn1::CONTROLS, |s| {
                for c in &msg.controls {
                    control(s, c)?;
                }
                Ok(())
            })?;
        }
        Ok(())
    })
}

fn control<S: Sink>(s: &mut S, c: &Control) -> Result<(), EncodeError> {
    if c.oid.is_empty() {
        return Err(EncodeError::MissingField("control type"));
    }
    s.constructed(asn1::SEQUENCE, |s| {
        s.octets(asn1::OCTET_STRING, c.oid.as_bytes())?;
        if c.critical {
            s.boolean(asn1::BOOLEAN, true)?;
        }
        c.value.encode(s)
    })
}

fn result<S: Sink>(s: &mut S, r: &LdapResult) -> Result<(), EncodeError> {
    s.integer(asn1::ENUMERATED, r.code.code() as i64)?;
    s.octets(asn1::OCTET_STRING, r.matched_dn.as_bytes())?;
    s.octets(asn1::OCTET_STRING, r.message.as_bytes())?;
    if !r.referrals.is_empty() {
        s.constructed(asn1::REFERRAL, |s| {
            for uri in &r.referrals {
                s.octets(asn1::OCTET_STRING, uri.as_bytes())?;
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn partial_attribute<S: Sink>(s: &mut S, a: &Attribute, values_required: bool) -> Result<(), EncodeError> {
    if a.name.is_empty() {
        return Err(EncodeError::MissingField("attribute type"));
    }
    if values_required && a.values.is_empty() {
        return Err(EncodeError::MissingField("attribute value"));
    }
    s.constructed(asn1::SEQUENCE, |s| {
        s.octets(asn1::OCTET_STRING, a.name.as_bytes())?;
        s.constructed(asn1::SET, |s| {
            for v in &a.values {
                s.octets(asn1::OCTET_STRING, v.as_bytes())?;
            }
            Ok(())
        })
    })
}

fn attribute_list<S: Sink>(s: &mut S, attrs: &[Attribute], values_required: bool) -> Result<(), EncodeError> {
    s.constructed(asn1::SEQUENCE, |s| {
        for a in attrs {
            partial_attribute(s, a, values_required)?;
        }
        Ok(())
    })
}

fn ava<S: Sink>(s: &mut S, tag: u8, a: &AttributeValueAssertion) -> Result<(), EncodeError> {
    if a.attribute.is_empty() {
        return Err(EncodeError::MissingField("assertion attribute"));
    }
    s.constructed(tag, |s| {
        s.octets(asn1::OCTET_STRING, a.attribute.as_bytes())?;
        s.octets(asn1::OCTET_STRING, a.value.as_bytes())
    })
}

fn filter<S: Sink>(s: &mut S, f: &Filter) -> Result<(), EncodeError> {
    match f {
        Filter::And(children) | Filter::Or(children) => {
            let tag = if matches!(f, Filter::And(_)) {
                asn1::FILTER_AND
            } else {
                asn1::FILTER_OR
            };
            s.constructed(tag, |s| {
                for child in children {
                    filter(s, child)?;
                }
                Ok(())
            })
        }
        Filter::Not(inner) => s.constructed(asn1::FILTER_NOT, |s| filter(s, inner)),
        Filter::Equality(a) => ava(s, asn1::FILTER_EQUALITY, a),
        Filter::GreaterOrEqual(a) => ava(s, asn1::FILTER_GREATER_OR_EQUAL, a),
        Filter::LessOrEqual(a) => ava(s, asn1::FILTER_LESS_OR_EQUAL, a),
        Filter::Approx(a) => ava(s, asn1::FILTER_APPROX, a),
        Filter::Present(attribute) => {
            if attribute.is_empty() {
                return Err(EncodeError::MissingField("present attribute"));
            }
            s.octets(asn1::FILTER_PRESENT, attribute.as_bytes())
        }
        Filter::Substrings(sub) => {
            if sub.attribute.is_empty() {
                return Err(EncodeError::MissingField("substrings type"));
            }
            if sub.is_empty() {
                return Err(EncodeError::MissingField("substrings"));
            }
            s.constructed(asn1::FILTER_SUBSTRINGS, |s| {
                s.octets(asn1::OCTET_STRING, sub.attribute.as_bytes())?;
                s.constructed(asn1::SEQUENCE, |s| {
                    if let Some(v) = &sub.initial {
                        s.octets(asn1::SUBSTRING_INITIAL, v.as_bytes())?;
                    }
                    for v in &sub.any {
                        s.octets(asn1::SUBSTRING_ANY, v.as_bytes())?;
                    }
                    if let Some(v) = &sub.final_ {
                        s.octets(asn1::SUBSTRING_FINAL, v.as_bytes())?;
                    }
                    Ok(())
                })
            })
        }
        Filter::Extensible(m) => {
            if m.matching_rule.is_none() && m.attribute.is_none() {
                return Err(EncodeError::MissingField("matching rule or type"));
            }
            s.constructed(asn1::FILTER_EXTENSIBLE, |s| {
                if let Some(rule) = &m.matching_rule {
                    s.octets(asn1::MATCHING_RULE, rule.as_bytes())?;
                }
                if let Some(attribute) = &m.attribute {
                    s.octets(asn1::MATCHING_TYPE, attribute.as_bytes())?;
                }
                s.octets(asn1::MATCH_VALUE, m.value.as_bytes())?;
                if m.dn_attributes {
                    s.boolean(asn1::DN_ATTRIBUTES, true)?;
                }
                Ok(())
            })
        }
    }
}

fn params<S: Sink>(s: &mut S, p: &MessageParams) -> Result<(), EncodeError> {
    match p {
        MessageParams::Bind(b) => {
            if !(1..=127).contains(&b.version) {
                return Err(EncodeError::OutOfRange {
                    field: "bind version",
                    value: b.version as u64,
                });
            }
            s.constructed(asn1::BIND_REQUEST, |s| {
                s.integer(asn1::INTEGER, b.version as i64)?;
                s.octets(asn1::OCTET_STRING, b.name.as_bytes())?;
                match &b.authentication {
                    Authentication::Simple(password) => s.octets(asn1::AUTH_SIMPLE, password),
                    Authentication::Sasl { mechanism, credentials } => s.constructed(asn1::AUTH_SASL, |s| {
                        s.octets(asn1::OCTET_STRING, mechanism.as_bytes())?;
                        if let Some(c) = credentials {
                            s.octets(asn1::OCTET_STRING, c)?;
                        }
                        Ok(())
                    }),
                }
            })
        }
        MessageParams::BindResponse(r) => s.constructed(asn1::BIND_RESPONSE, |s| {
            result(s, &r.result)?;
            if let Some(creds) = &r.server_sasl_creds {
                s.octets(asn1::SERVER_SASL_CREDS, creds)?;
            }
            Ok(())
        }),
        MessageParams::Unbind(_) => s.primitive(asn1::UNBIND_REQUEST, &[]),
        MessageParams::Search(q) => {
            let size_limit = check_int("size limit", q.size_limit)?;
            let time_limit = check_int("time limit", q.time_limit)?;
            s.constructed(asn1::SEARCH_REQUEST, |s| {
                s.octets(asn1::OCTET_STRING, q.base_object.as_bytes())?;
                s.integer(asn1::ENUMERATED, q.scope as i64)?;
                s.integer(asn1::ENUMERATED, q.deref as i64)?;
                s.integer(asn1::INTEGER, size_limit)?;
                s.integer(asn1::INTEGER, time_limit)?;
                s.boolean(asn1::BOOLEAN, q.types_only)?;
                filter(s, &q.filter)?;
                s.constructed(asn1::SEQUENCE, |s| {
                    for a in &q.attributes {
                        s.octets(asn1::OCTET_STRING, a.as_bytes())?;
                    }
                    Ok(())
                })
            })
        }
        MessageParams::SearchResult(e) => s.constructed(asn1::SEARCH_RESULT_ENTRY, |s| {
            s.octets(asn1::OCTET_STRING, e.name.as_bytes())?;
            attribute_list(s, &e.attributes, false)
        }),
        MessageParams::SearchResultDone(r) => s.constructed(asn1::SEARCH_RESULT_DONE, |s| result(s, &r.result)),
        MessageParams::SearchResultReference(r) => {
            if r.uris.is_empty() {
                return Err(EncodeError::MissingField("search reference uri"));
            }
            s.constructed(asn1::SEARCH_RESULT_REFERENCE, |s| {
                for uri in &r.uris {
                    s.octets(asn1::OCTET_STRING, uri.as_bytes())?;
                }
                Ok(())
            })
        }
        MessageParams::Modify(m) => s.constructed(asn1::MODIFY_REQUEST, |s| {
            s.octets(asn1::OCTET_STRING, m.object.as_bytes())?;
            s.constructed(asn1::SEQUENCE, |s| {
                for change in &m.changes {
                    s.constructed(asn1::SEQUENCE, |s| {
                        s.integer(asn1::ENUMERATED, change.operation as i64)?;
                        partial_attribute(s, &change.attribute, false)
                    })?;
                }
                Ok(())
            })
        }),
        MessageParams::ModifyResponse(r) => s.constructed(asn1::MODIFY_RESPONSE, |s| result(s, &r.result)),
        MessageParams::Add(a) => s.constructed(asn1::ADD_REQUEST, |s| {
            s.octets(asn1::OCTET_STRING, a.entry.as_bytes())?;
            attribute_list(s, &a.attributes, true)
        }),
        MessageParams::AddResponse(r) => s.constructed(asn1::ADD_RESPONSE, |s| result(s, &r.result)),
        MessageParams::Del(d) => s.primitive(asn1::DEL_REQUEST, d.entry.as_bytes()),
        MessageParams::DelResponse(r) => s.constructed(asn1::DEL_RESPONSE, |s| result(s, &r.result)),
        MessageParams::ModifyDn(m) => s.constructed(asn1::MODIFY_DN_REQUEST, |s| {
            s.octets(asn1::OCTET_STRING, m.entry.as_bytes())?;
            s.octets(asn1::OCTET_STRING, m.new_rdn.as_bytes())?;
            s.boolean(asn1::BOOLEAN, m.delete_old_rdn)?;
            if let Some(superior) = &m.new_superior {
                s.octets(asn1::NEW_SUPERIOR, superior.as_bytes())?;
            }
            Ok(())
        }),
        MessageParams::ModifyDnResponse(r) => s.constructed(asn1::MODIFY_DN_RESPONSE, |s| result(s, &r.result)),
        MessageParams::Compare(c) => {
            if c.attribute.is_empty() {
                return Err(EncodeError::MissingField("compare attribute"));
            }
            s.constructed(asn1::COMPARE_REQUEST, |s| {
                s.octets(asn1::OCTET_STRING, c.entry.as_bytes())?;
                s.constructed(asn1::SEQUENCE, |s| {
                    s.octets(asn1::OCTET_STRING, c.attribute.as_bytes())?;
                    s.octets(asn1::OCTET_STRING, c.value.as_bytes())
                })
            })
        }
        MessageParams::CompareResponse(r) => s.constructed(asn1::COMPARE_RESPONSE, |s| result(s, &r.result)),
        MessageParams::Abandon(a) => {
            let id = check_int("abandoned message id", a.id)?;
            s.integer(asn1::ABANDON_REQUEST, id)
        }
        MessageParams::Extended(x) => {
            if x.name.is_empty() {
                return Err(EncodeError::MissingField("extended request name"));
            }
            s.constructed(asn1::EXTENDED_REQUEST, |s| {
                s.octets(asn1::EXTENDED_REQUEST_NAME, x.name.as_bytes())?;
                if let Some(v) = &x.value {
                    s.octets(asn1::EXTENDED_REQUEST_VALUE, v)?;
                }
                Ok(())
            })
        }
        MessageParams::ExtendedResponse(x) => s.constructed(asn1::EXTENDED_RESPONSE, |s| {
            result(s, &x.result)?;
            if let Some(name) = &x.name {
                s.octets(asn1::EXTENDED_RESPONSE_NAME, name.as_bytes())?;
            }
            if let Some(v) = &x.value {
                s.octets(asn1::EXTENDED_RESPONSE_VALUE, v)?;
            }
            Ok(())
        }),
        MessageParams::Intermediate(i) => s.constructed(asn1::INTERMEDIATE_RESPONSE, |s| {
            if let Some(name) = &i.name {
                s.octets(asn1::INTERMEDIATE_NAME, name.as_bytes())?;
            }
            match &i.value {
                Some(IntermediateValue::Opaque(v)) => s.octets(asn1::INTERMEDIATE_VALUE, v)?,
                Some(IntermediateValue::SyncInfo(info)) => s.constructed(asn1::INTERMEDIATE_VALUE, |s| info.encode(s))?,
                None => {}
            }
            Ok(())
        }),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::dn::Dn;
    use crate::ldap::{MsgDel, MsgSearchResult, MsgUnbind, ResultCode, Value, MsgBindResponse};

    #[test]
    fn unbind_bytes() {
        let msg = LdapMessage::new(1, MessageParams::Unbind(MsgUnbind {}));
        assert_eq!(&encode(&msg).unwrap()[..], &[0x30, 0x05, 0x02, 0x01, 0x01, 0x42, 0x00]);
    }

    #[test]
    fn del_bytes() {
        let msg = LdapMessage::new(
            5,
            MessageParams::Del(MsgDel {
                entry: Dn::parse("dc=test").unwrap(),
            }),
        );
        assert_eq!(
            hex::encode(encode(&msg).unwrap()),
            "300c0201054a0764633d74657374"
        );
    }

    #[test]
    fn empty_result_strings_are_written() {
        let msg = LdapMessage::new(
            1,
            MessageParams::BindResponse(MsgBindResponse::default()),
        );
        assert_eq!(
            hex::encode(encode(&msg).unwrap()),
            "300c02010161070a010004000400"
        );
        let mut msg = msg;
        if let MessageParams::BindResponse(r) = &mut msg.params {
            r.result.code = ResultCode::InvalidCredentials;
        }
        assert_eq!(
            hex::encode(encode(&msg).unwrap()),
            "300c02010161070a013104000400"
        );
    }

    #[test]
    fn long_form_lengths() {
        let big = "x".repeat(300);
        let msg = LdapMessage::new(
            2,
            MessageParams::SearchResult(MsgSearchResult {
                name: Dn::parse("cn=a").unwrap(),
                attributes: vec![Attribute::new("description", vec![Value::from(big.as_str())])],
            }),
        );
        let mut encoder = Encoder::new();
        let total = encoder.compute_length(&msg).unwrap();
        assert_eq!(encoder.total(), total);
        let bytes = encode(&msg).unwrap();
        assert_eq!(bytes.len(), total);
        assert_eq!(&bytes[..2], &[0x30, 0x82]);
        assert_eq!(((bytes[2] as usize) << 8) | bytes[3] as usize, total - 4);
    }

    #[test]
    fn overflow_and_invalid_state() {
        let msg = LdapMessage::new(1, MessageParams::Unbind(MsgUnbind {}));
        let mut small = [0u8; 6];
        assert_eq!(
            encode_into(&msg, &mut small),
            Err(EncodeError::EncodeOverflow {
                required: 7,
                available: 6
            })
        );
        let mut exact = [0u8; 7];
        assert_eq!(encode_into(&msg, &mut exact), Ok(7));

        let msg = LdapMessage::new(0x8000_0000, MessageParams::Unbind(MsgUnbind {}));
        assert_eq!(encode(&msg), Err(EncodeError::InvalidMessageId(0x8000_0000)));

        let mut msg = LdapMessage::new(1, MessageParams::Unbind(MsgUnbind {}));
        msg.controls.push(Control::opaque("", false, None));
        assert_eq!(encode(&msg), Err(EncodeError::MissingField("control type")));
    }
}
