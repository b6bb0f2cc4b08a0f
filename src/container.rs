//! Per connection decode state.
//!
//! BER has no end markers. Each open constructed element is a `Level` on a
//! stack that counts the bytes read inside it; once the count reaches the
//! declared length the level is popped, checked, and its full size is added
//! to its parent. A single token can close several levels, and the message
//! is complete when the outermost one closes.

use bytes::{Buf, Bytes};
use log::{debug, trace};

use crate::config::DecoderConfig;
use crate::control::{self, Control};
use crate::error::DecodeError;
use crate::filter::FilterBuilder;
use crate::grammar::{State, TABLE};
use crate::ldap::{Attribute, LdapMessage, LdapResult, MessageParams, Modification, ModifyOperation, ResultCode};
use crate::dn::Dn;
use crate::tlv::{Header, TlvEvent, TlvReader, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub state: State,
    pub declared: usize,
    pub consumed: usize,
    pub header_len: usize,
}

impl Level {
    fn remaining(&self) -> usize {
        self.declared - self.consumed
    }
}

#[derive(Debug, Default)]
pub(crate) struct PendingControl {
    pub oid: Option<String>,
    pub critical: bool,
    pub value: Option<Bytes>,
}

#[derive(Debug)]
pub struct DecodeContainer {
    pub(crate) config: DecoderConfig,
    reader: TlvReader,
    pub(crate) state: State,
    pub(crate) end_allowed: bool,
    pub(crate) stack: Vec<Level>,
    pub(crate) id: Option<u32>,
    pub(crate) params: Option<MessageParams>,
    pub(crate) controls: Vec<Control>,
    pub(crate) control: Option<PendingControl>,
    pub(crate) filter: FilterBuilder,
    /// Attribute of an entry, an AddRequest or a change being read.
    pub(crate) attribute: Option<Attribute>,
    pub(crate) operation: Option<ModifyOperation>,
}

impl Default for DecodeContainer {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl DecodeContainer {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            reader: TlvReader::new(),
            state: State::Start,
            end_allowed: false,
            stack: Vec::new(),
            id: None,
            params: None,
            controls: Vec::new(),
            control: None,
            filter: FilterBuilder::new(),
            attribute: None,
            operation: None,
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Open levels, outermost first.
    pub fn levels(&self) -> &[Level] {
        &self.stack
    }

    /// True when no byte of a message has been read.
    pub fn is_idle(&self) -> bool {
        self.state == State::Start && self.reader.is_idle()
    }

    /// Forgets everything about the current message. Allocations are kept.
    pub fn clean(&mut self) {
        self.reader.reset();
        self.state = State::Start;
        self.end_allowed = false;
        self.stack.clear();
        self.id = None;
        self.params = None;
        self.controls.clear();
        self.control = None;
        self.filter.clear();
        self.attribute = None;
        self.operation = None;
    }

    /// Reads TLVs from `input` until a message is complete or `input` is
    /// exhausted. Bytes after a complete message are left in `input`.
    pub(crate) fn feed<B: Buf>(&mut self, input: &mut B) -> Result<Option<LdapMessage>, DecodeError> {
        loop {
            match self.reader.poll(input)? {
                None => return Ok(None),
                Some(TlvEvent::Header(h)) => self.check_header(&h)?,
                Some(TlvEvent::Token(t)) => {
                    if let Some(msg) = self.consume(&t)? {
                        return Ok(Some(msg));
                    }
                }
            }
        }
    }

    /// Rejects a TLV before its value is buffered.
    pub(crate) fn check_header(&self, h: &Header) -> Result<(), DecodeError> {
        if TABLE.lookup(self.state, h.tag).is_none() {
            return Err(DecodeError::UnexpectedTag {
                state: self.state,
                tag: h.tag,
            });
        }
        let total = h
            .total_len()
            .ok_or_else(|| DecodeError::malformed("length overflows"))?;
        match self.stack.last() {
            Some(level) if total > level.remaining() => Err(DecodeError::malformed(format!(
                "0x{:02x} of {} bytes in {:?} with {} bytes left",
                h.tag,
                total,
                level.state,
                level.remaining()
            ))),
            Some(_) => Ok(()),
            None if h.length > self.config.max_pdu_size => Err(DecodeError::PduTooLarge {
                length: h.length,
                limit: self.config.max_pdu_size,
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn consume(&mut self, t: &Token) -> Result<Option<LdapMessage>, DecodeError> {
        let transition = *TABLE.lookup(self.state, t.tag()).ok_or(DecodeError::UnexpectedTag {
            state: self.state,
            tag: t.tag(),
        })?;
        trace!("{:?} 0x{:02x} -> {:?}", self.state, t.tag(), transition.next);
        (transition.action)(self, t)?;
        self.state = transition.next;
        self.end_allowed = transition.end_allowed;

        if t.is_constructed() {
            self.stack.push(Level {
                state: transition.next,
                declared: t.length(),
                consumed: 0,
                header_len: t.header.header_len,
            });
        } else if let Some(level) = self.stack.last_mut() {
            level.consumed += t.header.header_len + t.length();
        }

        while let Some(level) = self.stack.last().copied() {
            if level.consumed < level.declared {
                break;
            }
            self.stack.pop();
            self.close(&level)?;
            match self.stack.last_mut() {
                Some(parent) => parent.consumed += level.header_len + level.declared,
                None => return self.take_message().map(Some),
            }
        }
        Ok(None)
    }

    fn in_state(&self, states: &[State]) -> bool {
        states.contains(&self.state)
    }

    /// Checks that the grammar reached a legal end for `level` and moves what
    /// it holds to its parent.
    fn close(&mut self, level: &Level) -> Result<(), DecodeError> {
        trace!("close {:?} in {:?}", level.state, self.state);
        match level.state {
            State::LdapMessage
            | State::BindRequest
            | State::LdapResponse
            | State::SearchRequest
            | State::SearchResultEntry
            | State::AddRequest
            | State::ModifyRequest
            | State::ModifyDnRequest
            | State::CompareRequest
            | State::ExtendedRequest
            | State::IntermediateResponse => {
                if !self.end_allowed {
                    return Err(DecodeError::malformed(format!(
                        "{:?} ends after {:?}",
                        level.state, self.state
                    )));
                }
            }
            State::SearchResultReference => match &self.params {
                Some(MessageParams::SearchResultReference(r)) if !r.uris.is_empty() => {}
                _ => return Err(DecodeError::EmptyRequiredField("search reference uri")),
            },
            State::BindSasl => {
                if !self.in_state(&[State::BindSaslMechanism, State::BindSaslCredentials]) {
                    return Err(DecodeError::EmptyRequiredField("sasl mechanism"));
                }
            }
            State::Referrals => {
                let empty = self
                    .params
                    .as_ref()
                    .and_then(|p| p.result())
                    .map_or(true, |r| r.referrals.is_empty());
                if empty {
                    return Err(DecodeError::EmptyRequiredField("referral"));
                }
            }
            State::FilterAnd | State::FilterOr | State::FilterNot => self.filter.close_connector()?,
            State::FilterEquality
            | State::FilterSubstrings
            | State::FilterGreaterOrEqual
            | State::FilterLessOrEqual
            | State::FilterApprox
            | State::FilterExtensible => self.filter.close_leaf()?,
            State::PartialAttribute => {
                if !self.in_state(&[State::AttributeVals, State::AttributeValue]) {
                    return Err(DecodeError::malformed("attribute without a value set"));
                }
                let attribute = self
                    .attribute
                    .take()
                    .ok_or_else(|| DecodeError::malformed("no attribute to close"))?;
                match self.params.as_mut() {
                    Some(MessageParams::SearchResult(e)) => e.attributes.push(attribute),
                    Some(MessageParams::Add(a)) => {
                        if attribute.values.is_empty() {
                            return Err(DecodeError::EmptyRequiredField("attribute value"));
                        }
                        a.attributes.push(attribute)
                    }
                    _ => return Err(DecodeError::malformed("attribute outside of an entry")),
                }
            }
            State::ModifyAttribute => {
                if !self.in_state(&[State::ModifyAttributeVals, State::ModifyAttributeValue]) {
                    return Err(DecodeError::malformed("modification without a value set"));
                }
            }
            State::ModifyChange => {
                if !self.in_state(&[State::ModifyAttributeVals, State::ModifyAttributeValue]) {
                    return Err(DecodeError::malformed("incomplete modification"));
                }
                let change = match (self.operation.take(), self.attribute.take()) {
                    (Some(operation), Some(attribute)) => Modification { operation, attribute },
                    _ => return Err(DecodeError::malformed("incomplete modification")),
                };
                match self.params.as_mut() {
                    Some(MessageParams::Modify(m)) => m.changes.push(change),
                    _ => return Err(DecodeError::malformed("modification outside of a ModifyRequest")),
                }
            }
            State::CompareAva => {
                if self.state != State::CompareValue {
                    return Err(DecodeError::malformed("assertion without a value"));
                }
            }
            State::Controls => {
                if self.controls.is_empty() {
                    return Err(DecodeError::EmptyRequiredField("controls"));
                }
            }
            State::Control => {
                let pending = self.control.take().unwrap_or_default();
                let oid = pending.oid.ok_or(DecodeError::EmptyRequiredField("control type"))?;
                let value = control::decode_value(&oid, pending.value)?;
                self.controls.push(Control {
                    oid,
                    critical: pending.critical,
                    value,
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn take_message(&mut self) -> Result<LdapMessage, DecodeError> {
        let id = self.id.ok_or(DecodeError::EmptyRequiredField("message id"))?;
        let params = self
            .params
            .take()
            .ok_or(DecodeError::EmptyRequiredField("protocol op"))?;
        let msg = LdapMessage {
            id,
            params,
            controls: std::mem::take(&mut self.controls),
        };
        debug!("decoded {} id {}", msg.params.name(), msg.id);
        self.clean();
        Ok(msg)
    }

    /// Attaches the response a peer should receive for the request being
    /// decoded, when there is one.
    pub(crate) fn reply(&self, err: DecodeError, code: ResultCode) -> DecodeError {
        let (Some(id), Some(params)) = (self.id, self.params.as_ref()) else {
            return err;
        };
        match params.response(LdapResult::new(code, Dn::root(), &err.to_string())) {
            Some(response) => err.with_response(LdapMessage::new(id, response)),
            None => err,
        }
    }
}
