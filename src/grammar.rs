//! The LDAPv3 message grammar as a table of transitions.
//!
//! A state names the last element read. A transition from it is keyed by the
//! tag of the next TLV and says which state follows, which action fills in
//! the message, and whether the message may end there.

use once_cell::sync::Lazy;

use crate::actions::*;
use crate::asn1;
use crate::container::DecodeContainer;
use crate::error::DecodeError;
use crate::tlv::Token;

macro_rules! states {
    ($($name:ident,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum State {
            $($name,)*
        }

        impl State {
            pub const ALL: &'static [State] = &[$(State::$name,)*];
            pub const COUNT: usize = Self::ALL.len();

            pub fn index(self) -> usize {
                self as usize
            }
        }
    };
}

states! {
    Start,
    LdapMessage,
    MessageId,

    BindRequest,
    BindVersion,
    BindName,
    BindSimple,
    BindSasl,
    BindSaslMechanism,
    BindSaslCredentials,

    LdapResponse,
    ResultCode,
    MatchedDn,
    DiagnosticMessage,
    Referrals,
    Referral,
    ServerSaslCreds,
    ExtendedResponseName,
    ExtendedResponseValue,

    UnbindRequest,
    DelRequest,
    AbandonRequest,

    SearchRequest,
    SearchBase,
    SearchScope,
    SearchDeref,
    SearchSizeLimit,
    SearchTimeLimit,
    SearchTypesOnly,
    FilterAnd,
    FilterOr,
    FilterNot,
    FilterEquality,
    FilterSubstrings,
    FilterGreaterOrEqual,
    FilterLessOrEqual,
    FilterPresent,
    FilterApprox,
    FilterExtensible,
    AssertionAttribute,
    AssertionValue,
    SubstringsType,
    SubstringsSeq,
    SubstringInitial,
    SubstringAny,
    SubstringFinal,
    MatchingRule,
    MatchType,
    MatchValue,
    DnAttributes,
    SearchAttributes,
    SearchAttribute,

    SearchResultEntry,
    EntryName,
    AddRequest,
    AddEntry,
    AttributeList,
    PartialAttribute,
    AttributeType,
    AttributeVals,
    AttributeValue,

    SearchResultReference,
    ReferenceUri,

    ModifyRequest,
    ModifyObject,
    ModifyChanges,
    ModifyChange,
    ModifyOperation,
    ModifyAttribute,
    ModifyAttributeType,
    ModifyAttributeVals,
    ModifyAttributeValue,

    ModifyDnRequest,
    ModifyDnEntry,
    ModifyDnNewRdn,
    ModifyDnDeleteOldRdn,
    ModifyDnNewSuperior,

    CompareRequest,
    CompareEntry,
    CompareAva,
    CompareAttribute,
    CompareValue,

    ExtendedRequest,
    ExtendedRequestName,
    ExtendedRequestValue,

    IntermediateResponse,
    IntermediateName,
    IntermediateValue,

    Controls,
    Control,
    ControlType,
    ControlCriticality,
    ControlValue,
}

/// States after which the protocol op is complete, so the message may end
/// or continue with its controls.
const OP_END: &[State] = &[
    State::UnbindRequest,
    State::DelRequest,
    State::AbandonRequest,
    State::BindSimple,
    State::BindSaslMechanism,
    State::BindSaslCredentials,
    State::DiagnosticMessage,
    State::Referral,
    State::ServerSaslCreds,
    State::ExtendedResponseName,
    State::ExtendedResponseValue,
    State::SearchAttributes,
    State::SearchAttribute,
    State::AttributeList,
    State::AttributeVals,
    State::AttributeValue,
    State::ReferenceUri,
    State::ModifyChanges,
    State::ModifyAttributeVals,
    State::ModifyAttributeValue,
    State::ModifyDnDeleteOldRdn,
    State::ModifyDnNewSuperior,
    State::CompareValue,
    State::ExtendedRequestName,
    State::ExtendedRequestValue,
    State::IntermediateResponse,
    State::IntermediateName,
    State::IntermediateValue,
];

const CONTROL_END: &[State] = &[State::ControlType, State::ControlCriticality, State::ControlValue];

/// States after which a filter element is complete.
const FILTER_END: &[State] = &[
    State::FilterPresent,
    State::AssertionValue,
    State::SubstringInitial,
    State::SubstringAny,
    State::SubstringFinal,
    State::MatchValue,
    State::DnAttributes,
];

impl State {
    pub fn is_end(self) -> bool {
        OP_END.contains(&self) || CONTROL_END.contains(&self)
    }
}

pub type Action = fn(&mut DecodeContainer, &Token) -> Result<(), DecodeError>;

#[derive(Clone, Copy)]
pub struct Transition {
    pub next: State,
    pub action: Action,
    /// The message may end once this transition has been taken.
    pub end_allowed: bool,
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("next", &self.next)
            .field("end_allowed", &self.end_allowed)
            .finish_non_exhaustive()
    }
}

pub struct TransitionTable {
    rows: Vec<[Option<Transition>; 256]>,
}

impl TransitionTable {
    pub fn lookup(&self, state: State, tag: u8) -> Option<&Transition> {
        self.rows[state.index()][tag as usize].as_ref()
    }

    /// Number of registered transitions.
    pub fn len(&self) -> usize {
        self.rows.iter().map(|r| r.iter().flatten().count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub static TABLE: Lazy<TransitionTable> = Lazy::new(build);

struct Builder {
    rows: Vec<[Option<Transition>; 256]>,
}

impl Builder {
    fn new() -> Self {
        Self {
            rows: vec![[None; 256]; State::COUNT],
        }
    }

    fn on(&mut self, from: State, tag: u8, next: State, action: Action) -> &mut Self {
        let slot = &mut self.rows[from.index()][tag as usize];
        debug_assert!(slot.is_none(), "duplicate transition {:?} 0x{:02x}", from, tag);
        *slot = Some(Transition {
            next,
            action,
            end_allowed: next.is_end(),
        });
        self
    }

    fn on_each(&mut self, from: &[State], tag: u8, next: State, action: Action) -> &mut Self {
        for state in from {
            self.on(*state, tag, next, action);
        }
        self
    }

    fn finish(self) -> TransitionTable {
        TransitionTable { rows: self.rows }
    }
}

fn build() -> TransitionTable {
    use State::*;

    let mut b = Builder::new();

    b.on(Start, asn1::SEQUENCE, LdapMessage, start_message)
        .on(LdapMessage, asn1::INTEGER, MessageId, message_id);

    b.on(MessageId, asn1::BIND_REQUEST, BindRequest, bind_request)
        .on(MessageId, asn1::UNBIND_REQUEST, UnbindRequest, unbind_request)
        .on(MessageId, asn1::SEARCH_REQUEST, SearchRequest, search_request)
        .on(MessageId, asn1::SEARCH_RESULT_ENTRY, SearchResultEntry, search_result_entry)
        .on(MessageId, asn1::SEARCH_RESULT_REFERENCE, SearchResultReference, search_result_reference)
        .on(MessageId, asn1::MODIFY_REQUEST, ModifyRequest, modify_request)
        .on(MessageId, asn1::ADD_REQUEST, AddRequest, add_request)
        .on(MessageId, asn1::DEL_REQUEST, DelRequest, del_request)
        .on(MessageId, asn1::MODIFY_DN_REQUEST, ModifyDnRequest, modify_dn_request)
        .on(MessageId, asn1::COMPARE_REQUEST, CompareRequest, compare_request)
        .on(MessageId, asn1::ABANDON_REQUEST, AbandonRequest, abandon_request)
        .on(MessageId, asn1::EXTENDED_REQUEST, ExtendedRequest, extended_request)
        .on(MessageId, asn1::INTERMEDIATE_RESPONSE, IntermediateResponse, intermediate_response);
    for tag in [
        asn1::BIND_RESPONSE,
        asn1::SEARCH_RESULT_DONE,
        asn1::MODIFY_RESPONSE,
        asn1::ADD_RESPONSE,
        asn1::DEL_RESPONSE,
        asn1::MODIFY_DN_RESPONSE,
        asn1::COMPARE_RESPONSE,
        asn1::EXTENDED_RESPONSE,
    ] {
        b.on(MessageId, tag, LdapResponse, response_start);
    }

    // BindRequest
    b.on(BindRequest, asn1::INTEGER, BindVersion, bind_version)
        .on(BindVersion, asn1::OCTET_STRING, BindName, bind_name)
        .on(BindName, asn1::AUTH_SIMPLE, BindSimple, bind_simple)
        .on(BindName, asn1::AUTH_SASL, BindSasl, bind_sasl)
        .on(BindSasl, asn1::OCTET_STRING, BindSaslMechanism, sasl_mechanism)
        .on(BindSaslMechanism, asn1::OCTET_STRING, BindSaslCredentials, sasl_credentials);

    // LDAPResult and the fields some responses append to it
    b.on(LdapResponse, asn1::ENUMERATED, ResultCode, result_code)
        .on(ResultCode, asn1::OCTET_STRING, MatchedDn, matched_dn)
        .on(MatchedDn, asn1::OCTET_STRING, DiagnosticMessage, diagnostic_message)
        .on(DiagnosticMessage, asn1::REFERRAL, Referrals, referrals)
        .on_each(&[Referrals, Referral], asn1::OCTET_STRING, Referral, referral)
        .on_each(&[DiagnosticMessage, Referral], asn1::SERVER_SASL_CREDS, ServerSaslCreds, server_sasl_creds)
        .on_each(
            &[DiagnosticMessage, Referral],
            asn1::EXTENDED_RESPONSE_NAME,
            ExtendedResponseName,
            extended_response_name,
        )
        .on_each(
            &[DiagnosticMessage, Referral, ExtendedResponseName],
            asn1::EXTENDED_RESPONSE_VALUE,
            ExtendedResponseValue,
            extended_response_value,
        );

    // SearchRequest
    b.on(SearchRequest, asn1::OCTET_STRING, SearchBase, search_base)
        .on(SearchBase, asn1::ENUMERATED, SearchScope, search_scope)
        .on(SearchScope, asn1::ENUMERATED, SearchDeref, search_deref)
        .on(SearchDeref, asn1::INTEGER, SearchSizeLimit, size_limit)
        .on(SearchSizeLimit, asn1::INTEGER, SearchTimeLimit, time_limit)
        .on(SearchTimeLimit, asn1::BOOLEAN, SearchTypesOnly, types_only);

    let mut filter_start = vec![SearchTypesOnly, FilterAnd, FilterOr, FilterNot];
    filter_start.extend_from_slice(FILTER_END);
    b.on_each(&filter_start, asn1::FILTER_AND, FilterAnd, filter_and)
        .on_each(&filter_start, asn1::FILTER_OR, FilterOr, filter_or)
        .on_each(&filter_start, asn1::FILTER_NOT, FilterNot, filter_not)
        .on_each(&filter_start, asn1::FILTER_EQUALITY, FilterEquality, filter_equality)
        .on_each(&filter_start, asn1::FILTER_SUBSTRINGS, FilterSubstrings, filter_substrings)
        .on_each(&filter_start, asn1::FILTER_GREATER_OR_EQUAL, FilterGreaterOrEqual, filter_greater_or_equal)
        .on_each(&filter_start, asn1::FILTER_LESS_OR_EQUAL, FilterLessOrEqual, filter_less_or_equal)
        .on_each(&filter_start, asn1::FILTER_PRESENT, FilterPresent, filter_present)
        .on_each(&filter_start, asn1::FILTER_APPROX, FilterApprox, filter_approx)
        .on_each(&filter_start, asn1::FILTER_EXTENSIBLE, FilterExtensible, filter_extensible);

    b.on_each(
        &[FilterEquality, FilterGreaterOrEqual, FilterLessOrEqual, FilterApprox],
        asn1::OCTET_STRING,
        AssertionAttribute,
        assertion_attribute,
    )
    .on(AssertionAttribute, asn1::OCTET_STRING, AssertionValue, assertion_value);

    b.on(FilterSubstrings, asn1::OCTET_STRING, SubstringsType, substrings_type)
        .on(SubstringsType, asn1::SEQUENCE, SubstringsSeq, substrings_seq)
        .on(SubstringsSeq, asn1::SUBSTRING_INITIAL, SubstringInitial, substring_initial)
        .on_each(
            &[SubstringsSeq, SubstringInitial, SubstringAny],
            asn1::SUBSTRING_ANY,
            SubstringAny,
            substring_any,
        )
        .on_each(
            &[SubstringsSeq, SubstringInitial, SubstringAny],
            asn1::SUBSTRING_FINAL,
            SubstringFinal,
            substring_final,
        );

    b.on(FilterExtensible, asn1::MATCHING_RULE, MatchingRule, matching_rule)
        .on_each(&[FilterExtensible, MatchingRule], asn1::MATCHING_TYPE, MatchType, match_type)
        .on_each(&[FilterExtensible, MatchingRule, MatchType], asn1::MATCH_VALUE, MatchValue, match_value)
        .on(MatchValue, asn1::DN_ATTRIBUTES, DnAttributes, dn_attributes);

    let mut filter_done = vec![FilterAnd, FilterOr];
    filter_done.extend_from_slice(FILTER_END);
    b.on_each(&filter_done, asn1::SEQUENCE, SearchAttributes, search_attributes)
        .on_each(&[SearchAttributes, SearchAttribute], asn1::OCTET_STRING, SearchAttribute, search_attribute);

    // SearchResultEntry and AddRequest share the attribute list
    b.on(SearchResultEntry, asn1::OCTET_STRING, EntryName, entry_name)
        .on(EntryName, asn1::SEQUENCE, AttributeList, attribute_list)
        .on(AddRequest, asn1::OCTET_STRING, AddEntry, add_entry)
        .on(AddEntry, asn1::SEQUENCE, AttributeList, attribute_list)
        .on_each(
            &[AttributeList, AttributeVals, AttributeValue],
            asn1::SEQUENCE,
            PartialAttribute,
            partial_attribute,
        )
        .on(PartialAttribute, asn1::OCTET_STRING, AttributeType, attribute_type)
        .on(AttributeType, asn1::SET, AttributeVals, attribute_vals)
        .on_each(&[AttributeVals, AttributeValue], asn1::OCTET_STRING, AttributeValue, attribute_value);

    b.on_each(
        &[SearchResultReference, ReferenceUri],
        asn1::OCTET_STRING,
        ReferenceUri,
        reference_uri,
    );

    // ModifyRequest
    b.on(ModifyRequest, asn1::OCTET_STRING, ModifyObject, modify_object)
        .on(ModifyObject, asn1::SEQUENCE, ModifyChanges, modify_changes)
        .on_each(
            &[ModifyChanges, ModifyAttributeVals, ModifyAttributeValue],
            asn1::SEQUENCE,
            ModifyChange,
            modify_change,
        )
        .on(ModifyChange, asn1::ENUMERATED, ModifyOperation, modify_operation)
        .on(ModifyOperation, asn1::SEQUENCE, ModifyAttribute, modify_attribute)
        .on(ModifyAttribute, asn1::OCTET_STRING, ModifyAttributeType, attribute_type)
        .on(ModifyAttributeType, asn1::SET, ModifyAttributeVals, attribute_vals)
        .on_each(
            &[ModifyAttributeVals, ModifyAttributeValue],
            asn1::OCTET_STRING,
            ModifyAttributeValue,
            modify_attribute_value,
        );

    // ModifyDNRequest
    b.on(ModifyDnRequest, asn1::OCTET_STRING, ModifyDnEntry, modify_dn_entry)
        .on(ModifyDnEntry, asn1::OCTET_STRING, ModifyDnNewRdn, modify_dn_new_rdn)
        .on(ModifyDnNewRdn, asn1::BOOLEAN, ModifyDnDeleteOldRdn, modify_dn_delete_old_rdn)
        .on(ModifyDnDeleteOldRdn, asn1::NEW_SUPERIOR, ModifyDnNewSuperior, modify_dn_new_superior);

    // CompareRequest
    b.on(CompareRequest, asn1::OCTET_STRING, CompareEntry, compare_entry)
        .on(CompareEntry, asn1::SEQUENCE, CompareAva, compare_ava)
        .on(CompareAva, asn1::OCTET_STRING, CompareAttribute, compare_attribute)
        .on(CompareAttribute, asn1::OCTET_STRING, CompareValue, compare_value);

    // ExtendedRequest and IntermediateResponse
    b.on(ExtendedRequest, asn1::EXTENDED_REQUEST_NAME, ExtendedRequestName, extended_request_name)
        .on(ExtendedRequestName, asn1::EXTENDED_REQUEST_VALUE, ExtendedRequestValue, extended_request_value)
        .on(IntermediateResponse, asn1::INTERMEDIATE_NAME, IntermediateName, intermediate_name)
        .on_each(
            &[IntermediateResponse, IntermediateName],
            asn1::INTERMEDIATE_VALUE,
            IntermediateValue,
            intermediate_value,
        );

    // Controls
    b.on_each(OP_END, asn1::CONTROLS, Controls, controls);
    let mut control_start = vec![Controls];
    control_start.extend_from_slice(CONTROL_END);
    b.on_each(&control_start, asn1::SEQUENCE, Control, control)
        .on(Control, asn1::OCTET_STRING, ControlType, control_type)
        .on(ControlType, asn1::BOOLEAN, ControlCriticality, control_criticality)
        .on_each(&[ControlType, ControlCriticality], asn1::OCTET_STRING, ControlValue, control_value);

    b.finish()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups() {
        let t = TABLE.lookup(State::Start, asn1::SEQUENCE).unwrap();
        assert_eq!(t.next, State::LdapMessage);
        assert!(!t.end_allowed);
        assert!(TABLE.lookup(State::Start, asn1::INTEGER).is_none());

        let t = TABLE.lookup(State::MessageId, asn1::UNBIND_REQUEST).unwrap();
        assert!(t.end_allowed);

        // 0xa0 is a filter in a search and the controls after an op
        assert_eq!(TABLE.lookup(State::SearchTypesOnly, 0xa0).unwrap().next, State::FilterAnd);
        assert_eq!(TABLE.lookup(State::SearchAttribute, 0xa0).unwrap().next, State::Controls);
        assert_eq!(TABLE.lookup(State::AssertionValue, 0xa0).unwrap().next, State::FilterAnd);
        assert!(TABLE.lookup(State::Controls, 0xa0).is_none());

        // 0x81 depends on the enclosing construct
        assert_eq!(TABLE.lookup(State::SubstringsSeq, 0x81).unwrap().next, State::SubstringAny);
        assert_eq!(TABLE.lookup(State::FilterExtensible, 0x81).unwrap().next, State::MatchingRule);
        assert_eq!(
            TABLE.lookup(State::ExtendedRequestName, 0x81).unwrap().next,
            State::ExtendedRequestValue
        );
        assert!(TABLE.lookup(State::SubstringFinal, 0x81).is_none());
    }

    #[test]
    fn every_state_is_reachable() {
        let mut reached = vec![false; State::COUNT];
        reached[State::Start.index()] = true;
        for from in State::ALL {
            for tag in 0..=255u8 {
                if let Some(t) = TABLE.lookup(*from, tag) {
                    reached[t.next.index()] = true;
                }
            }
        }
        for state in State::ALL {
            assert!(reached[state.index()], "{:?} is unreachable", state);
        }
        assert!(!TABLE.is_empty());
    }
}
