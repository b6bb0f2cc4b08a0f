use bytes::Buf;
use log::debug;

use crate::container::DecodeContainer;
use crate::error::DecodeError;
use crate::ldap::LdapMessage;

pub use crate::encoder::{encode, encode_into};

/// Feeds `input` into `container`.
///
/// Returns the message once its outer SEQUENCE is complete, leaving any
/// following bytes in `input`, or `None` when `input` ran out first. In that
/// case the container keeps its position and the next call continues where
/// this one stopped. On error the container is reset for the next PDU.
pub fn decode<B: Buf>(container: &mut DecodeContainer, input: &mut B) -> Result<Option<LdapMessage>, DecodeError> {
    container.feed(input).map_err(|e| {
        debug!("dropping pdu in state {:?}: {}", container.state(), e);
        container.clean();
        e
    })
}

/// Decodes the first message of `data` with the default configuration and
/// returns it along with the number of bytes it took.
pub fn parse_message(data: &[u8]) -> Result<Option<(LdapMessage, usize)>, DecodeError> {
    let mut container = DecodeContainer::default();
    let mut input = data;
    let msg = decode(&mut container, &mut input)?;
    Ok(msg.map(|m| (m, data.len() - input.len())))
}


#[cfg(test)]
use crate::config::DecoderConfig;
#[cfg(test)]
use crate::control::{Control, ControlValue, PagedResults, SyncInfoValue, MANAGE_DSA_IT, PAGED_RESULTS, SYNC_INFO};
#[cfg(test)]
use crate::dn::{Dn, Rdn};
#[cfg(test)]
use crate::filter::{AttributeValueAssertion, ExtensibleMatch, Filter, SubstringFilter};
#[cfg(test)]
use crate::grammar::State;
#[cfg(test)]
use crate::ldap::*;
#[cfg(test)]
use bytes::Bytes;

#[cfg(test)]
fn parse_hex(s: &str) -> Result<Option<(LdapMessage, usize)>, DecodeError> {
    parse_message(&hex::decode(s).unwrap())
}

#[cfg(test)]
fn dn(s: &str) -> Dn {
    Dn::parse(s).unwrap()
}

#[cfg(test)]
fn result(code: ResultCode, matched: &str, message: &str) -> LdapResult {
    LdapResult::new(code, dn(matched), message)
}

#[cfg(test)]
fn search(filter: Filter) -> MsgSearch {
    MsgSearch {
        base_object: dn("dc=example,dc=com"),
        scope: SearchScope::WholeSubtree,
        deref: DerefAliases::DerefAlways,
        size_limit: 100,
        time_limit: 30,
        types_only: false,
        filter,
        attributes: vec!["cn".to_owned(), "mail".to_owned()],
    }
}

#[cfg(test)]
fn nested_filter() -> Filter {
    // (&(|(cn=a)(cn=b))(!(sn=c)))
    Filter::And(vec![
        Filter::Or(vec![Filter::equality("cn", "a"), Filter::equality("cn", "b")]),
        Filter::not(Filter::equality("sn", "c")),
    ])
}

#[cfg(test)]
fn all_variants() -> Vec<LdapMessage> {
    let mut with_controls = LdapMessage::new(40, MessageParams::Del(MsgDel { entry: dn("cn=old,dc=test") }));
    with_controls.controls = vec![
        Control::new(MANAGE_DSA_IT, true, ControlValue::ManageDsaIt),
        Control::new(
            PAGED_RESULTS,
            false,
            ControlValue::PagedResults(PagedResults {
                size: 500,
                cookie: Bytes::from_static(b"\x00\x01"),
            }),
        ),
        Control::opaque("1.3.6.1.4.1.42.2.27.8.5.1", true, Some(Bytes::from_static(b"\x30\x00"))),
        Control::opaque("1.3.6.1.4.1.4203.1.5.1", false, None),
        Control::new(
            SYNC_INFO,
            false,
            ControlValue::SyncInfo(SyncInfoValue::SyncIdSet {
                cookie: Some(Bytes::from_static(b"c")),
                refresh_deletes: true,
                uuids: vec![],
            }),
        ),
    ];

    let params = vec![
        MessageParams::Bind(MsgBind {
            version: 3,
            name: dn("cn=admin,dc=test"),
            authentication: Authentication::Simple(Bytes::from_static(b"secret")),
        }),
        MessageParams::Bind(MsgBind {
            version: 3,
            name: Dn::root(),
            authentication: Authentication::Sasl {
                mechanism: "GSSAPI".to_owned(),
                credentials: Some(Bytes::from_static(b"\x60\x82")),
            },
        }),
        MessageParams::Bind(MsgBind {
            version: 3,
            name: Dn::root(),
            authentication: Authentication::Sasl {
                mechanism: "EXTERNAL".to_owned(),
                credentials: None,
            },
        }),
        MessageParams::BindResponse(MsgBindResponse {
            result: result(ResultCode::SaslBindInProgress, "", ""),
            server_sasl_creds: Some(Bytes::from_static(b"challenge")),
        }),
        MessageParams::Unbind(MsgUnbind {}),
        MessageParams::Search(search(nested_filter())),
        MessageParams::Search(search(Filter::Or(vec![
            Filter::Substrings(SubstringFilter {
                attribute: "cn".to_owned(),
                initial: Some(Value::from("jo")),
                any: vec![Value::from("h"), Value::from("n")],
                final_: None,
            }),
            Filter::GreaterOrEqual(AttributeValueAssertion {
                attribute: "age".to_owned(),
                value: Value::from("18"),
            }),
            Filter::LessOrEqual(AttributeValueAssertion {
                attribute: "age".to_owned(),
                value: Value::from("65"),
            }),
            Filter::Approx(AttributeValueAssertion {
                attribute: "sn".to_owned(),
                value: Value::from("smith"),
            }),
            Filter::Extensible(ExtensibleMatch {
                matching_rule: Some("2.5.13.2".to_owned()),
                attribute: Some("cn".to_owned()),
                value: Value::from("Fred"),
                dn_attributes: true,
            }),
            Filter::Extensible(ExtensibleMatch {
                matching_rule: None,
                attribute: Some("ou".to_owned()),
                value: Value::from("x"),
                dn_attributes: false,
            }),
            Filter::present("objectClass"),
        ]))),
        MessageParams::SearchResult(MsgSearchResult {
            name: dn("uid=jdoe,ou=people,dc=test"),
            attributes: vec![
                Attribute::new("objectClass", vec![Value::from("top"), Value::from("person")]),
                Attribute::new("jpegPhoto", vec![Value::Binary(Bytes::from_static(b"\xff\xd8\xff"))]),
                Attribute::new("description", vec![]),
            ],
        }),
        MessageParams::SearchResultDone(MsgSearchResultDone {
            result: LdapResult {
                code: ResultCode::Referral,
                matched_dn: dn("dc=test"),
                message: "see elsewhere".to_owned(),
                referrals: vec!["ldap://a.test/".to_owned(), "ldap://b.test/".to_owned()],
            },
        }),
        MessageParams::SearchResultReference(MsgSearchResultReference {
            uris: vec!["ldap://c.test/dc=test??sub".to_owned()],
        }),
        MessageParams::Modify(MsgModify {
            object: dn("uid=jdoe,dc=test"),
            changes: vec![
                Modification {
                    operation: ModifyOperation::Replace,
                    attribute: Attribute::new("mail", vec![Value::from("j@test")]),
                },
                Modification {
                    operation: ModifyOperation::Delete,
                    attribute: Attribute::new("phone", vec![]),
                },
                Modification {
                    operation: ModifyOperation::Increment,
                    attribute: Attribute::new("uidNumber", vec![Value::from("1")]),
                },
            ],
        }),
        MessageParams::ModifyResponse(MsgModifyResponse {
            result: result(ResultCode::Success, "", ""),
        }),
        MessageParams::Add(MsgAdd {
            entry: dn("cn=new,dc=test"),
            attributes: vec![
                Attribute::new("cn", vec![Value::from("new")]),
                Attribute::new("userPassword", vec![Value::Binary(Bytes::from_static(b"pw"))]),
            ],
        }),
        MessageParams::AddResponse(MsgAddResponse {
            result: result(ResultCode::EntryAlreadyExists, "dc=test", "exists"),
        }),
        MessageParams::Del(MsgDel { entry: dn("cn=old,dc=test") }),
        MessageParams::DelResponse(MsgDelResponse {
            result: result(ResultCode::Other(16654), "", "vendor"),
        }),
        MessageParams::ModifyDn(MsgModifyDn {
            entry: dn("cn=old,dc=test"),
            new_rdn: Rdn::parse("cn=new").unwrap(),
            delete_old_rdn: true,
            new_superior: Some(dn("ou=moved,dc=test")),
        }),
        MessageParams::ModifyDn(MsgModifyDn {
            entry: dn("cn=old,dc=test"),
            new_rdn: Rdn::parse("cn=new").unwrap(),
            delete_old_rdn: false,
            new_superior: None,
        }),
        MessageParams::ModifyDnResponse(MsgModifyDnResponse {
            result: result(ResultCode::NotAllowedOnRdn, "", ""),
        }),
        MessageParams::Compare(MsgCompare {
            entry: dn("uid=jdoe,dc=test"),
            attribute: "mail".to_owned(),
            value: Value::from("j@test"),
        }),
        MessageParams::CompareResponse(MsgCompareResponse {
            result: result(ResultCode::CompareTrue, "", ""),
        }),
        MessageParams::Abandon(MsgAbandon { id: 7 }),
        MessageParams::Extended(MsgExtended {
            name: "1.3.6.1.4.1.1466.20037".to_owned(),
            value: None,
        }),
        MessageParams::Extended(MsgExtended {
            name: "1.3.6.1.4.1.4203.1.11.1".to_owned(),
            value: Some(Bytes::from_static(b"\x30\x00")),
        }),
        MessageParams::ExtendedResponse(MsgExtendedResponse {
            result: result(ResultCode::Success, "", ""),
            name: Some("1.3.6.1.4.1.1466.20037".to_owned()),
            value: Some(Bytes::from_static(b"ok")),
        }),
        MessageParams::ExtendedResponse(MsgExtendedResponse::default()),
        MessageParams::Intermediate(MsgIntermediate {
            name: Some(SYNC_INFO.to_owned()),
            value: Some(IntermediateValue::SyncInfo(SyncInfoValue::NewCookie(Bytes::new()))),
        }),
        MessageParams::Intermediate(MsgIntermediate {
            name: Some(SYNC_INFO.to_owned()),
            value: Some(IntermediateValue::SyncInfo(SyncInfoValue::RefreshDelete {
                cookie: Some(Bytes::from_static(b"rid=001,csn=1")),
                refresh_done: false,
            })),
        }),
        MessageParams::Intermediate(MsgIntermediate {
            name: Some(SYNC_INFO.to_owned()),
            value: Some(IntermediateValue::SyncInfo(SyncInfoValue::RefreshPresent {
                cookie: None,
                refresh_done: true,
            })),
        }),
        MessageParams::Intermediate(MsgIntermediate {
            name: Some(SYNC_INFO.to_owned()),
            value: Some(IntermediateValue::SyncInfo(SyncInfoValue::SyncIdSet {
                cookie: None,
                refresh_deletes: false,
                uuids: vec![[0xab; 16], [0x01; 16]],
            })),
        }),
        MessageParams::Intermediate(MsgIntermediate {
            name: None,
            value: Some(IntermediateValue::Opaque(Bytes::from_static(b"\x80\x00"))),
        }),
        MessageParams::Intermediate(MsgIntermediate::default()),
    ];

    let mut msgs: Vec<LdapMessage> = params
        .into_iter()
        .enumerate()
        .map(|(i, p)| LdapMessage::new(i as u32 + 1, p))
        .collect();
    msgs.push(with_controls);
    msgs.push(LdapMessage::new(i32::MAX as u32, MessageParams::Unbind(MsgUnbind {})));
    msgs
}

#[test]
fn search_test() {
    let data = hex::decode("3029020102632404000a01020a0100020100020100010100a00f8703617861a30804027373040273733000").unwrap();
    let (m, size) = parse_message(&data).unwrap().unwrap();
    assert_eq!(size, 43);
    assert_eq!(m.id, 2);
    if let MessageParams::Search(s) = &m.params {
        assert!(s.base_object.is_root());
        assert_eq!(s.scope, SearchScope::WholeSubtree);
        assert_eq!(s.deref, DerefAliases::NeverDerefAliases);
        assert_eq!(s.size_limit, 0);
        assert_eq!(s.time_limit, 0);
        assert!(!s.types_only);
        assert!(s.attributes.is_empty());
        assert_eq!(
            s.filter,
            Filter::And(vec![Filter::present("axa"), Filter::equality("ss", "ss")])
        );
    } else {
        unreachable!();
    }
    assert_eq!(&encode(&m).unwrap()[..], &data[..]);
}

#[test]
fn bind_test() {
    let data = hex::decode("30160201016011020103040563 6e3d78788005 6865736c6f".replace(' ', "")).unwrap();
    let (m, size) = parse_message(&data).unwrap().unwrap();
    assert_eq!(size, 24);
    assert_eq!(m.id, 1);
    if let MessageParams::Bind(b) = &m.params {
        assert_eq!(b.name.as_str(), "cn=xx");
        assert_eq!(b.authentication, Authentication::Simple(Bytes::from_static(b"heslo")));
        assert_eq!(b.version, 3);
    } else {
        unreachable!();
    }
    assert_eq!(&encode(&m).unwrap()[..], &data[..]);
}

#[test]
fn del_test() {
    let (m, size) = parse_hex("300c0201054a0764633d74657374").unwrap().unwrap();
    assert_eq!(size, 14);
    assert_eq!(m, LdapMessage::new(5, MessageParams::Del(MsgDel { entry: dn("dc=test") })));
}

#[test]
fn unbind_test() {
    let msg = LdapMessage::new(1, MessageParams::Unbind(MsgUnbind {}));
    assert_eq!(hex::encode(encode(&msg).unwrap()), "30050201014200");
    assert_eq!(parse_hex("30050201014200").unwrap().unwrap(), (msg, 7));
}

#[test]
fn round_trip_test() {
    for msg in all_variants() {
        let bytes = encode(&msg).unwrap();
        let (decoded, size) = parse_message(&bytes).unwrap().unwrap();
        assert_eq!(size, bytes.len(), "{}", msg.params.name());
        assert_eq!(decoded, msg);
        assert_eq!(encode(&decoded).unwrap(), bytes);
    }
}

#[test]
fn resumable_test() {
    for msg in all_variants() {
        let bytes = encode(&msg).unwrap();
        for split in 0..bytes.len() {
            let mut container = DecodeContainer::default();
            let mut first = &bytes[..split];
            assert!(decode(&mut container, &mut first).unwrap().is_none(), "split at {}", split);
            assert!(first.is_empty());
            let mut second = &bytes[split..];
            let decoded = decode(&mut container, &mut second).unwrap().unwrap();
            assert_eq!(decoded, msg, "split at {}", split);
            assert!(second.is_empty());
            assert!(container.is_idle());
        }
    }
}

#[test]
fn byte_by_byte_test() {
    let bytes = encode(&LdapMessage::new(9, MessageParams::Search(search(nested_filter())))).unwrap();
    let mut container = DecodeContainer::default();
    let mut out = None;
    for (i, b) in bytes.iter().enumerate() {
        let mut one: &[u8] = std::slice::from_ref(b);
        let r = decode(&mut container, &mut one).unwrap();
        if i + 1 < bytes.len() {
            assert!(r.is_none());
        } else {
            out = r;
        }
    }
    match out.unwrap().params {
        MessageParams::Search(s) => assert_eq!(s.filter, nested_filter()),
        _ => unreachable!(),
    }
}

#[test]
fn consecutive_messages_test() {
    let data = hex::decode("30050201014200300c0201054a0764633d74657374").unwrap();
    let mut container = DecodeContainer::default();
    let mut input = &data[..];
    let first = decode(&mut container, &mut input).unwrap().unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(input.len(), 14);
    let second = decode(&mut container, &mut input).unwrap().unwrap();
    assert_eq!(second.id, 5);
    assert!(input.is_empty());
    assert!(decode(&mut container, &mut input).unwrap().is_none());
}

#[test]
fn substrings_test() {
    let (m, _) = parse_hex(
        "30390201076334040764633d746573740a01020a0103020200640201000101ffa40f0402636e300980016181016282016330080402636e0402736e",
    )
    .unwrap()
    .unwrap();
    match m.params {
        MessageParams::Search(s) => {
            assert_eq!(s.size_limit, 100);
            assert!(s.types_only);
            assert_eq!(s.deref, DerefAliases::DerefAlways);
            assert_eq!(s.attributes, vec!["cn".to_owned(), "sn".to_owned()]);
            assert_eq!(
                s.filter,
                Filter::Substrings(SubstringFilter {
                    attribute: "cn".to_owned(),
                    initial: Some(Value::from("a")),
                    any: vec![Value::from("b")],
                    final_: Some(Value::from("c")),
                })
            );
        }
        _ => unreachable!(),
    }
}

#[test]
fn empty_values_test() {
    // zero length name and simple credentials
    let (m, _) = parse_hex("300c020101600702010304008000").unwrap().unwrap();
    match m.params {
        MessageParams::Bind(b) => {
            assert!(b.name.is_root());
            assert_eq!(b.authentication, Authentication::Simple(Bytes::new()));
        }
        _ => unreachable!(),
    }

    // empty AND as the whole filter
    let data = "301a020101631504000a01000a0100020100020100010100a0003000";
    let (m, _) = parse_hex(data).unwrap().unwrap();
    match &m.params {
        MessageParams::Search(s) => assert_eq!(s.filter, Filter::And(vec![])),
        _ => unreachable!(),
    }
    assert_eq!(hex::encode(encode(&m).unwrap()), data);

    // empty controls
    assert!(matches!(
        parse_hex("30070201014200a000"),
        Err(DecodeError::EmptyRequiredField("controls"))
    ));
}

#[test]
fn controls_test() {
    let data = "30300201014200a02930270416312e322e3834302e3131333535362e312e342e3331390101ff040a30080202010004026162";
    let (m, _) = parse_hex(data).unwrap().unwrap();
    assert_eq!(
        m.controls,
        vec![Control::new(
            PAGED_RESULTS,
            true,
            ControlValue::PagedResults(PagedResults {
                size: 256,
                cookie: Bytes::from_static(b"ab"),
            })
        )]
    );
    assert_eq!(hex::encode(encode(&m).unwrap()), data);
}

#[test]
fn explicit_default_test() {
    // criticality FALSE written out is decoded and dropped on encode
    let (m, _) = parse_hex("30250201014200a01e301c0417322e31362e3834302e312e3131333733302e332e342e32010100")
        .unwrap()
        .unwrap();
    assert_eq!(m.controls, vec![Control::new(MANAGE_DSA_IT, false, ControlValue::ManageDsaIt)]);
    assert_eq!(
        hex::encode(encode(&m).unwrap()),
        "30220201014200a01b30190417322e31362e3834302e312e3131333733302e332e342e32"
    );

    // same for dnAttributes FALSE
    let (m, _) = parse_hex("3024020101631f04000a01000a0100020100020100010100a90a8202636e8301788401003000")
        .unwrap()
        .unwrap();
    match &m.params {
        MessageParams::Search(s) => assert!(matches!(&s.filter, Filter::Extensible(e) if !e.dn_attributes)),
        _ => unreachable!(),
    }
    assert_eq!(
        hex::encode(encode(&m).unwrap()),
        "3021020101631c04000a01000a0100020100020100010100a9078202636e8301783000"
    );
}

#[test]
fn message_id_test() {
    assert!(matches!(
        parse_hex("30050201ff4200"),
        Err(DecodeError::InvalidScalar { field: "message id", .. })
    ));
    assert!(matches!(
        parse_hex("3009020500800000004200"),
        Err(DecodeError::InvalidScalar { field: "message id", .. })
    ));
    assert!(matches!(
        parse_hex("300402004200"),
        Err(DecodeError::EmptyRequiredField("message id"))
    ));
    // non minimal form is accepted
    assert_eq!(parse_hex("3007020300000142 00".replace(' ', "").as_str()).unwrap().unwrap().0.id, 1);
}

#[test]
fn rejected_test() {
    assert!(matches!(
        parse_hex("30050201010400"),
        Err(DecodeError::UnexpectedTag { state: State::MessageId, tag: 0x04 })
    ));
    assert!(matches!(parse_hex("3005020101420100"), Err(DecodeError::MalformedLength(_))));
    // second top level filter
    assert!(matches!(
        parse_hex("3020020101631b04000a01000a01000201000201000101008702636e8702736e3000"),
        Err(DecodeError::MalformedLength(_))
    ));
    assert!(matches!(
        parse_hex("301502010968100404636e3d78300830060402636e3100"),
        Err(DecodeError::EmptyRequiredField("attribute value"))
    ));
    assert!(matches!(
        parse_hex("300e02010161090a010a04000400a300"),
        Err(DecodeError::EmptyRequiredField("referral"))
    ));
    assert!(matches!(
        parse_hex("300f0201016b0a0a010004000400870178"),
        Err(DecodeError::UnexpectedTag { state: State::DiagnosticMessage, tag: 0x87 })
    ));
    // substring after the substrings sequence closed, still inside the filter
    assert!(matches!(
        parse_hex("3026020101632104000a01000a0100020100020100010100a40c0402636e30038101618101623000"),
        Err(DecodeError::UnexpectedTag { state: State::SubstringAny, tag: 0x81 })
    ));
    // unbind carrying content
    assert!(matches!(
        parse_hex("3006020101420100"),
        Err(DecodeError::InvalidScalar { .. })
    ));
}

#[test]
fn pdu_too_large_test() {
    let mut container = DecodeContainer::new(DecoderConfig::default().with_max_pdu_size(16));
    let mut input: &[u8] = &[0x30, 0x82, 0xff, 0xff, 0x02];
    assert!(matches!(
        decode(&mut container, &mut input),
        Err(DecodeError::PduTooLarge { length: 0xffff, limit: 16 })
    ));
    assert!(container.is_idle());

    let mut input: &[u8] = &[0x30, 0x05, 0x02, 0x01, 0x01, 0x42, 0x00];
    assert!(decode(&mut container, &mut input).unwrap().is_some());
}

#[test]
fn error_response_test() {
    // bind name that is not a DN
    let err = parse_hex("3013020101600e0201030402787880056865736c6f").unwrap_err();
    assert!(matches!(err.kind(), DecodeError::InvalidScalar { field: "bind name", .. }));
    let response = err.response().unwrap();
    assert_eq!(response.id, 1);
    match &response.params {
        MessageParams::BindResponse(r) => assert_eq!(r.result.code, ResultCode::InvalidCredentials),
        _ => unreachable!(),
    }

    // unknown search scope
    let err = parse_hex("301a020101631504000a01050a0100020100020100010100a0003000").unwrap_err();
    let response = err.response().unwrap();
    assert_eq!(response.params.name(), "SearchResultDone");
    assert_eq!(response.params.result().unwrap().code, ResultCode::ProtocolError);

    // add entry that is not a DN
    let err = parse_hex("301702010968120403626164300b30090402636e3103040178").unwrap_err();
    let response = err.response().unwrap();
    assert_eq!(response.id, 9);
    assert_eq!(response.params.result().unwrap().code, ResultCode::NamingViolation);

    // unknown modify operation
    let err = parse_hex("301a02010466150404636e3d78300d300b0a010730060402636e3100").unwrap_err();
    let response = err.response().unwrap();
    assert_eq!(response.params.name(), "ModifyResponse");
    assert_eq!(response.params.result().unwrap().code, ResultCode::ProtocolError);

    // del entry that is not a DN
    let err = parse_hex("30060201014a0178").unwrap_err();
    assert!(matches!(err.kind(), DecodeError::InvalidScalar { field: "entry", .. }));
    let response = err.response().unwrap();
    assert_eq!(response.params.name(), "DelResponse");
    assert_eq!(response.params.result().unwrap().code, ResultCode::InvalidDnSyntax);

    // responses themselves get no reply
    assert!(parse_hex("300f0201016b0a0a010004000400870178").unwrap_err().response().is_none());
}

#[test]
fn sync_info_test() {
    let data = "303d02010379388018312e332e362e312e342e312e343230332e312e392e312e34811ca31a0401630101ff3112041011111111111111111111111111111111";
    let (m, _) = parse_hex(data).unwrap().unwrap();
    match &m.params {
        MessageParams::Intermediate(i) => assert_eq!(
            i.value,
            Some(IntermediateValue::SyncInfo(SyncInfoValue::SyncIdSet {
                cookie: Some(Bytes::from_static(b"c")),
                refresh_deletes: true,
                uuids: vec![[0x11; 16]],
            }))
        ),
        _ => unreachable!(),
    }
    assert_eq!(hex::encode(encode(&m).unwrap()), data);

    // same value without the sync info name stays opaque
    let other = "302a02010379258005312e322e33811ca31a0401630101ff3112041011111111111111111111111111111111";
    let (m, _) = parse_hex(other).unwrap().unwrap();
    match &m.params {
        MessageParams::Intermediate(i) => assert!(matches!(i.value, Some(IntermediateValue::Opaque(_)))),
        _ => unreachable!(),
    }

    // a uuid must be 16 bytes
    let short = "302e02010379298018312e332e362e312e342e312e343230332e312e392e312e34810da30b0401630101ff3103040111";
    assert!(matches!(
        parse_hex(short),
        Err(DecodeError::InvalidScalar { field: "sync uuid", .. })
    ));
}

#[test]
fn binary_attributes_test() {
    let msg = LdapMessage::new(
        3,
        MessageParams::Add(MsgAdd {
            entry: dn("cn=x"),
            attributes: vec![
                Attribute::new("x-blob", vec![Value::from("abc")]),
                Attribute::new("cn", vec![Value::Binary(Bytes::from_static(b"\xff\xfe"))]),
            ],
        }),
    );
    let bytes = encode(&msg).unwrap();
    let config = DecoderConfig::default().with_binary_attributes(|name: &str| name.starts_with("x-"));
    let mut container = DecodeContainer::new(config);
    let mut input = &bytes[..];
    let decoded = decode(&mut container, &mut input).unwrap().unwrap();
    match decoded.params {
        MessageParams::Add(a) => {
            assert_eq!(a.attributes[0].values, vec![Value::Binary(Bytes::from_static(b"abc"))]);
            // not utf-8, kept binary
            assert_eq!(a.attributes[1].values, vec![Value::Binary(Bytes::from_static(b"\xff\xfe"))]);
        }
        _ => unreachable!(),
    }
}
