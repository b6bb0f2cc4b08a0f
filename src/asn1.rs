use byteorder::{BigEndian, ByteOrder};
use bytes::BufMut;
use log::warn;

use crate::error::DecodeError;

pub const BOOLEAN: u8 = 0x01;
pub const INTEGER: u8 = 0x02;
pub const OCTET_STRING: u8 = 0x04;
pub const ENUMERATED: u8 = 0x0a;
pub const SEQUENCE: u8 = 0x30;
pub const SET: u8 = 0x31;

pub const CONSTRUCTED: u8 = 0x20;

pub const BIND_REQUEST: u8 = 0x60;
pub const BIND_RESPONSE: u8 = 0x61;
pub const UNBIND_REQUEST: u8 = 0x42;
pub const SEARCH_REQUEST: u8 = 0x63;
pub const SEARCH_RESULT_ENTRY: u8 = 0x64;
pub const SEARCH_RESULT_DONE: u8 = 0x65;
pub const SEARCH_RESULT_REFERENCE: u8 = 0x73;
pub const MODIFY_REQUEST: u8 = 0x66;
pub const MODIFY_RESPONSE: u8 = 0x67;
pub const ADD_REQUEST: u8 = 0x68;
pub const ADD_RESPONSE: u8 = 0x69;
pub const DEL_REQUEST: u8 = 0x4a;
pub const DEL_RESPONSE: u8 = 0x6b;
pub const MODIFY_DN_REQUEST: u8 = 0x6c;
pub const MODIFY_DN_RESPONSE: u8 = 0x6d;
pub const COMPARE_REQUEST: u8 = 0x6e;
pub const COMPARE_RESPONSE: u8 = 0x6f;
pub const ABANDON_REQUEST: u8 = 0x50;
pub const EXTENDED_REQUEST: u8 = 0x77;
pub const EXTENDED_RESPONSE: u8 = 0x78;
pub const INTERMEDIATE_RESPONSE: u8 = 0x79;

pub const CONTROLS: u8 = 0xa0;

pub const FILTER_AND: u8 = 0xa0;
pub const FILTER_OR: u8 = 0xa1;
pub const FILTER_NOT: u8 = 0xa2;
pub const FILTER_EQUALITY: u8 = 0xa3;
pub const FILTER_SUBSTRINGS: u8 = 0xa4;
pub const FILTER_GREATER_OR_EQUAL: u8 = 0xa5;
pub const FILTER_LESS_OR_EQUAL: u8 = 0xa6;
pub const FILTER_PRESENT: u8 = 0x87;
pub const FILTER_APPROX: u8 = 0xa8;
pub const FILTER_EXTENSIBLE: u8 = 0xa9;

pub const SUBSTRING_INITIAL: u8 = 0x80;
pub const SUBSTRING_ANY: u8 = 0x81;
pub const SUBSTRING_FINAL: u8 = 0x82;

pub const MATCHING_RULE: u8 = 0x81;
pub const MATCHING_TYPE: u8 = 0x82;
pub const MATCH_VALUE: u8 = 0x83;
pub const DN_ATTRIBUTES: u8 = 0x84;

pub const AUTH_SIMPLE: u8 = 0x80;
pub const AUTH_SASL: u8 = 0xa3;
pub const REFERRAL: u8 = 0xa3;
pub const SERVER_SASL_CREDS: u8 = 0x87;
pub const NEW_SUPERIOR: u8 = 0x80;
pub const EXTENDED_REQUEST_NAME: u8 = 0x80;
pub const EXTENDED_REQUEST_VALUE: u8 = 0x81;
pub const EXTENDED_RESPONSE_NAME: u8 = 0x8a;
pub const EXTENDED_RESPONSE_VALUE: u8 = 0x8b;
pub const INTERMEDIATE_NAME: u8 = 0x80;
pub const INTERMEDIATE_VALUE: u8 = 0x81;

pub fn is_constructed(tag: u8) -> bool {
    tag & CONSTRUCTED != 0
}

/// Number of bytes the length field of a value of `len` bytes occupies.
pub fn length_len(len: usize) -> usize {
    if len < 0x80 {
        return 1;
    }
    let mut n = 0;
    let mut rest = len;
    while rest > 0 {
        n += 1;
        rest >>= 8;
    }
    1 + n
}

/// Total encoded size of a single-byte tag, its length and `len` content bytes.
pub fn tlv_len(len: usize) -> usize {
    1 + length_len(len) + len
}

pub fn write_length<B: BufMut>(out: &mut B, len: usize) {
    if len < 0x80 {
        out.put_u8(len as u8);
        return;
    }
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, len as u64);
    let skip = buf.iter().take_while(|b| **b == 0).count();
    out.put_u8(0x80 | (buf.len() - skip) as u8);
    out.put_slice(&buf[skip..]);
}

/// Shortest two's complement form of `val`, returned as a buffer and the
/// offset where the significant bytes start.
pub fn integer_bytes(val: i64) -> ([u8; 8], usize) {
    let mut buf = [0u8; 8];
    BigEndian::write_i64(&mut buf, val);
    let mut start = 0;
    while start < 7 {
        let redundant = (buf[start] == 0x00 && buf[start + 1] & 0x80 == 0)
            || (buf[start] == 0xff && buf[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    (buf, start)
}

pub fn integer_len(val: i64) -> usize {
    let (_, start) = integer_bytes(val);
    8 - start
}

/// Decodes a two's complement INTEGER or ENUMERATED value and checks it
/// against the inclusive range `min..=max`.
pub fn parse_integer(value: &[u8], field: &'static str, min: i64, max: i64) -> Result<i64, DecodeError> {
    if value.is_empty() {
        return Err(DecodeError::EmptyRequiredField(field));
    }
    if value.len() > 8 {
        return Err(DecodeError::invalid(field, format!("{} bytes integer", value.len())));
    }
    let val = BigEndian::read_int(value, value.len());
    if val < min || val > max {
        return Err(DecodeError::invalid(field, format!("{} is outside {}..={}", val, min, max)));
    }
    Ok(val)
}

/// Decodes a BOOLEAN. Any non-zero byte reads as true.
pub fn parse_boolean(value: &[u8], field: &'static str) -> Result<bool, DecodeError> {
    match value {
        [] => Err(DecodeError::EmptyRequiredField(field)),
        [0x00] => Ok(false),
        [0xff] => Ok(true),
        [b] => {
            warn!("non canonical boolean 0x{:02x} for {}, reading it as true", b, field);
            Ok(true)
        }
        _ => Err(DecodeError::invalid(field, format!("{} bytes boolean", value.len()))),
    }
}

pub fn parse_string(value: &[u8], field: &'static str) -> Result<String, DecodeError> {
    std::str::from_utf8(value)
        .map(str::to_owned)
        .map_err(|e| DecodeError::invalid(field, e.to_string()))
}

/// Decodes an LDAPOID: the dotted decimal text form, not the BER OBJECT IDENTIFIER.
pub fn parse_oid(value: &[u8], field: &'static str) -> Result<String, DecodeError> {
    if value.is_empty() {
        return Err(DecodeError::EmptyRequiredField(field));
    }
    let oid = parse_string(value, field)?;
    if !is_oid(&oid) {
        return Err(DecodeError::invalid(field, format!("'{}' is not a numeric oid", oid)));
    }
    Ok(oid)
}

pub fn is_oid(oid: &str) -> bool {
    let mut arcs = 0;
    for (i, arc) in oid.split('.').enumerate() {
        if arc.is_empty() || !arc.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if arc.len() > 1 && arc.starts_with('0') {
            return false;
        }
        if i == 0 && !matches!(arc, "0" | "1" | "2") {
            return false;
        }
        arcs += 1;
    }
    arcs >= 2
}


#[test]
fn a_test() {
    let mut buf = Vec::new();
    write_length(&mut buf, 10034);
    assert_eq!(buf, vec![0x82, 0x27, 0x32]);
    assert_eq!(length_len(10034), 3);

    let mut buf = Vec::new();
    write_length(&mut buf, 8);
    assert_eq!(buf, vec![0x08]);

    let mut buf = Vec::new();
    write_length(&mut buf, 128);
    assert_eq!(buf, vec![0x81, 0x80]);
    assert_eq!(tlv_len(128), 131);

    let (b, s) = integer_bytes(127);
    assert_eq!(&b[s..], &[0x7f]);
    let (b, s) = integer_bytes(128);
    assert_eq!(&b[s..], &[0x00, 0x80]);
    let (b, s) = integer_bytes(256);
    assert_eq!(&b[s..], &[0x01, 0x00]);
    let (b, s) = integer_bytes(0);
    assert_eq!(&b[s..], &[0x00]);
    let (b, s) = integer_bytes(-1);
    assert_eq!(&b[s..], &[0xff]);
    let (b, s) = integer_bytes(-129);
    assert_eq!(&b[s..], &[0xff, 0x7f]);
    assert_eq!(integer_len(i32::MAX as i64), 4);
}

#[test]
fn scalar_test() {
    assert_eq!(parse_integer(&[0x7f, 0xff, 0xff, 0xff], "id", 0, i32::MAX as i64).unwrap(), i32::MAX as i64);
    assert_eq!(parse_integer(&[0x00, 0x00, 0x05], "id", 0, 10).unwrap(), 5);
    assert!(matches!(
        parse_integer(&[0xff], "id", 0, 10),
        Err(DecodeError::InvalidScalar { .. })
    ));
    assert!(matches!(
        parse_integer(&[0x00, 0x80, 0x00, 0x00, 0x00], "id", 0, i32::MAX as i64),
        Err(DecodeError::InvalidScalar { .. })
    ));
    assert!(matches!(parse_integer(&[], "id", 0, 10), Err(DecodeError::EmptyRequiredField("id"))));

    assert!(!parse_boolean(&[0x00], "b").unwrap());
    assert!(parse_boolean(&[0xff], "b").unwrap());
    assert!(parse_boolean(&[0x01], "b").unwrap());
    assert!(parse_boolean(&[0x01, 0x00], "b").is_err());

    assert!(is_oid("1.2.840.113556.1.4.319"));
    assert!(is_oid("2.5"));
    assert!(!is_oid("1"));
    assert!(!is_oid("1..2"));
    assert!(!is_oid("3.1"));
    assert!(!is_oid("1.02"));
    assert!(!is_oid("cn"));
    assert!(matches!(parse_oid(b"", "oid"), Err(DecodeError::EmptyRequiredField("oid"))));
}
