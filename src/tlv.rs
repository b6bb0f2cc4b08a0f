//! Incremental tag/length/value tokenizer.
//!
//! The reader keeps its position inside a partially received TLV between
//! calls, so input may be split at any byte. Constructed TLVs are reported
//! without a value: their content is tokenized as the following TLVs.

use bytes::{Buf, Bytes, BytesMut};

use crate::asn1;
use crate::error::DecodeError;

/// Longest length-of-length accepted, in bytes.
const MAX_LENGTH_BYTES: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub tag: u8,
    /// Declared content length.
    pub length: usize,
    /// Bytes taken by the tag and the length field.
    pub header_len: usize,
}

impl Header {
    pub fn is_constructed(&self) -> bool {
        asn1::is_constructed(self.tag)
    }

    pub fn total_len(&self) -> Option<usize> {
        self.header_len.checked_add(self.length)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub header: Header,
    /// Content of a primitive TLV, empty for constructed ones.
    pub value: Bytes,
}

impl Token {
    pub fn tag(&self) -> u8 {
        self.header.tag
    }

    pub fn length(&self) -> usize {
        self.header.length
    }

    pub fn is_constructed(&self) -> bool {
        self.header.is_constructed()
    }
}

#[derive(Debug)]
pub enum TlvEvent {
    /// Tag and length are known, the value has not been read yet.
    Header(Header),
    Token(Token),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Tag,
    LengthStart,
    LengthBytes(u8),
    HeaderReady,
    Value,
}

#[derive(Debug)]
pub struct TlvReader {
    state: ReadState,
    tag: u8,
    length: usize,
    header_len: usize,
    value: BytesMut,
}

impl Default for TlvReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TlvReader {
    pub fn new() -> Self {
        Self {
            state: ReadState::Tag,
            tag: 0,
            length: 0,
            header_len: 0,
            value: BytesMut::new(),
        }
    }

    /// True when no part of a TLV has been read.
    pub fn is_idle(&self) -> bool {
        self.state == ReadState::Tag
    }

    pub fn reset(&mut self) {
        self.state = ReadState::Tag;
        self.tag = 0;
        self.length = 0;
        self.header_len = 0;
        self.value.clear();
    }

    fn header(&self) -> Header {
        Header {
            tag: self.tag,
            length: self.length,
            header_len: self.header_len,
        }
    }

    /// Advances through `input`. Every TLV yields a `Header` event followed by
    /// a `Token` event; `None` means `input` ran out first.
    pub fn poll<B: Buf>(&mut self, input: &mut B) -> Result<Option<TlvEvent>, DecodeError> {
        loop {
            match self.state {
                ReadState::Tag => {
                    if !input.has_remaining() {
                        return Ok(None);
                    }
                    let tag = input.get_u8();
                    if tag & 0x1f == 0x1f {
                        return Err(DecodeError::malformed(format!(
                            "multi byte tag starting with 0x{:02x}",
                            tag
                        )));
                    }
                    self.tag = tag;
                    self.length = 0;
                    self.header_len = 1;
                    self.state = ReadState::LengthStart;
                }
                ReadState::LengthStart => {
                    if !input.has_remaining() {
                        return Ok(None);
                    }
                    let b = input.get_u8();
                    self.header_len += 1;
                    if b & 0x80 == 0 {
                        self.length = b as usize;
                        self.state = ReadState::HeaderReady;
                    } else {
                        let n = b & 0x7f;
                        if n == 0 {
                            return Err(DecodeError::malformed("indefinite length"));
                        }
                        if n > MAX_LENGTH_BYTES {
                            return Err(DecodeError::malformed(format!("{} bytes length field", n)));
                        }
                        self.state = ReadState::LengthBytes(n);
                    }
                }
                ReadState::LengthBytes(remaining) => {
                    if !input.has_remaining() {
                        return Ok(None);
                    }
                    self.length = (self.length << 8) | input.get_u8() as usize;
                    self.header_len += 1;
                    self.state = if remaining == 1 {
                        ReadState::HeaderReady
                    } else {
                        ReadState::LengthBytes(remaining - 1)
                    };
                }
                ReadState::HeaderReady => {
                    self.state = ReadState::Value;
                    self.value.clear();
                    return Ok(Some(TlvEvent::Header(self.header())));
                }
                ReadState::Value => {
                    let wanted = if asn1::is_constructed(self.tag) {
                        0
                    } else {
                        self.length - self.value.len()
                    };
                    if wanted == 0 {
                        let token = Token {
                            header: self.header(),
                            value: self.value.split().freeze(),
                        };
                        self.state = ReadState::Tag;
                        return Ok(Some(TlvEvent::Token(token)));
                    }
                    if !input.has_remaining() {
                        return Ok(None);
                    }
                    if self.value.is_empty() && input.remaining() >= wanted {
                        let token = Token {
                            header: self.header(),
                            value: input.copy_to_bytes(wanted),
                        };
                        self.state = ReadState::Tag;
                        return Ok(Some(TlvEvent::Token(token)));
                    }
                    let mut n = wanted.min(input.remaining());
                    self.value.reserve(n);
                    while n > 0 {
                        let chunk = input.chunk();
                        let k = chunk.len().min(n);
                        self.value.extend_from_slice(&chunk[..k]);
                        input.advance(k);
                        n -= k;
                    }
                }
            }
        }
    }
}

/// Tokenizes a complete buffer, such as the value of a control, into its
/// TLVs in document order.
pub fn read_tokens(data: &[u8]) -> Result<Vec<Token>, DecodeError> {
    let mut input = data;
    let mut reader = TlvReader::new();
    let mut tokens = Vec::new();
    loop {
        match reader.poll(&mut input)? {
            Some(TlvEvent::Header(_)) => {}
            Some(TlvEvent::Token(t)) => tokens.push(t),
            None if reader.is_idle() => return Ok(tokens),
            None => return Err(DecodeError::malformed("truncated tlv")),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn drain(reader: &mut TlvReader, mut input: &[u8]) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(ev) = reader.poll(&mut input).unwrap() {
            if let TlvEvent::Token(t) = ev {
                tokens.push(t);
            }
        }
        tokens
    }

    #[test]
    fn short_and_long_lengths() {
        let tokens = read_tokens(&[0x30, 0x03, 0x02, 0x01, 0x05]).unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].is_constructed());
        assert_eq!(tokens[0].length(), 3);
        assert_eq!(tokens[0].header.header_len, 2);
        assert_eq!(tokens[1].tag(), 0x02);
        assert_eq!(&tokens[1].value[..], &[0x05]);

        let mut data = vec![0x04, 0x81, 0x80];
        data.extend(std::iter::repeat(b'x').take(128));
        let tokens = read_tokens(&data).unwrap();
        assert_eq!(tokens[0].length(), 128);
        assert_eq!(tokens[0].header.header_len, 3);
        assert_eq!(tokens[0].value.len(), 128);
    }

    #[test]
    fn split_anywhere() {
        let data = [0x04, 0x82, 0x00, 0x03, b'a', b'b', b'c', 0x01, 0x01, 0xff];
        for split in 0..data.len() {
            let mut reader = TlvReader::new();
            let mut tokens = drain(&mut reader, &data[..split]);
            tokens.extend(drain(&mut reader, &data[split..]));
            assert_eq!(tokens.len(), 2, "split at {}", split);
            assert_eq!(&tokens[0].value[..], b"abc");
            assert_eq!(tokens[0].header.header_len, 4);
            assert_eq!(&tokens[1].value[..], &[0xff]);
            assert!(reader.is_idle());
        }
    }

    #[test]
    fn header_precedes_value() {
        let mut reader = TlvReader::new();
        let mut input: &[u8] = &[0x04, 0x05, b'a'];
        match reader.poll(&mut input).unwrap() {
            Some(TlvEvent::Header(h)) => assert_eq!(h.length, 5),
            e => panic!("unexpected {:?}", e),
        }
        assert!(reader.poll(&mut input).unwrap().is_none());
        assert!(!reader.is_idle());
    }

    #[test]
    fn rejected_forms() {
        assert!(matches!(read_tokens(&[0x30, 0x80]), Err(DecodeError::MalformedLength(_))));
        assert!(matches!(
            read_tokens(&[0x04, 0x85, 0, 0, 0, 0, 1, 0]),
            Err(DecodeError::MalformedLength(_))
        ));
        assert!(matches!(read_tokens(&[0x1f, 0x01]), Err(DecodeError::MalformedLength(_))));
        assert!(matches!(read_tokens(&[0x04, 0x02, 0x01]), Err(DecodeError::MalformedLength(_))));
    }
}
