use bytes::BytesMut;
use futures::Stream;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec;
use crate::config::DecoderConfig;
use crate::container::DecodeContainer;
use crate::error::ReadError;
use crate::ldap::LdapMessage;

const READ_CHUNK: usize = 4096;

pub struct DecodeContext {
    buffer: BytesMut,
    container: DecodeContainer,
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeContext {
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            buffer: BytesMut::with_capacity(READ_CHUNK),
            container: DecodeContainer::new(config),
        }
    }

    /// Reads the next message from `s`. Returns `None` when the peer closed
    /// the connection between two messages.
    pub async fn get_message<R: AsyncRead + Unpin>(&mut self, s: &mut R) -> Result<Option<LdapMessage>, ReadError> {
        loop {
            if !self.buffer.is_empty() {
                if let Some(msg) = codec::decode(&mut self.container, &mut self.buffer)? {
                    return Ok(Some(msg));
                }
            }
            self.buffer.reserve(READ_CHUNK);
            let n = s.read_buf(&mut self.buffer).await?;
            if n == 0 {
                if self.container.is_idle() && self.buffer.is_empty() {
                    return Ok(None);
                }
                debug!("eof in state {:?}", self.container.state());
                self.container.clean();
                return Err(ReadError::UnexpectedEof);
            }
        }
    }
}

/// The messages of `reader` as a stream that ends when the peer closes the
/// connection or after the first error.
pub fn messages<R: AsyncRead + Unpin>(
    reader: R,
    ctx: DecodeContext,
) -> impl Stream<Item = Result<LdapMessage, ReadError>> {
    futures::stream::unfold(Some((reader, ctx)), |state| async move {
        let (mut reader, mut ctx) = state?;
        match ctx.get_message(&mut reader).await {
            Ok(Some(msg)) => Some((Ok(msg), Some((reader, ctx)))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
}


#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::error::DecodeError;
    use crate::ldap::{MessageParams, MsgUnbind};

    #[tokio::test]
    async fn split_read() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&[0x30, 0x05])
            .read(&[0x02, 0x01, 0x03, 0x42, 0x00])
            .build();
        let mut ctx = DecodeContext::new();
        let msg = ctx.get_message(&mut stream).await.unwrap().unwrap();
        assert_eq!(msg, LdapMessage::new(3, MessageParams::Unbind(MsgUnbind {})));
        assert!(ctx.get_message(&mut stream).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn two_messages_in_one_read() {
        let data = hex::decode("30050201014200300c0201054a0764633d74657374").unwrap();
        let mut stream = tokio_test::io::Builder::new().read(&data).build();
        let mut ctx = DecodeContext::new();
        assert_eq!(ctx.get_message(&mut stream).await.unwrap().unwrap().id, 1);
        let del = ctx.get_message(&mut stream).await.unwrap().unwrap();
        assert_eq!(del.id, 5);
        assert_eq!(del.params.name(), "DelRequest");
        assert!(ctx.get_message(&mut stream).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_inside_pdu() {
        let mut stream = tokio_test::io::Builder::new().read(&[0x30, 0x05, 0x02, 0x01]).build();
        let mut ctx = DecodeContext::new();
        assert!(matches!(
            ctx.get_message(&mut stream).await,
            Err(ReadError::UnexpectedEof)
        ));
    }

    #[tokio::test]
    async fn decode_error() {
        let mut stream = tokio_test::io::Builder::new().read(&[0x30, 0x05, 0x02, 0x01, 0x01, 0x04, 0x00]).build();
        let mut ctx = DecodeContext::new();
        assert!(matches!(
            ctx.get_message(&mut stream).await,
            Err(ReadError::Decode(DecodeError::UnexpectedTag { tag: 0x04, .. }))
        ));
    }

    #[tokio::test]
    async fn message_stream() {
        let stream = tokio_test::io::Builder::new()
            .read(&[0x30, 0x05, 0x02, 0x01, 0x01, 0x42])
            .read(&[0x00, 0x30, 0x05, 0x02, 0x01, 0x02, 0x42, 0x00])
            .build();
        let ids: Vec<u32> = messages(stream, DecodeContext::new())
            .map(|m| m.unwrap().id)
            .collect()
            .await;
        assert_eq!(ids, vec![1, 2]);
    }
}
