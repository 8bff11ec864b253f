//! One request per connection.
//!
//! The read side is fed into [`RequestDecoder`] as bytes arrive; the task
//! yields to the runtime between reads, so a slow or stalled peer only holds
//! its own task. Nothing is written back unless a complete history request
//! was decoded.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::codec::Decoder;
use tracing::debug;

use courier_codec::{encode_history_response, CodecError, Request, RequestDecoder};
use courier_store::ConversationStore;
use courier_types::{ConversationKey, Message};

use crate::settings::RelaySettings;

/// Initial read buffer; grows for long bodies.
const READ_BUF_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("bad request: {0}")]
    Codec(#[from] CodecError),
    #[error("no data from peer for {0:?}")]
    IdleTimeout(Duration),
    #[error("peer closed before sending a request")]
    NoRequest,
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// What a successfully handled connection did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stored { key: ConversationKey, body_len: usize },
    HistorySent { key: ConversationKey, messages: usize, bytes: usize },
}

/// Service one connection to completion and close it.
pub async fn handle_connection<S>(
    stream: S,
    store: &ConversationStore,
    settings: &RelaySettings,
) -> Result<Outcome, HandlerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut decoder = RequestDecoder::new(settings.max_users, settings.max_body_len);

    let request = read_request(&mut reader, &mut decoder, settings.idle_timeout).await?;

    let outcome = match request {
        Request::SendMessage { header, body } => {
            let message = Message {
                sender: header.sender,
                receiver: header.receiver,
                timestamp: header.timestamp,
                body,
            };
            let key = message.key();
            let body_len = message.body.len();
            store.append(key, message).await;
            Outcome::Stored { key, body_len }
        }
        Request::GetHistory(header) => {
            // Date fields of a history header are parsed but not used.
            let history = store.history(header.sender, header.receiver).await;
            let response = encode_history_response(&history.reverse, &history.forward)?;
            debug!(
                reverse = history.reverse.len(),
                forward = history.forward.len(),
                "sending history"
            );
            timeout(settings.idle_timeout, writer.write_all(&response))
                .await
                .map_err(|_| HandlerError::IdleTimeout(settings.idle_timeout))??;
            Outcome::HistorySent {
                key: ConversationKey::new(header.sender, header.receiver),
                messages: history.reverse.len() + history.forward.len(),
                bytes: response.len(),
            }
        }
    };

    writer.shutdown().await?;
    Ok(outcome)
}

/// Read until the decoder yields a request. The idle timer restarts on
/// every read that returns data.
async fn read_request<R>(
    reader: &mut R,
    decoder: &mut RequestDecoder,
    idle: Duration,
) -> Result<Request, HandlerError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);
    loop {
        if let Some(request) = decoder.decode(&mut buf)? {
            return Ok(request);
        }

        buf.reserve(READ_BUF_SIZE);
        let n = match timeout(idle, reader.read_buf(&mut buf)).await {
            Ok(read) => read?,
            Err(_) => return Err(HandlerError::IdleTimeout(idle)),
        };

        if n == 0 {
            return decoder.decode_eof(&mut buf)?.ok_or(HandlerError::NoRequest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use courier_types::UserId;
    use tokio::io::{duplex, DuplexStream};

    const HEADER: &[u8] = b"0-1-2024-05-06-07-08-09";

    fn user(id: i64) -> UserId {
        UserId::new(id, 4).unwrap()
    }

    async fn run(request: &[u8], store: &ConversationStore) -> (Result<Outcome, HandlerError>, Vec<u8>) {
        let (mut client, server): (DuplexStream, DuplexStream) = duplex(64 * 1024);
        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();

        let result = handle_connection(server, store, &RelaySettings::default()).await;

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        (result, response)
    }

    fn request(kind: u8, header: &[u8], body: &[u8]) -> Vec<u8> {
        let mut out = vec![kind];
        out.extend_from_slice(header);
        out.extend_from_slice(body);
        out
    }

    #[tokio::test]
    async fn send_stores_without_response() {
        let store = ConversationStore::new();
        let (result, response) = run(&request(1, HEADER, b"hello"), &store).await;

        let key = ConversationKey::new(user(0), user(1));
        assert_eq!(result.unwrap(), Outcome::Stored { key, body_len: 5 });
        assert!(response.is_empty());

        let stored = store.get(key).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(&stored[0].body[..], b"hello");
        assert_eq!(stored[0].timestamp.to_string(), "2024_05_06_07_08_09");
    }

    #[tokio::test]
    async fn history_after_send() {
        let store = ConversationStore::new();
        run(&request(1, HEADER, b"ping"), &store).await.0.unwrap();
        run(&request(1, b"1-0-2024-05-06-07-08-10", b"pong"), &store).await.0.unwrap();

        let (result, response) = run(&request(0, HEADER, b""), &store).await;
        assert!(matches!(result.unwrap(), Outcome::HistorySent { messages: 2, .. }));
        assert_eq!(
            response,
            b"000012024_05_06_07_08_10-pong\x00000012024_05_06_07_08_09-ping\x00".to_vec()
        );
    }

    #[tokio::test]
    async fn empty_history() {
        let store = ConversationStore::new();
        let (result, response) = run(&request(0, b"2-3-2024-05-06-07-08-09", b""), &store).await;
        assert!(result.is_ok());
        assert_eq!(response, b"0000000000".to_vec());
    }

    #[tokio::test]
    async fn malformed_header_aborts() {
        let store = ConversationStore::new();
        let (result, response) = run(&request(1, b"0-1-2024-0506-07-08-099", b"x"), &store).await;
        assert!(matches!(
            result,
            Err(HandlerError::Codec(CodecError::FieldCount(7)))
        ));
        assert!(response.is_empty());
        assert_eq!(store.conversation_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_kind_aborts() {
        let store = ConversationStore::new();
        let (result, response) = run(&request(2, HEADER, b"x"), &store).await;
        assert!(matches!(
            result,
            Err(HandlerError::Codec(CodecError::UnknownKind(2)))
        ));
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn close_before_any_byte() {
        let store = ConversationStore::new();
        let (result, response) = run(b"", &store).await;
        assert!(matches!(result, Err(HandlerError::NoRequest)));
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn idle_peer_times_out() {
        let store = ConversationStore::new();
        let settings = RelaySettings {
            idle_timeout: Duration::from_millis(50),
            ..RelaySettings::default()
        };
        let (mut client, server) = duplex(1024);
        client.write_all(&[1]).await.unwrap();

        let result = handle_connection(server, &store, &settings).await;
        assert!(matches!(result, Err(HandlerError::IdleTimeout(_))));
    }
}
