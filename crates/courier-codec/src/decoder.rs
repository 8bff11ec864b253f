//! Incremental request decoder.
//!
//! Bytes arrive in whatever pieces the socket hands out. The decoder keeps
//! its stage between calls and consumes exactly what each stage needs, so a
//! connection that has only delivered part of a header simply waits for more.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::error::CodecError;
use crate::protocol::{decode_header, decode_request_kind, Header, RequestKind, HEADER_LEN};

/// A fully decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetHistory(Header),
    SendMessage { header: Header, body: Bytes },
}

#[derive(Debug)]
enum Stage {
    Kind,
    Header(RequestKind),
    /// Body bytes stay in the read buffer until the peer half-closes.
    Body(Header),
    Done,
}

#[derive(Debug)]
pub struct RequestDecoder {
    stage: Stage,
    max_users: u8,
    max_body_len: usize,
}

impl RequestDecoder {
    pub fn new(max_users: u8, max_body_len: usize) -> Self {
        Self {
            stage: Stage::Kind,
            max_users,
            max_body_len,
        }
    }

    fn check_body_len(&self, len: usize) -> Result<(), CodecError> {
        if len > self.max_body_len {
            return Err(CodecError::BodyTooLarge {
                limit: self.max_body_len,
            });
        }
        Ok(())
    }
}

impl Decoder for RequestDecoder {
    type Item = Request;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>, CodecError> {
        loop {
            match self.stage {
                Stage::Kind => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let kind = decode_request_kind(src.get_u8())?;
                    trace!(?kind, "request kind");
                    self.stage = Stage::Header(kind);
                }
                Stage::Header(kind) => {
                    if src.len() < HEADER_LEN {
                        src.reserve(HEADER_LEN - src.len());
                        return Ok(None);
                    }
                    let raw = src.split_to(HEADER_LEN);
                    let header = decode_header(&raw, self.max_users)?;
                    match kind {
                        RequestKind::GetHistory => {
                            self.stage = Stage::Done;
                            return Ok(Some(Request::GetHistory(header)));
                        }
                        RequestKind::SendMessage => self.stage = Stage::Body(header),
                    }
                }
                Stage::Body(_) => {
                    self.check_body_len(src.len())?;
                    return Ok(None);
                }
                Stage::Done => {
                    // Nothing after a complete request is meaningful.
                    src.clear();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Request>, CodecError> {
        if let Some(request) = self.decode(src)? {
            return Ok(Some(request));
        }
        match std::mem::replace(&mut self.stage, Stage::Done) {
            Stage::Body(header) => {
                let body = src.split().freeze();
                trace!(len = body.len(), "body complete");
                Ok(Some(Request::SendMessage { header, body }))
            }
            Stage::Done => Ok(None),
            // Connected and closed without sending anything.
            Stage::Kind => Ok(None),
            Stage::Header(_) => Err(CodecError::Truncated("header")),
        }
    }
}
