/// Courier wire codec.
///
/// Request (client -> server):
/// - 1 byte request kind: `0` GetHistory, `1` SendMessage
/// - 23 byte ASCII header `S-R-YYYY-MM-DD-HH-MM-SS`
/// - SendMessage only: body bytes until the client half-closes
///
/// Response (server -> client, GetHistory only):
/// - 5 digit count, then `YYYY_MM_DD_HH_MM_SS-<body>\0` per message, for
///   receiver -> sender
/// - the same block again for sender -> receiver

pub mod decoder;
pub mod error;
pub mod protocol;

pub use decoder::{Request, RequestDecoder};
pub use error::CodecError;
pub use protocol::{
    decode_header, decode_request_kind, encode_history_response, Header, RequestKind,
    COUNT_DIGITS, HEADER_FIELDS, HEADER_LEN, MAX_COUNT, MESSAGE_TERMINATOR,
};
