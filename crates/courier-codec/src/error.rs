use std::io;

use thiserror::Error;

use courier_types::UserIdError;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown request kind {0:#04x}")]
    UnknownKind(u8),
    #[error("header is {0} bytes, expected 23")]
    HeaderLength(usize),
    #[error("header has {0} fields, expected 8")]
    FieldCount(usize),
    #[error("header field {index} is not a decimal integer: {value:?}")]
    InvalidField { index: usize, value: String },
    #[error("invalid user: {0}")]
    User(#[from] UserIdError),
    #[error("connection closed while reading {0}")]
    Truncated(&'static str),
    #[error("message body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("{0} messages do not fit the 5 digit count field")]
    CountOverflow(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}
