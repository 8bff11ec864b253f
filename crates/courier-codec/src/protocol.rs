use bytes::{BufMut, Bytes, BytesMut};

use courier_types::{Message, Timestamp, UserId};

use crate::error::CodecError;

/// Header size in bytes.
pub const HEADER_LEN: usize = 23;

/// Dash separated fields in the header.
pub const HEADER_FIELDS: usize = 8;

const HEADER_SEPARATOR: char = '-';

/// Width of the zero padded message count in a history response.
pub const COUNT_DIGITS: usize = 5;

/// Largest count the response format can carry.
pub const MAX_COUNT: usize = 99_999;

/// Written after every message body in a history response. Bodies are not
/// escaped, so a body containing this byte is ambiguous to a reader that
/// stops at the first terminator.
pub const MESSAGE_TERMINATOR: u8 = 0x00;

const BODY_SEPARATOR: u8 = b'-';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    GetHistory,
    SendMessage,
}

pub fn decode_request_kind(byte: u8) -> Result<RequestKind, CodecError> {
    match byte {
        0 => Ok(RequestKind::GetHistory),
        1 => Ok(RequestKind::SendMessage),
        other => Err(CodecError::UnknownKind(other)),
    }
}

/// Parsed request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub sender: UserId,
    pub receiver: UserId,
    pub timestamp: Timestamp,
}

/// Parse the fixed 23 byte header `S-R-YYYY-MM-DD-HH-MM-SS`.
///
/// Framing is strict: the slice must be exactly [`HEADER_LEN`] bytes, split
/// into exactly [`HEADER_FIELDS`] tokens, every token plain ASCII digits.
/// User ids are checked against `max_users`.
pub fn decode_header(raw: &[u8], max_users: u8) -> Result<Header, CodecError> {
    if raw.len() != HEADER_LEN {
        return Err(CodecError::HeaderLength(raw.len()));
    }

    // Non-ASCII bytes can never form a digit token, so report them per field.
    let text = String::from_utf8_lossy(raw);
    let tokens: Vec<&str> = text.split(HEADER_SEPARATOR).collect();
    if tokens.len() != HEADER_FIELDS {
        return Err(CodecError::FieldCount(tokens.len()));
    }

    let mut fields = [0u32; HEADER_FIELDS];
    for (index, token) in tokens.iter().enumerate() {
        fields[index] = parse_field(index, token)?;
    }

    Ok(Header {
        sender: UserId::new(i64::from(fields[0]), max_users)?,
        receiver: UserId::new(i64::from(fields[1]), max_users)?,
        timestamp: Timestamp {
            year: fields[2],
            month: fields[3],
            day: fields[4],
            hour: fields[5],
            minute: fields[6],
            second: fields[7],
        },
    })
}

fn parse_field(index: usize, token: &str) -> Result<u32, CodecError> {
    let invalid = || CodecError::InvalidField {
        index,
        value: token.to_string(),
    };
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    token.parse().map_err(|_| invalid())
}

/// Serialize a history response: the reverse direction (receiver -> sender)
/// first, then the forward direction (sender -> receiver), each in send order.
///
/// Counts above [`MAX_COUNT`] are rejected rather than truncated.
pub fn encode_history_response(
    reverse: &[Message],
    forward: &[Message],
) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(
        2 * COUNT_DIGITS + encoded_len(reverse) + encoded_len(forward),
    );
    encode_section(&mut buf, reverse)?;
    encode_section(&mut buf, forward)?;
    Ok(buf.freeze())
}

fn encode_section(buf: &mut BytesMut, messages: &[Message]) -> Result<(), CodecError> {
    if messages.len() > MAX_COUNT {
        return Err(CodecError::CountOverflow(messages.len()));
    }
    buf.put_slice(format!("{:0width$}", messages.len(), width = COUNT_DIGITS).as_bytes());
    for message in messages {
        buf.put_slice(message.timestamp.to_string().as_bytes());
        buf.put_u8(BODY_SEPARATOR);
        buf.put_slice(&message.body);
        buf.put_u8(MESSAGE_TERMINATOR);
    }
    Ok(())
}

/// Bytes needed for a section's messages, assuming 4 digit years.
fn encoded_len(messages: &[Message]) -> usize {
    // "YYYY_MM_DD_HH_MM_SS" + '-' + body + terminator
    messages.iter().map(|m| 19 + 1 + m.body.len() + 1).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> UserId {
        UserId::new(id, 4).unwrap()
    }

    fn message(body: &str) -> Message {
        Message {
            sender: user(0),
            receiver: user(1),
            timestamp: Timestamp {
                year: 2024,
                month: 3,
                day: 7,
                hour: 9,
                minute: 30,
                second: 5,
            },
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    #[test]
    fn request_kinds() {
        assert_eq!(decode_request_kind(0).unwrap(), RequestKind::GetHistory);
        assert_eq!(decode_request_kind(1).unwrap(), RequestKind::SendMessage);
        assert!(matches!(
            decode_request_kind(2),
            Err(CodecError::UnknownKind(2))
        ));
        assert!(matches!(
            decode_request_kind(b'0'),
            Err(CodecError::UnknownKind(b'0'))
        ));
    }

    #[test]
    fn parse_valid_header() {
        let header = decode_header(b"2-3-2024-12-31-23-59-58", 4).unwrap();
        assert_eq!(header.sender, user(2));
        assert_eq!(header.receiver, user(3));
        assert_eq!(
            header.timestamp,
            Timestamp {
                year: 2024,
                month: 12,
                day: 31,
                hour: 23,
                minute: 59,
                second: 58,
            }
        );
    }

    #[test]
    fn reject_wrong_length() {
        assert!(matches!(
            decode_header(b"2-3-2024-12-31-23-59-5", 4),
            Err(CodecError::HeaderLength(22))
        ));
        assert!(matches!(
            decode_header(b"2-3-2024-12-31-23-59-588", 4),
            Err(CodecError::HeaderLength(24))
        ));
    }

    #[test]
    fn reject_seven_fields() {
        assert!(matches!(
            decode_header(b"2-3-2024-12-31-2359-588", 4),
            Err(CodecError::FieldCount(7))
        ));
    }

    #[test]
    fn reject_non_numeric_field() {
        assert!(matches!(
            decode_header(b"2-3-2024-1x-31-23-59-58", 4),
            Err(CodecError::InvalidField { index: 3, .. })
        ));
        // leading sign is not a digit
        assert!(matches!(
            decode_header(b"2-3-+024-12-31-23-59-58", 4),
            Err(CodecError::InvalidField { index: 2, .. })
        ));
        // empty token from doubled separator
        assert!(matches!(
            decode_header(b"2--3024-12-31-23-59-58-", 4),
            Err(CodecError::FieldCount(_)) | Err(CodecError::InvalidField { .. })
        ));
    }

    #[test]
    fn reject_unknown_user() {
        assert!(matches!(
            decode_header(b"7-3-2024-12-31-23-59-58", 4),
            Err(CodecError::User(_))
        ));
        assert!(decode_header(b"7-3-2024-12-31-23-59-58", 8).is_ok());
    }

    #[test]
    fn count_padding() {
        let empty = encode_history_response(&[], &[]).unwrap();
        assert_eq!(&empty[..], b"0000000000");

        let seven = vec![message(""); 7];
        let encoded = encode_history_response(&seven, &[]).unwrap();
        assert_eq!(&encoded[..5], b"00007");

        let many = vec![message(""); 12345];
        let encoded = encode_history_response(&[], &many).unwrap();
        assert_eq!(&encoded[..10], b"0000012345");
    }

    #[test]
    fn body_with_terminator_is_written_verbatim() {
        let encoded = encode_history_response(&[], &[message("ab\0cd")]).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(b"0000000001");
        expected.extend_from_slice(b"2024_03_07_09_30_05-ab\0cd\0");
        assert_eq!(&encoded[..], &expected[..]);
    }

    #[test]
    fn count_overflow_rejected() {
        let too_many = vec![message(""); MAX_COUNT + 1];
        assert!(matches!(
            encode_history_response(&too_many, &[]),
            Err(CodecError::CountOverflow(100_000))
        ));
    }

    #[test]
    fn sections_in_order() {
        let reverse = [message("hi")];
        let forward = [message("a"), message("b-c")];
        let encoded = encode_history_response(&reverse, &forward).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"00001");
        expected.extend_from_slice(b"2024_03_07_09_30_05-hi\0");
        expected.extend_from_slice(b"00002");
        expected.extend_from_slice(b"2024_03_07_09_30_05-a\0");
        expected.extend_from_slice(b"2024_03_07_09_30_05-b-c\0");
        assert_eq!(&encoded[..], &expected[..]);
    }
}
