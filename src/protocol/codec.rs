//! Binary frame codec.
//!
//! Pure functions, no I/O. All integers are big-endian, no padding:
//!
//! ```text
//! [u8]   option count N
//! N x {
//!   [u8]   key length K
//!   [K]    key (UTF-8)
//!   [u16]  value length V
//!   [V]    value (UTF-8)
//! }
//! [u16]  payload length P
//! [P]    payload
//! ```
//!
//! Values are text on the wire. Decoding coerces `null`, `true`, `false`
//! and unsigned decimal numbers into typed [`OptionValue`]s, so a string
//! option holding one of those literals does not survive a round trip as
//! a string.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

use super::message::{Message, OptionValue, Options};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of options per message.
pub const MAX_OPTIONS: usize = u8::MAX as usize;

/// Maximum option key length in bytes.
pub const MAX_KEY_LEN: usize = u8::MAX as usize;

/// Maximum option value length in bytes.
pub const MAX_VALUE_LEN: usize = u16::MAX as usize;

/// Maximum payload length in bytes. Larger payloads must be chunked.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Values matching this are decoded as numbers.
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(([0-9]+)(\.[0-9]+)?|([0-9])+(\.[0-9]+))$").expect("numeric pattern is valid")
});

// ============================================================================
// Encoding
// ============================================================================

/// Encodes options and payload into one frame.
///
/// # Errors
///
/// Returns [`Error::Encode`] if there are more than [`MAX_OPTIONS`]
/// options, a key is longer than [`MAX_KEY_LEN`] bytes, or a value or the
/// payload is longer than 65535 bytes.
pub fn encode_message(options: &Options, payload: &[u8]) -> Result<Vec<u8>> {
    let count = u8::try_from(options.len()).map_err(|_| {
        Error::encode(format!(
            "{} options exceeds limit of {MAX_OPTIONS}",
            options.len()
        ))
    })?;

    let payload_len = u16::try_from(payload.len()).map_err(|_| {
        Error::encode(format!(
            "payload of {} bytes exceeds limit of {MAX_PAYLOAD_LEN}",
            payload.len()
        ))
    })?;

    let mut encoded = Vec::with_capacity(3 + payload.len() + options.len() * 16);
    encoded.push(count);

    for (key, value) in options {
        let key_len = u8::try_from(key.len()).map_err(|_| {
            Error::encode(format!(
                "option key of {} bytes exceeds limit of {MAX_KEY_LEN}",
                key.len()
            ))
        })?;

        let value = value.to_wire();
        let value_len = u16::try_from(value.len()).map_err(|_| {
            Error::encode(format!(
                "option {key:?} value of {} bytes exceeds limit of {MAX_VALUE_LEN}",
                value.len()
            ))
        })?;

        encoded.push(key_len);
        encoded.extend_from_slice(key.as_bytes());
        encoded.extend_from_slice(&value_len.to_be_bytes());
        encoded.extend_from_slice(value.as_bytes());
    }

    encoded.extend_from_slice(&payload_len.to_be_bytes());
    encoded.extend_from_slice(payload);

    Ok(encoded)
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes one frame into a [`Message`].
///
/// Bytes after the payload are ignored. Keys and values that are not valid
/// UTF-8 are decoded lossily.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the buffer ends before a length field or
/// the data it announces.
pub fn decode_message(data: &[u8]) -> Result<Message> {
    let mut reader = FrameReader::new(data);
    let count = reader.read_u8("option count")?;

    let mut options = Options::new();
    for _ in 0..count {
        let key_len = usize::from(reader.read_u8("key length")?);
        let key = String::from_utf8_lossy(reader.read_bytes(key_len, "key")?).into_owned();

        let value_len = usize::from(reader.read_u16("value length")?);
        let value = String::from_utf8_lossy(reader.read_bytes(value_len, "value")?).into_owned();

        options.insert(key, coerce_value(value));
    }

    let payload_len = usize::from(reader.read_u16("payload length")?);
    let payload = reader.read_bytes(payload_len, "payload")?.to_vec();

    Ok(Message { options, payload })
}

/// Applies the decode-side typing rules to a raw option value.
#[must_use]
pub fn coerce_value(raw: String) -> OptionValue {
    match raw.as_str() {
        "null" => return OptionValue::Null,
        "true" => return OptionValue::Bool(true),
        "false" => return OptionValue::Bool(false),
        _ => {}
    }

    if NUMERIC.is_match(&raw)
        && let Ok(number) = raw.parse::<f64>()
    {
        return OptionValue::Number(number);
    }

    OptionValue::String(raw)
}

// ============================================================================
// FrameReader
// ============================================================================

/// Bounds-checked cursor over a frame.
struct FrameReader<'a> {
    /// Whole frame.
    data: &'a [u8],
    /// Current read position.
    offset: usize,
}

impl<'a> FrameReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn read_bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                Error::decode(
                    self.offset,
                    format!(
                        "{what} needs {len} bytes, {} remain",
                        self.data.len() - self.offset
                    ),
                )
            })?;

        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn read_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.read_bytes(1, what)?[0])
    }

    fn read_u16(&mut self, what: &str) -> Result<u16> {
        let bytes = self.read_bytes(2, what)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }
}

// ============================================================================
// Tests
// ============================================================================
