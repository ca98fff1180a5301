//! Conduit message types.
//!
//! A [`Message`] is a set of string-keyed scalar options plus an opaque
//! binary payload. Option values travel as UTF-8 text; [`OptionValue`]
//! models the scalar types a decoded value can take.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::codec;

// ============================================================================
// Types
// ============================================================================

/// Message options keyed by name.
///
/// Kept sorted so that the wire layout is deterministic.
pub type Options = BTreeMap<String, OptionValue>;

// ============================================================================
// OptionValue
// ============================================================================

/// A scalar option value.
///
/// On the wire every value is text; decoding coerces `null`, `true`,
/// `false` and unsigned decimal numbers back into typed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// The literal `null`.
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// A number.
    Number(f64),
    /// Any other text.
    String(String),
}

impl OptionValue {
    /// Returns the text written on the wire for this value.
    #[must_use]
    pub fn to_wire(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed("null"),
            Self::Bool(true) => Cow::Borrowed("true"),
            Self::Bool(false) => Cow::Borrowed("false"),
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::String(s) => Cow::Borrowed(s),
        }
    }

    /// Returns `true` for [`OptionValue::Null`].
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean, if this is one.
    #[inline]
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    #[inline]
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl<T: Into<OptionValue>> From<Option<T>> for OptionValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ============================================================================
// Message
// ============================================================================

/// One unit exchanged over the conduit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// Named options.
    pub options: Options,
    /// Binary payload, at most 65535 bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Creates an empty message.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message from options and payload.
    #[inline]
    #[must_use]
    pub fn from_parts(options: Options, payload: Vec<u8>) -> Self {
        Self { options, payload }
    }

    /// Adds an option, replacing any previous value for the key.
    #[inline]
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Sets the payload.
    #[inline]
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Returns the value for `key`.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.options.get(key)
    }

    /// Returns `true` if `key` is present.
    #[inline]
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// Removes and returns the value for `key`.
    #[inline]
    pub fn pluck(&mut self, key: &str) -> Option<OptionValue> {
        self.options.remove(key)
    }

    /// Returns `true` if there are no options and no payload.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.payload.is_empty()
    }

    /// Removes all options and the payload.
    #[inline]
    pub fn clear(&mut self) {
        self.options.clear();
        self.payload.clear();
    }

    /// Encodes this message into a single frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`](crate::Error::Encode) if a size limit is exceeded.
    #[inline]
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode_message(&self.options, &self.payload)
    }

    /// Decodes a frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`](crate::Error::Decode) if the frame is malformed.
    #[inline]
    pub fn decode(data: &[u8]) -> Result<Self> {
        codec::decode_message(data)
    }
}

// ============================================================================
// Tests
// ============================================================================
