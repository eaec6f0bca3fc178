//! Snowflake ID - opaque 64-bit identifier issued by the backend
//!
//! The feed core never decodes the bits; it only compares, hashes and
//! displays identifiers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque 64-bit identifier for moments, reactions and users
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Snowflake(i64);

impl Snowflake {
    /// Create a Snowflake from a raw i64 value
    #[inline]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    #[inline]
    pub const fn into_inner(self) -> i64 {
        self.0
    }

    /// Parse the decimal wire form, tolerating surrounding whitespace
    pub fn parse(s: &str) -> Result<Self, SnowflakeParseError> {
        let trimmed = s.trim();
        trimmed
            .parse()
            .map(Self)
            .map_err(|_| SnowflakeParseError::InvalidFormat(trimmed.to_string()))
    }
}

/// Error when parsing a Snowflake from string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnowflakeParseError {
    #[error("invalid identifier {0:?}")]
    InvalidFormat(String),
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for Snowflake {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for Snowflake {
    type Err = SnowflakeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Snowflake::parse(s)
    }
}

// Backend rows carry ids as strings so JavaScript clients keep full precision
impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Wire forms accepted for an id
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId<'a> {
    Number(i64),
    Text(&'a str),
    Owned(String),
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match RawId::deserialize(deserializer)? {
            RawId::Number(id) => return Ok(Self(id)),
            RawId::Text(text) => Self::parse(text),
            RawId::Owned(text) => Self::parse(&text),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}
