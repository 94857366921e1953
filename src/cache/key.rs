//! # Key Codec
//!
//! Deterministic construction and parsing of cache and rate-limit keys.
//!
//! A key is an ordered list of segments joined with `:`. Segments are
//! escaped so that no segment can contain a bare separator:
//!
//! | char | encoded |
//! |------|---------|
//! | `%`  | `%25`   |
//! | `:`  | `%3A`   |
//! | `=`  | `%3D`   |
//!
//! `=` is reserved for named fields (`name=value`), so a positional argument
//! can never be confused with a named one. Because every segment is escaped
//! and the separator count is preserved, two different segment lists always
//! produce two different keys, and [`parse_key`] recovers the segments.
//!
//! Typed arguments are rendered through their canonical text form, so
//! `KeyPart::from(42_i64)` and `KeyPart::from("42")` address the same entry.

use crate::constants::keys::{CACHE_NAMESPACE, FIELD_SEPARATOR, RATE_LIMIT_NAMESPACE, SEPARATOR};
use std::fmt;
use thiserror::Error;

/// A single typed argument of a key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Text(String),
    Int(i64),
    UInt(u64),
    Bool(bool),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Text(s) => f.write_str(s),
            KeyPart::Int(i) => write!(f, "{i}"),
            KeyPart::UInt(u) => write!(f, "{u}"),
            KeyPart::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Text(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Text(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::Text(value.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        KeyPart::Int(i64::from(value))
    }
}

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        KeyPart::UInt(value)
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::UInt(u64::from(value))
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl From<uuid::Uuid> for KeyPart {
    fn from(value: uuid::Uuid) -> Self {
        KeyPart::Text(value.to_string())
    }
}

/// A fully built, canonical key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Decode the key back into its unescaped segments
    pub fn segments(&self) -> Result<Vec<String>, KeyParseError> {
        parse_key(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered builder for [`CacheKey`]
///
/// ```rust
/// use ratewarden::cache::KeyBuilder;
///
/// let key = KeyBuilder::new("users")
///     .operation("get_user")
///     .arg(123_u64)
///     .field("active", true)
///     .build();
/// assert_eq!(key.as_str(), "users:get_user:123:active=true");
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    encoded: Vec<String>,
}

impl KeyBuilder {
    /// Start a key with its namespace prefix
    pub fn new(prefix: &str) -> Self {
        Self {
            encoded: vec![escape(prefix)],
        }
    }

    pub fn operation(mut self, name: &str) -> Self {
        self.encoded.push(escape(name));
        self
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<KeyPart>) -> Self {
        self.encoded.push(escape(&value.into().to_string()));
        self
    }

    /// Append a named argument rendered as `name=value`
    pub fn field(mut self, name: &str, value: impl Into<KeyPart>) -> Self {
        self.encoded.push(format!(
            "{}{}{}",
            escape(name),
            FIELD_SEPARATOR,
            escape(&value.into().to_string())
        ));
        self
    }

    pub fn build(self) -> CacheKey {
        CacheKey(self.encoded.join(&SEPARATOR.to_string()))
    }
}

/// Key under which the facade stores a memoized value
pub fn cache_key(prefix: &str, argument: impl Into<KeyPart>) -> CacheKey {
    KeyBuilder::new(CACHE_NAMESPACE)
        .operation(prefix)
        .arg(argument)
        .build()
}

/// Key prefix shared by every memoized value of `prefix`, trailing separator included
pub fn cache_key_prefix(prefix: &str) -> String {
    let mut key = KeyBuilder::new(CACHE_NAMESPACE)
        .operation(prefix)
        .build()
        .into_string();
    key.push(SEPARATOR);
    key
}

/// Key of the sliding-window record for `(client, route)`
pub fn rate_limit_key(client: &str, route: &str) -> CacheKey {
    KeyBuilder::new(RATE_LIMIT_NAMESPACE)
        .arg(client)
        .arg(route)
        .build()
}

/// Errors from decoding a key
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("Invalid escape sequence at byte {position} in key segment '{segment}'")]
    InvalidEscape { segment: String, position: usize },
}

/// Split a key into its unescaped segments
///
/// Named fields come back as a single `name=value` segment with both halves
/// unescaped; use [`split_field`] to separate them.
pub fn parse_key(key: &str) -> Result<Vec<String>, KeyParseError> {
    key.split(SEPARATOR).map(unescape).collect()
}

/// Split a raw (still escaped) field segment into `(name, value)`
pub fn split_field(raw_segment: &str) -> Result<Option<(String, String)>, KeyParseError> {
    match raw_segment.split_once(FIELD_SEPARATOR) {
        Some((name, value)) => Ok(Some((unescape(name)?, unescape(value)?))),
        None => Ok(None),
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '=' => out.push_str("%3D"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(segment: &str) -> Result<String, KeyParseError> {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    let mut offset = 0;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let decoded = match rest.get(pos + 1..pos + 3) {
            Some("25") => '%',
            Some("3A") => ':',
            Some("3D") => '=',
            _ => {
                return Err(KeyParseError::InvalidEscape {
                    segment: segment.to_string(),
                    position: offset + pos,
                })
            }
        };
        out.push(decoded);
        offset += pos + 3;
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_orders_segments() {
        let key = KeyBuilder::new("users")
            .operation("get_user")
            .arg(123_u64)
            .arg("eu")
            .build();
        assert_eq!(key.as_str(), "users:get_user:123:eu");
    }

    #[test]
    fn test_separator_is_escaped() {
        let key = KeyBuilder::new("geo").arg("a:b").arg("c").build();
        assert_eq!(key.as_str(), "geo:a%3Ab:c");

        let other = KeyBuilder::new("geo").arg("a").arg("b:c").build();
        assert_ne!(key, other);
    }

    #[test]
    fn test_positional_and_named_do_not_collide() {
        let positional = KeyBuilder::new("p").arg("active=true").build();
        let named = KeyBuilder::new("p").field("active", true).build();
        assert_ne!(positional, named);
        assert_eq!(named.as_str(), "p:active=true");
    }

    #[test]
    fn test_empty_argument_is_distinct_from_none() {
        let none = KeyBuilder::new("p").operation("op").build();
        let empty = KeyBuilder::new("p").operation("op").arg("").build();
        assert_ne!(none, empty);
        assert_eq!(empty.as_str(), "p:op:");
    }

    #[test]
    fn test_parse_recovers_segments() {
        let key = KeyBuilder::new("ns%x")
            .arg("with:colon")
            .arg(-7_i64)
            .build();
        assert_eq!(
            key.segments().unwrap(),
            vec!["ns%x".to_string(), "with:colon".to_string(), "-7".to_string()]
        );
    }

    #[test]
    fn test_split_field() {
        let key = KeyBuilder::new("p").field("na=me", "v:1").build();
        let raw = key.as_str().split(SEPARATOR).nth(1).unwrap();
        assert_eq!(
            split_field(raw).unwrap(),
            Some(("na=me".to_string(), "v:1".to_string()))
        );
        assert_eq!(split_field("plain").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_bad_escape() {
        assert!(matches!(
            parse_key("a:b%zz"),
            Err(KeyParseError::InvalidEscape { position: 1, .. })
        ));
        assert!(parse_key("a:b%3").is_err());
    }

    #[test]
    fn test_namespaced_helpers() {
        assert_eq!(cache_key("users", "123").as_str(), "cache:users:123");
        assert_eq!(cache_key_prefix("users"), "cache:users:");
        assert_eq!(
            rate_limit_key("10.0.0.1", "/api/v1/users").as_str(),
            "rate_limit:10.0.0.1:/api/v1/users"
        );
        // IPv6 clients contain the separator
        assert_eq!(
            rate_limit_key("::1", "/login").as_str(),
            "rate_limit:%3A%3A1:/login"
        );
    }
}
