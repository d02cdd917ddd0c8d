//! Turns a user-typed key token into fixed-length key material.
//!
//! Interpretation order:
//!
//! 1. the empty-key sentinel `""` resolves to the all-zero key, with a warning;
//! 2. a hex string encoding exactly `KEY_LEN` bytes is decoded directly;
//! 3. a token of 1 to `KEY_LEN - 1` raw bytes is run through `generate_key_from_bytes`;
//! 4. anything else (empty, too long, or not usable as above) gets a freshly generated key.

use super::{generate_key, generate_key_from_bytes, KeyMaterial, KEY_LEN};
use crate::logger::Logger;
use std::fmt;

/// Token the user types to request the empty key explicitly.
pub const EMPTY_KEY_SENTINEL: &str = "\"\"";

/// How a token was turned into key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Empty,
    Hex,
    Derived,
    Generated,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KeySource::Empty => "empty key",
            KeySource::Hex => "hex key",
            KeySource::Derived => "key derived from passphrase",
            KeySource::Generated => "generated key",
        };
        f.write_str(label)
    }
}

/// The single key produced for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub key: KeyMaterial,
    pub source: KeySource,
}

/// Resolves `token` into key material.
///
/// The only side effect is the warning logged for the empty-key sentinel.
pub fn resolve_key(token: &str, logger: &Logger) -> ResolvedKey {
    if token == EMPTY_KEY_SENTINEL {
        logger.warn("No key supplied: using the empty key. The database will not be protected.");
        return ResolvedKey {
            key: KeyMaterial::empty(),
            source: KeySource::Empty,
        };
    }

    if let Some(key) = decode_hex_key(token) {
        return ResolvedKey {
            key,
            source: KeySource::Hex,
        };
    }

    // Branch on the length of the token itself. Earlier revisions of this logic
    // inspected the not-yet-assigned output key here, which never reflects the input.
    let raw = token.as_bytes();
    if (1..KEY_LEN).contains(&raw.len()) {
        return ResolvedKey {
            key: generate_key_from_bytes(raw),
            source: KeySource::Derived,
        };
    }

    ResolvedKey {
        key: generate_key(),
        source: KeySource::Generated,
    }
}

fn decode_hex_key(token: &str) -> Option<KeyMaterial> {
    if token.len() != KEY_LEN * 2 {
        return None;
    }
    let bytes = hex::decode(token).ok()?;
    KeyMaterial::from_slice(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::tests::capturing_logger;
    use crate::logger::Level;
    use rstest::rstest;

    #[test]
    fn test_sentinel_resolves_to_empty_key_with_one_warning() {
        let (logger, out, _err) = capturing_logger(Level::Info);
        let resolved = resolve_key(EMPTY_KEY_SENTINEL, &logger);

        assert_eq!(resolved.source, KeySource::Empty);
        assert!(resolved.key.is_empty());
        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("WARN:"));
    }

    #[test]
    fn test_hex_token_round_trips() {
        let (logger, out, _err) = capturing_logger(Level::Info);
        let original = generate_key();
        let resolved = resolve_key(&original.to_hex(), &logger);

        assert_eq!(resolved.source, KeySource::Hex);
        assert_eq!(resolved.key, original);
        assert!(out.contents().is_empty());
    }

    #[test]
    fn test_uppercase_hex_is_accepted() {
        let (logger, _out, _err) = capturing_logger(Level::Info);
        let original = KeyMaterial::from_bytes([0xAB; KEY_LEN]);
        let resolved = resolve_key(&original.to_hex().to_uppercase(), &logger);
        assert_eq!(resolved.key, original);
    }

    #[rstest]
    #[case("a")]
    #[case("abc")]
    #[case("mypassword")]
    #[case("0123456789abcdef")] // valid hex, but only 8 bytes
    #[case("1234567890123456789012345678901")] // 31 bytes
    fn test_short_tokens_are_derived_deterministically(#[case] token: &str) {
        let (logger, _out, _err) = capturing_logger(Level::Info);
        let first = resolve_key(token, &logger);
        let second = resolve_key(token, &logger);

        assert_eq!(first.source, KeySource::Derived);
        assert_eq!(first.key, second.key);
        assert_eq!(first.key, generate_key_from_bytes(token.as_bytes()));
    }

    #[test]
    fn test_derived_keys_differ_per_token() {
        let (logger, _out, _err) = capturing_logger(Level::Info);
        assert_ne!(
            resolve_key("abc", &logger).key,
            resolve_key("abcd", &logger).key
        );
    }

    #[rstest]
    #[case("")]
    #[case("12345678901234567890123456789012")] // exactly 32 bytes, not hex
    #[case("this passphrase is far too long to be derived into a key")]
    #[case("zz23456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef")] // 64 chars, bad hex
    fn test_other_tokens_generate_fresh_keys(#[case] token: &str) {
        let (logger, out, _err) = capturing_logger(Level::Info);
        let first = resolve_key(token, &logger);
        let second = resolve_key(token, &logger);

        assert_eq!(first.source, KeySource::Generated);
        assert_eq!(second.source, KeySource::Generated);
        assert_ne!(first.key, second.key);
        assert!(!first.key.is_empty());
        assert!(out.contents().is_empty());
    }

    #[test]
    fn test_quoted_text_is_not_the_sentinel() {
        let (logger, out, _err) = capturing_logger(Level::Info);
        let resolved = resolve_key("\"\"\"\"", &logger);
        assert_eq!(resolved.source, KeySource::Derived);
        assert!(out.contents().is_empty());
    }
}
