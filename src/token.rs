// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Share token codec.
//!
//! A token is `storage_key SEP encryption_key`. The storage key names the
//! metadata record, the encryption key is never persisted and only travels
//! inside the token.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Token did not split into exactly two non-empty segments.
    #[error("malformed share token")]
    Invalid,
}

/// Decoded share token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareToken {
    pub storage_key: String,
    pub encryption_key: String,
}

/// Encodes and decodes share tokens around a configured separator.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    separator: String,
}

impl TokenCodec {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn encode(&self, storage_key: &str, encryption_key: &str) -> String {
        format!("{storage_key}{}{encryption_key}", self.separator)
    }

    /// Split a token into its storage key and encryption key.
    pub fn decode(&self, token: &str) -> Result<ShareToken, TokenError> {
        let mut segments = token.split(self.separator.as_str());
        let (Some(storage_key), Some(encryption_key), None) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(TokenError::Invalid);
        };

        if storage_key.is_empty() || encryption_key.is_empty() {
            return Err(TokenError::Invalid);
        }

        Ok(ShareToken {
            storage_key: storage_key.to_string(),
            encryption_key: encryption_key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("~")
    }

    #[test]
    fn encode_then_decode() {
        let token = codec().encode("3f1c0a52-0000-4000-8000-000000000001", "c2VjcmV0");
        assert_eq!(token, "3f1c0a52-0000-4000-8000-000000000001~c2VjcmV0");

        let decoded = codec().decode(&token).unwrap();
        assert_eq!(decoded.storage_key, "3f1c0a52-0000-4000-8000-000000000001");
        assert_eq!(decoded.encryption_key, "c2VjcmV0");
    }

    #[test]
    fn missing_separator_is_invalid() {
        assert_eq!(codec().decode("no-separator-here"), Err(TokenError::Invalid));
        assert_eq!(codec().decode(""), Err(TokenError::Invalid));
    }

    #[test]
    fn extra_separator_is_invalid() {
        assert_eq!(codec().decode("a~b~c"), Err(TokenError::Invalid));
        assert_eq!(codec().decode("a~~b"), Err(TokenError::Invalid));
    }

    #[test]
    fn empty_segments_are_invalid() {
        assert_eq!(codec().decode("key~"), Err(TokenError::Invalid));
        assert_eq!(codec().decode("~secret"), Err(TokenError::Invalid));
        assert_eq!(codec().decode("~"), Err(TokenError::Invalid));
    }

    #[test]
    fn multi_character_separator() {
        let codec = TokenCodec::new("::");
        let token = codec.encode("abc", "def");
        assert_eq!(codec.decode(&token).unwrap().encryption_key, "def");
        assert_eq!(codec.decode("abc:def"), Err(TokenError::Invalid));
    }
}
