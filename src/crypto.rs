// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Share Envelope
//!
//! Every share is sealed with its own freshly generated ChaCha20-Poly1305 key.
//! The key is returned to the caller (it ends up in the share token) and is
//! never stored next to the ciphertext.
//!
//! ## Envelope Layout
//!
//! ```text
//! +---------+----------------+-------------+---------------------------+
//! | version | created_at     | nonce       | ciphertext || tag         |
//! | 1 byte  | 8 bytes (u64BE)| 12 bytes    | len(plaintext) + 16 bytes |
//! +---------+----------------+-------------+---------------------------+
//! ```
//!
//! `version || created_at` is bound to the ciphertext as associated data, so
//! the creation timestamp cannot be altered without failing authentication.
//! [`open`] rejects envelopes older than the caller-supplied age budget.

use base64ct::{Base64UrlUnpadded, Encoding};
use chacha20poly1305::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

const ENVELOPE_VERSION: u8 = 0x01;
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + 8;
const MIN_ENVELOPE_LEN: usize = HEADER_LEN + NONCE_LEN + TAG_LEN;

/// Envelopes stamped further than this in the future are rejected.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Raw bytes behind a generated passphrase (48 base64 characters).
const PASSPHRASE_BYTES: usize = 36;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("system entropy source failed")]
    Entropy,
    #[error("encryption key is not a valid 256-bit key")]
    InvalidKey,
    #[error("envelope is malformed")]
    Malformed,
    #[error("envelope failed authentication")]
    Authentication,
    #[error("envelope age {age_secs}s exceeds budget of {max_age_secs}s")]
    Expired { age_secs: i64, max_age_secs: u64 },
    #[error("envelope timestamp lies in the future")]
    FromTheFuture,
}

/// Output of [`seal`]: the envelope to persist and the key to hand out.
#[derive(Debug)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    /// URL-safe base64 encoded key. Never persisted.
    pub key: String,
}

/// Encrypt `plaintext` under a fresh random key, stamping the current time.
pub fn seal(plaintext: &[u8]) -> Result<Sealed, EnvelopeError> {
    seal_at(plaintext, Utc::now().timestamp())
}

pub(crate) fn seal_at(plaintext: &[u8], created_at: i64) -> Result<Sealed, EnvelopeError> {
    let mut key_bytes = [0u8; KEY_LEN];
    OsRng
        .try_fill_bytes(&mut key_bytes)
        .map_err(|_| EnvelopeError::Entropy)?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|_| EnvelopeError::Entropy)?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));

    let mut envelope = Vec::with_capacity(MIN_ENVELOPE_LEN + plaintext.len());
    envelope.push(ENVELOPE_VERSION);
    envelope.extend_from_slice(&(created_at.max(0) as u64).to_be_bytes());

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: &envelope[..HEADER_LEN],
            },
        )
        .map_err(|_| EnvelopeError::Malformed)?;

    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);

    Ok(Sealed {
        ciphertext: envelope,
        key: Base64UrlUnpadded::encode_string(&key_bytes),
    })
}

/// Authenticate and decrypt an envelope.
///
/// Fails unless `now - created_at <= max_age_secs`.
pub fn open(envelope: &[u8], key: &str, max_age_secs: u64) -> Result<Vec<u8>, EnvelopeError> {
    open_at(envelope, key, max_age_secs, Utc::now().timestamp())
}

pub(crate) fn open_at(
    envelope: &[u8],
    key: &str,
    max_age_secs: u64,
    now: i64,
) -> Result<Vec<u8>, EnvelopeError> {
    let key_bytes = Base64UrlUnpadded::decode_vec(key).map_err(|_| EnvelopeError::InvalidKey)?;
    if key_bytes.len() != KEY_LEN {
        return Err(EnvelopeError::InvalidKey);
    }

    if envelope.len() < MIN_ENVELOPE_LEN || envelope[0] != ENVELOPE_VERSION {
        return Err(EnvelopeError::Malformed);
    }

    let (header, rest) = envelope.split_at(HEADER_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| EnvelopeError::Authentication)?;

    let mut stamp = [0u8; 8];
    stamp.copy_from_slice(&header[1..HEADER_LEN]);
    let created_at =
        i64::try_from(u64::from_be_bytes(stamp)).map_err(|_| EnvelopeError::Malformed)?;

    if created_at - now > MAX_CLOCK_SKEW_SECS {
        return Err(EnvelopeError::FromTheFuture);
    }

    let age_secs = now - created_at;
    if age_secs > 0 && age_secs as u64 > max_age_secs {
        return Err(EnvelopeError::Expired {
            age_secs,
            max_age_secs,
        });
    }

    Ok(plaintext)
}

/// Random URL-safe passphrase for file shares sealed without a password.
pub fn random_passphrase() -> Result<String, EnvelopeError> {
    let mut bytes = [0u8; PASSPHRASE_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| EnvelopeError::Entropy)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

type HmacSha256 = Hmac<Sha256>;

/// Constant-time comparison of a supplied password against the expected one.
///
/// Both sides are reduced to HMAC tags first so the comparison does not leak
/// the expected length either.
pub fn passwords_match(expected: &[u8], supplied: &[u8]) -> bool {
    const DOMAIN: &[u8] = b"okuru/download-password";

    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(DOMAIN) else {
        return false;
    };
    mac.update(expected);
    let expected_tag = mac.finalize().into_bytes();

    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(DOMAIN) else {
        return false;
    };
    mac.update(supplied);
    mac.verify_slice(&expected_tag).is_ok()
}
