// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Boundary to the native cryptographic core.
//!
//! The core builds and consumes handshake messages and owns the AEAD
//! construction. This crate never looks inside either: handshake bytes and
//! ciphertexts are opaque, and a [`Cipher`] exposes nothing but
//! `encrypt`/`decrypt`.

use super::policy::Evidence;
use super::rng::RandomSource;

/// AEAD failure reported by a [`Cipher`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cipher error: {0}")]
pub struct CipherError(pub String);

/// Post-handshake symmetric channel.
///
/// Implementations keep message ordering state (nonces, counters) internally,
/// which is why both operations take `&mut self`. The connection guarantees a
/// cipher is only ever driven by one call at a time.
pub trait Cipher: Send + 'static {
    /// Encrypt `plaintext`, binding `aad` to it.
    fn encrypt(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Verify and decrypt `ciphertext` produced by the peer under `aad`.
    fn decrypt(&mut self, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Handshake failures reported by the crypto core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The handshake response was malformed or did not match the request.
    #[error("{0}")]
    InvalidInput(String),

    /// The quote or its signature chain could not be verified.
    #[error("{0}")]
    QuoteVerificationFailed(String),
}

/// A freshly negotiated cipher plus the identity claims it was bound to.
pub struct HandshakeOutput<C> {
    pub cipher: C,
    pub evidence: Evidence,
}

/// Native attested key exchange.
///
/// `build_handshake_request` may keep pending key material inside the core;
/// `consume_handshake_response` uses it to finish the exchange. Calling
/// `build_handshake_request` again discards any earlier pending exchange.
pub trait CryptoCore: Send + 'static {
    type Cipher: Cipher;

    /// Build the initiation message addressed to `responder_id`.
    fn build_handshake_request(
        &mut self,
        responder_id: &str,
        rng: &mut dyn RandomSource,
    ) -> Vec<u8>;

    /// Finish the exchange started by the last `build_handshake_request`.
    fn consume_handshake_response(
        &mut self,
        response: &[u8],
    ) -> Result<HandshakeOutput<Self::Cipher>, CoreError>;
}
