// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Attestation
//!
//! Everything needed to turn an untrusted channel into an attested one:
//!
//! - `crypto` - traits for the native crypto core and its [`Cipher`]
//! - `handshake` - the `Unattested`/`Attested` state machine
//! - `policy` - trust policy and evidence types (JSON configurable)
//! - `verifier` - checks evidence against the policy
//! - `rng` - pluggable randomness for handshake key generation

pub mod crypto;
pub mod handshake;
pub mod policy;
pub mod rng;
pub mod verifier;

pub use crypto::{Cipher, CipherError, CoreError, CryptoCore, HandshakeOutput};
pub use handshake::{AttestationState, HandshakeEngine, HandshakeError};
pub use policy::{EnclavePolicy, Evidence, Measurement, PolicyError, SignerPolicy, TrustPolicy};
pub use rng::{RandomSource, SystemRandomSource};
pub use verifier::{AttestationVerifier, VerifyError};
