// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Attested Connection - Enclave RPC Client
//!
//! Client side of an encrypted request/response channel to a service running
//! inside an SGX enclave. The connection attests the enclave against a trust
//! policy, keeps the resulting cipher, and transparently re-attests once when
//! the server stops recognizing it.
//!
//! ## Modules
//!
//! - `attest` - Handshake engine, trust policy and verifier, crypto seams
//! - `call` - Typed RPC methods and the encrypted envelope
//! - `config` - Environment-driven configuration
//! - `connection` - `AttestedConnection` facade and retry orchestration
//! - `gate` - Serialized access to per-connection state
//! - `session` - Endpoint URL, credentials and routing cookies
//! - `transport` - RPC transport trait and the `reqwest` implementation

pub mod attest;
pub mod call;
pub mod config;
pub mod connection;
pub mod error;
pub mod gate;
pub mod logging;
pub mod session;
pub mod transport;

pub use attest::{
    AttestationVerifier, Cipher, CipherError, CoreError, CryptoCore, Evidence, HandshakeOutput,
    Measurement, RandomSource, SystemRandomSource, TrustPolicy,
};
pub use call::{AttestedCall, CodecError, EncodedRequest, JsonCall};
pub use config::{ConfigError, ConnectionConfig};
pub use connection::AttestedConnection;
pub use error::ConnectionError;
pub use session::{BasicCredentials, EndpointUrl};
pub use transport::{Code, HttpTransport, Metadata, Status, Transport, TransportRequest, TransportResponse};
