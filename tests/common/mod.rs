// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process fake enclave used by the integration tests.
//!
//! The "cipher" is an HMAC-SHA256 tag prepended to the plaintext, keyed by a
//! session generation number. The fake server bumps the generation on every
//! handshake and on `restart()`, so a client holding an old cipher gets
//! `PermissionDenied`, exactly like a real enclave that lost its session.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use attested_connection::{
    Cipher, CipherError, Code, ConnectionConfig, CoreError, CryptoCore, EndpointUrl, Evidence,
    HandshakeOutput, Measurement, Metadata, RandomSource, Status, Transport, TransportRequest,
    TransportResponse, TrustPolicy,
};
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const TRUSTED_ENCLAVE: Measurement = Measurement::new([0x11; 32]);
pub const UNTRUSTED_ENCLAVE: Measurement = Measurement::new([0x66; 32]);
pub const AUTH_METHOD: &str = "auth";
pub const ENDPOINT: &str = "insecure-attest://enclave.test";
pub const ROUTE_COOKIE: &str = "route=enclave-1";

pub fn config() -> ConnectionConfig {
    ConnectionConfig::new(
        EndpointUrl::parse(ENDPOINT).unwrap(),
        TrustPolicy::default().with_enclave(TRUSTED_ENCLAVE),
    )
}

fn session_key(generation: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"fake-enclave-session");
    hasher.update(generation.to_le_bytes());
    hasher.finalize().into()
}

/// HMAC-tagged plaintext. Fails to decrypt anything sealed under another
/// generation.
pub struct FakeCipher {
    key: [u8; 32],
    pub generation: u64,
}

impl FakeCipher {
    pub fn for_generation(generation: u64) -> Self {
        Self {
            key: session_key(generation),
            generation,
        }
    }

    fn mac(&self, aad: &[u8], body: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.key).unwrap();
        mac.update(&(aad.len() as u64).to_le_bytes());
        mac.update(aad);
        mac.update(body);
        mac
    }
}

impl Cipher for FakeCipher {
    fn encrypt(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let tag = self.mac(aad, plaintext).finalize().into_bytes();
        let mut out = tag.to_vec();
        out.extend_from_slice(plaintext);
        Ok(out)
    }

    fn decrypt(&mut self, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if ciphertext.len() < 32 {
            return Err(CipherError("ciphertext too short".into()));
        }
        let (tag, body) = ciphertext.split_at(32);
        self.mac(aad, body)
            .verify_slice(tag)
            .map_err(|_| CipherError("authentication tag mismatch".into()))?;
        Ok(body.to_vec())
    }
}

/// Client half of the fake handshake.
#[derive(Default)]
pub struct FakeCore;

impl CryptoCore for FakeCore {
    type Cipher = FakeCipher;

    fn build_handshake_request(
        &mut self,
        responder_id: &str,
        rng: &mut dyn RandomSource,
    ) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "responder_id": responder_id,
            "nonce": rng.next_u64(),
        }))
        .unwrap()
    }

    fn consume_handshake_response(
        &mut self,
        response: &[u8],
    ) -> Result<HandshakeOutput<FakeCipher>, CoreError> {
        let value: Value = serde_json::from_slice(response)
            .map_err(|e| CoreError::InvalidInput(e.to_string()))?;
        let generation = value["generation"]
            .as_u64()
            .ok_or_else(|| CoreError::InvalidInput("missing generation".into()))?;
        let mr_enclave = value["mr_enclave"]
            .as_str()
            .and_then(|s| Measurement::from_hex(s).ok())
            .ok_or_else(|| CoreError::InvalidInput("missing mr_enclave".into()))?;
        if value["quote_valid"] == Value::Bool(false) {
            return Err(CoreError::QuoteVerificationFailed("bad quote signature".into()));
        }

        Ok(HandshakeOutput {
            cipher: FakeCipher::for_generation(generation),
            evidence: Evidence {
                mr_enclave,
                mr_signer: Measurement::new([0; 32]),
                product_id: 1,
                security_version: 1,
                debug: false,
                advisories: Vec::new(),
            },
        })
    }
}

/// Knobs and observations for the fake enclave.
pub struct EnclaveState {
    pub mr_enclave: Measurement,
    pub required_authorization: Option<String>,
    pub unavailable: bool,
    pub reject_handshakes: bool,
    pub reject_calls: bool,
    pub malformed_handshake: bool,
    pub bad_quote: bool,
    pub latency: Duration,
    pub generation: u64,
    pub handshakes: usize,
    pub requests: Vec<TransportRequest>,
    pub nonces: Vec<u64>,
    pub responder_ids: Vec<String>,
}

impl Default for EnclaveState {
    fn default() -> Self {
        Self {
            mr_enclave: TRUSTED_ENCLAVE,
            required_authorization: None,
            unavailable: false,
            reject_handshakes: false,
            reject_calls: false,
            malformed_handshake: false,
            bad_quote: false,
            latency: Duration::ZERO,
            generation: 0,
            handshakes: 0,
            requests: Vec::new(),
            nonces: Vec::new(),
            responder_ids: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct FakeEnclave {
    state: Mutex<EnclaveState>,
}

impl FakeEnclave {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut EnclaveState) -> R) -> R {
        f(&mut *self.state.lock().unwrap())
    }

    /// Lose every session, as after an enclave restart.
    pub fn restart(&self) {
        self.with(|s| s.generation += 1);
    }

    pub fn handshakes(&self) -> usize {
        self.with(|s| s.handshakes)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.with(|s| s.requests.clone())
    }

    fn handle(&self, request: TransportRequest) -> TransportResponse {
        let mut s = self.state.lock().unwrap();
        s.requests.push(request.clone());

        if s.unavailable {
            return TransportResponse::failed(Status::new(Code::Unavailable, "connection refused"));
        }
        if let Some(expected) = &s.required_authorization {
            if request.metadata.get("authorization") != Some(expected.as_str()) {
                return TransportResponse::failed(Status::new(
                    Code::Unauthenticated,
                    "invalid credentials",
                ));
            }
        }

        if request.method == AUTH_METHOD {
            Self::handshake(&mut s, &request.body)
        } else {
            Self::serve(&s, &request.body)
        }
    }

    fn handshake(s: &mut EnclaveState, body: &[u8]) -> TransportResponse {
        if s.reject_handshakes {
            return TransportResponse::failed(Status::new(Code::PermissionDenied, "no"));
        }
        let request: Value = serde_json::from_slice(body).unwrap();
        s.nonces.push(request["nonce"].as_u64().unwrap());
        s.responder_ids
            .push(request["responder_id"].as_str().unwrap().to_string());

        s.handshakes += 1;
        s.generation += 1;

        let reply = if s.malformed_handshake {
            b"not a handshake".to_vec()
        } else {
            serde_json::to_vec(&json!({
                "generation": s.generation,
                "mr_enclave": s.mr_enclave.to_hex(),
                "quote_valid": !s.bad_quote,
            }))
            .unwrap()
        };
        let metadata: Metadata = [("set-cookie", format!("{ROUTE_COOKIE}; Path=/; HttpOnly"))]
            .into_iter()
            .collect();
        TransportResponse::ok(reply, metadata)
    }

    fn serve(s: &EnclaveState, body: &[u8]) -> TransportResponse {
        let denied = |msg: &str| TransportResponse::failed(Status::new(Code::PermissionDenied, msg));
        if s.reject_calls {
            return denied("session rejected");
        }

        let envelope: Value = serde_json::from_slice(body).unwrap();
        let aad = Base64::decode_vec(envelope["aad"].as_str().unwrap()).unwrap();
        let data = Base64::decode_vec(envelope["data"].as_str().unwrap()).unwrap();

        let mut cipher = FakeCipher::for_generation(s.generation);
        let Ok(plaintext) = cipher.decrypt(&aad, &data) else {
            return denied("unknown session");
        };

        let request: Value = serde_json::from_slice(&plaintext).unwrap();
        let reply = serde_json::to_vec(&json!({
            "echo": request,
            "generation": s.generation,
        }))
        .unwrap();
        let sealed = cipher.encrypt(&aad, &reply).unwrap();
        let envelope = serde_json::to_vec(&json!({
            "aad": Base64::encode_string(&aad),
            "data": Base64::encode_string(&sealed),
        }))
        .unwrap();
        TransportResponse::ok(envelope, Metadata::new())
    }
}

impl Transport for FakeEnclave {
    async fn call(&self, request: TransportRequest) -> TransportResponse {
        let latency = self.with(|s| s.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.handle(request)
    }
}
