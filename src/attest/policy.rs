// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trust policy and attestation evidence types.
//!
//! A trust policy lists the enclave builds a client is willing to talk to,
//! either by exact build measurement (MRENCLAVE) or by signing authority
//! (MRSIGNER + product id + minimum security version).
//!
//! ## JSON format
//!
//! ```json
//! {
//!   "allow_debug": false,
//!   "enclaves": [
//!     { "mr_enclave": "<64 hex chars>", "allowed_advisories": ["INTEL-SA-00334"] }
//!   ],
//!   "signers": [
//!     {
//!       "mr_signer": "<64 hex chars>",
//!       "product_id": 4,
//!       "minimum_security_version": 1,
//!       "allowed_advisories": []
//!     }
//!   ]
//! }
//! ```

use std::fmt;
use std::path::Path;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Length of an SGX measurement in bytes.
pub const MEASUREMENT_LEN: usize = 32;

/// A 32-byte enclave measurement (MRENCLAVE or MRSIGNER).
///
/// Serialized as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Measurement([u8; MEASUREMENT_LEN]);

impl Measurement {
    pub const fn new(bytes: [u8; MEASUREMENT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MEASUREMENT_LEN] {
        &self.0
    }

    /// Parse a measurement from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, PolicyError> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| PolicyError::InvalidMeasurement(format!("{s}: {e}")))?;
        let bytes: [u8; MEASUREMENT_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            PolicyError::InvalidMeasurement(format!(
                "expected {MEASUREMENT_LEN} bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Measurement({})", self.to_hex())
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Measurement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Measurement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Measurement::from_hex(&s).map_err(de::Error::custom)
    }
}

/// Accept a specific enclave build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclavePolicy {
    pub mr_enclave: Measurement,
    #[serde(default)]
    pub allowed_advisories: Vec<String>,
}

/// Accept any build signed by an authority, at or above a security version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerPolicy {
    pub mr_signer: Measurement,
    pub product_id: u16,
    pub minimum_security_version: u16,
    #[serde(default)]
    pub allowed_advisories: Vec<String>,
}

/// The set of enclave identities a connection will trust.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustPolicy {
    /// Accept enclaves running in debug mode. Never enable in production.
    #[serde(default)]
    pub allow_debug: bool,
    #[serde(default)]
    pub enclaves: Vec<EnclavePolicy>,
    #[serde(default)]
    pub signers: Vec<SignerPolicy>,
}

impl TrustPolicy {
    pub fn is_empty(&self) -> bool {
        self.enclaves.is_empty() && self.signers.is_empty()
    }

    pub fn with_enclave(mut self, mr_enclave: Measurement) -> Self {
        self.enclaves.push(EnclavePolicy {
            mr_enclave,
            allowed_advisories: Vec::new(),
        });
        self
    }

    pub fn with_signer(
        mut self,
        mr_signer: Measurement,
        product_id: u16,
        minimum_security_version: u16,
    ) -> Self {
        self.signers.push(SignerPolicy {
            mr_signer,
            product_id,
            minimum_security_version,
            allowed_advisories: Vec::new(),
        });
        self
    }

    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(json).map_err(|e| PolicyError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PolicyError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

/// Identity claims extracted from a verified quote by the crypto core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub mr_enclave: Measurement,
    pub mr_signer: Measurement,
    pub product_id: u16,
    pub security_version: u16,
    #[serde(default)]
    pub debug: bool,
    /// Platform security advisories reported alongside the quote.
    #[serde(default)]
    pub advisories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    #[error("Invalid trust policy: {0}")]
    Parse(String),

    #[error("Failed to read trust policy: {0}")]
    Io(String),
}
