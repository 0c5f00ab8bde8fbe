// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave endpoint URLs.
//!
//! | Scheme | Transport | Default port |
//! |--------|-----------|--------------|
//! | `attest://` | HTTPS | 443 |
//! | `insecure-attest://` | HTTP | 3225 |
//!
//! The responder id bound into the handshake is always `host:port`, with the
//! default port filled in, so `attest://node.example.com` and
//! `attest://node.example.com:443` attest as the same responder.

use std::fmt;

use url::Url;

pub const SECURE_SCHEME: &str = "attest";
pub const INSECURE_SCHEME: &str = "insecure-attest";
pub const DEFAULT_SECURE_PORT: u16 = 443;
pub const DEFAULT_INSECURE_PORT: u16 = 3225;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("Invalid endpoint URL {url}: {reason}")]
    Invalid { url: String, reason: String },

    #[error("Unsupported endpoint scheme '{0}' (expected attest:// or insecure-attest://)")]
    UnsupportedScheme(String),

    #[error("Endpoint URL has no host: {0}")]
    MissingHost(String),
}

/// A parsed enclave endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUrl {
    url: Url,
    host: String,
    port: u16,
    use_tls: bool,
}

impl EndpointUrl {
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(s.trim()).map_err(|e| EndpointError::Invalid {
            url: s.to_string(),
            reason: e.to_string(),
        })?;

        let (use_tls, default_port) = match url.scheme() {
            SECURE_SCHEME => (true, DEFAULT_SECURE_PORT),
            INSECURE_SCHEME => (false, DEFAULT_INSECURE_PORT),
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| EndpointError::MissingHost(s.to_string()))?
            .to_string();
        let port = url.port().unwrap_or(default_port);

        Ok(Self {
            url,
            host,
            port,
            use_tls,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    /// `host:port` identity the enclave answers to.
    pub fn responder_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL for the HTTP transport, keeping any path prefix.
    pub fn http_base_url(&self) -> Result<Url, EndpointError> {
        let scheme = if self.use_tls { "https" } else { "http" };
        let path = self.url.path().trim_end_matches('/');
        let base = format!("{scheme}://{}:{}{path}", self.host, self.port);
        Url::parse(&base).map_err(|e| EndpointError::Invalid {
            url: base,
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl std::str::FromStr for EndpointUrl {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
