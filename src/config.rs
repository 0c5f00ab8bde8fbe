// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! A [`ConnectionConfig`] can be built in code or loaded from the
//! environment with [`ConnectionConfig::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ATTEST_ENDPOINT_URL` | Enclave endpoint (`attest://` or `insecure-attest://`) | Required |
//! | `ATTEST_TRUST_POLICY` | Trust policy as inline JSON | One of the two is required |
//! | `ATTEST_TRUST_POLICY_PATH` | Path to a trust policy JSON file | One of the two is required |
//! | `ATTEST_USERNAME` | Basic auth username | None |
//! | `ATTEST_PASSWORD` | Basic auth password | None |
//! | `ATTEST_AUTH_METHOD` | RPC method used for the attestation handshake | `auth` |
//! | `ATTEST_TIMEOUT_SECS` | Per-request transport timeout | `15` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::time::Duration;

use crate::attest::{PolicyError, TrustPolicy};
use crate::session::{BasicCredentials, EndpointError, EndpointUrl};
use crate::transport::http::{HttpTransport, HttpTransportError};

/// Environment variable holding the enclave endpoint URL.
pub const ENDPOINT_URL_ENV: &str = "ATTEST_ENDPOINT_URL";

/// Environment variable holding the trust policy as inline JSON.
///
/// Takes precedence over [`TRUST_POLICY_PATH_ENV`] when both are set.
pub const TRUST_POLICY_ENV: &str = "ATTEST_TRUST_POLICY";

/// Environment variable holding a path to the trust policy JSON file.
pub const TRUST_POLICY_PATH_ENV: &str = "ATTEST_TRUST_POLICY_PATH";

pub const USERNAME_ENV: &str = "ATTEST_USERNAME";
pub const PASSWORD_ENV: &str = "ATTEST_PASSWORD";
pub const AUTH_METHOD_ENV: &str = "ATTEST_AUTH_METHOD";
pub const TIMEOUT_SECS_ENV: &str = "ATTEST_TIMEOUT_SECS";

/// Handshake RPC method name.
///
/// # Default
/// `auth`, matching the enclave services' attest API.
pub const DEFAULT_AUTH_METHOD: &str = "auth";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration missing: {0}")]
    Missing(String),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Transport(#[from] HttpTransportError),
}

/// Everything needed to open an attested connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub endpoint: EndpointUrl,
    pub trust_policy: TrustPolicy,
    pub credentials: Option<BasicCredentials>,
    pub auth_method: String,
    pub request_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(endpoint: EndpointUrl, trust_policy: TrustPolicy) -> Self {
        Self {
            endpoint,
            trust_policy,
            credentials: None,
            auth_method: DEFAULT_AUTH_METHOD.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_credentials(mut self, credentials: BasicCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_auth_method(mut self, method: impl Into<String>) -> Self {
        self.auth_method = method.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let endpoint = EndpointUrl::parse(&env.required(ENDPOINT_URL_ENV)?)?;

        let trust_policy = if let Some(json) = env.optional(TRUST_POLICY_ENV) {
            TrustPolicy::from_json(&json)?
        } else if let Some(path) = env.optional(TRUST_POLICY_PATH_ENV) {
            TrustPolicy::from_file(path)?
        } else {
            return Err(ConfigError::Missing(format!(
                "{TRUST_POLICY_ENV} or {TRUST_POLICY_PATH_ENV}"
            )));
        };

        let mut config = Self::new(endpoint, trust_policy)
            .with_auth_method(env.or_default(AUTH_METHOD_ENV, DEFAULT_AUTH_METHOD));

        if let Some(secs) = env.optional(TIMEOUT_SECS_ENV) {
            let secs: u64 = secs.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    name: TIMEOUT_SECS_ENV.to_string(),
                    reason: e.to_string(),
                }
            })?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }

        match (env.optional(USERNAME_ENV), env.untrimmed(PASSWORD_ENV)) {
            (Some(username), password) => {
                config = config.with_credentials(BasicCredentials::new(
                    username,
                    password.unwrap_or_default(),
                ));
            }
            (None, Some(_)) => return Err(ConfigError::Missing(USERNAME_ENV.to_string())),
            (None, None) => {}
        }

        Ok(config)
    }

    /// Build the default HTTPS transport for this endpoint.
    pub fn http_transport(&self) -> Result<HttpTransport, ConfigError> {
        let base_url = self.endpoint.http_base_url()?;
        Ok(HttpTransport::with_timeout(base_url, self.request_timeout)?)
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn optional(&self, name: &str) -> Option<String> {
        let value = (self.lookup)(name)?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Like `optional`, but keeps surrounding whitespace. For secrets.
    fn untrimmed(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::Missing(name.to_string()))
    }

    fn or_default(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }
}
