// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors surfaced by an attested connection.
//!
//! Every public call resolves to a success payload or exactly one
//! [`ConnectionError`]. Attestation rejections observed mid-call are kept
//! internal ([`AttestedCallError`]) and translated before they reach a caller.

/// Errors returned to callers of [`crate::AttestedConnection`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Network or status-level failure reported by the transport.
    #[error("Connection failure: {0}")]
    TransportFailure(String),

    /// The server rejected the session credentials.
    #[error("Authorization failure: {0}")]
    AuthorizationFailure(String),

    /// The server violated the protocol, or re-attestation was exhausted.
    #[error("Invalid server response: {0}")]
    InvalidServerResponse(String),

    /// The remote attestation evidence did not satisfy the trust policy.
    #[error("Attestation verification failed: {0}")]
    AttestationVerificationFailed(String),
}

impl ConnectionError {
    /// Stable short code, useful for metrics labels and log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectionError::TransportFailure(_) => "transport_failure",
            ConnectionError::AuthorizationFailure(_) => "authorization_failure",
            ConnectionError::InvalidServerResponse(_) => "invalid_server_response",
            ConnectionError::AttestationVerificationFailed(_) => {
                "attestation_verification_failed"
            }
        }
    }
}

/// Outcome of a single dispatch attempt, before retry policy is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttestedCallError {
    /// Give up: surface this error.
    Connection(ConnectionError),
    /// The server (or our cipher) no longer accepts the current attestation.
    AttestationRejected(String),
}

impl AttestedCallError {
    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        AttestedCallError::AttestationRejected(reason.into())
    }
}

impl From<ConnectionError> for AttestedCallError {
    fn from(e: ConnectionError) -> Self {
        AttestedCallError::Connection(e)
    }
}

impl std::fmt::Display for AttestedCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Attested connection error: ")?;
        match self {
            AttestedCallError::Connection(e) => write!(f, "{e}"),
            AttestedCallError::AttestationRejected(reason) if reason.is_empty() => {
                write!(f, "Attestation failure")
            }
            AttestedCallError::AttestationRejected(reason) => {
                write!(f, "Attestation failure: {reason}")
            }
        }
    }
}

impl std::error::Error for AttestedCallError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            ConnectionError::TransportFailure("x".into()).error_code(),
            "transport_failure"
        );
        assert_eq!(
            ConnectionError::AuthorizationFailure("x".into()).error_code(),
            "authorization_failure"
        );
        assert_eq!(
            ConnectionError::InvalidServerResponse("x".into()).error_code(),
            "invalid_server_response"
        );
        assert_eq!(
            ConnectionError::AttestationVerificationFailed("x".into()).error_code(),
            "attestation_verification_failed"
        );
    }

    #[test]
    fn display_includes_detail() {
        let err = ConnectionError::AuthorizationFailure("bad password".into());
        assert_eq!(err.to_string(), "Authorization failure: bad password");
    }

    #[test]
    fn attested_call_error_display() {
        assert_eq!(
            AttestedCallError::rejected("").to_string(),
            "Attested connection error: Attestation failure"
        );
        assert_eq!(
            AttestedCallError::rejected("decrypt failed").to_string(),
            "Attested connection error: Attestation failure: decrypt failed"
        );
        let wrapped: AttestedCallError =
            ConnectionError::TransportFailure("unavailable".into()).into();
        assert_eq!(
            wrapped.to_string(),
            "Attested connection error: Connection failure: unavailable"
        );
    }
}
