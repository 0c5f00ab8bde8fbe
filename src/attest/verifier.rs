// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Checks attestation evidence against a [`TrustPolicy`].

use super::policy::{Evidence, TrustPolicy};

/// Reasons evidence was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// The policy lists no enclaves or signers, so nothing can match.
    #[error("trust policy is empty")]
    EmptyPolicy,

    /// Evidence reports a debug enclave and the policy does not allow debug.
    #[error("enclave is running in debug mode")]
    DebugEnclave,

    /// Neither the MRENCLAVE nor the MRSIGNER/product id pair is trusted.
    #[error("no trusted identity matches mr_enclave {mr_enclave}, mr_signer {mr_signer}")]
    UnknownIdentity { mr_enclave: String, mr_signer: String },

    /// The signer is trusted but the enclave's ISV SVN is too old.
    #[error("security version {actual} is below minimum {minimum}")]
    SecurityVersionTooLow { actual: u16, minimum: u16 },

    /// The platform reports advisories the matching entry does not allow.
    #[error("advisories not allowed by policy: {}", .0.join(", "))]
    DisallowedAdvisories(Vec<String>),
}

/// Stateless verifier holding the trust policy for one connection.
#[derive(Debug, Clone)]
pub struct AttestationVerifier {
    policy: TrustPolicy,
}

impl AttestationVerifier {
    pub fn new(policy: TrustPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    /// Accept `evidence` if any policy entry vouches for it.
    ///
    /// When several entries match the identity, the first whose advisory and
    /// security version requirements are met wins. If none are met, the
    /// error from the last matching entry is returned.
    pub fn verify(&self, evidence: &Evidence) -> Result<(), VerifyError> {
        if self.policy.is_empty() {
            return Err(VerifyError::EmptyPolicy);
        }
        if evidence.debug && !self.policy.allow_debug {
            return Err(VerifyError::DebugEnclave);
        }

        let mut last_error = None;

        for entry in &self.policy.enclaves {
            if entry.mr_enclave != evidence.mr_enclave {
                continue;
            }
            match check_advisories(&evidence.advisories, &entry.allowed_advisories) {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }

        for entry in &self.policy.signers {
            if entry.mr_signer != evidence.mr_signer || entry.product_id != evidence.product_id {
                continue;
            }
            if evidence.security_version < entry.minimum_security_version {
                last_error = Some(VerifyError::SecurityVersionTooLow {
                    actual: evidence.security_version,
                    minimum: entry.minimum_security_version,
                });
                continue;
            }
            match check_advisories(&evidence.advisories, &entry.allowed_advisories) {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| VerifyError::UnknownIdentity {
            mr_enclave: evidence.mr_enclave.to_hex(),
            mr_signer: evidence.mr_signer.to_hex(),
        }))
    }
}

fn check_advisories(reported: &[String], allowed: &[String]) -> Result<(), VerifyError> {
    let disallowed: Vec<String> = reported
        .iter()
        .filter(|a| !allowed.iter().any(|ok| ok.eq_ignore_ascii_case(a)))
        .cloned()
        .collect();

    if disallowed.is_empty() {
        Ok(())
    } else {
        Err(VerifyError::DisallowedAdvisories(disallowed))
    }
}
