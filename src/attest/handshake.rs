// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Attested key exchange state machine.
//!
//! ```text
//!             complete_handshake (ok)
//! Unattested ─────────────────────────▶ Attested(cipher)
//!     ▲                                       │
//!     └───────── forget / failed handshake ◀──┘
//! ```
//!
//! The handshake in flight is not a state of its own: `begin_handshake`
//! leaves [`AttestationState`] untouched and `complete_handshake` either
//! installs a new cipher or leaves the engine `Unattested`.

use tracing::{debug, error};

use super::crypto::{CoreError, CryptoCore};
use super::rng::RandomSource;
use super::verifier::AttestationVerifier;

/// Handshake failures, split by who is at fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    /// Malformed or out-of-protocol handshake response.
    #[error("Invalid handshake input: {0}")]
    InvalidInput(String),

    /// The peer's evidence failed verification or the trust policy.
    #[error("Attestation verification failed: {0}")]
    AttestationVerificationFailed(String),
}

/// Whether the connection currently holds a negotiated cipher.
pub enum AttestationState<C> {
    Unattested,
    Attested(C),
}

impl<C> AttestationState<C> {
    pub fn is_attested(&self) -> bool {
        matches!(self, AttestationState::Attested(_))
    }
}

impl<C> std::fmt::Debug for AttestationState<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttestationState::Unattested => f.write_str("Unattested"),
            AttestationState::Attested(_) => f.write_str("Attested(..)"),
        }
    }
}

/// Drives the crypto core and owns the resulting cipher.
pub struct HandshakeEngine<K: CryptoCore> {
    core: K,
    state: AttestationState<K::Cipher>,
}

impl<K: CryptoCore> HandshakeEngine<K> {
    pub fn new(core: K) -> Self {
        Self {
            core,
            state: AttestationState::Unattested,
        }
    }

    pub fn state(&self) -> &AttestationState<K::Cipher> {
        &self.state
    }

    pub fn is_attested(&self) -> bool {
        self.state.is_attested()
    }

    /// Current cipher, if attested.
    pub fn cipher_mut(&mut self) -> Option<&mut K::Cipher> {
        match &mut self.state {
            AttestationState::Attested(cipher) => Some(cipher),
            AttestationState::Unattested => None,
        }
    }

    /// Build the handshake initiation payload for `responder_id`.
    pub fn begin_handshake(&mut self, responder_id: &str, rng: &mut dyn RandomSource) -> Vec<u8> {
        debug!(responder_id, "Building attestation handshake request");
        self.core.build_handshake_request(responder_id, rng)
    }

    /// Consume the handshake response and, if the evidence satisfies
    /// `verifier`, become `Attested` with the new cipher.
    pub fn complete_handshake(
        &mut self,
        response: &[u8],
        verifier: &AttestationVerifier,
    ) -> Result<&mut K::Cipher, HandshakeError> {
        self.state = AttestationState::Unattested;

        let output = self.core.consume_handshake_response(response).map_err(|e| match e {
            CoreError::InvalidInput(reason) => HandshakeError::InvalidInput(reason),
            CoreError::QuoteVerificationFailed(reason) => {
                error!(reason = %reason, "Enclave quote verification failed");
                HandshakeError::AttestationVerificationFailed(reason)
            }
        })?;

        if let Err(e) = verifier.verify(&output.evidence) {
            error!(
                mr_enclave = %output.evidence.mr_enclave,
                mr_signer = %output.evidence.mr_signer,
                error = %e,
                "Enclave evidence rejected by trust policy"
            );
            return Err(HandshakeError::AttestationVerificationFailed(e.to_string()));
        }

        debug!(
            mr_enclave = %output.evidence.mr_enclave,
            "Attestation handshake complete"
        );
        self.state = AttestationState::Attested(output.cipher);
        self.cipher_mut().ok_or_else(|| {
            HandshakeError::InvalidInput("cipher missing after handshake".to_string())
        })
    }

    /// Drop the current cipher, if any.
    pub fn forget(&mut self) {
        if self.state.is_attested() {
            debug!("Forgetting attestation");
        }
        self.state = AttestationState::Unattested;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attest::crypto::{Cipher, CipherError, HandshakeOutput};
    use crate::attest::policy::{Evidence, Measurement, TrustPolicy};

    const TRUSTED: Measurement = Measurement::new([7; 32]);

    #[derive(Debug)]
    struct NullCipher(u8);

    impl Cipher for NullCipher {
        fn encrypt(&mut self, _aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
            Ok(plaintext.to_vec())
        }

        fn decrypt(&mut self, _aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
            Ok(ciphertext.to_vec())
        }
    }

    /// Response byte 0 selects the outcome: 0 ok, 1 malformed, 2 bad quote.
    /// Byte 1 is the mr_enclave fill.
    #[derive(Default)]
    struct ScriptedCore {
        requests: Vec<String>,
    }

    impl CryptoCore for ScriptedCore {
        type Cipher = NullCipher;

        fn build_handshake_request(
            &mut self,
            responder_id: &str,
            rng: &mut dyn RandomSource,
        ) -> Vec<u8> {
            self.requests.push(responder_id.to_string());
            rng.next_u64().to_le_bytes().to_vec()
        }

        fn consume_handshake_response(
            &mut self,
            response: &[u8],
        ) -> Result<HandshakeOutput<NullCipher>, CoreError> {
            match response {
                [0, fill] => Ok(HandshakeOutput {
                    cipher: NullCipher(*fill),
                    evidence: Evidence {
                        mr_enclave: Measurement::new([*fill; 32]),
                        mr_signer: Measurement::new([0; 32]),
                        product_id: 0,
                        security_version: 0,
                        debug: false,
                        advisories: Vec::new(),
                    },
                }),
                [2, ..] => Err(CoreError::QuoteVerificationFailed("bad signature".into())),
                _ => Err(CoreError::InvalidInput("truncated response".into())),
            }
        }
    }

    fn verifier() -> AttestationVerifier {
        AttestationVerifier::new(TrustPolicy::default().with_enclave(TRUSTED))
    }

    #[test]
    fn begin_does_not_change_state() {
        let mut engine = HandshakeEngine::new(ScriptedCore::default());
        let mut rng = || 42u64;
        let request = engine.begin_handshake("node1.example.com:443", &mut rng);
        assert_eq!(request, 42u64.to_le_bytes().to_vec());
        assert!(!engine.is_attested());
        assert_eq!(engine.core.requests, vec!["node1.example.com:443"]);
    }

    #[test]
    fn successful_handshake_installs_cipher() {
        let mut engine = HandshakeEngine::new(ScriptedCore::default());
        let cipher = engine.complete_handshake(&[0, 7], &verifier()).unwrap();
        assert_eq!(cipher.0, 7);
        assert!(engine.is_attested());
        assert_eq!(engine.cipher_mut().map(|c| c.0), Some(7));
    }

    #[test]
    fn repeated_handshake_returns_the_new_cipher() {
        let mut engine = HandshakeEngine::new(ScriptedCore::default());
        engine.complete_handshake(&[0, 7], &verifier()).unwrap();
        engine.forget();

        let policy = TrustPolicy::default()
            .with_enclave(TRUSTED)
            .with_enclave(Measurement::new([8; 32]));
        let cipher = engine
            .complete_handshake(&[0, 8], &AttestationVerifier::new(policy))
            .unwrap();
        assert_eq!(cipher.0, 8);
        assert_eq!(engine.cipher_mut().map(|c| c.0), Some(8));
    }

    #[test]
    fn malformed_response_is_invalid_input() {
        let mut engine = HandshakeEngine::new(ScriptedCore::default());
        let err = engine.complete_handshake(&[1], &verifier()).unwrap_err();
        assert!(matches!(err, HandshakeError::InvalidInput(_)));
        assert!(!engine.is_attested());
    }

    #[test]
    fn quote_failure_is_verification_failure() {
        let mut engine = HandshakeEngine::new(ScriptedCore::default());
        let err = engine.complete_handshake(&[2], &verifier()).unwrap_err();
        assert!(matches!(err, HandshakeError::AttestationVerificationFailed(_)));
    }

    #[test]
    fn untrusted_evidence_leaves_engine_unattested() {
        let mut engine = HandshakeEngine::new(ScriptedCore::default());
        engine.complete_handshake(&[0, 7], &verifier()).unwrap();

        let err = engine.complete_handshake(&[0, 9], &verifier()).unwrap_err();
        assert!(matches!(err, HandshakeError::AttestationVerificationFailed(_)));
        assert!(!engine.is_attested());
    }

    #[test]
    fn forget_is_idempotent() {
        let mut engine = HandshakeEngine::new(ScriptedCore::default());
        engine.complete_handshake(&[0, 7], &verifier()).unwrap();
        engine.forget();
        assert!(!engine.is_attested());
        engine.forget();
        assert!(engine.cipher_mut().is_none());
        assert_eq!(format!("{:?}", engine.state()), "Unattested");
    }
}
