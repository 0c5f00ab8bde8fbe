// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Attested Connection
//!
//! Public facade over one enclave endpoint. Every call follows the same
//! policy: use the existing cipher if there is one, otherwise attest first.
//! If the server rejects a cipher that used to work (e.g. the enclave
//! restarted), the attestation is discarded and re-established once before
//! the call is retried. A second rejection is terminal for that call.
//!
//! All state (session, attestation, randomness) lives in a [`SerialGate`]
//! worker, so concurrent callers see a single total order of mutations.
//!
//! ```text
//! perform_attested_call
//!   ├─ Attested? ── call_with_cipher ── ok / error ──────────────► done
//!   │                    └─ rejected ── forget ─┐
//!   └─ Unattested ──────────────────────────────┴─ auth ── call_with_cipher ─► done
//! ```

use std::future::Future;

use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::attest::{
    AttestationVerifier, CryptoCore, HandshakeEngine, HandshakeError, RandomSource,
    SystemRandomSource,
};
use crate::call::{open_response, seal_request, AttestedCall};
use crate::config::ConnectionConfig;
use crate::error::{AttestedCallError, ConnectionError};
use crate::gate::SerialGate;
use crate::session::{BasicCredentials, EndpointUrl, Session};
use crate::transport::{Code, Transport, TransportRequest};

type CallResult<Call> = Result<
    (
        <Call as AttestedCall>::ResponseAad,
        <Call as AttestedCall>::Response,
    ),
    ConnectionError,
>;

/// Connection state owned by the gate worker.
struct Inner<T, K: CryptoCore> {
    session: Session,
    transport: T,
    engine: HandshakeEngine<K>,
    verifier: AttestationVerifier,
    auth_method: String,
    rng: Box<dyn RandomSource>,
    connection_id: Uuid,
}

impl<T: Transport, K: CryptoCore> Inner<T, K> {
    async fn perform_attested_call<Call: AttestedCall>(
        &mut self,
        call: &Call,
        aad: &Call::RequestAad,
        request: &Call::Request,
    ) -> CallResult<Call> {
        if self.engine.is_attested() {
            match self.call_with_cipher(call, aad, request).await {
                Ok(response) => return Ok(response),
                Err(AttestedCallError::Connection(e)) => return Err(e),
                Err(AttestedCallError::AttestationRejected(reason)) => {
                    warn!(
                        connection_id = %self.connection_id,
                        method = call.method(),
                        reason = %reason,
                        "Server rejected attestation, re-attesting"
                    );
                    self.engine.forget();
                }
            }
        }

        self.auth().await?;

        match self.call_with_cipher(call, aad, request).await {
            Ok(response) => Ok(response),
            Err(AttestedCallError::Connection(e)) => Err(e),
            Err(AttestedCallError::AttestationRejected(reason)) => {
                warn!(
                    connection_id = %self.connection_id,
                    method = call.method(),
                    reason = %reason,
                    "Server rejected freshly established attestation"
                );
                self.engine.forget();
                Err(ConnectionError::InvalidServerResponse(
                    "Attestation failure with fresh auth".to_string(),
                ))
            }
        }
    }

    /// Run the attestation handshake. On success the engine holds a new cipher.
    async fn auth(&mut self) -> Result<(), ConnectionError> {
        let Inner {
            session,
            transport,
            engine,
            verifier,
            auth_method,
            rng,
            connection_id,
        } = self;

        let responder_id = session.endpoint().responder_id();
        debug!(
            connection_id = %connection_id,
            responder_id = %responder_id,
            "Starting attestation handshake"
        );
        let request = engine.begin_handshake(&responder_id, &mut **rng);

        let response = match dispatch(session, transport, auth_method, request).await {
            Ok(body) => body,
            Err(AttestedCallError::Connection(e)) => return Err(e),
            Err(AttestedCallError::AttestationRejected(reason)) => {
                warn!(
                    connection_id = %connection_id,
                    reason = %reason,
                    "Server rejected attestation handshake"
                );
                engine.forget();
                return Err(ConnectionError::InvalidServerResponse(
                    "Attestation failure during auth".to_string(),
                ));
            }
        };

        engine
            .complete_handshake(&response, verifier)
            .map_err(|e| match e {
                HandshakeError::InvalidInput(reason) => ConnectionError::InvalidServerResponse(
                    format!("Malformed handshake response: {reason}"),
                ),
                HandshakeError::AttestationVerificationFailed(reason) => {
                    ConnectionError::AttestationVerificationFailed(reason)
                }
            })?;

        info!(
            connection_id = %connection_id,
            responder_id = %responder_id,
            "Attested connection established"
        );
        Ok(())
    }

    async fn call_with_cipher<Call: AttestedCall>(
        &mut self,
        call: &Call,
        aad: &Call::RequestAad,
        request: &Call::Request,
    ) -> Result<(Call::ResponseAad, Call::Response), AttestedCallError> {
        let Inner {
            session,
            transport,
            engine,
            ..
        } = self;

        let cipher = engine
            .cipher_mut()
            .ok_or_else(|| AttestedCallError::rejected("not attested"))?;

        let body = seal_request(call, aad, request, cipher)?;
        let payload = dispatch(session, transport, call.method(), body).await?;
        open_response(call, &payload, cipher)
    }
}

/// Send one request with session headers and classify the outcome.
async fn dispatch<T: Transport>(
    session: &mut Session,
    transport: &T,
    method: &str,
    body: Vec<u8>,
) -> Result<Vec<u8>, AttestedCallError> {
    let request = TransportRequest {
        method: method.to_string(),
        body,
        metadata: session.request_headers(),
    };
    let response = transport.call(request).await;

    match response.status.code {
        Code::Ok => {}
        Code::Unauthenticated => {
            return Err(ConnectionError::AuthorizationFailure(response.status.to_string()).into());
        }
        Code::PermissionDenied => {
            return Err(AttestedCallError::rejected(response.status.message));
        }
        _ => {
            debug!(method, status = %response.status, "Transport call failed");
            return Err(ConnectionError::TransportFailure(response.status.to_string()).into());
        }
    }

    let Some(body) = response.body else {
        return Err(ConnectionError::TransportFailure(format!(
            "{method}: response carried no payload"
        ))
        .into());
    };

    if let Some(metadata) = &response.metadata {
        session.process_response(metadata);
    }
    Ok(body)
}

/// The unit never reported back: it panicked, or the worker is gone.
fn worker_gone() -> ConnectionError {
    ConnectionError::TransportFailure("call aborted before completion".into())
}

/// A connection to one attested enclave endpoint.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct AttestedConnection<T: Transport, K: CryptoCore> {
    gate: SerialGate<Inner<T, K>>,
    runtime: Handle,
    endpoint: EndpointUrl,
    connection_id: Uuid,
}

impl<T: Transport, K: CryptoCore> AttestedConnection<T, K> {
    /// Create a connection using the OS secure random number generator.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &ConnectionConfig, transport: T, core: K) -> Self {
        Self::with_rng(config, transport, core, SystemRandomSource::new())
    }

    /// Create a connection with an injected randomness source.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_rng(
        config: &ConnectionConfig,
        transport: T,
        core: K,
        rng: impl RandomSource + 'static,
    ) -> Self {
        let connection_id = Uuid::new_v4();
        let responder_id = config.endpoint.responder_id();

        let mut session = Session::new(config.endpoint.clone());
        if let Some(credentials) = &config.credentials {
            session.set_authorization(credentials.clone());
        }

        info!(
            connection_id = %connection_id,
            responder_id = %responder_id,
            auth_method = %config.auth_method,
            "Creating attested connection"
        );

        let inner = Inner {
            session,
            transport,
            engine: HandshakeEngine::new(core),
            verifier: AttestationVerifier::new(config.trust_policy.clone()),
            auth_method: config.auth_method.clone(),
            rng: Box::new(rng),
            connection_id,
        };

        Self {
            gate: SerialGate::new(inner),
            runtime: Handle::current(),
            endpoint: config.endpoint.clone(),
            connection_id,
        }
    }

    pub fn endpoint(&self) -> &EndpointUrl {
        &self.endpoint
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Replace the credentials sent with every request.
    ///
    /// Applied ahead of queued calls, but never in the middle of one.
    /// Empty credentials clear the header. Returns `false` if the connection
    /// is closed.
    pub fn set_authorization(&self, credentials: BasicCredentials) -> bool {
        let applied = self
            .gate
            .priority_access(move |inner| inner.session.set_authorization(credentials));
        if !applied {
            warn!(connection_id = %self.connection_id, "Connection closed, credentials not applied");
        }
        applied
    }

    /// Drop the current attestation; the next call performs a fresh handshake.
    /// Returns `false` if the connection is closed.
    pub fn forget_attestation(&self) -> bool {
        let applied = self.gate.priority_access(|inner| inner.engine.forget());
        if !applied {
            warn!(connection_id = %self.connection_id, "Connection closed, attestation not forgotten");
        }
        applied
    }

    /// Whether the connection currently holds a cipher.
    ///
    /// Answered after every call queued before it has finished.
    pub async fn is_attested(&self) -> bool {
        self.gate
            .access_async(|inner| async move { inner.engine.is_attested() }.boxed())
            .await
            .unwrap_or(false)
    }

    /// Perform one encrypted call, attesting first if needed.
    ///
    /// The call is queued immediately; the returned future only waits for
    /// the result. Dropping the future does not cancel the call.
    pub fn perform_attested_call<Call: AttestedCall>(
        &self,
        call: Call,
        aad: Call::RequestAad,
        request: Call::Request,
    ) -> impl Future<Output = CallResult<Call>> + Send + 'static {
        let rx = self.gate.access_async(move |inner| {
            async move { inner.perform_attested_call(&call, &aad, &request).await }.boxed()
        });
        async move { rx.await.unwrap_or_else(|_| Err(worker_gone())) }
    }

    /// [`perform_attested_call`](Self::perform_attested_call) with default
    /// request AAD, discarding the response AAD.
    pub fn perform_call<Call>(
        &self,
        call: Call,
        request: Call::Request,
    ) -> impl Future<Output = Result<Call::Response, ConnectionError>> + Send + 'static
    where
        Call: AttestedCall,
        Call::RequestAad: Default,
    {
        let response = self.perform_attested_call(call, Default::default(), request);
        async move { response.await.map(|(_, response)| response) }
    }

    /// Callback form of [`perform_attested_call`](Self::perform_attested_call).
    ///
    /// `completion` runs on `executor` when given, otherwise on the runtime
    /// the connection was created in.
    pub fn perform_attested_call_with_completion<Call, F>(
        &self,
        call: Call,
        aad: Call::RequestAad,
        request: Call::Request,
        executor: Option<Handle>,
        completion: F,
    ) where
        Call: AttestedCall,
        F: FnOnce(CallResult<Call>) + Send + 'static,
    {
        let response = self.perform_attested_call(call, aad, request);
        let executor = executor.unwrap_or_else(|| self.runtime.clone());
        self.runtime.spawn(async move {
            let result = response.await;
            executor.spawn(async move { completion(result) });
        });
    }
}
