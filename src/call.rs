// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed RPC methods carried over an attested channel.
//!
//! An [`AttestedCall`] describes one RPC method: how to turn a typed request
//! (plus authenticated-but-unencrypted AAD) into plaintext bytes and back.
//! Sealing and opening with the connection's cipher happen here too, so the
//! connection only ever moves opaque envelopes.
//!
//! ## Envelope
//!
//! ```json
//! { "aad": "<base64>", "data": "<base64 ciphertext>" }
//! ```

use std::marker::PhantomData;

use base64ct::{Base64, Encoding};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::attest::Cipher;
use crate::error::{AttestedCallError, ConnectionError};

/// Plaintext codec failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Codec error: {0}")]
pub struct CodecError(pub String);

/// Encoded request parts, before encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    pub aad: Vec<u8>,
    pub plaintext: Vec<u8>,
}

/// One RPC method on an attested service.
pub trait AttestedCall: Send + Sync + 'static {
    type RequestAad: Send + Sync + 'static;
    type Request: Send + Sync + 'static;
    type ResponseAad: Send + 'static;
    type Response: Send + 'static;

    /// Method name passed to the transport.
    fn method(&self) -> &str;

    fn encode_request(
        &self,
        aad: &Self::RequestAad,
        request: &Self::Request,
    ) -> Result<EncodedRequest, CodecError>;

    fn decode_response(
        &self,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Self::ResponseAad, Self::Response), CodecError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    aad: String,
    data: String,
}

/// Encode and encrypt a request into a transport payload.
///
/// A cipher failure means the channel state is no longer usable, so it is
/// reported as an attestation rejection.
pub(crate) fn seal_request<Call: AttestedCall, C: Cipher>(
    call: &Call,
    aad: &Call::RequestAad,
    request: &Call::Request,
    cipher: &mut C,
) -> Result<Vec<u8>, AttestedCallError> {
    let encoded = call.encode_request(aad, request).map_err(|e| {
        ConnectionError::TransportFailure(format!("{}: request encoding failed: {e}", call.method()))
    })?;

    let data = cipher
        .encrypt(&encoded.aad, &encoded.plaintext)
        .map_err(|e| AttestedCallError::rejected(format!("encrypt: {e}")))?;

    let envelope = Envelope {
        aad: Base64::encode_string(&encoded.aad),
        data: Base64::encode_string(&data),
    };
    serde_json::to_vec(&envelope).map_err(|e| {
        ConnectionError::TransportFailure(format!("{}: envelope encoding failed: {e}", call.method()))
            .into()
    })
}

/// Decrypt and decode a transport payload.
///
/// A payload that decrypts but does not decode is a protocol violation; a
/// payload that does not decrypt means the server no longer shares our
/// cipher state.
pub(crate) fn open_response<Call: AttestedCall, C: Cipher>(
    call: &Call,
    payload: &[u8],
    cipher: &mut C,
) -> Result<(Call::ResponseAad, Call::Response), AttestedCallError> {
    let invalid = |reason: String| -> AttestedCallError {
        ConnectionError::InvalidServerResponse(format!("{}: {reason}", call.method())).into()
    };

    let envelope: Envelope =
        serde_json::from_slice(payload).map_err(|e| invalid(format!("malformed envelope: {e}")))?;
    let aad = Base64::decode_vec(&envelope.aad)
        .map_err(|e| invalid(format!("malformed aad encoding: {e}")))?;
    let data = Base64::decode_vec(&envelope.data)
        .map_err(|e| invalid(format!("malformed data encoding: {e}")))?;

    let plaintext = cipher
        .decrypt(&aad, &data)
        .map_err(|e| AttestedCallError::rejected(format!("decrypt: {e}")))?;

    call.decode_response(&aad, &plaintext)
        .map_err(|e| invalid(e.to_string()))
}

/// JSON-encoded method. Unit and `None` AAD travel as empty bytes.
pub struct JsonCall<ReqAad, Req, RespAad, Resp> {
    method: String,
    _types: PhantomData<fn() -> (ReqAad, Req, RespAad, Resp)>,
}

impl<ReqAad, Req, RespAad, Resp> JsonCall<ReqAad, Req, RespAad, Resp> {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            _types: PhantomData,
        }
    }
}

impl<ReqAad, Req, RespAad, Resp> Clone for JsonCall<ReqAad, Req, RespAad, Resp> {
    fn clone(&self) -> Self {
        Self::new(self.method.clone())
    }
}

impl<ReqAad, Req, RespAad, Resp> AttestedCall for JsonCall<ReqAad, Req, RespAad, Resp>
where
    ReqAad: Serialize + Send + Sync + 'static,
    Req: Serialize + Send + Sync + 'static,
    RespAad: DeserializeOwned + Send + 'static,
    Resp: DeserializeOwned + Send + 'static,
{
    type RequestAad = ReqAad;
    type Request = Req;
    type ResponseAad = RespAad;
    type Response = Resp;

    fn method(&self) -> &str {
        &self.method
    }

    fn encode_request(&self, aad: &ReqAad, request: &Req) -> Result<EncodedRequest, CodecError> {
        let mut aad = serde_json::to_vec(aad).map_err(|e| CodecError(e.to_string()))?;
        if aad == b"null" {
            aad.clear();
        }
        let plaintext = serde_json::to_vec(request).map_err(|e| CodecError(e.to_string()))?;
        Ok(EncodedRequest { aad, plaintext })
    }

    fn decode_response(&self, aad: &[u8], plaintext: &[u8]) -> Result<(RespAad, Resp), CodecError> {
        let aad_json: &[u8] = if aad.is_empty() { b"null" } else { aad };
        let response_aad =
            serde_json::from_slice(aad_json).map_err(|e| CodecError(format!("aad: {e}")))?;
        let response =
            serde_json::from_slice(plaintext).map_err(|e| CodecError(format!("body: {e}")))?;
        Ok((response_aad, response))
    }
}
