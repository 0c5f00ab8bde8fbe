// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTPS transport backed by `reqwest` (rustls).
//!
//! Each RPC is a `POST {base_url}/{method}` with an
//! `application/octet-stream` body. HTTP status codes are folded into RPC
//! [`Code`]s so the connection can classify them uniformly.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use super::{Code, Metadata, Status, Transport, TransportRequest, TransportResponse};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Build error for [`HttpTransport`].
#[derive(Debug, thiserror::Error)]
#[error("failed to build HTTP client: {0}")]
pub struct HttpTransportError(String);

#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    http: Client,
}

impl HttpTransport {
    pub fn new(base_url: Url) -> Result<Self, HttpTransportError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, HttpTransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpTransportError(e.to_string()))?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            method.trim_start_matches('/')
        )
    }
}

impl Transport for HttpTransport {
    async fn call(&self, request: TransportRequest) -> TransportResponse {
        let url = self.method_url(&request.method);
        let mut builder = self
            .http
            .post(&url)
            .header("content-type", "application/octet-stream");
        for (key, value) in request.metadata.iter() {
            builder = builder.header(key, value);
        }

        let response = match builder.body(request.body).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(method = %request.method, error = %e, "HTTP request failed");
                return TransportResponse::failed(status_from_reqwest_error(&e));
            }
        };

        let http_status = response.status();
        let metadata: Metadata = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        if !http_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return TransportResponse {
                status: Status::new(code_from_http(http_status), format!("HTTP {http_status}: {body}")),
                body: None,
                metadata: Some(metadata),
            };
        }

        match response.bytes().await {
            Ok(bytes) => TransportResponse::ok(bytes.to_vec(), metadata),
            Err(e) => TransportResponse {
                status: status_from_reqwest_error(&e),
                body: None,
                metadata: Some(metadata),
            },
        }
    }
}

/// Map an HTTP status to an RPC code.
pub fn code_from_http(status: StatusCode) -> Code {
    match status.as_u16() {
        200..=299 => Code::Ok,
        400 => Code::InvalidArgument,
        401 => Code::Unauthenticated,
        403 => Code::PermissionDenied,
        404 => Code::NotFound,
        408 | 504 => Code::DeadlineExceeded,
        429 | 502 | 503 => Code::Unavailable,
        501 => Code::Unimplemented,
        500 => Code::Internal,
        _ => Code::Unknown,
    }
}

fn status_from_reqwest_error(e: &reqwest::Error) -> Status {
    let code = if e.is_timeout() {
        Code::DeadlineExceeded
    } else if e.is_connect() || e.is_request() {
        Code::Unavailable
    } else {
        Code::Unknown
    };
    Status::new(code, e.to_string())
}
