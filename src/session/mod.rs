// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Connection Session
//!
//! Per-connection request decoration:
//!
//! - `authorization: Basic ...` when credentials are set
//! - `cookie: ...` carrying routing cookies the server handed out via
//!   `set-cookie`, so follow-up calls stick to the same enclave instance
//!
//! A session belongs to exactly one connection and is only touched from
//! inside that connection's serialized gate.

pub mod credentials;
pub mod endpoint;

use std::collections::BTreeMap;

use tracing::trace;

pub use credentials::BasicCredentials;
pub use endpoint::{EndpointError, EndpointUrl};

use crate::transport::Metadata;

const AUTHORIZATION_HEADER: &str = "authorization";
const COOKIE_HEADER: &str = "cookie";
const SET_COOKIE_HEADER: &str = "set-cookie";

pub(crate) struct Session {
    endpoint: EndpointUrl,
    credentials: Option<BasicCredentials>,
    cookies: BTreeMap<String, String>,
}

impl Session {
    pub(crate) fn new(endpoint: EndpointUrl) -> Self {
        Self {
            endpoint,
            credentials: None,
            cookies: BTreeMap::new(),
        }
    }

    pub(crate) fn endpoint(&self) -> &EndpointUrl {
        &self.endpoint
    }

    pub(crate) fn set_authorization(&mut self, credentials: BasicCredentials) {
        self.credentials = if credentials.is_empty() {
            None
        } else {
            Some(credentials)
        };
    }

    /// Headers for the next outgoing request.
    pub(crate) fn request_headers(&self) -> Metadata {
        let mut metadata = Metadata::new();
        if let Some(credentials) = &self.credentials {
            metadata.append(AUTHORIZATION_HEADER, credentials.authorization_header());
        }
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            metadata.append(COOKIE_HEADER, cookie);
        }
        metadata
    }

    /// Absorb `set-cookie` headers from a successful response.
    pub(crate) fn process_response(&mut self, headers: &Metadata) {
        for value in headers.get_all(SET_COOKIE_HEADER) {
            let Some((name, cookie)) = parse_set_cookie(value) else {
                continue;
            };
            trace!(cookie = %name, "Updating routing cookie");
            if cookie.is_empty() {
                self.cookies.remove(&name);
            } else {
                self.cookies.insert(name, cookie);
            }
        }
    }
}

/// `name=value; Path=/; Secure` -> `(name, value)`.
fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().trim_matches('"').to_string()))
}
