// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # RPC Transport
//!
//! The connection treats the transport as a single asynchronous primitive:
//! send one request, get back a status plus an optional body and optional
//! response headers. Connection pooling, TLS and socket-level retries belong
//! to the implementation. Timeouts must surface as a non-`Ok` status.
//!
//! `http` provides a `reqwest` implementation.

pub mod http;

use std::future::Future;
use std::sync::Arc;

pub use http::HttpTransport;

/// RPC status codes (gRPC numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    PermissionDenied,
    ResourceExhausted,
    Unimplemented,
    Internal,
    Unavailable,
    Unauthenticated,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Cancelled => "cancelled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::Unauthenticated => "unauthenticated",
        }
    }
}

/// Call status as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code.as_str())
        } else {
            write!(f, "{}: {}", self.code.as_str(), self.message)
        }
    }
}

/// Ordered, case-insensitive header list. Keys are stored lowercase and may
/// repeat (e.g. several `set-cookie` entries).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, keeping existing entries with the same key.
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        self.entries.push((key.to_ascii_lowercase(), value.into()));
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in iter {
            metadata.append(k.as_ref(), v);
        }
        metadata
    }
}

/// One outgoing RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// RPC method name, e.g. `auth` or `ledger/get_outputs`.
    pub method: String,
    pub body: Vec<u8>,
    pub metadata: Metadata,
}

/// Result of one RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: Status,
    pub body: Option<Vec<u8>>,
    /// Initial response headers, if the call got far enough to receive any.
    pub metadata: Option<Metadata>,
}

impl TransportResponse {
    pub fn ok(body: Vec<u8>, metadata: Metadata) -> Self {
        Self {
            status: Status::ok(),
            body: Some(body),
            metadata: Some(metadata),
        }
    }

    pub fn failed(status: Status) -> Self {
        Self {
            status,
            body: None,
            metadata: None,
        }
    }
}

/// Asynchronous unary RPC primitive.
pub trait Transport: Send + Sync + 'static {
    fn call(&self, request: TransportRequest) -> impl Future<Output = TransportResponse> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn call(&self, request: TransportRequest) -> impl Future<Output = TransportResponse> + Send {
        (**self).call(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_is_case_insensitive_and_keeps_duplicates() {
        let mut md = Metadata::new();
        md.append("Set-Cookie", "a=1");
        md.append("set-cookie", "b=2");
        md.append("X-Trace", "abc");

        assert_eq!(md.get("SET-COOKIE"), Some("a=1"));
        assert_eq!(md.get_all("set-cookie").collect::<Vec<_>>(), vec!["a=1", "b=2"]);
        assert_eq!(md.get("x-trace"), Some("abc"));
        assert_eq!(md.get("missing"), None);
        assert_eq!(md.len(), 3);
    }

    #[test]
    fn metadata_value_outlives_lookup_key() {
        let md: Metadata = [("X-Trace", "abc")].into_iter().collect();
        let value = {
            let key = String::from("x-trace");
            md.get(&key)
        };
        assert_eq!(value, Some("abc"));
    }

    #[test]
    fn metadata_from_iterator() {
        let md: Metadata = [("Cookie", "a=1")].into_iter().collect();
        assert_eq!(md.iter().collect::<Vec<_>>(), vec![("cookie", "a=1")]);
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::ok().to_string(), "ok");
        assert_eq!(
            Status::new(Code::PermissionDenied, "stale session").to_string(),
            "permission_denied: stale session"
        );
    }
}
