// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the ingestion client.
//!
//! The taxonomy is deliberately flat: each variant names one failure class
//! and carries a human-readable message. Validation failures
//! ([`Error::InvalidApiCall`], [`Error::InvalidName`],
//! [`Error::InvalidTimestamp`]) indicate a programming error on the caller's
//! side and are never retried; transport failures follow the retry policy of
//! the transport that produced them.

use serde::Deserialize;

/// Structured error body returned by the server on a rejected flush.
///
/// Parsed from the JSON response of `POST /write` when the server produces
/// one; otherwise the raw response text is surfaced instead.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerErrorBody {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub message: Option<String>,
    /// One-based index of the offending wire line, when known.
    #[serde(default)]
    pub line: Option<u64>,
    /// Server-side correlation id.
    #[serde(default, rename = "errorId")]
    pub error_id: Option<String>,
}

/// Errors returned by tswire operations.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Methods were called in the wrong order (no table set, symbol after
    /// field, transaction misuse, operation unsupported on this transport).
    InvalidApiCall(String),
    /// A table or column name failed validation. The message names the
    /// offending character and byte index.
    InvalidName(String),
    /// Malformed or out-of-range timestamp input.
    InvalidTimestamp(String),
    /// Transport-level I/O failure on the TCP path.
    SocketError(String),
    /// TLS configuration or handshake failure.
    TlsError(String),
    /// Authentication sequencing error or bad credentials.
    AuthError(String),
    /// The server rejected a flush after retries were exhausted, or a TCP
    /// write failed irrecoverably. Carries the parsed server error when the
    /// response body was structured JSON.
    ServerFlushError {
        message: String,
        server: Option<ServerErrorBody>,
    },
    /// Malformed or inconsistent configuration.
    ConfigError(String),
    /// The host/port could not be resolved.
    CouldNotResolveAddr(String),
    /// An HTTP-only capability was requested from a non-HTTP sender.
    HttpNotSupported(String),
}

impl Error {
    /// Build a [`Error::ServerFlushError`] without a structured body.
    pub(crate) fn flush(message: impl Into<String>) -> Self {
        Error::ServerFlushError {
            message: message.into(),
            server: None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidApiCall(msg) => write!(f, "invalid API call: {msg}"),
            Error::InvalidName(msg) => write!(f, "invalid name: {msg}"),
            Error::InvalidTimestamp(msg) => write!(f, "invalid timestamp: {msg}"),
            Error::SocketError(msg) => write!(f, "socket error: {msg}"),
            Error::TlsError(msg) => write!(f, "TLS error: {msg}"),
            Error::AuthError(msg) => write!(f, "authentication error: {msg}"),
            Error::ServerFlushError { message, server } => {
                write!(f, "server rejected flush: {message}")?;
                if let Some(body) = server {
                    if let Some(code) = &body.code {
                        write!(f, " [code: {code}]")?;
                    }
                    if let Some(line) = body.line {
                        write!(f, " [line: {line}]")?;
                    }
                    if let Some(id) = &body.error_id {
                        write!(f, " [errorId: {id}]")?;
                    }
                }
                Ok(())
            }
            Error::ConfigError(msg) => write!(f, "config error: {msg}"),
            Error::CouldNotResolveAddr(msg) => write!(f, "could not resolve address: {msg}"),
            Error::HttpNotSupported(msg) => write!(f, "HTTP not supported: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
