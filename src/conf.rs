// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sender configuration.
//!
//! [`SenderOptions`] is an explicit, exhaustively enumerated options struct;
//! [`SenderOptions::from_conf`] populates it from the semicolon-delimited
//! configuration string:
//!
//! ```text
//! http::addr=localhost:9000;username=admin;password=quest;retry_timeout=5000;
//! ```
//!
//! Every key is matched by name; unknown keys and malformed values are
//! [`crate::Error::ConfigError`]s, never silently ignored.

use std::time::Duration;

use crate::error::{Error, Result};

/// Connection protocol of a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderProtocol {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
    /// Raw TCP.
    Tcp,
    /// TCP over TLS.
    Tcps,
}

impl SenderProtocol {
    fn from_schema(schema: &str) -> Result<Self> {
        match schema {
            "http" => Ok(SenderProtocol::Http),
            "https" => Ok(SenderProtocol::Https),
            "tcp" => Ok(SenderProtocol::Tcp),
            "tcps" => Ok(SenderProtocol::Tcps),
            other => Err(Error::ConfigError(format!(
                "unsupported protocol {other:?}; expected http, https, tcp or tcps"
            ))),
        }
    }

    /// True for the TLS variants.
    pub fn is_tls(self) -> bool {
        matches!(self, SenderProtocol::Https | SenderProtocol::Tcps)
    }

    /// True for the HTTP variants.
    pub fn is_http(self) -> bool {
        matches!(self, SenderProtocol::Http | SenderProtocol::Https)
    }

    fn default_port(self) -> u16 {
        if self.is_http() {
            9000
        } else {
            9009
        }
    }
}

/// Line-protocol version spoken on the wire.
///
/// `Auto` defers the choice to the `/settings` negotiation performed at
/// connect time (HTTP only); TCP senders default to V1 unless pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolVersion {
    V1,
    V2,
    V3,
    Auto,
}

impl ProtocolVersion {
    /// Numeric version as advertised by `/settings`. `Auto` has none.
    pub fn as_number(self) -> Option<u64> {
        match self {
            ProtocolVersion::V1 => Some(1),
            ProtocolVersion::V2 => Some(2),
            ProtocolVersion::V3 => Some(3),
            ProtocolVersion::Auto => None,
        }
    }

    /// Map a negotiated number back to a version, if supported.
    pub fn from_number(n: u64) -> Option<Self> {
        match n {
            1 => Some(ProtocolVersion::V1),
            2 => Some(ProtocolVersion::V2),
            3 => Some(ProtocolVersion::V3),
            _ => None,
        }
    }
}

/// One server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Full sender configuration.
///
/// Construct with [`SenderOptions::new`] and adjust fields directly, or
/// parse a configuration string with [`SenderOptions::from_conf`].
/// [`SenderOptions::validate`] enforces the cross-field invariants and runs
/// automatically when a sender connects.
#[derive(Debug, Clone)]
pub struct SenderOptions {
    pub protocol: SenderProtocol,
    /// One or more endpoints; extras are failover targets (HTTP only).
    pub endpoints: Vec<Endpoint>,

    // Buffer sizing
    pub init_buf_size: usize,
    pub max_buf_size: usize,
    pub max_name_len: usize,

    // Auto-flush policy (0 disables an individual threshold)
    pub auto_flush: bool,
    pub auto_flush_rows: usize,
    pub auto_flush_bytes: usize,
    pub auto_flush_interval: Duration,

    // Timeouts
    pub request_timeout: Duration,
    /// Bytes per second; extends the request timeout for large payloads.
    pub request_min_throughput: u64,
    /// Wall-clock budget for HTTP retries; zero disables retrying.
    pub retry_timeout: Duration,
    pub auth_timeout: Duration,
    /// Idle lifetime of the pooled HTTP connection.
    pub pool_timeout: Duration,

    // Credentials. HTTP: username+password (Basic) or token (Bearer).
    // TCP: username is the key id, token the signing key.
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    /// Public key x coordinate; accepted for compatibility, unused (the
    /// public key is derived from the private scalar).
    pub token_x: Option<String>,
    /// Public key y coordinate; accepted for compatibility, unused.
    pub token_y: Option<String>,

    // TLS
    pub tls_verify: bool,
    /// PEM file with additional root certificates.
    pub tls_roots: Option<std::path::PathBuf>,

    pub protocol_version: ProtocolVersion,
}

impl SenderOptions {
    /// Options for `protocol` with that protocol's defaults and a single
    /// endpoint.
    pub fn new(protocol: SenderProtocol, host: impl Into<String>, port: u16) -> Self {
        let mut opts = Self::defaults(protocol);
        opts.endpoints.push(Endpoint {
            host: host.into(),
            port,
        });
        opts
    }

    fn defaults(protocol: SenderProtocol) -> Self {
        SenderOptions {
            protocol,
            endpoints: Vec::new(),
            init_buf_size: 64 * 1024,
            max_buf_size: 100 * 1024 * 1024,
            max_name_len: 127,
            auto_flush: true,
            auto_flush_rows: if protocol.is_http() { 75_000 } else { 600 },
            auto_flush_bytes: 0,
            auto_flush_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
            request_min_throughput: 100 * 1024,
            retry_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(15),
            pool_timeout: Duration::from_secs(120),
            username: None,
            password: None,
            token: None,
            token_x: None,
            token_y: None,
            tls_verify: true,
            tls_roots: None,
            protocol_version: ProtocolVersion::Auto,
        }
    }

    /// Parse a configuration string, e.g.
    /// `"tcps::addr=db.example.com:9009;username=key1;token=5UjE...;"`.
    pub fn from_conf(conf: &str) -> Result<Self> {
        let (schema, rest) = conf.split_once("::").ok_or_else(|| {
            Error::ConfigError(
                "config string must start with a protocol, e.g. \"http::addr=host:port;\""
                    .to_string(),
            )
        })?;
        let protocol = SenderProtocol::from_schema(schema)?;
        let mut opts = Self::defaults(protocol);

        for pair in rest.split_terminator(';') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::ConfigError(format!("expected key=value, got {pair:?}"))
            })?;
            match key {
                "addr" => opts.parse_addr(value)?,
                "username" => opts.username = Some(value.to_string()),
                "password" => opts.password = Some(value.to_string()),
                "token" => opts.token = Some(value.to_string()),
                "token_x" => opts.token_x = Some(value.to_string()),
                "token_y" => opts.token_y = Some(value.to_string()),
                "auto_flush" => opts.auto_flush = parse_switch(key, value, "on", "off")?,
                "auto_flush_rows" => opts.auto_flush_rows = parse_count(key, value)?,
                "auto_flush_bytes" => opts.auto_flush_bytes = parse_count(key, value)?,
                "auto_flush_interval" => opts.auto_flush_interval = parse_millis(key, value)?,
                "init_buf_size" => opts.init_buf_size = parse_count(key, value)?,
                "max_buf_size" => opts.max_buf_size = parse_count(key, value)?,
                "max_name_len" => opts.max_name_len = parse_count(key, value)?,
                "request_timeout" => opts.request_timeout = parse_millis(key, value)?,
                "request_min_throughput" => {
                    opts.request_min_throughput = parse_count(key, value)? as u64
                }
                "retry_timeout" => opts.retry_timeout = parse_millis(key, value)?,
                "auth_timeout" => opts.auth_timeout = parse_millis(key, value)?,
                "pool_timeout" => opts.pool_timeout = parse_millis(key, value)?,
                "tls_verify" => {
                    opts.tls_verify = parse_switch(key, value, "on", "unsafe_off")?
                }
                "tls_roots" => opts.tls_roots = Some(value.into()),
                "protocol_version" => {
                    opts.protocol_version = match value {
                        "auto" => ProtocolVersion::Auto,
                        "1" => ProtocolVersion::V1,
                        "2" => ProtocolVersion::V2,
                        "3" => ProtocolVersion::V3,
                        other => {
                            return Err(Error::ConfigError(format!(
                                "invalid protocol_version {other:?}; expected auto, 1, 2 or 3"
                            )))
                        }
                    }
                }
                other => {
                    return Err(Error::ConfigError(format!(
                        "unknown configuration key {other:?}"
                    )))
                }
            }
        }

        opts.validate()?;
        Ok(opts)
    }

    fn parse_addr(&mut self, value: &str) -> Result<()> {
        for part in value.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::ConfigError("empty address in addr list".to_string()));
            }
            let (host, port) = match part.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse::<u16>().map_err(|_| {
                        Error::ConfigError(format!("invalid port in address {part:?}"))
                    })?;
                    (host, port)
                }
                None => (part, self.protocol.default_port()),
            };
            if host.is_empty() {
                return Err(Error::ConfigError(format!(
                    "empty host in address {part:?}"
                )));
            }
            self.endpoints.push(Endpoint {
                host: host.to_string(),
                port,
            });
        }
        Ok(())
    }

    /// Enforce the cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(Error::ConfigError(
                "at least one address is required (addr=host:port)".to_string(),
            ));
        }
        if self.init_buf_size == 0 {
            return Err(Error::ConfigError("init_buf_size must be > 0".to_string()));
        }
        if self.max_buf_size < self.init_buf_size {
            return Err(Error::ConfigError(
                "max_buf_size must be >= init_buf_size".to_string(),
            ));
        }
        if self.max_name_len == 0 {
            return Err(Error::ConfigError("max_name_len must be > 0".to_string()));
        }
        if self.username.is_some() != self.password.is_some() && self.protocol.is_http() {
            return Err(Error::ConfigError(
                "username and password must be specified together".to_string(),
            ));
        }
        if self.token.is_some() && self.password.is_some() {
            return Err(Error::ConfigError(
                "exactly one of username+password or token may be configured".to_string(),
            ));
        }
        if !self.protocol.is_http() {
            if self.password.is_some() {
                return Err(Error::ConfigError(
                    "TCP authenticates with username (key id) + token, not a password"
                        .to_string(),
                ));
            }
            if self.token.is_some() && self.username.is_none() {
                return Err(Error::ConfigError(
                    "TCP signing requires username (the key id) alongside token".to_string(),
                ));
            }
            if self.endpoints.len() > 1 {
                return Err(Error::HttpNotSupported(
                    "multiple addresses (failover) are only supported over HTTP".to_string(),
                ));
            }
        }
        if !self.protocol.is_tls() && (self.tls_roots.is_some() || !self.tls_verify) {
            return Err(Error::ConfigError(
                "TLS options require an https or tcps protocol".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_switch(key: &str, value: &str, on: &str, off: &str) -> Result<bool> {
    if value == on {
        Ok(true)
    } else if value == off {
        Ok(false)
    } else {
        Err(Error::ConfigError(format!(
            "invalid value {value:?} for {key}; expected {on} or {off}"
        )))
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    if value == "off" {
        return Ok(0);
    }
    value.parse::<usize>().map_err(|_| {
        Error::ConfigError(format!("invalid value {value:?} for {key}; expected an integer"))
    })
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    if value == "off" {
        return Ok(Duration::ZERO);
    }
    let millis = value.parse::<u64>().map_err(|_| {
        Error::ConfigError(format!(
            "invalid value {value:?} for {key}; expected milliseconds"
        ))
    })?;
    Ok(Duration::from_millis(millis))
}
