// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP transport.
//!
//! Turns the buffer into a `POST /write` request and layers the resilience
//! policy on top:
//!
//! - per-request timeout scaled by payload size
//!   (`request_timeout + len / request_min_throughput`),
//! - retry of connection failures and the retriable status set with
//!   exponential backoff (5 ms doubling to a 1000 ms cap, ±5 ms jitter)
//!   under a `retry_timeout` wall clock,
//! - address rotation before each retry when failover targets exist,
//! - structured server error bodies surfaced as
//!   [`Error::ServerFlushError`].
//!
//! When the protocol version is `Auto`, construction negotiates it with a
//! `GET /settings` probe: 404 means a pre-negotiation server (V1), a JSON
//! body lists the supported versions, and anything else falls back to V1.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::addr::AddressProvider;
use crate::buffer::LineBuffer;
use crate::conf::{ProtocolVersion, SenderOptions};
use crate::error::{Error, Result, ServerErrorBody};

/// Timeout for the `/settings` negotiation probe.
const SETTINGS_TIMEOUT: Duration = Duration::from_secs(1);

const BACKOFF_START: Duration = Duration::from_millis(5);
const BACKOFF_CAP: Duration = Duration::from_millis(1000);
const JITTER_MILLIS: i64 = 5;

/// Statuses treated as transient server-side or routing conditions.
fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status.as_u16(),
        404 | 421 | 500 | 503 | 504 | 507 | 509 | 523 | 524 | 529 | 599
    )
}

#[derive(Debug, Default, Deserialize)]
struct SettingsConfig {
    #[serde(default)]
    line_proto_support_versions: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct SettingsResponse {
    #[serde(default)]
    config: SettingsConfig,
}

pub(crate) struct HttpTransport {
    client: Client,
    addrs: AddressProvider,
    scheme: &'static str,
    auth_header: Option<String>,
}

impl HttpTransport {
    pub(crate) fn new(options: &SenderOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(None::<Duration>)
            .pool_idle_timeout(options.pool_timeout)
            .pool_max_idle_per_host(1);

        if options.protocol.is_tls() {
            if !options.tls_verify {
                builder = builder.danger_accept_invalid_certs(true);
            }
            if let Some(ca_path) = &options.tls_roots {
                let pem = std::fs::read(ca_path).map_err(|err| {
                    Error::TlsError(format!(
                        "could not open certificate authority file {ca_path:?}: {err}"
                    ))
                })?;
                let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|err| {
                    Error::TlsError(format!(
                        "could not parse certificate authority file {ca_path:?}: {err}"
                    ))
                })?;
                for cert in certs {
                    builder = builder.add_root_certificate(cert);
                }
            }
        }

        let client = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("could not build HTTP client: {err}")))?;

        let auth_header = match (&options.username, &options.password, &options.token) {
            (Some(user), Some(pass), None) => Some(format!(
                "Basic {}",
                BASE64_STANDARD.encode(format!("{user}:{pass}"))
            )),
            (_, _, Some(token)) => Some(format!("Bearer {token}")),
            _ => None,
        };

        Ok(HttpTransport {
            client,
            addrs: AddressProvider::new(options.endpoints.clone())?,
            scheme: if options.protocol.is_tls() {
                "https"
            } else {
                "http"
            },
            auth_header,
        })
    }

    /// Resolve the line-protocol version, probing `/settings` when `Auto`.
    pub(crate) fn negotiate_version(
        &mut self,
        options: &SenderOptions,
    ) -> Result<ProtocolVersion> {
        let pinned = options.protocol_version;
        if pinned != ProtocolVersion::Auto {
            return Ok(pinned);
        }
        // A 404 here is a pre-negotiation server, not a transient routing
        // condition: terminal, selects V1.
        let outcome = self.execute_with_retry(
            options.retry_timeout,
            |status| is_retriable_status(status) && status != StatusCode::NOT_FOUND,
            |client, url| client.get(url).timeout(SETTINGS_TIMEOUT),
            "/settings",
        );
        let version = match outcome {
            Ok(response) if response.status().is_success() => {
                match response.json::<SettingsResponse>() {
                    Ok(settings) => settings
                        .config
                        .line_proto_support_versions
                        .iter()
                        .filter_map(|&n| ProtocolVersion::from_number(n))
                        .max()
                        .unwrap_or(ProtocolVersion::V1),
                    Err(err) => {
                        log::warn!("unparseable /settings response, assuming V1: {err}");
                        ProtocolVersion::V1
                    }
                }
            }
            Ok(_) | Err(_) => ProtocolVersion::V1,
        };
        log::debug!("negotiated line-protocol version {version:?}");
        Ok(version)
    }

    /// POST the buffer contents to `/write`, applying the retry policy.
    pub(crate) fn send_buffer(
        &mut self,
        buffer: &LineBuffer,
        options: &SenderOptions,
    ) -> Result<()> {
        // Retries re-send the body, so it is coalesced once and shared
        // across attempts instead of streamed from the chunks.
        let payload: Arc<[u8]> = buffer.to_vec().into();
        let payload_len = payload.len();
        let timeout = request_timeout(options, payload_len);
        let response = self.execute_with_retry(
            options.retry_timeout,
            is_retriable_status,
            |client, url| {
                let body = Body::sized(
                    io::Cursor::new(Arc::clone(&payload)),
                    payload_len as u64,
                );
                client
                    .post(url)
                    .timeout(timeout)
                    .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                    .body(body)
            },
            "/write",
        )?;
        if response.status().is_success() {
            log::debug!(
                "flushed {} rows ({} bytes) to {}",
                buffer.row_count(),
                payload.len(),
                self.addrs.current()
            );
            Ok(())
        } else {
            Err(parse_flush_error(response))
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.addrs.current(), path)
    }

    /// Issue a request, retrying connection failures and retriable statuses
    /// with backoff, jitter and address failover until `budget` elapses.
    ///
    /// `Ok` carries the final response whether or not it is a success
    /// status; `Err` means no response was ever obtained.
    fn execute_with_retry<R, F>(
        &mut self,
        budget: Duration,
        retriable: R,
        make: F,
        path: &str,
    ) -> Result<Response>
    where
        R: Fn(StatusCode) -> bool,
        F: Fn(&Client, String) -> RequestBuilder,
    {
        let deadline = Instant::now() + budget;
        let mut backoff = BACKOFF_START;
        let mut outcome = self.issue(&make, path);
        loop {
            let retry_worthy = match &outcome {
                Ok(response) => retriable(response.status()),
                Err(_) => true,
            };
            if !retry_worthy || budget.is_zero() || Instant::now() >= deadline {
                break;
            }
            let jitter = fastrand::i64(-JITTER_MILLIS..=JITTER_MILLIS);
            let delay_ms = (backoff.as_millis() as i64 + jitter).max(0) as u64;
            thread::sleep(Duration::from_millis(delay_ms));
            backoff = (backoff * 2).min(BACKOFF_CAP);
            if self.addrs.has_multiple() {
                self.addrs.rotate_to_next();
                log::debug!("failing over to {}", self.addrs.current());
            }
            match &outcome {
                Ok(response) => log::debug!(
                    "retrying {path} after status {}",
                    response.status()
                ),
                Err(err) => log::debug!("retrying {path} after connection error: {err}"),
            }
            outcome = self.issue(&make, path);
        }
        outcome.map_err(|err| {
            Error::SocketError(format!(
                "cannot connect to {}: {err}",
                self.addrs.current()
            ))
        })
    }

    fn issue<F>(
        &self,
        make: &F,
        path: &str,
    ) -> std::result::Result<Response, reqwest::Error>
    where
        F: Fn(&Client, String) -> RequestBuilder,
    {
        let mut request = make(&self.client, self.url(path));
        if let Some(auth) = &self.auth_header {
            request = request.header(AUTHORIZATION, auth);
        }
        request.send()
    }
}

/// `request_timeout` plus one extra second per `request_min_throughput`
/// bytes of payload, so large flushes get proportionally more time.
fn request_timeout(options: &SenderOptions, payload_len: usize) -> Duration {
    let mut timeout = options.request_timeout;
    if options.request_min_throughput > 0 {
        timeout += Duration::from_secs_f64(
            payload_len as f64 / options.request_min_throughput as f64,
        );
    }
    timeout
}

fn parse_flush_error(response: Response) -> Error {
    let status = response.status();
    let text = response.text().unwrap_or_default();
    match serde_json::from_str::<ServerErrorBody>(&text) {
        Ok(body) => {
            let message = body
                .message
                .clone()
                .unwrap_or_else(|| format!("HTTP status {status}"));
            Error::ServerFlushError {
                message,
                server: Some(body),
            }
        }
        Err(_) => Error::ServerFlushError {
            message: format!("HTTP status {status}: {text}"),
            server: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::SenderProtocol;

    #[test]
    fn test_retriable_status_set() {
        for code in [404u16, 421, 500, 503, 504, 507, 509, 523, 524, 529, 599] {
            assert!(
                is_retriable_status(StatusCode::from_u16(code).unwrap()),
                "{code}"
            );
        }
        for code in [200u16, 204, 400, 401, 403, 422, 501] {
            assert!(
                !is_retriable_status(StatusCode::from_u16(code).unwrap()),
                "{code}"
            );
        }
    }

    #[test]
    fn test_request_timeout_scales_with_payload() {
        let mut opts = SenderOptions::new(SenderProtocol::Http, "localhost", 9000);
        opts.request_timeout = Duration::from_secs(10);
        opts.request_min_throughput = 1024;
        assert_eq!(request_timeout(&opts, 0), Duration::from_secs(10));
        assert_eq!(request_timeout(&opts, 10 * 1024), Duration::from_secs(20));

        opts.request_min_throughput = 0;
        assert_eq!(
            request_timeout(&opts, 1 << 30),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_settings_response_shape() {
        let parsed: SettingsResponse = serde_json::from_str(
            r#"{"config":{"line_proto_support_versions":[1,2,3,4]}}"#,
        )
        .unwrap();
        let best = parsed
            .config
            .line_proto_support_versions
            .iter()
            .filter_map(|&n| ProtocolVersion::from_number(n))
            .max();
        assert_eq!(best, Some(ProtocolVersion::V3));

        let empty: SettingsResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(empty.config.line_proto_support_versions.is_empty());
    }
}
