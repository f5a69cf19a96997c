// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The ingestion sender.
//!
//! [`Sender`] owns a [`LineBuffer`] and a transport, and exposes the fluent
//! row-building API:
//!
//! ```no_run
//! use tswire::{Sender, TimestampNanos};
//!
//! fn main() -> tswire::Result<()> {
//!     let mut sender = Sender::from_conf("http::addr=localhost:9000;")?;
//!     sender
//!         .table("weather")?
//!         .symbol("city", "London")?
//!         .column_f64("temp", 25.0)?
//!         .at_now()?;
//!     sender.send()?;
//!     Ok(())
//! }
//! ```
//!
//! Every row-finalizing call runs the auto-flush check: when the master
//! switch is on and any enabled threshold (row count, byte size, interval)
//! is crossed, the buffer is sent as part of that call. Inside an open
//! transaction auto-flush is suspended and `send` is reachable only through
//! [`Sender::commit`].
//!
//! A sender is a single logical session: neither the buffer nor the
//! transport is safe for concurrent row-building without external
//! synchronization.

mod http;
mod tcp;

use std::time::Instant;

use crate::buffer::LineBuffer;
use crate::conf::{ProtocolVersion, SenderOptions};
use crate::error::{Error, Result};
use crate::timestamp::{TimestampMicros, TimestampNanos};

use http::HttpTransport;
use tcp::TcpTransport;

enum Transport {
    Http(HttpTransport),
    Tcp(TcpTransport),
}

/// A connected ingestion client.
pub struct Sender {
    options: SenderOptions,
    buffer: LineBuffer,
    /// Lazily stamped on the first finished row, so interval auto-flush
    /// measures time since first write rather than since construction.
    last_flush: Option<Instant>,
    committing_transaction: bool,
    transport: Transport,
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("protocol", &self.options.protocol)
            .field("endpoint", &self.options.endpoints[0].to_string())
            .field("rows", &self.buffer.row_count())
            .finish()
    }
}

impl Sender {
    /// Connect using a configuration string, e.g.
    /// `"http::addr=localhost:9000;retry_timeout=5000;"`.
    pub fn from_conf(conf: &str) -> Result<Self> {
        Self::connect(SenderOptions::from_conf(conf)?)
    }

    /// Connect with explicit options.
    ///
    /// For HTTP this builds the pooled client and, when the protocol
    /// version is `Auto`, negotiates it against `/settings`. For TCP it
    /// opens the socket (TLS if configured) and runs the authentication
    /// handshake when a token is present.
    pub fn connect(options: SenderOptions) -> Result<Self> {
        options.validate()?;
        let (transport, version) = if options.protocol.is_http() {
            let mut transport = HttpTransport::new(&options)?;
            let version = transport.negotiate_version(&options)?;
            (Transport::Http(transport), version)
        } else {
            let transport = TcpTransport::connect(&options)?;
            let version = match options.protocol_version {
                ProtocolVersion::Auto => ProtocolVersion::V1,
                pinned => pinned,
            };
            (Transport::Tcp(transport), version)
        };
        let buffer = LineBuffer::new(
            options.init_buf_size,
            options.max_buf_size,
            options.max_name_len,
            version,
        );
        Ok(Sender {
            options,
            buffer,
            last_flush: None,
            committing_transaction: false,
            transport,
        })
    }

    // ========================================================================
    // Fluent row building (delegates to the buffer)
    // ========================================================================

    /// Start a row for `name`.
    pub fn table(&mut self, name: &str) -> Result<&mut Self> {
        self.buffer.table(name)?;
        Ok(self)
    }

    /// Append a symbol (tag) column.
    pub fn symbol(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        self.buffer.symbol(name, value)?;
        Ok(self)
    }

    /// Append a string field column.
    pub fn column_str(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        self.buffer.column_str(name, value)?;
        Ok(self)
    }

    /// Append a 64-bit integer field column.
    pub fn column_i64(&mut self, name: &str, value: i64) -> Result<&mut Self> {
        self.buffer.column_i64(name, value)?;
        Ok(self)
    }

    /// Append a boolean field column.
    pub fn column_bool(&mut self, name: &str, value: bool) -> Result<&mut Self> {
        self.buffer.column_bool(name, value)?;
        Ok(self)
    }

    /// Append a 64-bit float field column.
    pub fn column_f64(&mut self, name: &str, value: f64) -> Result<&mut Self> {
        self.buffer.column_f64(name, value)?;
        Ok(self)
    }

    /// Append a timestamp field column (microsecond resolution).
    pub fn column_ts(&mut self, name: &str, value: TimestampMicros) -> Result<&mut Self> {
        self.buffer.column_ts(name, value)?;
        Ok(self)
    }

    /// Finalize the row with a designated timestamp, then run the
    /// auto-flush check.
    pub fn at(&mut self, timestamp: TimestampNanos) -> Result<()> {
        self.buffer.at(timestamp)?;
        self.row_finished()
    }

    /// Finalize the row without a timestamp (the server assigns one), then
    /// run the auto-flush check.
    pub fn at_now(&mut self) -> Result<()> {
        self.buffer.at_now()?;
        self.row_finished()
    }

    /// Drop the partially built row, keeping committed rows.
    pub fn cancel_row(&mut self) {
        self.buffer.cancel_row();
    }

    // ========================================================================
    // Transactions (HTTP only)
    // ========================================================================

    /// Open a client-side transaction restricting all rows to `table_name`.
    pub fn transaction(&mut self, table_name: &str) -> Result<&mut Self> {
        if !self.options.protocol.is_http() {
            return Err(Error::InvalidApiCall(
                "the TCP sender does not support transactions".to_string(),
            ));
        }
        self.buffer.transaction_begin(table_name)?;
        Ok(self)
    }

    /// Send the transaction's rows in one flush and close the transaction.
    pub fn commit(&mut self) -> Result<()> {
        if !self.buffer.within_transaction() {
            return Err(Error::InvalidApiCall(
                "no transaction to commit".to_string(),
            ));
        }
        self.committing_transaction = true;
        let outcome = self.send();
        self.committing_transaction = false;
        outcome?;
        debug_assert!(!self.buffer.within_transaction());
        Ok(())
    }

    /// Discard the transaction's rows without sending.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.buffer.within_transaction() {
            return Err(Error::InvalidApiCall(
                "no transaction to roll back".to_string(),
            ));
        }
        self.buffer.clear();
        Ok(())
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Send all buffered rows to the server.
    ///
    /// No-op on an empty buffer. Rejected while a transaction is open
    /// (commit instead). The buffer is cleared after every terminal outcome,
    /// success or failure: callers must not assume failed payloads remain
    /// queued beyond the HTTP retry policy.
    pub fn send(&mut self) -> Result<()> {
        if self.buffer.within_transaction() && !self.committing_transaction {
            return Err(Error::InvalidApiCall(
                "cannot send while a transaction is open; commit or rollback first".to_string(),
            ));
        }
        if self.buffer.is_empty() {
            // A commit with zero rows still closes the transaction.
            if self.buffer.within_transaction() {
                self.buffer.clear();
            }
            return Ok(());
        }
        let result = match &mut self.transport {
            Transport::Http(transport) => transport.send_buffer(&self.buffer, &self.options),
            Transport::Tcp(transport) => transport.send_buffer(&self.buffer),
        };
        let is_tcp = matches!(self.transport, Transport::Tcp(_));
        self.buffer.clear();
        if result.is_ok() || is_tcp {
            self.last_flush = Some(Instant::now());
        }
        result
    }

    fn row_finished(&mut self) -> Result<()> {
        if self.last_flush.is_none() {
            self.last_flush = Some(Instant::now());
        }
        if self.buffer.within_transaction() || !self.options.auto_flush {
            return Ok(());
        }
        let rows = self.options.auto_flush_rows;
        let bytes = self.options.auto_flush_bytes;
        let interval = self.options.auto_flush_interval;
        let due = (rows > 0 && self.buffer.row_count() >= rows)
            || (bytes > 0 && self.buffer.len() >= bytes)
            || (!interval.is_zero()
                && self
                    .last_flush
                    .is_some_and(|t| t.elapsed() >= interval));
        if due {
            log::debug!(
                "auto-flush: {} rows, {} bytes buffered",
                self.buffer.row_count(),
                self.buffer.len()
            );
            self.send()
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Rows buffered and not yet sent.
    pub fn pending_rows(&self) -> usize {
        self.buffer.row_count()
    }

    /// Bytes buffered and not yet sent.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// True while a transaction is open.
    pub fn within_transaction(&self) -> bool {
        self.buffer.within_transaction()
    }

    /// The resolved line-protocol version for this session.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.buffer.version()
    }

    /// Release buffer chunks beyond the cursor after a burst.
    pub fn trim_excess_buffers(&mut self) {
        self.buffer.trim_excess_chunks();
    }
}
