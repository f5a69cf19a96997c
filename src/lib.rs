// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # tswire - line-protocol ingestion client
//!
//! A client library for streaming rows into a time-series database over
//! its text line protocol. Rows are built fluently into a chunked
//! [`LineBuffer`] and shipped over HTTP (with retries, failover and
//! transactions) or TCP (with optional challenge-response authentication).
//!
//! ```text
//!  +--------------------------------------------------+
//!  |                     Sender                       |
//!  |  table/symbol/column_*/at   transaction/commit   |
//!  +-----------------+--------------------------------+
//!                    |
//!            +-------v-------+
//!            |  LineBuffer   |   chunked encoder, name
//!            |               |   validation, atomic rows
//!            +-------+-------+
//!                    |
//!         +----------+----------+
//!         |                     |
//!  +------v------+      +------v------+
//!  |    HTTP     |      |     TCP     |
//!  | retry/back- |      | auth hand-  |
//!  | off/failover|      | shake, TLS  |
//!  +-------------+      +-------------+
//! ```
//!
//! ## Quick start
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
//!         .at(TimestampNanos::now())?;
//!     sender.send()?;
//!     Ok(())
//! }
//! ```
//!
//! Configuration strings take the form
//! `<protocol>::<key>=<value>;<key>=<value>;...` where the protocol is one
//! of `http`, `https`, `tcp` or `tcps`; see [`SenderOptions::from_conf`]
//! for the full key set. Auto-flush is on by default for rows and
//! interval, so explicit [`Sender::send`] calls are only needed for final
//! drains and transaction-free fine control.
//!
//! Diagnostics go through the [`log`] facade; install any logger
//! implementation to see them.

pub mod addr;
pub mod buffer;
pub mod conf;
pub mod error;
pub mod name;
pub mod sender;
pub mod signing;
pub mod timestamp;

pub(crate) mod tls;

pub use addr::AddressProvider;
pub use buffer::LineBuffer;
pub use conf::{Endpoint, ProtocolVersion, SenderOptions, SenderProtocol};
pub use error::{Error, Result, ServerErrorBody};
pub use name::{validate_column_name, validate_table_name};
pub use sender::Sender;
pub use timestamp::{TimestampMicros, TimestampNanos};
