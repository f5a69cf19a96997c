// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Chunked line-protocol buffer.
//!
//! [`LineBuffer`] renders rows of the ingestion wire format into a growable
//! sequence of fixed-size chunks:
//!
//! ```text
//! table_name[,symbol=value...][ field=value[,field=value...]][ timestamp]\n
//! ```
//!
//! Chunks are allocated on demand and reused across [`LineBuffer::clear`]
//! calls, so a sender reaches a steady state with no per-row allocation.
//! [`LineBuffer::trim_excess_chunks`] releases chunks past the cursor after
//! a burst.
//!
//! The buffer tracks three layers of state:
//!
//! - the cursor (current chunk + valid length per chunk),
//! - the open row (row-start cursor, `has_table`, symbol/field ordering),
//! - the transaction (single-table batching for the HTTP transport).
//!
//! Every mutating call is fail-fast: on error nothing written by the failed
//! call remains in the buffer.

use std::io;

use crate::conf::ProtocolVersion;
use crate::error::{Error, Result};
use crate::name;
use crate::timestamp::{TimestampMicros, TimestampNanos};

/// One fixed-size slab of buffered bytes.
#[derive(Debug)]
struct Chunk {
    bytes: Vec<u8>,
    len: usize,
}

impl Chunk {
    fn new(size: usize) -> Self {
        Chunk {
            bytes: vec![0u8; size],
            len: 0,
        }
    }
}

/// Cursor snapshot used to roll back partial writes.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    chunk: usize,
    offset: usize,
    len: usize,
}

/// Append-only chunked buffer producing the line wire format.
#[derive(Debug)]
pub struct LineBuffer {
    chunks: Vec<Chunk>,
    chunk_size: usize,
    max_size: usize,
    max_name_len: usize,
    chunk_index: usize,
    /// Total valid bytes across all chunks up to the cursor.
    len: usize,
    /// Finalized rows since the last clear.
    row_count: usize,
    within_transaction: bool,
    transaction_table: Option<String>,
    line_start: Cursor,
    has_table: bool,
    no_fields: bool,
    no_symbols: bool,
    version: ProtocolVersion,
}

impl LineBuffer {
    /// Create a buffer with the given chunk size and total byte cap.
    ///
    /// `version` is the resolved line-protocol version; it selects the value
    /// encoding variant (all currently textual) and is reported to callers.
    pub fn new(
        chunk_size: usize,
        max_size: usize,
        max_name_len: usize,
        version: ProtocolVersion,
    ) -> Self {
        let chunk_size = chunk_size.max(64);
        LineBuffer {
            chunks: vec![Chunk::new(chunk_size)],
            chunk_size,
            max_size,
            max_name_len,
            chunk_index: 0,
            len: 0,
            row_count: 0,
            within_transaction: false,
            transaction_table: None,
            line_start: Cursor {
                chunk: 0,
                offset: 0,
                len: 0,
            },
            has_table: false,
            no_fields: true,
            no_symbols: true,
            version,
        }
    }

    // ========================================================================
    // Row building
    // ========================================================================

    /// Start a new row for `name`.
    ///
    /// Records the row-start cursor so a partially built row can be dropped
    /// with [`LineBuffer::cancel_row`]. Inside a transaction the name must
    /// match the transaction's table.
    pub fn table(&mut self, name: &str) -> Result<&mut Self> {
        if self.has_table {
            return Err(Error::InvalidApiCall(
                "table already specified for the open row; finish it with `at` or `at_now` first"
                    .to_string(),
            ));
        }
        self.check_name_len(name)?;
        name::validate_table_name(name)?;
        if self.within_transaction {
            let expected = self.transaction_table.as_deref().unwrap_or_default();
            if name != expected {
                return Err(Error::InvalidApiCall(format!(
                    "table {name:?} does not match transaction table {expected:?}"
                )));
            }
        }
        self.line_start = self.cursor();
        self.write_bytes(name.as_bytes())?;
        self.has_table = true;
        Ok(self)
    }

    /// Enter transaction mode for `table_name`.
    ///
    /// Writes no bytes; it only pins the table every subsequent row must
    /// use. The buffer must be empty.
    pub fn transaction_begin(&mut self, table_name: &str) -> Result<&mut Self> {
        if self.within_transaction {
            return Err(Error::InvalidApiCall(
                "already within a transaction".to_string(),
            ));
        }
        if self.len != 0 || self.has_table {
            return Err(Error::InvalidApiCall(
                "a transaction must start with an empty buffer".to_string(),
            ));
        }
        self.check_name_len(table_name)?;
        name::validate_table_name(table_name)?;
        self.within_transaction = true;
        self.transaction_table = Some(table_name.to_string());
        Ok(self)
    }

    /// Append a symbol (tag) column. Symbols must precede field columns.
    pub fn symbol(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        if !self.has_table {
            return Err(Error::InvalidApiCall(
                "symbol must be preceded by a call to `table`".to_string(),
            ));
        }
        if !self.no_fields {
            return Err(Error::InvalidApiCall(
                "symbols must be written before any field column".to_string(),
            ));
        }
        self.check_name_len(name)?;
        name::validate_column_name(name)?;
        let snap = self.cursor();
        let outcome = self.write_symbol_body(name, value);
        self.fail_atomically(outcome, snap)?;
        self.no_symbols = false;
        Ok(self)
    }

    fn write_symbol_body(&mut self, name: &str, value: &str) -> Result<()> {
        self.write_bytes(b",")?;
        self.write_bytes(name.as_bytes())?;
        self.write_bytes(b"=")?;
        self.write_escaped_unquoted(value)
    }

    /// Append a string field column (quoted and escaped).
    pub fn column_str(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        let snap = self.column_key_checked(name)?;
        let outcome = self.write_escaped_quoted(value);
        self.fail_atomically(outcome, snap)?;
        self.no_fields = false;
        Ok(self)
    }

    /// Append a 64-bit integer field column (`i` suffix).
    ///
    /// `i64::MIN` is the server's null sentinel and has no wire
    /// representation; it is rejected.
    pub fn column_i64(&mut self, name: &str, value: i64) -> Result<&mut Self> {
        if value == i64::MIN {
            return Err(Error::InvalidApiCall(format!(
                "column {name:?}: {} is an unrepresentable sentinel value",
                i64::MIN
            )));
        }
        let snap = self.column_key_checked(name)?;
        let mut text = value.to_string();
        text.push('i');
        let outcome = self.write_bytes(text.as_bytes());
        self.fail_atomically(outcome, snap)?;
        self.no_fields = false;
        Ok(self)
    }

    /// Append a boolean field column (`t`/`f`).
    pub fn column_bool(&mut self, name: &str, value: bool) -> Result<&mut Self> {
        let snap = self.column_key_checked(name)?;
        let outcome = self.write_bytes(if value { b"t" } else { b"f" });
        self.fail_atomically(outcome, snap)?;
        self.no_fields = false;
        Ok(self)
    }

    /// Append a 64-bit float field column.
    ///
    /// Rendered culture-invariantly in decimal or scientific notation;
    /// non-finite values are spelled `NaN`, `Infinity`, `-Infinity`.
    pub fn column_f64(&mut self, name: &str, value: f64) -> Result<&mut Self> {
        let snap = self.column_key_checked(name)?;
        let text = if value.is_nan() {
            "NaN".to_string()
        } else if value == f64::INFINITY {
            "Infinity".to_string()
        } else if value == f64::NEG_INFINITY {
            "-Infinity".to_string()
        } else {
            format!("{value:?}")
        };
        let outcome = self.write_bytes(text.as_bytes());
        self.fail_atomically(outcome, snap)?;
        self.no_fields = false;
        Ok(self)
    }

    /// Append a timestamp field column (microseconds, `t` suffix).
    pub fn column_ts(&mut self, name: &str, value: TimestampMicros) -> Result<&mut Self> {
        let snap = self.column_key_checked(name)?;
        let mut text = value.as_i64().to_string();
        text.push('t');
        let outcome = self.write_bytes(text.as_bytes());
        self.fail_atomically(outcome, snap)?;
        self.no_fields = false;
        Ok(self)
    }

    /// Finalize the open row with a designated timestamp (nanoseconds).
    pub fn at(&mut self, timestamp: TimestampNanos) -> Result<()> {
        self.check_can_finish()?;
        let snap = self.cursor();
        let mut text = String::with_capacity(21);
        text.push(' ');
        text.push_str(&timestamp.as_i64().to_string());
        text.push('\n');
        let outcome = self.write_bytes(text.as_bytes());
        self.fail_atomically(outcome, snap)?;
        self.finish_line();
        Ok(())
    }

    /// Finalize the open row without a timestamp; the server assigns one.
    pub fn at_now(&mut self) -> Result<()> {
        self.check_can_finish()?;
        self.write_bytes(b"\n")?;
        self.finish_line();
        Ok(())
    }

    fn check_can_finish(&self) -> Result<()> {
        if !self.has_table {
            return Err(Error::InvalidApiCall(
                "row finalization must be preceded by a call to `table`".to_string(),
            ));
        }
        if self.no_fields && self.no_symbols {
            return Err(Error::InvalidApiCall(
                "rows must contain at least one symbol or column".to_string(),
            ));
        }
        Ok(())
    }

    fn finish_line(&mut self) {
        self.row_count += 1;
        self.has_table = false;
        self.no_fields = true;
        self.no_symbols = true;
    }

    /// Discard everything written since the open row's `table` call.
    ///
    /// Previously committed rows are untouched. No-op when no row is open.
    pub fn cancel_row(&mut self) {
        if !self.has_table {
            return;
        }
        self.restore(self.line_start);
        self.has_table = false;
        self.no_fields = true;
        self.no_symbols = true;
    }

    /// Reset the buffer to its initial state. Chunk storage is kept for
    /// reuse; call [`LineBuffer::trim_excess_chunks`] to free it.
    pub fn clear(&mut self) {
        for chunk in &mut self.chunks {
            chunk.len = 0;
        }
        self.chunk_index = 0;
        self.len = 0;
        self.row_count = 0;
        self.within_transaction = false;
        self.transaction_table = None;
        self.line_start = Cursor {
            chunk: 0,
            offset: 0,
            len: 0,
        };
        self.has_table = false;
        self.no_fields = true;
        self.no_symbols = true;
    }

    /// Free chunks beyond the cursor, shrinking memory after a burst.
    pub fn trim_excess_chunks(&mut self) {
        self.chunks.truncate(self.chunk_index + 1);
        self.chunks.shrink_to_fit();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of finalized rows since the last clear.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Total valid bytes buffered.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True while a transaction is open.
    pub fn within_transaction(&self) -> bool {
        self.within_transaction
    }

    /// Table pinned by the open transaction, if any.
    pub fn transaction_table(&self) -> Option<&str> {
        self.transaction_table.as_deref()
    }

    /// Resolved line-protocol version this buffer encodes for.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    #[cfg(test)]
    fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Stream the valid contents, chunk by chunk, into `out`.
    ///
    /// Used by both transports and by the authentication handshake; never
    /// coalesces chunks into one allocation.
    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        for chunk in &self.chunks[..=self.chunk_index] {
            if chunk.len > 0 {
                out.write_all(&chunk.bytes[..chunk.len])?;
            }
        }
        Ok(())
    }

    /// Copy the valid contents into a single `Vec`. The HTTP transport uses
    /// this for request bodies that may be re-sent on retry.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for chunk in &self.chunks[..=self.chunk_index] {
            out.extend_from_slice(&chunk.bytes[..chunk.len]);
        }
        out
    }

    // ========================================================================
    // Cursor and raw writes
    // ========================================================================

    fn cursor(&self) -> Cursor {
        Cursor {
            chunk: self.chunk_index,
            offset: self.chunks[self.chunk_index].len,
            len: self.len,
        }
    }

    fn restore(&mut self, snap: Cursor) {
        for chunk in &mut self.chunks[snap.chunk + 1..] {
            chunk.len = 0;
        }
        self.chunks[snap.chunk].len = snap.offset;
        self.chunk_index = snap.chunk;
        self.len = snap.len;
    }

    fn fail_atomically(&mut self, outcome: Result<()>, snap: Cursor) -> Result<()> {
        if outcome.is_err() {
            self.restore(snap);
        }
        outcome
    }

    fn column_key_checked(&mut self, name: &str) -> Result<Cursor> {
        if !self.has_table {
            return Err(Error::InvalidApiCall(
                "column must be preceded by a call to `table`".to_string(),
            ));
        }
        self.check_name_len(name)?;
        name::validate_column_name(name)?;
        let snap = self.cursor();
        let sep: &[u8] = if self.no_fields { b" " } else { b"," };
        let outcome = (|| {
            self.write_bytes(sep)?;
            self.write_bytes(name.as_bytes())?;
            self.write_bytes(b"=")
        })();
        self.fail_atomically(outcome, snap)?;
        Ok(snap)
    }

    fn check_name_len(&self, name: &str) -> Result<()> {
        if name.len() > self.max_name_len {
            return Err(Error::InvalidName(format!(
                "name {name:?} is {} bytes long, exceeding the maximum of {}",
                name.len(),
                self.max_name_len
            )));
        }
        Ok(())
    }

    /// Append raw bytes, advancing into (and allocating) further chunks as
    /// the current one fills. Fails without writing when the total cap would
    /// be exceeded.
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if self.len + data.len() > self.max_size {
            return Err(Error::InvalidApiCall(format!(
                "buffer of {} bytes cannot grow by {}: maximum size is {}",
                self.len,
                data.len(),
                self.max_size
            )));
        }
        let mut rest = data;
        while !rest.is_empty() {
            if self.chunks[self.chunk_index].len == self.chunk_size {
                self.chunk_index += 1;
                if self.chunk_index == self.chunks.len() {
                    self.chunks.push(Chunk::new(self.chunk_size));
                }
            }
            let chunk = &mut self.chunks[self.chunk_index];
            let take = (self.chunk_size - chunk.len).min(rest.len());
            chunk.bytes[chunk.len..chunk.len + take].copy_from_slice(&rest[..take]);
            chunk.len += take;
            self.len += take;
            rest = &rest[take..];
        }
        Ok(())
    }

    /// Escape for unquoted contexts (symbol values): space, comma, equals,
    /// backslash, CR and LF each get a leading backslash. CR/LF stay
    /// literal after the backslash rather than becoming escape codes.
    fn write_escaped_unquoted(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        let mut start = 0;
        for (i, &b) in bytes.iter().enumerate() {
            if matches!(b, b' ' | b',' | b'=' | b'\\' | b'\r' | b'\n') {
                self.write_bytes(&bytes[start..i])?;
                self.write_bytes(&[b'\\', b])?;
                start = i + 1;
            }
        }
        self.write_bytes(&bytes[start..])
    }

    /// Escape for quoted contexts (string column values): only `"`, `\`,
    /// CR and LF, wrapped in double quotes.
    fn write_escaped_quoted(&mut self, s: &str) -> Result<()> {
        self.write_bytes(b"\"")?;
        let bytes = s.as_bytes();
        let mut start = 0;
        for (i, &b) in bytes.iter().enumerate() {
            if matches!(b, b'"' | b'\\' | b'\r' | b'\n') {
                self.write_bytes(&bytes[start..i])?;
                self.write_bytes(&[b'\\', b])?;
                start = i + 1;
            }
        }
        self.write_bytes(&bytes[start..])?;
        self.write_bytes(b"\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf() -> LineBuffer {
        LineBuffer::new(64, 1 << 20, 127, ProtocolVersion::V2)
    }

    fn contents(buffer: &LineBuffer) -> String {
        let mut out = Vec::new();
        buffer.write_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_example_row() {
        let mut b = buf();
        b.table("weather")
            .unwrap()
            .symbol("city", "London")
            .unwrap()
            .column_f64("temp", 25.0)
            .unwrap();
        b.at_now().unwrap();
        assert_eq!(contents(&b), "weather,city=London temp=25.0\n");
        assert_eq!(b.row_count(), 1);
    }

    #[test]
    fn test_all_column_types() {
        let mut b = buf();
        b.table("t")
            .unwrap()
            .column_str("s", "v")
            .unwrap()
            .column_i64("i", -42)
            .unwrap()
            .column_bool("b", true)
            .unwrap()
            .column_f64("f", 1.5e300)
            .unwrap()
            .column_ts("ts", TimestampMicros::new(1_700_000_000_000_000))
            .unwrap();
        b.at(TimestampNanos::new(1_700_000_000_000_000_123)).unwrap();
        assert_eq!(
            contents(&b),
            "t s=\"v\",i=-42i,b=t,f=1.5e300,ts=1700000000000000t 1700000000000000123\n"
        );
    }

    #[test]
    fn test_non_finite_floats() {
        let mut b = buf();
        b.table("t")
            .unwrap()
            .column_f64("nan", f64::NAN)
            .unwrap()
            .column_f64("pos", f64::INFINITY)
            .unwrap()
            .column_f64("neg", f64::NEG_INFINITY)
            .unwrap();
        b.at_now().unwrap();
        assert_eq!(contents(&b), "t nan=NaN,pos=Infinity,neg=-Infinity\n");
    }

    #[test]
    fn test_symbol_value_unquoted_escaping() {
        let mut b = buf();
        b.table("t")
            .unwrap()
            .symbol("tag", "a b,c=d\\e")
            .unwrap()
            .column_i64("n", 1)
            .unwrap();
        b.at_now().unwrap();
        assert_eq!(contents(&b), "t,tag=a\\ b\\,c\\=d\\\\e n=1i\n");
    }

    #[test]
    fn test_quoted_escaping_round_trip() {
        let original = "say \"hi\"\nback\\slash\rdone";
        let mut b = buf();
        b.table("t").unwrap().column_str("msg", original).unwrap();
        b.at_now().unwrap();
        let line = contents(&b);
        let quoted = line
            .strip_prefix("t msg=\"")
            .and_then(|s| s.strip_suffix("\"\n"))
            .unwrap();
        // Unescape per the quoted rule.
        let mut recovered = String::new();
        let mut escaped = false;
        for c in quoted.chars() {
            if escaped {
                recovered.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else {
                recovered.push(c);
            }
        }
        assert_eq!(recovered, original);
    }

    #[test]
    fn test_symbol_after_field_rejected() {
        let mut b = buf();
        b.table("t").unwrap().column_i64("n", 1).unwrap();
        let err = b.symbol("tag", "v").unwrap_err();
        assert!(matches!(err, Error::InvalidApiCall(_)));
    }

    #[test]
    fn test_table_twice_rejected() {
        let mut b = buf();
        b.table("t").unwrap();
        assert!(matches!(b.table("u"), Err(Error::InvalidApiCall(_))));
    }

    #[test]
    fn test_column_without_table_rejected() {
        let mut b = buf();
        assert!(matches!(
            b.column_i64("n", 1),
            Err(Error::InvalidApiCall(_))
        ));
        assert!(matches!(b.symbol("s", "v"), Err(Error::InvalidApiCall(_))));
        assert!(matches!(b.at_now(), Err(Error::InvalidApiCall(_))));
    }

    #[test]
    fn test_empty_row_rejected() {
        let mut b = buf();
        b.table("t").unwrap();
        assert!(matches!(b.at_now(), Err(Error::InvalidApiCall(_))));
        assert!(matches!(
            b.at(TimestampNanos::new(1)),
            Err(Error::InvalidApiCall(_))
        ));
    }

    #[test]
    fn test_i64_min_rejected() {
        let mut b = buf();
        b.table("t").unwrap();
        let before = b.len();
        assert!(matches!(
            b.column_i64("n", i64::MIN),
            Err(Error::InvalidApiCall(_))
        ));
        assert_eq!(b.len(), before);
    }

    #[test]
    fn test_cancel_row_restores_state() {
        let mut b = buf();
        b.table("first").unwrap().column_i64("n", 1).unwrap();
        b.at_now().unwrap();
        let len = b.len();
        let rows = b.row_count();

        b.table("second")
            .unwrap()
            .symbol("tag", "value")
            .unwrap()
            .column_str("s", "some longer text that spans chunk boundaries surely")
            .unwrap();
        b.cancel_row();

        assert_eq!(b.len(), len);
        assert_eq!(b.row_count(), rows);
        assert_eq!(contents(&b), "first n=1i\n");

        // The buffer is reusable after a cancel.
        b.table("third").unwrap().column_i64("n", 3).unwrap();
        b.at_now().unwrap();
        assert_eq!(contents(&b), "first n=1i\nthird n=3i\n");
    }

    #[test]
    fn test_cancel_row_without_open_row_is_noop() {
        let mut b = buf();
        b.table("t").unwrap().column_i64("n", 1).unwrap();
        b.at_now().unwrap();
        let len = b.len();
        b.cancel_row();
        assert_eq!(b.len(), len);
        assert_eq!(b.row_count(), 1);
    }

    #[test]
    fn test_chunk_growth_and_trim() {
        let mut b = LineBuffer::new(64, 1 << 20, 127, ProtocolVersion::V1);
        for i in 0..20 {
            b.table("t").unwrap().column_i64("value", i).unwrap();
            b.at_now().unwrap();
        }
        assert!(b.chunk_count() > 1);
        let expected: String = (0..20).map(|i| format!("t value={i}i\n")).collect();
        assert_eq!(contents(&b), expected);

        let grown = b.chunk_count();
        b.clear();
        assert_eq!(b.chunk_count(), grown); // storage reused
        assert_eq!(b.len(), 0);
        assert_eq!(b.row_count(), 0);
        b.trim_excess_chunks();
        assert_eq!(b.chunk_count(), 1);

        // Still writable after the trim.
        b.table("t").unwrap().column_bool("ok", true).unwrap();
        b.at_now().unwrap();
        assert_eq!(contents(&b), "t ok=t\n");
    }

    #[test]
    fn test_max_size_overflow_is_atomic() {
        let mut b = LineBuffer::new(64, 96, 127, ProtocolVersion::V1);
        b.table("t").unwrap().column_i64("n", 1).unwrap();
        b.at_now().unwrap();
        let len = b.len();
        b.table("t").unwrap();
        let err = b
            .column_str("big", &"x".repeat(200))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidApiCall(_)));
        b.cancel_row();
        assert_eq!(b.len(), len);
        assert_eq!(contents(&b), "t n=1i\n");
    }

    #[test]
    fn test_name_length_cap() {
        let mut b = LineBuffer::new(64, 1 << 20, 8, ProtocolVersion::V1);
        assert!(matches!(
            b.table("much_too_long_name"),
            Err(Error::InvalidName(_))
        ));
        b.table("ok").unwrap();
        assert!(matches!(
            b.column_i64("much_too_long_name", 1),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn test_transaction_pins_table() {
        let mut b = buf();
        b.transaction_begin("trades").unwrap();
        assert!(b.within_transaction());
        assert_eq!(b.transaction_table(), Some("trades"));

        b.table("trades").unwrap().column_i64("qty", 10).unwrap();
        b.at_now().unwrap();

        let err = b.table("other").unwrap_err();
        assert!(matches!(err, Error::InvalidApiCall(_)));

        // Row building continues after the rejected call.
        b.table("trades").unwrap().column_i64("qty", 20).unwrap();
        b.at_now().unwrap();
        assert_eq!(contents(&b), "trades qty=10i\ntrades qty=20i\n");
    }

    #[test]
    fn test_transaction_requires_empty_buffer() {
        let mut b = buf();
        b.table("t").unwrap().column_i64("n", 1).unwrap();
        b.at_now().unwrap();
        assert!(matches!(
            b.transaction_begin("t"),
            Err(Error::InvalidApiCall(_))
        ));
    }

    #[test]
    fn test_nested_transaction_rejected() {
        let mut b = buf();
        b.transaction_begin("t").unwrap();
        assert!(matches!(
            b.transaction_begin("t"),
            Err(Error::InvalidApiCall(_))
        ));
    }

    #[test]
    fn test_clear_resets_transaction() {
        let mut b = buf();
        b.transaction_begin("t").unwrap();
        b.clear();
        assert!(!b.within_transaction());
        assert_eq!(b.transaction_table(), None);
    }

    #[test]
    fn test_at_renders_nanoseconds() {
        let mut b = buf();
        b.table("t").unwrap().column_i64("n", 1).unwrap();
        b.at(TimestampNanos::new(42)).unwrap();
        assert_eq!(contents(&b), "t n=1i 42\n");
    }

    #[test]
    fn test_to_vec_matches_write_to() {
        let mut b = LineBuffer::new(64, 1 << 20, 127, ProtocolVersion::V3);
        for i in 0..50 {
            b.table("m").unwrap().column_i64("v", i).unwrap();
            b.at_now().unwrap();
        }
        let mut streamed = Vec::new();
        b.write_to(&mut streamed).unwrap();
        assert_eq!(b.to_vec(), streamed);
        assert_eq!(streamed.len(), b.len());
    }
}
