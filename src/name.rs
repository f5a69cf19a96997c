// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Table and column name validation.
//!
//! Names are written to the wire unescaped, so anything that could corrupt
//! the line format is rejected up front instead of escaped. Both name kinds
//! share one forbidden-character class; they differ only in dot handling
//! (tables allow interior dots for namespacing) and in the extra `-` ban on
//! column names.

use crate::error::{Error, Result};

/// Characters rejected in every name position, for tables and columns alike.
fn is_forbidden(c: char) -> bool {
    matches!(
        c,
        '?' | ',' | '\'' | '"' | '\\' | '/' | ':' | ')' | '(' | '+' | '*' | '%' | '~'
    ) || c <= '\u{1f}'
        || c == '\u{feff}'
}

fn bad_char(name: &str, c: char, index: usize) -> Error {
    let shown = if c == '\u{feff}' {
        "UTF-8 BOM".to_string()
    } else {
        format!("{c:?}")
    };
    Error::InvalidName(format!(
        "bad string {name:?}: name contains forbidden character {shown} at byte position {index}"
    ))
}

/// Validate a table name.
///
/// A `.` is permitted only in the interior of the name and never directly
/// after another `.`.
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName(
            "table names must have a non-zero length".to_string(),
        ));
    }
    let last = name.len() - name.chars().next_back().map_or(0, char::len_utf8);
    let mut prev_dot = false;
    for (index, c) in name.char_indices() {
        if c == '.' {
            if index == 0 || index == last || prev_dot {
                return Err(Error::InvalidName(format!(
                    "bad string {name:?}: misplaced '.' at byte position {index}"
                )));
            }
            prev_dot = true;
            continue;
        }
        prev_dot = false;
        if is_forbidden(c) {
            return Err(bad_char(name, c, index));
        }
    }
    Ok(())
}

/// Validate a column (or symbol) name.
///
/// Column names additionally forbid `.` and `-`. Early versions of the
/// wire encoder accepted `-`; the validator settled on rejecting it and
/// that is the behavior implemented here.
pub fn validate_column_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName(
            "column names must have a non-zero length".to_string(),
        ));
    }
    for (index, c) in name.char_indices() {
        if c == '.' || c == '-' || is_forbidden(c) {
            return Err(bad_char(name, c, index));
        }
    }
    Ok(())
}
