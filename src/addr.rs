// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server endpoint rotation.
//!
//! [`AddressProvider`] holds the ordered endpoint list from the
//! configuration and rotates through it round-robin when the HTTP transport
//! fails over. It performs no network access itself.

use crate::conf::Endpoint;
use crate::error::{Error, Result};

/// Ordered, non-empty list of server endpoints with a rotation cursor.
#[derive(Debug, Clone)]
pub struct AddressProvider {
    endpoints: Vec<Endpoint>,
    index: usize,
}

impl AddressProvider {
    /// Build from the configured endpoints; an empty list is a config error.
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::ConfigError(
                "at least one server address is required".to_string(),
            ));
        }
        Ok(AddressProvider {
            endpoints,
            index: 0,
        })
    }

    /// The endpoint requests currently target.
    pub fn current(&self) -> &Endpoint {
        &self.endpoints[self.index]
    }

    /// Advance to the next endpoint, wrapping around.
    pub fn rotate_to_next(&mut self) {
        self.index = (self.index + 1) % self.endpoints.len();
    }

    /// True when failover between addresses is meaningful.
    pub fn has_multiple(&self) -> bool {
        self.endpoints.len() > 1
    }
}
