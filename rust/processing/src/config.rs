// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parse configuration.

use crate::error::{Error, Result};
use cityjson_lite_core::TypeCodeTable;
use cityjson_lite_geometry::{Matrix4, Normalization};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default number of objects folded into one chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Parser configuration.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Maximum number of objects per emitted chunk.
    pub chunk_size: usize,
    /// Pre-seeded type-code table, keeps codes stable across loads.
    pub type_codes: Option<TypeCodeTable>,
    /// Externally supplied normalization; computed from the data if absent.
    pub normalization: Option<Normalization>,
    /// Transport queue bound; `None` for an unbounded channel.
    pub channel_capacity: Option<usize>,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            type_codes: None,
            normalization: None,
            channel_capacity: None,
        }
    }
}

impl ParseConfig {
    /// Load configuration from environment variables.
    ///
    /// `CITYJSON_CHUNK_SIZE` and `CITYJSON_CHANNEL_CAPACITY`; unset or
    /// unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            chunk_size: std::env::var("CITYJSON_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&size| size > 0)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            channel_capacity: std::env::var("CITYJSON_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&capacity| capacity > 0),
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_type_codes(mut self, table: TypeCodeTable) -> Self {
        self.type_codes = Some(table);
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = Some(normalization);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk size must be greater than zero"));
        }
        if self.channel_capacity == Some(0) {
            return Err(Error::config("channel capacity must be greater than zero"));
        }
        Ok(())
    }
}

/// Serialized option form, as accepted from a host application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    /// Type name → `0xRRGGBB`; map order is code order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_colors: Option<IndexMap<String, u32>>,
    /// 16 values, column-major
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalization_matrix: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
}

impl ParseOptions {
    pub fn into_config(self) -> Result<ParseConfig> {
        let mut config = ParseConfig::default();

        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(colors) = self.object_colors {
            config.type_codes = Some(TypeCodeTable::from_colors(colors));
        }
        if let Some(values) = self.normalization_matrix {
            if values.len() != 16 {
                return Err(Error::config(format!(
                    "normalization matrix needs 16 values, got {}",
                    values.len()
                )));
            }
            let matrix = Matrix4::from_column_slice(&values);
            let normalization = Normalization::from_matrix(&matrix).ok_or_else(|| {
                Error::config("normalization matrix must be a uniform scale plus translation")
            })?;
            config.normalization = Some(normalization);
        }
        config.channel_capacity = self.channel_capacity;

        config.validate()?;
        Ok(config)
    }
}
