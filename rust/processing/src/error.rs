// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the processing pipeline.

use crate::transport::ParseFailure;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error types.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport channel closed")]
    ChannelClosed,

    #[error("Parse cancelled")]
    Cancelled,

    #[error("Parse failed: {0}")]
    Failed(#[from] ParseFailure),

    #[error("No async runtime available for the parse worker")]
    NoRuntime,

    #[error("Document error: {0}")]
    Document(#[from] cityjson_lite_core::Error),
}

impl Error {
    /// Create an invalid configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }
}
