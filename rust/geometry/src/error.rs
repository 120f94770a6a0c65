// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry processing
#[derive(Error, Debug)]
pub enum Error {
    #[error("Triangulation failed: {0}")]
    TriangulationError(String),

    #[error("Invalid boundaries: {0}")]
    InvalidBoundaries(String),

    #[error("Vertex index {index} out of range (vertex pool has {len} vertices)")]
    VertexOutOfRange { index: u64, len: usize },

    #[error("Malformed geometry: {0}")]
    MalformedGeometry(String),
}

impl Error {
    /// Create an invalid boundaries error
    pub fn boundaries(msg: impl Into<String>) -> Self {
        Error::InvalidBoundaries(msg.into())
    }
}
