// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for document operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding or resolving a CityJSON document
#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document has no `vertices` array")]
    MissingVertices,

    #[error("Document has no `CityObjects` mapping")]
    MissingObjects,
}
