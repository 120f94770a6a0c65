// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CityJSON-Lite Processing
//!
//! Chunked triangulation pipeline for CityJSON documents: a background
//! worker traverses and triangulates every object, folds the triangles into
//! bounded chunks tagged per vertex with object index and type code, and
//! streams them over an ordered channel to a front-end that appends one
//! render unit per chunk to a shared scene.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cityjson_lite_core::Document;
//! use cityjson_lite_processing::{CityJsonLoader, ParseConfig};
//!
//! let document = Document::from_json_str(&content)?;
//! let mut loader = CityJsonLoader::new(ParseConfig::default().with_chunk_size(500))?;
//! let report = loader.load(document)?.finish().await?;
//! println!("{} chunks, {} triangles", report.chunk_count, report.triangle_count);
//! ```

pub mod accumulator;
pub mod chunk;
pub mod config;
pub mod error;
pub mod frontend;
pub mod loader;
pub mod scene;
pub mod transport;
pub mod worker;

pub use accumulator::{AccumulatorStats, ChunkAccumulator, ChunkSink};
pub use chunk::{Chunk, IndexWidth, ObjectIndexBuffer, MAX_U16_OBJECTS};
pub use config::{ParseConfig, ParseOptions, DEFAULT_CHUNK_SIZE};
pub use error::{Error, Result};
pub use frontend::{LoadCallback, ParseRun, SceneParser};
pub use loader::CityJsonLoader;
pub use scene::{PresentationContext, RenderUnit, Scene, SceneStats};
pub use transport::{
    channel, Diagnostic, Message, MessageReceiver, MessageSender, ParseFailure, ParseReport,
};
pub use worker::{run_pipeline, spawn_worker, CancellationToken, RunPlan};
