// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loader for already-decoded CityJSON documents.

use crate::config::ParseConfig;
use crate::error::Result;
use crate::frontend::{ParseRun, SceneParser};
use crate::scene::Scene;
use cityjson_lite_core::Document;
use cityjson_lite_geometry::{Normalization, VertexPool};
use std::sync::Arc;

/// Owns the scene and the normalization shared by every load.
///
/// The normalization is fitted to the first loaded document (unless one was
/// configured) and reused for later loads, so successive documents share
/// one coordinate frame. The scene is not cleared between loads.
pub struct CityJsonLoader {
    parser: SceneParser,
    scene: Scene,
    normalization: Option<Normalization>,
}

impl CityJsonLoader {
    pub fn new(config: ParseConfig) -> Result<Self> {
        let normalization = config.normalization;
        Ok(Self {
            parser: SceneParser::new(config)?,
            scene: Scene::new(),
            normalization,
        })
    }

    /// Set the completion callback
    pub fn on_load(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.parser = self.parser.on_load(callback);
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn normalization(&self) -> Option<Normalization> {
        self.normalization
    }

    /// Forget the current normalization; the next load fits a new one
    pub fn reset_normalization(&mut self) {
        self.normalization = None;
    }

    /// Bounding-sphere normalization of a document's resolved vertices
    pub fn compute_normalization(document: &Document) -> Normalization {
        VertexPool::from_document(document).normalization()
    }

    /// Start loading `document` into the scene.
    ///
    /// A load in flight is cancelled first. Must be called from within a
    /// tokio runtime.
    pub fn load(&mut self, document: impl Into<Arc<Document>>) -> Result<ParseRun> {
        let document = document.into();
        let normalization = match self.normalization {
            Some(normalization) => normalization,
            None => {
                let normalization = Self::compute_normalization(&document);
                tracing::debug!(
                    scale = normalization.scale,
                    "Computed normalization from document vertices"
                );
                self.normalization = Some(normalization);
                normalization
            }
        };
        self.parser.set_normalization(normalization);
        self.parser.parse(document, &self.scene)
    }

    /// Decode an already-parsed JSON value and start loading it
    pub fn load_value(&mut self, value: serde_json::Value) -> Result<ParseRun> {
        let document = Document::from_value(value)?;
        self.load(document)
    }

    /// Cancel the load in flight, if any
    pub fn cancel(&mut self) {
        self.parser.cancel();
    }
}
