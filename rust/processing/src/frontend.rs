// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser front-end
//!
//! Starts a worker for a document and turns every received chunk into a
//! render unit appended to the scene. Starting a new parse cancels the one
//! in flight: the stale worker stops between objects and its run stops
//! appending.

use crate::config::ParseConfig;
use crate::error::{Error, Result};
use crate::scene::{PresentationContext, RenderUnit, Scene};
use crate::transport::{channel, Message, MessageReceiver, ParseFailure, ParseReport};
use crate::worker::{spawn_worker, CancellationToken, RunPlan};
use cityjson_lite_core::{Document, TypeCodeTable};
use cityjson_lite_geometry::Normalization;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Completion callback, invoked once per successful run
pub type LoadCallback = Arc<dyn Fn() + Send + Sync>;

pub struct SceneParser {
    config: ParseConfig,
    on_load: Option<LoadCallback>,
    active: Option<CancellationToken>,
}

impl SceneParser {
    pub fn new(config: ParseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            on_load: None,
            active: None,
        })
    }

    /// Set the completion callback
    pub fn on_load(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_load = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    pub fn set_normalization(&mut self, normalization: Normalization) {
        self.config.normalization = Some(normalization);
    }

    /// Start parsing `document` into `scene`.
    ///
    /// Must be called from within a tokio runtime. Without a configured
    /// normalization, positions are emitted untransformed.
    pub fn parse(&mut self, document: Arc<Document>, scene: &Scene) -> Result<ParseRun> {
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        self.cancel();

        let type_codes = Arc::new(TypeCodeTable::for_document(
            self.config.type_codes.as_ref(),
            &document,
        ));
        let context = Arc::new(PresentationContext::for_document(
            type_codes.clone(),
            &document,
        ));
        let normalization = self.config.normalization.unwrap_or_default();
        let plan = RunPlan::new(document, type_codes, normalization, self.config.chunk_size);

        let cancel = CancellationToken::new();
        let (sender, receiver) = channel(self.config.channel_capacity);
        // Detached; a panic surfaces through the receiver
        drop(spawn_worker(&handle, plan, sender, cancel.clone()));
        self.active = Some(cancel.clone());

        Ok(ParseRun::new(
            receiver,
            scene.clone(),
            context,
            cancel,
            self.on_load.clone(),
        ))
    }

    /// Cancel the run in flight, if any
    pub fn cancel(&mut self) {
        if let Some(previous) = self.active.take() {
            if !previous.is_cancelled() {
                tracing::debug!("Cancelling previous parse");
            }
            previous.cancel();
        }
    }
}

/// Receiving side of one parse run
pub struct ParseRun {
    receiver: MessageReceiver,
    scene: Scene,
    context: Arc<PresentationContext>,
    cancel: CancellationToken,
    on_load: Option<LoadCallback>,
}

impl ParseRun {
    fn new(
        receiver: MessageReceiver,
        scene: Scene,
        context: Arc<PresentationContext>,
        cancel: CancellationToken,
        on_load: Option<LoadCallback>,
    ) -> Self {
        Self {
            receiver,
            scene,
            context,
            cancel,
            on_load,
        }
    }

    /// Apply messages until the run ends
    pub async fn finish(mut self) -> Result<ParseReport> {
        loop {
            if let Some(outcome) = self.check_cancelled() {
                return outcome;
            }
            let message = match self.receiver.recv().await {
                Some(message) => message,
                None => return Err(Error::Failed(ParseFailure::worker_lost())),
            };
            if let Some(outcome) = self.apply(message) {
                return outcome;
            }
        }
    }

    /// Apply at most `max_messages` already queued messages without waiting.
    ///
    /// Returns the outcome once the run has ended, `None` while it is still
    /// in progress.
    pub fn poll(&mut self, max_messages: usize) -> Option<Result<ParseReport>> {
        for _ in 0..max_messages {
            if let Some(outcome) = self.check_cancelled() {
                return Some(outcome);
            }
            let message = self.receiver.try_recv()?;
            if let Some(outcome) = self.apply(message) {
                return Some(outcome);
            }
        }
        None
    }

    /// Stop the worker; nothing further is appended to the scene
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn context(&self) -> &Arc<PresentationContext> {
        &self.context
    }

    pub fn type_codes(&self) -> &TypeCodeTable {
        self.context.type_codes()
    }

    fn check_cancelled(&mut self) -> Option<Result<ParseReport>> {
        if self.cancel.is_cancelled() {
            self.receiver.close();
            return Some(Err(Error::Cancelled));
        }
        None
    }

    fn apply(&mut self, message: Message) -> Option<Result<ParseReport>> {
        // Cancelled while the message was in flight
        if let Some(outcome) = self.check_cancelled() {
            return Some(outcome);
        }
        match message {
            Message::Start { total_objects } => {
                tracing::debug!(total_objects, "Parse started");
                None
            }
            Message::Chunk(chunk) => {
                self.scene.push(RenderUnit::new(chunk, self.context.clone()));
                None
            }
            Message::Done(report) => {
                if let Some(callback) = &self.on_load {
                    callback();
                }
                Some(Ok(report))
            }
            Message::Error(failure) => {
                if failure == ParseFailure::cancelled() {
                    Some(Err(Error::Cancelled))
                } else {
                    Some(Err(Error::Failed(failure)))
                }
            }
        }
    }
}
