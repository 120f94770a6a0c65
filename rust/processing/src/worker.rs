// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parse worker
//!
//! Runs traversal, triangulation and accumulation for one document on a
//! blocking thread. Objects are triangulated in parallel one window of
//! `chunk_size` objects at a time and folded back in document order, so the
//! emitted chunks are identical to a sequential run.

use crate::accumulator::{ChunkAccumulator, ChunkSink};
use crate::chunk::IndexWidth;
use crate::error::{Error, Result};
use crate::transport::{Diagnostic, Message, MessageSender, ParseFailure, ParseReport};
use cityjson_lite_core::{CityObject, Document, TypeCodeTable};
use cityjson_lite_geometry::{GeometryTraversal, Normalization, ObjectTriangles, VertexPool};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared flag telling a worker to stop between objects
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<CancelState>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Release);
        self.0.notify.notify_waiters();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        loop {
            // Registered before the check so a concurrent cancel is not missed
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Everything one run needs, fixed before the worker starts
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub document: Arc<Document>,
    pub type_codes: Arc<TypeCodeTable>,
    pub normalization: Normalization,
    pub chunk_size: usize,
}

impl RunPlan {
    pub fn new(
        document: Arc<Document>,
        type_codes: Arc<TypeCodeTable>,
        normalization: Normalization,
        chunk_size: usize,
    ) -> Self {
        Self {
            document,
            type_codes,
            normalization,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Index buffer width for this document
    pub fn index_width(&self) -> IndexWidth {
        IndexWidth::for_object_count(self.document.object_count())
    }
}

/// Run the whole pipeline for `plan`, emitting chunks into `sink`.
///
/// Skipped geometries are logged and collected in the report. Returns
/// `Error::Cancelled` as soon as `cancel` is observed between objects.
pub fn run_pipeline<S: ChunkSink>(
    plan: &RunPlan,
    sink: S,
    cancel: &CancellationToken,
) -> Result<(S, ParseReport)> {
    let started = Instant::now();
    let document = plan.document.as_ref();

    tracing::info!(
        objects = document.object_count(),
        vertices = document.vertex_count(),
        chunk_size = plan.chunk_size,
        "Starting CityJSON triangulation"
    );

    let pool = VertexPool::from_document(document);
    let traversal = GeometryTraversal::new(&pool);
    let objects: Vec<(usize, &str, &CityObject)> = document.objects().collect();

    let mut accumulator =
        ChunkAccumulator::new(sink, plan.chunk_size, plan.normalization, plan.index_width());
    let mut diagnostics = Vec::new();

    for window in objects.chunks(plan.chunk_size) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let triangulated: Vec<ObjectTriangles> = window
            .par_iter()
            .map(|(_, _, object)| traversal.triangulate_object(object))
            .collect();

        for (&(index, id, object), output) in window.iter().zip(triangulated) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            for issue in &output.issues {
                tracing::warn!(
                    object_id = %id,
                    geometry_index = issue.geometry_index,
                    error = %issue.error,
                    "Skipped geometry"
                );
                diagnostics.push(Diagnostic::from_issue(id, issue));
            }

            let type_code = plan.type_codes.code_or_unassigned(&object.object_type);
            accumulator.push_object(index as u32, type_code, &output.triangles)?;
        }
    }

    let (sink, stats) = accumulator.finish()?;
    let report = ParseReport {
        chunk_count: stats.chunk_count,
        object_count: stats.object_count,
        triangle_count: stats.triangle_count,
        vertex_count: stats.vertex_count,
        elapsed_ms: started.elapsed().as_millis() as u64,
        diagnostics,
    };

    tracing::info!(
        chunks = report.chunk_count,
        triangles = report.triangle_count,
        vertices = report.vertex_count,
        skipped = report.diagnostics.len(),
        elapsed_ms = report.elapsed_ms,
        "CityJSON triangulation complete"
    );

    Ok((sink, report))
}

/// Start a run on the runtime's blocking pool.
///
/// The receiver sees `start`, the chunks, then exactly one of `done` or
/// `error`; a cancelled run ends with a `parse cancelled` error. A panicking
/// worker drops its sender, which the receiver reports as a lost worker.
///
/// On a bounded channel a send blocked on a full queue is abandoned once
/// `cancel` fires, so a superseded run whose receiver is never drained still
/// releases its thread. Its closing `error` message may then be lost.
pub fn spawn_worker(
    handle: &Handle,
    plan: RunPlan,
    sender: MessageSender,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let sender = sender.cancel_on(handle.clone(), cancel.clone());
    handle.spawn_blocking(move || {
        let total_objects = plan.document.object_count();
        if sender.send(Message::Start { total_objects }).is_err() {
            return;
        }

        let mut sender = sender;
        let result = run_pipeline(&plan, &mut sender, &cancel).map(|(_, report)| report);
        match result {
            Ok(report) => {
                let _ = sender.send(Message::Done(report));
            }
            Err(Error::ChannelClosed) => {
                tracing::debug!("Receiver dropped, stopping parse");
            }
            Err(error) => {
                if matches!(error, Error::Cancelled) {
                    tracing::debug!("Parse cancelled");
                } else {
                    tracing::error!(error = %error, "Parse failed");
                }
                let _ = sender.send(Message::Error(failure_for(&error)));
            }
        }
    })
}

/// Fatal outcome of a run, as sent on the transport
pub(crate) fn failure_for(error: &Error) -> ParseFailure {
    match error {
        Error::Cancelled => ParseFailure::cancelled(),
        Error::Failed(failure) => failure.clone(),
        other => ParseFailure::new(other.to_string()),
    }
}
