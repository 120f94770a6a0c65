// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport between the parse worker and the consuming side.
//!
//! A one-way, ordered channel carrying lifecycle messages. Chunk buffers are
//! moved into the message, so the worker keeps no copy once a chunk is sent.
//! `Done` and `Error` are terminal: the receiver yields nothing after them,
//! and a channel that closes without one is reported as a lost worker.

use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::worker::CancellationToken;
use cityjson_lite_geometry::GeometryIssue;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// A structural problem found while traversing one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub object_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry_index: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn from_issue(object_id: &str, issue: &GeometryIssue) -> Self {
        Self {
            object_id: object_id.to_string(),
            geometry_index: Some(issue.geometry_index),
            message: issue.error.to_string(),
        }
    }
}

/// Completion report carried by `Done`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReport {
    /// Number of chunks emitted.
    pub chunk_count: usize,
    /// Number of objects traversed.
    pub object_count: usize,
    /// Number of triangles emitted.
    pub triangle_count: usize,
    /// Number of vertices emitted.
    pub vertex_count: usize,
    /// Wall-clock time of the worker run (ms).
    pub elapsed_ms: u64,
    /// Skipped geometries and surfaces.
    pub diagnostics: Vec<Diagnostic>,
}

/// Fatal failure carried by `Error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ParseFailure {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl ParseFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            object_id: None,
        }
    }

    pub fn with_object(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn cancelled() -> Self {
        Self::new("parse cancelled")
    }

    pub fn worker_lost() -> Self {
        Self::new("parse worker terminated without completing")
    }
}

/// Transport message kinds
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Parse begun.
    Start {
        /// Number of objects that will be traversed.
        #[serde(rename = "totalObjects")]
        total_objects: usize,
    },

    /// One chunk of tagged triangles.
    Chunk(Chunk),

    /// No more chunks follow.
    Done(ParseReport),

    /// Fatal failure; no further messages follow.
    Error(ParseFailure),
}

impl Message {
    /// `Done` and `Error` end a run
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Message::Done(_) | Message::Error(_))
    }
}

enum SenderInner {
    Bounded(mpsc::Sender<Message>),
    Unbounded(mpsc::UnboundedSender<Message>),
}

enum ReceiverInner {
    Bounded(mpsc::Receiver<Message>),
    Unbounded(mpsc::UnboundedReceiver<Message>),
}

/// Worker side of the channel
pub struct MessageSender {
    inner: SenderInner,
    cancel: Option<(Handle, CancellationToken)>,
}

/// Consuming side of the channel
pub struct MessageReceiver {
    inner: ReceiverInner,
    finished: bool,
}

/// Create a channel. `None` = unbounded (no backpressure); `Some(n)` = at
/// most `n` queued messages, the sender blocks while the queue is full.
pub fn channel(capacity: Option<usize>) -> (MessageSender, MessageReceiver) {
    let (tx, rx) = match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (SenderInner::Bounded(tx), ReceiverInner::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (SenderInner::Unbounded(tx), ReceiverInner::Unbounded(rx))
        }
    };
    (
        MessageSender {
            inner: tx,
            cancel: None,
        },
        MessageReceiver {
            inner: rx,
            finished: false,
        },
    )
}

impl MessageSender {
    /// Send a message, transferring ownership of its buffers.
    ///
    /// On a bounded channel this blocks the calling thread while the queue
    /// is full, so it must not be called from inside an async task.
    pub fn send(&self, message: Message) -> Result<()> {
        match &self.inner {
            SenderInner::Bounded(tx) => match &self.cancel {
                Some((handle, cancel)) => send_unless_cancelled(tx, message, handle, cancel),
                None => tx.blocking_send(message).map_err(|_| Error::ChannelClosed),
            },
            SenderInner::Unbounded(tx) => tx.send(message).map_err(|_| Error::ChannelClosed),
        }
    }

    /// Give up a send blocked on a full queue with `Error::Cancelled` once
    /// `cancel` fires. `handle` drives the wait.
    pub fn cancel_on(mut self, handle: Handle, cancel: CancellationToken) -> Self {
        self.cancel = Some((handle, cancel));
        self
    }

    /// Whether the receiving side is gone
    pub fn is_closed(&self) -> bool {
        match &self.inner {
            SenderInner::Bounded(tx) => tx.is_closed(),
            SenderInner::Unbounded(tx) => tx.is_closed(),
        }
    }
}

fn send_unless_cancelled(
    tx: &mpsc::Sender<Message>,
    message: Message,
    handle: &Handle,
    cancel: &CancellationToken,
) -> Result<()> {
    let message = match tx.try_send(message) {
        Ok(()) => return Ok(()),
        Err(TrySendError::Closed(_)) => return Err(Error::ChannelClosed),
        Err(TrySendError::Full(message)) => message,
    };
    handle.block_on(async {
        tokio::select! {
            sent = tx.send(message) => sent.map_err(|_| Error::ChannelClosed),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    })
}

impl MessageReceiver {
    /// Wait for the next message; `None` once the run has ended
    pub async fn recv(&mut self) -> Option<Message> {
        if self.finished {
            return None;
        }
        let message = match &mut self.inner {
            ReceiverInner::Bounded(rx) => rx.recv().await,
            ReceiverInner::Unbounded(rx) => rx.recv().await,
        };
        Some(self.observe(message))
    }

    /// Take the next message if one is queued, without waiting
    pub fn try_recv(&mut self) -> Option<Message> {
        if self.finished {
            return None;
        }
        let result = match &mut self.inner {
            ReceiverInner::Bounded(rx) => rx.try_recv(),
            ReceiverInner::Unbounded(rx) => rx.try_recv(),
        };
        match result {
            Ok(message) => Some(self.observe(Some(message))),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.observe(None)),
        }
    }

    /// Whether a terminal message has been delivered
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn observe(&mut self, message: Option<Message>) -> Message {
        let message = message.unwrap_or_else(|| Message::Error(ParseFailure::worker_lost()));
        if message.is_terminal() {
            self.finished = true;
            self.close();
        }
        message
    }

    /// Stop accepting messages; pending sends fail with `ChannelClosed`
    pub fn close(&mut self) {
        match &mut self.inner {
            ReceiverInner::Bounded(rx) => rx.close(),
            ReceiverInner::Unbounded(rx) => rx.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::IndexWidth;

    #[tokio::test]
    async fn test_messages_arrive_in_send_order() {
        let (tx, mut rx) = channel(None);
        tx.send(Message::Start { total_objects: 2 }).unwrap();
        tx.send(Message::Chunk(Chunk::new(IndexWidth::U16))).unwrap();
        tx.send(Message::Done(ParseReport::default())).unwrap();

        assert!(matches!(rx.recv().await, Some(Message::Start { total_objects: 2 })));
        assert!(matches!(rx.recv().await, Some(Message::Chunk(_))));
        assert!(matches!(rx.recv().await, Some(Message::Done(_))));
        assert!(rx.is_finished());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_nothing_after_terminal_message() {
        let (tx, mut rx) = channel(None);
        tx.send(Message::Error(ParseFailure::new("boom").with_object("b1"))).unwrap();

        match rx.recv().await {
            Some(Message::Error(failure)) => {
                assert_eq!(failure.message, "boom");
                assert_eq!(failure.object_id.as_deref(), Some("b1"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
        // The receiver closed itself, so the worker notices
        assert!(tx.send(Message::Start { total_objects: 0 }).is_err());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_sender_reports_lost_worker() {
        let (tx, mut rx) = channel(None);
        tx.send(Message::Start { total_objects: 1 }).unwrap();
        drop(tx);

        assert!(matches!(rx.recv().await, Some(Message::Start { .. })));
        match rx.recv().await {
            Some(Message::Error(failure)) => assert_eq!(failure, ParseFailure::worker_lost()),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_bounded_channel_applies_backpressure() {
        let (tx, mut rx) = channel(Some(1));
        let worker = tokio::task::spawn_blocking(move || {
            for _ in 0..5 {
                tx.send(Message::Chunk(Chunk::new(IndexWidth::U16))).unwrap();
            }
            tx.send(Message::Done(ParseReport::default())).unwrap();
        });

        let mut chunks = 0;
        while let Some(message) = rx.recv().await {
            if let Message::Chunk(_) = message {
                chunks += 1;
            }
        }
        worker.await.unwrap();
        assert_eq!(chunks, 5);
    }

    #[test]
    fn test_try_recv_without_waiting() {
        let (tx, mut rx) = channel(None);
        assert!(rx.try_recv().is_none());
        assert!(!rx.is_finished());

        tx.send(Message::Done(ParseReport::default())).unwrap();
        assert!(matches!(rx.try_recv(), Some(Message::Done(_))));
        assert!(rx.try_recv().is_none());
        assert!(rx.is_finished());
    }

    #[test]
    fn test_message_tags() {
        let start = serde_json::to_value(Message::Start { total_objects: 3 }).unwrap();
        assert_eq!(start, serde_json::json!({ "type": "start", "totalObjects": 3 }));

        let error = serde_json::to_value(Message::Error(ParseFailure::new("bad"))).unwrap();
        assert_eq!(error, serde_json::json!({ "type": "error", "message": "bad" }));

        let done = serde_json::to_value(Message::Done(ParseReport::default())).unwrap();
        assert_eq!(done["type"], "done");
        assert_eq!(done["chunkCount"], 0);
    }
}
