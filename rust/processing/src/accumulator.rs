// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chunk accumulator
//!
//! Folds triangulated objects into chunk buffers and hands a chunk to its
//! sink once `chunk_size` objects have been folded in. Flushes only happen
//! between objects, so an object's triangles never straddle two chunks.

use crate::chunk::{Chunk, IndexWidth};
use crate::error::Result;
use crate::transport::{Message, MessageSender};
use cityjson_lite_geometry::{Normalization, Triangle};

/// Destination of flushed chunks
pub trait ChunkSink {
    fn emit(&mut self, chunk: Chunk) -> Result<()>;
}

impl ChunkSink for Vec<Chunk> {
    fn emit(&mut self, chunk: Chunk) -> Result<()> {
        self.push(chunk);
        Ok(())
    }
}

impl ChunkSink for MessageSender {
    fn emit(&mut self, chunk: Chunk) -> Result<()> {
        self.send(Message::Chunk(chunk))
    }
}

impl<S: ChunkSink + ?Sized> ChunkSink for &mut S {
    fn emit(&mut self, chunk: Chunk) -> Result<()> {
        (**self).emit(chunk)
    }
}

/// Totals over everything emitted by one accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorStats {
    pub chunk_count: usize,
    pub object_count: usize,
    pub triangle_count: usize,
    pub vertex_count: usize,
}

pub struct ChunkAccumulator<S: ChunkSink> {
    sink: S,
    chunk_size: usize,
    normalization: Normalization,
    width: IndexWidth,
    current: Chunk,
    pending_objects: usize,
    stats: AccumulatorStats,
}

impl<S: ChunkSink> ChunkAccumulator<S> {
    /// A `chunk_size` of 0 is treated as 1
    pub fn new(sink: S, chunk_size: usize, normalization: Normalization, width: IndexWidth) -> Self {
        Self {
            sink,
            chunk_size: chunk_size.max(1),
            normalization,
            width,
            current: Chunk::new(width),
            pending_objects: 0,
            stats: AccumulatorStats::default(),
        }
    }

    /// Fold one object's triangles into the current chunk.
    ///
    /// Objects without triangles still count toward the chunk size.
    pub fn push_object(
        &mut self,
        object_index: u32,
        type_code: u8,
        triangles: &[Triangle],
    ) -> Result<()> {
        self.current
            .push_object(triangles, object_index, type_code, &self.normalization);
        self.pending_objects += 1;
        self.stats.object_count += 1;

        if self.pending_objects >= self.chunk_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Emit the current chunk if it holds any triangles, then start afresh
    pub fn flush(&mut self) -> Result<()> {
        self.pending_objects = 0;
        if self.current.is_empty() {
            return Ok(());
        }

        let chunk = std::mem::replace(&mut self.current, Chunk::new(self.width));
        self.stats.chunk_count += 1;
        self.stats.triangle_count += chunk.triangle_count();
        self.stats.vertex_count += chunk.vertex_count();

        tracing::debug!(
            chunk = self.stats.chunk_count,
            vertices = chunk.vertex_count(),
            objects = chunk.object_count(),
            "Flushed chunk"
        );
        self.sink.emit(chunk)
    }

    /// Objects folded into the current, unflushed chunk
    #[inline]
    pub fn pending_objects(&self) -> usize {
        self.pending_objects
    }

    #[inline]
    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    /// Flush the remainder and hand back the sink
    pub fn finish(mut self) -> Result<(S, AccumulatorStats)> {
        self.flush()?;
        Ok((self.sink, self.stats))
    }
}
