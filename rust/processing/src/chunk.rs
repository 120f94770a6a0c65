// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chunk buffers
//!
//! A chunk is a flat, non-indexed triangle soup: three positions per
//! triangle plus one object index and one type code per vertex. Nothing is
//! shared across chunk boundaries, so every vertex repeats its triangle's
//! tags.

use cityjson_lite_geometry::{Normalization, Triangle};
use serde::{Deserialize, Serialize};

/// Largest object count whose indices fit a `u16` buffer
pub const MAX_U16_OBJECTS: usize = u16::MAX as usize + 1;

/// Width of the per-vertex object index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    U16,
    U32,
}

impl IndexWidth {
    /// Narrowest width able to address `object_count` objects
    #[inline]
    pub fn for_object_count(object_count: usize) -> Self {
        if object_count <= MAX_U16_OBJECTS {
            IndexWidth::U16
        } else {
            IndexWidth::U32
        }
    }
}

/// Per-vertex object indices, `u16` unless the document needs more
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectIndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl ObjectIndexBuffer {
    pub fn new(width: IndexWidth) -> Self {
        match width {
            IndexWidth::U16 => ObjectIndexBuffer::U16(Vec::new()),
            IndexWidth::U32 => ObjectIndexBuffer::U32(Vec::new()),
        }
    }

    pub fn width(&self) -> IndexWidth {
        match self {
            ObjectIndexBuffer::U16(_) => IndexWidth::U16,
            ObjectIndexBuffer::U32(_) => IndexWidth::U32,
        }
    }

    /// Append `count` copies of `index`
    #[inline]
    pub fn push_repeated(&mut self, index: u32, count: usize) {
        match self {
            ObjectIndexBuffer::U16(v) => {
                debug_assert!(index <= u16::MAX as u32);
                v.extend(std::iter::repeat(index as u16).take(count));
            }
            ObjectIndexBuffer::U32(v) => v.extend(std::iter::repeat(index).take(count)),
        }
    }

    #[inline]
    pub fn get(&self, vertex: usize) -> Option<u32> {
        match self {
            ObjectIndexBuffer::U16(v) => v.get(vertex).map(|&i| i as u32),
            ObjectIndexBuffer::U32(v) => v.get(vertex).copied(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            ObjectIndexBuffer::U16(v) => v.len(),
            ObjectIndexBuffer::U32(v) => v.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Size of the backing buffer in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            ObjectIndexBuffer::U16(v) => v.len() * 2,
            ObjectIndexBuffer::U32(v) => v.len() * 4,
        }
    }
}

/// One batch of triangulated, tagged vertex data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Vertex positions (x, y, z), normalization applied
    pub positions: Vec<f32>,
    /// Owning object's document-order index, one per vertex
    pub object_indices: ObjectIndexBuffer,
    /// Owning object's type code, one per vertex
    pub type_codes: Vec<u8>,
}

impl Chunk {
    /// Create an empty chunk
    pub fn new(width: IndexWidth) -> Self {
        Self {
            positions: Vec::new(),
            object_indices: ObjectIndexBuffer::new(width),
            type_codes: Vec::new(),
        }
    }

    /// Append one triangle, transforming its positions in f64 before the
    /// f32 conversion
    #[inline]
    pub fn push_triangle(
        &mut self,
        triangle: &Triangle,
        object_index: u32,
        type_code: u8,
        normalization: &Normalization,
    ) {
        for vertex in triangle {
            self.positions.extend_from_slice(&normalization.apply_f32(vertex));
        }
        self.object_indices.push_repeated(object_index, 3);
        self.type_codes.extend_from_slice(&[type_code; 3]);
    }

    /// Append all triangles of one object
    pub fn push_object(
        &mut self,
        triangles: &[Triangle],
        object_index: u32,
        type_code: u8,
        normalization: &Normalization,
    ) {
        self.positions.reserve(triangles.len() * 9);
        self.type_codes.reserve(triangles.len() * 3);
        for triangle in triangles {
            self.push_triangle(triangle, object_index, type_code, normalization);
        }
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.vertex_count() / 3
    }

    /// Check if chunk is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Buffer lengths agree and hold whole triangles only
    pub fn is_well_formed(&self) -> bool {
        let vertices = self.vertex_count();
        self.positions.len() % 3 == 0
            && self.object_indices.len() == vertices
            && self.type_codes.len() == vertices
            && vertices % 3 == 0
    }

    /// Number of distinct objects contributing to this chunk
    pub fn object_count(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for index in self.object_indices.iter() {
            if last != Some(index) {
                count += 1;
                last = Some(index);
            }
        }
        count
    }

    /// Total size of the three buffers in bytes
    pub fn byte_size(&self) -> usize {
        self.positions.len() * 4 + self.object_indices.byte_size() + self.type_codes.len()
    }

    /// Calculate bounds (min, max)
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        if self.is_empty() {
            return None;
        }

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];

        self.positions.chunks_exact(3).for_each(|p| {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        });

        Some((min, max))
    }
}
