// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Consumer-facing scene container and render units

use crate::chunk::{Chunk, ObjectIndexBuffer};
use cityjson_lite_core::{Document, TypeCodeTable};
use cityjson_lite_geometry::{Point3, Vector3};
use std::sync::{Arc, PoisonError, RwLock};

/// Lookup context shared by every render unit of one parse run.
///
/// Resolves per-vertex tags back to object ids and type names (picking,
/// coloring) without global state.
#[derive(Debug, Clone)]
pub struct PresentationContext {
    type_codes: Arc<TypeCodeTable>,
    object_ids: Arc<[String]>,
}

impl PresentationContext {
    pub fn new(type_codes: Arc<TypeCodeTable>, object_ids: Arc<[String]>) -> Self {
        Self {
            type_codes,
            object_ids,
        }
    }

    pub fn for_document(type_codes: Arc<TypeCodeTable>, document: &Document) -> Self {
        Self::new(type_codes, document.object_ids().into())
    }

    pub fn type_codes(&self) -> &TypeCodeTable {
        &self.type_codes
    }

    /// Object id at a document-order index
    pub fn object_id(&self, index: u32) -> Option<&str> {
        self.object_ids.get(index as usize).map(String::as_str)
    }

    pub fn type_name(&self, code: u8) -> Option<&str> {
        self.type_codes.name(code)
    }

    pub fn color(&self, code: u8) -> Option<u32> {
        self.type_codes.color(code)
    }
}

/// One renderable unit, built from exactly one chunk
#[derive(Debug, Clone)]
pub struct RenderUnit {
    chunk: Chunk,
    context: Arc<PresentationContext>,
}

impl RenderUnit {
    pub fn new(chunk: Chunk, context: Arc<PresentationContext>) -> Self {
        Self { chunk, context }
    }

    /// Positions with the normalization already applied
    #[inline]
    pub fn positions(&self) -> &[f32] {
        &self.chunk.positions
    }

    #[inline]
    pub fn object_indices(&self) -> &ObjectIndexBuffer {
        &self.chunk.object_indices
    }

    #[inline]
    pub fn type_codes(&self) -> &[u8] {
        &self.chunk.type_codes
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn context(&self) -> &Arc<PresentationContext> {
        &self.context
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.chunk.vertex_count()
    }

    /// Id of the object owning `vertex`
    pub fn object_id_at(&self, vertex: usize) -> Option<&str> {
        let index = self.chunk.object_indices.get(vertex)?;
        self.context.object_id(index)
    }

    /// Type name of the object owning `vertex`
    pub fn type_name_at(&self, vertex: usize) -> Option<&str> {
        let code = *self.chunk.type_codes.get(vertex)?;
        self.context.type_name(code)
    }

    /// Display color (`0xRRGGBB`) of the object owning `vertex`
    pub fn color_at(&self, vertex: usize) -> Option<u32> {
        let code = *self.chunk.type_codes.get(vertex)?;
        self.context.color(code)
    }

    /// Flat per-vertex normals following the emitted winding
    pub fn compute_normals(&self) -> Vec<f32> {
        let mut normals = Vec::with_capacity(self.chunk.positions.len());

        for tri in self.chunk.positions.chunks_exact(9) {
            let v0 = Point3::new(tri[0] as f64, tri[1] as f64, tri[2] as f64);
            let v1 = Point3::new(tri[3] as f64, tri[4] as f64, tri[5] as f64);
            let v2 = Point3::new(tri[6] as f64, tri[7] as f64, tri[8] as f64);

            let normal = (v1 - v0).cross(&(v2 - v0));
            let len = normal.norm();
            let normal = if len > 1e-12 {
                normal / len
            } else {
                Vector3::z()
            };

            for _ in 0..3 {
                normals.extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);
            }
        }

        normals
    }
}

/// Aggregate numbers over a scene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub unit_count: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Estimated buffer memory in bytes
    pub byte_size: usize,
}

/// Shared, growable list of render units.
///
/// Cloning shares the container. It is never cleared implicitly; callers
/// replacing a document clear it first.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    units: Arc<RwLock<Vec<Arc<RenderUnit>>>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, unit: RenderUnit) {
        self.units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(unit));
    }

    pub fn len(&self) -> usize {
        self.units.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.units.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Snapshot of the current units, in append order
    pub fn units(&self) -> Vec<Arc<RenderUnit>> {
        self.units.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get(&self, index: usize) -> Option<Arc<RenderUnit>> {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    pub fn stats(&self) -> SceneStats {
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        units.iter().fold(
            SceneStats {
                unit_count: units.len(),
                ..SceneStats::default()
            },
            |mut stats, unit| {
                stats.vertex_count += unit.vertex_count();
                stats.triangle_count += unit.chunk.triangle_count();
                stats.byte_size += unit.chunk.byte_size();
                stats
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::IndexWidth;
    use approx::assert_relative_eq;
    use cityjson_lite_geometry::Normalization;

    fn unit() -> RenderUnit {
        let table = TypeCodeTable::with_default_colors();
        let context = PresentationContext::new(
            Arc::new(table),
            vec!["a".to_string(), "b".to_string()].into(),
        );
        let mut chunk = Chunk::new(IndexWidth::U16);
        let triangle = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        chunk.push_triangle(&triangle, 1, 13, &Normalization::identity());
        RenderUnit::new(chunk, Arc::new(context))
    }

    #[test]
    fn test_vertex_picking() {
        let unit = unit();
        assert_eq!(unit.object_id_at(0), Some("b"));
        assert_eq!(unit.type_name_at(2), Some("Road"));
        assert!(unit.color_at(1).is_some());
        assert_eq!(unit.object_id_at(3), None);
    }

    #[test]
    fn test_flat_normals_follow_winding() {
        let normals = unit().compute_normals();
        assert_eq!(normals.len(), 9);
        for n in normals.chunks_exact(3) {
            assert_relative_eq!(n[2], 1.0);
        }
    }

    #[test]
    fn test_scene_is_shared_and_explicitly_cleared() {
        let scene = Scene::new();
        let view = scene.clone();
        scene.push(unit());
        scene.push(unit());

        assert_eq!(view.len(), 2);
        let stats = view.stats();
        assert_eq!(stats.unit_count, 2);
        assert_eq!(stats.vertex_count, 6);
        assert_eq!(stats.triangle_count, 2);
        assert_eq!(stats.byte_size, 2 * (36 + 6 + 3));

        view.clear();
        assert!(scene.is_empty());
    }
}
