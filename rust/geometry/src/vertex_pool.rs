// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared vertex pool with the document transform already applied

use crate::normalize::{BoundingSphere, Normalization};
use crate::{Error, Point3, Result};
use cityjson_lite_core::Document;

/// Resolved, read-only vertex pool referenced by ring indices
#[derive(Debug, Clone, Default)]
pub struct VertexPool {
    points: Vec<Point3<f64>>,
}

impl VertexPool {
    /// Resolve every vertex of `document` (document transform applied)
    pub fn from_document(document: &Document) -> Self {
        let points = document
            .resolved_vertices()
            .into_iter()
            .map(|[x, y, z]| Point3::new(x, y, z))
            .collect();
        Self { points }
    }

    /// Pool from already-resolved points
    pub fn from_points(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    /// Look up a vertex by ring index
    #[inline]
    pub fn get(&self, index: u64) -> Result<Point3<f64>> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.points.get(i))
            .copied()
            .ok_or(Error::VertexOutOfRange {
                index,
                len: self.points.len(),
            })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        BoundingSphere::from_points(&self.points)
    }

    /// Normalization transform fitted to this pool
    pub fn normalization(&self) -> Normalization {
        Normalization::from_points(&self.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_lookup() {
        let pool = VertexPool::from_points(vec![Point3::origin(); 2]);
        assert!(pool.get(1).is_ok());
        match pool.get(2) {
            Err(Error::VertexOutOfRange { index, len }) => {
                assert_eq!(index, 2);
                assert_eq!(len, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_pool_applies_document_transform() {
        let doc = Document::from_json_str(
            r#"{"vertices": [[10, 20, 30]], "CityObjects": {},
                "transform": {"scale": [0.5, 0.5, 0.5], "translate": [1, 1, 1]}}"#,
        )
        .unwrap();
        let pool = VertexPool::from_document(&doc);
        assert_eq!(pool.get(0).unwrap(), Point3::new(6.0, 11.0, 16.0));
    }
}
