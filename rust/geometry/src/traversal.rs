// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry traversal engine
//!
//! Walks the boundary tree of each geometry down to its surfaces, resolving
//! ring indices against the shared vertex pool, and triangulates every
//! surface. The depth of the tree depends on the geometry kind:
//!
//! - MultiSurface / CompositeSurface: `[surface][ring][index]`
//! - Solid: `[shell][surface][ring][index]`
//! - MultiSolid / CompositeSolid: `[solid][shell][surface][ring][index]`
//!
//! A geometry with a malformed tree or an out-of-range index is skipped as a
//! whole and reported; the remaining geometries of the object still process.

use crate::triangulation::{triangulate_surface, Triangle};
use crate::vertex_pool::VertexPool;
use crate::{Error, Point3, Result};
use cityjson_lite_core::{CityObject, Geometry, GeometryKind};
use serde_json::Value;
use smallvec::SmallVec;

/// Number of container levels wrapping the surface list, per geometry kind.
/// `None` for kinds without polygonal surfaces.
#[inline]
pub fn surface_nesting(kind: GeometryKind) -> Option<usize> {
    match kind {
        GeometryKind::MultiSurface | GeometryKind::CompositeSurface => Some(0),
        GeometryKind::Solid => Some(1),
        GeometryKind::MultiSolid | GeometryKind::CompositeSolid => Some(2),
        GeometryKind::MultiPoint
        | GeometryKind::MultiLineString
        | GeometryKind::GeometryInstance
        | GeometryKind::Unknown => None,
    }
}

/// A planar surface with resolved coordinates; the first ring is the outer
/// boundary, the rest are holes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Surface {
    pub rings: SmallVec<[Vec<Point3<f64>>; 2]>,
}

impl Surface {
    pub fn outer(&self) -> Option<&[Point3<f64>]> {
        self.rings.first().map(|r| r.as_slice())
    }

    pub fn holes(&self) -> &[Vec<Point3<f64>>] {
        self.rings.get(1..).unwrap_or(&[])
    }

    /// Triangulate the surface; a surface without rings yields nothing
    pub fn triangulate(&self) -> Result<Vec<Triangle>> {
        match self.outer() {
            Some(outer) => triangulate_surface(outer, self.holes()),
            None => Ok(Vec::new()),
        }
    }
}

/// A problem with one geometry (or one of its surfaces) of an object
#[derive(Debug)]
pub struct GeometryIssue {
    pub geometry_index: usize,
    pub error: Error,
}

/// Triangulated output of a single object
#[derive(Debug, Default)]
pub struct ObjectTriangles {
    /// Triangles of all valid surfaces, in document order
    pub triangles: Vec<Triangle>,
    /// Number of surfaces visited in valid geometries
    pub surface_count: usize,
    pub issues: Vec<GeometryIssue>,
}

impl ObjectTriangles {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Traversal over one document's vertex pool
#[derive(Debug, Clone, Copy)]
pub struct GeometryTraversal<'a> {
    pool: &'a VertexPool,
}

impl<'a> GeometryTraversal<'a> {
    pub fn new(pool: &'a VertexPool) -> Self {
        Self { pool }
    }

    /// Resolve every surface of a geometry, in document order.
    /// Kinds without surfaces resolve to an empty list.
    pub fn surfaces(&self, geometry: &Geometry) -> Result<Vec<Surface>> {
        if let Some(reason) = &geometry.malformed {
            return Err(Error::MalformedGeometry(reason.clone()));
        }
        let Some(nesting) = surface_nesting(geometry.kind) else {
            return Ok(Vec::new());
        };
        let mut surfaces = Vec::new();
        self.collect_surfaces(&geometry.boundaries, nesting, &mut surfaces)?;
        Ok(surfaces)
    }

    fn collect_surfaces(
        &self,
        value: &Value,
        nesting: usize,
        out: &mut Vec<Surface>,
    ) -> Result<()> {
        let items = as_array(value, level_name(nesting))?;
        if nesting == 0 {
            out.reserve(items.len());
            for surface in items {
                out.push(self.resolve_surface(surface)?);
            }
        } else {
            for item in items {
                self.collect_surfaces(item, nesting - 1, out)?;
            }
        }
        Ok(())
    }

    fn resolve_surface(&self, value: &Value) -> Result<Surface> {
        let rings = as_array(value, "surface")?;
        let mut surface = Surface::default();
        for ring in rings {
            surface.rings.push(self.resolve_ring(ring)?);
        }
        Ok(surface)
    }

    fn resolve_ring(&self, value: &Value) -> Result<Vec<Point3<f64>>> {
        let indices = as_array(value, "ring")?;
        let mut points = Vec::with_capacity(indices.len());
        for index in indices {
            let index = index
                .as_u64()
                .ok_or_else(|| Error::boundaries(format!("ring index {} is not a vertex index", index)))?;
            points.push(self.pool.get(index)?);
        }
        Ok(points)
    }

    /// Triangulate every surface of every geometry of `object`.
    ///
    /// Failing geometries are skipped and recorded in `issues`; a surface that
    /// fails to triangulate is skipped on its own.
    pub fn triangulate_object(&self, object: &CityObject) -> ObjectTriangles {
        let mut result = ObjectTriangles::default();

        for (geometry_index, geometry) in object.geometry.iter().enumerate() {
            let surfaces = match self.surfaces(geometry) {
                Ok(surfaces) => surfaces,
                Err(error) => {
                    result.issues.push(GeometryIssue {
                        geometry_index,
                        error,
                    });
                    continue;
                }
            };

            result.surface_count += surfaces.len();
            for surface in &surfaces {
                match surface.triangulate() {
                    Ok(triangles) => result.triangles.extend(triangles),
                    Err(error) => result.issues.push(GeometryIssue {
                        geometry_index,
                        error,
                    }),
                }
            }
        }

        result
    }
}

fn level_name(nesting: usize) -> &'static str {
    match nesting {
        0 => "surface list",
        1 => "shell list",
        _ => "solid list",
    }
}

#[inline]
fn as_array<'v>(value: &'v Value, what: &str) -> Result<&'v Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::boundaries(format!("expected {} array, found {}", what, kind_of(value))))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cityjson_lite_core::Document;
    use serde_json::json;

    /// Unit cube vertices
    fn cube_document(object: Value) -> Document {
        Document::from_value(json!({
            "vertices": [
                [0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0],
                [0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]
            ],
            "CityObjects": { "obj": object }
        }))
        .unwrap()
    }

    fn cube_shell() -> Value {
        json!([
            [[0, 3, 2, 1]], [[4, 5, 6, 7]],
            [[0, 1, 5, 4]], [[1, 2, 6, 5]],
            [[2, 3, 7, 6]], [[3, 0, 4, 7]]
        ])
    }

    fn triangulate(doc: &Document) -> ObjectTriangles {
        let pool = VertexPool::from_document(doc);
        let (_, object) = doc.object_at(0).unwrap();
        GeometryTraversal::new(&pool).triangulate_object(object)
    }

    #[test]
    fn test_multisurface_depth() {
        let doc = cube_document(json!({
            "type": "Building",
            "geometry": [{ "type": "MultiSurface", "lod": 1, "boundaries": [[[0, 1, 2]], [[0, 2, 3]]] }]
        }));
        let result = triangulate(&doc);
        assert_eq!(result.surface_count, 2);
        assert_eq!(result.triangles.len(), 2);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_solid_depth() {
        let doc = cube_document(json!({
            "type": "Building",
            "geometry": [{ "type": "Solid", "lod": 2, "boundaries": [cube_shell()] }]
        }));
        let result = triangulate(&doc);
        assert_eq!(result.surface_count, 6);
        assert_eq!(result.triangles.len(), 12);
    }

    #[test]
    fn test_composite_solid_depth() {
        let doc = cube_document(json!({
            "type": "Building",
            "geometry": [{ "type": "CompositeSolid", "boundaries": [[cube_shell()], [cube_shell()]] }]
        }));
        let result = triangulate(&doc);
        assert_eq!(result.surface_count, 12);
        assert_eq!(result.triangles.len(), 24);
    }

    #[test]
    fn test_cube_faces_point_outwards() {
        let doc = cube_document(json!({
            "type": "Building",
            "geometry": [{ "type": "Solid", "boundaries": [cube_shell()] }]
        }));
        let center = Point3::new(0.5, 0.5, 0.5);
        for tri in triangulate(&doc).triangles {
            let normal = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
            let centroid = Point3::from((tri[0].coords + tri[1].coords + tri[2].coords) / 3.0);
            assert!(normal.dot(&(centroid - center)) > 0.0);
        }
    }

    #[test]
    fn test_out_of_range_index_skips_geometry_only() {
        let doc = cube_document(json!({
            "type": "Building",
            "geometry": [
                { "type": "MultiSurface", "boundaries": [[[0, 1, 99]]] },
                { "type": "MultiSurface", "boundaries": [[[0, 1, 2]]] }
            ]
        }));
        let result = triangulate(&doc);
        assert_eq!(result.triangles.len(), 1);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].geometry_index, 0);
        assert!(matches!(
            result.issues[0].error,
            Error::VertexOutOfRange { index: 99, len: 8 }
        ));
    }

    #[test]
    fn test_non_array_boundaries_reported() {
        let doc = cube_document(json!({
            "type": "Road",
            "geometry": [{ "type": "Solid", "boundaries": 42 }]
        }));
        let result = triangulate(&doc);
        assert!(result.triangles.is_empty());
        assert!(matches!(result.issues[0].error, Error::InvalidBoundaries(_)));
    }

    #[test]
    fn test_malformed_record_skips_geometry_only() {
        let doc = cube_document(json!({
            "type": "Building",
            "geometry": [
                { "lod": 2, "boundaries": [[[0, 1, 2]]] },
                { "type": "MultiSurface", "boundaries": [[[0, 1, 2]]] }
            ]
        }));
        let result = triangulate(&doc);
        assert_eq!(result.triangles.len(), 1);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].geometry_index, 0);
        assert!(matches!(result.issues[0].error, Error::MalformedGeometry(_)));
    }

    #[test]
    fn test_negative_index_reported() {
        let doc = cube_document(json!({
            "type": "Road",
            "geometry": [{ "type": "MultiSurface", "boundaries": [[[0, -1, 2]]] }]
        }));
        let result = triangulate(&doc);
        assert!(matches!(result.issues[0].error, Error::InvalidBoundaries(_)));
    }

    #[test]
    fn test_surface_with_hole() {
        let doc = Document::from_value(json!({
            "vertices": [
                [0, 0, 0], [10, 0, 0], [10, 10, 0], [0, 10, 0],
                [3, 3, 0], [3, 7, 0], [7, 7, 0], [7, 3, 0]
            ],
            "CityObjects": { "plaza": {
                "type": "TransportSquare",
                "geometry": [{ "type": "MultiSurface", "boundaries": [[[0, 1, 2, 3], [4, 5, 6, 7]]] }]
            }}
        }))
        .unwrap();
        let result = triangulate(&doc);
        let area: f64 = result
            .triangles
            .iter()
            .map(|t| (t[1] - t[0]).cross(&(t[2] - t[0])).norm() / 2.0)
            .sum();
        assert!((area - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_and_line_geometries_are_ignored() {
        let doc = cube_document(json!({
            "type": "GenericCityObject",
            "geometry": [
                { "type": "MultiPoint", "boundaries": [0, 1] },
                { "type": "MultiLineString", "boundaries": [[0, 1]] }
            ]
        }));
        let result = triangulate(&doc);
        assert!(result.is_empty());
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_degenerate_surface_is_not_an_error() {
        let doc = cube_document(json!({
            "type": "Building",
            "geometry": [{ "type": "MultiSurface", "boundaries": [[[0, 1]], [], [[0, 1, 0]]] }]
        }));
        let result = triangulate(&doc);
        assert!(result.triangles.is_empty());
        assert!(result.issues.is_empty());
        assert_eq!(result.surface_count, 3);
    }
}
