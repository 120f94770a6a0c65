// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CityJSON-Lite Geometry Processing
//!
//! Boundary traversal and surface triangulation for CityJSON geometry using
//! earcutr, with nalgebra for projection and normalization.

pub mod error;
pub mod normalize;
pub mod traversal;
pub mod triangulation;
pub mod vertex_pool;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

pub use error::{Error, Result};
pub use normalize::{BoundingSphere, Normalization};
pub use traversal::{surface_nesting, GeometryIssue, GeometryTraversal, ObjectTriangles, Surface};
pub use triangulation::{triangulate_polygon, triangulate_surface, Triangle};
pub use vertex_pool::VertexPool;
