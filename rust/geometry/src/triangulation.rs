// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation utilities
//!
//! Wrapper around earcutr for planar surfaces with holes. Surfaces are
//! projected onto their own plane, triangulated in 2D and re-lifted using the
//! original 3D coordinates. Emitted triangles keep the orientation of the
//! outer ring.

use crate::{Error, Point2, Point3, Result, Vector3};

/// A triangle with resolved 3D positions
pub type Triangle = [Point3<f64>; 3];

/// Normals shorter than this are treated as zero-area polygons
const AREA_EPSILON: f64 = 1e-10;

/// Check if a polygon is convex (all cross products have same sign)
#[inline]
fn is_convex(points: &[Point2<f64>]) -> bool {
    if points.len() < 3 {
        return false;
    }

    let n = points.len();
    let mut sign = 0i8;

    for i in 0..n {
        let p0 = &points[i];
        let p1 = &points[(i + 1) % n];
        let p2 = &points[(i + 2) % n];

        // Cross product of edges
        let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);

        if cross.abs() > 1e-10 {
            let current_sign = if cross > 0.0 { 1i8 } else { -1i8 };
            if sign == 0 {
                sign = current_sign;
            } else if sign != current_sign {
                return false; // Sign changed - not convex
            }
        }
    }

    true
}

/// Simple fan triangulation for convex polygons
#[inline]
fn fan_triangulate(n: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity((n - 2) * 3);
    for i in 1..n - 1 {
        indices.push(0);
        indices.push(i);
        indices.push(i + 1);
    }
    indices
}

/// Twice the signed area of a 2D triangle (positive = counter-clockwise)
#[inline]
fn signed_area_2x(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Triangulate a simple polygon (no holes)
/// Returns triangle indices into the input points; fewer than 3 points yield none
#[inline]
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    let n = points.len();

    if n < 3 {
        return Ok(Vec::new());
    }

    // FAST PATH: Triangle - no triangulation needed
    if n == 3 {
        return Ok(vec![0, 1, 2]);
    }

    // FAST PATH: Convex polygon - use fan triangulation
    if n <= 8 && is_convex(points) {
        return Ok(fan_triangulate(n));
    }

    // Flatten points for earcutr
    let mut vertices = Vec::with_capacity(n * 2);
    for p in points {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    let indices = earcutr::earcut(&vertices, &[], 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;

    Ok(indices)
}

/// Triangulate a polygon with holes
/// Returns triangle indices into the combined vertex array (outer + all holes
/// with at least 3 points, in order)
#[inline]
pub fn triangulate_polygon_with_holes(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Vec<usize>> {
    if outer.len() < 3 {
        return Ok(Vec::new());
    }

    let valid_holes: Vec<&Vec<Point2<f64>>> = holes.iter().filter(|h| h.len() >= 3).collect();

    if valid_holes.is_empty() {
        return triangulate_polygon(outer);
    }

    let total_points: usize = outer.len() + valid_holes.iter().map(|h| h.len()).sum::<usize>();
    let mut vertices = Vec::with_capacity(total_points * 2);

    for p in outer {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    // Holes are appended after the outer ring; earcutr needs their start indices
    let mut hole_indices = Vec::with_capacity(valid_holes.len());
    for hole in valid_holes {
        hole_indices.push(vertices.len() / 2);
        for p in hole {
            vertices.push(p.x);
            vertices.push(p.y);
        }
    }

    let indices = earcutr::earcut(&vertices, &hole_indices, 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;

    Ok(indices)
}

/// Project 3D points onto a 2D plane defined by a normal
/// Returns 2D points and the coordinate system (u_axis, v_axis, origin)
///
/// The basis is right-handed around `normal`, so a ring that is
/// counter-clockwise around its normal projects to a positive-area polygon.
#[inline]
pub fn project_to_2d(
    points_3d: &[Point3<f64>],
    normal: &Vector3<f64>,
) -> (Vec<Point2<f64>>, Vector3<f64>, Vector3<f64>, Point3<f64>) {
    if points_3d.is_empty() {
        return (
            Vec::new(),
            Vector3::zeros(),
            Vector3::zeros(),
            Point3::origin(),
        );
    }

    let origin = points_3d[0];

    // Find the axis least parallel to the normal for stable cross product
    let abs_x = normal.x.abs();
    let abs_y = normal.y.abs();
    let abs_z = normal.z.abs();

    let reference = if abs_x <= abs_y && abs_x <= abs_z {
        Vector3::new(1.0, 0.0, 0.0)
    } else if abs_y <= abs_z {
        Vector3::new(0.0, 1.0, 0.0)
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    };

    let u_axis = normal.cross(&reference).normalize();
    let v_axis = normal.cross(&u_axis).normalize();

    let points_2d = project_to_2d_with_basis(points_3d, &u_axis, &v_axis, &origin);

    (points_2d, u_axis, v_axis, origin)
}

/// Project 3D points using an existing coordinate system
/// This ensures outer boundary and holes share the same 2D space
#[inline]
pub fn project_to_2d_with_basis(
    points_3d: &[Point3<f64>],
    u_axis: &Vector3<f64>,
    v_axis: &Vector3<f64>,
    origin: &Point3<f64>,
) -> Vec<Point2<f64>> {
    points_3d
        .iter()
        .map(|p| {
            let v = p - origin;
            Point2::new(v.dot(u_axis), v.dot(v_axis))
        })
        .collect()
}

/// Unit normal of a polygon using Newell's method
///
/// The normal follows the ring orientation (counter-clockwise around it).
/// Returns `None` for zero-area or under-determined rings.
#[inline]
pub fn polygon_normal(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    let n = points.len();
    if n < 3 {
        return None;
    }

    let mut normal = Vector3::<f64>::zeros();

    for i in 0..n {
        let current = &points[i];
        let next = &points[(i + 1) % n];

        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }

    let len = normal.norm();
    if len > AREA_EPSILON {
        Some(normal / len)
    } else {
        None
    }
}

/// Remove consecutive duplicate points and an explicit closing point
pub fn dedup_ring(points: &[Point3<f64>]) -> Vec<Point3<f64>> {
    let mut ring: Vec<Point3<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if ring.last() != Some(p) {
            ring.push(*p);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Triangulate one planar surface: an outer ring plus zero or more holes
///
/// Degenerate surfaces (fewer than 3 distinct points, zero area) produce no
/// triangles and are not an error. Every returned triangle has the same
/// orientation as the outer ring.
pub fn triangulate_surface(
    outer: &[Point3<f64>],
    holes: &[Vec<Point3<f64>>],
) -> Result<Vec<Triangle>> {
    let outer = dedup_ring(outer);
    if outer.len() < 3 {
        return Ok(Vec::new());
    }

    let Some(normal) = polygon_normal(&outer) else {
        return Ok(Vec::new());
    };

    // FAST PATH: Triangle without holes
    if outer.len() == 3 && holes.is_empty() {
        return Ok(vec![[outer[0], outer[1], outer[2]]]);
    }

    let holes: Vec<Vec<Point3<f64>>> = holes
        .iter()
        .map(|h| dedup_ring(h))
        .filter(|h| h.len() >= 3)
        .collect();

    let (outer_2d, u_axis, v_axis, origin) = project_to_2d(&outer, &normal);
    let holes_2d: Vec<Vec<Point2<f64>>> = holes
        .iter()
        .map(|h| project_to_2d_with_basis(h, &u_axis, &v_axis, &origin))
        .collect();

    let indices = triangulate_polygon_with_holes(&outer_2d, &holes_2d)?;

    // Combined lookup tables in the same order earcutr saw them
    let mut points_3d: Vec<Point3<f64>> = outer;
    let mut points_2d: Vec<Point2<f64>> = outer_2d;
    for (hole, hole_2d) in holes.into_iter().zip(holes_2d) {
        points_3d.extend(hole);
        points_2d.extend(hole_2d);
    }

    let mut triangles = Vec::with_capacity(indices.len() / 3);
    for tri in indices.chunks_exact(3) {
        let (a, mut b, mut c) = (tri[0], tri[1], tri[2]);
        let area = signed_area_2x(&points_2d[a], &points_2d[b], &points_2d[c]);
        if area.abs() <= AREA_EPSILON * AREA_EPSILON {
            continue;
        }
        // Outer ring projects counter-clockwise; keep every triangle that way
        if area < 0.0 {
            std::mem::swap(&mut b, &mut c);
        }
        triangles.push([points_3d[a], points_3d[b], points_3d[c]]);
    }

    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area_3d(tri: &Triangle) -> f64 {
        (tri[1] - tri[0]).cross(&(tri[2] - tri[0])).norm() / 2.0
    }

    fn square(min: f64, max: f64, z: f64) -> Vec<Point3<f64>> {
        vec![
            Point3::new(min, min, z),
            Point3::new(max, min, z),
            Point3::new(max, max, z),
            Point3::new(min, max, z),
        ]
    }

    #[test]
    fn test_triangulate_square() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];

        let indices = triangulate_polygon(&points).unwrap();

        // Square should be split into 2 triangles = 6 indices
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn test_triangulate_insufficient_points() {
        let points = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];

        let indices = triangulate_polygon(&points).unwrap();
        assert!(indices.is_empty());
    }

    #[test]
    fn test_triangulate_with_multiple_holes() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 0.0),
            Point2::new(20.0, 20.0),
            Point2::new(0.0, 20.0),
        ];

        let hole1 = vec![
            Point2::new(2.0, 2.0),
            Point2::new(5.0, 2.0),
            Point2::new(5.0, 5.0),
            Point2::new(2.0, 5.0),
        ];

        let hole2 = vec![
            Point2::new(10.0, 10.0),
            Point2::new(15.0, 10.0),
            Point2::new(15.0, 15.0),
            Point2::new(10.0, 15.0),
        ];

        let indices = triangulate_polygon_with_holes(&outer, &[hole1, hole2]).unwrap();

        assert!(indices.len() > 6);
        assert_eq!(indices.len() % 3, 0);
    }

    #[test]
    fn test_polygon_normal_follows_orientation() {
        let ccw = square(0.0, 1.0, 0.0);
        let normal = polygon_normal(&ccw).unwrap();
        assert!((normal.z - 1.0).abs() < 1e-9);

        let cw: Vec<_> = ccw.into_iter().rev().collect();
        let normal = polygon_normal(&cw).unwrap();
        assert!((normal.z + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_ring_is_degenerate() {
        let ring = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert!(polygon_normal(&ring).is_none());
        assert!(triangulate_surface(&ring, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_dedup_ring_drops_closing_point() {
        let mut ring = square(0.0, 1.0, 0.0);
        ring.insert(1, ring[0]);
        ring.push(ring[0]);
        assert_eq!(dedup_ring(&ring), square(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_repeated_points_below_three_distinct() {
        let p = Point3::new(1.0, 1.0, 1.0);
        let q = Point3::new(2.0, 1.0, 1.0);
        let tris = triangulate_surface(&[p, q, p, q], &[]).unwrap();
        assert!(tris.is_empty());
    }

    #[test]
    fn test_square_with_hole_area_and_centroids() {
        let outer = square(0.0, 10.0, 2.0);
        let hole: Vec<_> = square(3.0, 7.0, 2.0).into_iter().rev().collect();

        let tris = triangulate_surface(&outer, &[hole]).unwrap();
        assert!(tris.len() > 2);

        let total: f64 = tris.iter().map(area_3d).sum();
        assert!((total - (100.0 - 16.0)).abs() < 1e-6);

        for tri in &tris {
            let c = (tri[0].coords + tri[1].coords + tri[2].coords) / 3.0;
            let inside_hole = c.x > 3.0 && c.x < 7.0 && c.y > 3.0 && c.y < 7.0;
            assert!(!inside_hole, "centroid {:?} lies in the hole", c);
        }
    }

    #[test]
    fn test_winding_matches_input_orientation() {
        let ccw = square(0.0, 10.0, 0.0);
        let hole = square(3.0, 7.0, 0.0);
        for tri in triangulate_surface(&ccw, &[hole.clone()]).unwrap() {
            let n = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
            assert!(n.z > 0.0);
        }

        let cw: Vec<_> = ccw.into_iter().rev().collect();
        for tri in triangulate_surface(&cw, &[hole]).unwrap() {
            let n = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
            assert!(n.z < 0.0);
        }
    }

    #[test]
    fn test_concave_polygon() {
        // L-shape, area 3
        let outer = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let tris = triangulate_surface(&outer, &[]).unwrap();
        assert_eq!(tris.len(), 4);
        let total: f64 = tris.iter().map(area_3d).sum();
        assert!((total - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_wall() {
        // Wall in the XZ plane
        let wall = vec![
            Point3::new(0.0, 5.0, 0.0),
            Point3::new(4.0, 5.0, 0.0),
            Point3::new(4.0, 5.0, 3.0),
            Point3::new(0.0, 5.0, 3.0),
        ];
        let tris = triangulate_surface(&wall, &[]).unwrap();
        assert_eq!(tris.len(), 2);
        let total: f64 = tris.iter().map(area_3d).sum();
        assert!((total - 12.0).abs() < 1e-9);
        for tri in &tris {
            assert!(tri.iter().all(|p| (p.y - 5.0).abs() < 1e-12));
        }
    }

    #[test]
    fn test_triangulation_is_deterministic() {
        let outer = square(0.0, 10.0, 0.0);
        let hole: Vec<_> = square(2.0, 4.0, 0.0).into_iter().rev().collect();
        let first = triangulate_surface(&outer, &[hole.clone()]).unwrap();
        let second = triangulate_surface(&outer, &[hole]).unwrap();
        assert_eq!(first, second);
    }
}
