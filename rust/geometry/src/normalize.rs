// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalization transform
//!
//! City models are georeferenced: coordinates in the hundreds of thousands
//! lose sub-metre precision once converted to f32. The normalization
//! transform (uniform scale + translation) is applied in f64 before any
//! position is narrowed, mapping the model into the unit sphere around the
//! origin.

use nalgebra::{Matrix4, Point3, Vector3};

/// Bounding sphere in f64 precision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Point3<f64>,
    pub radius: f64,
}

impl BoundingSphere {
    /// Sphere centred on the axis-aligned bounding box, with the radius
    /// reaching the farthest point. Returns `None` for an empty point set.
    pub fn from_points(points: &[Point3<f64>]) -> Option<Self> {
        let first = points.first()?;

        let mut min = *first;
        let mut max = *first;
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        let center = nalgebra::center(&min, &max);
        let radius_sq = points
            .iter()
            .map(|p| (p - center).norm_squared())
            .fold(0.0f64, f64::max);

        Some(Self {
            center,
            radius: radius_sq.sqrt(),
        })
    }
}

/// Uniform scale followed by translation: `p' = scale * p + translation`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub scale: f64,
    pub translation: Vector3<f64>,
}

impl Normalization {
    /// Create a new normalization transform
    #[inline]
    pub fn new(scale: f64, translation: Vector3<f64>) -> Self {
        Self { scale, translation }
    }

    /// Transform that leaves positions unchanged
    #[inline]
    pub fn identity() -> Self {
        Self::new(1.0, Vector3::zeros())
    }

    /// Fit a bounding sphere into the unit sphere at the origin
    ///
    /// scale = `1 / radius` (1 for a zero radius), translation = `-scale * center`
    pub fn from_bounding_sphere(sphere: &BoundingSphere) -> Self {
        let scale = if sphere.radius > 0.0 {
            1.0 / sphere.radius
        } else {
            1.0
        };
        Self::new(scale, -sphere.center.coords * scale)
    }

    /// Normalization for a point set; identity when the set is empty
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        BoundingSphere::from_points(points)
            .map(|sphere| Self::from_bounding_sphere(&sphere))
            .unwrap_or_else(Self::identity)
    }

    /// Accept an externally supplied matrix if it is a uniform scale plus
    /// translation; any rotation, shear or projective part yields `None`
    pub fn from_matrix(matrix: &Matrix4<f64>) -> Option<Self> {
        const TOLERANCE: f64 = 1e-12;

        let scale = matrix[(0, 0)];
        for row in 0..3 {
            for col in 0..3 {
                let expected = if row == col { scale } else { 0.0 };
                if (matrix[(row, col)] - expected).abs() > TOLERANCE * scale.abs().max(1.0) {
                    return None;
                }
            }
        }
        let projective = matrix.fixed_view::<1, 4>(3, 0);
        if projective[0].abs() > TOLERANCE
            || projective[1].abs() > TOLERANCE
            || projective[2].abs() > TOLERANCE
            || (projective[3] - 1.0).abs() > TOLERANCE
        {
            return None;
        }

        Some(Self::new(
            scale,
            Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]),
        ))
    }

    /// Apply the transform in f64
    #[inline]
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(point.coords * self.scale + self.translation)
    }

    /// Apply the transform and narrow to f32 for a vertex buffer
    #[inline]
    pub fn apply_f32(&self, point: &Point3<f64>) -> [f32; 3] {
        let p = self.apply(point);
        [p.x as f32, p.y as f32, p.z as f32]
    }

    /// Homogeneous 4x4 form
    #[rustfmt::skip]
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let s = self.scale;
        let t = &self.translation;
        Matrix4::new(
            s, 0.0, 0.0, t.x,
            0.0, s, 0.0, t.y,
            0.0, 0.0, s, t.z,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Check if the transform is the identity
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.translation == Vector3::zeros()
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Self::identity()
    }
}
