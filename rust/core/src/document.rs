// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CityJSON document model
//!
//! The document is read-only input: a shared vertex pool plus an
//! insertion-ordered mapping of city objects. Geometry boundaries are kept as
//! raw JSON values so that a malformed boundary tree only invalidates the
//! geometry it belongs to, never the whole document.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Document-level vertex transform (`v * scale + translate`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub scale: [f64; 3],
    pub translate: [f64; 3],
}

impl Transform {
    /// Apply the transform to a raw vertex
    #[inline]
    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        [
            v[0] * self.scale[0] + self.translate[0],
            v[1] * self.scale[1] + self.translate[1],
            v[2] * self.scale[2] + self.translate[2],
        ]
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: [1.0, 1.0, 1.0],
            translate: [0.0, 0.0, 0.0],
        }
    }
}

/// Geometry type discriminator
///
/// Unknown names deserialize to [`GeometryKind::Unknown`] instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    MultiPoint,
    MultiLineString,
    MultiSurface,
    CompositeSurface,
    Solid,
    MultiSolid,
    CompositeSolid,
    GeometryInstance,
    #[serde(other)]
    Unknown,
}

impl GeometryKind {
    /// Name as it appears in the `type` member
    pub fn name(&self) -> &'static str {
        match self {
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::MultiSurface => "MultiSurface",
            GeometryKind::CompositeSurface => "CompositeSurface",
            GeometryKind::Solid => "Solid",
            GeometryKind::MultiSolid => "MultiSolid",
            GeometryKind::CompositeSolid => "CompositeSolid",
            GeometryKind::GeometryInstance => "GeometryInstance",
            GeometryKind::Unknown => "Unknown",
        }
    }

    /// Whether this kind carries polygonal surfaces
    pub fn has_surfaces(&self) -> bool {
        matches!(
            self,
            GeometryKind::MultiSurface
                | GeometryKind::CompositeSurface
                | GeometryKind::Solid
                | GeometryKind::MultiSolid
                | GeometryKind::CompositeSolid
        )
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single geometry record of a city object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    /// Level of detail, either a number or a string such as `"2.2"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lod: Option<Value>,
    /// Nested boundary tree, depth depends on `kind`
    #[serde(default)]
    pub boundaries: Value,
    /// Why the record could not be decoded; such a geometry has no surfaces
    #[serde(skip)]
    pub malformed: Option<String>,
}

impl Geometry {
    /// Decode one geometry record, keeping an undecodable one as malformed
    pub fn from_record(record: Value) -> Self {
        match Geometry::deserialize(&record) {
            Ok(geometry) => geometry,
            Err(error) => Self::malformed(record, error.to_string()),
        }
    }

    fn malformed(record: Value, reason: String) -> Self {
        Self {
            kind: GeometryKind::Unknown,
            lod: None,
            boundaries: record,
            malformed: Some(reason),
        }
    }

    #[inline]
    pub fn is_malformed(&self) -> bool {
        self.malformed.is_some()
    }
}

/// A city object: semantic type plus zero or more geometries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityObject {
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default, deserialize_with = "lenient_geometries")]
    pub geometry: Vec<Geometry>,
}

/// A bad geometry record must not reject the whole document: each record is
/// decoded on its own, and a non-array member becomes one malformed entry.
fn lenient_geometries<'de, D>(deserializer: D) -> std::result::Result<Vec<Geometry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(records) => records.into_iter().map(Geometry::from_record).collect(),
        other => vec![Geometry::malformed(other, "geometry member is not an array".to_string())],
    })
}

/// Parsed CityJSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawDocument")]
pub struct Document {
    pub vertices: Vec<[f64; 3]>,
    #[serde(rename = "CityObjects")]
    pub objects: IndexMap<String, CityObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    vertices: Option<Vec<[f64; 3]>>,
    #[serde(default, rename = "CityObjects", alias = "objects")]
    objects: Option<IndexMap<String, CityObject>>,
    #[serde(default)]
    transform: Option<Transform>,
}

impl TryFrom<RawDocument> for Document {
    type Error = Error;

    fn try_from(raw: RawDocument) -> Result<Self> {
        Ok(Self {
            vertices: raw.vertices.ok_or(Error::MissingVertices)?,
            objects: raw.objects.ok_or(Error::MissingObjects)?,
            transform: raw.transform,
        })
    }
}

impl Document {
    /// Build a document from an already-parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawDocument = serde_json::from_value(value)?;
        raw.try_into()
    }

    /// Decode a document from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawDocument = serde_json::from_str(content)?;
        raw.try_into()
    }

    /// Number of city objects
    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of vertices in the shared pool
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Iterate objects in document order as `(index, id, object)`
    pub fn objects(&self) -> impl Iterator<Item = (usize, &str, &CityObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(index, (id, object))| (index, id.as_str(), object))
    }

    /// Object at a document-order index
    pub fn object_at(&self, index: usize) -> Option<(&str, &CityObject)> {
        self.objects
            .get_index(index)
            .map(|(id, object)| (id.as_str(), object))
    }

    /// Object ids in document order
    pub fn object_ids(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }

    /// Object type names in first-seen order, without duplicates
    pub fn object_types(&self) -> Vec<&str> {
        let mut seen = rustc_hash::FxHashSet::default();
        self.objects
            .values()
            .map(|object| object.object_type.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Vertex at `index` with the document transform applied
    #[inline]
    pub fn resolved_vertex(&self, index: usize) -> Option<[f64; 3]> {
        let v = *self.vertices.get(index)?;
        Some(match &self.transform {
            Some(transform) => transform.apply(v),
            None => v,
        })
    }

    /// All vertices with the document transform applied
    pub fn resolved_vertices(&self) -> Vec<[f64; 3]> {
        match &self.transform {
            Some(transform) => self.vertices.iter().map(|v| transform.apply(*v)).collect(),
            None => self.vertices.clone(),
        }
    }
}
