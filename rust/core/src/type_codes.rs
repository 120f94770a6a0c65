// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Object type coding
//!
//! Maps object type names to small stable integers used for per-vertex
//! tagging and color lookup. Codes are assigned in first-seen order: a seeded
//! table keeps its codes, and types discovered in a document are appended in
//! document order. The table is built once per parse run and never mutated
//! afterwards.

use crate::document::Document;
use rustc_hash::FxHashMap;

/// Code given to types that could not be assigned because the table is full
pub const UNASSIGNED_TYPE_CODE: u8 = u8::MAX;

/// Maximum number of named entries (codes `0..=254`)
pub const MAX_TYPE_CODES: usize = UNASSIGNED_TYPE_CODE as usize;

/// Default display colors for the CityJSON object types, in code order
pub const DEFAULT_OBJECT_COLORS: [(&str, u32); 21] = [
    ("Building", 0x7497df),
    ("BuildingPart", 0x7497df),
    ("BuildingInstallation", 0x7497df),
    ("Bridge", 0x999999),
    ("BridgePart", 0x999999),
    ("BridgeInstallation", 0x999999),
    ("BridgeConstructionElement", 0x999999),
    ("CityObjectGroup", 0xffffb3),
    ("CityFurniture", 0xcc0000),
    ("GenericCityObject", 0xcc0000),
    ("LandUse", 0xffffb3),
    ("PlantCover", 0x39ac39),
    ("Railway", 0x000000),
    ("Road", 0x999999),
    ("SolitaryVegetationObject", 0x39ac39),
    ("TINRelief", 0xffdb99),
    ("TransportSquare", 0x999999),
    ("Tunnel", 0x999999),
    ("TunnelPart", 0x999999),
    ("TunnelInstallation", 0x999999),
    ("WaterBody", 0x4da6ff),
];

/// One entry of the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    pub name: String,
    /// Display color as `0xRRGGBB`, when known
    pub color: Option<u32>,
}

/// Ordered object type → code table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCodeTable {
    entries: Vec<TypeEntry>,
    index: FxHashMap<String, u8>,
}

impl TypeCodeTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from type names in first-seen order
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for name in names {
            table.insert(name.as_ref(), None);
        }
        table
    }

    /// Build a table from `(type name, color)` pairs; pair order is code order
    pub fn from_colors<I, S>(colors: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for (name, color) in colors {
            table.insert(name.as_ref(), Some(color));
        }
        table
    }

    /// The standard CityJSON object types with their default colors
    pub fn with_default_colors() -> Self {
        Self::from_colors(DEFAULT_OBJECT_COLORS)
    }

    /// Table for one parse run: the seed's codes first, then every type of
    /// `document` not yet present, in document order
    pub fn for_document(seed: Option<&TypeCodeTable>, document: &Document) -> Self {
        let mut table = seed.cloned().unwrap_or_default();
        for name in document.object_types() {
            table.insert(name, None);
        }
        table
    }

    fn insert(&mut self, name: &str, color: Option<u32>) -> u8 {
        if let Some(&code) = self.index.get(name) {
            return code;
        }
        if self.entries.len() >= MAX_TYPE_CODES {
            return UNASSIGNED_TYPE_CODE;
        }
        let code = self.entries.len() as u8;
        self.entries.push(TypeEntry {
            name: name.to_string(),
            color,
        });
        self.index.insert(name.to_string(), code);
        code
    }

    /// Code of a type name, if assigned
    #[inline]
    pub fn code(&self, name: &str) -> Option<u8> {
        self.index.get(name).copied()
    }

    /// Code of a type name, or [`UNASSIGNED_TYPE_CODE`]
    #[inline]
    pub fn code_or_unassigned(&self, name: &str) -> u8 {
        self.code(name).unwrap_or(UNASSIGNED_TYPE_CODE)
    }

    /// Type name for a code
    pub fn name(&self, code: u8) -> Option<&str> {
        self.entries.get(code as usize).map(|e| e.name.as_str())
    }

    /// Display color for a code
    pub fn color(&self, code: u8) -> Option<u32> {
        self.entries.get(code as usize).and_then(|e| e.color)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in code order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &TypeEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(code, entry)| (code as u8, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(types: &[&str]) -> Document {
        let objects: Vec<String> = types
            .iter()
            .enumerate()
            .map(|(i, t)| format!(r#""o{i}": {{"type": "{t}"}}"#))
            .collect();
        let json = format!(r#"{{"vertices": [], "CityObjects": {{{}}}}}"#, objects.join(","));
        Document::from_json_str(&json).unwrap()
    }

    #[test]
    fn test_first_seen_order() {
        let table = TypeCodeTable::from_names(["Road", "Building", "Road", "WaterBody"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.code("Road"), Some(0));
        assert_eq!(table.code("Building"), Some(1));
        assert_eq!(table.code("WaterBody"), Some(2));
        assert_eq!(table.name(1), Some("Building"));
    }

    #[test]
    fn test_default_colors() {
        let table = TypeCodeTable::with_default_colors();
        assert_eq!(table.len(), 21);
        assert_eq!(table.code("Building"), Some(0));
        assert_eq!(table.code("WaterBody"), Some(20));
        assert_eq!(table.color(20), Some(0x4da6ff));
    }

    #[test]
    fn test_seed_keeps_codes_and_appends_new_types() {
        let seed = TypeCodeTable::from_colors([("WaterBody", 0x0000ff), ("Building", 0xff0000)]);
        let doc = document(&["Building", "Bridge", "WaterBody", "Bridge"]);

        let table = TypeCodeTable::for_document(Some(&seed), &doc);
        assert_eq!(table.code("WaterBody"), Some(0));
        assert_eq!(table.code("Building"), Some(1));
        assert_eq!(table.code("Bridge"), Some(2));
        assert_eq!(table.color(2), None);
    }

    #[test]
    fn test_same_seed_same_assignment() {
        let seed = TypeCodeTable::with_default_colors();
        let doc = document(&["Custom", "Road", "Other"]);

        let first = TypeCodeTable::for_document(Some(&seed), &doc);
        let second = TypeCodeTable::for_document(Some(&seed), &doc);
        assert_eq!(first, second);
        assert_eq!(first.code("Custom"), Some(21));
        assert_eq!(first.code("Other"), Some(22));
    }

    #[test]
    fn test_full_table_yields_unassigned() {
        let names: Vec<String> = (0..300).map(|i| format!("T{i}")).collect();
        let table = TypeCodeTable::from_names(&names);
        assert_eq!(table.len(), MAX_TYPE_CODES);
        assert_eq!(table.code("T254"), Some(254));
        assert_eq!(table.code("T255"), None);
        assert_eq!(table.code_or_unassigned("T299"), UNASSIGNED_TYPE_CODE);
    }
}
