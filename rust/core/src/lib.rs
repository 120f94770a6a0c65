// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CityJSON-Lite Core
//!
//! Document model for CityJSON city models and the object type coding shared
//! by the triangulation pipeline and the presentation layer.
//!
//! ## Overview
//!
//! - **Document**: shared vertex pool, insertion-ordered city objects and an
//!   optional document-level transform
//! - **Geometry records**: kind discriminator plus a raw boundary tree whose
//!   depth depends on the kind
//! - **Type codes**: deterministic object type → `u8` assignment
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cityjson_lite_core::{Document, TypeCodeTable};
//!
//! let doc = Document::from_json_str(content)?;
//! let table = TypeCodeTable::for_document(Some(&TypeCodeTable::with_default_colors()), &doc);
//!
//! for (index, id, object) in doc.objects() {
//!     println!("#{} {} -> code {}", index, id, table.code_or_unassigned(&object.object_type));
//! }
//! ```

pub mod document;
pub mod error;
pub mod type_codes;

pub use document::{CityObject, Document, Geometry, GeometryKind, Transform};
pub use error::{Error, Result};
pub use type_codes::{
    TypeCodeTable, TypeEntry, DEFAULT_OBJECT_COLORS, MAX_TYPE_CODES, UNASSIGNED_TYPE_CODE,
};
