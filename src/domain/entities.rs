//! Domain entities mirrored from persistent storage.

use serde::Serialize;

/// A bear as stored, with its color associations resolved to ids.
///
/// `color_ids` is sorted ascending and holds no duplicates; bears relate to
/// colors only through these ids, never through embedded references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BearRecord {
    pub id: i64,
    pub name: String,
    pub size: i64,
    pub color_ids: Vec<i64>,
}

/// A color label attachable to many bears.
///
/// `name` is stored trimmed and lowercased; uniqueness is case-insensitive.
/// Colors created implicitly while linking a bear carry an empty `hex`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorRecord {
    pub id: i64,
    pub name: String,
    pub hex: String,
}
