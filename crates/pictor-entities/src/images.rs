//! Image record entity
//!
//! One document per catalog image. The `id` is the document key in the
//! document store; `name` is the filename the blob store addresses the
//! binary under (`images/<name>`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Document key, unique per record
    #[serde(rename = "_id")]
    pub id: String,
    /// Blob filename; the object store addresses the binary as `images/<name>`
    pub name: String,
    /// Stamped on every upsert
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    /// Additional caller-supplied fields (caption, dimensions, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ImageRecord {
    /// Create a record with the current time as `updated_at` and no metadata
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            updated_at: Utc::now(),
            metadata: None,
        }
    }

    /// Attach caller metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Re-stamp `updated_at` with the current time
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
