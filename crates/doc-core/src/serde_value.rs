use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{Editor, EditorConfig, Point, Selection};
use crate::error::SnapshotError;
use crate::node::Document;
use crate::plugin::PluginRegistry;

const SCHEMA: &str = "manos-doc";
const CURRENT_VERSION: u32 = 1;

fn default_schema() -> String {
    SCHEMA.to_string()
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

/// JSON snapshot of a document tree, ids included, with the selection at
/// the time it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
}

impl DocumentValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document,
            selection: None,
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a snapshot, refusing other schemas and versions newer than
    /// this crate understands.
    pub fn from_json_str(s: &str) -> Result<Self, SnapshotError> {
        let value: Self = serde_json::from_str(s)?;
        if value.schema != SCHEMA {
            return Err(SnapshotError::UnknownSchema(value.schema));
        }
        if value.version > CURRENT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(value.version));
        }
        Ok(value)
    }
}

impl Editor {
    /// Snapshot of the current version and selection.
    pub fn to_value(&self) -> DocumentValue {
        DocumentValue {
            selection: Some(self.selection().clone()),
            ..DocumentValue::from_document(self.doc().clone())
        }
    }

    /// Loads a snapshot the same way markup is loaded: the tree is
    /// normalized against `registry` and missing or duplicate ids are minted.
    pub fn from_value(value: DocumentValue, registry: PluginRegistry, config: EditorConfig) -> Self {
        debug!(schema = %value.schema, version = value.version, "loading snapshot");
        let selection = value
            .selection
            .unwrap_or_else(|| Selection::collapsed(Point::new(Vec::new(), 0)));
        Editor::with_config(value.document, selection, registry, config)
    }
}
