use thiserror::Error;

use crate::ops::Path;

/// Why a transaction was rejected. The document is unchanged whenever one of
/// these is returned from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("structural violation: {0}")]
    StructuralViolation(String),

    #[error("normalization did not settle in region {region:?} after {iterations} repairs")]
    NormalizationDeadlock { region: Path, iterations: usize },
}

impl EditError {
    pub fn violation(message: impl Into<String>) -> Self {
        EditError::StructuralViolation(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PathError(pub String);

impl From<PathError> for EditError {
    fn from(value: PathError) -> Self {
        EditError::StructuralViolation(value.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<EditError> for CommandError {
    fn from(value: EditError) -> Self {
        CommandError::new(value.to_string())
    }
}

/// Problems recovered while reading the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("no plugin claims <{tag}>; kept its children")]
    UnclaimedMarkup { tag: String },

    #[error("malformed markup at byte {position}: {message}")]
    MalformedMarkup { position: u64, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate node type: {0}")]
    DuplicateNodeType(String),

    #[error("duplicate command id: {0}")]
    DuplicateCommand(String),
}

/// Why a JSON snapshot could not be read or written.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid snapshot json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown snapshot schema: {0}")]
    UnknownSchema(String),

    #[error("snapshot version {0} is newer than this editor")]
    UnsupportedVersion(u32),
}
