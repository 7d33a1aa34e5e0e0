use std::fmt;

use crate::model::Side;

/// Errors raised to the caller of a core or import/export function.
#[derive(Debug)]
pub enum BookmarkError {
    /// A tree required by the call was not supplied.
    MissingTree(Side),
    MissingNewTitle,
    /// A copy had neither a left nor a right item to copy from.
    MissingSource,
    NodeNotFound { side: Side, id: Option<String> },
    UnknownAction(String),
    UnsupportedFormat(String),
    /// The input parsed but does not have a recognizable bookmark shape.
    InvalidStructure(String),
    Parse(String),
    Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, BookmarkError>;

impl fmt::Display for BookmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookmarkError::MissingTree(side) => write!(f, "Missing {} bookmark tree", side),
            BookmarkError::MissingNewTitle => write!(f, "Missing new title for rename"),
            BookmarkError::MissingSource => write!(f, "Missing source node to copy"),
            BookmarkError::NodeNotFound { side, id: Some(id) } => {
                write!(f, "Node {} not found in {} tree", id, side)
            }
            BookmarkError::NodeNotFound { side, id: None } => {
                write!(f, "Diff has no {} node to operate on", side)
            }
            BookmarkError::UnknownAction(action) => write!(f, "Unknown operation: {}", action),
            BookmarkError::UnsupportedFormat(what) => {
                write!(f, "Unsupported bookmark format: {}", what)
            }
            BookmarkError::InvalidStructure(msg) => {
                write!(f, "Unrecognized bookmark structure: {}", msg)
            }
            BookmarkError::Parse(msg) => write!(f, "Failed to parse bookmarks: {}", msg),
            BookmarkError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for BookmarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookmarkError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BookmarkError {
    fn from(e: std::io::Error) -> Self {
        BookmarkError::Io(e)
    }
}

impl From<serde_json::Error> for BookmarkError {
    fn from(e: serde_json::Error) -> Self {
        BookmarkError::Parse(e.to_string())
    }
}
