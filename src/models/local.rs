use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An image file available locally for annotation.
///
/// Files are matched against remote state by `name` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalFile {
    pub name: String,
    pub path: PathBuf,
}

impl LocalFile {
    /// Build a file record, deriving the name from the last path component.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }
}
