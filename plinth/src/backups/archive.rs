use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An archive as reported by the repository backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    pub name: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Backend specific fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveList {
    #[serde(default)]
    pub archives: Vec<Archive>,
}

/// An archive copied to an export location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    pub location: PathBuf,
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportList {
    #[serde(default)]
    pub exports: Vec<Export>,
}
