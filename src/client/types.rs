//! Result shapes for client operations

use serde::{Deserialize, Serialize};

use crate::request::XmlNode;

/// One entry of a container listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEntry {
    pub name: String,
    /// Creation timestamp as reported by the provider
    pub created: Option<String>,
}

impl ContainerEntry {
    pub(crate) fn from_node(node: &XmlNode) -> Option<Self> {
        Some(Self {
            name: node.child_text("Name")?.to_string(),
            created: node.child_text("CreationDate").map(str::to_string),
        })
    }
}

/// One blob of a blob listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub name: String,
    pub size: u64,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

impl BlobEntry {
    pub(crate) fn from_node(node: &XmlNode) -> Option<Self> {
        Some(Self {
            name: node.child_text("Key")?.to_string(),
            size: node.child_text("Size").and_then(|s| s.parse().ok()).unwrap_or(0),
            last_modified: node.child_text("LastModified").map(str::to_string),
            etag: node.child_text("ETag").map(str::to_string),
        })
    }
}

/// One page of blobs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobListing {
    pub blobs: Vec<BlobEntry>,
    /// Pseudo-directories (common prefixes) when a delimiter was given
    pub dir_names: Vec<String>,
    /// More results follow; continue with `marker` set to the last name
    pub has_next: bool,
}

impl BlobListing {
    pub(crate) fn from_node(root: &XmlNode) -> Self {
        Self {
            blobs: root.children_named("Contents").filter_map(BlobEntry::from_node).collect(),
            dir_names: root
                .children_named("CommonPrefixes")
                .filter_map(|p| p.child_text("Prefix"))
                .map(str::to_string)
                .collect(),
            has_next: root.child_text("IsTruncated") == Some("true"),
        }
    }
}

/// Outcome of a container create or delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    /// Create found the container already owned by the caller
    pub already_created: bool,
    /// Delete found nothing to delete
    pub not_found: bool,
}

/// Outcome of a blob delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStatus {
    pub name: String,
    pub not_found: bool,
}

/// Listing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub marker: Option<String>,
    pub max_results: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            delimiter: None,
            marker: None,
            max_results: 1000,
        }
    }
}
