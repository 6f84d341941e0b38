//! Collaborator that supplies subtree content for [`IndexManager::add_tree`].
//!
//! [`IndexManager::add_tree`]: crate::manager::IndexManager::add_tree

use sn_types::IndexDocument;

use crate::error::BoxError;

/// A content node under an indexed subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub path: String,
    pub node_type: String,
}

impl TreeNode {
    pub fn new(path: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            node_type: node_type.into(),
        }
    }
}

/// Loads subtree nodes and composes their index documents.
pub trait TreeDocumentSource: Send + Sync {
    /// Every node at or below `root_path`.
    fn load_tree(&self, root_path: &str) -> Result<Vec<TreeNode>, BoxError>;

    /// The index documents of all versions of `node`.
    fn compose(&self, node: &TreeNode) -> Result<Vec<IndexDocument>, BoxError>;
}
