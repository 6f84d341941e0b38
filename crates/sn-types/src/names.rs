//! Well-known index field names.

/// Unique key of a document: one document per content version.
pub const VERSION_ID: &str = "VersionId";
pub const NODE_ID: &str = "NodeId";
pub const VERSION: &str = "Version";
pub const PATH: &str = "Path";
/// Every ancestor path of the content, lowercased, including its own path.
pub const IN_TREE: &str = "InTree";
pub const NODE_TYPE: &str = "Type";
pub const NAME: &str = "Name";

pub const IS_MAJOR: &str = "IsMajor";
pub const IS_PUBLIC: &str = "IsPublic";
pub const IS_LAST_PUBLIC: &str = "IsLastPublic";
pub const IS_LAST_DRAFT: &str = "IsLastDraft";

/// Lowercased paths of `path` and all its ancestors, root first.
///
/// `/Root/A/b` yields `/root`, `/root/a`, `/root/a/b`.
pub fn in_tree_values(path: &str) -> Vec<String> {
    let lower = path.trim_end_matches('/').to_lowercase();
    let mut values = Vec::new();
    let mut current = String::new();
    for segment in lower.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        values.push(current.clone());
    }
    values
}

/// Lowercased path without a trailing slash, the form of the `InTree` keywords.
///
/// The `Path` field itself keeps the path as given.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    trimmed.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_tree_values() {
        assert_eq!(
            in_tree_values("/Root/A/b"),
            vec!["/root", "/root/a", "/root/a/b"]
        );
        assert_eq!(in_tree_values("/Root/"), vec!["/root"]);
        assert!(in_tree_values("/").is_empty());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/Root/A/"), "/root/a");
        assert_eq!(normalize_path("/"), "/");
    }
}
