use serde::Deserialize;

/// One changed file as reported by the pull-request files endpoint.
///
/// `patch` is absent for binary files and for files GitHub declines to
/// render a patch for (very large diffs); those are not reviewable.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangedFile {
    /// Repository-relative path (e.g., "src/auth/config.rs")
    pub filename: String,
    /// Unified diff hunk text for this file, when available
    pub patch: Option<String>,
}

impl ChangedFile {
    /// Binary or patchless files carry no diff to review.
    pub fn is_binary_or_patchless(&self) -> bool {
        self.patch.is_none()
    }
}

/// Read-only view of a comment already attached to the PR.
#[derive(Debug, Clone, Deserialize)]
pub struct ExistingComment {
    pub id: u64,
    pub body: String,
}

/// Represents the parsed components of a GitHub PR URL.
#[derive(Debug, Clone)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed_file_patchless_is_binary() {
        let file = ChangedFile {
            filename: "logo.png".to_string(),
            patch: None,
        };
        assert!(file.is_binary_or_patchless());
    }

    #[test]
    fn test_changed_file_deserializes_without_patch() {
        let json = r#"{"filename": "logo.png", "status": "added"}"#;
        let file: ChangedFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.filename, "logo.png");
        assert!(file.patch.is_none());
    }
}
