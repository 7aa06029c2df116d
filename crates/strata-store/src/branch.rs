//! Branches: named, movable pointers to a head revision.
//!
//! Branch names are optional labels for display. Valid names:
//! - Must be non-empty
//! - Must not contain control characters or `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..`
//! - Must not start or end with `.`, `/` or whitespace

use serde::{Deserialize, Serialize};
use strata_types::{BranchId, RevisionNumber};

use crate::error::{StoreError, StoreResult};

const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

/// A branch of one persistent root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub head: RevisionNumber,
    pub name: Option<String>,
}

impl Branch {
    pub fn new(id: BranchId, head: RevisionNumber) -> Self {
        Self {
            id,
            head,
            name: None,
        }
    }

    /// Human-readable label, falling back to the short UUID.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.short_id())
    }
}

/// Validate a branch name, returning `Ok(())` if valid.
pub fn validate_branch_name(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidBranchName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.chars().any(|c| c.is_control() || FORBIDDEN_CHARS.contains(&c)) {
        return Err(invalid("contains a forbidden character"));
    }
    if name.contains("..") {
        return Err(invalid("must not contain '..'"));
    }
    let edge = |c: char| c == '.' || c == '/' || c.is_whitespace();
    if name.starts_with(edge) || name.ends_with(edge) {
        return Err(invalid("must not start or end with '.', '/' or whitespace"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["main", "feature/auth", "draft 2", "v1.0"] {
            assert!(validate_branch_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn invalid_names() {
        for name in ["", "a..b", ".hidden", "trailing/", " padded", "tab\there", "what?"] {
            assert!(
                matches!(
                    validate_branch_name(name),
                    Err(StoreError::InvalidBranchName { .. })
                ),
                "{name:?}"
            );
        }
    }

    #[test]
    fn label_falls_back_to_short_id() {
        let mut branch = Branch::new(BranchId::new(), 0);
        assert_eq!(branch.label(), branch.id.short_id());
        branch.name = Some("main".into());
        assert_eq!(branch.label(), "main");
    }
}
