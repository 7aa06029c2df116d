use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of change a revision records.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitType {
    /// Genesis revision of a persistent root.
    Creation,
    /// Ordinary edit of the working copy.
    Edit,
    /// Commit of a working copy that was reverted to an earlier state.
    Revert,
    /// Commit persisting a rollback to an earlier revision.
    Rollback,
    /// Commit applying the inverse of an earlier revision.
    SelectiveUndo,
    /// Merge commit with a merge parent.
    Merge,
    /// Application-defined type.
    Custom(String),
}

impl CommitType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creation => "creation",
            Self::Edit => "edit",
            Self::Revert => "revert",
            Self::Rollback => "rollback",
            Self::SelectiveUndo => "selective-undo",
            Self::Merge => "merge",
            Self::Custom(label) => label,
        }
    }
}

impl Default for CommitType {
    fn default() -> Self {
        Self::Edit
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(CommitType::SelectiveUndo.to_string(), "selective-undo");
        assert_eq!(CommitType::Custom("import".into()).as_str(), "import");
        assert_eq!(CommitType::default(), CommitType::Edit);
    }
}
