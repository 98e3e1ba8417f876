//! ペイロード検証結果の型定義

use serde::{Deserialize, Serialize};

/// Outcome of running the payload validator over one document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationVerdict {
    /// Overall validity
    pub is_valid: bool,
    /// Hard errors (data-integrity problems)
    #[serde(default)]
    pub errors: Vec<String>,
    /// Soft warnings (items skipped by business rules)
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Items that passed every rule
    pub valid_matches: usize,
    /// Items inspected
    pub total_matches: usize,
}

impl ValidationVerdict {
    /// Invalid verdict with a single hard error and zero counts.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
            valid_matches: 0,
            total_matches: 0,
        }
    }
}
