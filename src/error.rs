// ❗ Error taxonomy for the budget core
//
// NotFound is expected (unknown jurisdiction or unpublished year) and maps to a 404.
// Validation means the persisted dataset is malformed; it is fatal for that
// (jurisdiction, year) and is never repaired here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BudgetError>;

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data in {context}: {}", format_issues(.issues))]
    Validation {
        context: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl BudgetError {
    pub fn not_found(what: impl Into<String>) -> Self {
        BudgetError::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BudgetError::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, BudgetError::Validation { .. })
    }
}

// ============================================================================
// VALIDATION ISSUES
// ============================================================================

/// One defect found in a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Record id (or name when the id is unknown)
    pub record: String,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(record: impl Into<String>, field: &str, message: impl Into<String>) -> Self {
        ValidationIssue {
            record: record.into(),
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.record, self.field, self.message)
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_helpers() {
        let err = BudgetError::not_found("ontario/1900");
        assert!(err.is_not_found());
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "Not found: ontario/1900");
    }

    #[test]
    fn test_validation_message_lists_all_issues() {
        let err = BudgetError::Validation {
            context: "ontario/2023".to_string(),
            issues: vec![
                ValidationIssue::new("health", "amount", "negative amount -5"),
                ValidationIssue::new("health", "id", "duplicate id"),
            ],
        };

        assert!(err.is_validation());
        let message = err.to_string();
        assert!(message.contains("ontario/2023"));
        assert!(message.contains("[health] amount: negative amount -5"));
        assert!(message.contains("[health] id: duplicate id"));
    }
}
