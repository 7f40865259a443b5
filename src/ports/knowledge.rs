//! Knowledge port: read-only reference lookups.
//!
//! Lookups are keyed by exact string match and return `None` for anything the
//! reference tables do not cover; callers decide whether to omit or warn.

use crate::domain::Precautions;

/// Read-only severity, description and precaution lookups.
pub trait KnowledgeSource: Send + Sync {
    /// Integer severity weight of a symptom.
    fn severity(&self, symptom: &str) -> Option<i64>;

    /// Free-text description of a disease.
    fn description(&self, disease: &str) -> Option<&str>;

    /// The four precautions for a disease.
    fn precautions(&self, disease: &str) -> Option<&Precautions>;

    /// Whether a symptom has a severity entry.
    fn has_severity(&self, symptom: &str) -> bool {
        self.severity(symptom).is_some()
    }
}
