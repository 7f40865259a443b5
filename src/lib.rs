//! # Symptomatic
//!
//! Symptom-driven diagnosis engine.
//!
//! This crate provides:
//! - A decision-tree interview that narrows a confirmed symptom down to a
//!   disease group through yes/no follow-up questions
//! - An independent TF-IDF text classifier that corroborates the tree
//! - Severity-weighted triage and reference lookups (descriptions, precautions)
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core interview types (vocabulary, corpus, session, triage)
//! - `ports`: Trait definitions for the verifier and the reference tables
//! - `adapters`: Concrete implementations (CSV tables, CART tree, TF-IDF)
//! - `application`: The engine and the interview use cases

pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub use application::{Engine, EngineConfig, EngineSources, EvaluationReport, InterviewService};
pub use domain::{
    DiagnosisResult, InterviewSession, InterviewState, InterviewStep, MatchResult,
    Recommendation,
};

/// Result type for Symptomatic operations
pub type Result<T> = std::result::Result<T, SymptomaticError>;

/// Main error type for Symptomatic
#[derive(Debug, thiserror::Error)]
pub enum SymptomaticError {
    #[error("Engine initialization failed: {0}")]
    Initialization(String),

    #[error("Training data is malformed: {0}")]
    Corpus(#[from] domain::CorpusError),

    #[error("Model training failed: {0}")]
    Model(#[from] ports::ModelError),

    #[error("No known symptom matches '{0}'")]
    UnmatchedSymptom(String),

    #[error("Invalid interview step: {0}")]
    InvalidTransition(domain::SessionError),

    #[error("Invalid input: {0}")]
    Validation(domain::SessionError),

    #[error("Diagnosis failed: {0}")]
    DiagnosisFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<domain::SessionError> for SymptomaticError {
    fn from(err: domain::SessionError) -> Self {
        match err {
            domain::SessionError::InvalidTransition { .. } => Self::InvalidTransition(err),
            _ => Self::Validation(err),
        }
    }
}

impl SymptomaticError {
    /// Whether the caller can re-prompt and carry on with the same session.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnmatchedSymptom(_) | Self::Validation(_) | Self::InvalidTransition(_)
        )
    }
}
