//! Verification port: the independent second opinion.
//!
//! Implementations are fitted once at startup and must be deterministic: the
//! same symptom set always yields the same label.

/// Errors from fitting or querying a model.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("Training corpus is empty")]
    EmptyCorpus,

    #[error("Training corpus yields no usable features")]
    NoFeatures,

    #[error("Training diverged at iteration {iteration} (loss is not finite)")]
    Diverged { iteration: usize },

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Model is inconsistent: {0}")]
    Inconsistent(String),
}

/// A single best prediction with its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub label: String,
    pub confidence: f64,
    /// Probability per class, in training-label order
    pub probabilities: Vec<f64>,
}

/// Predicts a disease from a set of symptom names.
pub trait VerificationModel: Send + Sync {
    /// Best-matching disease for the collected symptoms.
    ///
    /// Unknown symptom names are ignored.
    ///
    /// # Errors
    /// Returns `ModelError` if the model cannot produce a prediction.
    fn verify(&self, symptoms: &[String]) -> Result<Verification, ModelError>;
}
