//! Severity-weighted triage.
//!
//! `score = (sum of severities * days) / (symptom count + 1)`, escalated to a
//! professional consultation only when strictly above [`CONSULTATION_THRESHOLD`].

use serde::{Deserialize, Serialize};

/// Scores strictly above this recommend a consultation.
pub const CONSULTATION_THRESHOLD: f64 = 13.0;

/// Triage outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    /// No symptoms were collected
    ConsultIfPersists,
    /// Score above threshold
    ProfessionalConsultation,
    /// Score at or below threshold
    SelfCare,
}

impl Recommendation {
    /// Patient-facing message.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::ConsultIfPersists => {
                "No additional symptoms provided. Please consult a doctor if symptoms persist."
            }
            Self::ProfessionalConsultation => "You should take the consultation from doctor.",
            Self::SelfCare => "It might not be that bad but you should take precautions.",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsultIfPersists => write!(f, "CONSULT-IF-PERSISTS"),
            Self::ProfessionalConsultation => write!(f, "CONSULT"),
            Self::SelfCare => write!(f, "SELF-CARE"),
        }
    }
}

/// Triage result with the numbers behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageAssessment {
    pub recommendation: Recommendation,
    /// `None` when no symptoms were collected.
    pub score: Option<f64>,
    /// Collected symptoms with no severity entry (skipped in the sum).
    pub unweighted: Vec<String>,
}

impl TriageAssessment {
    #[must_use]
    pub fn message(&self) -> &'static str {
        self.recommendation.message()
    }
}

/// Assess a set of collected symptoms over `days`.
///
/// Symptoms missing from `severity` contribute nothing to the sum but still
/// count in the denominator; each one is logged and listed in `unweighted`.
pub fn assess_condition<S, F>(symptoms: &[S], days: u32, severity: F) -> TriageAssessment
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<i64>,
{
    if symptoms.is_empty() {
        return TriageAssessment {
            recommendation: Recommendation::ConsultIfPersists,
            score: None,
            unweighted: Vec::new(),
        };
    }

    let mut sum: i64 = 0;
    let mut unweighted = Vec::new();
    for symptom in symptoms {
        let symptom = symptom.as_ref();
        match severity(symptom) {
            Some(weight) => sum = sum.saturating_add(weight),
            None => {
                tracing::warn!("Severity for symptom '{}' not found, skipping", symptom);
                unweighted.push(symptom.to_string());
            }
        }
    }

    let score = (sum as f64 * f64::from(days)) / (symptoms.len() as f64 + 1.0);
    let recommendation = if score > CONSULTATION_THRESHOLD {
        Recommendation::ProfessionalConsultation
    } else {
        Recommendation::SelfCare
    };

    tracing::debug!(
        "Triage: {} symptoms over {} days, score={:.2} -> {}",
        symptoms.len(),
        days,
        score,
        recommendation
    );

    TriageAssessment {
        recommendation,
        score: Some(score),
        unweighted,
    }
}
