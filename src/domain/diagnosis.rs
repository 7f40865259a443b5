//! Diagnosis result types.
//!
//! Represents the output of one completed interview: the tree's primary
//! candidate, the classifier's secondary candidate, triage and reference notes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::triage::TriageAssessment;

/// Number of precautions per disease in the reference table.
pub const PRECAUTION_COUNT: usize = 4;

/// Precautions for one disease.
pub type Precautions = [String; PRECAUTION_COUNT];

/// A yes/no question about a follow-up symptom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpQuestion {
    /// Vocabulary symptom name (answer with this exact string)
    pub symptom: String,
    /// Questions left after this one
    pub remaining: usize,
}

impl FollowUpQuestion {
    /// Human-readable prompt.
    #[must_use]
    pub fn prompt(&self) -> String {
        format!("Are you experiencing {}?", self.symptom.replace('_', " "))
    }
}

/// Why an interview could not produce a diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisFailure {
    pub reason: String,
}

impl std::fmt::Display for DiagnosisFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unable to determine a diagnosis: {}", self.reason)
    }
}

/// What the caller should do next after advancing an interview.
#[derive(Debug, Clone)]
pub enum InterviewStep {
    /// Ask this question, then record the answer
    FollowUp(FollowUpQuestion),
    /// The interview is complete
    Diagnosed(Box<DiagnosisResult>),
    /// The interview cannot complete; offer a restart
    Failed(DiagnosisFailure),
}

/// Complete diagnosis record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisResult {
    /// Unique identifier
    pub id: String,

    pub patient_name: String,

    /// First label of the decision tree leaf
    pub primary_disease: String,

    /// Every label of the leaf, in training-label order
    pub primary_candidates: Vec<String>,

    /// Verification classifier's best label
    pub secondary_disease: String,

    /// Probability the classifier assigned to `secondary_disease`
    pub secondary_confidence: f64,

    pub diseases_agree: bool,

    pub triage: TriageAssessment,

    pub triage_message: String,

    /// Collected symptoms, sorted
    pub symptoms: Vec<String>,

    pub days: u32,

    /// Descriptions for diagnosed diseases that have one
    pub descriptions: BTreeMap<String, String>,

    /// Precautions for diagnosed diseases that have them
    pub precautions: BTreeMap<String, Precautions>,

    /// Non-fatal issues met while assembling the result
    pub warnings: Vec<String>,

    /// Fingerprint of the training corpus behind the models
    pub model_fingerprint: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl DiagnosisResult {
    /// Distinct diagnosed labels: primary, then secondary when it differs.
    #[must_use]
    pub fn diagnosed_labels(&self) -> Vec<&str> {
        let mut labels = vec![self.primary_disease.as_str()];
        if !self.diseases_agree {
            labels.push(self.secondary_disease.as_str());
        }
        labels
    }

    /// The opaque label handed to the appointment-booking collaborator.
    #[must_use]
    pub fn booking_label(&self) -> &str {
        &self.primary_disease
    }

    /// Serialize for hand-off.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Generate a random UUID v4 string.
pub(crate) fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::triage::Recommendation;

    fn sample(primary: &str, secondary: &str) -> DiagnosisResult {
        DiagnosisResult {
            id: uuid_v4(),
            patient_name: "Test".to_string(),
            primary_disease: primary.to_string(),
            primary_candidates: vec![primary.to_string()],
            secondary_disease: secondary.to_string(),
            secondary_confidence: 0.8,
            diseases_agree: primary == secondary,
            triage: TriageAssessment {
                recommendation: Recommendation::SelfCare,
                score: Some(2.0),
                unweighted: Vec::new(),
            },
            triage_message: Recommendation::SelfCare.message().to_string(),
            symptoms: vec!["itching".to_string()],
            days: 2,
            descriptions: BTreeMap::new(),
            precautions: BTreeMap::new(),
            warnings: Vec::new(),
            model_fingerprint: "abc".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_diagnosed_labels() {
        assert_eq!(sample("Acne", "Acne").diagnosed_labels(), vec!["Acne"]);
        assert_eq!(
            sample("Acne", "Allergy").diagnosed_labels(),
            vec!["Acne", "Allergy"]
        );
    }

    #[test]
    fn test_json_handoff() {
        let json = sample("Acne", "Allergy").to_json().expect("Should serialize");
        assert!(json.contains("\"primary_disease\": \"Acne\""));
        assert!(json.contains("SelfCare"));
    }

    #[test]
    fn test_follow_up_prompt() {
        let q = FollowUpQuestion {
            symptom: "skin_rash".to_string(),
            remaining: 0,
        };
        assert_eq!(q.prompt(), "Are you experiencing skin rash?");
    }

    #[test]
    fn test_uuid_generation() {
        let id1 = uuid_v4();
        let id2 = uuid_v4();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
    }
}
