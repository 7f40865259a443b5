//! Domain layer: Core interview types and logic.
//!
//! Vocabulary, corpora, the interview state machine, free-text matching and
//! triage. Nothing here performs I/O beyond reading from a caller-supplied
//! reader.

pub mod corpus;
mod diagnosis;
pub mod matcher;
mod session;
pub mod triage;
mod vocabulary;

pub use corpus::{CorpusError, DiseaseProfiles, TrainingCorpus, TrainingRecord};
pub use diagnosis::{
    DiagnosisFailure, DiagnosisResult, FollowUpQuestion, InterviewStep, Precautions,
    PRECAUTION_COUNT,
};
pub use matcher::MatchResult;
pub use session::{InterviewSession, InterviewState, SessionError};
pub use triage::{Recommendation, TriageAssessment};
pub use vocabulary::{LabelEncoder, SymptomVocabulary};
