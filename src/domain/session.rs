//! Per-patient interview state.
//!
//! The interview is a closed state machine; every mutation is guarded by the
//! current state so the caller cannot skip or repeat a step. A session is owned
//! by exactly one caller and never shared.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::diagnosis::{uuid_v4, DiagnosisResult, FollowUpQuestion};

/// Interview lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterviewState {
    Idle,
    AwaitingSymptomText,
    AwaitingConfirmation,
    AwaitingDuration,
    InterviewingFollowUps,
    Diagnosed,
    /// Traversal failed; only a restart leaves this state
    Failed,
}

impl std::fmt::Display for InterviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingSymptomText => "awaiting symptom text",
            Self::AwaitingConfirmation => "awaiting confirmation",
            Self::AwaitingDuration => "awaiting duration",
            Self::InterviewingFollowUps => "interviewing follow-ups",
            Self::Diagnosed => "diagnosed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Errors from guarded session transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: InterviewState,
        action: &'static str,
    },

    #[error("Patient name must not be empty")]
    EmptyName,

    #[error("Duration must be at least one day, got {0}")]
    InvalidDuration(u32),

    #[error("'{0}' is not one of the offered candidates")]
    UnknownCandidate(String),

    #[error("'{0}' is not a pending follow-up question")]
    UnexpectedAnswer(String),
}

/// One patient's interview.
#[derive(Debug, Clone)]
pub struct InterviewSession {
    id: String,
    state: InterviewState,
    name: String,
    symptom_text: Option<String>,
    candidates: Vec<String>,
    confirmed_symptom: Option<String>,
    days: Option<u32>,
    collected: BTreeSet<String>,
    primary: Option<Vec<String>>,
    pending: VecDeque<String>,
    result: Option<DiagnosisResult>,
}

impl Default for InterviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl InterviewSession {
    /// A fresh session in `Idle`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: uuid_v4(),
            state: InterviewState::Idle,
            name: String::new(),
            symptom_text: None,
            candidates: Vec::new(),
            confirmed_symptom: None,
            days: None,
            collected: BTreeSet::new(),
            primary: None,
            pending: VecDeque::new(),
            result: None,
        }
    }

    /// Create a session and begin it for `name`.
    ///
    /// # Errors
    /// Returns `SessionError::EmptyName` for a blank name.
    pub fn start(name: &str) -> Result<Self, SessionError> {
        let mut session = Self::new();
        session.begin(name)?;
        Ok(session)
    }

    /// `Idle -> AwaitingSymptomText`.
    ///
    /// # Errors
    /// Fails outside `Idle` or for a blank name.
    pub fn begin(&mut self, name: &str) -> Result<(), SessionError> {
        self.guard(InterviewState::Idle, "start an interview")?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }
        self.name = name.to_string();
        self.state = InterviewState::AwaitingSymptomText;
        tracing::info!(session = %self.id, patient = ?self.name, "Interview started");
        Ok(())
    }

    /// Clear every field and return to `Idle`. Allowed from any state.
    pub fn restart(&mut self) {
        tracing::info!(session = %self.id, "Interview restarted from {}", self.state);
        *self = Self::new();
    }

    pub(crate) fn guard(
        &self,
        expected: InterviewState,
        action: &'static str,
    ) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    /// `AwaitingSymptomText -> AwaitingConfirmation` after a successful match.
    pub(crate) fn offer_candidates(
        &mut self,
        text: &str,
        candidates: Vec<String>,
    ) -> Result<(), SessionError> {
        self.guard(InterviewState::AwaitingSymptomText, "offer candidates")?;
        self.symptom_text = Some(text.to_string());
        self.candidates = candidates;
        self.state = InterviewState::AwaitingConfirmation;
        Ok(())
    }

    /// `AwaitingConfirmation -> AwaitingDuration`.
    ///
    /// # Errors
    /// Fails outside `AwaitingConfirmation` or if `candidate` was not offered.
    pub fn confirm(&mut self, candidate: &str) -> Result<(), SessionError> {
        self.guard(InterviewState::AwaitingConfirmation, "confirm a symptom")?;
        if !self.candidates.iter().any(|c| c == candidate) {
            return Err(SessionError::UnknownCandidate(candidate.to_string()));
        }
        self.confirmed_symptom = Some(candidate.to_string());
        self.state = InterviewState::AwaitingDuration;
        Ok(())
    }

    /// `AwaitingDuration -> InterviewingFollowUps`.
    ///
    /// # Errors
    /// Fails outside `AwaitingDuration` or for zero days.
    pub fn set_days(&mut self, days: u32) -> Result<(), SessionError> {
        self.guard(InterviewState::AwaitingDuration, "set the duration")?;
        if days == 0 {
            return Err(SessionError::InvalidDuration(days));
        }
        self.days = Some(days);
        self.state = InterviewState::InterviewingFollowUps;
        Ok(())
    }

    /// Store the tree outcome and queue follow-up questions.
    pub(crate) fn begin_follow_ups<I, Q>(&mut self, primary: Vec<String>, path: I, questions: Q)
    where
        I: IntoIterator<Item = String>,
        Q: IntoIterator<Item = String>,
    {
        self.collected.extend(path);
        self.primary = Some(primary);
        let mut seen = BTreeSet::new();
        self.pending = questions
            .into_iter()
            .filter(|q| seen.insert(q.clone()))
            .collect();
    }

    /// The next unanswered follow-up question, if any.
    #[must_use]
    pub fn next_question(&self) -> Option<FollowUpQuestion> {
        if self.state != InterviewState::InterviewingFollowUps {
            return None;
        }
        self.pending.front().map(|symptom| FollowUpQuestion {
            symptom: symptom.clone(),
            remaining: self.pending.len() - 1,
        })
    }

    /// Record a yes/no answer to a pending follow-up question.
    ///
    /// # Errors
    /// Fails outside `InterviewingFollowUps` or if `symptom` was not asked.
    pub fn record_answer(&mut self, symptom: &str, present: bool) -> Result<(), SessionError> {
        self.guard(InterviewState::InterviewingFollowUps, "record an answer")?;
        let pos = self
            .pending
            .iter()
            .position(|s| s == symptom)
            .ok_or_else(|| SessionError::UnexpectedAnswer(symptom.to_string()))?;
        if let Some(symptom) = self.pending.remove(pos) {
            if present {
                self.collected.insert(symptom);
            }
        }
        Ok(())
    }

    /// `InterviewingFollowUps -> Diagnosed`.
    pub(crate) fn finish(&mut self, result: DiagnosisResult) {
        self.result = Some(result);
        self.state = InterviewState::Diagnosed;
    }

    /// `InterviewingFollowUps -> Failed`.
    pub(crate) fn fail(&mut self) {
        self.state = InterviewState::Failed;
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn state(&self) -> InterviewState {
        self.state
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn symptom_text(&self) -> Option<&str> {
        self.symptom_text.as_deref()
    }

    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    #[must_use]
    pub fn confirmed_symptom(&self) -> Option<&str> {
        self.confirmed_symptom.as_deref()
    }

    #[must_use]
    pub fn days(&self) -> Option<u32> {
        self.days
    }

    /// Collected symptoms, sorted.
    #[must_use]
    pub fn collected(&self) -> Vec<String> {
        self.collected.iter().cloned().collect()
    }

    /// Tree candidates, once traversal has run.
    #[must_use]
    pub fn primary_candidates(&self) -> Option<&[String]> {
        self.primary.as_deref()
    }

    #[must_use]
    pub fn pending_questions(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn result(&self) -> Option<&DiagnosisResult> {
        self.result.as_ref()
    }
}
