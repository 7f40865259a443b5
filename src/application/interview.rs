//! Interview service: Drives one session through the diagnosis protocol.
//!
//! This service coordinates:
//! - Free-text matching against the vocabulary
//! - Decision tree traversal and follow-up questions
//! - Verification by the independent classifier
//! - Triage and reference lookups
//!
//! The service itself is immutable and cheap to clone; every mutation lands
//! on the caller's [`InterviewSession`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapters::DiagnosticTree;
use crate::domain::matcher;
use crate::domain::triage::assess_condition;
use crate::domain::{
    DiagnosisFailure, DiagnosisResult, DiseaseProfiles, InterviewSession, InterviewState,
    InterviewStep, MatchResult, Precautions, SymptomVocabulary,
};
use crate::ports::{KnowledgeSource, VerificationModel};
use crate::SymptomaticError;

/// Service for conducting diagnostic interviews.
pub struct InterviewService<V, K>
where
    V: VerificationModel,
    K: KnowledgeSource,
{
    tree: Arc<DiagnosticTree>,
    vocabulary: Arc<SymptomVocabulary>,
    profiles: Arc<DiseaseProfiles>,
    verifier: Arc<V>,
    knowledge: Arc<K>,
    fingerprint: String,
}

impl<V, K> Clone for InterviewService<V, K>
where
    V: VerificationModel,
    K: KnowledgeSource,
{
    fn clone(&self) -> Self {
        Self {
            tree: Arc::clone(&self.tree),
            vocabulary: Arc::clone(&self.vocabulary),
            profiles: Arc::clone(&self.profiles),
            verifier: Arc::clone(&self.verifier),
            knowledge: Arc::clone(&self.knowledge),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

impl<V, K> InterviewService<V, K>
where
    V: VerificationModel,
    K: KnowledgeSource,
{
    /// Create a new interview service.
    pub fn new(
        tree: Arc<DiagnosticTree>,
        vocabulary: Arc<SymptomVocabulary>,
        profiles: Arc<DiseaseProfiles>,
        verifier: Arc<V>,
        knowledge: Arc<K>,
        fingerprint: String,
    ) -> Self {
        Self {
            tree,
            vocabulary,
            profiles,
            verifier,
            knowledge,
            fingerprint,
        }
    }

    /// Match the patient's symptom text and offer the candidates.
    ///
    /// # Errors
    /// Returns `UnmatchedSymptom` when nothing matches; the session stays in
    /// `AwaitingSymptomText` so the caller can re-prompt.
    pub fn submit_symptom_text(
        &self,
        session: &mut InterviewSession,
        text: &str,
    ) -> Result<MatchResult, SymptomaticError> {
        session.guard(InterviewState::AwaitingSymptomText, "submit symptom text")?;

        let result = matcher::match_symptom(&self.vocabulary, text);
        if !result.found {
            tracing::debug!(session = %session.id(), "No symptom matched the input");
            return Err(SymptomaticError::UnmatchedSymptom(text.trim().to_string()));
        }

        session.offer_candidates(text, result.candidates.clone())?;
        tracing::debug!(
            session = %session.id(),
            "{} candidate symptom(s) offered",
            result.candidates.len()
        );
        Ok(result)
    }

    /// Confirm one of the offered candidates.
    ///
    /// # Errors
    /// Returns error if the session is not awaiting confirmation or the
    /// candidate was not offered.
    pub fn confirm_symptom(
        &self,
        session: &mut InterviewSession,
        candidate: &str,
    ) -> Result<(), SymptomaticError> {
        session.confirm(candidate)?;
        tracing::debug!(session = %session.id(), "Confirmed symptom {}", candidate);
        Ok(())
    }

    /// Record how many days the symptoms have lasted.
    ///
    /// # Errors
    /// Returns error if the session is not awaiting a duration or `days` is 0.
    pub fn set_duration(
        &self,
        session: &mut InterviewSession,
        days: u32,
    ) -> Result<(), SymptomaticError> {
        session.set_days(days)?;
        Ok(())
    }

    /// Record a yes/no answer to a follow-up question.
    ///
    /// # Errors
    /// Returns error outside the follow-up phase or for a symptom that is not
    /// a pending question.
    pub fn record_follow_up_answer(
        &self,
        session: &mut InterviewSession,
        symptom: &str,
        present: bool,
    ) -> Result<(), SymptomaticError> {
        session.record_answer(symptom, present)?;
        Ok(())
    }

    /// Move the interview forward.
    ///
    /// The first call walks the tree and queues follow-up questions. While any
    /// remain, the next one is returned. Once all are answered, the classifier
    /// and triage run and the diagnosis is returned. Calling again after that
    /// returns the same diagnosis.
    ///
    /// A traversal that ends in an empty leaf moves the session to `Failed`
    /// and returns [`InterviewStep::Failed`]; only a restart leaves it.
    ///
    /// # Errors
    /// Returns error if called before the duration is set, or after failure.
    pub fn advance(
        &self,
        session: &mut InterviewSession,
    ) -> Result<InterviewStep, SymptomaticError> {
        if let Some(result) = session.result() {
            return Ok(InterviewStep::Diagnosed(Box::new(result.clone())));
        }
        session.guard(InterviewState::InterviewingFollowUps, "advance the interview")?;

        if session.primary_candidates().is_none() {
            if let Some(failure) = self.walk_tree(session) {
                return Ok(InterviewStep::Failed(failure));
            }
        }

        if let Some(question) = session.next_question() {
            return Ok(InterviewStep::FollowUp(question));
        }

        self.conclude(session)
    }

    fn walk_tree(&self, session: &mut InterviewSession) -> Option<DiagnosisFailure> {
        let confirmed = session.confirmed_symptom().unwrap_or_default().to_string();
        match self.tree.traverse(&confirmed) {
            Ok(traversal) => {
                let questions =
                    self.follow_up_questions(&traversal.labels, &traversal.path_symptoms);
                tracing::debug!(
                    session = %session.id(),
                    "Tree reached leaf {} with {} label(s); {} follow-up question(s)",
                    traversal.leaf,
                    traversal.labels.len(),
                    questions.len()
                );
                session.begin_follow_ups(traversal.labels, traversal.path_symptoms, questions);
                None
            }
            Err(e) => Some(self.fail(session, e.to_string())),
        }
    }

    fn fail(&self, session: &mut InterviewSession, reason: String) -> DiagnosisFailure {
        tracing::warn!(session = %session.id(), "Diagnosis failed: {}", reason);
        session.fail();
        DiagnosisFailure { reason }
    }

    /// Symptoms of the leaf's diseases that have a severity entry, in
    /// vocabulary order, minus those already collected on the path.
    fn follow_up_questions(&self, diseases: &[String], already: &[String]) -> Vec<String> {
        let mut indices: Vec<usize> = diseases
            .iter()
            .filter_map(|d| self.profiles.symptoms_for(d))
            .flatten()
            .copied()
            .collect();
        indices.sort_unstable();
        indices.dedup();

        indices
            .into_iter()
            .filter_map(|i| self.vocabulary.name(i))
            .filter(|name| self.knowledge.has_severity(name))
            .filter(|name| !already.iter().any(|a| a.as_str() == *name))
            .map(str::to_string)
            .collect()
    }

    fn conclude(&self, session: &mut InterviewSession) -> Result<InterviewStep, SymptomaticError> {
        let primary_candidates = session
            .primary_candidates()
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let Some(primary_disease) = primary_candidates.first().cloned() else {
            let failure = self.fail(session, "decision tree produced no disease".to_string());
            return Ok(InterviewStep::Failed(failure));
        };
        let days = session.days().ok_or_else(|| {
            SymptomaticError::DiagnosisFailure("duration was never recorded".to_string())
        })?;
        let symptoms = session.collected();

        let verdict = match self.verifier.verify(&symptoms) {
            Ok(v) => v,
            Err(e) => {
                let failure = self.fail(session, format!("verification failed: {e}"));
                return Ok(InterviewStep::Failed(failure));
            }
        };

        let triage = assess_condition(&symptoms, days, |s| self.knowledge.severity(s));
        let mut warnings: Vec<String> = triage
            .unweighted
            .iter()
            .map(|s| format!("No severity weight for symptom '{s}'"))
            .collect();

        let diseases_agree = verdict.label == primary_disease;
        let mut diagnosed = vec![primary_disease.clone()];
        if !diseases_agree {
            diagnosed.push(verdict.label.clone());
        }

        let mut descriptions = BTreeMap::new();
        let mut precautions: BTreeMap<String, Precautions> = BTreeMap::new();
        for disease in &diagnosed {
            match self.knowledge.description(disease) {
                Some(text) => {
                    descriptions.insert(disease.clone(), text.to_string());
                }
                None => {
                    tracing::warn!("No description available for '{}'", disease);
                    warnings.push(format!("No description available for '{disease}'"));
                }
            }
            match self.knowledge.precautions(disease) {
                Some(list) => {
                    precautions.insert(disease.clone(), list.clone());
                }
                None => {
                    tracing::warn!("No precautions available for '{}'", disease);
                    warnings.push(format!("No precautions available for '{disease}'"));
                }
            }
        }

        let result = DiagnosisResult {
            id: session.id().to_string(),
            patient_name: session.name().to_string(),
            primary_disease,
            primary_candidates,
            secondary_disease: verdict.label,
            secondary_confidence: verdict.confidence,
            diseases_agree,
            triage_message: triage.message().to_string(),
            triage,
            symptoms,
            days,
            descriptions,
            precautions,
            warnings,
            model_fingerprint: self.fingerprint.clone(),
            created_at: chrono::Utc::now(),
        };

        tracing::info!(
            session = %session.id(),
            "Diagnosis complete: primary={}, secondary={}, agree={}, triage={}",
            result.primary_disease,
            result.secondary_disease,
            result.diseases_agree,
            result.triage.recommendation
        );

        session.finish(result.clone());
        Ok(InterviewStep::Diagnosed(Box::new(result)))
    }
}
