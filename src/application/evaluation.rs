//! Model evaluation run once at engine startup.
//!
//! Scores are informational; nothing downstream depends on them.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::adapters::{DiagnosticTree, TfidfVerifier, TreeConfig};
use crate::domain::{LabelEncoder, TrainingCorpus};
use crate::ports::ModelError;

/// Accuracy figures for the two models.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Tree accuracy on the testing corpus (full-vector prediction)
    pub tree_accuracy: Option<f64>,
    /// Verifier accuracy on the testing corpus
    pub verifier_accuracy: Option<f64>,
    /// Tree accuracy per cross-validation fold
    pub cv_fold_accuracies: Vec<f64>,
}

impl EvaluationReport {
    /// Mean cross-validation accuracy.
    #[must_use]
    pub fn cv_mean(&self) -> Option<f64> {
        if self.cv_fold_accuracies.is_empty() {
            return None;
        }
        Some(self.cv_fold_accuracies.iter().sum::<f64>() / self.cv_fold_accuracies.len() as f64)
    }
}

fn accuracy(hits: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| hits as f64 / total as f64)
}

/// Fraction of `testing` rows the tree labels correctly.
#[must_use]
pub fn tree_holdout(tree: &DiagnosticTree, testing: &TrainingCorpus) -> Option<f64> {
    let hits = testing
        .records()
        .iter()
        .filter(|r| tree.predict_label(&r.present) == Some(r.label.as_str()))
        .count();
    accuracy(hits, testing.len())
}

/// Fraction of `testing` rows the verifier labels correctly.
///
/// # Errors
/// Returns `ModelError` if the verifier cannot produce a label.
pub fn verifier_holdout(
    verifier: &TfidfVerifier,
    testing: &TrainingCorpus,
) -> Result<Option<f64>, ModelError> {
    let mut hits = 0;
    for record in testing.records() {
        let verdict = verifier.predict_text(&testing.symptom_text(record))?;
        if verdict.label == record.label {
            hits += 1;
        }
    }
    Ok(accuracy(hits, testing.len()))
}

/// K-fold cross-validation of the tree over a seeded shuffle.
///
/// Returns no folds when `folds < 2` or the corpus is smaller than `folds`.
///
/// # Errors
/// Returns `ModelError` if a fold cannot be fitted.
pub fn cross_validate_tree(
    corpus: &TrainingCorpus,
    labels: &LabelEncoder,
    config: &TreeConfig,
    folds: usize,
    seed: u64,
) -> Result<Vec<f64>, ModelError> {
    if folds < 2 || corpus.len() < folds {
        return Ok(Vec::new());
    }

    let mut order: Vec<usize> = (0..corpus.len()).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let records = corpus.records();
    let mut scores = Vec::with_capacity(folds);
    for fold in 0..folds {
        let (held_out, train): (Vec<(usize, usize)>, Vec<(usize, usize)>) = order
            .iter()
            .copied()
            .enumerate()
            .partition(|(pos, _)| pos % folds == fold);
        let train: Vec<usize> = train.into_iter().map(|(_, i)| i).collect();

        let tree = DiagnosticTree::fit_subset(corpus, &train, labels, config)?;
        let hits = held_out
            .iter()
            .filter(|(_, i)| {
                let record = &records[*i];
                tree.predict_label(&record.present) == Some(record.label.as_str())
            })
            .count();
        if let Some(score) = accuracy(hits, held_out.len()) {
            tracing::debug!("Fold {}/{}: accuracy {:.3}", fold + 1, folds, score);
            scores.push(score);
        }
    }
    Ok(scores)
}
