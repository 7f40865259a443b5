//! TF-IDF adapter: Implementation of VerificationModel.
//!
//! Each training record becomes the space-joined names of its symptoms. The
//! text is vectorized with smoothed TF-IDF weights and unit L2 norm, and a
//! softmax classifier is fitted over the vectors. Queries reuse the fitted
//! vocabulary; unseen tokens are dropped.

mod softmax;

pub use softmax::{ClassifierConfig, SoftmaxClassifier};

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{LabelEncoder, TrainingCorpus};
use crate::ports::{ModelError, Verification, VerificationModel};

/// `(feature index, value)` pairs, ascending by index.
pub type SparseVector = Vec<(usize, f64)>;

static TOKEN_PATTERN: OnceLock<Regex> = OnceLock::new();

fn token_pattern() -> &'static Regex {
    // Two or more word characters; underscores keep symptom names whole.
    TOKEN_PATTERN.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"))
}

/// Lowercased word tokens of a document.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    token_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Fitted TF-IDF vocabulary and weights.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    terms: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn the term vocabulary (sorted) and smoothed IDF weights.
    ///
    /// # Errors
    /// Returns `ModelError::NoFeatures` if no document has a token.
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Result<Self, ModelError> {
        if documents.is_empty() {
            return Err(ModelError::EmptyCorpus);
        }

        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        for doc in documents {
            let mut tokens = tokenize(doc.as_ref());
            tokens.sort_unstable();
            tokens.dedup();
            for token in tokens {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }
        if doc_freq.is_empty() {
            return Err(ModelError::NoFeatures);
        }

        let n = documents.len() as f64;
        let mut terms = HashMap::with_capacity(doc_freq.len());
        let mut idf = Vec::with_capacity(doc_freq.len());
        for (index, (term, df)) in doc_freq.into_iter().enumerate() {
            terms.insert(term, index);
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
        }

        Ok(Self { terms, idf })
    }

    /// Vectorize one document with the fitted vocabulary.
    #[must_use]
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(text) {
            if let Some(&index) = self.terms.get(&token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();
        let norm = vector.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|(_, v)| *v /= norm);
        }
        vector
    }

    /// Number of distinct terms.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.idf.len()
    }

    /// IDF weight of a term, if known.
    #[must_use]
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.terms.get(term).map(|&i| self.idf[i])
    }
}

/// Text-similarity verifier: TF-IDF features into a softmax classifier.
#[derive(Debug, Clone)]
pub struct TfidfVerifier {
    vectorizer: TfidfVectorizer,
    classifier: SoftmaxClassifier,
    labels: LabelEncoder,
}

impl TfidfVerifier {
    /// Fit the vectorizer and classifier on every corpus record.
    ///
    /// # Errors
    /// Returns `ModelError` if either stage cannot be fitted.
    pub fn fit(
        corpus: &TrainingCorpus,
        labels: &LabelEncoder,
        config: &ClassifierConfig,
    ) -> Result<Self, ModelError> {
        let documents: Vec<String> = corpus
            .records()
            .iter()
            .map(|r| corpus.symptom_text(r))
            .collect();
        let targets = corpus
            .records()
            .iter()
            .map(|r| {
                labels.transform(&r.label).ok_or_else(|| {
                    ModelError::Inconsistent(format!("label '{}' not encoded", r.label))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let vectorizer = TfidfVectorizer::fit(&documents)?;
        let samples: Vec<SparseVector> =
            documents.iter().map(|d| vectorizer.transform(d)).collect();
        let classifier = SoftmaxClassifier::fit(
            &samples,
            &targets,
            labels.num_classes(),
            vectorizer.num_features(),
            config,
        )?;

        tracing::debug!(
            "Verifier fitted: {} terms, {} classes, {} iterations",
            vectorizer.num_features(),
            labels.num_classes(),
            classifier.iterations()
        );

        Ok(Self {
            vectorizer,
            classifier,
            labels: labels.clone(),
        })
    }

    /// Predict from free text (already space-joined symptom names).
    ///
    /// # Errors
    /// Returns `ModelError::Inconsistent` if the classifier yields no class.
    pub fn predict_text(&self, text: &str) -> Result<Verification, ModelError> {
        let vector = self.vectorizer.transform(text);
        let probabilities = self.classifier.predict_proba(&vector);
        let (class, confidence) = self
            .classifier
            .predict(&vector)
            .ok_or_else(|| ModelError::Inconsistent("classifier has no classes".into()))?;
        let label = self
            .labels
            .inverse_transform(class)
            .ok_or_else(|| ModelError::Inconsistent(format!("class {class} has no label")))?;

        Ok(Verification {
            label: label.to_string(),
            confidence,
            probabilities,
        })
    }

    #[must_use]
    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    #[must_use]
    pub fn classifier(&self) -> &SoftmaxClassifier {
        &self.classifier
    }
}

impl VerificationModel for TfidfVerifier {
    fn verify(&self, symptoms: &[String]) -> Result<Verification, ModelError> {
        self.predict_text(&symptoms.join(" "))
    }
}
