//! Multinomial logistic regression over sparse vectors.
//!
//! Fitted by full-batch gradient descent from a zero start, so the same data
//! always produces the same weights.

use crate::ports::ModelError;

use super::SparseVector;

/// Gradient descent settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub max_iter: usize,
    pub learning_rate: f64,
    /// L2 penalty on the weights (not the intercepts)
    pub l2: f64,
    /// Stop once the relative loss change falls below this
    pub tolerance: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_iter: 300,
            learning_rate: 1.0,
            l2: 1e-4,
            tolerance: 1e-6,
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<(), ModelError> {
        if self.max_iter == 0 {
            return Err(ModelError::InvalidConfig("max_iter must be positive".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "learning rate {} must be positive",
                self.learning_rate
            )));
        }
        if !self.l2.is_finite() || self.l2 < 0.0 {
            return Err(ModelError::InvalidConfig(format!(
                "l2 penalty {} must be non-negative",
                self.l2
            )));
        }
        Ok(())
    }
}

/// Fitted softmax classifier.
#[derive(Debug, Clone)]
pub struct SoftmaxClassifier {
    num_classes: usize,
    num_features: usize,
    /// Row-major `num_classes x num_features`
    weights: Vec<f64>,
    intercepts: Vec<f64>,
    iterations: usize,
    converged: bool,
}

fn softmax_in_place(logits: &mut [f64]) {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for z in logits.iter_mut() {
        *z = (*z - max).exp();
        sum += *z;
    }
    for z in logits.iter_mut() {
        *z /= sum;
    }
}

impl SoftmaxClassifier {
    /// Fit on `samples` labelled by class index.
    ///
    /// Hitting `max_iter` before the tolerance is met is logged, not an error.
    ///
    /// # Errors
    /// Returns `ModelError` for empty or mismatched inputs, a bad config, or
    /// a loss that stops being finite.
    pub fn fit(
        samples: &[SparseVector],
        targets: &[usize],
        num_classes: usize,
        num_features: usize,
        config: &ClassifierConfig,
    ) -> Result<Self, ModelError> {
        config.validate()?;
        if samples.is_empty() {
            return Err(ModelError::EmptyCorpus);
        }
        if samples.len() != targets.len() {
            return Err(ModelError::Inconsistent(format!(
                "{} samples but {} targets",
                samples.len(),
                targets.len()
            )));
        }
        if num_features == 0 {
            return Err(ModelError::NoFeatures);
        }
        if let Some(&bad) = targets.iter().find(|&&t| t >= num_classes) {
            return Err(ModelError::Inconsistent(format!("class {bad} out of range")));
        }

        let mut model = Self {
            num_classes,
            num_features,
            weights: vec![0.0; num_classes * num_features],
            intercepts: vec![0.0; num_classes],
            iterations: 0,
            converged: false,
        };

        let n = samples.len() as f64;
        let mut grad_w = vec![0.0; model.weights.len()];
        let mut grad_b = vec![0.0; num_classes];
        let mut probs = vec![0.0; num_classes];
        let mut previous_loss = f64::INFINITY;

        for iteration in 1..=config.max_iter {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            grad_b.iter_mut().for_each(|g| *g = 0.0);
            let mut loss = 0.0;

            for (x, &y) in samples.iter().zip(targets) {
                model.logits_into(x, &mut probs);
                softmax_in_place(&mut probs);
                loss -= probs[y].max(f64::MIN_POSITIVE).ln();

                for (c, p) in probs.iter().enumerate() {
                    let err = p - if c == y { 1.0 } else { 0.0 };
                    grad_b[c] += err;
                    let row = c * num_features;
                    for &(j, v) in x {
                        grad_w[row + j] += err * v;
                    }
                }
            }

            loss /= n;
            let penalty: f64 = model.weights.iter().map(|w| w * w).sum();
            loss += 0.5 * config.l2 * penalty;
            if !loss.is_finite() {
                return Err(ModelError::Diverged { iteration });
            }

            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= config.learning_rate * (g / n + config.l2 * *w);
            }
            for (b, g) in model.intercepts.iter_mut().zip(&grad_b) {
                *b -= config.learning_rate * (g / n);
            }
            model.iterations = iteration;

            if (previous_loss - loss).abs() <= config.tolerance * loss.abs().max(1.0) {
                model.converged = true;
                break;
            }
            previous_loss = loss;
        }

        if model.converged {
            tracing::debug!("Classifier converged after {} iterations", model.iterations);
        } else {
            tracing::warn!(
                "Classifier did not converge within {} iterations",
                config.max_iter
            );
        }
        Ok(model)
    }

    fn logits_into(&self, x: &SparseVector, out: &mut [f64]) {
        for (c, z) in out.iter_mut().enumerate() {
            let row = c * self.num_features;
            *z = self.intercepts[c]
                + x.iter()
                    .filter(|(j, _)| *j < self.num_features)
                    .map(|&(j, v)| self.weights[row + j] * v)
                    .sum::<f64>();
        }
    }

    /// Class probabilities for one sample.
    #[must_use]
    pub fn predict_proba(&self, x: &SparseVector) -> Vec<f64> {
        let mut probs = vec![0.0; self.num_classes];
        self.logits_into(x, &mut probs);
        softmax_in_place(&mut probs);
        probs
    }

    /// Most probable class (lowest index on ties) and its probability.
    #[must_use]
    pub fn predict(&self, x: &SparseVector) -> Option<(usize, f64)> {
        let probs = self.predict_proba(x);
        probs
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (c, &p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((c, p)),
            })
    }

    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }
}
