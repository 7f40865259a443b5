//! Decision tree adapter: the primary diagnosis model.
//!
//! A CART classifier (Gini impurity) over binary symptom-presence features.
//! Every split compares presence against a threshold of 0.5, so a sample goes
//! right exactly when the node's symptom is present.
//!
//! # Interview traversal
//!
//! [`DiagnosticTree::traverse`] does not look at a full symptom vector. It only
//! knows the one symptom the patient confirmed: a node's symptom counts as
//! present if and only if it is that symptom. Every other symptom on the path
//! is treated as absent, so "not asked" and "absent" are the same thing here.
//! The traversal returns the leaf labels plus the symptoms on the right-hand
//! branches it took, and mutates nothing.

use crate::domain::{LabelEncoder, SymptomVocabulary, TrainingCorpus};
use crate::ports::ModelError;

/// Split threshold on a 0/1 feature.
pub const SPLIT_THRESHOLD: f64 = 0.5;

/// Minimum impurity decrease for a split to be worth making.
const MIN_GAIN: f64 = 1e-12;

/// Tree growth limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// `None` grows until leaves are pure or unsplittable
    pub max_depth: Option<usize>,
    /// Nodes with fewer samples become leaves
    pub min_samples_split: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

/// One node of the fitted tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Internal {
        /// Vocabulary index of the tested symptom
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// `(class index, weight)` pairs with nonzero weight, in class order
        distribution: Vec<(usize, f64)>,
    },
}

/// Why an interview traversal could not reach a usable leaf.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraversalError {
    #[error("Leaf {node} has no disease distribution")]
    EmptyLeaf { node: usize },

    #[error("Node {node} is malformed")]
    BrokenNode { node: usize },
}

/// Result of walking the tree for one interview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    /// Leaf labels with nonzero weight, in training-label order
    pub labels: Vec<String>,
    /// Symptoms on the right-hand branches taken, root first
    pub path_symptoms: Vec<String>,
    /// Index of the leaf reached
    pub leaf: usize,
}

/// Fitted decision tree. Immutable once built.
#[derive(Debug, Clone)]
pub struct DiagnosticTree {
    nodes: Vec<TreeNode>,
    vocabulary: SymptomVocabulary,
    labels: LabelEncoder,
}

struct Builder<'a> {
    features: Vec<&'a [bool]>,
    targets: Vec<usize>,
    num_classes: usize,
    num_features: usize,
    config: &'a TreeConfig,
    nodes: Vec<TreeNode>,
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

impl Builder<'_> {
    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes];
        for &s in samples {
            counts[self.targets[s]] += 1;
        }
        counts
    }

    fn leaf(counts: &[usize], total: usize) -> TreeNode {
        let distribution = counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(class, &c)| (class, c as f64 / total as f64))
            .collect();
        TreeNode::Leaf { distribution }
    }

    /// Feature with the largest impurity decrease; lowest index wins ties.
    fn best_split(&self, samples: &[usize], counts: &[usize]) -> Option<usize> {
        let n = samples.len();
        let parent = gini(counts, n);
        let mut best: Option<(usize, f64)> = None;

        for feature in 0..self.num_features {
            let mut right = vec![0usize; self.num_classes];
            let mut n_right = 0;
            for &s in samples {
                if self.features[s][feature] {
                    right[self.targets[s]] += 1;
                    n_right += 1;
                }
            }
            if n_right == 0 || n_right == n {
                continue;
            }
            let left: Vec<usize> = counts.iter().zip(&right).map(|(c, r)| c - r).collect();
            let n_left = n - n_right;
            let weighted = (n_left as f64 * gini(&left, n_left)
                + n_right as f64 * gini(&right, n_right))
                / n as f64;
            let gain = parent - weighted;

            if gain > MIN_GAIN && best.map_or(true, |(_, g)| gain > g + MIN_GAIN) {
                best = Some((feature, gain));
            }
        }
        best.map(|(feature, _)| feature)
    }

    fn build(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let index = self.nodes.len();
        let counts = self.class_counts(&samples);
        self.nodes.push(Self::leaf(&counts, samples.len()));

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let too_small = samples.len() < self.config.min_samples_split;
        let too_deep = self.config.max_depth.is_some_and(|d| depth >= d);
        if pure || too_small || too_deep {
            return index;
        }

        let Some(feature) = self.best_split(&samples, &counts) else {
            return index;
        };

        let (right_samples, left_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| self.features[s][feature]);
        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[index] = TreeNode::Internal {
            feature,
            threshold: SPLIT_THRESHOLD,
            left,
            right,
        };
        index
    }
}

impl DiagnosticTree {
    /// Fit a tree on every record of the corpus.
    ///
    /// # Errors
    /// Returns `ModelError` for an empty corpus or labels the encoder lacks.
    pub fn fit(
        corpus: &TrainingCorpus,
        labels: &LabelEncoder,
        config: &TreeConfig,
    ) -> Result<Self, ModelError> {
        let indices: Vec<usize> = (0..corpus.len()).collect();
        Self::fit_subset(corpus, &indices, labels, config)
    }

    /// Fit a tree on the given record indices only.
    ///
    /// # Errors
    /// Returns `ModelError` for an empty subset or labels the encoder lacks.
    pub fn fit_subset(
        corpus: &TrainingCorpus,
        subset: &[usize],
        labels: &LabelEncoder,
        config: &TreeConfig,
    ) -> Result<Self, ModelError> {
        if subset.is_empty() {
            return Err(ModelError::EmptyCorpus);
        }
        if corpus.vocabulary().is_empty() {
            return Err(ModelError::NoFeatures);
        }
        if config.min_samples_split < 2 {
            return Err(ModelError::InvalidConfig(
                "min_samples_split must be at least 2".into(),
            ));
        }

        let records = corpus.records();
        let mut features = Vec::with_capacity(subset.len());
        let mut targets = Vec::with_capacity(subset.len());
        for &i in subset {
            let record = records
                .get(i)
                .ok_or_else(|| ModelError::Inconsistent(format!("record {i} out of range")))?;
            let class = labels.transform(&record.label).ok_or_else(|| {
                ModelError::Inconsistent(format!("label '{}' not encoded", record.label))
            })?;
            features.push(record.present.as_slice());
            targets.push(class);
        }

        let mut builder = Builder {
            features,
            targets,
            num_classes: labels.num_classes(),
            num_features: corpus.vocabulary().len(),
            config,
            nodes: Vec::new(),
        };
        builder.build((0..subset.len()).collect(), 0);

        let tree = Self {
            nodes: builder.nodes,
            vocabulary: corpus.vocabulary().clone(),
            labels: labels.clone(),
        };
        tracing::debug!(
            "Decision tree fitted: {} nodes, depth {}",
            tree.node_count(),
            tree.depth()
        );
        Ok(tree)
    }

    /// Assemble a tree from explicit nodes (root at index 0).
    ///
    /// # Errors
    /// Returns `ModelError::Inconsistent` if a node references a missing
    /// child, feature or class.
    pub fn from_nodes(
        nodes: Vec<TreeNode>,
        vocabulary: SymptomVocabulary,
        labels: LabelEncoder,
    ) -> Result<Self, ModelError> {
        if nodes.is_empty() {
            return Err(ModelError::Inconsistent("tree has no nodes".into()));
        }
        for (i, node) in nodes.iter().enumerate() {
            let ok = match node {
                TreeNode::Internal {
                    feature,
                    left,
                    right,
                    ..
                } => *feature < vocabulary.len() && *left < nodes.len() && *right < nodes.len(),
                TreeNode::Leaf { distribution } => distribution
                    .iter()
                    .all(|(class, _)| *class < labels.num_classes()),
            };
            if !ok {
                return Err(ModelError::Inconsistent(format!("node {i} is malformed")));
            }
        }
        Ok(Self {
            nodes,
            vocabulary,
            labels,
        })
    }

    /// Walk the tree for an interview whose only confirmed symptom is `confirmed`.
    ///
    /// # Errors
    /// Returns `TraversalError` if the leaf reached has no labels.
    pub fn traverse(&self, confirmed: &str) -> Result<Traversal, TraversalError> {
        let mut node = 0;
        let mut path_symptoms = Vec::new();

        // A well-formed tree never revisits a node.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(node) {
                Some(TreeNode::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let name = self
                        .vocabulary
                        .name(*feature)
                        .ok_or(TraversalError::BrokenNode { node })?;
                    let value = if name == confirmed { 1.0 } else { 0.0 };
                    if value <= *threshold {
                        node = *left;
                    } else {
                        path_symptoms.push(name.to_string());
                        node = *right;
                    }
                }
                Some(TreeNode::Leaf { distribution }) => {
                    let labels: Vec<String> = distribution
                        .iter()
                        .filter(|(_, weight)| *weight > 0.0)
                        .filter_map(|(class, _)| self.labels.inverse_transform(*class))
                        .map(|label| label.trim().to_string())
                        .collect();
                    if labels.is_empty() {
                        return Err(TraversalError::EmptyLeaf { node });
                    }
                    return Ok(Traversal {
                        labels,
                        path_symptoms,
                        leaf: node,
                    });
                }
                None => return Err(TraversalError::BrokenNode { node }),
            }
        }
        Err(TraversalError::BrokenNode { node })
    }

    /// Predict a class from a full presence vector.
    #[must_use]
    pub fn predict(&self, present: &[bool]) -> Option<usize> {
        let mut node = 0;
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(node)? {
                TreeNode::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = if *present.get(*feature)? { 1.0 } else { 0.0 };
                    node = if value <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { distribution } => {
                    return distribution
                        .iter()
                        .fold(None, |best: Option<(usize, f64)>, &(class, w)| match best {
                            Some((_, bw)) if bw >= w => best,
                            _ => Some((class, w)),
                        })
                        .map(|(class, _)| class);
                }
            }
        }
        None
    }

    /// Predict a label from a full presence vector.
    #[must_use]
    pub fn predict_label(&self, present: &[bool]) -> Option<&str> {
        self.predict(present)
            .and_then(|class| self.labels.inverse_transform(class))
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf edge count.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            if let Some(TreeNode::Internal { left, right, .. }) = self.nodes.get(node) {
                if depth < self.nodes.len() {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        max
    }

    #[must_use]
    pub fn labels(&self) -> &LabelEncoder {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(table: &str) -> (TrainingCorpus, LabelEncoder) {
        let corpus = TrainingCorpus::from_reader(table.as_bytes()).expect("Should parse");
        let labels = LabelEncoder::fit(corpus.records().iter().map(|r| r.label.as_str()));
        (corpus, labels)
    }

    const THREE_WAY: &str = "itching,chills,prognosis\n\
                             1,0,Fungal infection\n\
                             0,1,Malaria\n\
                             0,0,Allergy\n";

    fn three_way() -> DiagnosticTree {
        let (c, l) = corpus(THREE_WAY);
        DiagnosticTree::fit(&c, &l, &TreeConfig::default()).expect("Should fit")
    }

    #[test]
    fn test_fit_separates_training_data() {
        let tree = three_way();
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.predict_label(&[true, false]), Some("Fungal infection"));
        assert_eq!(tree.predict_label(&[false, true]), Some("Malaria"));
        assert_eq!(tree.predict_label(&[false, false]), Some("Allergy"));
    }

    #[test]
    fn test_traverse_confirmed_symptom_goes_right() {
        let tree = three_way();
        let t = tree.traverse("itching").expect("Should traverse");
        assert_eq!(t.labels, vec!["Fungal infection"]);
        assert_eq!(t.path_symptoms, vec!["itching"]);

        let t = tree.traverse("chills").expect("Should traverse");
        assert_eq!(t.labels, vec!["Malaria"]);
        assert_eq!(t.path_symptoms, vec!["chills"]);
    }

    #[test]
    fn test_traverse_unknown_symptom_treated_as_absent() {
        let tree = three_way();
        let t = tree.traverse("not_a_symptom").expect("Should traverse");
        assert_eq!(t.labels, vec!["Allergy"]);
        assert!(t.path_symptoms.is_empty());
    }

    #[test]
    fn test_tied_leaf_keeps_all_labels_in_label_order() {
        let (c, l) = corpus(
            "itching,chills,prognosis\n\
             1,0,Malaria\n\
             1,0,Acne\n\
             0,1,Typhoid\n",
        );
        let tree = DiagnosticTree::fit(&c, &l, &TreeConfig::default()).expect("Should fit");
        let t = tree.traverse("itching").expect("Should traverse");
        assert_eq!(t.labels, vec!["Acne", "Malaria"]);
        assert_eq!(t.path_symptoms, vec!["itching"]);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let (c, l) = corpus(THREE_WAY);
        let config = TreeConfig {
            max_depth: Some(1),
            ..TreeConfig::default()
        };
        let tree = DiagnosticTree::fit(&c, &l, &config).expect("Should fit");
        assert_eq!(tree.depth(), 1);
        let t = tree.traverse("chills").expect("Should traverse");
        assert_eq!(t.labels, vec!["Allergy", "Malaria"]);
    }

    #[test]
    fn test_empty_leaf_fails_traversal() {
        let vocab = SymptomVocabulary::new(["itching"]);
        let labels = LabelEncoder::fit(["Acne"]);
        let tree = DiagnosticTree::from_nodes(
            vec![
                TreeNode::Internal {
                    feature: 0,
                    threshold: SPLIT_THRESHOLD,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf {
                    distribution: vec![(0, 1.0)],
                },
                TreeNode::Leaf {
                    distribution: Vec::new(),
                },
            ],
            vocab,
            labels,
        )
        .expect("Should assemble");

        assert!(tree.traverse("sneezing").is_ok());
        assert_eq!(
            tree.traverse("itching").unwrap_err(),
            TraversalError::EmptyLeaf { node: 2 }
        );
    }

    #[test]
    fn test_malformed_nodes_rejected() {
        let vocab = SymptomVocabulary::new(["itching"]);
        let labels = LabelEncoder::fit(["Acne"]);
        let err = DiagnosticTree::from_nodes(
            vec![TreeNode::Internal {
                feature: 0,
                threshold: SPLIT_THRESHOLD,
                left: 5,
                right: 0,
            }],
            vocab,
            labels,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Inconsistent(_)));
    }
}
