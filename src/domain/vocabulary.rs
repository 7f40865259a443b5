//! Symptom vocabulary and disease label encoding.
//!
//! Both are fixed once the training corpus has been read and are referenced
//! by index everywhere else in the engine.

use std::collections::{BTreeSet, HashMap};

/// Ordered set of known symptom names with a stable index per name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomVocabulary {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl SymptomVocabulary {
    /// Build a vocabulary from training table columns, keeping column order.
    ///
    /// Duplicate column names keep their first position.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut index = HashMap::new();
        for name in names {
            let name = name.into();
            if index.contains_key(&name) {
                tracing::warn!("Duplicate symptom column '{}' ignored", name);
                continue;
            }
            index.insert(name.clone(), ordered.len());
            ordered.push(name);
        }
        Self {
            names: ordered,
            index,
        }
    }

    /// Number of symptoms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of a symptom name, if known.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Symptom name at an index.
    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Symptom names in vocabulary order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }
}

/// Maps disease labels to dense class indices.
///
/// Classes are kept in sorted order, so "training-label order" everywhere in
/// the engine means lexicographic order of the trimmed labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the given labels (trimmed, deduplicated, sorted).
    #[must_use]
    pub fn fit<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<String> = labels.into_iter().map(|l| l.trim().to_string()).collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    /// Class index of a label.
    #[must_use]
    pub fn transform(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label.trim()))
            .ok()
    }

    /// Label of a class index.
    #[must_use]
    pub fn inverse_transform(&self, class: usize) -> Option<&str> {
        self.classes.get(class).map(String::as_str)
    }

    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> + '_ {
        self.classes.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_keeps_column_order() {
        let vocab = SymptomVocabulary::new(["itching", "skin_rash", "chills"]);
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.index_of("skin_rash"), Some(1));
        assert_eq!(vocab.name(2), Some("chills"));
        assert!(vocab.index_of("cough").is_none());
    }

    #[test]
    fn test_vocabulary_ignores_duplicate_columns() {
        let vocab = SymptomVocabulary::new(["itching", "chills", "itching"]);
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.index_of("itching"), Some(0));
    }

    #[test]
    fn test_label_encoder_sorts_and_trims() {
        let enc = LabelEncoder::fit(["Malaria", " Allergy ", "Malaria", "Acne"]);
        assert_eq!(enc.num_classes(), 3);
        assert_eq!(enc.inverse_transform(0), Some("Acne"));
        assert_eq!(enc.transform("Allergy"), Some(1));
        assert_eq!(enc.transform("Malaria "), Some(2));
        assert_eq!(enc.transform("Typhoid"), None);
    }
}
