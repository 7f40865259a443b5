//! Training and testing corpora.
//!
//! A corpus is a table of binary symptom-presence columns followed by a
//! trailing disease label column. Any defect here is fatal to engine
//! initialization, unlike the reference tables which degrade gracefully.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use super::vocabulary::SymptomVocabulary;

/// Errors while reading a training or testing table.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Corpus is missing its header row")]
    MissingHeader,

    #[error("Corpus header needs at least one symptom column and a label column")]
    NoSymptomColumns,

    #[error("Line {line}: expected {expected} fields, found {found}")]
    RowLength {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: column '{column}' must be 0 or 1, found '{value}'")]
    NonBinary {
        line: u64,
        column: String,
        value: String,
    },

    #[error("Line {line}: empty disease label")]
    EmptyLabel { line: u64 },

    #[error("Corpus has no data rows")]
    Empty,

    #[error("Testing header does not match training header")]
    HeaderMismatch,
}

/// One training row: symptom presence by vocabulary index, plus its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRecord {
    pub present: Vec<bool>,
    pub label: String,
}

impl TrainingRecord {
    /// Vocabulary indices of the symptoms present in this record.
    pub fn present_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.present
            .iter()
            .enumerate()
            .filter_map(|(i, &p)| p.then_some(i))
    }
}

/// A parsed symptom/disease table.
#[derive(Debug, Clone)]
pub struct TrainingCorpus {
    vocabulary: SymptomVocabulary,
    label_column: String,
    records: Vec<TrainingRecord>,
}

/// Suffix repeated column names `.1`, `.2`, ... in header order.
///
/// A generated name that is itself taken gets suffixed again, so
/// `a, a, a.1` becomes `a, a.1, a.1.1`.
fn rename_duplicates(columns: &mut [String]) {
    let mut counts: HashMap<String, usize> = HashMap::with_capacity(columns.len());
    for column in columns.iter_mut() {
        let original = column.clone();
        let mut name = column.clone();
        let mut count = counts.get(&name).copied().unwrap_or(0);
        while count > 0 {
            counts.insert(name.clone(), count + 1);
            name = format!("{name}.{count}");
            count = counts.get(&name).copied().unwrap_or(0);
        }
        counts.insert(name.clone(), count + 1);
        if name != original {
            tracing::warn!("Duplicate symptom column '{}' renamed to '{}'", original, name);
            *column = name;
        }
    }
}

impl TrainingCorpus {
    /// Parse a corpus, taking the vocabulary from its header.
    ///
    /// # Errors
    /// Returns `CorpusError` on any structural or value defect.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CorpusError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = csv_reader.records();

        let header = rows.next().ok_or(CorpusError::MissingHeader)??;
        let mut columns: Vec<String> = header.iter().map(|c| c.trim().to_string()).collect();
        // Exports often carry a trailing empty column.
        while columns.last().is_some_and(String::is_empty) {
            columns.pop();
        }
        if columns.len() < 2 {
            return Err(CorpusError::NoSymptomColumns);
        }

        let label_column = columns.pop().unwrap_or_default();
        rename_duplicates(&mut columns);
        let vocabulary = SymptomVocabulary::new(columns.iter().cloned());

        let width = columns.len() + 1;
        let mut records = Vec::new();
        for row in rows {
            let row = row?;
            let line = row.position().map_or(0, |p| p.line());
            if row.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            let extra_non_empty = row.iter().skip(width).any(|f| !f.trim().is_empty());
            if row.len() < width || extra_non_empty {
                return Err(CorpusError::RowLength {
                    line,
                    expected: width,
                    found: row.len(),
                });
            }

            let mut present = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                let value = row.get(i).unwrap_or_default().trim();
                match value {
                    "0" => present.push(false),
                    "1" => present.push(true),
                    other => {
                        return Err(CorpusError::NonBinary {
                            line,
                            column: column.clone(),
                            value: other.to_string(),
                        })
                    }
                }
            }

            let label = row.get(columns.len()).unwrap_or_default().trim();
            if label.is_empty() {
                return Err(CorpusError::EmptyLabel { line });
            }
            records.push(TrainingRecord {
                present,
                label: label.to_string(),
            });
        }

        if records.is_empty() {
            return Err(CorpusError::Empty);
        }

        tracing::debug!(
            "Parsed corpus: {} symptoms, {} records",
            vocabulary.len(),
            records.len()
        );

        Ok(Self {
            vocabulary,
            label_column,
            records,
        })
    }

    /// Parse a corpus that must share this corpus's column layout.
    ///
    /// # Errors
    /// Returns `CorpusError::HeaderMismatch` if the columns differ.
    pub fn companion_from_reader<R: Read>(&self, reader: R) -> Result<Self, CorpusError> {
        let other = Self::from_reader(reader)?;
        if other.vocabulary != self.vocabulary || other.label_column != self.label_column {
            return Err(CorpusError::HeaderMismatch);
        }
        Ok(other)
    }

    #[must_use]
    pub fn vocabulary(&self) -> &SymptomVocabulary {
        &self.vocabulary
    }

    #[must_use]
    pub fn records(&self) -> &[TrainingRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Space-joined names of the symptoms present in a record.
    #[must_use]
    pub fn symptom_text(&self, record: &TrainingRecord) -> String {
        record
            .present_indices()
            .filter_map(|i| self.vocabulary.name(i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Per-disease union of the symptoms seen in its records.
    #[must_use]
    pub fn disease_profiles(&self) -> DiseaseProfiles {
        let mut seen: BTreeMap<String, Vec<bool>> = BTreeMap::new();
        for record in &self.records {
            let entry = seen
                .entry(record.label.clone())
                .or_insert_with(|| vec![false; self.vocabulary.len()]);
            for i in record.present_indices() {
                entry[i] = true;
            }
        }

        let profiles = seen
            .into_iter()
            .map(|(label, mask)| {
                let indices = mask
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &p)| p.then_some(i))
                    .collect();
                (label, indices)
            })
            .collect();
        DiseaseProfiles { profiles }
    }
}

/// Symptoms ever observed per disease, in vocabulary order.
#[derive(Debug, Clone, Default)]
pub struct DiseaseProfiles {
    profiles: BTreeMap<String, Vec<usize>>,
}

impl DiseaseProfiles {
    /// Vocabulary indices associated with a disease.
    #[must_use]
    pub fn symptoms_for(&self, disease: &str) -> Option<&[usize]> {
        self.profiles.get(disease.trim()).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "itching,skin_rash,chills,prognosis\n\
                         1,1,0,Fungal infection\n\
                         0,1,0,Fungal infection\n\
                         0,0,1,Malaria\n";

    #[test]
    fn test_parse_corpus() {
        let corpus = TrainingCorpus::from_reader(TABLE.as_bytes()).expect("Should parse");
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.vocabulary().len(), 3);
        assert_eq!(corpus.records()[0].label, "Fungal infection");
        assert_eq!(corpus.symptom_text(&corpus.records()[0]), "itching skin_rash");
    }

    #[test]
    fn test_trailing_empty_column_tolerated() {
        let table = "itching,chills,prognosis,\n1,0,Allergy,\n";
        let corpus = TrainingCorpus::from_reader(table.as_bytes()).expect("Should parse");
        assert_eq!(corpus.vocabulary().len(), 2);
        assert_eq!(corpus.records()[0].label, "Allergy");
    }

    #[test]
    fn test_non_binary_cell_rejected() {
        let table = "itching,prognosis\n2,Allergy\n";
        let err = TrainingCorpus::from_reader(table.as_bytes()).unwrap_err();
        assert!(matches!(err, CorpusError::NonBinary { .. }));
    }

    #[test]
    fn test_short_row_rejected() {
        let table = "itching,chills,prognosis\n1,Allergy\n";
        let err = TrainingCorpus::from_reader(table.as_bytes()).unwrap_err();
        assert!(matches!(err, CorpusError::RowLength { expected: 3, .. }));
    }

    #[test]
    fn test_header_only_rejected() {
        let err = TrainingCorpus::from_reader("itching,prognosis\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CorpusError::Empty));

        let err = TrainingCorpus::from_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, CorpusError::MissingHeader));
    }

    #[test]
    fn test_duplicate_columns_renamed() {
        let table = "itching,itching,chills,itching.1,itching,prognosis\n1,0,1,0,1,Allergy\n";
        let corpus = TrainingCorpus::from_reader(table.as_bytes()).expect("Should parse");
        let names: Vec<&str> = corpus.vocabulary().names().collect();
        assert_eq!(
            names,
            vec!["itching", "itching.1", "chills", "itching.1.1", "itching.2"]
        );
        assert_eq!(corpus.records()[0].present_indices().collect::<Vec<_>>(), vec![0, 2, 4]);

        let testing = "itching,itching,chills,itching.1,itching,prognosis\n0,1,0,0,0,Allergy\n";
        assert!(corpus.companion_from_reader(testing.as_bytes()).is_ok());
    }

    #[test]
    fn test_companion_header_must_match() {
        let corpus = TrainingCorpus::from_reader(TABLE.as_bytes()).expect("Should parse");
        let testing = "itching,skin_rash,chills,prognosis\n0,0,1,Malaria\n";
        assert!(corpus.companion_from_reader(testing.as_bytes()).is_ok());

        let reordered = "skin_rash,itching,chills,prognosis\n0,0,1,Malaria\n";
        let err = corpus.companion_from_reader(reordered.as_bytes()).unwrap_err();
        assert!(matches!(err, CorpusError::HeaderMismatch));
    }

    #[test]
    fn test_disease_profiles_union_rows() {
        let corpus = TrainingCorpus::from_reader(TABLE.as_bytes()).expect("Should parse");
        let profiles = corpus.disease_profiles();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles.symptoms_for("Fungal infection"), Some(&[0, 1][..]));
        assert_eq!(profiles.symptoms_for("Malaria"), Some(&[2][..]));
        assert!(profiles.symptoms_for("Acne").is_none());
    }
}
