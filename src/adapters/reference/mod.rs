//! Reference table adapter: Implementation of KnowledgeSource.
//!
//! Loads the severity, description and precaution tables from CSV.
//!
//! # Failure Behavior
//!
//! Nothing here is fatal to engine startup:
//! - An unreadable table, or one whose header is missing or too short, yields
//!   an empty map and an error-level [`LoadIssue`].
//! - Rows with too few fields are skipped silently.
//! - A severity that is not an integer is skipped with a warning-level issue.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::domain::{Precautions, PRECAUTION_COUNT};
use crate::ports::KnowledgeSource;

/// Which reference table an issue belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Severity,
    Description,
    Precaution,
}

impl TableKind {
    /// Expected header, for messages.
    #[must_use]
    pub fn expected_header(&self) -> &'static str {
        match self {
            Self::Severity => "Symptom,Severity",
            Self::Description => "Disease,Description",
            Self::Precaution => {
                "Disease,Precaution_1,Precaution_2,Precaution_3,Precaution_4"
            }
        }
    }

    /// Minimum number of columns in the header and in a usable row.
    #[must_use]
    pub fn min_columns(&self) -> usize {
        match self {
            Self::Severity | Self::Description => 2,
            Self::Precaution => 1 + PRECAUTION_COUNT,
        }
    }

    /// Conventional file name in the master data directory.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Severity => "symptom_severity.csv",
            Self::Description => "symptom_Description.csv",
            Self::Precaution => "symptom_precaution.csv",
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Error that makes a whole table unusable.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Error reading {table}: {source}")]
    Io {
        table: TableKind,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing {table}: {source}")]
    Csv {
        table: TableKind,
        #[source]
        source: csv::Error,
    },

    #[error("{table} is missing a valid header (expected '{}')", .table.expected_header())]
    MissingHeader { table: TableKind },
}

/// How serious a load issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// A row was skipped
    Warning,
    /// The whole table was dropped
    Error,
}

/// A non-fatal problem met while loading reference data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadIssue {
    pub table: TableKind,
    pub level: IssueLevel,
    pub message: String,
}

/// All issues from one knowledge base load.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub issues: Vec<LoadIssue>,
}

impl LoadReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Tables that failed outright.
    pub fn failed_tables(&self) -> impl Iterator<Item = TableKind> + '_ {
        self.issues
            .iter()
            .filter(|i| i.level == IssueLevel::Error)
            .map(|i| i.table)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LoadIssue> + '_ {
        self.issues.iter().filter(|i| i.level == IssueLevel::Warning)
    }

    fn table_failed(&mut self, table: TableKind, err: &TableError) {
        tracing::error!("{}", err);
        self.issues.push(LoadIssue {
            table,
            level: IssueLevel::Error,
            message: err.to_string(),
        });
    }

    fn row_skipped(&mut self, table: TableKind, message: String) {
        tracing::warn!("{}", message);
        self.issues.push(LoadIssue {
            table,
            level: IssueLevel::Warning,
            message,
        });
    }
}

/// Locations of the three reference tables.
#[derive(Debug, Clone)]
pub struct ReferencePaths {
    pub severity: PathBuf,
    pub description: PathBuf,
    pub precaution: PathBuf,
}

impl ReferencePaths {
    /// Conventional file names inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            severity: dir.join(TableKind::Severity.file_name()),
            description: dir.join(TableKind::Description.file_name()),
            precaution: dir.join(TableKind::Precaution.file_name()),
        }
    }
}

/// Immutable reference maps.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    severity: HashMap<String, i64>,
    descriptions: HashMap<String, String>,
    precautions: HashMap<String, Precautions>,
}

impl KnowledgeBase {
    /// Load all three tables from disk.
    #[must_use]
    pub fn load(paths: &ReferencePaths) -> (Self, LoadReport) {
        let open = |table: TableKind, path: &Path| {
            File::open(path).map_err(|source| TableError::Io { table, source })
        };

        let mut report = LoadReport::default();
        let mut kb = Self::default();

        match open(TableKind::Severity, &paths.severity) {
            Ok(f) => kb.severity = read_severity(f, &mut report),
            Err(e) => report.table_failed(TableKind::Severity, &e),
        }
        match open(TableKind::Description, &paths.description) {
            Ok(f) => kb.descriptions = read_descriptions(f, &mut report),
            Err(e) => report.table_failed(TableKind::Description, &e),
        }
        match open(TableKind::Precaution, &paths.precaution) {
            Ok(f) => kb.precautions = read_precautions(f, &mut report),
            Err(e) => report.table_failed(TableKind::Precaution, &e),
        }

        kb.log_summary();
        (kb, report)
    }

    /// Load all three tables from in-memory or already-open readers.
    #[must_use]
    pub fn from_readers<S, D, P>(severity: S, description: D, precaution: P) -> (Self, LoadReport)
    where
        S: Read,
        D: Read,
        P: Read,
    {
        let mut report = LoadReport::default();
        let kb = Self {
            severity: read_severity(severity, &mut report),
            descriptions: read_descriptions(description, &mut report),
            precautions: read_precautions(precaution, &mut report),
        };
        kb.log_summary();
        (kb, report)
    }

    fn log_summary(&self) {
        tracing::info!(
            "Knowledge base loaded: {} severities, {} descriptions, {} precaution sets",
            self.severity.len(),
            self.descriptions.len(),
            self.precautions.len()
        );
    }

    #[must_use]
    pub fn severity_count(&self) -> usize {
        self.severity.len()
    }

    #[must_use]
    pub fn description_count(&self) -> usize {
        self.descriptions.len()
    }

    #[must_use]
    pub fn precaution_count(&self) -> usize {
        self.precautions.len()
    }
}

impl KnowledgeSource for KnowledgeBase {
    fn severity(&self, symptom: &str) -> Option<i64> {
        self.severity.get(symptom).copied()
    }

    fn description(&self, disease: &str) -> Option<&str> {
        self.descriptions.get(disease).map(String::as_str)
    }

    fn precautions(&self, disease: &str) -> Option<&Precautions> {
        self.precautions.get(disease)
    }
}

/// Read a table's data rows after validating its header.
///
/// Rows shorter than the table's minimum width are dropped here.
fn read_rows<R: Read>(table: TableKind, reader: R) -> Result<Vec<(u64, Vec<String>)>, TableError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = csv_reader.records();

    let header = match records.next() {
        Some(Ok(h)) => h,
        Some(Err(source)) => return Err(TableError::Csv { table, source }),
        None => return Err(TableError::MissingHeader { table }),
    };
    if header.len() < table.min_columns() {
        return Err(TableError::MissingHeader { table });
    }

    let mut rows = Vec::new();
    for record in records {
        let record = record.map_err(|source| TableError::Csv { table, source })?;
        if record.len() < table.min_columns() {
            continue;
        }
        let line = record.position().map_or(0, |p| p.line());
        rows.push((line, record.iter().map(str::to_string).collect()));
    }
    Ok(rows)
}

fn read_severity<R: Read>(reader: R, report: &mut LoadReport) -> HashMap<String, i64> {
    let table = TableKind::Severity;
    let rows = match read_rows(table, reader) {
        Ok(rows) => rows,
        Err(e) => {
            report.table_failed(table, &e);
            return HashMap::new();
        }
    };

    let mut map = HashMap::new();
    for (line, row) in rows {
        match row[1].trim().parse::<i64>() {
            Ok(weight) => {
                map.insert(row[0].clone(), weight);
            }
            Err(_) => report.row_skipped(
                table,
                format!(
                    "Line {line}: cannot convert severity '{}' to integer for symptom '{}'",
                    row[1], row[0]
                ),
            ),
        }
    }
    map
}

fn read_descriptions<R: Read>(reader: R, report: &mut LoadReport) -> HashMap<String, String> {
    match read_rows(TableKind::Description, reader) {
        Ok(rows) => rows
            .into_iter()
            .map(|(_, mut row)| {
                let description = row.swap_remove(1);
                (row.swap_remove(0), description)
            })
            .collect(),
        Err(e) => {
            report.table_failed(TableKind::Description, &e);
            HashMap::new()
        }
    }
}

fn read_precautions<R: Read>(reader: R, report: &mut LoadReport) -> HashMap<String, Precautions> {
    match read_rows(TableKind::Precaution, reader) {
        Ok(rows) => rows
            .into_iter()
            .map(|(_, row)| {
                let mut fields = row.into_iter();
                let disease = fields.next().unwrap_or_default();
                let precautions: Precautions =
                    std::array::from_fn(|_| fields.next().unwrap_or_default());
                (disease, precautions)
            })
            .collect(),
        Err(e) => {
            report.table_failed(TableKind::Precaution, &e);
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEVERITY: &str = "Symptom,Severity\nitching,1\nskin_rash,3\nchills,high\n\nlonely\n";
    const DESCRIPTION: &str =
        "Disease,Description\nAcne,\"Acne, a skin condition\"\nMalaria,Mosquito-borne\n";
    const PRECAUTION: &str = "Disease,Precaution_1,Precaution_2,Precaution_3,Precaution_4\n\
                              Acne,bath twice,avoid fatty food,drink water,avoid stress\n\
                              Malaria,consult doctor,avoid oily food,keep mosquitos out\n";

    fn load() -> (KnowledgeBase, LoadReport) {
        KnowledgeBase::from_readers(
            SEVERITY.as_bytes(),
            DESCRIPTION.as_bytes(),
            PRECAUTION.as_bytes(),
        )
    }

    #[test]
    fn test_severity_table() {
        let (kb, report) = load();
        assert_eq!(kb.severity("itching"), Some(1));
        assert_eq!(kb.severity("skin_rash"), Some(3));
        assert_eq!(kb.severity("chills"), None);
        assert_eq!(kb.severity_count(), 2);

        let warnings: Vec<_> = report.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("'high'"));
        assert_eq!(report.failed_tables().count(), 0);
    }

    #[test]
    fn test_description_with_quoted_comma() {
        let (kb, _) = load();
        assert_eq!(kb.description("Acne"), Some("Acne, a skin condition"));
        assert_eq!(kb.description("Typhoid"), None);
    }

    #[test]
    fn test_short_precaution_row_skipped() {
        let (kb, report) = load();
        let acne = kb.precautions("Acne").expect("Should have precautions");
        assert_eq!(acne[3], "avoid stress");
        assert!(kb.precautions("Malaria").is_none());
        // Short rows are skipped silently.
        assert!(report.warnings().all(|w| w.table != TableKind::Precaution));
    }

    #[test]
    fn test_short_header_fails_table_only() {
        let (kb, report) = KnowledgeBase::from_readers(
            SEVERITY.as_bytes(),
            DESCRIPTION.as_bytes(),
            "Disease,Precaution_1\nAcne,a,b,c,d\n".as_bytes(),
        );
        assert_eq!(kb.precaution_count(), 0);
        assert_eq!(kb.severity_count(), 2);
        assert_eq!(report.failed_tables().collect::<Vec<_>>(), vec![TableKind::Precaution]);
    }

    #[test]
    fn test_empty_table_fails() {
        let (kb, report) =
            KnowledgeBase::from_readers("".as_bytes(), DESCRIPTION.as_bytes(), PRECAUTION.as_bytes());
        assert_eq!(kb.severity_count(), 0);
        assert!(!report.is_clean());
        assert_eq!(report.failed_tables().next(), Some(TableKind::Severity));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        std::fs::write(dir.path().join("symptom_severity.csv"), SEVERITY).expect("Should write");
        std::fs::write(dir.path().join("symptom_Description.csv"), DESCRIPTION)
            .expect("Should write");
        // Precaution table deliberately missing.

        let (kb, report) = KnowledgeBase::load(&ReferencePaths::in_dir(dir.path()));
        assert_eq!(kb.severity_count(), 2);
        assert_eq!(kb.description_count(), 2);
        assert_eq!(kb.precaution_count(), 0);
        assert_eq!(report.failed_tables().collect::<Vec<_>>(), vec![TableKind::Precaution]);
    }
}
