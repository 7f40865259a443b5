//! Engine: one-time training and the shared, immutable model state.
//!
//! Startup is synchronous and CPU-bound:
//! - Parse the training table (fatal on malformed data)
//! - Fit the decision tree and the verification classifier (fatal on failure)
//! - Load the reference tables (never fatal; issues are reported)
//! - Score both models on the testing table and cross-validate the tree
//!
//! After that nothing is mutated, and the engine hands out cheap
//! [`InterviewService`] handles that share the models through `Arc`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::adapters::{
    ClassifierConfig, DiagnosticTree, KnowledgeBase, LoadReport, ReferencePaths, TfidfVerifier,
    TreeConfig,
};
use crate::domain::matcher;
use crate::domain::{DiseaseProfiles, LabelEncoder, MatchResult, SymptomVocabulary, TrainingCorpus};
use crate::SymptomaticError;

use super::evaluation::{self, EvaluationReport};
use super::InterviewService;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub training_path: PathBuf,
    /// Scored against after training; a missing file skips holdout scoring
    pub testing_path: PathBuf,
    pub reference: ReferencePaths,
    pub tree: TreeConfig,
    pub classifier: ClassifierConfig,
    /// Tree cross-validation folds; below 2 disables it
    pub cv_folds: usize,
    /// Seed for the cross-validation shuffle
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::with_dirs(Path::new("Data"), Path::new("MasterData"))
    }
}

impl EngineConfig {
    /// Conventional file names under a data and a reference directory.
    #[must_use]
    pub fn with_dirs(data_dir: &Path, master_dir: &Path) -> Self {
        Self {
            training_path: data_dir.join("Training.csv"),
            testing_path: data_dir.join("Testing.csv"),
            reference: ReferencePaths::in_dir(master_dir),
            tree: TreeConfig::default(),
            classifier: ClassifierConfig::default(),
            cv_folds: 3,
            seed: 42,
        }
    }

    /// Load config overrides from environment (best-effort).
    ///
    /// Supported:
    /// - SYMPTOMATIC_DATA_DIR, SYMPTOMATIC_MASTER_DIR
    /// - SYMPTOMATIC_TREE_MAX_DEPTH, SYMPTOMATIC_TREE_MIN_SPLIT
    /// - SYMPTOMATIC_CLASSIFIER_MAX_ITER, SYMPTOMATIC_CLASSIFIER_L2,
    ///   SYMPTOMATIC_CLASSIFIER_LR
    /// - SYMPTOMATIC_CV_FOLDS, SYMPTOMATIC_SEED
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("SYMPTOMATIC_DATA_DIR").unwrap_or_else(|| "Data".to_string());
        let master_dir =
            lookup("SYMPTOMATIC_MASTER_DIR").unwrap_or_else(|| "MasterData".to_string());
        let mut cfg = Self::with_dirs(Path::new(&data_dir), Path::new(&master_dir));

        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(Ok(x)) = parsed("SYMPTOMATIC_TREE_MAX_DEPTH").map(|v| v.parse::<usize>()) {
            if x > 0 {
                cfg.tree.max_depth = Some(x);
            }
        }
        if let Some(Ok(x)) = parsed("SYMPTOMATIC_TREE_MIN_SPLIT").map(|v| v.parse::<usize>()) {
            if x >= 2 {
                cfg.tree.min_samples_split = x;
            }
        }
        if let Some(Ok(x)) = parsed("SYMPTOMATIC_CLASSIFIER_MAX_ITER").map(|v| v.parse::<usize>())
        {
            if x > 0 {
                cfg.classifier.max_iter = x;
            }
        }
        if let Some(Ok(x)) = parsed("SYMPTOMATIC_CLASSIFIER_L2").map(|v| v.parse::<f64>()) {
            if x.is_finite() && x >= 0.0 {
                cfg.classifier.l2 = x;
            }
        }
        if let Some(Ok(x)) = parsed("SYMPTOMATIC_CLASSIFIER_LR").map(|v| v.parse::<f64>()) {
            if x.is_finite() && x > 0.0 {
                cfg.classifier.learning_rate = x;
            }
        }
        if let Some(Ok(x)) = parsed("SYMPTOMATIC_CV_FOLDS").map(|v| v.parse::<usize>()) {
            cfg.cv_folds = x;
        }
        if let Some(Ok(x)) = parsed("SYMPTOMATIC_SEED").map(|v| v.parse::<u64>()) {
            cfg.seed = x;
        }

        cfg
    }
}

/// Already-open inputs for [`Engine::from_sources`].
pub struct EngineSources<'a> {
    pub training: Box<dyn Read + 'a>,
    pub testing: Option<Box<dyn Read + 'a>>,
    pub severity: Box<dyn Read + 'a>,
    pub description: Box<dyn Read + 'a>,
    pub precaution: Box<dyn Read + 'a>,
}

/// Trained models and reference data, immutable after construction.
#[derive(Debug, Clone)]
pub struct Engine {
    vocabulary: Arc<SymptomVocabulary>,
    labels: LabelEncoder,
    profiles: Arc<DiseaseProfiles>,
    tree: Arc<DiagnosticTree>,
    verifier: Arc<TfidfVerifier>,
    knowledge: Arc<KnowledgeBase>,
    load_report: LoadReport,
    evaluation: EvaluationReport,
    fingerprint: String,
}

fn sha256_hex_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn read_table(path: &Path, what: &str) -> Result<Vec<u8>, SymptomaticError> {
    std::fs::read(path).map_err(|e| {
        SymptomaticError::Initialization(format!(
            "cannot read {what} table {}: {e}",
            path.display()
        ))
    })
}

impl Engine {
    /// Train from the files named in `config`.
    ///
    /// # Errors
    /// Returns error if the training table is unreadable or malformed, or if
    /// either model cannot be fitted. Reference table problems are not errors;
    /// see [`Engine::load_report`].
    pub fn initialize(config: &EngineConfig) -> Result<Self, SymptomaticError> {
        tracing::info!("Initializing engine from {}", config.training_path.display());

        let training = read_table(&config.training_path, "training")?;
        let testing = if config.testing_path.exists() {
            Some(read_table(&config.testing_path, "testing")?)
        } else {
            tracing::warn!(
                "Testing table {} not found, skipping holdout evaluation",
                config.testing_path.display()
            );
            None
        };
        let (knowledge, report) = KnowledgeBase::load(&config.reference);

        Self::build(&training, testing.as_deref(), knowledge, report, config)
    }

    /// Train from already-open readers. Paths in `config` are ignored.
    ///
    /// # Errors
    /// Same as [`Engine::initialize`].
    pub fn from_sources(
        mut sources: EngineSources<'_>,
        config: &EngineConfig,
    ) -> Result<Self, SymptomaticError> {
        let mut training = Vec::new();
        sources.training.read_to_end(&mut training)?;
        let testing = match sources.testing.as_mut() {
            Some(reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                Some(bytes)
            }
            None => None,
        };
        let (knowledge, report) =
            KnowledgeBase::from_readers(sources.severity, sources.description, sources.precaution);

        Self::build(&training, testing.as_deref(), knowledge, report, config)
    }

    fn build(
        training: &[u8],
        testing: Option<&[u8]>,
        knowledge: KnowledgeBase,
        load_report: LoadReport,
        config: &EngineConfig,
    ) -> Result<Self, SymptomaticError> {
        let fingerprint = sha256_hex_bytes(training);
        let corpus = TrainingCorpus::from_reader(training)?;
        let labels = LabelEncoder::fit(corpus.records().iter().map(|r| r.label.as_str()));
        tracing::info!(
            "Training corpus: {} records, {} symptoms, {} diseases (sha256 {})",
            corpus.len(),
            corpus.vocabulary().len(),
            labels.num_classes(),
            &fingerprint[..12]
        );

        let tree = DiagnosticTree::fit(&corpus, &labels, &config.tree)?;
        let verifier = TfidfVerifier::fit(&corpus, &labels, &config.classifier)?;

        let mut evaluation = EvaluationReport::default();
        if let Some(bytes) = testing {
            let holdout = corpus.companion_from_reader(bytes)?;
            evaluation.tree_accuracy = evaluation::tree_holdout(&tree, &holdout);
            evaluation.verifier_accuracy = evaluation::verifier_holdout(&verifier, &holdout)?;
        }
        evaluation.cv_fold_accuracies = evaluation::cross_validate_tree(
            &corpus,
            &labels,
            &config.tree,
            config.cv_folds,
            config.seed,
        )?;
        log_evaluation(&evaluation);

        if !load_report.is_clean() {
            tracing::warn!(
                "Reference tables loaded with {} issue(s)",
                load_report.issues.len()
            );
        }

        Ok(Self {
            vocabulary: Arc::new(corpus.vocabulary().clone()),
            profiles: Arc::new(corpus.disease_profiles()),
            labels,
            tree: Arc::new(tree),
            verifier: Arc::new(verifier),
            knowledge: Arc::new(knowledge),
            load_report,
            evaluation,
            fingerprint,
        })
    }

    /// Resolve free text to vocabulary symptoms.
    #[must_use]
    pub fn match_symptom(&self, text: &str) -> MatchResult {
        matcher::match_symptom(&self.vocabulary, text)
    }

    /// A service handle sharing this engine's models.
    #[must_use]
    pub fn interview_service(&self) -> InterviewService<TfidfVerifier, KnowledgeBase> {
        InterviewService::new(
            Arc::clone(&self.tree),
            Arc::clone(&self.vocabulary),
            Arc::clone(&self.profiles),
            Arc::clone(&self.verifier),
            Arc::clone(&self.knowledge),
            self.fingerprint.clone(),
        )
    }

    #[must_use]
    pub fn vocabulary(&self) -> &SymptomVocabulary {
        &self.vocabulary
    }

    #[must_use]
    pub fn labels(&self) -> &LabelEncoder {
        &self.labels
    }

    #[must_use]
    pub fn tree(&self) -> &DiagnosticTree {
        &self.tree
    }

    #[must_use]
    pub fn verifier(&self) -> &TfidfVerifier {
        &self.verifier
    }

    #[must_use]
    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Issues met while loading the reference tables.
    #[must_use]
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    #[must_use]
    pub fn evaluation(&self) -> &EvaluationReport {
        &self.evaluation
    }

    /// SHA-256 hex digest of the raw training table.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn log_evaluation(report: &EvaluationReport) {
    if let Some(acc) = report.tree_accuracy {
        tracing::info!("Decision tree holdout accuracy: {:.3}", acc);
    }
    if let Some(acc) = report.verifier_accuracy {
        tracing::info!("Verifier holdout accuracy: {:.3}", acc);
    }
    if let Some(mean) = report.cv_mean() {
        tracing::info!(
            "Decision tree {}-fold CV accuracy: {:.3}",
            report.cv_fold_accuracies.len(),
            mean
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TRAINING: &str = "itching,skin_rash,chills,vomiting,prognosis\n\
                           1,1,0,0,Fungal infection\n\
                           1,0,0,0,Fungal infection\n\
                           0,0,1,1,Malaria\n\
                           0,0,1,0,Malaria\n\
                           0,0,0,1,Gastroenteritis\n";
    const TESTING: &str = "itching,skin_rash,chills,vomiting,prognosis\n\
                           1,1,0,0,Fungal infection\n\
                           0,0,1,1,Malaria\n";
    const SEVERITY: &str = "Symptom,Severity\nitching,1\nskin_rash,3\nchills,3\nvomiting,5\n";
    const DESCRIPTION: &str = "Disease,Description\nMalaria,Mosquito-borne infection\n";
    const PRECAUTION: &str = "Disease,Precaution_1,Precaution_2,Precaution_3,Precaution_4\n\
                              Malaria,consult doctor,avoid oily food,avoid non veg food,keep mosquitos out\n";

    fn sources<'a>(training: &'a str) -> EngineSources<'a> {
        EngineSources {
            training: Box::new(training.as_bytes()),
            testing: Some(Box::new(TESTING.as_bytes())),
            severity: Box::new(SEVERITY.as_bytes()),
            description: Box::new(DESCRIPTION.as_bytes()),
            precaution: Box::new(PRECAUTION.as_bytes()),
        }
    }

    fn engine() -> Engine {
        let config = EngineConfig {
            cv_folds: 0,
            ..EngineConfig::default()
        };
        Engine::from_sources(sources(TRAINING), &config).expect("Should initialize")
    }

    #[test]
    fn test_engine_from_sources() {
        let engine = engine();
        assert_eq!(engine.vocabulary().len(), 4);
        assert_eq!(engine.labels().num_classes(), 3);
        assert!(engine.load_report().is_clean());
        assert_eq!(engine.evaluation().tree_accuracy, Some(1.0));
        assert!(engine.evaluation().cv_fold_accuracies.is_empty());
        assert_eq!(engine.fingerprint(), sha256_hex_bytes(TRAINING.as_bytes()));
        assert_eq!(engine.fingerprint().len(), 64);
    }

    #[test]
    fn test_every_vocabulary_symptom_matches_itself() {
        let engine = engine();
        for name in engine.vocabulary().names() {
            let result = engine.match_symptom(name);
            assert!(result.found);
            assert!(result.candidates.iter().any(|c| c == name));
        }
        assert!(!engine.match_symptom("").found);

        let irregular = "foul_smell_of urine,toxic_look_(typhos),spotting_ urination,itching,prognosis\n\
                         1,0,1,0,Urinary tract infection\n\
                         0,1,0,0,Typhoid\n\
                         0,0,0,1,Fungal infection\n";
        let config = EngineConfig {
            cv_folds: 0,
            ..EngineConfig::default()
        };
        let engine = Engine::from_sources(
            EngineSources {
                testing: None,
                ..sources(irregular)
            },
            &config,
        )
        .expect("Should initialize");
        assert_eq!(engine.vocabulary().len(), 4);
        for name in engine.vocabulary().names() {
            let result = engine.match_symptom(name);
            assert!(result.found, "{name} should match itself");
            assert!(result.candidates.iter().any(|c| c == name));
        }
    }

    #[test]
    fn test_malformed_training_is_fatal() {
        let bad = "itching,prognosis\n2,Fungal infection\n";
        let err = Engine::from_sources(sources(bad), &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, SymptomaticError::Corpus(_)));

        let header_only = "itching,prognosis\n";
        assert!(Engine::from_sources(sources(header_only), &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_divergent_classifier_is_fatal() {
        let mut config = EngineConfig {
            cv_folds: 0,
            ..EngineConfig::default()
        };
        config.classifier.learning_rate = 1e308;
        config.classifier.l2 = 0.0;
        let err = Engine::from_sources(sources(TRAINING), &config).unwrap_err();
        assert!(matches!(
            err,
            SymptomaticError::Model(crate::ports::ModelError::Diverged { .. })
        ));
    }

    #[test]
    fn test_initialize_from_directory() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let data = dir.path().join("Data");
        let master = dir.path().join("MasterData");
        std::fs::create_dir_all(&data).expect("Should create data dir");
        std::fs::create_dir_all(&master).expect("Should create master dir");
        std::fs::write(data.join("Training.csv"), TRAINING).expect("Should write");
        std::fs::write(master.join("symptom_severity.csv"), SEVERITY).expect("Should write");
        std::fs::write(master.join("symptom_Description.csv"), DESCRIPTION).expect("Should write");

        let config = EngineConfig::with_dirs(&data, &master);
        let engine = Engine::initialize(&config).expect("Should initialize");

        // Testing table and precautions are missing; neither is fatal.
        assert_eq!(engine.evaluation().tree_accuracy, None);
        assert_eq!(engine.load_report().failed_tables().count(), 1);
        assert_eq!(engine.knowledge().severity_count(), 4);
        assert_eq!(engine.evaluation().cv_fold_accuracies.len(), 3);
    }

    #[test]
    fn test_missing_training_file_is_fatal() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let config = EngineConfig::with_dirs(dir.path(), dir.path());
        assert!(matches!(
            Engine::initialize(&config),
            Err(SymptomaticError::Initialization(_))
        ));
    }

    #[test]
    fn test_config_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SYMPTOMATIC_DATA_DIR", "/srv/data"),
            ("SYMPTOMATIC_TREE_MAX_DEPTH", "8"),
            ("SYMPTOMATIC_TREE_MIN_SPLIT", "1"),
            ("SYMPTOMATIC_CLASSIFIER_L2", " 0.01 "),
            ("SYMPTOMATIC_CLASSIFIER_LR", "-3"),
            ("SYMPTOMATIC_CV_FOLDS", "0"),
            ("SYMPTOMATIC_SEED", "nope"),
        ]
        .into_iter()
        .collect();
        let cfg = EngineConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string()));

        assert_eq!(cfg.training_path, PathBuf::from("/srv/data/Training.csv"));
        assert_eq!(cfg.tree.max_depth, Some(8));
        assert_eq!(cfg.tree.min_samples_split, 2);
        assert_eq!(cfg.classifier.l2, 0.01);
        assert_eq!(cfg.classifier.learning_rate, 1.0);
        assert_eq!(cfg.cv_folds, 0);
        assert_eq!(cfg.seed, 42);
        assert_eq!(
            cfg.reference.severity,
            PathBuf::from("MasterData/symptom_severity.csv")
        );
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
