//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual model and table code:
//! - `reference`: CSV reference tables behind `KnowledgeSource`
//! - `tree`: CART decision tree and the interview traversal
//! - `tfidf`: TF-IDF + softmax classifier behind `VerificationModel`
//! - `sanitize`: patient-identifier filtering for logs

pub mod reference;
pub mod sanitize;
pub mod tfidf;
pub mod tree;

pub use reference::{KnowledgeBase, LoadReport, ReferencePaths, TableError};
pub use tfidf::{ClassifierConfig, TfidfVerifier};
pub use tree::{DiagnosticTree, Traversal, TraversalError, TreeConfig};
