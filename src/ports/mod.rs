//! Ports layer: Trait definitions for the engine's collaborators.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the interview orchestration and the concrete reference tables and
//! models it consults.

mod knowledge;
mod verifier;

pub use knowledge::KnowledgeSource;
pub use verifier::{ModelError, Verification, VerificationModel};
