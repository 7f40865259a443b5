//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the engine startup and the interview use cases.

mod engine;
pub mod evaluation;
mod interview;

pub use engine::{Engine, EngineConfig, EngineSources};
pub use evaluation::EvaluationReport;
pub use interview::InterviewService;
