//! Schema Analysis Module
//!
//! The analysis pipeline, leaf-first:
//! - Shape validation of incoming schema documents
//! - Diff generation between two documents
//! - Impact classification of the resulting changes
//! - Query compatibility checks against the new schema
//! - Migration recommendations
//!
//! Everything here is pure and synchronous; storage, auth and metrics live
//! outside this module.

pub mod diff;
pub mod impact;
pub mod orchestrator;
pub mod query;
pub mod recommend;
pub mod schema;
pub mod types;
pub mod validator;

pub use impact::ImpactThresholds;
pub use orchestrator::SchemaAnalyzer;
#[allow(unused_imports)]
pub use types::{AnalysisReport, ImpactAssessment, QueryValidationResult, Recommendation, SchemaChange};
pub use validator::SchemaShapeError;
