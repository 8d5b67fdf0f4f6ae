//! Core domain types and configuration for testflow.
//!
//! Everything the other crates agree on lives here: the execution model
//! (executions, steps, artifacts, requirement mappings), run options, and
//! the TOML configuration schema with its loader.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ConfigLoader};
pub use error::ConfigError;
pub use types::{
    Artifact, ArtifactKind, CoverageStatus, Execution, ExecutionStatus, Framework,
    RequirementMapping, RunOptions, Step,
};
