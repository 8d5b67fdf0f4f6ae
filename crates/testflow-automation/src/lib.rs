//! Browser automation for testflow.
//!
//! An [`AutomationSession`] drives one Chromium process through one
//! natural-language task: launch (per framework profile), CDP session setup,
//! best-effort task preprocessing, plan execution via the external planning
//! agent, screenshot capture, and HTML report generation.

pub mod agent;
pub mod cdp;
pub mod error;
pub mod launcher;
pub mod preprocess;
pub mod report;
pub mod service;

pub use error::AutomationError;
pub use service::{
    ArtifactFile, AutomationSession, ProgressCallback, ProgressStage, ProgressUpdate,
    SessionOptions, StepResult, TaskOutcome,
};
