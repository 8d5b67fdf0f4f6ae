//! Execution domain types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an execution.
///
/// Transitions are forward-only: `Running` may move to any terminal status,
/// terminal statuses never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// The task is still being executed.
    Running,
    /// The task completed and the agent reported success.
    Passed,
    /// The task completed but the agent reported failure.
    Failed,
    /// The run aborted with an internal error.
    Error,
    /// The run was cancelled via the stop endpoint.
    Stopped,
}

impl ExecutionStatus {
    /// Whether this status ends the execution's lifecycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        match self {
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "error" => Ok(Self::Error),
            "stopped" => Ok(Self::Stopped),
            other => Err(format!("unknown execution status: {}", other)),
        }
    }
}

/// Automation framework requested by the caller.
///
/// Both values drive the same Chromium session; the framework selects the
/// launch profile (flag set and user agent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    Playwright,
    Puppeteer,
}

impl Framework {
    /// All supported frameworks.
    pub const ALL: [Framework; 2] = [Framework::Playwright, Framework::Puppeteer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playwright => "playwright",
            Self::Puppeteer => "puppeteer",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "playwright" => Ok(Self::Playwright),
            "puppeteer" => Ok(Self::Puppeteer),
            other => Err(format!("unsupported framework: {}", other)),
        }
    }
}

/// One end-to-end run of a natural-language automation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Execution ID (UUID v4).
    pub id: String,
    /// The natural-language task as submitted.
    pub task: String,
    /// Framework requested for the run.
    pub framework: Framework,
    /// Current status.
    pub status: ExecutionStatus,
    /// When the run was requested.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Total wall-clock duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Error message for `failed`/`error` runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Execution {
    /// Create a new execution in the `Running` state.
    pub fn new(task: impl Into<String>, framework: Framework) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task: task.into(),
            framework,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            error: None,
        }
    }
}

/// One tracked instruction attempt within an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Owning execution ID.
    pub execution_id: String,
    /// 1-based position within the execution, strictly increasing.
    pub step_number: i64,
    /// The instruction that was dispatched.
    pub instruction: String,
    /// Whether the instruction succeeded.
    pub success: bool,
    /// Instruction wall-clock duration in milliseconds.
    pub duration_ms: i64,
    /// Screenshot taken for this step, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    /// Error message when the instruction failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Kind of file produced during an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Screenshot,
    HtmlReport,
    Video,
    Log,
    Performance,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Screenshot => "screenshot",
            Self::HtmlReport => "html_report",
            Self::Video => "video",
            Self::Log => "log",
            Self::Performance => "performance",
        }
    }

    /// Default MIME type for artifacts of this kind.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Screenshot => "image/png",
            Self::HtmlReport => "text/html; charset=utf-8",
            Self::Video => "video/webm",
            Self::Log => "text/plain; charset=utf-8",
            Self::Performance => "application/json",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "screenshot" => Ok(Self::Screenshot),
            "html_report" | "report" => Ok(Self::HtmlReport),
            "video" => Ok(Self::Video),
            "log" => Ok(Self::Log),
            "performance" => Ok(Self::Performance),
            other => Err(format!("unknown artifact kind: {}", other)),
        }
    }
}

/// A stored file associated with an execution. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact ID (UUID v4).
    pub id: String,
    /// Owning execution ID.
    pub execution_id: String,
    pub kind: ArtifactKind,
    /// Absolute path of the file on disk.
    pub file_path: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(
        execution_id: impl Into<String>,
        kind: ArtifactKind,
        file_path: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            kind,
            file_path: file_path.into(),
            mime_type: kind.mime_type().to_string(),
            description,
            created_at: Utc::now(),
        }
    }
}

/// Coverage status of a requirement mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    #[default]
    Covered,
    Partial,
    NotCovered,
}

impl CoverageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Covered => "covered",
            Self::Partial => "partial",
            Self::NotCovered => "not_covered",
        }
    }
}

impl FromStr for CoverageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "covered" => Ok(Self::Covered),
            "partial" => Ok(Self::Partial),
            "not_covered" => Ok(Self::NotCovered),
            other => Err(format!("unknown coverage status: {}", other)),
        }
    }
}

/// Traceability link between an execution and a requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementMapping {
    /// Requirement identifier supplied by the caller.
    pub requirement_id: String,
    /// Human-readable requirement name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coverage: CoverageStatus,
}

/// Caller-tunable options for a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Run the browser headless.
    pub headless: bool,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
    /// Overall task timeout in milliseconds.
    pub timeout_ms: u64,
    /// Delay inserted between agent actions, in milliseconds.
    pub slow_mo_ms: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            timeout_ms: 120_000,
            slow_mo_ms: 0,
        }
    }
}
