//! Automation session workflow.
//!
//! One [`AutomationSession`] owns one browser process for one execution:
//! initialize (launch + attach), run a natural-language task through the
//! planning agent, capture screenshots, write an HTML report, clean up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use testflow_core::{ArtifactKind, ExecutionStatus, Framework, RunOptions};

use crate::agent::{AgentClient, PageSnapshot, PlanAction};
use crate::cdp::{CdpClient, PageSession};
use crate::error::AutomationError;
use crate::launcher::{BrowserLauncher, LaunchProfile, LaunchedBrowser};
use crate::preprocess::TaskPreprocessor;
use crate::report::{ReportBuilder, ReportStep, RunSummary};

/// Text snapshot size handed to the planning agent.
const SNAPSHOT_MAX_LEN: usize = 4000;

/// Everything needed to set up a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub execution_id: String,
    pub framework: Framework,
    pub run: RunOptions,
    /// Directory artifacts for this execution are written into.
    pub artifacts_dir: PathBuf,
    pub browser_binary: Option<String>,
    pub agent_endpoint: String,
    pub agent_api_key: Option<String>,
    pub agent_max_actions: usize,
    pub agent_timeout_seconds: u64,
}

/// Coarse milestones reported while a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Started,
    Navigating,
    Executing,
    Capturing,
    Finished,
}

/// A progress notification for the caller's channel of choice.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProgressStage,
    pub message: String,
}

/// Callback invoked at each progress milestone.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Result of one tracked step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub number: i64,
    pub description: String,
    pub status: ExecutionStatus,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}

/// A file produced during the run.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub path: PathBuf,
}

/// Outcome of a task run. Failures are carried in-band, not as `Err`.
#[derive(Debug)]
pub struct TaskOutcome {
    pub success: bool,
    pub steps: Vec<StepResult>,
    pub artifacts: Vec<ArtifactFile>,
    pub report_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// A browser automation session bound to one execution.
pub struct AutomationSession {
    options: SessionOptions,
    profile: LaunchProfile,
    preprocessor: TaskPreprocessor,
    reports: ReportBuilder,
    agent: AgentClient,
    progress: Option<ProgressCallback>,
    browser: Option<LaunchedBrowser>,
    client: Option<CdpClient>,
    page: Option<PageSession>,
}

impl AutomationSession {
    pub fn new(options: SessionOptions) -> Result<Self, AutomationError> {
        let profile = LaunchProfile::for_framework(options.framework, &options.run);
        let agent = AgentClient::new(
            options.agent_endpoint.clone(),
            options.agent_api_key.clone(),
            options.agent_max_actions,
            options.agent_timeout_seconds,
        )?;

        Ok(Self {
            options,
            profile,
            preprocessor: TaskPreprocessor::new(),
            reports: ReportBuilder::new(),
            agent,
            progress: None,
            browser: None,
            client: None,
            page: None,
        })
    }

    /// Install the progress callback. Must be set before `run_task` for
    /// milestones to be observed.
    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    fn emit(&self, stage: ProgressStage, message: impl Into<String>) {
        if let Some(cb) = &self.progress {
            cb(ProgressUpdate {
                stage,
                message: message.into(),
            });
        }
    }

    /// Launch the browser and attach a configured page session.
    ///
    /// Launch and attach failures propagate; a session that fails here must
    /// not be used for tasks.
    pub async fn initialize(&mut self) -> Result<(), AutomationError> {
        let launcher = BrowserLauncher::resolve(self.options.browser_binary.as_deref())?;
        let browser = launcher.launch(&self.profile).await?;

        let client = CdpClient::connect(browser.endpoint()).await?;
        let page = client.new_page().await?;
        page.set_user_agent(&self.profile.user_agent).await?;
        page.set_viewport(
            self.options.run.viewport_width,
            self.options.run.viewport_height,
        )
        .await?;

        info!(
            execution = %self.options.execution_id,
            framework = %self.options.framework,
            "automation session initialized"
        );

        self.browser = Some(browser);
        self.client = Some(client);
        self.page = Some(page);
        Ok(())
    }

    /// Run one natural-language task to completion.
    ///
    /// The task is preprocessed, planned by the agent, and executed against
    /// the page under the configured timeout. Screenshot and report failures
    /// never fail the run; they are logged and recorded as absent.
    pub async fn run_task(&mut self, task: &str) -> TaskOutcome {
        let started_at = Utc::now();
        let mut artifacts = Vec::new();

        self.emit(ProgressStage::Started, format!("running task: {}", task));

        if self.page.is_none() {
            return self.finish_task(task, started_at, artifacts, Err(AutomationError::NotInitialized));
        }

        self.capture_screenshot("initial", &mut artifacts).await;

        let timeout = Duration::from_millis(self.options.run.timeout_ms);
        let result = match tokio::time::timeout(timeout, self.execute_task(task)).await {
            Ok(result) => result,
            Err(_) => Err(AutomationError::Timeout(self.options.run.timeout_ms)),
        };

        self.emit(ProgressStage::Capturing, "capturing final state");
        let label = if result.is_ok() { "final" } else { "error" };
        self.capture_screenshot(label, &mut artifacts).await;

        self.finish_task(task, started_at, artifacts, result)
    }

    /// Preprocess, plan, and execute. This is the cancellable/timeboxed part
    /// of the run.
    async fn execute_task(&self, task: &str) -> Result<(), AutomationError> {
        let page = self.page.as_ref().ok_or(AutomationError::NotInitialized)?;
        let prepared = self.preprocessor.prepare(task);

        let mut instruction = prepared.instruction.clone();
        if let Some(url) = &prepared.navigation {
            self.emit(ProgressStage::Navigating, format!("navigating to {}", url));
            if let Err(e) = page.navigate(url).await {
                // Fall back to letting the agent see the original wording
                warn!("direct navigation to {} failed: {}", url, e);
                instruction = task.to_string();
            }
        }

        if instruction.trim().is_empty() {
            debug!("task was purely navigational, skipping agent");
            return Ok(());
        }

        self.emit(ProgressStage::Executing, "planning actions");
        let snapshot = PageSnapshot {
            url: page.current_url().await?,
            title: page.title().await?,
            page_text: page.page_text(SNAPSHOT_MAX_LEN).await?,
        };
        let plan = self.agent.plan(&instruction, &snapshot).await?;

        info!(
            execution = %self.options.execution_id,
            actions = plan.actions.len(),
            "executing agent plan"
        );

        for (index, action) in plan.actions.iter().enumerate() {
            self.emit(
                ProgressStage::Executing,
                format!("action {}/{}", index + 1, plan.actions.len()),
            );
            if self.apply_action(page, action).await? {
                break;
            }
            if self.options.run.slow_mo_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.options.run.slow_mo_ms)).await;
            }
        }

        Ok(())
    }

    /// Apply one planned action. Returns true when the plan is done.
    async fn apply_action(
        &self,
        page: &PageSession,
        action: &PlanAction,
    ) -> Result<bool, AutomationError> {
        match action {
            PlanAction::Navigate { url } => page.navigate(url).await?,
            PlanAction::Click { selector } => page.click_selector(selector).await?,
            PlanAction::Fill { selector, value } => page.fill_selector(selector, value).await?,
            PlanAction::Press { key } => page.press_key(key).await?,
            PlanAction::Scroll { delta_y } => page.scroll_by(*delta_y).await?,
            PlanAction::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            PlanAction::AssertText { text } => {
                let content = page.page_text(100_000).await?;
                if !content.contains(text.as_str()) {
                    return Err(AutomationError::Cdp(crate::cdp::CdpError::JavaScript(
                        format!("assertion failed: page does not contain {:?}", text),
                    )));
                }
            }
            PlanAction::Done { summary } => {
                if let Some(summary) = summary {
                    debug!("plan done: {}", summary);
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Best-effort screenshot; failures are logged, never propagated.
    async fn capture_screenshot(&self, label: &str, artifacts: &mut Vec<ArtifactFile>) {
        let Some(page) = self.page.as_ref() else {
            return;
        };

        let png = match page.screenshot_png().await {
            Ok(png) => png,
            Err(e) => {
                warn!("screenshot ({}) failed: {}", label, e);
                return;
            }
        };

        let file_name = format!("screenshot-{}-{}.png", label, Utc::now().timestamp_millis());
        let path = self.options.artifacts_dir.join(&file_name);
        if let Err(e) = std::fs::create_dir_all(&self.options.artifacts_dir)
            .and_then(|_| std::fs::write(&path, &png))
        {
            warn!("failed to write screenshot {}: {}", path.display(), e);
            return;
        }

        artifacts.push(ArtifactFile {
            kind: ArtifactKind::Screenshot,
            file_name,
            path,
        });
    }

    /// Assemble the outcome, write the report, and emit the final milestone.
    fn finish_task(
        &self,
        task: &str,
        started_at: chrono::DateTime<Utc>,
        mut artifacts: Vec<ArtifactFile>,
        result: Result<(), AutomationError>,
    ) -> TaskOutcome {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds();

        let (status, error) = match &result {
            Ok(()) => (ExecutionStatus::Passed, None),
            Err(AutomationError::Timeout(ms)) => (
                ExecutionStatus::Failed,
                Some(format!("task timed out after {} ms", ms)),
            ),
            Err(e) => (ExecutionStatus::Error, Some(e.to_string())),
        };

        let steps = vec![StepResult {
            number: 1,
            description: task.to_string(),
            status,
            duration_ms: Some(duration_ms),
            error: error.clone(),
        }];

        let summary = RunSummary {
            execution_id: self.options.execution_id.clone(),
            task: task.to_string(),
            framework: self.options.framework,
            status,
            started_at,
            finished_at,
            steps: steps
                .iter()
                .map(|s| ReportStep {
                    number: s.number,
                    description: s.description.clone(),
                    status: s.status,
                    duration_ms: s.duration_ms,
                    error: s.error.clone(),
                })
                .collect(),
            screenshots: artifacts
                .iter()
                .filter(|a| a.kind == ArtifactKind::Screenshot)
                .map(|a| a.file_name.clone())
                .collect(),
            error: error.clone(),
        };

        // Report failures are swallowed like screenshot failures
        let report_path = match self
            .reports
            .write_report(&summary, &self.options.artifacts_dir)
        {
            Ok(path) => {
                artifacts.push(ArtifactFile {
                    kind: ArtifactKind::HtmlReport,
                    file_name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    path: path.clone(),
                });
                Some(path)
            }
            Err(e) => {
                warn!("failed to write report: {}", e);
                None
            }
        };

        // Catch any vendor-branded reports dropped next to ours
        if let Err(e) = crate::report::rebrand_reports(&self.options.artifacts_dir) {
            warn!("report rebranding pass failed: {}", e);
        }

        self.emit(
            ProgressStage::Finished,
            format!("task finished: {}", status),
        );

        TaskOutcome {
            success: status == ExecutionStatus::Passed,
            steps,
            artifacts,
            report_path,
            error,
        }
    }

    /// Tear down the page, CDP client, and browser process. Errors are
    /// logged, never propagated.
    pub async fn cleanup(&mut self) {
        if let Some(page) = self.page.take() {
            if let Some(client) = self.client.as_ref() {
                if let Err(e) = client.close_page(&page).await {
                    warn!("failed to close page: {}", e);
                }
            }
        }
        self.client.take();
        if let Some(browser) = self.browser.take() {
            browser.shutdown().await;
        }
        debug!(execution = %self.options.execution_id, "session cleaned up");
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
