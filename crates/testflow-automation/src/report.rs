//! HTML run reports.
//!
//! Reports are self-contained static HTML files written next to the other run
//! artifacts. A rebranding pass rewrites reports produced under a vendor name,
//! keyed on a `data-branding` marker so it never rewrites a file twice.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use testflow_core::{ExecutionStatus, Framework};

use crate::error::AutomationError;

/// Marker attribute identifying an already-branded report.
const BRANDING_MARKER: &str = r#"data-branding="testflow""#;

/// Vendor strings replaced by the rebranding pass.
const VENDOR_REWRITES: &[(&str, &str)] = &[
    ("Automation Report - Browser Use", "TestFlow Run Report"),
    ("Browser Use Agent", "TestFlow"),
    ("browser-use", "testflow"),
    ("Browser Use", "TestFlow"),
];

/// One step row in a report.
#[derive(Debug, Clone)]
pub struct ReportStep {
    pub number: i64,
    pub description: String,
    pub status: ExecutionStatus,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}

/// Everything a report needs about the run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub execution_id: String,
    pub task: String,
    pub framework: Framework,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<ReportStep>,
    /// Screenshot file names relative to the report, in capture order.
    pub screenshots: Vec<String>,
    pub error: Option<String>,
}

/// Renders and writes run reports.
#[derive(Debug, Default)]
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Render a run summary to a standalone HTML document.
    pub fn render(&self, summary: &RunSummary) -> String {
        let duration_ms = (summary.finished_at - summary.started_at).num_milliseconds();
        let status_class = status_class_for(summary.status);

        let step_rows: String = summary
            .steps
            .iter()
            .map(|step| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td></tr>\n",
                    step.number,
                    escape(&step.description),
                    status_class_str(status_class_for(step.status)),
                    step.status,
                    step.duration_ms
                        .map(|ms| format!("{} ms", ms))
                        .unwrap_or_else(|| "-".to_string()),
                    step.error.as_deref().map(escape).unwrap_or_default(),
                )
            })
            .collect();

        let screenshot_figures: String = summary
            .screenshots
            .iter()
            .map(|name| {
                format!(
                    "<figure><img src=\"{name}\" alt=\"{name}\"><figcaption>{name}</figcaption></figure>\n",
                    name = escape(name)
                )
            })
            .collect();

        let error_block = summary
            .error
            .as_deref()
            .map(|e| format!("<div class=\"error-box\">{}</div>\n", escape(e)))
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html lang="en" {marker}>
<head>
<meta charset="utf-8">
<title>TestFlow Run Report</title>
<style>
body {{ font-family: -apple-system, system-ui, sans-serif; margin: 2rem auto; max-width: 60rem; color: #1a1a2e; }}
h1 {{ font-size: 1.4rem; }}
table {{ border-collapse: collapse; width: 100%; margin-top: 1rem; }}
th, td {{ border: 1px solid #ddd; padding: 0.5rem; text-align: left; font-size: 0.9rem; }}
th {{ background: #f4f4f8; }}
.meta {{ color: #555; font-size: 0.9rem; }}
.status-passed {{ color: #1b7f3b; font-weight: 600; }}
.status-failed, .status-error {{ color: #b02a2a; font-weight: 600; }}
.status-stopped {{ color: #8a6d00; font-weight: 600; }}
.error-box {{ background: #fdecec; border: 1px solid #b02a2a; padding: 0.75rem; margin-top: 1rem; border-radius: 4px; }}
figure {{ display: inline-block; margin: 1rem 1rem 0 0; }}
figure img {{ max-width: 28rem; border: 1px solid #ddd; }}
figcaption {{ font-size: 0.8rem; color: #555; }}
</style>
</head>
<body>
<h1>TestFlow Run Report</h1>
<p class="meta">
Execution {execution_id}<br>
Framework: {framework} &middot; Status: <span class="{status_class}">{status}</span><br>
Started {started} &middot; Finished {finished} &middot; Duration {duration_ms} ms
</p>
<p>Task: {task}</p>
{error_block}<h2>Steps</h2>
<table>
<thead><tr><th>#</th><th>Step</th><th>Status</th><th>Duration</th><th>Error</th></tr></thead>
<tbody>
{step_rows}</tbody>
</table>
<h2>Screenshots</h2>
{screenshot_figures}</body>
</html>
"#,
            marker = BRANDING_MARKER,
            execution_id = escape(&summary.execution_id),
            framework = summary.framework,
            status = summary.status,
            status_class = status_class_str(status_class),
            started = summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            finished = summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
            duration_ms = duration_ms,
            task = escape(&summary.task),
            error_block = error_block,
            step_rows = step_rows,
            screenshot_figures = screenshot_figures,
        )
    }

    /// Render and write the report, returning its path.
    pub fn write_report(
        &self,
        summary: &RunSummary,
        dir: &Path,
    ) -> Result<PathBuf, AutomationError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("report-{}.html", summary.execution_id));
        fs::write(&path, self.render(summary))?;
        debug!("wrote report {}", path.display());
        Ok(path)
    }
}

/// Rewrite vendor branding in every HTML file under `dir` (non-recursive).
///
/// Files already carrying the branding marker are left alone, so the pass is
/// idempotent. Returns the number of rewritten files; unreadable files are
/// skipped with a warning.
pub fn rebrand_reports(dir: &Path) -> Result<usize, AutomationError> {
    let mut rewritten = 0;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("skipping unreadable report {}: {}", path.display(), e);
                continue;
            }
        };

        if content.contains(BRANDING_MARKER) {
            continue;
        }

        let mut updated = content;
        for (vendor, replacement) in VENDOR_REWRITES {
            updated = updated.replace(vendor, replacement);
        }
        // Stamp the marker so the next pass skips this file
        updated = updated.replacen("<html", &format!("<html {} ", BRANDING_MARKER), 1);

        fs::write(&path, updated)?;
        rewritten += 1;
        debug!("rebranded {}", path.display());
    }

    Ok(rewritten)
}

#[derive(Clone, Copy)]
enum StatusClass {
    Passed,
    Failed,
    Error,
    Stopped,
    Running,
}

fn status_class_for(status: ExecutionStatus) -> StatusClass {
    match status {
        ExecutionStatus::Passed => StatusClass::Passed,
        ExecutionStatus::Failed => StatusClass::Failed,
        ExecutionStatus::Error => StatusClass::Error,
        ExecutionStatus::Stopped => StatusClass::Stopped,
        ExecutionStatus::Running => StatusClass::Running,
    }
}

fn status_class_str(class: StatusClass) -> &'static str {
    match class {
        StatusClass::Passed => "status-passed",
        StatusClass::Failed => "status-failed",
        StatusClass::Error => "status-error",
        StatusClass::Stopped => "status-stopped",
        StatusClass::Running => "status-running",
    }
}

/// Minimal HTML escaping for text content and attribute values.
fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
