//! Best-effort task preprocessing.
//!
//! Natural-language tasks often start with a navigation phrase ("go to
//! amazon and ...") that the planning agent handles poorly. The preprocessor
//! resolves well-known site names to URLs so navigation can happen directly,
//! and rewrites common e-commerce phrasing into explicit steps. Everything
//! here is best-effort: a task that matches nothing passes through untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Site names the navigation phrase resolver understands.
const KNOWN_SITES: &[(&str, &str)] = &[
    ("amazon", "https://www.amazon.com"),
    ("github", "https://github.com"),
    ("google", "https://www.google.com"),
    ("youtube", "https://www.youtube.com"),
    ("wikipedia", "https://www.wikipedia.org"),
    ("ebay", "https://www.ebay.com"),
    ("reddit", "https://www.reddit.com"),
    ("twitter", "https://twitter.com"),
    ("stackoverflow", "https://stackoverflow.com"),
    ("linkedin", "https://www.linkedin.com"),
];

static ECOMMERCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:go to|visit|open|navigate to)\s+(?P<site>\S+)\s+and\s+(?:buy|add|purchase|order)\s+(?:an?\s+)?(?P<item>.+?)(?:\s+to\s+(?:the\s+)?cart)?\s*$",
    )
    .expect("static pattern")
});

static NAVIGATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:go to|visit|open|navigate to)\s+(?P<target>\S+)\s*(?P<rest>.*)$")
        .expect("static pattern")
});

/// Result of preprocessing a task.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTask {
    /// URL to navigate to directly before involving the agent, if the task
    /// opened with a resolvable navigation phrase.
    pub navigation: Option<String>,
    /// Instruction handed to the agent. May be empty if the task was purely
    /// navigational.
    pub instruction: String,
    /// Whether any rewrite was applied.
    pub rewritten: bool,
}

/// Regex-based task preprocessor.
#[derive(Debug, Default)]
pub struct TaskPreprocessor;

impl TaskPreprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Prepare a task: rewrite e-commerce phrasing, then peel off a leading
    /// navigation phrase when the target resolves to a known site or URL.
    pub fn prepare(&self, task: &str) -> PreparedTask {
        let task = task.trim();

        if let Some(prepared) = self.rewrite_ecommerce(task) {
            return prepared;
        }

        if let Some(prepared) = self.split_navigation(task) {
            return prepared;
        }

        PreparedTask {
            navigation: None,
            instruction: task.to_string(),
            rewritten: false,
        }
    }

    /// "go to amazon and buy a toaster" becomes a direct navigation plus an
    /// explicit search/select/add instruction sequence.
    fn rewrite_ecommerce(&self, task: &str) -> Option<PreparedTask> {
        let caps = ECOMMERCE_RE.captures(task)?;
        let site = caps.name("site")?.as_str();
        let item = caps.name("item")?.as_str().trim();
        let url = resolve_site(site)?;

        let instruction = format!(
            "Search for \"{item}\". Select the first relevant product from the \
             results. Add it to the shopping cart and confirm it was added."
        );

        debug!("rewrote e-commerce task targeting {}", url);
        Some(PreparedTask {
            navigation: Some(url),
            instruction,
            rewritten: true,
        })
    }

    /// Peel a leading navigation phrase off the task when the target is a
    /// known site name or already a URL.
    fn split_navigation(&self, task: &str) -> Option<PreparedTask> {
        let caps = NAVIGATION_RE.captures(task)?;
        let target = caps.name("target")?.as_str();
        let rest = caps.name("rest").map(|m| m.as_str().trim()).unwrap_or("");

        let url = resolve_target(target)?;

        // Drop a leading connective left over from the split
        let instruction = rest
            .trim_start_matches("and ")
            .trim_start_matches("then ")
            .trim()
            .to_string();

        debug!("split navigation to {} from task", url);
        Some(PreparedTask {
            navigation: Some(url),
            instruction,
            rewritten: true,
        })
    }
}

/// Resolve a bare site name through the allow-list.
fn resolve_site(name: &str) -> Option<String> {
    let name = name.trim_end_matches(['.', ',']).to_lowercase();
    KNOWN_SITES
        .iter()
        .find(|(site, _)| *site == name)
        .map(|(_, url)| url.to_string())
}

/// Resolve a navigation target: a known site name, an explicit URL, or a
/// bare domain.
fn resolve_target(target: &str) -> Option<String> {
    if let Some(url) = resolve_site(target) {
        return Some(url);
    }
    let target = target.trim_end_matches(['.', ',']);
    if target.starts_with("http://") || target.starts_with("https://") {
        return Some(target.to_string());
    }
    if target.contains('.') && !target.contains(' ') {
        return Some(format!("https://{}", target));
    }
    None
}
