//! Chromium process launcher.
//!
//! Each automation session owns one browser process, launched with the
//! requested framework's flag profile and an ephemeral debugging port.

use std::net::TcpListener;
use std::path::PathBuf;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use testflow_core::{Framework, RunOptions};

use crate::error::AutomationError;

/// Well-known Chromium install locations, checked in order.
const BINARY_CANDIDATES: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/opt/google/chrome/chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Launch profile: the flag set and user agent a framework runs with.
#[derive(Debug, Clone)]
pub struct LaunchProfile {
    pub args: Vec<String>,
    pub user_agent: String,
}

impl LaunchProfile {
    /// Build the profile for a framework with the caller's run options.
    ///
    /// Both profiles relax browser security the way the original automation
    /// stacks configure their bundled browsers; they differ in the extra
    /// flags and the spoofed desktop user agent.
    pub fn for_framework(framework: Framework, options: &RunOptions) -> Self {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-web-security".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            format!(
                "--window-size={},{}",
                options.viewport_width, options.viewport_height
            ),
        ];

        if options.headless {
            args.push("--headless=new".to_string());
        }

        let user_agent = match framework {
            Framework::Playwright => {
                args.push("--disable-features=IsolateOrigins,site-per-process".to_string());
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
            }
            Framework::Puppeteer => {
                args.push("--disable-setuid-sandbox".to_string());
                args.push("--disable-extensions".to_string());
                args.push("--mute-audio".to_string());
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
            }
        };

        Self {
            args,
            user_agent: user_agent.to_string(),
        }
    }
}

/// A launched browser process with its debugging endpoint.
pub struct LaunchedBrowser {
    child: Child,
    endpoint: String,
    user_data_dir: PathBuf,
}

impl LaunchedBrowser {
    /// Debugging endpoint, e.g. "http://127.0.0.1:37211".
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Kill the browser process. Close errors are logged, not propagated.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!("failed to kill browser process: {}", e);
            return;
        }
        if let Err(e) = self.child.wait().await {
            warn!("failed to reap browser process: {}", e);
        }
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!("failed to remove user data dir: {}", e);
        }
        debug!("browser process shut down");
    }
}

/// Launches Chromium with a framework profile.
pub struct BrowserLauncher {
    binary: PathBuf,
}

impl BrowserLauncher {
    /// Resolve the browser binary: explicit config path, then the
    /// `TESTFLOW_CHROME` environment variable, then well-known locations.
    pub fn resolve(configured: Option<&str>) -> Result<Self, AutomationError> {
        if let Some(path) = configured {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Self { binary: path });
            }
            warn!("configured browser binary {:?} does not exist", path);
        }

        if let Ok(path) = std::env::var("TESTFLOW_CHROME") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Self { binary: path });
            }
        }

        for candidate in BINARY_CANDIDATES {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(Self { binary: path });
            }
        }

        Err(AutomationError::BinaryNotFound)
    }

    /// Launch a browser with the given profile and wait until its debugging
    /// endpoint answers.
    pub async fn launch(&self, profile: &LaunchProfile) -> Result<LaunchedBrowser, AutomationError> {
        let port = pick_ephemeral_port()?;
        let endpoint = format!("http://127.0.0.1:{}", port);
        let user_data_dir =
            std::env::temp_dir().join(format!("testflow-profile-{}", uuid::Uuid::new_v4()));

        let mut command = Command::new(&self.binary);
        command
            .arg(format!("--remote-debugging-port={}", port))
            .arg(format!("--user-data-dir={}", user_data_dir.display()))
            .args(&profile.args)
            .arg("about:blank")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| AutomationError::Launch(format!("{:?}: {}", self.binary, e)))?;

        info!("launched browser {:?} on port {}", self.binary, port);

        let browser = LaunchedBrowser {
            child,
            endpoint: endpoint.clone(),
            user_data_dir,
        };

        wait_for_endpoint(&endpoint).await?;
        Ok(browser)
    }
}

/// Bind port 0 to let the OS pick a free port, then release it.
fn pick_ephemeral_port() -> Result<u16, AutomationError> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|e| AutomationError::Launch(format!("no free port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| AutomationError::Launch(e.to_string()))?
        .port();
    Ok(port)
}

/// Poll the /json/version endpoint until the browser is ready.
async fn wait_for_endpoint(endpoint: &str) -> Result<(), AutomationError> {
    let url = format!("{}/json/version", endpoint);
    let client = reqwest::Client::new();

    for _ in 0..60 {
        match client
            .get(&url)
            .timeout(Duration::from_millis(500))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                debug!("browser ready at {}", endpoint);
                return Ok(());
            }
            _ => tokio::time::sleep(Duration::from_millis(250)).await,
        }
    }

    Err(AutomationError::Launch(format!(
        "browser did not become ready at {}",
        endpoint
    )))
}
