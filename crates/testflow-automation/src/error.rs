//! Automation error types.

use thiserror::Error;

use crate::agent::AgentError;
use crate::cdp::CdpError;

/// Errors raised while running an automation session.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// No usable browser binary was found.
    #[error("no Chromium binary found; set browser.binary or TESTFLOW_CHROME")]
    BinaryNotFound,

    /// The browser process could not be started or did not become ready.
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// CDP-level failure.
    #[error(transparent)]
    Cdp(#[from] CdpError),

    /// Planning-agent failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The task exceeded its overall timeout.
    #[error("task timed out after {0} ms")]
    Timeout(u64),

    /// The session was used before `initialize` succeeded.
    #[error("session not initialized")]
    NotInitialized,

    /// File system failure while writing artifacts.
    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}
