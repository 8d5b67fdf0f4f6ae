//! CDP page session for interacting with a single page.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::prelude::{Engine, BASE64_STANDARD};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use futures::SinkExt;

use super::client::{PendingRequest, WsSink};
use super::error::CdpError;
use super::protocol::{CdpRequest, CdpResponse};

/// A session attached to a single page/target.
pub struct PageSession {
    target_id: String,
    session_id: String,
    /// WebSocket sender (shared with client).
    ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
    /// Pending requests (shared with client).
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
    /// Request ID counter (shared with client).
    request_id: Arc<AtomicU64>,
}

impl PageSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
        pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
        request_id: Arc<AtomicU64>,
    ) -> Self {
        Self {
            target_id,
            session_id,
            ws_tx,
            pending,
            request_id,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: Some(self.session_id.clone()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("cdp session send: {}", json);

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            ws.send(Message::Text(json.into())).await?;
        }

        match tokio::time::timeout(std::time::Duration::from_secs(30), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("request {} timed out", method)))
            }
        }
    }

    /// Enable the CDP domains the session depends on.
    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;
        debug!("enabled cdp domains for session {}", self.session_id);
        Ok(())
    }

    // ========================================================================
    // Emulation
    // ========================================================================

    /// Override the user agent for all subsequent requests.
    pub async fn set_user_agent(&self, user_agent: &str) -> Result<(), CdpError> {
        self.call(
            "Network.setUserAgentOverride",
            Some(json!({"userAgent": user_agent})),
        )
        .await?;
        Ok(())
    }

    /// Set the viewport size.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<(), CdpError> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            })),
        )
        .await?;
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Navigate to a URL and wait for the page to load.
    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self.call("Page.navigate", Some(json!({"url": url}))).await?;

        if let Some(error) = result.get("errorText").and_then(|e| e.as_str()) {
            if !error.is_empty() {
                return Err(CdpError::NavigationFailed(error.to_string()));
            }
        }

        self.wait_for_load().await?;
        debug!("navigated to {}", url);
        Ok(())
    }

    /// Wait for the document to become interactive.
    pub async fn wait_for_load(&self) -> Result<(), CdpError> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_secs(30);

        loop {
            let result = self.evaluate("document.readyState").await?;

            if let Some(state) = result.as_str() {
                if state == "complete" || state == "interactive" {
                    return Ok(());
                }
            }

            if start.elapsed() > timeout {
                return Err(CdpError::Timeout("page load timeout".to_string()));
            }

            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }

    /// Current URL.
    pub async fn current_url(&self) -> Result<String, CdpError> {
        let result = self.evaluate("window.location.href").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    /// Page title.
    pub async fn title(&self) -> Result<String, CdpError> {
        let result = self.evaluate("document.title").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    /// Visible text of the page, truncated to `max_len` characters. Used as
    /// the page snapshot handed to the planning agent.
    pub async fn page_text(&self, max_len: usize) -> Result<String, CdpError> {
        let script = format!(
            "(document.body ? document.body.innerText : '').slice(0, {})",
            max_len
        );
        let result = self.evaluate(&script).await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    // ========================================================================
    // JavaScript execution
    // ========================================================================

    /// Evaluate a JavaScript expression and return its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["text"].as_str().unwrap_or("unknown error");
            return Err(CdpError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    // ========================================================================
    // Element interaction
    // ========================================================================

    /// Click the first element matching a CSS selector.
    pub async fn click_selector(&self, selector: &str) -> Result<(), CdpError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.scrollIntoView({{block: 'center'}});
                el.click();
                return true;
            }})()"#,
            sel = js_string(selector)
        );
        let found = self.evaluate(&script).await?;
        if found.as_bool() != Some(true) {
            return Err(CdpError::ElementNotFound(selector.to_string()));
        }
        debug!("clicked {}", selector);
        Ok(())
    }

    /// Fill an input matching a CSS selector, firing input/change events.
    pub async fn fill_selector(&self, selector: &str, value: &str) -> Result<(), CdpError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.focus();
                el.value = {val};
                el.dispatchEvent(new Event('input', {{bubbles: true}}));
                el.dispatchEvent(new Event('change', {{bubbles: true}}));
                return true;
            }})()"#,
            sel = js_string(selector),
            val = js_string(value)
        );
        let found = self.evaluate(&script).await?;
        if found.as_bool() != Some(true) {
            return Err(CdpError::ElementNotFound(selector.to_string()));
        }
        debug!("filled {} ({} chars)", selector, value.len());
        Ok(())
    }

    /// Press a key (e.g. "Enter", "Tab") on the focused element.
    pub async fn press_key(&self, key: &str) -> Result<(), CdpError> {
        for event_type in ["keyDown", "keyUp"] {
            self.call(
                "Input.dispatchKeyEvent",
                Some(json!({
                    "type": event_type,
                    "key": key,
                })),
            )
            .await?;
        }
        debug!("pressed {}", key);
        Ok(())
    }

    /// Scroll the page by a vertical delta.
    pub async fn scroll_by(&self, delta_y: f64) -> Result<(), CdpError> {
        let script = format!("window.scrollBy(0, {});", delta_y);
        self.evaluate(&script).await?;
        Ok(())
    }

    // ========================================================================
    // Screenshot
    // ========================================================================

    /// Capture a PNG screenshot of the viewport.
    pub async fn screenshot_png(&self) -> Result<Vec<u8>, CdpError> {
        let result = self
            .call(
                "Page.captureScreenshot",
                Some(json!({"format": "png", "captureBeyondViewport": false})),
            )
            .await?;

        let data = result["data"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("missing screenshot data".to_string()))?;

        BASE64_STANDARD
            .decode(data)
            .map_err(|e| CdpError::InvalidResponse(format!("bad screenshot encoding: {}", e)))
    }
}

/// Drain page events into tracing for the life of a session.
pub(crate) async fn log_page_events(
    session_id: String,
    mut event_rx: mpsc::UnboundedReceiver<CdpResponse>,
) {
    while let Some(event) = event_rx.recv().await {
        let method = event.method.as_deref().unwrap_or("");
        let params = event.params.unwrap_or(Value::Null);
        match method {
            "Runtime.consoleAPICalled" => {
                let level = params["type"].as_str().unwrap_or("log");
                let text: Vec<&str> = params["args"]
                    .as_array()
                    .map(|args| {
                        args.iter()
                            .filter_map(|a| a["value"].as_str())
                            .collect()
                    })
                    .unwrap_or_default();
                debug!(session = %session_id, level, "page console: {}", text.join(" "));
            }
            "Runtime.exceptionThrown" => {
                let text = params["exceptionDetails"]["text"]
                    .as_str()
                    .unwrap_or("unknown exception");
                warn!(session = %session_id, "page exception: {}", text);
            }
            "Network.loadingFailed" => {
                let error = params["errorText"].as_str().unwrap_or("unknown");
                let url = params["request"]["url"].as_str().unwrap_or("");
                debug!(session = %session_id, url, "request failed: {}", error);
            }
            _ => {}
        }
    }
}

/// Quote a string as a JavaScript literal.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
