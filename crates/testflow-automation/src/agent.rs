//! HTTP client for the planning agent.
//!
//! The agent is an external service that turns a natural-language instruction
//! plus a compact page snapshot into an ordered plan of browser actions.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from the agent client.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent request failed: {0}")]
    Request(String),

    #[error("agent returned status {0}: {1}")]
    Status(u16, String),

    #[error("agent returned an invalid plan: {0}")]
    InvalidPlan(String),
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        AgentError::Request(e.to_string())
    }
}

/// Snapshot of the current page sent alongside the instruction.
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub page_text: String,
}

#[derive(Debug, Serialize)]
struct PlanRequest<'a> {
    instruction: &'a str,
    url: &'a str,
    title: &'a str,
    page_text: &'a str,
}

/// A single action in an agent plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanAction {
    /// Navigate to a URL.
    Navigate { url: String },
    /// Click the element matching a CSS selector.
    Click { selector: String },
    /// Fill an input matching a CSS selector.
    Fill { selector: String, value: String },
    /// Press a key on the focused element.
    Press { key: String },
    /// Scroll the page vertically.
    Scroll { delta_y: f64 },
    /// Wait a number of milliseconds.
    Wait { ms: u64 },
    /// Assert that the page text contains a string.
    AssertText { text: String },
    /// The task is complete.
    Done { summary: Option<String> },
}

/// An ordered plan returned by the agent.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionPlan {
    pub actions: Vec<PlanAction>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Client for the planning agent endpoint.
pub struct AgentClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_actions: usize,
}

impl AgentClient {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        max_actions: usize,
        timeout_seconds: u64,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AgentError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            max_actions,
        })
    }

    /// Request a plan for an instruction against the current page state.
    ///
    /// Plans longer than the configured `max_actions` are truncated; a plan
    /// without a trailing `done` is accepted as-is.
    pub async fn plan(
        &self,
        instruction: &str,
        snapshot: &PageSnapshot,
    ) -> Result<ActionPlan, AgentError> {
        let url = format!("{}/v1/plan", self.endpoint.trim_end_matches('/'));
        let body = PlanRequest {
            instruction,
            url: &snapshot.url,
            title: &snapshot.title,
            page_text: &snapshot.page_text,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AgentError::Status(status.as_u16(), text));
        }

        let mut plan: ActionPlan = response
            .json()
            .await
            .map_err(|e| AgentError::InvalidPlan(e.to_string()))?;

        if plan.actions.is_empty() {
            return Err(AgentError::InvalidPlan("empty action list".to_string()));
        }

        if plan.actions.len() > self.max_actions {
            debug!(
                "truncating plan from {} to {} actions",
                plan.actions.len(),
                self.max_actions
            );
            plan.actions.truncate(self.max_actions);
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn snapshot() -> PageSnapshot {
        PageSnapshot {
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            page_text: "Example Domain".to_string(),
        }
    }

    #[test]
    fn test_action_deserialization() {
        let action: PlanAction =
            serde_json::from_value(json!({"kind": "click", "selector": "#buy"})).unwrap();
        assert_eq!(
            action,
            PlanAction::Click {
                selector: "#buy".to_string()
            }
        );

        let action: PlanAction = serde_json::from_value(json!({"kind": "done"})).unwrap();
        assert_eq!(action, PlanAction::Done { summary: None });
    }

    #[tokio::test]
    async fn test_plan_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/plan"))
            .and(body_partial_json(json!({"instruction": "click the button"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "actions": [
                    {"kind": "click", "selector": "button.primary"},
                    {"kind": "done", "summary": "clicked"}
                ]
            })))
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri(), None, 25, 5).unwrap();
        let plan = client.plan("click the button", &snapshot()).await.unwrap();
        assert_eq!(plan.actions.len(), 2);
        assert_eq!(
            plan.actions[0],
            PlanAction::Click {
                selector: "button.primary".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_plan_truncated_to_max_actions() {
        let server = MockServer::start().await;
        let actions: Vec<_> = (0..10)
            .map(|i| json!({"kind": "press", "key": format!("Key{}", i)}))
            .collect();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"actions": actions})))
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri(), None, 3, 5).unwrap();
        let plan = client.plan("mash keys", &snapshot()).await.unwrap();
        assert_eq!(plan.actions.len(), 3);
    }

    #[tokio::test]
    async fn test_plan_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri(), None, 25, 5).unwrap();
        let err = client.plan("anything", &snapshot()).await.unwrap_err();
        match err {
            AgentError::Status(503, body) => assert_eq!(body, "overloaded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_plan_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"actions": []})))
            .mount(&server)
            .await;

        let client = AgentClient::new(server.uri(), None, 25, 5).unwrap();
        let err = client.plan("noop", &snapshot()).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidPlan(_)));
    }
}
