//! WebSocket message types.

use serde::{Deserialize, Serialize};

/// WebSocket message types.
///
/// Field names for the automation messages are camelCase to match the
/// frontend contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Ping/heartbeat.
    Ping { timestamp: i64 },

    /// Pong response.
    Pong { timestamp: i64 },

    /// Client subscribes to updates for one execution.
    #[serde(rename_all = "camelCase")]
    SubscribeToAutomation { automation_id: String },

    /// Subscription acknowledgment.
    #[serde(rename_all = "camelCase")]
    Subscribed { automation_id: String },

    /// Progress or terminal update for an execution.
    #[serde(rename_all = "camelCase")]
    AutomationUpdate {
        automation_id: String,
        /// `started | progress | completed | failed | error | stopped`.
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        timestamp: i64,
    },

    /// Connection established.
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: String },

    /// Error message.
    Error { code: String, message: String },
}

impl WsMessage {
    /// Create a new error message.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create an automation update stamped with the current time.
    pub fn automation_update(
        automation_id: impl Into<String>,
        status: impl Into<String>,
        message: Option<String>,
    ) -> Self {
        Self::AutomationUpdate {
            automation_id: automation_id.into(),
            status: status.into(),
            message,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_deserialization() {
        let json = r#"{"type":"subscribe_to_automation","automationId":"exec-1"}"#;
        let msg: WsMessage = serde_json::from_str(json).unwrap();
        match msg {
            WsMessage::SubscribeToAutomation { automation_id } => {
                assert_eq!(automation_id, "exec-1");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_update_serialization_uses_camel_case() {
        let msg = WsMessage::automation_update("exec-1", "progress", Some("navigating".into()));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("automation_update"));
        assert!(json.contains("\"automationId\":\"exec-1\""));
        assert!(json.contains("progress"));
    }

    #[test]
    fn test_ping_round_trip() {
        let json = r#"{"type":"ping","timestamp":12345}"#;
        let msg: WsMessage = serde_json::from_str(json).unwrap();
        match msg {
            WsMessage::Ping { timestamp } => assert_eq!(timestamp, 12345),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_error_helper() {
        let msg = WsMessage::error("PARSE_ERROR", "bad json");
        match msg {
            WsMessage::Error { code, message } => {
                assert_eq!(code, "PARSE_ERROR");
                assert_eq!(message, "bad json");
            }
            _ => panic!("Wrong message type"),
        }
    }
}
