use serde::{Deserialize, Serialize};

/// Tagged records describing the lifecycle of one agent run. Exists only for
/// the duration of streaming one response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    // Lifecycle events
    ChainStart {
        name: String,
    },

    ChainEnd {
        name: String,
    },

    // Intermediate model output
    ModelStream {
        content: String,
    },

    // Remote-call events, not surfaced to the client
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },

    ToolResult {
        name: String,
        output: serde_json::Value,
    },

    // Error events
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_with_snake_case_tags() {
        let event = AgentEvent::ChainStart {
            name: "OpenAPI Planner".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chain_start""#));

        let event = AgentEvent::ModelStream {
            content: "hello".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"model_stream""#));
    }

    #[test]
    fn test_events_round_trip_tag() {
        let json = r#"{"type":"tool_call","name":"GET /search/movie","arguments":{}}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, AgentEvent::ToolCall { .. }));
    }
}
