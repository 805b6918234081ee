use std::sync::Arc;

use rig::completion::Prompt;
use rig::prelude::CompletionClient;
use rig::providers::openai;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::agents::AgentEvent;
use crate::openapi::ReducedSpec;
use crate::tmdb::TmdbClient;

const AGENT_NAME: &str = "OpenAPI Planner";

// Event channel depth per run
const EVENT_BUFFER: usize = 100;

// Character budget for each API response fed back into the model
const RESULT_BUDGET: usize = 2000;

// Final answers are relayed in small chunks
const CHUNK_SIZE: usize = 24;

// ============================================================================
// AGENT BOUNDARY
// ============================================================================

/// Capability boundary for query handling: given a natural-language query,
/// produce a tagged event stream ending in a final answer or an error.
/// Implemented by [`MoviePlanner`] in production and by scripted mocks in
/// tests.
pub trait QueryAgent: Send + Sync {
    fn stream_query(&self, query: String) -> mpsc::Receiver<AgentEvent>;
}

// ============================================================================
// PLAN STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedCall {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CallPlan {
    calls: Vec<PlannedCall>,
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("model returned an unparseable plan: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("planned call is not in the specification: {method} {path}")]
    UnknownOperation { method: String, path: String },
}

/// Parses the model's plan output, tolerating markdown code fences around
/// the JSON.
pub fn parse_plan(raw: &str) -> Result<Vec<PlannedCall>, PlanError> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let plan: CallPlan = serde_json::from_str(cleaned)?;
    Ok(plan.calls)
}

// ============================================================================
// MOVIE PLANNER
// ============================================================================

/// LLM-backed planner: picks endpoints from the reduced specification, calls
/// them through the authenticated TMDB client, and narrates a final answer.
#[derive(Clone)]
pub struct MoviePlanner {
    client: openai::Client,
    model: String,
    spec: Arc<ReducedSpec>,
    tmdb: Arc<TmdbClient>,
}

impl MoviePlanner {
    pub fn new(
        client: openai::Client,
        model: String,
        spec: Arc<ReducedSpec>,
        tmdb: Arc<TmdbClient>,
    ) -> Self {
        Self {
            client,
            model,
            spec,
            tmdb,
        }
    }

    async fn send_event(tx: &mpsc::Sender<AgentEvent>, event: AgentEvent) {
        let _ = tx.send(event).await;
    }

    async fn process_query(
        &self,
        query: &str,
        tx: &mpsc::Sender<AgentEvent>,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        // Step 1: ask the model which endpoints to call
        let planner = self
            .client
            .agent(&self.model)
            .preamble(&format!(
                "You are a planner for the {} REST API. Given a user query and \
                 the endpoint catalog, decide which endpoints to call. Respond \
                 ONLY with JSON, no other text.",
                self.spec.title
            ))
            .temperature(0.0)
            .build();

        let plan_raw = planner.prompt(&self.plan_prompt(query)).await?;
        let calls = parse_plan(&plan_raw)?;

        // Step 2: execute the planned calls against the API
        let mut results = Vec::new();
        for call in &calls {
            let op = self
                .spec
                .resolve_operation(&call.method, &call.path)
                .ok_or_else(|| PlanError::UnknownOperation {
                    method: call.method.clone(),
                    path: call.path.clone(),
                })?;

            let name = format!("{} {}", op.method, call.path);
            Self::send_event(
                tx,
                AgentEvent::ToolCall {
                    name: name.clone(),
                    arguments: serde_json::Value::Object(call.params.clone()),
                },
            )
            .await;

            let value = self
                .tmdb
                .call(&call.method, &call.path, &query_pairs(&call.params))
                .await?;
            let excerpt = truncate_chars(&value.to_string(), RESULT_BUDGET);

            Self::send_event(
                tx,
                AgentEvent::ToolResult {
                    name,
                    output: serde_json::Value::String(excerpt.clone()),
                },
            )
            .await;

            results.push(format!("{} {} -> {}", op.method, call.path, excerpt));
        }

        // Step 3: compose the final answer over the collected results
        let responder = self
            .client
            .agent(&self.model)
            .preamble(
                "You are a movie expert. Answer the user's question using only \
                 the API results provided.",
            )
            .temperature(0.0)
            .build();

        let answer = responder.prompt(&self.answer_prompt(query, &results)).await?;

        for chunk in chunk_text(&answer, CHUNK_SIZE) {
            Self::send_event(tx, AgentEvent::ModelStream { content: chunk }).await;
        }

        Ok(answer)
    }

    fn plan_prompt(&self, query: &str) -> String {
        format!(
            r#"User query: {}

Available endpoints:
{}
Pick the endpoint calls needed to answer the query. Substitute path
parameters directly into the path. Response format (JSON only):
{{"calls": [{{"method": "GET", "path": "/search/movie", "params": {{"query": "..."}}}}]}}
"#,
            query,
            self.spec.endpoint_catalog()
        )
    }

    fn answer_prompt(&self, query: &str, results: &[String]) -> String {
        format!(
            "User query: {}\n\nAPI results:\n{}\n\nAnswer the query in natural language.",
            query,
            results.join("\n")
        )
    }
}

impl QueryAgent for MoviePlanner {
    fn stream_query(&self, query: String) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let planner = self.clone();

        tokio::spawn(async move {
            let request_id = Uuid::now_v7();
            log::info!("[{}] agent run started: {:?}", request_id, query);

            Self::send_event(
                &tx,
                AgentEvent::ChainStart {
                    name: AGENT_NAME.to_string(),
                },
            )
            .await;

            match planner.process_query(&query, &tx).await {
                Ok(_) => {
                    Self::send_event(
                        &tx,
                        AgentEvent::ChainEnd {
                            name: AGENT_NAME.to_string(),
                        },
                    )
                    .await;
                    log::info!("[{}] agent run completed", request_id);
                }
                Err(e) => {
                    log::error!("[{}] agent run failed: {}", request_id, e);
                    Self::send_event(
                        &tx,
                        AgentEvent::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        });

        rx
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn query_pairs(params: &serde_json::Map<String, serde_json::Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}

fn truncate_chars(s: &str, budget: usize) -> String {
    s.chars().take(budget).collect()
}

fn chunk_text(s: &str, size: usize) -> Vec<String> {
    s.chars()
        .collect::<Vec<_>>()
        .chunks(size)
        .map(|c| c.iter().collect())
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plan_plain_json() {
        let calls = parse_plan(
            r#"{"calls": [{"method": "GET", "path": "/search/movie", "params": {"query": "Inception"}}]}"#,
        )
        .unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "GET");
        assert_eq!(calls[0].path, "/search/movie");
        assert_eq!(calls[0].params["query"], "Inception");
    }

    #[test]
    fn test_parse_plan_strips_markdown_fences() {
        let raw = "```json\n{\"calls\": [{\"method\": \"GET\", \"path\": \"/movie/550\"}]}\n```";
        let calls = parse_plan(raw).unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].params.is_empty());
    }

    #[test]
    fn test_parse_plan_rejects_prose() {
        let err = parse_plan("I would call the search endpoint.").unwrap_err();
        assert!(matches!(err, PlanError::Parse(_)));
    }

    #[test]
    fn test_query_pairs_stringifies_values() {
        let mut params = serde_json::Map::new();
        params.insert("query".to_string(), json!("Inception"));
        params.insert("page".to_string(), json!(2));

        let pairs = query_pairs(&params);
        assert!(pairs.contains(&("query".to_string(), "Inception".to_string())));
        assert!(pairs.contains(&("page".to_string(), "2".to_string())));
    }

    #[test]
    fn test_chunk_text_preserves_content() {
        let chunks = chunk_text("hello world", 4);
        assert_eq!(chunks, vec!["hell", "o wo", "rld"]);
        assert_eq!(chunks.concat(), "hello world");
    }

    #[test]
    fn test_chunk_text_is_char_safe() {
        // multibyte input must not split inside a code point
        let chunks = chunk_text("ééééé", 2);
        assert_eq!(chunks.concat(), "ééééé");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 4), "abcd");
        assert_eq!(truncate_chars("ab", 4), "ab");
    }

    #[test]
    fn test_unknown_operation_display() {
        let err = PlanError::UnknownOperation {
            method: "GET".to_string(),
            path: "/nope".to_string(),
        };
        assert!(err.to_string().contains("GET /nope"));
    }
}
