//! General-assistant tools: a stubbed web search and a two-number adder.
//!
//! The search tool never touches the network. It returns canned results so
//! the model's decision to search (or not) can be exercised offline.

use async_trait::async_trait;
use serde::Serialize;
use toolwright_core::error::ToolError;
use toolwright_core::tool::{Tool, ToolPayload};

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "A tool to retrieve up to date information on a given topic by searching the web"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "The topic to search the web for"
                }
            },
            "required": ["topic"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        let topic = arguments["topic"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'topic' argument".into()))?;

        tracing::debug!(topic, "Simulated web search");
        serde_json::to_value(mock_results(topic))
            .map(ToolPayload::Json)
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })
    }
}

#[derive(Serialize)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

fn mock_results(topic: &str) -> Vec<SearchResult> {
    let slug: String = topic
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    vec![SearchResult {
        title: format!("{} - latest coverage", topic.trim()),
        url: format!("https://news.example.com/{slug}"),
        snippet: format!("No live search backend is configured; this is a placeholder result for '{}'.", topic.trim()),
    }]
}

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Adds two numbers"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "num1": {"type": "number", "description": "first number to add"},
                "num2": {"type": "number", "description": "second number to add"}
            },
            "required": ["num1", "num2"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolPayload, ToolError> {
        let operand = |field: &str| {
            arguments[field]
                .as_f64()
                .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{field}' argument")))
        };
        let sum = operand("num1")? + operand("num2")?;

        // Whole numbers print without a trailing ".0"
        let formatted = if sum.fract() == 0.0 && sum.abs() < 1e15 {
            format!("{}", sum as i64)
        } else {
            format!("{sum}")
        };
        Ok(ToolPayload::Text(formatted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn calculator_adds() {
        let out = CalculatorTool
            .execute(json!({"num1": 2, "num2": 40}))
            .await
            .unwrap();
        assert_eq!(out, ToolPayload::Text("42".into()));

        let out = CalculatorTool
            .execute(json!({"num1": 0.5, "num2": 0.25}))
            .await
            .unwrap();
        assert_eq!(out, ToolPayload::Text("0.75".into()));
    }

    #[tokio::test]
    async fn web_search_is_offline_and_deterministic() {
        let first = WebSearchTool
            .execute(json!({"topic": "Who won the 2024 Super Bowl"}))
            .await
            .unwrap();
        let second = WebSearchTool
            .execute(json!({"topic": "Who won the 2024 Super Bowl"}))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert!(first.to_content().contains("who-won-the-2024-super-bowl"));
    }

    #[tokio::test]
    async fn web_search_requires_topic() {
        let err = WebSearchTool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
