//! Scripted client sessions run by `hjmcp-stdio demo`.
//!
//! Each session returns the lines it wants printed so the binary decides where
//! they go.

use serde_json::{json, Value};
use tracing::warn;

use crate::client::{ClientError, McpClient};

pub const CALCULATOR_EXPRESSIONS: [&str; 7] = [
    "2 + 3",
    "10 * 5",
    "(15 + 5) / 4",
    "2.5 * 3.14159",
    "100 - 25 + 10",
    "Math.sqrt(16)",
    "2**8",
];

/// Initializes, lists tools, then evaluates each expression. Only a failed
/// handshake aborts the session.
pub async fn calculator_session(
    client: &McpClient,
    expressions: &[&str],
) -> Result<Vec<String>, ClientError> {
    let mut lines = Vec::new();

    let initialized = client.initialize("calculator-demo-client").await?;
    lines.push("Initialization successful".to_string());
    lines.push(format!(
        "Server capabilities: {}",
        pretty(&initialized["capabilities"])
    ));

    match client.list_tools().await {
        Ok(listed) => {
            lines.push("Available tools:".to_string());
            for tool in listed["tools"].as_array().into_iter().flatten() {
                lines.push(format!(
                    "  • {}: {}",
                    tool["name"].as_str().unwrap_or_default(),
                    tool["description"].as_str().unwrap_or_default()
                ));
            }
        }
        Err(err) => lines.push(format!("Failed to list tools: {err}")),
    }

    for expression in expressions {
        lines.push(format!("Calculating: {expression}"));
        match client
            .call_tool("calculate", json!({ "expression": expression }))
            .await
        {
            Ok(result) => lines.extend(text_contents(&result).map(|text| format!("Result: {text}"))),
            Err(ClientError::Server { message, .. }) => {
                lines.push(format!("Calculation error: {message}"))
            }
            Err(err) => {
                warn!(expression = %expression, error = %err, "calculation request failed");
                lines.push(format!("Failed to calculate: {err}"));
            }
        }
    }

    Ok(lines)
}

/// Handshake plus one request per listing method; a quick end-to-end check.
pub async fn smoke_session(client: &McpClient) -> Result<Vec<String>, ClientError> {
    let mut lines = Vec::new();

    let initialized = client.initialize("simple-test-client").await?;
    lines.push(format!("Server response: {}", pretty(&initialized)));

    client.ping().await?;
    lines.push("Ping acknowledged".to_string());

    let tools = client.list_tools().await?;
    lines.push(format!("Tools: {}", names(&tools["tools"], "name")));

    let prompts = client.list_prompts().await?;
    lines.push(format!("Prompts: {}", names(&prompts["prompts"], "name")));

    let resources = client.list_resources().await?;
    lines.push(format!("Resources: {}", names(&resources["resources"], "uri")));

    Ok(lines)
}

fn text_contents(result: &Value) -> impl Iterator<Item = &str> {
    result["content"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|content| content["type"] == "text")
        .filter_map(|content| content["text"].as_str())
}

fn names(items: &Value, field: &str) -> String {
    items
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| item[field].as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
