//! Interactive tools exposed via Model Context Protocol
//!
//! Provides `calculate` and `list_files`. Tool-level failures (a bad expression,
//! a directory outside the project) come back as `isError` results; only an
//! unknown tool name or malformed params become JSON-RPC errors.

use std::path::Path;

use rust_mcp_sdk::{
    macros,
    schema::{CallToolRequestParams, CallToolResult, ContentBlock, TextContent, Tool},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::calculator::{evaluate, format_number};
use crate::domain::utils::resolve_within_root;
use crate::{errors::AppError, AppState};

#[macros::mcp_tool(name = "calculate", description = "Perform mathematical calculations")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CalculateTool {
    /// Mathematical expression to evaluate (e.g., '2 + 3 * 4')
    pub expression: String,
}

#[macros::mcp_tool(name = "list_files", description = "List files in the project directory")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListFilesTool {
    /// Directory path relative to project root (default: '.')
    pub directory: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub path: String,
}

pub fn build_tools_list() -> Vec<Tool> {
    vec![CalculateTool::tool(), ListFilesTool::tool()]
}

pub async fn handle_tools_call(state: &AppState, params: Option<Value>) -> Result<Value, AppError> {
    let Some(raw_params) = params else {
        return Err(AppError::bad_request(
            "missing_params",
            "tools/call requires params",
        ));
    };

    let tool_call: CallToolRequestParams = serde_json::from_value(raw_params)
        .map_err(|err| AppError::bad_request("invalid_params", err.to_string()))?;
    let arguments = json!(tool_call.arguments.unwrap_or_default());

    let result = match tool_call.name.as_str() {
        "calculate" => {
            let args: CalculateTool = serde_json::from_value(arguments)
                .map_err(|err| AppError::bad_request("invalid_arguments", err.to_string()))?;
            calculate(&args.expression)
        }
        "list_files" => {
            let args: ListFilesTool = serde_json::from_value(arguments)
                .map_err(|err| AppError::bad_request("invalid_arguments", err.to_string()))?;
            list_files(&state.project_root, args.directory.as_deref()).await
        }
        _ => return Err(AppError::not_found("tool", tool_call.name)),
    };

    serde_json::to_value(result)
        .map_err(|err| AppError::internal(format!("tool result serialization failed: {err}")))
}

pub fn calculate(expression: &str) -> CallToolResult {
    match evaluate(expression) {
        Ok(value) => text_result(
            format!("Calculation: {expression} = {}", format_number(value)),
            false,
        ),
        Err(err) => {
            debug!(expression = %expression, error = %err, "calculation failed");
            text_result(format!("Error calculating expression: {err}"), true)
        }
    }
}

pub async fn list_files(project_root: &Path, directory: Option<&str>) -> CallToolResult {
    let directory = directory
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(".");

    let Some(full_path) = resolve_within_root(project_root, directory) else {
        return text_result(
            "Error listing files: Access denied: Directory outside project".to_string(),
            true,
        );
    };

    let entries = match read_entries(&full_path, directory).await {
        Ok(entries) => entries,
        Err(err) => return text_result(format!("Error listing files: {err}"), true),
    };

    let listing = entries
        .iter()
        .map(|entry| {
            let icon = if entry.kind == "directory" { "📁" } else { "📄" };
            format!("{icon} {}", entry.name)
        })
        .collect::<Vec<_>>()
        .join("\n");

    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(
            format!("Files in {directory}:\n{listing}"),
            None,
            None,
        ))],
        is_error: None,
        meta: None,
        structured_content: Some(serde_json::Map::from_iter([
            ("directory".to_string(), json!(directory)),
            ("files".to_string(), json!(entries)),
        ])),
    }
}

async fn read_entries(full_path: &Path, directory: &str) -> std::io::Result<Vec<FileEntry>> {
    let mut reader = tokio::fs::read_dir(full_path).await?;
    let mut entries = Vec::new();

    while let Some(entry) = reader.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let kind = if entry.file_type().await?.is_dir() {
            "directory"
        } else {
            "file"
        };
        let path = if directory == "." {
            name.clone()
        } else {
            Path::new(directory).join(&name).display().to_string()
        };
        entries.push(FileEntry { name, kind, path });
    }

    entries.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(entries)
}

fn text_result(text: String, is_error: bool) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(text, None, None))],
        is_error: is_error.then_some(true),
        meta: None,
        structured_content: None,
    }
}
