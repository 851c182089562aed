//! Model Context Protocol file resources
//!
//! Exposes a fixed set of project files under `file://` URIs. Reads are confined
//! to the project root.

use std::path::Path;

use rust_mcp_sdk::schema::{
    ReadResourceContent, ReadResourceRequestParams, ReadResourceResult, Resource,
    TextResourceContents,
};
use serde_json::Value;

use crate::domain::utils::{mime_type_for, resolve_within_root};
use crate::{errors::AppError, AppState};

pub const FILE_SCHEME: &str = "file://";
pub const README_RESOURCE_URI: &str = "file://README.md";
pub const MANIFEST_RESOURCE_URI: &str = "file://Cargo.toml";
pub const SERVER_SOURCE_RESOURCE_URI: &str = "file://src/main.rs";

fn file_resource(uri: &str, name: &str, description: &str) -> Resource {
    Resource {
        annotations: None,
        description: Some(description.to_string()),
        icons: vec![],
        meta: None,
        mime_type: Some(mime_type_for(uri).to_string()),
        name: name.to_string(),
        size: None,
        title: None,
        uri: uri.to_string(),
    }
}

pub fn build_resources_list() -> Vec<Resource> {
    vec![
        file_resource(
            README_RESOURCE_URI,
            "Project README",
            "The main README file for this project",
        ),
        file_resource(
            MANIFEST_RESOURCE_URI,
            "Package Configuration",
            "Cargo package manifest",
        ),
        file_resource(
            SERVER_SOURCE_RESOURCE_URI,
            "Server Source",
            "Main MCP server entry point",
        ),
    ]
}

pub async fn handle_resources_read(
    state: &AppState,
    params: Option<Value>,
) -> Result<Value, AppError> {
    let Some(raw_params) = params else {
        return Err(AppError::bad_request(
            "missing_params",
            "resources/read requires params",
        ));
    };

    let resource_read: ReadResourceRequestParams = serde_json::from_value(raw_params)
        .map_err(|err| AppError::bad_request("invalid_params", err.to_string()))?;

    let result = read_file_resource(&state.project_root, &resource_read.uri).await?;
    serde_json::to_value(result)
        .map_err(|err| AppError::internal(format!("resource serialization failed: {err}")))
}

pub async fn read_file_resource(project_root: &Path, uri: &str) -> Result<ReadResourceResult, AppError> {
    let Some(relative) = uri.strip_prefix(FILE_SCHEME) else {
        return Err(AppError::internal(format!("Unsupported URI scheme: {uri}")));
    };
    let relative = relative.strip_suffix('/').unwrap_or(relative);

    let full_path = resolve_within_root(project_root, relative)
        .ok_or_else(|| AppError::access_denied("File outside project directory"))?;

    let text = tokio::fs::read_to_string(&full_path)
        .await
        .map_err(|err| AppError::internal(format!("Failed to read file: {err}")))?;

    Ok(ReadResourceResult {
        contents: vec![ReadResourceContent::from(TextResourceContents {
            meta: None,
            mime_type: Some(mime_type_for(relative).to_string()),
            text,
            uri: uri.to_string(),
        })],
        meta: None,
    })
}
