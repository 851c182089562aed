//! The central Model Context Protocol engine
//!
//! Decodes JSON-RPC messages, routes requests through an immutable method table,
//! negotiates capabilities (`initialize`) and turns every handler outcome, panics
//! included, into a response that carries the request's id.

use std::{collections::HashMap, sync::Arc, time::Instant};

use async_trait::async_trait;
use rust_mcp_sdk::schema::{
    Implementation, InitializeResult, ListResourcesResult, ListToolsResult, ServerCapabilities,
    ServerCapabilitiesPrompts, ServerCapabilitiesResources, ServerCapabilitiesTools,
};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::domain::{
    prompts::{build_prompts_list, handle_prompts_get},
    resources::{build_resources_list, handle_resources_read},
    tools::{build_tools_list, handle_tools_call},
};
use crate::logging::audit_dispatch;
use crate::mcp::rpc::{
    app_error_to_json_rpc, json_rpc_error, json_rpc_result, INTERNAL_ERROR, INVALID_REQUEST,
};
use crate::transport::{Message, JSONRPC_VERSION};
use crate::{errors::AppError, AppState};

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2024-11-05";
pub const KNOWN_PROTOCOL_VERSIONS: [&str; 3] = ["2024-11-05", "2025-03-26", "2025-06-18"];

/// Logic behind a single JSON-RPC method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(&self, state: Arc<AppState>, params: Option<Value>) -> Result<Value, AppError>;
}

/// Method table, fixed once built.
#[derive(Clone)]
pub struct Router {
    handlers: Arc<HashMap<&'static str, Arc<dyn MethodHandler>>>,
}

#[derive(Default)]
pub struct RouterBuilder {
    handlers: HashMap<&'static str, Arc<dyn MethodHandler>>,
}

impl RouterBuilder {
    pub fn handler(mut self, method: &'static str, handler: impl MethodHandler + 'static) -> Self {
        self.handlers.insert(method, Arc::new(handler));
        self
    }

    pub fn build(self) -> Router {
        Router {
            handlers: Arc::new(self.handlers),
        }
    }
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    pub fn standard() -> Self {
        Self::builder()
            .handler("initialize", InitializeHandler)
            .handler("ping", PingHandler)
            .handler("tools/list", ListToolsHandler)
            .handler("tools/call", CallToolHandler)
            .handler("resources/list", ListResourcesHandler)
            .handler("resources/read", ReadResourceHandler)
            .handler("prompts/list", ListPromptsHandler)
            .handler("prompts/get", GetPromptHandler)
            .build()
    }

    pub fn methods(&self) -> Vec<&'static str> {
        let mut methods = self.handlers.keys().copied().collect::<Vec<_>>();
        methods.sort_unstable();
        methods
    }

    /// Handles one decoded line. Returns `None` when nothing should be written
    /// back (notifications).
    pub async fn handle_json_rpc_value(&self, state: &Arc<AppState>, payload: Value) -> Option<Value> {
        if !payload.is_object() {
            return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
        }

        let request_id = payload.get("id").cloned();
        let message: Message = match serde_json::from_value(payload) {
            Ok(message) => message,
            Err(_) => return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
        };
        // An absent `jsonrpc` is tolerated; any other version is not.
        if message.jsonrpc != JSONRPC_VERSION {
            debug!(version = %message.jsonrpc, "rejecting unsupported jsonrpc version");
            return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request"));
        }

        match (message.method, message.id) {
            (Some(method), Some(id)) => {
                if method.trim().is_empty() {
                    return Some(json_rpc_error(Some(id), INVALID_REQUEST, "Invalid Request"));
                }
                Some(self.dispatch(state, Some(id), &method, message.params).await)
            }
            (Some(method), None) => {
                if self.handlers.contains_key(method.as_str()) {
                    let _ = self.dispatch(state, None, &method, message.params).await;
                } else {
                    debug!(method = %method, "notification received");
                }
                None
            }
            (None, _) => Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
        }
    }

    /// Runs the handler for `method` and wraps its outcome. The returned
    /// response always carries `id` unchanged.
    pub async fn dispatch(
        &self,
        state: &Arc<AppState>,
        id: Option<Value>,
        method: &str,
        params: Option<Value>,
    ) -> Value {
        let started_at = Instant::now();

        let response = match self.handlers.get(method).cloned() {
            None => app_error_to_json_rpc(id.clone(), AppError::not_found("method", method)),
            Some(handler) => {
                let task_state = Arc::clone(state);
                let task_params = params.clone();
                // A panicking handler only fails its own request.
                let outcome =
                    tokio::spawn(async move { handler.handle(task_state, task_params).await })
                        .await;

                match outcome {
                    Ok(Ok(result)) => json_rpc_result(id.clone(), result),
                    Ok(Err(err)) => app_error_to_json_rpc(id.clone(), err),
                    Err(join_error) => {
                        error!(method = %method, error = %join_error, "handler aborted");
                        json_rpc_error(id.clone(), INTERNAL_ERROR, "Internal error")
                    }
                }
            }
        };

        audit_dispatch(method, id.as_ref(), params.as_ref(), &response, started_at);
        response
    }
}

pub struct InitializeHandler;
pub struct PingHandler;
pub struct ListToolsHandler;
pub struct CallToolHandler;
pub struct ListResourcesHandler;
pub struct ReadResourceHandler;
pub struct ListPromptsHandler;
pub struct GetPromptHandler;

#[async_trait]
impl MethodHandler for InitializeHandler {
    async fn handle(&self, _state: Arc<AppState>, params: Option<Value>) -> Result<Value, AppError> {
        let protocol_version = negotiate_protocol_version(params.as_ref())?;

        let initialize_result = InitializeResult {
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                description: None,
                icons: vec![],
                website_url: None,
            },
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools {
                    list_changed: Some(false),
                }),
                resources: Some(ServerCapabilitiesResources {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
                prompts: Some(ServerCapabilitiesPrompts {
                    list_changed: Some(false),
                }),
                ..Default::default()
            },
            protocol_version: protocol_version.into(),
            instructions: None,
            meta: None,
        };

        to_result_value(initialize_result)
    }
}

#[async_trait]
impl MethodHandler for PingHandler {
    async fn handle(&self, _state: Arc<AppState>, _params: Option<Value>) -> Result<Value, AppError> {
        Ok(json!({}))
    }
}

#[async_trait]
impl MethodHandler for ListToolsHandler {
    async fn handle(&self, _state: Arc<AppState>, _params: Option<Value>) -> Result<Value, AppError> {
        to_result_value(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: build_tools_list(),
        })
    }
}

#[async_trait]
impl MethodHandler for CallToolHandler {
    async fn handle(&self, state: Arc<AppState>, params: Option<Value>) -> Result<Value, AppError> {
        handle_tools_call(&state, params).await
    }
}

#[async_trait]
impl MethodHandler for ListResourcesHandler {
    async fn handle(&self, _state: Arc<AppState>, _params: Option<Value>) -> Result<Value, AppError> {
        to_result_value(ListResourcesResult {
            meta: None,
            next_cursor: None,
            resources: build_resources_list(),
        })
    }
}

#[async_trait]
impl MethodHandler for ReadResourceHandler {
    async fn handle(&self, state: Arc<AppState>, params: Option<Value>) -> Result<Value, AppError> {
        handle_resources_read(&state, params).await
    }
}

#[async_trait]
impl MethodHandler for ListPromptsHandler {
    async fn handle(&self, _state: Arc<AppState>, _params: Option<Value>) -> Result<Value, AppError> {
        to_result_value(build_prompts_list())
    }
}

#[async_trait]
impl MethodHandler for GetPromptHandler {
    async fn handle(&self, _state: Arc<AppState>, params: Option<Value>) -> Result<Value, AppError> {
        handle_prompts_get(params)
    }
}

fn to_result_value(result: impl serde::Serialize) -> Result<Value, AppError> {
    serde_json::to_value(result)
        .map_err(|err| AppError::internal(format!("result serialization failed: {err}")))
}

/// Echoes a known offered version; anything else is answered with
/// [`SUPPORTED_PROTOCOL_VERSION`] and left to the client to accept or drop.
pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<String, AppError> {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    if KNOWN_PROTOCOL_VERSIONS.contains(&offered_version) {
        return Ok(offered_version.to_string());
    }

    warn!(
        offered = %offered_version,
        answered = SUPPORTED_PROTOCOL_VERSION,
        "client offered an unknown protocol version"
    );
    Ok(SUPPORTED_PROTOCOL_VERSION.to_string())
}
