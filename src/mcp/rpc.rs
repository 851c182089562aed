//! JSON-RPC protocol representations and formatting utilities
//!
//! Provides standardized mapping of internal AppErrors to valid JSON-RPC payloads.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::AppError;

pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn app_error_to_json_rpc(id: Option<Value>, err: AppError) -> Value {
    let message = err.to_string();
    match err {
        AppError::BadRequest { code, .. } => json_rpc_error_with_data(
            id,
            INVALID_PARAMS,
            &message,
            Some(json!({ "code": code })),
        ),
        AppError::NotFound { kind, name } => json_rpc_error_with_data(
            id,
            METHOD_NOT_FOUND,
            &message,
            Some(json!({ "kind": kind, "name": name })),
        ),
        AppError::AccessDenied { .. } => json_rpc_error_with_data(
            id,
            INTERNAL_ERROR,
            &message,
            Some(json!({ "code": "access_denied" })),
        ),
        AppError::Internal { .. } => json_rpc_error(id, INTERNAL_ERROR, &message),
    }
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let response = JsonrpcErrorResponse::new(
            RpcError {
                code: i64::from(code),
                data: data.clone(),
                message: message.to_string(),
            },
            Some(request_id),
        );
        if let Ok(value) = serde_json::to_value(response) {
            return value;
        }
    }

    let mut error = json!({ "code": code, "message": message });
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error
    })
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let (Some(request_id), Some(extra)) = (
        id.as_ref().and_then(value_to_request_id),
        result.as_object().cloned(),
    ) {
        let response = JsonrpcResultResponse::new(
            request_id,
            McpResult {
                meta: None,
                extra: Some(extra),
            },
        );
        if let Ok(value) = serde_json::to_value(response) {
            return value;
        }
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_keeps_integer_and_string_ids() {
        let numeric = json_rpc_result(Some(json!(42)), json!({"tools": []}));
        assert_eq!(numeric["jsonrpc"], "2.0");
        assert_eq!(numeric["id"], json!(42));
        assert_eq!(numeric["result"]["tools"], json!([]));

        let textual = json_rpc_result(Some(json!("req-1")), json!({"ok": true}));
        assert_eq!(textual["id"], json!("req-1"));
        assert_eq!(textual["result"]["ok"], json!(true));
    }

    #[test]
    fn non_object_result_is_passed_through() {
        let response = json_rpc_result(Some(json!(3)), json!(14));
        assert_eq!(response["result"], json!(14));
        assert_eq!(response["id"], json!(3));
    }

    #[test]
    fn error_without_id_uses_null() {
        let response = json_rpc_error(None, INVALID_REQUEST, "Invalid Request");
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["code"], json!(INVALID_REQUEST));
        assert!(is_json_rpc_error(&response));
    }

    #[test]
    fn app_errors_map_to_codes_and_messages() {
        let unknown = app_error_to_json_rpc(Some(json!(2)), AppError::not_found("tool", "bogus"));
        assert_eq!(unknown["id"], json!(2));
        assert_eq!(unknown["error"]["code"], json!(METHOD_NOT_FOUND));
        assert_eq!(unknown["error"]["message"], json!("Unknown tool: bogus"));

        let invalid = app_error_to_json_rpc(
            Some(json!(3)),
            AppError::bad_request("missing_argument", "missing required argument file_path"),
        );
        assert_eq!(invalid["error"]["code"], json!(INVALID_PARAMS));
        assert_eq!(
            invalid["error"]["message"],
            json!("Invalid params: missing required argument file_path")
        );

        let failure = app_error_to_json_rpc(
            Some(json!(4)),
            AppError::internal("Failed to read file: No such file or directory"),
        );
        assert_eq!(failure["error"]["code"], json!(INTERNAL_ERROR));
        assert_eq!(
            failure["error"]["message"],
            json!("Failed to read file: No such file or directory")
        );
    }
}
