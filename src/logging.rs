use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. Output goes to stderr because stdout
/// carries protocol messages.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Emits the per-request audit summary once a response has been produced.
pub fn audit_dispatch(
    method: &str,
    id: Option<&Value>,
    params: Option<&Value>,
    response: &Value,
    started_at: Instant,
) {
    let elapsed_ms = started_at.elapsed().as_millis() as u64;
    let id = id.map(ToString::to_string).unwrap_or_default();
    let params = params.map(ToString::to_string).unwrap_or_else(|| "null".to_string());

    debug!(method = %method, id = %id, params = %params, "mcp request params");

    match response.get("error") {
        Some(error) => {
            let code = error.get("code").and_then(|code| code.as_i64()).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(|message| message.as_str())
                .unwrap_or_default();
            warn!(
                method = %method,
                id = %id,
                code,
                error_message = message,
                duration_ms = elapsed_ms,
                outcome = "failure",
                "mcp action audited"
            )
        }
        None => info!(
            method = %method,
            id = %id,
            duration_ms = elapsed_ms,
            outcome = "success",
            "mcp action audited"
        ),
    }
}
