//! MCP client over a line-delimited JSON stream
//!
//! [`Correlator`] matches responses to requests by id; [`McpClient`] adds the
//! protocol calls on top and can own a spawned server process.

pub mod correlator;
pub mod process;

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::config::DEFAULT_REQUEST_TIMEOUT_MS;
use crate::mcp::server::SUPPORTED_PROTOCOL_VERSION;
use crate::transport::{RpcErrorObject, TransportError};

pub use correlator::Correlator;
pub use process::{ServerCommand, ServerProcess};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Timeout waiting for response to `{method}` after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },
    #[error("connection closed before `{method}` was answered")]
    ConnectionClosed { method: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },
    #[error("server process error: {0}")]
    Spawn(#[source] std::io::Error),
}

impl From<RpcErrorObject> for ClientError {
    fn from(err: RpcErrorObject) -> Self {
        ClientError::Server {
            code: err.code,
            message: err.message,
        }
    }
}

pub struct McpClient {
    correlator: Correlator,
    timeout: Duration,
    process: Option<ServerProcess>,
}

impl McpClient {
    pub fn connect<R, W>(reader: R, writer: W, timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            correlator: Correlator::new(reader, writer),
            timeout,
            process: None,
        }
    }

    /// Starts the server as a child process and connects to its stdio.
    ///
    /// No readiness delay is applied: writes queue in the pipe until the child
    /// reads them, and [`McpClient::initialize`] is the handshake.
    pub fn spawn(command: &ServerCommand, timeout: Duration) -> Result<Self, ClientError> {
        let (process, stdout, stdin) = ServerProcess::spawn(command)?;
        let mut client = Self::connect(stdout, stdin, timeout);
        client.process = Some(process);
        Ok(client)
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Sends a request and unwraps its `result`; an `error` member becomes
    /// [`ClientError::Server`].
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let response = self.correlator.call(method, params, self.timeout).await?;
        response.into_result().map_err(ClientError::from)
    }

    pub async fn initialize(&self, client_name: &str) -> Result<Value, ClientError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": SUPPORTED_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": client_name,
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;

        self.correlator
            .notify("notifications/initialized", None)
            .await?;
        info!(
            server = %result["serverInfo"]["name"],
            protocol_version = %result["protocolVersion"],
            "session initialized"
        );
        Ok(result)
    }

    pub async fn ping(&self) -> Result<Value, ClientError> {
        self.request("ping", json!({})).await
    }

    pub async fn list_tools(&self) -> Result<Value, ClientError> {
        self.request("tools/list", json!({})).await
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ClientError> {
        self.request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
    }

    pub async fn list_resources(&self) -> Result<Value, ClientError> {
        self.request("resources/list", json!({})).await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Value, ClientError> {
        self.request("resources/read", json!({ "uri": uri })).await
    }

    pub async fn list_prompts(&self) -> Result<Value, ClientError> {
        self.request("prompts/list", json!({})).await
    }

    pub async fn get_prompt(&self, name: &str, arguments: Value) -> Result<Value, ClientError> {
        self.request("prompts/get", json!({ "name": name, "arguments": arguments }))
            .await
    }

    /// Closes the server's input and, for a spawned server, waits for it to exit.
    pub async fn shutdown(mut self) -> Result<(), ClientError> {
        self.correlator.close().await?;
        if let Some(process) = self.process.take() {
            process.shutdown(SHUTDOWN_GRACE).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_display() {
        let timeout = ClientError::Timeout {
            method: "tools/call".to_string(),
            timeout_ms: 5_000,
        };
        assert_eq!(
            timeout.to_string(),
            "Timeout waiting for response to `tools/call` after 5000ms"
        );

        let server: ClientError = RpcErrorObject {
            code: -32601,
            message: "Unknown tool: bogus".to_string(),
            data: None,
        }
        .into();
        assert_eq!(server.to_string(), "server error -32601: Unknown tool: bogus");
    }

    #[test]
    fn default_timeout_is_five_seconds() {
        assert_eq!(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs(5));
    }
}
