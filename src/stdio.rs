//! Stdio transport for the MCP server
//!
//! Reads one request per line, handles it to completion, writes its response,
//! then reads the next line.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::mcp::server::Router;
use crate::transport::{FramedReader, FramedWriter, TransportError};
use crate::AppState;

pub async fn serve<R, W>(
    router: &Router,
    state: Arc<AppState>,
    reader: R,
    writer: W,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader: FramedReader<R, Value> = FramedReader::new(reader);
    let mut writer = FramedWriter::new(writer);

    info!(
        project_root = %state.project_root.display(),
        "mcp server ready, reading from stdin"
    );

    while let Some(payload) = reader.next().await? {
        if let Some(response) = router.handle_json_rpc_value(&state, payload).await {
            writer.send(&response).await?;
        }
    }

    info!("input stream closed, shutting down");
    Ok(())
}

pub async fn serve_stdio(router: &Router, state: Arc<AppState>) -> Result<(), TransportError> {
    serve(router, state, tokio::io::stdin(), tokio::io::stdout()).await
}
