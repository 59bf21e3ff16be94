//! Line-delimited JSON over stdin/stdout. Cooperative,
//! single-worker, no authentication — `config::loader::validate` rejects a
//! `pipe` config carrying a non-`None` auth mode. Cancellation occurs when
//! stdin closes or the shutdown signal fires.

use std::sync::Arc;

use context::ToolInvocationContext;
use protocol::McpServer;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub async fn run(mcp: Arc<McpServer>, shutdown: CancellationToken) -> Result<(), crate::Error> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.cancelled() => {
                log::info!("pipe transport received shutdown signal, closing");
                break;
            }
        };

        let line = match line.map_err(crate::Error::Server)? {
            Some(line) => line,
            None => {
                log::info!("stdin closed, pipe transport shutting down");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let raw: serde_json::Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("ignoring malformed pipe message: {err}");
                continue;
            }
        };

        let ctx = ToolInvocationContext::new(Uuid::new_v4().to_string());

        if let Some(response) = mcp.handle(&raw, ctx).await {
            let text = serde_json::to_string(&response).unwrap_or_else(|_| "null".to_string());
            stdout.write_all(text.as_bytes()).await.map_err(crate::Error::Server)?;
            stdout.write_all(b"\n").await.map_err(crate::Error::Server)?;
            stdout.flush().await.map_err(crate::Error::Server)?;
        }
    }

    Ok(())
}
