//! Newline-delimited JSON request loop.
//!
//! Each input line is one [`ActionRequest`]. Each output line is either the
//! [`ActionResponse`](outlast_types::ActionResponse) or an [`ErrorLine`].
//! Blank lines are skipped. The loop ends at end of input.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use outlast_core::ActionEngine;
use outlast_types::ActionRequest;

use crate::error::EngineError;

/// Error reply written in place of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLine {
    /// Stable snake-case error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

/// Counts of lines handled by [`serve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    /// Requests answered with a response.
    pub answered: u64,
    /// Requests answered with an error line.
    pub rejected: u64,
}

/// Serve requests from `reader` until end of input.
pub async fn serve<R, W>(
    engine: &ActionEngine,
    reader: R,
    mut writer: W,
) -> Result<ServeStats, EngineError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = ServeStats::default();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<ActionRequest>(line) {
            Ok(request) => match engine.execute(request).await {
                Ok(response) => {
                    stats.answered = stats.answered.saturating_add(1);
                    serde_json::to_string(&response)?
                }
                Err(err) => {
                    stats.rejected = stats.rejected.saturating_add(1);
                    serde_json::to_string(&ErrorLine {
                        error: err.code().to_owned(),
                        message: err.to_string(),
                    })?
                }
            },
            Err(err) => {
                debug!(%err, "Unparseable request line");
                stats.rejected = stats.rejected.saturating_add(1);
                serde_json::to_string(&ErrorLine {
                    error: "invalid_request".to_owned(),
                    message: err.to_string(),
                })?
            }
        };
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(stats)
}
