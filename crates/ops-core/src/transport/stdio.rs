use std::sync::Arc;

use ops_events::{BoundedLineReader, Line};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::context::ServerContext;
use crate::protocol::handle_payload;
use crate::registry::Registry;
use crate::session::Session;

const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Newline-delimited JSON over stdin/stdout (§4.1, §6.2). One session for
/// the lifetime of the process; calls may run concurrently, but every
/// response is written as a single atomic `write_all` under `writer` so
/// framing is never interleaved.
pub async fn run(ctx: Arc<ServerContext>, registry: Arc<Registry>, default_profile: &str) -> std::io::Result<()> {
    let session = Session::handle(default_profile);
    let writer = Arc::new(Mutex::new(tokio::io::stdout()));
    let mut reader = BoundedLineReader::new(tokio::io::stdin(), MAX_LINE_BYTES);

    loop {
        let line = match reader.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::error!(%error, "stdio read failure, shutting down");
                break;
            }
        };

        let raw = match line {
            Line::Text { bytes, .. } => String::from_utf8_lossy(&bytes).into_owned(),
            Line::TooLong { line_number, observed_bytes } => {
                tracing::warn!(line_number, observed_bytes, "dropping oversized input line");
                continue;
            }
        };
        if raw.trim().is_empty() {
            continue;
        }

        let ctx = ctx.clone();
        let registry = registry.clone();
        let session = session.clone();
        let writer = writer.clone();
        tokio::spawn(async move {
            if let Some(response) = handle_payload(ctx, session, registry, &raw).await {
                let mut out = writer.lock().await;
                if out.write_all(response.as_bytes()).await.is_ok() {
                    let _ = out.write_all(b"\n").await;
                    let _ = out.flush().await;
                }
            }
        });
    }

    session.write().await.close();
    Ok(())
}
