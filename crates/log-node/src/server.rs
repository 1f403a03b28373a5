//! # Request Server
//!
//! Newline-delimited JSON over TCP. Each line a client sends is one
//! [`LogRequest`]; each line written back is the matching [`LogResponse`],
//! in request order per connection.
//!
//! A line that does not decode is answered with `InvalidArgument` and the
//! connection stays open.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use merkle_log::{LogApi, LogError, LogRequest, LogRequestHandler, LogResponse};

/// Accept connections until `shutdown` flips to true.
pub async fn serve<A: LogApi + 'static>(
    listener: TcpListener,
    handler: Arc<LogRequestHandler<A>>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Request server listening");
    }

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "Client connected");
                    let handler = Arc::clone(&handler);
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, handler, shutdown).await {
                            warn!(peer = %peer, error = %e, "Client connection failed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            },
            _ = shutdown.changed() => {}
        }
    }

    info!("Request server stopped");
}

async fn serve_connection<A: LogApi + 'static>(
    stream: TcpStream,
    handler: Arc<LogRequestHandler<A>>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
            _ = shutdown.changed() => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<LogRequest>(&line) {
            Ok(request) => handler.handle(request).await,
            Err(e) => {
                debug!(error = %e, "Malformed request line");
                LogResponse::error(&LogError::InvalidArgument(format!(
                    "malformed request: {}",
                    e
                )))
            }
        };

        let mut out = serde_json::to_vec(&response)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }

    Ok(())
}
