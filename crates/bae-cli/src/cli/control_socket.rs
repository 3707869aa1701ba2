//! Control socket: server (during `bae run`) and client (for `bae pause`).
//! Protocol: one line per command: "pause <id>" or "cancel <id>".

use anyhow::Result;
use bae_core::control::JobControl;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;

/// Spawns a task that listens on `path` and calls `job_control.request_pause(id)`
/// or `request_cancel(id)` for each matching line. Ignores malformed lines.
pub fn spawn_control_listener(
    job_control: Arc<JobControl>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let handle = tokio::spawn(async move {
        let _ = std::fs::remove_file(&path);
        let listener = match UnixListener::bind(&path) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket bind: {}", e);
                return;
            }
        };
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let control = Arc::clone(&job_control);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            let line = line.trim();
                            if let Some(rest) = line.strip_prefix("pause ") {
                                if let Ok(id) = rest.trim().parse::<i64>() {
                                    control.request_pause(id);
                                }
                            } else if let Some(rest) = line.strip_prefix("cancel ") {
                                if let Ok(id) = rest.trim().parse::<i64>() {
                                    control.request_cancel(id);
                                }
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends "<verb> <job_id>\n" to the control socket. No-op if the path does not exist
/// (nothing is currently running to receive it).
async fn send(verb: &str, job_id: i64) -> Result<()> {
    let socket_path = bae_core::control::default_control_socket_path()?;
    if !socket_path.exists() {
        return Ok(());
    }
    let mut stream = match tokio::net::UnixStream::connect(&socket_path).await {
        Ok(s) => s,
        Err(_) => return Ok(()),
    };
    let msg = format!("{verb} {job_id}\n");
    tokio::io::AsyncWriteExt::write_all(&mut stream, msg.as_bytes()).await?;
    Ok(())
}

pub async fn send_pause(job_id: i64) -> Result<()> {
    send("pause", job_id).await
}

pub async fn send_cancel(job_id: i64) -> Result<()> {
    send("cancel", job_id).await
}
