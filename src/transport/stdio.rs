//! Subprocess transport
//!
//! Spawns the provider as a child process and speaks newline-framed
//! messages over its stdin/stdout. The child's lifetime is bound to the
//! session: an explicit close kills it, and `kill_on_drop` covers every
//! other exit path. Stderr is drained to the log so a chatty provider
//! cannot block on a full pipe.

use std::collections::HashMap;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{TransportHandle, CHANNEL_CAPACITY};
use crate::error::{Error, Result};

pub(super) fn open(
    command: &str,
    args: &[String],
    env: &HashMap<String, String>,
) -> Result<TransportHandle> {
    debug!(command, ?args, "spawning provider process");

    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in env {
        cmd.env(key, value);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::SpawnFailed(format!("{command}: {e}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::SpawnFailed(format!("{command}: no stdin pipe")))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::SpawnFailed(format!("{command}: no stdout pipe")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::SpawnFailed(format!("{command}: no stderr pipe")))?;

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    // Writer task: sole owner of stdin, serializes all outbound frames.
    tokio::spawn(async move {
        let mut writer = BufWriter::new(stdin);
        while let Some(frame) = outbound_rx.recv().await {
            if writer.write_all(frame.as_bytes()).await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });

    // Reader task: forwards stdout lines; EOF closes the inbound channel,
    // which the session observes as transport loss.
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if inbound_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("error reading provider stdout: {e}");
                    break;
                }
            }
        }
    });

    // Stderr drain.
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "mcp_bridge::provider_stderr", "{line}");
        }
    });

    // Supervisor: kills the child on explicit shutdown, reaps it either way.
    tokio::spawn(async move {
        tokio::select! {
            _ = &mut shutdown_rx => {}
            status = child.wait() => {
                match status {
                    Ok(status) => debug!(%status, "provider process exited"),
                    Err(e) => warn!("failed waiting on provider process: {e}"),
                }
                return;
            }
        }
        // Shutdown requested while the child was still running.
        let _ = child.start_kill();
        let _ = child.wait().await;
        debug!("provider process killed on close");
    });

    Ok(TransportHandle::from_parts(
        outbound_tx,
        inbound_rx,
        Some(shutdown_tx),
    ))
}
