//! Host bridge subprocess.
//!
//! Spawns the project-side bridge script and talks to it with JSON lines over
//! stdin/stdout. The bridge runs inside the host runtime, so it can evaluate
//! config modules and query collections; we only ever see data.
//!
//! Requests carry an id (`req-N`). A reader task routes each reply to the
//! request waiting on that id, so concurrent requests share one subprocess.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use content_viewer_shared::{
    BridgeConfig, ConfigModule, ContentViewerError, EntryAccessor, ModuleLoader, RawEntry, Result,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, info, instrument, warn};

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// Request message sent to the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    LoadModule { id: &'a str, path: &'a str },
    GetEntries { id: &'a str, collection: &'a str },
    Shutdown,
}

/// Response message received from the bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BridgeReply {
    Ready,
    Module {
        #[allow(dead_code)]
        id: String,
        exports: ConfigModule,
    },
    Entries {
        #[allow(dead_code)]
        id: String,
        entries: Vec<RawEntry>,
    },
    Error {
        #[allow(dead_code)]
        id: String,
        error: String,
    },
}

impl BridgeReply {
    fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Module { .. } => "module",
            Self::Entries { .. } => "entries",
            Self::Error { .. } => "error",
        }
    }
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Result<BridgeReply>>>>>;

fn lock_pending(pending: &Pending) -> MutexGuard<'_, HashMap<String, oneshot::Sender<Result<BridgeReply>>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Bridge handle
// ---------------------------------------------------------------------------

/// Handle to the spawned bridge subprocess.
pub struct BridgeHost {
    stdin: AsyncMutex<ChildStdin>,
    child: AsyncMutex<Child>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl BridgeHost {
    /// Spawn `<command> <args…> <script>` in `project_root` and wait for its ready signal.
    #[instrument(skip_all, fields(cmd = %config.command, script = %config.script))]
    pub async fn spawn(config: &BridgeConfig, project_root: &Path) -> Result<Self> {
        info!(root = %project_root.display(), "spawning host bridge");

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .arg(&config.script)
            .current_dir(project_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Bridge logs go to parent stderr
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ContentViewerError::Bridge(format!(
                    "failed to spawn bridge: {e}. Is `{}` installed?",
                    config.command
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ContentViewerError::Bridge("failed to capture bridge stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ContentViewerError::Bridge("failed to capture bridge stdout".into()))?;

        let timeout = Duration::from_millis(config.request_timeout_ms);
        let mut lines = BufReader::new(stdout).lines();
        wait_for_ready(&mut lines, timeout, &config.script).await?;

        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        tokio::spawn(route_replies(lines, Arc::clone(&pending), Arc::clone(&closed)));

        Ok(Self {
            stdin: AsyncMutex::new(stdin),
            child: AsyncMutex::new(child),
            pending,
            closed,
            next_id: AtomicU64::new(0),
            timeout,
        })
    }

    fn next_request_id(&self) -> String {
        format!("req-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Write one request line.
    async fn send(&self, request: &BridgeRequest<'_>) -> Result<()> {
        let mut json = serde_json::to_string(request).map_err(|e| {
            ContentViewerError::Bridge(format!("failed to serialize request: {e}"))
        })?;
        json.push('\n');

        let mut stdin = self.stdin.lock().await;
        stdin.write_all(json.as_bytes()).await.map_err(|e| {
            ContentViewerError::Bridge(format!("failed to write to bridge stdin: {e}"))
        })?;
        stdin.flush().await.map_err(|e| {
            ContentViewerError::Bridge(format!("failed to flush bridge stdin: {e}"))
        })
    }

    /// Send a request and wait for the reply carrying the same id.
    async fn round_trip(&self, id: &str, request: &BridgeRequest<'_>) -> Result<BridgeReply> {
        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(id.to_string(), tx);

        // The reader may have shut down between the caller's request and the insert above.
        if self.closed.load(Ordering::SeqCst) {
            lock_pending(&self.pending).remove(id);
            return Err(ContentViewerError::Bridge("bridge has exited".into()));
        }

        if let Err(e) = self.send(request).await {
            lock_pending(&self.pending).remove(id);
            return Err(e);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(ContentViewerError::Bridge(format!(
                "bridge exited before answering {id}"
            ))),
            Err(_) => {
                lock_pending(&self.pending).remove(id);
                Err(ContentViewerError::Bridge(format!(
                    "{id} timed out after {} ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }

    /// Ask the bridge to exit and wait for it, killing it if it lingers.
    pub async fn shutdown(&self) -> Result<()> {
        if let Err(e) = self.send(&BridgeRequest::Shutdown).await {
            debug!(error = %e, "shutdown request not delivered");
        }

        let mut child = self.child.lock().await;
        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => info!(?status, "bridge exited"),
            Ok(Err(e)) => warn!("bridge wait error: {e}"),
            Err(_) => {
                warn!("bridge ignored shutdown, killing it");
                child
                    .kill()
                    .await
                    .map_err(|e| ContentViewerError::Bridge(format!("failed to kill bridge: {e}")))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ModuleLoader for BridgeHost {
    async fn load_module(&self, path: &str) -> Result<ConfigModule> {
        let id = self.next_request_id();
        debug!(%id, path, "loading module through bridge");

        match self.round_trip(&id, &BridgeRequest::LoadModule { id: &id, path }).await? {
            BridgeReply::Module { exports, .. } => Ok(exports),
            BridgeReply::Error { error, .. } => Err(ContentViewerError::module_load(path, error)),
            other => Err(unexpected_reply(&other)),
        }
    }
}

#[async_trait]
impl EntryAccessor for BridgeHost {
    async fn get_entries(&self, collection: &str) -> Result<Vec<RawEntry>> {
        let id = self.next_request_id();
        debug!(%id, collection, "fetching entries through bridge");

        let request = BridgeRequest::GetEntries {
            id: &id,
            collection,
        };
        match self.round_trip(&id, &request).await? {
            BridgeReply::Entries { entries, .. } => Ok(entries),
            BridgeReply::Error { error, .. } => Err(ContentViewerError::Host(error)),
            other => Err(unexpected_reply(&other)),
        }
    }
}

fn unexpected_reply(reply: &BridgeReply) -> ContentViewerError {
    ContentViewerError::Bridge(format!("unexpected {} reply from bridge", reply.kind()))
}

// ---------------------------------------------------------------------------
// Reader side
// ---------------------------------------------------------------------------

/// Wait for the bridge to send its "ready" message.
async fn wait_for_ready(
    lines: &mut Lines<BufReader<ChildStdout>>,
    timeout: Duration,
    script: &str,
) -> Result<()> {
    let line = tokio::time::timeout(timeout, lines.next_line())
        .await
        .map_err(|_| {
            ContentViewerError::Bridge(format!(
                "bridge not ready after {} ms",
                timeout.as_millis()
            ))
        })?
        .map_err(|e| ContentViewerError::Bridge(format!("bridge read error: {e}")))?
        .ok_or_else(|| {
            ContentViewerError::Bridge(format!(
                "bridge exited before signalling ready. Check that `{script}` exists and \
                 implements the bridge protocol, or pass --snapshot to read a snapshot file"
            ))
        })?;

    match serde_json::from_str::<BridgeReply>(line.trim()) {
        Ok(BridgeReply::Ready) => {
            info!("bridge is ready");
            Ok(())
        }
        _ => Err(ContentViewerError::Bridge(format!(
            "expected ready message, got: {}",
            preview(&line)
        ))),
    }
}

/// Route replies to waiting requests until stdout closes.
async fn route_replies(
    mut lines: Lines<BufReader<ChildStdout>>,
    pending: Pending,
    closed: Arc<AtomicBool>,
) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch_line(&line, &pending),
            Ok(None) => {
                warn!("bridge closed stdout");
                break;
            }
            Err(e) => {
                warn!(error = %e, "bridge read error");
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    // Dropping the senders fails every request still waiting.
    lock_pending(&pending).clear();
}

fn dispatch_line(line: &str, pending: &Pending) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, line = %preview(trimmed), "unparseable bridge output");
            return;
        }
    };

    // Read the id first so a reply with an undecodable body still fails its own request.
    let Some(id) = value.get("id").and_then(serde_json::Value::as_str).map(str::to_owned) else {
        warn!(line = %preview(trimmed), "bridge message without id ignored");
        return;
    };

    let reply = serde_json::from_value::<BridgeReply>(value)
        .map_err(|e| ContentViewerError::decode(format!("invalid bridge reply to {id}: {e}")));

    match lock_pending(pending).remove(&id) {
        Some(tx) => {
            let _ = tx.send(reply);
        }
        None => debug!(%id, "reply for an abandoned request"),
    }
}

fn preview(line: &str) -> String {
    line.chars().take(200).collect()
}
