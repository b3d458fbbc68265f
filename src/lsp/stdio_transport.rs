// child-process transport: the server's stdin/stdout carry the framed stream
use crate::lsp::error::{LspError, Result};
use crate::lsp::transport::{Connection, LspTransport};
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const STDERR_TAIL_LINES: usize = 64;
const EXIT_GRACE: Duration = Duration::from_millis(500);
const STDERR_SETTLE: Duration = Duration::from_millis(500);

type StderrTail = Arc<Mutex<VecDeque<String>>>;

pub struct StdioTransport {
    connection: Connection<ChildStdout, ChildStdin>,
    child: Child,
    stderr_tail: StderrTail,
    stderr_drain: Option<JoinHandle<()>>,
}

#[async_trait::async_trait]
impl LspTransport for StdioTransport {
    async fn send(&mut self, message: &serde_json::Value) -> Result<()> {
        self.connection.send(message).await
    }

    async fn read(&mut self) -> Result<Option<serde_json::Value>> {
        self.connection.read().await
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.connection.close().await {
            debug!(error = %e, "failed to flush server stdin");
        }

        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(status = %status, "language server exited");
            }
            Err(_) => {
                warn!(
                    grace_ms = EXIT_GRACE.as_millis() as u64,
                    "language server still running, terminating"
                );
                self.child.kill().await?;
            }
        }
        Ok(())
    }

    async fn stderr_tail(&mut self) -> Vec<String> {
        self.settle_stderr().await;
        self.stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl StdioTransport {
    /// Spawn `command` with piped stdio. The process is killed if the transport is dropped.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self> {
        let (child, writer, reader, stderr) = start_server(command, args)?;

        let stderr_tail: StderrTail = Arc::new(Mutex::new(VecDeque::new()));
        let stderr_drain = tokio::spawn(drain_stderr(stderr, Arc::clone(&stderr_tail)));

        debug!(command, args = ?args, pid = child.id(), "spawned language server");
        Ok(StdioTransport {
            connection: Connection::new(reader, writer),
            child,
            stderr_tail,
            stderr_drain: Some(stderr_drain),
        })
    }

    /// Wait until the server's stderr reaches EOF, bounded by `STDERR_SETTLE`.
    ///
    /// A server that closed stdout but keeps stderr open leaves the drain
    /// running; the tail then holds whatever arrived within the bound.
    async fn settle_stderr(&mut self) {
        let Some(drain) = self.stderr_drain.as_mut() else {
            return;
        };
        match tokio::time::timeout(STDERR_SETTLE, drain).await {
            Ok(joined) => {
                if let Err(e) = joined {
                    warn!(error = %e, "stderr drain task failed");
                }
                self.stderr_drain = None;
            }
            Err(_) => {
                debug!(
                    settle_ms = STDERR_SETTLE.as_millis() as u64,
                    "server stderr still open"
                );
            }
        }
    }
}

async fn drain_stderr(stderr: ChildStderr, tail: StderrTail) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "lsp_probe::server_stderr", "{}", line);
        if let Ok(mut tail) = tail.lock() {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
}

fn start_server(
    exe: &str,
    args: &[String],
) -> Result<(Child, ChildStdin, ChildStdout, ChildStderr)> {
    let mut child = Command::new(exe)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| LspError::Spawn {
            command: exe.to_string(),
            source,
        })?;

    let missing = |stream: &str| {
        LspError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!("failed to take child {stream}"),
        ))
    };
    let writer = child.stdin.take().ok_or_else(|| missing("stdin"))?;
    let reader = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

    Ok((child, writer, reader, stderr))
}
