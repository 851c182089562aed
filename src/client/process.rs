//! Spawning the server as a child process with piped standard streams.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::ClientError;

/// How to launch the server.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ServerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

pub struct ServerProcess {
    child: Child,
    stderr_task: Option<JoinHandle<()>>,
}

impl ServerProcess {
    /// Starts the server and returns its stdin/stdout for the protocol. Its
    /// stderr is forwarded line by line to this process's log.
    pub fn spawn(command: &ServerCommand) -> Result<(Self, ChildStdout, ChildStdin), ClientError> {
        let mut builder = Command::new(&command.program);
        builder
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            builder.current_dir(dir);
        }

        let mut child = builder.spawn().map_err(ClientError::Spawn)?;
        let missing = |stream: &str| {
            ClientError::Spawn(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("child {stream} was not captured"),
            ))
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(target: "server", "{line}");
                }
            })
        });

        info!(
            program = %command.program.display(),
            pid = child.id().unwrap_or_default(),
            "server process started"
        );

        Ok((Self { child, stderr_task }, stdout, stdin))
    }

    /// Waits up to `grace` for the child to exit on its own (its stdin should
    /// already be closed), then kills it.
    pub async fn shutdown(mut self, grace: Duration) -> Result<ExitStatus, ClientError> {
        let status = match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status.map_err(ClientError::Spawn)?,
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "server did not exit, killing it");
                self.child.kill().await.map_err(ClientError::Spawn)?;
                self.child.wait().await.map_err(ClientError::Spawn)?
            }
        };

        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }

        info!(status = %status, "server process stopped");
        Ok(status)
    }
}
