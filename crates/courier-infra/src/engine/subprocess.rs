//! Execution engine backed by a long-lived agent CLI process.
//!
//! Each handle owns one child process speaking the line protocol in
//! [`super::protocol`]. The child is killed when the handle is dropped.

use std::collections::VecDeque;
use std::process::Stdio;
use std::time::Duration;

use futures_util::stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use courier_core::engine::{EngineEventStream, EngineSession, ExecutionEngine};
use courier_types::config::EngineCommandConfig;
use courier_types::engine::{EngineEvent, EngineInput, EngineOptions};
use courier_types::error::EngineError;

use super::protocol::{decode_line, encode_input};

/// Grace period for the child to exit after stdin closes.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Spawns one agent CLI process per handle.
#[derive(Debug, Clone)]
pub struct SubprocessEngine {
    command: String,
    args: Vec<String>,
}

impl SubprocessEngine {
    pub fn new(config: &EngineCommandConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }

    fn command_for(&self, options: &EngineOptions) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg("--model")
            .arg(&options.model)
            .arg("--system-prompt")
            .arg(&options.system_prompt)
            .current_dir(&options.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl ExecutionEngine for SubprocessEngine {
    type Session = SubprocessSession;

    #[tracing::instrument(skip_all, fields(command = %self.command, model = %options.model))]
    async fn open(&self, options: EngineOptions) -> Result<SubprocessSession, EngineError> {
        tokio::fs::create_dir_all(&options.cwd).await?;

        let mut child = self
            .command_for(&options)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {e}", self.command)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("failed to capture child stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("failed to capture child stdout".into()))?;

        // Drain stderr so a chatty child never blocks on a full pipe.
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(line = %line, "engine stderr");
                }
            });
        }

        info!(pid = ?child.id(), cwd = %options.cwd.display(), "engine process started");

        Ok(SubprocessSession {
            child,
            stdin: Some(stdin),
            lines: BufReader::new(stdout).lines(),
            closed: false,
        })
    }
}

/// One running agent process.
pub struct SubprocessSession {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Lines<BufReader<ChildStdout>>,
    closed: bool,
}

impl std::fmt::Debug for SubprocessSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessSession")
            .field("pid", &self.child.id())
            .field("closed", &self.closed)
            .finish()
    }
}

struct ReceiveState<'a> {
    lines: &'a mut Lines<BufReader<ChildStdout>>,
    pending: VecDeque<EngineEvent>,
    finished: bool,
}

impl EngineSession for SubprocessSession {
    async fn send(&mut self, input: EngineInput) -> Result<(), EngineError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EngineError::Protocol("engine handle is closed".into()))?;

        let mut line = encode_input(&input)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    fn receive(&mut self) -> EngineEventStream<'_> {
        let state = ReceiveState {
            lines: &mut self.lines,
            pending: VecDeque::new(),
            finished: false,
        };

        Box::pin(stream::unfold(state, |mut state| async move {
            if state.finished {
                return None;
            }
            loop {
                if let Some(event) = state.pending.pop_front() {
                    if event.is_final() {
                        state.finished = true;
                    }
                    return Some((Ok(event), state));
                }
                match state.lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match decode_line(&line) {
                        Ok(events) => state.pending.extend(events),
                        Err(e) => warn!(error = %e, "skipping undecodable engine output"),
                    },
                    Ok(None) => {
                        state.finished = true;
                        return Some((Err(EngineError::StreamEnded), state));
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e.into()), state));
                    }
                }
            }
        }))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Closing stdin asks the agent to exit on its own.
        self.stdin = None;
        match tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "engine process exited"),
            Ok(Err(e)) => warn!(error = %e, "failed to wait for engine process"),
            Err(_) => {
                warn!("engine process did not exit, killing it");
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "failed to kill engine process");
                }
            }
        }
    }
}
