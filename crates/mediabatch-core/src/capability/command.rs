//! External tool invocation.
//!
//! Tools run as child processes whose combined output is echoed to the
//! progress sink. While a tool runs, the runner polls the batch control:
//! pausing stops the child's process group, resuming continues it and
//! cancelling kills it.

use async_trait::async_trait;
#[cfg(unix)]
use nix::sys::signal::{kill, killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::CommandError;
use crate::progress::ProgressSink;
use crate::scheduler::{BatchControl, RunState};

/// A program with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Build from a tool command line (program plus leading arguments).
    pub fn from_command(command: &[String]) -> Self {
        let (program, args) = match command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (String::new(), Vec::new()),
        };
        Self { program, args }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs external programs on behalf of the actions.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. Non-zero exit is an error.
    async fn run(
        &self,
        invocation: &Invocation,
        progress: &dyn ProgressSink,
        control: &BatchControl,
    ) -> Result<(), CommandError>;
}

/// Runs programs as local child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    wrapper: Vec<String>,
    poll_interval: Duration,
    process_group: bool,
}

impl ProcessRunner {
    /// `wrapper` is prepended to every invocation. When it contains
    /// `setsid`, pause/resume signal the whole process group.
    pub fn new(wrapper: Vec<String>, poll_interval: Duration) -> Self {
        let process_group = wrapper.iter().any(|part| part.ends_with("setsid"));
        Self {
            wrapper,
            poll_interval,
            process_group,
        }
    }

    /// Send `signal` to the child, or to its process group when the
    /// wrapper made it a group leader.
    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: Signal) {
        let Ok(raw) = i32::try_from(pid) else {
            tracing::warn!("Process id {} out of range", pid);
            return;
        };
        let target = Pid::from_raw(raw);
        let result = if self.process_group {
            killpg(target, signal)
        } else {
            kill(target, signal)
        };
        if let Err(e) = result {
            tracing::warn!("Could not send {} to {}: {}", signal, pid, e);
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, pid: u32, signal: Signal) {
        tracing::debug!("Cannot send {:?} to {} on this platform", signal, pid);
    }
}

#[cfg(not(unix))]
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy)]
enum Signal {
    SIGSTOP,
    SIGCONT,
    SIGTERM,
}

fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        progress: &dyn ProgressSink,
        control: &BatchControl,
    ) -> Result<(), CommandError> {
        let program = invocation.program.clone();
        progress.output(&format!("\n# {invocation}\n"));
        tracing::info!("Running {}", invocation);

        let mut argv: Vec<&str> = self.wrapper.iter().map(String::as_str).collect();
        argv.push(&invocation.program);
        argv.extend(invocation.args.iter().map(String::as_str));

        let mut child = Command::new(argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.clone(),
                source,
            })?;
        let pid = child.id();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut paused = false;

        let status = loop {
            tokio::select! {
                status = child.wait() => {
                    break status.map_err(|source| CommandError::Io {
                        program: program.clone(),
                        source,
                    })?;
                }
                Some(line) = rx.recv() => progress.output(&format!("{line}\n")),
                _ = ticker.tick() => match (control.state(), paused) {
                    (RunState::Cancelled, _) => {
                        if let Some(pid) = pid {
                            if paused {
                                self.signal(pid, Signal::SIGCONT);
                            }
                            self.signal(pid, Signal::SIGTERM);
                        }
                        if let Err(e) = child.kill().await {
                            tracing::debug!("Killing {} failed: {}", program, e);
                        }
                        return Err(CommandError::Cancelled { program });
                    }
                    (RunState::Paused, false) => {
                        if let Some(pid) = pid {
                            self.signal(pid, Signal::SIGSTOP);
                        }
                        progress.output("\n +++ Process paused +++\n");
                        paused = true;
                    }
                    (RunState::Running, true) => {
                        if let Some(pid) = pid {
                            self.signal(pid, Signal::SIGCONT);
                        }
                        progress.output("\n +++ Process resumed +++\n");
                        paused = false;
                    }
                    _ => {}
                },
            }
        };

        for reader in readers {
            let _ = reader.await;
        }
        while let Ok(line) = rx.try_recv() {
            progress.output(&format!("{line}\n"));
        }

        if status.success() {
            Ok(())
        } else if let Some(code) = status.code() {
            Err(CommandError::Failed { program, code })
        } else {
            Err(CommandError::Killed { program })
        }
    }
}
