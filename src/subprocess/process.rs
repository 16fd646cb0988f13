//! Process controller: spawns the driven process and wires its output into
//! stream watchers

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

use super::error::ProcessError;
use super::streaming::{StreamSource, StreamWatcher, WatchSummary};
use crate::config::HarnessConfig;
use crate::events::{EventKind, EventQueue};
use crate::trigger::{PatternError, TriggerMatcher};

/// Program, arguments and environment of the process to drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Set a variable in the child's environment, on top of the inherited one
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// A process driven by a test.
///
/// Register triggers, call [`Process::start`] with the queue that should
/// receive events, then assert on that queue. Dropping a started process
/// kills it.
pub struct Process {
    command: ProcessCommand,
    triggers: TriggerMatcher,
    verbose: bool,
    child: Option<Child>,
    /// Process group of the child, kept after the child itself is reaped
    group: Option<u32>,
    stdin: Option<ChildStdin>,
    watchers: Vec<JoinHandle<WatchSummary>>,
}

impl Process {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_command(ProcessCommand::new(program).args(args))
    }

    pub fn from_command(command: ProcessCommand) -> Self {
        Self {
            command,
            triggers: TriggerMatcher::new(),
            verbose: false,
            child: None,
            group: None,
            stdin: None,
            watchers: Vec::new(),
        }
    }

    /// Echo the child's stdout and stderr lines to our own
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Start the child in `dir` instead of the current directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.command.working_dir = Some(dir.into());
        self
    }

    /// Set a variable in the child's environment
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Apply the `verbose` and `working_dir` settings of a harness config
    pub fn with_config(mut self, config: &HarnessConfig) -> Self {
        self.verbose = config.verbose;
        if let Some(dir) = &config.working_dir {
            self.command.working_dir = Some(dir.clone());
        }
        self
    }

    pub fn command(&self) -> &ProcessCommand {
        &self.command
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Register a trigger that turns matching output lines into events.
    ///
    /// Allowed after `start`, in which case only lines scanned from then on
    /// are checked against it.
    pub fn add_trigger(&self, pattern: &str, kind: EventKind) -> Result<(), PatternError> {
        self.triggers.register(pattern, kind)
    }

    pub fn triggers(&self) -> &TriggerMatcher {
        &self.triggers
    }

    /// Spawn the process and start watching its stdout and stderr.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, queue: &EventQueue) -> Result<(), ProcessError> {
        if self.child.is_some() {
            return Err(ProcessError::AlreadyStarted);
        }

        tracing::debug!("Starting process: {}", self.command.display());

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args);
        cmd.envs(&self.command.env);
        if let Some(dir) = &self.command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
            cmd.current_dir(dir);
        }

        // New process group so stop() reaches grandchildren holding our pipes
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ProcessError::from_spawn(e, &self.command.program, &self.command.args)
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(ProcessError::MissingPipe("stderr"))?;
        self.stdin = child.stdin.take();

        let stdout_watcher =
            StreamWatcher::new(StreamSource::Stdout, self.triggers.clone(), queue.sender());
        let stderr_watcher =
            StreamWatcher::new(StreamSource::Stderr, self.triggers.clone(), queue.sender());
        let (stdout_watcher, stderr_watcher) = if self.verbose {
            (
                stdout_watcher.with_echo(tokio::io::stdout()),
                stderr_watcher.with_echo(tokio::io::stderr()),
            )
        } else {
            (stdout_watcher, stderr_watcher)
        };
        self.watchers.push(stdout_watcher.spawn(stdout));
        self.watchers.push(stderr_watcher.spawn(stderr));

        tracing::debug!("Process started with pid {:?}", child.id());
        self.group = child.id();
        self.child = Some(child);
        Ok(())
    }

    /// Write `text` and a newline to the process' stdin
    pub async fn send(&mut self, text: &str) -> Result<(), ProcessError> {
        let stdin = self.stdin.as_mut().ok_or(ProcessError::NotStarted)?;
        stdin.write_all(text.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        tracing::trace!("Sent {:?} to stdin", text);
        Ok(())
    }

    /// Close the process' stdin so it sees end-of-input
    pub fn close_stdin(&mut self) -> Result<(), ProcessError> {
        if self.child.is_none() {
            return Err(ProcessError::NotStarted);
        }
        self.stdin = None;
        Ok(())
    }

    /// Kill the process (and its process group) and stop watching its output.
    ///
    /// The group is signalled even when the child has already exited, so
    /// background processes it left behind are killed too.
    pub async fn stop(&mut self) -> Result<(), ProcessError> {
        let mut child = self.child.take().ok_or(ProcessError::NotStarted)?;
        self.stdin = None;

        if let Some(group) = self.group.take() {
            kill_process_group(group);
        }

        match child.try_wait()? {
            Some(status) => tracing::debug!("Process already exited: {}", status),
            None => {
                child.kill().await?;
                tracing::debug!("Process killed");
            }
        }

        for watcher in self.watchers.drain(..) {
            watcher.abort();
        }
        Ok(())
    }

    /// Wait for the process to exit.
    ///
    /// A non-zero exit code or a terminating signal is an error. Watchers are
    /// not awaited here: one may still be holding an event nobody consumed.
    pub async fn wait(&mut self) -> Result<(), ProcessError> {
        let child = self.child.as_mut().ok_or(ProcessError::NotStarted)?;
        let status = child.wait().await?;
        tracing::debug!("Process exited: {}", status);
        check_exit_status(status)
    }

    /// Wait for both stream watchers to finish and collect their summaries.
    ///
    /// Only returns once both output streams are closed and every matched
    /// event has been handed to the queue.
    pub async fn join_watchers(&mut self) -> Vec<WatchSummary> {
        let mut summaries = Vec::with_capacity(self.watchers.len());
        for handle in self.watchers.drain(..) {
            match handle.await {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::debug!("Stream watcher did not complete: {}", e),
            }
        }
        summaries
    }

    /// OS process id while the child is running
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.id())
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        for watcher in &self.watchers {
            watcher.abort();
        }
        if let Some(group) = self.group.take() {
            kill_process_group(group);
        }
        if let Some(child) = self.child.as_mut() {
            if let Ok(None) = child.try_wait() {
                let _ = child.start_kill();
            }
        }
    }
}

#[cfg(unix)]
fn kill_process_group(group: u32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    // Negative pid addresses the whole group
    let pgid = Pid::from_raw(-(group as i32));
    match signal::kill(pgid, Signal::SIGKILL) {
        Ok(()) => tracing::trace!("Killed process group {}", group),
        Err(e) => tracing::trace!("Could not signal process group {}: {}", group, e),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_group: u32) {}

fn check_exit_status(status: std::process::ExitStatus) -> Result<(), ProcessError> {
    if status.success() {
        Ok(())
    } else if let Some(code) = status.code() {
        Err(ProcessError::ExitCode(code))
    } else {
        Err(signal_error(status))
    }
}

#[cfg(unix)]
fn signal_error(status: std::process::ExitStatus) -> ProcessError {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => ProcessError::Signal(signal),
        None => ProcessError::ExitCode(1),
    }
}

#[cfg(not(unix))]
fn signal_error(_status: std::process::ExitStatus) -> ProcessError {
    ProcessError::ExitCode(1)
}
