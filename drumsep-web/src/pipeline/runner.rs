//! External process execution
//!
//! Stages never spawn processes directly; they go through [`ProcessRunner`]
//! so tests can substitute a scripted runner.

use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

/// One external command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name (looked up on PATH) or path
    pub program: String,
    /// Arguments, in order
    pub args: Vec<OsString>,
    /// Variables added on top of the inherited environment
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument (builder pattern)
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments (builder pattern)
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Add an environment variable (builder pattern)
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Arguments as lossy UTF-8, for logging and test assertions
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Shell-like rendering for log lines
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args_lossy());
        parts.join(" ")
    }
}

/// Result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// Standard output and standard error, merged
    pub output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Capability to run an external command to completion
///
/// Implementations block until the process exits. A non-zero exit is not an
/// error at this level: it is reported through [`ProcessOutput::exit_code`]
/// and callers decide what it means. `Err` is reserved for failures to
/// launch or wait on the process at all.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, command: &CommandSpec) -> io::Result<ProcessOutput>;
}

/// [`ProcessRunner`] backed by `std::process::Command`
///
/// Both output streams are read line by line on separate threads and
/// appended to one buffer as lines arrive, which approximates emission order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

fn pump<R: Read + Send + 'static>(
    stream: R,
    sink: Arc<Mutex<Vec<u8>>>,
) -> thread::JoinHandle<io::Result<()>> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                return Ok(());
            }
            sink.lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .extend_from_slice(&line);
        }
    })
}

fn join_pump(handle: thread::JoinHandle<io::Result<()>>) -> io::Result<()> {
    handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "output reader thread panicked"))?
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<ProcessOutput> {
        tracing::debug!("Running: {}", command.display());

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let merged = Arc::new(Mutex::new(Vec::new()));
        let stdout = child
            .stdout
            .take()
            .map(|s| pump(s, Arc::clone(&merged)));
        let stderr = child
            .stderr
            .take()
            .map(|s| pump(s, Arc::clone(&merged)));

        let status = child.wait()?;

        for handle in [stdout, stderr].into_iter().flatten() {
            join_pump(handle)?;
        }

        let bytes = std::mem::take(
            &mut *merged
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );

        Ok(ProcessOutput {
            exit_code: status.code(),
            output: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}
