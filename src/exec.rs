//! External command execution
//!
//! Every init-system tool invocation goes through a [`CommandRunner`], which
//! imposes a deadline and captures stdout and stderr together. Failures keep
//! the captured output because several tools print their "not found" or
//! "inactive" diagnostics on stderr with a non-zero exit.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;

/// Why an external command did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandFailure {
    /// Ran to completion with a non-zero status (None if killed by a signal)
    Exit(Option<i32>),
    /// Deadline elapsed; the child was killed
    Timeout(Duration),
    /// Could not be started at all
    Spawn(String),
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit(Some(code)) => write!(f, "exit status {}", code),
            Self::Exit(None) => write!(f, "terminated by signal"),
            Self::Timeout(d) => write!(f, "timed out after {:?}", d),
            Self::Spawn(e) => write!(f, "spawn failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("command {command:?} failed: {reason}\nOutput: {output}")]
pub struct CommandError {
    /// Shell-quoted command line
    pub command: String,
    /// Combined stdout + stderr captured before the failure
    pub output: String,
    pub reason: CommandFailure,
}

impl CommandError {
    pub fn new(argv: &[String], output: impl Into<String>, reason: CommandFailure) -> Self {
        Self {
            command: command_line(argv),
            output: output.into(),
            reason,
        }
    }

    /// Non-zero exit with the given captured output
    pub fn exit(argv: &[String], code: i32, output: impl Into<String>) -> Self {
        Self::new(argv, output, CommandFailure::Exit(Some(code)))
    }

    /// The tool ran and reported failure (as opposed to hanging or not starting)
    pub fn is_exit(&self) -> bool {
        matches!(self.reason, CommandFailure::Exit(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.reason, CommandFailure::Timeout(_))
    }
}

/// Render argv the way a user would type it
pub fn command_line(argv: &[String]) -> String {
    shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
}

/// Runs external programs on behalf of the managers
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv` to completion and return its combined output.
    ///
    /// `timeout` of `None` means the runner's default deadline.
    async fn run(&self, argv: &[String], timeout: Option<Duration>) -> Result<Vec<u8>, CommandError>;

    /// Whether `program` resolves on the executable search path
    fn has_program(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Runs real processes via tokio
#[derive(Debug, Clone)]
pub struct SystemRunner {
    default_timeout: Duration,
}

impl SystemRunner {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, argv: &[String], timeout: Option<Duration>) -> Result<Vec<u8>, CommandError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| CommandError::new(argv, "", CommandFailure::Spawn("empty command".into())))?;
        let deadline = timeout.unwrap_or(self.default_timeout);

        log::debug!("exec: {}", command_line(argv));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::new(argv, "", CommandFailure::Spawn(e.to_string())))?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CommandError::new(argv, "", CommandFailure::Spawn(e.to_string())));
            }
            Err(_) => {
                return Err(CommandError::new(argv, "", CommandFailure::Timeout(deadline)));
            }
        };

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        if output.status.success() {
            Ok(combined)
        } else {
            Err(CommandError::new(
                argv,
                String::from_utf8_lossy(&combined),
                CommandFailure::Exit(output.status.code()),
            ))
        }
    }
}

type Script = dyn Fn(&[String]) -> Result<String, CommandError> + Send + Sync;

/// Answers commands from a closure instead of spawning processes.
///
/// Every invocation is recorded, which makes it possible to count how many
/// times a given tool would have been run.
pub struct ScriptedRunner {
    script: Box<Script>,
    programs: Option<Vec<String>>,
    latency: Duration,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&[String]) -> Result<String, CommandError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            programs: None,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Restrict `has_program` to these names (all programs exist by default)
    pub fn with_programs(mut self, programs: &[&str]) -> Self {
        self.programs = Some(programs.iter().map(|p| p.to_string()).collect());
        self
    }

    /// Simulated run time of every command
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Snapshot of every argv run so far
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of recorded invocations matching `pred`
    pub fn count(&self, pred: impl Fn(&[String]) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|argv| pred(argv))
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, argv: &[String], timeout: Option<Duration>) -> Result<Vec<u8>, CommandError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(argv.to_vec());

        if !self.latency.is_zero() {
            let deadline = timeout.unwrap_or(Duration::from_secs(30));
            if tokio::time::timeout(deadline, tokio::time::sleep(self.latency))
                .await
                .is_err()
            {
                return Err(CommandError::new(argv, "", CommandFailure::Timeout(deadline)));
            }
        }

        (self.script)(argv).map(String::into_bytes)
    }

    fn has_program(&self, program: &str) -> bool {
        match &self.programs {
            Some(list) => list.iter().any(|p| p == program),
            None => true,
        }
    }
}
