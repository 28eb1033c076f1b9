use std::fmt;
use std::time::Duration;

use crate::common::error::Cons3rtError;
use crate::common::result::Cons3rtResult;

/// Default wall-clock limit for a generic command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(3600);

/// Longest timeout accepted from fractional seconds (30 days).
pub const MAX_TIMEOUT_SECS: f64 = 30.0 * 24.0 * 3600.0;

/// Prefix written before every echoed output line.
pub const ECHO_PREFIX: &str = ">>> ";

/// A single external command invocation.
///
/// The command is always an argument vector; it is never handed to a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    args: Vec<String>,
    timeout: Duration,
    capture_output: bool,
    echo: bool,
}

impl CommandSpec {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            args: args.into_iter().map(|a| a.to_string()).collect(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            capture_output: true,
            echo: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the timeout from fractional seconds, see [`timeout_from_secs`].
    pub fn with_timeout_secs(mut self, seconds: f64) -> Cons3rtResult<Self> {
        self.timeout = timeout_from_secs("timeout", seconds)?;
        Ok(self)
    }

    pub fn with_capture_output(mut self, capture_output: bool) -> Self {
        self.capture_output = capture_output;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn capture_output(&self) -> bool {
        self.capture_output
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line())
    }
}

/// Converts fractional seconds into a timeout.
///
/// # Arguments
///
/// * `field` - Name reported in the `ValidationError`
/// * `seconds` - Between zero and [`MAX_TIMEOUT_SECS`]
///
/// # Errors
///
/// Negative, non-finite or oversized values are a `ValidationError`.
pub fn timeout_from_secs(field: &str, seconds: f64) -> Cons3rtResult<Duration> {
    if !seconds.is_finite() || !(0.0..=MAX_TIMEOUT_SECS).contains(&seconds) {
        return Err(Cons3rtError::validation_error(
            field,
            format!("must be between 0 and {MAX_TIMEOUT_SECS} seconds"),
            Some(seconds.to_string()),
        ));
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| {
        Cons3rtError::validation_error(field, e.to_string(), Some(seconds.to_string()))
    })
}

/// Outcome of one command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    /// Merged stdout/stderr with trailing whitespace trimmed. Empty when output
    /// was not captured.
    pub output: String,
    pub timed_out: bool,
}

impl CommandResult {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
            timed_out: false,
        }
    }

    pub fn timed_out(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
            timed_out: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}
