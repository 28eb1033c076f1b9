use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::common::error::Cons3rtError;
use crate::common::result::Cons3rtResult;
use crate::domain::value_objects::command::{CommandResult, CommandSpec, ECHO_PREFIX};

/// Executes external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion or until its timeout expires.
    ///
    /// A non-zero exit is reported through [`CommandResult::exit_code`], not as
    /// an error.
    async fn run(&self, spec: &CommandSpec) -> Cons3rtResult<CommandResult>;

    /// Like [`CommandRunner::run`], but a timeout or a non-zero exit is an error.
    async fn run_checked(&self, spec: &CommandSpec) -> Cons3rtResult<CommandResult> {
        let result = self.run(spec).await?;
        ensure_success(spec, result)
    }
}

#[cfg(test)]
mockall::mock! {
    pub CommandRunner {}

    #[async_trait]
    impl CommandRunner for CommandRunner {
        async fn run(&self, spec: &CommandSpec) -> Cons3rtResult<CommandResult>;
    }
}

/// Turns a timed-out or non-zero result into a `CommandFailure` carrying the
/// captured output.
pub fn ensure_success(spec: &CommandSpec, result: CommandResult) -> Cons3rtResult<CommandResult> {
    if result.is_success() {
        return Ok(result);
    }
    let message = if result.timed_out {
        format!(
            "Command [{}] timed out after {:?}",
            spec.command_line(),
            spec.timeout()
        )
    } else {
        format!(
            "Command [{}] exited with code {}",
            spec.command_line(),
            result.exit_code
        )
    };
    error!("{}", message);
    Err(Cons3rtError::command_failure_with_output(
        message,
        spec.command_line(),
        result.exit_code,
        result.output,
    ))
}

/// [`CommandRunner`] backed by `tokio::process`.
///
/// Stdin is always `/dev/null`. Captured stdout and stderr are merged line by
/// line in arrival order. On timeout the child is killed and reaped before
/// `run` returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Cons3rtResult<CommandResult> {
        let (program, args) = spec.args().split_first().ok_or_else(|| {
            Cons3rtError::command_failure("Bad command supplied: empty argument list", "", None)
        })?;
        let command_line = spec.command_line();
        debug!("Running command: {}", command_line);

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        if spec.capture_output() {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let mut child = command.spawn().map_err(|e| {
            error!("Unable to start command [{}]: {}", command_line, e);
            Cons3rtError::command_failure_with_source(
                format!("Unable to start command [{command_line}]: {e}"),
                &command_line,
                e,
            )
        })?;

        let stdout = child.stdout.take().map(|s| BufReader::new(s).split(b'\n'));
        let stderr = child.stderr.take().map(|s| BufReader::new(s).split(b'\n'));
        let mut lines = Vec::new();

        let outcome = timeout(
            spec.timeout(),
            drive(&mut child, stdout, stderr, &mut lines, spec.echo()),
        )
        .await;

        let (status, timed_out) = match outcome {
            Ok(status) => (status.map_err(|e| wait_failure(&command_line, e))?, false),
            Err(_) => {
                warn!(
                    "Command [{}] did not finish within {:?}, killing it",
                    command_line,
                    spec.timeout()
                );
                child.kill().await.map_err(|e| wait_failure(&command_line, e))?;
                let status = child.wait().await.map_err(|e| wait_failure(&command_line, e))?;
                (status, true)
            }
        };

        let exit_code = exit_code(status, &command_line)?;
        let output = lines.join("\n").trim_end().to_string();
        debug!("Command [{}] exited with code {}", command_line, exit_code);

        Ok(CommandResult {
            exit_code,
            output,
            timed_out,
        })
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

async fn drive<O, E>(
    child: &mut Child,
    mut stdout: Option<Split<O>>,
    mut stderr: Option<Split<E>>,
    lines: &mut Vec<String>,
    echo: bool,
) -> std::io::Result<ExitStatus>
where
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    while stdout.is_some() || stderr.is_some() {
        let (stream, segment) = tokio::select! {
            segment = next_segment(&mut stdout) => (Stream::Stdout, segment?),
            segment = next_segment(&mut stderr) => (Stream::Stderr, segment?),
        };

        match segment {
            Some(bytes) => {
                let line = String::from_utf8_lossy(&bytes).trim_end().to_string();
                if echo {
                    println!("{ECHO_PREFIX}{line}");
                }
                lines.push(line);
            }
            None => match stream {
                Stream::Stdout => stdout = None,
                Stream::Stderr => stderr = None,
            },
        }
    }
    child.wait().await
}

async fn next_segment<R>(reader: &mut Option<Split<R>>) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    match reader {
        Some(reader) => reader.next_segment().await,
        None => std::future::pending().await,
    }
}

fn wait_failure(command_line: &str, source: std::io::Error) -> Cons3rtError {
    Cons3rtError::command_failure_with_source(
        format!("Failed while waiting for command [{command_line}]: {source}"),
        command_line,
        source,
    )
}

fn exit_code(status: ExitStatus, command_line: &str) -> Cons3rtResult<i32> {
    if let Some(code) = status.code() {
        return Ok(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Ok(-signal);
        }
    }
    Err(Cons3rtError::command_failure(
        format!("Unable to determine the exit code of [{command_line}]"),
        command_line,
        None,
    ))
}
