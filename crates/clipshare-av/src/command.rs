//! Builder for executing external tool commands with timeout support.
//!
//! Output streams are drained line by line while the process runs, so a
//! chatty tool can never fill a pipe and stall. Only a bounded tail of each
//! stream is kept.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::error::{ExtractionError, Result};

/// Default command timeout: 10 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default number of standard-error lines kept for diagnostics.
pub const DEFAULT_TAIL_LINES: usize = 20;

/// Standard-output lines kept; clip extraction writes almost nothing here.
const STDOUT_KEEP_LINES: usize = 200;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output lines (lossy UTF-8, bounded).
    pub stdout: Vec<String>,
    /// Last non-empty standard error lines (lossy UTF-8).
    pub stderr_tail: Vec<String>,
}

/// A builder for constructing and executing external tool invocations.
///
/// Arguments are handed to the OS as a list; nothing goes through a shell,
/// so paths with spaces, quotes, or `$` are passed verbatim.
///
/// # Example
///
/// ```no_run
/// use clipshare_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> clipshare_av::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-hide_banner")
///     .arg("-version")
///     .execute()
///     .await?;
/// println!("{}", output.stdout.join("\n"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
    tail_lines: usize,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(s.as_ref().to_os_string());
        self
    }

    /// Append multiple arguments.
    pub fn args<I, S>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(iter.into_iter().map(|s| s.as_ref().to_os_string()));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Set how many trailing standard-error lines to keep.
    pub fn tail_lines(&mut self, n: usize) -> &mut Self {
        self.tail_lines = n;
        self
    }

    /// The argument list as it will be passed to the process.
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Short program name used in logs and errors.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Render the invocation for logging. Not shell-safe; display only.
    pub fn display(&self) -> String {
        let mut s = self.program.to_string_lossy().to_string();
        for arg in &self.args {
            s.push(' ');
            s.push_str(&arg.to_string_lossy());
        }
        s
    }

    /// Execute the command, draining stdout and stderr as it runs.
    ///
    /// # Errors
    ///
    /// - [`ExtractionError::Spawn`] if the process cannot be started.
    /// - [`ExtractionError::TimedOut`] if it outlives the timeout; the child
    ///   is killed first.
    /// - [`ExtractionError::NonZeroExit`] if it exits unsuccessfully (carries
    ///   the stderr tail).
    pub async fn execute(&self) -> Result<ToolOutput> {
        let tool = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ExtractionError::Spawn {
            tool: tool.clone(),
            source,
        })?;

        let stdout_task = child.stdout.take().map(|out| {
            tokio::spawn(drain_lines(out, tool.clone(), OutputStream::Stdout, STDOUT_KEEP_LINES))
        });
        let stderr_task = child.stderr.take().map(|err| {
            tokio::spawn(drain_lines(err, tool.clone(), OutputStream::Stderr, self.tail_lines))
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(waited) => waited?,
            Err(_elapsed) => {
                tracing::warn!(
                    tool = %tool,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Tool timed out, killing process"
                );
                if let Err(e) = child.kill().await {
                    tracing::debug!(tool = %tool, "Failed to kill timed out process: {e}");
                }
                for task in [stdout_task, stderr_task].into_iter().flatten() {
                    task.abort();
                }
                return Err(ExtractionError::TimedOut {
                    tool,
                    timeout: self.timeout,
                });
            }
        };

        let stdout = join_lines(stdout_task).await;
        let stderr_tail = join_lines(stderr_task).await;

        if !status.success() {
            return Err(ExtractionError::NonZeroExit {
                tool,
                code: status.code(),
                stderr_tail,
            });
        }

        Ok(ToolOutput {
            status,
            stdout,
            stderr_tail,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

async fn join_lines(task: Option<tokio::task::JoinHandle<Vec<String>>>) -> Vec<String> {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => Vec::new(),
    }
}

/// Read `reader` to EOF line by line, logging each line and keeping the last
/// `keep` non-empty ones.
async fn drain_lines<R>(reader: R, tool: String, stream: OutputStream, keep: usize) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(keep.min(64));

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                if line.is_empty() {
                    continue;
                }
                match stream {
                    OutputStream::Stdout => tracing::trace!(tool = %tool, "stdout: {line}"),
                    OutputStream::Stderr => tracing::debug!(tool = %tool, "stderr: {line}"),
                }
                if keep == 0 {
                    continue;
                }
                if tail.len() == keep {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) => {
                tracing::debug!(tool = %tool, "Stopped reading {stream:?}: {e}");
                break;
            }
        }
    }

    tail.into()
}
