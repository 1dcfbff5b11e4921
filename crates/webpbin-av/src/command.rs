//! Builder for executing external tool commands with timeout support.
//!
//! Stdin feeding, stdout draining and stderr capture each run on their own
//! scoped thread, so a tool that streams output while it is still reading
//! its input never deadlocks on a full pipe.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::tools::DEFAULT_TIMEOUT;
use crate::{Error, Result};

/// How often the child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output. Empty when stdout was redirected to a writer.
    pub stdout: Vec<u8>,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use webpbin_av::ToolCommand;
/// use std::path::PathBuf;
///
/// let output = ToolCommand::new(PathBuf::from("cwebp"))
///     .arg("-version")
///     .execute()?;
/// println!("{}", String::from_utf8_lossy(&output.stdout));
/// # Ok::<(), webpbin_av::Error>(())
/// ```
pub struct ToolCommand<'a> {
    program: PathBuf,
    name: Option<String>,
    args: Vec<OsString>,
    timeout: Duration,
    stdin: Option<Box<dyn Read + Send + 'a>>,
    stdout: Option<&'a mut (dyn Write + Send)>,
}

impl fmt::Debug for ToolCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCommand")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("timeout", &self.timeout)
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .finish()
    }
}

impl<'a> ToolCommand<'a> {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            name: None,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            stdin: None,
            stdout: None,
        }
    }

    /// Name used in errors and logs instead of the program's file name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(s.as_ref().to_os_string());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl AsRef<OsStr>>) -> &mut Self {
        self.args
            .extend(iter.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Stream `reader` into the process's stdin.
    pub fn stdin(&mut self, reader: impl Read + Send + 'a) -> &mut Self {
        self.stdin = Some(Box::new(reader));
        self
    }

    /// Copy the process's stdout into `writer` instead of capturing it.
    pub fn stdout(&mut self, writer: &'a mut (dyn Write + Send)) -> &mut Self {
        self.stdout = Some(writer);
        self
    }

    /// The arguments added so far.
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.program
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| self.program.to_string_lossy().to_string())
        })
    }

    /// Execute the command.
    ///
    /// The stdin reader and stdout writer are consumed by the call; the
    /// program, arguments and timeout are kept.
    ///
    /// # Errors
    ///
    /// - [`Error::Spawn`] if the process cannot be started.
    /// - [`Error::ToolFailed`] if the process exits with a non-zero status.
    ///   The message is the exit status and the captured stderr joined by
    ///   `". "`.
    /// - [`Error::ToolFailed`] if the process times out.
    /// - [`Error::Io`] if copying stdin or stdout fails.
    pub fn execute(&mut self) -> Result<ToolOutput> {
        let tool = self.display_name();
        tracing::debug!("Running {} {:?}", tool, self.args);

        let input = self.stdin.take();
        let sink = self.stdout.take();
        let timeout = self.timeout;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            tool: tool.clone(),
            source,
        })?;

        let stdin_pipe = child.stdin.take();
        let (Some(mut stdout_pipe), Some(mut stderr_pipe)) =
            (child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::tool_failed(&tool, "output pipes were not captured"));
        };

        let (status, fed, drained, stderr) = thread::scope(|s| {
            let feeder = input.zip(stdin_pipe).map(|(mut reader, mut pipe)| {
                s.spawn(move || -> io::Result<()> {
                    match io::copy(&mut reader, &mut pipe) {
                        Ok(_) => Ok(()),
                        // The tool stopped reading; its exit status tells the story.
                        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                        Err(e) => Err(e),
                    }
                })
            });

            let drain = s.spawn(move || -> io::Result<Vec<u8>> {
                let mut captured = Vec::new();
                match sink {
                    Some(writer) => {
                        io::copy(&mut stdout_pipe, writer)?;
                        writer.flush()?;
                    }
                    None => {
                        stdout_pipe.read_to_end(&mut captured)?;
                    }
                }
                Ok(captured)
            });

            let errors = s.spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr_pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).to_string()
            });

            let status = wait_with_deadline(&mut child, timeout);

            let fed = feeder
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .unwrap_or(Ok(()));
            let drained = drain
                .join()
                .unwrap_or_else(|e| std::panic::resume_unwind(e));
            let stderr = errors
                .join()
                .unwrap_or_else(|e| std::panic::resume_unwind(e));

            (status, fed, drained, stderr)
        });

        let status = match status? {
            Some(status) => status,
            None => {
                return Err(Error::tool_failed(
                    tool,
                    format!("timed out after {:?}", timeout),
                ))
            }
        };

        if !status.success() {
            return Err(Error::tool_failed(
                tool,
                format!("{}. {}", status, stderr.trim_end()),
            ));
        }

        fed?;
        let stdout = drained?;

        Ok(ToolOutput {
            status,
            stdout,
            stderr,
        })
    }
}

/// Wait for `child` to exit, killing it once `timeout` has elapsed.
///
/// Returns `Ok(None)` when the child had to be killed.
fn wait_with_deadline(
    child: &mut std::process::Child,
    timeout: Duration,
) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }
    }
}
