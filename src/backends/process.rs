use super::{BackendError, DatabaseInstance, QueryResult};
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

/// How long `stop` waits for a graceful exit before killing the process
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives a database REPL over stdin/stdout, one request at a time.
///
/// A request is the SQL (terminated by `;`) followed by a blank line. The
/// response is any number of result lines ended by a blank line; lines
/// starting with `Error:` or `ERROR:` mark the call as failed.
pub struct ProcessDriver {
    /// Path to the database binary
    binary_path: PathBuf,
    /// Extra arguments passed to the binary
    args: Vec<String>,
    /// Grace period before a stopping process is killed
    stop_timeout: Duration,
    process: Option<RunningProcess>,
}

struct RunningProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl RunningProcess {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Collect whatever the process wrote to stderr. Only called once the
    /// process is known to be dead or broken, and bounded by `limit` in case
    /// it is not.
    async fn drain_stderr(&mut self, limit: Duration) -> String {
        let Some(mut stderr) = self.stderr.take() else {
            return String::new();
        };
        let mut buf = Vec::new();
        match timeout(limit, stderr.read_to_end(&mut buf)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(error = %e, "failed to read database stderr"),
            Err(_) => debug!("timed out reading database stderr"),
        }
        String::from_utf8_lossy(&buf).trim().to_string()
    }
}

impl ProcessDriver {
    /// Create a driver for the given binary. Nothing is spawned until `start`.
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            process: None,
        }
    }

    /// Set arguments passed to the binary on every start
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the grace period used by `stop`
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn binary_path(&self) -> &PathBuf {
        &self.binary_path
    }

    /// Check if the process has been started and has not exited
    pub fn is_running(&mut self) -> bool {
        self.process.as_mut().is_some_and(RunningProcess::is_alive)
    }

    async fn run_sql(&mut self, sql: &str) -> Result<QueryResult, BackendError> {
        let limit = self.stop_timeout;
        let Some(process) = self.process.as_mut() else {
            return Err(BackendError::NotRunning);
        };
        if !process.is_alive() {
            return Err(BackendError::NotRunning);
        }

        debug!(sql, "executing");

        let request = frame_request(sql);
        if let Err(e) = write_request(&mut process.stdin, &request).await {
            debug!(error = %e, "failed to write request");
            let stderr = process.drain_stderr(limit).await;
            return Err(BackendError::Crashed(stderr));
        }

        match read_response(&mut process.stdout).await {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(BackendError::Died(process.drain_stderr(limit).await)),
            Err(e) => Err(BackendError::Read(e.to_string())),
        }
    }
}

#[async_trait]
impl DatabaseInstance for ProcessDriver {
    async fn start(&mut self) -> Result<(), BackendError> {
        if self.process.is_some() {
            self.stop().await;
        }

        let mut child = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackendError::Spawn(format!("{}: {}", self.binary_path.display(), e))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(BackendError::Spawn("database stdio is not piped".to_string()));
        };
        let stderr = child.stderr.take();

        debug!(binary = %self.binary_path.display(), pid = ?child.id(), "started database");

        self.process = Some(RunningProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr,
        });
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(process) = self.process.take() else {
            return;
        };
        let RunningProcess {
            mut child, stdin, ..
        } = process;

        // EOF on stdin is the protocol's shutdown request
        drop(stdin);
        terminate(&child);

        match timeout(self.stop_timeout, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "database exited"),
            Ok(Err(e)) => debug!(error = %e, "failed to wait for database"),
            Err(_) => {
                debug!(timeout = ?self.stop_timeout, "database did not exit, killing");
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "failed to kill database");
                }
            }
        }
    }

    async fn execute(&mut self, sql: &str) -> QueryResult {
        match self.run_sql(sql).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "database call failed");
                QueryResult::error(e.to_string())
            }
        }
    }
}

/// Ask the process to exit with SIGTERM. `stop` kills it if it doesn't.
#[cfg(unix)]
fn terminate(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret != 0 {
        debug!(pid, error = %io::Error::last_os_error(), "failed to send SIGTERM");
    }
}

#[cfg(not(unix))]
fn terminate(_child: &Child) {}

/// Frame SQL as a request: trimmed, `;`-terminated, then a blank line
pub fn frame_request(sql: &str) -> String {
    let sql = sql.trim();
    let mut request = String::with_capacity(sql.len() + 3);
    request.push_str(sql);
    if !sql.ends_with(';') {
        request.push(';');
    }
    request.push_str("\n\n");
    request
}

async fn write_request(stdin: &mut ChildStdin, request: &str) -> io::Result<()> {
    stdin.write_all(request.as_bytes()).await?;
    stdin.flush().await
}

/// Read one response up to its terminating blank line.
///
/// Returns `None` if the stream ends first. Error lines don't stop the read,
/// so the next response starts on a clean frame.
pub async fn read_response<R>(reader: &mut R) -> io::Result<Option<QueryResult>>
where
    R: AsyncBufRead + Unpin,
{
    let mut values = Vec::new();
    let mut error = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(|c| c == '\n' || c == '\r');

        if line.is_empty() {
            break;
        }

        if line.starts_with("Error:") || line.starts_with("ERROR:") {
            error = Some(line.to_string());
            continue;
        }

        values.extend(split_result_line(line));
    }

    Ok(Some(match error {
        Some(message) => QueryResult::error(message),
        None => QueryResult::success(values),
    }))
}

/// Split a result line on tabs, or on pipes if it has no tab
pub fn split_result_line(line: &str) -> Vec<String> {
    let delimiter = if line.contains('\t') {
        '\t'
    } else if line.contains('|') {
        '|'
    } else {
        return vec![line.to_string()];
    };
    line.split(delimiter).map(str::to_string).collect()
}
