//! Process execution with timeout, stdin feeding and output capture

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use super::resolve::resolve_program;
use super::result::{ExecError, ExecutionResult};

/// Default wall-clock limit for one command
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Caller arguments: one shell-style line or an explicit list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandArgs {
    Line(String),
    List(Vec<String>),
}

impl CommandArgs {
    /// Tokenize into argv entries. A line is split with shell-word rules
    /// (quotes and escapes honored); nothing is expanded or globbed.
    pub fn to_argv(&self) -> Result<Vec<String>, ExecError> {
        match self {
            CommandArgs::List(args) => Ok(args.clone()),
            CommandArgs::Line(line) => shlex::split(line)
                .ok_or_else(|| ExecError::InvalidArguments(format!("unbalanced quoting in: {}", line))),
        }
    }
}

impl From<&str> for CommandArgs {
    fn from(line: &str) -> Self {
        CommandArgs::Line(line.to_string())
    }
}

impl From<Vec<String>> for CommandArgs {
    fn from(args: Vec<String>) -> Self {
        CommandArgs::List(args)
    }
}

/// Extra environment variable for the child process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Everything needed for one execution besides the program name
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub args: CommandArgs,
    /// Flag/value pairs appended after `args`, in insertion order
    pub flags: Vec<(String, String)>,
    /// `None` waits forever
    pub timeout: Option<Duration>,
    pub capture_output: bool,
    pub check: bool,
    pub env: Vec<EnvVar>,
    pub workdir: Option<PathBuf>,
    pub stdin: Option<String>,
}

impl ExecRequest {
    pub fn new(args: impl Into<CommandArgs>) -> Self {
        Self {
            args: args.into(),
            flags: Vec::new(),
            timeout: Some(DEFAULT_TIMEOUT),
            capture_output: true,
            check: false,
            env: Vec::new(),
            workdir: None,
            stdin: None,
        }
    }

    /// Append `flag value` when `value` is present and non-empty
    pub fn flag(mut self, flag: &str, value: Option<&str>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.flags.push((flag.to_string(), value.to_string()));
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn with_check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub fn with_env(mut self, env: Vec<EnvVar>) -> Self {
        self.env = env;
        self
    }

    pub fn with_workdir(mut self, workdir: Option<PathBuf>) -> Self {
        self.workdir = workdir;
        self
    }

    pub fn with_stdin(mut self, stdin: Option<String>) -> Self {
        self.stdin = stdin;
        self
    }

    /// Full argv with `program_path` in front
    pub fn build_argv(&self, program_path: &str) -> Result<Vec<String>, ExecError> {
        let mut argv = vec![program_path.to_string()];
        argv.extend(self.args.to_argv()?);
        for (flag, value) in &self.flags {
            argv.push(flag.clone());
            argv.push(value.clone());
        }
        Ok(argv)
    }
}

/// Run `program` once, never through a shell.
///
/// The program is resolved before anything is spawned. On timeout the child
/// is killed and waited for before `ExecError::Timeout` is returned; a timeout
/// wins over `check`.
pub async fn execute(program: &str, request: ExecRequest) -> Result<ExecutionResult, ExecError> {
    let program_path = resolve_program(program).ok_or_else(|| ExecError::BinaryNotFound {
        program: program.to_string(),
    })?;
    let cmd = request.build_argv(&program_path.to_string_lossy())?;
    debug!("Executing: {:?}", cmd);

    let mut command = Command::new(&program_path);
    command.args(&cmd[1..]).kill_on_drop(true);
    // Own process group, so a timeout can kill whatever the command started
    #[cfg(unix)]
    command.process_group(0);
    for var in &request.env {
        command.env(&var.name, &var.value);
    }
    if let Some(dir) = &request.workdir {
        command.current_dir(dir);
    }

    command.stdin(if request.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    if request.capture_output {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }

    let mut child = command.spawn().map_err(|source| ExecError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let input = request.stdin.map(String::into_bytes);
    let outcome = match request.timeout {
        Some(limit) => tokio::time::timeout(limit, communicate(&mut child, input)).await.ok(),
        None => Some(communicate(&mut child, input).await),
    };

    let (status, stdout, stderr) = match outcome {
        Some(result) => result?,
        None => {
            kill_process_group(&mut child, &cmd).await;
            return Err(ExecError::Timeout {
                cmd,
                timeout: request.timeout.unwrap_or_default(),
            });
        }
    };

    let returncode = exit_code(status);
    let (stdout, stderr) = if request.capture_output {
        (
            String::from_utf8_lossy(&stdout).into_owned(),
            String::from_utf8_lossy(&stderr).into_owned(),
        )
    } else {
        (String::new(), String::new())
    };
    debug!("Command {:?} exited with {}", cmd, returncode);

    if request.check && returncode != 0 {
        return Err(ExecError::NonZeroExit {
            cmd,
            code: returncode,
            stdout,
            stderr,
        });
    }

    Ok(ExecutionResult::new(cmd, returncode, stdout, stderr))
}

/// SIGKILL the child's process group, then kill and reap the child itself
async fn kill_process_group(child: &mut Child, cmd: &[String]) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            // Group already empty
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to kill process group of {:?}: {}", cmd, e),
        }
    }

    // Waits after killing, so the child is reaped before we return
    if let Err(e) = child.kill().await {
        warn!("Failed to kill timed out command {:?}: {}", cmd, e);
    }
}

/// Feed stdin and drain stdout/stderr concurrently, then wait for exit
async fn communicate(child: &mut Child, input: Option<Vec<u8>>) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let write_input = async move {
        if let (Some(mut pipe), Some(data)) = (stdin, input) {
            match pipe.write_all(&data).await {
                // The child may exit without reading everything
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e),
                Ok(()) => {}
            }
            drop(pipe);
        }
        Ok(())
    };

    let (_, out, err) = tokio::try_join!(write_input, read_pipe(stdout), read_pipe(stderr))?;
    let status = child.wait().await?;
    Ok((status, out, err))
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status.code().or_else(|| status.signal().map(|sig| -sig)).unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
