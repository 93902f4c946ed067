//! External process execution.
//!
//! [`ToolCommand`] spawns git, MSBuild and NuGet. While the process runs its
//! stdout and stderr are relayed line by line into `tracing`, and the last
//! [`OUTPUT_TAIL_LINES`] lines are kept for the [`ToolOutcome::Failure`]
//! payload. Nothing is parsed: success is decided by exit status only.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures::future::join3;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::contract::ToolOutcome;
use crate::error::ToolchainError;

/// Lines of combined output kept for failure reports.
pub const OUTPUT_TAIL_LINES: usize = 40;

/// A command line to run to completion.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    secret_args: Vec<usize>,
    echo: bool,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secret_args: Vec::new(),
            echo: true,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// An argument that is masked in logs.
    pub fn secret_arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.secret_args.push(self.args.len());
        self.arg(arg)
    }

    /// Relay output at `info` (true, default) or `debug` (false).
    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Short program name used in logs and errors.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    fn logged_args(&self) -> Vec<String> {
        self.args
            .iter()
            .enumerate()
            .map(|(i, a)| {
                if self.secret_args.contains(&i) {
                    "***".to_string()
                } else {
                    a.to_string_lossy().into_owned()
                }
            })
            .collect()
    }

    /// Runs the command and waits for it to exit.
    pub async fn run(&self) -> Result<ToolOutcome, ToolchainError> {
        let name = self.program_name();
        info!(tool = %name, args = ?self.logged_args(), "Running tool");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| {
            error!(error = ?source, tool = %name, "Failed to launch tool");
            ToolchainError::Spawn {
                program: name.clone(),
                source,
            }
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (out_tail, err_tail, status) = join3(
            relay(stdout, &name, "stdout", self.echo),
            relay(stderr, &name, "stderr", self.echo),
            child.wait(),
        )
        .await;

        let status = status.map_err(|source| {
            error!(error = ?source, tool = %name, "Failed to wait for tool");
            ToolchainError::Spawn {
                program: name.clone(),
                source,
            }
        })?;

        if status.success() {
            info!(tool = %name, "Tool finished successfully");
            return Ok(ToolOutcome::Success);
        }

        let mut lines: VecDeque<String> = out_tail;
        lines.extend(err_tail);
        while lines.len() > OUTPUT_TAIL_LINES {
            lines.pop_front();
        }
        let output = Vec::from(lines).join("\n");
        error!(tool = %name, exit_code = ?status.code(), "Tool exited with failure");
        Ok(ToolOutcome::Failure {
            exit_code: status.code(),
            output,
        })
    }
}

async fn relay<R>(stream: Option<R>, tool: &str, stream_name: &'static str, echo: bool) -> VecDeque<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::new();
    let Some(stream) = stream else {
        return tail;
    };
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if echo {
                    info!(tool, stream = stream_name, "{line}");
                } else {
                    debug!(tool, stream = stream_name, "{line}");
                }
                if tail.len() == OUTPUT_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) => {
                warn!(error = ?e, tool, stream = stream_name, "Stopped relaying tool output");
                break;
            }
        }
    }
    tail
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let outcome = sh("echo hello").run().await.unwrap();
        assert_eq!(outcome, ToolOutcome::Success);
    }

    #[tokio::test]
    async fn non_zero_exit_carries_code_and_output() {
        let outcome = sh("echo building; echo boom >&2; exit 3").run().await.unwrap();
        match outcome {
            ToolOutcome::Failure { exit_code, output } => {
                assert_eq!(exit_code, Some(3));
                assert!(output.contains("building"));
                assert!(output.contains("boom"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn output_is_truncated_to_tail() {
        let outcome = sh("for i in $(seq 1 100); do echo line$i; done; exit 1")
            .echo(false)
            .run()
            .await
            .unwrap();
        let ToolOutcome::Failure { output, .. } = outcome else {
            panic!("expected failure");
        };
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), OUTPUT_TAIL_LINES);
        assert_eq!(lines.last(), Some(&"line100"));
        assert!(!output.contains("line60\n"));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = ToolCommand::new("definitely-not-a-real-tool-4711")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ToolchainError::Spawn { .. }));
    }

    #[test]
    fn secret_arguments_are_masked() {
        let cmd = ToolCommand::new("nuget").arg("setApiKey").secret_arg("abc123");
        assert_eq!(cmd.logged_args(), vec!["setApiKey", "***"]);
        assert_eq!(cmd.program_name(), "nuget");
    }
}
