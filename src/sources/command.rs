//! Argv-style process execution for CLI source adapters.
//!
//! All external tools run through [`CommandSpec`]: arguments are discrete
//! elements, never shell strings, so nothing a tool prints can be
//! re-interpreted by a shell. Stdout is streamed line by line into the sink
//! while the process runs; stderr is drained at debug level.

use std::ffi::OsString;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::error::SourceError;
use crate::sink::ToolSender;

/// Specification for one external tool invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    /// Data written to the child's stdin before streaming begins.
    pub stdin_data: Option<String>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin_data: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin_data = Some(data.into());
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Fail fast when a tool binary is absent from PATH.
pub fn require_binary(name: &str) -> Result<(), SourceError> {
    which::which(name).map_err(|_| SourceError::MissingBinary {
        name: name.to_string(),
    })?;
    Ok(())
}

/// Run the command, mapping every stdout line through `map` and sending the
/// results into the sink. A line may map to zero sink lines (dropped) or
/// several (fan-out).
///
/// Cancellation: the caller races this future against a deadline; dropping
/// it kills the child (`kill_on_drop`).
pub async fn stream_lines<F>(
    spec: &CommandSpec,
    sender: &ToolSender,
    map: F,
) -> Result<(), SourceError>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut cmd = spec.to_command();
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    if spec.stdin_data.is_some() {
        cmd.stdin(std::process::Stdio::piped());
    } else {
        cmd.stdin(std::process::Stdio::null());
    }

    let mut child = cmd.spawn().map_err(|e| SourceError::Process {
        reason: format!("spawn {:?}: {e}", spec.program),
    })?;

    if let Some(data) = &spec.stdin_data {
        if let Some(mut stdin) = child.stdin.take() {
            let data = data.clone();
            tokio::spawn(async move {
                let _ = stdin.write_all(data.as_bytes()).await;
                let _ = stdin.shutdown().await;
            });
        }
    }

    let stdout = child.stdout.take().ok_or_else(|| SourceError::Process {
        reason: "child stdout unavailable".to_string(),
    })?;
    let stderr = child.stderr.take();

    let tool = sender.tool().to_string();
    let stderr_task = stderr.map(|stderr| {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(tool = %tool, line = %line, "stderr");
            }
        })
    });

    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await.map_err(SourceError::Io)? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        for mapped in map(line) {
            sender.send(&mapped).await;
        }
    }

    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    let status = child.wait().await.map_err(SourceError::Io)?;
    if !status.success() {
        return Err(SourceError::Process {
            reason: format!("{:?} exited with {status}", spec.program),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::OutputLayout;
    use crate::scope::Scope;
    use crate::sink::Sink;
    use camino::Utf8Path;
    use tempfile::TempDir;

    #[test]
    fn spec_builds_argv_style() {
        let spec = CommandSpec::new("subfinder").args(["-d", "example.com"]).arg("-silent");
        assert_eq!(spec.program, OsString::from("subfinder"));
        assert_eq!(spec.args.len(), 3);
    }

    #[test]
    fn missing_binary_is_detected() {
        let err = require_binary("definitely-not-a-real-binary-name").unwrap_err();
        assert!(err.is_benign());
    }

    #[tokio::test]
    async fn streams_stdout_lines_through_map() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(Utf8Path::from_path(dir.path()).unwrap(), "example.com");
        let sink = Sink::spawn(1, Scope::new("example.com"), layout, false);
        let sender = sink.tool_sender("echo");

        let spec = CommandSpec::new("sh")
            .args(["-c", "printf 'a.example.com\\nskip-me\\nb.example.com\\n'"]);
        stream_lines(&spec, &sender, |line| {
            if line == "skip-me" {
                Vec::new()
            } else {
                vec![line.to_string()]
            }
        })
        .await
        .unwrap();

        sink.flush().await.unwrap();
        assert_eq!(sink.store().snapshot().len(), 2);
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn stdin_data_reaches_the_child() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(Utf8Path::from_path(dir.path()).unwrap(), "example.com");
        let sink = Sink::spawn(1, Scope::new("example.com"), layout, false);
        let sender = sink.tool_sender("cat");

        let spec = CommandSpec::new("cat").stdin("x.example.com\ny.example.com\n");
        stream_lines(&spec, &sender, |line| vec![line.to_string()]).await.unwrap();

        sink.flush().await.unwrap();
        assert_eq!(sink.store().snapshot().len(), 2);
        sink.close().await.unwrap();
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_process_error() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(Utf8Path::from_path(dir.path()).unwrap(), "example.com");
        let sink = Sink::spawn(1, Scope::new("example.com"), layout, false);
        let sender = sink.tool_sender("false");

        let spec = CommandSpec::new("false");
        let err = stream_lines(&spec, &sender, |l| vec![l.to_string()]).await.unwrap_err();
        assert!(matches!(err, SourceError::Process { .. }));
        sink.close().await.unwrap();
    }
}
