//! External process execution
//!
//! Every CLI-backed adapter funnels through [`ProcessExecutor`] so commands are
//! logged uniformly and failures carry the command line that produced them.

use std::ffi::OsStr;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use ct_common::{Error, Result};

async fn stream_lines<R: AsyncRead + Unpin>(reader: R) -> std::io::Result<()> {
    let mut segments = BufReader::new(reader).split(b'\n');
    while let Some(segment) = segments.next_segment().await? {
        let out = String::from_utf8_lossy(&segment);
        info!("{}", out.trim_end_matches('\r'));
    }
    Ok(())
}

/// Runs external tools.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    debug: bool,
}

impl ProcessExecutor {
    /// Create an executor; with `debug` every command line is logged at info.
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    fn command_line<I, S>(program: &str, args: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(&arg.as_ref().to_string_lossy());
        }
        line
    }

    fn announce(&self, line: &str) {
        if self.debug {
            info!(command = %line, "Running command");
        } else {
            debug!(command = %line, "Running command");
        }
    }

    /// Run a command, streaming its stdout to the log.
    pub async fn run<I, S>(&self, program: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S> + Clone,
        S: AsRef<OsStr>,
    {
        let line = Self::command_line(program, args.clone());
        self.announce(&line);

        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::command_failed(&line, e.to_string()))?;

        // Drain stderr concurrently so a chatty tool can't block on a full pipe.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        // Tools may print arbitrary bytes; decode lossily and always reap the child.
        let streamed = match child.stdout.take() {
            Some(stdout) => stream_lines(stdout).await,
            None => Ok(()),
        };

        let status = child.wait().await?;
        streamed?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            let message = if stderr.trim().is_empty() {
                status.to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::command_failed(line, message));
        }
        Ok(())
    }

    /// Run a command and return its trimmed stdout.
    pub async fn capture<I, S>(&self, program: &str, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S> + Clone,
        S: AsRef<OsStr>,
    {
        let line = Self::command_line(program, args.clone());
        self.announce(&line);

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::command_failed(&line, e.to_string()))?;

        if !output.status.success() {
            return Err(Error::command_failed(
                line,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_args() {
        assert_eq!(
            ProcessExecutor::command_line("helm", ["lint", "charts/foo"]),
            "helm lint charts/foo"
        );
    }

    #[tokio::test]
    async fn capture_returns_trimmed_stdout() {
        let exec = ProcessExecutor::new(false);
        let out = exec.capture("echo", ["  hello  "]).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn failing_command_reports_command_line() {
        let exec = ProcessExecutor::new(false);
        let err = exec.run("false", Vec::<String>::new()).await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed { ref command, .. } if command == "false"));
    }

    #[tokio::test]
    async fn invalid_utf8_output_does_not_abandon_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let script = format!(
            "printf 'ok\\n\\377\\376\\n'; sleep 1; touch {}",
            marker.display()
        );
        let exec = ProcessExecutor::new(false);
        exec.run("sh", ["-c", script.as_str()]).await.unwrap();
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn stream_lines_decodes_lossily() {
        let input: &[u8] = b"first\n\xff\xfe\nlast";
        assert!(stream_lines(input).await.is_ok());
    }

    #[tokio::test]
    async fn missing_program_is_a_command_failure() {
        let exec = ProcessExecutor::new(true);
        let err = exec
            .capture("ct-definitely-not-installed", ["--version"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }
}
