//! Shell command execution shared by hooks, transforms and tool runners

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a shell command
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

fn shell(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    }

    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

/// Run `command` through the platform shell in `cwd`, optionally feeding
/// `stdin`, and capture its output.
pub async fn run_shell(
    command: &str,
    cwd: &Path,
    stdin: Option<&str>,
    envs: &[(String, String)],
) -> Result<ShellOutput> {
    debug!("Running `{}` in {}", command, cwd.display());

    let mut child = shell(command)
        .current_dir(cwd)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn `{}`", command))?;

    // stdin is written while output is being collected.
    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => {
            let input = input.to_string();
            Some(tokio::spawn(async move {
                let result = pipe.write_all(input.as_bytes()).await;
                drop(pipe);
                result
            }))
        }
        _ => None,
    };

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("Failed to wait for `{}`", command))?;

    if let Some(writer) = writer {
        match writer.await.context("stdin writer panicked")? {
            Ok(()) => {}
            // The command exited without reading its input.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("`{}` closed stdin early", command);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to write stdin of `{}`", command));
            }
        }
    }

    Ok(ShellOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
