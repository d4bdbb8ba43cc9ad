//! Shell command execution for workers.

use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Output from running a command to completion.
#[derive(Debug, Default)]
pub struct ScriptOutput {
    /// Exit code. `-1` if the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Build a platform shell invocation of `command`.
#[must_use]
pub fn shell_command(command: &str, cwd: &Path) -> Command {
    let (shell, shell_arg) = if cfg!(windows) {
        ("cmd.exe", "/C")
    } else {
        ("sh", "-c")
    };

    let mut cmd = Command::new(shell);
    cmd.arg(shell_arg).arg(command).current_dir(cwd);
    cmd
}

/// Run `command` with `input` on stdin and capture both output streams.
pub async fn run_script(command: &str, cwd: &Path, input: &[u8]) -> io::Result<ScriptOutput> {
    let mut child = shell_command(command, cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    // Feed stdin concurrently with draining the pipes so large files cannot deadlock.
    let stdin = child.stdin.take();
    let feed = async move {
        if let Some(mut stdin) = stdin {
            match stdin.write_all(input).await {
                // The command may exit without reading its input.
                Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                _ => {}
            }
            drop(stdin);
        }
        Ok(())
    };

    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    fed?;
    let output = output?;

    Ok(ScriptOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Call `on_line` for every line of `reader` until EOF or a read error.
pub async fn forward_lines<R, F>(reader: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => on_line(&line),
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "stopped reading worker output");
                break;
            }
        }
    }
}
