//! Git CLI wrapper, used for the handful of operations gix does not expose
//! as a library (push, fast-forward pull, rebase, stash) — the same
//! division of labor the teacher's own `operations::auth` module documents
//! for `push`/`stash`, generalized to the rest of this adapter's CLI-backed
//! operations.

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;

use super::error::{GitError, GitResult};

#[derive(Debug, Clone)]
pub struct GitCommandOpts {
    pub work_dir: std::path::PathBuf,
    pub timeout_secs: u64,
}

impl GitCommandOpts {
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self {
            work_dir: work_dir.as_ref().to_path_buf(),
            timeout_secs: 60,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Run a single `git` invocation with a bounded timeout. The sole place
/// this crate shells out to the `git` binary; every CLI-backed adapter
/// operation routes through here so timeout handling and credential-prompt
/// suppression only need to be gotten right once.
pub async fn run_git_command(args: &[&str], opts: GitCommandOpts) -> GitResult<Output> {
    let timeout_duration = Duration::from_secs(opts.timeout_secs);

    let mut cmd = TokioCommand::new("git");
    cmd.current_dir(&opts.work_dir);
    cmd.args(args);

    // Prevent credential prompts from hanging in automation.
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    // Force English output for locale-independent parsing.
    cmd.env("LC_ALL", "C");
    cmd.env("LANG", "C");

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(GitError::Io)?;

    let status = tokio::select! {
        result = child.wait() => result.map_err(GitError::Io)?,
        () = tokio::time::sleep(timeout_duration) => {
            let _ = child.kill().await;
            return Err(GitError::Timeout(format!(
                "git {} timed out after {}s", args.join(" "), opts.timeout_secs
            )));
        }
    };

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_end(&mut stdout).await;
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_end(&mut stderr).await;
    }

    Ok(Output { status, stdout, stderr })
}

pub fn stdout_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn stderr_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
