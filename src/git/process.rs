// src/git/process.rs

use super::{command_line, GitOutput, Oracle};
use crate::error::{GitError, GitResult};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const MAX_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawns the git executable for every query.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
    timeout: Option<Duration>,
}

impl GitCli {
    pub fn new(binary: &str, timeout: Option<Duration>) -> Self {
        GitCli {
            binary: binary.to_string(),
            timeout,
        }
    }
}

impl Oracle for GitCli {
    fn execute(&self, args: &[&str], workdir: &Path) -> GitResult<GitOutput> {
        let command = command_line(&self.binary, args);
        debug!(%command, workdir = %workdir.display(), "running git");

        let mut child = Command::new(&self.binary)
            .arg("-C")
            .arg(workdir)
            .args(args)
            // plumbing queries must not refresh the index behind our back
            .env("GIT_OPTIONAL_LOCKS", "0")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;

        let Some(timeout) = self.timeout else {
            let output = child
                .wait_with_output()
                .map_err(|source| GitError::Spawn { command, source })?;
            return Ok(GitOutput {
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.status.code().unwrap_or(-1),
            });
        };

        // Both pipes are drained concurrently, a blame of a large file fills them quickly.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_timeout(&mut child, timeout, command)?;
        Ok(GitOutput {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
            exit_code: status.code().unwrap_or(-1),
        })
    }
}

/// The part of a running process the timeout loop drives.
trait Reapable {
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;
    fn kill(&mut self) -> io::Result<()>;
    fn wait(&mut self) -> io::Result<ExitStatus>;
}

impl Reapable for Child {
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        Child::try_wait(self)
    }

    fn kill(&mut self) -> io::Result<()> {
        Child::kill(self)
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        Child::wait(self)
    }
}

fn stop(child: &mut impl Reapable) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Poll `child` until it exits.
///
/// Past `timeout`, or once polling itself fails, the child is killed and
/// reaped before the error is returned.
fn wait_with_timeout(
    child: &mut impl Reapable,
    timeout: Duration,
    command: String,
) -> GitResult<ExitStatus> {
    let start = Instant::now();
    let mut interval = Duration::from_millis(1);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if start.elapsed() > timeout => {
                stop(child);
                warn!(%command, "git timed out after {}s", timeout.as_secs());
                return Err(GitError::Timeout {
                    command,
                    seconds: timeout.as_secs(),
                });
            }
            Ok(None) => {
                thread::sleep(interval);
                interval = (interval * 2).min(MAX_POLL_INTERVAL);
            }
            Err(source) => {
                stop(child);
                return Err(GitError::Spawn { command, source });
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let cli = GitCli::new("definitely-not-a-git-binary", None);
        let err = cli.execute(&["status"], Path::new(".")).unwrap_err();
        assert!(matches!(err, GitError::Spawn { .. }));
    }

    #[test]
    fn test_nonzero_exit_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let cli = GitCli::new("git", Some(Duration::from_secs(30)));
        // not a repository
        let output = cli.execute(&["rev-parse", "HEAD"], dir.path()).unwrap();
        assert!(!output.success());
        assert!(!output.stderr.is_empty());
    }

    /// `sh -C <file>` runs `file` as a script, so the working directory
    /// argument doubles as the script path.
    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("script.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let slow = script(dir.path(), "exec sleep 5\n");
        let cli = GitCli::new("sh", Some(Duration::from_millis(100)));

        let start = Instant::now();
        let err = cli.execute(&[], &slow).unwrap_err();
        assert!(matches!(err, GitError::Timeout { seconds: 0, .. }), "{err}");
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_fast_command_beats_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let fast = script(dir.path(), "echo done\nexit 3\n");
        let cli = GitCli::new("sh", Some(Duration::from_secs(30)));

        let output = cli.execute(&[], &fast).unwrap();
        assert_eq!(output.text(), "done\n");
        assert_eq!(output.exit_code, 3);
    }

    /// Never exits; polling it fails.
    #[derive(Default)]
    struct BrokenChild {
        killed: bool,
        reaped: bool,
    }

    impl Reapable for BrokenChild {
        fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
            Err(io::Error::other("wait failed"))
        }

        fn kill(&mut self) -> io::Result<()> {
            self.killed = true;
            Ok(())
        }

        fn wait(&mut self) -> io::Result<ExitStatus> {
            self.reaped = true;
            Err(io::Error::other("wait failed"))
        }
    }

    #[test]
    fn test_failed_poll_kills_and_reaps_child() {
        let mut child = BrokenChild::default();
        let err = wait_with_timeout(&mut child, Duration::from_secs(30), "git status".to_string())
            .unwrap_err();
        assert!(matches!(err, GitError::Spawn { .. }));
        assert!(child.killed);
        assert!(child.reaped);
    }

    #[test]
    fn test_captures_stdout_with_and_without_timeout() {
        let dir = tempfile::tempdir().unwrap();
        for timeout in [None, Some(Duration::from_secs(30))] {
            let cli = GitCli::new("git", timeout);
            let output = cli.execute(&["--version"], dir.path()).unwrap();
            assert!(output.success());
            assert!(output.text().starts_with("git version"));
        }
    }
}
