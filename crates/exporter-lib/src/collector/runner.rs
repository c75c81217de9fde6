//! External command execution
//!
//! Every piece of data the exporter reports comes from running a vendor tool
//! (`ibv_devices`, `eadm`) and reading its standard output. This module owns
//! locating those tools and running them under a deadline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Failure to obtain output from an external command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}, stderr: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("failed to collect output of {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// Captured standard error of the failed command, if it produced any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            CommandError::Exit { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}

/// Trait for running external diagnostic programs
///
/// Implementations return the captured standard output of a successful run.
/// Callers decide whether a failure is local to one device or to the scrape.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError>;
}

/// Runs commands as child processes of the exporter
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    search_paths: Vec<PathBuf>,
    timeout: Duration,
}

impl ProcessRunner {
    /// Create a runner that looks for programs in `search_paths` first
    pub fn new(search_paths: Vec<PathBuf>, timeout: Duration) -> Self {
        Self {
            search_paths,
            timeout,
        }
    }

    /// Resolve the program that would be executed for `program`
    pub fn resolve(&self, program: &str) -> PathBuf {
        resolve_program(program, &self.search_paths)
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
        let path = self.resolve(program);
        debug!(program = %program, path = %path.display(), args = ?args, "Running command");

        let child = Command::new(&path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Dropping the wait future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| CommandError::Io {
                program: program.to_string(),
                source,
            })?,
            Err(_) => {
                return Err(CommandError::Timeout {
                    program: program.to_string(),
                    timeout: self.timeout,
                })
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(CommandError::Exit {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }

        if !stderr.is_empty() {
            debug!(program = %program, stderr = %stderr, "Command wrote to stderr");
        }

        Ok(output.stdout)
    }
}

/// Find `program` in `search_paths`, falling back to the bare name
///
/// Names containing a path separator are returned unchanged. The bare-name
/// fallback leaves the lookup to the OS `PATH` search at spawn time.
pub fn resolve_program(program: &str, search_paths: &[PathBuf]) -> PathBuf {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return PathBuf::from(program);
    }

    search_paths
        .iter()
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
        .unwrap_or_else(|| PathBuf::from(program))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn write_executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_resolve_falls_back_to_bare_name() {
        let temp_dir = TempDir::new().unwrap();
        let resolved = resolve_program("eadm", &[temp_dir.path().to_path_buf()]);
        assert_eq!(resolved, PathBuf::from("eadm"));
    }

    #[test]
    fn test_resolve_keeps_explicit_paths() {
        let resolved = resolve_program("/opt/erdma/bin/eadm", &[PathBuf::from("/usr/bin")]);
        assert_eq!(resolved, PathBuf::from("/opt/erdma/bin/eadm"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_prefers_first_search_path_hit() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_executable(second.path(), "ibv_devices");
        let expected = write_executable(first.path(), "ibv_devices");

        let resolved = resolve_program(
            "ibv_devices",
            &[first.path().to_path_buf(), second.path().to_path_buf()],
        );
        assert_eq!(resolved, expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_skips_non_executable_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("eadm"), "not a program").unwrap();

        let resolved = resolve_program("eadm", &[temp_dir.path().to_path_buf()]);
        assert_eq!(resolved, PathBuf::from("eadm"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = ProcessRunner::new(vec![], Duration::from_secs(5));
        let stdout = runner.run("sh", &["-c", "echo hello"]).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&stdout), "hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_exit_status_and_stderr() {
        let runner = ProcessRunner::new(vec![], Duration::from_secs(5));
        let err = runner
            .run("sh", &["-c", "echo 'no such device' >&2; exit 3"])
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Exit { .. }));
        assert_eq!(err.stderr(), Some("no such device"));
        assert!(err.to_string().contains("no such device"));
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let runner = ProcessRunner::new(vec![], Duration::from_secs(5));
        let err = runner
            .run("definitely-not-an-erdma-tool", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_enforces_timeout() {
        let runner = ProcessRunner::new(vec![], Duration::from_millis(100));
        let err = runner.run("sleep", &["5"]).await.unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
    }
}
