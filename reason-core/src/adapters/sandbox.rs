//! Subprocess-isolated sandbox executor (`ISandboxExecutor`): writes a file
//! set to a scratch directory, compiles/runs the project's test command, and
//! reports back compile/test outcomes without touching the caller's tree.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SandboxResult {
    pub compile_success: bool,
    pub tests_run: u32,
    pub tests_passed: u32,
    pub test_pass_rate: f64,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// `ISandboxExecutor`: `execute_code(files, timeout_s) -> SandboxResult`,
/// `cleanup()` for any scratch state the implementation accumulates.
#[async_trait::async_trait]
pub trait SandboxExecutor: Send + Sync {
    async fn execute_code(&self, files: &HashMap<String, String>, timeout_s: u64) -> Result<SandboxResult>;

    async fn cleanup(&self) -> Result<()>;
}

/// Runs `test_command` (e.g. `["pytest", "-q"]`) inside a fresh temp
/// directory populated with `files`, under a hard wall-clock timeout.
pub struct SubprocessSandboxExecutor {
    pub test_command: Vec<String>,
    pub workdir_root: PathBuf,
}

impl SubprocessSandboxExecutor {
    pub fn new(test_command: Vec<String>) -> Self {
        Self { test_command, workdir_root: std::env::temp_dir() }
    }

    fn scratch_dir(&self) -> PathBuf {
        self.workdir_root.join(format!("reason-core-sandbox-{}", uuid::Uuid::new_v4()))
    }

    /// Best-effort pass/fail counting from pytest/cargo-test style output.
    /// Not all test runners print a parseable summary; when none is found
    /// the counts fall back to the binary compile/exit-code signal.
    fn parse_test_counts(stdout: &str, exit_code: Option<i32>) -> (u32, u32) {
        for line in stdout.lines().rev() {
            if let Some(rest) = line.trim().strip_prefix("test result: ") {
                let passed = rest.split(". ").find_map(|part| part.strip_suffix(" passed").and_then(|n| n.trim().parse().ok()));
                let failed: u32 = rest
                    .split(", ")
                    .find_map(|part| part.strip_suffix(" failed").and_then(|n| n.trim().parse().ok()))
                    .unwrap_or(0);
                if let Some(passed) = passed {
                    return (passed + failed, passed);
                }
            }
            if line.contains(" passed") || line.contains(" failed") {
                let passed: u32 = line.split_whitespace().zip(line.split_whitespace().skip(1)).find_map(|(n, w)| (w == "passed" || w == "passed,").then(|| n.parse().ok()).flatten()).unwrap_or(0);
                let failed: u32 = line.split_whitespace().zip(line.split_whitespace().skip(1)).find_map(|(n, w)| (w == "failed" || w == "failed,").then(|| n.parse().ok()).flatten()).unwrap_or(0);
                if passed + failed > 0 {
                    return (passed + failed, passed);
                }
            }
        }
        match exit_code {
            Some(0) => (1, 1),
            Some(_) => (1, 0),
            None => (0, 0),
        }
    }
}

#[async_trait::async_trait]
impl SandboxExecutor for SubprocessSandboxExecutor {
    async fn execute_code(&self, files: &HashMap<String, String>, timeout_s: u64) -> Result<SandboxResult> {
        if files.is_empty() {
            return Err(Error::validation("execute_code requires at least one file"));
        }
        if self.test_command.is_empty() {
            return Err(Error::Config("sandbox executor has no configured test_command".to_string()));
        }

        let scratch = self.scratch_dir();
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|e| Error::execution(format!("failed to create sandbox dir '{}': {e}", scratch.display())))?;

        for (name, content) in files {
            let path = scratch.join(name);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| Error::execution(format!("failed to create '{}': {e}", parent.display())))?;
            }
            let mut f = tokio::fs::File::create(&path).await.map_err(|e| Error::execution(format!("failed to create '{}': {e}", path.display())))?;
            f.write_all(content.as_bytes()).await.map_err(|e| Error::execution(format!("failed to write '{}': {e}", path.display())))?;
        }

        let mut command = Command::new(&self.test_command[0]);
        command.args(&self.test_command[1..]).current_dir(&scratch).kill_on_drop(true);

        let run = timeout(Duration::from_secs(timeout_s), command.output()).await;

        let result = match run {
            Err(_) => {
                let _ = tokio::fs::remove_dir_all(&scratch).await;
                return Err(Error::timeout(timeout_s * 1000));
            }
            Ok(Err(e)) => {
                let _ = tokio::fs::remove_dir_all(&scratch).await;
                return Err(Error::execution(format!("failed to spawn '{}': {e}", self.test_command[0])));
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&result.stdout).to_string();
        let stderr = String::from_utf8_lossy(&result.stderr).to_string();
        let exit_code = result.status.code();
        let compile_success = exit_code.is_some();
        let (tests_run, tests_passed) = Self::parse_test_counts(&stdout, exit_code);
        let test_pass_rate = if tests_run == 0 { 0.0 } else { tests_passed as f64 / tests_run as f64 };

        let _ = tokio::fs::remove_dir_all(&scratch).await;

        Ok(SandboxResult { compile_success, tests_run, tests_passed, test_pass_rate, stdout, stderr, exit_code })
    }

    async fn cleanup(&self) -> Result<()> {
        let prefix = "reason-core-sandbox-";
        let mut entries = tokio::fs::read_dir(&self.workdir_root)
            .await
            .map_err(|e| Error::execution(format!("failed to read '{}': {e}", self.workdir_root.display())))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::execution(e.to_string()))? {
            if entry.file_name().to_string_lossy().starts_with(prefix) {
                let _ = tokio::fs::remove_dir_all(entry.path()).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_code_runs_a_trivial_shell_check() {
        let executor = SubprocessSandboxExecutor::new(vec!["true".to_string()]);
        let mut files = HashMap::new();
        files.insert("noop.txt".to_string(), "hi".to_string());
        let result = executor.execute_code(&files, 10).await.unwrap();
        assert!(result.compile_success);
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn execute_code_rejects_empty_file_set() {
        let executor = SubprocessSandboxExecutor::new(vec!["true".to_string()]);
        let err = executor.execute_code(&HashMap::new(), 10).await.unwrap_err();
        assert_eq!(err.status_code(), 422);
    }

    #[tokio::test]
    async fn execute_code_times_out_on_a_slow_command() {
        let executor = SubprocessSandboxExecutor::new(vec!["sleep".to_string(), "5".to_string()]);
        let mut files = HashMap::new();
        files.insert("noop.txt".to_string(), "hi".to_string());
        let err = executor.execute_code(&files, 1).await.unwrap_err();
        assert_eq!(err.status_code(), 504);
    }

    #[test]
    fn parse_test_counts_reads_cargo_style_summary() {
        let stdout = "running 3 tests\n...\ntest result: FAILED. 2 passed; 1 failed; 0 ignored\n";
        let (run, passed) = SubprocessSandboxExecutor::parse_test_counts(stdout, Some(101));
        assert_eq!(run, 3);
        assert_eq!(passed, 2);
    }
}
