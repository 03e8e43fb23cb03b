//! Reproduction-first TDD cycle controller: write a test that reproduces
//! the bug (red), generate a fix until that test (and the rest of the
//! suite) passes (green), apply via the VCS adapter, or roll back when
//! every fix attempt is exhausted.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::adapters::sandbox::SandboxExecutor;
use crate::adapters::vcs::{VcsApplier, VcsChange};
use crate::error::{Error, Result};
use crate::strategy::executors::{GenerateOptions, LlmPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TddPhase {
    /// The reproduction test was generated but did not fail against the
    /// unpatched code — the bug report could not be reproduced.
    NotReproduced,
    /// Reproduced (red), but no fix attempt reached green within the budget.
    FixExhausted,
    /// Reached green and the change was applied.
    Green,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TddCycleResult {
    pub phase: TddPhase,
    pub attempts: u32,
    pub reproduction_test: String,
    pub final_fix: Option<String>,
    pub commit_sha: Option<String>,
    pub rolled_back: bool,
}

pub struct TddCycleController<'a> {
    llm: &'a dyn LlmPort,
    sandbox: &'a dyn SandboxExecutor,
    vcs: &'a dyn VcsApplier,
}

impl<'a> TddCycleController<'a> {
    pub fn new(llm: &'a dyn LlmPort, sandbox: &'a dyn SandboxExecutor, vcs: &'a dyn VcsApplier) -> Self {
        Self { llm, sandbox, vcs }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn run_cycle(
        &self,
        repo_path: &Path,
        bug_description: &str,
        target_file: &str,
        current_content: &str,
        test_file_name: &str,
        branch_name: &str,
        max_fix_attempts: u32,
        timeout_s: u64,
    ) -> Result<TddCycleResult> {
        if max_fix_attempts == 0 {
            return Err(Error::validation("max_fix_attempts must be at least 1"));
        }

        let reproduce_prompt = format!(
            "Write a test in {test_file_name} that reproduces this bug in {target_file}:\n{bug_description}\n\nCurrent contents of {target_file}:\n{current_content}"
        );
        let reproduction_test = self.llm.generate(&reproduce_prompt, &GenerateOptions::default()).await?;

        let red_files = self.file_set(target_file, current_content, test_file_name, &reproduction_test);
        let red_result = self.sandbox.execute_code(&red_files, timeout_s).await?;

        if red_result.test_pass_rate >= 1.0 {
            return Ok(TddCycleResult {
                phase: TddPhase::NotReproduced,
                attempts: 0,
                reproduction_test,
                final_fix: None,
                commit_sha: None,
                rolled_back: false,
            });
        }

        let mut fix = current_content.to_string();
        let mut last_stderr = red_result.stderr.clone();
        let mut last_stdout = red_result.stdout.clone();

        for attempt in 1..=max_fix_attempts {
            let fix_prompt = format!(
                "The following test in {test_file_name} is red against {target_file}:\n{reproduction_test}\n\nFailure output:\nstdout: {last_stdout}\nstderr: {last_stderr}\n\nWrite the full corrected contents of {target_file} that makes this test (and the rest of the suite) pass.\n\nCurrent contents:\n{fix}"
            );
            fix = self.llm.generate(&fix_prompt, &GenerateOptions::default()).await?;

            let candidate_files = self.file_set(target_file, &fix, test_file_name, &reproduction_test);
            let green_result = self.sandbox.execute_code(&candidate_files, timeout_s).await?;

            if green_result.compile_success && green_result.test_pass_rate >= 1.0 {
                let changes = vec![
                    VcsChange { path: target_file.into(), content: Some(fix.clone()) },
                    VcsChange { path: test_file_name.into(), content: Some(reproduction_test.clone()) },
                ];
                let apply_result = self.vcs.apply_changes(repo_path, &changes, branch_name)?;
                return Ok(TddCycleResult {
                    phase: TddPhase::Green,
                    attempts: attempt,
                    reproduction_test,
                    final_fix: Some(fix),
                    commit_sha: Some(apply_result.commit_sha),
                    rolled_back: false,
                });
            }

            last_stdout = green_result.stdout;
            last_stderr = green_result.stderr;
        }

        let rolled_back = self.vcs.reset_hard(repo_path, "HEAD").is_ok();
        Ok(TddCycleResult {
            phase: TddPhase::FixExhausted,
            attempts: max_fix_attempts,
            reproduction_test,
            final_fix: Some(fix),
            commit_sha: None,
            rolled_back,
        })
    }

    fn file_set(&self, target_file: &str, target_content: &str, test_file: &str, test_content: &str) -> HashMap<String, String> {
        let mut files = HashMap::new();
        files.insert(target_file.to_string(), target_content.to_string());
        files.insert(test_file.to_string(), test_content.to_string());
        files
    }
}
