//! Fast-path orchestrator: the System-1 linear pipeline — ANALYZE -> PLAN ->
//! GENERATE -> CRITIC -> TEST -> HEAL — for tasks the router judged simple
//! enough not to need multi-candidate search.

use std::collections::HashMap;

use crate::adapters::sandbox::SandboxExecutor;
use crate::codecontext::CodeContextAnalyzer;
use crate::error::Result;
use crate::strategy::constitutional::{constitutional_check, has_critical_violation};
use crate::strategy::executors::{GenerateOptions, LlmPort};
use crate::strategy::{ConstitutionalViolationSeverity, WorkflowMetadata, WorkflowResult};

/// Which stage of the pipeline a [`FastPathOutcome`] stopped at; surfaced for
/// telemetry and for the orchestrator's reflection input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPathStage {
    Analyze,
    Plan,
    Generate,
    Critic,
    Test,
    Heal,
}

pub struct FastPathConfig {
    pub max_heal_attempts: u32,
    pub sandbox_timeout_seconds: u64,
}

impl Default for FastPathConfig {
    fn default() -> Self {
        Self { max_heal_attempts: 2, sandbox_timeout_seconds: 30 }
    }
}

pub struct FastPathOrchestrator<'a> {
    llm: &'a dyn LlmPort,
    sandbox: &'a dyn SandboxExecutor,
}

impl<'a> FastPathOrchestrator<'a> {
    pub fn new(llm: &'a dyn LlmPort, sandbox: &'a dyn SandboxExecutor) -> Self {
        Self { llm, sandbox }
    }

    /// Runs the full ANALYZE->PLAN->GENERATE->CRITIC->TEST->HEAL pipeline for
    /// one target file. `description` is the task prompt; `file_path`/`content`
    /// the current file this change targets.
    pub async fn run(
        &self,
        description: &str,
        file_path: &str,
        content: &str,
        language: &str,
        config: &FastPathConfig,
    ) -> Result<WorkflowResult> {
        let analyzer = CodeContextAnalyzer::new();
        let code_ctx = analyzer.analyze(content, file_path, language)?;

        let plan_prompt = format!(
            "Plan a minimal change to {file_path} ({} LOC, complexity {:.2}) that accomplishes: {description}",
            code_ctx.loc, code_ctx.complexity_score
        );
        let plan = self.llm.generate(&plan_prompt, &GenerateOptions::default()).await?;

        let mut generate_prompt = format!(
            "Given this plan:\n{plan}\n\nWrite the full updated contents of {file_path}:\n\n{content}"
        );

        let mut attempt = 0;
        loop {
            let generated = self.llm.generate(&generate_prompt, &GenerateOptions::default()).await?;

            let violations = constitutional_check(&generated);
            if has_critical_violation(&violations) {
                let ids: Vec<String> = violations
                    .iter()
                    .filter(|v| v.severity == ConstitutionalViolationSeverity::Critical)
                    .map(|v| v.rule_id.clone())
                    .collect();
                return Ok(WorkflowResult::failed(format!(
                    "fast-path candidate blocked by constitutional check: {}",
                    ids.join(", ")
                )));
            }

            let mut files = HashMap::new();
            files.insert(file_path.to_string(), generated.clone());
            let sandbox_result = self.sandbox.execute_code(&files, config.sandbox_timeout_seconds).await?;

            if sandbox_result.compile_success && sandbox_result.test_pass_rate >= 1.0 {
                return Ok(WorkflowResult {
                    success: true,
                    final_state: "fast_path_complete".to_string(),
                    changes: vec![generated],
                    test_results: vec![sandbox_result.stdout],
                    total_iterations: attempt + 1,
                    total_time_seconds: 0.0,
                    errors: Vec::new(),
                    metadata: WorkflowMetadata {
                        strategy: None,
                        total_candidates: Some(1),
                        diversity_score: None,
                        max_attempts: Some(config.max_heal_attempts),
                        extra: Default::default(),
                    },
                });
            }

            attempt += 1;
            if attempt > config.max_heal_attempts {
                return Ok(WorkflowResult {
                    success: false,
                    final_state: "fast_path_heal_exhausted".to_string(),
                    changes: vec![generated],
                    test_results: vec![sandbox_result.stdout, sandbox_result.stderr],
                    total_iterations: attempt,
                    total_time_seconds: 0.0,
                    errors: vec![format!(
                        "test_pass_rate {:.2} below 1.0 after {} heal attempt(s)",
                        sandbox_result.test_pass_rate, config.max_heal_attempts
                    )],
                    metadata: WorkflowMetadata {
                        strategy: None,
                        total_candidates: Some(1),
                        diversity_score: None,
                        max_attempts: Some(config.max_heal_attempts),
                        extra: Default::default(),
                    },
                });
            }

            // HEAL: feed the failing output back in as additional context for
            // the next GENERATE pass.
            generate_prompt = format!(
                "The previous attempt failed (pass rate {:.2}):\nstdout: {}\nstderr: {}\n\nRevise the updated contents of {file_path} given this plan:\n{plan}\n\n{content}",
                sandbox_result.test_pass_rate, sandbox_result.stdout, sandbox_result.stderr
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sandbox::SandboxResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticLlm;

    #[async_trait]
    impl LlmPort for StaticLlm {
        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String> {
            Ok("def fixed():\n    return 1\n".to_string())
        }
    }

    struct PassingSandbox;

    #[async_trait]
    impl SandboxExecutor for PassingSandbox {
        async fn execute_code(&self, _files: &HashMap<String, String>, _timeout_s: u64) -> Result<SandboxResult> {
            Ok(SandboxResult { compile_success: true, tests_run: 2, tests_passed: 2, test_pass_rate: 1.0, stdout: "ok".into(), stderr: String::new(), exit_code: Some(0) })
        }

        async fn cleanup(&self) -> Result<()> {
            Ok(())
        }
    }

    struct EventuallyPassingSandbox {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SandboxExecutor for EventuallyPassingSandbox {
        async fn execute_code(&self, _files: &HashMap<String, String>, _timeout_s: u64) -> Result<SandboxResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(SandboxResult { compile_success: true, tests_run: 2, tests_passed: 0, test_pass_rate: 0.0, stdout: "fail".into(), stderr: "AssertionError".into(), exit_code: Some(1) })
            } else {
                Ok(SandboxResult { compile_success: true, tests_run: 2, tests_passed: 2, test_pass_rate: 1.0, stdout: "ok".into(), stderr: String::new(), exit_code: Some(0) })
            }
        }

        async fn cleanup(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_pass() {
        let llm = StaticLlm;
        let sandbox = PassingSandbox;
        let orchestrator = FastPathOrchestrator::new(&llm, &sandbox);
        let result = orchestrator
            .run("fix off by one", "f.py", "def foo(): pass\n", "python", &FastPathConfig::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.total_iterations, 1);
    }

    #[tokio::test]
    async fn heals_after_one_failing_attempt() {
        let llm = StaticLlm;
        let sandbox = EventuallyPassingSandbox { calls: AtomicUsize::new(0) };
        let orchestrator = FastPathOrchestrator::new(&llm, &sandbox);
        let result = orchestrator
            .run("fix off by one", "f.py", "def foo(): pass\n", "python", &FastPathConfig::default())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.total_iterations, 2);
    }
}
