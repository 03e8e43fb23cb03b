//! External-system adapters for reason-core.
//!
//! This module provides the concrete adapters that implement the orchestrator's
//! external interface ports:
//!
//! - **VCS**: git branch/commit application (`IVCSApplier`)
//! - **Sandbox**: process-isolated code execution (`ISandboxExecutor`)
//! - **Guardrail**: static policy validation hooks (`IGuardrailValidator`)
//! - **Search index**: chunk full-text/symbol lookup used by retrieval
//! - **Experience**: persisted workflow outcome store used for strategy selection priors
//! - **LLM bridge**: narrows a provider-rich `llm::LLMClient` down to the `LlmPort` contract
//!
//! Each adapter translates the core reason-core functionality into the
//! interface expected by its deployment target.

pub mod experience;
pub mod guardrail;
pub mod llm_bridge;
pub mod sandbox;
pub mod search_index;
pub mod vcs;

// Re-export primary types for convenience
pub use experience::{ExperienceRepository, SqliteExperienceRepository};
pub use guardrail::{GuardrailValidator, StaticGuardrailValidator};
pub use llm_bridge::LlmClientBridge;
pub use sandbox::{SandboxExecutor, SandboxResult, SubprocessSandboxExecutor};
pub use search_index::{ChunkSearchIndex, SearchHit, SqliteChunkSearchIndex};
pub use vcs::{GitVcsApplier, VcsApplier, VcsApplyResult};
