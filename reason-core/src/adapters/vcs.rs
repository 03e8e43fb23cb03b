//! Git-backed VCS applier (`IVCSApplier`): `apply_changes` stages and
//! commits a set of file changes onto a branch; `reset_hard` is the rollback
//! primitive the TDD cycle controller calls on verification failure.

use std::path::{Path, PathBuf};

use git2::{Repository, Signature};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One file write as part of a commit. `content = None` deletes the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcsChange {
    pub path: PathBuf,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcsApplyResult {
    pub commit_sha: String,
}

/// `IVCSApplier`: `apply_changes(repo_path, changes, branch_name) -> {commit_sha}`
/// plus the external rollback shell, `git reset --hard HEAD[~1]`.
pub trait VcsApplier: Send + Sync {
    fn apply_changes(&self, repo_path: &Path, changes: &[VcsChange], branch_name: &str) -> Result<VcsApplyResult>;

    /// `target`: `"HEAD"` (discard uncommitted changes) or `"HEAD~1"`
    /// (undo the most recent commit). Both are the only targets the TDD
    /// controller ever needs.
    fn reset_hard(&self, repo_path: &Path, target: &str) -> Result<()>;
}

pub struct GitVcsApplier {
    pub author_name: String,
    pub author_email: String,
}

impl Default for GitVcsApplier {
    fn default() -> Self {
        Self {
            author_name: "reason-core".to_string(),
            author_email: "reason-core@local".to_string(),
        }
    }
}

impl GitVcsApplier {
    pub fn new(author_name: impl Into<String>, author_email: impl Into<String>) -> Self {
        Self { author_name: author_name.into(), author_email: author_email.into() }
    }
}

fn map_git(e: git2::Error) -> Error {
    Error::execution(format!("git operation failed: {e}"))
}

impl VcsApplier for GitVcsApplier {
    fn apply_changes(&self, repo_path: &Path, changes: &[VcsChange], branch_name: &str) -> Result<VcsApplyResult> {
        if changes.is_empty() {
            return Err(Error::validation("apply_changes requires at least one change"));
        }

        let repo = Repository::open(repo_path).map_err(map_git)?;

        // Ensure (and check out) the target branch before writing files.
        let head_commit = repo.head().and_then(|h| h.peel_to_commit()).map_err(map_git)?;
        if repo.find_branch(branch_name, git2::BranchType::Local).is_err() {
            repo.branch(branch_name, &head_commit, false).map_err(map_git)?;
        }
        let branch_ref = format!("refs/heads/{branch_name}");
        repo.set_head(&branch_ref).map_err(map_git)?;
        repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force())).map_err(map_git)?;

        for change in changes {
            let abs_path = repo_path.join(&change.path);
            match &change.content {
                Some(content) => {
                    if let Some(parent) = abs_path.parent() {
                        std::fs::create_dir_all(parent).map_err(|e| Error::execution(format!("failed to create '{}': {e}", parent.display())))?;
                    }
                    std::fs::write(&abs_path, content).map_err(|e| Error::execution(format!("failed to write '{}': {e}", abs_path.display())))?;
                }
                None => {
                    let _ = std::fs::remove_file(&abs_path);
                }
            }
        }

        let mut index = repo.index().map_err(map_git)?;
        for change in changes {
            match &change.content {
                Some(_) => index.add_path(&change.path).map_err(map_git)?,
                None => {
                    let _ = index.remove_path(&change.path);
                }
            }
        }
        index.write().map_err(map_git)?;
        let tree_oid = index.write_tree().map_err(map_git)?;
        let tree = repo.find_tree(tree_oid).map_err(map_git)?;

        let signature = Signature::now(&self.author_name, &self.author_email).map_err(map_git)?;
        let parent_commit = repo.head().and_then(|h| h.peel_to_commit()).map_err(map_git)?;

        let message = format!("reason-core: apply {} change(s)", changes.len());
        let commit_oid = repo
            .commit(Some("HEAD"), &signature, &signature, &message, &tree, &[&parent_commit])
            .map_err(map_git)?;

        Ok(VcsApplyResult { commit_sha: commit_oid.to_string() })
    }

    fn reset_hard(&self, repo_path: &Path, target: &str) -> Result<()> {
        let repo = Repository::open(repo_path).map_err(map_git)?;
        let object = repo.revparse_single(target).map_err(map_git)?;
        repo.reset(&object, git2::ResetType::Hard, None).map_err(map_git)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("README.md"), "seed").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        let sig = Signature::now("test", "test@local").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "seed", &tree, &[]).unwrap();
        repo
    }

    #[test]
    fn apply_changes_creates_a_commit() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());

        let applier = GitVcsApplier::default();
        let changes = vec![VcsChange { path: PathBuf::from("fix.py"), content: Some("x = 1\n".to_string()) }];
        let result = applier.apply_changes(dir.path(), &changes, "fix-branch").unwrap();
        assert_eq!(result.commit_sha.len(), 40);
        assert!(dir.path().join("fix.py").exists());
    }

    #[test]
    fn reset_hard_undoes_the_last_commit() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());

        let applier = GitVcsApplier::default();
        let changes = vec![VcsChange { path: PathBuf::from("fix.py"), content: Some("x = 1\n".to_string()) }];
        applier.apply_changes(dir.path(), &changes, "fix-branch").unwrap();
        assert!(dir.path().join("fix.py").exists());

        applier.reset_hard(dir.path(), "HEAD~1").unwrap();
        assert!(!dir.path().join("fix.py").exists());
    }

    #[test]
    fn empty_changes_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let applier = GitVcsApplier::default();
        let err = applier.apply_changes(dir.path(), &[], "fix-branch").unwrap_err();
        assert_eq!(err.status_code(), 422);
    }
}
