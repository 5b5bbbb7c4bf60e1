use crate::error::{Error, Result};
use crate::process::{best_error_line, run_capture};
use std::path::{Path, PathBuf};

/// One record from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct WorktreeInfo {
    pub(crate) path: PathBuf,
    pub(crate) head: Option<String>,
    pub(crate) branch: Option<String>,
    pub(crate) bare: bool,
}

/// The narrow capability surface the lifecycle coordinator needs from the
/// VCS. Implemented by [`GitBackend`] in production and by a fake in tests
/// so the coordinator is exercised without spawning processes.
pub(crate) trait WorktreeBackend {
    /// Canonical repository name, used to namespace worktree directories.
    fn repo_name(&self, repo_path: &Path) -> Result<String>;

    /// Create a new branch and a worktree bound to it in one step. Fails if
    /// the branch already exists or the target path is occupied.
    fn create(&self, repo_path: &Path, worktree_path: &Path, branch: &str) -> Result<()>;

    /// Bind a worktree to a branch that already exists.
    fn create_from_existing_branch(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        branch: &str,
    ) -> Result<()>;

    /// Force-remove a worktree, uncommitted state and all. Managed worktrees
    /// are disposable.
    fn remove(&self, repo_path: &Path, worktree_path: &Path) -> Result<()>;

    /// Non-fatal pre-flight probe.
    fn branch_exists(&self, repo_path: &Path, branch: &str) -> bool;

    /// Delete a local branch. Callers must treat failure as non-fatal; the
    /// branch may already be merged or gone.
    fn delete_branch(&self, repo_path: &Path, branch: &str) -> Result<()>;

    /// Drop stale administrative records left by manual deletions.
    fn prune(&self, repo_path: &Path) -> Result<()>;

    fn list(&self, repo_path: &Path) -> Result<Vec<WorktreeInfo>>;

    /// Detected default branch, falling back to "main".
    fn default_branch(&self, repo_path: &Path) -> String;
}

/// Backend that shells out to the `git` binary.
pub(crate) struct GitBackend;

impl GitBackend {
    fn git(&self, operation: &str, repo_path: &Path, args: &[&str]) -> Result<String> {
        let output = run_capture("git", args, Some(repo_path)).map_err(|err| Error::Git {
            operation: operation.to_string(),
            detail: format!("{err:#}"),
        })?;
        if !output.status.success() {
            return Err(Error::Git {
                operation: operation.to_string(),
                detail: best_error_line(&output.stderr),
            });
        }
        Ok(output.stdout)
    }

    fn path_arg<'p>(&self, operation: &str, path: &'p Path) -> Result<&'p str> {
        path.to_str().ok_or_else(|| Error::Git {
            operation: operation.to_string(),
            detail: format!("path is not valid UTF-8: {}", path.display()),
        })
    }
}

impl WorktreeBackend for GitBackend {
    fn repo_name(&self, repo_path: &Path) -> Result<String> {
        let stdout = self
            .git("rev-parse", repo_path, &["rev-parse", "--show-toplevel"])
            .map_err(|_| Error::Git {
                operation: "rev-parse".to_string(),
                detail: format!("not a git repository: {}", repo_path.display()),
            })?;
        let toplevel = PathBuf::from(stdout.trim());
        toplevel
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| Error::Git {
                operation: "rev-parse".to_string(),
                detail: format!("cannot derive a repository name from {}", toplevel.display()),
            })
    }

    fn create(&self, repo_path: &Path, worktree_path: &Path, branch: &str) -> Result<()> {
        let target = self.path_arg("worktree add", worktree_path)?;
        self.git(
            "worktree add",
            repo_path,
            &["worktree", "add", "-b", branch, target],
        )?;
        Ok(())
    }

    fn create_from_existing_branch(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        branch: &str,
    ) -> Result<()> {
        let target = self.path_arg("worktree add", worktree_path)?;
        self.git("worktree add", repo_path, &["worktree", "add", target, branch])?;
        Ok(())
    }

    fn remove(&self, repo_path: &Path, worktree_path: &Path) -> Result<()> {
        let target = self.path_arg("worktree remove", worktree_path)?;
        self.git(
            "worktree remove",
            repo_path,
            &["worktree", "remove", "--force", target],
        )?;
        Ok(())
    }

    fn branch_exists(&self, repo_path: &Path, branch: &str) -> bool {
        run_capture(
            "git",
            &[
                "show-ref",
                "--verify",
                "--quiet",
                &format!("refs/heads/{branch}"),
            ],
            Some(repo_path),
        )
        .map(|output| output.status.success())
        .unwrap_or(false)
    }

    fn delete_branch(&self, repo_path: &Path, branch: &str) -> Result<()> {
        self.git(
            &format!("branch -D {branch}"),
            repo_path,
            &["branch", "-D", branch],
        )?;
        Ok(())
    }

    fn prune(&self, repo_path: &Path) -> Result<()> {
        self.git("worktree prune", repo_path, &["worktree", "prune"])?;
        Ok(())
    }

    fn list(&self, repo_path: &Path) -> Result<Vec<WorktreeInfo>> {
        let stdout = self.git(
            "worktree list",
            repo_path,
            &["worktree", "list", "--porcelain"],
        )?;
        Ok(parse_worktree_porcelain(&stdout))
    }

    fn default_branch(&self, repo_path: &Path) -> String {
        let probe = run_capture(
            "git",
            &["symbolic-ref", "refs/remotes/origin/HEAD"],
            Some(repo_path),
        );
        match probe {
            Ok(output) if output.status.success() => output
                .stdout
                .trim()
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .unwrap_or(crate::constants::DEFAULT_BRANCH)
                .to_string(),
            _ => crate::constants::DEFAULT_BRANCH.to_string(),
        }
    }
}

/// Parses the blank-line-delimited, tag-prefixed porcelain listing. Unknown
/// tags are ignored for forward compatibility.
pub(crate) fn parse_worktree_porcelain(raw: &str) -> Vec<WorktreeInfo> {
    let mut entries = Vec::new();
    let mut current = WorktreeInfo::default();

    let flush = |entries: &mut Vec<WorktreeInfo>, current: &mut WorktreeInfo| {
        if !current.path.as_os_str().is_empty() {
            entries.push(std::mem::take(current));
        } else {
            *current = WorktreeInfo::default();
        }
    };

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut entries, &mut current);
            continue;
        }
        if let Some(value) = line.strip_prefix("worktree ") {
            flush(&mut entries, &mut current);
            current.path = PathBuf::from(value.trim());
        } else if let Some(value) = line.strip_prefix("HEAD ") {
            current.head = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("branch ") {
            let value = value.trim();
            let short = value.strip_prefix("refs/heads/").unwrap_or(value);
            current.branch = Some(short.to_string());
        } else if line == "bare" {
            current.bare = true;
        }
    }

    flush(&mut entries, &mut current);
    entries
}
