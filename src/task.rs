use crate::branch::{branch_name, branch_name_from_ticket, sanitize_branch_name};
use crate::constants::{PSEUDO_RANDOM_MIX_A, PSEUDO_RANDOM_MIX_B, TASK_ID_PREFIX};
use crate::error::{Error, Result};
use crate::registry::{Registry, Task};
use crate::worktree::WorktreeBackend;
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
pub(crate) struct StartOptions {
    pub(crate) description: String,
    pub(crate) repo_path: PathBuf,
    pub(crate) connector: Option<String>,
    pub(crate) ticket_key: Option<String>,
    pub(crate) ticket_title: Option<String>,
}

/// Orchestrates start/finish/remove across the three independently-failing
/// resources: git branch/worktree state, the filesystem, and the registry.
pub(crate) struct TaskManager<'a> {
    registry: &'a Registry,
    backend: &'a dyn WorktreeBackend,
}

impl<'a> TaskManager<'a> {
    pub(crate) fn new(registry: &'a Registry, backend: &'a dyn WorktreeBackend) -> Self {
        Self { registry, backend }
    }

    /// Creates branch, worktree, and registry record, in that order. Nothing
    /// is committed before the worktree exists, so failures up to and
    /// including `create` need no rollback. A registry failure after creation
    /// is the one accepted orphan state and is reported as such.
    pub(crate) fn start(&self, opts: StartOptions) -> Result<Task> {
        let slug = sanitize_branch_name(&opts.description);
        if slug.is_empty() {
            return Err(Error::Validation(format!(
                "description `{}` cannot be turned into a branch name",
                opts.description
            )));
        }

        let repo_name = self.backend.repo_name(&opts.repo_path)?;
        let prefix = self.registry.branch_prefix();

        let branch = match opts.ticket_key.as_deref() {
            Some(key) => {
                let title = opts
                    .ticket_title
                    .as_deref()
                    .filter(|title| !title.trim().is_empty())
                    .unwrap_or(&opts.description);
                branch_name_from_ticket(&prefix, key, title)
            }
            None => branch_name(&prefix, &opts.description),
        };

        if self.backend.branch_exists(&opts.repo_path, &branch) {
            return Err(Error::BranchExists { branch });
        }

        let worktree_path = self.registry.worktrees_base().join(&repo_name).join(&slug);
        if let Ok(owner) = self.registry.find_task_by_worktree(&worktree_path) {
            return Err(Error::WorktreeInUse {
                path: worktree_path,
                task_id: owner.id,
            });
        }

        if let Some(parent) = worktree_path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                operation: "failed to create worktree directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }

        self.backend.create(&opts.repo_path, &worktree_path, &branch)?;

        let task = Task {
            id: generate_task_id(),
            description: opts.description,
            worktree: worktree_path,
            branch,
            repo_path: opts.repo_path,
            connector: opts.connector,
            ticket_key: opts.ticket_key,
            created: Utc::now(),
        };

        if let Err(err) = self.registry.add_task(task.clone()) {
            return Err(Error::OrphanedWorktree {
                id: task.id,
                worktree: task.worktree,
                branch: task.branch,
                detail: err.to_string(),
            });
        }

        Ok(task)
    }

    /// Removes the worktree, best-effort deletes the branch, then drops the
    /// record. The record is only dropped once the worktree is gone: a crash
    /// in between leaves a stale record pointing at nothing, which `list`
    /// surfaces, never a dropped record with a live worktree.
    pub(crate) fn finish(&self, id: &str) -> Result<Task> {
        let task = self.registry.find_task(id)?;

        self.backend.remove(&task.repo_path, &task.worktree)?;

        if let Err(err) = self.backend.delete_branch(&task.repo_path, &task.branch) {
            eprintln!("warning: {err}");
        }

        self.registry.remove_task(id)?;
        Ok(task)
    }

    /// Like finish, but the branch is kept for later work.
    pub(crate) fn remove(&self, id: &str) -> Result<Task> {
        let task = self.registry.find_task(id)?;
        self.backend.remove(&task.repo_path, &task.worktree)?;
        self.registry.remove_task(id)?;
        Ok(task)
    }
}

/// Opaque task id: `wt-` plus eight hex characters mixed from the clock and
/// pid. Collisions are rejected by the registry on the off chance.
pub(crate) fn generate_task_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let pid = u64::from(std::process::id());
    let mut value = nanos ^ pid.rotate_left(17) ^ PSEUDO_RANDOM_MIX_A;
    value ^= value >> 33;
    value = value.wrapping_mul(PSEUDO_RANDOM_MIX_B);
    value ^= value >> 29;
    format!("{TASK_ID_PREFIX}-{:08x}", (value & 0xFFFF_FFFF) as u32)
}
