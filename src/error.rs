use std::path::PathBuf;
use thiserror::Error;

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure kinds the lifecycle layers need to keep apart. Commands wrap these
/// with anyhow context before they reach the user.
#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("{0}")]
    Validation(String),

    #[error(
        "branch `{branch}` already exists; use a different description or remove the existing branch"
    )]
    BranchExists { branch: String },

    #[error("worktree {} is already used by task `{task_id}`", path.display())]
    WorktreeInUse { path: PathBuf, task_id: String },

    #[error("task `{id}` not found")]
    TaskNotFound { id: String },

    #[error("no task found for worktree {}", path.display())]
    NoTaskForWorktree { path: PathBuf },

    #[error("git {operation} failed: {detail}")]
    Git { operation: String, detail: String },

    #[error("registry file {} cannot be parsed: {detail}", path.display())]
    CorruptRegistry { path: PathBuf, detail: String },

    #[error("{operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "task `{id}` was created but could not be saved: {detail}\n\
         the worktree exists at {} on branch `{branch}` but is untracked; \
         remove it with `git worktree remove --force` or retry once the registry is writable",
        worktree.display()
    )]
    OrphanedWorktree {
        id: String,
        worktree: PathBuf,
        branch: String,
        detail: String,
    },

    #[error("{name} connector is not yet implemented")]
    ConnectorUnsupported { name: String },

    #[error("connector `{name}` is not configured; run `wtask connect {name}` first")]
    ConnectorNotConfigured { name: String },

    #[error("{name}: {detail}")]
    Connector { name: String, detail: String },
}
