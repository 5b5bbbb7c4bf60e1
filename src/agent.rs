use crate::process::run_stream;
use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

/// Resolves an agent name to an executable path: the alias map first, then a
/// PATH lookup.
pub(crate) fn resolve_agent(name: &str, aliases: &BTreeMap<String, String>) -> Result<PathBuf> {
    if name.trim().is_empty() {
        bail!("no agent specified");
    }

    if let Some(target) = aliases.get(name) {
        return find_executable(target).with_context(|| {
            format!("agent alias `{name}` points to `{target}` which is not found")
        });
    }

    find_executable(name).with_context(|| format!("agent `{name}` not found in PATH"))
}

fn find_executable(name: &str) -> Result<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }
        bail!("`{name}` does not exist");
    }

    let path_var = env::var_os("PATH").context("PATH is not set")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
        .with_context(|| format!("`{name}` is not on PATH"))
}

pub(crate) struct LaunchOptions<'a> {
    pub(crate) agent: &'a str,
    pub(crate) args: &'a [String],
    pub(crate) work_dir: &'a Path,
    pub(crate) task_id: &'a str,
    pub(crate) ticket_key: Option<&'a str>,
    pub(crate) ticket_summary: Option<&'a str>,
    pub(crate) aliases: &'a BTreeMap<String, String>,
}

/// Runs the agent inside the task's worktree with task context in the
/// environment; blocks until the agent exits.
pub(crate) fn launch_agent(opts: &LaunchOptions<'_>) -> Result<()> {
    let agent_path = resolve_agent(opts.agent, opts.aliases)?;

    let mut envs = vec![("WTASK_TASK_ID".to_string(), opts.task_id.to_string())];
    if let Some(key) = opts.ticket_key.filter(|key| !key.is_empty()) {
        envs.push(("WTASK_TICKET_KEY".to_string(), key.to_string()));
    }
    if let Some(summary) = opts.ticket_summary.filter(|summary| !summary.is_empty()) {
        envs.push(("WTASK_TICKET_SUMMARY".to_string(), summary.to_string()));
    }

    let program = agent_path.to_string_lossy().to_string();
    run_stream(&program, opts.args, Some(opts.work_dir), &envs)
        .with_context(|| format!("failed to run agent `{}`", opts.agent))
}

/// Splits a space-separated argument string, respecting single and double
/// quotes.
pub(crate) fn parse_agent_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match quote {
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch == ' ' => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            Some(open) if ch == open => quote = None,
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }
    args
}
