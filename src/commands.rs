use crate::agent::{LaunchOptions, launch_agent, parse_agent_args, resolve_agent};
use crate::cli::{Commands, ConnectCommands, parse_start_args};
use crate::connector::{Connector, build_connectors};
use crate::constants::{
    AGENT_ENV_VAR, LIST_DESCRIPTION_MAX_CHARS, SYNC_SUMMARY_MAX_CHARS, TRUNCATE_ELLIPSIS_CHARS,
};
use crate::error::Error;
use crate::jira::JiraClient;
use crate::registry::{ConnectorConfig, Registry, Task};
use crate::task::{StartOptions, TaskManager};
use crate::worktree::{GitBackend, WorktreeBackend};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::env;
use std::path::PathBuf;

pub(crate) fn run(command: Commands, registry: &Registry) -> Result<()> {
    match command {
        Commands::Start {
            description,
            ticket,
            connector,
            agent,
            agent_args,
        } => {
            let parsed = parse_start_args(description, ticket)?;
            cmd_start(
                registry,
                parsed,
                &connector,
                agent.as_deref(),
                agent_args.as_deref(),
            )
        }
        Commands::Agent {
            id,
            agent,
            agent_args,
        } => cmd_agent(registry, &id, agent.as_deref(), agent_args.as_deref()),
        Commands::List { json } => cmd_list(registry, json),
        Commands::Finish { id } => cmd_finish(registry, &id),
        Commands::Remove { id } => cmd_remove(registry, &id),
        Commands::Switch { id } => cmd_switch(registry, &id),
        Commands::Status => cmd_status(registry),
        Commands::Connect(connect) => cmd_connect(registry, connect),
        Commands::Sync { connector } => cmd_sync(registry, &connector),
        Commands::Config { key, value } => cmd_config(registry, key.as_deref(), value.as_deref()),
        Commands::Prune => cmd_prune(registry),
    }
}

fn cmd_start(
    registry: &Registry,
    parsed: crate::cli::ParsedStartCommand,
    connector_name: &str,
    agent_flag: Option<&str>,
    agent_args: Option<&str>,
) -> Result<()> {
    let repo_path = repo_path_from_cwd()?;
    let backend = GitBackend;
    let manager = TaskManager::new(registry, &backend);

    let mut opts = StartOptions {
        repo_path,
        ..StartOptions::default()
    };

    if let Some(key) = parsed.ticket {
        let connectors = build_connectors(registry);
        let connector = connectors.get(connector_name).ok_or_else(|| {
            Error::ConnectorNotConfigured {
                name: connector_name.to_string(),
            }
        })?;
        let ticket = connector
            .get_ticket(&key)
            .with_context(|| format!("failed to fetch ticket {key}"))?;
        println!("{connector_name}: {} - {}", ticket.key, ticket.summary);
        opts.description = ticket.summary.clone();
        opts.connector = Some(connector_name.to_string());
        opts.ticket_key = Some(ticket.key);
        opts.ticket_title = Some(ticket.summary);
    } else {
        opts.description = parsed
            .description
            .context("provide a task description or use --ticket <KEY>")?;
    }

    let ticket_summary = opts.ticket_title.clone();
    let task = manager.start(opts)?;

    println!("Task started: {}", task.id);
    println!("   Branch:   {}", task.branch);
    println!("   Worktree: {}", task.worktree.display());

    let Some(agent_name) = select_agent(agent_flag, registry) else {
        println!("\n   cd {}", task.worktree.display());
        return Ok(());
    };

    let aliases = registry.agent_aliases();
    if let Err(err) = resolve_agent(&agent_name, &aliases) {
        eprintln!("warning: agent `{agent_name}` not found: {err:#}");
        println!("\n   cd {}", task.worktree.display());
        return Ok(());
    }

    let args = parse_agent_args(agent_args.unwrap_or_default());
    println!("\nLaunching agent: {agent_name}");
    launch_agent(&LaunchOptions {
        agent: &agent_name,
        args: &args,
        work_dir: &task.worktree,
        task_id: &task.id,
        ticket_key: task.ticket_key.as_deref(),
        ticket_summary: ticket_summary.as_deref(),
        aliases: &aliases,
    })
}

fn cmd_agent(
    registry: &Registry,
    id: &str,
    agent_flag: Option<&str>,
    agent_args: Option<&str>,
) -> Result<()> {
    let task = registry.find_task(id)?;

    if !task.worktree.exists() {
        bail!(
            "task `{}` is tracked but its worktree {} no longer exists; \
             run `wtask remove {}` to drop the stale record",
            task.id,
            task.worktree.display(),
            task.id
        );
    }

    let agent_name = select_agent(agent_flag, registry).context(
        "no agent specified; use --agent, set WTASK_AGENT, or configure default_agent",
    )?;

    let aliases = registry.agent_aliases();
    resolve_agent(&agent_name, &aliases)?;

    let args = parse_agent_args(agent_args.unwrap_or_default());
    println!("Launching agent `{agent_name}` on task {}", task.id);
    println!("   Worktree: {}", task.worktree.display());

    let summary = if task.description.is_empty() {
        task.ticket_key.clone()
    } else {
        Some(task.description.clone())
    };

    launch_agent(&LaunchOptions {
        agent: &agent_name,
        args: &args,
        work_dir: &task.worktree,
        task_id: &task.id,
        ticket_key: task.ticket_key.as_deref(),
        ticket_summary: summary.as_deref(),
        aliases: &aliases,
    })
}

fn select_agent(flag: Option<&str>, registry: &Registry) -> Option<String> {
    flag.map(str::to_string)
        .or_else(|| {
            env::var(AGENT_ENV_VAR)
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
        .or_else(|| {
            let configured = registry.default_agent();
            (!configured.is_empty()).then_some(configured)
        })
}

#[derive(Debug, Serialize)]
struct JsonTaskRow {
    id: String,
    description: String,
    branch: String,
    worktree: String,
    repo_path: String,
    connector: Option<String>,
    ticket_key: Option<String>,
    created: String,
    worktree_exists: bool,
}

fn cmd_list(registry: &Registry, as_json: bool) -> Result<()> {
    let tasks = registry.tasks();

    if as_json {
        let rows: Vec<JsonTaskRow> = tasks
            .iter()
            .map(|task| JsonTaskRow {
                id: task.id.clone(),
                description: task.description.clone(),
                branch: task.branch.clone(),
                worktree: task.worktree.display().to_string(),
                repo_path: task.repo_path.display().to_string(),
                connector: task.connector.clone(),
                ticket_key: task.ticket_key.clone(),
                created: task.created.to_rfc3339(),
                worktree_exists: task.worktree.exists(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No active tasks.");
        return Ok(());
    }

    println!(
        "{:<12} {:<42} {:<28} {:<12} WORKTREE",
        "ID", "DESCRIPTION", "BRANCH", "TICKET"
    );
    let mut missing: Vec<&Task> = Vec::new();
    for task in &tasks {
        let ticket = task.ticket_key.as_deref().unwrap_or("-");
        let mut worktree = task.worktree.display().to_string();
        if !task.worktree.exists() {
            worktree.push_str(" (missing)");
            missing.push(task);
        }
        println!(
            "{:<12} {:<42} {:<28} {:<12} {}",
            task.id,
            truncate(&task.description, LIST_DESCRIPTION_MAX_CHARS),
            task.branch,
            ticket,
            worktree
        );
    }

    for task in missing {
        eprintln!(
            "warning: task `{}` is tracked but its worktree {} is gone; \
             run `wtask remove {}` to drop the record",
            task.id,
            task.worktree.display(),
            task.id
        );
    }

    Ok(())
}

fn cmd_finish(registry: &Registry, id: &str) -> Result<()> {
    let backend = GitBackend;
    let manager = TaskManager::new(registry, &backend);
    let task = manager.finish(id)?;
    println!("Task finished: {}", task.description);
    println!("   Worktree removed: {}", task.worktree.display());
    println!("   Branch deleted: {}", task.branch);
    Ok(())
}

fn cmd_remove(registry: &Registry, id: &str) -> Result<()> {
    let backend = GitBackend;
    let manager = TaskManager::new(registry, &backend);
    let task = manager.remove(id)?;
    println!("Worktree removed: {}", task.worktree.display());
    println!("   Branch kept: {}", task.branch);
    Ok(())
}

fn cmd_switch(registry: &Registry, id: &str) -> Result<()> {
    let task = registry.find_task(id)?;
    // Bare path so the output composes with cd $(wtask switch <id>).
    print!("{}", task.worktree.display());
    Ok(())
}

fn cmd_status(registry: &Registry) -> Result<()> {
    let cwd = env::current_dir().context("cannot determine current directory")?;
    let task = match registry.find_task_by_worktree(&cwd) {
        Ok(task) => task,
        Err(Error::NoTaskForWorktree { .. }) => {
            println!("Not inside a wtask-managed worktree.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!("Task:      {}", task.id);
    println!("Desc:      {}", task.description);
    println!("Branch:    {}", task.branch);
    println!("Worktree:  {}", task.worktree.display());
    println!("Created:   {}", task.created.format("%Y-%m-%d %H:%M"));
    if let Some(key) = &task.ticket_key {
        let connector = task.connector.as_deref().unwrap_or("unknown");
        println!("Ticket:    {key} ({connector})");
    }
    Ok(())
}

fn cmd_connect(registry: &Registry, connect: ConnectCommands) -> Result<()> {
    match connect {
        ConnectCommands::Jira {
            url,
            email,
            token,
            project,
        } => {
            let client = JiraClient::new(&url, &email, &token);
            println!("Validating Jira credentials...");
            client.validate().context("validation failed")?;

            registry.set_connector(
                "jira",
                ConnectorConfig {
                    url,
                    email,
                    api_token: token,
                    project: project.unwrap_or_default(),
                },
            )?;
            println!("Jira connector configured.");
            Ok(())
        }
    }
}

fn cmd_sync(registry: &Registry, connector_name: &str) -> Result<()> {
    let connectors = build_connectors(registry);
    let Some(connector) = connectors.get(connector_name) else {
        bail!(
            "connector `{connector_name}` not found; available: {}",
            connectors.names().join(", ")
        );
    };

    println!("Syncing from {connector_name}...");
    let tickets = connector.list_assigned()?;
    if tickets.is_empty() {
        println!("No assigned tickets found.");
        return Ok(());
    }

    println!("{:<12} {:<52} STATUS", "KEY", "SUMMARY");
    for ticket in tickets {
        println!(
            "{:<12} {:<52} {}",
            ticket.key,
            truncate(&ticket.summary, SYNC_SUMMARY_MAX_CHARS),
            ticket.status
        );
    }
    Ok(())
}

fn cmd_config(registry: &Registry, key: Option<&str>, value: Option<&str>) -> Result<()> {
    match (key, value) {
        (None, _) => {
            println!("worktrees_base: {}", registry.worktrees_base().display());
            println!("default_branch: {}", registry.default_branch());
            println!("branch_prefix:  {}", registry.branch_prefix());
            let default_agent = registry.default_agent();
            if !default_agent.is_empty() {
                println!("default_agent:  {default_agent}");
            }
            let aliases = registry.agent_aliases();
            if !aliases.is_empty() {
                println!("agent_aliases:");
                for (alias, target) in aliases {
                    println!("  {alias}: {target}");
                }
            }
            let connectors = registry.connector_names();
            if connectors.is_empty() {
                println!("connectors:     (none)");
            } else {
                println!("connectors:     {}", connectors.join(", "));
            }
            Ok(())
        }
        (Some(key), None) => {
            println!("{}", registry.get_value(key)?);
            Ok(())
        }
        (Some(key), Some(value)) => {
            registry.set_value(key, value)?;
            println!("Set {key} = {value}");
            Ok(())
        }
    }
}

fn cmd_prune(registry: &Registry) -> Result<()> {
    let repo_path = repo_path_from_cwd()?;
    let backend = GitBackend;
    backend.prune(&repo_path)?;
    println!("Pruned stale worktree references.");

    // Surviving linked worktrees that no task record claims were created
    // outside the tool (or their records were lost); name them so the user
    // can adopt or remove them.
    let main = repo_path.canonicalize().unwrap_or_else(|_| repo_path.clone());
    for info in backend.list(&repo_path)? {
        let path = info.path.canonicalize().unwrap_or_else(|_| info.path.clone());
        if info.bare || path == main {
            continue;
        }
        if registry.find_task_by_worktree(&info.path).is_err() {
            eprintln!("warning: untracked worktree {}", info.path.display());
        }
    }
    Ok(())
}

pub(crate) fn repo_path_from_cwd() -> Result<PathBuf> {
    let cwd = env::current_dir().context("cannot determine current directory")?;
    let mut dir = cwd.clone();
    loop {
        if dir.join(".git").exists() {
            return Ok(dir);
        }
        if !dir.pop() {
            bail!("not inside a git repository (searched from {})", cwd.display());
        }
    }
}

pub(crate) fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let head = value
        .chars()
        .take(max.saturating_sub(TRUNCATE_ELLIPSIS_CHARS))
        .collect::<String>();
    format!("{head}...")
}
