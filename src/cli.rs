use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "wtask",
    version,
    about = "Task-driven git worktree manager with ticket connectors"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Create a new worktree for a task, from a description or a ticket.
    Start {
        /// Free-text task description. Omit when using --ticket.
        #[arg(trailing_var_arg = true)]
        description: Vec<String>,
        /// Create the task from a ticket key (e.g. PROJ-123).
        #[arg(long)]
        ticket: Option<String>,
        /// Connector used to resolve --ticket.
        #[arg(long, short = 'c', default_value = "jira")]
        connector: String,
        /// Launch an agent in the new worktree (e.g. claude, copilot).
        #[arg(long)]
        agent: Option<String>,
        /// Arguments passed to the agent.
        #[arg(long)]
        agent_args: Option<String>,
    },
    /// Launch an agent on an existing task's worktree.
    Agent {
        /// Task id (see `wtask list`).
        id: String,
        /// Agent to launch; falls back to WTASK_AGENT, then default_agent.
        #[arg(long)]
        agent: Option<String>,
        /// Arguments passed to the agent.
        #[arg(long)]
        agent_args: Option<String>,
    },
    /// Show all active tasks and worktrees.
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        json: bool,
    },
    /// Complete a task: remove the worktree and delete the branch.
    Finish {
        /// Task id (see `wtask list`).
        id: String,
    },
    /// Remove a task's worktree but keep the branch.
    #[command(alias = "rm")]
    Remove {
        /// Task id (see `wtask list`).
        id: String,
    },
    /// Print the path to a task's worktree (use with cd $(wtask switch <id>)).
    Switch {
        /// Task id (see `wtask list`).
        id: String,
    },
    /// Show the task bound to the current directory.
    Status,
    /// Configure a ticket connector.
    #[command(subcommand)]
    Connect(ConnectCommands),
    /// List tickets assigned to you from a connected system.
    Sync {
        /// Connector to sync from.
        #[arg(long, short = 'c', default_value = "jira")]
        connector: String,
    },
    /// View or set configuration values.
    Config {
        /// Config key; omit to show all settings.
        key: Option<String>,
        /// New value; omit to print the current one.
        value: Option<String>,
    },
    /// Clean up stale worktree bookkeeping left by manual deletions.
    Prune,
}

#[derive(Debug, Subcommand)]
pub(crate) enum ConnectCommands {
    /// Configure Jira integration.
    Jira {
        /// Jira base URL (e.g. https://yourco.atlassian.net).
        #[arg(long)]
        url: String,
        /// Your Jira email address.
        #[arg(long)]
        email: String,
        /// Jira API token.
        #[arg(long)]
        token: String,
        /// Default Jira project key.
        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Debug)]
pub(crate) struct ParsedStartCommand {
    pub(crate) description: Option<String>,
    pub(crate) ticket: Option<String>,
}

pub(crate) fn parse_start_args(
    description: Vec<String>,
    ticket: Option<String>,
) -> Result<ParsedStartCommand> {
    let description = description.join(" ");
    let description = description.trim();

    match (&ticket, description.is_empty()) {
        (Some(_), false) => bail!("cannot pass a description together with --ticket"),
        (None, true) => bail!("provide a task description or use --ticket <KEY>"),
        _ => {}
    }

    Ok(ParsedStartCommand {
        description: (!description.is_empty()).then(|| description.to_string()),
        ticket,
    })
}
