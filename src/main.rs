mod agent;
mod branch;
mod cli;
mod commands;
mod connector;
mod constants;
mod error;
mod jira;
mod process;
mod registry;
mod task;
mod worktree;


use anyhow::Result;
use clap::Parser;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    let registry = registry::Registry::load()?;
    commands::run(cli.command, &registry)
}
