mod cli;
mod commands;
mod output;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use commands::ForgetTarget;
use port_selector::allocation::normalize_directory;
use port_selector::{Context, Error as SelectorError};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        if let Some(selector_error) = e.downcast_ref::<SelectorError>() {
            eprintln!("Error: {}", selector_error);
            if let Some(suggestion) = selector_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or_default();

    // ── Commands that need no config ────────────────────────────────
    if let Commands::Completions { shell } = &command {
        let mut cmd = Cli::command();
        let bin_name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
        return Ok(());
    }

    // The log destination lives in the config, so loading logs to stderr
    let bootstrap = bootstrap_subscriber(env_filter(cli.verbose), std::io::stderr);
    let ctx = tracing::subscriber::with_default(bootstrap, || {
        Context::load(cli.config_dir.clone(), cli.verbose)
    })?;
    init_tracing(ctx.verbose, ctx.config.log.as_deref())?;
    tracing::debug!("Using config directory {:?}", ctx.config_dir());

    let directory = resolve_directory(cli.dir.as_deref())?;
    let name = cli.name.as_str();
    let out = output::CliOutput;

    match command {
        Commands::Get => commands::run_get(&ctx, &directory, name, &out),
        Commands::List { json } => commands::run_list(&ctx, &directory, json, &out),
        Commands::Lock { port, force } => {
            commands::run_lock(&ctx, &directory, name, port, force, &out)
        }
        Commands::Unlock { port } => commands::run_unlock(&ctx, &directory, name, port, &out),
        Commands::Forget { all, port } => {
            let target = match (all, port) {
                (true, _) => ForgetTarget::All,
                (false, Some(port)) => ForgetTarget::Port(port),
                (false, None) => ForgetTarget::Name {
                    directory: &directory,
                    name,
                },
            };
            commands::run_forget(&ctx, target, &out)
        }
        Commands::Scan => commands::run_scan(&ctx, &out),
        Commands::Expire => commands::run_expire(&ctx, &out),
        Commands::Completions { .. } => unreachable!("handled before config loading"),
    }
}

/// Absolute, lexically normalized form of `--dir`, or of the current directory.
fn resolve_directory(dir: Option<&Path>) -> anyhow::Result<String> {
    let cwd = std::env::current_dir()?;
    let dir: PathBuf = match dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd,
    };
    Ok(normalize_directory(&dir.to_string_lossy()))
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "warn" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Subscriber used until the config (and with it the log file) is known.
fn bootstrap_subscriber<W>(filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .finish()
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = || env_filter(verbose);

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::sync::Mutex::new(log_file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}
