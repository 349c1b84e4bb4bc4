use colored::Colorize;
use commands::command_argument_builder;
use nichefinder::handlers::{handle_analyze, handle_crawl, handle_full, handle_seeds};
use std::future::Future;
use std::io;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();

    let Some((name, sub_matches)) = chosen_command.subcommand() else {
        unreachable!("clap should ensure we don't get here");
    };
    init_tracing(sub_matches.get_flag("verbose"), sub_matches.get_flag("quiet"));

    let result = match name {
        "seeds" => handle_seeds(sub_matches),
        "crawl" => interruptible(handle_crawl(sub_matches)).await,
        "analyze" => handle_analyze(sub_matches),
        "full" => interruptible(handle_full(sub_matches)).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

/// Logs go to stderr. `RUST_LOG` wins over the verbosity flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Run a crawling command until it finishes or Ctrl-C arrives. Every
/// completed query is already committed, so dropping the in-flight request
/// loses nothing else.
async fn interruptible<F>(command: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    tokio::select! {
        result = command => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!(
                "\n{} Interrupted. Progress is saved; rerun the same command to resume.",
                "⚠".yellow().bold()
            );
            std::process::exit(130);
        }
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
