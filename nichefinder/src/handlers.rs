use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use nichefinder_core::analysis::{self, AnalysisOutput};
use nichefinder_core::config::NicheConfig;
use nichefinder_core::crawl::{CrawlEvent, CrawlScheduler, CrawlSummary, ProgressCallback};
use nichefinder_core::data::Database;
use nichefinder_core::gaps::Opportunity;
use nichefinder_core::seeds::generate_seeds;
use nichefinder_core::state::CrawlState;
use nichefinder_scanner::SuggestionClient;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const SEEDS_FILE: &str = "seeds.json";
pub const ANALYSIS_FILE: &str = "analysis.json";

// Helper functions shared by the handlers

/// Expand a leading `~` in a command-line path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Load the configuration file if one was given, otherwise the defaults.
/// Either way it is validated before anything touches the network.
pub fn load_config(path: Option<&Path>) -> Result<NicheConfig> {
    match path {
        Some(path) => NicheConfig::from_file(path)
            .with_context(|| format!("Invalid configuration in {}", path.display())),
        None => {
            let config = NicheConfig::default();
            config.validate().context("Invalid built-in configuration")?;
            Ok(config)
        }
    }
}

/// Pretty-print `value` as JSON to `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn format_opportunity(rank: usize, opportunity: &Opportunity) -> String {
    format!(
        "{:>3}. {} x {}  [{} x {}]  score {} (row {}, column {}, count {})",
        rank,
        opportunity.row,
        opportunity.column,
        opportunity.row_axis,
        opportunity.column_axis,
        opportunity.score,
        opportunity.row_demand,
        opportunity.column_demand,
        opportunity.count
    )
}

pub fn describe_event(event: &CrawlEvent) -> String {
    match event {
        CrawlEvent::Fetching {
            query,
            depth,
            attempt,
            pending,
        } => {
            if *attempt > 1 {
                format!("[d{}] {} (attempt {}, {} queued)", depth, query, attempt, pending)
            } else {
                format!("[d{}] {} ({} queued)", depth, query, pending)
            }
        }
        CrawlEvent::Retrying {
            query,
            delay,
            reason,
            ..
        } => format!("{} failed ({}), retrying in {:.1?}", query, reason, delay),
        CrawlEvent::Completed {
            query,
            suggestions,
            enqueued,
        } => format!("{}: {} suggestions, {} new queries", query, suggestions, enqueued),
        CrawlEvent::Failed {
            query,
            attempts,
            reason,
        } => format!("{} failed after {} attempt(s): {}", query, attempts, reason),
    }
}

/// A boolean flag that only some subcommands define
fn flag(args: &ArgMatches, name: &str) -> bool {
    args.try_get_one::<bool>(name)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

struct GlobalArgs {
    config: Option<PathBuf>,
    state: PathBuf,
    out: PathBuf,
    quiet: bool,
}

impl GlobalArgs {
    fn from_matches(args: &ArgMatches) -> Self {
        let path = |name: &str| args.get_one::<String>(name).map(|raw| expand_path(raw));
        Self {
            config: path("config"),
            state: path("state").unwrap_or_else(|| PathBuf::from("data/crawl_state.db")),
            out: path("out").unwrap_or_else(|| PathBuf::from("data")),
            quiet: args.get_flag("quiet"),
        }
    }
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_summary(summary: &CrawlSummary) {
    let headline = if summary.aborted {
        format!("{} Crawl aborted after repeated failures; rerun to resume", "⚠".yellow().bold())
    } else {
        format!("{} Crawl complete", "✓".green().bold())
    };
    println!("{}", headline);
    println!("  {} {}", "Seeds:".bright_white(), summary.seeds);
    println!("  {} {}", "Queries completed:".bright_white(), summary.completed);
    println!("  {} {}", "Requests:".bright_white(), summary.requests);
    println!("  {} {}", "Retries:".bright_white(), summary.retries);
    println!("  {} {}", "Still pending:".bright_white(), summary.pending_remaining);

    if summary.failures.is_empty() {
        println!("  {} 0", "Failed:".bright_white());
    } else {
        println!("  {} {}", "Failed:".bright_white(), summary.failed().to_string().red());
        for failure in summary.failures.iter().take(10) {
            println!("    {} {} ({})", "✗".red(), failure.query, failure.reason);
        }
        if summary.failures.len() > 10 {
            println!("    ... and {} more", summary.failures.len() - 10);
        }
    }
}

fn print_opportunities(output: &AnalysisOutput, top: usize) {
    println!(
        "{} {} suggestions, {} opportunities, {} modifier gaps, {} cross-type opportunities",
        "✓".green().bold(),
        output.suggestions.len(),
        output.opportunities.len(),
        output.modifier_gaps.len(),
        output.cross_type_opportunities.len()
    );
    if output.opportunities.is_empty() {
        return;
    }
    println!();
    println!("{}", "Top opportunities".bright_white().bold());
    for (i, opportunity) in output.opportunities.iter().take(top).enumerate() {
        println!("{}", format_opportunity(i + 1, opportunity));
    }
}

// Subcommand handlers

pub fn handle_seeds(args: &ArgMatches) -> Result<()> {
    let globals = GlobalArgs::from_matches(args);
    let config = load_config(globals.config.as_deref())?;

    let seeds = generate_seeds(&config.vocabulary)?;
    let seeds_path = globals.out.join(SEEDS_FILE);
    write_json(&seeds_path, &seeds)?;

    if flag(args, "print") {
        for seed in &seeds {
            println!("{}", seed);
        }
    }
    if !globals.quiet {
        println!(
            "{} {} seed queries written to {}",
            "✓".green().bold(),
            seeds.len(),
            seeds_path.display()
        );
    }
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let globals = GlobalArgs::from_matches(args);
    let mut config = load_config(globals.config.as_deref())?;
    if let Some(depth) = args.get_one::<usize>("depth") {
        config.crawl.max_depth = *depth;
    }
    let fresh = flag(args, "fresh");
    let retry_failed = flag(args, "retry-failed");

    let seeds = generate_seeds(&config.vocabulary)?;
    let client = SuggestionClient::new(&config.client).context("Failed to build HTTP client")?;

    if fresh && Database::exists(&globals.state) {
        Database::remove(&globals.state)
            .with_context(|| format!("Failed to remove {}", globals.state.display()))?;
    }
    let mut state = CrawlState::open(&globals.state)
        .with_context(|| format!("Failed to open crawl state {}", globals.state.display()))?;
    if retry_failed {
        let reset = state.reset_failed()?;
        if !globals.quiet {
            println!("{} {} failed queries returned to the frontier", "→".blue(), reset);
        }
    }

    if !globals.quiet {
        println!(
            "{} Crawling {} seeds to depth {} ({} already done, {} pending)",
            "→".blue(),
            seeds.len(),
            config.crawl.max_depth,
            state.completed_count(),
            state.pending_len()
        );
        println!("{} State: {}", "→".blue(), globals.state.display());
    }

    let spinner = spinner(globals.quiet);
    let bar = spinner.clone();
    let progress_callback: ProgressCallback = Arc::new(move |event: &CrawlEvent| {
        match event {
            CrawlEvent::Failed { .. } => bar.println(format!("{} {}", "✗".red(), describe_event(event))),
            _ => bar.set_message(describe_event(event)),
        }
    });

    let mut scheduler =
        CrawlScheduler::new(client, state, config.crawl.clone()).with_progress_callback(progress_callback);
    let result = scheduler.run(&seeds).await;
    spinner.finish_and_clear();

    let summary = result.context("Crawl stopped; committed progress is saved")?;
    if !globals.quiet {
        print_summary(&summary);
    }
    Ok(())
}

pub fn handle_analyze(args: &ArgMatches) -> Result<()> {
    let globals = GlobalArgs::from_matches(args);
    let config = load_config(globals.config.as_deref())?;
    let top = args.get_one::<usize>("top").copied().unwrap_or(20);

    if !Database::exists(&globals.state) {
        bail!(
            "No crawl state at {}; run `nichefinder crawl` first",
            globals.state.display()
        );
    }
    let db = Database::open_read_only(&globals.state)
        .with_context(|| format!("Failed to open crawl state {}", globals.state.display()))?;

    let output = analysis::analyze_database(&db, &config)?;
    let analysis_path = globals.out.join(ANALYSIS_FILE);
    write_json(&analysis_path, &output)?;

    if !globals.quiet {
        print_opportunities(&output, top);
        println!();
        println!("{} Analysis written to {}", "✓".green().bold(), analysis_path.display());
    }
    Ok(())
}

pub async fn handle_full(args: &ArgMatches) -> Result<()> {
    handle_seeds(args)?;
    handle_crawl(args).await?;
    handle_analyze(args)
}
