use crate::CLAP_STYLING;
use clap::{arg, command};

fn depth_arg() -> clap::Arg {
    arg!(-d --"depth" <DEPTH>)
        .required(false)
        .help("Maximum letter-expansion depth (overrides crawl.max_depth)")
        .value_parser(clap::value_parser!(usize))
}

fn fresh_arg() -> clap::Arg {
    arg!(--"fresh")
        .required(false)
        .help("Delete the existing crawl state and start over")
        .action(clap::ArgAction::SetTrue)
}

fn top_arg() -> clap::Arg {
    arg!(-n --"top" <COUNT>)
        .required(false)
        .help("Number of opportunities to print")
        .value_parser(clap::value_parser!(usize))
        .default_value("20")
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("nichefinder")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("nichefinder")
        .about("Finds underserved product niches from autocomplete suggestions")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("JSON configuration file (default: built-in vocabulary and settings)"),
        )
        .arg(
            arg!(-s --"state" <PATH>)
                .required(false)
                .global(true)
                .help("Crawl state database")
                .default_value("data/crawl_state.db"),
        )
        .arg(
            arg!(-o --"out" <DIR>)
                .required(false)
                .global(true)
                .help("Directory for seeds.json and analysis.json")
                .default_value("data"),
        )
        .arg(
            arg!(-v --"verbose" "Log every request and node")
                .required(false)
                .global(true)
                .conflicts_with("quiet"),
        )
        .arg(
            arg!(-q --"quiet" "Suppress progress and non-essential output")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            command!("seeds")
                .about("Expand the vocabulary templates into seed queries")
                .arg(
                    arg!(-p --"print")
                        .required(false)
                        .help("Print every seed query to stdout")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("crawl")
                .about(
                    "Harvest autocomplete suggestions for every seed, expanding each with \
                letters a-z. Resumes from the state database.",
                )
                .arg(depth_arg())
                .arg(
                    arg!(--"retry-failed")
                        .required(false)
                        .help("Return permanently failed queries to the frontier first")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(fresh_arg()),
        )
        .subcommand(
            command!("analyze")
                .about("Normalize, categorize and cross-reference crawled suggestions")
                .arg(top_arg()),
        )
        .subcommand(
            command!("full")
                .about("Generate seeds, crawl and analyze in one go")
                .arg(depth_arg())
                .arg(fresh_arg())
                .arg(top_arg()),
        )
}
