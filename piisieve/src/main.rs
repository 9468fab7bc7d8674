// piisieve/src/main.rs
//! piisieve entry point.
//!
//! Loads `.env`, parses arguments, initializes logging and dispatches to the
//! selected subcommand.

use clap::Parser;

use piisieve::cli::{Cli, Commands};
use piisieve::commands::{metrics, reprocess, rules, run};
use piisieve::logger;
use piisieve::ui::output::error_msg;
use piisieve::ui::theme::default_theme_map;

#[tokio::main]
async fn main() {
    // A missing .env file is the common case.
    let _ = dotenvy::dotenv();
    let args = Cli::parse();
    logger::init_logger(logger::level_from_flags(args.quiet, args.debug));

    let theme = default_theme_map();
    let result = match args.command {
        Commands::Run(cmd) => run::run_command(cmd, &theme).await,
        Commands::Rules(cmd) => rules::rules_command(cmd, &theme).await,
        Commands::Metrics(cmd) => metrics::metrics_command(cmd, &theme),
        Commands::Reprocess(cmd) => reprocess::reprocess_command(cmd, &theme),
    };

    if let Err(e) = result {
        error_msg(format!("{:#}", e), &theme);
        std::process::exit(1);
    }
}
