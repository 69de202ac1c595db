//! CLI argument definitions for ratefeed.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Poll every feed until interrupted, with daily backups |
//! | `once` | Run a single cycle of one feed and print the batch |
//! | `rates` | Print the latest stored batches of one feed |
//! | `health` | Print per-feed health and the order-book spread |
//! | `backup` | Export the warehouse right now |
//!
//! # Examples
//!
//! ```bash
//! ratefeed run
//! ratefeed once --feed order_book --pretty
//! ratefeed rates --feed portal --limit 5
//! ratefeed health --pretty
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ratefeed_core::FeedId;

/// Exchange-rate poller with resilient scraping and DuckDB storage.
#[derive(Debug, Parser)]
#[command(name = "ratefeed", author, version, about)]
pub struct Cli {
    /// Data directory; overrides RATEFEED_HOME.
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "ratefeed=info,ratefeed_cli=info")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll feeds until Ctrl-C.
    Run(RunArgs),

    /// Run one cycle of a single feed.
    Once(OnceArgs),

    /// Show the latest stored batches of one feed.
    Rates(RatesArgs),

    /// Summarize stored batches per feed and status.
    Health(HealthArgs),

    /// Export the warehouse into the backup directory.
    Backup(BackupArgs),
}

/// Feed selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FeedArg {
    Converter,
    #[value(name = "order_book", alias = "order-book")]
    OrderBook,
    Portal,
}

impl From<FeedArg> for FeedId {
    fn from(value: FeedArg) -> Self {
        match value {
            FeedArg::Converter => Self::Converter,
            FeedArg::OrderBook => Self::OrderBook,
            FeedArg::Portal => Self::Portal,
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Feeds to poll (default: all).
    #[arg(long = "feed", value_enum, value_delimiter = ',')]
    pub feeds: Vec<FeedArg>,

    /// Do not start the periodic backup timer.
    #[arg(long, default_value_t = false)]
    pub no_backup: bool,
}

#[derive(Debug, Args)]
pub struct OnceArgs {
    #[arg(long, value_enum)]
    pub feed: FeedArg,

    /// Persist the batch when the usual rules allow it.
    #[arg(long, default_value_t = false)]
    pub persist: bool,
}

#[derive(Debug, Args)]
pub struct RatesArgs {
    #[arg(long, value_enum)]
    pub feed: FeedArg,

    /// Number of batches to show, newest first.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Number of order-book spread rows to include.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct BackupArgs {
    /// Target directory; defaults to DB_BACKUP_PATH.
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_comma_separated_feeds() {
        let cli = Cli::try_parse_from(["ratefeed", "run", "--feed", "portal,order-book"])
            .expect("parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.feeds, vec![FeedArg::Portal, FeedArg::OrderBook]);
    }

    #[test]
    fn once_requires_a_feed() {
        assert!(Cli::try_parse_from(["ratefeed", "once"]).is_err());
        let cli = Cli::try_parse_from(["ratefeed", "once", "--feed", "order_book", "--persist"])
            .expect("parse");
        let Command::Once(args) = cli.command else {
            panic!("expected once");
        };
        assert_eq!(FeedId::from(args.feed), FeedId::OrderBook);
        assert!(args.persist);
    }

    #[test]
    fn rates_takes_a_feed_and_a_limit() {
        assert!(Cli::try_parse_from(["ratefeed", "rates"]).is_err());
        let cli = Cli::try_parse_from(["ratefeed", "rates", "--feed", "converter", "--limit", "5"])
            .expect("parse");
        let Command::Rates(args) = cli.command else {
            panic!("expected rates");
        };
        assert_eq!(args.feed, FeedArg::Converter);
        assert_eq!(args.limit, 5);

        let cli = Cli::try_parse_from(["ratefeed", "health"]).expect("parse");
        assert!(matches!(cli.command, Command::Health(HealthArgs { limit: 20 })));
    }
}
