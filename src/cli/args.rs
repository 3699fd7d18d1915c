//! Command line argument parsing for the rankwise CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// rankwise - run pluggable multi-round ranking over sharded candidates
#[derive(Parser, Debug, Clone)]
#[command(name = "rankwise")]
#[command(about = "Run multi-round distributed ranking over in-memory shards")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct RankwiseArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl RankwiseArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Rank a corpus with a strategy
    Run(RunArgs),

    /// Validate a strategy file
    Validate(ValidateArgs),

    /// List registered strategies
    Strategies,
}

/// Arguments for a ranking run
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Corpus file (JSON) describing the shards
    #[arg(short, long, value_name = "CORPUS_FILE")]
    pub corpus: PathBuf,

    /// Strategy file (JSON)
    #[arg(short, long, value_name = "STRATEGY_FILE")]
    pub strategy: PathBuf,

    /// Number of hits to return
    #[arg(long, default_value = "10")]
    pub size: usize,

    /// Offset of the first hit
    #[arg(long, default_value = "0")]
    pub from: usize,

    /// Fail the request if any shard fails
    #[arg(long)]
    pub no_partial: bool,

    /// Shard timeout in milliseconds
    #[arg(long, value_name = "MILLIS")]
    pub shard_timeout_ms: Option<u64>,

    /// Maximum shard requests in flight
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Arguments for strategy validation
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Strategy file (JSON)
    #[arg(short, long, value_name = "STRATEGY_FILE")]
    pub strategy: PathBuf,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let args = RankwiseArgs::try_parse_from(["rankwise", "strategies"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = RankwiseArgs::try_parse_from(["rankwise", "-vv", "strategies"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = RankwiseArgs::try_parse_from(["rankwise", "--quiet", "strategies"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args =
            RankwiseArgs::try_parse_from(["rankwise", "--format", "json", "strategies"]).unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_run_args() {
        let args = RankwiseArgs::try_parse_from([
            "rankwise",
            "run",
            "--corpus",
            "corpus.json",
            "--strategy",
            "strategy.json",
            "--size",
            "2",
            "--from",
            "2",
            "--no-partial",
        ])
        .unwrap();

        match args.command {
            Command::Run(run) => {
                assert_eq!(run.corpus, PathBuf::from("corpus.json"));
                assert_eq!(run.size, 2);
                assert_eq!(run.from, 2);
                assert!(run.no_partial);
                assert!(run.shard_timeout_ms.is_none());
            }
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn test_run_requires_corpus() {
        assert!(RankwiseArgs::try_parse_from(["rankwise", "run", "--strategy", "s.json"]).is_err());
    }
}
