//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, RankwiseArgs};
use crate::error::Result;
use crate::pipeline::SearchResponse;

/// Result of validating a strategy file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub name: String,
    pub window_size: usize,
    pub fields: Vec<String>,
    pub feature_phase: bool,
    pub json_round_trip: bool,
    pub binary_round_trip: bool,
    pub binary_size: usize,
}

/// Registered strategy names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyList {
    pub strategies: Vec<String>,
}

/// Human-readable rendering of a command result.
pub trait HumanOutput {
    fn render_human(&self, verbosity: u8) -> String;
}

impl HumanOutput for SearchResponse {
    fn render_human(&self, verbosity: u8) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Ranked Results:");
        let _ = writeln!(out, "═══════════════");

        if self.hits.is_empty() {
            let _ = writeln!(out, "(no hits)");
        }
        for hit in &self.hits {
            let rank = hit.rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string());
            let _ = write!(
                out,
                "#{rank:<3} doc {:<6} shard {:<3} score {:.4}",
                hit.doc_id, hit.shard_index, hit.score
            );
            if verbosity > 1 {
                if let Some(payload) = &hit.feature_payload {
                    let values: Vec<String> = payload.iter().map(|v| v.to_string()).collect();
                    let _ = write!(out, "  features [{}]", values.join(", "));
                }
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Total hits: {}", self.total_hits);
        let _ = writeln!(
            out,
            "Shards: {}/{} successful",
            self.successful_shards, self.total_shards
        );
        for failure in &self.shard_failures {
            let _ = writeln!(out, "  {failure}");
        }
        if verbosity > 1 {
            let _ = writeln!(out, "Request: {}", self.request_id);
        }
        let _ = writeln!(out, "Took: {}ms", self.took_ms);
        out
    }
}

impl HumanOutput for ValidationReport {
    fn render_human(&self, _verbosity: u8) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Strategy: {}", self.name);
        let _ = writeln!(out, "Window size: {}", self.window_size);
        if !self.fields.is_empty() {
            let _ = writeln!(out, "Fields: {}", self.fields.join(", "));
        }
        let _ = writeln!(
            out,
            "Feature phase: {}",
            if self.feature_phase { "yes" } else { "no" }
        );
        let _ = writeln!(out, "JSON round trip: {}", status(self.json_round_trip));
        let _ = writeln!(
            out,
            "Binary round trip: {} ({} bytes)",
            status(self.binary_round_trip),
            self.binary_size
        );
        out
    }
}

impl HumanOutput for StrategyList {
    fn render_human(&self, _verbosity: u8) -> String {
        let mut out = String::new();
        for name in &self.strategies {
            let _ = writeln!(out, "{name}");
        }
        out
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "ok" } else { "MISMATCH" }
}

/// Render a result in the requested format.
pub fn render_result<T>(message: &str, result: &T, args: &RankwiseArgs) -> Result<String>
where
    T: Serialize + HumanOutput,
{
    match args.output_format {
        OutputFormat::Human => {
            let mut out = String::new();
            if args.verbosity() > 0 && !message.is_empty() {
                let _ = writeln!(out, "{message}");
                let _ = writeln!(out);
            }
            out.push_str(&result.render_human(args.verbosity()));
            Ok(out)
        }
        OutputFormat::Json => {
            let json = if args.pretty {
                serde_json::to_string_pretty(result)?
            } else {
                serde_json::to_string(result)?
            };
            Ok(json + "\n")
        }
    }
}

/// Output a result in the requested format.
pub fn output_result<T>(message: &str, result: &T, args: &RankwiseArgs) -> Result<()>
where
    T: Serialize + HumanOutput,
{
    print!("{}", render_result(message, result, args)?);
    Ok(())
}
