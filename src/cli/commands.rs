//! Command implementations for the rankwise CLI.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::cli::args::*;
use crate::cli::output::{StrategyList, ValidationReport, output_result};
use crate::error::{RankError, Result};
use crate::feature_phase::NumericTextScorer;
use crate::pipeline::{
    PipelineConfig, PipelineOrchestrator, PipelineRequest, RankedHitsFetch, SearchResponse,
};
use crate::shard::{CorpusDefinition, LocalTransport, ShardService};
use crate::strategy::{StrategyConfig, StrategyRegistry, StrategyServices};

/// Inference id under which the CLI registers its numeric text scorer.
pub const NUMERIC_TEXT_SCORER: &str = "numeric_text";

/// Execute a CLI command.
pub fn execute_command(args: RankwiseArgs) -> Result<()> {
    match &args.command {
        Command::Run(run_args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            let response = runtime.block_on(run_pipeline(run_args))?;
            output_result("Ranking completed", &response, &args)
        }
        Command::Validate(validate_args) => {
            let report = validate_strategy(validate_args)?;
            output_result("Strategy is valid", &report, &args)
        }
        Command::Strategies => {
            let list = StrategyList {
                strategies: StrategyRegistry::with_defaults().names(),
            };
            output_result("Registered strategies", &list, &args)
        }
    }
}

/// Services available to strategies parsed by the CLI.
pub fn default_services() -> StrategyServices {
    StrategyServices::new().with_scorer(NUMERIC_TEXT_SCORER, Arc::new(NumericTextScorer))
}

/// Load a corpus and a strategy from disk and rank the corpus.
pub async fn run_pipeline(args: &RunArgs) -> Result<SearchResponse> {
    let corpus = CorpusDefinition::load(&args.corpus)?;
    let shards: Vec<Arc<ShardService>> = corpus
        .into_shards()
        .into_iter()
        .enumerate()
        .map(|(index, shard)| Arc::new(ShardService::new(index, Arc::new(shard))))
        .collect();
    info!(
        "Loaded {} shards from {}",
        shards.len(),
        args.corpus.display()
    );

    let strategy_bytes = fs::read(&args.strategy)?;
    let strategy = StrategyRegistry::with_defaults().parse(&strategy_bytes, &default_services())?;
    debug!("Using strategy {strategy:?}");

    let mut config = PipelineConfig::default().with_allow_partial_results(!args.no_partial);
    if let Some(millis) = args.shard_timeout_ms {
        config = config.with_shard_timeout(Duration::from_millis(millis));
    }
    if let Some(concurrency) = args.concurrency {
        config = config.with_max_concurrent_shard_requests(concurrency);
    }

    let orchestrator = PipelineOrchestrator::new(config, Arc::new(LocalTransport::new(shards)));
    let request = PipelineRequest::new(strategy, args.size).with_from(args.from);
    orchestrator.execute(request, &RankedHitsFetch).await
}

/// Parse a strategy file, build it, and check both wire forms round trip.
pub fn validate_strategy(args: &ValidateArgs) -> Result<ValidationReport> {
    let bytes = fs::read(&args.strategy)?;
    let config = StrategyConfig::from_json(&bytes)?;
    let strategy = StrategyRegistry::with_defaults().build(config.clone(), &default_services())?;

    let json_round_trip = StrategyConfig::from_json(config.to_json()?.as_bytes())? == config;
    let binary = config.to_bytes()?;
    let binary_round_trip = StrategyConfig::from_bytes(&binary)? == config;
    if !json_round_trip || !binary_round_trip {
        return Err(RankError::validation(format!(
            "strategy [{}] does not round trip",
            config.name
        )));
    }

    Ok(ValidationReport {
        name: config.name.clone(),
        window_size: strategy.window_size(),
        fields: config.fields.clone(),
        feature_phase: strategy.has_feature_phase(),
        json_round_trip,
        binary_round_trip,
        binary_size: binary.len(),
    })
}
