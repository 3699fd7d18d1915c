//! Built-in ranking strategies.

use std::sync::Arc;

use crate::error::{RankError, Result};
use crate::feature_phase::{
    ExternalRerankCoordinator, ExternalScorer, FeatureExtractor, FieldExtractor, FieldSumScorer,
    FieldValueScorer, Pagination, RerankCoordinator, ScoringRerankCoordinator,
};
use crate::strategy::config::StrategyConfig;
use crate::strategy::registry::StrategyServices;
use crate::strategy::traits::RankingStrategy;

pub const TOP_WINDOW: &str = "top_window";
pub const FIELD_SCORE: &str = "field_score";
pub const EXTERNAL_SCORE: &str = "external_score";
pub const FIELD_SUM: &str = "field_sum";

fn single_field(config: &StrategyConfig) -> Result<()> {
    if config.fields.len() != 1 {
        return Err(RankError::validation(format!(
            "strategy [{}] requires exactly one field, got {}",
            config.name,
            config.fields.len()
        )));
    }
    Ok(())
}

/// Query phase only: the merged window is paginated as is.
#[derive(Debug, Clone)]
pub struct TopWindowStrategy {
    config: StrategyConfig,
}

impl TopWindowStrategy {
    pub fn new(config: StrategyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl RankingStrategy for TopWindowStrategy {
    fn config(&self) -> &StrategyConfig {
        &self.config
    }
}

/// Reranks by the numeric value of one stored field.
#[derive(Debug, Clone)]
pub struct FieldScoreStrategy {
    config: StrategyConfig,
}

impl FieldScoreStrategy {
    pub fn new(config: StrategyConfig) -> Result<Self> {
        config.validate()?;
        single_field(&config)?;
        Ok(Self { config })
    }
}

impl RankingStrategy for FieldScoreStrategy {
    fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn build_feature_extractor(&self) -> Option<Box<dyn FeatureExtractor>> {
        Some(Box::new(FieldExtractor::new(self.config.fields.clone())))
    }

    fn build_rerank_coordinator(
        &self,
        size: usize,
        from: usize,
    ) -> Result<Option<Box<dyn RerankCoordinator>>> {
        Ok(Some(Box::new(ScoringRerankCoordinator::new(
            Pagination::new(size, from, self.window_size()),
            Arc::new(FieldValueScorer),
        ))))
    }
}

/// Reranks through one batched call to a named external scorer.
#[derive(Debug, Clone)]
pub struct ExternalScoreStrategy {
    config: StrategyConfig,
    inference_id: String,
    scorer: Arc<dyn ExternalScorer>,
}

impl ExternalScoreStrategy {
    pub fn new(config: StrategyConfig, services: &StrategyServices) -> Result<Self> {
        config.validate()?;
        single_field(&config)?;
        let inference_id = config.inference_id.clone().ok_or_else(|| {
            RankError::validation(format!("strategy [{}] requires an inference_id", config.name))
        })?;
        let scorer = services.scorer(&inference_id).ok_or_else(|| {
            RankError::validation(format!("no external scorer registered as [{inference_id}]"))
        })?;
        Ok(Self {
            config,
            inference_id,
            scorer,
        })
    }
}

impl RankingStrategy for ExternalScoreStrategy {
    fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn build_feature_extractor(&self) -> Option<Box<dyn FeatureExtractor>> {
        Some(Box::new(FieldExtractor::new(self.config.fields.clone())))
    }

    fn build_rerank_coordinator(
        &self,
        size: usize,
        from: usize,
    ) -> Result<Option<Box<dyn RerankCoordinator>>> {
        Ok(Some(Box::new(ExternalRerankCoordinator::new(
            Pagination::new(size, from, self.window_size()),
            Arc::clone(&self.scorer),
            self.inference_id.clone(),
            self.config.inference_text.clone(),
        ))))
    }
}

/// Reranks by the sum of several numeric fields.
#[derive(Debug, Clone)]
pub struct FieldSumStrategy {
    config: StrategyConfig,
}

impl FieldSumStrategy {
    pub fn new(config: StrategyConfig) -> Result<Self> {
        config.validate()?;
        if config.fields.is_empty() {
            return Err(RankError::validation(format!(
                "strategy [{}] requires at least one field",
                config.name
            )));
        }
        Ok(Self { config })
    }
}

impl RankingStrategy for FieldSumStrategy {
    fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn build_feature_extractor(&self) -> Option<Box<dyn FeatureExtractor>> {
        Some(Box::new(FieldExtractor::new(self.config.fields.clone())))
    }

    fn build_rerank_coordinator(
        &self,
        size: usize,
        from: usize,
    ) -> Result<Option<Box<dyn RerankCoordinator>>> {
        Ok(Some(Box::new(ScoringRerankCoordinator::new(
            Pagination::new(size, from, self.window_size()),
            Arc::new(FieldSumScorer::new(self.config.include_query_score)),
        ))))
    }
}
