//! Name to strategy lookup.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::error::{RankError, Result};
use crate::feature_phase::ExternalScorer;
use crate::strategy::builtin::{
    EXTERNAL_SCORE, ExternalScoreStrategy, FIELD_SCORE, FIELD_SUM, FieldScoreStrategy,
    FieldSumStrategy, TOP_WINDOW, TopWindowStrategy,
};
use crate::strategy::config::StrategyConfig;
use crate::strategy::traits::RankingStrategy;

/// Collaborators a strategy may need at build time.
#[derive(Clone, Default)]
pub struct StrategyServices {
    scorers: HashMap<String, Arc<dyn ExternalScorer>>,
}

impl StrategyServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an external scorer under `inference_id`.
    pub fn with_scorer<S: Into<String>>(
        mut self,
        inference_id: S,
        scorer: Arc<dyn ExternalScorer>,
    ) -> Self {
        self.scorers.insert(inference_id.into(), scorer);
        self
    }

    /// Look up an external scorer.
    pub fn scorer(&self, inference_id: &str) -> Option<Arc<dyn ExternalScorer>> {
        self.scorers.get(inference_id).cloned()
    }
}

impl fmt::Debug for StrategyServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.scorers.keys().collect();
        ids.sort();
        f.debug_struct("StrategyServices")
            .field("scorers", &ids)
            .finish()
    }
}

/// Builds a strategy from its config.
pub trait StrategyFactory: Send + Sync {
    fn create(
        &self,
        config: StrategyConfig,
        services: &StrategyServices,
    ) -> Result<Arc<dyn RankingStrategy>>;
}

impl<F> StrategyFactory for F
where
    F: Fn(StrategyConfig, &StrategyServices) -> Result<Arc<dyn RankingStrategy>> + Send + Sync,
{
    fn create(
        &self,
        config: StrategyConfig,
        services: &StrategyServices,
    ) -> Result<Arc<dyn RankingStrategy>> {
        self(config, services)
    }
}

fn build_top_window(
    config: StrategyConfig,
    _: &StrategyServices,
) -> Result<Arc<dyn RankingStrategy>> {
    Ok(Arc::new(TopWindowStrategy::new(config)?))
}

fn build_field_score(
    config: StrategyConfig,
    _: &StrategyServices,
) -> Result<Arc<dyn RankingStrategy>> {
    Ok(Arc::new(FieldScoreStrategy::new(config)?))
}

fn build_external_score(
    config: StrategyConfig,
    services: &StrategyServices,
) -> Result<Arc<dyn RankingStrategy>> {
    Ok(Arc::new(ExternalScoreStrategy::new(config, services)?))
}

fn build_field_sum(
    config: StrategyConfig,
    _: &StrategyServices,
) -> Result<Arc<dyn RankingStrategy>> {
    Ok(Arc::new(FieldSumStrategy::new(config)?))
}

/// Registry of strategy factories, populated once at startup.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: BTreeMap<String, Arc<dyn StrategyFactory>>,
}

impl StrategyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TOP_WINDOW, build_top_window);
        registry.register(FIELD_SCORE, build_field_score);
        registry.register(EXTERNAL_SCORE, build_external_score);
        registry.register(FIELD_SUM, build_field_sum);
        registry
    }

    /// Register a factory, replacing any previous one of the same name.
    pub fn register<S, F>(&mut self, name: S, factory: F)
    where
        S: Into<String>,
        F: StrategyFactory + 'static,
    {
        let name = name.into();
        debug!("registering ranking strategy [{name}]");
        self.factories.insert(name, Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Validate `config` and build the strategy it names.
    pub fn build(
        &self,
        config: StrategyConfig,
        services: &StrategyServices,
    ) -> Result<Arc<dyn RankingStrategy>> {
        config.validate()?;
        let factory = self.factories.get(&config.name).ok_or_else(|| {
            RankError::validation(format!("unknown ranking strategy [{}]", config.name))
        })?;
        factory.create(config, services)
    }

    /// Decode a JSON config, validate it and build the strategy.
    pub fn parse(&self, bytes: &[u8], services: &StrategyServices) -> Result<Arc<dyn RankingStrategy>> {
        let config = StrategyConfig::from_json(bytes)?;
        self.build(config, services)
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("names", &self.names())
            .finish()
    }
}
