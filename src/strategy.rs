//! Pluggable ranking strategies.
//!
//! A [`RankingStrategy`] supplies the combiner, merger, feature extractor and
//! rerank coordinator that the pipeline runs. Strategies are described by a
//! serializable [`StrategyConfig`] and built through a [`StrategyRegistry`].
//!
//! ```
//! use rankwise::strategy::{StrategyRegistry, StrategyServices};
//!
//! let registry = StrategyRegistry::with_defaults();
//! let strategy = registry
//!     .parse(br#"{"name": "top_window", "window_size": 10}"#, &StrategyServices::new())
//!     .unwrap();
//! assert_eq!(strategy.window_size(), 10);
//! assert!(!strategy.has_feature_phase());
//! ```

pub mod builtin;
pub mod config;
pub mod lifecycle;
pub mod registry;
pub mod traits;

pub use builtin::{ExternalScoreStrategy, FieldScoreStrategy, FieldSumStrategy, TopWindowStrategy};
pub use config::{DEFAULT_WINDOW_SIZE, StrategyConfig};
pub use lifecycle::{StrategyLifecycle, StrategyPhase};
pub use registry::{StrategyFactory, StrategyRegistry, StrategyServices};
pub use traits::RankingStrategy;
