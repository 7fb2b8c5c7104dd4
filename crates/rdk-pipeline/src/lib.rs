//! rdk-pipeline
//!
//! Orchestrates a full validation run for one strategy:
//!
//! - typed, preset-based configuration with unknown-key rejection
//! - bounded rayon worker pool shared by cells, windows and simulations
//! - per-phase time budgets and a run-scoped cancellation flag
//! - typed phase events over an unbounded channel
//! - results cache with one computation per `(strategy_id, config_hash)`
//! - append-only result store (JSON directory or in-memory)

mod cache;
mod config;
mod error;
mod events;
mod pipeline;
mod request;
mod store;

pub use cache::{CacheKey, ResultCache};
pub use config::{PhaseBudgets, PoolConfig, Preset, ValidationConfig};
pub use error::{PhaseFailure, PipelineError};
pub use events::{EventSink, PhaseEvent};
pub use pipeline::{spawn_cached_validation, spawn_validation, Pipeline};
pub use request::{
    PhaseOutcome, PhaseState, PrimarySeries, ValidationRequest, ValidationResponse,
    ValidationResults,
};
pub use store::{JsonDirStore, MemoryStore, ResultStore, StoreKey};
