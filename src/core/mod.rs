//! Orchestration core: configuration (`params`), engine pool sizing
//! (`sizing`), ARD formatting (`processing`), working directory guards
//! (`workspace`), the per-unit pipeline and the batch scheduler.
pub mod params;
pub mod pipeline;
pub mod processing;
pub mod scheduler;
pub mod sizing;
pub mod workspace;

pub use params::OrchestratorConfig;
pub use pipeline::{ArdOutcome, ArdPipeline, PipelineUnit, Stage};
pub use scheduler::{BatchOptions, BatchReport, BatchScheduler, TileReport, UnitReport};
pub use sizing::{ClusterSizing, HostResources, size_cluster};
pub use workspace::ScopedDir;
