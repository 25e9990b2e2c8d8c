//! High-level entry points: generate ARD for an ad-hoc product list or for a
//! whole work plan. Prefer these over driving `core::scheduler` directly.
//!
//! The plain functions build the command-backed collaborators from the
//! configuration and size the engine from the running host; the `_with`
//! variants take both explicitly, for embedding and tests.
use std::path::Path;

use tracing::info;

use crate::core::params::{OrchestratorConfig, default_prod_id};
use crate::core::scheduler::{BatchOptions, BatchReport, BatchScheduler};
use crate::core::sizing::HostResources;
use crate::error::Result;
use crate::io::collaborators::Collaborators;
use crate::io::workplan::WorkPlan;

/// Production id of this run: configured, else `0000_000_<now>`.
pub fn resolve_prod_id(config: &OrchestratorConfig) -> String {
    config.upload.prod_id.clone().unwrap_or_else(default_prod_id)
}

/// ARD for `product_ids` over `tile_id`, as a single unit.
pub fn generate_from_product_ids(
    tile_id: &str,
    product_ids: &[String],
    options: BatchOptions,
    config: &OrchestratorConfig,
) -> Result<BatchReport> {
    let collaborators = Collaborators::from_config(config);
    generate_from_product_ids_with(
        tile_id,
        product_ids,
        options,
        config,
        &collaborators,
        HostResources::detect(),
    )
}

pub fn generate_from_product_ids_with(
    tile_id: &str,
    product_ids: &[String],
    options: BatchOptions,
    config: &OrchestratorConfig,
    collaborators: &Collaborators,
    host: HostResources,
) -> Result<BatchReport> {
    let prod_id = resolve_prod_id(config);
    info!("Product ids: {:?}", product_ids);
    info!("Tile id: {}", tile_id);
    info!("Production id: {}", prod_id);
    BatchScheduler::new(config, collaborators, host, &prod_id, options)
        .run_product_ids(tile_id, product_ids)
}

/// ARD for every tile and date group of the work plan at `work_plan`.
pub fn generate_from_work_plan(
    work_plan: &Path,
    options: BatchOptions,
    config: &OrchestratorConfig,
) -> Result<BatchReport> {
    info!("Work plan: {:?}", work_plan);
    let plan = WorkPlan::from_file(work_plan)?;
    let collaborators = Collaborators::from_config(config);
    generate_from_work_plan_with(
        &plan,
        options,
        config,
        &collaborators,
        HostResources::detect(),
    )
}

pub fn generate_from_work_plan_with(
    plan: &WorkPlan,
    options: BatchOptions,
    config: &OrchestratorConfig,
    collaborators: &Collaborators,
    host: HostResources,
) -> Result<BatchReport> {
    let prod_id = resolve_prod_id(config);
    info!("Production id: {}", prod_id);
    BatchScheduler::new(config, collaborators, host, &prod_id, options).run_work_plan(plan)
}
