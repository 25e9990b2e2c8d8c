//! Batch scheduling: ad-hoc product lists and work plans.
//!
//! Units run one at a time in plan order (tiles, then date groups). Each level
//! owns its working directory:
//!
//! ```text
//! <working_dir>/s1ard_wp|s1ard_pid/          batch
//!     <tile_id>/                             tile
//!         dem/                               downloaded DEM
//!         <date_key>/                        unit
//! ```
//!
//! A DEM failure ends the tile (or the batch, per [`DemFailurePolicy`]); a unit
//! failure is recorded and the next unit starts.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::core::params::OrchestratorConfig;
use crate::core::pipeline::{ArdOutcome, ArdPipeline, PipelineUnit};
use crate::core::sizing::HostResources;
use crate::core::workspace::ScopedDir;
use crate::error::{Error, Result};
use crate::io::collaborators::Collaborators;
use crate::io::workplan::{WorkPlan, group_date_key};
use crate::types::{DemFailurePolicy, check_tile_id};

pub const DEM_DIRNAME: &str = "dem";

/// Which entry shape started the batch; selects the batch directory name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchLayout {
    ProductIds,
    WorkPlan,
}

impl BatchLayout {
    pub fn dirname(&self) -> &'static str {
        match self {
            BatchLayout::ProductIds => "s1ard_pid",
            BatchLayout::WorkPlan => "s1ard_wp",
        }
    }
}

/// Run-wide options shared by every unit
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub out_root: PathBuf,
    pub working_dir: PathBuf,
    /// Existing DEM directory; bypasses the DEM provider when set
    pub dem_dir: Option<PathBuf>,
    pub upload_outputs: bool,
    pub clean: bool,
}

#[derive(Debug)]
pub struct UnitReport {
    pub tile_id: String,
    pub date_key: String,
    pub product_ids: Vec<String>,
    pub result: Result<ArdOutcome>,
}

#[derive(Debug)]
pub struct TileReport {
    pub tile_id: String,
    /// Set when the tile's DEM could not be acquired; no unit ran then
    pub dem_error: Option<Error>,
    pub units: Vec<UnitReport>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub tiles: Vec<TileReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.units().filter(|u| u.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.units().filter(|u| u.result.is_err()).count()
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitReport> {
        self.tiles.iter().flat_map(|t| t.units.iter())
    }

    /// First failure in plan order, DEM failures included.
    pub fn first_error(&self) -> Option<&Error> {
        self.tiles.iter().find_map(|tile| {
            tile.dem_error
                .as_ref()
                .or_else(|| tile.units.iter().find_map(|u| u.result.as_ref().err()))
        })
    }

    pub fn is_success(&self) -> bool {
        self.first_error().is_none()
    }
}

pub struct BatchScheduler<'a> {
    config: &'a OrchestratorConfig,
    collaborators: &'a Collaborators,
    pipeline: ArdPipeline<'a>,
    options: BatchOptions,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(
        config: &'a OrchestratorConfig,
        collaborators: &'a Collaborators,
        host: HostResources,
        prod_id: &str,
        options: BatchOptions,
    ) -> Self {
        BatchScheduler {
            config,
            collaborators,
            pipeline: ArdPipeline::new(config, collaborators, host, prod_id),
            options,
        }
    }

    /// One tile, one unit made of every given product id.
    pub fn run_product_ids(&self, tile_id: &str, product_ids: &[String]) -> Result<BatchReport> {
        check_tile_id(tile_id)?;
        self.run_tiles(
            BatchLayout::ProductIds,
            vec![(tile_id.to_string(), vec![product_ids.to_vec()])],
        )
    }

    /// Every tile of the plan, one unit per date group.
    pub fn run_work_plan(&self, plan: &WorkPlan) -> Result<BatchReport> {
        info!("{} tile(s) will be processed", plan.tiles.len());
        let tiles = plan
            .tiles
            .iter()
            .map(|t| (t.tile_id.clone(), t.groups()))
            .collect();
        self.run_tiles(BatchLayout::WorkPlan, tiles)
    }

    fn run_tiles(
        &self,
        layout: BatchLayout,
        tiles: Vec<(String, Vec<Vec<String>>)>,
    ) -> Result<BatchReport> {
        let clean = self.options.clean;
        let batch_root = ScopedDir::create(self.options.working_dir.join(layout.dirname()), clean)?;
        let mut report = BatchReport::default();

        for (tile_id, groups) in tiles {
            let tile_root = ScopedDir::create(batch_root.join(&tile_id), clean)?;
            let dem_dir = match self.acquire_dem(&tile_id, tile_root.path()) {
                Ok(dir) => dir,
                Err(e) => {
                    error!("DEM acquisition failed for tile {}: {}", tile_id, e);
                    match self.config.dem_failure_policy {
                        DemFailurePolicy::AbortBatch => return Err(e),
                        DemFailurePolicy::AbortTile => {
                            report.tiles.push(TileReport {
                                tile_id,
                                dem_error: Some(e),
                                units: Vec::new(),
                            });
                            continue;
                        }
                    }
                }
            };

            let mut units = Vec::new();
            let mut used_dirs = HashSet::new();
            for group in groups {
                let Some(date_key) = group_date_key(&group) else {
                    warn!("No valid product id in group {:?}, skipped", group);
                    units.push(UnitReport {
                        tile_id: tile_id.clone(),
                        date_key: String::new(),
                        result: Err(Error::InputDownload {
                            product_ids: group.clone(),
                            source_name: self.collaborators.catalog.source_name().to_string(),
                        }),
                        product_ids: group,
                    });
                    continue;
                };
                let dirname = unique_dirname(&date_key, &mut used_dirs);
                info!("{:?} will be processed for {}", group, date_key);
                let unit_dir = ScopedDir::create(tile_root.join(&dirname), clean)?;
                let unit = PipelineUnit {
                    tile_id: tile_id.clone(),
                    product_ids: group,
                    dem_dir: dem_dir.clone(),
                    out_root: self.options.out_root.clone(),
                    working_dir: unit_dir.path().to_path_buf(),
                    upload_outputs: self.options.upload_outputs,
                    clean,
                };
                let result = self.pipeline.run(&unit);
                drop(unit_dir);
                match &result {
                    Ok(outcome) => info!(
                        "Unit {}/{} done: {} file(s) {}",
                        tile_id, date_key, outcome.file_count, outcome.remote_path
                    ),
                    Err(e) => error!("Unit {}/{} failed: {}", tile_id, date_key, e),
                }
                units.push(UnitReport {
                    tile_id: tile_id.clone(),
                    date_key,
                    product_ids: unit.product_ids,
                    result,
                });
            }
            report.tiles.push(TileReport {
                tile_id,
                dem_error: None,
                units,
            });
        }

        info!(
            "Batch complete: {} unit(s) succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    /// Local DEM directory when given, else a fresh download below `tile_root`.
    fn acquire_dem(&self, tile_id: &str, tile_root: &Path) -> Result<PathBuf> {
        if let Some(dir) = &self.options.dem_dir {
            if dir.is_dir() {
                return Ok(dir.clone());
            }
            return Err(Error::DemDownload {
                tile_id: tile_id.to_string(),
                source_name: "local".to_string(),
                reason: format!("{:?} is not a directory", dir),
            });
        }
        let provider = self.collaborators.dem.as_ref();
        let dem_dir = tile_root.join(DEM_DIRNAME);
        let dem_error = |reason: String| Error::DemDownload {
            tile_id: tile_id.to_string(),
            source_name: provider.source_name().to_string(),
            reason,
        };
        std::fs::create_dir_all(&dem_dir).map_err(|e| dem_error(e.to_string()))?;
        provider
            .fetch_tile(tile_id, &dem_dir)
            .map_err(|e| dem_error(e.to_string()))?;
        info!("DEM for tile {} ready in {:?}", tile_id, dem_dir);
        Ok(dem_dir)
    }
}

/// `date_key`, suffixed when an earlier group of the tile already used it.
fn unique_dirname(date_key: &str, used: &mut HashSet<String>) -> String {
    let mut name = date_key.to_string();
    let mut n = 1;
    while !used.insert(name.clone()) {
        n += 1;
        name = format!("{}_{}", date_key, n);
    }
    name
}
