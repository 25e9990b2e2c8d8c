//! Seams to the systems the orchestrator drives but does not implement:
//! the product catalog, the DEM provider, the SAR processing engine and
//! object storage. Each trait has a command-backed implementation that
//! shells out to a configured program.
use std::fs;
use std::io;
use std::path::Path;

use tracing::info;

use crate::core::params::OrchestratorConfig;
use crate::io::external::{ExternalCommand, ToolError};
use crate::io::sentinel1::ProductIdentifier;

/// Download client for raw acquisition products
pub trait ProductCatalog {
    /// Name of the data source, reported in diagnostics.
    fn source_name(&self) -> &str;

    /// Stage `product` into `staging_dir`, as `<id>.SAFE` or `<id>`.
    fn fetch(&self, product: &ProductIdentifier, staging_dir: &Path) -> Result<(), ToolError>;
}

/// Elevation tiles covering a Sentinel-2 tile
pub trait DemProvider {
    fn source_name(&self) -> &str;

    fn fetch_tile(&self, tile_id: &str, out_dir: &Path) -> Result<(), ToolError>;
}

/// One synchronous engine invocation
#[derive(Debug, Clone, Copy)]
pub struct EngineRun<'a> {
    pub config_path: &'a Path,
    pub input_dir: &'a Path,
    /// Directory the engine writes the tile's rasters into (`<tree>/<tile_id>`).
    pub output_dir: &'a Path,
    pub dem_dir: &'a Path,
    pub tile_id: &'a str,
    pub remove_thermal_noise: bool,
}

/// External SAR processing engine
pub trait Processor {
    fn process(&self, run: &EngineRun<'_>) -> Result<(), ToolError>;
}

/// Durable object storage
pub trait ObjectStore {
    /// Mirror `local` under `bucket/key_prefix`, returning the number of files pushed.
    fn upload_dir(&self, local: &Path, bucket: &str, key_prefix: &str)
    -> Result<usize, ToolError>;
}

/// Every collaborator a pipeline needs, behind its trait
pub struct Collaborators {
    pub catalog: Box<dyn ProductCatalog>,
    pub dem: Box<dyn DemProvider>,
    pub processor: Box<dyn Processor>,
    pub store: Box<dyn ObjectStore>,
}

impl Collaborators {
    /// Command-backed collaborators described by `config.tools`.
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Collaborators {
            catalog: Box::new(CommandCatalog {
                source: config.data_source.clone(),
                command: config.tools.catalog.clone(),
            }),
            dem: Box::new(CommandDemProvider {
                source: config.dem_source.clone(),
                command: config.tools.dem.clone(),
            }),
            processor: Box::new(CommandProcessor {
                command: config.tools.processor.clone(),
            }),
            store: Box::new(CommandObjectStore {
                command: config.tools.uploader.clone(),
            }),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Catalog client run as `<program> ... {product_id} {out_dir} {source}`
pub struct CommandCatalog {
    pub source: String,
    pub command: Option<ExternalCommand>,
}

impl ProductCatalog for CommandCatalog {
    fn source_name(&self) -> &str {
        &self.source
    }

    fn fetch(&self, product: &ProductIdentifier, staging_dir: &Path) -> Result<(), ToolError> {
        let command = self
            .command
            .as_ref()
            .ok_or(ToolError::NotConfigured { tool: "catalog" })?;
        let out_dir = path_arg(staging_dir);
        command.run(&[
            ("product_id", product.product_id()),
            ("safe_name", &product.safe_name()),
            ("out_dir", &out_dir),
            ("source", &self.source),
        ])
    }
}

/// DEM provider run as `<program> ... {tile_id} {out_dir} {source}`
pub struct CommandDemProvider {
    pub source: String,
    pub command: Option<ExternalCommand>,
}

impl DemProvider for CommandDemProvider {
    fn source_name(&self) -> &str {
        &self.source
    }

    fn fetch_tile(&self, tile_id: &str, out_dir: &Path) -> Result<(), ToolError> {
        let command = self
            .command
            .as_ref()
            .ok_or(ToolError::NotConfigured { tool: "DEM" })?;
        let out_dir = path_arg(out_dir);
        command.run(&[
            ("tile_id", tile_id),
            ("out_dir", &out_dir),
            ("source", &self.source),
        ])
    }
}

/// Engine run as `<program> ... {config}`
pub struct CommandProcessor {
    pub command: ExternalCommand,
}

impl Processor for CommandProcessor {
    fn process(&self, run: &EngineRun<'_>) -> Result<(), ToolError> {
        let config = path_arg(run.config_path);
        let output = path_arg(run.output_dir);
        self.command.run(&[
            ("config", &config),
            ("output_dir", &output),
            ("tile_id", run.tile_id),
        ])
    }
}

/// Uploader run as `<program> ... {src} {bucket} {key}`
pub struct CommandObjectStore {
    pub command: ExternalCommand,
}

impl ObjectStore for CommandObjectStore {
    fn upload_dir(
        &self,
        local: &Path,
        bucket: &str,
        key_prefix: &str,
    ) -> Result<usize, ToolError> {
        let count = count_files(local).map_err(|e| ToolError::Other(e.to_string()))?;
        let src = format!("{}/", path_arg(local).trim_end_matches('/'));
        self.command.run(&[
            ("src", &src),
            ("bucket", bucket),
            ("key", key_prefix),
        ])?;
        info!(
            "Uploaded {} file(s) from {:?} to s3://{}/{}",
            count, local, bucket, key_prefix
        );
        Ok(count)
    }
}

/// Number of regular files below `dir`.
pub fn count_files(dir: &Path) -> io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            count += count_files(&entry.path())?;
        } else if file_type.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
