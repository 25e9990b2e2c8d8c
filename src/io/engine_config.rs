//! Configuration artifact consumed by the external SAR processing engine.
//!
//! The engine reads a sectioned INI file (`[Paths]`, `[Processing]`,
//! `[DataSource]`, `[Mask]`). [`ProcessingConfigBuilder`] assembles a typed
//! [`EngineConfig`], validates it once, and only then serializes it.
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use ini::Ini;
use tracing::debug;

use crate::core::sizing::ClusterSizing;
use crate::error::{Error, Result};
use crate::types::{Calibration, Interpolation, check_tile_id};

/// File name of the artifact inside an engine working tree.
pub const ENGINE_CONFIG_FILENAME: &str = "S1Processor.cfg";

/// Orthorectification grid spacing is this multiple of the output resolution.
pub const GRID_SPACING_FACTOR: u32 = 4;

/// Directories handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    pub output: PathBuf,
    pub s1_images: PathBuf,
    pub dem: PathBuf,
    pub tmp: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineProcessing {
    pub calibration: Calibration,
    pub remove_thermal_noise: bool,
    pub output_spatial_resolution: u32,
    pub orthorectification_gridspacing: u32,
    pub interpolation: Interpolation,
    pub tile_id: String,
    pub tile_to_product_overlap_ratio: f64,
    pub sizing: ClusterSizing,
}

/// Data-source section; downloading by the engine itself is always disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDataSource {
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub polarisation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub paths: EnginePaths,
    pub processing: EngineProcessing,
    pub data_source: EngineDataSource,
    pub generate_border_mask: bool,
}

fn bool_value(v: bool) -> &'static str {
    if v { "True" } else { "False" }
}

fn path_value(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

impl EngineConfig {
    /// INI representation in the layout the engine expects.
    pub fn to_ini(&self) -> Ini {
        let p = &self.processing;
        let mut conf = Ini::new();
        conf.with_section(Some("Paths"))
            .set("output", path_value(&self.paths.output))
            .set("s1_images", path_value(&self.paths.s1_images))
            .set("srtm", path_value(&self.paths.dem))
            .set("tmp", path_value(&self.paths.tmp));
        conf.with_section(Some("Processing"))
            .set("mode", "logging")
            .set("calibration", p.calibration.as_config_value())
            .set("remove_thermal_noise", bool_value(p.remove_thermal_noise))
            .set(
                "output_spatial_resolution",
                format!("{:.1}", p.output_spatial_resolution as f64),
            )
            .set(
                "orthorectification_gridspacing",
                p.orthorectification_gridspacing.to_string(),
            )
            .set(
                "orthorectification_interpolation_method",
                p.interpolation.to_string(),
            )
            .set("tiles", p.tile_id.clone())
            .set(
                "tile_to_product_overlap_ratio",
                p.tile_to_product_overlap_ratio.to_string(),
            )
            .set("nb_parallel_processes", p.sizing.worker_count.to_string())
            .set("ram_per_process", p.sizing.ram_per_worker_mb.to_string())
            .set("nb_otb_threads", p.sizing.threads_per_worker.to_string());
        conf.with_section(Some("DataSource"))
            .set("download", bool_value(false))
            .set("roi_by_tiles", "ALL")
            .set(
                "first_date",
                self.data_source.first_date.format("%Y-%m-%d").to_string(),
            )
            .set(
                "last_date",
                self.data_source.last_date.format("%Y-%m-%d").to_string(),
            )
            .set("polarisation", self.data_source.polarisation.clone());
        conf.with_section(Some("Mask"))
            .set("generate_border_mask", bool_value(self.generate_border_mask));
        conf
    }

    /// Persist the artifact in `dir` and return its path. I/O errors propagate unchanged.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(ENGINE_CONFIG_FILENAME);
        self.to_ini().write_to_file(&path)?;
        debug!("Wrote engine configuration: {:?}", path);
        Ok(path)
    }
}

/// Assembles an [`EngineConfig`] for one engine invocation
#[derive(Debug, Clone)]
pub struct ProcessingConfigBuilder {
    paths: EnginePaths,
    tile_id: String,
    sizing: ClusterSizing,
    calibration: Calibration,
    remove_thermal_noise: bool,
    spatial_resolution: u32,
    interpolation: Interpolation,
    generate_mask: bool,
    overlap_ratio: f64,
    first_date: NaiveDate,
    last_date: NaiveDate,
    polarisation: String,
}

impl ProcessingConfigBuilder {
    pub fn new(paths: EnginePaths, tile_id: &str, sizing: ClusterSizing) -> Self {
        ProcessingConfigBuilder {
            paths,
            tile_id: tile_id.to_string(),
            sizing,
            calibration: Calibration::Sigma,
            remove_thermal_noise: true,
            spatial_resolution: 20,
            interpolation: Interpolation::Linear,
            generate_mask: false,
            overlap_ratio: 0.5,
            first_date: NaiveDate::from_ymd_opt(2016, 6, 1).unwrap_or_default(),
            last_date: NaiveDate::from_ymd_opt(2025, 7, 31).unwrap_or_default(),
            polarisation: "VV-VH".to_string(),
        }
    }

    pub fn calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn remove_thermal_noise(mut self, remove: bool) -> Self {
        self.remove_thermal_noise = remove;
        self
    }

    pub fn spatial_resolution(mut self, meters: u32) -> Self {
        self.spatial_resolution = meters;
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn generate_mask(mut self, generate: bool) -> Self {
        self.generate_mask = generate;
        self
    }

    pub fn overlap_ratio(mut self, ratio: f64) -> Self {
        self.overlap_ratio = ratio;
        self
    }

    pub fn date_bounds(mut self, first: NaiveDate, last: NaiveDate) -> Self {
        self.first_date = first;
        self.last_date = last;
        self
    }

    pub fn polarisation(mut self, polarisation: &str) -> Self {
        self.polarisation = polarisation.to_string();
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        check_tile_id(&self.tile_id)?;
        if self.spatial_resolution == 0 {
            return Err(Error::InvalidConfig {
                key: "spatial_resolution",
                reason: "must be greater than 0".to_string(),
            });
        }
        if !(self.overlap_ratio > 0.0 && self.overlap_ratio <= 1.0) {
            return Err(Error::InvalidConfig {
                key: "tile_to_product_overlap_ratio",
                reason: format!("must be in (0, 1], got {}", self.overlap_ratio),
            });
        }
        if self.first_date > self.last_date {
            return Err(Error::InvalidConfig {
                key: "first_date",
                reason: format!("{} is after {}", self.first_date, self.last_date),
            });
        }
        if self.sizing.worker_count == 0 {
            return Err(Error::InvalidConfig {
                key: "nb_parallel_processes",
                reason: "must be greater than 0".to_string(),
            });
        }
        for (key, path) in [
            ("paths.output", &self.paths.output),
            ("paths.s1_images", &self.paths.s1_images),
            ("paths.srtm", &self.paths.dem),
            ("paths.tmp", &self.paths.tmp),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::InvalidConfig {
                    key,
                    reason: "path is empty".to_string(),
                });
            }
        }

        Ok(EngineConfig {
            paths: self.paths,
            processing: EngineProcessing {
                calibration: self.calibration,
                remove_thermal_noise: self.remove_thermal_noise,
                output_spatial_resolution: self.spatial_resolution,
                orthorectification_gridspacing: GRID_SPACING_FACTOR * self.spatial_resolution,
                interpolation: self.interpolation,
                tile_id: self.tile_id,
                tile_to_product_overlap_ratio: self.overlap_ratio,
                sizing: self.sizing,
            },
            data_source: EngineDataSource {
                first_date: self.first_date,
                last_date: self.last_date,
                polarisation: self.polarisation,
            },
            generate_border_mask: self.generate_mask,
        })
    }
}
