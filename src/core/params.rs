use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::sizing::{ClusterSizing, DEFAULT_RAM_SCALE_FACTOR};
use crate::error::{Error, Result};
use crate::io::engine_config::{EnginePaths, ProcessingConfigBuilder};
use crate::io::external::ExternalCommand;
use crate::io::sentinel1::DATETIME_FORMAT;
use crate::types::{Calibration, DemFailurePolicy, FormatMode, Interpolation};

/// Environment variable overriding the upload bucket.
pub const BUCKET_ENV: &str = "S1ARD_BUCKET";
/// Environment variable overriding the upload key prefix.
pub const BUCKET_PREFIX_ENV: &str = "S1ARD_BUCKET_PREFIX";

/// Engine parameters shared by every unit of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub calibration: Calibration,
    /// Output pixel size in meters
    pub spatial_resolution: u32,
    pub interpolation: Interpolation,
    pub generate_mask: bool,
    /// Share of host RAM handed to the engine workers
    pub ram_scale_factor: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub polarisation: String,
    pub tile_to_product_overlap_ratio: f64,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            calibration: Calibration::Sigma,
            spatial_resolution: 20,
            interpolation: Interpolation::Linear,
            generate_mask: false,
            ram_scale_factor: DEFAULT_RAM_SCALE_FACTOR,
            first_date: NaiveDate::from_ymd_opt(2016, 6, 1).unwrap_or_default(),
            last_date: NaiveDate::from_ymd_opt(2025, 7, 31).unwrap_or_default(),
            polarisation: "VV-VH".to_string(),
            tile_to_product_overlap_ratio: 0.5,
        }
    }
}

impl ProcessingOptions {
    /// Engine configuration builder carrying these options.
    pub fn builder(
        &self,
        paths: EnginePaths,
        tile_id: &str,
        sizing: ClusterSizing,
    ) -> ProcessingConfigBuilder {
        ProcessingConfigBuilder::new(paths, tile_id, sizing)
            .calibration(self.calibration)
            .spatial_resolution(self.spatial_resolution)
            .interpolation(self.interpolation)
            .generate_mask(self.generate_mask)
            .overlap_ratio(self.tile_to_product_overlap_ratio)
            .date_bounds(self.first_date, self.last_date)
            .polarisation(&self.polarisation)
    }
}

/// Remote destination of formatted products
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub bucket: String,
    pub prefix: String,
    /// Production id inserted below `prefix`; generated per run when absent
    pub prod_id: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: "world-cereal".to_string(),
            prefix: "WORLDCEREAL_PREPROC".to_string(),
            prod_id: None,
        }
    }
}

impl UploadConfig {
    /// Key prefix under which one run's ARD tree is mirrored: `<prefix>/<prod_id>/`.
    pub fn key_prefix(&self, prod_id: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/", prod_id)
        } else {
            format!("{}/{}/", prefix, prod_id)
        }
    }

    /// Key of one ARD product directory: `<prefix>/<prod_id>/<relative_dir>/`.
    pub fn product_key(&self, prod_id: &str, relative_dir: &Path) -> String {
        let mut key = self.key_prefix(prod_id);
        for part in relative_dir.iter() {
            key.push_str(&part.to_string_lossy());
            key.push('/');
        }
        key
    }
}

/// `0000_000_<local time>`, the production id used when none is given.
pub fn default_prod_id() -> String {
    format!("0000_000_{}", Local::now().format(DATETIME_FORMAT))
}

/// Command templates of the external collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub processor: ExternalCommand,
    pub catalog: Option<ExternalCommand>,
    pub dem: Option<ExternalCommand>,
    pub uploader: ExternalCommand,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            processor: ExternalCommand::new("S1Processor", &["{config}"]),
            catalog: None,
            dem: None,
            uploader: ExternalCommand::new(
                "aws",
                &[
                    "s3",
                    "cp",
                    "--recursive",
                    "--only-show-errors",
                    "{src}",
                    "s3://{bucket}/{key}",
                ],
            ),
        }
    }
}

/// Orchestrator configuration, validated once and passed by reference afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub data_source: String,
    pub dem_source: String,
    pub processing: ProcessingOptions,
    pub format_mode: FormatMode,
    pub dem_failure_policy: DemFailurePolicy,
    pub upload: UploadConfig,
    pub tools: ToolsConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            data_source: "creodias_eodata".to_string(),
            dem_source: "creodias".to_string(),
            processing: ProcessingOptions::default(),
            format_mode: FormatMode::Convert,
            dem_failure_policy: DemFailurePolicy::AbortTile,
            upload: UploadConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Defaults or the JSON file at `path`, with environment overrides, validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                serde_json::from_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        debug!("Orchestrator configuration: {:?}", config);
        Ok(config)
    }

    /// Apply `S1ARD_BUCKET` / `S1ARD_BUCKET_PREFIX` as resolved by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bucket) = lookup(BUCKET_ENV) {
            self.upload.bucket = bucket;
        }
        if let Some(prefix) = lookup(BUCKET_PREFIX_ENV) {
            self.upload.prefix = prefix;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &'static str, reason: &str| {
            Err(Error::InvalidConfig {
                key,
                reason: reason.to_string(),
            })
        };
        let p = &self.processing;
        if p.spatial_resolution == 0 {
            return invalid("processing.spatial_resolution", "must be greater than 0");
        }
        if !(p.ram_scale_factor > 0.0 && p.ram_scale_factor <= 1.0) {
            return invalid("processing.ram_scale_factor", "must be in (0, 1]");
        }
        if !(p.tile_to_product_overlap_ratio > 0.0 && p.tile_to_product_overlap_ratio <= 1.0) {
            return invalid(
                "processing.tile_to_product_overlap_ratio",
                "must be in (0, 1]",
            );
        }
        if p.first_date > p.last_date {
            return invalid("processing.first_date", "must not be after last_date");
        }
        if p.polarisation.trim().is_empty() {
            return invalid("processing.polarisation", "must not be empty");
        }
        if self.data_source.trim().is_empty() {
            return invalid("data_source", "must not be empty");
        }
        if self.dem_source.trim().is_empty() {
            return invalid("dem_source", "must not be empty");
        }
        if self.upload.bucket.trim().is_empty() {
            return invalid("upload.bucket", "must not be empty");
        }
        if let Some(prod_id) = &self.upload.prod_id {
            if prod_id.trim().is_empty() || prod_id.contains('/') {
                return invalid("upload.prod_id", "must be a non-empty single key segment");
            }
        }
        if self.tools.processor.program.trim().is_empty() {
            return invalid("tools.processor", "program must not be empty");
        }
        if self.tools.uploader.program.trim().is_empty() {
            return invalid("tools.uploader", "program must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = OrchestratorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.processing.spatial_resolution, 20);
        assert_eq!(config.format_mode, FormatMode::Convert);
        assert_eq!(config.dem_failure_policy, DemFailurePolicy::AbortTile);
        assert!(config.tools.catalog.is_none());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1ard.json");
        fs::write(
            &path,
            r#"{
                "data_source": "aws",
                "processing": {"calibration": "gamma", "spatial_resolution": 10},
                "format_mode": "rename-only",
                "tools": {"catalog": {"program": "fetch-s1", "args": ["{product_id}"], "timeout_secs": 600}}
            }"#,
        )
        .unwrap();
        let config = OrchestratorConfig::load(Some(&path)).unwrap();
        assert_eq!(config.data_source, "aws");
        assert_eq!(config.dem_source, "creodias");
        assert_eq!(config.processing.calibration, Calibration::Gamma);
        assert_eq!(config.processing.polarisation, "VV-VH");
        assert_eq!(config.format_mode, FormatMode::RenameOnly);
        let catalog = config.tools.catalog.unwrap();
        assert_eq!(catalog.timeout_secs, Some(600));
        assert_eq!(config.tools.processor.program, "S1Processor");
    }

    #[test]
    fn environment_overrides_destination() {
        let mut config = OrchestratorConfig::default();
        config.apply_overrides(|key| match key {
            BUCKET_ENV => Some("my-bucket".to_string()),
            BUCKET_PREFIX_ENV => Some("ARD/test".to_string()),
            _ => None,
        });
        assert_eq!(config.upload.bucket, "my-bucket");
        assert_eq!(config.upload.key_prefix("0000_000_x"), "ARD/test/0000_000_x/");
    }

    #[test]
    fn product_key_mirrors_the_ard_layout() {
        let upload = UploadConfig::default();
        let relative = Path::new("SAR/31/T/CJ/2021/20210708/S1A_20210708T060040_DES_TODO_03868204908E3178_31TCJ");
        assert_eq!(
            upload.product_key("0000_000_x", relative),
            "WORLDCEREAL_PREPROC/0000_000_x/SAR/31/T/CJ/2021/20210708/S1A_20210708T060040_DES_TODO_03868204908E3178_31TCJ/"
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = OrchestratorConfig::default();
        config.processing.ram_scale_factor = 1.5;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig {
                key: "processing.ram_scale_factor",
                ..
            })
        ));

        let mut config = OrchestratorConfig::default();
        config.upload.bucket = " ".into();
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.processing.first_date = config.processing.last_date.succ_opt().unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_prod_id_has_the_reserved_prefix() {
        let id = default_prod_id();
        assert!(id.starts_with("0000_000_"));
        assert_eq!(id.len(), "0000_000_".len() + 15);
    }
}
