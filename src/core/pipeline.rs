//! Per-unit ARD pipeline: one tile, one date slice, one product group.
//!
//! Stages run strictly in order:
//!
//! `INPUT_RESOLUTION -> PROCESS_WITH_NOISE_REMOVAL -> PROCESS_WITHOUT_NOISE_REMOVAL
//!  -> FORMAT -> UPLOAD -> DONE`
//!
//! and the first failing stage ends the unit with its typed error. Working
//! directories are [`ScopedDir`] guards, so a failure anywhere still removes
//! them when `clean` is set. A unit's formatted product directory is only
//! removed after its own successful upload.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::core::params::OrchestratorConfig;
use crate::core::processing::format::{ArdFormatter, ArdProduct, EngineOutputs};
use crate::core::sizing::{ClusterSizing, HostResources, size_cluster};
use crate::core::workspace::ScopedDir;
use crate::error::{Error, Result};
use crate::io::collaborators::{Collaborators, EngineRun};
use crate::io::engine_config::EnginePaths;
use crate::io::sentinel1::ProductIdentifier;
use crate::types::check_tile_id;

/// File count reported when the upload stage is skipped: the two ARD bands.
pub const SKIPPED_UPLOAD_FILE_COUNT: usize = 2;

/// Name of the formatted output tree below the output root.
pub const ARD_DIRNAME: &str = "s1_ard";

pub const STAGING_DIRNAME: &str = "input";
pub const DENOISED_TREE_DIRNAME: &str = "s1process";
pub const COMPANION_TREE_DIRNAME: &str = "s1process_noised";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    InputResolution,
    ProcessWithNoiseRemoval,
    ProcessWithoutNoiseRemoval,
    Format,
    Upload,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::InputResolution => "INPUT_RESOLUTION",
            Stage::ProcessWithNoiseRemoval => "PROCESS_WITH_NOISE_REMOVAL",
            Stage::ProcessWithoutNoiseRemoval => "PROCESS_WITHOUT_NOISE_REMOVAL",
            Stage::Format => "FORMAT",
            Stage::Upload => "UPLOAD",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// Terminal success of a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArdOutcome {
    pub file_count: usize,
    /// `s3://<bucket>/<key>` of the mirrored tree; empty when not uploaded
    pub remote_path: String,
}

/// One work item handed to the pipeline
#[derive(Debug, Clone)]
pub struct PipelineUnit {
    pub tile_id: String,
    pub product_ids: Vec<String>,
    pub dem_dir: PathBuf,
    /// Root below which `s1_ard/` is written
    pub out_root: PathBuf,
    /// Directory owned by this unit; its subtrees are created here
    pub working_dir: PathBuf,
    pub upload_outputs: bool,
    pub clean: bool,
}

impl PipelineUnit {
    pub fn ard_root(&self) -> PathBuf {
        self.out_root.join(ARD_DIRNAME)
    }
}

pub struct ArdPipeline<'a> {
    config: &'a OrchestratorConfig,
    collaborators: &'a Collaborators,
    host: HostResources,
    prod_id: String,
}

impl<'a> ArdPipeline<'a> {
    pub fn new(
        config: &'a OrchestratorConfig,
        collaborators: &'a Collaborators,
        host: HostResources,
        prod_id: &str,
    ) -> Self {
        ArdPipeline {
            config,
            collaborators,
            host,
            prod_id: prod_id.to_string(),
        }
    }

    fn enter(&self, stage: Stage, unit: &PipelineUnit) {
        info!(
            "[{}] {} for tile {} ({} product(s))",
            self.prod_id,
            stage,
            unit.tile_id,
            unit.product_ids.len()
        );
    }

    /// Drive `unit` to `DONE` or to its first failure.
    pub fn run(&self, unit: &PipelineUnit) -> Result<ArdOutcome> {
        check_tile_id(&unit.tile_id)?;
        let tile_id = unit.tile_id.as_str();

        self.enter(Stage::InputResolution, unit);
        let staging = ScopedDir::create(
            unit.working_dir.join(STAGING_DIRNAME).join(tile_id),
            unit.clean,
        )?;
        let staged = self.resolve_inputs(unit, staging.path())?;
        let sizing = size_cluster(staged.len(), &self.host, self.config.processing.ram_scale_factor)?;
        info!("Engine sizing: {:?}", sizing);

        self.enter(Stage::ProcessWithNoiseRemoval, unit);
        let denoised = ScopedDir::create(unit.working_dir.join(DENOISED_TREE_DIRNAME), unit.clean)?;
        self.process(unit, &sizing, staging.path(), denoised.path(), true)?;

        self.enter(Stage::ProcessWithoutNoiseRemoval, unit);
        let companion =
            ScopedDir::create(unit.working_dir.join(COMPANION_TREE_DIRNAME), unit.clean)?;
        let second_pass = self.process(unit, &sizing, staging.path(), companion.path(), false);
        // Staged inputs are no longer needed whatever the outcome.
        drop(staging);
        second_pass?;

        self.enter(Stage::Format, unit);
        let product = first_valid_product(&unit.product_ids).ok_or_else(|| {
            Error::InputDownload {
                product_ids: unit.product_ids.clone(),
                source_name: self.collaborators.catalog.source_name().to_string(),
            }
        })?;
        let ard_root = unit.ard_root();
        let formatter = ArdFormatter::new(self.config.format_mode, self.config.processing.calibration)
            .clean_input(unit.clean);
        let formatted = formatter.format(
            EngineOutputs {
                denoised: &denoised.join(tile_id),
                companion: &companion.join(tile_id),
            },
            &ard_root,
            &product,
            tile_id,
        );
        drop(denoised);
        drop(companion);
        let ard = formatted.map_err(|source| Error::ArdFormat {
            product_ids: unit.product_ids.clone(),
            source,
        })?;
        info!("Formatted {:?} and {:?}", ard.vv, ard.vh);

        let outcome = if unit.upload_outputs {
            self.enter(Stage::Upload, unit);
            self.upload(unit, &ard)?
        } else {
            info!("Upload skipped, outputs kept in {:?}", ard.dir);
            ArdOutcome {
                file_count: SKIPPED_UPLOAD_FILE_COUNT,
                remote_path: String::new(),
            }
        };
        self.enter(Stage::Done, unit);
        Ok(outcome)
    }

    /// Stage every valid product of the unit into `staging`.
    ///
    /// Invalid ids and per-product download failures are tolerated; the stage
    /// fails only when nothing ends up staged.
    pub fn resolve_inputs(
        &self,
        unit: &PipelineUnit,
        staging: &Path,
    ) -> Result<Vec<ProductIdentifier>> {
        let catalog = self.collaborators.catalog.as_ref();
        let mut staged = Vec::new();
        for raw in &unit.product_ids {
            let product = match ProductIdentifier::parse(raw) {
                Ok(product) => product,
                Err(e) => {
                    warn!("S1 product id {} is not valid: {}", raw, e);
                    continue;
                }
            };
            let unpacked = staging.join(product.product_id());
            if unpacked.exists() {
                info!("S1 product {} is already available on disk", raw);
                staged.push(product);
                continue;
            }
            if let Err(e) = catalog.fetch(&product, staging) {
                error!(
                    "No product downloaded for {} from {}: {}",
                    raw,
                    catalog.source_name(),
                    e
                );
                continue;
            }
            let packed = staging.join(product.safe_name());
            if packed.exists() {
                if let Err(e) = fs::rename(&packed, &unpacked) {
                    error!("Cannot unpack {:?}: {}", packed, e);
                    continue;
                }
            }
            if unpacked.exists() {
                staged.push(product);
            } else {
                error!("Download of {} reported success but staged nothing", raw);
            }
        }

        if staged.is_empty() {
            return Err(Error::InputDownload {
                product_ids: unit.product_ids.clone(),
                source_name: catalog.source_name().to_string(),
            });
        }
        Ok(staged)
    }

    fn process(
        &self,
        unit: &PipelineUnit,
        sizing: &ClusterSizing,
        staging: &Path,
        tree: &Path,
        remove_thermal_noise: bool,
    ) -> Result<()> {
        let paths = EnginePaths {
            output: tree.to_path_buf(),
            s1_images: staging.to_path_buf(),
            dem: unit.dem_dir.clone(),
            tmp: tree.to_path_buf(),
        };
        let config = self
            .config
            .processing
            .builder(paths, &unit.tile_id, *sizing)
            .remove_thermal_noise(remove_thermal_noise)
            .build()?;
        let config_path = config.write_to(tree)?;
        let output_dir = tree.join(&unit.tile_id);
        let run = EngineRun {
            config_path: &config_path,
            input_dir: staging,
            output_dir: &output_dir,
            dem_dir: &unit.dem_dir,
            tile_id: &unit.tile_id,
            remove_thermal_noise,
        };
        self.collaborators
            .processor
            .process(&run)
            .map_err(|source| Error::Processor {
                product_ids: unit.product_ids.clone(),
                tile_id: unit.tile_id.clone(),
                with_noise_removal: remove_thermal_noise,
                source,
            })
    }

    /// Mirror this unit's product directory only; sibling units share the ARD root.
    fn upload(&self, unit: &PipelineUnit, ard: &ArdProduct) -> Result<ArdOutcome> {
        let upload = &self.config.upload;
        let key = upload.product_key(&self.prod_id, &ard.relative_dir);
        info!("Push {:?} to s3://{}/{}", ard.dir, upload.bucket, key);
        let file_count = self
            .collaborators
            .store
            .upload_dir(&ard.dir, &upload.bucket, &key)
            .map_err(|source| Error::Upload {
                local: ard.dir.clone(),
                bucket: upload.bucket.clone(),
                prefix: key.clone(),
                source,
            })?;
        if unit.clean {
            info!("Remove {:?}", ard.dir);
            fs::remove_dir_all(&ard.dir)?;
        }
        Ok(ArdOutcome {
            file_count,
            remote_path: format!("s3://{}/{}", upload.bucket, key),
        })
    }
}

/// First id of `group` that parses, used to name the unit's ARD product.
pub fn first_valid_product(group: &[String]) -> Option<ProductIdentifier> {
    group.iter().find_map(|id| ProductIdentifier::parse(id).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::collaborators::{DemProvider, ObjectStore, ProductCatalog, Processor};
    use crate::io::external::ToolError;
    use std::cell::RefCell;

    const A1: &str = "S1A_IW_GRDH_1SDV_20210708T060040_20210708T060105_038682_04908E_3178";
    const A2: &str = "S1A_IW_GRDH_1SDV_20210708T060105_20210708T060130_038682_04908E_6E0A";

    struct StagingCatalog {
        fetched: RefCell<Vec<String>>,
        fail: Vec<&'static str>,
    }

    impl ProductCatalog for StagingCatalog {
        fn source_name(&self) -> &str {
            "test-catalog"
        }

        fn fetch(&self, product: &ProductIdentifier, dir: &Path) -> std::result::Result<(), ToolError> {
            self.fetched.borrow_mut().push(product.product_id().to_string());
            if self.fail.iter().any(|id| *id == product.product_id()) {
                return Err(ToolError::Other("not found".into()));
            }
            fs::create_dir_all(dir.join(product.safe_name()))
                .map_err(|e| ToolError::Other(e.to_string()))
        }
    }

    struct NoDem;

    impl DemProvider for NoDem {
        fn source_name(&self) -> &str {
            "none"
        }

        fn fetch_tile(&self, _: &str, _: &Path) -> std::result::Result<(), ToolError> {
            Err(ToolError::NotConfigured { tool: "DEM" })
        }
    }

    struct FailingEngine;

    impl Processor for FailingEngine {
        fn process(&self, _: &EngineRun<'_>) -> std::result::Result<(), ToolError> {
            Err(ToolError::Other("segfault".into()))
        }
    }

    struct NoStore;

    impl ObjectStore for NoStore {
        fn upload_dir(&self, _: &Path, _: &str, _: &str) -> std::result::Result<usize, ToolError> {
            Err(ToolError::NotConfigured { tool: "uploader" })
        }
    }

    fn collaborators(fail: Vec<&'static str>) -> Collaborators {
        Collaborators {
            catalog: Box::new(StagingCatalog {
                fetched: RefCell::new(Vec::new()),
                fail,
            }),
            dem: Box::new(NoDem),
            processor: Box::new(FailingEngine),
            store: Box::new(NoStore),
        }
    }

    fn host() -> HostResources {
        HostResources {
            physical_cores: 4,
            logical_cores: 8,
            total_ram_bytes: 16 * 1024 * 1024 * 1024,
        }
    }

    fn unit(root: &Path, ids: &[&str], clean: bool) -> PipelineUnit {
        PipelineUnit {
            tile_id: "31TCJ".into(),
            product_ids: ids.iter().map(|s| s.to_string()).collect(),
            dem_dir: root.join("dem"),
            out_root: root.join("out"),
            working_dir: root.join("wd"),
            upload_outputs: false,
            clean,
        }
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::InputResolution.to_string(), "INPUT_RESOLUTION");
        assert_eq!(Stage::Done.to_string(), "DONE");
    }

    #[test]
    fn invalid_ids_and_failed_downloads_are_tolerated() {
        let root = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig::default();
        let collab = collaborators(vec![A2]);
        let pipeline = ArdPipeline::new(&config, &collab, host(), "0000_000_test");
        let u = unit(root.path(), &["not-an-id", A1, A2], false);
        let staging = root.path().join("staging");
        fs::create_dir_all(&staging).unwrap();

        let staged = pipeline.resolve_inputs(&u, &staging).unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].product_id(), A1);
        assert!(staging.join(A1).is_dir());
        assert!(!staging.join(format!("{}.SAFE", A1)).exists());
    }

    #[test]
    fn engine_failure_cleans_staged_inputs() {
        let root = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig::default();
        let collab = collaborators(vec![]);
        let pipeline = ArdPipeline::new(&config, &collab, host(), "0000_000_test");
        let u = unit(root.path(), &[A1], true);

        let err = pipeline.run(&u).unwrap_err();
        assert!(matches!(
            err,
            Error::Processor {
                with_noise_removal: true,
                ..
            }
        ));
        assert_eq!(err.exit_code(), 4);
        assert!(!u.working_dir.join(STAGING_DIRNAME).join("31TCJ").exists());
        assert!(!u.working_dir.join(DENOISED_TREE_DIRNAME).exists());
    }

    #[test]
    fn engine_failure_keeps_inputs_without_clean() {
        let root = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig::default();
        let collab = collaborators(vec![]);
        let pipeline = ArdPipeline::new(&config, &collab, host(), "0000_000_test");
        let u = unit(root.path(), &[A1], false);

        assert!(pipeline.run(&u).is_err());
        let staged = u.working_dir.join(STAGING_DIRNAME).join("31TCJ").join(A1);
        assert!(staged.is_dir());
        assert!(
            u.working_dir
                .join(DENOISED_TREE_DIRNAME)
                .join(crate::io::engine_config::ENGINE_CONFIG_FILENAME)
                .is_file()
        );
    }

    #[test]
    fn first_valid_product_skips_garbage() {
        let group = vec!["x".to_string(), A2.to_string(), A1.to_string()];
        assert_eq!(first_valid_product(&group).unwrap().product_id(), A2);
        assert!(first_valid_product(&["y".to_string()]).is_none());
    }
}
