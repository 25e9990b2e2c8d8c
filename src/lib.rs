#![doc = r#"
s1ard — Sentinel-1 Analysis-Ready-Data orchestration.

Given raw Sentinel-1 product identifiers and a Sentinel-2 tile, this crate stages
the inputs, runs an external SAR processing engine twice (with and without thermal
noise removal), turns the engine rasters into canonical uint16 ARD GeoTIFFs and
mirrors them to object storage, removing its working state on every exit path.

The heavy lifting (orthorectification, calibration, downloads, uploads) is done by
external collaborators behind traits in [`io::collaborators`]; this crate decides
ordering, failure policy, engine sizing and directory lifecycle.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Quick start: one tile, explicit products
----------------------------------------
```rust,no_run
use std::path::PathBuf;
use s1ard::{BatchOptions, OrchestratorConfig, generate_from_product_ids};

fn main() -> s1ard::Result<()> {
    let config = OrchestratorConfig::load(None)?;
    let options = BatchOptions {
        out_root: PathBuf::from("/out"),
        working_dir: PathBuf::from("/tmp/s1ard"),
        dem_dir: Some(PathBuf::from("/data/dem/31TCJ")),
        upload_outputs: false,
        clean: true,
    };
    let ids = vec![
        "S1A_IW_GRDH_1SDV_20210708T060040_20210708T060105_038682_04908E_3178".to_string(),
    ];
    let report = generate_from_product_ids("31TCJ", &ids, options, &config)?;
    println!("succeeded={} failed={}", report.succeeded(), report.failed());
    Ok(())
}
```

Work plans
----------
```rust,no_run
use std::path::{Path, PathBuf};
use s1ard::{BatchOptions, OrchestratorConfig, generate_from_work_plan};

fn main() -> s1ard::Result<()> {
    let config = OrchestratorConfig::load(Some(Path::new("s1ard.json")))?;
    let options = BatchOptions {
        out_root: PathBuf::from("/out"),
        working_dir: PathBuf::from("/tmp/s1ard"),
        dem_dir: None,
        upload_outputs: true,
        clean: true,
    };
    let report = generate_from_work_plan(Path::new("wp.json"), options, &config)?;
    if let Some(e) = report.first_error() {
        eprintln!("first failure (exit {}): {e}", e.exit_code());
    }
    Ok(())
}
```

Product identifiers
-------------------
```rust
use s1ard::ProductIdentifier;

let prd = ProductIdentifier::parse(
    "S1B_IW_GRDH_1SDV_20180325T153530_20180325T153557_010190_012836_761E.SAFE",
)
.unwrap();
assert_eq!(prd.start_date_key(), "20180325");
assert!(!ProductIdentifier::is_valid("S1C_IW_GRDH_1SDV_bad"));
```

Error handling
--------------
All fallible functions return `s1ard::Result<T>`. Pipeline failures carry their kind
(`DemDownload`, `InputDownload`, `Processor`, `ArdFormat`, `Upload`) and
[`Error::exit_code`] maps them onto process exit codes 2 to 5; anything else is 1.

Useful modules
--------------
- [`api`] — high-level entry points.
- [`core`] — configuration, sizing, formatting, pipeline and scheduler.
- [`io`] — identifiers, engine configuration, GDAL rasters, work plans, collaborators.
- [`types`] — shared enums.
- [`error`] — crate-level `Error` and `Result`.
"#]

pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
pub use crate::core::params::OrchestratorConfig;
pub use crate::core::pipeline::{ArdOutcome, ArdPipeline, PipelineUnit, Stage};
pub use crate::core::processing::format::{ArdFormatter, ArdProduct, FormatError};
pub use crate::core::scheduler::{BatchOptions, BatchReport, BatchScheduler, TileReport, UnitReport};
pub use crate::core::sizing::{ClusterSizing, HostResources, size_cluster};
pub use error::{Error, Result};
pub use types::{Calibration, DemFailurePolicy, FormatMode, Interpolation, OrbitDirection};

pub use io::collaborators::{Collaborators, DemProvider, ObjectStore, ProductCatalog, Processor};
pub use io::engine_config::{EngineConfig, ProcessingConfigBuilder};
pub use io::gdal::GdalError;
pub use io::sentinel1::{ProductIdError, ProductIdentifier};
pub use io::workplan::WorkPlan;

pub use api::{
    generate_from_product_ids, generate_from_product_ids_with, generate_from_work_plan,
    generate_from_work_plan_with, resolve_prod_id,
};
