use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use s1ard::{Calibration, DemFailurePolicy, FormatMode};

#[derive(Parser)]
#[command(name = "s1ard", version, about = "Generate Sentinel-1 ARD over Sentinel-2 tiles")]
pub struct CliArgs {
    /// Output root; ARD products are written below `<OUT_DIR>/s1_ard` [default: system temp dir]
    #[arg(short = 'o', long)]
    pub out_dir: Option<PathBuf>,

    /// Working directory root [default: system temp dir]
    #[arg(short = 'w', long)]
    pub working_dir: Option<PathBuf>,

    /// Existing DEM directory; skips the DEM download
    #[arg(long)]
    pub dem_dir: Option<PathBuf>,

    /// Keep every working directory and file
    #[arg(long, default_value_t = false)]
    pub no_clean: bool,

    /// Skip the upload of ARD files to object storage
    #[arg(long, default_value_t = false)]
    pub no_upload: bool,

    /// Production id used in the remote key [default: 0000_000_<now>]
    #[arg(long)]
    pub prod_id: Option<String>,

    /// Source of the S1 input data
    #[arg(long)]
    pub data_source: Option<String>,

    /// Source of the DEM data
    #[arg(long)]
    pub dem_source: Option<String>,

    /// Orchestrator configuration (JSON)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Radiometric calibration requested from the engine
    #[arg(long, value_enum)]
    pub calibration: Option<Calibration>,

    /// How engine outputs become ARD files
    #[arg(long, value_enum)]
    pub format_mode: Option<FormatMode>,

    /// What a DEM failure aborts
    #[arg(long, value_enum)]
    pub dem_failure_policy: Option<DemFailurePolicy>,

    /// -v for INFO, -vv for DEBUG (RUST_LOG takes precedence)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate ARD from S1 GRD product ids
    #[command(name = "prd-ids", alias = "prd_ids")]
    PrdIds {
        /// Sentinel-2 tile id, e.g. 31TCJ
        tile_id: String,
        /// Sentinel-1 product ids
        #[arg(required = true)]
        product_ids: Vec<String>,
    },
    /// Generate ARD from a work plan in JSON format
    Wp {
        work_plan: PathBuf,
    },
}
