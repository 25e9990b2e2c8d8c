use std::fs;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use s1ard::api::{generate_from_product_ids, generate_from_work_plan};
use s1ard::{BatchOptions, BatchReport, OrchestratorConfig};

use super::args::{CliArgs, Command};
use super::errors::AppError;

/// Install the fmt subscriber; `RUST_LOG` wins over `-v`/`-vv`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &CliArgs) -> Result<OrchestratorConfig, AppError> {
    let mut config = OrchestratorConfig::load(args.config.as_deref())?;
    if let Some(source) = &args.data_source {
        config.data_source = source.clone();
    }
    if let Some(source) = &args.dem_source {
        config.dem_source = source.clone();
    }
    if let Some(prod_id) = &args.prod_id {
        config.upload.prod_id = Some(prod_id.clone());
    }
    if let Some(calibration) = args.calibration {
        config.processing.calibration = calibration;
    }
    if let Some(mode) = args.format_mode {
        config.format_mode = mode;
    }
    if let Some(policy) = args.dem_failure_policy {
        config.dem_failure_policy = policy;
    }
    // Flags may have replaced validated values.
    config.validate()?;
    Ok(config)
}

fn batch_options(args: &CliArgs) -> Result<BatchOptions, AppError> {
    let out_root = args.out_dir.clone().unwrap_or_else(std::env::temp_dir);
    let working_dir = args.working_dir.clone().unwrap_or_else(std::env::temp_dir);
    fs::create_dir_all(&out_root)?;
    fs::create_dir_all(&working_dir)?;
    Ok(BatchOptions {
        out_root,
        working_dir,
        dem_dir: args.dem_dir.clone(),
        upload_outputs: !args.no_upload,
        clean: !args.no_clean,
    })
}

fn summarize(report: &BatchReport) -> Result<(), AppError> {
    for tile in &report.tiles {
        if let Some(e) = &tile.dem_error {
            error!("Tile {} skipped: {}", tile.tile_id, e);
        }
        for unit in &tile.units {
            match &unit.result {
                Ok(outcome) => info!(
                    "{} {}: {} file(s) {}",
                    unit.tile_id, unit.date_key, outcome.file_count, outcome.remote_path
                ),
                Err(e) => error!("{} {}: {}", unit.tile_id, unit.date_key, e),
            }
        }
    }
    match report.first_error() {
        None => Ok(()),
        Some(e) => Err(AppError::BatchFailed {
            failed: report.failed() + report.tiles.iter().filter(|t| t.dem_error.is_some()).count(),
            first: e.to_string(),
            exit_code: e.exit_code(),
        }),
    }
}

pub fn run(args: CliArgs) -> Result<(), AppError> {
    let config = load_config(&args)?;
    let options = batch_options(&args)?;
    info!("Output root: {:?}", options.out_root);
    info!("Working root: {:?}", options.working_dir);
    if let Some(dem) = &options.dem_dir {
        info!("DEM directory: {:?}", dem);
    }

    let report = match &args.command {
        Command::PrdIds {
            tile_id,
            product_ids,
        } => {
            info!(
                "Generating S1 ARD for {:?} over tile {}",
                product_ids, tile_id
            );
            generate_from_product_ids(tile_id, product_ids, options, &config)?
        }
        Command::Wp { work_plan } => {
            info!("Generating S1 ARD for the work plan {:?}", work_plan);
            generate_from_work_plan(work_plan, options, &config)?
        }
    };
    summarize(&report)?;
    info!("Generation of S1 ARD ended");
    Ok(())
}
