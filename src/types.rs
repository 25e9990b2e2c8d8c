//! Shared types and enums used across the orchestrator.
//! Includes `Calibration`, `Interpolation`, `OrbitDirection`, `FormatMode`
//! and `DemFailurePolicy`, plus tile identifier validation.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Radiometric calibration requested from the processing engine.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calibration {
    Sigma,
    Beta,
    Gamma,
}

impl Calibration {
    /// Value written into the engine configuration.
    pub fn as_config_value(&self) -> &'static str {
        match self {
            Calibration::Sigma => "sigma",
            Calibration::Beta => "beta",
            Calibration::Gamma => "gamma",
        }
    }

    /// Tag appended to ARD file names.
    pub fn ard_tag(&self) -> &'static str {
        match self {
            Calibration::Sigma => "SIGMA0",
            Calibration::Beta => "BETA0",
            Calibration::Gamma => "GAMMA0",
        }
    }
}

impl std::fmt::Display for Calibration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_config_value())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    Linear,
    Bco,
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interpolation::Nearest => write!(f, "nearest"),
            Interpolation::Linear => write!(f, "linear"),
            Interpolation::Bco => write!(f, "bco"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum OrbitDirection {
    Ascending,
    Descending,
}

impl OrbitDirection {
    /// Parse a metadata value such as `ASC`, `DES`, `ASCENDING` or `descending`.
    pub fn from_metadata(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASC" | "ASCENDING" => Some(OrbitDirection::Ascending),
            "DES" | "DSC" | "DESCENDING" => Some(OrbitDirection::Descending),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            OrbitDirection::Ascending => "ASC",
            OrbitDirection::Descending => "DES",
        }
    }
}

impl std::fmt::Display for OrbitDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// How engine outputs are turned into ARD files.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatMode {
    /// Re-encode to masked, quantized uint16 rasters.
    Convert,
    /// Move engine outputs to their canonical paths untouched.
    RenameOnly,
}

/// What the scheduler does when a tile's DEM cannot be acquired.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemFailurePolicy {
    /// Skip the tile's units, record the error and continue with the next tile.
    AbortTile,
    /// Stop the whole batch with the DEM error.
    AbortBatch,
}

/// Check a Sentinel-2 (MGRS) tile identifier such as `31TCJ`.
pub fn check_tile_id(tile_id: &str) -> Result<()> {
    let bytes = tile_id.as_bytes();
    let valid = bytes.len() == 5
        && bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[2..].iter().all(u8::is_ascii_uppercase);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument {
            arg: "tile_id",
            value: tile_id.to_string(),
        })
    }
}
