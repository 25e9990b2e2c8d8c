//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, GDAL, identifier and tool errors, and provides the
//! pipeline failure kinds that map onto process exit codes.
use std::path::PathBuf;

use thiserror::Error;

use crate::core::processing::format::FormatError;
use crate::io::external::ToolError;

pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for failures without a dedicated kind.
pub const EXIT_UNEXPECTED: u8 = 1;
pub const EXIT_DEM_DOWNLOAD: u8 = 2;
pub const EXIT_INPUT_DOWNLOAD: u8 = 3;
pub const EXIT_PROCESSOR: u8 = 4;
pub const EXIT_ARD_FORMAT: u8 = 5;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("Product identifier error: {0}")]
    Identifier(#[from] crate::io::ProductIdError),

    #[error("Invalid configuration: {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Invalid work plan {path:?}: {reason}")]
    WorkPlan { path: PathBuf, reason: String },

    #[error("No elevation available for tile {tile_id} from {source_name}: {reason}")]
    DemDownload {
        tile_id: String,
        source_name: String,
        reason: String,
    },

    #[error("No input product staged from {source_name} for {product_ids:?}")]
    InputDownload {
        product_ids: Vec<String>,
        source_name: String,
    },

    #[error(
        "Processing failed for {product_ids:?} over {tile_id} (thermal noise removal: {with_noise_removal}): {source}"
    )]
    Processor {
        product_ids: Vec<String>,
        tile_id: String,
        with_noise_removal: bool,
        #[source]
        source: ToolError,
    },

    #[error("ARD formatting failed for {product_ids:?}: {source}")]
    ArdFormat {
        product_ids: Vec<String>,
        #[source]
        source: FormatError,
    },

    #[error("Upload of {local:?} to s3://{bucket}/{prefix} failed: {source}")]
    Upload {
        local: PathBuf,
        bucket: String,
        prefix: String,
        #[source]
        source: ToolError,
    },

    #[error("Number of products must be at least 1, got: {count}")]
    InvalidProductCount { count: usize },
}

impl Error {
    /// Process exit code reported by the CLI for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::DemDownload { .. } => EXIT_DEM_DOWNLOAD,
            Error::InputDownload { .. } => EXIT_INPUT_DOWNLOAD,
            Error::Processor { .. } | Error::Upload { .. } => EXIT_PROCESSOR,
            Error::ArdFormat { .. } => EXIT_ARD_FORMAT,
            _ => EXIT_UNEXPECTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_failure_kind() {
        let dem = Error::DemDownload {
            tile_id: "31TCJ".into(),
            source_name: "creodias".into(),
            reason: "unreachable".into(),
        };
        assert_eq!(dem.exit_code(), 2);

        let input = Error::InputDownload {
            product_ids: vec!["a".into()],
            source_name: "aws".into(),
        };
        assert_eq!(input.exit_code(), 3);

        let processor = Error::Processor {
            product_ids: vec![],
            tile_id: "31TCJ".into(),
            with_noise_removal: false,
            source: ToolError::NotConfigured { tool: "processor" },
        };
        assert_eq!(processor.exit_code(), 4);

        let upload = Error::Upload {
            local: PathBuf::from("/tmp/out"),
            bucket: "b".into(),
            prefix: "p".into(),
            source: ToolError::NotConfigured { tool: "uploader" },
        };
        assert_eq!(upload.exit_code(), 4);

        let format = Error::ArdFormat {
            product_ids: vec![],
            source: FormatError::MissingRaster {
                dir: PathBuf::from("/tmp"),
                polarization: "vv",
            },
        };
        assert_eq!(format.exit_code(), 5);

        assert_eq!(Error::InvalidProductCount { count: 0 }.exit_code(), 1);
    }
}
