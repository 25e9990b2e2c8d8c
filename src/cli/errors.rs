use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{failed} unit(s) failed, first failure: {first}")]
    BatchFailed {
        failed: usize,
        first: String,
        exit_code: u8,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Library(#[from] s1ard::Error),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::BatchFailed { exit_code, .. } => *exit_code,
            AppError::Library(e) => e.exit_code(),
            AppError::Io(_) => s1ard::error::EXIT_UNEXPECTED,
        }
    }
}
