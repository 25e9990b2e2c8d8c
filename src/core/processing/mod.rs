//! Pixel-level work the orchestrator does itself: companion masking and
//! quantized dB encoding (`ops`), and ARD product formatting (`format`).
pub mod format;
pub mod ops;

pub use format::{ArdFormatter, ArdProduct, EngineOutputs, FormatError};
