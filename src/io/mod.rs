//! I/O layer: Sentinel-1 product identifiers, the engine configuration
//! artifact, GDAL-backed raster reading and ARD writers, work plans, and the
//! external collaborators (catalog, DEM, engine, object storage).
pub mod sentinel1;
pub use sentinel1::{ProductIdError, ProductIdentifier};

pub mod gdal;
pub use gdal::{GdalError, GdalRaster, RasterMetadata};

pub mod engine_config;
pub use engine_config::{EngineConfig, EnginePaths, ProcessingConfigBuilder};

pub mod external;
pub use external::{ExternalCommand, ToolError};

pub mod collaborators;
pub use collaborators::{
    Collaborators, DemProvider, EngineRun, ObjectStore, ProductCatalog, Processor,
};

pub mod workplan;
pub use workplan::{ProductIdGroups, TileEntry, WorkPlan};

pub mod writers;
