//! GeoTIFF writers for ARD bands and their embedded provenance metadata.
pub mod metadata;
pub mod tiff;
