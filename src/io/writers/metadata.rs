use std::collections::BTreeMap;

use gdal::{Dataset, Metadata};

use crate::io::gdal::GdalError;
use crate::io::sentinel1::ProductIdentifier;
use crate::types::{Calibration, OrbitDirection};

/// Provenance of one ARD band, embedded as default-domain TIFF metadata
#[derive(Debug, Clone)]
pub struct ArdTags<'a> {
    pub product: &'a ProductIdentifier,
    pub tile_id: &'a str,
    pub calibration: Calibration,
    pub orbit_direction: OrbitDirection,
    pub polarization: &'a str,
    pub nodata: u16,
}

/// Extract all metadata fields of an ARD band into an ordered map
pub fn ard_metadata_fields(tags: &ArdTags<'_>) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    let prd = tags.product;

    metadata.insert("PLATFORM".to_string(), prd.mission_id.to_string());
    metadata.insert("BEAM_MODE".to_string(), prd.beam_mode.to_string());
    metadata.insert("ACQUISITION_START".to_string(), prd.start_time_code());
    metadata.insert(
        "ACQUISITION_STOP".to_string(),
        prd.stop_time.format(crate::io::sentinel1::DATETIME_FORMAT).to_string(),
    );
    metadata.insert(
        "ABSOLUTE_ORBIT_NUMBER".to_string(),
        prd.absolute_orbit_number.clone(),
    );
    metadata.insert(
        "MISSION_DATATAKE_ID".to_string(),
        prd.mission_datatake_id.clone(),
    );
    metadata.insert("SOURCE_PRODUCT".to_string(), prd.product_id().to_string());
    metadata.insert("ORBIT_DIRECTION".to_string(), tags.orbit_direction.to_string());
    metadata.insert("TILE_ID".to_string(), tags.tile_id.to_string());
    metadata.insert("CALIBRATION".to_string(), tags.calibration.ard_tag().to_string());
    metadata.insert("POLARIZATION".to_string(), tags.polarization.to_string());

    // Decoding hint: linear = 10^((20*log10(dn) - 83) / 10)
    metadata.insert("ENCODING".to_string(), "DN=10^((10*log10(x)+83)/20)".to_string());
    metadata.insert("NODATA".to_string(), tags.nodata.to_string());

    metadata.insert(
        "CONVERSION_TOOL".to_string(),
        env!("CARGO_PKG_NAME").to_string(),
    );
    metadata.insert(
        "CONVERSION_VERSION".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    metadata
}

/// Embed the ARD fields into a dataset's default metadata domain
pub fn embed_tiff_metadata(ds: &mut Dataset, tags: &ArdTags<'_>) -> Result<(), GdalError> {
    for (key, value) in ard_metadata_fields(tags) {
        ds.set_metadata_item(&key, &value, "")?;
    }
    Ok(())
}
