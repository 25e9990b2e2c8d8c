use gdal::DriverManager;
use gdal::raster::{Buffer, ColorInterpretation, RasterCreationOptions};
use std::path::Path;

use crate::io::gdal::{GdalError, RasterMetadata};
use crate::io::writers::metadata::{ArdTags, embed_tiff_metadata};

/// Block edge of tiled ARD rasters.
pub const ARD_BLOCK_SIZE: usize = 512;

/// Creation options shared by every ARD band: tiled 512x512 blocks, DEFLATE compression.
fn ard_creation_options() -> Result<RasterCreationOptions, GdalError> {
    let block = ARD_BLOCK_SIZE.to_string();
    let mut options = RasterCreationOptions::new();
    options.set_name_value("TILED", "YES")?;
    options.set_name_value("BLOCKXSIZE", &block)?;
    options.set_name_value("BLOCKYSIZE", &block)?;
    options.set_name_value("COMPRESS", "DEFLATE")?;
    Ok(options)
}

/// Write a single-band uint16 ARD GeoTIFF, carrying over the source georeferencing.
pub fn write_ard_tiff_u16(
    output: &Path,
    cols: usize,
    rows: usize,
    data: &[u16],
    nodata: u16,
    georef: &RasterMetadata,
    tags: Option<&ArdTags<'_>>,
) -> Result<(), GdalError> {
    if data.len() != cols * rows {
        return Err(GdalError::DimensionMismatch(cols, rows, data.len(), 1));
    }
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options = ard_creation_options()?;
    let mut ds =
        driver.create_with_band_type_with_options::<u16, _>(output, cols, rows, 1, &options)?;
    if let Some(gt) = georef.geotransform {
        ds.set_geo_transform(&gt)?;
    }
    if !georef.projection.is_empty() {
        ds.set_projection(&georef.projection)?;
    }
    if let Some(tags) = tags {
        embed_tiff_metadata(&mut ds, tags)?;
    }

    let mut band = ds.rasterband(1)?;
    band.set_color_interpretation(ColorInterpretation::GrayIndex)?;
    band.set_no_data_value(Some(nodata as f64))?;
    let mut buf = Buffer::new((cols, rows), data.to_vec());
    band.write((0, 0), (cols, rows), &mut buf)?;
    Ok(())
}
