use gdal::raster::ResampleAlg;
use gdal::{Dataset, Metadata, errors::GdalError as GdalCrateError};
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors encountered when using GDAL reader
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
}

/// Metadata extracted from a GDAL-supported dataset
#[derive(Debug, Clone)]
pub struct RasterMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: Option<[f64; 6]>,
    /// Projection in WKT format (empty when unknown)
    pub projection: String,
    /// Default-domain metadata key-value pairs
    pub items: HashMap<String, String>,
}

/// Single-file raster opened through GDAL (engine outputs are one-band GeoTIFFs)
pub struct GdalRaster {
    pub dataset: Dataset,
    pub metadata: RasterMetadata,
}

impl GdalRaster {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let geotransform = dataset.geo_transform().ok();
        let projection = dataset.projection();
        let mut items = HashMap::new();
        if let Some(entries) = dataset.metadata_domain("") {
            for entry in entries {
                if let Some((key, val)) = entry.split_once('=') {
                    items.insert(key.to_string(), val.to_string());
                }
            }
        }
        Ok(GdalRaster {
            dataset,
            metadata: RasterMetadata {
                size_x: size_x as usize,
                size_y: size_y as usize,
                bands,
                geotransform,
                projection,
                items,
            },
        })
    }

    pub fn metadata_item(&self, key: &str) -> Option<&str> {
        self.metadata.items.get(key).map(String::as_str)
    }

    /// Declared no-data value of a band (1-based index)
    pub fn no_data_value(&self, index: usize) -> Result<Option<f64>, GdalError> {
        Ok(self.dataset.rasterband(index)?.no_data_value())
    }

    /// Read a single band (1-based index) as an f64 ndarray of shape (height, width)
    pub fn read_band(&self, index: usize) -> Result<Array2<f64>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<f64>(
            (0, 0),
            window,
            window,
            Some(ResampleAlg::NearestNeighbour),
        )?;
        let data_vec = buf.data().to_vec();
        let array = Array2::from_shape_vec((self.metadata.size_y, self.metadata.size_x), data_vec)
            .map_err(|_| {
                GdalError::DimensionMismatch(
                    self.metadata.size_x,
                    self.metadata.size_y,
                    self.metadata.size_x,
                    self.metadata.size_y,
                )
            })?;
        Ok(array)
    }
}
