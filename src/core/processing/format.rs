//! Engine output to canonical ARD product.
//!
//! The engine leaves one co-polarized and one cross-polarized raster per tile.
//! They are either moved as-is to their canonical paths or re-encoded to masked,
//! quantized uint16 bands:
//!
//! `SAR/<tile[0:2]>/<tile[2]>/<tile[3:]>/<year>/<YYYYMMDD>/<name>/<name>_<CAL>_{VV|VH}.tif`
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::core::processing::ops::{ARD_NODATA, companion_validity, encode_masked};
use crate::io::gdal::{GdalError, GdalRaster};
use crate::io::sentinel1::ProductIdentifier;
use crate::io::writers::metadata::ArdTags;
use crate::io::writers::tiff::write_ard_tiff_u16;
use crate::types::{Calibration, FormatMode, OrbitDirection, check_tile_id};

/// Relative orbit token of ARD names; not derivable from the product identifier.
pub const RELATIVE_ORBIT_PLACEHOLDER: &str = "TODO";

/// GDAL metadata item carrying the pass direction of an engine raster.
pub const ORBIT_DIRECTION_ITEM: &str = "ORBIT_DIRECTION";

const ASCENDING_MARKER: &str = "_ASC_";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("No {polarization} raster found in {dir:?}")]
    MissingRaster {
        dir: PathBuf,
        polarization: &'static str,
    },
    #[error("Companion raster {path:?} not found")]
    MissingCompanion { path: PathBuf },
    #[error("Raster {path:?} is {found:?}, its companion is {expected:?}")]
    ShapeMismatch {
        path: PathBuf,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Invalid tile id: {0}")]
    InvalidTile(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalError),
}

/// Canonical names of one ARD product, relative to the ARD root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArdNaming {
    pub name: String,
    pub relative_dir: PathBuf,
    pub vv_file: String,
    pub vh_file: String,
}

/// Derive the canonical directory and file names. Pure: equal inputs give equal names.
pub fn ard_naming(
    product: &ProductIdentifier,
    tile_id: &str,
    orbit_direction: OrbitDirection,
    calibration: Calibration,
) -> ArdNaming {
    let name = [
        product.mission_id.code().to_string(),
        product.start_time_code(),
        orbit_direction.code().to_string(),
        RELATIVE_ORBIT_PLACEHOLDER.to_string(),
        product.orbit_datatake_unique(),
        tile_id.to_string(),
    ]
    .join("_");

    let relative_dir = Path::new("SAR")
        .join(tile_id.get(..2).unwrap_or_default())
        .join(tile_id.get(2..3).unwrap_or_default())
        .join(tile_id.get(3..).unwrap_or_default())
        .join(product.start_time.format("%Y").to_string())
        .join(product.start_date_key())
        .join(&name);
    let tag = calibration.ard_tag();
    ArdNaming {
        vv_file: format!("{}_{}_VV.tif", name, tag),
        vh_file: format!("{}_{}_VH.tif", name, tag),
        relative_dir,
        name,
    }
}

/// First `.tif` in `dir` (sorted by name) whose name contains `polarization`.
pub fn find_polarization_raster(
    dir: &Path,
    polarization: &'static str,
) -> Result<PathBuf, FormatError> {
    let missing = || FormatError::MissingRaster {
        dir: dir.to_path_buf(),
        polarization,
    };
    let entries = fs::read_dir(dir).map_err(|_| missing())?;
    let mut matches: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(".tif") && name.contains(polarization) {
            matches.push(path);
        }
    }
    matches.sort();
    matches.into_iter().next().ok_or_else(missing)
}

/// Pass direction from the raster metadata, else from the `_ASC_` file name marker.
pub fn orbit_direction_of(raster: &Path, metadata_value: Option<&str>) -> OrbitDirection {
    if let Some(direction) = metadata_value.and_then(OrbitDirection::from_metadata) {
        return direction;
    }
    let ascending = raster
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains(ASCENDING_MARKER));
    if ascending {
        OrbitDirection::Ascending
    } else {
        OrbitDirection::Descending
    }
}

/// Formatted ARD product: the two band files and their directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArdProduct {
    pub dir: PathBuf,
    /// `dir` relative to the ARD root, mirrored as-is in object storage
    pub relative_dir: PathBuf,
    pub vv: PathBuf,
    pub vh: PathBuf,
}

/// Engine trees consumed by the formatter
#[derive(Debug, Clone, Copy)]
pub struct EngineOutputs<'a> {
    /// Rasters of the thermal-noise-removed pass
    pub denoised: &'a Path,
    /// Rasters of the companion pass, used to mask true no-data
    pub companion: &'a Path,
}

#[derive(Debug, Clone, Copy)]
pub struct ArdFormatter {
    pub mode: FormatMode,
    pub calibration: Calibration,
    /// Delete engine rasters once converted
    pub clean_input: bool,
}

impl ArdFormatter {
    pub fn new(mode: FormatMode, calibration: Calibration) -> Self {
        Self {
            mode,
            calibration,
            clean_input: false,
        }
    }

    pub fn clean_input(mut self, clean: bool) -> Self {
        self.clean_input = clean;
        self
    }

    pub fn format(
        &self,
        outputs: EngineOutputs<'_>,
        ard_root: &Path,
        product: &ProductIdentifier,
        tile_id: &str,
    ) -> Result<ArdProduct, FormatError> {
        check_tile_id(tile_id).map_err(|_| FormatError::InvalidTile(tile_id.to_string()))?;
        let src_vv = find_polarization_raster(outputs.denoised, "vv")?;
        let src_vh = find_polarization_raster(outputs.denoised, "vh")?;

        let vv_raster = GdalRaster::open(&src_vv).ok();
        let metadata_direction = vv_raster
            .as_ref()
            .and_then(|r| r.metadata_item(ORBIT_DIRECTION_ITEM));
        let orbit_direction = orbit_direction_of(&src_vv, metadata_direction);
        drop(vv_raster);

        let naming = ard_naming(product, tile_id, orbit_direction, self.calibration);
        let dir = ard_root.join(&naming.relative_dir);
        debug!("Create output directory: {:?}", dir);
        fs::create_dir_all(&dir)?;
        let ard = ArdProduct {
            vv: dir.join(&naming.vv_file),
            vh: dir.join(&naming.vh_file),
            dir,
            relative_dir: naming.relative_dir,
        };

        match self.mode {
            FormatMode::RenameOnly => {
                fs::rename(&src_vv, &ard.vv)?;
                fs::rename(&src_vh, &ard.vh)?;
            }
            FormatMode::Convert => {
                for (src, dst, polarization) in [(&src_vv, &ard.vv, "VV"), (&src_vh, &ard.vh, "VH")]
                {
                    let tags = ArdTags {
                        product,
                        tile_id,
                        calibration: self.calibration,
                        orbit_direction,
                        polarization,
                        nodata: ARD_NODATA,
                    };
                    convert_band(src, outputs.companion, dst, &tags)?;
                }
                if self.clean_input {
                    fs::remove_file(&src_vv)?;
                    fs::remove_file(&src_vh)?;
                }
            }
        }
        info!("ARD product written to {:?}", ard.dir);
        Ok(ard)
    }
}

/// Mask `src` with its same-named companion and write the encoded uint16 band.
fn convert_band(
    src: &Path,
    companion_dir: &Path,
    dst: &Path,
    tags: &ArdTags<'_>,
) -> Result<(), FormatError> {
    let companion_path = match src.file_name() {
        Some(name) => companion_dir.join(name),
        None => companion_dir.to_path_buf(),
    };
    if !companion_path.is_file() {
        return Err(FormatError::MissingCompanion {
            path: companion_path,
        });
    }

    let primary = GdalRaster::open(src)?;
    let companion = GdalRaster::open(&companion_path)?;
    let values = primary.read_band(1)?;
    let companion_values = companion.read_band(1)?;
    if values.dim() != companion_values.dim() {
        return Err(FormatError::ShapeMismatch {
            path: src.to_path_buf(),
            expected: companion_values.dim(),
            found: values.dim(),
        });
    }

    let valid = companion_validity(&companion_values, companion.no_data_value(1)?);
    let encoded = encode_masked(&values, &valid, primary.no_data_value(1)?);
    let (rows, cols) = encoded.dim();
    let data: Vec<u16> = encoded.iter().copied().collect();
    debug!("Encoding {:?} -> {:?} ({}x{})", src, dst, cols, rows);
    write_ard_tiff_u16(
        dst,
        cols,
        rows,
        &data,
        ARD_NODATA,
        &primary.metadata,
        Some(tags),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdal::DriverManager;
    use gdal::raster::Buffer;

    const PRD: &str = "S1A_IW_GRDH_1SDV_20210708T060040_20210708T060105_038682_04908E_3178";

    fn product() -> ProductIdentifier {
        ProductIdentifier::parse(PRD).unwrap()
    }

    fn write_f32(path: &Path, cols: usize, rows: usize, values: Vec<f32>) {
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut ds = driver
            .create_with_band_type::<f32, _>(path, cols, rows, 1)
            .unwrap();
        ds.set_geo_transform(&[300000.0, 20.0, 0.0, 4800000.0, 0.0, -20.0])
            .unwrap();
        let mut band = ds.rasterband(1).unwrap();
        let mut buf = Buffer::new((cols, rows), values);
        band.write((0, 0), (cols, rows), &mut buf).unwrap();
    }

    #[test]
    fn naming_is_canonical_and_deterministic() {
        let prd = product();
        let first = ard_naming(&prd, "31TCJ", OrbitDirection::Descending, Calibration::Sigma);
        let second = ard_naming(&prd, "31TCJ", OrbitDirection::Descending, Calibration::Sigma);
        assert_eq!(first, second);
        assert_eq!(
            first.name,
            "S1A_20210708T060040_DES_TODO_03868204908E3178_31TCJ"
        );
        assert_eq!(
            first.relative_dir,
            Path::new("SAR/31/T/CJ/2021/20210708").join(&first.name)
        );
        assert_eq!(
            first.vv_file,
            "S1A_20210708T060040_DES_TODO_03868204908E3178_31TCJ_SIGMA0_VV.tif"
        );
        assert!(first.vh_file.ends_with("_SIGMA0_VH.tif"));

        let beta = ard_naming(&prd, "31TCJ", OrbitDirection::Ascending, Calibration::Beta);
        assert!(beta.vv_file.contains("_ASC_"));
        assert!(beta.vv_file.ends_with("_BETA0_VV.tif"));
    }

    #[test]
    fn discovery_takes_the_first_sorted_match() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["s1a_31TCJ_vv_DES_b.tif", "s1a_31TCJ_vv_DES_a.tif", "s1a_31TCJ_vh.tif.aux"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let vv = find_polarization_raster(dir.path(), "vv").unwrap();
        assert_eq!(vv.file_name().unwrap(), "s1a_31TCJ_vv_DES_a.tif");
        assert!(matches!(
            find_polarization_raster(dir.path(), "vh"),
            Err(FormatError::MissingRaster {
                polarization: "vh",
                ..
            })
        ));
    }

    #[test]
    fn orbit_direction_prefers_metadata() {
        let asc = Path::new("s1a_31TCJ_vv_ASC_110_20210708t060040.tif");
        let des = Path::new("s1a_31TCJ_vv_DES_110_20210708t060040.tif");
        assert_eq!(orbit_direction_of(asc, None), OrbitDirection::Ascending);
        assert_eq!(orbit_direction_of(des, None), OrbitDirection::Descending);
        assert_eq!(
            orbit_direction_of(des, Some("ASCENDING")),
            OrbitDirection::Ascending
        );
        assert_eq!(orbit_direction_of(asc, Some("?")), OrbitDirection::Ascending);
    }

    #[test]
    fn rename_only_moves_engine_outputs() {
        let work = tempfile::tempdir().unwrap();
        let denoised = work.path().join("s1process/31TCJ");
        fs::create_dir_all(&denoised).unwrap();
        fs::write(denoised.join("s1a_31TCJ_vv_ASC_x.tif"), b"vv").unwrap();
        fs::write(denoised.join("s1a_31TCJ_vh_ASC_x.tif"), b"vh").unwrap();

        let root = work.path().join("s1_ard");
        let ard = ArdFormatter::new(FormatMode::RenameOnly, Calibration::Sigma)
            .format(
                EngineOutputs {
                    denoised: &denoised,
                    companion: &denoised,
                },
                &root,
                &product(),
                "31TCJ",
            )
            .unwrap();
        assert_eq!(fs::read(&ard.vv).unwrap(), b"vv");
        assert!(ard.vh.file_name().unwrap().to_str().unwrap().contains("_ASC_"));
        assert!(ard.dir.starts_with(root.join("SAR/31/T/CJ/2021/20210708")));
        assert_eq!(root.join(&ard.relative_dir), ard.dir);
        assert!(!denoised.join("s1a_31TCJ_vv_ASC_x.tif").exists());
    }

    #[test]
    fn unusable_ard_root_is_a_format_error() {
        let work = tempfile::tempdir().unwrap();
        let denoised = work.path().join("s1process/31TCJ");
        fs::create_dir_all(&denoised).unwrap();
        fs::write(denoised.join("s1a_31TCJ_vv_DES_x.tif"), b"vv").unwrap();
        fs::write(denoised.join("s1a_31TCJ_vh_DES_x.tif"), b"vh").unwrap();
        let root = work.path().join("s1_ard");
        fs::write(&root, b"not a directory").unwrap();

        let err = ArdFormatter::new(FormatMode::RenameOnly, Calibration::Sigma)
            .format(
                EngineOutputs {
                    denoised: &denoised,
                    companion: &denoised,
                },
                &root,
                &product(),
                "31TCJ",
            )
            .unwrap_err();
        assert!(matches!(err, FormatError::Io(_)));
        assert!(denoised.join("s1a_31TCJ_vv_DES_x.tif").is_file());
    }

    #[test]
    fn convert_masks_and_encodes_bands() {
        let work = tempfile::tempdir().unwrap();
        let denoised = work.path().join("s1process/31TCJ");
        let companion = work.path().join("s1process_noised/31TCJ");
        fs::create_dir_all(&denoised).unwrap();
        fs::create_dir_all(&companion).unwrap();
        for pol in ["vv", "vh"] {
            let name = format!("s1a_31TCJ_{}_DES_110.tif", pol);
            write_f32(&denoised.join(&name), 2, 2, vec![1.0, 0.0, 0.01, 1.0]);
            write_f32(&companion.join(&name), 2, 2, vec![1.0, 0.3, 0.2, 0.0]);
        }

        let root = work.path().join("s1_ard");
        let ard = ArdFormatter::new(FormatMode::Convert, Calibration::Sigma)
            .clean_input(true)
            .format(
                EngineOutputs {
                    denoised: &denoised,
                    companion: &companion,
                },
                &root,
                &product(),
                "31TCJ",
            )
            .unwrap();

        let out = GdalRaster::open(&ard.vv).unwrap();
        assert_eq!(out.no_data_value(1).unwrap(), Some(ARD_NODATA as f64));
        assert_eq!(out.metadata_item("TILE_ID"), Some("31TCJ"));
        assert_eq!(
            out.metadata.geotransform,
            Some([300000.0, 20.0, 0.0, 4800000.0, 0.0, -20.0])
        );
        let band = out.read_band(1).unwrap();
        let values: Vec<f64> = band.iter().copied().collect();
        assert_eq!(values, vec![14125.0, 0.0, 1413.0, ARD_NODATA as f64]);
        assert!(ard.vh.is_file());
        assert!(find_polarization_raster(&denoised, "vv").is_err());
    }

    #[test]
    fn convert_requires_the_companion() {
        let work = tempfile::tempdir().unwrap();
        let denoised = work.path().join("denoised");
        let companion = work.path().join("companion");
        fs::create_dir_all(&denoised).unwrap();
        fs::create_dir_all(&companion).unwrap();
        write_f32(&denoised.join("x_vv.tif"), 1, 1, vec![1.0]);
        write_f32(&denoised.join("x_vh.tif"), 1, 1, vec![1.0]);
        let err = ArdFormatter::new(FormatMode::Convert, Calibration::Sigma)
            .format(
                EngineOutputs {
                    denoised: &denoised,
                    companion: &companion,
                },
                &work.path().join("out"),
                &product(),
                "31TCJ",
            )
            .unwrap_err();
        assert!(matches!(err, FormatError::MissingCompanion { .. }));
    }
}
