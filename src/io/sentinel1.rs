use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp pattern used in product identifiers and ARD names.
pub const DATETIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Container suffixes accepted (and ignored) at the end of a product identifier.
const CONTAINER_SUFFIXES: [&str; 2] = [".SAFE", ".zip"];

const TOKEN_COUNT: usize = 9;

/// Errors encountered when parsing Sentinel-1 product identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductIdError {
    #[error("Malformed product identifier `{raw}`: expected 9 `_`-separated fields, got {found}")]
    MalformedIdentifier { raw: String, found: usize },
    #[error("Invalid field `{field}` in product identifier: `{value}`")]
    InvalidField { field: &'static str, value: String },
}

impl ProductIdError {
    fn field(field: &'static str, value: &str) -> Self {
        ProductIdError::InvalidField {
            field,
            value: value.to_string(),
        }
    }
}

macro_rules! code_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            fn parse(value: &str) -> Result<Self, ProductIdError> {
                match value {
                    $($code => Ok($name::$variant),)+
                    _ => Err(ProductIdError::field($field, value)),
                }
            }

            /// Code as it appears in the product identifier.
            pub fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

code_enum!(
    /// Sentinel-1 satellite unit
    MissionId, "mission_id" { S1A => "S1A", S1B => "S1B" }
);
code_enum!(
    /// Acquisition beam mode
    BeamMode, "beam_mode" { Iw => "IW", Ew => "EW", Sm => "SM" }
);
code_enum!(
    /// Product type, first three characters of the product code (e.g. `GRD` of `GRDH`)
    ProductType, "product_type" { Slc => "SLC", Grd => "GRD", Ocn => "OCN" }
);
code_enum!(
    /// Resolution class, last character of the product code (e.g. `H` of `GRDH`)
    ResolutionClass, "resolution_class" { Full => "F", High => "H", Medium => "M" }
);
code_enum!(
    ProcessingLevel, "processing_level" { One => "1", Two => "2" }
);
code_enum!(
    ProductClass, "product_class" { Standard => "S", Annotation => "A" }
);
code_enum!(
    /// Polarisation mode: single/dual, horizontal/vertical transmit
    Polarisation, "polarisation" { SingleH => "SH", SingleV => "SV", DualH => "DH", DualV => "DV" }
);

/// Structured view of a Sentinel-1 product identifier such as
/// `S1A_IW_GRDH_1SDV_20210708T060105_20210708T060130_038682_04908E_8979`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductIdentifier {
    stem: String,
    pub mission_id: MissionId,
    pub beam_mode: BeamMode,
    pub product_type: ProductType,
    pub resolution_class: ResolutionClass,
    pub processing_level: ProcessingLevel,
    pub product_class: ProductClass,
    pub polarisation: Polarisation,
    pub start_time: NaiveDateTime,
    pub stop_time: NaiveDateTime,
    pub absolute_orbit_number: String,
    pub mission_datatake_id: String,
    pub product_unique_id: String,
}

/// Remove a trailing container suffix (`.SAFE`, `.zip`) if present.
pub fn strip_container_suffix(raw: &str) -> &str {
    CONTAINER_SUFFIXES
        .iter()
        .find_map(|suffix| raw.strip_suffix(suffix))
        .unwrap_or(raw)
}

fn split_tokens(raw: &str) -> Result<(&str, Vec<&str>), ProductIdError> {
    let stem = strip_container_suffix(raw.trim());
    let tokens: Vec<&str> = stem.split('_').collect();
    if tokens.len() != TOKEN_COUNT {
        return Err(ProductIdError::MalformedIdentifier {
            raw: raw.to_string(),
            found: tokens.len(),
        });
    }
    Ok((stem, tokens))
}

fn fixed_len(field: &'static str, value: &str, len: usize) -> Result<String, ProductIdError> {
    if value.chars().count() == len {
        Ok(value.to_string())
    } else {
        Err(ProductIdError::field(field, value))
    }
}

fn timestamp(field: &'static str, value: &str) -> Result<NaiveDateTime, ProductIdError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .map_err(|_| ProductIdError::field(field, value))
}

/// Split a code at a char boundary, keeping the remainder (possibly empty).
fn split_code(code: &str, at: usize) -> (&str, &str) {
    match code.char_indices().nth(at) {
        Some((idx, _)) => code.split_at(idx),
        None => (code, ""),
    }
}

impl ProductIdentifier {
    /// Parse and validate a raw product identifier; the first invalid field is reported.
    pub fn parse(raw: &str) -> Result<Self, ProductIdError> {
        let (stem, t) = split_tokens(raw)?;

        let mission_id = MissionId::parse(t[0])?;
        let beam_mode = BeamMode::parse(t[1])?;
        let (product_type, resolution) = split_code(t[2], 3);
        let product_type = ProductType::parse(product_type)?;
        let resolution_class = ResolutionClass::parse(resolution)?;
        let (level, rest) = split_code(t[3], 1);
        let processing_level = ProcessingLevel::parse(level)?;
        let (class, polarisation) = split_code(rest, 1);
        let product_class = ProductClass::parse(class)?;
        let polarisation = Polarisation::parse(polarisation)?;
        let start_time = timestamp("start_time", t[4])?;
        let stop_time = timestamp("stop_time", t[5])?;
        let absolute_orbit_number = fixed_len("absolute_orbit_number", t[6], 6)?;
        let mission_datatake_id = fixed_len("mission_datatake_id", t[7], 6)?;
        let product_unique_id = fixed_len("product_unique_id", t[8], 4)?;

        Ok(ProductIdentifier {
            stem: stem.to_string(),
            mission_id,
            beam_mode,
            product_type,
            resolution_class,
            processing_level,
            product_class,
            polarisation,
            start_time,
            stop_time,
            absolute_orbit_number,
            mission_datatake_id,
            product_unique_id,
        })
    }

    /// Run every field check without building the identifier.
    pub fn validate(raw: &str) -> Result<(), ProductIdError> {
        let (_, t) = split_tokens(raw)?;
        MissionId::parse(t[0])?;
        BeamMode::parse(t[1])?;
        let (product_type, resolution) = split_code(t[2], 3);
        ProductType::parse(product_type)?;
        ResolutionClass::parse(resolution)?;
        let (level, rest) = split_code(t[3], 1);
        ProcessingLevel::parse(level)?;
        let (class, polarisation) = split_code(rest, 1);
        ProductClass::parse(class)?;
        Polarisation::parse(polarisation)?;
        timestamp("start_time", t[4])?;
        timestamp("stop_time", t[5])?;
        fixed_len("absolute_orbit_number", t[6], 6)?;
        fixed_len("mission_datatake_id", t[7], 6)?;
        fixed_len("product_unique_id", t[8], 4)?;
        Ok(())
    }

    /// Cheap filter used before attempting a download.
    pub fn is_valid(raw: &str) -> bool {
        Self::validate(raw).is_ok()
    }

    /// Identifier without container suffix.
    pub fn product_id(&self) -> &str {
        &self.stem
    }

    /// Directory name of the packed product as delivered by catalogs.
    pub fn safe_name(&self) -> String {
        format!("{}.SAFE", self.stem)
    }

    /// `YYYYMMDD` of the acquisition start, used to group products by date.
    pub fn start_date_key(&self) -> String {
        self.start_time.format("%Y%m%d").to_string()
    }

    pub fn start_time_code(&self) -> String {
        self.start_time.format(DATETIME_FORMAT).to_string()
    }

    /// Orbit, datatake and unique id concatenated, as used in ARD names.
    pub fn orbit_datatake_unique(&self) -> String {
        format!(
            "{}{}{}",
            self.absolute_orbit_number, self.mission_datatake_id, self.product_unique_id
        )
    }
}

impl FromStr for ProductIdentifier {
    type Err = ProductIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProductIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const ID: &str = "S1A_IW_GRDH_1SDV_20210708T060105_20210708T060130_038682_04908E_8979";

    fn with_token(index: usize, value: &str) -> String {
        let mut tokens: Vec<&str> = ID.split('_').collect();
        tokens[index] = value;
        tokens.join("_")
    }

    fn invalid_field(raw: &str) -> &'static str {
        match ProductIdentifier::parse(raw) {
            Err(ProductIdError::InvalidField { field, .. }) => field,
            other => panic!("expected InvalidField for {raw}, got {other:?}"),
        }
    }

    #[test]
    fn parses_safe_identifier() {
        let prd = ProductIdentifier::parse(&format!("{ID}.SAFE")).unwrap();
        assert_eq!(prd.mission_id, MissionId::S1A);
        assert_eq!(prd.beam_mode, BeamMode::Iw);
        assert_eq!(prd.product_type, ProductType::Grd);
        assert_eq!(prd.resolution_class, ResolutionClass::High);
        assert_eq!(prd.processing_level, ProcessingLevel::One);
        assert_eq!(prd.product_class, ProductClass::Standard);
        assert_eq!(prd.polarisation, Polarisation::DualV);
        assert_eq!(
            prd.start_time,
            NaiveDate::from_ymd_opt(2021, 7, 8)
                .unwrap()
                .and_hms_opt(6, 1, 5)
                .unwrap()
        );
        assert_eq!(
            prd.stop_time,
            NaiveDate::from_ymd_opt(2021, 7, 8)
                .unwrap()
                .and_hms_opt(6, 1, 30)
                .unwrap()
        );
        assert_eq!(prd.absolute_orbit_number, "038682");
        assert_eq!(prd.mission_datatake_id, "04908E");
        assert_eq!(prd.product_unique_id, "8979");
        assert_eq!(prd.product_id(), ID);
        assert_eq!(prd.safe_name(), format!("{ID}.SAFE"));
    }

    #[test]
    fn significant_fields_round_trip() {
        let prd: ProductIdentifier = ID.parse().unwrap();
        assert_eq!(prd.to_string(), ID);
        assert_eq!(prd.start_time_code(), "20210708T060105");
        assert_eq!(prd.start_date_key(), "20210708");
        assert_eq!(prd.orbit_datatake_unique(), "03868204908E8979");
        assert_eq!(prd.mission_id.code(), "S1A");
    }

    #[test]
    fn wrong_token_count_is_malformed() {
        let err = ProductIdentifier::parse("S1A_IW_GRDH_1SDV").unwrap_err();
        assert_eq!(
            err,
            ProductIdError::MalformedIdentifier {
                raw: "S1A_IW_GRDH_1SDV".into(),
                found: 4
            }
        );
        assert!(!ProductIdentifier::is_valid(&format!("{ID}_EXTRA")));
    }

    #[test]
    fn each_invalid_field_is_named() {
        let cases = [
            (with_token(0, "S1C"), "mission_id"),
            (with_token(1, "WV"), "beam_mode"),
            (with_token(2, "RAWH"), "product_type"),
            (with_token(2, "GRDX"), "resolution_class"),
            (with_token(2, "GRDHH"), "resolution_class"),
            (with_token(3, "3SDV"), "processing_level"),
            (with_token(3, "1XDV"), "product_class"),
            (with_token(3, "1SVV"), "polarisation"),
            (with_token(4, "20210708X060105"), "start_time"),
            (with_token(5, "20211308T060130"), "stop_time"),
            (with_token(6, "38682"), "absolute_orbit_number"),
            (with_token(7, "04908EE"), "mission_datatake_id"),
            (with_token(8, "897"), "product_unique_id"),
        ];
        for (raw, field) in cases {
            assert!(!ProductIdentifier::is_valid(&raw), "{raw} should be invalid");
            assert_eq!(invalid_field(&raw), field);
            assert_eq!(
                ProductIdentifier::validate(&raw).unwrap_err(),
                ProductIdentifier::parse(&raw).unwrap_err()
            );
        }
    }

    #[test]
    fn unknown_suffix_is_not_stripped() {
        let raw = format!("{ID}.tar");
        assert_eq!(invalid_field(&raw), "product_unique_id");
        assert!(ProductIdentifier::is_valid(&format!("{ID}.zip")));
    }
}
