use ndarray::{Array2, Zip};

/// No-data sentinel of ARD bands.
pub const ARD_NODATA: u16 = u16::MAX;

/// Offset (dB) applied before quantization.
pub const DB_OFFSET: f64 = 83.0;

const MAX_VALID_DN: u16 = ARD_NODATA - 1;

fn is_nodata(value: f64, nodata: Option<f64>) -> bool {
    value.is_nan() || nodata.is_some_and(|nd| value == nd)
}

/// Quantized dB encoding of a linear backscatter value:
/// `round(10^((10*log10(x) + 83) / 20))`.
///
/// Non-positive or non-finite input encodes as 0; results are clamped below the
/// no-data sentinel.
pub fn encode_linear(value: f64) -> u16 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let dn = 10f64.powf((10.0 * value.log10() + DB_OFFSET) / 20.0).round();
    if dn >= MAX_VALID_DN as f64 {
        MAX_VALID_DN
    } else {
        dn as u16
    }
}

/// Pixels holding data in the without-noise-removal companion raster.
///
/// The companion's zeros (and its declared no-data) mark true no-data, which
/// the noise-removed raster cannot distinguish from computed zeros.
pub fn companion_validity(companion: &Array2<f64>, nodata: Option<f64>) -> Array2<bool> {
    companion.mapv(|v| v != 0.0 && !is_nodata(v, nodata))
}

/// Encode `primary` to ARD digital numbers, forcing [`ARD_NODATA`] where the
/// companion mask is false or the primary itself is no-data.
pub fn encode_masked(
    primary: &Array2<f64>,
    valid: &Array2<bool>,
    primary_nodata: Option<f64>,
) -> Array2<u16> {
    let mut result = Array2::from_elem(primary.dim(), ARD_NODATA);
    Zip::from(primary)
        .and(valid)
        .and(&mut result)
        .par_for_each(|&value, &ok, out| {
            if ok && !is_nodata(value, primary_nodata) {
                *out = encode_linear(value);
            }
        });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn linear_values_encode_to_offset_db() {
        // 10^(83/20) = 14125.37...
        assert_eq!(encode_linear(1.0), 14125);
        // 10^((-20 + 83) / 20) = 1412.53...
        assert_eq!(encode_linear(0.01), 1413);
        assert_eq!(encode_linear(0.0), 0);
        assert_eq!(encode_linear(-3.0), 0);
        assert_eq!(encode_linear(f64::NAN), 0);
        assert_eq!(encode_linear(f64::INFINITY), 0);
        assert_eq!(encode_linear(1.0e6), MAX_VALID_DN);
    }

    #[test]
    fn companion_zeros_become_nodata() {
        let primary = array![[1.0, 0.0], [0.01, 0.0]];
        let companion = array![[0.5, 0.2], [0.0, -9999.0]];
        let valid = companion_validity(&companion, Some(-9999.0));
        assert_eq!(valid, array![[true, true], [false, false]]);

        let encoded = encode_masked(&primary, &valid, None);
        // A computed zero inside the footprint stays a valid 0.
        assert_eq!(encoded, array![[14125, 0], [ARD_NODATA, ARD_NODATA]]);
    }

    #[test]
    fn primary_nodata_is_preserved() {
        let primary = array![[-1.0, 1.0]];
        let valid = array![[true, true]];
        let encoded = encode_masked(&primary, &valid, Some(-1.0));
        assert_eq!(encoded, array![[ARD_NODATA, 14125]]);
    }
}
