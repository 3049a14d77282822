//! Coordinate normalization to WGS84
//!
//! Supported input systems:
//!
//! | EPSG | Name | Method |
//! |------|------|--------|
//! | 4326 | WGS84 | pass-through |
//! | 3857 | Web Mercator | spherical inverse |
//! | 3006 | SWEREF99 TM | Gauss-Krüger inverse |
//! | 3021 | RT90 2.5 gon V | Gauss-Krüger inverse with WGS84-fitted parameters |
//!
//! Projected inputs are `(easting, northing)`; output is `(lon, lat)` rounded
//! to six decimals.

use std::f64::consts::PI;
use std::str::FromStr;

const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    Wgs84,
    WebMercator,
    Sweref99Tm,
    Rt90,
}

impl CoordinateSystem {
    pub fn epsg(&self) -> u32 {
        match self {
            CoordinateSystem::Wgs84 => 4326,
            CoordinateSystem::WebMercator => 3857,
            CoordinateSystem::Sweref99Tm => 3006,
            CoordinateSystem::Rt90 => 3021,
        }
    }
}

impl FromStr for CoordinateSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        let code = normalized.strip_prefix("EPSG:").unwrap_or(&normalized);
        match code {
            "4326" | "WGS84" => Ok(CoordinateSystem::Wgs84),
            "3857" | "900913" => Ok(CoordinateSystem::WebMercator),
            "3006" | "SWEREF99" | "SWEREF99TM" => Ok(CoordinateSystem::Sweref99Tm),
            "3021" | "RT90" => Ok(CoordinateSystem::Rt90),
            other => Err(format!("Unsupported coordinate system: {}", other)),
        }
    }
}

/// Transverse Mercator projection parameters
struct GaussKruger {
    semi_major_axis: f64,
    flattening: f64,
    central_meridian: f64,
    scale: f64,
    false_northing: f64,
    false_easting: f64,
}

const SWEREF99_TM: GaussKruger = GaussKruger {
    semi_major_axis: 6_378_137.0,
    flattening: 1.0 / 298.257_222_101,
    central_meridian: 15.0,
    scale: 0.9996,
    false_northing: 0.0,
    false_easting: 500_000.0,
};

const RT90_25_GON_V: GaussKruger = GaussKruger {
    semi_major_axis: 6_378_137.0,
    flattening: 1.0 / 298.257_222_101,
    central_meridian: 15.0 + 48.0 / 60.0 + 22.624_306 / 3600.0,
    scale: 1.000_005_610_24,
    false_northing: -667.711,
    false_easting: 1_500_064.274,
};

impl GaussKruger {
    /// Grid (northing, easting) to geodetic (lat, lon) in degrees
    fn inverse(&self, northing: f64, easting: f64) -> (f64, f64) {
        let f = self.flattening;
        let e2 = f * (2.0 - f);
        let n = f / (2.0 - f);
        let a_roof = self.semi_major_axis / (1.0 + n) * (1.0 + n * n / 4.0 + n.powi(4) / 64.0);

        let d1 = n / 2.0 - 2.0 * n * n / 3.0 + 37.0 * n.powi(3) / 96.0 - n.powi(4) / 360.0;
        let d2 = n * n / 48.0 + n.powi(3) / 15.0 - 437.0 * n.powi(4) / 1440.0;
        let d3 = 17.0 * n.powi(3) / 480.0 - 37.0 * n.powi(4) / 840.0;
        let d4 = 4397.0 * n.powi(4) / 161_280.0;

        let a_star = e2 + e2.powi(2) + e2.powi(3) + e2.powi(4);
        let b_star = -(7.0 * e2.powi(2) + 17.0 * e2.powi(3) + 30.0 * e2.powi(4)) / 6.0;
        let c_star = (224.0 * e2.powi(3) + 889.0 * e2.powi(4)) / 120.0;
        let d_star = -(4279.0 * e2.powi(4)) / 1260.0;

        let xi = (northing - self.false_northing) / (self.scale * a_roof);
        let eta = (easting - self.false_easting) / (self.scale * a_roof);

        let xi_prim = xi
            - d1 * (2.0 * xi).sin() * (2.0 * eta).cosh()
            - d2 * (4.0 * xi).sin() * (4.0 * eta).cosh()
            - d3 * (6.0 * xi).sin() * (6.0 * eta).cosh()
            - d4 * (8.0 * xi).sin() * (8.0 * eta).cosh();
        let eta_prim = eta
            - d1 * (2.0 * xi).cos() * (2.0 * eta).sinh()
            - d2 * (4.0 * xi).cos() * (4.0 * eta).sinh()
            - d3 * (6.0 * xi).cos() * (6.0 * eta).sinh()
            - d4 * (8.0 * xi).cos() * (8.0 * eta).sinh();

        let phi_star = (xi_prim.sin() / eta_prim.cosh()).asin();
        let delta_lambda = (eta_prim.sinh() / xi_prim.cos()).atan();

        let sin2 = phi_star.sin().powi(2);
        let phi = phi_star
            + phi_star.sin()
                * phi_star.cos()
                * (a_star + b_star * sin2 + c_star * sin2.powi(2) + d_star * sin2.powi(3));

        let lat = phi.to_degrees();
        let lon = self.central_meridian + delta_lambda.to_degrees();
        (lat, lon)
    }
}

fn web_mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lat, lon)
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Convert `(x, y)` in `system` to WGS84 `(lon, lat)`
///
/// Returns `None` for non-finite input or a result outside the valid
/// longitude/latitude range.
pub fn to_wgs84(system: CoordinateSystem, x: f64, y: f64) -> Option<(f64, f64)> {
    if !x.is_finite() || !y.is_finite() {
        return None;
    }

    let (lat, lon) = match system {
        CoordinateSystem::Wgs84 => (y, x),
        CoordinateSystem::WebMercator => web_mercator_inverse(x, y),
        CoordinateSystem::Sweref99Tm => SWEREF99_TM.inverse(y, x),
        CoordinateSystem::Rt90 => RT90_25_GON_V.inverse(y, x),
    };

    let valid = lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon);
    valid.then(|| (round6(lon), round6(lat)))
}

/// Parse a raw coordinate value, accepting a decimal comma
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_system_parse() {
        assert_eq!("EPSG:3006".parse::<CoordinateSystem>(), Ok(CoordinateSystem::Sweref99Tm));
        assert_eq!("epsg:4326".parse::<CoordinateSystem>(), Ok(CoordinateSystem::Wgs84));
        assert_eq!("3021".parse::<CoordinateSystem>(), Ok(CoordinateSystem::Rt90));
        assert!("EPSG:2400".parse::<CoordinateSystem>().is_err());
    }

    #[test]
    fn test_wgs84_passthrough_and_range() {
        assert_eq!(to_wgs84(CoordinateSystem::Wgs84, 18.0686, 59.3293), Some((18.0686, 59.3293)));
        assert_eq!(to_wgs84(CoordinateSystem::Wgs84, 18.0, 95.0), None);
        assert_eq!(to_wgs84(CoordinateSystem::Wgs84, f64::NAN, 59.0), None);
    }

    #[test]
    fn test_web_mercator() {
        assert_eq!(to_wgs84(CoordinateSystem::WebMercator, 0.0, 0.0), Some((0.0, 0.0)));
        let (lon, lat) = to_wgs84(CoordinateSystem::WebMercator, 10_018_754.171_394, 8_399_737.889_818).unwrap();
        assert!((lon - 90.0).abs() < 1e-5);
        assert!((lat - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_sweref99_origin_lies_on_central_meridian() {
        let (lon, lat) = to_wgs84(CoordinateSystem::Sweref99Tm, 500_000.0, 0.0).unwrap();
        assert_eq!(lon, 15.0);
        assert_eq!(lat, 0.0);

        let (lon, lat) = to_wgs84(CoordinateSystem::Sweref99Tm, 500_000.0, 6_650_000.0).unwrap();
        assert_eq!(lon, 15.0);
        assert!((59.0..61.0).contains(&lat));
    }

    #[test]
    fn test_sweref99_east_of_meridian() {
        // Roughly central Stockholm
        let (lon, lat) = to_wgs84(CoordinateSystem::Sweref99Tm, 674_032.0, 6_580_822.0).unwrap();
        assert!((lon - 18.07).abs() < 0.05, "lon {lon}");
        assert!((lat - 59.33).abs() < 0.05, "lat {lat}");
    }

    #[test]
    fn test_rt90_central_meridian() {
        let (lon, _) = to_wgs84(CoordinateSystem::Rt90, 1_500_064.274, 6_580_000.0).unwrap();
        assert!((lon - (15.0 + 48.0 / 60.0 + 22.624_306 / 3600.0)).abs() < 1e-6);
    }

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate(" 59,5 "), Some(59.5));
        assert_eq!(parse_coordinate("n/a"), None);
        assert_eq!(parse_coordinate("inf"), None);
    }
}
