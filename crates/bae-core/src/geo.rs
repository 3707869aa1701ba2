//! Bounding-box derivation from a site's center point and radius.
//!
//! Flat-earth approximation: one degree of latitude is always ~111 km; one
//! degree of longitude shrinks toward the poles by a factor of `cos(lat)`.

use anyhow::{bail, Result};

const KM_PER_DEG_LAT: f64 = 111.0;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

fn km_to_degrees_lat(km: f64) -> f64 {
    km / KM_PER_DEG_LAT
}

fn km_to_degrees_lon(km: f64, latitude: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos();
    if cos_lat < 0.001 {
        return 180.0;
    }
    km / (KM_PER_DEG_LAT * cos_lat)
}

/// Square bounding box centered on `(lat, lon)` with sides `2 * radius_km`.
pub fn bbox_from_center(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let delta_lat = km_to_degrees_lat(radius_km);
    let delta_lon = km_to_degrees_lon(radius_km, lat);

    BoundingBox {
        west: lon - delta_lon,
        south: lat - delta_lat,
        east: lon + delta_lon,
        north: lat + delta_lat,
    }
}

pub fn validate_coordinates(lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) {
        bail!("latitude {lat} must be between -90 and 90");
    }
    if !(-180.0..=180.0).contains(&lon) {
        bail!("longitude {lon} must be between -180 and 180");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_is_centered_and_square() {
        let bbox = bbox_from_center(40.0, -111.0, 10.0);
        let width = bbox.east - bbox.west;
        let height = bbox.north - bbox.south;
        assert!((width - height).abs() < 1e-9);
        assert!((bbox.west + bbox.east) / 2.0 - (-111.0) < 1e-9);
        assert!((bbox.south + bbox.north) / 2.0 - 40.0 < 1e-9);
    }

    #[test]
    fn bbox_near_pole_clamps_longitude_span() {
        let bbox = bbox_from_center(89.9999, 0.0, 100.0);
        assert!((bbox.east - bbox.west - 360.0).abs() < 1e-6);
    }

    #[test]
    fn validate_coordinates_rejects_out_of_range() {
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 181.0).is_err());
        assert!(validate_coordinates(45.0, -90.0).is_ok());
    }
}
