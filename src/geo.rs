use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Mean Earth radius in kilometers, as used by the Haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A coarse lat/lng rectangle used to sanity-check resolved coordinates.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn contains(&self, coordinate: Coordinate) -> bool {
        coordinate.lat >= self.south
            && coordinate.lat <= self.north
            && coordinate.lng >= self.west
            && coordinate.lng <= self.east
    }
}

/// Coarse bounding box for Canada. Intentionally generous; it only has to
/// reject coordinates that are clearly outside the supported region.
pub const CANADA_BOUNDS: BoundingBox = BoundingBox {
    south: 41.7,
    north: 83.1,
    west: -141.0,
    east: -52.6,
};

/// Great-circle distance between two coordinates in kilometers (Haversine).
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    // Rounding can push h a hair above 1.0 for near-antipodal pairs, which
    // would make the second sqrt NaN.
    let h = ((d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2))
    .min(1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Anything that can sit on a map.
pub trait Locatable {
    fn coordinate(&self) -> Option<Coordinate>;
}

/// An item paired with its computed distance from a reference point.
/// The distance is derived, never persisted.
#[derive(Debug, Clone)]
pub struct Ranked<T> {
    pub item: T,
    pub distance_km: f64,
}

/// Ranks `items` by ascending great-circle distance from `reference` and
/// truncates to `limit`. Items without a coordinate are excluded. The sort
/// is stable, so equal distances keep their input order.
pub fn rank_by_distance<T: Locatable + Clone>(
    reference: Coordinate,
    items: &[T],
    limit: usize,
) -> Vec<Ranked<T>> {
    let mut ranked: Vec<Ranked<T>> = items
        .iter()
        .filter_map(|item| {
            item.coordinate().map(|coordinate| Ranked {
                item: item.clone(),
                distance_km: haversine_km(reference, coordinate),
            })
        })
        .collect();

    ranked.sort_by(|x, y| {
        x.distance_km
            .partial_cmp(&y.distance_km)
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}
