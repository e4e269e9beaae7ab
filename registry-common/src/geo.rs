//! Region and facility geometry
//!
//! Boundaries are stored as multipolygons in WGS84 degrees. Containment uses
//! even-odd ray casting on the raw lon/lat plane, which is adequate for
//! administrative boundaries that do not cross the antimeridian.

use serde::{Deserialize, Serialize};

/// A WGS84 point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// The (0, 0) "no data" sentinel
    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

/// A polygon with one exterior ring and optional holes
///
/// Rings may be open or closed; the closing edge is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<GeoPoint>,
    #[serde(default)]
    pub holes: Vec<Vec<GeoPoint>>,
}

impl Polygon {
    pub fn new(exterior: Vec<GeoPoint>) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    /// Axis-aligned rectangle, handy for seeding regions
    pub fn rectangle(min: GeoPoint, max: GeoPoint) -> Self {
        Self::new(vec![
            GeoPoint::new(min.lat, min.lon),
            GeoPoint::new(min.lat, max.lon),
            GeoPoint::new(max.lat, max.lon),
            GeoPoint::new(max.lat, min.lon),
        ])
    }

    /// Strict containment: points on the exterior or on a hole edge are outside
    pub fn contains(&self, point: &GeoPoint) -> bool {
        if on_ring_edge(&self.exterior, point) || self.holes.iter().any(|h| on_ring_edge(h, point)) {
            return false;
        }
        ring_contains(&self.exterior, point) && !self.holes.iter().any(|h| ring_contains(h, point))
    }
}

/// Region boundary: a point is inside if any member polygon contains it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Boundary {
    pub polygons: Vec<Polygon>,
}

impl Boundary {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.polygons.iter().any(|p| p.contains(point))
    }
}

/// True if the point lies on a segment of the ring (closing edge included)
fn on_ring_edge(ring: &[GeoPoint], point: &GeoPoint) -> bool {
    if ring.len() < 2 {
        return false;
    }

    let (x, y) = (point.lon, point.lat);
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lon, ring[i].lat);
        let (xj, yj) = (ring[j].lon, ring[j].lat);
        let cross = (xj - xi) * (y - yi) - (yj - yi) * (x - xi);
        if cross == 0.0
            && x >= xi.min(xj)
            && x <= xi.max(xj)
            && y >= yi.min(yj)
            && y <= yi.max(yj)
        {
            return true;
        }
        j = i;
    }
    false
}

/// Even-odd test; edge points are handled by `on_ring_edge`
fn ring_contains(ring: &[GeoPoint], point: &GeoPoint) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lon, ring[i].lat);
        let (xj, yj) = (ring[j].lon, ring[j].lat);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
