//! Location service (spec.md §4.3): a fixed table of geographic coordinates
//! used only to derive transmission latency via the haversine formula.

/// Latitude/longitude pair, in degrees.
pub type Coord = (f64, f64);

/// A small, fixed table of real-world city coordinates. Nodes are assigned a
/// location round-robin from this table at creation time, giving a
/// reproducible, geographically plausible spread of transmission delays
/// without needing an external geo database.
const CITY_TABLE: &[Coord] = &[
    (40.7128, -74.0060),   // New York
    (51.5074, -0.1278),    // London
    (35.6762, 139.6503),   // Tokyo
    (-33.8688, 151.2093),  // Sydney
    (55.7558, 37.6173),    // Moscow
    (19.0760, 72.8777),    // Mumbai
    (-23.5505, -46.6333),  // Sao Paulo
    (1.3521, 103.8198),    // Singapore
    (52.5200, 13.4050),    // Berlin
    (37.5665, 126.9780),   // Seoul
    (30.0444, 31.2357),    // Cairo
    (-1.2921, 36.8219),    // Nairobi
    (43.6532, -79.3832),   // Toronto
    (19.4326, -99.1332),   // Mexico City
    (28.6139, 77.2090),    // New Delhi
    (59.3293, 18.0686),    // Stockholm
];

/// Earth radius in kilometers, for the haversine formula.
const EARTH_RADIUS_KM: f64 = 6371.0;

pub struct LocationService;

impl LocationService {
    /// Deterministically assigns the `n`-th node a location from the fixed
    /// table, cycling if there are more nodes than table entries.
    pub fn location_for_index(n: usize) -> Coord {
        CITY_TABLE[n % CITY_TABLE.len()]
    }

    /// Great-circle distance between two coordinates, in kilometers.
    pub fn haversine_km(a: Coord, b: Coord) -> f64 {
        let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
        let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
        let dlat = lat2 - lat1;
        let dlon = lon2 - lon1;
        let h = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
    }

    /// Transmission delay in (virtual) seconds: 10ms per 1000km, i.e.
    /// `haversine_km / 100` (spec.md §4.3).
    pub fn transmission_delay(a: Coord, b: Coord) -> f64 {
        Self::haversine_km(a, b) / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_has_zero_distance() {
        let p = LocationService::location_for_index(0);
        assert!(LocationService::haversine_km(p, p) < 1e-6);
    }

    #[test]
    fn transmission_delay_scales_with_distance() {
        let a = LocationService::location_for_index(0);
        let b = LocationService::location_for_index(1);
        let d = LocationService::haversine_km(a, b);
        let t = LocationService::transmission_delay(a, b);
        assert!((t - d / 100.0).abs() < 1e-9);
    }

    #[test]
    fn location_table_cycles() {
        let n = CITY_TABLE.len();
        assert_eq!(
            LocationService::location_for_index(0),
            LocationService::location_for_index(n)
        );
    }
}
