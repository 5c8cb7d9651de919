pub mod classify;
pub mod cluster;
pub mod detect;

use serde::{Deserialize, Serialize};

use crate::data::crossing::MapCoords;

/// Roughly 20 metres at the latitude of Helsinki.
pub const DEFAULT_EPSILON_DEG: f64 = 0.00018;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// How close two crossings have to be to be considered the same junction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Proximity {
    /// Axis-aligned box, `epsilon_deg` on latitude and longitude independently.
    Box { epsilon_deg: f64 },
    /// Great-circle distance.
    Haversine { meters: f64 },
}

impl Default for Proximity {
    fn default() -> Self {
        Proximity::Box { epsilon_deg: DEFAULT_EPSILON_DEG }
    }
}

impl Proximity {
    pub fn is_close(&self, a: &MapCoords, b: &MapCoords) -> bool {
        match self {
            Proximity::Box { epsilon_deg } => {
                (a.lat - b.lat).abs() < *epsilon_deg && (a.lon - b.lon).abs() < *epsilon_deg
            },
            Proximity::Haversine { meters } => haversine_m(a, b) < *meters,
        }
    }
}

pub fn haversine_m(a: &MapCoords, b: &MapCoords) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_is_strict_per_axis() {
        let proximity = Proximity::Box { epsilon_deg: 0.001 };
        let a = MapCoords { lat: 60.0, lon: 24.0 };
        assert!(proximity.is_close(&a, &MapCoords { lat: 60.0009, lon: 24.0009 }));
        assert!(!proximity.is_close(&a, &MapCoords { lat: 60.0, lon: 24.0011 }));
        assert!(!proximity.is_close(&a, &MapCoords { lat: 59.9989, lon: 24.0 }));
    }

    #[test]
    fn test_default_box_is_about_twenty_metres() {
        let a = MapCoords { lat: 60.1841, lon: 24.8281 };
        // ~15 m north
        assert!(Proximity::default().is_close(&a, &MapCoords { lat: 60.18423, lon: 24.8281 }));
        // ~30 m north
        assert!(!Proximity::default().is_close(&a, &MapCoords { lat: 60.18437, lon: 24.8281 }));
    }

    #[test]
    fn test_haversine() {
        let a = MapCoords { lat: 60.0, lon: 24.0 };
        let b = MapCoords { lat: 60.001, lon: 24.0 };
        let d = haversine_m(&a, &b);
        assert!((d - 111.2).abs() < 0.5, "distance was {}", d);
        assert!(Proximity::Haversine { meters: 120.0 }.is_close(&a, &b));
        assert!(!Proximity::Haversine { meters: 100.0 }.is_close(&a, &b));
    }

    #[test]
    fn test_proximity_config() {
        let parsed: Proximity = serde_json::from_str(r#"{"type": "haversine", "meters": 20.0}"#).unwrap();
        assert_eq!(parsed, Proximity::Haversine { meters: 20.0 });
        let parsed: Proximity = serde_json::from_str(r#"{"type": "box", "epsilon_deg": 0.0002}"#).unwrap();
        assert_eq!(parsed, Proximity::Box { epsilon_deg: 0.0002 });
    }
}
