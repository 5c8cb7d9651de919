use std::collections::HashSet;

use crate::data::osm::Way;

pub const ROAD_TYPES: [&str; 9] = [
    "motorway",
    "trunk",
    "primary",
    "secondary",
    "tertiary",
    "unclassified",
    "residential",
    "minor",
    "service",
];

/// Decides which ways are named roads worth looking for crossings on.
#[derive(Debug, Clone)]
pub struct RoadClassifier {
    road_types: HashSet<String>,
}

impl Default for RoadClassifier {
    fn default() -> Self {
        RoadClassifier::new(ROAD_TYPES.iter().map(|t| t.to_string()))
    }
}

impl RoadClassifier {
    pub fn new(road_types: impl IntoIterator<Item = String>) -> Self {
        RoadClassifier {
            road_types: road_types.into_iter().collect(),
        }
    }

    pub fn is_road(&self, way: &Way) -> bool {
        way.highway()
            .is_some_and(|highway| self.road_types.contains(highway))
    }

    /// Single-character names are placeholders.
    pub fn has_name(way: &Way) -> bool {
        way.name()
            .is_some_and(|name| name.chars().count() > 1)
    }

    pub fn accepts(&self, way: &Way) -> bool {
        self.is_road(way) && Self::has_name(way)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::way;

    #[test]
    fn test_accepts_named_roads() {
        let classifier = RoadClassifier::default();
        for road_type in ROAD_TYPES {
            assert!(classifier.accepts(&way(1, Some(road_type), Some("Otaniementie"), &[])));
        }
    }

    #[test]
    fn test_rejects_other_highway_values() {
        let classifier = RoadClassifier::default();
        for highway in ["footway", "cycleway", "path", "living_street", "Residential"] {
            assert!(!classifier.accepts(&way(1, Some(highway), Some("Otaniementie"), &[])));
        }
        assert!(!classifier.accepts(&way(1, None, Some("Otaniementie"), &[])));
    }

    #[test]
    fn test_rejects_short_or_missing_names() {
        let classifier = RoadClassifier::default();
        assert!(!classifier.accepts(&way(1, Some("primary"), None, &[])));
        assert!(!classifier.accepts(&way(1, Some("primary"), Some(""), &[])));
        assert!(!classifier.accepts(&way(1, Some("primary"), Some("A"), &[])));
        assert!(!classifier.accepts(&way(1, Some("primary"), Some("Ä"), &[])));
        assert!(classifier.accepts(&way(1, Some("primary"), Some("A4"), &[])));
    }

    #[test]
    fn test_custom_road_types() {
        let classifier = RoadClassifier::new(["cycleway".to_string()]);
        assert!(classifier.accepts(&way(1, Some("cycleway"), Some("Baana"), &[])));
        assert!(!classifier.accepts(&way(1, Some("primary"), Some("Baana"), &[])));
    }
}
