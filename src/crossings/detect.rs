use std::collections::HashMap;

use log::{debug, info, warn};

use super::classify::RoadClassifier;
use crate::data::{
    crossing::{node_increment, Crossing, CrossingMap},
    osm::{Node, OsmId, Way},
    OsmMapData,
};

/// Crossings found by the way scan, keyed by the shared node.
pub type SharedPoints<'a> = HashMap<OsmId, Crossing<'a>>;

/// Finds the nodes shared by two or more named roads.
#[derive(Debug, Clone, Default)]
pub struct CrossingDetector {
    classifier: RoadClassifier,
}

impl CrossingDetector {
    pub fn new(classifier: RoadClassifier) -> Self {
        CrossingDetector { classifier }
    }

    pub fn detect<'a>(&self, map: &'a OsmMapData) -> CrossingMap<'a> {
        self.detect_in(map.ways.iter(), &map.nodes)
    }

    /// Scan, hydrate and filter, with the ways supplied by the caller.
    pub fn detect_in<'a>(&self, ways: impl Iterator<Item = &'a Way>, nodes: &[Node]) -> CrossingMap<'a> {
        let mut shared = self.scan_ways(ways);
        Self::hydrate(&mut shared, nodes.iter());
        Self::retain_proper(shared)
    }

    /// First pass. A crossing is created once a node has been seen on two distinct
    /// ways; until then its occurrences wait in `encountered`. Every occurrence adds
    /// its own increment, even when a way passes the same node twice.
    pub fn scan_ways<'a>(&self, ways: impl Iterator<Item = &'a Way>) -> SharedPoints<'a> {
        let mut encountered: HashMap<OsmId, Vec<(&'a Way, u32)>> = HashMap::new();
        let mut shared: SharedPoints<'a> = HashMap::new();
        let mut road_count = 0;

        for way in ways.filter(|way| self.classifier.accepts(way)) {
            road_count += 1;
            for (index, node_ref) in way.node_refs.iter().enumerate() {
                let increment = node_increment(way, index);
                if let Some(crossing) = shared.get_mut(node_ref) {
                    crossing.add_road(way, increment);
                    continue;
                }

                let occurrences = encountered.entry(*node_ref).or_default();
                let second_way = occurrences.iter().any(|(seen, _)| seen.id != way.id);
                occurrences.push((way, increment));
                if second_way {
                    if let Some(occurrences) = encountered.remove(node_ref) {
                        shared.insert(*node_ref, Crossing::new(*node_ref, &occurrences));
                    }
                }
            }
        }

        info!(roads = road_count, shared_points = shared.len(); "Scanned ways");
        shared
    }

    /// Second pass. Returns the number of crossings whose node was never found.
    pub fn hydrate<'n>(shared: &mut SharedPoints, nodes: impl Iterator<Item = &'n Node>) -> usize {
        for node in nodes {
            if let Some(crossing) = shared.get_mut(&node.id) {
                match node.coords() {
                    Some(coords) => crossing.hydrate(coords),
                    None => debug!(node_id = node.id; "Shared node has no coordinates"),
                }
            }
        }

        let missing = shared.values()
            .filter(|crossing| crossing.coords.is_none())
            .count();
        if missing > 0 {
            warn!(missing = missing; "Crossings without coordinates");
        }
        missing
    }

    pub fn retain_proper(shared: SharedPoints<'_>) -> CrossingMap<'_> {
        let found = shared.len();
        let crossings: CrossingMap<'_> = shared.into_values()
            .filter(|crossing| crossing.is_proper())
            .map(|crossing| (crossing.id.clone(), crossing))
            .collect();
        info!(found = found, proper = crossings.len(); "Filtered crossings");
        crossings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{node, road, way};

    fn map(ways: Vec<Way>, nodes: Vec<Node>) -> OsmMapData {
        OsmMapData { nodes, ways }
    }

    #[test]
    fn test_interior_point_of_two_ways_is_proper() {
        let data = map(
            vec![road(1, "Main St", &[1, 2, 3]), road(2, "Oak Ave", &[4, 2, 5])],
            vec![node(2, 60.18, 24.82)],
        );
        let crossings = CrossingDetector::default().detect(&data);
        let crossing = &crossings["2"];
        assert_eq!(crossing.weight(), 4);
        assert!(crossing.is_proper());
        assert!(!crossing.is_fake());
        assert_eq!(crossing.coordinate_string().as_deref(), Some("60.18,24.82"));
    }

    #[test]
    fn test_endpoint_of_both_ways_is_dropped() {
        let data = map(
            vec![road(1, "Main St", &[1, 2]), road(2, "Oak Ave", &[2, 3])],
            vec![node(2, 60.18, 24.82)],
        );
        let detector = CrossingDetector::default();
        let shared = detector.scan_ways(data.ways.iter());
        assert_eq!(shared[&2].weight(), 2);
        assert!(CrossingDetector::retain_proper(shared).is_empty());
    }

    #[test]
    fn test_endpoint_meets_interior() {
        let data = map(
            vec![road(1, "Main St", &[1, 2, 3]), road(2, "Oak Ave", &[2, 4])],
            vec![node(2, 60.18, 24.82)],
        );
        let crossings = CrossingDetector::default().detect(&data);
        assert_eq!(crossings["2"].weight(), 3);
    }

    #[test]
    fn test_third_way_adds_to_existing_crossing() {
        let data = map(
            vec![
                road(1, "Main St", &[1, 2, 3]),
                road(2, "Oak Ave", &[4, 2, 5]),
                road(3, "Elm Rd", &[2, 6]),
            ],
            vec![node(2, 60.18, 24.82)],
        );
        let crossings = CrossingDetector::default().detect(&data);
        let crossing = &crossings["2"];
        assert_eq!(crossing.way_count(), 3);
        assert_eq!(crossing.weight(), 5);
    }

    #[test]
    fn test_loop_counts_every_occurrence_but_way_once() {
        let data = map(
            vec![road(1, "Main St", &[2, 7, 8, 2, 9]), road(2, "Oak Ave", &[4, 2, 5])],
            vec![node(2, 60.18, 24.82)],
        );
        let crossings = CrossingDetector::default().detect(&data);
        let crossing = &crossings["2"];
        assert_eq!(crossing.way_count(), 2);
        // endpoint 1 + interior 2 on the loop, interior 2 on Oak Ave
        assert_eq!(crossing.weight(), 5);
    }

    #[test]
    fn test_self_touching_way_alone_is_no_crossing() {
        let data = map(
            vec![road(1, "Ring Rd", &[1, 2, 3, 1])],
            vec![node(1, 60.18, 24.82)],
        );
        assert!(CrossingDetector::default().detect(&data).is_empty());
    }

    #[test]
    fn test_unqualified_ways_are_ignored() {
        let data = map(
            vec![
                road(1, "Main St", &[1, 2, 3]),
                way(2, Some("footway"), Some("Park Path"), &[4, 2, 5]),
                way(3, Some("primary"), None, &[6, 2, 7]),
            ],
            vec![node(2, 60.18, 24.82)],
        );
        assert!(CrossingDetector::default().detect(&data).is_empty());
    }

    #[test]
    fn test_missing_node_leaves_crossing_unhydrated() {
        let data = map(
            vec![road(1, "Main St", &[1, 2, 3]), road(2, "Oak Ave", &[4, 2, 5])],
            vec![node(3, 60.18, 24.82)],
        );
        let detector = CrossingDetector::default();
        let mut shared = detector.scan_ways(data.ways.iter());
        assert_eq!(CrossingDetector::hydrate(&mut shared, data.nodes.iter()), 1);
        assert!(shared[&2].coords.is_none());
    }

    #[test]
    fn test_same_road_continuation_is_fake() {
        let data = map(
            vec![
                road(1, "Main St", &[1, 2, 3]),
                road(2, "Main St", &[3, 4, 5]),
                road(3, "Main St", &[6, 4, 7]),
                road(4, "Oak Ave", &[8, 2, 9]),
            ],
            vec![node(2, 60.18, 24.82), node(3, 60.181, 24.821), node(4, 60.182, 24.822)],
        );
        let crossings = CrossingDetector::default().detect(&data);
        // node 3 only joins two Main St ways end to end
        assert!(!crossings.contains_key("3"));
        // node 4 is a real junction in the middle of two Main St ways
        assert_eq!(crossings["4"].weight(), 4);
        assert!(crossings["4"].is_fake());
        assert!(!crossings["2"].is_fake());
    }

    #[test]
    fn test_detect_in_matches_detect() {
        let data = map(
            vec![road(1, "Main St", &[1, 2, 3]), road(2, "Oak Ave", &[2, 4])],
            vec![node(2, 60.18, 24.82)],
        );
        let detector = CrossingDetector::default();
        let crossings = detector.detect_in(data.ways.iter().rev(), &data.nodes);
        assert_eq!(crossings.keys().collect::<Vec<_>>(), vec!["2"]);
        assert_eq!(crossings["2"].weight(), 3);
        assert_eq!(detector.detect(&data)["2"].weight(), 3);
    }
}
