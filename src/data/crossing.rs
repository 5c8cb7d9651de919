use std::{collections::{BTreeMap, BTreeSet}, fmt};

use serde::Serialize;

use super::osm::{OsmId, Way};
use crate::crossings::Proximity;

pub type CrossingId = String;

/// Crossings keyed by id. Ordered so that every pass over the map visits crossings
/// in the same sequence.
pub type CrossingMap<'a> = BTreeMap<CrossingId, Crossing<'a>>;

pub const ENDPOINT_INCREMENT: u32 = 1;
pub const INTERIOR_INCREMENT: u32 = 2;

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct MapCoords {
    pub lat: f64,
    pub lon: f64,
}

impl MapCoords {
    pub fn midpoint(&self, other: &MapCoords) -> MapCoords {
        MapCoords {
            lat: (self.lat + other.lat) / 2.0,
            lon: (self.lon + other.lon) / 2.0,
        }
    }

    pub fn coordinate_string(&self) -> String {
        format!("{},{}", self.lat, self.lon)
    }
}

/// Id of a crossing that has no node of its own: both coordinates on a 1/10000
/// degree grid, latitude first.
pub fn point_id(coords: &MapCoords) -> CrossingId {
    let lat = (coords.lat * 10000.0).floor() as i64;
    let lon = (coords.lon * 10000.0).floor() as i64;
    format!("{}{}", lat, lon)
}

/// Weight a way contributes to a crossing at position `index` of its node list.
pub fn node_increment(way: &Way, index: usize) -> u32 {
    if way.is_endpoint(index) {
        ENDPOINT_INCREMENT
    } else {
        INTERIOR_INCREMENT
    }
}

/// A point shared by two or more named roads, or the merge of several such points.
#[derive(Debug, Clone)]
pub struct Crossing<'a> {
    pub id: CrossingId,
    /// Shared node this crossing was detected at. None for cluster results.
    pub node_id: Option<OsmId>,
    pub coords: Option<MapCoords>,
    ways: BTreeMap<OsmId, &'a Way>,
    weight: u32,
    obsoleted_by: Option<CrossingId>,
    replaces: Vec<CrossingId>,
}

impl<'a> Crossing<'a> {
    /// Builds a crossing at `node_id` from every occurrence of the node seen so far.
    /// Each occurrence is a way and the increment of that physical position.
    pub fn new(node_id: OsmId, occurrences: &[(&'a Way, u32)]) -> Self {
        let mut crossing = Crossing {
            id: node_id.to_string(),
            node_id: Some(node_id),
            coords: None,
            ways: BTreeMap::new(),
            weight: 0,
            obsoleted_by: None,
            replaces: Vec::new(),
        };
        for &(way, increment) in occurrences {
            crossing.add_road(way, increment);
        }
        crossing
    }

    /// A new crossing at `coords` made of the union of both inputs. The inputs are
    /// left untouched, marking them obsolete is up to the caller.
    pub fn merge(id: CrossingId, coords: MapCoords, a: &Crossing<'a>, b: &Crossing<'a>) -> Self {
        let mut ways = a.ways.clone();
        ways.extend(b.ways.iter().map(|(id, way)| (*id, *way)));
        Crossing {
            id,
            node_id: None,
            coords: Some(coords),
            ways,
            weight: a.weight + b.weight,
            obsoleted_by: None,
            replaces: vec![a.id.clone(), b.id.clone()],
        }
    }

    pub fn add_road(&mut self, way: &'a Way, increment: u32) {
        self.ways.insert(way.id, way);
        self.weight += increment;
    }

    pub fn hydrate(&mut self, coords: MapCoords) {
        self.coords = Some(coords);
    }

    pub fn ways(&self) -> impl Iterator<Item = &'a Way> + '_ {
        self.ways.values().copied()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn obsoleted_by(&self) -> Option<&CrossingId> {
        self.obsoleted_by.as_ref()
    }

    pub fn replaces(&self) -> &[CrossingId] {
        &self.replaces
    }

    pub fn way_names(&self) -> BTreeSet<&'a str> {
        self.ways.values()
            .filter_map(|way| way.name())
            .collect()
    }

    /// Continuation of the same road, e.g. a road split into two ways or into two
    /// one-directional carriageways.
    pub fn is_fake(&self) -> bool {
        self.way_names().len() == 1
    }

    /// More than two road ends meeting. Two ways that merely end at the same node
    /// weigh exactly 2 and are a road changing ids, not a junction.
    pub fn is_proper(&self) -> bool {
        self.weight > 2 * ENDPOINT_INCREMENT
    }

    pub fn is_live(&self) -> bool {
        self.obsoleted_by.is_none()
    }

    pub fn close_by(&self, other: &Crossing, proximity: &Proximity) -> bool {
        match (&self.coords, &other.coords) {
            (Some(a), Some(b)) => proximity.is_close(a, b),
            _ => false,
        }
    }

    /// At least two road names in common. Sharing one road is not enough.
    pub fn clusterable_with(&self, other: &Crossing) -> bool {
        self.way_names().intersection(&other.way_names()).count() > 1
    }

    /// Set once. Returns false, keeping the first replacement, if already obsolete.
    pub fn obsolete(&mut self, by: CrossingId) -> bool {
        if self.obsoleted_by.is_some() {
            return false;
        }
        self.obsoleted_by = Some(by);
        true
    }

    pub fn coordinate_string(&self) -> Option<String> {
        self.coords.map(|coords| coords.coordinate_string())
    }
}

impl fmt::Display for Crossing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fake() {
            write!(f, "Fake crossing: ")?;
        }
        match self.coordinate_string() {
            Some(coords) => write!(f, "{}", coords)?,
            None => write!(f, "?,?")?,
        }
        write!(f, " {:?}", self.way_names())
    }
}

/// Owned snapshot of a hydrated crossing, as written to the output files.
#[derive(Serialize, Debug, Clone)]
pub struct CrossingRecord {
    pub id: CrossingId,
    pub lat: f64,
    pub lon: f64,
    pub names: Vec<String>,
    pub way_ids: Vec<OsmId>,
    pub weight: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replaces: Vec<CrossingId>,
}

impl CrossingRecord {
    pub fn new(crossing: &Crossing) -> Option<Self> {
        let coords = crossing.coords?;
        Some(CrossingRecord {
            id: crossing.id.clone(),
            lat: coords.lat,
            lon: coords.lon,
            names: crossing.way_names().into_iter().map(str::to_string).collect(),
            way_ids: crossing.ways().map(|way| way.id).collect(),
            weight: crossing.weight,
            replaces: crossing.replaces.clone(),
        })
    }
}
