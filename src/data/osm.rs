use std::collections::HashMap;

use super::crossing::MapCoords;

pub type OsmId = i64;

pub const HIGHWAY_KEY: &str = "highway";
pub const NAME_KEY: &str = "name";

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone)]
pub struct Node {
    pub id: OsmId,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl Node {
    pub fn new(id: OsmId) -> Self {
        Node {
            id,
            ..Default::default()
        }
    }

    /// Both coordinates, or nothing if either attribute was missing.
    pub fn coords(&self) -> Option<MapCoords> {
        Some(MapCoords {
            lat: self.lat?,
            lon: self.lon?,
        })
    }
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone)]
pub struct Way {
    pub id: OsmId,
    pub node_refs: Vec<OsmId>,
    pub tags: HashMap<String, String>,
}

impl Way {
    pub fn new(id: OsmId) -> Self {
        Way {
            id,
            ..Default::default()
        }
    }

    /// Keeps the first value seen for a key, later duplicates are ignored.
    pub fn add_tag(&mut self, key: String, value: String) {
        self.tags.entry(key).or_insert(value);
    }

    pub fn highway(&self) -> Option<&str> {
        self.tags.get(HIGHWAY_KEY).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.tags.get(NAME_KEY).map(String::as_str)
    }

    pub fn is_endpoint(&self, index: usize) -> bool {
        index == 0 || index + 1 == self.node_refs.len()
    }
}
