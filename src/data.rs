use self::osm::{Node, Way};

pub mod crossing;
pub mod osm;

/// Map data as defined in the .osm file. Nodes and ways keep their document order,
/// relations and everything else are discarded.

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone)]
pub struct OsmMapData {
    pub nodes: Vec<Node>,
    pub ways: Vec<Way>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::osm::{Node, OsmId, Way};

    pub fn way(id: OsmId, highway: Option<&str>, name: Option<&str>, refs: &[OsmId]) -> Way {
        let mut way = Way::new(id);
        way.node_refs = refs.to_vec();
        if let Some(highway) = highway {
            way.add_tag("highway".to_string(), highway.to_string());
        }
        if let Some(name) = name {
            way.add_tag("name".to_string(), name.to_string());
        }
        way
    }

    pub fn road(id: OsmId, name: &str, refs: &[OsmId]) -> Way {
        way(id, Some("residential"), Some(name), refs)
    }

    pub fn node(id: OsmId, lat: f64, lon: f64) -> Node {
        let mut node = Node::new(id);
        node.lat = Some(lat);
        node.lon = Some(lon);
        node
    }
}
