use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::{self, FromStr};

use log::{info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::UserConfig;
use crate::data::OsmMapData;
use crate::data::osm::{Node, OsmId, Way};
use crate::errors::Result;
use crate::etl::Etl;

pub const ETL_NAME: &str = "parse_osm";
pub const OUTPUT_FILE_NAME: &str = "osm_elements.rkyv";

enum ParserState {
    Top,
    Node(Node),
    Way(Way),
    /// Inside an element we don't keep, e.g. a relation or a way without an id.
    Skipped,
}

type Attributes = HashMap<String, String>;

fn attribute_map(el: &BytesStart) -> Result<Attributes> {
    let mut attributes = HashMap::new();
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let key = str::from_utf8(attribute.key.as_ref())?.to_string();
        let value = attribute.unescape_value()?.into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

/// A missing or unparsable attribute is absent, not an error.
fn parse_attribute<T: FromStr>(attributes: &Attributes, key: &str, element: &str) -> Option<T> {
    let value = attributes.get(key)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(element = element, key = key, value = value.as_str(); "Ignoring unparsable attribute");
            None
        },
    }
}

fn parse_node(el: &BytesStart) -> Result<Option<Node>> {
    let attributes = attribute_map(el)?;
    let Some(id) = parse_attribute::<OsmId>(&attributes, "id", "node") else {
        warn!("Skipping node without id");
        return Ok(None);
    };
    Ok(Some(Node {
        id,
        lat: parse_attribute(&attributes, "lat", "node"),
        lon: parse_attribute(&attributes, "lon", "node"),
    }))
}

fn parse_way(el: &BytesStart) -> Result<Option<Way>> {
    let attributes = attribute_map(el)?;
    let Some(id) = parse_attribute::<OsmId>(&attributes, "id", "way") else {
        warn!("Skipping way without id");
        return Ok(None);
    };
    Ok(Some(Way::new(id)))
}

/// `<tag>` and `<nd>` children of the element currently open.
fn parse_child(state: &mut ParserState, el: &BytesStart) -> Result<()> {
    match el.name().as_ref() {
        b"tag" => {
            let mut attributes = attribute_map(el)?;
            let (Some(key), Some(value)) = (attributes.remove("k"), attributes.remove("v")) else {
                return Ok(());
            };
            // Node tags are not needed to find crossings.
            if let ParserState::Way(way) = state {
                way.add_tag(key, value);
            }
        },
        b"nd" => {
            if let ParserState::Way(way) = state {
                let attributes = attribute_map(el)?;
                if let Some(node_ref) = parse_attribute(&attributes, "ref", "nd") {
                    way.node_refs.push(node_ref);
                }
            }
        },
        _ => (),
    }
    Ok(())
}

/// Reads nodes and ways from OSM XML, keeping their order in the document.
pub fn read_osm<R: BufRead>(mut reader: Reader<R>) -> Result<OsmMapData> {
    let mut buf = Vec::new();
    let mut state = ParserState::Top;
    let mut output = OsmMapData::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                match e.name().as_ref() {
                    b"node" => {
                        state = parse_node(&e)?.map_or(ParserState::Skipped, ParserState::Node);
                    },
                    b"way" => {
                        state = parse_way(&e)?.map_or(ParserState::Skipped, ParserState::Way);
                    },
                    b"relation" => state = ParserState::Skipped,
                    _ => parse_child(&mut state, &e)?,
                }
            },
            Event::Empty(e) => {
                match e.name().as_ref() {
                    b"node" => {
                        if let Some(node) = parse_node(&e)? {
                            output.nodes.push(node);
                        }
                    },
                    b"way" => {
                        if let Some(way) = parse_way(&e)? {
                            output.ways.push(way);
                        }
                    },
                    _ => parse_child(&mut state, &e)?,
                }
            },
            Event::End(e) => {
                if matches!(e.name().as_ref(), b"node" | b"way" | b"relation") {
                    match std::mem::replace(&mut state, ParserState::Top) {
                        ParserState::Node(node) => output.nodes.push(node),
                        ParserState::Way(way) => output.ways.push(way),
                        _ => (),
                    }
                }
            },
            // Declarations, comments and whitespace carry nothing we need.
            _ => (),
        }
        // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
        buf.clear();
    };

    Ok(output)
}

pub struct ParseOsmEtl<'a> {
    config: &'a UserConfig,
}

impl ParseOsmEtl<'_> {
    fn create_osm_reader(&self) -> Result<Reader<Box<dyn BufRead>>> {
        let path = Path::new(&self.config.data_path);
        let file_reader = BufReader::new(fs::File::open(path)?);
        let buffered: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "xz") {
            Box::new(BufReader::new(XzDecoder::new(file_reader)))
        } else {
            Box::new(file_reader)
        };
        let mut reader = Reader::from_reader(buffered);
        reader.trim_text(true);

        Ok(reader)
    }

    pub fn new(config: &UserConfig) -> ParseOsmEtl {
        ParseOsmEtl {
            config
        }
    }
}

impl Etl for ParseOsmEtl<'_> {
    type Input = Reader<Box<dyn BufRead>>;
    type Output = OsmMapData;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_paths(&self, dir: &Path) -> Vec<PathBuf> {
        vec![dir.join(OUTPUT_FILE_NAME)]
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        self.create_osm_reader()
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let output = read_osm(input)?;
        info!(nodes = output.nodes.len(), ways = output.ways.len(); "Read OSM data");
        Ok(output)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let bytes = rkyv::to_bytes::<_, 256>(&output)
            .map_err(|err| format!("Could not serialize OSM data: {:?}", err))?;
        let mut output_file = fs::File::create(dir.join(OUTPUT_FILE_NAME))?;
        output_file.write_all(&bytes)?;
        Ok(())
    }
}
