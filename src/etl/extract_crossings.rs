use std::{fs::File, io::{BufWriter, Read, Write}, path::{Path, PathBuf}};

use log::info;
use serde::Serialize;
use tqdm::tqdm;

use crate::{
    crossings::{cluster::{final_crossings, CrossingClusterer}, detect::CrossingDetector},
    data::{crossing::{CrossingMap, CrossingRecord}, osm::{Node, Way}, OsmMapData},
    errors::Result,
    UserConfig,
};

use super::{parse_osm, Etl};

pub const ETL_NAME: &str = "extract_crossings";
pub const OUTPUT_FILE_NAME: &str = "crossings.json";
pub const COORDINATES_FILE_NAME: &str = "crossings.txt";

/// Crossings left after clustering. Detections that were never merged and the
/// results of merges are listed separately.
#[derive(Serialize, Debug, Default)]
pub struct CrossingReport {
    pub crossings: Vec<CrossingRecord>,
    pub clustered_crossings: Vec<CrossingRecord>,
}

impl CrossingReport {
    pub fn new(detected: &CrossingMap, clustered: &CrossingMap) -> Self {
        let mut report = CrossingReport::default();
        for crossing in final_crossings(detected, clustered) {
            let Some(record) = CrossingRecord::new(crossing) else {
                continue;
            };
            if crossing.node_id.is_some() {
                report.crossings.push(record);
            } else {
                report.clustered_crossings.push(record);
            }
        }
        report
    }

    /// One "lat,lon" line per crossing.
    pub fn coordinate_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.crossings.iter()
            .chain(self.clustered_crossings.iter())
            .map(|record| format!("{},{}", record.lat, record.lon))
    }
}

pub struct ExtractCrossingsEtl<'a> {
    config: &'a UserConfig,
}

impl ExtractCrossingsEtl<'_> {
    pub fn new(config: &UserConfig) -> ExtractCrossingsEtl {
        ExtractCrossingsEtl {
            config
        }
    }

    pub fn find_crossings<'a>(&self, ways: impl Iterator<Item = &'a Way>, nodes: &[Node]) -> CrossingReport {
        let mut detected = CrossingDetector::new(self.config.classifier()).detect_in(ways, nodes);

        let clustered = CrossingClusterer::new(self.config.proximity).cluster(&mut detected);
        CrossingReport::new(&detected, &clustered)
    }
}

impl Etl for ExtractCrossingsEtl<'_> {
    type Input = OsmMapData;
    type Output = CrossingReport;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_paths(&self, dir: &Path) -> Vec<PathBuf> {
        vec![dir.join(OUTPUT_FILE_NAME), dir.join(COORDINATES_FILE_NAME)]
    }

    // Depends on the road types and proximity settings, so it is never reused.
    fn is_cached(&self, _dir: &Path) -> Result<bool> {
        Ok(false)
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        let input_file_path = dir.join(parse_osm::OUTPUT_FILE_NAME);
        let mut input_file = File::open(input_file_path)?;

        let mut buf_vec: Vec<u8> = Vec::new();
        input_file.read_to_end(&mut buf_vec)?;
        let mut aligned = rkyv::AlignedVec::with_capacity(buf_vec.len());
        aligned.extend_from_slice(&buf_vec);

        let input: OsmMapData = unsafe {
            rkyv::from_bytes_unchecked::<OsmMapData>(&aligned)
                .map_err(|err| format!("Could not deserialize OSM cache: {:?}", err))?
        };

        Ok(input)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let report = self.find_crossings(tqdm(input.ways.iter()), &input.nodes);
        info!(
            crossings = report.crossings.len(),
            clustered_crossings = report.clustered_crossings.len();
            "Found crossings"
        );
        Ok(report)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let json_file = BufWriter::new(File::create(dir.join(OUTPUT_FILE_NAME))?);
        serde_json::to_writer_pretty(json_file, &output)?;

        let mut coordinates_file = BufWriter::new(File::create(dir.join(COORDINATES_FILE_NAME))?);
        for line in output.coordinate_lines() {
            writeln!(coordinates_file, "{}", line)?;
        }
        coordinates_file.flush()?;
        Ok(())
    }
}
