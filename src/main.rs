mod crossings;
mod data;
mod errors;
mod etl;

use std::env;
use std::fs::{create_dir_all, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use crate::crossings::{classify::RoadClassifier, Proximity};
use crate::errors::Result;
use crate::etl::extract_crossings::ExtractCrossingsEtl;
use crate::etl::parse_osm::ParseOsmEtl;
use crate::etl::Etl;

const DEFAULT_CONFIG_PATH: &str = "config/crossings.json";

fn default_output_dir() -> String {
    "output".to_string()
}

#[derive(Deserialize, Debug)]
pub struct UserConfig {
    /// .osm or .osm.xz file.
    pub data_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Replaces the default highway whitelist.
    #[serde(default)]
    pub road_types: Option<Vec<String>>,
    #[serde(default)]
    pub proximity: Proximity,
    /// Ignore cached stage outputs.
    #[serde(default)]
    pub force: bool,
}

impl UserConfig {
    pub fn classifier(&self) -> RoadClassifier {
        match &self.road_types {
            Some(road_types) => RoadClassifier::new(road_types.iter().cloned()),
            None => RoadClassifier::default(),
        }
    }
}

fn load_user_config(path: &str) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| format!("Could not open config file {}: {}", path, err))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new(&config.output_dir).join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    setup_logging();

    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let user_config = load_user_config(&config_path)?;
    let output_dir = create_output_dir(&user_config)?;
    info!(config = config_path.as_str(), data_path = user_config.data_path.as_str(); "Loaded config");

    let mut parse_etl = ParseOsmEtl::new(&user_config);
    let mut crossings_etl = ExtractCrossingsEtl::new(&user_config);
    if user_config.force {
        parse_etl.clean(&output_dir)?;
        crossings_etl.clean(&output_dir)?;
    }
    parse_etl.process(&output_dir)?;
    crossings_etl.process(&output_dir)?;

    Ok(())
}
