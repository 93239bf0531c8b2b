use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

/// Runtime configuration of the core: where the flat-text state lives and how
/// chatty the log output is. Loaded from YAML; `Default` covers programmatic
/// use so tests never need a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_network_file")]
    pub network_file: PathBuf,
    #[serde(default = "default_events_file")]
    pub events_file: PathBuf,
    #[serde(default)]
    pub logging: Logging,
}

fn default_network_file() -> PathBuf {
    PathBuf::from("data/network.txt")
}

fn default_events_file() -> PathBuf {
    PathBuf::from("data/events.txt")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            network_file: default_network_file(),
            events_file: default_events_file(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Self {
        let reader = BufReader::new(File::open(path).unwrap_or_else(|e| {
            panic!(
                "Failed to open config file at {path:?}. Original error was {e}"
            );
        }));
        serde_yaml::from_reader(reader).unwrap_or_else(|e| {
            panic!(
                "Failed to parse config at {path:?}. Original error was: {e}"
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logging {
    #[default]
    Info,
    Debug,
    Off,
}

impl Logging {
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            Logging::Info => LevelFilter::INFO,
            Logging::Debug => LevelFilter::DEBUG,
            Logging::Off => LevelFilter::OFF,
        }
    }
}
