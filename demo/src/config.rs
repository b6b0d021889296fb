use std::env::var_os;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use lcdbridge_driver::config::DriverConfig;
use serde::{Serialize, Deserialize};

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub driver: DriverConfig,
}

impl Config {
    fn path() -> PathBuf {
        let config_str = var_os("LCDBRIDGE_CONFIG");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("lcdbridge.json"));
        Path::new(config_str).to_path_buf()
    }

    pub fn try_load() -> Option<Self> {
        let config_path = Self::path();
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let file = std::fs::File::create(Self::path())?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
