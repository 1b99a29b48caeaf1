//! Configuration loading and the merged run settings.

use crate::log::LogLevel;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the config file searched for when none is given
pub const CONFIG_FILE_NAME: &str = "isimip-qc.toml";

/// Project configuration (isimip-qc.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub check: CheckConfig,
    #[serde(default)]
    pub fix: FixConfig,
    #[serde(default)]
    pub reencode: ReencodeConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Root of the files to check
    #[serde(default = "default_unchecked_path")]
    pub unchecked_path: PathBuf,
    /// Destination root for clean files
    #[serde(default)]
    pub checked_path: Option<PathBuf>,
    /// Root for per-file log files
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

fn default_unchecked_path() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            unchecked_path: default_unchecked_path(),
            checked_path: None,
            log_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    /// Protocol roots holding pattern/, schema/ and definitions/
    #[serde(default = "default_locations")]
    pub locations: Vec<PathBuf>,
    /// Sectors exempt from the coordinate range checks
    #[serde(default = "default_regional_sectors")]
    pub regional_sectors: Vec<String>,
}

fn default_locations() -> Vec<PathBuf> {
    vec![PathBuf::from("isimip-protocol-3/output")]
}

fn default_regional_sectors() -> Vec<String> {
    vec![
        "marine-fishery_regional".to_string(),
        "water_regional".to_string(),
    ]
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            regional_sectors: default_regional_sectors(),
        }
    }
}

/// Expected spatial chunk sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Grid {
    pub lat: usize,
    pub lon: usize,
}

impl Default for Grid {
    fn default() -> Self {
        Self { lat: 360, lon: 720 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    /// Compute payload min/max against valid_min/valid_max (slow)
    #[serde(default)]
    pub minmax: bool,
    /// Coordinate variables checked against the dimension definitions
    #[serde(default = "default_axes")]
    pub axes: Vec<String>,
    #[serde(default)]
    pub grid: Grid,
}

fn default_axes() -> Vec<String> {
    vec!["lat".to_string(), "lon".to_string()]
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            minmax: false,
            axes: default_axes(),
            grid: Grid::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixConfig {
    /// Apply attribute rewrites
    #[serde(default)]
    pub attributes: bool,
    /// Re-encoder used for data model fixes (`nccopy` or `ncks`)
    #[serde(default)]
    pub datamodel: Option<String>,
}

/// Executables of the netCDF tools used for data model fixes.
///
/// `ncgen` builds netCDF from CDL, `nccopy` or `ncks` re-encodes it, and
/// `ncks` renders the result back as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReencodeConfig {
    #[serde(default = "default_ncgen")]
    pub ncgen: PathBuf,
    #[serde(default = "default_nccopy")]
    pub nccopy: PathBuf,
    #[serde(default = "default_ncks")]
    pub ncks: PathBuf,
}

fn default_ncgen() -> PathBuf {
    PathBuf::from("ncgen")
}

fn default_nccopy() -> PathBuf {
    PathBuf::from("nccopy")
}

fn default_ncks() -> PathBuf {
    PathBuf::from("ncks")
}

impl Default for ReencodeConfig {
    fn default() -> Self {
        Self {
            ncgen: default_ncgen(),
            nccopy: default_nccopy(),
            ncks: default_ncks(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LockConfig {
    /// Seconds to wait for another run on the same tree (0 = fail at once)
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Config {
    /// Load config from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                Some(p.to_path_buf())
            }
            None => Self::find_config(),
        };

        let Some(config_path) = config_path else {
            return Ok(Config::default());
        };
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
        Ok(config)
    }

    /// Find config file by walking up directory tree
    fn find_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                return None;
            }
        }
    }
}

/// What happens to clean files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Move,
    Copy,
}

/// Immutable settings of one run: the config file merged with the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Protocol path, e.g. `ISIMIP3b/OutputData/water_global`
    pub schema_path: String,
    pub unchecked_path: PathBuf,
    pub checked_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub log_level: LogLevel,
    pub protocol_locations: Vec<PathBuf>,
    pub regional_sectors: Vec<String>,
    pub transfer: Option<Transfer>,
    pub first_file: bool,
    pub stop_on_warnings: bool,
    pub stop_on_errors: bool,
    pub minmax: bool,
    pub axes: Vec<String>,
    pub grid: Grid,
    pub fix_attributes: bool,
    pub fix_datamodel: Option<String>,
    pub reencode: ReencodeConfig,
    pub lock_timeout_secs: u64,
}

impl Settings {
    pub fn new(schema_path: impl Into<String>, config: Config) -> Self {
        Self {
            schema_path: schema_path.into(),
            unchecked_path: config.paths.unchecked_path,
            checked_path: config.paths.checked_path,
            log_path: config.paths.log_path,
            log_level: config.log.level,
            protocol_locations: config.protocol.locations,
            regional_sectors: config.protocol.regional_sectors,
            transfer: None,
            first_file: false,
            stop_on_warnings: false,
            stop_on_errors: false,
            minmax: config.check.minmax,
            axes: config.check.axes,
            grid: config.check.grid,
            fix_attributes: config.fix.attributes,
            fix_datamodel: config.fix.datamodel,
            reencode: config.reencode,
            lock_timeout_secs: config.lock.timeout_secs,
        }
    }

    /// Sector of the protocol path (its last component)
    pub fn sector(&self) -> &str {
        self.schema_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    pub fn is_regional(&self) -> bool {
        let sector = self.sector();
        self.regional_sectors.iter().any(|s| s == sector)
    }
}
