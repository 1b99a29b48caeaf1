//! Shared test fixtures: a small conforming file and its protocol.

use super::{Rule, RuleContext, run_rules};
use crate::config::{Config, Grid, Settings};
use crate::dataset::{Dataset, JsonDataset, OpenMode};
use crate::diagnostic::Diagnostic;
use crate::model::{Definitions, Metadata, Specifier, Specifiers};
use crate::protocol::{Pattern, Protocol};
use serde_json::{Value, json};
use std::path::Path;

pub(crate) const SCHEMA_PATH: &str = "ISIMIP3b/OutputData/water_global";
pub(crate) const FILE_NAME: &str = "lpjml_tas_2001_2002.nc";

/// Header and payload of a file that passes every rule on a 3x4 grid.
pub(crate) fn conforming() -> Value {
    let mut tas: Vec<f64> = (0..24).map(|i| 270.0 + f64::from(i)).collect();
    tas[5] = 1e20;
    json!({
        "dimensions": { "time": 2, "lat": 3, "lon": 4 },
        "variables": {
            "time": {
                "shape": ["time"],
                "type": "double",
                "attributes": { "units": "days since 1601-1-1 00:00:00" },
                "data": [0.0, 1.0]
            },
            "lat": {
                "shape": ["lat"],
                "type": "double",
                "attributes": {
                    "axis": "Y",
                    "standard_name": "latitude",
                    "long_name": "latitude",
                    "units": "degrees_north"
                },
                "data": [89.75, 0.0, -89.75]
            },
            "lon": {
                "shape": ["lon"],
                "type": "double",
                "attributes": {
                    "axis": "X",
                    "standard_name": "longitude",
                    "long_name": "Longitude",
                    "units": "degrees_east"
                },
                "data": [-179.75, -60.0, 60.0, 179.75]
            },
            "tas": {
                "shape": ["time", "lat", "lon"],
                "type": "float",
                "attributes": {
                    "_FillValue": { "type": "float", "data": 1e20 },
                    "missing_value": { "type": "float", "data": 1e20 },
                    "units": "K",
                    "_ChunkSizes": [1, 3, 4]
                },
                "data": tas
            }
        },
        "attributes": { "contact": "someone@example.org" }
    })
}

pub(crate) fn pattern_json() -> Value {
    json!({
        "file": "^(?P<model>[a-z0-9-]+)_(?P<variable>[a-z]+)_(?P<start_year>\\d{4})_(?P<end_year>\\d{4})\\.nc$",
        "suffix": [".nc"]
    })
}

pub(crate) fn schema_json() -> Value {
    json!({
        "type": "object",
        "required": ["dimensions", "variables", "specifiers"],
        "properties": {
            "specifiers": {
                "type": "object",
                "required": ["variable"],
                "properties": {
                    "variable": { "enum": ["tas", "pr"] },
                    "start_year": { "type": "integer" }
                }
            }
        }
    })
}

pub(crate) fn definitions_json() -> Value {
    json!({
        "dimensions": {
            "lat": {
                "axis": "Y",
                "standard_name": "latitude",
                "long_names": ["latitude", "Latitude"],
                "units": "degrees_north",
                "minimum": -89.75,
                "maximum": 89.75
            },
            "lon": {
                "axis": "X",
                "standard_name": "longitude",
                "long_names": ["longitude", "Longitude"],
                "units": "degrees_east",
                "minimum": -179.75,
                "maximum": 179.75
            }
        },
        "variable": {
            "tas": {
                "units": "K",
                "dimensions": ["time", "lat", "lon"],
                "valid_min": 100.0,
                "valid_max": 400.0
            }
        }
    })
}

pub(crate) fn protocol() -> Protocol {
    let pattern = pattern_json();
    let pattern = Pattern::new(
        pattern["file"].as_str().unwrap_or_default(),
        vec![".nc".to_string()],
    )
    .expect("valid pattern");
    let definitions: Definitions =
        serde_json::from_value(definitions_json()).expect("valid definitions");
    Protocol::new(pattern, &schema_json(), definitions).expect("valid protocol")
}

pub(crate) fn settings() -> Settings {
    let mut settings = Settings::new(SCHEMA_PATH, Config::default());
    settings.grid = Grid { lat: 3, lon: 4 };
    settings
}

pub(crate) fn specifiers() -> Specifiers {
    [
        ("model", "lpjml"),
        ("variable", "tas"),
        ("start_year", "2001"),
        ("end_year", "2002"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), Specifier::parse(v)))
    .collect()
}

/// One in-memory file plus everything the rules need
pub(crate) struct Fixture {
    pub dataset: Box<dyn Dataset>,
    pub specifiers: Specifiers,
    pub protocol: Protocol,
    pub settings: Settings,
}

impl Fixture {
    pub fn new(doc: Value) -> Self {
        let dataset = JsonDataset::from_value(Path::new(FILE_NAME), doc, OpenMode::Read)
            .expect("fixture document");
        Self {
            dataset: Box::new(dataset),
            specifiers: specifiers(),
            protocol: protocol(),
            settings: settings(),
        }
    }

    pub fn run(&self, rules: &[Rule]) -> Vec<Diagnostic> {
        let metadata = Metadata::read(self.dataset.as_ref());
        let ctx = RuleContext {
            metadata: &metadata,
            dataset: self.dataset.as_ref(),
            specifiers: &self.specifiers,
            protocol: &self.protocol,
            settings: &self.settings,
        };
        run_rules(rules, &ctx)
    }
}

/// Codes of the non-info diagnostics, in order
pub(crate) fn findings(diags: &[Diagnostic]) -> Vec<&'static str> {
    diags
        .iter()
        .filter(|d| d.severity != crate::diagnostic::Severity::Info)
        .map(|d| d.code.code())
        .collect()
}
