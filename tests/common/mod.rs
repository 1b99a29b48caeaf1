//! Common helpers for CLI tests: a temp protocol, NCO JSON files and a
//! runner for the built binary.

#![allow(dead_code)] // Functions used across different test binaries

use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub const SCHEMA_PATH: &str = "ISIMIP3b/OutputData/water_global";
pub const FILE_NAME: &str = "lpjml_tas_2001_2002.nc";

/// A temp directory holding `protocol/`, `unchecked/` and `checked/`.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let project = Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        };
        project.write_protocol("pattern", &pattern());
        project.write_protocol("schema", &schema());
        project.write_protocol("definitions", &definitions());
        fs::create_dir_all(project.unchecked()).expect("failed to create unchecked dir");
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn protocol(&self) -> PathBuf {
        self.path().join("protocol")
    }

    pub fn unchecked(&self) -> PathBuf {
        self.path().join("unchecked")
    }

    pub fn checked(&self) -> PathBuf {
        self.path().join("checked")
    }

    pub fn write_protocol(&self, kind: &str, value: &Value) {
        let path = self
            .protocol()
            .join(kind)
            .join(format!("{SCHEMA_PATH}.json"));
        fs::create_dir_all(path.parent().expect("has parent")).expect("failed to create dir");
        fs::write(path, value.to_string()).expect("failed to write protocol file");
    }

    /// Write an NCO JSON document below `unchecked/`.
    pub fn write_file(&self, relative: &str, doc: &Value) -> PathBuf {
        let path = self.unchecked().join(relative);
        fs::create_dir_all(path.parent().expect("has parent")).expect("failed to create dir");
        fs::write(&path, doc.to_string()).expect("failed to write file");
        path
    }

    pub fn read_file(&self, path: &Path) -> Value {
        let content = fs::read_to_string(path).expect("failed to read file");
        serde_json::from_str(&content).expect("file is not JSON")
    }

    /// Arguments pointing the binary at this project
    pub fn base_args(&self) -> Vec<String> {
        vec![
            SCHEMA_PATH.to_string(),
            "--protocol-location".to_string(),
            self.protocol().display().to_string(),
            "--unchecked-path".to_string(),
            self.unchecked().display().to_string(),
            "--checked-path".to_string(),
            self.checked().display().to_string(),
        ]
    }

    /// Run isimip-qc with the project arguments plus `extra`.
    pub fn run(&self, extra: &[&str]) -> Run {
        let mut args = self.base_args();
        args.extend(extra.iter().map(ToString::to_string));
        run_in(self.path(), &args)
    }
}

/// Exit code and combined output of one invocation
pub struct Run {
    pub code: i32,
    pub output: String,
}

impl Run {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Run isimip-qc in `dir` and capture its output, with paths below `dir`
/// replaced by `<TEMPDIR>`.
pub fn run_in(dir: &Path, args: &[String]) -> Run {
    let result = Command::new(env!("CARGO_BIN_EXE_isimip-qc"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run isimip-qc");

    let mut output = String::from_utf8_lossy(&result.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&result.stderr));
    Run {
        code: result.status.code().unwrap_or(-1),
        output: normalize_output(&output, dir),
    }
}

/// Normalize output for stable assertions:
/// - Replace temp directory paths with `<TEMPDIR>`
/// - Replace log timestamps with `<TS>`
pub fn normalize_output(output: &str, dir: &Path) -> String {
    let normalized = output.replace(&dir.display().to_string(), "<TEMPDIR>");
    let timestamp =
        regex::Regex::new(r"\[\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}\]").expect("valid regex");
    timestamp.replace_all(&normalized, "[<TS>]").into_owned()
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("failed to chmod");
    path
}

/// Stand-ins for the netCDF tools, returned as a `[reencode]` config table.
///
/// `ncgen` copies the CDL through, `nccopy` runs `body` with `$in` and
/// `$out` set to its last two arguments, and `ncks` prints `exported`, or
/// the nccopy output as is when `exported` is `None`.
#[cfg(unix)]
pub fn fake_reencoders(dir: &Path, body: &str, exported: Option<&Value>) -> String {
    let ncks = match exported {
        Some(doc) => {
            let rendered = dir.join("exported.json");
            fs::write(&rendered, doc.to_string()).expect("failed to write export");
            script(dir, "ncks", &format!("cat '{}'", rendered.display()))
        }
        None => script(dir, "ncks", "cat \"$3\""),
    };
    let ncgen = script(dir, "ncgen", "cp \"$5\" \"$4\"");
    let nccopy = script(
        dir,
        "nccopy",
        &format!("for a; do in=\"$out\"; out=\"$a\"; done\n{body}"),
    );
    format!(
        "[reencode]\nncgen = \"{}\"\nnccopy = \"{}\"\nncks = \"{}\"\n",
        ncgen.display(),
        nccopy.display(),
        ncks.display()
    )
}

// =============================================================================
// Protocol and file fixtures
// =============================================================================

pub fn pattern() -> Value {
    json!({
        "path": "^.*$",
        "file": "^(?P<model>[a-z0-9-]+)_(?P<variable>[a-z]+)_(?P<start_year>\\d{4})_(?P<end_year>\\d{4})\\.nc$",
        "suffix": [".nc"]
    })
}

pub fn schema() -> Value {
    json!({
        "type": "object",
        "required": ["dimensions", "variables", "specifiers"],
        "properties": {
            "specifiers": {
                "type": "object",
                "properties": {
                    "variable": { "enum": ["tas", "pr"] }
                }
            }
        }
    })
}

pub fn definitions() -> Value {
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

/// A file passing every check on a 360x720 grid, stored small: the
/// variable is 2 x 3 x 4, so chunks are clamped to [1, 3, 4].
pub fn conforming() -> Value {
    let tas: Vec<f64> = (0..24).map(|i| 270.0 + f64::from(i)).collect();
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
                    "long_name": "longitude",
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
