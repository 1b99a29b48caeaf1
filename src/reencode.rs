//! Data model fixes through an external re-encoder (`nccopy` or `ncks`).
//!
//! Files are held as NCO JSON, so a re-encode is a round trip through
//! netCDF: the document is rendered as CDL, `ncgen` builds a netCDF file
//! from it, the chosen tool rewrites that file, and `ncks --json --hdn`
//! renders the result back. The rendering replaces the original only once it
//! opens as a dataset. Intermediate files are hidden siblings of the original
//! and are removed on return, whatever the outcome.

use crate::config::{Grid, ReencodeConfig};
use crate::dataset::{DatasetError, OpenMode, export_cdl, open_dataset};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Supported re-encoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ReencodeTool {
    Nccopy,
    Ncks,
}

/// Re-encode failures
#[derive(Debug, thiserror::Error)]
pub enum ReencodeError {
    #[error("unknown re-encode tool \"{0}\" (use nccopy or ncks)")]
    UnknownTool(String),

    #[error("{tool} is not available ({}): {source}", executable.display())]
    Unavailable {
        tool: String,
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("could not prepare the re-encode: {0}")]
    Prepare(#[source] DatasetError),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("re-encoded file can not be read back: {0}")]
    Unreadable(#[source] DatasetError),

    #[error("failed to replace {}: {source}", path.display())]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReencodeTool {
    pub fn executable(self, config: &ReencodeConfig) -> &Path {
        match self {
            Self::Nccopy => &config.nccopy,
            Self::Ncks => &config.ncks,
        }
    }

    /// Arguments producing netCDF4 classic, deflate level 5, one time step per chunk.
    pub fn args(self, grid: Grid, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = match self {
            Self::Nccopy => vec![
                "-k".into(),
                "nc4c".into(),
                "-d".into(),
                "5".into(),
                "-c".into(),
                format!("time/1,lat/{},lon/{}", grid.lat, grid.lon).into(),
            ],
            Self::Ncks => vec![
                "-O".into(),
                "-7".into(),
                "-L".into(),
                "5".into(),
                "--cnk_dmn".into(),
                "time,1".into(),
                "--cnk_dmn".into(),
                format!("lat,{}", grid.lat).into(),
                "--cnk_dmn".into(),
                format!("lon,{}", grid.lon).into(),
            ],
        };
        args.push(input.into());
        args.push(output.into());
        args
    }
}

/// Generate a random 4-char hex suffix
fn random_suffix() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    let bytes: [u8; 2] = rng.random();
    format!("{:02x}{:02x}", bytes[0], bytes[1])
}

/// Intermediate files of one re-encode, removed on drop
struct Scratch {
    stem: PathBuf,
    files: Vec<PathBuf>,
}

impl Scratch {
    fn new(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            stem: path.with_file_name(format!(".{name}.{}", random_suffix())),
            files: Vec::new(),
        }
    }

    /// A hidden sibling such as `.tas_2001.nc.3fa1.cdl.tmp`
    fn file(&mut self, kind: &str) -> PathBuf {
        let mut name = self.stem.clone().into_os_string();
        name.push(format!(".{kind}.tmp"));
        let path = PathBuf::from(name);
        self.files.push(path.clone());
        path
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for file in &self.files {
            let _ = fs::remove_file(file);
        }
    }
}

/// Run one netCDF program and return its stdout.
fn run(tool: &str, executable: &Path, args: Vec<OsString>) -> Result<Vec<u8>, ReencodeError> {
    let result = Command::new(executable)
        .args(args)
        .output()
        .map_err(|source| ReencodeError::Unavailable {
            tool: tool.to_string(),
            executable: executable.to_path_buf(),
            source,
        })?;

    if !result.status.success() {
        return Err(ReencodeError::Failed {
            tool: tool.to_string(),
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }
    Ok(result.stdout)
}

fn expect_output(tool: &str, output: &Path) -> Result<(), ReencodeError> {
    if output.is_file() {
        return Ok(());
    }
    Err(ReencodeError::Failed {
        tool: tool.to_string(),
        status: "exit status: 0".to_string(),
        stderr: format!("no output written to {}", output.display()),
    })
}

fn write(path: &Path, content: impl AsRef<[u8]>) -> Result<(), ReencodeError> {
    fs::write(path, content).map_err(|source| ReencodeError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn ncgen_args(cdl: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-k".into(),
        "nc4".into(),
        "-o".into(),
        output.into(),
        cdl.into(),
    ]
}

fn export_args(input: &Path) -> Vec<OsString> {
    vec!["--json".into(), "--hdn".into(), input.into()]
}

/// Re-encode `path` with `tool_name` and replace it with the result.
pub fn reencode_in_place(
    tool_name: &str,
    config: &ReencodeConfig,
    grid: Grid,
    path: &Path,
) -> Result<(), ReencodeError> {
    let tool: ReencodeTool = tool_name
        .parse()
        .map_err(|_| ReencodeError::UnknownTool(tool_name.to_string()))?;
    let cdl = export_cdl(path).map_err(ReencodeError::Prepare)?;

    let mut scratch = Scratch::new(path);
    let source = scratch.file("cdl");
    write(&source, cdl)?;

    let built = scratch.file("src");
    run("ncgen", &config.ncgen, ncgen_args(&source, &built))?;
    expect_output("ncgen", &built)?;

    let encoded = scratch.file("out");
    run(
        tool.as_ref(),
        tool.executable(config),
        tool.args(grid, &built, &encoded),
    )?;
    expect_output(tool.as_ref(), &encoded)?;

    let json = run("ncks", &config.ncks, export_args(&encoded))?;
    let rendered = scratch.file("json");
    write(&rendered, json)?;
    open_dataset(&rendered, OpenMode::Read).map_err(ReencodeError::Unreadable)?;

    fs::rename(&rendered, path).map_err(|source| ReencodeError::Replace {
        path: path.to_path_buf(),
        source,
    })
}
