//! Access to array-on-disk datasets.
//!
//! The checks only talk to the [`Dataset`] trait. The shipped backend reads
//! the JSON rendering of netCDF files written by `ncks --json --hdn`, and can
//! render it as CDL for `ncgen` when a file has to be rebuilt as netCDF.

mod cdl;
mod ncjson;

pub use ncjson::JsonDataset;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// How a dataset is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    ReadWrite,
}

/// Owner of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Global,
    Variable(&'a str),
}

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global attributes"),
            Self::Variable(name) => write!(f, "{name}"),
        }
    }
}

/// An attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Numbers(Vec<f64>),
    Text(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Scalar numeric value; single-element arrays count as scalars.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Numbers(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Numbers(v) => {
                let items: Vec<String> = v.iter().map(|n| n.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Self::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Element type of a variable, named the way numpy names them
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Char,
    #[serde(rename = "string")]
    #[strum(serialize = "string")]
    Str,
}

impl DType {
    /// Map a netCDF type name (`float`, `double`, `int`, ...) to a dtype.
    pub fn from_netcdf(name: &str) -> Option<Self> {
        let dtype = match name {
            "byte" => Self::Int8,
            "ubyte" => Self::UInt8,
            "short" => Self::Int16,
            "ushort" => Self::UInt16,
            "int" => Self::Int32,
            "uint" => Self::UInt32,
            "int64" => Self::Int64,
            "uint64" => Self::UInt64,
            "float" => Self::Float32,
            "double" => Self::Float64,
            "char" => Self::Char,
            "string" => Self::Str,
            other => return other.parse().ok(),
        };
        Some(dtype)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// A named dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub size: usize,
}

/// Dataset access errors
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("variable \"{0}\" is missing")]
    VariableMissing(String),

    #[error("{} is opened read-only", .0.display())]
    ReadOnly(PathBuf),
}

/// Reader/writer for one opened dataset
pub trait Dataset {
    fn path(&self) -> &Path;

    /// Dimensions in declaration order
    fn dimensions(&self) -> Vec<Dimension>;

    fn variable_names(&self) -> Vec<String>;

    fn dtype(&self, variable: &str) -> Option<DType>;

    /// Dimension names of a variable, in storage order
    fn variable_dimensions(&self, variable: &str) -> Option<Vec<String>>;

    fn attribute_names(&self, target: Target<'_>) -> Vec<String>;

    /// `None` if the target or the attribute does not exist
    fn read_attribute(&self, target: Target<'_>, name: &str) -> Option<AttrValue>;

    /// Set an attribute. Writing the value it already has is a no-op.
    fn write_attribute(
        &mut self,
        target: Target<'_>,
        name: &str,
        value: AttrValue,
    ) -> Result<(), DatasetError>;

    /// Chunk sizes per dimension, `None` for contiguous storage
    fn chunking(&self, variable: &str) -> Option<Vec<usize>>;

    /// Minimum over all valid (non-fill) values
    fn reduce_min(&self, variable: &str) -> Result<Option<f64>, DatasetError>;

    /// Maximum over all valid (non-fill) values
    fn reduce_max(&self, variable: &str) -> Result<Option<f64>, DatasetError>;

    /// First and last stored valid values
    fn endpoints(&self, variable: &str) -> Result<Option<(f64, f64)>, DatasetError>;

    /// Persist pending writes
    fn sync(&mut self) -> Result<(), DatasetError>;

    /// Persist pending writes and release the dataset
    fn close(self: Box<Self>) -> Result<(), DatasetError>;
}

/// Open a dataset with the default backend.
pub fn open_dataset(path: &Path, mode: OpenMode) -> Result<Box<dyn Dataset>, DatasetError> {
    Ok(Box::new(JsonDataset::open(path, mode)?))
}

/// Render the dataset at `path` as CDL.
pub fn export_cdl(path: &Path) -> Result<String, DatasetError> {
    Ok(JsonDataset::open(path, OpenMode::Read)?.to_cdl())
}
