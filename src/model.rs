//! Data model: naming-scheme specifiers, metadata snapshots and rule definitions.

use crate::dataset::{AttrValue, DType, Dataset, Dimension, Target};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Specifiers
// =============================================================================

/// One value captured from a file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Specifier {
    Int(i64),
    Str(String),
}

impl Specifier {
    /// Digit-only captures become integers.
    pub fn parse(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = raw.parse() {
                return Self::Int(n);
            }
        }
        Self::Str(raw.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

pub type Specifiers = BTreeMap<String, Specifier>;

// =============================================================================
// Metadata snapshot
// =============================================================================

/// Header of one variable as seen at snapshot time
#[derive(Debug, Clone, PartialEq)]
pub struct VariableMeta {
    pub name: String,
    pub dtype: Option<DType>,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    pub chunking: Option<Vec<usize>>,
    pub attributes: BTreeMap<String, AttrValue>,
}

impl VariableMeta {
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }
}

/// Everything the rules inspect except the payload itself.
///
/// Read once per open; a re-encoded file gets a fresh snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub dimensions: Vec<Dimension>,
    pub variables: Vec<VariableMeta>,
    pub global_attributes: BTreeMap<String, AttrValue>,
}

fn read_attributes(dataset: &dyn Dataset, target: Target<'_>) -> BTreeMap<String, AttrValue> {
    dataset
        .attribute_names(target)
        .into_iter()
        .filter_map(|name| {
            let value = dataset.read_attribute(target, &name)?;
            Some((name, value))
        })
        .collect()
}

impl Metadata {
    pub fn read(dataset: &dyn Dataset) -> Self {
        let dimensions = dataset.dimensions();
        let variables = dataset
            .variable_names()
            .into_iter()
            .map(|name| {
                let var_dims = dataset.variable_dimensions(&name).unwrap_or_default();
                let shape = var_dims
                    .iter()
                    .map(|d| {
                        dimensions
                            .iter()
                            .find(|dim| &dim.name == d)
                            .map_or(0, |dim| dim.size)
                    })
                    .collect();
                VariableMeta {
                    dtype: dataset.dtype(&name),
                    chunking: dataset.chunking(&name),
                    attributes: read_attributes(dataset, Target::Variable(&name)),
                    dimensions: var_dims,
                    shape,
                    name,
                }
            })
            .collect();

        Self {
            global_attributes: read_attributes(dataset, Target::Global),
            dimensions,
            variables,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&VariableMeta> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// JSON document handed to the schema validator.
    pub fn to_instance(&self, specifiers: &Specifiers) -> Value {
        let dimensions: Map<String, Value> = self
            .dimensions
            .iter()
            .map(|d| (d.name.clone(), json!(d.size)))
            .collect();
        let variables: Map<String, Value> = self
            .variables
            .iter()
            .map(|v| {
                (
                    v.name.clone(),
                    json!({
                        "dtype": v.dtype,
                        "dimensions": v.dimensions,
                        "shape": v.shape,
                        "chunking": v.chunking,
                        "attributes": v.attributes,
                    }),
                )
            })
            .collect();

        json!({
            "dimensions": dimensions,
            "variables": variables,
            "global_attributes": self.global_attributes,
            "specifiers": specifiers,
        })
    }
}

// =============================================================================
// Rule definitions
// =============================================================================

/// How a range rule reduces the payload before comparing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// Minimum and maximum over all valid values
    #[default]
    Global,
    /// Smaller and larger of the first and last stored values
    Endpoints,
}

/// Required storage order of a coordinate axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisOrder {
    Ascending,
    Descending,
}

/// Expectations for a coordinate variable (`lat`, `lon`, ...)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AxisDefinition {
    pub axis: Option<String>,
    pub standard_name: Option<String>,
    #[serde(default)]
    pub long_names: Vec<String>,
    pub units: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub order: Option<AxisOrder>,
    #[serde(default)]
    pub reduction: Reduction,
}

/// Expectations for a data variable (`tas`, `dis`, ...)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariableDefinition {
    pub units: Option<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    pub valid_min: Option<f64>,
    pub valid_max: Option<f64>,
    #[serde(default)]
    pub reduction: Reduction,
}

/// Rule definitions of one protocol path
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub dimensions: BTreeMap<String, AxisDefinition>,
    #[serde(default)]
    pub variable: BTreeMap<String, VariableDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{JsonDataset, OpenMode};
    use std::path::Path;

    #[test]
    fn test_specifier_parse() {
        assert_eq!(Specifier::parse("1850"), Specifier::Int(1850));
        assert_eq!(Specifier::parse("tas"), Specifier::Str("tas".to_string()));
        assert_eq!(Specifier::parse("2a"), Specifier::Str("2a".to_string()));
        assert_eq!(Specifier::parse(""), Specifier::Str(String::new()));
    }

    #[test]
    fn test_definitions_ignore_unknown_fields() {
        let defs: Definitions = serde_json::from_value(json!({
            "dimensions": {
                "lat": {
                    "axis": "Y",
                    "long_names": ["latitude", "Latitude"],
                    "minimum": -89.75,
                    "order": "descending",
                    "reduction": "endpoints",
                    "comment": "not used"
                }
            },
            "variable": { "tas": { "units": "K" } },
            "experiment": {}
        }))
        .expect("definitions should parse");

        let lat = &defs.dimensions["lat"];
        assert_eq!(lat.axis.as_deref(), Some("Y"));
        assert_eq!(lat.order, Some(AxisOrder::Descending));
        assert_eq!(lat.reduction, Reduction::Endpoints);
        assert_eq!(defs.variable["tas"].reduction, Reduction::Global);
    }

    #[test]
    fn test_metadata_snapshot_and_instance() {
        let ds = JsonDataset::from_value(
            Path::new("x.nc"),
            json!({
                "dimensions": { "time": 4, "lat": 2 },
                "variables": {
                    "tas": {
                        "shape": ["time", "lat"],
                        "type": "float",
                        "attributes": { "units": "K", "_ChunkSizes": [1, 2] }
                    }
                },
                "attributes": { "institution": "PIK" }
            }),
            OpenMode::Read,
        )
        .expect("fixture");

        let meta = Metadata::read(&ds);
        let tas = meta.variable("tas").expect("tas in snapshot");
        assert_eq!(tas.shape, [4, 2]);
        assert_eq!(tas.chunking, Some(vec![1, 2]));
        assert_eq!(tas.attribute("units"), Some(&AttrValue::from("K")));
        assert!(tas.attribute("_ChunkSizes").is_none());

        let mut specifiers = Specifiers::new();
        specifiers.insert("variable".to_string(), Specifier::parse("tas"));
        specifiers.insert("start_year".to_string(), Specifier::parse("2001"));

        insta::assert_json_snapshot!(meta.to_instance(&specifiers), @r#"
        {
          "dimensions": {
            "time": 4,
            "lat": 2
          },
          "variables": {
            "tas": {
              "dtype": "float32",
              "dimensions": [
                "time",
                "lat"
              ],
              "shape": [
                4,
                2
              ],
              "chunking": [
                1,
                2
              ],
              "attributes": {
                "units": "K"
              }
            }
          },
          "global_attributes": {
            "institution": "PIK"
          },
          "specifiers": {
            "start_year": 2001,
            "variable": "tas"
          }
        }
        "#);
    }
}
