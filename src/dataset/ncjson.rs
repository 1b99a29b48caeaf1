//! Backend for the JSON rendering of netCDF files (`ncks --json --hdn`).
//!
//! The whole document is held in memory. Attribute writes mark it dirty and
//! are persisted on `sync`/`close` by writing a hidden sibling file and
//! renaming it over the original.

use super::{AttrValue, DType, Dataset, DatasetError, Dimension, OpenMode, Target};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path, PathBuf};

/// A dataset backed by an NCO JSON document
#[derive(Debug)]
pub struct JsonDataset {
    path: PathBuf,
    mode: OpenMode,
    doc: Map<String, Value>,
    dirty: bool,
}

impl JsonDataset {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self, DatasetError> {
        let content = fs::read_to_string(path).map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| DatasetError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_value(path, value, mode)
    }

    /// Wrap an already parsed document. Nothing touches `path` until a sync.
    pub fn from_value(path: &Path, value: Value, mode: OpenMode) -> Result<Self, DatasetError> {
        let Value::Object(doc) = value else {
            return Err(DatasetError::Parse {
                path: path.to_path_buf(),
                message: "expected a JSON object at the top level".to_string(),
            });
        };
        Ok(Self {
            path: path.to_path_buf(),
            mode,
            doc,
            dirty: false,
        })
    }

    /// The document as CDL, named after the file stem.
    pub fn to_cdl(&self) -> String {
        let name = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string());
        super::cdl::render(&name, &self.doc)
    }

    fn variables(&self) -> Option<&Map<String, Value>> {
        self.doc.get("variables").and_then(Value::as_object)
    }

    fn variable(&self, name: &str) -> Option<&Map<String, Value>> {
        self.variables()?.get(name)?.as_object()
    }

    fn attributes(&self, target: Target<'_>) -> Option<&Map<String, Value>> {
        match target {
            Target::Global => self.doc.get("attributes")?.as_object(),
            Target::Variable(name) => self.variable(name)?.get("attributes")?.as_object(),
        }
    }

    fn attributes_mut(
        &mut self,
        target: Target<'_>,
    ) -> Result<&mut Map<String, Value>, DatasetError> {
        let owner = match target {
            Target::Global => &mut self.doc,
            Target::Variable(name) => self
                .doc
                .get_mut("variables")
                .and_then(Value::as_object_mut)
                .and_then(|vars| vars.get_mut(name))
                .and_then(Value::as_object_mut)
                .ok_or_else(|| DatasetError::VariableMissing(name.to_string()))?,
        };
        owner
            .entry("attributes")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| DatasetError::Parse {
                path: self.path.clone(),
                message: format!("attributes of {target} are not an object"),
            })
    }

    /// Valid values of a variable in storage order, fill values masked out.
    fn values(&self, variable: &str) -> Result<Vec<f64>, DatasetError> {
        if self.variable(variable).is_none() {
            return Err(DatasetError::VariableMissing(variable.to_string()));
        }
        let fills: Vec<f64> = ["_FillValue", "missing_value"]
            .iter()
            .filter_map(|name| self.read_attribute(Target::Variable(variable), name))
            .filter_map(|value| value.as_f64())
            .collect();

        let mut values = Vec::new();
        if let Some(data) = self.variable(variable).and_then(|var| var.get("data")) {
            flatten(data, &mut values);
        }
        values.retain(|v| !v.is_nan() && !fills.contains(v));
        Ok(values)
    }
}

fn flatten(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten(item, out)),
        Value::Number(n) => out.extend(n.as_f64()),
        _ => {}
    }
}

fn parse_attr(value: &Value) -> Option<AttrValue> {
    match value {
        Value::String(s) => Some(AttrValue::Text(s.clone())),
        Value::Number(n) => n.as_f64().map(AttrValue::Number),
        Value::Array(items) => {
            if let [Value::String(s)] = items.as_slice() {
                return Some(AttrValue::Text(s.clone()));
            }
            let numbers = items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>()?;
            match numbers.as_slice() {
                [single] => Some(AttrValue::Number(*single)),
                _ => Some(AttrValue::Numbers(numbers)),
            }
        }
        // typed form: {"type": "float", "data": ...}
        Value::Object(obj) => obj.get("data").and_then(parse_attr),
        _ => None,
    }
}

/// Encode a value, keeping the typed form if the attribute already used it.
fn encode_attr(existing: Option<&Value>, value: &AttrValue) -> Value {
    let data = match value {
        AttrValue::Number(n) => json!(n),
        AttrValue::Numbers(v) => json!(v),
        AttrValue::Text(s) => json!(s),
    };
    match existing.and_then(Value::as_object) {
        Some(obj) if obj.contains_key("type") => {
            let ty = match value {
                AttrValue::Text(_) => "char",
                _ => obj.get("type").and_then(Value::as_str).unwrap_or("double"),
            };
            json!({ "type": ty, "data": data })
        }
        _ => data,
    }
}

impl Dataset for JsonDataset {
    fn path(&self) -> &Path {
        &self.path
    }

    fn dimensions(&self) -> Vec<Dimension> {
        self.doc
            .get("dimensions")
            .and_then(Value::as_object)
            .map(|dims| {
                dims.iter()
                    .map(|(name, size)| Dimension {
                        name: name.clone(),
                        size: size.as_u64().unwrap_or(0) as usize,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables()
            .map(|vars| vars.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn dtype(&self, variable: &str) -> Option<DType> {
        let ty = self.variable(variable)?.get("type")?.as_str()?;
        DType::from_netcdf(ty)
    }

    fn variable_dimensions(&self, variable: &str) -> Option<Vec<String>> {
        let var = self.variable(variable)?;
        let Some(shape) = var.get("shape").and_then(Value::as_array) else {
            return Some(vec![]);
        };
        Some(
            shape
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        )
    }

    fn attribute_names(&self, target: Target<'_>) -> Vec<String> {
        self.attributes(target)
            .map(|attrs| {
                attrs
                    .keys()
                    .filter(|name| !name.starts_with("_Storage") && *name != "_ChunkSizes")
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn read_attribute(&self, target: Target<'_>, name: &str) -> Option<AttrValue> {
        parse_attr(self.attributes(target)?.get(name)?)
    }

    fn write_attribute(
        &mut self,
        target: Target<'_>,
        name: &str,
        value: AttrValue,
    ) -> Result<(), DatasetError> {
        if self.read_attribute(target, name).as_ref() == Some(&value) {
            return Ok(());
        }
        if self.mode == OpenMode::Read {
            return Err(DatasetError::ReadOnly(self.path.clone()));
        }
        let attrs = self.attributes_mut(target)?;
        let encoded = encode_attr(attrs.get(name), &value);
        attrs.insert(name.to_string(), encoded);
        self.dirty = true;
        Ok(())
    }

    fn chunking(&self, variable: &str) -> Option<Vec<usize>> {
        let target = Target::Variable(variable);
        if let Some(AttrValue::Text(storage)) = self.read_attribute(target, "_Storage") {
            if storage == "contiguous" {
                return None;
            }
        }
        match self.read_attribute(target, "_ChunkSizes")? {
            AttrValue::Number(n) => Some(vec![n as usize]),
            AttrValue::Numbers(v) => Some(v.into_iter().map(|n| n as usize).collect()),
            AttrValue::Text(_) => None,
        }
    }

    fn reduce_min(&self, variable: &str) -> Result<Option<f64>, DatasetError> {
        Ok(self.values(variable)?.into_iter().reduce(f64::min))
    }

    fn reduce_max(&self, variable: &str) -> Result<Option<f64>, DatasetError> {
        Ok(self.values(variable)?.into_iter().reduce(f64::max))
    }

    fn endpoints(&self, variable: &str) -> Result<Option<(f64, f64)>, DatasetError> {
        let values = self.values(variable)?;
        Ok(values.first().copied().zip(values.last().copied()))
    }

    fn sync(&mut self) -> Result<(), DatasetError> {
        if !self.dirty {
            return Ok(());
        }
        if self.mode == OpenMode::Read {
            return Err(DatasetError::ReadOnly(self.path.clone()));
        }
        let write_err = |source| DatasetError::Write {
            path: self.path.clone(),
            source,
        };
        let content = serde_json::to_string_pretty(&self.doc)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self.path.with_file_name(format!(".{file_name}.sync"));
        fs::write(&tmp, content).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        self.dirty = false;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<(), DatasetError> {
        self.sync()
    }
}
