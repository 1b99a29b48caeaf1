//! CDL rendering of NCO JSON documents.
//!
//! CDL is the text form `ncgen` builds netCDF files from. Hidden storage
//! attributes (`_ChunkSizes`, `_Storage`, ...) are kept, `ncgen` reads them
//! as layout instructions. Null data values become the CDL fill marker `_`.

use serde_json::{Map, Value};

/// Hidden global attributes describing the source file, not its contents
const FORMAT_ATTRIBUTES: [&str; 5] = [
    "_NCProperties",
    "_IsNetcdf4",
    "_SuperblockVersion",
    "_Format",
    "_SOURCE_FORMAT",
];

pub(super) fn render(name: &str, doc: &Map<String, Value>) -> String {
    let mut lines = vec![format!("netcdf {} {{", escape_name(name))];

    if let Some(dims) = doc.get("dimensions").and_then(Value::as_object) {
        lines.push("dimensions:".to_string());
        for (dim, size) in dims {
            let size = match size.as_u64() {
                Some(0) | None => "UNLIMITED".to_string(),
                Some(n) => n.to_string(),
            };
            lines.push(format!("\t{} = {size} ;", escape_name(dim)));
        }
    }

    let variables = doc.get("variables").and_then(Value::as_object);
    if let Some(vars) = variables {
        lines.push("variables:".to_string());
        for (var, body) in vars {
            let ty = var_type(body);
            let shape: Vec<String> = body
                .get("shape")
                .and_then(Value::as_array)
                .map(|dims| dims.iter().filter_map(Value::as_str).map(escape_name).collect())
                .unwrap_or_default();
            let declaration = if shape.is_empty() {
                format!("\t{ty} {} ;", escape_name(var))
            } else {
                format!("\t{ty} {}({}) ;", escape_name(var), shape.join(", "))
            };
            lines.push(declaration);

            let attrs = body.get("attributes").and_then(Value::as_object);
            for (att, value) in attrs.into_iter().flatten() {
                // _FillValue must have the type of its variable
                let fallback = (att == "_FillValue").then_some(ty);
                if let Some(line) = attribute(&escape_name(var), att, value, fallback) {
                    lines.push(line);
                }
            }
        }
    }

    if let Some(attrs) = doc.get("attributes").and_then(Value::as_object) {
        lines.push(String::new());
        lines.push("// global attributes:".to_string());
        for (att, value) in attrs {
            if FORMAT_ATTRIBUTES.contains(&att.as_str()) {
                continue;
            }
            if let Some(line) = attribute("", att, value, None) {
                lines.push(line);
            }
        }
    }

    let with_data: Vec<_> = variables
        .into_iter()
        .flatten()
        .filter_map(|(var, body)| Some((var, var_type(body), body.get("data")?)))
        .collect();
    if !with_data.is_empty() {
        lines.push("data:".to_string());
        for (var, ty, data) in with_data {
            let mut values = Vec::new();
            flatten(data, &mut values);
            let rendered: Vec<String> = values.iter().map(|v| literal(ty, v, false)).collect();
            lines.push(String::new());
            lines.push(format!(" {} = {} ;", escape_name(var), rendered.join(", ")));
        }
    }

    lines.push("}".to_string());
    let mut cdl = lines.join("\n");
    cdl.push('\n');
    cdl
}

fn var_type(body: &Value) -> &str {
    body.get("type").and_then(Value::as_str).unwrap_or("double")
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten(item, out)),
        other => out.push(other),
    }
}

/// Type of an attribute written without the typed `{"type", "data"}` form
fn inferred_type(values: &[&Value]) -> &'static str {
    match values {
        [Value::String(_)] => "char",
        [Value::String(_), ..] => "string",
        _ if values.iter().all(|v| v.is_i64() || v.is_u64()) => "int",
        _ => "double",
    }
}

fn attribute(owner: &str, name: &str, value: &Value, fallback: Option<&str>) -> Option<String> {
    let (declared, data) = match value {
        Value::Object(typed) => (typed.get("type").and_then(Value::as_str), typed.get("data")?),
        Value::Null => return None,
        plain => (None, plain),
    };
    let mut values = Vec::new();
    flatten(data, &mut values);
    if values.is_empty() {
        return None;
    }
    let ty = declared
        .or(fallback)
        .unwrap_or_else(|| inferred_type(&values));
    let rendered: Vec<String> = values.iter().map(|v| literal(ty, v, true)).collect();
    let prefix = if ty == "string" { "string " } else { "" };
    Some(format!(
        "\t\t{prefix}{owner}:{} = {} ;",
        escape_name(name),
        rendered.join(", ")
    ))
}

/// One CDL constant of type `ty`. Attribute constants carry a type suffix
/// since CDL infers attribute types from their literals.
fn literal(ty: &str, value: &Value, suffixed: bool) -> String {
    if value.is_null() {
        return "_".to_string();
    }
    if let Some(text) = value.as_str() {
        return quote(text);
    }
    let (number, suffix) = match ty {
        "float" => (real(value), "f"),
        "double" => (real(value), ""),
        "byte" => (integer(value), "b"),
        "ubyte" => (integer(value), "UB"),
        "short" => (integer(value), "s"),
        "ushort" => (integer(value), "US"),
        "int" => (integer(value), ""),
        "uint" => (integer(value), "U"),
        "int64" => (integer(value), "LL"),
        "uint64" => (integer(value), "ULL"),
        "char" | "string" => return quote(&value.to_string()),
        _ => (real(value), ""),
    };
    if suffixed {
        format!("{number}{suffix}")
    } else {
        number
    }
}

fn real(value: &Value) -> String {
    let f = value.as_f64().unwrap_or(f64::NAN);
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let sign = if f > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if f != 0.0 && (f.abs() >= 1e15 || f.abs() < 1e-4) {
        format!("{f:e}")
    } else {
        let text = f.to_string();
        if text.contains('.') {
            text
        } else {
            format!("{text}.0")
        }
    }
}

fn integer(value: &Value) -> String {
    if let Some(i) = value.as_i64() {
        i.to_string()
    } else if let Some(u) = value.as_u64() {
        u.to_string()
    } else {
        (value.as_f64().unwrap_or_default() as i64).to_string()
    }
}

fn quote(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}

/// Escape characters CDL does not allow in names, and a leading digit.
fn escape_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        let plain = c.is_ascii_alphabetic()
            || matches!(c, '_' | '@')
            || (i > 0 && (c.is_ascii_digit() || matches!(c, '.' | '+' | '-')));
        if !plain {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
