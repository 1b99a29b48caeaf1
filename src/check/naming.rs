use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::model::{Specifier, Specifiers};
use crate::protocol::Pattern;
use std::path::Path;

/// Match the file name against the naming scheme.
///
/// Every named group that took part in the match becomes a specifier.
pub fn match_naming_scheme(path: &Path, pattern: &Pattern) -> Result<Specifiers, Diagnostic> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    let Some(captures) = pattern.file.captures(&name) else {
        return Err(Diagnostic::new(
            DiagnosticCode::E0101FileNotMatched,
            format!("File name \"{name}\" did not match the naming scheme."),
        ));
    };

    Ok(pattern
        .file
        .capture_names()
        .flatten()
        .filter_map(|group| {
            let value = captures.name(group)?;
            Some((group.to_string(), Specifier::parse(value.as_str())))
        })
        .collect())
}
