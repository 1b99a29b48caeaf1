use super::RuleContext;
use crate::diagnostic::{Diagnostic, DiagnosticCode};

/// Validate the serialized snapshot against the protocol's JSON schema.
///
/// A violation carries the pretty-printed snapshot and every message from
/// the validator as detail.
pub(super) fn check_schema(ctx: &RuleContext<'_>) -> Vec<Diagnostic> {
    let instance = ctx.metadata.to_instance(ctx.specifiers);
    let errors: Vec<String> = ctx
        .protocol
        .schema
        .iter_errors(&instance)
        .map(|err| {
            let path = err.instance_path().to_string();
            if path.is_empty() {
                err.to_string()
            } else {
                format!("{path}: {err}")
            }
        })
        .collect();

    let Some(first) = errors.first() else {
        return vec![Diagnostic::new(
            DiagnosticCode::I0102LooksGood,
            "File validated against the JSON schema.",
        )];
    };

    let message = match errors.len() {
        1 => format!("File did not validate against the JSON schema: {first}"),
        n => format!(
            "File did not validate against the JSON schema: {first} (and {} more)",
            n - 1
        ),
    };
    let snapshot = serde_json::to_string_pretty(&instance).unwrap_or_default();
    vec![
        Diagnostic::new(DiagnosticCode::E0401SchemaInvalid, message)
            .with_detail(format!("{}\n\n{snapshot}", errors.join("\n"))),
    ]
}
