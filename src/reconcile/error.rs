use thiserror::Error;

/// Failure inside one reconciliation phase.
///
/// Never escapes `ConfigReconciler::reconcile`; phases report it to the
/// diagnostics sink and the next phase still runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("document is not a mapping (found {found})")]
    NotAnObject { found: &'static str },

    #[error("`{field}` must be {expected}, found {found}")]
    MalformedField {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{field}` is missing")]
    MissingField { field: &'static str },

    #[error("proxy group #{index} is malformed: {reason}")]
    MalformedGroup { index: usize, reason: String },
}

/// Short JSON type name for error messages.
pub(crate) fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a sequence",
        serde_json::Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_name_the_field() {
        let err = ReconcileError::MalformedField {
            field: "proxy-groups",
            expected: "a sequence",
            found: type_name(&json!("x")),
        };
        assert_eq!(
            err.to_string(),
            "`proxy-groups` must be a sequence, found a string"
        );
    }

    #[test]
    fn not_an_object_message() {
        let err = ReconcileError::NotAnObject {
            found: type_name(&json!(null)),
        };
        assert!(err.to_string().contains("null"));
    }
}
