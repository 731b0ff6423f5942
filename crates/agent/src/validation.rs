use serde_json::{Map, Value};

use crate::operations::Operation;

/// Why a command did not reach the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// No operation could be recognised in the command.
    Unclassified,
    /// The operation was recognised but a required argument is absent or blank.
    MissingArguments,
    /// The command holds more than one candidate for a slot, or a value that
    /// cannot be a contact name.
    AmbiguousArguments,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::MissingArguments => "missing_arguments",
            Self::AmbiguousArguments => "ambiguous_arguments",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    pub message: String,
}

/// Checks that every required argument of `operation` is a non-blank string.
///
/// Returns an object holding only the required arguments, trimmed. Extra keys
/// are dropped.
pub fn validate_arguments(operation: Operation, arguments: &Value) -> Result<Value, Rejection> {
    let mut validated = Map::new();

    for key in operation.required_args() {
        let value = arguments
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let Some(value) = value else {
            return Err(Rejection {
                reason: RejectReason::MissingArguments,
                message: operation.clarification().to_string(),
            });
        };
        validated.insert((*key).to_string(), Value::String(value.to_string()));
    }

    Ok(Value::Object(validated))
}
