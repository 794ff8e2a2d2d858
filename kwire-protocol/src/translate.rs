//! Post-decode field rewriting.
//!
//! A [`FieldTranslator`] sees every field of every composite as it is
//! decoded, keyed by struct and field name, and may replace the value.

use crate::error::KafkaCode;
use crate::value::Value;

/// Field name whose raw `int16` value is a broker error code.
pub const ERROR_CODE_FIELD: &str = "error_code";

/// Rewrites decoded fields before they are stored in their struct.
pub trait FieldTranslator: Send + Sync {
    fn translate(&self, struct_name: &str, field_name: &str, value: Value) -> Value;
}

impl<F> FieldTranslator for F
where
    F: Fn(&str, &str, Value) -> Value + Send + Sync,
{
    fn translate(&self, struct_name: &str, field_name: &str, value: Value) -> Value {
        self(struct_name, field_name, value)
    }
}

/// Turns `error_code` fields into [`KafkaCode`]s; everything else passes through.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorCodeTranslator;

impl FieldTranslator for ErrorCodeTranslator {
    fn translate(&self, _struct_name: &str, field_name: &str, value: Value) -> Value {
        match value {
            Value::Int16(raw) if field_name == ERROR_CODE_FIELD => {
                Value::ErrorCode(KafkaCode::from_code(raw))
            }
            other => other,
        }
    }
}

/// Leaves every field as decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl FieldTranslator for Passthrough {
    fn translate(&self, _struct_name: &str, _field_name: &str, value: Value) -> Value {
        value
    }
}
