//! Field rule engine.
//!
//! Evaluates one payload value against a declared type tag and an ordered
//! list of rule strings (`name:param` or a bare keyword). Rules run in
//! declaration order and stop at the first failure.

use crate::core::contract::{ContractField, FieldStatus, FieldValidationResult};
use regex::Regex;
use serde_json::{Map, Value};

/// Declared type tag that matches every runtime shape.
pub const ANY_TYPE: &str = "any";

/// A parsed rule string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRule {
    MinLength(i64),
    MaxLength(i64),
    MinItems(i64),
    Pattern(String),
    /// Marker only; existence is the caller's concern.
    FileExists,
    /// Unrecognized rules are vacuously satisfied.
    Unknown(String),
}

impl FieldRule {
    pub fn parse(rule: &str) -> FieldRule {
        if let Some(rest) = rule.strip_prefix("minLength:") {
            return leading_int(rest).map_or_else(|| unknown(rule), FieldRule::MinLength);
        }
        if let Some(rest) = rule.strip_prefix("maxLength:") {
            return leading_int(rest).map_or_else(|| unknown(rule), FieldRule::MaxLength);
        }
        if let Some(rest) = rule.strip_prefix("minItems:") {
            return leading_int(rest).map_or_else(|| unknown(rule), FieldRule::MinItems);
        }
        if let Some(rest) = rule.strip_prefix("pattern:") {
            return FieldRule::Pattern(rest.to_string());
        }
        if rule == "fileExists" {
            return FieldRule::FileExists;
        }
        unknown(rule)
    }

    /// `Err` carries the failure message.
    pub fn check(&self, field_name: &str, value: &Value) -> Result<(), String> {
        match self {
            FieldRule::MinLength(min) => match value.as_str() {
                Some(s) if (str_len(s) as i64) < *min => Err(format!(
                    "\"{field_name}\" must be at least {min} characters"
                )),
                _ => Ok(()),
            },
            FieldRule::MaxLength(max) => match value.as_str() {
                Some(s) if (str_len(s) as i64) > *max => Err(format!(
                    "\"{field_name}\" must be at most {max} characters"
                )),
                _ => Ok(()),
            },
            FieldRule::MinItems(min) => match value.as_array() {
                Some(items) if (items.len() as i64) < *min => Err(format!(
                    "\"{field_name}\" must have at least {min} items"
                )),
                _ => Ok(()),
            },
            FieldRule::Pattern(pattern) => {
                let Some(s) = value.as_str() else {
                    return Ok(());
                };
                let re = Regex::new(pattern).map_err(|e| {
                    format!("\"{field_name}\" declares an unusable pattern {pattern}: {e}")
                })?;
                if re.is_match(s) {
                    Ok(())
                } else {
                    Err(format!(
                        "\"{field_name}\" does not match required pattern: {pattern}"
                    ))
                }
            }
            FieldRule::FileExists | FieldRule::Unknown(_) => Ok(()),
        }
    }
}

fn unknown(rule: &str) -> FieldRule {
    FieldRule::Unknown(rule.to_string())
}

/// Integer prefix of a rule parameter (`"5"`, `" 12px"`, `"-1"`); `None` when
/// there are no digits, which makes the rule vacuous.
fn leading_int(raw: &str) -> Option<i64> {
    let raw = raw.split(':').next().unwrap_or("").trim_start();
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Length in UTF-16 code units, so a character outside the BMP counts twice.
fn str_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Runtime shape tag of a JSON value; sequences are `array`.
pub fn type_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Presence, then type, then rules in order.
pub fn validate_field(
    field: &ContractField,
    data: &Map<String, Value>,
    required: bool,
) -> FieldValidationResult {
    let name = &field.field_name;
    let value = match data.get(name) {
        Some(v) if !v.is_null() => v,
        _ => {
            return if required {
                FieldValidationResult {
                    field: name.clone(),
                    status: FieldStatus::Missing,
                    message: Some(format!("Required field \"{name}\" is missing")),
                    actual_value: None,
                }
            } else {
                FieldValidationResult {
                    field: name.clone(),
                    status: FieldStatus::Valid,
                    message: None,
                    actual_value: None,
                }
            };
        }
    };

    if let Some(expected) = field.field_type.as_deref() {
        let actual = type_tag(value);
        if expected != ANY_TYPE && expected != actual {
            return invalid(
                name,
                format!("Field \"{name}\" expected type \"{expected}\", got \"{actual}\""),
                value,
            );
        }
    }

    for rule in &field.validation {
        if let Err(message) = FieldRule::parse(rule).check(name, value) {
            return invalid(name, message, value);
        }
    }

    FieldValidationResult {
        field: name.clone(),
        status: FieldStatus::Valid,
        message: None,
        actual_value: Some(value.clone()),
    }
}

fn invalid(name: &str, message: String, value: &Value) -> FieldValidationResult {
    FieldValidationResult {
        field: name.to_string(),
        status: FieldStatus::Invalid,
        message: Some(message),
        actual_value: Some(value.clone()),
    }
}
