use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::AppError;

/// Format constraint applied on top of the field being present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Check {
    /// Present, non-null, and (for strings) non-empty after trimming.
    Required,
    /// Syntactically valid email address.
    Email,
    /// JSON integer or integer string.
    Integer,
}

/// One declarative field rule. The message is rendered verbatim in the
/// validation-error map.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub field: &'static str,
    pub check: Check,
    pub message: &'static str,
}

const fn rule(field: &'static str, check: Check, message: &'static str) -> Rule {
    Rule { field, check, message }
}

pub const USER_RULES: &[Rule] = &[
    rule("firstName", Check::Required, "First name is required"),
    rule("lastName", Check::Required, "Last name is required"),
    rule("email", Check::Required, "Email is required"),
    rule("email", Check::Email, "Must be a valid email address"),
];

pub const POST_RULES: &[Rule] = &[
    rule("title", Check::Required, "Title is required"),
    rule("body", Check::Required, "Body is required"),
    rule("userId", Check::Required, "User ID is required"),
    rule("userId", Check::Integer, "User ID must be a number"),
];

pub const ADDRESS_RULES: &[Rule] = &[
    rule("street", Check::Required, "Street is required"),
    rule("city", Check::Required, "City is required"),
    rule("state", Check::Required, "State is required"),
    rule("zipCode", Check::Required, "Zip code is required"),
    rule("userId", Check::Required, "User ID is required"),
    rule("userId", Check::Integer, "User ID must be a number"),
];

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email regex"));

/// Run every rule against the JSON body, collecting all failures into a
/// field -> message map. When several rules fail for the same field, the
/// last-evaluated message wins. Returns `ValidationFailed` carrying the map
/// unless it is empty.
pub fn validate(rules: &[Rule], body: &Value) -> Result<(), AppError> {
    let mut failures: BTreeMap<String, String> = BTreeMap::new();

    for rule in rules {
        let value = body.get(rule.field);
        let ok = match rule.check {
            Check::Required => is_present(value),
            Check::Email => value
                .and_then(Value::as_str)
                .map(|s| EMAIL_RE.is_match(s.trim()))
                .unwrap_or(false),
            Check::Integer => integer_value(value).is_some(),
        };
        if !ok {
            failures.insert(rule.field.to_string(), rule.message.to_string());
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationFailed(failures))
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Coerce a JSON value into an integer id, accepting both numbers and
/// numeric strings the way the original wire format does.
fn integer_value(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
