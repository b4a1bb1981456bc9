//! Field-level input rules shared by the request schemas.

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::LazyLock;

use super::timestamp;
use crate::error::FieldError;

/// Characters allowed in a user name.
pub const USERNAME_PATTERN: &str = r"^[a-z.A-Z0-9_]+$";
/// At least one of these must appear in a password.
pub const PASSWORD_SPECIALS: &str = r#"!@#$%^&*(),.?":{}|<>"#;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const AMOUNT_MAX_DIGITS: u32 = 18;
pub const AMOUNT_DECIMAL_PLACES: u32 = 2;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(USERNAME_PATTERN).expect("username pattern compiles"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("email pattern compiles")
});

pub fn validate_username_alphanumeric(username: &str) -> Result<(), &'static str> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err("Username must be alphanumeric")
    }
}

/// First unmet strength rule wins.
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit");
    }
    if !password.chars().any(|c| PASSWORD_SPECIALS.contains(c)) {
        return Err("Password must contain at least one special character");
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// JSON type a request field must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Str,
    Bool,
    Decimal,
    Timestamp,
}

impl Shape {
    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Shape::Str, Value::String(_)) => true,
            (Shape::Bool, Value::Bool(_)) => true,
            (Shape::Decimal, Value::String(s)) => parse_decimal(s).is_some(),
            (Shape::Decimal, Value::Number(n)) => parse_decimal(&n.to_string()).is_some(),
            (Shape::Timestamp, Value::String(s)) => timestamp::parse(s).is_some(),
            _ => false,
        }
    }

    fn error(self, field: &str) -> FieldError {
        let (kind, msg) = match self {
            Shape::Str => ("string_type", "Input should be a valid string"),
            Shape::Bool => ("bool_type", "Input should be a valid boolean"),
            Shape::Decimal => ("decimal_parsing", "Input should be a valid decimal"),
            Shape::Timestamp => ("datetime_from_date_parsing", timestamp::INVALID_TIMESTAMP),
        };
        FieldError::body(field, kind, msg)
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Push a type violation when `field` is present in `object` with the wrong JSON type.
/// Absent keys are left to the required-field check.
pub fn check_shape(
    errors: &mut Vec<FieldError>,
    object: &Map<String, Value>,
    field: &str,
    shape: Shape,
    nullable: bool,
) {
    match object.get(field) {
        None => {}
        Some(Value::Null) if nullable => {}
        Some(value) if shape.accepts(value) => {}
        Some(_) => errors.push(shape.error(field)),
    }
}

/// Push a length violation for `field` onto `errors` when `value` falls outside `min..=max`.
pub fn check_length(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &str,
    min: Option<usize>,
    max: Option<usize>,
) {
    let len = value.chars().count();
    if let Some(min) = min
        && len < min
    {
        errors.push(FieldError::body(
            field,
            "string_too_short",
            format!(
                "String should have at least {min} character{}",
                if min == 1 { "" } else { "s" }
            ),
        ));
    }
    if let Some(max) = max
        && len > max
    {
        errors.push(FieldError::body(
            field,
            "string_too_long",
            format!("String should have at most {max} characters"),
        ));
    }
}

/// Positive, at most 18 digits in total and 2 after the point.
pub fn check_amount(errors: &mut Vec<FieldError>, field: &str, amount: Decimal) {
    if amount <= Decimal::ZERO {
        errors.push(FieldError::body(
            field,
            "greater_than",
            "Input should be greater than 0",
        ));
        return;
    }

    let normalized = amount.normalize();
    let scale = normalized.scale();
    if scale > AMOUNT_DECIMAL_PLACES {
        errors.push(FieldError::body(
            field,
            "decimal_max_places",
            format!("Decimal input should have no more than {AMOUNT_DECIMAL_PLACES} decimal places"),
        ));
    }

    let mantissa_digits = normalized.mantissa().unsigned_abs().to_string().len() as u32;
    if mantissa_digits.max(scale) > AMOUNT_MAX_DIGITS {
        errors.push(FieldError::body(
            field,
            "decimal_max_digits",
            format!("Decimal input should have no more than {AMOUNT_MAX_DIGITS} digits in total"),
        ));
    }
}
