// Field validators. Everything here is a pure function over its inputs:
// no file access, no prompting. The UI calls these in a retry loop and
// the manager calls them again before anything is written.

use crate::error::ValidationError;
use crate::model::{Column, ColumnType, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const NAME_MAX_LEN: usize = 50;
pub const ROLL_NUMBER_MAX_LEN: usize = 20;
pub const AGE_RANGE: (i64, i64) = (5, 100);
pub const GRADES_RANGE: (i64, i64) = (0, 100);
pub const EMAIL_LOCAL_MAX_LEN: usize = 64;

/// Tunable parameters for the validators. Stored alongside the last file
/// path in the config file; any key left out falls back to the default.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ValidationRules {
    pub phone_length: usize,
    pub email_max_length: usize,
    pub email_domains: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            phone_length: 10,
            email_max_length: 254,
            email_domains: [
                "gmail.com",
                "hotmail.com",
                "yahoo.com",
                "outlook.com",
                "icloud.com",
                "protonmail.com",
                "aol.com",
                "mail.com",
                "zoho.com",
                "yandex.com",
                "gmx.com",
                "live.com",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
        }
    }
}

/// Named rules picked from the column name on top of the type cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldRule {
    Name,
    Age,
    Phone,
    Email,
    Address,
    Class,
    Grades,
}

/// Lowercases a column name and treats spaces and underscores alike, so
/// `Roll Number`, `roll_number` and `ROLL NUMBER` compare equal.
pub fn field_key(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn rule_for(column_name: &str) -> Option<FieldRule> {
    match field_key(column_name).as_str() {
        "name" => Some(FieldRule::Name),
        "age" => Some(FieldRule::Age),
        "phone" => Some(FieldRule::Phone),
        "email" => Some(FieldRule::Email),
        "address" => Some(FieldRule::Address),
        "class" => Some(FieldRule::Class),
        "grades" => Some(FieldRule::Grades),
        _ => None,
    }
}

fn non_empty(field: &str, raw: &str) -> Result<(), ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::Empty {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Letters and single interior spaces, 1 to 50 characters. Surrounding
/// whitespace is an error, not something to strip.
pub fn name(field: &str, raw: &str) -> Result<String, ValidationError> {
    non_empty(field, raw)?;
    let len = raw.chars().count();
    if len > NAME_MAX_LEN {
        return Err(ValidationError::Length {
            field: field.to_string(),
            min: 1,
            max: NAME_MAX_LEN,
        });
    }
    let well_formed = raw.chars().all(|c| c.is_alphabetic() || c == ' ')
        && !raw.starts_with(' ')
        && !raw.ends_with(' ')
        && !raw.contains("  ");
    if !well_formed {
        return Err(ValidationError::InvalidName {
            field: field.to_string(),
            value: raw.to_string(),
        });
    }
    Ok(raw.to_string())
}

/// Checks the roll number format and that none of `taken` already uses it.
pub fn roll_number<'a>(
    raw: &str,
    taken: impl IntoIterator<Item = &'a str>,
) -> Result<String, ValidationError> {
    let roll = raw.trim();
    if roll.is_empty()
        || roll.len() > ROLL_NUMBER_MAX_LEN
        || !roll.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ValidationError::InvalidRollNumber(raw.to_string()));
    }
    if taken.into_iter().any(|t| t == roll) {
        return Err(ValidationError::DuplicateRollNumber(roll.to_string()));
    }
    Ok(roll.to_string())
}

fn int_in_range(field: &str, raw: &str, (min, max): (i64, i64)) -> Result<i64, ValidationError> {
    non_empty(field, raw)?;
    match raw.parse::<i64>() {
        Ok(n) if (min..=max).contains(&n) => Ok(n),
        _ => Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
            value: raw.to_string(),
        }),
    }
}

/// Whole number of years in [5, 100].
pub fn age(field: &str, raw: &str) -> Result<i64, ValidationError> {
    int_in_range(field, raw, AGE_RANGE)
}

pub fn grades(field: &str, raw: &str) -> Result<i64, ValidationError> {
    int_in_range(field, raw, GRADES_RANGE)
}

/// Digits only, exactly `length` of them.
pub fn phone(field: &str, raw: &str, length: usize) -> Result<String, ValidationError> {
    non_empty(field, raw)?;
    if raw.len() != length || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidPhone {
            field: field.to_string(),
            expected: length,
            value: raw.to_string(),
        });
    }
    Ok(raw.to_string())
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9._%+-]+)@([A-Za-z0-9.-]+\.[A-Za-z]{2,})$")
            .expect("email pattern compiles")
    })
}

/// `local@domain.tld`, bounded in length, with the domain taken from the
/// configured allow-list.
pub fn email(raw: &str, rules: &ValidationRules) -> Result<String, ValidationError> {
    non_empty("email", raw)?;
    if raw.len() > rules.email_max_length {
        return Err(ValidationError::EmailTooLong(rules.email_max_length));
    }
    let caps = email_pattern()
        .captures(raw)
        .ok_or_else(|| ValidationError::InvalidEmail(raw.to_string()))?;
    if caps[1].len() > EMAIL_LOCAL_MAX_LEN {
        return Err(ValidationError::InvalidEmail(raw.to_string()));
    }
    let domain = caps[2].to_lowercase();
    if !rules
        .email_domains
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&domain))
    {
        return Err(ValidationError::DisallowedDomain {
            domain,
            allowed: rules.email_domains.join(", "),
        });
    }
    Ok(raw.to_string())
}

pub fn address(field: &str, raw: &str) -> Result<String, ValidationError> {
    non_empty(field, raw)?;
    if raw.chars().count() < 10 {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min: 10,
        });
    }
    if !raw.chars().any(|c| c.is_ascii_digit()) || !raw.chars().any(|c| c.is_alphabetic()) {
        return Err(ValidationError::InvalidAddress {
            field: field.to_string(),
        });
    }
    Ok(raw.to_string())
}

pub fn class(field: &str, raw: &str) -> Result<String, ValidationError> {
    non_empty(field, raw)?;
    if !raw.chars().all(|c| c.is_alphanumeric()) {
        return Err(ValidationError::NotAlphanumeric {
            field: field.to_string(),
            value: raw.to_string(),
        });
    }
    let len = raw.chars().count();
    if !(2..=10).contains(&len) {
        return Err(ValidationError::Length {
            field: field.to_string(),
            min: 2,
            max: 10,
        });
    }
    Ok(raw.to_string())
}

/// Column names end up in the `name:type` header, so the separators are
/// off limits.
pub fn column_name(raw: &str) -> Result<String, ValidationError> {
    let bad = raw.is_empty()
        || raw.trim() != raw
        || raw.contains(|c| matches!(c, ',' | ':' | '\n' | '\r'));
    if bad {
        return Err(ValidationError::InvalidColumnName(raw.to_string()));
    }
    Ok(raw.to_string())
}

/// Converts typed input into a value of the declared column type.
pub fn cast(field: &str, raw: &str, kind: ColumnType) -> Result<Value, ValidationError> {
    let raw = raw.trim();
    non_empty(field, raw)?;
    let mismatch = || ValidationError::TypeMismatch {
        field: field.to_string(),
        expected: kind.to_string(),
        value: raw.to_string(),
    };
    match kind {
        ColumnType::String => Ok(Value::String(raw.to_string())),
        ColumnType::Integer => raw.parse::<i64>().map(Value::Integer).map_err(|_| mismatch()),
        ColumnType::Float => match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Value::Float(f)),
            _ => Err(mismatch()),
        },
    }
}

/// Re-types a stored value. Integers widen to floats only when exact and
/// floats narrow to integers only when integral.
pub fn recast(field: &str, value: &Value, kind: ColumnType) -> Result<Value, ValidationError> {
    let mismatch = || ValidationError::TypeMismatch {
        field: field.to_string(),
        expected: kind.to_string(),
        value: value.to_string(),
    };
    match (value, kind) {
        (v, k) if v.kind() == k => Ok(v.clone()),
        (v, ColumnType::String) => Ok(Value::String(v.to_string())),
        (Value::String(s), k) => cast(field, s, k),
        (Value::Integer(i), ColumnType::Float) => {
            let f = *i as f64;
            if f as i64 == *i {
                Ok(Value::Float(f))
            } else {
                Err(mismatch())
            }
        }
        (Value::Float(f), ColumnType::Integer) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                Ok(Value::Integer(*f as i64))
            } else {
                Err(mismatch())
            }
        }
        _ => Err(mismatch()),
    }
}

/// Validates one field of user input for `column`: the named rule picked
/// from the column name first, then the cast to the declared type.
pub fn field(column: &Column, raw: &str, rules: &ValidationRules) -> Result<Value, ValidationError> {
    let raw = raw.trim();
    let label = column.name.as_str();
    non_empty(label, raw)?;
    let text = match rule_for(label) {
        Some(FieldRule::Name) => name(label, raw)?,
        Some(FieldRule::Age) => age(label, raw)?.to_string(),
        Some(FieldRule::Phone) => phone(label, raw, rules.phone_length)?,
        Some(FieldRule::Email) => email(raw, rules)?,
        Some(FieldRule::Address) => address(label, raw)?,
        Some(FieldRule::Class) => class(label, raw)?,
        Some(FieldRule::Grades) if column.kind == ColumnType::Integer => {
            grades(label, raw)?.to_string()
        }
        _ => raw.to_string(),
    };
    cast(label, &text, column.kind)
}

/// Moves an existing value into `column`: re-cast to its type, then the
/// column's named rule, if any, applied to the result.
pub fn convert(column: &Column, value: &Value, rules: &ValidationRules) -> Result<Value, ValidationError> {
    let recast = recast(&column.name, value, column.kind)?;
    match rule_for(&column.name) {
        Some(_) => field(column, &rule_text(&recast), rules),
        None => Ok(recast),
    }
}

/// Text a named rule sees for a stored value. Whole floats drop the `.0`
/// so integer rules like age accept `20.0`.
fn rule_text(value: &Value) -> String {
    match value {
        Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            (*f as i64).to_string()
        }
        other => other.to_string(),
    }
}
