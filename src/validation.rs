//! Request-body checks shared by the handlers. Failures accumulate per field
//! and surface as a single 400 with every message.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::error::{ApiError, FieldError};

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.error(field, message);
        }
    }

    /// Checks that the trimmed value is present and at most `max` characters.
    pub fn required_text(
        &mut self,
        field: &str,
        value: Option<&str>,
        max: usize,
        missing: &str,
        too_long: &str,
    ) {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => self.check(v.chars().count() <= max, field, too_long),
            _ => self.error(field, missing),
        }
    }

    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize, message: &str) {
        if let Some(v) = value {
            self.check(v.trim().chars().count() <= max, field, message);
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .unwrap_or_else(|e| panic!("email pattern is invalid: {}", e))
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email.trim())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD`. A bare date means
/// the end of that day, UTC.
pub fn parse_due_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|dt| dt.and_utc())
}

/// Checks that `value` is a well-formed document id and returns its
/// canonical form.
pub fn parse_id(value: &str, field: &str, message: &str) -> Result<String, ApiError> {
    Uuid::parse_str(value.trim())
        .map(|id| id.to_string())
        .map_err(|_| ApiError::invalid(field, message))
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Use with `#[serde(default)]`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
