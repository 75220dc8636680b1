//! Request validation shared by the use cases.

use crate::error::AppError;
use chrono::NaiveDate;

/// Collects every missing required field so the caller sees them all at once.
#[derive(Debug, Default)]
pub struct RequiredFields {
    missing: Vec<String>,
}

impl RequiredFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trimmed text; blank counts as missing.
    pub fn text(&mut self, field: &str, value: Option<&str>) -> String {
        match value.map(str::trim).filter(|s| !s.is_empty()) {
            Some(v) => v.to_string(),
            None => {
                self.missing.push(field.to_string());
                String::new()
            }
        }
    }

    pub fn value<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.missing.push(field.to_string());
        }
        value
    }

    pub fn check(self) -> Result<(), AppError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingFields(self.missing))
        }
    }
}

/// Blank strings become `None`.
pub fn opt_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn non_negative_i64(field: &str, value: i64) -> Result<i64, AppError> {
    if value < 0 {
        return Err(AppError::Validation(format!("{} must be >= 0", field)));
    }
    Ok(value)
}

pub fn non_negative_f64(field: &str, value: f64) -> Result<f64, AppError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::Validation(format!("{} must be a number >= 0", field)));
    }
    Ok(value)
}

pub fn positive_f64(field: &str, value: f64) -> Result<f64, AppError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::Validation(format!("{} must be a number > 0", field)));
    }
    Ok(value)
}

/// Dates are plain `YYYY-MM-DD`.
pub fn date(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    match opt_text(value) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(|d| Some(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| AppError::Validation(format!("{} must be YYYY-MM-DD, got {:?}", field, s))),
    }
}

pub fn date_range(start: Option<&str>, end: Option<&str>) -> Result<(), AppError> {
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(AppError::Validation(format!(
                "end_date {} is before start_date {}",
                e, s
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_all_missing_fields() {
        let mut req = RequiredFields::new();
        assert_eq!(req.text("username", Some(" ann ")), "ann");
        req.text("password", None);
        req.text("email", Some("   "));
        let _ = req.value::<i64>("qty", None);
        match req.check() {
            Err(AppError::MissingFields(f)) => assert_eq!(f, vec!["password", "email", "qty"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_collector_passes() {
        assert!(RequiredFields::new().check().is_ok());
    }

    #[test]
    fn dates_normalized_and_checked() {
        assert_eq!(date("d", Some(" 2025-03-01 ".into())).unwrap(), Some("2025-03-01".into()));
        assert_eq!(date("d", Some("  ".into())).unwrap(), None);
        assert!(date("d", Some("01/03/2025".into())).is_err());
    }

    #[test]
    fn date_range_order() {
        assert!(date_range(Some("2025-01-01"), Some("2025-02-01")).is_ok());
        assert!(date_range(Some("2025-02-01"), Some("2025-01-01")).is_err());
        assert!(date_range(None, Some("2025-01-01")).is_ok());
    }

    #[test]
    fn numeric_bounds() {
        assert!(non_negative_i64("q", -1).is_err());
        assert_eq!(non_negative_i64("q", 0).unwrap(), 0);
        assert!(positive_f64("a", 0.0).is_err());
        assert!(non_negative_f64("a", f64::NAN).is_err());
    }
}
