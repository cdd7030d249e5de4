use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::record::RecordDraft;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static pattern"));

const MAX_NAME_LEN: usize = 100;
const MAX_ROLE_LEN: usize = 50;
const AGE_RANGE: std::ops::RangeInclusive<i64> = 0..=150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Name is required and should be less than 100 characters")]
    Name,
    #[error("Valid email is required")]
    Email,
    #[error("Age must be between 0 and 150")]
    Age,
    #[error("Role is required and should be less than 50 characters")]
    Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

pub fn valid_name(name: &str) -> bool {
    let len = name.trim().chars().count();
    len > 0 && len <= MAX_NAME_LEN
}

pub fn valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// A missing age counts as 0, text that is not an integer fails.
pub fn valid_age(age: Option<&str>) -> bool {
    match age {
        None => true,
        Some(text) => text
            .trim()
            .parse::<i64>()
            .is_ok_and(|age| AGE_RANGE.contains(&age)),
    }
}

pub fn valid_role(role: &str) -> bool {
    let len = role.trim().chars().count();
    len > 0 && len <= MAX_ROLE_LEN
}

/// Runs every rule and collects all failures in rule order. Does not stop at the first failure.
pub fn validate(draft: &RecordDraft) -> ValidationReport {
    let mut errors = Vec::new();
    if !valid_name(draft.get("name").unwrap_or_default()) {
        errors.push(FieldError::Name);
    }
    if !valid_email(draft.get("email").unwrap_or_default()) {
        errors.push(FieldError::Email);
    }
    if !valid_age(draft.get("age")) {
        errors.push(FieldError::Age);
    }
    if !valid_role(draft.get("role").unwrap_or_default()) {
        errors.push(FieldError::Role);
    }
    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, email: &str, age: &str, role: &str) -> RecordDraft {
        let mut draft = RecordDraft::default();
        for (key, value) in [("name", name), ("email", email), ("age", age), ("role", role)] {
            draft.set(key, value);
        }
        draft
    }

    #[test]
    fn empty_name_is_the_only_error() {
        let report = validate(&draft("", "a@b.com", "30", "Dev"));
        assert!(!report.valid);
        assert_eq!(report.errors, vec![FieldError::Name]);
    }

    #[test]
    fn all_failures_are_reported_together() {
        let report = validate(&draft("Al", "bad", "200", ""));
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![FieldError::Email, FieldError::Age, FieldError::Role]
        );
        assert_eq!(
            report.messages(),
            vec![
                "Valid email is required",
                "Age must be between 0 and 150",
                "Role is required and should be less than 50 characters",
            ]
        );
    }

    #[test]
    fn valid_draft_passes() {
        let report = validate(&draft("John Doe", "john@example.com", "28", "Developer"));
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn name_and_role_are_trimmed_and_bounded() {
        assert!(!valid_name("   "));
        assert!(valid_name(&"x".repeat(100)));
        assert!(!valid_name(&"x".repeat(101)));
        assert!(valid_role(&format!("  {}  ", "r".repeat(50))));
        assert!(!valid_role(&"r".repeat(51)));
    }

    #[test]
    fn email_shape() {
        assert!(valid_email("a@b.co"));
        assert!(valid_email("first.last@sub.example.org"));
        assert!(!valid_email("a@b"));
        assert!(!valid_email("a b@c.d"));
        assert!(!valid_email("a@@b.c"));
        assert!(!valid_email(""));
    }

    #[test]
    fn age_bounds_are_inclusive() {
        assert!(valid_age(Some("0")));
        assert!(valid_age(Some("150")));
        assert!(valid_age(Some(" 42 ")));
        assert!(!valid_age(Some("-1")));
        assert!(!valid_age(Some("151")));
        assert!(!valid_age(Some("forty")));
        assert!(!valid_age(Some("")));
        assert!(valid_age(None));
    }

    #[test]
    fn missing_fields_fail_except_age() {
        let report = validate(&RecordDraft::default());
        assert_eq!(
            report.errors,
            vec![FieldError::Name, FieldError::Email, FieldError::Role]
        );
    }
}
