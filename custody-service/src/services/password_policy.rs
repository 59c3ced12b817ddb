//! Password strength policy.
//!
//! Applied when an account is created and when a password is changed, never
//! at login, so existing weak credentials keep working until rotated.

use serde::Serialize;
use utoipa::ToSchema;

pub const MIN_PASSWORD_LENGTH: usize = 12;

/// A violated strength rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StrengthViolation {
    TooShort,
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecialCharacter,
}

impl std::fmt::Display for StrengthViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrengthViolation::TooShort => write!(
                f,
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ),
            StrengthViolation::MissingUppercase => {
                write!(f, "Password must contain at least one uppercase letter")
            }
            StrengthViolation::MissingLowercase => {
                write!(f, "Password must contain at least one lowercase letter")
            }
            StrengthViolation::MissingDigit => {
                write!(f, "Password must contain at least one number")
            }
            StrengthViolation::MissingSpecialCharacter => {
                write!(f, "Password must contain at least one special character")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StrengthRating {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StrengthReport {
    pub is_valid: bool,
    pub errors: Vec<StrengthViolation>,
    pub strength: StrengthRating,
}

impl StrengthReport {
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Check a candidate password against every rule and rate it.
pub fn validate_strength(password: &str) -> StrengthReport {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(StrengthViolation::TooShort);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        errors.push(StrengthViolation::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        errors.push(StrengthViolation::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(StrengthViolation::MissingDigit);
    }
    if !password.chars().any(|c| c.is_ascii_punctuation()) {
        errors.push(StrengthViolation::MissingSpecialCharacter);
    }

    // Five rules; rating tracks how many are satisfied.
    let strength = match errors.len() {
        0 => StrengthRating::Strong,
        1 | 2 => StrengthRating::Medium,
        _ => StrengthRating::Weak,
    };

    StrengthReport {
        is_valid: errors.is_empty(),
        errors,
        strength,
    }
}
