//! Phone numbers: normalization into the international, digits-only form
//! the deep-link scheme expects.
//!
//! Normalization never fails. Malformed input yields a malformed but
//! well-typed [`PhoneNumber`]; the only observable symptom is the target app
//! opening the wrong chat (or none).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A validated country calling code such as `964`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Validate and wrap a country code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyCountryCode`] for an empty string and
    /// [`ValidationError::NonDigitCountryCode`] when anything but ASCII digits
    /// is present.
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        if code.is_empty() {
            return Err(ValidationError::EmptyCountryCode);
        }
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::NonDigitCountryCode(code));
        }
        Ok(Self(code))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CountryCode {
    /// Iraq, the market the default configuration targets.
    fn default() -> Self {
        Self("964".to_string())
    }
}

impl TryFrom<String> for CountryCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A digits-only phone number in international form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize a locally formatted number.
    ///
    /// 1. Strip every non-digit character.
    /// 2. Peel leading trunk-prefix zeros and `country_code` prefixes, as
    ///    many times as they repeat.
    /// 3. Prepend `country_code` exactly once.
    #[must_use]
    pub fn normalize(raw: &str, country_code: &CountryCode) -> Self {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        let mut national = digits.as_str();
        loop {
            national = national.trim_start_matches('0');
            match national.strip_prefix(country_code.as_str()) {
                Some(rest) => national = rest,
                None => break,
            }
        }

        Self(format!("{country_code}{national}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
