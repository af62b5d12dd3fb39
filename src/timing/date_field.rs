use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};

/// A single raw date column after normalization.
///
/// `Placeholder` and `Unparseable` are kept apart so the caller can tell a
/// "not yet published" value from garbage, but both resolve to no date.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DateField {
    Resolved(NaiveDate),
    Placeholder,
    Unparseable,
    Missing,
}

impl DateField {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateField::Resolved(date) => Some(*date),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, DateField::Placeholder)
    }
}

/// Turns raw closure date text into a `DateField`.
///
/// The placeholder check runs before any parse attempt, so "TBC" never shows
/// up as a parse failure.
#[derive(Clone, Debug)]
pub struct DateNormalizer {
    format: String,
    placeholder_regex: Regex,
}

impl DateNormalizer {
    pub fn new(format: &str, placeholder_marker: &str) -> Result<Self, regex::Error> {
        let placeholder_regex = RegexBuilder::new(&regex::escape(placeholder_marker))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            format: format.to_string(),
            placeholder_regex,
        })
    }

    pub fn normalize(&self, raw: &str) -> DateField {
        let raw = raw.trim();
        if raw.is_empty() {
            return DateField::Missing;
        }
        if self.placeholder_regex.is_match(raw) {
            return DateField::Placeholder;
        }
        match NaiveDate::parse_from_str(raw, &self.format) {
            Ok(date) => DateField::Resolved(date),
            Err(_) => DateField::Unparseable,
        }
    }

    pub fn normalize_opt(&self, raw: Option<&str>) -> DateField {
        match raw {
            Some(raw) => self.normalize(raw),
            None => DateField::Missing,
        }
    }
}
