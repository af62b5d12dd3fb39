use std::fmt::Display;

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ClosureKind {
    Cleaning,
    #[serde(rename = "Other Works")]
    OtherWorks,
}

impl Display for ClosureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClosureKind::Cleaning => write!(f, "Cleaning"),
            ClosureKind::OtherWorks => write!(f, "Other Works"),
        }
    }
}

/// One closure window. Both bounds are inclusive.
///
/// Only `new` builds these, and it refuses incomplete or inverted bounds, so
/// every interval that exists has `start <= end`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClosureInterval {
    start: NaiveDate,
    end: NaiveDate,
    remarks: String,
    kind: ClosureKind,
}

impl ClosureInterval {
    pub fn new(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        remarks: &str,
        kind: ClosureKind,
    ) -> Option<Self> {
        let (start, end) = (start?, end?);
        if start > end {
            return None;
        }
        Some(Self {
            start,
            end,
            remarks: remarks.trim().to_string(),
            kind,
        })
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn remarks(&self) -> &str {
        &self.remarks
    }

    pub fn kind(&self) -> ClosureKind {
        self.kind
    }
}
