use chrono::NaiveDate;
use serde::Serialize;

use super::{
    closure::{ClosureInterval, ClosureKind},
    date_field::{DateField, DateNormalizer},
};

/// Four quarterly cleaning windows plus one other-works window.
pub const MAX_CLOSURES: usize = 5;

/// The raw text of one closure window as it appears in the source table.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawWindow<'a> {
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub remarks: Option<&'a str>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ScheduleFull;

/// What the status banner should say for a centre on a given day.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    /// No window has both dates confirmed.
    NoRecordedClosures,
    ConfirmedOpen,
    Closed,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ClosureSchedule {
    closures: Vec<ClosureInterval>,
    pending_dates: usize,
}

impl ClosureSchedule {
    pub fn new() -> Self {
        Self {
            closures: Vec::with_capacity(MAX_CLOSURES),
            pending_dates: 0,
        }
    }

    /// Builds the schedule from the raw quarterly and other-works columns.
    ///
    /// A window only counts when both of its dates resolve. Anything else is
    /// dropped without error and simply contributes no closure.
    pub fn build(
        normalizer: &DateNormalizer,
        quarters: [RawWindow; 4],
        other_works: RawWindow,
    ) -> Self {
        let mut schedule = Self::new();
        let windows = quarters
            .into_iter()
            .map(|raw| (raw, ClosureKind::Cleaning))
            .chain(std::iter::once((other_works, ClosureKind::OtherWorks)));

        for (raw, kind) in windows {
            let start = normalizer.normalize_opt(raw.start);
            let end = normalizer.normalize_opt(raw.end);
            schedule.pending_dates += [start, end]
                .iter()
                .filter(|field| field.is_placeholder())
                .count();

            let Some(interval) =
                ClosureInterval::new(start.date(), end.date(), raw.remarks.unwrap_or(""), kind)
            else {
                if start != DateField::Missing || end != DateField::Missing {
                    log::debug!("Dropping {} window {:?} .. {:?}", kind, start, end);
                }
                continue;
            };
            let added = schedule.add_closure(interval);
            debug_assert!(added.is_ok());
        }
        schedule
    }

    pub fn add_closure(&mut self, closure: ClosureInterval) -> Result<(), ScheduleFull> {
        if self.closures.len() >= MAX_CLOSURES {
            return Err(ScheduleFull);
        }
        self.closures.push(closure);
        Ok(())
    }

    pub fn closures(&self) -> &[ClosureInterval] {
        &self.closures
    }

    /// Number of raw date fields still carrying the placeholder marker.
    pub fn pending_dates(&self) -> usize {
        self.pending_dates
    }

    pub fn has_records(&self) -> bool {
        !self.closures.is_empty()
    }

    pub fn is_closed_on(&self, date: NaiveDate) -> bool {
        self.closures.iter().any(|closure| closure.covers(date))
    }

    pub fn closures_on(&self, date: NaiveDate) -> Vec<ClosureInterval> {
        self.closures
            .iter()
            .filter(|closure| closure.covers(date))
            .cloned()
            .collect()
    }

    /// Windows starting strictly after `date`, in q1..q4 then other-works order.
    pub fn upcoming_closures(&self, date: NaiveDate) -> Vec<ClosureInterval> {
        self.closures
            .iter()
            .filter(|closure| closure.start() > date)
            .cloned()
            .collect()
    }

    pub fn advisory(&self, date: NaiveDate) -> Advisory {
        if !self.has_records() {
            Advisory::NoRecordedClosures
        } else if self.is_closed_on(date) {
            Advisory::Closed
        } else {
            Advisory::ConfirmedOpen
        }
    }
}
