use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Asia::Singapore;

/// The current calendar date in Singapore, where the closure dates apply.
pub fn sg_date_now() -> NaiveDate {
    sg_date_at(Utc::now())
}

pub fn sg_date_at(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&Singapore).date_naive()
}
