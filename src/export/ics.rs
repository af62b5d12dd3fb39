use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::timing::closure::ClosureInterval;

pub const EXPORT_FILE_NAME: &str = "hawker_closures.ics";

/// One calendar entry per upcoming closure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub title: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub description: String,
}

impl CalendarEvent {
    pub fn from_closure(centre_name: &str, closure: &ClosureInterval) -> Self {
        Self {
            title: format!("{} - {}", centre_name, closure.kind()),
            start: closure.start(),
            end: closure.end(),
            description: closure.remarks().to_string(),
        }
    }
}

pub fn closure_events(centre_name: &str, closures: &[ClosureInterval]) -> Vec<CalendarEvent> {
    closures
        .iter()
        .map(|closure| CalendarEvent::from_closure(centre_name, closure))
        .collect()
}

/// Renders the events as an iCalendar document of all-day entries.
pub fn closures_calendar(events: &[CalendarEvent], stamp: DateTime<Utc>) -> String {
    let mut ics = calendar_header();
    for event in events {
        append_event(&mut ics, event, stamp);
    }
    ics.push_str("END:VCALENDAR\r\n");
    ics
}

fn calendar_header() -> String {
    let mut ics = String::new();
    ics.push_str("BEGIN:VCALENDAR\r\n");
    ics.push_str("VERSION:2.0\r\n");
    ics.push_str("PRODID:-//Hawker Closures//EN\r\n");
    ics.push_str("CALSCALE:GREGORIAN\r\n");
    ics
}

fn append_event(buffer: &mut String, event: &CalendarEvent, stamp: DateTime<Utc>) {
    push_line(buffer, "BEGIN:VEVENT");
    push_line(buffer, &format!("UID:{}", build_uid(event)));
    push_line(buffer, &format!("DTSTAMP:{}", stamp.format("%Y%m%dT%H%M%SZ")));
    push_line(buffer, &format!("DTSTART;VALUE=DATE:{}", format_date(event.start)));
    // DTEND is exclusive for all-day events.
    let end = event.end.checked_add_days(Days::new(1)).unwrap_or(event.end);
    push_line(buffer, &format!("DTEND;VALUE=DATE:{}", format_date(end)));
    push_line(buffer, &format!("SUMMARY:{}", escape_text(&event.title)));
    if !event.description.is_empty() {
        push_line(buffer, &format!("DESCRIPTION:{}", escape_text(&event.description)));
    }
    push_line(buffer, "END:VEVENT");
}

fn push_line(buffer: &mut String, line: &str) {
    buffer.push_str(&fold_line(line));
    buffer.push_str("\r\n");
}

/// Content lines longer than 75 octets continue on the next line after
/// CRLF and a single space. Splits never land inside a UTF-8 sequence.
fn fold_line(line: &str) -> String {
    const MAX_OCTETS: usize = 75;

    let mut folded = String::with_capacity(line.len() + line.len() / MAX_OCTETS * 3);
    let mut octets = 0;
    for c in line.chars() {
        let width = c.len_utf8();
        if octets + width > MAX_OCTETS {
            folded.push_str("\r\n ");
            // The leading space counts towards the continuation line.
            octets = 1;
        }
        folded.push(c);
        octets += width;
    }
    folded
}

fn build_uid(event: &CalendarEvent) -> String {
    let slug: String = event
        .title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{}-{}@hawker-closures", slug, format_date(event.start))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}
