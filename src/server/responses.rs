use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    dataset::centre::Centre,
    proximity::{distance::Coordinate, ranker::Nearby},
    timing::{closure::ClosureInterval, schedule::Advisory},
};

/// Body of /api/status.
///
/// `advisory` separates "no confirmed dates" from "confirmed open", which
/// `open` alone cannot.
#[derive(Serialize, Debug)]
pub struct StatusResponse<'a> {
    name: &'a str,
    date: NaiveDate,
    open: bool,
    advisory: Advisory,
    pending_dates: usize,
    closures: &'a [ClosureInterval],
    closed_on_date: Vec<ClosureInterval>,
    upcoming: Vec<ClosureInterval>,
}

impl<'a> StatusResponse<'a> {
    pub fn new(centre: &'a Centre, date: NaiveDate) -> Self {
        let schedule = centre.schedule();
        Self {
            name: centre.name(),
            date,
            open: !schedule.is_closed_on(date),
            advisory: schedule.advisory(date),
            pending_dates: schedule.pending_dates(),
            closures: schedule.closures(),
            closed_on_date: schedule.closures_on(date),
            upcoming: schedule.upcoming_closures(date),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct NearbyEntry<'a> {
    name: &'a str,
    location: Coordinate,
    distance_km: f64,
}

#[derive(Serialize, Debug)]
pub struct NearbyResponse<'a> {
    name: &'a str,
    date: NaiveDate,
    reference: Coordinate,
    radius_km: f64,
    centres: Vec<NearbyEntry<'a>>,
}

impl<'a> NearbyResponse<'a> {
    pub fn new(
        name: &'a str,
        date: NaiveDate,
        reference: Coordinate,
        radius_km: f64,
        nearby: Vec<Nearby<'a>>,
    ) -> Self {
        let centres = nearby
            .into_iter()
            .map(|entry| NearbyEntry {
                name: entry.centre.name(),
                location: entry.centre.location(),
                distance_km: entry.distance_km,
            })
            .collect();
        Self {
            name,
            date,
            reference,
            radius_km,
            centres,
        }
    }
}

/// One map pin, coloured by `open`.
#[derive(Serialize, Debug)]
pub struct MapMarker<'a> {
    name: &'a str,
    location: Coordinate,
    open: bool,
}

impl<'a> MapMarker<'a> {
    pub fn new(centre: &'a Centre, date: NaiveDate) -> Self {
        Self {
            name: centre.name(),
            location: centre.location(),
            open: !centre.schedule().is_closed_on(date),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct FavouritesResponse<'a> {
    session: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    added: Option<bool>,
    favourites: &'a [String],
}

impl<'a> FavouritesResponse<'a> {
    pub fn new(session: &'a str, added: Option<bool>, favourites: &'a [String]) -> Self {
        Self {
            session,
            added,
            favourites,
        }
    }
}
