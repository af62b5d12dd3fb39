use std::collections::HashSet;

use chrono::NaiveDate;

use crate::dataset::centre::Centre;

use super::distance::Coordinate;

pub const DEFAULT_RADIUS_KM: f64 = 2.0;

#[derive(Clone, Debug)]
pub struct Nearby<'a> {
    pub centre: &'a Centre,
    pub distance_km: f64,
}

/// Centres open on `date` that lie strictly within `radius_km` of `reference`,
/// nearest first.
///
/// The selected centre never recommends itself. Equal distances keep the
/// dataset order.
pub fn nearby_open<'a>(
    centres: &'a [Centre],
    reference: Coordinate,
    reference_name: &str,
    radius_km: f64,
    date: NaiveDate,
) -> Vec<Nearby<'a>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut nearby: Vec<Nearby<'a>> = Vec::new();
    for centre in centres {
        if centre.name() == reference_name {
            continue;
        }
        let distance_km = reference.distance_km(&centre.location());
        if distance_km >= radius_km || centre.schedule().is_closed_on(date) {
            continue;
        }
        if !seen.insert(centre.name()) {
            continue;
        }
        nearby.push(Nearby {
            centre,
            distance_km,
        });
    }

    // sort_by is stable
    nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    nearby
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{
        closure::{ClosureInterval, ClosureKind},
        schedule::ClosureSchedule,
    };
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_centre(name: &str, lat: f64, lon: f64) -> Centre {
        Centre::new(name, Coordinate::new(lat, lon), ClosureSchedule::new())
    }

    fn closed_centre(name: &str, lat: f64, lon: f64, start: NaiveDate, end: NaiveDate) -> Centre {
        let mut schedule = ClosureSchedule::new();
        let interval =
            ClosureInterval::new(Some(start), Some(end), "", ClosureKind::Cleaning).unwrap();
        schedule.add_closure(interval).unwrap();
        Centre::new(name, Coordinate::new(lat, lon), schedule)
    }

    fn names(result: &[Nearby]) -> Vec<String> {
        result.iter().map(|n| n.centre.name().to_string()).collect()
    }

    #[test]
    fn open_neighbour_is_recommended() {
        let centres = vec![open_centre("A", 1.300, 103.800), open_centre("B", 1.305, 103.805)];
        let result = nearby_open(
            &centres,
            Coordinate::new(1.300, 103.800),
            "A",
            DEFAULT_RADIUS_KM,
            ymd(2025, 1, 3),
        );
        assert_eq!(names(&result), vec!["B"]);
        assert!(result[0].distance_km < 1.0);
    }

    #[test]
    fn closed_neighbour_is_excluded() {
        let centres = vec![
            open_centre("A", 1.300, 103.800),
            closed_centre("B", 1.305, 103.805, ymd(2025, 1, 1), ymd(2025, 1, 5)),
        ];
        let reference = Coordinate::new(1.300, 103.800);
        assert!(nearby_open(&centres, reference, "A", 2.0, ymd(2025, 1, 5)).is_empty());
        assert_eq!(names(&nearby_open(&centres, reference, "A", 2.0, ymd(2025, 1, 6))), vec!["B"]);
    }

    #[test]
    fn radius_is_strict() {
        let centres = vec![open_centre("A", 1.300, 103.800), open_centre("B", 1.305, 103.805)];
        let reference = Coordinate::new(1.300, 103.800);
        let exact = reference.distance_km(&centres[1].location());
        assert!(nearby_open(&centres, reference, "A", exact, ymd(2025, 1, 1)).is_empty());
        assert_eq!(
            nearby_open(&centres, reference, "A", exact + 1e-6, ymd(2025, 1, 1)).len(),
            1
        );
    }

    #[test]
    fn sorted_nearest_first_and_far_ones_dropped() {
        let centres = vec![
            open_centre("Home", 1.3000, 103.8000),
            open_centre("Far", 1.4000, 103.9000),
            open_centre("Mid", 1.3100, 103.8000),
            open_centre("Near", 1.3010, 103.8000),
        ];
        let result = nearby_open(&centres, Coordinate::new(1.3, 103.8), "Home", 2.0, ymd(2025, 1, 1));
        assert_eq!(names(&result), vec!["Near", "Mid"]);
    }

    #[test]
    fn ties_keep_dataset_order_and_duplicates_collapse() {
        let centres = vec![
            open_centre("Stall Two", 1.3000, 103.8010),
            open_centre("Stall One", 1.3000, 103.8010),
            open_centre("Stall Two", 1.3000, 103.8010),
        ];
        let result = nearby_open(&centres, Coordinate::new(1.3, 103.8), "Home", 2.0, ymd(2025, 1, 1));
        assert_eq!(names(&result), vec!["Stall Two", "Stall One"]);
    }

    #[test]
    fn reference_centre_excluded_even_when_location_is_elsewhere() {
        let centres = vec![open_centre("A", 1.300, 103.800), open_centre("B", 1.305, 103.805)];
        let result = nearby_open(&centres, Coordinate::new(1.3001, 103.8001), "A", 2.0, ymd(2025, 1, 1));
        assert_eq!(names(&result), vec!["B"]);
    }

    #[test]
    fn duplicate_name_qualifies_through_a_later_row() {
        let centres = vec![
            closed_centre("Twin", 1.3010, 103.8000, ymd(2025, 1, 1), ymd(2025, 1, 5)),
            open_centre("Twin", 1.3020, 103.8000),
            open_centre("Twin", 1.3030, 103.8000),
        ];
        let result = nearby_open(&centres, Coordinate::new(1.3, 103.8), "Home", 2.0, ymd(2025, 1, 3));
        assert_eq!(names(&result), vec!["Twin"]);
        assert_eq!(result[0].centre.location().latitude, 1.3020);
    }
}
