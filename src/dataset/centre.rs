use serde::Serialize;

use crate::{proximity::distance::Coordinate, timing::schedule::ClosureSchedule};

#[derive(Clone, Debug, Serialize)]
pub struct Centre {
    name: String,
    location: Coordinate,
    schedule: ClosureSchedule,
}

impl Centre {
    pub fn new(name: &str, location: Coordinate, schedule: ClosureSchedule) -> Self {
        Self {
            name: name.trim().to_string(),
            location,
            schedule,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Coordinate {
        self.location
    }

    pub fn schedule(&self) -> &ClosureSchedule {
        &self.schedule
    }
}
