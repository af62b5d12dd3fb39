pub mod centre;
pub mod error;
pub mod loader;

use centre::Centre;

/// Every centre in the closure table, loaded once and never mutated.
#[derive(Debug, Default)]
pub struct Dataset {
    centres: Vec<Centre>,
}

impl Dataset {
    pub fn new(centres: Vec<Centre>) -> Self {
        Self { centres }
    }

    pub fn centres(&self) -> &[Centre] {
        &self.centres
    }

    pub fn get(&self, name: &str) -> Option<&Centre> {
        self.centres.iter().find(|centre| centre.name() == name)
    }

    pub fn names_sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.centres.iter().map(|centre| centre.name()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.centres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centres.is_empty()
    }
}
