use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use serde::Serialize;

/// A session's favourite centres, in the order they were added.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Favourites {
    names: Vec<String>,
}

impl Favourites {
    /// Returns `false` when the name is already a favourite.
    pub fn add(&mut self, name: &str) -> bool {
        if self.names.iter().any(|existing| existing == name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug)]
struct SessionEntry {
    favourites: Favourites,
    last_seen: Instant,
}

/// Favourites keyed by session id. A session's list is created on first use
/// and discarded when the session ends, goes idle for `ttl`, or is the least
/// recently used one when `max_sessions` is reached.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn favourites(&self, session: &str) -> Favourites {
        self.favourites_at(session, Instant::now())
    }

    pub fn add_favourite(&self, session: &str, name: &str) -> (bool, Favourites) {
        self.add_favourite_at(session, name, Instant::now())
    }

    /// Ends the session. Returns `false` if it was not live.
    pub fn end_session(&self, session: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn favourites_at(&self, session: &str, now: Instant) -> Favourites {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        self.sweep(&mut sessions, now);
        match sessions.get_mut(session) {
            Some(entry) => {
                entry.last_seen = now;
                entry.favourites.clone()
            }
            None => Favourites::default(),
        }
    }

    fn add_favourite_at(&self, session: &str, name: &str, now: Instant) -> (bool, Favourites) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        self.sweep(&mut sessions, now);
        if !sessions.contains_key(session) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                log::debug!("Session limit reached, dropping session {}", oldest);
                sessions.remove(&oldest);
            }
        }
        let entry = sessions
            .entry(session.to_string())
            .or_insert_with(|| SessionEntry {
                favourites: Favourites::default(),
                last_seen: now,
            });
        entry.last_seen = now;
        let added = entry.favourites.add(name);
        (added, entry.favourites.clone())
    }

    fn sweep(&self, sessions: &mut HashMap<String, SessionEntry>, now: Instant) {
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_seen) < self.ttl);
    }
}
