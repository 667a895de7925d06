use {
    std::{
        collections::HashMap,
        sync::{Mutex, MutexGuard, PoisonError},
        time::{Duration, Instant},
    },
    uuid::Uuid,
};

/// A search result waiting for its download button to be pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResult {
    pub source_url: Box<str>,
    pub artist_names: Box<str>,
}

struct Entry {
    created: Instant,
    result: PendingResult,
}

/// Maps button IDs to search results. Every entry can be taken once, and expires after `ttl`.
pub struct PendingResults {
    ttl: Duration,
    entries: Mutex<HashMap<Box<str>, Entry>>,
}

impl PendingResults {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::default() }
    }

    fn lock(&self) -> MutexGuard<HashMap<Box<str>, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep(&self, entries: &mut HashMap<Box<str>, Entry>, now: Instant) {
        entries.retain(|_, entry| now.saturating_duration_since(entry.created) <= self.ttl);
    }

    /// Returns the ID to put in the button, short enough for Telegram's 64-byte callback data.
    pub fn insert(&self, result: PendingResult) -> Box<str> {
        self.insert_at(result, Instant::now())
    }

    fn insert_at(&self, result: PendingResult, now: Instant) -> Box<str> {
        let id: Box<str> = Uuid::new_v4().simple().to_string().into();
        let mut entries = self.lock();
        self.sweep(&mut entries, now);
        entries.insert(id.clone(), Entry { created: now, result });
        id
    }

    pub fn take(&self, id: &str) -> Option<PendingResult> {
        self.take_at(id, Instant::now())
    }

    fn take_at(&self, id: &str, now: Instant) -> Option<PendingResult> {
        let mut entries = self.lock();
        self.sweep(&mut entries, now);
        entries.remove(id).map(|entry| entry.result)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
