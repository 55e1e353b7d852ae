//! Plain record types held by the kernel: one [`Entry`] per live key, a
//! bounded ring of [`Revision`] snapshots, the [`LockRecord`] guarding
//! exclusive access, and a [`KeyMetric`] that outlives the entry itself.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use serde_derive::{Deserialize, Serialize};

/// A prior value snapshot, captured the moment its successor was written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub value: Vec<u8>,
    pub content_type: String,
    pub hash: u64,
    pub version: u64,
    pub timestamp: SystemTime,
    pub client_id: String,
}

/// An exclusive per-key reservation held by one client id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub client_id: String,
    pub acquired_at: SystemTime,
    pub expires_at: Option<SystemTime>,
}

impl LockRecord {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expires_at, Some(exp) if exp <= now)
    }

    pub fn is_owned_by(&self, client_id: &str) -> bool {
        self.client_id == client_id
    }
}

/// Lifetime counters for one key name, surviving deletion and restart.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetric {
    pub access_count: u64,
    pub first_accessed: Option<SystemTime>,
    pub last_accessed: Option<SystemTime>,
    pub set_count: u64,
    pub first_set: Option<SystemTime>,
    pub last_set: Option<SystemTime>,
    pub lock_count: u64,
    pub first_locked: Option<SystemTime>,
    pub last_locked: Option<SystemTime>,
}

impl KeyMetric {
    pub fn record_access(&mut self, at: SystemTime) {
        self.access_count += 1;
        self.first_accessed.get_or_insert(at);
        self.last_accessed = Some(at);
    }

    pub fn record_set(&mut self, at: SystemTime) {
        self.set_count += 1;
        self.first_set.get_or_insert(at);
        self.last_set = Some(at);
    }

    pub fn record_lock(&mut self, at: SystemTime) {
        self.lock_count += 1;
        self.first_locked.get_or_insert(at);
        self.last_locked = Some(at);
    }
}

/// One live key: its current value and metadata, bounded revision history,
/// and optional lock/lifespan state. Guarded by a per-entry mutex in the
/// kernel — never cloned while live except for snapshotting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: Vec<u8>,
    pub content_type: String,
    pub version: u64,
    pub hash: u64,
    pub created_at: SystemTime,
    pub updated_at: Option<SystemTime>,
    pub lifespan: Option<Duration>,
    pub lifespan_set_at: Option<SystemTime>,
    pub lock: Option<LockRecord>,
    /// Newest-first, bounded to `RevisionLimit`.
    pub history: VecDeque<Revision>,
}

impl Entry {
    pub fn new(
        key: String,
        value: Vec<u8>,
        content_type: String,
        hash: u64,
        now: SystemTime,
    ) -> Self {
        Entry {
            key,
            value,
            content_type,
            version: 1,
            hash,
            created_at: now,
            updated_at: None,
            lifespan: None,
            lifespan_set_at: None,
            lock: None,
            history: VecDeque::new(),
        }
    }

    /// True once `lifespan` has elapsed since `lifespan_set_at`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match (self.lifespan, self.lifespan_set_at) {
            (Some(lifespan), Some(set_at)) => match now.duration_since(set_at) {
                Ok(elapsed) => elapsed >= lifespan,
                Err(_) => false,
            },
            _ => false,
        }
    }

    /// An unexpired lock held by someone other than `client_id`.
    pub fn locked_by_other(&self, client_id: &str, now: SystemTime) -> bool {
        match &self.lock {
            Some(lock) if !lock.is_expired(now) => !lock.is_owned_by(client_id),
            _ => false,
        }
    }

    /// Push the current (value, content_type, hash, version) as a revision
    /// before it is overwritten, truncating to `limit` entries.
    pub fn push_revision(&mut self, client_id: String, limit: usize) {
        if limit == 0 {
            return;
        }
        self.history.push_front(Revision {
            value: self.value.clone(),
            content_type: self.content_type.clone(),
            hash: self.hash,
            version: self.version,
            timestamp: self.updated_at.unwrap_or(self.created_at),
            client_id,
        });
        while self.history.len() > limit {
            self.history.pop_back();
        }
    }

    /// `version == 0` means current; `1..=len` indexes the ring,
    /// `1` being the oldest retained revision.
    pub fn revision_at(&self, version: u64) -> Option<(&[u8], &str, SystemTime)> {
        if version == 0 {
            return Some((&self.value, &self.content_type, self.updated_at.unwrap_or(self.created_at)));
        }
        let len = self.history.len() as u64;
        if version > len {
            return None;
        }
        // newest-first deque; version 1 = oldest retained = last element.
        let idx = (len - version) as usize;
        self.history
            .get(idx)
            .map(|r| (r.value.as_slice(), r.content_type.as_str(), r.timestamp))
    }
}
