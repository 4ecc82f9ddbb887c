//! store::lock
//!
//! Keyed exclusive locks for engine operations.
//!
//! # Architecture
//!
//! The engine serializes operations that touch the same offering's capacity
//! or the same student's registration set. Each operation names the keys it
//! needs ([`LockKey::Offering`], [`LockKey::Student`]) and acquires all of
//! them at once. Operations on disjoint keys run fully in parallel.
//!
//! # Invariants
//!
//! - A key set is acquired atomically: either every key is held, or none is
//! - Acquisition never blocks past the caller's deadline
//! - Locks are released on drop (RAII pattern), including on panic
//!
//! Acquiring the whole set in one step means no caller ever holds one key
//! while waiting for another, so lock ordering cannot deadlock.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use registrar::core::types::{OfferingId, StudentId};
//! use registrar::store::lock::{LockKey, LockTable};
//!
//! let table = LockTable::new();
//! let deadline = Instant::now() + Duration::from_millis(100);
//! let keys = [LockKey::Student(StudentId::new(1)), LockKey::Offering(OfferingId::new(7))];
//!
//! let guard = table.acquire(&keys, deadline).unwrap();
//! assert!(table.is_held(LockKey::Offering(OfferingId::new(7))));
//! drop(guard);
//! assert!(!table.is_held(LockKey::Offering(OfferingId::new(7))));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::core::types::{OfferingId, StudentId};

/// Errors from locking operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockError {
    /// The deadline passed before every key became free.
    #[error("timed out after {waited:?} waiting for {keys}")]
    Timeout { keys: String, waited: Duration },
}

/// A lockable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    /// An offering's capacity.
    Offering(OfferingId),
    /// A student's registration set.
    Student(StudentId),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Offering(id) => write!(f, "offering:{id}"),
            LockKey::Student(id) => write!(f, "student:{id}"),
        }
    }
}

/// A table of keyed exclusive locks.
#[derive(Debug, Default)]
pub struct LockTable {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire every key in `keys`, waiting until `deadline` at most.
    ///
    /// Duplicate keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if the keys are not all free by the
    /// deadline. No key is held on error.
    pub fn acquire(&self, keys: &[LockKey], deadline: Instant) -> Result<LockGuard<'_>, LockError> {
        let mut wanted = keys.to_vec();
        wanted.sort();
        wanted.dedup();

        let started = Instant::now();
        let mut held = self.held.lock();
        loop {
            if wanted.iter().all(|k| !held.contains(k)) {
                held.extend(wanted.iter().copied());
                return Ok(LockGuard {
                    table: self,
                    keys: wanted,
                });
            }
            if Instant::now() >= deadline || self.released.wait_until(&mut held, deadline).timed_out()
            {
                if wanted.iter().all(|k| !held.contains(k)) {
                    continue;
                }
                return Err(LockError::Timeout {
                    keys: wanted
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                    waited: started.elapsed(),
                });
            }
        }
    }

    /// Check if a key is currently held by anyone.
    pub fn is_held(&self, key: LockKey) -> bool {
        self.held.lock().contains(&key)
    }

    fn release(&self, keys: &[LockKey]) {
        let mut held = self.held.lock();
        for key in keys {
            held.remove(key);
        }
        drop(held);
        self.released.notify_all();
    }
}

/// Holds a set of keys until dropped.
#[derive(Debug)]
pub struct LockGuard<'a> {
    table: &'a LockTable,
    keys: Vec<LockKey>,
}

impl LockGuard<'_> {
    /// The keys held by this guard, sorted.
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.table.release(&self.keys);
    }
}
