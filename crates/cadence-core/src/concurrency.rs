//! Mutual exclusion and cancellation primitives for materialization passes.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex,
    },
    time::{Duration, Instant},
};

use uuid::Uuid;

use crate::CoreError;

/// Per-key exclusive locks (one key per entry or budget) with bounded waiting.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    held: Mutex<HashSet<Uuid>>,
    released: Condvar,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `key` is free or `timeout` elapses.
    pub fn acquire(&self, key: Uuid, timeout: Duration) -> Result<KeyGuard<'_>, CoreError> {
        let deadline = Instant::now() + timeout;
        let mut held = self
            .held
            .lock()
            .map_err(|_| CoreError::Storage("lock registry poisoned".into()))?;
        while held.contains(&key) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CoreError::LockTimeout(key));
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, remaining)
                .map_err(|_| CoreError::Storage("lock registry poisoned".into()))?;
            held = guard;
        }
        held.insert(key);
        Ok(KeyGuard { locks: self, key })
    }

    pub fn is_held(&self, key: Uuid) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&key))
            .unwrap_or(false)
    }
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: Uuid,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.locks.held.lock() {
            held.remove(&self.key);
        }
        self.locks.released.notify_all();
    }
}

/// Cooperative cancellation flag, checked between occurrences.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
