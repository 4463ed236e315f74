use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Registry key that stands for "every profile".
pub const ALL_PROFILES: &str = "*";

/// Name-keyed, non-blocking mutual exclusion for mutating profile operations.
///
/// Acquisition is try-only: it either takes the entry immediately or reports
/// contention, so there is no queueing and no deadlock. The [`ALL_PROFILES`]
/// entry is exclusive against every other entry: it can only be taken when
/// the table is empty, and while held no per-profile entry can be taken.
#[derive(Debug, Default)]
pub struct ProfileLocks {
    held: Mutex<HashSet<String>>,
}

impl ProfileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set is always left consistent, so a poisoned lock is still usable.
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Atomically test-and-set the entry for `name`. Never blocks.
    pub fn try_acquire(&self, name: &str) -> bool {
        let mut held = self.table();
        let acquired = if name == ALL_PROFILES {
            held.is_empty() && held.insert(name.to_string())
        } else {
            !held.contains(ALL_PROFILES) && held.insert(name.to_string())
        };
        debug!(profile = %name, acquired, "Profile lock attempt");
        acquired
    }

    /// Clear the entry for `name`. Releasing an unheld name is a no-op.
    pub fn release(&self, name: &str) {
        if self.table().remove(name) {
            debug!(profile = %name, "Profile lock released");
        }
    }

    /// Read-only probe; does not take the entry.
    pub fn is_held(&self, name: &str) -> bool {
        self.table().contains(name)
    }

    /// Try to acquire `name`, returning a guard that releases it on drop.
    pub fn try_lock(self: &Arc<Self>, name: &str) -> Option<ProfileGuard> {
        self.try_acquire(name).then(|| ProfileGuard {
            locks: Arc::clone(self),
            name: name.to_string(),
        })
    }

    /// Drop every entry.
    #[cfg(test)]
    pub(crate) fn reset(&self) {
        self.table().clear();
    }
}

/// Holds a profile entry until dropped.
#[derive(Debug)]
pub struct ProfileGuard {
    locks: Arc<ProfileLocks>,
    name: String,
}

impl ProfileGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        self.locks.release(&self.name);
    }
}
