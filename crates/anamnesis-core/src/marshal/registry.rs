use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Type-erased view of a marshaler for the tick scheduler.
pub(crate) trait TickTarget: Send + Sync {
    fn tick(&self);
    fn dispose(&self);
    fn is_active(&self) -> bool;
}

/// The set of marshalers the tick thread visits.
///
/// Holds weak references only; a marshaler leaves the set when it is
/// disposed, which also happens when its last handle is dropped.
#[derive(Default)]
pub(crate) struct LiveRegistry {
    entries: Mutex<Vec<(u64, Weak<dyn TickTarget>)>>,
}

impl LiveRegistry {
    pub fn add(&self, id: u64, target: Weak<dyn TickTarget>) {
        self.entries.lock().push((id, target));
    }

    pub fn remove(&self, id: u64) {
        self.entries.lock().retain(|(entry, _)| *entry != id);
    }

    /// Strong references to every live marshaler, taken under the lock and
    /// used after it is released.
    pub fn snapshot(&self) -> Vec<Arc<dyn TickTarget>> {
        self.entries
            .lock()
            .iter()
            .filter_map(|(_, target)| target.upgrade())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
