use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::Error;
use crate::marshal::LiveRegistry;
use crate::memory::ProcessMemory;
use crate::retry::RetryStrategy;

pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Host callbacks for errors and write diagnostics.
#[derive(Default)]
pub(crate) struct Hooks {
    errors: RwLock<Vec<ErrorCallback>>,
    logs: RwLock<Vec<LogCallback>>,
}

impl Hooks {
    pub fn add_error(&self, callback: ErrorCallback) {
        self.errors.write().push(callback);
    }

    pub fn add_log(&self, callback: LogCallback) {
        self.logs.write().push(callback);
    }

    pub fn report_error(&self, error: &Error) {
        let callbacks = self.errors.read().clone();
        for callback in callbacks {
            callback(error);
        }
    }

    pub fn log(&self, message: &str) {
        let callbacks = self.logs.read().clone();
        for callback in callbacks {
            callback(message);
        }
    }
}

/// State shared by the service and every marshaler it created.
pub(crate) struct MarshalContext {
    pub process: Arc<dyn ProcessMemory>,
    pub live: LiveRegistry,
    pub retry: Arc<dyn RetryStrategy>,
    pub hooks: Hooks,
    alive: AtomicBool,
    next_id: AtomicU64,
}

impl MarshalContext {
    pub fn new(process: Arc<dyn ProcessMemory>, retry: Arc<dyn RetryStrategy>) -> Self {
        let alive = process.is_alive();
        Self {
            process,
            live: LiveRegistry::default(),
            retry,
            hooks: Hooks::default(),
            alive: AtomicBool::new(alive),
            next_id: AtomicU64::new(1),
        }
    }

    /// Last liveness published by the liveness thread.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Publish liveness; returns the previous value.
    pub fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::SeqCst)
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}
