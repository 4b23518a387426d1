//! The marshaler service: owns the process, the codec registry and the two
//! background threads that keep every live marshaler in sync.
//!
//! ## Example
//!
//! ```ignore
//! use anamnesis_core::{MarshalerService, OffsetChain, ServiceConfig, Vector, builtin_offsets};
//!
//! let service = MarshalerService::attach(ServiceConfig::default())?;
//! service.on_error(|e| eprintln!("{e}"));
//! service.start()?;
//!
//! let offsets = builtin_offsets();
//! let position = service.marshaler::<Vector>(
//!     OffsetChain::new(offsets.get("Target")?).then(offsets.get("Position")?),
//! )?;
//! position.set_value(Vector::default(), true)?;
//! service.wait_for_tick()?;
//! ```

mod shutdown;

pub use shutdown::ShutdownSignal;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::codec::Codec;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::marshal::{CodecRegistry, MarshalContext, Marshaler};
use crate::memory::{ProcessHandle, ProcessMemory};
use crate::offset::{Offset, OffsetChain};

/// How often a blocked `wait_for_tick` re-checks shutdown and liveness.
const WAIT_POLL: Duration = Duration::from_millis(100);

pub struct MarshalerService {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    context: Arc<MarshalContext>,
    codecs: RwLock<CodecRegistry>,
    config: ServiceConfig,
    shutdown: ShutdownSignal,
    running: AtomicBool,
    ticks: Mutex<u64>,
    tick_cv: Condvar,
}

impl MarshalerService {
    pub fn new(process: Arc<dyn ProcessMemory>, config: ServiceConfig) -> Self {
        let context = MarshalContext::new(process, config.retry_strategy());
        Self {
            shared: Arc::new(Shared {
                context: Arc::new(context),
                codecs: RwLock::new(CodecRegistry::with_defaults(config.string_length)),
                config,
                shutdown: ShutdownSignal::new(),
                running: AtomicBool::new(false),
                ticks: Mutex::new(0),
                tick_cv: Condvar::new(),
            }),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Find the configured game process and build a service around it.
    pub fn attach(config: ServiceConfig) -> Result<Self> {
        let process = ProcessHandle::find_by_name(&config.process_name)?;
        Ok(Self::new(Arc::new(process), config))
    }

    /// Spawn the tick and liveness threads.
    pub fn start(&self) -> Result<()> {
        if self.shared.shutdown.is_shutdown() {
            return Err(Error::ServiceStopped);
        }
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut threads = self.threads.lock();

        let shared = Arc::clone(&self.shared);
        threads.push(
            thread::Builder::new()
                .name("anamnesis-tick".to_string())
                .spawn(move || shared.tick_loop())?,
        );

        let shared = Arc::clone(&self.shared);
        threads.push(
            thread::Builder::new()
                .name("anamnesis-liveness".to_string())
                .spawn(move || shared.liveness_loop())?,
        );

        info!(
            "Marshaler service started (tick {:?}, liveness {:?})",
            self.shared.config.tick_interval(),
            self.shared.config.liveness_interval()
        );
        Ok(())
    }

    /// Bind a marshaler of type `T` to `chain`.
    pub fn marshaler<T>(&self, chain: OffsetChain) -> Result<Marshaler<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.shared.shutdown.is_shutdown() {
            return Err(Error::ServiceStopped);
        }
        let codec = self.shared.codecs.read().codec_for::<T>(&chain)?;
        Marshaler::create(&self.shared.context, chain, codec)
    }

    /// Bind a marshaler to a base offset followed by relative offsets.
    pub fn marshaler_at<T>(&self, offsets: &[Offset]) -> Result<Marshaler<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.marshaler(OffsetChain::from_offsets(offsets.to_vec())?)
    }

    pub fn register_codec<C>(&self, codec: C) -> Result<()>
    where
        C: Codec + 'static,
        C::Value: 'static,
    {
        self.shared.codecs.write().register_codec(codec)
    }

    pub fn register_codec_factory<T, F>(&self, factory: F) -> Result<()>
    where
        T: 'static,
        F: Fn(&OffsetChain) -> Result<Arc<dyn Codec<Value = T>>> + Send + Sync + 'static,
    {
        self.shared.codecs.write().register(factory)
    }

    /// Block until every marshaler live at the time of the call has been
    /// ticked at least once.
    pub fn wait_for_tick(&self) -> Result<()> {
        self.wait_for_ticks(None).map(|_| ())
    }

    /// As [`wait_for_tick`](Self::wait_for_tick), giving up after `timeout`.
    /// Returns `Ok(false)` on timeout.
    pub fn wait_for_tick_timeout(&self, timeout: Duration) -> Result<bool> {
        self.wait_for_ticks(Some(Instant::now() + timeout))
    }

    fn wait_for_ticks(&self, deadline: Option<Instant>) -> Result<bool> {
        let mut ticks = self.shared.ticks.lock();
        // The pass in flight may already be past some marshalers.
        let target = *ticks + 2;

        loop {
            if self.shared.shutdown.is_shutdown() || !self.shared.running.load(Ordering::SeqCst) {
                return Err(Error::ServiceStopped);
            }
            if !self.shared.context.is_alive() {
                return Err(Error::ProcessExited);
            }
            if *ticks >= target {
                return Ok(true);
            }

            let now = Instant::now();
            let wake = match deadline {
                Some(deadline) if now >= deadline => return Ok(false),
                Some(deadline) => deadline.min(now + WAIT_POLL),
                None => now + WAIT_POLL,
            };
            self.shared.tick_cv.wait_until(&mut ticks, wake);
        }
    }

    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.shared.context.hooks.add_error(Arc::new(callback));
    }

    pub fn on_log<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared.context.hooks.add_log(Arc::new(callback));
    }

    pub fn is_alive(&self) -> bool {
        self.shared.context.is_alive()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst) && !self.shared.shutdown.is_shutdown()
    }

    /// Completed tick passes.
    pub fn tick_count(&self) -> u64 {
        *self.shared.ticks.lock()
    }

    /// Marshalers currently in the live set.
    pub fn live_count(&self) -> usize {
        self.shared.context.live.len()
    }

    pub fn process(&self) -> &Arc<dyn ProcessMemory> {
        &self.shared.context.process
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.shared.config
    }

    /// Stop both threads and dispose every remaining marshaler. Idempotent.
    pub fn shutdown(&self) {
        if !self.shared.shutdown.is_shutdown() {
            info!("Marshaler service shutting down");
        }
        self.shared.shutdown.trigger();
        self.shared.wake_waiters();

        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in threads {
            // A callback running on one of our threads may call shutdown.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("Marshaler service thread panicked");
            }
        }

        self.shared.dispose_all();
    }
}

impl Drop for MarshalerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn tick_loop(&self) {
        debug!("Tick thread started");

        while !self.shutdown.wait(self.config.tick_interval()) {
            if !self.context.is_alive() {
                continue;
            }

            let mut completed = true;
            for target in self.context.live.snapshot() {
                if !self.context.is_alive() || self.shutdown.is_shutdown() {
                    completed = false;
                    break;
                }
                if target.is_active() {
                    target.tick();
                }
            }

            if completed {
                *self.ticks.lock() += 1;
                self.tick_cv.notify_all();
            }
        }

        self.dispose_all();
        debug!("Tick thread stopped");
    }

    fn liveness_loop(&self) {
        debug!("Liveness thread started");

        loop {
            let alive = self.context.process.is_alive();
            let was_alive = self.context.set_alive(alive);

            if was_alive && !alive {
                error!("Game process has terminated");
                self.context.hooks.report_error(&Error::ProcessExited);
                self.wake_waiters();
            } else if !was_alive && alive {
                info!("Game process is responding again");
            }

            if self.shutdown.wait(self.config.liveness_interval()) {
                break;
            }
        }

        debug!("Liveness thread stopped");
    }

    fn wake_waiters(&self) {
        let _ticks = self.ticks.lock();
        self.tick_cv.notify_all();
    }

    fn dispose_all(&self) {
        let remaining = self.context.live.snapshot();
        if remaining.is_empty() {
            return;
        }
        if !self.context.is_alive() {
            warn!(
                "Process is not running; {} marshaler(s) disposed without flushing",
                remaining.len()
            );
        }
        for target in remaining {
            target.dispose();
        }
    }
}
