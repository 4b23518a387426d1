use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::marshal::{MarshalContext, TickTarget};
use crate::offset::{Offset, OffsetChain, resolve};

type ChangedListener<T> = Arc<dyn Fn(&T) + Send + Sync>;
type DisposingListener = Arc<dyn Fn() + Send + Sync>;

/// Live binding between a location in process memory and a decoded value.
///
/// Handles are cheap clones of one shared cell. Reads return the cached
/// value; writes are staged and flushed by the next tick (or immediately,
/// see [`Marshaler::set_value`]). Dropping the last handle disposes the
/// marshaler, flushing any staged write first.
pub struct Marshaler<T: Clone + Send + Sync + 'static> {
    inner: Arc<Inner<T>>,
}

struct Inner<T: Clone + Send + Sync + 'static> {
    id: u64,
    context: Arc<MarshalContext>,
    codec: Arc<dyn Codec<Value = T>>,
    state: Mutex<State<T>>,
    active: AtomicBool,
    disposing: AtomicBool,
    changed_listeners: Mutex<Vec<ChangedListener<T>>>,
    disposing_listeners: Mutex<Vec<DisposingListener>>,
}

struct State<T> {
    chain: OffsetChain,
    address: u64,
    old: Vec<u8>,
    new: Vec<u8>,
    value: T,
    dirty: bool,
    failure: Option<String>,
}

impl<T: Clone + Send + Sync + 'static> Marshaler<T> {
    /// Resolve `chain`, read the current value and join the live set.
    pub(crate) fn create(
        context: &Arc<MarshalContext>,
        chain: OffsetChain,
        codec: Arc<dyn Codec<Value = T>>,
    ) -> Result<Self> {
        let address = resolve(&*context.process, &chain)?;
        let width = codec.width();

        let mut old = vec![0u8; width];
        context.process.read_into(address, &mut old)?;
        let value = codec.decode(&old);

        let inner = Arc::new(Inner {
            id: context.next_id(),
            context: Arc::clone(context),
            codec,
            state: Mutex::new(State {
                chain,
                address,
                new: old.clone(),
                old,
                value,
                dirty: false,
                failure: None,
            }),
            active: AtomicBool::new(true),
            disposing: AtomicBool::new(false),
            changed_listeners: Mutex::new(Vec::new()),
            disposing_listeners: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&inner);
        context.live.add(inner.id, weak);
        debug!("Created marshaler {}", inner);

        Ok(Self { inner })
    }

    /// Cached value as of the last tick.
    pub fn value(&self) -> Result<T> {
        let state = self.inner.state.lock();
        if !self.inner.is_active() {
            return Err(self.inner.disposed_error(&state));
        }
        Ok(state.value.clone())
    }

    /// Stage `value`; the next tick writes it.
    pub fn set(&self, value: T) -> Result<()> {
        let mut state = self.inner.state.lock();
        if !self.inner.is_active() {
            return Err(self.inner.disposed_error(&state));
        }
        state.value = value;
        state.dirty = true;
        Ok(())
    }

    /// Stage `value` and, if `immediate`, tick on the calling thread before
    /// returning.
    pub fn set_value(&self, value: T, immediate: bool) -> Result<()> {
        self.set(value)?;
        if immediate {
            self.inner.tick();
            if !self.inner.is_active() {
                let state = self.inner.state.lock();
                return Err(self.inner.disposed_error(&state));
            }
        }
        Ok(())
    }

    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn on_value_changed<F>(&self, listener: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.changed_listeners.lock().push(Arc::new(listener));
    }

    pub fn on_disposing<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.disposing_listeners.lock().push(Arc::new(listener));
    }

    /// Swap the base offset and re-resolve. A staged write is kept and lands
    /// at the new address.
    pub fn retarget(&self, base: Offset) -> Result<()> {
        let mut state = self.inner.state.lock();
        if !self.inner.is_active() {
            return Err(self.inner.disposed_error(&state));
        }
        let chain = state.chain.with_base(base);
        let address = resolve(&*self.inner.context.process, &chain)?;
        debug!(
            "Retargeted {} from {:#x} to {:#x}",
            chain.name(),
            state.address,
            address
        );
        state.chain = chain;
        state.address = address;
        Ok(())
    }

    /// Re-walk the pointer chain, e.g. after the game reallocated an object.
    pub fn refresh_address(&self) -> Result<u64> {
        let mut state = self.inner.state.lock();
        if !self.inner.is_active() {
            return Err(self.inner.disposed_error(&state));
        }
        state.address = resolve(&*self.inner.context.process, &state.chain)?;
        Ok(state.address)
    }

    pub fn address(&self) -> u64 {
        self.inner.state.lock().address
    }

    pub fn name(&self) -> String {
        self.inner.state.lock().chain.name()
    }

    pub fn chain(&self) -> OffsetChain {
        self.inner.state.lock().chain.clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

impl<T: Clone + Send + Sync + 'static> Clone for Marshaler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Display for Marshaler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Debug for Marshaler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marshaler")
            .field("id", &self.inner.id)
            .field("target", &self.inner.to_string())
            .field("active", &self.inner.is_active())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Inner<T> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn disposed_error(&self, state: &State<T>) -> Error {
        Error::Disposed {
            name: state.chain.name(),
            reason: state.failure.clone(),
        }
    }

    /// One tick with retries. Exhausting the retry policy disposes the
    /// marshaler and reports the failure. A dead process is not a fault:
    /// the value stays at its last known state and the liveness thread
    /// reports the exit.
    fn tick(&self) {
        let mut failed_attempts = 0;
        loop {
            if !self.is_active() {
                return;
            }

            match self.tick_once() {
                Ok(Some(value)) => {
                    self.notify_changed(&value);
                    return;
                }
                Ok(None) => return,
                Err(error) => {
                    if self.process_gone(&error) {
                        debug!("Tick of {} stopped, process is not running: {}", self, error);
                        return;
                    }
                    failed_attempts += 1;
                    match self.context.retry.next_delay(failed_attempts) {
                        Some(delay) => {
                            debug!(
                                "Tick of {} failed (attempt {}): {}",
                                self, failed_attempts, error
                            );
                            thread::sleep(delay);
                        }
                        None => {
                            self.fault(error);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn process_gone(&self, error: &Error) -> bool {
        matches!(error, Error::ProcessExited)
            || !self.context.is_alive()
            || !self.context.process.is_alive()
    }

    /// Reconcile memory and the cached value. Returns the new value when
    /// either side changed.
    fn tick_once(&self) -> Result<Option<T>> {
        if !self.context.is_alive() {
            return Err(Error::ProcessExited);
        }

        let process = &self.context.process;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut changed = false;
        let mut wrote = false;

        process.read_into(state.address, &mut state.new)?;

        if state.dirty {
            self.codec.encode(&state.value, &mut state.new);
            if state.new != state.old {
                let written = process.write_bytes(state.address, &state.new)?;
                if written < state.new.len() {
                    return Err(Error::MemoryWriteFailed {
                        address: state.address,
                        message: format!("wrote {} of {} bytes", written, state.new.len()),
                    });
                }
                state.old.copy_from_slice(&state.new);
                changed = true;
                wrote = true;
            }
            state.dirty = false;
        }

        if state.new != state.old {
            state.value = self.codec.decode(&state.new);
            state.old.copy_from_slice(&state.new);
            changed = true;
        }

        let value = changed.then(|| state.value.clone());
        let target = wrote.then(|| describe(state));
        drop(guard);

        if let Some(target) = target {
            debug!("Write memory {}", target);
            self.context.hooks.log(&format!("Write memory {}", target));
        }
        Ok(value)
    }

    fn notify_changed(&self, value: &T) {
        // A dispose can land between the tick and here.
        if !self.is_active() {
            return;
        }
        let listeners = self.changed_listeners.lock().clone();
        for listener in listeners {
            self.call_listener(|| listener(value));
        }
    }

    /// Run host code from the tick thread; a panic is reported, not unwound.
    fn call_listener(&self, listener: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(listener)) {
            let name = self.state.lock().chain.name();
            let message = panic_message(payload.as_ref());
            error!("Listener of {} panicked: {}", self, message);
            self.context
                .hooks
                .report_error(&Error::ListenerPanicked { name, message });
        }
    }

    fn fault(&self, error: Error) {
        let name = {
            let mut state = self.state.lock();
            state.failure = Some(error.to_string());
            state.dirty = false;
            state.chain.name()
        };

        if self.dispose_inner(false) {
            warn!("Disposing of memory {} due to error: {}", self, error);
            self.context.hooks.report_error(&Error::MarshalerFaulted {
                name,
                source: Box::new(error),
            });
        }
    }

    fn dispose(&self) {
        self.dispose_inner(true);
    }

    /// Returns true for the call that performed the disposal.
    fn dispose_inner(&self, flush: bool) -> bool {
        if self.disposing.swap(true, Ordering::SeqCst) {
            return false;
        }

        if flush && self.state.lock().dirty {
            if self.context.is_alive() {
                if let Err(e) = self.tick_once() {
                    warn!("Failed to flush pending write to {}: {}", self, e);
                }
            } else {
                warn!("Dropping pending write to {}: process is not running", self);
            }
        }

        let listeners = self.disposing_listeners.lock().clone();
        for listener in listeners {
            self.call_listener(|| listener());
        }

        self.context.live.remove(self.id);
        self.active.store(false, Ordering::SeqCst);
        debug!("Disposed marshaler {}", self);
        true
    }
}

impl<T: Clone + Send + Sync + 'static> TickTarget for Inner<T> {
    fn tick(&self) {
        Inner::tick(self);
    }

    fn dispose(&self) {
        Inner::dispose(self);
    }

    fn is_active(&self) -> bool {
        Inner::is_active(self)
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for Inner<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Display for Inner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&describe(&self.state.lock()))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn describe<T>(state: &State<T>) -> String {
    format!(
        "{}: {} ({:#x})",
        state.chain.name(),
        state.chain,
        state.address
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::codec::{F32Codec, Vector, VectorCodec};
    use crate::memory::MockProcess;
    use crate::retry::FixedDelay;

    const BASE: u64 = 0x1000;
    const ACTOR: u64 = 0x2000;

    fn setup() -> (Arc<MockProcess>, Arc<MarshalContext>) {
        let process = Arc::new(
            MockProcess::builder()
                .base_address(BASE)
                .write_u64(BASE + 0xF0, ACTOR)
                .map(ACTOR, 0x100)
                .write_f32s(ACTOR + 0x50, &[1.0, 2.0, 3.0])
                .build(),
        );
        let context = Arc::new(MarshalContext::new(
            process.clone(),
            Arc::new(FixedDelay::new(3, Duration::from_millis(1))),
        ));
        (process, context)
    }

    fn vector(context: &Arc<MarshalContext>) -> Marshaler<Vector> {
        Marshaler::create(context, OffsetChain::new([0xF0, 0x50]), Arc::new(VectorCodec)).unwrap()
    }

    #[test]
    fn test_initial_read() {
        let (_process, context) = setup();
        let marshaler = vector(&context);

        assert_eq!(marshaler.address(), ACTOR + 0x50);
        assert_eq!(marshaler.value().unwrap(), Vector { x: 1.0, y: 2.0, z: 3.0 });
        assert_eq!(context.live.len(), 1);
    }

    #[test]
    fn test_tick_without_changes_is_silent() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        marshaler.on_value_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        marshaler.inner.tick();
        marshaler.inner.tick();

        assert_eq!(changes.load(Ordering::SeqCst), 0);
        assert_eq!(process.write_count(), 0);
    }

    #[test]
    fn test_external_change_is_observed() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        marshaler.on_value_changed(move |v: &Vector| sink.lock().push(*v));

        process.poke_f32s(ACTOR + 0x50, &[4.0, 5.0, 6.0]);
        marshaler.inner.tick();

        assert_eq!(marshaler.value().unwrap(), Vector { x: 4.0, y: 5.0, z: 6.0 });
        assert_eq!(seen.lock().as_slice(), &[Vector { x: 4.0, y: 5.0, z: 6.0 }]);
    }

    #[test]
    fn test_set_writes_on_next_tick() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let target = Vector { x: 7.0, y: 8.0, z: 9.0 };

        marshaler.set(target).unwrap();
        assert_eq!(process.peek_f32s(ACTOR + 0x50, 3), vec![1.0, 2.0, 3.0]);

        marshaler.inner.tick();
        assert_eq!(process.peek_f32s(ACTOR + 0x50, 3), vec![7.0, 8.0, 9.0]);
        assert_eq!(process.write_count(), 1);
        assert_eq!(marshaler.value().unwrap(), target);

        marshaler.inner.tick();
        assert_eq!(process.write_count(), 1);
    }

    #[test]
    fn test_write_lands_before_staleness_check() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let target = Vector { x: 7.0, y: 8.0, z: 9.0 };

        // The game moved the value after our last read; the staged write wins.
        process.poke_f32s(ACTOR + 0x50, &[4.0, 5.0, 6.0]);
        marshaler.set(target).unwrap();
        marshaler.inner.tick();

        assert_eq!(process.peek_f32s(ACTOR + 0x50, 3), vec![7.0, 8.0, 9.0]);
        assert_eq!(marshaler.value().unwrap(), target);
    }

    #[test]
    fn test_set_value_immediate() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        context
            .hooks
            .add_log(Arc::new(move |m: &str| sink.lock().push(m.to_string())));

        marshaler
            .set_value(Vector { x: 0.5, y: 0.5, z: 0.5 }, true)
            .unwrap();

        assert_eq!(process.peek_f32s(ACTOR + 0x50, 3), vec![0.5, 0.5, 0.5]);
        let messages = messages.lock();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Write memory [Unknown]: 0xF0, 0x50"));
    }

    #[test]
    fn test_failure_retries_then_disposes_once() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        context
            .hooks
            .add_error(Arc::new(move |e: &Error| sink.lock().push(e.to_string())));

        let reads_before = process.read_count();
        process.set_fail_reads(true);
        marshaler.inner.tick();
        marshaler.inner.tick();

        assert_eq!(process.read_count() - reads_before, 3);
        assert!(!marshaler.is_active());
        assert_eq!(context.live.len(), 0);
        assert_eq!(errors.lock().len(), 1);
        assert!(errors.lock()[0].contains("injected read failure"));

        match marshaler.value() {
            Err(Error::Disposed { reason: Some(reason), .. }) => {
                assert!(reason.contains("injected read failure"))
            }
            other => panic!("expected Disposed with reason, got {:?}", other),
        }
    }

    fn collect_errors(context: &MarshalContext) -> Arc<Mutex<Vec<String>>> {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        context
            .hooks
            .add_error(Arc::new(move |e: &Error| sink.lock().push(e.to_string())));
        errors
    }

    #[test]
    fn test_process_exit_during_tick_is_not_a_fault() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let errors = collect_errors(&context);
        marshaler.set(Vector::ONE).unwrap();

        // The game is gone but the liveness flag has not caught up yet.
        let reads_before = process.read_count();
        process.set_fail_reads(true);
        process.set_alive(false);
        marshaler.inner.tick();

        assert_eq!(process.read_count() - reads_before, 1);
        assert!(marshaler.is_active());
        assert!(errors.lock().is_empty());
        assert_eq!(marshaler.value().unwrap(), Vector::ONE);

        // Once the published flag flips, ticks stop before touching memory.
        context.set_alive(false);
        marshaler.inner.tick();
        assert_eq!(process.read_count() - reads_before, 1);
        assert!(marshaler.is_active());
        assert!(errors.lock().is_empty());
    }

    #[test]
    fn test_short_write_is_a_failure() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let errors = collect_errors(&context);

        process.set_write_limit(Some(4));
        marshaler.set(Vector::ONE).unwrap();
        marshaler.inner.tick();

        assert_eq!(process.write_count(), 3);
        assert!(!marshaler.is_active());
        let errors = errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("wrote 4 of 12 bytes"));
    }

    #[test]
    fn test_short_write_is_retried() {
        let (process, _) = setup();
        let context = Arc::new(MarshalContext::new(
            process.clone(),
            Arc::new(FixedDelay::new(200, Duration::from_millis(1))),
        ));
        let marshaler = vector(&context);

        process.set_write_limit(Some(4));
        let limited = process.clone();
        let healer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            limited.set_write_limit(None);
        });

        marshaler.set_value(Vector::ONE, true).unwrap();
        healer.join().unwrap();

        assert!(marshaler.is_active());
        assert!(process.write_count() > 1);
        assert_eq!(process.peek_f32s(ACTOR + 0x50, 3), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_panicking_listener_is_reported() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let errors = collect_errors(&context);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        marshaler.on_value_changed(|_| panic!("boom"));
        marshaler.on_value_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        process.poke_f32s(ACTOR + 0x50, &[4.0, 5.0, 6.0]);
        marshaler.inner.tick();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(marshaler.is_active());
        assert_eq!(marshaler.value().unwrap(), Vector { x: 4.0, y: 5.0, z: 6.0 });
        assert_eq!(
            errors.lock().as_slice(),
            &["Listener of [Unknown] panicked: boom".to_string()]
        );
    }

    #[test]
    fn test_panicking_disposing_listener_still_disposes() {
        let (_process, context) = setup();
        let marshaler = vector(&context);
        let errors = collect_errors(&context);
        marshaler.on_disposing(|| panic!("teardown"));

        marshaler.dispose();

        assert!(!marshaler.is_active());
        assert_eq!(context.live.len(), 0);
        assert_eq!(errors.lock().len(), 1);
    }

    #[test]
    fn test_recovers_within_retry_budget() {
        let (process, _) = setup();
        let context = Arc::new(MarshalContext::new(
            process.clone(),
            Arc::new(FixedDelay::new(200, Duration::from_millis(1))),
        ));
        let marshaler =
            Marshaler::create(&context, OffsetChain::new([0xF0, 0x60]), Arc::new(F32Codec))
                .unwrap();

        process.set_fail_writes(true);
        let failing = process.clone();
        let healer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            failing.set_fail_writes(false);
        });

        marshaler.set_value(2.5, true).unwrap();
        healer.join().unwrap();

        assert!(marshaler.is_active());
        assert_eq!(process.peek_f32s(ACTOR + 0x60, 1), vec![2.5]);
    }

    #[test]
    fn test_dispose_flushes_and_is_idempotent() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let disposals = Arc::new(AtomicUsize::new(0));
        let counter = disposals.clone();
        marshaler.on_disposing(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        marshaler.set(Vector::ONE).unwrap();
        marshaler.dispose();
        marshaler.dispose();

        assert_eq!(process.peek_f32s(ACTOR + 0x50, 3), vec![1.0, 1.0, 1.0]);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
        assert!(matches!(marshaler.value(), Err(Error::Disposed { reason: None, .. })));
        assert!(marshaler.set(Vector::ONE).is_err());
    }

    #[test]
    fn test_drop_of_last_handle_flushes() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        let clone = marshaler.clone();

        marshaler.set(Vector::ONE).unwrap();
        drop(marshaler);
        assert_eq!(context.live.len(), 1);

        drop(clone);
        assert_eq!(context.live.len(), 0);
        assert_eq!(process.peek_f32s(ACTOR + 0x50, 3), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_retarget_keeps_pending_write() {
        let (process, context) = setup();
        process.poke(BASE + 0xF8, &0x3000u64.to_le_bytes());
        process.poke(0x3050, &[0u8; 12]);

        let marshaler = Marshaler::create(
            &context,
            OffsetChain::new(Offset::from(0xF0).named("Slot0")).then(0x50),
            Arc::new(VectorCodec),
        )
        .unwrap();
        marshaler.set(Vector::ONE).unwrap();
        marshaler.retarget(Offset::from(0xF8).named("Slot1")).unwrap();

        assert_eq!(marshaler.address(), 0x3050);
        assert_eq!(marshaler.name(), "Slot1, [Unknown]");

        marshaler.inner.tick();
        assert_eq!(process.peek_f32s(0x3050, 3), vec![1.0, 1.0, 1.0]);
        assert_eq!(process.peek_f32s(ACTOR + 0x50, 3), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_display() {
        let (_process, context) = setup();
        let marshaler = vector(&context);
        assert_eq!(marshaler.to_string(), "[Unknown]: 0xF0, 0x50 (0x2050)");
    }

    #[test]
    fn test_dead_process_skips_flush() {
        let (process, context) = setup();
        let marshaler = vector(&context);
        marshaler.set(Vector::ONE).unwrap();
        context.set_alive(false);

        marshaler.dispose();
        assert_eq!(process.write_count(), 0);
        assert!(!marshaler.is_active());
    }
}
