//! Typed marshalers and the bookkeeping the tick scheduler needs.

mod codecs;
mod context;
mod marshaler;
mod registry;

pub use codecs::{CodecFactory, CodecRegistry};
pub use context::{ErrorCallback, LogCallback};
pub use marshaler::Marshaler;

pub(crate) use context::MarshalContext;
pub(crate) use registry::{LiveRegistry, TickTarget};
