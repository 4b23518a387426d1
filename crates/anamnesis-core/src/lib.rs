//! # anamnesis-core
//!
//! Live, typed access to the memory of a running game process.
//!
//! This crate provides:
//! - Process attachment and raw memory access (Windows, and Linux for games
//!   running under Wine/Proton)
//! - Offset chains, pointer-chain resolution and versioned offset tables
//! - Signature scanning to relocate table entries after a game update
//! - Byte codecs for the game's value types
//! - Typed marshalers kept in sync with process memory by a tick thread
//! - Actor handles that retarget their marshalers when the actor moves

pub mod actor;
pub mod codec;
pub mod config;
pub mod error;
pub mod marshal;
pub mod memory;
pub mod offset;
pub mod retry;
pub mod service;

pub use actor::{ACTOR_SLOT_SIZE, Actor, ActorTable};
pub use codec::{Codec, Color, Color4, Flag, Quaternion, Transform, Vector, Vector2D};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{Error, Result};
pub use marshal::{CodecRegistry, Marshaler};
pub use memory::{ProcessHandle, ProcessMemory};
pub use offset::{
    CodeSignature, FlagPattern, Offset, OffsetChain, OffsetTable, SignatureScanner, SignatureSet,
    apply_signatures, builtin_offsets, builtin_signatures, load_offset_table, load_signatures,
    resolve, save_offset_table, save_signatures,
};
pub use retry::{ExponentialBackoff, FixedDelay, NoRetry, RetryStrategy};
pub use service::{MarshalerService, ShutdownSignal};
