//! Byte-level codecs for the value types a marshaler can bind to.
//!
//! Every codec has a fixed width. Encoding writes into a buffer that already
//! holds the last bytes read from memory, so bytes a type does not own (the
//! padding inside [`Transform`], for instance) keep their game-side values.

mod flag;
mod geometry;
mod numeric;
mod string;
mod types;

pub use flag::FlagCodec;
pub use geometry::{
    Color4Codec, ColorCodec, QuaternionCodec, TransformCodec, Vector2DCodec, VectorCodec,
};
pub use numeric::{BoolCodec, F32Codec, I16Codec, I32Codec, U16Codec, U8Codec};
pub use string::StringCodec;
pub use types::*;

/// Conversion between a value and its in-memory representation.
pub trait Codec: Send + Sync {
    type Value;

    /// Number of bytes the value occupies.
    fn width(&self) -> usize;

    /// Decode `bytes`, which is exactly `width()` long.
    fn decode(&self, bytes: &[u8]) -> Self::Value;

    /// Encode `value` over `buffer`, which is exactly `width()` long and
    /// holds the bytes last read from memory.
    fn encode(&self, value: &Self::Value, buffer: &mut [u8]);

    fn encode_to_vec(&self, value: &Self::Value) -> Vec<u8> {
        let mut buffer = vec![0u8; self.width()];
        self.encode(value, &mut buffer);
        buffer
    }
}

/// `N` consecutive little-endian floats starting at `at`.
pub(crate) fn read_floats<const N: usize>(bytes: &[u8], at: usize) -> [f32; N] {
    let mut values = [0f32; N];
    for (i, value) in values.iter_mut().enumerate() {
        let start = at + i * 4;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[start..start + 4]);
        *value = f32::from_le_bytes(raw);
    }
    values
}

pub(crate) fn write_floats(buffer: &mut [u8], at: usize, values: &[f32]) {
    for (i, value) in values.iter().enumerate() {
        let start = at + i * 4;
        buffer[start..start + 4].copy_from_slice(&value.to_le_bytes());
    }
}
