use crate::codec::{Codec, Flag};
use crate::offset::FlagPattern;

/// Reads a code patch as enabled only when it matches the `on` bytes exactly.
#[derive(Debug, Clone)]
pub struct FlagCodec {
    pattern: FlagPattern,
}

impl FlagCodec {
    pub fn new(pattern: FlagPattern) -> Self {
        Self { pattern }
    }
}

impl Codec for FlagCodec {
    type Value = Flag;

    fn width(&self) -> usize {
        self.pattern.width()
    }

    fn decode(&self, bytes: &[u8]) -> Flag {
        Flag::from(bytes == self.pattern.on())
    }

    fn encode(&self, value: &Flag, buffer: &mut [u8]) {
        let bytes = match value {
            Flag::Enabled => self.pattern.on(),
            Flag::Disabled => self.pattern.off(),
        };
        buffer.copy_from_slice(bytes);
    }
}
