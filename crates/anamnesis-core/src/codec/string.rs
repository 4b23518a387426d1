use encoding_rs::UTF_8;
use memchr::memchr;

use crate::codec::Codec;

/// Fixed-width UTF-8 text field.
#[derive(Debug, Clone, Copy)]
pub struct StringCodec {
    length: usize,
    zero_terminated: bool,
}

impl StringCodec {
    pub const DEFAULT_LENGTH: usize = 32;

    pub fn new(length: usize, zero_terminated: bool) -> Self {
        Self {
            length,
            zero_terminated,
        }
    }
}

impl Default for StringCodec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH, true)
    }
}

impl Codec for StringCodec {
    type Value = String;

    fn width(&self) -> usize {
        self.length
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let bytes = match (self.zero_terminated, memchr(0, bytes)) {
            (true, Some(end)) => &bytes[..end],
            _ => bytes,
        };
        let (text, _) = UTF_8.decode_without_bom_handling(bytes);
        text.into_owned()
    }

    fn encode(&self, value: &String, buffer: &mut [u8]) {
        let stripped = value.replace('\0', "");
        let mut end = stripped.len().min(self.length);
        while !stripped.is_char_boundary(end) {
            end -= 1;
        }

        let (encoded, _, _) = UTF_8.encode(&stripped[..end]);
        buffer[..end].copy_from_slice(&encoded);
        buffer[end..].fill(0);
    }
}
