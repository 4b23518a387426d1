use crate::codec::Codec;

/// A single byte, `1` meaning true.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCodec;

impl Codec for BoolCodec {
    type Value = bool;

    fn width(&self) -> usize {
        1
    }

    fn decode(&self, bytes: &[u8]) -> bool {
        bytes[0] == 1
    }

    fn encode(&self, value: &bool, buffer: &mut [u8]) {
        buffer[0] = u8::from(*value);
    }
}

macro_rules! le_codec {
    ($(#[$meta:meta])* $name:ident, $ty:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Codec for $name {
            type Value = $ty;

            fn width(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn decode(&self, bytes: &[u8]) -> $ty {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                <$ty>::from_le_bytes(raw)
            }

            fn encode(&self, value: &$ty, buffer: &mut [u8]) {
                buffer[..std::mem::size_of::<$ty>()].copy_from_slice(&value.to_le_bytes());
            }
        }
    };
}

le_codec!(U8Codec, u8);
le_codec!(I16Codec, i16);
le_codec!(U16Codec, u16);
le_codec!(I32Codec, i32);
le_codec!(
    /// IEEE-754 single precision, little-endian.
    F32Codec,
    f32
);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_widths() {
        assert_eq!(BoolCodec.width(), 1);
        assert_eq!(U8Codec.width(), 1);
        assert_eq!(I16Codec.width(), 2);
        assert_eq!(U16Codec.width(), 2);
        assert_eq!(I32Codec.width(), 4);
        assert_eq!(F32Codec.width(), 4);
    }

    #[test]
    fn test_bool_only_one_is_true() {
        assert!(BoolCodec.decode(&[1]));
        assert!(!BoolCodec.decode(&[0]));
        assert!(!BoolCodec.decode(&[2]));
        assert_eq!(BoolCodec.encode_to_vec(&true), vec![1]);
        assert_eq!(BoolCodec.encode_to_vec(&false), vec![0]);
    }

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(I32Codec.encode_to_vec(&-2), vec![0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(U16Codec.decode(&[0x34, 0x12]), 0x1234);
        assert_eq!(F32Codec.encode_to_vec(&1.0), vec![0x00, 0x00, 0x80, 0x3F]);
    }

    proptest! {
        #[test]
        fn test_i16_roundtrip(value: i16) {
            prop_assert_eq!(I16Codec.decode(&I16Codec.encode_to_vec(&value)), value);
        }

        #[test]
        fn test_i32_roundtrip(value: i32) {
            prop_assert_eq!(I32Codec.decode(&I32Codec.encode_to_vec(&value)), value);
        }

        #[test]
        fn test_f32_roundtrip_is_bit_exact(bits: u32) {
            let value = f32::from_bits(bits);
            let decoded = F32Codec.decode(&F32Codec.encode_to_vec(&value));
            prop_assert_eq!(decoded.to_bits(), bits);
        }
    }
}
