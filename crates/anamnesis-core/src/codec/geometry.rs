use crate::codec::{
    Codec, Color, Color4, Quaternion, Transform, Vector, Vector2D, read_floats, write_floats,
};

/// Codecs for structs made of consecutive little-endian floats.
macro_rules! float_codec {
    ($name:ident, $ty:ident, [$($field:ident),+]) => {
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl $name {
            const FIELDS: usize = [$(stringify!($field)),+].len();

            pub(crate) fn read(bytes: &[u8], at: usize) -> $ty {
                let [$($field),+] = read_floats(bytes, at);
                $ty { $($field),+ }
            }

            pub(crate) fn write(value: &$ty, buffer: &mut [u8], at: usize) {
                write_floats(buffer, at, &[$(value.$field),+]);
            }
        }

        impl Codec for $name {
            type Value = $ty;

            fn width(&self) -> usize {
                Self::FIELDS * 4
            }

            fn decode(&self, bytes: &[u8]) -> $ty {
                Self::read(bytes, 0)
            }

            fn encode(&self, value: &$ty, buffer: &mut [u8]) {
                Self::write(value, buffer, 0);
            }
        }
    };
}

float_codec!(Vector2DCodec, Vector2D, [x, y]);
float_codec!(VectorCodec, Vector, [x, y, z]);
float_codec!(QuaternionCodec, Quaternion, [x, y, z, w]);
float_codec!(ColorCodec, Color, [r, g, b]);
float_codec!(Color4Codec, Color4, [r, g, b, a]);

/// Position at 0, rotation at 16, scale at 32. Bytes 12..16 are padding and
/// are left as they were read.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformCodec;

impl TransformCodec {
    const POSITION: usize = 0;
    const ROTATION: usize = 16;
    const SCALE: usize = 32;
}

impl Codec for TransformCodec {
    type Value = Transform;

    fn width(&self) -> usize {
        44
    }

    fn decode(&self, bytes: &[u8]) -> Transform {
        Transform {
            position: VectorCodec::read(bytes, Self::POSITION),
            rotation: QuaternionCodec::read(bytes, Self::ROTATION),
            scale: VectorCodec::read(bytes, Self::SCALE),
        }
    }

    fn encode(&self, value: &Transform, buffer: &mut [u8]) {
        VectorCodec::write(&value.position, buffer, Self::POSITION);
        QuaternionCodec::write(&value.rotation, buffer, Self::ROTATION);
        VectorCodec::write(&value.scale, buffer, Self::SCALE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_widths() {
        assert_eq!(Vector2DCodec.width(), 8);
        assert_eq!(VectorCodec.width(), 12);
        assert_eq!(QuaternionCodec.width(), 16);
        assert_eq!(ColorCodec.width(), 12);
        assert_eq!(Color4Codec.width(), 16);
        assert_eq!(TransformCodec.width(), 44);
    }

    #[test]
    fn test_vector_field_order() {
        let vector = VectorCodec.decode(&floats(&[1.0, 2.0, 3.0]));
        assert_eq!(vector, Vector { x: 1.0, y: 2.0, z: 3.0 });

        let color = Color4Codec.encode_to_vec(&Color4 { r: 0.1, g: 0.2, b: 0.3, a: 0.4 });
        assert_eq!(color, floats(&[0.1, 0.2, 0.3, 0.4]));
    }

    #[test]
    fn test_transform_layout() {
        let mut bytes = floats(&[1.0, 2.0, 3.0]);
        bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        bytes.extend(floats(&[0.0, 0.0, 0.0, 1.0]));
        bytes.extend(floats(&[1.0, 1.0, 1.0]));

        let transform = TransformCodec.decode(&bytes);
        assert_eq!(transform.position, Vector { x: 1.0, y: 2.0, z: 3.0 });
        assert_eq!(transform.rotation, Quaternion::IDENTITY);
        assert_eq!(transform.scale, Vector::ONE);

        let moved = Transform {
            position: Vector { x: 4.0, y: 5.0, z: 6.0 },
            ..transform
        };
        TransformCodec.encode(&moved, &mut bytes);
        assert_eq!(&bytes[0..12], floats(&[4.0, 5.0, 6.0]).as_slice());
        assert_eq!(&bytes[12..16], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&bytes[16..44], &TransformCodec.encode_to_vec(&moved)[16..44]);
    }

    proptest! {
        #[test]
        fn test_quaternion_roundtrip(x in -1.0f32..1.0, y in -1.0f32..1.0, z in -1.0f32..1.0, w in -1.0f32..1.0) {
            let value = Quaternion { x, y, z, w };
            prop_assert_eq!(QuaternionCodec.decode(&QuaternionCodec.encode_to_vec(&value)), value);
        }

        #[test]
        fn test_transform_roundtrip_preserves_padding(
            position in prop::array::uniform3(-1000.0f32..1000.0),
            scale in prop::array::uniform3(0.0f32..10.0),
            padding in prop::array::uniform4(any::<u8>()),
        ) {
            let value = Transform {
                position: Vector { x: position[0], y: position[1], z: position[2] },
                rotation: Quaternion::IDENTITY,
                scale: Vector { x: scale[0], y: scale[1], z: scale[2] },
            };
            let mut buffer = vec![0u8; 44];
            buffer[12..16].copy_from_slice(&padding);

            TransformCodec.encode(&value, &mut buffer);
            prop_assert_eq!(&buffer[12..16], &padding[..]);
            prop_assert_eq!(TransformCodec.decode(&buffer), value);
        }
    }
}
