//! Parsing command line text into marshaled value types.

use std::fmt;
use std::str::FromStr;

use anamnesis_core::{Color, Color4, Flag, Quaternion, Transform, Vector, Vector2D};
use anyhow::{Result, anyhow, bail};
use serde::de::DeserializeOwned;

/// A value type that can be bound, printed and parsed from the command line.
pub trait CliValue: Clone + Send + Sync + fmt::Display + 'static {
    fn parse_value(text: &str) -> Result<Self>;
}

/// Call a generic function with the concrete type selected by a [`ValueKind`].
///
/// [`ValueKind`]: crate::cli::ValueKind
macro_rules! with_value_kind {
    ($kind:expr, $func:ident ( $($arg:expr),* $(,)? )) => {{
        use $crate::cli::ValueKind;
        match $kind {
            ValueKind::Bool => $func::<bool>($($arg),*),
            ValueKind::U8 => $func::<u8>($($arg),*),
            ValueKind::I16 => $func::<i16>($($arg),*),
            ValueKind::U16 => $func::<u16>($($arg),*),
            ValueKind::I32 => $func::<i32>($($arg),*),
            ValueKind::F32 => $func::<f32>($($arg),*),
            ValueKind::Vector2d => $func::<anamnesis_core::Vector2D>($($arg),*),
            ValueKind::Vector => $func::<anamnesis_core::Vector>($($arg),*),
            ValueKind::Quaternion => $func::<anamnesis_core::Quaternion>($($arg),*),
            ValueKind::Transform => $func::<anamnesis_core::Transform>($($arg),*),
            ValueKind::Color => $func::<anamnesis_core::Color>($($arg),*),
            ValueKind::Color4 => $func::<anamnesis_core::Color4>($($arg),*),
            ValueKind::Flag => $func::<anamnesis_core::Flag>($($arg),*),
            ValueKind::String => $func::<String>($($arg),*),
        }
    }};
}
pub(crate) use with_value_kind;

macro_rules! scalar_value {
    ($($ty:ty),+) => {
        $(
            impl CliValue for $ty {
                fn parse_value(text: &str) -> Result<Self> {
                    text.trim().parse::<$ty>().map_err(|e| {
                        anyhow!("Invalid {} value '{}': {}", stringify!($ty), text, e)
                    })
                }
            }
        )+
    };
}

scalar_value!(bool, u8, i16, u16, i32, f32);

impl CliValue for Flag {
    fn parse_value(text: &str) -> Result<Self> {
        Flag::from_str(text.trim())
            .map_err(|_| anyhow!("Invalid flag value '{}' (expected on/off)", text))
    }
}

impl CliValue for String {
    fn parse_value(text: &str) -> Result<Self> {
        Ok(text.to_string())
    }
}

macro_rules! float_value {
    ($ty:ident { $($field:ident),+ }) => {
        impl CliValue for $ty {
            fn parse_value(text: &str) -> Result<Self> {
                if let Some(value) = parse_json(text)? {
                    return Ok(value);
                }
                let [$($field),+] = parse_floats(text)?;
                Ok($ty { $($field),+ })
            }
        }
    };
}

float_value!(Vector2D { x, y });
float_value!(Vector { x, y, z });
float_value!(Quaternion { x, y, z, w });
float_value!(Color { r, g, b });
float_value!(Color4 { r, g, b, a });

impl CliValue for Transform {
    /// Ten floats: position (3), rotation (4), scale (3).
    fn parse_value(text: &str) -> Result<Self> {
        if let Some(value) = parse_json(text)? {
            return Ok(value);
        }
        let [px, py, pz, rx, ry, rz, rw, sx, sy, sz] = parse_floats(text)?;
        Ok(Transform {
            position: Vector { x: px, y: py, z: pz },
            rotation: Quaternion {
                x: rx,
                y: ry,
                z: rz,
                w: rw,
            },
            scale: Vector { x: sx, y: sy, z: sz },
        })
    }
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<Option<T>> {
    let text = text.trim();
    if !text.starts_with('{') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

fn parse_floats<const N: usize>(text: &str) -> Result<[f32; N]> {
    let values = text
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| anyhow!("Invalid float '{}': {}", part.trim(), e))
        })
        .collect::<Result<Vec<_>>>()?;

    match <[f32; N]>::try_from(values) {
        Ok(array) => Ok(array),
        Err(values) => bail!("Expected {} comma separated floats, got {}", N, values.len()),
    }
}
