use std::fmt;
use std::str::FromStr;

use crate::error::GraphError;

/// Primitive numeric kind of a packed field component.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScalarKind {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
}

impl ScalarKind {
    pub const fn size(self) -> usize {
        match self {
            ScalarKind::I8 | ScalarKind::U8 => 1,
            ScalarKind::I16 | ScalarKind::U16 => 2,
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::F32 => 4,
        }
    }

    /// Writes `v` little-endian into `out`. Integer kinds saturate.
    pub(crate) fn write(self, out: &mut [u8], v: f64) {
        match self {
            ScalarKind::I8 => out[..1].copy_from_slice(&(v as i8).to_le_bytes()),
            ScalarKind::U8 => out[..1].copy_from_slice(&(v as u8).to_le_bytes()),
            ScalarKind::I16 => out[..2].copy_from_slice(&(v as i16).to_le_bytes()),
            ScalarKind::U16 => out[..2].copy_from_slice(&(v as u16).to_le_bytes()),
            ScalarKind::I32 => out[..4].copy_from_slice(&(v as i32).to_le_bytes()),
            ScalarKind::U32 => out[..4].copy_from_slice(&(v as u32).to_le_bytes()),
            ScalarKind::F32 => out[..4].copy_from_slice(&(v as f32).to_le_bytes()),
        }
    }

    pub(crate) fn read(self, bytes: &[u8]) -> f64 {
        match self {
            ScalarKind::I8 => i8::from_le_bytes([bytes[0]]) as f64,
            ScalarKind::U8 => bytes[0] as f64,
            ScalarKind::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            ScalarKind::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            ScalarKind::I32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            ScalarKind::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            ScalarKind::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ScalarKind::I8 => "i8",
            ScalarKind::U8 => "u8",
            ScalarKind::I16 => "i16",
            ScalarKind::U16 => "u16",
            ScalarKind::I32 => "i32",
            ScalarKind::U32 => "u32",
            ScalarKind::F32 => "f32",
        }
    }
}

/// Scalar or fixed-size vector of one [`ScalarKind`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FieldType {
    pub kind: ScalarKind,
    /// 1 for scalars, 2..=4 for vectors.
    pub components: u8,
}

impl FieldType {
    pub const fn scalar(kind: ScalarKind) -> Self {
        Self { kind, components: 1 }
    }

    pub fn vector(kind: ScalarKind, components: u8) -> Result<Self, GraphError> {
        if !(1..=4).contains(&components) {
            return Err(GraphError::config(format!(
                "vector field of {components} components; expected 1..=4"
            )));
        }
        Ok(Self { kind, components })
    }

    pub const F32: FieldType = FieldType::scalar(ScalarKind::F32);
    pub const U32: FieldType = FieldType::scalar(ScalarKind::U32);
    pub const VEC2: FieldType = FieldType { kind: ScalarKind::F32, components: 2 };
    pub const VEC3: FieldType = FieldType { kind: ScalarKind::F32, components: 3 };
    pub const VEC4: FieldType = FieldType { kind: ScalarKind::F32, components: 4 };

    pub const fn byte_size(self) -> usize {
        self.kind.size() * self.components as usize
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components == 1 {
            f.write_str(self.kind.name())
        } else {
            write!(f, "{}x{}", self.kind.name(), self.components)
        }
    }
}

/// Parses `"f32"`, `"u8x4"`, `"i16x2"`, ...
impl FromStr for FieldType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, count) = match s.split_once('x') {
            Some((k, n)) => {
                let n: u8 = n
                    .parse()
                    .map_err(|_| GraphError::config(format!("malformed field type `{s}`")))?;
                (k, n)
            }
            None => (s, 1),
        };
        let kind = match kind {
            "i8" => ScalarKind::I8,
            "u8" => ScalarKind::U8,
            "i16" => ScalarKind::I16,
            "u16" => ScalarKind::U16,
            "i32" => ScalarKind::I32,
            "u32" => ScalarKind::U32,
            "f32" => ScalarKind::F32,
            _ => return Err(GraphError::config(format!("unknown scalar kind in field type `{s}`"))),
        };
        FieldType::vector(kind, count)
    }
}

/// Value produced by a field extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(f64),
    /// Up to four components are kept; `len` is the count the extractor
    /// produced, so oversized values fail the layout check.
    Vector { data: [f64; 4], len: u8 },
    /// Expands the record into one entry per element.
    Sequence(Vec<FieldValue>),
}

impl FieldValue {
    pub fn vector(components: &[f64]) -> Self {
        let mut data = [0.0; 4];
        let kept = components.len().min(4);
        data[..kept].copy_from_slice(&components[..kept]);
        let len = u8::try_from(components.len()).unwrap_or(u8::MAX);
        FieldValue::Vector { data, len }
    }

    /// Component count, or `None` for sequences.
    pub fn components(&self) -> Option<u8> {
        match self {
            FieldValue::Scalar(_) => Some(1),
            FieldValue::Vector { len, .. } => Some(*len),
            FieldValue::Sequence(_) => None,
        }
    }

    pub fn component(&self, i: usize) -> f64 {
        match self {
            FieldValue::Scalar(v) if i == 0 => *v,
            FieldValue::Vector { data, len } if i < *len as usize => data.get(i).copied().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

macro_rules! scalar_from {
    ($($t:ty),*) => {$(
        impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                FieldValue::Scalar(v as f64)
            }
        }
    )*};
}

scalar_from!(f32, f64, u8, u16, u32, i32, u64);

macro_rules! vector_from {
    ($($t:ty),*) => {$(
        impl<const N: usize> From<[$t; N]> for FieldValue {
            fn from(v: [$t; N]) -> Self {
                let wide: Vec<f64> = v.iter().map(|c| *c as f64).collect();
                FieldValue::vector(&wide)
            }
        }
    )*};
}

vector_from!(f32, u8);

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::Sequence(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar_and_vector_types() {
        assert_eq!("f32".parse::<FieldType>().unwrap(), FieldType::F32);
        let t: FieldType = "u8x4".parse().unwrap();
        assert_eq!(t, FieldType { kind: ScalarKind::U8, components: 4 });
        assert_eq!(t.byte_size(), 4);
        assert_eq!("i16x3".parse::<FieldType>().unwrap().byte_size(), 6);
    }

    #[test]
    fn malformed_types_are_configuration_errors() {
        for bad in ["f64", "u8x", "f32x5", "f32x0", ""] {
            let err = bad.parse::<FieldType>().unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Configuration, "{bad}");
        }
    }

    #[test]
    fn display_round_trips_parse() {
        assert_eq!(FieldType::VEC3.to_string(), "f32x3");
        assert_eq!(FieldType::U32.to_string(), "u32");
    }

    #[test]
    fn integer_writes_saturate() {
        let mut out = [0u8; 2];
        ScalarKind::U8.write(&mut out, 300.0);
        assert_eq!(out[0], 255);
        ScalarKind::I16.write(&mut out, -40_000.0);
        assert_eq!(ScalarKind::I16.read(&out), i16::MIN as f64);
    }
}
