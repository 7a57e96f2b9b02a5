use half::f16;
use num::complex::{Complex32, Complex64};

use super::{DataTypeError, ExtendedDataType, NumericDataType, StringDataType, TextWidth};

/// A numeric value widened to a common representation.
#[derive(Copy, Clone, Debug)]
enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(f64, f64),
}

#[derive(Clone, Debug)]
enum ConvertOp {
    Copy {
        src_offset: usize,
        dst_offset: usize,
        len: usize,
    },
    Numeric {
        src_offset: usize,
        dst_offset: usize,
        src: NumericDataType,
        dst: NumericDataType,
    },
    Text {
        src_offset: usize,
        dst_offset: usize,
        src: StringDataType,
        dst: StringDataType,
    },
}

/// Converts elements of one [`ExtendedDataType`] into another, both in their in-memory representation.
///
/// Conversion rules:
///  - integer to integer wraps (twos-complement truncation),
///  - floating point to integer rounds to nearest and saturates (NaN becomes zero),
///  - any real kind to a complex kind sets the imaginary component to zero,
///  - a complex kind to a real kind is rejected,
///  - compound components are matched by name, recursively,
///  - an enumeration converts as its base type,
///  - fixed-width strings are re-encoded, truncating to the destination width.
#[derive(Clone, Debug)]
pub(crate) struct ValueConverter {
    ops: Vec<ConvertOp>,
    src_size: usize,
    dst_size: usize,
    identity: bool,
}

impl ValueConverter {
    /// Create a converter from `src` elements to `dst` elements.
    ///
    /// # Errors
    /// Returns [`DataTypeError::IncompatibleDataTypes`] if the conversion is not possible.
    pub(crate) fn new(
        src: &ExtendedDataType,
        dst: &ExtendedDataType,
    ) -> Result<Self, DataTypeError> {
        let src_size = src.fixed_size()?;
        let dst_size = dst.fixed_size()?;
        let mut ops = Vec::new();
        Self::build(src, dst, 0, 0, &mut ops)?;
        let identity = src == dst;
        Ok(Self {
            ops,
            src_size,
            dst_size,
            identity,
        })
    }

    fn incompatible(src: &ExtendedDataType, dst: &ExtendedDataType) -> DataTypeError {
        DataTypeError::IncompatibleDataTypes(src.to_string(), dst.to_string())
    }

    fn build(
        src: &ExtendedDataType,
        dst: &ExtendedDataType,
        src_offset: usize,
        dst_offset: usize,
        ops: &mut Vec<ConvertOp>,
    ) -> Result<(), DataTypeError> {
        if src == dst {
            ops.push(ConvertOp::Copy {
                src_offset,
                dst_offset,
                len: src.fixed_size()?,
            });
            return Ok(());
        }
        match (src, dst) {
            (ExtendedDataType::String(src_string), ExtendedDataType::String(dst_string)) => {
                if src_string.max_length.is_none() || dst_string.max_length.is_none() {
                    return Err(Self::incompatible(src, dst));
                }
                ops.push(ConvertOp::Text {
                    src_offset,
                    dst_offset,
                    src: src_string.clone(),
                    dst: dst_string.clone(),
                });
                Ok(())
            }
            (ExtendedDataType::Compound(src_compound), ExtendedDataType::Compound(dst_compound)) => {
                for dst_component in &dst_compound.components {
                    let src_component = src_compound
                        .components
                        .iter()
                        .find(|component| component.name == dst_component.name)
                        .ok_or_else(|| Self::incompatible(src, dst))?;
                    Self::build(
                        &src_component.data_type,
                        &dst_component.data_type,
                        src_offset + src_component.offset,
                        dst_offset + dst_component.offset,
                        ops,
                    )?;
                }
                Ok(())
            }
            _ => match (src.numeric_data_type(), dst.numeric_data_type()) {
                (Some(src_numeric), Some(dst_numeric)) => {
                    if src_numeric.is_complex() && !dst_numeric.is_complex() {
                        return Err(Self::incompatible(src, dst));
                    }
                    if src_numeric == dst_numeric {
                        ops.push(ConvertOp::Copy {
                            src_offset,
                            dst_offset,
                            len: src_numeric.size(),
                        });
                    } else {
                        ops.push(ConvertOp::Numeric {
                            src_offset,
                            dst_offset,
                            src: src_numeric,
                            dst: dst_numeric,
                        });
                    }
                    Ok(())
                }
                _ => Err(Self::incompatible(src, dst)),
            },
        }
    }

    /// Returns true if the conversion is a plain byte copy of whole elements.
    pub(crate) const fn is_identity(&self) -> bool {
        self.identity
    }

    /// The source element size.
    pub(crate) const fn src_size(&self) -> usize {
        self.src_size
    }

    /// The destination element size.
    pub(crate) const fn dst_size(&self) -> usize {
        self.dst_size
    }

    /// Convert one element.
    pub(crate) fn convert(&self, src: &[u8], dst: &mut [u8]) {
        if self.identity {
            dst[..self.dst_size].copy_from_slice(&src[..self.src_size]);
            return;
        }
        for op in &self.ops {
            match op {
                ConvertOp::Copy {
                    src_offset,
                    dst_offset,
                    len,
                } => dst[*dst_offset..*dst_offset + len]
                    .copy_from_slice(&src[*src_offset..*src_offset + len]),
                ConvertOp::Numeric {
                    src_offset,
                    dst_offset,
                    src: src_type,
                    dst: dst_type,
                } => {
                    let value = read_scalar(*src_type, &src[*src_offset..]);
                    write_scalar(*dst_type, value, &mut dst[*dst_offset..]);
                }
                ConvertOp::Text {
                    src_offset,
                    dst_offset,
                    src: src_type,
                    dst: dst_type,
                } => {
                    let src_len = src_type.size().unwrap_or_default();
                    let dst_len = dst_type.size().unwrap_or_default();
                    let text = decode_fixed_string(&src[*src_offset..*src_offset + src_len], src_type);
                    encode_fixed_string(
                        &text,
                        dst_type,
                        &mut dst[*dst_offset..*dst_offset + dst_len],
                    );
                }
            }
        }
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0u8; N];
    array.copy_from_slice(&bytes[..N]);
    array
}

fn read_scalar(data_type: NumericDataType, bytes: &[u8]) -> Scalar {
    match data_type {
        NumericDataType::Bool => Scalar::Bool(bytes[0] != 0),
        NumericDataType::UInt8 => Scalar::UInt(u64::from(bytes[0])),
        NumericDataType::Int8 => Scalar::Int(i64::from(i8::from_ne_bytes(read_array(bytes)))),
        NumericDataType::UInt16 => Scalar::UInt(u64::from(u16::from_ne_bytes(read_array(bytes)))),
        NumericDataType::Int16 => Scalar::Int(i64::from(i16::from_ne_bytes(read_array(bytes)))),
        NumericDataType::UInt32 => Scalar::UInt(u64::from(u32::from_ne_bytes(read_array(bytes)))),
        NumericDataType::Int32 => Scalar::Int(i64::from(i32::from_ne_bytes(read_array(bytes)))),
        NumericDataType::UInt64 => Scalar::UInt(u64::from_ne_bytes(read_array(bytes))),
        NumericDataType::Int64 => Scalar::Int(i64::from_ne_bytes(read_array(bytes))),
        NumericDataType::Float16 => Scalar::Float(f16::from_ne_bytes(read_array(bytes)).to_f64()),
        NumericDataType::Float32 => Scalar::Float(f64::from(f32::from_ne_bytes(read_array(bytes)))),
        NumericDataType::Float64 => Scalar::Float(f64::from_ne_bytes(read_array(bytes))),
        NumericDataType::Complex64 => {
            let value: Complex32 = bytemuck::pod_read_unaligned(&bytes[..8]);
            Scalar::Complex(f64::from(value.re), f64::from(value.im))
        }
        NumericDataType::Complex128 => {
            let value: Complex64 = bytemuck::pod_read_unaligned(&bytes[..16]);
            Scalar::Complex(value.re, value.im)
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
impl Scalar {
    fn as_i64(self) -> i64 {
        match self {
            Self::Bool(value) => i64::from(value),
            Self::Int(value) => value,
            Self::UInt(value) => value as i64,
            Self::Float(value) | Self::Complex(value, _) => value.round() as i64,
        }
    }

    fn as_u64(self) -> u64 {
        match self {
            Self::Bool(value) => u64::from(value),
            Self::Int(value) => value as u64,
            Self::UInt(value) => value,
            Self::Float(value) | Self::Complex(value, _) => value.round() as u64,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Self::Bool(value) => f64::from(u8::from(value)),
            Self::Int(value) => value as f64,
            Self::UInt(value) => value as f64,
            Self::Float(value) | Self::Complex(value, _) => value,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, Self::Float(_) | Self::Complex(..))
    }

    /// Convert to an integer of a narrower type: wrap integers, saturate rounded floats.
    fn to_int<T>(self, from_i64: fn(i64) -> T, saturate: fn(f64) -> T) -> T {
        if self.is_float() {
            saturate(self.as_f64().round())
        } else {
            from_i64(self.as_i64())
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn write_scalar(data_type: NumericDataType, value: Scalar, out: &mut [u8]) {
    match data_type {
        NumericDataType::Bool => {
            out[0] = u8::from(match value {
                Scalar::Bool(value) => value,
                Scalar::Int(value) => value != 0,
                Scalar::UInt(value) => value != 0,
                Scalar::Float(value) | Scalar::Complex(value, _) => value != 0.0,
            });
        }
        NumericDataType::UInt8 => out[0] = value.to_int(|v| v as u8, |v| v as u8),
        NumericDataType::Int8 => {
            out[..1].copy_from_slice(&value.to_int(|v| v as i8, |v| v as i8).to_ne_bytes());
        }
        NumericDataType::UInt16 => {
            out[..2].copy_from_slice(&value.to_int(|v| v as u16, |v| v as u16).to_ne_bytes());
        }
        NumericDataType::Int16 => {
            out[..2].copy_from_slice(&value.to_int(|v| v as i16, |v| v as i16).to_ne_bytes());
        }
        NumericDataType::UInt32 => {
            out[..4].copy_from_slice(&value.to_int(|v| v as u32, |v| v as u32).to_ne_bytes());
        }
        NumericDataType::Int32 => {
            out[..4].copy_from_slice(&value.to_int(|v| v as i32, |v| v as i32).to_ne_bytes());
        }
        NumericDataType::UInt64 => {
            let value = if value.is_float() {
                value.as_f64().round() as u64
            } else {
                value.as_u64()
            };
            out[..8].copy_from_slice(&value.to_ne_bytes());
        }
        NumericDataType::Int64 => {
            out[..8].copy_from_slice(&value.to_int(|v| v, |v| v as i64).to_ne_bytes());
        }
        NumericDataType::Float16 => {
            out[..2].copy_from_slice(&f16::from_f64(value.as_f64()).to_ne_bytes());
        }
        NumericDataType::Float32 => {
            out[..4].copy_from_slice(&(value.as_f64() as f32).to_ne_bytes());
        }
        NumericDataType::Float64 => {
            out[..8].copy_from_slice(&value.as_f64().to_ne_bytes());
        }
        NumericDataType::Complex64 => {
            let (re, im) = match value {
                Scalar::Complex(re, im) => (re, im),
                other => (other.as_f64(), 0.0),
            };
            let value = Complex32::new(re as f32, im as f32);
            out[..8].copy_from_slice(bytemuck::bytes_of(&value));
        }
        NumericDataType::Complex128 => {
            let (re, im) = match value {
                Scalar::Complex(re, im) => (re, im),
                other => (other.as_f64(), 0.0),
            };
            let value = Complex64::new(re, im);
            out[..16].copy_from_slice(bytemuck::bytes_of(&value));
        }
    }
}

/// Returns true if `value` is representable by the integer type `data_type`.
pub(super) fn integer_fits(data_type: NumericDataType, value: i64) -> bool {
    match data_type {
        NumericDataType::UInt8 => u8::try_from(value).is_ok(),
        NumericDataType::Int8 => i8::try_from(value).is_ok(),
        NumericDataType::UInt16 => u16::try_from(value).is_ok(),
        NumericDataType::Int16 => i16::try_from(value).is_ok(),
        NumericDataType::UInt32 => u32::try_from(value).is_ok(),
        NumericDataType::Int32 => i32::try_from(value).is_ok(),
        NumericDataType::UInt64 => value >= 0,
        NumericDataType::Int64 => true,
        _ => false,
    }
}

/// Encode `text` into the fixed-width string element `out`.
///
/// The text is right-truncated to the string width (at a character boundary) and zero padded.
pub fn encode_fixed_string(text: &str, data_type: &StringDataType, out: &mut [u8]) {
    out.fill(0);
    match data_type.width {
        TextWidth::Ascii => {
            let mut len = text.len().min(out.len());
            while !text.is_char_boundary(len) {
                len -= 1;
            }
            out[..len].copy_from_slice(&text.as_bytes()[..len]);
        }
        TextWidth::Ucs4 => {
            for (unit, c) in out.chunks_exact_mut(4).zip(text.chars()) {
                unit.copy_from_slice(&u32::from(c).to_ne_bytes());
            }
        }
    }
}

/// Decode a fixed-width string element.
///
/// The text ends at the first NUL unit, or at the first unit which is not valid text.
#[must_use]
pub fn decode_fixed_string(bytes: &[u8], data_type: &StringDataType) -> String {
    match data_type.width {
        TextWidth::Ascii => {
            let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            match std::str::from_utf8(&bytes[..end]) {
                Ok(text) => text.to_string(),
                Err(err) => String::from_utf8_lossy(&bytes[..err.valid_up_to()]).into_owned(),
            }
        }
        TextWidth::Ucs4 => bytes
            .chunks_exact(4)
            .map(|unit| u32::from_ne_bytes(read_array(unit)))
            .take_while(|unit| *unit != 0)
            .map_while(char::from_u32)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::data_type::{Component, StringSubtype};

    fn convert<const N: usize>(src: NumericDataType, dst: NumericDataType, bytes: &[u8]) -> [u8; N] {
        let converter = ValueConverter::new(&src.into(), &dst.into()).unwrap();
        let mut out = [0u8; N];
        converter.convert(bytes, &mut out);
        out
    }

    #[test]
    fn conversion_integer_wraps() {
        let out = convert::<2>(
            NumericDataType::Int64,
            NumericDataType::Int16,
            &70000i64.to_ne_bytes(),
        );
        assert_eq!(i16::from_ne_bytes(out), 70000i64 as i16);
        let out = convert::<1>(NumericDataType::Int32, NumericDataType::UInt8, &(-1i32).to_ne_bytes());
        assert_eq!(out[0], 255);
    }

    #[test]
    fn conversion_float_to_integer() {
        let out = convert::<1>(NumericDataType::Float64, NumericDataType::UInt8, &2.6f64.to_ne_bytes());
        assert_eq!(out[0], 3);
        let out = convert::<1>(NumericDataType::Float64, NumericDataType::UInt8, &1000f64.to_ne_bytes());
        assert_eq!(out[0], 255);
        let out = convert::<2>(NumericDataType::Float32, NumericDataType::Int16, &f32::NAN.to_ne_bytes());
        assert_eq!(i16::from_ne_bytes(out), 0);
        let out = convert::<4>(NumericDataType::Float64, NumericDataType::Int32, &(-2.5f64).to_ne_bytes());
        assert_eq!(i32::from_ne_bytes(out), -3);
    }

    #[test]
    fn conversion_float16_and_complex() {
        let out = convert::<2>(NumericDataType::Float32, NumericDataType::Float16, &1.5f32.to_ne_bytes());
        assert_eq!(f16::from_ne_bytes(out), f16::from_f32(1.5));
        let out = convert::<8>(NumericDataType::Int16, NumericDataType::Complex64, &(-7i16).to_ne_bytes());
        let value: Complex32 = bytemuck::pod_read_unaligned(&out);
        assert_eq!(value, Complex32::new(-7.0, 0.0));
        assert!(ValueConverter::new(
            &NumericDataType::Complex64.into(),
            &NumericDataType::Float64.into()
        )
        .is_err());
    }

    #[test]
    fn conversion_fixed_string() {
        let ascii = ExtendedDataType::string(Some(4), StringSubtype::None);
        let ucs4 = ExtendedDataType::fixed_string(3, TextWidth::Ucs4);
        let (ExtendedDataType::String(ascii_type), ExtendedDataType::String(ucs4_type)) =
            (&ascii, &ucs4)
        else {
            panic!()
        };
        let mut element = [0u8; 4];
        encode_fixed_string("abcdef", ascii_type, &mut element);
        assert_eq!(&element, b"abcd");
        assert_eq!(decode_fixed_string(&element, ascii_type), "abcd");
        assert_eq!(decode_fixed_string(b"ab\0\xff", ascii_type), "ab");
        assert_eq!(decode_fixed_string(b"ab\xffc", ascii_type), "ab");

        let converter = ValueConverter::new(&ascii, &ucs4).unwrap();
        let mut out = [0u8; 12];
        converter.convert(b"xyz\0", &mut out);
        assert_eq!(decode_fixed_string(&out, ucs4_type), "xyz");
    }

    #[test]
    fn conversion_compound_by_name() {
        let src = ExtendedDataType::compound(
            "s",
            16,
            vec![
                Component::new("a", 0, NumericDataType::Int32.into()),
                Component::new("b", 8, NumericDataType::Float64.into()),
            ],
        )
        .unwrap();
        let dst = ExtendedDataType::compound(
            "d",
            4,
            vec![
                Component::new("b", 0, NumericDataType::Int16.into()),
                Component::new("a", 2, NumericDataType::UInt8.into()),
            ],
        )
        .unwrap();
        let mut element = [0u8; 16];
        element[..4].copy_from_slice(&5i32.to_ne_bytes());
        element[8..].copy_from_slice(&(-3.0f64).to_ne_bytes());
        let converter = ValueConverter::new(&src, &dst).unwrap();
        let mut out = [0u8; 4];
        converter.convert(&element, &mut out);
        assert_eq!(i16::from_ne_bytes([out[0], out[1]]), -3);
        assert_eq!(out[2], 5);
        assert!(ValueConverter::new(&dst, &NumericDataType::UInt8.into()).is_err());
    }
}
