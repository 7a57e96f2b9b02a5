//! `fill_value` interpretation.
//!
//! Accepted encodings of the fill value of a numeric (or enumerated) data type:
//!  - a JSON number, or `true`/`false` for `bool`,
//!  - `"NaN"`, `"Infinity"` and `"-Infinity"` for floating point types,
//!  - a hex literal such as `"0x7FC00000"`: the big-endian bytes of the value, which must be the size of the type,
//!  - a binary literal such as `"0b1111"`: the bit pattern of an integer or floating point value of up to 64 bits,
//!  - a numeric string such as `"-12"` or `"1.5"`, rounded to the nearest value in range for integer types,
//!  - `[re, im]` for complex types.
//!
//! String and compound fill values are base64 encoded stored bytes. `"0"` on a string type is no fill value.
//! A one element JSON array is unwrapped.

use base64::{prelude::BASE64_STANDARD, Engine};
use half::f16;
use serde_json::{Number, Value};
use thiserror::Error;

use crate::array::{
    codec::StorageLayout, Endianness, ExtendedDataType, FillValue, NumericDataType, NATIVE_ENDIAN,
};

/// An invalid fill value.
#[derive(Debug, Error)]
#[error("invalid fill_value {value} for data type {data_type}")]
pub struct FillValueMetadataError {
    value: String,
    data_type: String,
}

impl FillValueMetadataError {
    fn new(value: &Value, data_type: &ExtendedDataType) -> Self {
        Self {
            value: value.to_string(),
            data_type: data_type.to_string(),
        }
    }
}

/// Interpret a `fill_value` for elements of `data_type` stored with `layout`.
///
/// Returns [`None`] for a `null` fill value.
///
/// # Errors
/// Returns a [`FillValueMetadataError`] if `value` is not a valid fill value of `data_type`.
pub fn fill_value_from_metadata(
    value: &Value,
    data_type: &ExtendedDataType,
    layout: &StorageLayout,
) -> Result<Option<FillValue>, FillValueMetadataError> {
    if value.is_null() {
        return Ok(None);
    }
    // numpy writes "0" as the fill value of unicode arrays created without one
    if matches!(data_type, ExtendedDataType::String(_)) && value.as_str() == Some("0") {
        return Ok(None);
    }
    let bytes = match data_type {
        ExtendedDataType::Numeric(numeric) => numeric_from_metadata(value, *numeric),
        ExtendedDataType::Enum(enumeration) => numeric_from_metadata(value, enumeration.base()),
        ExtendedDataType::String(_) | ExtendedDataType::Compound(_) => {
            stored_bytes_from_metadata(value, layout)
        }
    };
    bytes
        .map(|bytes| Some(FillValue::new(bytes)))
        .ok_or_else(|| FillValueMetadataError::new(value, data_type))
}

/// Create the `fill_value` of `fill_value`, an element of `data_type` stored with `layout`.
#[must_use]
pub fn fill_value_to_metadata(
    fill_value: Option<&FillValue>,
    data_type: &ExtendedDataType,
    layout: &StorageLayout,
) -> Value {
    let Some(fill_value) = fill_value else {
        return Value::Null;
    };
    let bytes = fill_value.as_ne_bytes();
    match data_type {
        ExtendedDataType::Numeric(numeric) => numeric_to_metadata(bytes, *numeric),
        ExtendedDataType::Enum(enumeration) => numeric_to_metadata(bytes, enumeration.base()),
        ExtendedDataType::String(_) | ExtendedDataType::Compound(_) => {
            Some(Value::String(BASE64_STANDARD.encode(layout.encode_element(bytes))))
        }
    }
    .unwrap_or(Value::Null)
}

fn unwrap_single(value: &Value) -> &Value {
    match value {
        Value::Array(values) if values.len() == 1 => &values[0],
        value => value,
    }
}

const fn complex_component(numeric: NumericDataType) -> NumericDataType {
    match numeric {
        NumericDataType::Complex64 => NumericDataType::Float32,
        _ => NumericDataType::Float64,
    }
}

fn numeric_from_metadata(value: &Value, numeric: NumericDataType) -> Option<Vec<u8>> {
    let value = unwrap_single(value);
    if numeric.is_complex() {
        let component = complex_component(numeric);
        return match value {
            Value::Array(parts) if parts.len() == 2 => {
                let mut bytes = numeric_from_metadata(&parts[0], component)?;
                bytes.extend(numeric_from_metadata(&parts[1], component)?);
                Some(bytes)
            }
            Value::String(string) if string.starts_with("0x") => hex_bytes(string, numeric),
            value => {
                let mut bytes = numeric_from_metadata(value, component)?;
                bytes.resize(numeric.size(), 0);
                Some(bytes)
            }
        };
    }
    match value {
        Value::Bool(value) => (numeric == NumericDataType::Bool).then(|| vec![u8::from(*value)]),
        Value::Number(number) => number_bytes(number, numeric),
        Value::String(string) => string_bytes(string, numeric),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_bytes(number: &Number, numeric: NumericDataType) -> Option<Vec<u8>> {
    if numeric.is_float() {
        float_bytes(number.as_f64()?, numeric)
    } else if let Some(value) = number.as_i64() {
        integer_bytes(i128::from(value), numeric)
    } else if let Some(value) = number.as_u64() {
        integer_bytes(i128::from(value), numeric)
    } else {
        let value = number.as_f64()?;
        (value.fract() == 0.0 && value.abs() < 2f64.powi(64))
            .then(|| integer_bytes(value as i128, numeric))
            .flatten()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_bytes(value: f64, numeric: NumericDataType) -> Option<Vec<u8>> {
    match numeric {
        NumericDataType::Float16 => Some(f16::from_f64(value).to_ne_bytes().to_vec()),
        NumericDataType::Float32 => Some((value as f32).to_ne_bytes().to_vec()),
        NumericDataType::Float64 => Some(value.to_ne_bytes().to_vec()),
        _ => None,
    }
}

fn integer_bytes(value: i128, numeric: NumericDataType) -> Option<Vec<u8>> {
    Some(match numeric {
        NumericDataType::Bool => match value {
            0 | 1 => vec![u8::try_from(value).ok()?],
            _ => return None,
        },
        NumericDataType::UInt8 => u8::try_from(value).ok()?.to_ne_bytes().to_vec(),
        NumericDataType::Int8 => i8::try_from(value).ok()?.to_ne_bytes().to_vec(),
        NumericDataType::UInt16 => u16::try_from(value).ok()?.to_ne_bytes().to_vec(),
        NumericDataType::Int16 => i16::try_from(value).ok()?.to_ne_bytes().to_vec(),
        NumericDataType::UInt32 => u32::try_from(value).ok()?.to_ne_bytes().to_vec(),
        NumericDataType::Int32 => i32::try_from(value).ok()?.to_ne_bytes().to_vec(),
        NumericDataType::UInt64 => u64::try_from(value).ok()?.to_ne_bytes().to_vec(),
        NumericDataType::Int64 => i64::try_from(value).ok()?.to_ne_bytes().to_vec(),
        NumericDataType::Float16
        | NumericDataType::Float32
        | NumericDataType::Float64
        | NumericDataType::Complex64
        | NumericDataType::Complex128 => return None,
    })
}

fn string_bytes(string: &str, numeric: NumericDataType) -> Option<Vec<u8>> {
    match string {
        "NaN" => float_bytes(f64::NAN, numeric),
        "Infinity" => float_bytes(f64::INFINITY, numeric),
        "-Infinity" => float_bytes(f64::NEG_INFINITY, numeric),
        "true" if numeric == NumericDataType::Bool => Some(vec![1]),
        "false" if numeric == NumericDataType::Bool => Some(vec![0]),
        _ if string.starts_with("0x") => hex_bytes(string, numeric),
        _ if string.starts_with("0b") => binary_bytes(string, numeric),
        _ if numeric.is_float() => float_bytes(string.parse().ok()?, numeric),
        _ => match string.parse::<i128>() {
            Ok(value) => integer_bytes(value, numeric),
            Err(_) => rounded_integer_bytes(string.parse().ok()?, numeric),
        },
    }
}

/// The bytes of `value` rounded to the nearest integer and clamped to the range of `numeric`.
#[allow(clippy::cast_possible_truncation)]
fn rounded_integer_bytes(value: f64, numeric: NumericDataType) -> Option<Vec<u8>> {
    if value.is_nan() {
        return None;
    }
    let (min, max): (i128, i128) = match numeric {
        NumericDataType::Bool => (0, 1),
        NumericDataType::UInt8 => (0, u8::MAX.into()),
        NumericDataType::Int8 => (i8::MIN.into(), i8::MAX.into()),
        NumericDataType::UInt16 => (0, u16::MAX.into()),
        NumericDataType::Int16 => (i16::MIN.into(), i16::MAX.into()),
        NumericDataType::UInt32 => (0, u32::MAX.into()),
        NumericDataType::Int32 => (i32::MIN.into(), i32::MAX.into()),
        NumericDataType::UInt64 => (0, u64::MAX.into()),
        NumericDataType::Int64 => (i64::MIN.into(), i64::MAX.into()),
        _ => return None,
    };
    integer_bytes((value.round() as i128).clamp(min, max), numeric)
}

fn hex_bytes(string: &str, numeric: NumericDataType) -> Option<Vec<u8>> {
    let digits = string.strip_prefix("0x")?;
    if digits.len() != numeric.size() * 2 {
        return None;
    }
    let mut bytes = (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    if NATIVE_ENDIAN == Endianness::Little {
        for word in bytes.chunks_exact_mut(numeric.swap_unit()) {
            word.reverse();
        }
    }
    Some(bytes)
}

fn binary_bytes(string: &str, numeric: NumericDataType) -> Option<Vec<u8>> {
    let digits = string.strip_prefix("0b")?;
    let value = u64::from_str_radix(digits, 2).ok()?;
    let size = numeric.size();
    if numeric.is_complex() || numeric == NumericDataType::Bool {
        return None;
    }
    if size < 8 && value >> (size * 8) != 0 {
        return None;
    }
    let mut bytes = value.to_le_bytes()[..size].to_vec();
    if NATIVE_ENDIAN == Endianness::Big {
        bytes.reverse();
    }
    Some(bytes)
}

fn read<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N)?.try_into().ok()
}

fn float_value(value: f64) -> Value {
    if value.is_nan() {
        Value::from("NaN")
    } else if value == f64::INFINITY {
        Value::from("Infinity")
    } else if value == f64::NEG_INFINITY {
        Value::from("-Infinity")
    } else {
        Value::from(value)
    }
}

fn numeric_to_metadata(bytes: &[u8], numeric: NumericDataType) -> Option<Value> {
    Some(match numeric {
        NumericDataType::Bool => Value::Bool(*bytes.first()? != 0),
        NumericDataType::UInt8 => Value::from(u8::from_ne_bytes(read(bytes)?)),
        NumericDataType::Int8 => Value::from(i8::from_ne_bytes(read(bytes)?)),
        NumericDataType::UInt16 => Value::from(u16::from_ne_bytes(read(bytes)?)),
        NumericDataType::Int16 => Value::from(i16::from_ne_bytes(read(bytes)?)),
        NumericDataType::UInt32 => Value::from(u32::from_ne_bytes(read(bytes)?)),
        NumericDataType::Int32 => Value::from(i32::from_ne_bytes(read(bytes)?)),
        NumericDataType::UInt64 => Value::from(u64::from_ne_bytes(read(bytes)?)),
        NumericDataType::Int64 => Value::from(i64::from_ne_bytes(read(bytes)?)),
        NumericDataType::Float16 => float_value(f16::from_ne_bytes(read(bytes)?).to_f64()),
        NumericDataType::Float32 => float_value(f64::from(f32::from_ne_bytes(read(bytes)?))),
        NumericDataType::Float64 => float_value(f64::from_ne_bytes(read(bytes)?)),
        NumericDataType::Complex64 | NumericDataType::Complex128 => {
            let component = complex_component(numeric);
            if bytes.len() < numeric.size() {
                return None;
            }
            let (re, im) = bytes.split_at(component.size());
            Value::Array(vec![
                numeric_to_metadata(re, component)?,
                numeric_to_metadata(im, component)?,
            ])
        }
    })
}

fn stored_bytes_from_metadata(value: &Value, layout: &StorageLayout) -> Option<Vec<u8>> {
    let Value::String(string) = unwrap_single(value) else {
        return None;
    };
    let bytes = BASE64_STANDARD.decode(string).ok()?;
    (bytes.len() == layout.storage_size()).then(|| layout.decode_element(&bytes))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::array::{Component, TextWidth};

    fn parse(value: Value, numeric: NumericDataType) -> Option<FillValue> {
        let data_type = ExtendedDataType::from(numeric);
        let layout = StorageLayout::uniform(&data_type, Endianness::Little).unwrap();
        fill_value_from_metadata(&value, &data_type, &layout).unwrap()
    }

    fn invalid(value: Value, numeric: NumericDataType) -> bool {
        let data_type = ExtendedDataType::from(numeric);
        let layout = StorageLayout::uniform(&data_type, Endianness::Little).unwrap();
        fill_value_from_metadata(&value, &data_type, &layout).is_err()
    }

    #[test]
    fn fill_value_numbers() {
        assert!(parse(Value::Null, NumericDataType::UInt8).is_none());
        assert_eq!(parse(json!(3), NumericDataType::UInt8), Some(FillValue::from(3u8)));
        assert_eq!(parse(json!([-3]), NumericDataType::Int16), Some(FillValue::from(-3i16)));
        assert_eq!(parse(json!("-3"), NumericDataType::Int16), Some(FillValue::from(-3i16)));
        assert_eq!(parse(json!(2.0), NumericDataType::Int32), Some(FillValue::from(2i32)));
        assert_eq!(
            parse(json!(u64::MAX), NumericDataType::UInt64),
            Some(FillValue::from(u64::MAX))
        );
        assert_eq!(parse(json!(1.5), NumericDataType::Float32), Some(FillValue::from(1.5f32)));
        assert_eq!(parse(json!(true), NumericDataType::Bool), Some(FillValue::from(true)));
        assert!(invalid(json!(256), NumericDataType::UInt8));
        assert!(invalid(json!(-1), NumericDataType::UInt32));
        assert!(invalid(json!(1.5), NumericDataType::Int32));
        assert!(invalid(json!({}), NumericDataType::Int32));
        assert!(invalid(json!("NaN"), NumericDataType::Int32));
    }

    #[test]
    fn fill_value_numeric_strings() {
        assert_eq!(parse(json!("2.0"), NumericDataType::Int32), Some(FillValue::from(2i32)));
        assert_eq!(parse(json!("1.5"), NumericDataType::Int32), Some(FillValue::from(2i32)));
        assert_eq!(parse(json!("-1.4"), NumericDataType::Int16), Some(FillValue::from(-1i16)));
        assert_eq!(parse(json!("1e3"), NumericDataType::UInt16), Some(FillValue::from(1000u16)));
        assert_eq!(parse(json!("300.5"), NumericDataType::UInt8), Some(FillValue::from(u8::MAX)));
        assert_eq!(parse(json!("-0.5e1"), NumericDataType::UInt32), Some(FillValue::from(0u32)));
        assert_eq!(parse(json!("255"), NumericDataType::UInt8), Some(FillValue::from(255u8)));
        assert!(invalid(json!("abc"), NumericDataType::Int32));
        assert!(invalid(json!("nan"), NumericDataType::Int32));
    }

    #[test]
    fn fill_value_string_zero() {
        for data_type in [
            ExtendedDataType::fixed_string(1, TextWidth::Ucs4),
            ExtendedDataType::fixed_string(3, TextWidth::Ascii),
        ] {
            let layout = StorageLayout::uniform(&data_type, Endianness::Big).unwrap();
            assert!(fill_value_from_metadata(&json!("0"), &data_type, &layout)
                .unwrap()
                .is_none());
        }
        let data_type = ExtendedDataType::fixed_string(1, TextWidth::Ucs4);
        let layout = StorageLayout::uniform(&data_type, Endianness::Little).unwrap();
        assert!(fill_value_from_metadata(&json!("1"), &data_type, &layout).is_err());
    }

    #[test]
    fn fill_value_special_floats() {
        let nan = parse(json!("NaN"), NumericDataType::Float64).unwrap();
        assert!(nan.as_element::<f64>().unwrap().is_nan());
        assert_eq!(
            parse(json!("-Infinity"), NumericDataType::Float32),
            Some(FillValue::from(f32::NEG_INFINITY))
        );
        assert_eq!(
            parse(json!("Infinity"), NumericDataType::Float16),
            Some(FillValue::from(f16::INFINITY))
        );
    }

    #[test]
    fn fill_value_hex_and_binary() {
        assert_eq!(
            parse(json!("0x3FF8000000000000"), NumericDataType::Float64),
            Some(FillValue::from(1.5f64))
        );
        assert_eq!(parse(json!("0x0102"), NumericDataType::UInt16), Some(FillValue::from(0x0102u16)));
        assert!(invalid(json!("0x01"), NumericDataType::UInt16));
        assert!(invalid(json!("0xZZZZ"), NumericDataType::UInt16));
        assert_eq!(parse(json!("0b101"), NumericDataType::Int8), Some(FillValue::from(5i8)));
        assert_eq!(
            parse(json!("0b00111111110000000000000000000000"), NumericDataType::Float32),
            Some(FillValue::from(1.5f32))
        );
        assert!(invalid(json!("0b100000000"), NumericDataType::UInt8));
    }

    #[test]
    fn fill_value_complex() {
        let fill_value = parse(json!([1.0, -2.0]), NumericDataType::Complex64).unwrap();
        assert_eq!(
            fill_value.as_element::<num::complex::Complex32>(),
            Some(num::complex::Complex32::new(1.0, -2.0))
        );
        let fill_value = parse(json!(["NaN", 0]), NumericDataType::Complex128).unwrap();
        let data_type = ExtendedDataType::from(NumericDataType::Complex128);
        let layout = StorageLayout::uniform(&data_type, Endianness::Little).unwrap();
        assert_eq!(
            fill_value_to_metadata(Some(&fill_value), &data_type, &layout),
            json!(["NaN", 0.0])
        );
    }

    #[test]
    fn fill_value_round_trip_metadata() {
        for (value, numeric) in [
            (json!(-7), NumericDataType::Int64),
            (json!(false), NumericDataType::Bool),
            (json!("Infinity"), NumericDataType::Float32),
            (json!(0.25), NumericDataType::Float64),
        ] {
            let data_type = ExtendedDataType::from(numeric);
            let layout = StorageLayout::uniform(&data_type, Endianness::Big).unwrap();
            let fill_value = fill_value_from_metadata(&value, &data_type, &layout).unwrap();
            assert_eq!(
                fill_value_to_metadata(fill_value.as_ref(), &data_type, &layout),
                value
            );
        }
    }

    #[test]
    fn fill_value_compound_base64() {
        let data_type = ExtendedDataType::compound_aligned(
            "",
            vec![
                ("a".to_string(), NumericDataType::UInt8.into()),
                ("b".to_string(), ExtendedDataType::fixed_string(2, TextWidth::Ascii)),
                ("c".to_string(), NumericDataType::UInt16.into()),
            ],
        )
        .unwrap();
        let layout = StorageLayout::uniform(&data_type, Endianness::Little).unwrap();
        assert_eq!(layout.storage_size(), 5);
        // stored bytes [1, b'x', b'y', 2, 0]
        let value = json!(BASE64_STANDARD.encode([1u8, b'x', b'y', 2, 0]));
        let fill_value = fill_value_from_metadata(&value, &data_type, &layout)
            .unwrap()
            .unwrap();
        let ExtendedDataType::Compound(compound) = &data_type else {
            unreachable!()
        };
        let offset_of = |name: &str| {
            compound
                .components()
                .iter()
                .find(|component: &&Component| component.name() == name)
                .unwrap()
                .offset()
        };
        let bytes = fill_value.as_ne_bytes();
        assert_eq!(bytes[offset_of("a")], 1);
        assert_eq!(&bytes[offset_of("b")..offset_of("b") + 2], b"xy");
        assert_eq!(
            &bytes[offset_of("c")..offset_of("c") + 2],
            &2u16.to_ne_bytes()
        );
        assert_eq!(
            fill_value_to_metadata(Some(&fill_value), &data_type, &layout),
            value
        );
        assert!(fill_value_from_metadata(&json!("AAAA"), &data_type, &layout).is_err());
    }
}
