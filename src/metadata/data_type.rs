//! `dtype` interpretation.
//!
//! A simple `dtype` is a numpy type string: a byte order character (`<`, `>` or `|`), a kind
//! character and a size in bytes, e.g. `<f8` or `|S10`. A structured `dtype` is a list of
//! `[name, dtype]` pairs which may nest.
//!
//! Enumerated types are not expressible in a `dtype`: their labels are held in the `enums` field
//! of the array metadata, keyed by the `/` separated component path of the enumerated leaf (`""`
//! for an array whose data type is itself an enumeration).

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::array::{
    DataTypeError, Endianness, EnumLabel, ExtendedDataType, NumericDataType, StringSubtype,
    TextWidth,
};

const MAX_DEPTH: usize = 32;

/// A `dtype` error.
#[derive(Debug, Error)]
pub enum DataTypeMetadataError {
    /// An unknown or unsupported type string.
    #[error("Invalid or unsupported format for dtype")]
    Unsupported,
    /// A `dtype` which is neither a type string nor a list of fields.
    #[error("Invalid content for dtype")]
    InvalidContent,
    /// Structured types nested too deeply.
    #[error("Too deep recursion level")]
    TooDeep,
    /// Invalid enumeration labels.
    #[error("invalid enums metadata: {0}")]
    InvalidEnums(String),
    /// An invalid data type.
    #[error(transparent)]
    DataTypeError(#[from] DataTypeError),
}

/// A data type parsed from a `dtype`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedDataType {
    /// The in-memory data type. Structured types are aligned.
    pub data_type: ExtendedDataType,
    /// The byte order of each leaf (numeric or string) of the data type, depth first.
    ///
    /// [`None`] for leaves without a byte order (single bytes and `S` strings).
    pub leaf_endianness: Vec<Option<Endianness>>,
}

/// Interpret a `dtype` and the optional `enums` field.
///
/// # Errors
/// Returns a [`DataTypeMetadataError`] if the `dtype` is invalid or unsupported.
pub fn data_type_from_metadata(
    dtype: &Value,
    enums: Option<&Value>,
) -> Result<ParsedDataType, DataTypeMetadataError> {
    let enums = match enums {
        None => None,
        Some(Value::Object(enums)) => Some(enums),
        Some(_) => {
            return Err(DataTypeMetadataError::InvalidEnums(
                "enums must be an object".to_string(),
            ))
        }
    };
    let mut leaf_endianness = Vec::new();
    let data_type = parse_dtype(dtype, enums, "", 0, &mut leaf_endianness)?;
    Ok(ParsedDataType {
        data_type,
        leaf_endianness,
    })
}

fn parse_dtype(
    dtype: &Value,
    enums: Option<&Map<String, Value>>,
    path: &str,
    depth: usize,
    leaf_endianness: &mut Vec<Option<Endianness>>,
) -> Result<ExtendedDataType, DataTypeMetadataError> {
    if depth > MAX_DEPTH {
        return Err(DataTypeMetadataError::TooDeep);
    }
    match dtype {
        Value::String(dtype) => {
            let (data_type, endianness) = parse_simple_dtype(dtype)?;
            leaf_endianness.push(endianness);
            match (enums.and_then(|enums| enums.get(path)), &data_type) {
                (Some(labels), ExtendedDataType::Numeric(base)) => parse_enum(labels, *base),
                (Some(_), _) => Err(DataTypeMetadataError::InvalidEnums(format!(
                    "{path} is not an integer field"
                ))),
                (None, _) => Ok(data_type),
            }
        }
        Value::Array(fields) => {
            let mut components = Vec::with_capacity(fields.len());
            for field in fields {
                let Value::Array(field) = field else {
                    return Err(DataTypeMetadataError::InvalidContent);
                };
                match field.as_slice() {
                    [Value::String(name), field_dtype] => {
                        let field_path = if path.is_empty() {
                            name.clone()
                        } else {
                            format!("{path}/{name}")
                        };
                        let data_type =
                            parse_dtype(field_dtype, enums, &field_path, depth + 1, leaf_endianness)?;
                        components.push((name.clone(), data_type));
                    }
                    [Value::String(_), _, _] => return Err(DataTypeMetadataError::Unsupported),
                    _ => return Err(DataTypeMetadataError::InvalidContent),
                }
            }
            if components.is_empty() {
                return Err(DataTypeMetadataError::InvalidContent);
            }
            Ok(ExtendedDataType::compound_aligned("", components)?)
        }
        _ => Err(DataTypeMetadataError::InvalidContent),
    }
}

/// Interpret a numpy type string, returning the data type and the byte order of multi-byte elements.
pub(crate) fn parse_simple_dtype(
    dtype: &str,
) -> Result<(ExtendedDataType, Option<Endianness>), DataTypeMetadataError> {
    if dtype == "|O" {
        return Ok((ExtendedDataType::string(None, StringSubtype::None), None));
    }
    let mut chars = dtype.chars();
    let endianness = match chars.next() {
        Some('<') => Some(Endianness::Little),
        Some('>') => Some(Endianness::Big),
        Some('|') => None,
        _ => return Err(DataTypeMetadataError::Unsupported),
    };
    let kind = chars.next().ok_or(DataTypeMetadataError::Unsupported)?;
    let size: usize = chars
        .as_str()
        .parse()
        .map_err(|_| DataTypeMetadataError::Unsupported)?;
    let numeric = match (kind, size) {
        ('b', 1) => NumericDataType::Bool,
        ('u', 1) => NumericDataType::UInt8,
        ('i', 1) => NumericDataType::Int8,
        ('u', 2) => NumericDataType::UInt16,
        ('i', 2) => NumericDataType::Int16,
        ('u', 4) => NumericDataType::UInt32,
        ('i', 4) => NumericDataType::Int32,
        ('u', 8) => NumericDataType::UInt64,
        ('i', 8) => NumericDataType::Int64,
        ('f', 2) => NumericDataType::Float16,
        ('f', 4) => NumericDataType::Float32,
        ('f', 8) => NumericDataType::Float64,
        ('c', 8) => NumericDataType::Complex64,
        ('c', 16) => NumericDataType::Complex128,
        ('S', size) if size > 0 => {
            return Ok((ExtendedDataType::fixed_string(size, TextWidth::Ascii), None));
        }
        ('U', size) if size > 0 => {
            return Ok((
                ExtendedDataType::fixed_string(size, TextWidth::Ucs4),
                endianness,
            ));
        }
        _ => return Err(DataTypeMetadataError::Unsupported),
    };
    let endianness = if numeric.size() == 1 { None } else { endianness };
    Ok((ExtendedDataType::Numeric(numeric), endianness))
}

fn parse_enum(labels: &Value, base: NumericDataType) -> Result<ExtendedDataType, DataTypeMetadataError> {
    let invalid = || DataTypeMetadataError::InvalidEnums(labels.to_string());
    let name = labels
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let labels = labels
        .get("labels")
        .and_then(Value::as_object)
        .ok_or_else(invalid)?
        .iter()
        .map(|(label, value)| {
            value
                .as_i64()
                .map(|value| EnumLabel::new(label.clone(), value))
                .ok_or_else(invalid)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExtendedDataType::enumeration(name, base, labels)?)
}

fn numeric_code(numeric: NumericDataType) -> &'static str {
    match numeric {
        NumericDataType::Bool => "b1",
        NumericDataType::UInt8 => "u1",
        NumericDataType::Int8 => "i1",
        NumericDataType::UInt16 => "u2",
        NumericDataType::Int16 => "i2",
        NumericDataType::UInt32 => "u4",
        NumericDataType::Int32 => "i4",
        NumericDataType::UInt64 => "u8",
        NumericDataType::Int64 => "i8",
        NumericDataType::Float16 => "f2",
        NumericDataType::Float32 => "f4",
        NumericDataType::Float64 => "f8",
        NumericDataType::Complex64 => "c8",
        NumericDataType::Complex128 => "c16",
    }
}

const fn byte_order_char(endianness: Endianness) -> char {
    match endianness {
        Endianness::Little => '<',
        Endianness::Big => '>',
    }
}

/// Create the `dtype` and the optional `enums` field of a data type stored with `endianness`.
///
/// # Errors
/// Returns [`DataTypeMetadataError::TooDeep`] if compound types nest too deeply.
pub fn data_type_to_metadata(
    data_type: &ExtendedDataType,
    endianness: Endianness,
) -> Result<(Value, Option<Value>), DataTypeMetadataError> {
    let mut enums = Map::new();
    let dtype = dtype_of(data_type, endianness, "", 0, &mut enums)?;
    Ok((dtype, (!enums.is_empty()).then_some(Value::Object(enums))))
}

fn dtype_of(
    data_type: &ExtendedDataType,
    endianness: Endianness,
    path: &str,
    depth: usize,
    enums: &mut Map<String, Value>,
) -> Result<Value, DataTypeMetadataError> {
    if depth > MAX_DEPTH {
        return Err(DataTypeMetadataError::TooDeep);
    }
    let numeric_dtype = |numeric: NumericDataType| {
        let byte_order = if numeric.size() == 1 {
            '|'
        } else {
            byte_order_char(endianness)
        };
        Value::String(format!("{byte_order}{}", numeric_code(numeric)))
    };
    Ok(match data_type {
        ExtendedDataType::Numeric(numeric) => numeric_dtype(*numeric),
        ExtendedDataType::String(string) => match (string.max_length(), string.width()) {
            (None, _) => Value::String("|O".to_string()),
            (Some(max_length), TextWidth::Ascii) => Value::String(format!("|S{max_length}")),
            (Some(max_length), TextWidth::Ucs4) => {
                Value::String(format!("{}U{max_length}", byte_order_char(endianness)))
            }
        },
        ExtendedDataType::Enum(enumeration) => {
            let labels: Map<String, Value> = enumeration
                .labels()
                .iter()
                .map(|label| (label.name().to_string(), Value::from(label.value())))
                .collect();
            enums.insert(
                path.to_string(),
                json!({"name": enumeration.name(), "labels": labels}),
            );
            numeric_dtype(enumeration.base())
        }
        ExtendedDataType::Compound(compound) => Value::Array(
            compound
                .components()
                .iter()
                .map(|component| {
                    let component_path = if path.is_empty() {
                        component.name().to_string()
                    } else {
                        format!("{path}/{}", component.name())
                    };
                    let dtype = dtype_of(
                        component.data_type(),
                        endianness,
                        &component_path,
                        depth + 1,
                        enums,
                    )?;
                    Ok(json!([component.name(), dtype]))
                })
                .collect::<Result<Vec<_>, DataTypeMetadataError>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_simple() {
        let parsed = data_type_from_metadata(&json!("<f8"), None).unwrap();
        assert_eq!(parsed.data_type, NumericDataType::Float64.into());
        assert_eq!(parsed.leaf_endianness, vec![Some(Endianness::Little)]);
        let parsed = data_type_from_metadata(&json!(">u1"), None).unwrap();
        assert_eq!(parsed.leaf_endianness, vec![None]);
        let parsed = data_type_from_metadata(&json!("|S7"), None).unwrap();
        assert_eq!(parsed.data_type.size(), Some(7));
        let parsed = data_type_from_metadata(&json!(">U3"), None).unwrap();
        assert_eq!(parsed.data_type.size(), Some(12));
        assert_eq!(parsed.leaf_endianness, vec![Some(Endianness::Big)]);
        let parsed = data_type_from_metadata(&json!("|O"), None).unwrap();
        assert!(parsed.data_type.size().is_none());
    }

    #[test]
    fn dtype_errors() {
        for dtype in [json!("<i3"), json!("i4"), json!("<x4"), json!("<S0")] {
            assert_eq!(
                data_type_from_metadata(&dtype, None).unwrap_err().to_string(),
                "Invalid or unsupported format for dtype"
            );
        }
        for dtype in [json!(1), json!([["a"]]), json!([1]), json!([])] {
            assert_eq!(
                data_type_from_metadata(&dtype, None).unwrap_err().to_string(),
                "Invalid content for dtype"
            );
        }
        let mut dtype = json!("<i4");
        for _ in 0..40 {
            dtype = json!([["x", dtype]]);
        }
        assert_eq!(
            data_type_from_metadata(&dtype, None).unwrap_err().to_string(),
            "Too deep recursion level"
        );
    }

    #[test]
    fn dtype_structured() {
        let dtype = json!([["a", "|u1"], ["b", [["c", ">i2"], ["d", "<f8"]]]]);
        let parsed = data_type_from_metadata(&dtype, None).unwrap();
        // a:0, b aligned to 8: c at 8, d at 16; total 24
        assert_eq!(parsed.data_type.size(), Some(24));
        assert_eq!(
            parsed.leaf_endianness,
            vec![None, Some(Endianness::Big), Some(Endianness::Little)]
        );
        let (dtype_out, enums) =
            data_type_to_metadata(&parsed.data_type, Endianness::Little).unwrap();
        assert_eq!(dtype_out, json!([["a", "|u1"], ["b", [["c", "<i2"], ["d", "<f8"]]]]));
        assert!(enums.is_none());
    }

    #[test]
    fn dtype_enum() {
        let data_type = ExtendedDataType::enumeration(
            "cloud",
            NumericDataType::UInt16,
            vec![EnumLabel::new("clear", 0), EnumLabel::new("cloudy", 1)],
        )
        .unwrap();
        let compound = ExtendedDataType::compound_aligned(
            "",
            vec![("x".to_string(), data_type.clone())],
        )
        .unwrap();
        let (dtype, enums) = data_type_to_metadata(&compound, Endianness::Big).unwrap();
        assert_eq!(dtype, json!([["x", ">u2"]]));
        let enums = enums.unwrap();
        assert_eq!(enums["x"]["labels"]["cloudy"], 1);
        let parsed = data_type_from_metadata(&dtype, Some(&enums)).unwrap();
        assert_eq!(parsed.data_type, compound);
    }
}
