//! Extended data types.
//!
//! An [`ExtendedDataType`] is a closed union over numeric, string, compound and enumerated types.
//! Equality is structural and recurses into compound components.
//!
//! The in-memory representation of an element is:
//!  - numeric: the native-endian value, complex types being `(re, im)` pairs,
//!  - fixed-width string: `max_length` storage units, `1` byte each for [`TextWidth::Ascii`] (UTF-8 code units)
//!    and `4` native-endian bytes each for [`TextWidth::Ucs4`] (code points), zero padded,
//!  - compound: each component at its byte offset, with any padding left untouched,
//!  - enum: the value of the base integer type.

mod conversion;

pub(crate) use conversion::ValueConverter;
pub use conversion::{decode_fixed_string, encode_fixed_string};

use std::collections::HashSet;

use derive_more::Display;
use thiserror::Error;

/// A numeric data type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
#[rustfmt::skip]
pub enum NumericDataType {
    /// `bool` Boolean, stored as one byte.
    #[display("bool")]
    Bool,
    /// `uint8` Integer in `[0, 2^8-1]`.
    #[display("uint8")]
    UInt8,
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    #[display("int8")]
    Int8,
    /// `uint16` Integer in `[0, 2^16-1]`.
    #[display("uint16")]
    UInt16,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    #[display("int16")]
    Int16,
    /// `uint32` Integer in `[0, 2^32-1]`.
    #[display("uint32")]
    UInt32,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    #[display("int32")]
    Int32,
    /// `uint64` Integer in `[0, 2^64-1]`.
    #[display("uint64")]
    UInt64,
    /// `int64` Integer in `[-2^63, 2^63-1]`.
    #[display("int64")]
    Int64,
    /// `float16` IEEE 754 half-precision floating point.
    #[display("float16")]
    Float16,
    /// `float32` IEEE 754 single-precision floating point.
    #[display("float32")]
    Float32,
    /// `float64` IEEE 754 double-precision floating point.
    #[display("float64")]
    Float64,
    /// `complex64` real and imaginary components are each `float32`.
    #[display("complex64")]
    Complex64,
    /// `complex128` real and imaginary components are each `float64`.
    #[display("complex128")]
    Complex128,
}

impl NumericDataType {
    /// The size of an element in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 | Self::Float16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
        }
    }

    /// The size of the unit swapped when changing byte order. Complex types swap each component.
    #[must_use]
    pub const fn swap_unit(self) -> usize {
        match self {
            Self::Complex64 => 4,
            Self::Complex128 => 8,
            _ => self.size(),
        }
    }

    /// The natural alignment of the type.
    #[must_use]
    pub const fn alignment(self) -> usize {
        self.swap_unit()
    }

    /// Returns true for complex types.
    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// Returns true for integer types (excluding [`NumericDataType::Bool`]).
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::UInt8
                | Self::Int8
                | Self::UInt16
                | Self::Int16
                | Self::UInt32
                | Self::Int32
                | Self::UInt64
                | Self::Int64
        )
    }

    /// Returns true for real floating point types.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Returns true for signed integer types.
    #[must_use]
    pub const fn is_signed_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }
}

/// The subtype of a string data type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum StringSubtype {
    /// Plain text.
    #[default]
    None,
    /// A JSON document.
    Json,
}

/// The storage unit of a fixed-width string.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum TextWidth {
    /// One byte per unit, `S` in a `dtype`.
    #[default]
    Ascii,
    /// One UCS4 code point (four bytes) per unit, `U` in a `dtype`.
    Ucs4,
}

impl TextWidth {
    /// The size in bytes of a storage unit.
    #[must_use]
    pub const fn unit_size(self) -> usize {
        match self {
            Self::Ascii => 1,
            Self::Ucs4 => 4,
        }
    }
}

/// A string data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StringDataType {
    max_length: Option<usize>,
    subtype: StringSubtype,
    width: TextWidth,
}

impl StringDataType {
    /// The maximum length in storage units, or [`None`] for a variable-length string.
    #[must_use]
    pub const fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// The string subtype.
    #[must_use]
    pub const fn subtype(&self) -> StringSubtype {
        self.subtype
    }

    /// The storage unit of a fixed-width string.
    #[must_use]
    pub const fn width(&self) -> TextWidth {
        self.width
    }

    /// The size of an element in bytes, or [`None`] for a variable-length string.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self.max_length {
            Some(max_length) => Some(max_length * self.width.unit_size()),
            None => None,
        }
    }
}

/// A component of a compound data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Component {
    name: String,
    offset: usize,
    data_type: ExtendedDataType,
}

impl Component {
    /// Create a new component.
    #[must_use]
    pub fn new(name: impl Into<String>, offset: usize, data_type: ExtendedDataType) -> Self {
        Self {
            name: name.into(),
            offset,
            data_type,
        }
    }

    /// The component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The byte offset of the component within the compound element.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The component data type.
    #[must_use]
    pub const fn data_type(&self) -> &ExtendedDataType {
        &self.data_type
    }
}

/// A compound data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompoundDataType {
    name: String,
    size: usize,
    components: Vec<Component>,
}

impl CompoundDataType {
    /// The compound type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The size of an element in bytes, including padding.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The ordered components.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }
}

/// A label of an enumerated data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumLabel {
    name: String,
    value: i64,
}

impl EnumLabel {
    /// Create a new label.
    #[must_use]
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// The label name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The label value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.value
    }
}

/// An enumerated data type: an integer base type with named values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumDataType {
    name: String,
    base: NumericDataType,
    labels: Vec<EnumLabel>,
}

impl EnumDataType {
    /// The enumeration name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The integer base type.
    #[must_use]
    pub const fn base(&self) -> NumericDataType {
        self.base
    }

    /// The labels.
    #[must_use]
    pub fn labels(&self) -> &[EnumLabel] {
        &self.labels
    }

    /// Returns the label name of `value`, if any.
    #[must_use]
    pub fn label_of(&self, value: i64) -> Option<&str> {
        self.labels
            .iter()
            .find(|label| label.value == value)
            .map(EnumLabel::name)
    }
}

/// The class of an [`ExtendedDataType`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum DataTypeClass {
    /// A numeric type.
    Numeric,
    /// A string type.
    String,
    /// A compound type.
    Compound,
    /// An enumerated type.
    Enum,
}

/// An extended data type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExtendedDataType {
    /// A numeric type.
    Numeric(NumericDataType),
    /// A string type.
    String(StringDataType),
    /// A compound type.
    Compound(CompoundDataType),
    /// An enumerated type.
    Enum(EnumDataType),
}

/// A data type error.
#[derive(Debug, Error)]
pub enum DataTypeError {
    /// A component lies outside of its compound type.
    #[error("component {name} at offset {offset} with size {size} exceeds the compound size {compound_size}")]
    ComponentOutOfBounds {
        /// The component name.
        name: String,
        /// The component offset.
        offset: usize,
        /// The component size.
        size: usize,
        /// The compound size.
        compound_size: usize,
    },
    /// A compound type has a variable sized component.
    #[error("component {0} does not have a fixed size")]
    VariableSizedComponent(String),
    /// A name is used twice.
    #[error("duplicate name {0}")]
    DuplicateName(String),
    /// An enumeration with a non integer base type.
    #[error("enumeration base type {0} is not an integer type")]
    InvalidEnumBase(NumericDataType),
    /// An enumeration value out of range of its base type.
    #[error("enumeration value {1} of {0} is out of range of its base type")]
    EnumValueOutOfRange(String, i64),
    /// Conversion between two types is not possible.
    #[error("cannot convert from {0} to {1}")]
    IncompatibleDataTypes(String, String),
    /// A variable sized type used where a fixed size is required.
    #[error("data type {0} does not have a fixed size")]
    VariableSize(String),
}

impl From<NumericDataType> for ExtendedDataType {
    fn from(numeric: NumericDataType) -> Self {
        Self::Numeric(numeric)
    }
}

impl ExtendedDataType {
    /// Create a numeric data type.
    #[must_use]
    pub const fn numeric(numeric: NumericDataType) -> Self {
        Self::Numeric(numeric)
    }

    /// Create a string data type of `max_length` single byte units, or variable length if [`None`].
    #[must_use]
    pub const fn string(max_length: Option<usize>, subtype: StringSubtype) -> Self {
        Self::String(StringDataType {
            max_length,
            subtype,
            width: TextWidth::Ascii,
        })
    }

    /// Create a fixed-width string data type of `max_length` units of `width`.
    #[must_use]
    pub const fn fixed_string(max_length: usize, width: TextWidth) -> Self {
        Self::String(StringDataType {
            max_length: Some(max_length),
            subtype: StringSubtype::None,
            width,
        })
    }

    /// Create a compound data type of `size` bytes from components with explicit offsets.
    ///
    /// # Errors
    /// Returns a [`DataTypeError`] if a component is variable sized, extends beyond `size`, or if component names are not unique.
    pub fn compound(
        name: impl Into<String>,
        size: usize,
        components: Vec<Component>,
    ) -> Result<Self, DataTypeError> {
        let mut names = HashSet::new();
        for component in &components {
            if !names.insert(component.name.as_str()) {
                return Err(DataTypeError::DuplicateName(component.name.clone()));
            }
            let component_size = component
                .data_type
                .size()
                .ok_or_else(|| DataTypeError::VariableSizedComponent(component.name.clone()))?;
            if component.offset + component_size > size {
                return Err(DataTypeError::ComponentOutOfBounds {
                    name: component.name.clone(),
                    offset: component.offset,
                    size: component_size,
                    compound_size: size,
                });
            }
        }
        Ok(Self::Compound(CompoundDataType {
            name: name.into(),
            size,
            components,
        }))
    }

    /// Create a compound data type laying out `fields` in order, each aligned to its natural alignment,
    /// with the total size rounded up to the largest alignment.
    ///
    /// # Errors
    /// Returns a [`DataTypeError`] if a field is variable sized or if field names are not unique.
    pub fn compound_aligned(
        name: impl Into<String>,
        fields: Vec<(String, ExtendedDataType)>,
    ) -> Result<Self, DataTypeError> {
        let mut offset = 0usize;
        let mut max_alignment = 1;
        let mut components = Vec::with_capacity(fields.len());
        for (field_name, data_type) in fields {
            let size = data_type
                .size()
                .ok_or_else(|| DataTypeError::VariableSizedComponent(field_name.clone()))?;
            let alignment = data_type.alignment();
            max_alignment = max_alignment.max(alignment);
            offset = offset.next_multiple_of(alignment);
            components.push(Component::new(field_name, offset, data_type));
            offset += size;
        }
        Self::compound(name, offset.next_multiple_of(max_alignment), components)
    }

    /// Create an enumerated data type.
    ///
    /// # Errors
    /// Returns a [`DataTypeError`] if `base` is not an integer type, a label value does not fit in `base`, or label names are not unique.
    pub fn enumeration(
        name: impl Into<String>,
        base: NumericDataType,
        labels: Vec<EnumLabel>,
    ) -> Result<Self, DataTypeError> {
        if !base.is_integer() {
            return Err(DataTypeError::InvalidEnumBase(base));
        }
        let name = name.into();
        let mut names = HashSet::new();
        for label in &labels {
            if !names.insert(label.name.as_str()) {
                return Err(DataTypeError::DuplicateName(label.name.clone()));
            }
            if !conversion::integer_fits(base, label.value) {
                return Err(DataTypeError::EnumValueOutOfRange(name, label.value));
            }
        }
        Ok(Self::Enum(EnumDataType { name, base, labels }))
    }

    /// The class of the data type.
    #[must_use]
    pub const fn class(&self) -> DataTypeClass {
        match self {
            Self::Numeric(_) => DataTypeClass::Numeric,
            Self::String(_) => DataTypeClass::String,
            Self::Compound(_) => DataTypeClass::Compound,
            Self::Enum(_) => DataTypeClass::Enum,
        }
    }

    /// The size of an element in bytes, or [`None`] for a variable-length string.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            Self::Numeric(numeric) => Some(numeric.size()),
            Self::String(string) => string.size(),
            Self::Compound(compound) => Some(compound.size),
            Self::Enum(enumeration) => Some(enumeration.base.size()),
        }
    }

    /// The size of an element in bytes.
    ///
    /// # Errors
    /// Returns [`DataTypeError::VariableSize`] for a variable-length string.
    pub fn fixed_size(&self) -> Result<usize, DataTypeError> {
        self.size()
            .ok_or_else(|| DataTypeError::VariableSize(self.to_string()))
    }

    /// The natural alignment of the type.
    #[must_use]
    pub fn alignment(&self) -> usize {
        match self {
            Self::Numeric(numeric) => numeric.alignment(),
            Self::String(string) => string.width.unit_size(),
            Self::Compound(compound) => compound
                .components
                .iter()
                .map(|component| component.data_type.alignment())
                .max()
                .unwrap_or(1),
            Self::Enum(enumeration) => enumeration.base.alignment(),
        }
    }

    /// The numeric type of a numeric data type or the base of an enumeration.
    #[must_use]
    pub const fn numeric_data_type(&self) -> Option<NumericDataType> {
        match self {
            Self::Numeric(numeric) => Some(*numeric),
            Self::Enum(enumeration) => Some(enumeration.base),
            Self::String(_) | Self::Compound(_) => None,
        }
    }

    /// Returns true if elements of this type can be converted to elements of `other`.
    #[must_use]
    pub fn can_convert_to(&self, other: &ExtendedDataType) -> bool {
        ValueConverter::new(self, other).is_ok()
    }
}

impl std::fmt::Display for ExtendedDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(numeric) => write!(f, "{numeric}"),
            Self::String(StringDataType {
                max_length: None, ..
            }) => write!(f, "string"),
            Self::String(StringDataType {
                max_length: Some(max_length),
                width: TextWidth::Ascii,
                ..
            }) => write!(f, "string({max_length})"),
            Self::String(StringDataType {
                max_length: Some(max_length),
                width: TextWidth::Ucs4,
                ..
            }) => write!(f, "ucs4({max_length})"),
            Self::Compound(compound) => write!(f, "compound {}", compound.name),
            Self::Enum(enumeration) => write!(f, "enum {}", enumeration.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_numeric_sizes() {
        assert_eq!(NumericDataType::Bool.size(), 1);
        assert_eq!(NumericDataType::Float16.size(), 2);
        assert_eq!(NumericDataType::Complex64.size(), 8);
        assert_eq!(NumericDataType::Complex64.swap_unit(), 4);
        assert_eq!(NumericDataType::Complex128.size(), 16);
        assert_eq!(NumericDataType::Int64.to_string(), "int64");
    }

    #[test]
    fn data_type_string() {
        let data_type = ExtendedDataType::string(Some(10), StringSubtype::None);
        assert_eq!(data_type.size(), Some(10));
        let data_type = ExtendedDataType::fixed_string(10, TextWidth::Ucs4);
        assert_eq!(data_type.size(), Some(40));
        assert_eq!(data_type.to_string(), "ucs4(10)");
        let data_type = ExtendedDataType::string(None, StringSubtype::Json);
        assert!(data_type.size().is_none());
        assert!(data_type.fixed_size().is_err());
    }

    #[test]
    fn data_type_compound() {
        let inner = ExtendedDataType::compound_aligned(
            "inner",
            vec![
                ("a".to_string(), NumericDataType::UInt8.into()),
                ("b".to_string(), NumericDataType::Float64.into()),
            ],
        )
        .unwrap();
        let ExtendedDataType::Compound(compound) = &inner else {
            panic!()
        };
        assert_eq!(compound.size(), 16);
        assert_eq!(compound.components()[1].offset(), 8);

        // explicit offsets with padding are authoritative
        let outer = ExtendedDataType::compound(
            "outer",
            40,
            vec![
                Component::new("x", 0, NumericDataType::Int16.into()),
                Component::new("y", 8, inner.clone()),
            ],
        )
        .unwrap();
        assert_eq!(outer.size(), Some(40));
        assert_eq!(outer.alignment(), 8);

        let err = ExtendedDataType::compound(
            "bad",
            8,
            vec![Component::new("y", 0, inner.clone())],
        )
        .unwrap_err();
        assert!(matches!(err, DataTypeError::ComponentOutOfBounds { .. }));
        assert!(ExtendedDataType::compound(
            "dup",
            2,
            vec![
                Component::new("x", 0, NumericDataType::UInt8.into()),
                Component::new("x", 1, NumericDataType::UInt8.into()),
            ],
        )
        .is_err());
        assert!(ExtendedDataType::compound(
            "vlen",
            8,
            vec![Component::new(
                "s",
                0,
                ExtendedDataType::string(None, StringSubtype::None)
            )],
        )
        .is_err());
    }

    #[test]
    fn data_type_structural_equality() {
        let a = ExtendedDataType::compound_aligned(
            "c",
            vec![("x".to_string(), NumericDataType::Int32.into())],
        )
        .unwrap();
        let b = ExtendedDataType::compound("c", 4, vec![Component::new("x", 0, NumericDataType::Int32.into())])
            .unwrap();
        let c = ExtendedDataType::compound("c", 4, vec![Component::new("x", 0, NumericDataType::UInt32.into())])
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn data_type_enum() {
        let data_type = ExtendedDataType::enumeration(
            "cloud",
            NumericDataType::UInt8,
            vec![EnumLabel::new("clear", 0), EnumLabel::new("cloudy", 1)],
        )
        .unwrap();
        assert_eq!(data_type.size(), Some(1));
        assert_eq!(data_type.class(), DataTypeClass::Enum);
        let ExtendedDataType::Enum(enumeration) = &data_type else {
            panic!()
        };
        assert_eq!(enumeration.label_of(1), Some("cloudy"));
        assert!(ExtendedDataType::enumeration("e", NumericDataType::Float32, vec![]).is_err());
        assert!(ExtendedDataType::enumeration(
            "e",
            NumericDataType::UInt8,
            vec![EnumLabel::new("big", 256)]
        )
        .is_err());
    }
}
