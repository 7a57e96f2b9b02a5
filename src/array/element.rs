//! Rust element types of numeric arrays.

use half::f16;
use num::complex::{Complex32, Complex64};

use super::data_type::{ExtendedDataType, NumericDataType};

/// A Rust type matching the in-memory representation of a [`NumericDataType`].
///
/// `bool` is not an [`Element`] as it is not [`bytemuck::Pod`]. Read boolean arrays as [`u8`].
pub trait Element: bytemuck::Pod + Send + Sync {
    /// The numeric data type of the element.
    const DATA_TYPE: NumericDataType;

    /// The extended data type of the element.
    #[must_use]
    fn data_type() -> ExtendedDataType {
        ExtendedDataType::Numeric(Self::DATA_TYPE)
    }
}

macro_rules! impl_element {
    ($type:ty, $data_type:ident) => {
        impl Element for $type {
            const DATA_TYPE: NumericDataType = NumericDataType::$data_type;
        }
    };
}

impl_element!(u8, UInt8);
impl_element!(i8, Int8);
impl_element!(u16, UInt16);
impl_element!(i16, Int16);
impl_element!(u32, UInt32);
impl_element!(i32, Int32);
impl_element!(u64, UInt64);
impl_element!(i64, Int64);
impl_element!(f16, Float16);
impl_element!(f32, Float32);
impl_element!(f64, Float64);
impl_element!(Complex32, Complex64);
impl_element!(Complex64, Complex128);
