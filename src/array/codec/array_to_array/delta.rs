//! The `delta` filter.
//!
//! The stored bytes of a chunk are read as elements of `dtype`, and each element is replaced by its difference
//! from the previous element, computed in `dtype` and then cast to `astype`. The first element is kept.
//! Integer arithmetic wraps.

use std::sync::Arc;

use half::f16;
use serde::{Deserialize, Serialize};

use crate::{
    array::{
        codec::{BytesToBytesCodecTraits, CodecError, CodecPlugin},
        Endianness, ExtendedDataType, NumericDataType, NATIVE_ENDIAN,
    },
    metadata::{parse_simple_dtype, CodecMetadata},
    plugin::{PluginCreateError, PluginMetadataInvalidError},
};

const IDENTIFIER: &str = "delta";

// Register the codec.
inventory::submit! {
    CodecPlugin::new(IDENTIFIER, is_name_delta, create_codec_delta)
}

fn is_name_delta(name: &str) -> bool {
    name.eq(IDENTIFIER)
}

fn create_codec_delta(
    metadata: &CodecMetadata,
    _element_size: &usize,
) -> Result<Arc<dyn BytesToBytesCodecTraits>, PluginCreateError> {
    let configuration: DeltaCodecConfiguration = metadata.to_configuration().map_err(|_| {
        PluginMetadataInvalidError::new(IDENTIFIER, "codec", metadata.to_string())
    })?;
    Ok(Arc::new(DeltaCodec::new_with_configuration(&configuration)?))
}

/// Configuration parameters for the `delta` codec.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug)]
pub struct DeltaCodecConfiguration {
    /// The numpy type string of the decoded elements, e.g. `<i4`.
    pub dtype: String,
    /// The numpy type string of the encoded differences. Defaults to `dtype`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub astype: Option<String>,
}

/// A numeric type with the byte order of its stored elements.
#[derive(Clone, Debug)]
struct DeltaType {
    dtype: String,
    numeric: NumericDataType,
    endianness: Endianness,
}

impl DeltaType {
    fn new(dtype: &str) -> Result<Self, PluginCreateError> {
        let unsupported = || PluginCreateError::Other(format!("delta dtype {dtype} is not supported"));
        let (data_type, endianness) = parse_simple_dtype(dtype).map_err(|_| unsupported())?;
        let numeric = match data_type {
            ExtendedDataType::Numeric(numeric)
                if numeric.is_integer() || numeric.is_float() =>
            {
                numeric
            }
            _ => return Err(unsupported()),
        };
        Ok(Self {
            dtype: dtype.to_string(),
            numeric,
            endianness: endianness.unwrap_or(NATIVE_ENDIAN),
        })
    }

    fn load(&self, bytes: &[u8]) -> Result<Vec<Scalar>, CodecError> {
        let size = self.numeric.size();
        if bytes.len() % size != 0 {
            return Err(CodecError::Other(format!(
                "the delta codec expects a whole number of {} elements",
                self.dtype
            )));
        }
        Ok(bytes
            .chunks_exact(size)
            .map(|element| {
                let mut element = element.to_vec();
                if !self.endianness.is_native() {
                    element.reverse();
                }
                Scalar::from_ne_bytes(&element, self.numeric)
            })
            .collect())
    }

    fn store(&self, values: &[Scalar]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len() * self.numeric.size());
        for value in values {
            let mut element = value.cast(self.numeric).to_ne_bytes(self.numeric);
            if !self.endianness.is_native() {
                element.reverse();
            }
            bytes.extend(element);
        }
        bytes
    }
}

/// An element value, wide enough for every supported type.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Scalar {
    Int(i128),
    Float(f64),
}

impl Scalar {
    fn from_ne_bytes(bytes: &[u8], numeric: NumericDataType) -> Self {
        fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
            let mut array = [0; N];
            array.copy_from_slice(&bytes[..N]);
            array
        }
        match numeric {
            NumericDataType::UInt8 => Self::Int(u8::from_ne_bytes(array(bytes)).into()),
            NumericDataType::Int8 => Self::Int(i8::from_ne_bytes(array(bytes)).into()),
            NumericDataType::UInt16 => Self::Int(u16::from_ne_bytes(array(bytes)).into()),
            NumericDataType::Int16 => Self::Int(i16::from_ne_bytes(array(bytes)).into()),
            NumericDataType::UInt32 => Self::Int(u32::from_ne_bytes(array(bytes)).into()),
            NumericDataType::Int32 => Self::Int(i32::from_ne_bytes(array(bytes)).into()),
            NumericDataType::UInt64 => Self::Int(u64::from_ne_bytes(array(bytes)).into()),
            NumericDataType::Int64 => Self::Int(i64::from_ne_bytes(array(bytes)).into()),
            NumericDataType::Float16 => Self::Float(f16::from_ne_bytes(array(bytes)).to_f64()),
            NumericDataType::Float32 => Self::Float(f32::from_ne_bytes(array(bytes)).into()),
            _ => Self::Float(f64::from_ne_bytes(array(bytes))),
        }
    }

    /// The value as an element of `numeric`: integers wrap, floats round to the precision of `numeric`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn cast(self, numeric: NumericDataType) -> Self {
        if numeric.is_float() {
            let value = match self {
                Self::Int(value) => value as f64,
                Self::Float(value) => value,
            };
            Self::Float(match numeric {
                NumericDataType::Float16 => f16::from_f64(value).to_f64(),
                NumericDataType::Float32 => f64::from(value as f32),
                _ => value,
            })
        } else {
            let value = match self {
                Self::Int(value) => value,
                Self::Float(value) => value as i128,
            };
            Self::Int(match numeric {
                NumericDataType::UInt8 => (value as u8).into(),
                NumericDataType::Int8 => (value as i8).into(),
                NumericDataType::UInt16 => (value as u16).into(),
                NumericDataType::Int16 => (value as i16).into(),
                NumericDataType::UInt32 => (value as u32).into(),
                NumericDataType::Int32 => (value as i32).into(),
                NumericDataType::UInt64 => (value as u64).into(),
                _ => (value as i64).into(),
            })
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn to_ne_bytes(self, numeric: NumericDataType) -> Vec<u8> {
        match (self, numeric) {
            (Self::Int(value), NumericDataType::UInt8) => (value as u8).to_ne_bytes().to_vec(),
            (Self::Int(value), NumericDataType::Int8) => (value as i8).to_ne_bytes().to_vec(),
            (Self::Int(value), NumericDataType::UInt16) => (value as u16).to_ne_bytes().to_vec(),
            (Self::Int(value), NumericDataType::Int16) => (value as i16).to_ne_bytes().to_vec(),
            (Self::Int(value), NumericDataType::UInt32) => (value as u32).to_ne_bytes().to_vec(),
            (Self::Int(value), NumericDataType::Int32) => (value as i32).to_ne_bytes().to_vec(),
            (Self::Int(value), NumericDataType::UInt64) => (value as u64).to_ne_bytes().to_vec(),
            (Self::Int(value), _) => (value as i64).to_ne_bytes().to_vec(),
            (Self::Float(value), NumericDataType::Float16) => {
                f16::from_f64(value).to_ne_bytes().to_vec()
            }
            (Self::Float(value), NumericDataType::Float32) => {
                (value as f32).to_ne_bytes().to_vec()
            }
            (Self::Float(value), _) => value.to_ne_bytes().to_vec(),
        }
    }

    fn sub(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a.wrapping_sub(b)),
            (Self::Float(a), Self::Float(b)) => Self::Float(a - b),
            _ => self,
        }
    }

    fn add(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Self::Int(a.wrapping_add(b)),
            (Self::Float(a), Self::Float(b)) => Self::Float(a + b),
            _ => self,
        }
    }
}

/// A `delta` codec implementation.
#[derive(Clone, Debug)]
pub struct DeltaCodec {
    dtype: DeltaType,
    astype: DeltaType,
}

impl DeltaCodec {
    /// Create a new `delta` codec from configuration.
    ///
    /// # Errors
    /// Returns [`PluginCreateError`] if `dtype` or `astype` is not an integer or floating point type string.
    pub fn new_with_configuration(
        configuration: &DeltaCodecConfiguration,
    ) -> Result<Self, PluginCreateError> {
        let dtype = DeltaType::new(&configuration.dtype)?;
        let astype = match &configuration.astype {
            Some(astype) => DeltaType::new(astype)?,
            None => dtype.clone(),
        };
        Ok(Self { dtype, astype })
    }
}

impl BytesToBytesCodecTraits for DeltaCodec {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn create_metadata(&self) -> CodecMetadata {
        let configuration = DeltaCodecConfiguration {
            dtype: self.dtype.dtype.clone(),
            astype: Some(self.astype.dtype.clone()),
        };
        CodecMetadata::new_with_serializable_configuration(IDENTIFIER, &configuration)
            .unwrap_or_else(|_| CodecMetadata::new(IDENTIFIER, serde_json::Map::new()))
    }

    fn encode(&self, decoded_value: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        let values = self.dtype.load(&decoded_value)?;
        let mut previous = None;
        let differences: Vec<Scalar> = values
            .iter()
            .map(|value| {
                let difference = match previous {
                    None => *value,
                    Some(previous) => value.sub(previous).cast(self.dtype.numeric),
                };
                previous = Some(*value);
                difference
            })
            .collect();
        Ok(self.astype.store(&differences))
    }

    fn decode(
        &self,
        encoded_value: Vec<u8>,
        _decoded_size: Option<usize>,
    ) -> Result<Vec<u8>, CodecError> {
        let differences = self.astype.load(&encoded_value)?;
        let mut sum: Option<Scalar> = None;
        let values: Vec<Scalar> = differences
            .into_iter()
            .map(|difference| {
                let difference = difference.cast(self.dtype.numeric);
                let value = sum.map_or(difference, |sum| sum.add(difference).cast(self.dtype.numeric));
                sum = Some(value);
                value
            })
            .collect();
        Ok(self.dtype.store(&values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(configuration: &str) -> DeltaCodec {
        DeltaCodec::new_with_configuration(&serde_json::from_str(configuration).unwrap()).unwrap()
    }

    #[test]
    fn codec_delta_wrapping_astype() {
        let codec = codec(r#"{"dtype": "|u1", "astype": "<i2"}"#);
        let encoded = codec.encode(vec![1, 2, 0, 255]).unwrap();
        assert_eq!(encoded, vec![1, 0, 1, 0, 254, 0, 255, 0]);
        assert_eq!(codec.decode(encoded, Some(4)).unwrap(), vec![1, 2, 0, 255]);
    }

    #[test]
    fn codec_delta_big_endian() {
        let codec = codec(r#"{"dtype": ">i2"}"#);
        let encoded = codec.encode(vec![0, 1, 0, 3, 255, 255]).unwrap();
        assert_eq!(encoded, vec![0, 1, 0, 2, 255, 252]);
        assert_eq!(codec.decode(encoded, None).unwrap(), vec![0, 1, 0, 3, 255, 255]);
        assert_eq!(
            codec.create_metadata().to_string(),
            r#"{"id":"delta","dtype":">i2","astype":">i2"}"#
        );
    }

    #[test]
    fn codec_delta_float() {
        let codec = codec(r#"{"dtype": "<f8"}"#);
        let values = [1.5f64, 2.0, -1.0];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let encoded = codec.encode(bytes.clone()).unwrap();
        let differences: Vec<f64> = encoded
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(differences, vec![1.5, 0.5, -3.0]);
        assert_eq!(codec.decode(encoded, None).unwrap(), bytes);
    }

    #[test]
    fn codec_delta_invalid() {
        for configuration in [r#"{"dtype": "|b1"}"#, r#"{"dtype": "<c8"}"#, r#"{"dtype": "<U2"}"#] {
            assert!(DeltaCodec::new_with_configuration(
                &serde_json::from_str(configuration).unwrap()
            )
            .is_err());
        }
        assert!(serde_json::from_str::<DeltaCodecConfiguration>(r#"{}"#).is_err());
        assert!(codec(r#"{"dtype": "<i4"}"#).encode(vec![0; 6]).is_err());
    }
}
