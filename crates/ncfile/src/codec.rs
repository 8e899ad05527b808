//! Decoding of stored values into physical values, and its inverse.
//!
//! Decoding runs in a fixed order: `_FillValue` masking, `missing_value`
//! masking, multiplication by `scale_factor`, addition of `add_offset`.
//! Masked elements become `None`, never the raw fill pattern.

use ndarray::ArrayD;
use tracing::warn;

use crate::attribute::{Attributes, ADD_OFFSET, FILL_VALUE, MISSING_VALUE, SCALE_FACTOR};
use crate::error::{NcError, NcResult};
use crate::types::{PhysicalType, TypedArray};

/// Decoded values: `None` marks an undefined (masked) element.
pub type Decoded = ArrayD<Option<f64>>;

/// Packing attributes extracted from a variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueCodec {
    pub fill_value: Option<f64>,
    pub missing_values: Vec<f64>,
    pub scale_factor: Option<f64>,
    pub add_offset: Option<f64>,
}

impl ValueCodec {
    /// Read the reserved attributes. Non-numeric values are ignored.
    pub fn from_attributes(attrs: &Attributes) -> Self {
        Self {
            fill_value: numeric_first(attrs, FILL_VALUE),
            missing_values: attrs
                .get(MISSING_VALUE)
                .and_then(|v| {
                    let values = v.to_f64_vec();
                    if values.is_none() {
                        warn!(attribute = MISSING_VALUE, "Ignoring non-numeric attribute");
                    }
                    values
                })
                .unwrap_or_default(),
            scale_factor: numeric_first(attrs, SCALE_FACTOR),
            add_offset: numeric_first(attrs, ADD_OFFSET),
        }
    }

    /// True when decoding leaves every value unchanged.
    pub fn is_identity(&self) -> bool {
        self.fill_value.is_none()
            && self.missing_values.is_empty()
            && self.scale_factor.is_none()
            && self.add_offset.is_none()
    }

    /// Decode a single stored value.
    pub fn decode_value(&self, raw: f64) -> Option<f64> {
        if let Some(fill) = self.fill_value {
            if same_value(raw, fill) {
                return None;
            }
        }
        if self.missing_values.iter().any(|&mv| same_value(raw, mv)) {
            return None;
        }
        let mut value = raw;
        if let Some(scale) = self.scale_factor {
            value *= scale;
        }
        if let Some(offset) = self.add_offset {
            value += offset;
        }
        Some(value)
    }

    pub fn decode(&self, raw: &TypedArray) -> Decoded {
        raw.to_f64().mapv(|v| self.decode_value(v))
    }

    /// Invert the transform for storage as `ty`.
    ///
    /// Undefined elements become the fill value (declared `_FillValue`, else
    /// the first `missing_value`, else the type's default fill). Integer
    /// targets are rounded to the nearest representable value.
    pub fn encode(&self, values: &Decoded, ty: PhysicalType) -> NcResult<TypedArray> {
        let fill = self
            .fill_value
            .or_else(|| self.missing_values.first().copied())
            .unwrap_or_else(|| ty.default_fill());
        let scale = self.scale_factor.unwrap_or(1.0);
        if scale == 0.0 {
            return Err(NcError::InvalidValue("scale_factor is zero".to_string()));
        }
        let offset = self.add_offset.unwrap_or(0.0);
        let stored = values.mapv(|v| match v {
            Some(x) => {
                let s = (x - offset) / scale;
                if ty.is_integer() {
                    s.round()
                } else {
                    s
                }
            }
            None => fill,
        });
        TypedArray::from_f64(ty, &stored)
    }
}

fn numeric_first(attrs: &Attributes, name: &str) -> Option<f64> {
    let value = attrs.get(name)?;
    let first = value.first_f64();
    if first.is_none() {
        warn!(attribute = name, value = %value, "Ignoring non-numeric attribute");
    }
    first
}

fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeValue;

    fn attrs(items: &[(&str, AttributeValue)]) -> Attributes {
        items.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_fill_masks_before_scale() {
        let codec = ValueCodec::from_attributes(&attrs(&[
            (FILL_VALUE, AttributeValue::Short(vec![-1])),
            (SCALE_FACTOR, AttributeValue::Double(vec![0.5])),
            (ADD_OFFSET, AttributeValue::Double(vec![10.0])),
        ]));
        let raw = TypedArray::from(vec![-1i16, 0, 4]);
        let decoded = codec.decode(&raw);
        assert_eq!(decoded.as_slice().unwrap(), &[None, Some(10.0), Some(12.0)]);
    }

    #[test]
    fn test_missing_value_list() {
        let codec = ValueCodec::from_attributes(&attrs(&[(
            MISSING_VALUE,
            AttributeValue::Int(vec![-999, -998]),
        )]));
        let raw = TypedArray::from(vec![-999i32, 1, -998]);
        let decoded = codec.decode(&raw);
        assert_eq!(decoded.as_slice().unwrap(), &[None, Some(1.0), None]);
    }

    #[test]
    fn test_nan_fill_matches_nan() {
        let codec = ValueCodec::from_attributes(&attrs(&[(
            FILL_VALUE,
            AttributeValue::Float(vec![f32::NAN]),
        )]));
        assert_eq!(codec.decode_value(f64::NAN), None);
        assert_eq!(codec.decode_value(1.0), Some(1.0));
    }

    #[test]
    fn test_identity_without_attributes() {
        let codec = ValueCodec::from_attributes(&Attributes::new());
        assert!(codec.is_identity());
        assert_eq!(codec.decode_value(3.0), Some(3.0));
    }

    #[test]
    fn test_encode_inverts_decode() {
        let codec = ValueCodec {
            fill_value: Some(-32768.0),
            scale_factor: Some(0.01),
            add_offset: Some(273.15),
            ..Default::default()
        };
        let values = ArrayD::from_shape_vec(ndarray::IxDyn(&[3]), vec![Some(273.15), None, Some(274.0)]).unwrap();
        let stored = codec.encode(&values, PhysicalType::Short).unwrap();
        assert_eq!(stored, TypedArray::from(vec![0i16, -32768, 85]));
        let back = codec.decode(&stored).into_raw_vec();
        assert_eq!(back[1], None);
        assert!((back[2].unwrap() - 274.0).abs() <= 0.005 + 1e-9);
    }

    #[test]
    fn test_text_scale_factor_is_ignored() {
        let codec = ValueCodec::from_attributes(&attrs(&[(SCALE_FACTOR, AttributeValue::Text("x".into()))]));
        assert_eq!(codec.scale_factor, None);
    }
}
