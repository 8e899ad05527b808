//! Lossy packing of floating data into narrower signed integers.
//!
//! Two offset conventions are supported and must be chosen explicitly:
//!
//! - [`pack_anchored`]: `add_offset` is the observed minimum and packed
//!   values span `[0, T::MAX]`.
//! - [`pack_centered`]: `add_offset` is the midpoint of the observed range and
//!   packed values span `[-(T::MAX - 1), T::MAX - 1]`.
//!
//! In both, `T::MIN` is reserved as `_FillValue` for masked elements, and
//! `decode(pack(x))` differs from `x` by at most `scale_factor / 2`.

use ndarray::ArrayD;
use tracing::debug;

use crate::attribute::{AttributeValue, Attributes, ADD_OFFSET, FILL_VALUE, SCALE_FACTOR};
use crate::codec::Decoded;
use crate::error::{NcError, NcResult};
use crate::types::{ArrayValue, PhysicalType, TypedArray};

/// Integer types a floating array can be packed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackTarget {
    Byte,
    Short,
    Int,
}

impl PackTarget {
    pub fn physical_type(&self) -> PhysicalType {
        match self {
            PackTarget::Byte => PhysicalType::Byte,
            PackTarget::Short => PhysicalType::Short,
            PackTarget::Int => PhysicalType::Int,
        }
    }

    fn max(&self) -> f64 {
        match self {
            PackTarget::Byte => i8::MAX as f64,
            PackTarget::Short => i16::MAX as f64,
            PackTarget::Int => i32::MAX as f64,
        }
    }

    fn min(&self) -> f64 {
        match self {
            PackTarget::Byte => i8::MIN as f64,
            PackTarget::Short => i16::MIN as f64,
            PackTarget::Int => i32::MIN as f64,
        }
    }
}

impl TryFrom<PhysicalType> for PackTarget {
    type Error = NcError;

    fn try_from(ty: PhysicalType) -> Result<Self, Self::Error> {
        match ty {
            PhysicalType::Byte => Ok(PackTarget::Byte),
            PhysicalType::Short => Ok(PackTarget::Short),
            PhysicalType::Int => Ok(PackTarget::Int),
            other => Err(NcError::InvalidValue(format!("cannot pack into {}", other))),
        }
    }
}

/// Offset convention used when deriving `scale_factor`/`add_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackConvention {
    Anchored,
    Centered,
}

/// Pack with `add_offset = min`.
pub fn pack_anchored(values: &Decoded, target: PackTarget) -> NcResult<ArrayValue> {
    pack(values, target, PackConvention::Anchored)
}

/// Pack with `add_offset` at the midpoint of the range.
pub fn pack_centered(values: &Decoded, target: PackTarget) -> NcResult<ArrayValue> {
    pack(values, target, PackConvention::Centered)
}

/// Pack `values` into `target`. `None` and NaN elements count as masked.
pub fn pack(values: &Decoded, target: PackTarget, convention: PackConvention) -> NcResult<ArrayValue> {
    let (min, max) = values
        .iter()
        .filter_map(|v| v.filter(|x| !x.is_nan()))
        .fold(None, |acc: Option<(f64, f64)>, x| match acc {
            Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            None => Some((x, x)),
        })
        .ok_or_else(|| NcError::InvalidValue("no unmasked elements to pack".to_string()))?;

    let (steps, low, high) = match convention {
        PackConvention::Anchored => (target.max(), 0.0, target.max()),
        PackConvention::Centered => {
            let n = target.max() - 1.0;
            (2.0 * n, -n, n)
        }
    };
    let range = max - min;
    let scale_factor = if range > 0.0 { range / steps } else { 1.0 };
    let add_offset = match convention {
        PackConvention::Anchored => min,
        PackConvention::Centered => min + (target.max() - 1.0) * scale_factor,
    };
    let fill = target.min();

    let mut masked = false;
    let packed: ArrayD<f64> = values.mapv(|v| match v.filter(|x| !x.is_nan()) {
        Some(x) => ((x - add_offset) / scale_factor).round().clamp(low, high),
        None => {
            masked = true;
            fill
        }
    });

    debug!(
        target = %target.physical_type(),
        ?convention,
        scale_factor,
        add_offset,
        masked,
        "Packed floating values"
    );

    let data = TypedArray::from_f64(target.physical_type(), &packed)?;
    let mut attributes = Attributes::new();
    attributes.insert(SCALE_FACTOR, AttributeValue::Double(vec![scale_factor]));
    attributes.insert(ADD_OFFSET, AttributeValue::Double(vec![add_offset]));
    if masked {
        attributes.insert(FILL_VALUE, AttributeValue::from_numbers(target.physical_type(), &[fill])?);
    }
    Ok(ArrayValue::new(data, attributes))
}
