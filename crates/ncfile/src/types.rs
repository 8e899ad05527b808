//! Physical data types and the typed array value exchanged with the backend.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array, ArrayD, Axis, IxDyn};
use num_traits::NumCast;
use serde::{Deserialize, Serialize};

use crate::attribute::Attributes;
use crate::error::{NcError, NcResult};

/// The six physical element types of the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalType {
    /// 8-bit unsigned (`NC_CHAR`)
    Char,
    /// 8-bit signed (`NC_BYTE`)
    Byte,
    /// 16-bit signed (`NC_SHORT`)
    Short,
    /// 32-bit signed (`NC_INT`)
    Int,
    /// 32-bit float (`NC_FLOAT`)
    Float,
    /// 64-bit float (`NC_DOUBLE`)
    Double,
}

impl PhysicalType {
    /// All physical types in declaration order.
    pub const ALL: [PhysicalType; 6] = [
        PhysicalType::Char,
        PhysicalType::Byte,
        PhysicalType::Short,
        PhysicalType::Int,
        PhysicalType::Float,
        PhysicalType::Double,
    ];

    /// Schema/declaration name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            PhysicalType::Char => "char",
            PhysicalType::Byte => "byte",
            PhysicalType::Short => "short",
            PhysicalType::Int => "int",
            PhysicalType::Float => "float",
            PhysicalType::Double => "double",
        }
    }

    /// Look up a type by its schema name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Default fill value used for never-written elements.
    pub fn default_fill(&self) -> f64 {
        match self {
            PhysicalType::Char => 0.0,
            PhysicalType::Byte => -127.0,
            PhysicalType::Short => -32767.0,
            PhysicalType::Int => -2147483647.0,
            PhysicalType::Float => 9.969_209_968_386_869e36_f32 as f64,
            PhysicalType::Double => 9.969_209_968_386_869e36,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, PhysicalType::Float | PhysicalType::Double)
    }
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PhysicalType {
    type Err = NcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| NcError::InvalidType {
            variable: String::new(),
            type_name: s.to_string(),
        })
    }
}

/// A dense array tagged with its physical element type.
///
/// This is the value exchanged with the storage backend by the raw
/// (non-decoding) access paths.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    Char(ArrayD<u8>),
    Byte(ArrayD<i8>),
    Short(ArrayD<i16>),
    Int(ArrayD<i32>),
    Float(ArrayD<f32>),
    Double(ArrayD<f64>),
}

/// Apply the same expression to whichever variant is present.
macro_rules! each_variant {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            TypedArray::Char($arr) => $body,
            TypedArray::Byte($arr) => $body,
            TypedArray::Short($arr) => $body,
            TypedArray::Int($arr) => $body,
            TypedArray::Float($arr) => $body,
            TypedArray::Double($arr) => $body,
        }
    };
}

/// Apply an array-to-array transform, keeping the variant.
macro_rules! map_variant {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            TypedArray::Char($arr) => TypedArray::Char($body),
            TypedArray::Byte($arr) => TypedArray::Byte($body),
            TypedArray::Short($arr) => TypedArray::Short($body),
            TypedArray::Int($arr) => TypedArray::Int($body),
            TypedArray::Float($arr) => TypedArray::Float($body),
            TypedArray::Double($arr) => TypedArray::Double($body),
        }
    };
}

impl TypedArray {
    /// Zero-filled array of the given type and shape.
    pub fn zeros(ty: PhysicalType, shape: &[usize]) -> Self {
        let shape = IxDyn(shape);
        match ty {
            PhysicalType::Char => TypedArray::Char(ArrayD::zeros(shape)),
            PhysicalType::Byte => TypedArray::Byte(ArrayD::zeros(shape)),
            PhysicalType::Short => TypedArray::Short(ArrayD::zeros(shape)),
            PhysicalType::Int => TypedArray::Int(ArrayD::zeros(shape)),
            PhysicalType::Float => TypedArray::Float(ArrayD::zeros(shape)),
            PhysicalType::Double => TypedArray::Double(ArrayD::zeros(shape)),
        }
    }

    pub fn physical_type(&self) -> PhysicalType {
        match self {
            TypedArray::Char(_) => PhysicalType::Char,
            TypedArray::Byte(_) => PhysicalType::Byte,
            TypedArray::Short(_) => PhysicalType::Short,
            TypedArray::Int(_) => PhysicalType::Int,
            TypedArray::Float(_) => PhysicalType::Float,
            TypedArray::Double(_) => PhysicalType::Double,
        }
    }

    pub fn shape(&self) -> &[usize] {
        each_variant!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        each_variant!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen every element to `f64`. Exact for all six types.
    pub fn to_f64(&self) -> ArrayD<f64> {
        each_variant!(self, a => a.mapv(|v| v as f64))
    }

    /// The single element of a one-element array.
    pub fn scalar_f64(&self) -> Option<f64> {
        if self.len() == 1 {
            self.to_f64().iter().next().copied()
        } else {
            None
        }
    }

    /// Convert `f64` values into the given physical type.
    ///
    /// Integer targets truncate toward zero; values outside the target range
    /// (or NaN for integer targets) are rejected.
    pub fn from_f64(ty: PhysicalType, values: &ArrayD<f64>) -> NcResult<Self> {
        Ok(match ty {
            PhysicalType::Char => TypedArray::Char(cast_array(values, ty)?),
            PhysicalType::Byte => TypedArray::Byte(cast_array(values, ty)?),
            PhysicalType::Short => TypedArray::Short(cast_array(values, ty)?),
            PhysicalType::Int => TypedArray::Int(cast_array(values, ty)?),
            PhysicalType::Float => TypedArray::Float(values.mapv(|v| v as f32)),
            PhysicalType::Double => TypedArray::Double(values.clone()),
        })
    }

    /// Convert into another physical type.
    pub fn cast(&self, ty: PhysicalType) -> NcResult<Self> {
        if ty == self.physical_type() {
            return Ok(self.clone());
        }
        Self::from_f64(ty, &self.to_f64())
    }

    /// Reshape keeping row-major element order.
    pub fn reshape(self, shape: &[usize]) -> NcResult<Self> {
        let target = shape.to_vec();
        let expected: usize = target.iter().product();
        if expected != self.len() {
            return Err(NcError::InvalidValue(format!(
                "cannot reshape {} elements into {:?}",
                self.len(),
                target
            )));
        }
        Ok(map_variant!(self, a => {
            let flat: Vec<_> = a.iter().cloned().collect();
            Array::from_shape_vec(IxDyn(&target), flat).map_err(shape_error)?
        }))
    }

    /// Collapse to one dimension in row-major order.
    pub fn flatten(self) -> Self {
        map_variant!(self, a => {
            let flat: Vec<_> = a.iter().cloned().collect();
            Array::from_vec(flat).into_dyn()
        })
    }

    /// Drop the listed axes, each of which must have length 1.
    pub fn remove_axes(self, axes: &[usize]) -> Self {
        let mut axes = axes.to_vec();
        axes.sort_unstable();
        map_variant!(self, a => {
            let mut out = a;
            for &axis in axes.iter().rev() {
                out = out.index_axis_move(Axis(axis), 0);
            }
            out
        })
    }

    /// Keep the elements whose mask entry is `true`, as a 1-D array.
    pub fn select_mask(&self, mask: &ArrayD<bool>) -> Self {
        map_variant!(self, a => {
            let picked: Vec<_> = a
                .iter()
                .zip(mask.iter())
                .filter(|(_, keep)| **keep)
                .map(|(v, _)| *v)
                .collect();
            Array::from_vec(picked).into_dyn()
        })
    }

    /// Outer-product gather: one coordinate list per axis.
    pub fn select_grid(&self, lists: &[Vec<usize>]) -> Self {
        map_variant!(self, a => {
            let mut out = a.clone();
            for (axis, list) in lists.iter().enumerate() {
                out = out.select(Axis(axis), list);
            }
            out
        })
    }
}

/// An array carrying its own attributes, e.g. the output of the packer.
///
/// Writing one through a variable first propagates its attributes onto the
/// variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub data: TypedArray,
    pub attributes: Attributes,
}

impl ArrayValue {
    pub fn new(data: TypedArray, attributes: Attributes) -> Self {
        Self { data, attributes }
    }
}

impl From<TypedArray> for ArrayValue {
    fn from(data: TypedArray) -> Self {
        Self {
            data,
            attributes: Attributes::new(),
        }
    }
}

fn cast_array<T: NumCast + Copy>(values: &ArrayD<f64>, ty: PhysicalType) -> NcResult<ArrayD<T>> {
    let mut out = Vec::with_capacity(values.len());
    for &v in values.iter() {
        let cast = <T as NumCast>::from(v)
            .ok_or_else(|| NcError::InvalidValue(format!("{} is out of range for {}", v, ty)))?;
        out.push(cast);
    }
    Array::from_shape_vec(IxDyn(values.shape()), out).map_err(shape_error)
}

fn shape_error(err: ndarray::ShapeError) -> NcError {
    NcError::InvalidValue(format!("shape mismatch: {}", err))
}

macro_rules! impl_from_array {
    ($t:ty, $variant:ident) => {
        impl From<ArrayD<$t>> for TypedArray {
            fn from(value: ArrayD<$t>) -> Self {
                TypedArray::$variant(value)
            }
        }

        impl From<Vec<$t>> for TypedArray {
            fn from(value: Vec<$t>) -> Self {
                TypedArray::$variant(Array::from_vec(value).into_dyn())
            }
        }

        impl From<ArrayD<$t>> for ArrayValue {
            fn from(value: ArrayD<$t>) -> Self {
                TypedArray::from(value).into()
            }
        }

        impl From<Vec<$t>> for ArrayValue {
            fn from(value: Vec<$t>) -> Self {
                TypedArray::from(value).into()
            }
        }
    };
}

impl_from_array!(u8, Char);
impl_from_array!(i8, Byte);
impl_from_array!(i16, Short);
impl_from_array!(i32, Int);
impl_from_array!(f32, Float);
impl_from_array!(f64, Double);
