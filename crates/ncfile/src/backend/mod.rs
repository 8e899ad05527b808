//! Storage engine interface and the bundled in-memory engine.

mod memory;

pub use memory::MemoryBackend;

use std::path::Path;

use ndarray::{ArrayD, Dimension, IxDyn};

use crate::attribute::AttributeValue;
use crate::error::{NcError, NcResult};
use crate::types::{PhysicalType, TypedArray};

/// Dimension id within one file.
pub type DimId = usize;

/// Variable id within one file.
pub type VarId = usize;

/// Flags for creating or opening a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Open for writing
    pub write: bool,
    /// Unbuffered access for concurrent readers
    pub share: bool,
    /// NetCDF-4 storage (required for deflate)
    pub netcdf4: bool,
    /// Overwrite an existing file on create
    pub clobber: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self::default()
    }

    pub fn writable() -> Self {
        Self {
            write: true,
            clobber: true,
            ..Self::default()
        }
    }
}

/// Owner of an attribute: the file itself or one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrTarget {
    Global,
    Var(VarId),
}

/// Dimension metadata as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimInfo {
    pub name: String,
    /// Current length; records written so far for unlimited dimensions
    pub len: usize,
    pub unlimited: bool,
}

/// Variable metadata as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarInfo {
    pub name: String,
    pub ty: PhysicalType,
    pub dims: Vec<DimId>,
    pub natts: usize,
}

/// Primitive operations of a NetCDF-style storage engine.
///
/// Every failing primitive returns [`NcError::BackendFailure`]. Data access
/// requires data mode; definitions require define mode.
///
/// The single-element, whole-variable, contiguous and mapped primitives have
/// default implementations in terms of the strided ones.
pub trait StorageBackend {
    /// Create a new file, left in define mode.
    fn create(path: &Path, flags: OpenFlags) -> NcResult<Self>
    where
        Self: Sized;

    /// Open an existing file in data mode.
    fn open(path: &Path, flags: OpenFlags) -> NcResult<Self>
    where
        Self: Sized;

    /// Flush and release the handle. Further calls fail.
    fn close(&mut self) -> NcResult<()>;

    fn redef(&mut self) -> NcResult<()>;

    fn enddef(&mut self) -> NcResult<()>;

    fn ndims(&self) -> NcResult<usize>;

    fn nvars(&self) -> NcResult<usize>;

    fn natts(&self, target: AttrTarget) -> NcResult<usize>;

    fn inq_dim(&self, dim: DimId) -> NcResult<DimInfo>;

    fn inq_dimid(&self, name: &str) -> NcResult<DimId>;

    fn inq_var(&self, var: VarId) -> NcResult<VarInfo>;

    fn inq_varid(&self, name: &str) -> NcResult<VarId>;

    fn inq_attname(&self, target: AttrTarget, index: usize) -> NcResult<String>;

    fn get_att(&self, target: AttrTarget, name: &str) -> NcResult<AttributeValue>;

    fn put_att(&mut self, target: AttrTarget, name: &str, value: &AttributeValue) -> NcResult<()>;

    /// Define a dimension; a length of 0 makes it unlimited.
    fn def_dim(&mut self, name: &str, len: usize) -> NcResult<DimId>;

    fn def_var(&mut self, name: &str, ty: PhysicalType, dims: &[DimId]) -> NcResult<VarId>;

    fn def_var_deflate(&mut self, var: VarId, shuffle: bool, level: u32) -> NcResult<()>;

    /// Read `count` elements per axis starting at `start`, `stride` apart.
    fn get_vars(&self, var: VarId, start: &[usize], count: &[usize], stride: &[usize]) -> NcResult<TypedArray>;

    /// Write `value` (in row-major order) to the strided block.
    fn put_vars(
        &mut self,
        var: VarId,
        start: &[usize],
        count: &[usize],
        stride: &[usize],
        value: &TypedArray,
    ) -> NcResult<()>;

    /// Current shape of a variable.
    fn var_shape(&self, var: VarId) -> NcResult<Vec<usize>> {
        let info = self.inq_var(var)?;
        info.dims
            .iter()
            .map(|&d| self.inq_dim(d).map(|dim| dim.len))
            .collect()
    }

    /// Read a single element as a zero-dimensional array.
    fn get_var1(&self, var: VarId, index: &[usize]) -> NcResult<TypedArray> {
        let ones = vec![1; index.len()];
        self.get_vars(var, index, &ones, &ones)?.reshape(&[])
    }

    fn get_var(&self, var: VarId) -> NcResult<TypedArray> {
        let shape = self.var_shape(var)?;
        let start = vec![0; shape.len()];
        let stride = vec![1; shape.len()];
        self.get_vars(var, &start, &shape, &stride)
    }

    fn get_vara(&self, var: VarId, start: &[usize], count: &[usize]) -> NcResult<TypedArray> {
        let stride = vec![1; start.len()];
        self.get_vars(var, start, count, &stride)
    }

    /// Mapped read.
    ///
    /// Returns the flat memory buffer in which the element at block position
    /// `i` sits at offset `Σ i[k]·imap[k]`.
    fn get_varm(
        &self,
        var: VarId,
        start: &[usize],
        count: &[usize],
        stride: &[usize],
        imap: &[usize],
    ) -> NcResult<TypedArray> {
        check_imap(count, imap)?;
        let block = self.get_vars(var, start, count, stride)?;
        let len = mapped_len(count, imap);
        let mut buffer = vec![0.0; len];
        for (position, value) in block.to_f64().indexed_iter() {
            buffer[mapped_offset(position.slice(), imap)] = *value;
        }
        let buffer = ArrayD::from_shape_vec(IxDyn(&[len]), buffer)
            .map_err(|e| NcError::backend(format!("mapped read: {}", e)))?;
        TypedArray::from_f64(block.physical_type(), &buffer)
    }

    /// Write the whole variable; `value` must match its current shape.
    fn put_var(&mut self, var: VarId, value: &TypedArray) -> NcResult<()> {
        let shape = self.var_shape(var)?;
        let expected: usize = shape.iter().product();
        if value.len() != expected {
            return Err(NcError::backend(format!(
                "NC_EEDGE: {} values for variable of shape {:?}",
                value.len(),
                shape
            )));
        }
        let start = vec![0; shape.len()];
        let stride = vec![1; shape.len()];
        self.put_vars(var, &start, &shape, &stride, value)
    }

    fn put_var1(&mut self, var: VarId, index: &[usize], value: &TypedArray) -> NcResult<()> {
        let ones = vec![1; index.len()];
        self.put_vars(var, index, &ones, &ones, value)
    }

    fn put_vara(&mut self, var: VarId, start: &[usize], count: &[usize], value: &TypedArray) -> NcResult<()> {
        let stride = vec![1; start.len()];
        self.put_vars(var, start, count, &stride, value)
    }

    /// Mapped write; `value` is the flat memory buffer described in
    /// [`StorageBackend::get_varm`].
    fn put_varm(
        &mut self,
        var: VarId,
        start: &[usize],
        count: &[usize],
        stride: &[usize],
        imap: &[usize],
        value: &TypedArray,
    ) -> NcResult<()> {
        check_imap(count, imap)?;
        let flat: Vec<f64> = value.to_f64().iter().copied().collect();
        if flat.len() < mapped_len(count, imap) {
            return Err(NcError::backend(format!(
                "NC_EEDGE: mapped buffer holds {} values, {} needed",
                flat.len(),
                mapped_len(count, imap)
            )));
        }
        let block = ArrayD::from_shape_fn(IxDyn(count), |position| flat[mapped_offset(position.slice(), imap)]);
        let block = TypedArray::from_f64(value.physical_type(), &block)?;
        self.put_vars(var, start, count, stride, &block)
    }
}

fn check_imap(count: &[usize], imap: &[usize]) -> NcResult<()> {
    if count.len() != imap.len() {
        return Err(NcError::backend(format!(
            "NC_EINVAL: imap has {} entries for rank {}",
            imap.len(),
            count.len()
        )));
    }
    Ok(())
}

fn mapped_offset(position: &[usize], imap: &[usize]) -> usize {
    position.iter().zip(imap).map(|(i, m)| i * m).sum()
}

fn mapped_len(count: &[usize], imap: &[usize]) -> usize {
    if count.iter().any(|&c| c == 0) {
        return 0;
    }
    1 + count.iter().zip(imap).map(|(c, m)| (c - 1) * m).sum::<usize>()
}
