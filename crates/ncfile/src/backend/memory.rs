//! In-memory storage engine with optional JSON persistence.
//!
//! Follows the NetCDF primitive semantics closely enough to stand in for the
//! native library: define/data mode checks, unlimited dimensions that grow on
//! write, default fill values for never-written elements and the NetCDF-4
//! requirement for deflate. Failures carry the NetCDF error code name.
//!
//! A backend created or opened with a path and the write flag saves itself as
//! JSON on [`StorageBackend::close`]. Element data is stored as `f64` bit
//! patterns so NaN fills survive the round trip.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AttrTarget, DimId, DimInfo, OpenFlags, StorageBackend, VarId, VarInfo};
use crate::attribute::{AttributeValue, FILL_VALUE};
use crate::error::{NcError, NcResult};
use crate::types::{PhysicalType, TypedArray};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Store {
    dims: Vec<DimEntry>,
    vars: Vec<VarEntry>,
    globals: Vec<(String, StoredAttr)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DimEntry {
    name: String,
    len: usize,
    unlimited: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VarEntry {
    name: String,
    ty: PhysicalType,
    dims: Vec<DimId>,
    attrs: Vec<(String, StoredAttr)>,
    deflate: Option<u32>,
    /// Allocated extent of `data`; elements outside it read as fill
    extent: Vec<usize>,
    #[serde(with = "f64_bits")]
    data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum StoredAttr {
    Text {
        value: String,
    },
    Numeric {
        ty: PhysicalType,
        #[serde(with = "f64_bits")]
        values: Vec<f64>,
    },
}

impl StoredAttr {
    fn from_value(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Text(s) => StoredAttr::Text { value: s.clone() },
            other => StoredAttr::Numeric {
                ty: other.physical_type(),
                values: other.to_f64_vec().unwrap_or_default(),
            },
        }
    }

    fn to_value(&self) -> NcResult<AttributeValue> {
        match self {
            StoredAttr::Text { value } => Ok(AttributeValue::Text(value.clone())),
            StoredAttr::Numeric { ty, values } => AttributeValue::from_numbers(*ty, values),
        }
    }
}

mod f64_bits {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let bits: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
        bits.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let bits = Vec::<u64>::deserialize(deserializer)?;
        Ok(bits.into_iter().map(f64::from_bits).collect())
    }
}

/// NetCDF-style storage held in memory.
#[derive(Debug)]
pub struct MemoryBackend {
    path: Option<PathBuf>,
    flags: OpenFlags,
    store: Store,
    define_mode: bool,
    open: bool,
}

impl MemoryBackend {
    /// A writable, never-persisted file in define mode.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            flags: OpenFlags::writable(),
            store: Store::default(),
            define_mode: true,
            open: true,
        }
    }

    /// Whether the handle is currently in define mode.
    pub fn in_define_mode(&self) -> bool {
        self.define_mode
    }

    /// Deflate level recorded for a variable.
    pub fn deflate_level(&self, var: VarId) -> NcResult<Option<u32>> {
        Ok(self.var(var)?.deflate)
    }

    fn save(&self) -> NcResult<()> {
        if let Some(path) = &self.path {
            let json = serde_json::to_vec(&self.store)?;
            fs::write(path, json)?;
            debug!(path = %path.display(), "Saved file");
        }
        Ok(())
    }

    fn check_open(&self) -> NcResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(NcError::backend("NC_EBADID: file is closed"))
        }
    }

    fn require_define(&self) -> NcResult<()> {
        self.check_open()?;
        if !self.flags.write {
            return Err(NcError::backend("NC_EPERM: file is read-only"));
        }
        if !self.define_mode {
            return Err(NcError::backend("NC_ENOTINDEFINE: operation requires define mode"));
        }
        Ok(())
    }

    fn require_data(&self) -> NcResult<()> {
        self.check_open()?;
        if self.define_mode {
            return Err(NcError::backend("NC_EINDEFINE: operation not allowed in define mode"));
        }
        Ok(())
    }

    fn var(&self, var: VarId) -> NcResult<&VarEntry> {
        self.check_open()?;
        self.store
            .vars
            .get(var)
            .ok_or_else(|| NcError::backend(format!("NC_ENOTVAR: no variable with id {}", var)))
    }

    fn attrs(&self, target: AttrTarget) -> NcResult<&Vec<(String, StoredAttr)>> {
        match target {
            AttrTarget::Global => {
                self.check_open()?;
                Ok(&self.store.globals)
            }
            AttrTarget::Var(id) => Ok(&self.var(id)?.attrs),
        }
    }

    fn attrs_mut(&mut self, target: AttrTarget) -> NcResult<&mut Vec<(String, StoredAttr)>> {
        match target {
            AttrTarget::Global => Ok(&mut self.store.globals),
            AttrTarget::Var(id) => self
                .store
                .vars
                .get_mut(id)
                .map(|v| &mut v.attrs)
                .ok_or_else(|| NcError::backend(format!("NC_ENOTVAR: no variable with id {}", id))),
        }
    }

    /// Fill for never-written elements: `_FillValue` if set, else the type default.
    fn fill_of(entry: &VarEntry) -> f64 {
        entry
            .attrs
            .iter()
            .find(|(name, _)| name == FILL_VALUE)
            .and_then(|(_, attr)| match attr {
                StoredAttr::Numeric { values, .. } => values.first().copied(),
                StoredAttr::Text { .. } => None,
            })
            .unwrap_or_else(|| entry.ty.default_fill())
    }

    fn logical_shape(&self, entry: &VarEntry) -> Vec<usize> {
        entry.dims.iter().map(|&d| self.store.dims[d].len).collect()
    }

    fn check_rank(entry: &VarEntry, start: &[usize], count: &[usize], stride: &[usize]) -> NcResult<()> {
        let rank = entry.dims.len();
        if start.len() != rank || count.len() != rank || stride.len() != rank {
            return Err(NcError::backend(format!(
                "NC_EINVALCOORDS: expected {} coordinates for variable '{}'",
                rank, entry.name
            )));
        }
        if stride.iter().any(|&s| s == 0) {
            return Err(NcError::backend("NC_ESTRIDE: zero stride"));
        }
        Ok(())
    }
}

fn flat_index(coords: &[usize], extent: &[usize]) -> usize {
    coords.iter().zip(extent).fold(0, |acc, (c, e)| acc * e + c)
}

/// One past the last coordinate touched, or `None` if it does not fit in a
/// `usize`.
fn block_end(start: usize, count: usize, stride: usize) -> Option<usize> {
    if count == 0 {
        return Some(0);
    }
    (count - 1)
        .checked_mul(stride)
        .and_then(|span| span.checked_add(start))
        .and_then(|last| last.checked_add(1))
}

fn edge_error(axis: usize, name: &str) -> NcError {
    NcError::backend(format!("NC_EEDGE: block on axis {} of '{}' overflows", axis, name))
}

fn grow(entry: &mut VarEntry, needed: &[usize], fill: f64) {
    let new_extent: Vec<usize> = entry
        .extent
        .iter()
        .zip(needed)
        .map(|(&have, &need)| have.max(need))
        .collect();
    let total: usize = new_extent.iter().product();
    let mut data = vec![fill; total];
    if !entry.data.is_empty() {
        if let Ok(old) = ArrayD::from_shape_vec(IxDyn(&entry.extent), std::mem::take(&mut entry.data)) {
            for (position, value) in old.indexed_iter() {
                data[flat_index(position.slice(), &new_extent)] = *value;
            }
        }
    }
    entry.extent = new_extent;
    entry.data = data;
}

impl StorageBackend for MemoryBackend {
    fn create(path: &Path, flags: OpenFlags) -> NcResult<Self> {
        if path.exists() && !flags.clobber {
            return Err(NcError::backend(format!("NC_EEXIST: {} already exists", path.display())));
        }
        let backend = Self {
            path: Some(path.to_path_buf()),
            flags: OpenFlags { write: true, ..flags },
            store: Store::default(),
            define_mode: true,
            open: true,
        };
        backend.save()?;
        debug!(path = %path.display(), netcdf4 = flags.netcdf4, "Created file");
        Ok(backend)
    }

    fn open(path: &Path, flags: OpenFlags) -> NcResult<Self> {
        let bytes = fs::read(path)?;
        let store: Store = serde_json::from_slice(&bytes)
            .map_err(|e| NcError::backend(format!("NC_ENOTNC: {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), write = flags.write, "Opened file");
        Ok(Self {
            path: Some(path.to_path_buf()),
            flags,
            store,
            define_mode: false,
            open: true,
        })
    }

    fn close(&mut self) -> NcResult<()> {
        self.check_open()?;
        if self.flags.write {
            self.save()?;
        }
        self.define_mode = false;
        self.open = false;
        Ok(())
    }

    fn redef(&mut self) -> NcResult<()> {
        self.check_open()?;
        if !self.flags.write {
            return Err(NcError::backend("NC_EPERM: file is read-only"));
        }
        if self.define_mode {
            return Err(NcError::backend("NC_EINDEFINE: already in define mode"));
        }
        self.define_mode = true;
        Ok(())
    }

    fn enddef(&mut self) -> NcResult<()> {
        self.check_open()?;
        if !self.define_mode {
            return Err(NcError::backend("NC_ENOTINDEFINE: not in define mode"));
        }
        self.define_mode = false;
        Ok(())
    }

    fn ndims(&self) -> NcResult<usize> {
        self.check_open()?;
        Ok(self.store.dims.len())
    }

    fn nvars(&self) -> NcResult<usize> {
        self.check_open()?;
        Ok(self.store.vars.len())
    }

    fn natts(&self, target: AttrTarget) -> NcResult<usize> {
        Ok(self.attrs(target)?.len())
    }

    fn inq_dim(&self, dim: DimId) -> NcResult<DimInfo> {
        self.check_open()?;
        self.store
            .dims
            .get(dim)
            .map(|d| DimInfo {
                name: d.name.clone(),
                len: d.len,
                unlimited: d.unlimited,
            })
            .ok_or_else(|| NcError::backend(format!("NC_EBADDIM: no dimension with id {}", dim)))
    }

    fn inq_dimid(&self, name: &str) -> NcResult<DimId> {
        self.check_open()?;
        self.store
            .dims
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| NcError::backend(format!("NC_EBADDIM: no dimension named '{}'", name)))
    }

    fn inq_var(&self, var: VarId) -> NcResult<VarInfo> {
        let entry = self.var(var)?;
        Ok(VarInfo {
            name: entry.name.clone(),
            ty: entry.ty,
            dims: entry.dims.clone(),
            natts: entry.attrs.len(),
        })
    }

    fn inq_varid(&self, name: &str) -> NcResult<VarId> {
        self.check_open()?;
        self.store
            .vars
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| NcError::backend(format!("NC_ENOTVAR: no variable named '{}'", name)))
    }

    fn inq_attname(&self, target: AttrTarget, index: usize) -> NcResult<String> {
        self.attrs(target)?
            .get(index)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| NcError::backend(format!("NC_ENOTATT: no attribute at index {}", index)))
    }

    fn get_att(&self, target: AttrTarget, name: &str) -> NcResult<AttributeValue> {
        self.attrs(target)?
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| NcError::backend(format!("NC_ENOTATT: no attribute named '{}'", name)))?
            .1
            .to_value()
    }

    fn put_att(&mut self, target: AttrTarget, name: &str, value: &AttributeValue) -> NcResult<()> {
        self.require_define()?;
        if name.is_empty() {
            return Err(NcError::backend("NC_EBADNAME: empty attribute name"));
        }
        let stored = StoredAttr::from_value(value);
        let attrs = self.attrs_mut(target)?;
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = stored,
            None => attrs.push((name.to_string(), stored)),
        }
        Ok(())
    }

    fn def_dim(&mut self, name: &str, len: usize) -> NcResult<DimId> {
        self.require_define()?;
        if name.is_empty() {
            return Err(NcError::backend("NC_EBADNAME: empty dimension name"));
        }
        if self.store.dims.iter().any(|d| d.name == name) {
            return Err(NcError::backend(format!("NC_ENAMEINUSE: dimension '{}' exists", name)));
        }
        let unlimited = len == 0;
        if unlimited && !self.flags.netcdf4 && self.store.dims.iter().any(|d| d.unlimited) {
            return Err(NcError::backend("NC_EUNLIMIT: only one unlimited dimension allowed"));
        }
        self.store.dims.push(DimEntry {
            name: name.to_string(),
            len,
            unlimited,
        });
        Ok(self.store.dims.len() - 1)
    }

    fn def_var(&mut self, name: &str, ty: PhysicalType, dims: &[DimId]) -> NcResult<VarId> {
        self.require_define()?;
        if name.is_empty() {
            return Err(NcError::backend("NC_EBADNAME: empty variable name"));
        }
        if self.store.vars.iter().any(|v| v.name == name) {
            return Err(NcError::backend(format!("NC_ENAMEINUSE: variable '{}' exists", name)));
        }
        if let Some(bad) = dims.iter().find(|&&d| d >= self.store.dims.len()) {
            return Err(NcError::backend(format!("NC_EBADDIM: no dimension with id {}", bad)));
        }
        self.store.vars.push(VarEntry {
            name: name.to_string(),
            ty,
            dims: dims.to_vec(),
            attrs: Vec::new(),
            deflate: None,
            extent: vec![0; dims.len()],
            data: Vec::new(),
        });
        Ok(self.store.vars.len() - 1)
    }

    fn def_var_deflate(&mut self, var: VarId, _shuffle: bool, level: u32) -> NcResult<()> {
        self.require_define()?;
        if !self.flags.netcdf4 {
            return Err(NcError::backend("NC_ENOTNC4: deflate requires NetCDF-4 storage"));
        }
        if level > 9 {
            return Err(NcError::backend(format!("NC_EINVAL: deflate level {} not in 0..=9", level)));
        }
        let entry = self
            .store
            .vars
            .get_mut(var)
            .ok_or_else(|| NcError::backend(format!("NC_ENOTVAR: no variable with id {}", var)))?;
        entry.deflate = Some(level);
        Ok(())
    }

    fn get_vars(&self, var: VarId, start: &[usize], count: &[usize], stride: &[usize]) -> NcResult<TypedArray> {
        self.require_data()?;
        let entry = self.var(var)?;
        Self::check_rank(entry, start, count, stride)?;
        let shape = self.logical_shape(entry);
        for axis in 0..shape.len() {
            let end = block_end(start[axis], count[axis], stride[axis]).ok_or_else(|| edge_error(axis, &entry.name))?;
            if end > shape[axis] {
                return Err(NcError::backend(format!(
                    "NC_EEDGE: read past the end of axis {} of '{}'",
                    axis, entry.name
                )));
            }
        }

        let fill = Self::fill_of(entry);
        let allocated = !entry.data.is_empty();
        let mut coords = vec![0; shape.len()];
        let values = ArrayD::from_shape_fn(IxDyn(count), |position| {
            for (axis, slot) in coords.iter_mut().enumerate() {
                *slot = start[axis] + position[axis] * stride[axis];
            }
            let inside = allocated && coords.iter().zip(&entry.extent).all(|(c, e)| c < e);
            if inside {
                entry.data[flat_index(&coords, &entry.extent)]
            } else {
                fill
            }
        });
        TypedArray::from_f64(entry.ty, &values)
    }

    fn put_vars(
        &mut self,
        var: VarId,
        start: &[usize],
        count: &[usize],
        stride: &[usize],
        value: &TypedArray,
    ) -> NcResult<()> {
        self.require_data()?;
        if !self.flags.write {
            return Err(NcError::backend("NC_EPERM: file is read-only"));
        }
        let entry = self.var(var)?;
        Self::check_rank(entry, start, count, stride)?;
        let expected: usize = count.iter().product();
        if value.len() != expected {
            return Err(NcError::backend(format!(
                "NC_EEDGE: {} values for a block of {} elements",
                value.len(),
                expected
            )));
        }
        let ty = entry.ty;
        let dims = entry.dims.clone();
        let needed = (0..dims.len())
            .map(|axis| block_end(start[axis], count[axis], stride[axis]).ok_or_else(|| edge_error(axis, &entry.name)))
            .collect::<NcResult<Vec<usize>>>()?;
        for (axis, &dim) in dims.iter().enumerate() {
            let dim_entry = &self.store.dims[dim];
            if needed[axis] > dim_entry.len && !dim_entry.unlimited {
                return Err(NcError::backend(format!(
                    "NC_EEDGE: write past the end of dimension '{}'",
                    dim_entry.name
                )));
            }
        }
        let converted = value
            .cast(ty)
            .map_err(|e| NcError::backend(format!("NC_ERANGE: {}", e)))?
            .to_f64();

        // nothing below fails, so the file only changes on success
        for (axis, &dim) in dims.iter().enumerate() {
            let dim_entry = &mut self.store.dims[dim];
            dim_entry.len = dim_entry.len.max(needed[axis]);
        }
        let entry = &mut self.store.vars[var];
        let fill = Self::fill_of(entry);
        let must_grow = entry.data.is_empty() || needed.iter().zip(&entry.extent).any(|(n, e)| n > e);
        if must_grow && expected > 0 {
            grow(entry, &needed, fill);
        }
        let mut coords = vec![0; dims.len()];
        for (k, v) in converted.iter().enumerate() {
            // position within the block, row-major
            let mut rest = k;
            for axis in (0..dims.len()).rev() {
                coords[axis] = start[axis] + (rest % count[axis]) * stride[axis];
                rest /= count[axis];
            }
            let at = flat_index(&coords, &entry.extent);
            entry.data[at] = *v;
        }
        Ok(())
    }
}

impl Drop for MemoryBackend {
    fn drop(&mut self) {
        if self.open && self.flags.write && self.path.is_some() {
            if let Err(e) = self.save() {
                warn!(error = %e, "Failed to save file on drop");
            }
        }
    }
}
