//! Read access to an existing file.
//!
//! [`NcFile::open`] loads the complete catalog once; it is frozen afterwards.
//! Variables are accessed through [`VariableRef`], which resolves index
//! expressions to the cheapest backend primitive and decodes the result.
//!
//! ```no_run
//! use ncfile::{IndexExpr, MemoryBackend, NcFile};
//!
//! # fn main() -> ncfile::NcResult<()> {
//! let file: NcFile<MemoryBackend> = NcFile::open("obs.json")?;
//! let temp = file.variable("temp")?;
//! let first_row = temp.get(&ncfile::nc_index![0usize, ..])?;
//! let everything = temp.get(&IndexExpr::all())?;
//! # Ok(())
//! # }
//! ```

use std::ops::Deref;
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::ArrayD;
use serde_yaml::Value;
use tracing::info;

use crate::attribute::{AttributeValue, Attributes};
use crate::backend::{OpenFlags, StorageBackend};
use crate::catalog::{Catalog, Dimension, Variable};
use crate::codec::Decoded;
use crate::error::{NcError, NcResult};
use crate::index::{AccessPattern, IndexExpr, IndexResolver};
use crate::time::TimeUnits;
use crate::types::TypedArray;

/// A file opened for reading.
#[derive(Debug)]
pub struct NcFile<B: StorageBackend> {
    backend: B,
    catalog: Catalog,
}

impl<B: StorageBackend> NcFile<B> {
    /// Open `path` read-only and load its catalog.
    pub fn open(path: impl AsRef<Path>) -> NcResult<Self> {
        let path = path.as_ref();
        let backend = B::open(path, OpenFlags::read_only())?;
        let file = Self::from_backend(backend)?;
        info!(
            path = %path.display(),
            dimensions = file.catalog.dimensions.len(),
            variables = file.catalog.variables.len(),
            "Opened file for reading"
        );
        Ok(file)
    }

    /// Wrap an already open handle in data mode.
    pub fn from_backend(backend: B) -> NcResult<Self> {
        let catalog = Catalog::load(&backend)?;
        Ok(Self { backend, catalog })
    }

    pub fn close(mut self) -> NcResult<()> {
        self.backend.close()
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.catalog.dimensions
    }

    pub fn variables(&self) -> &[Variable] {
        &self.catalog.variables
    }

    /// Global attributes.
    pub fn attributes(&self) -> &Attributes {
        &self.catalog.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.catalog.attributes.get(name)
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.catalog.dimension(name)
    }

    pub fn has_dimension(&self, name: &str) -> bool {
        self.catalog.dimension(name).is_some()
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.catalog.variable(name).is_some()
    }

    pub fn variable(&self, name: &str) -> NcResult<VariableRef<'_, B>> {
        let var = self
            .catalog
            .variable(name)
            .ok_or_else(|| NcError::UnknownVariable(name.to_string()))?;
        Ok(VariableRef { backend: &self.backend, var })
    }

    /// Decoded values of the coordinate variable of dimension `name`.
    pub fn dimension_values(&self, name: &str) -> NcResult<Decoded> {
        if self.catalog.dimension(name).is_none() {
            return Err(NcError::UnknownDimension {
                variable: name.to_string(),
                dimension: name.to_string(),
            });
        }
        let var = self.variable(name)?;
        if !var.is_coordinate() {
            return Err(NcError::UnknownVariable(format!("{} (coordinate variable)", name)));
        }
        var.materialize()
    }

    /// Schema document reproducing this file's definition.
    pub fn definition(&self) -> Value {
        self.catalog.definition()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

/// Read access to one variable of an open file.
pub struct VariableRef<'a, B: StorageBackend> {
    backend: &'a B,
    var: &'a Variable,
}

impl<B: StorageBackend> Deref for VariableRef<'_, B> {
    type Target = Variable;

    fn deref(&self) -> &Variable {
        self.var
    }
}

impl<B: StorageBackend> VariableRef<'_, B> {
    pub fn resolver(&self) -> IndexResolver {
        IndexResolver::new(self.var.name.clone(), &self.var.shape)
    }

    /// Read and decode the elements selected by `expr`.
    pub fn get(&self, expr: &IndexExpr) -> NcResult<Decoded> {
        let raw = self.get_raw(expr)?;
        Ok(self.decode(&raw))
    }

    /// Read the elements selected by `expr` without decoding.
    pub fn get_raw(&self, expr: &IndexExpr) -> NcResult<TypedArray> {
        let pattern = self.resolver().resolve(expr)?;
        self.fetch(&pattern)
    }

    /// Issue the backend call for an already resolved pattern.
    pub fn fetch(&self, pattern: &AccessPattern) -> NcResult<TypedArray> {
        match pattern {
            AccessPattern::Address { index, .. } | AccessPattern::Point { index } => self.get_var1(index),
            AccessPattern::Flatten => Ok(self.get_var()?.flatten()),
            AccessPattern::All => self.get_var(),
            AccessPattern::Block {
                start,
                count,
                stride,
                compact,
            } => {
                let block = if pattern.is_contiguous() {
                    self.get_vara(start, count)?
                } else {
                    self.get_vars(start, count, stride)?
                };
                if compact.is_empty() {
                    Ok(block)
                } else {
                    Ok(block.remove_axes(compact))
                }
            }
            AccessPattern::Select { mask } => Ok(self.get_var()?.select_mask(mask)),
            AccessPattern::Grid { lists } => Ok(self.get_var()?.select_grid(lists)),
            AccessPattern::MethodCall { method } => Err(NcError::NotAnIndex {
                variable: self.var.name.clone(),
                method: method.clone(),
            }),
        }
    }

    /// Decode raw values with this variable's packing attributes.
    pub fn decode(&self, raw: &TypedArray) -> Decoded {
        self.var.codec().decode(raw)
    }

    /// The whole variable, decoded, for use with array operations.
    pub fn materialize(&self) -> NcResult<Decoded> {
        self.get_var_decoded()
    }

    /// Decode the variable as instants using its `units` attribute.
    pub fn to_time(&self) -> NcResult<ArrayD<Option<DateTime<Utc>>>> {
        let units = self
            .var
            .attributes
            .get(crate::attribute::UNITS)
            .ok_or_else(|| NcError::MissingUnits(self.var.name.clone()))?;
        let units = units.as_text().ok_or_else(|| NcError::InvalidUnitsFormat {
            variable: self.var.name.clone(),
            message: "units is not text".to_string(),
        })?;
        let parsed = TimeUnits::parse(&self.var.name, units)?;
        Ok(parsed.convert(&self.materialize()?))
    }

    // =========================================================================
    // Raw primitives and their decoding twins
    // =========================================================================

    pub fn get_var1(&self, index: &[usize]) -> NcResult<TypedArray> {
        self.backend
            .get_var1(self.var.id, index)
            .map_err(|e| e.with_context(&self.var.name, format!("{:?}", index)))
    }

    pub fn get_var(&self) -> NcResult<TypedArray> {
        self.backend
            .get_var(self.var.id)
            .map_err(|e| e.with_context("variable", &self.var.name))
    }

    pub fn get_vara(&self, start: &[usize], count: &[usize]) -> NcResult<TypedArray> {
        self.backend
            .get_vara(self.var.id, start, count)
            .map_err(|e| e.with_context(&self.var.name, format!("{:?}+{:?}", start, count)))
    }

    pub fn get_vars(&self, start: &[usize], count: &[usize], stride: &[usize]) -> NcResult<TypedArray> {
        self.backend
            .get_vars(self.var.id, start, count, stride)
            .map_err(|e| e.with_context(&self.var.name, format!("{:?}+{:?}x{:?}", start, count, stride)))
    }

    pub fn get_varm(&self, start: &[usize], count: &[usize], stride: &[usize], imap: &[usize]) -> NcResult<TypedArray> {
        self.backend
            .get_varm(self.var.id, start, count, stride, imap)
            .map_err(|e| e.with_context(&self.var.name, format!("imap {:?}", imap)))
    }

    pub fn get_var1_decoded(&self, index: &[usize]) -> NcResult<Decoded> {
        Ok(self.decode(&self.get_var1(index)?))
    }

    pub fn get_var_decoded(&self) -> NcResult<Decoded> {
        Ok(self.decode(&self.get_var()?))
    }

    pub fn get_vara_decoded(&self, start: &[usize], count: &[usize]) -> NcResult<Decoded> {
        Ok(self.decode(&self.get_vara(start, count)?))
    }

    pub fn get_vars_decoded(&self, start: &[usize], count: &[usize], stride: &[usize]) -> NcResult<Decoded> {
        Ok(self.decode(&self.get_vars(start, count, stride)?))
    }

    pub fn get_varm_decoded(
        &self,
        start: &[usize],
        count: &[usize],
        stride: &[usize],
        imap: &[usize],
    ) -> NcResult<Decoded> {
        Ok(self.decode(&self.get_varm(start, count, stride, imap)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{FILL_VALUE, SCALE_FACTOR, UNITS};
    use crate::backend::{AttrTarget, MemoryBackend};
    use crate::index::IndexTerm;
    use crate::nc_index;
    use crate::types::PhysicalType;

    /// `grid(y=2, x=3)` short with fill -1 and scale 0.5, plus `time(time=2)`.
    fn sample() -> NcFile<MemoryBackend> {
        let mut b = MemoryBackend::in_memory();
        let y = b.def_dim("y", 2).unwrap();
        let x = b.def_dim("x", 3).unwrap();
        let t = b.def_dim("time", 2).unwrap();
        let grid = b.def_var("grid", PhysicalType::Short, &[y, x]).unwrap();
        let time = b.def_var("time", PhysicalType::Double, &[t]).unwrap();
        b.put_att(AttrTarget::Var(grid), FILL_VALUE, &AttributeValue::Short(vec![-1]))
            .unwrap();
        b.put_att(AttrTarget::Var(grid), SCALE_FACTOR, &AttributeValue::Double(vec![0.5]))
            .unwrap();
        b.put_att(AttrTarget::Var(time), UNITS, &"hours since 2001-02-03 00:00:00".into())
            .unwrap();
        b.enddef().unwrap();
        b.put_var(grid, &TypedArray::from(vec![0i16, 2, 4, -1, 8, 10]))
            .unwrap();
        b.put_var(time, &TypedArray::from(vec![0.0f64, 6.0])).unwrap();
        NcFile::from_backend(b).unwrap()
    }

    #[test]
    fn test_point_and_address_read() {
        let file = sample();
        let grid = file.variable("grid").unwrap();
        let point = grid.get(&IndexExpr::point(&[1, 2])).unwrap();
        assert_eq!(point.ndim(), 0);
        assert_eq!(point.iter().next(), Some(&Some(5.0)));
        let addr = grid.get(&IndexExpr::Address(4)).unwrap();
        assert_eq!(addr.iter().next(), Some(&Some(4.0)));
    }

    #[test]
    fn test_block_with_scalar_term_is_compacted() {
        let file = sample();
        let grid = file.variable("grid").unwrap();
        let row = grid.get(&nc_index![1usize, ..]).unwrap();
        assert_eq!(row.shape(), &[3]);
        assert_eq!(row.into_raw_vec(), vec![None, Some(4.0), Some(5.0)]);
    }

    #[test]
    fn test_strided_and_raw_access() {
        let file = sample();
        let grid = file.variable("grid").unwrap();
        let expr = IndexExpr::Terms(vec![IndexTerm::Full, IndexTerm::slice(0, 2, 2)]);
        let raw = grid.get_raw(&expr).unwrap();
        assert_eq!(raw.shape(), &[2, 2]);
        assert_eq!(raw.flatten(), TypedArray::from(vec![0i16, 4, -1, 10]));
    }

    #[test]
    fn test_grid_and_mask_selection() {
        let file = sample();
        let grid = file.variable("grid").unwrap();
        let picked = grid
            .get(&IndexExpr::Terms(vec![IndexTerm::List(vec![0, 1]), IndexTerm::List(vec![2])]))
            .unwrap();
        assert_eq!(picked.shape(), &[2, 1]);
        assert_eq!(picked.into_raw_vec(), vec![Some(2.0), Some(5.0)]);

        let mask = ndarray::ArrayD::from_shape_vec(
            ndarray::IxDyn(&[2, 3]),
            vec![true, false, false, false, false, true],
        )
        .unwrap();
        let selected = grid.get(&IndexExpr::Mask(mask)).unwrap();
        assert_eq!(selected.into_raw_vec(), vec![Some(0.0), Some(5.0)]);
    }

    #[test]
    fn test_flatten_and_method_call() {
        let file = sample();
        let grid = file.variable("grid").unwrap();
        assert_eq!(grid.get(&IndexExpr::Flatten).unwrap().shape(), &[6]);
        let err = grid.get(&IndexExpr::Method("sum".into())).unwrap_err();
        assert!(matches!(err, NcError::NotAnIndex { .. }));
        assert_eq!(grid.materialize().unwrap().shape(), &[2, 3]);
    }

    #[test]
    fn test_unknown_variable() {
        let file = sample();
        assert!(matches!(file.variable("nope"), Err(NcError::UnknownVariable(_))));
    }

    #[test]
    fn test_time_and_dimension_values() {
        let file = sample();
        let times = file.variable("time").unwrap().to_time().unwrap().into_raw_vec();
        assert_eq!(times[1].unwrap().to_rfc3339(), "2001-02-03T06:00:00+00:00");
        assert_eq!(
            file.dimension_values("time").unwrap().into_raw_vec(),
            vec![Some(0.0), Some(6.0)]
        );
        assert!(matches!(
            file.variable("grid").unwrap().to_time(),
            Err(NcError::MissingUnits(_))
        ));
        assert!(file.dimension_values("x").is_err());
    }
}
