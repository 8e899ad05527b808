//! Write access: schema definition and data writes.
//!
//! A [`FileWriter`] owns the storage handle and the define/data mode of the
//! file. Every schema change runs inside [`transaction`], so callers never
//! toggle modes themselves.
//!
//! ```no_run
//! use ncfile::{nc_index, FileWriter, IndexExpr, MemoryBackend, WriterOptions};
//!
//! # fn main() -> ncfile::NcResult<()> {
//! let mut file: FileWriter<MemoryBackend> = FileWriter::create("out.json", WriterOptions::default())?;
//! file.define_yaml(
//!     r#"
//! dimensions:
//!   x: 4
//! variables:
//!   "float v(x)":
//!     units: m
//! "#,
//! )?;
//! file.variable_mut("v")?.put(&IndexExpr::all(), vec![1.0f32, 2.0, 3.0, 4.0])?;
//! file.variable_mut("v")?.put(&nc_index![2usize], vec![9.5f32])?;
//! file.close()?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, info};

use crate::attribute::{convert_attribute_value, AttributeValue, Attributes};
use crate::backend::{AttrTarget, OpenFlags, StorageBackend};
use crate::catalog::{Catalog, Dimension, Variable};
use crate::codec::Decoded;
use crate::compiler::SchemaCompiler;
use crate::config::WriterOptions;
use crate::error::{NcError, NcResult};
use crate::index::{AccessPattern, IndexExpr, IndexResolver};
use crate::mode::{transaction, DefineState, ModeControl, ModeMachine};
use crate::schema::{parse_declaration, DimLength, Schema, VariableSpec};
use crate::types::{ArrayValue, TypedArray};

/// A file opened for writing.
#[derive(Debug)]
pub struct FileWriter<B: StorageBackend> {
    backend: B,
    mode: ModeMachine,
    catalog: Catalog,
    options: WriterOptions,
    path: Option<PathBuf>,
}

impl<B: StorageBackend> ModeControl for FileWriter<B> {
    fn mode_parts(&mut self) -> (&mut ModeMachine, &mut dyn StorageBackend) {
        (&mut self.mode, &mut self.backend)
    }
}

impl<B: StorageBackend> FileWriter<B> {
    /// Create a new file, replacing any existing one.
    ///
    /// The file starts in define mode and enters data mode after the first
    /// definition.
    pub fn create(path: impl AsRef<Path>, options: WriterOptions) -> NcResult<Self> {
        options.validate().map_err(NcError::InvalidValue)?;
        let path = path.as_ref();
        let backend = B::create(path, options.open_flags())?;
        info!(path = %path.display(), compression = options.compression, "Created file");
        Ok(Self {
            backend,
            mode: ModeMachine::new(DefineState::Define),
            catalog: Catalog::default(),
            options,
            path: Some(path.to_path_buf()),
        })
    }

    /// Reopen an existing file for appending.
    ///
    /// Dimensions and variables already in the file are registered by lookup;
    /// nothing is redefined.
    pub fn open(path: impl AsRef<Path>, options: WriterOptions) -> NcResult<Self> {
        options.validate().map_err(NcError::InvalidValue)?;
        let path = path.as_ref();
        let flags = OpenFlags {
            share: true,
            clobber: false,
            ..options.open_flags()
        };
        let backend = B::open(path, flags)?;
        let catalog = Catalog::load(&backend)?;
        info!(
            path = %path.display(),
            dimensions = catalog.dimensions.len(),
            variables = catalog.variables.len(),
            "Opened file for writing"
        );
        Ok(Self {
            backend,
            mode: ModeMachine::new(DefineState::Data),
            catalog,
            options,
            path: Some(path.to_path_buf()),
        })
    }

    /// Compile a textual schema with the configured external compiler, then
    /// open the produced file for writing.
    pub fn create_from_cdl(path: impl AsRef<Path>, cdl: &str, options: WriterOptions) -> NcResult<Self> {
        options.validate().map_err(NcError::InvalidValue)?;
        let path = path.as_ref();
        SchemaCompiler::new(options.schema_compiler.clone()).compile(cdl, path)?;
        Self::open(path, options)
    }

    /// Wrap a freshly created handle that is still in define mode.
    pub fn from_backend(backend: B, options: WriterOptions) -> Self {
        Self {
            backend,
            mode: ModeMachine::new(DefineState::Define),
            catalog: Catalog::default(),
            options,
            path: None,
        }
    }

    pub fn close(mut self) -> NcResult<()> {
        self.backend.close()?;
        if let Some(path) = &self.path {
            info!(path = %path.display(), "Closed file");
        }
        Ok(())
    }

    /// Give up write access and return the handle, e.g. to read an
    /// in-memory file back.
    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn mode(&self) -> DefineState {
        self.mode.state()
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Schema document reproducing the current definition.
    pub fn definition(&self) -> Value {
        self.catalog.definition()
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.catalog.dimension(name)
    }

    pub fn variable(&self, name: &str) -> NcResult<&Variable> {
        self.catalog
            .variable(name)
            .ok_or_else(|| NcError::UnknownVariable(name.to_string()))
    }

    /// Write handle for variable `name`.
    pub fn variable_mut(&mut self, name: &str) -> NcResult<VariableMut<'_, B>> {
        let index = self
            .catalog
            .variables
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| NcError::UnknownVariable(name.to_string()))?;
        Ok(VariableMut { file: self, index })
    }

    /// Write the whole of variable `name`.
    pub fn put(&mut self, name: &str, value: impl Into<ArrayValue>) -> NcResult<()> {
        self.variable_mut(name)?.put(&IndexExpr::all(), value)
    }

    // =========================================================================
    // Schema definition
    // =========================================================================

    /// Validate and apply a schema document in one define transaction.
    ///
    /// Validation runs inside the transaction; on failure the file still
    /// returns to data mode.
    pub fn define(&mut self, doc: &Value) -> NcResult<()> {
        transaction(self, |file| {
            let schema = Schema::from_value(doc, &file.catalog.dimension_names())?;
            file.apply(&schema)
        })
    }

    pub fn define_yaml(&mut self, yaml: &str) -> NcResult<()> {
        transaction(self, |file| {
            let schema = Schema::from_yaml(yaml, &file.catalog.dimension_names())?;
            file.apply(&schema)
        })
    }

    pub fn define_json(&mut self, doc: &serde_json::Value) -> NcResult<()> {
        transaction(self, |file| {
            let schema = Schema::from_json(doc, &file.catalog.dimension_names())?;
            file.apply(&schema)
        })
    }

    /// Apply an already validated schema.
    pub fn define_schema(&mut self, schema: &Schema) -> NcResult<()> {
        transaction(self, |file| file.apply(schema))
    }

    /// Dimensions first, then variables with their attributes, then global
    /// attributes.
    fn apply(&mut self, schema: &Schema) -> NcResult<()> {
        for (name, len) in &schema.dimensions {
            self.add_dimension(name, *len)?;
        }
        for spec in &schema.variables {
            self.add_variable(spec)?;
        }
        for (name, value) in &schema.attributes {
            self.add_global_attribute(name, value.clone())?;
        }
        Ok(())
    }

    fn add_dimension(&mut self, name: &str, len: DimLength) -> NcResult<Dimension> {
        let id = self
            .backend
            .def_dim(name, len.backend_len())
            .map_err(|e| e.with_context("dimension", name))?;
        let info = self.backend.inq_dim(id)?;
        let dim = Dimension {
            name: info.name,
            len: info.len,
            unlimited: info.unlimited,
            id,
        };
        debug!(dimension = name, len = ?len, "Defined dimension");
        self.catalog.dimensions.push(dim.clone());
        Ok(dim)
    }

    fn add_variable(&mut self, spec: &VariableSpec) -> NcResult<Variable> {
        let dim_ids = spec
            .dims
            .iter()
            .map(|d| {
                self.catalog.dimension(d).map(|dim| dim.id).ok_or_else(|| NcError::UnknownDimension {
                    variable: spec.name.clone(),
                    dimension: d.clone(),
                })
            })
            .collect::<NcResult<Vec<_>>>()?;

        let id = self
            .backend
            .def_var(&spec.name, spec.ty, &dim_ids)
            .map_err(|e| e.with_context("variable", &spec.name))?;
        if self.options.compression > 0 {
            self.backend
                .def_var_deflate(id, true, self.options.compression)
                .map_err(|e| e.with_context("variable", &spec.name))?;
        }

        let mut attributes = Attributes::new();
        for (name, value) in &spec.attributes {
            self.backend
                .put_att(AttrTarget::Var(id), name, value)
                .map_err(|e| e.with_context(&format!("{}:{}", spec.name, name), format!("{:?}", value)))?;
            attributes.insert(name.clone(), value.clone());
        }

        let var = self
            .catalog
            .variable_from_parts(&spec.name, spec.ty, &dim_ids, attributes, id)?;
        debug!(variable = %var.declaration(), "Defined variable");
        self.catalog.variables.push(var.clone());
        Ok(var)
    }

    fn add_global_attribute(&mut self, name: &str, value: AttributeValue) -> NcResult<()> {
        self.backend
            .put_att(AttrTarget::Global, name, &value)
            .map_err(|e| e.with_context(name, format!("{:?}", value)))?;
        self.catalog.attributes.insert(name, value);
        Ok(())
    }

    // =========================================================================
    // Incremental definition
    // =========================================================================

    /// Define one dimension.
    pub fn new_dimension(&mut self, name: &str, len: DimLength) -> NcResult<Dimension> {
        transaction(self, |file| file.add_dimension(name, len))
    }

    /// Define one variable from an inline declaration such as
    /// `"float temp(time, x)"`.
    pub fn new_variable(&mut self, declaration: &str) -> NcResult<Variable> {
        let parsed = parse_declaration(declaration).ok_or_else(|| NcError::InvalidDeclaration(declaration.to_string()))?;
        let spec = VariableSpec {
            name: parsed.name,
            ty: parsed.ty,
            dims: parsed.dims.unwrap_or_default(),
            attributes: Vec::new(),
        };
        transaction(self, |file| file.add_variable(&spec))
    }

    /// Set an attribute by path: `"var:att"` for a variable attribute,
    /// `":att"` or `"att"` for a global one.
    pub fn new_attribute(&mut self, path: &str, value: AttributeValue) -> NcResult<()> {
        match split_attribute_path(path) {
            (Some(var), name) => self.variable_mut(var)?.update_attribute(name, value),
            (None, name) => {
                if self.catalog.attributes.get(name) == Some(&value) {
                    return Ok(());
                }
                transaction(self, |file| file.add_global_attribute(name, value))
            }
        }
    }

    /// Like [`FileWriter::new_attribute`], converting a schema value first.
    pub fn new_attribute_value(&mut self, path: &str, value: &Value) -> NcResult<()> {
        let (_, name) = split_attribute_path(path);
        let converted = convert_attribute_value(name, value)?;
        self.new_attribute(path, converted)
    }

    /// Look up an attribute by path, as accepted by
    /// [`FileWriter::new_attribute`].
    pub fn attribute(&self, path: &str) -> Option<&AttributeValue> {
        match split_attribute_path(path) {
            (Some(var), name) => self.catalog.variable(var)?.attributes.get(name),
            (None, name) => self.catalog.attributes.get(name),
        }
    }
}

fn split_attribute_path(path: &str) -> (Option<&str>, &str) {
    match path.split_once(':') {
        Some(("", name)) => (None, name),
        Some((var, name)) => (Some(var), name),
        None => (None, path),
    }
}

/// Write access to one variable of a [`FileWriter`].
pub struct VariableMut<'a, B: StorageBackend> {
    file: &'a mut FileWriter<B>,
    index: usize,
}

impl<B: StorageBackend> VariableMut<'_, B> {
    pub fn variable(&self) -> &Variable {
        &self.file.catalog.variables[self.index]
    }

    pub fn name(&self) -> &str {
        &self.variable().name
    }

    /// Set a variable attribute. Unchanged values are not rewritten.
    pub fn update_attribute(&mut self, name: &str, value: AttributeValue) -> NcResult<()> {
        if self.variable().attributes.get(name) == Some(&value) {
            return Ok(());
        }
        let index = self.index;
        transaction(&mut *self.file, |file| {
            let var = &mut file.catalog.variables[index];
            let label = format!("{}:{}", var.name, name);
            file.backend
                .put_att(AttrTarget::Var(var.id), name, &value)
                .map_err(|e| e.with_context(&label, format!("{:?}", value)))?;
            var.attributes.insert(name, value);
            Ok(())
        })
    }

    /// A zero-filled array of this variable's type and current shape,
    /// carrying its attributes.
    pub fn template(&self) -> ArrayValue {
        let var = self.variable();
        ArrayValue::new(TypedArray::zeros(var.ty, &var.shape), var.attributes.clone())
    }

    /// Resolver over the current stored shape; unlimited axes may grow.
    pub fn resolver(&self) -> NcResult<IndexResolver> {
        let var = self.variable();
        let shape = self.file.backend.var_shape(var.id)?;
        Ok(IndexResolver::new(var.name.clone(), &shape).with_growable(&var.unlimited))
    }

    /// Write `value` to the elements selected by `expr`.
    ///
    /// Attributes carried by the value are set on the variable first.
    pub fn put(&mut self, expr: &IndexExpr, value: impl Into<ArrayValue>) -> NcResult<()> {
        let value = value.into();
        for (name, attr) in value.attributes.iter() {
            self.update_attribute(name, attr.clone())?;
        }
        let pattern = self.resolver()?.resolve(expr)?;
        self.store(&pattern, &value.data)
    }

    /// Encode `values` with this variable's packing attributes and write them.
    pub fn put_decoded(&mut self, expr: &IndexExpr, values: &Decoded) -> NcResult<()> {
        let var = self.variable();
        let encoded = var.codec().encode(values, var.ty)?;
        self.put(expr, encoded)
    }

    /// Issue the backend call for an already resolved pattern.
    pub fn store(&mut self, pattern: &AccessPattern, data: &TypedArray) -> NcResult<()> {
        match pattern {
            AccessPattern::Address { index, .. } | AccessPattern::Point { index } => self.put_var1(index, data),
            AccessPattern::Flatten => self.put_var(data),
            AccessPattern::All => {
                let rank = self.variable().rank();
                if rank > 0 && data.ndim() == rank {
                    self.put_vara(&vec![0; rank], data.shape(), data)
                } else {
                    self.put_var(data)
                }
            }
            AccessPattern::Block { start, count, stride, .. } => {
                if pattern.is_contiguous() {
                    self.put_vara(start, count, data)
                } else {
                    self.put_vars(start, count, stride, data)
                }
            }
            AccessPattern::Select { .. } | AccessPattern::Grid { .. } => Err(NcError::invalid_index(
                self.name(),
                "masks and index lists cannot be written",
            )),
            AccessPattern::MethodCall { method } => Err(NcError::NotAnIndex {
                variable: self.name().to_string(),
                method: method.clone(),
            }),
        }
    }

    // =========================================================================
    // Raw primitives
    // =========================================================================

    pub fn put_var1(&mut self, index: &[usize], value: &TypedArray) -> NcResult<()> {
        self.write(format!("{:?}", index), |backend, id| backend.put_var1(id, index, value))
    }

    pub fn put_var(&mut self, value: &TypedArray) -> NcResult<()> {
        self.write("whole variable".to_string(), |backend, id| backend.put_var(id, value))
    }

    pub fn put_vara(&mut self, start: &[usize], count: &[usize], value: &TypedArray) -> NcResult<()> {
        self.write(format!("{:?}+{:?}", start, count), |backend, id| {
            backend.put_vara(id, start, count, value)
        })
    }

    pub fn put_vars(&mut self, start: &[usize], count: &[usize], stride: &[usize], value: &TypedArray) -> NcResult<()> {
        self.write(format!("{:?}+{:?}x{:?}", start, count, stride), |backend, id| {
            backend.put_vars(id, start, count, stride, value)
        })
    }

    pub fn put_varm(
        &mut self,
        start: &[usize],
        count: &[usize],
        stride: &[usize],
        imap: &[usize],
        value: &TypedArray,
    ) -> NcResult<()> {
        self.write(format!("imap {:?}", imap), |backend, id| {
            backend.put_varm(id, start, count, stride, imap, value)
        })
    }

    fn write(&mut self, at: String, op: impl FnOnce(&mut B, usize) -> NcResult<()>) -> NcResult<()> {
        let file = &mut *self.file;
        let var = &file.catalog.variables[self.index];
        file.mode.require_data(&format!("writing {}", var.name))?;
        op(&mut file.backend, var.id).map_err(|e| e.with_context(&var.name, at))?;
        if var.unlimited.iter().any(|&u| u) {
            file.catalog.refresh_lengths(&file.backend)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{FILL_VALUE, SCALE_FACTOR};
    use crate::backend::MemoryBackend;
    use crate::index::IndexTerm;
    use crate::nc_index;
    use crate::types::PhysicalType;
    use ndarray::{arr1, ArrayD, IxDyn};

    fn writer() -> FileWriter<MemoryBackend> {
        FileWriter::from_backend(MemoryBackend::in_memory(), WriterOptions::default())
    }

    fn stored(file: &FileWriter<MemoryBackend>, name: &str) -> Vec<f64> {
        let id = file.variable(name).unwrap().id;
        file.backend().get_var(id).unwrap().to_f64().into_raw_vec()
    }

    #[test]
    fn test_define_enters_data_mode() {
        let mut file = writer();
        assert_eq!(file.mode(), DefineState::Define);
        file.define_yaml("dimensions:\n  x: 4\nvariables:\n  \"float v(x)\": {}\n")
            .unwrap();
        assert_eq!(file.mode(), DefineState::Data);
        assert!(!file.backend().in_define_mode());
        assert_eq!(file.variable("v").unwrap().shape, vec![4]);
    }

    #[test]
    fn test_failed_definition_restores_data_mode() {
        let mut file = writer();
        file.define_yaml("dimensions:\n  x: 2\n").unwrap();
        let err = file
            .define_yaml("variables:\n  \"int n(y)\": {}\n")
            .unwrap_err();
        assert!(matches!(err, NcError::UnknownDimension { .. }));
        assert_eq!(file.mode(), DefineState::Data);
        assert!(!file.backend().in_define_mode());
    }

    #[test]
    fn test_known_dimensions_are_accepted_later() {
        let mut file = writer();
        file.define_yaml("dimensions:\n  x: 3\n").unwrap();
        file.define_yaml("variables:\n  \"double d(x)\": {}\n").unwrap();
        assert_eq!(file.variable("d").unwrap().dims, vec!["x"]);
    }

    #[test]
    fn test_put_whole_and_point() {
        let mut file = writer();
        file.define_yaml("dimensions:\n  x: 4\nvariables:\n  \"float v(x)\": {}\n")
            .unwrap();
        file.put("v", vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        file.variable_mut("v").unwrap().put(&nc_index![2usize], vec![9.5f32]).unwrap();
        assert_eq!(stored(&file, "v"), vec![1.0, 2.0, 9.5, 4.0]);
    }

    #[test]
    fn test_put_strided_block() {
        let mut file = writer();
        file.define_yaml("dimensions:\n  x: 6\nvariables:\n  \"int n(x)\": {}\n")
            .unwrap();
        let expr = IndexExpr::Terms(vec![IndexTerm::slice(1, 3, 2)]);
        file.variable_mut("n").unwrap().put(&expr, vec![7i32, 8, 9]).unwrap();
        assert_eq!(stored(&file, "n"), vec![-2147483647.0, 7.0, -2147483647.0, 8.0, -2147483647.0, 9.0]);
    }

    #[test]
    fn test_put_grows_unlimited_dimension() {
        let mut file = writer();
        file.define_yaml("dimensions:\n  time: unlimited\nvariables:\n  \"double t(time)\": {}\n")
            .unwrap();
        assert_eq!(file.dimension("time").unwrap().len, 0);
        let mut var = file.variable_mut("t").unwrap();
        var.put(&nc_index![0usize..3], vec![0.0, 1.0, 2.0]).unwrap();
        var.put(&nc_index![3usize], vec![3.0]).unwrap();
        assert_eq!(file.dimension("time").unwrap().len, 4);
        assert_eq!(file.variable("t").unwrap().shape, vec![4]);
    }

    #[test]
    fn test_out_of_range_write_does_not_add_records() {
        let mut file = writer();
        file.define_yaml("dimensions:\n  time: unlimited\nvariables:\n  \"byte b(time)\": {}\n")
            .unwrap();
        let err = file
            .variable_mut("b")
            .unwrap()
            .put(&IndexExpr::point(&[4]), vec![300i32])
            .unwrap_err();
        assert!(matches!(err, NcError::BackendFailure(_)));
        assert_eq!(file.dimension("time").unwrap().len, 0);
        let id = file.variable("b").unwrap().id;
        assert_eq!(file.backend().var_shape(id).unwrap(), vec![0]);
    }

    #[test]
    fn test_put_with_multidimensional_value() {
        let mut file = writer();
        file.define_yaml("dimensions:\n  time: unlimited\n  x: 2\nvariables:\n  \"short s(time, x)\": {}\n")
            .unwrap();
        let block = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1i16, 2, 3, 4]).unwrap();
        file.put("s", block).unwrap();
        assert_eq!(file.variable("s").unwrap().shape, vec![2, 2]);
        assert_eq!(stored(&file, "s"), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_put_propagates_attributes() {
        let mut file = writer();
        file.define_yaml("dimensions:\n  x: 2\nvariables:\n  \"short p(x)\": {}\n")
            .unwrap();
        let mut attributes = Attributes::new();
        attributes.insert(SCALE_FACTOR, AttributeValue::Double(vec![0.5]));
        let value = ArrayValue::new(TypedArray::from(vec![2i16, 4]), attributes);
        file.put("p", value).unwrap();
        assert_eq!(
            file.attribute("p:scale_factor"),
            Some(&AttributeValue::Double(vec![0.5]))
        );
        let id = file.variable("p").unwrap().id;
        assert_eq!(
            file.backend().get_att(AttrTarget::Var(id), SCALE_FACTOR).unwrap(),
            AttributeValue::Double(vec![0.5])
        );
    }

    #[test]
    fn test_put_decoded_encodes_missing_as_fill() {
        let mut file = writer();
        file.define_yaml(
            "dimensions:\n  x: 3\nvariables:\n  \"short p(x)\":\n    scale_factor: {double: 0.5}\n    _FillValue: {short: -1}\n",
        )
        .unwrap();
        let values = arr1(&[Some(1.0), None, Some(2.5)]).into_dyn();
        file.variable_mut("p").unwrap().put_decoded(&IndexExpr::all(), &values).unwrap();
        assert_eq!(stored(&file, "p"), vec![2.0, -1.0, 5.0]);
    }

    #[test]
    fn test_incremental_definition() {
        let mut file = writer();
        file.new_dimension("x", DimLength::Fixed(2)).unwrap();
        let var = file.new_variable("int count(x)").unwrap();
        assert_eq!(var.ty, PhysicalType::Int);
        file.new_attribute("count:_FillValue", AttributeValue::Int(vec![-9])).unwrap();
        file.new_attribute(":title", AttributeValue::Text("demo".into())).unwrap();
        file.new_attribute_value("history", &Value::String("1s".into())).unwrap();

        assert_eq!(file.attribute("count:_FillValue"), Some(&AttributeValue::Int(vec![-9])));
        assert_eq!(file.attribute(":title"), Some(&AttributeValue::Text("demo".into())));
        assert_eq!(file.attribute("history"), Some(&AttributeValue::Short(vec![1])));
        assert_eq!(file.mode(), DefineState::Data);
        assert!(file.variable("count").unwrap().attributes.contains(FILL_VALUE));
    }

    #[test]
    fn test_new_variable_rejects_plain_names() {
        let mut file = writer();
        assert!(matches!(
            file.new_variable("count").unwrap_err(),
            NcError::InvalidDeclaration(_)
        ));
    }

    #[test]
    fn test_unknown_variable() {
        let mut file = writer();
        assert!(matches!(
            file.variable_mut("missing").err(),
            Some(NcError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_selection_writes_are_rejected() {
        let mut file = writer();
        file.define_yaml("dimensions:\n  x: 2\nvariables:\n  \"int n(x)\": {}\n")
            .unwrap();
        let mut var = file.variable_mut("n").unwrap();
        let grid = IndexExpr::Terms(vec![IndexTerm::List(vec![0, 1])]);
        assert!(matches!(
            var.put(&grid, vec![1i32, 2]).unwrap_err(),
            NcError::InvalidIndex { .. }
        ));
        let call = IndexExpr::Method("mean".into());
        assert!(matches!(
            var.put(&call, vec![1i32]).unwrap_err(),
            NcError::NotAnIndex { .. }
        ));
    }

    #[test]
    fn test_writes_require_data_mode() {
        let mut file = writer();
        file.new_dimension("x", DimLength::Fixed(1)).unwrap();
        file.new_variable("int n(x)").unwrap();
        // force the tracker back into define mode without a transaction
        file.mode = ModeMachine::new(DefineState::Define);
        let err = file.put("n", vec![1i32]).unwrap_err();
        assert!(err.to_string().contains("NC_EINDEFINE"));
    }

    #[test]
    fn test_compression_requires_netcdf4() {
        let options = WriterOptions::default().with_compression(3);
        let mut file = FileWriter::from_backend(MemoryBackend::in_memory(), options);
        let err = file
            .define_yaml("dimensions:\n  x: 2\nvariables:\n  \"float v(x)\": {}\n")
            .unwrap_err();
        assert!(err.to_string().contains("NC_ENOTNC4"));
        assert_eq!(file.mode(), DefineState::Data);
    }

    #[test]
    fn test_template() {
        let mut file = writer();
        file.define_yaml("dimensions:\n  y: 2\n  x: 3\nvariables:\n  \"byte b(y, x)\":\n    units: m\n")
            .unwrap();
        let template = file.variable_mut("b").unwrap().template();
        assert_eq!(template.data.shape(), &[2, 3]);
        assert_eq!(template.data.physical_type(), PhysicalType::Byte);
        assert_eq!(template.attributes.get("units"), Some(&AttributeValue::Text("m".into())));
    }
}
