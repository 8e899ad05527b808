//! Dimension and variable catalog of an open file.

use serde_yaml::{Mapping, Value};

use crate::attribute::{Attributes, UNITS};
use crate::backend::{AttrTarget, DimId, StorageBackend, VarId};
use crate::codec::ValueCodec;
use crate::error::{NcError, NcResult};
use crate::types::PhysicalType;

/// A named axis length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    /// Current length; for unlimited dimensions, records written so far
    pub len: usize,
    pub unlimited: bool,
    pub id: DimId,
}

impl Dimension {
    /// Schema form: the length, or `"unlimited"`.
    pub fn definition(&self) -> Value {
        if self.unlimited {
            Value::String("unlimited".to_string())
        } else {
            Value::Number((self.len as u64).into())
        }
    }
}

/// A named, typed array over file storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: PhysicalType,
    /// Dimension names, outermost first
    pub dims: Vec<String>,
    pub dim_ids: Vec<DimId>,
    pub shape: Vec<usize>,
    /// Per-axis unlimited flags
    pub unlimited: Vec<bool>,
    pub attributes: Attributes,
    pub id: VarId,
}

impl Variable {
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Inline declaration, e.g. `float t(time, lat)` or `int n`.
    pub fn declaration(&self) -> String {
        if self.dims.is_empty() {
            format!("{} {}", self.ty, self.name)
        } else {
            format!("{} {}({})", self.ty, self.name, self.dims.join(", "))
        }
    }

    /// Attributes in tagged schema form.
    pub fn definition(&self) -> Mapping {
        self.attributes.to_tagged_mapping()
    }

    /// A one-dimensional variable named after its dimension.
    pub fn is_coordinate(&self) -> bool {
        self.dims.len() == 1 && self.dims[0] == self.name
    }

    pub fn codec(&self) -> ValueCodec {
        ValueCodec::from_attributes(&self.attributes)
    }

    pub fn units(&self) -> Option<&str> {
        self.attributes.get(UNITS).and_then(|v| v.as_text())
    }
}

/// Ordered dimensions, variables and global attributes of one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub dimensions: Vec<Dimension>,
    pub variables: Vec<Variable>,
    pub attributes: Attributes,
}

impl Catalog {
    /// Read the complete metadata of an open file.
    pub fn load(backend: &dyn StorageBackend) -> NcResult<Self> {
        let mut dimensions = Vec::new();
        for id in 0..backend.ndims()? {
            let info = backend.inq_dim(id)?;
            dimensions.push(Dimension {
                name: info.name,
                len: info.len,
                unlimited: info.unlimited,
                id,
            });
        }

        let mut catalog = Catalog {
            dimensions,
            variables: Vec::new(),
            attributes: read_attributes(backend, AttrTarget::Global)?,
        };
        for id in 0..backend.nvars()? {
            let info = backend.inq_var(id)?;
            let attributes = read_attributes(backend, AttrTarget::Var(id))?;
            let variable = catalog.variable_from_parts(&info.name, info.ty, &info.dims, attributes, id)?;
            catalog.variables.push(variable);
        }
        Ok(catalog)
    }

    /// Assemble a variable from dimension ids known to this catalog.
    pub fn variable_from_parts(
        &self,
        name: &str,
        ty: PhysicalType,
        dim_ids: &[DimId],
        attributes: Attributes,
        id: VarId,
    ) -> NcResult<Variable> {
        let dims = dim_ids
            .iter()
            .map(|&d| {
                self.dimensions
                    .iter()
                    .find(|dim| dim.id == d)
                    .ok_or_else(|| NcError::backend(format!("NC_EBADDIM: no dimension with id {}", d)))
            })
            .collect::<NcResult<Vec<_>>>()?;
        Ok(Variable {
            name: name.to_string(),
            ty,
            dims: dims.iter().map(|d| d.name.clone()).collect(),
            dim_ids: dim_ids.to_vec(),
            shape: dims.iter().map(|d| d.len).collect(),
            unlimited: dims.iter().map(|d| d.unlimited).collect(),
            attributes,
            id,
        })
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    /// Names of all dimensions, in definition order.
    pub fn dimension_names(&self) -> Vec<String> {
        self.dimensions.iter().map(|d| d.name.clone()).collect()
    }

    /// Re-read the current length of unlimited dimensions and the shapes of
    /// the variables using them.
    pub fn refresh_lengths(&mut self, backend: &dyn StorageBackend) -> NcResult<()> {
        for dim in self.dimensions.iter_mut().filter(|d| d.unlimited) {
            dim.len = backend.inq_dim(dim.id)?.len;
        }
        let dimensions = &self.dimensions;
        for var in &mut self.variables {
            for (slot, id) in var.shape.iter_mut().zip(&var.dim_ids) {
                if let Some(dim) = dimensions.iter().find(|d| d.id == *id) {
                    *slot = dim.len;
                }
            }
        }
        Ok(())
    }

    /// Schema document describing the whole file.
    pub fn definition(&self) -> Value {
        let dimensions: Mapping = self
            .dimensions
            .iter()
            .map(|d| (Value::String(d.name.clone()), d.definition()))
            .collect();
        let variables: Mapping = self
            .variables
            .iter()
            .map(|v| (Value::String(v.declaration()), Value::Mapping(v.definition())))
            .collect();
        let mut doc = Mapping::new();
        doc.insert("dimensions".into(), Value::Mapping(dimensions));
        doc.insert("variables".into(), Value::Mapping(variables));
        doc.insert("attributes".into(), Value::Mapping(self.attributes.to_tagged_mapping()));
        Value::Mapping(doc)
    }
}

/// Read every attribute of a variable or of the file, in index order.
pub fn read_attributes(backend: &dyn StorageBackend, target: AttrTarget) -> NcResult<Attributes> {
    let mut attrs = Attributes::new();
    for index in 0..backend.natts(target)? {
        let name = backend.inq_attname(target, index)?;
        let value = backend.get_att(target, &name)?;
        attrs.insert(name, value);
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeValue;
    use crate::backend::MemoryBackend;

    fn sample() -> Catalog {
        let mut b = MemoryBackend::in_memory();
        let t = b.def_dim("time", 0).unwrap();
        let x = b.def_dim("x", 4).unwrap();
        let v = b.def_var("temp", PhysicalType::Float, &[t, x]).unwrap();
        b.def_var("x", PhysicalType::Double, &[x]).unwrap();
        b.put_att(AttrTarget::Var(v), "units", &AttributeValue::Text("K".into()))
            .unwrap();
        b.put_att(AttrTarget::Var(v), "valid", &AttributeValue::Short(vec![0, 400]))
            .unwrap();
        b.put_att(AttrTarget::Global, "version", &AttributeValue::Int(vec![2]))
            .unwrap();
        b.enddef().unwrap();
        Catalog::load(&b).unwrap()
    }

    #[test]
    fn test_declaration_and_coordinate() {
        let c = sample();
        let temp = c.variable("temp").unwrap();
        assert_eq!(temp.declaration(), "float temp(time, x)");
        assert_eq!(temp.shape, vec![0, 4]);
        assert_eq!(temp.unlimited, vec![true, false]);
        assert_eq!(temp.units(), Some("K"));
        assert!(!temp.is_coordinate());
        assert!(c.variable("x").unwrap().is_coordinate());
    }

    #[test]
    fn test_definition_document() {
        let doc = sample().definition();
        let expected: Value = serde_yaml::from_str(
            r#"
dimensions:
  time: unlimited
  x: 4
variables:
  "float temp(time, x)":
    units: K
    valid: {short: [0, 400]}
  "double x(x)": {}
attributes:
  version: {int: 2}
"#,
        )
        .unwrap();
        assert_eq!(doc, expected);
    }
}
