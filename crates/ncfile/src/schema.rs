//! Declarative schema documents.
//!
//! A schema is a mapping with three optional sections:
//!
//! ```yaml
//! dimensions:
//!   time: unlimited
//!   x: 4
//! variables:
//!   "float temp(time, x)":
//!     units: K
//!   count:
//!     type: int
//!     dim: [x]
//!     valid_max: {int: 100}
//! attributes:
//!   title: demo
//! ```
//!
//! Variable keys are either plain names or inline declarations
//! `"<type> <name>(<dim>, ...)"`. [`Schema::from_value`] normalizes keys,
//! validates the document against the dimensions already known to the file
//! and converts every attribute to its stored form.

use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::attribute::{convert_attribute_value, AttributeSpec, AttributeValue};
use crate::error::{NcError, NcResult};
use crate::types::PhysicalType;

/// Tags accepted on variable attributes. `char` is not among them.
const VARIABLE_ATTRIBUTE_TAGS: [&str; 5] = ["byte", "short", "int", "float", "double"];

/// Requested length of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimLength {
    Fixed(usize),
    Unlimited,
}

impl DimLength {
    /// Length passed to the backend; 0 means unlimited.
    pub fn backend_len(&self) -> usize {
        match self {
            DimLength::Fixed(n) => *n,
            DimLength::Unlimited => 0,
        }
    }

    /// Interpret a schema value: a non-negative integer or `"unlimited"`.
    /// Zero also means unlimited.
    pub fn from_value(name: &str, value: &Value) -> NcResult<Self> {
        let len = match value {
            Value::String(s) if s == "unlimited" => return Ok(DimLength::Unlimited),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        };
        match len {
            Some(0) => Ok(DimLength::Unlimited),
            Some(n) => usize::try_from(n)
                .map(DimLength::Fixed)
                .map_err(|_| NcError::InvalidSchema(format!("dimension '{}' is too long", name))),
            None => Err(NcError::InvalidSchema(format!(
                "length of dimension '{}' must be an integer or \"unlimited\", got {:?}",
                name, value
            ))),
        }
    }
}

/// A parsed inline declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub ty: PhysicalType,
    pub name: String,
    /// `None` without parentheses, `Some(vec![])` for `()`
    pub dims: Option<Vec<String>>,
}

/// Parse `"<type> <name>"` or `"<type> <name>(<d1>, <d2>, ...)"`.
///
/// Returns `None` when the text is not a declaration, in which case it is a
/// plain variable name.
pub fn parse_declaration(text: &str) -> Option<Declaration> {
    let (ty, rest) = PhysicalType::ALL.iter().find_map(|ty| {
        let rest = text.strip_prefix(ty.name())?;
        if rest.starts_with(is_space) {
            Some((*ty, rest.trim_start_matches(is_space)))
        } else {
            None
        }
    })?;
    if rest.is_empty() {
        return None;
    }

    // The name is the shortest non-empty prefix after which only an optional
    // parenthesized dimension list remains.
    for (p, _) in rest.char_indices().skip(1).chain(std::iter::once((rest.len(), ' '))) {
        let name = &rest[..p];
        if name.contains('\n') {
            return None;
        }
        let remainder = &rest[p..];
        if remainder.is_empty() {
            return Some(Declaration {
                ty,
                name: name.to_string(),
                dims: None,
            });
        }
        let list = remainder.trim_start_matches(is_space);
        if let Some(inner) = list.strip_prefix('(').and_then(|l| l.strip_suffix(')')) {
            if !inner.contains('\n') {
                return Some(Declaration {
                    ty,
                    name: name.to_string(),
                    dims: Some(split_dims(inner)),
                });
            }
        }
    }
    None
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0b' | '\x0c')
}

fn split_dims(inner: &str) -> Vec<String> {
    let mut dims: Vec<String> = inner.split(',').map(|d| d.trim_matches(is_space).to_string()).collect();
    while dims.last().is_some_and(|d| d.is_empty()) {
        dims.pop();
    }
    dims
}

/// One variable of a validated schema.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub ty: PhysicalType,
    /// Dimension names; empty for a scalar variable
    pub dims: Vec<String>,
    pub attributes: Vec<(String, AttributeValue)>,
}

/// A normalized and validated schema document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub dimensions: Vec<(String, DimLength)>,
    pub variables: Vec<VariableSpec>,
    pub attributes: Vec<(String, AttributeValue)>,
}

impl Schema {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str, known_dims: &[String]) -> NcResult<Self> {
        let doc: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(&doc, known_dims)
    }

    /// Parse a JSON document.
    pub fn from_json(doc: &serde_json::Value, known_dims: &[String]) -> NcResult<Self> {
        let doc: Value = serde_yaml::to_value(doc)?;
        Self::from_value(&doc, known_dims)
    }

    /// Normalize and validate `doc`. `known_dims` are the dimensions the
    /// target file already has.
    pub fn from_value(doc: &Value, known_dims: &[String]) -> NcResult<Self> {
        let doc = normalize(doc);
        let root = match &doc {
            Value::Mapping(m) => m,
            Value::Null => return Ok(Schema::default()),
            other => return Err(NcError::InvalidSchema(format!("document must be a mapping, got {:?}", other))),
        };
        for key in root.keys() {
            let key = key.as_str().unwrap_or_default();
            if !matches!(key, "dimensions" | "variables" | "attributes") {
                warn!(section = key, "Ignoring unknown schema section");
            }
        }

        let mut schema = Schema::default();
        if let Some(dims) = section(root, "dimensions")? {
            for (name, len) in dims {
                let name = key_string(name);
                let len = DimLength::from_value(&name, len)?;
                schema.dimensions.push((name, len));
            }
        }

        let mut all_dims: Vec<&str> = schema.dimensions.iter().map(|(n, _)| n.as_str()).collect();
        all_dims.extend(known_dims.iter().map(String::as_str));

        if let Some(vars) = section(root, "variables")? {
            for (key, body) in vars {
                let spec = variable_spec(&key_string(key), body, &all_dims)?;
                schema.variables.push(spec);
            }
        }

        if let Some(attrs) = section(root, "attributes")? {
            for (name, value) in attrs {
                let name = key_string(name);
                let value = convert_attribute_value(&name, value)?;
                schema.attributes.push((name, value));
            }
        }
        Ok(schema)
    }
}

/// Recursively convert every mapping key to a string.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.iter()
                .map(|(k, v)| (Value::String(key_string(k)), normalize(v)))
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.iter().map(normalize).collect()),
        Value::Tagged(tagged) => normalize(&tagged.value),
        other => other.clone(),
    }
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn section<'a>(root: &'a Mapping, name: &str) -> NcResult<Option<&'a Mapping>> {
    match root.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Mapping(m)) => Ok(Some(m)),
        Some(other) => Err(NcError::InvalidSchema(format!(
            "'{}' must be a mapping, got {:?}",
            name, other
        ))),
    }
}

fn variable_spec(key: &str, body: &Value, known_dims: &[&str]) -> NcResult<VariableSpec> {
    let empty = Mapping::new();
    let body = match body {
        Value::Mapping(m) => m,
        Value::Null => &empty,
        other => {
            return Err(NcError::InvalidSchema(format!(
                "definition of variable '{}' must be a mapping, got {:?}",
                key, other
            )))
        }
    };
    let declaration = parse_declaration(key);
    let name = declaration.as_ref().map(|d| d.name.clone()).unwrap_or_else(|| key.to_string());

    let ty = match &declaration {
        Some(d) => d.ty,
        None => match body.get("type") {
            None => {
                warn!(variable = %name, "Variable has no 'type' entry in definition, using float");
                PhysicalType::Float
            }
            Some(value) => value
                .as_str()
                .and_then(PhysicalType::from_name)
                .ok_or_else(|| NcError::InvalidType {
                    variable: name.clone(),
                    type_name: key_string(value),
                })?,
        },
    };

    let dims = match declaration.and_then(|d| d.dims) {
        Some(dims) => dims,
        None => match body.get("dim") {
            None => {
                warn!(variable = %name, "Variable has no 'dim' entry in definition, defining a scalar");
                Vec::new()
            }
            Some(Value::Sequence(items)) => items.iter().map(key_string).collect(),
            Some(other) => {
                return Err(NcError::InvalidSchema(format!(
                    "'dim' of variable '{}' should be a sequence, got {:?}",
                    name, other
                )))
            }
        },
    };
    for dim in &dims {
        if !known_dims.contains(&dim.as_str()) {
            return Err(NcError::UnknownDimension {
                variable: name.clone(),
                dimension: dim.clone(),
            });
        }
    }

    let mut attributes = Vec::new();
    for (attr, value) in body {
        let attr = key_string(attr);
        if attr == "type" || attr == "dim" {
            continue;
        }
        if let Value::Mapping(tagged) = value {
            let tag = tagged.keys().next().and_then(Value::as_str);
            if tagged.len() != 1 || !tag.is_some_and(|t| VARIABLE_ATTRIBUTE_TAGS.contains(&t)) {
                return Err(NcError::invalid_attribute(
                    format!("{}:{}", name, attr),
                    format!("expected one of {:?} as the only key", VARIABLE_ATTRIBUTE_TAGS),
                ));
            }
        }
        let value = AttributeSpec::parse(&attr, value)?.to_value(&attr)?;
        attributes.push((attr, value));
    }

    Ok(VariableSpec {
        name,
        ty,
        dims,
        attributes,
    })
}
