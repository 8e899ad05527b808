//! Schema-driven access to NetCDF-style array files
//!
//! This crate layers a structured interface over the primitive operations of a
//! NetCDF-style storage engine:
//!
//! - **Index resolution**: classify an index expression and pick the cheapest
//!   backend primitive (single element, contiguous block, strided block)
//! - **Value decoding**: apply `scale_factor`/`add_offset` and map fill and
//!   missing values to `None`
//! - **Integer packing**: quantize floats into byte/short/int storage
//! - **Declarative schemas**: define dimensions, variables and attributes from
//!   a YAML or JSON document
//!
//! # Architecture
//!
//! ```text
//! Schema document ──► Schema::from_value ──► FileWriter ──┐
//!                                                         │ transaction
//!                                                         ▼
//! IndexExpr ──► IndexResolver ──► AccessPattern ──► StorageBackend
//!                                                         │
//!                                      ValueCodec ◄───────┘
//!                                          │
//!                                          ▼
//!                                  Decoded (Option<f64>)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ncfile::{nc_index, FileWriter, MemoryBackend, NcFile, WriterOptions};
//!
//! let mut out: FileWriter<MemoryBackend> = FileWriter::create("obs.json", WriterOptions::default())?;
//! out.define_yaml("dimensions: {x: 4}\nvariables: {\"float v(x)\": {}}")?;
//! out.put("v", vec![1.0f32, 2.0, 3.0, 4.0])?;
//! out.close()?;
//!
//! let file: NcFile<MemoryBackend> = NcFile::open("obs.json")?;
//! let tail = file.variable("v")?.get(&nc_index![2usize..])?;
//! ```

pub mod attribute;
pub mod backend;
pub mod catalog;
pub mod codec;
pub mod compiler;
pub mod config;
pub mod error;
pub mod index;
pub mod mode;
pub mod packer;
pub mod reader;
pub mod schema;
pub mod time;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use attribute::{convert_attribute_value, parse_literal, AttributeSpec, AttributeValue, Attributes};
pub use backend::{AttrTarget, DimId, MemoryBackend, OpenFlags, StorageBackend, VarId};
pub use catalog::{Catalog, Dimension, Variable};
pub use codec::{Decoded, ValueCodec};
pub use compiler::SchemaCompiler;
pub use config::WriterOptions;
pub use error::{NcError, NcResult};
pub use index::{AccessPattern, IndexExpr, IndexResolver, IndexTerm};
pub use mode::DefineState;
pub use packer::{pack, pack_anchored, pack_centered, PackConvention, PackTarget};
pub use reader::{NcFile, VariableRef};
pub use schema::{parse_declaration, DimLength, Schema};
pub use time::TimeUnits;
pub use types::{ArrayValue, PhysicalType, TypedArray};
pub use writer::{FileWriter, VariableMut};
