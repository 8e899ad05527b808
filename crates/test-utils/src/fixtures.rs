//! Common schema documents for ncfile tests.

/// One fixed dimension and one float variable.
pub const SIMPLE_SCHEMA: &str = r#"
dimensions:
  x: 4
variables:
  "float v(x)":
    units: m
"#;

/// A record-oriented file: an unlimited time axis, a coordinate variable and
/// a packed two-dimensional field.
pub const OBSERVATION_SCHEMA: &str = r#"
dimensions:
  time: unlimited
  station: 3
variables:
  "double time(time)":
    units: hours since 2000-01-01 00:00:00
  "short temp(time, station)":
    units: K
    scale_factor: {double: 0.01}
    add_offset: {double: 273.15}
    _FillValue: {short: -32767}
  station:
    type: int
    dim: [station]
attributes:
  title: station observations
  version: 2s
"#;

/// Refers to a dimension that is never defined.
pub const UNKNOWN_DIMENSION_SCHEMA: &str = r#"
dimensions:
  x: 2
variables:
  "float v(x, y)": {}
"#;

/// Uses a type name outside the six physical types.
pub const INVALID_TYPE_SCHEMA: &str = r#"
dimensions:
  x: 2
variables:
  v:
    type: int64
    dim: [x]
"#;

/// Tags a variable attribute as `char`, which variable attributes reject.
pub const CHAR_VARIABLE_ATTRIBUTE_SCHEMA: &str = r#"
dimensions:
  x: 2
variables:
  "float v(x)":
    label: {char: abc}
"#;

/// Tags a global attribute as `char`, which is accepted.
pub const CHAR_GLOBAL_ATTRIBUTE_SCHEMA: &str = r#"
attributes:
  label: {char: abc}
"#;

/// Equivalent of [`SIMPLE_SCHEMA`] in textual CDL form.
pub const SIMPLE_CDL: &str = r#"netcdf simple {
dimensions:
    x = 4 ;
variables:
    float v(x) ;
        v:units = "m" ;
}
"#;
