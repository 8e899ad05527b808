//! Typed attribute values and their schema representations.
//!
//! Attributes carry a scalar or a fixed-length sequence of one of the six
//! physical types. Schema documents spell them either as a *tagged* single-key
//! mapping (`{short: [1, 2]}`) or as a plain value. Plain strings go through a
//! literal-suffix grammar tried in this order:
//!
//! | form                          | type   | example  |
//! |-------------------------------|--------|----------|
//! | 1-3 digits + `b`              | byte   | `"5b"`   |
//! | optional `0x`, 1-5 digits + `s` | short | `"5s"`  |
//! | optional `0x`, digits, optional `l` | int | `"5"` |
//! | decimal/exponent + `f`        | float  | `"5.0f"` |
//! | decimal/exponent, optional `d`| double | `"5.0"`  |
//!
//! Strings matching none of these stay text. Plain numbers and numeric
//! sequences default to `double`.

use std::fmt;

use num_traits::NumCast;
use serde_yaml::{Mapping, Number, Value};

use crate::error::{NcError, NcResult};
use crate::types::PhysicalType;

/// Well-known attribute names.
pub const FILL_VALUE: &str = "_FillValue";
pub const MISSING_VALUE: &str = "missing_value";
pub const SCALE_FACTOR: &str = "scale_factor";
pub const ADD_OFFSET: &str = "add_offset";
pub const UNITS: &str = "units";

/// A stored attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Character data, stored with the `char` physical type
    Text(String),
    Char(Vec<u8>),
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl AttributeValue {
    pub fn physical_type(&self) -> PhysicalType {
        match self {
            AttributeValue::Text(_) | AttributeValue::Char(_) => PhysicalType::Char,
            AttributeValue::Byte(_) => PhysicalType::Byte,
            AttributeValue::Short(_) => PhysicalType::Short,
            AttributeValue::Int(_) => PhysicalType::Int,
            AttributeValue::Float(_) => PhysicalType::Float,
            AttributeValue::Double(_) => PhysicalType::Double,
        }
    }

    /// Number of stored elements (bytes for text).
    pub fn len(&self) -> usize {
        match self {
            AttributeValue::Text(s) => s.len(),
            AttributeValue::Char(v) => v.len(),
            AttributeValue::Byte(v) => v.len(),
            AttributeValue::Short(v) => v.len(),
            AttributeValue::Int(v) => v.len(),
            AttributeValue::Float(v) => v.len(),
            AttributeValue::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric elements widened to `f64`; `None` for text.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            AttributeValue::Text(_) => None,
            AttributeValue::Char(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AttributeValue::Byte(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AttributeValue::Short(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AttributeValue::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AttributeValue::Float(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AttributeValue::Double(v) => Some(v.clone()),
        }
    }

    /// First numeric element, if any.
    pub fn first_f64(&self) -> Option<f64> {
        self.to_f64_vec().and_then(|v| v.first().copied())
    }

    /// Build a numeric attribute of the given type.
    ///
    /// Integer types truncate toward zero and reject out-of-range values.
    pub fn from_numbers(ty: PhysicalType, values: &[f64]) -> NcResult<Self> {
        Ok(match ty {
            PhysicalType::Char => AttributeValue::Char(cast_all(values, ty)?),
            PhysicalType::Byte => AttributeValue::Byte(cast_all(values, ty)?),
            PhysicalType::Short => AttributeValue::Short(cast_all(values, ty)?),
            PhysicalType::Int => AttributeValue::Int(cast_all(values, ty)?),
            PhysicalType::Float => AttributeValue::Float(values.iter().map(|&v| v as f32).collect()),
            PhysicalType::Double => AttributeValue::Double(values.to_vec()),
        })
    }

    /// Tagged schema form: `{type: scalar}` for one element, `{type: [..]}`
    /// otherwise. Text stays a plain string.
    pub fn to_tagged(&self) -> Value {
        let numbers: Vec<Value> = match self {
            AttributeValue::Text(s) => return Value::String(s.clone()),
            AttributeValue::Char(v) => v.iter().map(|&x| Value::Number(Number::from(x as i64))).collect(),
            AttributeValue::Byte(v) => v.iter().map(|&x| Value::Number(Number::from(x as i64))).collect(),
            AttributeValue::Short(v) => v.iter().map(|&x| Value::Number(Number::from(x as i64))).collect(),
            AttributeValue::Int(v) => v.iter().map(|&x| Value::Number(Number::from(x as i64))).collect(),
            AttributeValue::Float(v) => v.iter().map(|&x| Value::Number(Number::from(x as f64))).collect(),
            AttributeValue::Double(v) => v.iter().map(|&x| Value::Number(Number::from(x))).collect(),
        };
        let inner = if numbers.len() == 1 {
            numbers.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Sequence(numbers)
        };
        let mut tagged = Mapping::new();
        tagged.insert(Value::String(self.physical_type().name().to_string()), inner);
        Value::Mapping(tagged)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let AttributeValue::Text(s) = self {
            return f.write_str(s);
        }
        let values = self.to_f64_vec().unwrap_or_default();
        if values.len() == 1 {
            write!(f, "{}", values[0])
        } else {
            write!(f, "{:?}", values)
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(vec![value])
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Float(vec![value])
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(vec![value])
    }
}

impl From<i16> for AttributeValue {
    fn from(value: i16) -> Self {
        AttributeValue::Short(vec![value])
    }
}

impl From<i8> for AttributeValue {
    fn from(value: i8) -> Self {
        AttributeValue::Byte(vec![value])
    }
}

fn cast_all<T: NumCast>(values: &[f64], ty: PhysicalType) -> NcResult<Vec<T>> {
    values
        .iter()
        .map(|&v| {
            <T as NumCast>::from(v)
                .ok_or_else(|| NcError::InvalidValue(format!("{} is out of range for {}", v, ty)))
        })
        .collect()
}

/// Ordered name → value attribute collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttributeValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace, keeping the original position of a replaced entry.
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tagged schema form of every attribute, in order.
    pub fn to_tagged_mapping(&self) -> Mapping {
        self.iter()
            .map(|(k, v)| (Value::String(k.to_string()), v.to_tagged()))
            .collect()
    }
}

impl FromIterator<(String, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// An attribute as written in a schema document.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSpec {
    /// Plain scalar, sequence or string; typed by default rules
    Untyped(Value),
    /// Single-key `{type: value}` mapping
    Tagged(PhysicalType, Value),
}

impl AttributeSpec {
    /// Interpret a schema value. Accepts all six tags, including `char`.
    pub fn parse(name: &str, value: &Value) -> NcResult<Self> {
        match value {
            Value::Mapping(map) => {
                if map.len() != 1 {
                    return Err(NcError::invalid_attribute(
                        name,
                        format!("tagged value must have exactly one key, found {}", map.len()),
                    ));
                }
                let (tag, inner) = map
                    .iter()
                    .next()
                    .ok_or_else(|| NcError::invalid_attribute(name, "empty tagged value"))?;
                let ty = tag
                    .as_str()
                    .and_then(PhysicalType::from_name)
                    .ok_or_else(|| NcError::invalid_attribute(name, format!("unknown type tag {:?}", tag)))?;
                Ok(AttributeSpec::Tagged(ty, inner.clone()))
            }
            other => Ok(AttributeSpec::Untyped(other.clone())),
        }
    }

    /// Convert to the stored value.
    pub fn to_value(&self, name: &str) -> NcResult<AttributeValue> {
        match self {
            AttributeSpec::Tagged(ty, inner) => tagged_to_value(name, *ty, inner),
            AttributeSpec::Untyped(Value::String(s)) => parse_literal(name, s),
            AttributeSpec::Untyped(value) => {
                let numbers = numbers_of(name, value)?;
                Ok(AttributeValue::Double(numbers))
            }
        }
    }
}

/// Convert a raw schema value (plain or tagged) to a stored attribute value.
pub fn convert_attribute_value(name: &str, value: &Value) -> NcResult<AttributeValue> {
    AttributeSpec::parse(name, value)?.to_value(name)
}

fn tagged_to_value(name: &str, ty: PhysicalType, inner: &Value) -> NcResult<AttributeValue> {
    if let (PhysicalType::Char, Value::String(s)) = (ty, inner) {
        return Ok(AttributeValue::Char(s.as_bytes().to_vec()));
    }
    let numbers = numbers_of(name, inner)?;
    AttributeValue::from_numbers(ty, &numbers).map_err(|e| NcError::invalid_attribute(name, e.to_string()))
}

fn numbers_of(name: &str, value: &Value) -> NcResult<Vec<f64>> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(|v| vec![v])
            .ok_or_else(|| NcError::invalid_attribute(name, format!("unsupported number {}", n))),
        Value::Sequence(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Value::Number(n) => n
                    .as_f64()
                    .ok_or_else(|| NcError::invalid_attribute(name, format!("unsupported number {}", n))),
                other => Err(NcError::invalid_attribute(
                    name,
                    format!("sequence element {:?} is not a number", other),
                )),
            })
            .collect(),
        other => Err(NcError::invalid_attribute(
            name,
            format!("unsupported attribute value {:?}", other),
        )),
    }
}

/// Apply the literal-suffix grammar to a plain string attribute.
pub fn parse_literal(name: &str, raw: &str) -> NcResult<AttributeValue> {
    let s = raw.trim();
    let out_of_range = |ty: PhysicalType| {
        NcError::invalid_attribute(name, format!("literal '{}' is out of range for {}", s, ty))
    };

    if let Some(body) = strip_suffix_ci(s, 'b') {
        let (neg, digits) = split_sign(body);
        if (1..=3).contains(&digits.len()) && all_digits(digits) {
            let v = signed(neg, parse_radix(digits, 10)?);
            return i8::try_from(v)
                .map(|v| AttributeValue::Byte(vec![v]))
                .map_err(|_| out_of_range(PhysicalType::Byte));
        }
    }

    if let Some(body) = strip_suffix_ci(s, 's') {
        if let Some(v) = parse_short_body(body)? {
            return i16::try_from(v)
                .map(|v| AttributeValue::Short(vec![v]))
                .map_err(|_| out_of_range(PhysicalType::Short));
        }
    }

    let int_body = strip_suffix_ci(s, 'l').unwrap_or(s);
    if let Some(v) = parse_int_body(int_body)? {
        return i32::try_from(v)
            .map(|v| AttributeValue::Int(vec![v]))
            .map_err(|_| out_of_range(PhysicalType::Int));
    }

    if let Some(body) = strip_suffix_ci(s, 'f') {
        if let Some(v) = parse_decimal(body) {
            return Ok(AttributeValue::Float(vec![v as f32]));
        }
    }

    let double_body = strip_suffix_ci(s, 'd').unwrap_or(s);
    if let Some(v) = parse_decimal(double_body) {
        return Ok(AttributeValue::Double(vec![v]));
    }

    Ok(AttributeValue::Text(s.to_string()))
}

fn strip_suffix_ci(s: &str, suffix: char) -> Option<&str> {
    s.strip_suffix(suffix)
        .or_else(|| s.strip_suffix(suffix.to_ascii_uppercase()))
}

fn split_sign(s: &str) -> (bool, &str) {
    match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn signed(neg: bool, v: i64) -> i64 {
    if neg {
        -v
    } else {
        v
    }
}

fn parse_radix(digits: &str, radix: u32) -> NcResult<i64> {
    i64::from_str_radix(digits, radix)
        .map_err(|e| NcError::InvalidValue(format!("integer literal '{}': {}", digits, e)))
}

fn hex_body(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

// Optional sign, optional `0x` or a single leading `0`, then 1-5 digits.
fn parse_short_body(body: &str) -> NcResult<Option<i64>> {
    let (neg, rest) = split_sign(body);
    if let Some(hex) = hex_body(rest) {
        if (1..=5).contains(&hex.len()) && all_digits(hex) {
            return Ok(Some(signed(neg, parse_radix(hex, 16)?)));
        }
        return Ok(None);
    }
    let fits = all_digits(rest)
        && (rest.len() <= 5 || (rest.len() == 6 && rest.starts_with('0')));
    if fits {
        Ok(Some(signed(neg, parse_radix(rest, 10)?)))
    } else {
        Ok(None)
    }
}

fn parse_int_body(body: &str) -> NcResult<Option<i64>> {
    let (neg, rest) = split_sign(body);
    let (digits, radix) = match hex_body(rest) {
        Some(hex) => (hex, 16),
        None => (rest, 10),
    };
    if !all_digits(digits) {
        return Ok(None);
    }
    match i64::from_str_radix(digits, radix) {
        Ok(v) => Ok(Some(signed(neg, v))),
        Err(_) => Err(NcError::InvalidValue(format!("integer literal '{}' is too large", body))),
    }
}

// `[+-]? digits* (. digits*)? (e [+-]? digits+)?` with at least one mantissa digit.
fn parse_decimal(body: &str) -> Option<f64> {
    let (neg, rest) = split_sign(body);
    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
        None => (rest, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    let digits_ok = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if !digits_ok(int_part) || !digits_ok(frac_part) || int_part.len() + frac_part.len() == 0 {
        return None;
    }
    let exp = match exponent {
        Some(e) => {
            let (exp_neg, exp_digits) = split_sign(e);
            if !all_digits(exp_digits) {
                return None;
            }
            format!("e{}{}", if exp_neg { "-" } else { "" }, exp_digits)
        }
        None => String::new(),
    };
    let normalized = format!(
        "{}{}.{}{}",
        if neg { "-" } else { "" },
        if int_part.is_empty() { "0" } else { int_part },
        if frac_part.is_empty() { "0" } else { frac_part },
        exp
    );
    normalized.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> AttributeValue {
        parse_literal("test", s).unwrap()
    }

    #[test]
    fn test_literal_precedence() {
        assert_eq!(lit("5b"), AttributeValue::Byte(vec![5]));
        assert_eq!(lit("5s"), AttributeValue::Short(vec![5]));
        assert_eq!(lit("5"), AttributeValue::Int(vec![5]));
        assert_eq!(lit("5.0f"), AttributeValue::Float(vec![5.0]));
        assert_eq!(lit("5.0"), AttributeValue::Double(vec![5.0]));
        assert_eq!(lit("5d"), AttributeValue::Double(vec![5.0]));
    }

    #[test]
    fn test_literal_case_and_whitespace() {
        assert_eq!(lit("  -12B "), AttributeValue::Byte(vec![-12]));
        assert_eq!(lit("7S"), AttributeValue::Short(vec![7]));
        assert_eq!(lit("42L"), AttributeValue::Int(vec![42]));
        assert_eq!(lit("1.5F"), AttributeValue::Float(vec![1.5]));
        assert_eq!(lit("2.5D"), AttributeValue::Double(vec![2.5]));
    }

    #[test]
    fn test_literal_hex_prefix() {
        assert_eq!(lit("0x10s"), AttributeValue::Short(vec![16]));
        assert_eq!(lit("0x10"), AttributeValue::Int(vec![16]));
    }

    #[test]
    fn test_literal_exponent_forms() {
        assert_eq!(lit("1e3"), AttributeValue::Double(vec![1000.0]));
        assert_eq!(lit("-.5f"), AttributeValue::Float(vec![-0.5]));
        assert_eq!(lit("2.5e-1"), AttributeValue::Double(vec![0.25]));
        assert_eq!(lit("5f"), AttributeValue::Float(vec![5.0]));
    }

    #[test]
    fn test_literal_digit_limits_fall_through() {
        // four digits is too long for a byte literal and carries no other suffix
        assert_eq!(lit("1234b"), AttributeValue::Text("1234b".into()));
        // six digits without a leading zero is too long for a short literal
        assert_eq!(lit("123456s"), AttributeValue::Text("123456s".into()));
    }

    #[test]
    fn test_literal_out_of_range_rejected() {
        assert!(matches!(
            parse_literal("a", "200b"),
            Err(NcError::InvalidAttributeSpec { .. })
        ));
        assert!(parse_literal("a", "99999s").is_err());
    }

    #[test]
    fn test_plain_text_stays_text() {
        assert_eq!(lit("degrees_north"), AttributeValue::Text("degrees_north".into()));
        assert_eq!(lit("days since 2000-01-01"), AttributeValue::Text("days since 2000-01-01".into()));
        assert_eq!(lit("f"), AttributeValue::Text("f".into()));
        assert_eq!(lit(""), AttributeValue::Text(String::new()));
    }

    #[test]
    fn test_tagged_conversion_accepts_char() {
        let value: Value = serde_yaml::from_str("{char: [65, 66]}").unwrap();
        assert_eq!(
            convert_attribute_value("a", &value).unwrap(),
            AttributeValue::Char(vec![65, 66])
        );
        let value: Value = serde_yaml::from_str("{short: -3}").unwrap();
        assert_eq!(convert_attribute_value("a", &value).unwrap(), AttributeValue::Short(vec![-3]));
    }

    #[test]
    fn test_tagged_conversion_rejects_multiple_keys() {
        let value: Value = serde_yaml::from_str("{short: 1, int: 2}").unwrap();
        assert!(matches!(
            convert_attribute_value("a", &value),
            Err(NcError::InvalidAttributeSpec { .. })
        ));
        let value: Value = serde_yaml::from_str("{long: 1}").unwrap();
        assert!(convert_attribute_value("a", &value).is_err());
    }

    #[test]
    fn test_plain_numbers_default_to_double() {
        let value: Value = serde_yaml::from_str("[1, 2.5]").unwrap();
        assert_eq!(
            convert_attribute_value("a", &value).unwrap(),
            AttributeValue::Double(vec![1.0, 2.5])
        );
        let value: Value = serde_yaml::from_str("3").unwrap();
        assert_eq!(convert_attribute_value("a", &value).unwrap(), AttributeValue::Double(vec![3.0]));
    }

    #[test]
    fn test_to_tagged_scalar_and_sequence() {
        let scalar = AttributeValue::Short(vec![7]).to_tagged();
        assert_eq!(scalar, serde_yaml::from_str::<Value>("{short: 7}").unwrap());
        let seq = AttributeValue::Char(vec![1, 2]).to_tagged();
        assert_eq!(seq, serde_yaml::from_str::<Value>("{char: [1, 2]}").unwrap());
        let text = AttributeValue::Text("K".into()).to_tagged();
        assert_eq!(text, Value::String("K".into()));
    }

    #[test]
    fn test_attributes_insert_keeps_position() {
        let mut attrs = Attributes::new();
        attrs.insert("a", 1.0.into());
        attrs.insert("b", 2.0.into());
        attrs.insert("a", 3.0.into());
        let names: Vec<_> = attrs.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(attrs.get("a").and_then(|v| v.first_f64()), Some(3.0));
    }
}
