//! Classification of index expressions against a variable shape.
//!
//! [`IndexResolver::resolve`] maps an [`IndexExpr`] to exactly one
//! [`AccessPattern`], which tells the accessor which backend primitive to
//! issue. Resolution is a pure function of the shape, the unlimited flags and
//! the expression.

use std::ops::{Range, RangeFrom, RangeFull};

use ndarray::ArrayD;

use crate::error::{NcError, NcResult};

/// One term of a per-axis index expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTerm {
    /// A single coordinate; negative values count from the end
    Index(isize),
    /// `count` elements starting at `start`, `stride` apart; `None` takes as
    /// many as fit
    Slice {
        start: isize,
        count: Option<usize>,
        stride: usize,
    },
    /// The whole axis
    Full,
    /// An explicit coordinate list
    List(Vec<isize>),
}

impl IndexTerm {
    pub fn slice(start: isize, count: usize, stride: usize) -> Self {
        IndexTerm::Slice {
            start,
            count: Some(count),
            stride,
        }
    }
}

impl From<isize> for IndexTerm {
    fn from(i: isize) -> Self {
        IndexTerm::Index(i)
    }
}

impl From<i32> for IndexTerm {
    fn from(i: i32) -> Self {
        IndexTerm::Index(i as isize)
    }
}

impl From<usize> for IndexTerm {
    fn from(i: usize) -> Self {
        IndexTerm::Index(i as isize)
    }
}

impl From<Range<usize>> for IndexTerm {
    fn from(r: Range<usize>) -> Self {
        IndexTerm::slice(r.start as isize, r.end.saturating_sub(r.start), 1)
    }
}

impl From<RangeFrom<usize>> for IndexTerm {
    fn from(r: RangeFrom<usize>) -> Self {
        IndexTerm::Slice {
            start: r.start as isize,
            count: None,
            stride: 1,
        }
    }
}

impl From<RangeFull> for IndexTerm {
    fn from(_: RangeFull) -> Self {
        IndexTerm::Full
    }
}

impl From<Vec<isize>> for IndexTerm {
    fn from(list: Vec<isize>) -> Self {
        IndexTerm::List(list)
    }
}

/// A complete index expression.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexExpr {
    /// Flat row-major address
    Address(usize),
    /// Whole variable collapsed to one dimension
    Flatten,
    /// One term per axis; no terms selects the whole variable
    Terms(Vec<IndexTerm>),
    /// Boolean selection mask with the variable's shape
    Mask(ArrayD<bool>),
    /// A method applied to the variable rather than an index
    Method(String),
}

impl IndexExpr {
    pub fn all() -> Self {
        IndexExpr::Terms(Vec::new())
    }

    /// One coordinate per axis.
    pub fn point(index: &[isize]) -> Self {
        IndexExpr::Terms(index.iter().map(|&i| IndexTerm::Index(i)).collect())
    }
}

impl From<Vec<IndexTerm>> for IndexExpr {
    fn from(terms: Vec<IndexTerm>) -> Self {
        IndexExpr::Terms(terms)
    }
}

/// Build an [`IndexExpr::Terms`] from a comma-separated list of terms.
///
/// ```
/// use ncfile::nc_index;
/// let expr = nc_index![0usize, .., 2..5];
/// ```
#[macro_export]
macro_rules! nc_index {
    () => {
        $crate::index::IndexExpr::Terms(Vec::new())
    };
    ($($term:expr),+ $(,)?) => {
        $crate::index::IndexExpr::Terms(vec![$($crate::index::IndexTerm::from($term)),+])
    };
}

/// The resolved access pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessPattern {
    /// Flat address, with its per-axis coordinates
    Address { address: usize, index: Vec<usize> },
    Flatten,
    Point { index: Vec<usize> },
    All,
    /// Rectangular block; `compact` lists the axes selected by a scalar
    /// coordinate, which reads drop from the result
    Block {
        start: Vec<usize>,
        count: Vec<usize>,
        stride: Vec<usize>,
        compact: Vec<usize>,
    },
    Select { mask: ArrayD<bool> },
    Grid { lists: Vec<Vec<usize>> },
    MethodCall { method: String },
}

impl AccessPattern {
    /// A block whose strides are all one.
    pub fn is_contiguous(&self) -> bool {
        match self {
            AccessPattern::Block { stride, .. } => stride.iter().all(|&s| s == 1),
            _ => false,
        }
    }
}

/// Resolves index expressions for one variable.
#[derive(Debug, Clone)]
pub struct IndexResolver {
    variable: String,
    shape: Vec<usize>,
    growable: Vec<bool>,
}

impl IndexResolver {
    pub fn new(variable: impl Into<String>, shape: &[usize]) -> Self {
        Self {
            variable: variable.into(),
            shape: shape.to_vec(),
            growable: vec![false; shape.len()],
        }
    }

    /// Allow coordinates past the current end of the flagged axes.
    ///
    /// Used by writers for unlimited dimensions.
    pub fn with_growable(mut self, flags: &[bool]) -> Self {
        for (slot, &flag) in self.growable.iter_mut().zip(flags) {
            *slot = flag;
        }
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn resolve(&self, expr: &IndexExpr) -> NcResult<AccessPattern> {
        match expr {
            IndexExpr::Address(address) => self.resolve_address(*address),
            IndexExpr::Flatten => Ok(AccessPattern::Flatten),
            IndexExpr::Method(method) => Ok(AccessPattern::MethodCall { method: method.clone() }),
            IndexExpr::Mask(mask) => {
                if mask.shape() != self.shape.as_slice() {
                    return Err(self.error(format!(
                        "mask shape {:?} does not match variable shape {:?}",
                        mask.shape(),
                        self.shape
                    )));
                }
                Ok(AccessPattern::Select { mask: mask.clone() })
            }
            IndexExpr::Terms(terms) => self.resolve_terms(terms),
        }
    }

    fn resolve_address(&self, address: usize) -> NcResult<AccessPattern> {
        let total: usize = self.shape.iter().product();
        let first_grows = self.growable.first().copied().unwrap_or(false);
        if self.shape.is_empty() {
            if address != 0 {
                return Err(self.error(format!("address {} out of range for a scalar", address)));
            }
            return Ok(AccessPattern::Address { address, index: Vec::new() });
        }
        if address >= total && !first_grows {
            return Err(self.error(format!("address {} out of range for {} elements", address, total)));
        }

        let mut index = vec![0; self.shape.len()];
        let mut rest = address;
        for axis in (1..self.shape.len()).rev() {
            let len = self.shape[axis];
            if len == 0 {
                return Err(self.error(format!("axis {} is empty", axis)));
            }
            index[axis] = rest % len;
            rest /= len;
        }
        index[0] = if first_grows { rest } else { rest % self.shape[0].max(1) };
        Ok(AccessPattern::Address { address, index })
    }

    fn resolve_terms(&self, terms: &[IndexTerm]) -> NcResult<AccessPattern> {
        if terms.is_empty() {
            return Ok(AccessPattern::All);
        }
        if terms.len() != self.shape.len() {
            return Err(self.error(format!(
                "{} index terms given for a variable of rank {} (shape {:?})",
                terms.len(),
                self.shape.len(),
                self.shape
            )));
        }

        if terms.iter().all(|t| matches!(t, IndexTerm::Index(_))) {
            let index = terms
                .iter()
                .enumerate()
                .map(|(axis, t)| match t {
                    IndexTerm::Index(i) => self.coordinate(axis, *i),
                    _ => unreachable!("all terms are scalar"),
                })
                .collect::<NcResult<Vec<_>>>()?;
            return Ok(AccessPattern::Point { index });
        }

        if terms.iter().any(|t| matches!(t, IndexTerm::List(_))) {
            let lists = terms
                .iter()
                .enumerate()
                .map(|(axis, t)| self.grid_list(axis, t))
                .collect::<NcResult<Vec<_>>>()?;
            return Ok(AccessPattern::Grid { lists });
        }

        let mut start = Vec::with_capacity(terms.len());
        let mut count = Vec::with_capacity(terms.len());
        let mut stride = Vec::with_capacity(terms.len());
        let mut compact = Vec::new();
        for (axis, term) in terms.iter().enumerate() {
            let (s, c, st) = match term {
                IndexTerm::Index(i) => {
                    compact.push(axis);
                    (self.coordinate(axis, *i)?, 1, 1)
                }
                IndexTerm::Full => (0, self.shape[axis], 1),
                IndexTerm::Slice {
                    start,
                    count,
                    stride,
                } => self.slice(axis, *start, *count, *stride)?,
                IndexTerm::List(_) => unreachable!("lists resolve as a grid"),
            };
            start.push(s);
            count.push(c);
            stride.push(st);
        }
        Ok(AccessPattern::Block {
            start,
            count,
            stride,
            compact,
        })
    }

    fn coordinate(&self, axis: usize, i: isize) -> NcResult<usize> {
        let len = self.shape[axis];
        let resolved = if i < 0 { len as isize + i } else { i };
        if resolved < 0 || (resolved as usize >= len && !self.growable[axis]) {
            return Err(self.error(format!("index {} out of range for axis {} of length {}", i, axis, len)));
        }
        Ok(resolved as usize)
    }

    fn slice(&self, axis: usize, start: isize, count: Option<usize>, stride: usize) -> NcResult<(usize, usize, usize)> {
        if stride == 0 {
            return Err(self.error(format!("zero stride on axis {}", axis)));
        }
        let len = self.shape[axis];
        let first = if start < 0 { len as isize + start } else { start };
        if first < 0 {
            return Err(self.error(format!("start {} out of range for axis {} of length {}", start, axis, len)));
        }
        let first = first as usize;
        let count = match count {
            Some(c) => c,
            None => len.saturating_sub(first).div_ceil(stride),
        };
        if count > 0 {
            let last = (count - 1)
                .checked_mul(stride)
                .and_then(|span| span.checked_add(first))
                .ok_or_else(|| self.error(format!("slice {}+{}x{} overflows on axis {}", first, count, stride, axis)))?;
            if last >= len && !self.growable[axis] {
                return Err(self.error(format!(
                    "slice {}+{}x{} exceeds axis {} of length {}",
                    first, count, stride, axis, len
                )));
            }
        }
        Ok((first, count, stride))
    }

    fn grid_list(&self, axis: usize, term: &IndexTerm) -> NcResult<Vec<usize>> {
        match term {
            IndexTerm::Index(i) => Ok(vec![self.coordinate(axis, *i)?]),
            IndexTerm::Full => Ok((0..self.shape[axis]).collect()),
            IndexTerm::List(list) => list.iter().map(|&i| self.coordinate(axis, i)).collect(),
            IndexTerm::Slice {
                start,
                count,
                stride,
            } => {
                let (first, count, stride) = self.slice(axis, *start, *count, *stride)?;
                Ok((0..count).map(|k| first + k * stride).collect())
            }
        }
    }

    fn error(&self, message: String) -> NcError {
        NcError::invalid_index(self.variable.clone(), message)
    }
}
