// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Hierarchical value model.
//!
//! Every codec loads into and saves from a [`Group`]: a mapping from string
//! keys to [`Value`]s. Leaves are typed n-dimensional arrays ([`NdArray`]) or
//! scalars; [`Value::List`] holds heterogeneous sequences such as a list of
//! episode step mappings.
//!
//! Stores that only hold typed arrays (HDF5, Zarr, NumPy) go through
//! [`coerce_leaf`], which turns scalars into zero-dimensional arrays and
//! lists into arrays when they are rectangular and homogeneous.
//!
//! # Example
//!
//! ```
//! use robodata::core::{Group, NdArray, Value};
//!
//! let mut episode = Group::new();
//! episode.insert(
//!     "actions".to_string(),
//!     Value::Array(NdArray::new(vec![2, 2], vec![0.0f64, 0.5, 1.0, 1.5]).unwrap()),
//! );
//! episode.insert("episode_length".to_string(), Value::Int(2));
//! assert_eq!(episode["actions"].type_name(), "array");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum nesting depth of a value tree.
pub const MAX_DEPTH: usize = 64;

/// A mapping from unique keys to values, ordered by key.
pub type Group = BTreeMap<String, Value>;

// =============================================================================
// Element Types
// =============================================================================

/// Element type of an [`NdArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// Boolean
    Bool,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit unsigned integer
    UInt64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// UTF-8 string
    String,
}

impl DType {
    /// Convert to string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::UInt16 => "uint16",
            DType::UInt32 => "uint32",
            DType::UInt64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::String => "string",
        }
    }

    /// Parse an element type from its name.
    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "bool" => Some(DType::Bool),
            "int8" => Some(DType::Int8),
            "int16" => Some(DType::Int16),
            "int32" => Some(DType::Int32),
            "int64" => Some(DType::Int64),
            "uint8" => Some(DType::UInt8),
            "uint16" => Some(DType::UInt16),
            "uint32" => Some(DType::UInt32),
            "uint64" => Some(DType::UInt64),
            "float32" => Some(DType::Float32),
            "float64" => Some(DType::Float64),
            "string" => Some(DType::String),
            _ => None,
        }
    }

    /// Size of one element in bytes, if fixed.
    pub const fn size(self) -> Option<usize> {
        match self {
            DType::Bool | DType::Int8 | DType::UInt8 => Some(1),
            DType::Int16 | DType::UInt16 => Some(2),
            DType::Int32 | DType::UInt32 | DType::Float32 => Some(4),
            DType::Int64 | DType::UInt64 | DType::Float64 => Some(8),
            DType::String => None,
        }
    }

    /// Check if this is a signed or unsigned integer type.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DType::Int8
                | DType::Int16
                | DType::Int32
                | DType::Int64
                | DType::UInt8
                | DType::UInt16
                | DType::UInt32
                | DType::UInt64
        )
    }

    /// Check if this is a floating point type.
    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    /// Check if this is an integer or floating point type.
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Array Storage
// =============================================================================

/// Flat, row-major element storage of an [`NdArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(Vec<String>),
}

macro_rules! impl_array_data_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for ArrayData {
                fn from(v: Vec<$ty>) -> Self {
                    ArrayData::$variant(v)
                }
            }
        )*
    };
}

impl_array_data_from! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    String => String,
}

/// Apply an expression to the vector inside any [`ArrayData`] variant.
macro_rules! with_array_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($v) => $body,
            ArrayData::Int8($v) => $body,
            ArrayData::Int16($v) => $body,
            ArrayData::Int32($v) => $body,
            ArrayData::Int64($v) => $body,
            ArrayData::UInt8($v) => $body,
            ArrayData::UInt16($v) => $body,
            ArrayData::UInt32($v) => $body,
            ArrayData::UInt64($v) => $body,
            ArrayData::Float32($v) => $body,
            ArrayData::Float64($v) => $body,
            ArrayData::String($v) => $body,
        }
    };
}

impl ArrayData {
    /// Element type of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Bool(_) => DType::Bool,
            ArrayData::Int8(_) => DType::Int8,
            ArrayData::Int16(_) => DType::Int16,
            ArrayData::Int32(_) => DType::Int32,
            ArrayData::Int64(_) => DType::Int64,
            ArrayData::UInt8(_) => DType::UInt8,
            ArrayData::UInt16(_) => DType::UInt16,
            ArrayData::UInt32(_) => DType::UInt32,
            ArrayData::UInt64(_) => DType::UInt64,
            ArrayData::Float32(_) => DType::Float32,
            ArrayData::Float64(_) => DType::Float64,
            ArrayData::String(_) => DType::String,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        with_array_data!(self, v => v.len())
    }

    /// Check if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty storage of the given element type.
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::Bool => ArrayData::Bool(Vec::new()),
            DType::Int8 => ArrayData::Int8(Vec::new()),
            DType::Int16 => ArrayData::Int16(Vec::new()),
            DType::Int32 => ArrayData::Int32(Vec::new()),
            DType::Int64 => ArrayData::Int64(Vec::new()),
            DType::UInt8 => ArrayData::UInt8(Vec::new()),
            DType::UInt16 => ArrayData::UInt16(Vec::new()),
            DType::UInt32 => ArrayData::UInt32(Vec::new()),
            DType::UInt64 => ArrayData::UInt64(Vec::new()),
            DType::Float32 => ArrayData::Float32(Vec::new()),
            DType::Float64 => ArrayData::Float64(Vec::new()),
            DType::String => ArrayData::String(Vec::new()),
        }
    }

    /// Element `index` as a scalar value.
    ///
    /// Integers widen to `Int`, floats to `Float`. A `uint64` above
    /// `i64::MAX` becomes a `Float`.
    pub fn element(&self, index: usize) -> Value {
        match self {
            ArrayData::Bool(v) => Value::Bool(v[index]),
            ArrayData::Int8(v) => Value::Int(i64::from(v[index])),
            ArrayData::Int16(v) => Value::Int(i64::from(v[index])),
            ArrayData::Int32(v) => Value::Int(i64::from(v[index])),
            ArrayData::Int64(v) => Value::Int(v[index]),
            ArrayData::UInt8(v) => Value::Int(i64::from(v[index])),
            ArrayData::UInt16(v) => Value::Int(i64::from(v[index])),
            ArrayData::UInt32(v) => Value::Int(i64::from(v[index])),
            ArrayData::UInt64(v) => match i64::try_from(v[index]) {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Float(v[index] as f64),
            },
            ArrayData::Float32(v) => Value::Float(f64::from(v[index])),
            ArrayData::Float64(v) => Value::Float(v[index]),
            ArrayData::String(v) => Value::String(v[index].clone()),
        }
    }

    /// Integer elements widened to `i64`, if this is integer storage that fits.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            ArrayData::Int8(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            ArrayData::Int16(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            ArrayData::Int32(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            ArrayData::Int64(v) => Some(v.clone()),
            ArrayData::UInt8(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            ArrayData::UInt16(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            ArrayData::UInt32(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            ArrayData::UInt64(v) => v.iter().map(|&x| i64::try_from(x).ok()).collect(),
            _ => None,
        }
    }

    /// Numeric elements widened to `f64`, if this is numeric storage.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            ArrayData::Int8(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            ArrayData::Int16(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            ArrayData::Int32(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            ArrayData::Int64(v) => Some(v.iter().map(|&x| x as f64).collect()),
            ArrayData::UInt8(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            ArrayData::UInt16(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            ArrayData::UInt32(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            ArrayData::UInt64(v) => Some(v.iter().map(|&x| x as f64).collect()),
            ArrayData::Float32(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            ArrayData::Float64(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Append `other` to `self`. Both must have the same element type.
    fn extend_from(&mut self, other: ArrayData) -> bool {
        match (self, other) {
            (ArrayData::Bool(a), ArrayData::Bool(b)) => a.extend(b),
            (ArrayData::Int8(a), ArrayData::Int8(b)) => a.extend(b),
            (ArrayData::Int16(a), ArrayData::Int16(b)) => a.extend(b),
            (ArrayData::Int32(a), ArrayData::Int32(b)) => a.extend(b),
            (ArrayData::Int64(a), ArrayData::Int64(b)) => a.extend(b),
            (ArrayData::UInt8(a), ArrayData::UInt8(b)) => a.extend(b),
            (ArrayData::UInt16(a), ArrayData::UInt16(b)) => a.extend(b),
            (ArrayData::UInt32(a), ArrayData::UInt32(b)) => a.extend(b),
            (ArrayData::UInt64(a), ArrayData::UInt64(b)) => a.extend(b),
            (ArrayData::Float32(a), ArrayData::Float32(b)) => a.extend(b),
            (ArrayData::Float64(a), ArrayData::Float64(b)) => a.extend(b),
            (ArrayData::String(a), ArrayData::String(b)) => a.extend(b),
            _ => return false,
        }
        true
    }

    /// Convert to `target`, which must be the same type, `Int64` or `Float64`.
    fn cast(self, target: DType) -> Option<ArrayData> {
        if self.dtype() == target {
            return Some(self);
        }
        match target {
            DType::Int64 => self.to_i64_vec().map(ArrayData::Int64),
            DType::Float64 => self.to_f64_vec().map(ArrayData::Float64),
            _ => None,
        }
    }
}

// =============================================================================
// N-dimensional Array
// =============================================================================

/// Error returned when an array's shape does not match its element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeError {
    /// Element count implied by the shape
    pub expected: usize,
    /// Element count actually provided
    pub actual: usize,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shape holds {} elements but {} were provided",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for ShapeError {}

/// A typed, row-major n-dimensional array.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl NdArray {
    /// Create an array, checking that the data length matches the shape.
    pub fn new(shape: Vec<usize>, data: impl Into<ArrayData>) -> Result<Self, ShapeError> {
        let data = data.into();
        let expected = shape.iter().product::<usize>();
        if expected != data.len() {
            return Err(ShapeError {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Create a one-dimensional array.
    pub fn vector(data: impl Into<ArrayData>) -> Self {
        let data = data.into();
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Create a zero-dimensional array holding a single scalar.
    ///
    /// Returns `None` for non-scalar values.
    pub fn scalar(value: &Value) -> Option<Self> {
        let data = match value {
            Value::Bool(b) => ArrayData::Bool(vec![*b]),
            Value::Int(i) => ArrayData::Int64(vec![*i]),
            Value::Float(f) => ArrayData::Float64(vec![*f]),
            Value::String(s) => ArrayData::String(vec![s.clone()]),
            _ => return None,
        };
        Some(Self {
            shape: Vec::new(),
            data,
        })
    }

    /// Infer an array from a nested list.
    ///
    /// Succeeds when the list is rectangular and its leaves are homogeneous:
    /// elements of one type keep that type, a mix of integer types becomes
    /// `int64`, a mix of integers and floats becomes `float64`. An empty list
    /// becomes a `float64` array of shape `[0]`. Anything else (mappings,
    /// ragged nesting, strings mixed with numbers) returns `None`.
    pub fn from_nested(items: &[Value]) -> Option<Self> {
        if items.is_empty() {
            return Some(Self {
                shape: vec![0],
                data: ArrayData::Float64(Vec::new()),
            });
        }

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let part = match item {
                Value::Array(a) => a.clone(),
                Value::List(inner) => Self::from_nested(inner)?,
                Value::Group(_) => return None,
                scalar => Self::scalar(scalar)?,
            };
            parts.push(part);
        }

        let inner_shape = parts[0].shape.clone();
        if parts.iter().any(|p| p.shape != inner_shape) {
            return None;
        }

        let first = parts[0].dtype();
        let target = if parts.iter().all(|p| p.dtype() == first) {
            first
        } else if parts.iter().all(|p| p.dtype().is_integer()) {
            DType::Int64
        } else if parts.iter().all(|p| p.dtype().is_numeric()) {
            DType::Float64
        } else {
            return None;
        };

        let data = match concat(&parts, target) {
            Some(data) => data,
            // Integer mixes that overflow i64 fall back to float64
            None if target == DType::Int64 => concat(&parts, DType::Float64)?,
            None => return None,
        };

        let mut shape = Vec::with_capacity(inner_shape.len() + 1);
        shape.push(items.len());
        shape.extend(inner_shape);
        Some(Self { shape, data })
    }

    /// Array dimensions.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Element storage.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Render as nested lists of scalars (a scalar for zero dimensions).
    pub fn to_nested(&self) -> Value {
        self.nest(0, 0)
    }

    fn nest(&self, dim: usize, offset: usize) -> Value {
        if dim == self.shape.len() {
            return self.data.element(offset);
        }
        let stride: usize = self.shape[dim + 1..].iter().product();
        Value::List(
            (0..self.shape[dim])
                .map(|i| self.nest(dim + 1, offset + i * stride))
                .collect(),
        )
    }

    /// Approximate in-memory size of the elements in bytes.
    pub fn size_hint(&self) -> usize {
        match &self.data {
            ArrayData::String(v) => v.iter().map(String::len).sum(),
            data => data.len() * data.dtype().size().unwrap_or(0),
        }
    }
}

/// Concatenate the storage of equally shaped parts as `target`.
fn concat(parts: &[NdArray], target: DType) -> Option<ArrayData> {
    let mut data = ArrayData::empty(target);
    for part in parts {
        if !data.extend_from(part.data.clone().cast(target)?) {
            return None;
        }
    }
    Some(data)
}

// =============================================================================
// Values
// =============================================================================

/// A node of the hierarchical value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean scalar
    Bool(bool),
    /// Integer scalar
    Int(i64),
    /// Floating point scalar
    Float(f64),
    /// String scalar
    String(String),
    /// Typed n-dimensional array
    Array(NdArray),
    /// Heterogeneous sequence
    List(Vec<Value>),
    /// Nested mapping
    Group(Group),
}

impl Value {
    /// Wrap an array, collapsing a zero-dimensional array into its scalar.
    pub fn from_array(array: NdArray) -> Value {
        if array.ndim() == 0 && array.len() == 1 {
            array.data.element(0)
        } else {
            Value::Array(array)
        }
    }

    /// Check if this value is a scalar.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// Check if this value is a group.
    pub fn is_group(&self) -> bool {
        matches!(self, Value::Group(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get a numeric scalar as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Value::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Get the type name of this value as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Group(_) => "group",
        }
    }

    /// Estimate the in-memory size of this value in bytes.
    ///
    /// Does not include map or vector overhead.
    pub fn size_hint(&self) -> usize {
        match self {
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 8,
            Value::String(s) => s.len(),
            Value::Array(a) => a.size_hint(),
            Value::List(l) => l.iter().map(Value::size_hint).sum(),
            Value::Group(g) => g.values().map(Value::size_hint).sum(),
        }
    }

    /// Nesting depth: 0 for leaves, 1 + deepest child for lists and groups.
    pub fn depth(&self) -> usize {
        match self {
            Value::List(l) => 1 + l.iter().map(Value::depth).max().unwrap_or(0),
            Value::Group(g) => group_depth(g),
            _ => 0,
        }
    }

    /// Text used when a heterogeneous list degrades to a string array.
    ///
    /// Strings are kept as they are. Everything else is written out in full
    /// as JSON, so nested lists and groups can be parsed back.
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => render_json(other).to_string(),
        }
    }
}

fn render_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map_or_else(|| Json::String(f.to_string()), Json::Number),
        Value::String(s) => Json::String(s.clone()),
        Value::Array(a) => render_json(&a.to_nested()),
        Value::List(items) => Json::Array(items.iter().map(render_json).collect()),
        Value::Group(g) => Json::Object(
            g.iter()
                .map(|(k, v)| (k.clone(), render_json(v)))
                .collect(),
        ),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::Array(a) => write!(f, "<{} array {:?}>", a.dtype(), a.shape()),
            Value::List(l) => write!(f, "[{} elements]", l.len()),
            Value::Group(g) => write!(f, "{{{} keys}}", g.len()),
        }
    }
}

impl From<NdArray> for Value {
    fn from(a: NdArray) -> Self {
        Value::from_array(a)
    }
}

impl From<Group> for Value {
    fn from(g: Group) -> Self {
        Value::Group(g)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Nesting depth of a group (1 + deepest child).
pub fn group_depth(group: &Group) -> usize {
    1 + group.values().map(Value::depth).max().unwrap_or(0)
}

// =============================================================================
// Coercion and Flattening
// =============================================================================

/// A leaf prepared for a typed-array store.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedLeaf {
    /// The array to store
    pub array: NdArray,
    /// True when a heterogeneous list was rendered as strings
    pub lossy: bool,
}

/// Prepare a leaf for a store that only holds typed arrays.
///
/// Scalars become zero-dimensional arrays. Lists become inferred arrays, or,
/// when they are not rectangular and homogeneous, a 1-D string array of each
/// element's rendering (`lossy` is set and a warning is logged). Groups are
/// not leaves and return `None`.
pub fn coerce_leaf(value: &Value, key: &str) -> Option<CoercedLeaf> {
    match value {
        Value::Group(_) => None,
        Value::Array(a) => Some(CoercedLeaf {
            array: a.clone(),
            lossy: false,
        }),
        Value::List(items) => match NdArray::from_nested(items) {
            Some(array) => Some(CoercedLeaf {
                array,
                lossy: false,
            }),
            None => {
                tracing::warn!(
                    key = key,
                    elements = items.len(),
                    "List is not a homogeneous array, storing elements as strings"
                );
                let rendered: Vec<String> = items.iter().map(Value::render).collect();
                Some(CoercedLeaf {
                    array: NdArray::vector(rendered),
                    lossy: true,
                })
            }
        },
        scalar => NdArray::scalar(scalar).map(|array| CoercedLeaf {
            array,
            lossy: false,
        }),
    }
}

/// Flatten nested groups into a single mapping keyed by joined paths.
///
/// Empty groups produce no entries.
pub fn flatten(group: &Group, separator: &str) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(group, "", separator, &mut out);
    out
}

fn flatten_into(group: &Group, prefix: &str, separator: &str, out: &mut BTreeMap<String, Value>) {
    for (key, value) in group {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{separator}{key}")
        };
        match value {
            Value::Group(inner) => flatten_into(inner, &path, separator, out),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Rebuild nested groups from a mapping keyed by joined paths.
///
/// When a path passes through a key that already holds a leaf, the leaf is
/// replaced by a group.
pub fn unflatten(flat: BTreeMap<String, Value>, separator: &str) -> Group {
    let mut root = Group::new();
    for (path, value) in flat {
        let parts: Vec<&str> = path.split(separator).collect();
        insert_path(&mut root, &parts, value);
    }
    root
}

fn insert_path(node: &mut Group, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [last] => {
            node.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = node
                .entry(head.to_string())
                .or_insert_with(|| Value::Group(Group::new()));
            if !entry.is_group() {
                *entry = Value::Group(Group::new());
            }
            if let Value::Group(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}
