// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Date32Array, DurationMicrosecondArray, Float32Array, Float64Array,
    Int32Array, Int64Array, IntervalYearMonthArray, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, IntervalUnit, TimeUnit};

use crate::exec::hash_table::hash::{canonical_f32_bits, canonical_f64_bits};

/// One dynamically typed datum.
///
/// Equality and hashing are total: floating point values compare by their
/// canonical bit pattern (all NaNs are one value) so that `TypedValue` can be
/// a field of a group-by key. Ordering goes through a comparator resolved
/// with [`super::resolve_comparator`], never through this type directly.
#[derive(Clone, Debug, Default)]
pub enum TypedValue {
    #[default]
    Null,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Date32(i32),
    /// Microseconds since the epoch.
    Timestamp(i64),
    /// Microseconds.
    Duration(i64),
    /// Months.
    IntervalYearMonth(i32),
    Utf8(String),
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// The Arrow type of a non-null value. `None` for NULL, which is
    /// untyped until it is written into a column.
    pub fn data_type(&self) -> Option<DataType> {
        let data_type = match self {
            TypedValue::Null => return None,
            TypedValue::Int32(_) => DataType::Int32,
            TypedValue::Int64(_) => DataType::Int64,
            TypedValue::Float32(_) => DataType::Float32,
            TypedValue::Float64(_) => DataType::Float64,
            TypedValue::Date32(_) => DataType::Date32,
            TypedValue::Timestamp(_) => DataType::Timestamp(TimeUnit::Microsecond, None),
            TypedValue::Duration(_) => DataType::Duration(TimeUnit::Microsecond),
            TypedValue::IntervalYearMonth(_) => DataType::Interval(IntervalUnit::YearMonth),
            TypedValue::Utf8(_) => DataType::Utf8,
        };
        Some(data_type)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Int32(v) => Some(*v as i64),
            TypedValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Int32(v) => Some(*v as f64),
            TypedValue::Int64(v) => Some(*v as f64),
            TypedValue::Float32(v) => Some(*v as f64),
            TypedValue::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypedValue::Null, TypedValue::Null) => true,
            (TypedValue::Int32(a), TypedValue::Int32(b)) => a == b,
            (TypedValue::Int64(a), TypedValue::Int64(b)) => a == b,
            (TypedValue::Float32(a), TypedValue::Float32(b)) => {
                canonical_f32_bits(*a) == canonical_f32_bits(*b)
            }
            (TypedValue::Float64(a), TypedValue::Float64(b)) => {
                canonical_f64_bits(*a) == canonical_f64_bits(*b)
            }
            (TypedValue::Date32(a), TypedValue::Date32(b)) => a == b,
            (TypedValue::Timestamp(a), TypedValue::Timestamp(b)) => a == b,
            (TypedValue::Duration(a), TypedValue::Duration(b)) => a == b,
            (TypedValue::IntervalYearMonth(a), TypedValue::IntervalYearMonth(b)) => a == b,
            (TypedValue::Utf8(a), TypedValue::Utf8(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TypedValue {}

impl Hash for TypedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TypedValue::Null => {}
            TypedValue::Int32(v) | TypedValue::Date32(v) | TypedValue::IntervalYearMonth(v) => {
                v.hash(state)
            }
            TypedValue::Int64(v) | TypedValue::Timestamp(v) | TypedValue::Duration(v) => {
                v.hash(state)
            }
            TypedValue::Float32(v) => canonical_f32_bits(*v).hash(state),
            TypedValue::Float64(v) => canonical_f64_bits(*v).hash(state),
            TypedValue::Utf8(v) => v.hash(state),
        }
    }
}

/// Typed access to one Arrow column, resolved once per batch.
#[derive(Clone, Debug)]
pub enum TypedColumnView<'a> {
    Int32(&'a Int32Array),
    Int64(&'a Int64Array),
    Float32(&'a Float32Array),
    Float64(&'a Float64Array),
    Date32(&'a Date32Array),
    Timestamp(&'a TimestampMicrosecondArray),
    Duration(&'a DurationMicrosecondArray),
    IntervalYearMonth(&'a IntervalYearMonthArray),
    Utf8(&'a StringArray),
}

fn downcast<'a, T: 'static>(array: &'a dyn Array, name: &str) -> Result<&'a T, String> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| format!("failed to downcast to {}", name))
}

impl<'a> TypedColumnView<'a> {
    pub fn new(array: &'a dyn Array) -> Result<Self, String> {
        match array.data_type() {
            DataType::Int32 => downcast(array, "Int32Array").map(Self::Int32),
            DataType::Int64 => downcast(array, "Int64Array").map(Self::Int64),
            DataType::Float32 => downcast(array, "Float32Array").map(Self::Float32),
            DataType::Float64 => downcast(array, "Float64Array").map(Self::Float64),
            DataType::Date32 => downcast(array, "Date32Array").map(Self::Date32),
            DataType::Timestamp(TimeUnit::Microsecond, None) => {
                downcast(array, "TimestampMicrosecondArray").map(Self::Timestamp)
            }
            DataType::Duration(TimeUnit::Microsecond) => {
                downcast(array, "DurationMicrosecondArray").map(Self::Duration)
            }
            DataType::Interval(IntervalUnit::YearMonth) => {
                downcast(array, "IntervalYearMonthArray").map(Self::IntervalYearMonth)
            }
            DataType::Utf8 => downcast(array, "StringArray").map(Self::Utf8),
            other => Err(format!("unsupported column type: {:?}", other)),
        }
    }

    pub fn len(&self) -> usize {
        self.array().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.array().is_null(row)
    }

    fn array(&self) -> &dyn Array {
        match self {
            TypedColumnView::Int32(arr) => *arr,
            TypedColumnView::Int64(arr) => *arr,
            TypedColumnView::Float32(arr) => *arr,
            TypedColumnView::Float64(arr) => *arr,
            TypedColumnView::Date32(arr) => *arr,
            TypedColumnView::Timestamp(arr) => *arr,
            TypedColumnView::Duration(arr) => *arr,
            TypedColumnView::IntervalYearMonth(arr) => *arr,
            TypedColumnView::Utf8(arr) => *arr,
        }
    }

    /// Equality of two rows of this column; two NULLs are equal.
    #[inline]
    pub fn rows_equal(&self, left: usize, right: usize) -> bool {
        match (self.is_null(left), self.is_null(right)) {
            (true, true) => return true,
            (false, false) => {}
            _ => return false,
        }
        match self {
            TypedColumnView::Int32(arr) => arr.value(left) == arr.value(right),
            TypedColumnView::Int64(arr) => arr.value(left) == arr.value(right),
            TypedColumnView::Float32(arr) => {
                canonical_f32_bits(arr.value(left)) == canonical_f32_bits(arr.value(right))
            }
            TypedColumnView::Float64(arr) => {
                canonical_f64_bits(arr.value(left)) == canonical_f64_bits(arr.value(right))
            }
            TypedColumnView::Date32(arr) => arr.value(left) == arr.value(right),
            TypedColumnView::Timestamp(arr) => arr.value(left) == arr.value(right),
            TypedColumnView::Duration(arr) => arr.value(left) == arr.value(right),
            TypedColumnView::IntervalYearMonth(arr) => arr.value(left) == arr.value(right),
            TypedColumnView::Utf8(arr) => arr.value(left) == arr.value(right),
        }
    }

    pub fn value_at(&self, row: usize) -> TypedValue {
        if self.is_null(row) {
            return TypedValue::Null;
        }
        match self {
            TypedColumnView::Int32(arr) => TypedValue::Int32(arr.value(row)),
            TypedColumnView::Int64(arr) => TypedValue::Int64(arr.value(row)),
            TypedColumnView::Float32(arr) => TypedValue::Float32(arr.value(row)),
            TypedColumnView::Float64(arr) => TypedValue::Float64(arr.value(row)),
            TypedColumnView::Date32(arr) => TypedValue::Date32(arr.value(row)),
            TypedColumnView::Timestamp(arr) => TypedValue::Timestamp(arr.value(row)),
            TypedColumnView::Duration(arr) => TypedValue::Duration(arr.value(row)),
            TypedColumnView::IntervalYearMonth(arr) => {
                TypedValue::IntervalYearMonth(arr.value(row))
            }
            TypedColumnView::Utf8(arr) => TypedValue::Utf8(arr.value(row).to_string()),
        }
    }
}

macro_rules! collect_values {
    ($values:expr, $variant:ident, $array:ty, $data_type:expr) => {{
        let mut out = Vec::with_capacity($values.len());
        for value in $values {
            match value {
                TypedValue::Null => out.push(None),
                TypedValue::$variant(v) => out.push(Some(v.clone())),
                other => {
                    return Err(format!(
                        "value {:?} does not match column type {:?}",
                        other, $data_type
                    ));
                }
            }
        }
        Arc::new(<$array>::from(out)) as ArrayRef
    }};
}

/// Materializes finalized values into an Arrow column of `data_type`.
pub fn build_array(data_type: &DataType, values: &[TypedValue]) -> Result<ArrayRef, String> {
    let array = match data_type {
        DataType::Int32 => collect_values!(values, Int32, Int32Array, data_type),
        DataType::Int64 => collect_values!(values, Int64, Int64Array, data_type),
        DataType::Float32 => collect_values!(values, Float32, Float32Array, data_type),
        DataType::Float64 => collect_values!(values, Float64, Float64Array, data_type),
        DataType::Date32 => collect_values!(values, Date32, Date32Array, data_type),
        DataType::Timestamp(TimeUnit::Microsecond, None) => {
            collect_values!(values, Timestamp, TimestampMicrosecondArray, data_type)
        }
        DataType::Duration(TimeUnit::Microsecond) => {
            collect_values!(values, Duration, DurationMicrosecondArray, data_type)
        }
        DataType::Interval(IntervalUnit::YearMonth) => {
            collect_values!(values, IntervalYearMonth, IntervalYearMonthArray, data_type)
        }
        DataType::Utf8 => collect_values!(values, Utf8, StringArray, data_type),
        other => return Err(format!("unsupported output type: {:?}", other)),
    };
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(value: &TypedValue) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn nan_keys_are_one_group() {
        let a = TypedValue::Float64(f64::NAN);
        let b = TypedValue::Float64(-f64::NAN);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(TypedValue::Int32(1), TypedValue::Int64(1));
        assert_eq!(TypedValue::Null, TypedValue::Null);
    }

    #[test]
    fn column_view_reads_nulls_and_values() {
        let arr = Int32Array::from(vec![Some(7), None]);
        let view = TypedColumnView::new(&arr).unwrap();
        assert_eq!(view.value_at(0), TypedValue::Int32(7));
        assert!(view.value_at(1).is_null());

        let strings = StringArray::from(vec![Some("x"), None]);
        let view = TypedColumnView::new(&strings).unwrap();
        assert_eq!(view.value_at(0), TypedValue::Utf8("x".to_string()));
    }

    #[test]
    fn build_array_rejects_mismatched_values() {
        let out = build_array(
            &DataType::Int64,
            &[TypedValue::Int64(1), TypedValue::Null],
        )
        .unwrap();
        let out = out.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(out.value(0), 1);
        assert!(out.is_null(1));

        let err = build_array(&DataType::Int64, &[TypedValue::Float64(1.0)]).unwrap_err();
        assert!(err.contains("does not match"));
    }
}
