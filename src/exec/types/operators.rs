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
//! Arithmetic and comparison operators over `TypedValue`.
//!
//! Every operator is resolved once for a pair of argument types and handed
//! out as a plain function pointer, so per-row evaluation never re-inspects
//! the declared column types.

use std::cmp::Ordering;

use arrow::datatypes::{DataType, IntervalUnit, TimeUnit};

use super::{TypedValue, is_float_type, is_integer_type, is_numeric_type};

pub type BinaryFn = fn(&TypedValue, &TypedValue) -> TypedValue;
pub type CompareFn = fn(&TypedValue, &TypedValue) -> Ordering;
pub type DivideFn = fn(&TypedValue, f64) -> TypedValue;

/// A resolved binary arithmetic operator and the type it produces.
#[derive(Clone, Copy, Debug)]
pub struct ArithmeticOperator {
    result_type_tag: ResultTag,
    apply: BinaryFn,
}

/// Result family of an arithmetic operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResultTag {
    Int32,
    Int64,
    Float32,
    Float64,
    Duration,
    IntervalYearMonth,
}

impl ArithmeticOperator {
    /// Applies the operator. NULL on either side yields NULL.
    #[inline]
    pub fn apply(&self, left: &TypedValue, right: &TypedValue) -> TypedValue {
        if left.is_null() || right.is_null() {
            return TypedValue::Null;
        }
        (self.apply)(left, right)
    }

    pub fn result_type(&self) -> DataType {
        match self.result_type_tag {
            ResultTag::Int32 => DataType::Int32,
            ResultTag::Int64 => DataType::Int64,
            ResultTag::Float32 => DataType::Float32,
            ResultTag::Float64 => DataType::Float64,
            ResultTag::Duration => DataType::Duration(TimeUnit::Microsecond),
            ResultTag::IntervalYearMonth => DataType::Interval(IntervalUnit::YearMonth),
        }
    }
}

fn numeric_result_tag(left: &DataType, right: &DataType) -> Option<ResultTag> {
    if !is_numeric_type(left) || !is_numeric_type(right) {
        return None;
    }
    let tag = match (left, right) {
        (DataType::Int32, DataType::Int32) => ResultTag::Int32,
        (DataType::Float32, DataType::Float32) => ResultTag::Float32,
        _ if is_integer_type(left) && is_integer_type(right) => ResultTag::Int64,
        (DataType::Float32, DataType::Int32) | (DataType::Int32, DataType::Float32) => {
            ResultTag::Float32
        }
        _ => ResultTag::Float64,
    };
    Some(tag)
}

macro_rules! numeric_op {
    ($name:ident, $int_op:ident, $float_op:tt) => {
        mod $name {
            use super::TypedValue;

            pub(super) fn int32(l: &TypedValue, r: &TypedValue) -> TypedValue {
                match (l, r) {
                    (TypedValue::Int32(a), TypedValue::Int32(b)) => TypedValue::Int32(a.$int_op(*b)),
                    _ => mismatch(l, r),
                }
            }

            pub(super) fn int64(l: &TypedValue, r: &TypedValue) -> TypedValue {
                match (l.as_i64(), r.as_i64()) {
                    (Some(a), Some(b)) => TypedValue::Int64(a.$int_op(b)),
                    _ => mismatch(l, r),
                }
            }

            pub(super) fn float32(l: &TypedValue, r: &TypedValue) -> TypedValue {
                match (l.as_f64(), r.as_f64()) {
                    (Some(a), Some(b)) => TypedValue::Float32((a as f32) $float_op (b as f32)),
                    _ => mismatch(l, r),
                }
            }

            pub(super) fn float64(l: &TypedValue, r: &TypedValue) -> TypedValue {
                match (l.as_f64(), r.as_f64()) {
                    (Some(a), Some(b)) => TypedValue::Float64(a $float_op b),
                    _ => mismatch(l, r),
                }
            }

            pub(super) fn duration(l: &TypedValue, r: &TypedValue) -> TypedValue {
                match (l, r) {
                    (TypedValue::Duration(a), TypedValue::Duration(b)) => {
                        TypedValue::Duration(a.$int_op(*b))
                    }
                    _ => mismatch(l, r),
                }
            }

            pub(super) fn year_month(l: &TypedValue, r: &TypedValue) -> TypedValue {
                match (l, r) {
                    (TypedValue::IntervalYearMonth(a), TypedValue::IntervalYearMonth(b)) => {
                        TypedValue::IntervalYearMonth(a.$int_op(*b))
                    }
                    _ => mismatch(l, r),
                }
            }

            fn mismatch(l: &TypedValue, r: &TypedValue) -> TypedValue {
                panic!(
                    concat!(stringify!($name), " operator applied to mismatched values {:?} and {:?}"),
                    l, r
                )
            }
        }
    };
}

numeric_op!(add, wrapping_add, +);
numeric_op!(subtract, wrapping_sub, -);

fn resolve_arithmetic(
    left: &DataType,
    right: &DataType,
    table: [BinaryFn; 6],
) -> Option<ArithmeticOperator> {
    let [int32, int64, float32, float64, duration, year_month] = table;
    let (tag, apply) = match (left, right) {
        (DataType::Duration(TimeUnit::Microsecond), DataType::Duration(TimeUnit::Microsecond)) => {
            (ResultTag::Duration, duration)
        }
        (
            DataType::Interval(IntervalUnit::YearMonth),
            DataType::Interval(IntervalUnit::YearMonth),
        ) => (ResultTag::IntervalYearMonth, year_month),
        _ => {
            let tag = numeric_result_tag(left, right)?;
            let apply = match tag {
                ResultTag::Int32 => int32,
                ResultTag::Int64 => int64,
                ResultTag::Float32 => float32,
                _ => float64,
            };
            (tag, apply)
        }
    };
    Some(ArithmeticOperator {
        result_type_tag: tag,
        apply,
    })
}

/// Resolves `left + right`. Integer addition wraps on overflow.
pub fn resolve_add(left: &DataType, right: &DataType) -> Option<ArithmeticOperator> {
    resolve_arithmetic(
        left,
        right,
        [
            add::int32,
            add::int64,
            add::float32,
            add::float64,
            add::duration,
            add::year_month,
        ],
    )
}

/// Resolves `left - right`. Integer subtraction wraps on overflow.
pub fn resolve_subtract(left: &DataType, right: &DataType) -> Option<ArithmeticOperator> {
    resolve_arithmetic(
        left,
        right,
        [
            subtract::int32,
            subtract::int64,
            subtract::float32,
            subtract::float64,
            subtract::duration,
            subtract::year_month,
        ],
    )
}

pub fn supports_addition(data_type: &DataType) -> bool {
    resolve_add(data_type, data_type).is_some()
}

fn divide_numeric(value: &TypedValue, divisor: f64) -> TypedValue {
    match value.as_f64() {
        Some(v) => TypedValue::Float64(v / divisor),
        None => TypedValue::Null,
    }
}

fn divide_duration(value: &TypedValue, divisor: f64) -> TypedValue {
    match value {
        TypedValue::Duration(v) => TypedValue::Duration((*v as f64 / divisor) as i64),
        _ => TypedValue::Null,
    }
}

fn divide_year_month(value: &TypedValue, divisor: f64) -> TypedValue {
    match value {
        TypedValue::IntervalYearMonth(v) => {
            TypedValue::IntervalYearMonth((*v as f64 / divisor) as i32)
        }
        _ => TypedValue::Null,
    }
}

/// Resolves division of a `data_type` value by a DOUBLE. Numeric operands
/// produce DOUBLE, interval operands keep their type (truncating).
pub fn resolve_divide_by_double(data_type: &DataType) -> Option<(DataType, DivideFn)> {
    match data_type {
        t if is_numeric_type(t) => Some((DataType::Float64, divide_numeric as DivideFn)),
        DataType::Duration(TimeUnit::Microsecond) => {
            Some((data_type.clone(), divide_duration as DivideFn))
        }
        DataType::Interval(IntervalUnit::YearMonth) => {
            Some((data_type.clone(), divide_year_month as DivideFn))
        }
        _ => None,
    }
}

pub fn supports_division_by_double(data_type: &DataType) -> bool {
    resolve_divide_by_double(data_type).is_some()
}

fn compare_integers(l: &TypedValue, r: &TypedValue) -> Ordering {
    match (l.as_i64(), r.as_i64()) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => compare_mismatch(l, r),
    }
}

fn compare_floats(l: &TypedValue, r: &TypedValue) -> Ordering {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        _ => compare_mismatch(l, r),
    }
}

fn compare_same_kind(l: &TypedValue, r: &TypedValue) -> Ordering {
    match (l, r) {
        (TypedValue::Date32(a), TypedValue::Date32(b)) => a.cmp(b),
        (TypedValue::Timestamp(a), TypedValue::Timestamp(b)) => a.cmp(b),
        (TypedValue::Duration(a), TypedValue::Duration(b)) => a.cmp(b),
        (TypedValue::IntervalYearMonth(a), TypedValue::IntervalYearMonth(b)) => a.cmp(b),
        (TypedValue::Utf8(a), TypedValue::Utf8(b)) => a.cmp(b),
        _ => compare_mismatch(l, r),
    }
}

fn compare_mismatch(l: &TypedValue, r: &TypedValue) -> Ordering {
    panic!("comparator applied to mismatched values {:?} and {:?}", l, r)
}

/// Resolves a total order between non-null values of `left` and `right`.
/// Numeric types compare across widths; other types only with themselves.
/// Callers handle NULL before comparing.
pub fn resolve_comparator(left: &DataType, right: &DataType) -> Option<CompareFn> {
    if is_integer_type(left) && is_integer_type(right) {
        return Some(compare_integers);
    }
    if is_numeric_type(left) && is_numeric_type(right) {
        debug_assert!(is_float_type(left) || is_float_type(right));
        return Some(compare_floats);
    }
    if left != right {
        return None;
    }
    match left {
        DataType::Date32
        | DataType::Utf8
        | DataType::Timestamp(TimeUnit::Microsecond, None)
        | DataType::Duration(TimeUnit::Microsecond)
        | DataType::Interval(IntervalUnit::YearMonth) => Some(compare_same_kind),
        _ => None,
    }
}

pub fn supports_ordering(data_type: &DataType) -> bool {
    resolve_comparator(data_type, data_type).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_widens_mixed_integers() {
        let op = resolve_add(&DataType::Int32, &DataType::Int64).unwrap();
        assert_eq!(op.result_type(), DataType::Int64);
        assert_eq!(
            op.apply(&TypedValue::Int32(2), &TypedValue::Int64(40)),
            TypedValue::Int64(42)
        );
        assert!(op.apply(&TypedValue::Null, &TypedValue::Int64(1)).is_null());
    }

    #[test]
    fn interval_arithmetic_stays_in_type() {
        let dur = DataType::Duration(TimeUnit::Microsecond);
        let sub = resolve_subtract(&dur, &dur).unwrap();
        assert_eq!(
            sub.apply(&TypedValue::Duration(10), &TypedValue::Duration(3)),
            TypedValue::Duration(7)
        );
        assert!(resolve_add(&dur, &DataType::Int64).is_none());
        assert!(resolve_add(&DataType::Utf8, &DataType::Utf8).is_none());
    }

    #[test]
    fn comparators_cover_orderable_types() {
        assert!(supports_ordering(&DataType::Utf8));
        assert!(supports_ordering(&DataType::Date32));
        assert!(!supports_ordering(&DataType::Boolean));
        let cmp = resolve_comparator(&DataType::Int32, &DataType::Float64).unwrap();
        assert_eq!(
            cmp(&TypedValue::Int32(3), &TypedValue::Float64(2.5)),
            Ordering::Greater
        );
        assert!(resolve_comparator(&DataType::Utf8, &DataType::Int32).is_none());
    }

    #[test]
    fn divide_by_double() {
        let (result, div) = resolve_divide_by_double(&DataType::Int64).unwrap();
        assert_eq!(result, DataType::Float64);
        assert_eq!(div(&TypedValue::Int64(9), 3.0), TypedValue::Float64(3.0));
        assert!(resolve_divide_by_double(&DataType::Date32).is_none());
    }
}
