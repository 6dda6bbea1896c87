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
//! Value types consumed by the aggregation core.
//!
//! Columns are Arrow arrays. `ValueType` adds the SQL nullability flag that
//! result-type derivation needs, and `TypedValue` carries one dynamically
//! typed datum (a finalized aggregate, a group key field, a running extreme).

mod operators;
mod typed_value;

pub use operators::{
    ArithmeticOperator, CompareFn, DivideFn, resolve_add, resolve_comparator,
    resolve_divide_by_double, resolve_subtract, supports_addition, supports_division_by_double,
    supports_ordering,
};
pub use typed_value::{TypedColumnView, TypedValue, build_array};

use arrow::datatypes::{DataType, IntervalUnit, TimeUnit};

/// A column type together with its SQL nullability.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ValueType {
    pub data_type: DataType,
    pub nullable: bool,
}

impl ValueType {
    pub fn nullable(data_type: DataType) -> Self {
        Self {
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(data_type: DataType) -> Self {
        Self {
            data_type,
            nullable: false,
        }
    }

    pub fn as_nullable(&self) -> Self {
        Self::nullable(self.data_type.clone())
    }
}

/// DATETIME columns: microseconds since the epoch, no time zone.
pub fn datetime_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, None)
}

/// DATETIME INTERVAL columns: a duration in microseconds.
pub fn datetime_interval_type() -> DataType {
    DataType::Duration(TimeUnit::Microsecond)
}

/// YEAR-MONTH INTERVAL columns: a month count.
pub fn year_month_interval_type() -> DataType {
    DataType::Interval(IntervalUnit::YearMonth)
}

pub fn is_supported_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64
            | DataType::Date32
            | DataType::Utf8
            | DataType::Timestamp(TimeUnit::Microsecond, None)
            | DataType::Duration(TimeUnit::Microsecond)
            | DataType::Interval(IntervalUnit::YearMonth)
    )
}

pub fn is_integer_type(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Int32 | DataType::Int64)
}

pub fn is_float_type(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Float32 | DataType::Float64)
}

pub fn is_numeric_type(data_type: &DataType) -> bool {
    is_integer_type(data_type) || is_float_type(data_type)
}

/// Accumulator type for SUM and AVG. Narrow numerics are widened to reduce
/// overflow and precision loss; interval types keep their own width.
pub fn widened_sum_type(data_type: &DataType) -> Option<DataType> {
    match data_type {
        DataType::Int32 | DataType::Int64 => Some(DataType::Int64),
        DataType::Float32 | DataType::Float64 => Some(DataType::Float64),
        DataType::Duration(TimeUnit::Microsecond) => Some(datetime_interval_type()),
        DataType::Interval(IntervalUnit::YearMonth) => Some(year_month_interval_type()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_promotes_narrow_numerics() {
        assert_eq!(widened_sum_type(&DataType::Int32), Some(DataType::Int64));
        assert_eq!(widened_sum_type(&DataType::Float32), Some(DataType::Float64));
        assert_eq!(
            widened_sum_type(&datetime_interval_type()),
            Some(datetime_interval_type())
        );
        assert_eq!(widened_sum_type(&DataType::Utf8), None);
        assert_eq!(widened_sum_type(&DataType::Date32), None);
    }

    #[test]
    fn nullability_helpers() {
        let t = ValueType::not_null(DataType::Int32);
        assert!(!t.nullable);
        assert!(t.as_nullable().nullable);
        assert_eq!(t.as_nullable().data_type, DataType::Int32);
    }
}
