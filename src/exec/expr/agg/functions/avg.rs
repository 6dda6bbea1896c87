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
use arrow::array::ArrayRef;
use arrow::datatypes::DataType;

use crate::exec::hash_table::{GroupByHashTable, GroupKeyColumns};
use crate::exec::types::{
    DivideFn, TypedValue, ValueType, resolve_divide_by_double, supports_addition,
    supports_division_by_double, widened_sum_type,
};

use super::super::views::non_null_count;
use super::super::{
    AggregationHandle, AggregationId, AggregationState, AtomicAvgState, GuardedState,
    TypedAvgState,
};
use super::AggregateFunction;
use super::common::{float_view, for_each_group_row, int_view, single_argument, state_mismatch};
use super::sum::{SumPath, fold_typed, typed_view};

pub(super) struct AvgAgg;

impl AggregateFunction for AvgAgg {
    fn id(&self) -> AggregationId {
        AggregationId::Avg
    }

    /// Needs addition on the widened sum type and division of that sum by a
    /// DOUBLE count.
    fn can_apply_to_types(&self, argument_types: &[DataType]) -> bool {
        match argument_types {
            [argument] => {
                supports_addition(argument)
                    && widened_sum_type(argument).is_some_and(|sum_type| {
                        supports_division_by_double(&sum_type)
                    })
            }
            _ => false,
        }
    }

    fn result_type_for_argument_types(&self, argument_types: &[DataType]) -> Option<ValueType> {
        if !self.can_apply_to_types(argument_types) {
            return None;
        }
        let sum_type = widened_sum_type(&argument_types[0])?;
        resolve_divide_by_double(&sum_type).map(|(result, _)| ValueType::nullable(result))
    }

    fn create_handle(&self, argument_types: &[DataType]) -> Box<dyn AggregationHandle> {
        let result_type = self.checked_result_type(argument_types);
        let argument_type = argument_types[0].clone();
        let sum_type = match widened_sum_type(&argument_type) {
            Some(t) => t,
            None => panic!("avg has no sum type for {:?}", argument_type),
        };
        let divide = match resolve_divide_by_double(&sum_type) {
            Some((_, divide)) => divide,
            None => panic!("avg cannot divide {:?} by double", sum_type),
        };
        let path = SumPath::for_type(&argument_type, &sum_type);
        Box::new(AvgHandle {
            argument_types: vec![argument_type],
            result_type,
            path,
            divide,
        })
    }
}

/// AVG keeps a widened sum and a count, each updated through the same path
/// SUM and COUNT would use on their own.
pub(super) struct AvgHandle {
    argument_types: Vec<DataType>,
    result_type: ValueType,
    path: SumPath,
    divide: DivideFn,
}

impl AvgHandle {
    fn argument<'a>(&self, arguments: &'a [ArrayRef]) -> &'a ArrayRef {
        single_argument(AggregationId::Avg, &self.argument_types[0], arguments)
    }
}

impl AggregationHandle for AvgHandle {
    fn id(&self) -> AggregationId {
        AggregationId::Avg
    }

    fn argument_types(&self) -> &[DataType] {
        &self.argument_types
    }

    fn result_type(&self) -> &ValueType {
        &self.result_type
    }

    fn create_initial_state(&self) -> AggregationState {
        match &self.path {
            SumPath::Long => AggregationState::AvgLong(AtomicAvgState::default()),
            SumPath::Double => AggregationState::AvgDouble(AtomicAvgState::default()),
            SumPath::Typed { zero, .. } => AggregationState::AvgTyped(GuardedState::new(
                TypedAvgState {
                    sum: zero.clone(),
                    count: 0,
                },
            )),
        }
    }

    fn update_state(&self, arguments: &[ArrayRef], state: &AggregationState) {
        let argument = self.argument(arguments);
        let count = non_null_count(argument.as_ref());
        if count == 0 {
            return;
        }
        match (&self.path, state) {
            (SumPath::Long, AggregationState::AvgLong(avg)) => {
                if let Some(v) = int_view(AggregationId::Avg, argument).sum_non_null() {
                    avg.sum.add(v);
                }
                avg.count.add(count);
            }
            (SumPath::Double, AggregationState::AvgDouble(avg)) => {
                if let Some(v) = float_view(AggregationId::Avg, argument).sum_non_null() {
                    avg.sum.add(v);
                }
                avg.count.add(count);
            }
            (SumPath::Typed { add, .. }, AggregationState::AvgTyped(guarded)) => {
                let partial = fold_typed(&typed_view(AggregationId::Avg, argument), add);
                guarded.with_lock(|s| {
                    s.sum = add.apply(&s.sum, &partial);
                    s.count += count;
                });
            }
            (_, other) => state_mismatch(AggregationId::Avg, other),
        }
    }

    fn update_groups(
        &self,
        arguments: &[ArrayRef],
        group_keys: &mut GroupKeyColumns<'_>,
        hash_table: &mut dyn GroupByHashTable,
        index: usize,
    ) {
        let argument = self.argument(arguments);
        match &self.path {
            SumPath::Long => {
                let view = int_view(AggregationId::Avg, argument);
                for_each_group_row(group_keys, hash_table, index, |row, state| {
                    let Some(v) = view.value_at(row) else { return };
                    match state {
                        AggregationState::AvgLong(avg) => {
                            avg.sum.add(v);
                            avg.count.add(1);
                        }
                        other => state_mismatch(AggregationId::Avg, other),
                    }
                });
            }
            SumPath::Double => {
                let view = float_view(AggregationId::Avg, argument);
                for_each_group_row(group_keys, hash_table, index, |row, state| {
                    let Some(v) = view.value_at(row) else { return };
                    match state {
                        AggregationState::AvgDouble(avg) => {
                            avg.sum.add(v);
                            avg.count.add(1);
                        }
                        other => state_mismatch(AggregationId::Avg, other),
                    }
                });
            }
            SumPath::Typed { add, .. } => {
                let view = typed_view(AggregationId::Avg, argument);
                for_each_group_row(group_keys, hash_table, index, |row, state| {
                    let value = view.value_at(row);
                    if value.is_null() {
                        return;
                    }
                    match state {
                        AggregationState::AvgTyped(guarded) => guarded.with_lock(|s| {
                            s.sum = add.apply(&s.sum, &value);
                            s.count += 1;
                        }),
                        other => state_mismatch(AggregationId::Avg, other),
                    }
                });
            }
        }
    }

    fn merge_states(&self, source: &AggregationState, destination: &AggregationState) {
        match (source, destination) {
            (AggregationState::AvgLong(src), AggregationState::AvgLong(dst)) => {
                dst.sum.merge_from(&src.sum);
                dst.count.add(src.count.count());
            }
            (AggregationState::AvgDouble(src), AggregationState::AvgDouble(dst)) => {
                dst.sum.merge_from(&src.sum);
                dst.count.add(src.count.count());
            }
            (AggregationState::AvgTyped(src), AggregationState::AvgTyped(dst)) => {
                let SumPath::Typed { add, .. } = &self.path else {
                    state_mismatch(AggregationId::Avg, destination)
                };
                let src = src.snapshot();
                if src.count == 0 {
                    return;
                }
                dst.with_lock(|d| {
                    d.sum = add.apply(&d.sum, &src.sum);
                    d.count += src.count;
                });
            }
            (AggregationState::AvgLong(_), other)
            | (AggregationState::AvgDouble(_), other)
            | (AggregationState::AvgTyped(_), other) => state_mismatch(AggregationId::Avg, other),
            (other, _) => state_mismatch(AggregationId::Avg, other),
        }
    }

    fn finalize(&self, state: &AggregationState) -> TypedValue {
        let (sum, count) = match state {
            AggregationState::AvgLong(avg) => (TypedValue::Int64(avg.sum.sum()), avg.count.count()),
            AggregationState::AvgDouble(avg) => {
                (TypedValue::Float64(avg.sum.sum()), avg.count.count())
            }
            AggregationState::AvgTyped(guarded) => {
                let s = guarded.snapshot();
                (s.sum, s.count)
            }
            other => state_mismatch(AggregationId::Avg, other),
        };
        if count == 0 {
            return TypedValue::Null;
        }
        (self.divide)(&sum, count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::types::year_month_interval_type;
    use arrow::array::{Float32Array, IntervalYearMonthArray};
    use std::sync::Arc;

    #[test]
    fn float_avg_widens_to_double() {
        let handle = AvgAgg.create_handle(&[DataType::Float32]);
        assert_eq!(handle.result_type().data_type, DataType::Float64);
        let input = Arc::new(Float32Array::from(vec![Some(1.5), None, Some(2.5)])) as ArrayRef;
        assert_eq!(
            handle.finalize(&handle.accumulate(&[input])),
            TypedValue::Float64(2.0)
        );
    }

    #[test]
    fn year_month_avg_truncates() {
        let handle = AvgAgg.create_handle(&[year_month_interval_type()]);
        assert_eq!(handle.result_type().data_type, year_month_interval_type());
        let input = Arc::new(IntervalYearMonthArray::from(vec![Some(12), Some(13), None]))
            as ArrayRef;
        assert_eq!(
            handle.finalize(&handle.accumulate(&[input])),
            TypedValue::IntervalYearMonth(12)
        );
    }
}
