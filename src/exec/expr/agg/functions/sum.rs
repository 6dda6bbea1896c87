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
use arrow::datatypes::{DataType, IntervalUnit, TimeUnit};

use crate::exec::hash_table::{GroupByHashTable, GroupKeyColumns};
use crate::exec::types::{
    ArithmeticOperator, TypedColumnView, TypedValue, ValueType, resolve_add, supports_addition,
    widened_sum_type,
};

use super::super::{
    AggregationHandle, AggregationId, AggregationState, AtomicSumState, GuardedState,
    TypedSumState,
};
use super::AggregateFunction;
use super::common::{float_view, for_each_group_row, int_view, single_argument, state_mismatch};

pub(super) struct SumAgg;

impl AggregateFunction for SumAgg {
    fn id(&self) -> AggregationId {
        AggregationId::Sum
    }

    fn can_apply_to_types(&self, argument_types: &[DataType]) -> bool {
        match argument_types {
            [argument] => supports_addition(argument) && widened_sum_type(argument).is_some(),
            _ => false,
        }
    }

    fn result_type_for_argument_types(&self, argument_types: &[DataType]) -> Option<ValueType> {
        if !self.can_apply_to_types(argument_types) {
            return None;
        }
        widened_sum_type(&argument_types[0]).map(ValueType::nullable)
    }

    fn create_handle(&self, argument_types: &[DataType]) -> Box<dyn AggregationHandle> {
        let result_type = self.checked_result_type(argument_types);
        Box::new(SumHandle::new(argument_types[0].clone(), result_type))
    }
}

/// How a SUM accumulates. Primitive numerics use atomics; everything else
/// adds `TypedValue`s under the slot lock.
#[derive(Clone, Debug)]
pub(super) enum SumPath {
    Long,
    Double,
    Typed {
        zero: TypedValue,
        add: ArithmeticOperator,
    },
}

impl SumPath {
    pub(super) fn for_type(argument_type: &DataType, sum_type: &DataType) -> Self {
        match sum_type {
            DataType::Int64 => SumPath::Long,
            DataType::Float64 => SumPath::Double,
            other => {
                let zero = match other {
                    DataType::Duration(TimeUnit::Microsecond) => TypedValue::Duration(0),
                    DataType::Interval(IntervalUnit::YearMonth) => {
                        TypedValue::IntervalYearMonth(0)
                    }
                    unsupported => panic!("no zero value for sum type {:?}", unsupported),
                };
                let add = match resolve_add(sum_type, argument_type) {
                    Some(add) => add,
                    None => panic!(
                        "no addition between {:?} and {:?}",
                        sum_type, argument_type
                    ),
                };
                SumPath::Typed { zero, add }
            }
        }
    }
}

/// Adds every non-null value of `view` with `add`; NULL when there are none.
pub(super) fn fold_typed(view: &TypedColumnView<'_>, add: &ArithmeticOperator) -> TypedValue {
    let mut acc = TypedValue::Null;
    for row in 0..view.len() {
        let value = view.value_at(row);
        if value.is_null() {
            continue;
        }
        acc = if acc.is_null() {
            value
        } else {
            add.apply(&acc, &value)
        };
    }
    acc
}

pub(super) fn typed_view<'a>(id: AggregationId, argument: &'a ArrayRef) -> TypedColumnView<'a> {
    match TypedColumnView::new(argument.as_ref()) {
        Ok(view) => view,
        Err(e) => panic!("{}: {e}", id.name()),
    }
}

pub(super) struct SumHandle {
    argument_types: Vec<DataType>,
    result_type: ValueType,
    path: SumPath,
}

impl SumHandle {
    fn new(argument_type: DataType, result_type: ValueType) -> Self {
        let path = SumPath::for_type(&argument_type, &result_type.data_type);
        Self {
            argument_types: vec![argument_type],
            result_type,
            path,
        }
    }

    fn argument<'a>(&self, arguments: &'a [ArrayRef]) -> &'a ArrayRef {
        single_argument(AggregationId::Sum, &self.argument_types[0], arguments)
    }
}

impl AggregationHandle for SumHandle {
    fn id(&self) -> AggregationId {
        AggregationId::Sum
    }

    fn argument_types(&self) -> &[DataType] {
        &self.argument_types
    }

    fn result_type(&self) -> &ValueType {
        &self.result_type
    }

    fn create_initial_state(&self) -> AggregationState {
        match &self.path {
            SumPath::Long => AggregationState::SumLong(AtomicSumState::new()),
            SumPath::Double => AggregationState::SumDouble(AtomicSumState::new()),
            SumPath::Typed { zero, .. } => {
                AggregationState::SumTyped(GuardedState::new(TypedSumState::with_zero(zero.clone())))
            }
        }
    }

    fn update_state(&self, arguments: &[ArrayRef], state: &AggregationState) {
        let argument = self.argument(arguments);
        match (&self.path, state) {
            (SumPath::Long, AggregationState::SumLong(sum)) => {
                if let Some(v) = int_view(AggregationId::Sum, argument).sum_non_null() {
                    sum.add(v);
                }
            }
            (SumPath::Double, AggregationState::SumDouble(sum)) => {
                if let Some(v) = float_view(AggregationId::Sum, argument).sum_non_null() {
                    sum.add(v);
                }
            }
            (SumPath::Typed { add, .. }, AggregationState::SumTyped(guarded)) => {
                let partial = fold_typed(&typed_view(AggregationId::Sum, argument), add);
                if partial.is_null() {
                    return;
                }
                guarded.with_lock(|s| {
                    s.sum = add.apply(&s.sum, &partial);
                    s.is_null = false;
                });
            }
            (_, other) => state_mismatch(AggregationId::Sum, other),
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
                let view = int_view(AggregationId::Sum, argument);
                for_each_group_row(group_keys, hash_table, index, |row, state| {
                    let Some(v) = view.value_at(row) else { return };
                    match state {
                        AggregationState::SumLong(sum) => sum.add(v),
                        other => state_mismatch(AggregationId::Sum, other),
                    }
                });
            }
            SumPath::Double => {
                let view = float_view(AggregationId::Sum, argument);
                for_each_group_row(group_keys, hash_table, index, |row, state| {
                    let Some(v) = view.value_at(row) else { return };
                    match state {
                        AggregationState::SumDouble(sum) => sum.add(v),
                        other => state_mismatch(AggregationId::Sum, other),
                    }
                });
            }
            SumPath::Typed { add, .. } => {
                let view = typed_view(AggregationId::Sum, argument);
                for_each_group_row(group_keys, hash_table, index, |row, state| {
                    let value = view.value_at(row);
                    if value.is_null() {
                        return;
                    }
                    match state {
                        AggregationState::SumTyped(guarded) => guarded.with_lock(|s| {
                            s.sum = add.apply(&s.sum, &value);
                            s.is_null = false;
                        }),
                        other => state_mismatch(AggregationId::Sum, other),
                    }
                });
            }
        }
    }

    fn merge_states(&self, source: &AggregationState, destination: &AggregationState) {
        match (source, destination) {
            (AggregationState::SumLong(src), AggregationState::SumLong(dst)) => {
                dst.merge_from(src)
            }
            (AggregationState::SumDouble(src), AggregationState::SumDouble(dst)) => {
                dst.merge_from(src)
            }
            (AggregationState::SumTyped(src), AggregationState::SumTyped(dst)) => {
                let SumPath::Typed { add, .. } = &self.path else {
                    state_mismatch(AggregationId::Sum, destination)
                };
                // Snapshot first so a self-merge never takes the lock twice.
                let src = src.snapshot();
                if src.is_null {
                    return;
                }
                dst.with_lock(|d| {
                    d.sum = add.apply(&d.sum, &src.sum);
                    d.is_null = false;
                });
            }
            (AggregationState::SumLong(_), other)
            | (AggregationState::SumDouble(_), other)
            | (AggregationState::SumTyped(_), other) => state_mismatch(AggregationId::Sum, other),
            (other, _) => state_mismatch(AggregationId::Sum, other),
        }
    }

    fn finalize(&self, state: &AggregationState) -> TypedValue {
        match state {
            AggregationState::SumLong(sum) if !sum.is_null() => TypedValue::Int64(sum.sum()),
            AggregationState::SumDouble(sum) if !sum.is_null() => TypedValue::Float64(sum.sum()),
            AggregationState::SumTyped(guarded) => {
                let s = guarded.snapshot();
                if s.is_null { TypedValue::Null } else { s.sum }
            }
            AggregationState::SumLong(_) | AggregationState::SumDouble(_) => TypedValue::Null,
            other => state_mismatch(AggregationId::Sum, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{DurationMicrosecondArray, Int32Array};
    use std::sync::Arc;

    #[test]
    fn interval_sum_takes_the_locked_path() {
        let handle = SumAgg.create_handle(&[DataType::Duration(TimeUnit::Microsecond)]);
        let input = Arc::new(DurationMicrosecondArray::from(vec![Some(10), None, Some(5)]))
            as ArrayRef;
        let state = handle.accumulate(&[input]);
        assert!(!state.is_lock_free());
        assert_eq!(handle.finalize(&state), TypedValue::Duration(15));
        assert!(handle.finalize(&handle.create_initial_state()).is_null());
    }

    #[test]
    #[should_panic(expected = "received a")]
    fn wrong_column_type_is_fatal() {
        let handle = SumAgg.create_handle(&[DataType::Int64]);
        let input = Arc::new(Int32Array::from(vec![1])) as ArrayRef;
        handle.accumulate(&[input]);
    }
}
