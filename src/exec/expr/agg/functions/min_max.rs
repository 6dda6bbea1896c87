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
use std::cmp::Ordering;

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;

use crate::exec::hash_table::{GroupByHashTable, GroupKeyColumns};
use crate::exec::types::{
    CompareFn, TypedValue, ValueType, is_supported_type, resolve_comparator, supports_ordering,
};

use super::super::{AggregationHandle, AggregationId, AggregationState, ExtremeState, GuardedState};
use super::AggregateFunction;
use super::common::{for_each_group_row, single_argument, state_mismatch};
use super::sum::typed_view;

/// MIN or MAX; `id` picks which.
pub(super) struct ExtremeAgg {
    pub(super) id: AggregationId,
}

impl AggregateFunction for ExtremeAgg {
    fn id(&self) -> AggregationId {
        self.id
    }

    fn can_apply_to_types(&self, argument_types: &[DataType]) -> bool {
        match argument_types {
            [argument] => {
                is_supported_type(argument) && supports_ordering(argument)
            }
            _ => false,
        }
    }

    fn result_type_for_argument_types(&self, argument_types: &[DataType]) -> Option<ValueType> {
        if !self.can_apply_to_types(argument_types) {
            return None;
        }
        Some(ValueType::nullable(argument_types[0].clone()))
    }

    fn create_handle(&self, argument_types: &[DataType]) -> Box<dyn AggregationHandle> {
        let result_type = self.checked_result_type(argument_types);
        let argument_type = argument_types[0].clone();
        let comparator = match resolve_comparator(&argument_type, &argument_type) {
            Some(cmp) => cmp,
            None => panic!("{:?} has no ordering", argument_type),
        };
        Box::new(ExtremeHandle {
            id: self.id,
            argument_types: vec![argument_type],
            result_type,
            comparator,
            wanted: match self.id {
                AggregationId::Min => Ordering::Less,
                _ => Ordering::Greater,
            },
        })
    }
}

pub(super) struct ExtremeHandle {
    id: AggregationId,
    argument_types: Vec<DataType>,
    result_type: ValueType,
    comparator: CompareFn,
    wanted: Ordering,
}

impl ExtremeHandle {
    /// True iff `candidate` should replace `current`: the current extreme is
    /// NULL, or the candidate is strictly more extreme. NULL candidates
    /// never win.
    #[inline]
    fn replaces(&self, candidate: &TypedValue, current: &TypedValue) -> bool {
        if candidate.is_null() {
            return false;
        }
        current.is_null() || (self.comparator)(candidate, current) == self.wanted
    }

    fn compare_and_update(&self, guarded: &GuardedState<ExtremeState>, candidate: &TypedValue) {
        if candidate.is_null() {
            return;
        }
        guarded.with_lock(|s| {
            if self.replaces(candidate, &s.extreme) {
                s.extreme = candidate.clone();
            }
        });
    }

    fn guarded<'a>(&self, state: &'a AggregationState) -> &'a GuardedState<ExtremeState> {
        match state {
            AggregationState::Extreme(guarded) => guarded,
            other => state_mismatch(self.id, other),
        }
    }
}

impl AggregationHandle for ExtremeHandle {
    fn id(&self) -> AggregationId {
        self.id
    }

    fn argument_types(&self) -> &[DataType] {
        &self.argument_types
    }

    fn result_type(&self) -> &ValueType {
        &self.result_type
    }

    fn create_initial_state(&self) -> AggregationState {
        AggregationState::Extreme(GuardedState::new(ExtremeState::default()))
    }

    fn update_state(&self, arguments: &[ArrayRef], state: &AggregationState) {
        let guarded = self.guarded(state);
        let argument = single_argument(self.id, &self.argument_types[0], arguments);
        let view = typed_view(self.id, argument);
        // Reduce the batch without the lock, then publish once.
        let mut local = TypedValue::Null;
        for row in 0..view.len() {
            let value = view.value_at(row);
            if self.replaces(&value, &local) {
                local = value;
            }
        }
        self.compare_and_update(guarded, &local);
    }

    fn update_groups(
        &self,
        arguments: &[ArrayRef],
        group_keys: &mut GroupKeyColumns<'_>,
        hash_table: &mut dyn GroupByHashTable,
        index: usize,
    ) {
        let argument = single_argument(self.id, &self.argument_types[0], arguments);
        let view = typed_view(self.id, argument);
        for_each_group_row(group_keys, hash_table, index, |row, state| {
            let guarded = self.guarded(state);
            if view.is_null(row) {
                return;
            }
            self.compare_and_update(guarded, &view.value_at(row));
        });
    }

    fn merge_states(&self, source: &AggregationState, destination: &AggregationState) {
        let candidate = self.guarded(source).snapshot().extreme;
        self.compare_and_update(self.guarded(destination), &candidate);
    }

    fn finalize(&self, state: &AggregationState) -> TypedValue {
        self.guarded(state).snapshot().extreme
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;
    use std::sync::Arc;

    #[test]
    fn string_extremes() {
        let input = Arc::new(StringArray::from(vec![Some("pear"), None, Some("apple"), Some("zoo")]))
            as ArrayRef;
        let min = ExtremeAgg { id: AggregationId::Min }.create_handle(&[DataType::Utf8]);
        let max = ExtremeAgg { id: AggregationId::Max }.create_handle(&[DataType::Utf8]);
        assert_eq!(
            min.finalize(&min.accumulate(&[input.clone()])),
            TypedValue::Utf8("apple".to_string())
        );
        assert_eq!(
            max.finalize(&max.accumulate(&[input])),
            TypedValue::Utf8("zoo".to_string())
        );
    }

    #[test]
    fn self_merge_keeps_extreme() {
        let handle = ExtremeAgg { id: AggregationId::Max }.create_handle(&[DataType::Utf8]);
        let input = Arc::new(StringArray::from(vec!["b", "a"])) as ArrayRef;
        let state = handle.accumulate(&[input]);
        handle.merge_states(&state, &state);
        assert_eq!(handle.finalize(&state), TypedValue::Utf8("b".to_string()));
    }
}
