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
use arrow::array::{Array, ArrayRef};
use arrow::datatypes::DataType;

use crate::exec::hash_table::{GroupByHashTable, GroupKeyColumns};
use crate::exec::types::{TypedValue, ValueType, is_supported_type};

use super::super::views::non_null_count;
use super::super::{AggregationHandle, AggregationId, AggregationState, CountState};
use super::AggregateFunction;
use super::common::{for_each_group_row, state_mismatch};

pub(super) struct CountAgg;

impl AggregateFunction for CountAgg {
    fn id(&self) -> AggregationId {
        AggregationId::Count
    }

    /// COUNT(*) takes no argument; COUNT(x) takes one of any type.
    fn can_apply_to_types(&self, argument_types: &[DataType]) -> bool {
        match argument_types {
            [] => true,
            [argument] => is_supported_type(argument),
            _ => false,
        }
    }

    fn result_type_for_argument_types(&self, argument_types: &[DataType]) -> Option<ValueType> {
        self.can_apply_to_types(argument_types)
            .then(|| ValueType::not_null(DataType::Int64))
    }

    fn create_handle(&self, argument_types: &[DataType]) -> Box<dyn AggregationHandle> {
        let result_type = self.checked_result_type(argument_types);
        Box::new(CountHandle {
            argument_types: argument_types.to_vec(),
            result_type,
        })
    }
}

/// COUNT(x) counts non-null values of x; COUNT(*) counts rows.
pub(super) struct CountHandle {
    argument_types: Vec<DataType>,
    result_type: ValueType,
}

impl CountHandle {
    fn is_count_star(&self) -> bool {
        self.argument_types.is_empty()
    }

    fn counter<'a>(&self, state: &'a AggregationState) -> &'a CountState {
        match state {
            AggregationState::Count(count) => count,
            other => state_mismatch(AggregationId::Count, other),
        }
    }

    fn check_arguments(&self, arguments: &[ArrayRef]) {
        assert_eq!(
            arguments.len(),
            self.argument_types.len(),
            "count expects {} arguments, got {}",
            self.argument_types.len(),
            arguments.len()
        );
        if let (Some(argument), Some(expected)) = (arguments.first(), self.argument_types.first()) {
            assert_eq!(
                argument.data_type(),
                expected,
                "count bound to {:?} received a {:?} column",
                expected,
                argument.data_type()
            );
        }
    }
}

impl AggregationHandle for CountHandle {
    fn id(&self) -> AggregationId {
        AggregationId::Count
    }

    fn argument_types(&self) -> &[DataType] {
        &self.argument_types
    }

    fn result_type(&self) -> &ValueType {
        &self.result_type
    }

    fn create_initial_state(&self) -> AggregationState {
        AggregationState::Count(CountState::default())
    }

    fn update_state(&self, arguments: &[ArrayRef], state: &AggregationState) {
        assert!(
            !self.is_count_star(),
            "count(*) has no argument column; use accumulate_nullary"
        );
        self.check_arguments(arguments);
        self.counter(state).add(non_null_count(arguments[0].as_ref()));
    }

    fn accumulate_nullary(&self, num_rows: usize) -> AggregationState {
        assert!(self.is_count_star(), "count(x) cannot accumulate without its argument");
        let state = self.create_initial_state();
        self.counter(&state).add(num_rows as i64);
        state
    }

    fn update_groups(
        &self,
        arguments: &[ArrayRef],
        group_keys: &mut GroupKeyColumns<'_>,
        hash_table: &mut dyn GroupByHashTable,
        index: usize,
    ) {
        self.check_arguments(arguments);
        let argument = arguments.first().map(|a| a.as_ref());
        for_each_group_row(group_keys, hash_table, index, |row, state| {
            let counter = self.counter(state);
            match argument {
                Some(values) if values.is_null(row) => {}
                _ => counter.add(1),
            }
        });
    }

    fn merge_states(&self, source: &AggregationState, destination: &AggregationState) {
        let n = self.counter(source).count();
        self.counter(destination).add(n);
    }

    fn finalize(&self, state: &AggregationState) -> TypedValue {
        TypedValue::Int64(self.counter(state).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;
    use std::sync::Arc;

    #[test]
    fn count_of_strings_skips_nulls() {
        let handle = CountAgg.create_handle(&[DataType::Utf8]);
        let input = Arc::new(StringArray::from(vec![Some("a"), None, Some("b")])) as ArrayRef;
        assert_eq!(
            handle.finalize(&handle.accumulate(&[input])),
            TypedValue::Int64(2)
        );
        assert!(!handle.result_type().nullable);
    }

    #[test]
    #[should_panic(expected = "accumulate_nullary")]
    fn count_star_needs_row_count() {
        let handle = CountAgg.create_handle(&[]);
        handle.accumulate(&[]);
    }
}
