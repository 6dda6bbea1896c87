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
//! Per-worker partial aggregation results and their pairwise merge.

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::DataType;

use crate::exec::expr::agg::{AggregationHandle, AggregationState, merge_group_by_hash_tables};
use crate::exec::hash_table::{DistinctifyTable, GroupByHashTable, GroupKeyColumns, GroupKeyTable};

use super::AggregateInput;

pub(super) enum PartialStates {
    Ungrouped(Vec<AggregationState>),
    Grouped(GroupKeyTable),
}

/// Everything one worker accumulated over its slice of the input. DISTINCT
/// aggregates keep their distinct tuples here and leave their state slot
/// blank until all partials are merged.
pub(super) struct Partial {
    pub(super) states: PartialStates,
    distinct: Vec<Option<DistinctifyTable>>,
}

impl Partial {
    pub(super) fn new(
        handles: &[Box<dyn AggregationHandle>],
        inputs: &[AggregateInput],
        key_types: &[DataType],
    ) -> Self {
        let blank: Vec<AggregationState> =
            handles.iter().map(|h| h.create_initial_state()).collect();
        let states = if key_types.is_empty() {
            PartialStates::Ungrouped(blank)
        } else {
            PartialStates::Grouped(GroupKeyTable::new(blank))
        };
        let distinct = handles
            .iter()
            .zip(inputs)
            .map(|(handle, input)| {
                input
                    .is_distinct
                    .then(|| handle.create_distinctify_hash_table(key_types))
            })
            .collect();
        Self { states, distinct }
    }

    pub(super) fn consume(
        &mut self,
        handles: &[Box<dyn AggregationHandle>],
        inputs: &[AggregateInput],
        batch: &RecordBatch,
        group_keys: &[ArrayRef],
    ) -> Result<(), String> {
        if let PartialStates::Grouped(table) = &mut self.states
            && self.distinct.iter().any(Option::is_some)
        {
            // DISTINCT aggregates only fill their slots after the merge; make
            // sure every group exists even if no other aggregate touches it.
            let mut keys = GroupKeyColumns::new(group_keys)?;
            for row in 0..keys.num_rows() {
                table.upsert(keys.key_at(row));
            }
        }

        for (index, (handle, input)) in handles.iter().zip(inputs).enumerate() {
            let arguments: Vec<ArrayRef> = input
                .argument_ids
                .iter()
                .map(|&id| batch.column(id).clone())
                .collect();
            if let Some(table) = self.distinct[index].as_mut() {
                handle.insert_into_distinctify_hash_table(&arguments, group_keys, table);
                continue;
            }
            match &mut self.states {
                PartialStates::Ungrouped(states) if arguments.is_empty() => {
                    let rows = handle.accumulate_nullary(batch.num_rows());
                    handle.merge_states(&rows, &states[index]);
                }
                PartialStates::Ungrouped(states) => {
                    handle.update_state(&arguments, &states[index]);
                }
                PartialStates::Grouped(table) => {
                    handle.accumulate_into_groups(&arguments, group_keys, table, index);
                }
            }
        }
        Ok(())
    }

    /// Folds `other` into `self`.
    pub(super) fn merge_from(&mut self, other: &Partial, handles: &[Box<dyn AggregationHandle>]) {
        match (&mut self.states, &other.states) {
            (PartialStates::Ungrouped(dst), PartialStates::Ungrouped(src)) => {
                for (index, handle) in handles.iter().enumerate() {
                    handle.merge_states(&src[index], &dst[index]);
                }
            }
            (PartialStates::Grouped(dst), PartialStates::Grouped(src)) => {
                merge_group_by_hash_tables(handles, src, dst);
            }
            _ => panic!("cannot merge grouped and ungrouped partial results"),
        }
        for (dst, src) in self.distinct.iter_mut().zip(&other.distinct) {
            if let (Some(dst), Some(src)) = (dst.as_mut(), src.as_ref()) {
                dst.merge_from(src);
            }
        }
    }

    /// Aggregates the collected distinct tuples into their state slots.
    pub(super) fn resolve_distinct(&mut self, handles: &[Box<dyn AggregationHandle>]) {
        for (index, handle) in handles.iter().enumerate() {
            let Some(table) = self.distinct[index].take() else {
                continue;
            };
            match &mut self.states {
                PartialStates::Ungrouped(states) => {
                    states[index] = handle.aggregate_on_distinctify_hash_table_for_single(&table);
                }
                PartialStates::Grouped(hash_table) => {
                    handle.aggregate_on_distinctify_hash_table_for_group_by(
                        &table, hash_table, index,
                    );
                }
            }
        }
    }
}
