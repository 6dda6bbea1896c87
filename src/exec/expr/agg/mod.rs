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
//! Aggregation handles: SUM, MIN, MAX, COUNT and AVG.
//!
//! A handle is bound to one (function, argument type) pair when it is
//! created by the factory. It creates, updates, merges and finalizes
//! [`AggregationState`]s, either one ungrouped state or one state per group
//! inside a [`GroupByHashTable`].

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;

use crate::exec::hash_table::{
    DistinctifyTable, GroupByHashTable, GroupKey, GroupKeyColumns,
};
use crate::exec::types::{TypedValue, ValueType, build_array};

mod functions;
mod merge;
mod state_types;
mod views;

pub use functions::{AggregateFunction, get_aggregate_function, resolve_by_name};
pub use merge::merge_group_by_hash_tables;
pub use state_types::{
    AggregationState, AtomicAccumulate, AtomicAvgState, AtomicSumState, CountState,
    ExtremeState, GuardedState, TypedAvgState, TypedSumState,
};
pub use views::{FloatArrayView, IntArrayView};

/// The closed set of aggregate functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregationId {
    Sum,
    Min,
    Max,
    Count,
    Avg,
}

impl AggregationId {
    pub fn name(&self) -> &'static str {
        match self {
            AggregationId::Sum => "sum",
            AggregationId::Min => "min",
            AggregationId::Max => "max",
            AggregationId::Count => "count",
            AggregationId::Avg => "avg",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(AggregationId::Sum),
            "min" => Some(AggregationId::Min),
            "max" => Some(AggregationId::Max),
            "count" => Some(AggregationId::Count),
            "avg" => Some(AggregationId::Avg),
            _ => None,
        }
    }
}

/// Create, update, merge and finalize the states of one aggregate.
///
/// Calling any method with arguments of a type other than the bound one,
/// or with a state created by another handle kind, is a contract violation
/// and panics. The factory's `can_apply_to_types` is the place to reject
/// bad argument types.
pub trait AggregationHandle: Send + Sync {
    fn id(&self) -> AggregationId;

    fn argument_types(&self) -> &[DataType];

    fn result_type(&self) -> &ValueType;

    /// The identity state: the aggregate over zero rows.
    fn create_initial_state(&self) -> AggregationState;

    /// Folds every non-null row of `arguments` into `state`. Safe to call
    /// concurrently on one state for the lock-free kinds.
    fn update_state(&self, arguments: &[ArrayRef], state: &AggregationState);

    /// Per-row grouped update: looks up (or creates) each row's group and
    /// updates its state at `index`.
    fn update_groups(
        &self,
        arguments: &[ArrayRef],
        group_keys: &mut GroupKeyColumns<'_>,
        hash_table: &mut dyn GroupByHashTable,
        index: usize,
    );

    /// Folds `source` into `destination`. `source` is not modified.
    fn merge_states(&self, source: &AggregationState, destination: &AggregationState);

    fn finalize(&self, state: &AggregationState) -> TypedValue;

    fn accumulate(&self, arguments: &[ArrayRef]) -> AggregationState {
        let state = self.create_initial_state();
        self.update_state(arguments, &state);
        state
    }

    /// Aggregates `num_rows` rows without argument columns. Only COUNT(*)
    /// supports this.
    fn accumulate_nullary(&self, num_rows: usize) -> AggregationState {
        let _ = num_rows;
        panic!("{} does not support nullary accumulation", self.id().name());
    }

    fn accumulate_into_groups(
        &self,
        arguments: &[ArrayRef],
        group_keys: &[ArrayRef],
        hash_table: &mut dyn GroupByHashTable,
        index: usize,
    ) {
        let mut keys = match GroupKeyColumns::new(group_keys) {
            Ok(keys) => keys,
            Err(e) => panic!("{}: {e}", self.id().name()),
        };
        for argument in arguments {
            assert_eq!(
                argument.len(),
                keys.num_rows(),
                "{}: argument and group key lengths differ",
                self.id().name()
            );
        }
        assert!(
            index < hash_table.num_aggregates(),
            "aggregate index {} out of range",
            index
        );
        self.update_groups(arguments, &mut keys, hash_table, index);
    }

    /// Merges this aggregate's states of `source` into `destination`. A key
    /// found only in `source` gets a new destination entry holding a copy of
    /// the source state.
    fn merge_hash_tables(
        &self,
        source: &dyn GroupByHashTable,
        destination: &mut dyn GroupByHashTable,
        index: usize,
    ) {
        for (key, states) in source.entries() {
            match destination.get_entry(key) {
                Some(existing) => self.merge_states(&states[index], &existing[index]),
                None => {
                    let mut entry = destination.blank_entry();
                    entry[index] = states[index].clone();
                    destination.insert_entry(key.to_vec(), entry);
                }
            }
        }
    }

    /// Finalizes this aggregate for every group. With an empty `group_keys`
    /// the table's keys are appended in iteration order; otherwise values are
    /// produced in the order of the given keys.
    fn finalize_hash_table(
        &self,
        hash_table: &dyn GroupByHashTable,
        group_keys: &mut Vec<GroupKey>,
        index: usize,
    ) -> Result<ArrayRef, String> {
        let mut values = Vec::with_capacity(hash_table.num_entries());
        if group_keys.is_empty() {
            for (key, states) in hash_table.entries() {
                group_keys.push(key.to_vec());
                values.push(self.finalize(&states[index]));
            }
        } else {
            for key in group_keys.iter() {
                let states = hash_table
                    .get_entry(key)
                    .ok_or_else(|| format!("group key {:?} not found in hash table", key))?;
                values.push(self.finalize(&states[index]));
            }
        }
        build_array(&self.result_type().data_type, &values)
    }

    fn create_distinctify_hash_table(&self, key_types: &[DataType]) -> DistinctifyTable {
        DistinctifyTable::new(key_types.to_vec(), self.argument_types().to_vec())
    }

    fn insert_into_distinctify_hash_table(
        &self,
        arguments: &[ArrayRef],
        group_keys: &[ArrayRef],
        distinctify_table: &mut DistinctifyTable,
    ) {
        if let Err(e) = distinctify_table.insert_rows(arguments, group_keys) {
            panic!("{}: {e}", self.id().name());
        }
    }

    /// Aggregates the distinct argument values of an ungrouped DISTINCT
    /// aggregate.
    fn aggregate_on_distinctify_hash_table_for_single(
        &self,
        distinctify_table: &DistinctifyTable,
    ) -> AggregationState {
        assert!(
            !distinctify_table.is_grouped(),
            "grouped distinctify table passed to single aggregation"
        );
        let (_, arguments) = match distinctify_table.to_columns() {
            Ok(columns) => columns,
            Err(e) => panic!("{}: {e}", self.id().name()),
        };
        self.accumulate(&arguments)
    }

    fn aggregate_on_distinctify_hash_table_for_group_by(
        &self,
        distinctify_table: &DistinctifyTable,
        hash_table: &mut dyn GroupByHashTable,
        index: usize,
    ) {
        assert!(
            distinctify_table.is_grouped(),
            "ungrouped distinctify table passed to grouped aggregation"
        );
        let (group_keys, arguments) = match distinctify_table.to_columns() {
            Ok(columns) => columns,
            Err(e) => panic!("{}: {e}", self.id().name()),
        };
        self.accumulate_into_groups(&arguments, &group_keys, hash_table, index);
    }
}
