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
use crate::exec::hash_table::GroupByHashTable;

use super::AggregationHandle;

/// Merges every aggregate of every entry of `source` into `destination`.
///
/// `handles[i]` owns state slot `i`. Keys present on both sides are merged
/// slot by slot; keys only in `source` are copied over whole. Afterwards the
/// destination holds the union of both key sets.
pub fn merge_group_by_hash_tables(
    handles: &[Box<dyn AggregationHandle>],
    source: &dyn GroupByHashTable,
    destination: &mut dyn GroupByHashTable,
) {
    assert_eq!(
        handles.len(),
        source.num_aggregates(),
        "source table holds a different number of aggregates"
    );
    assert_eq!(
        handles.len(),
        destination.num_aggregates(),
        "destination table holds a different number of aggregates"
    );
    for (key, states) in source.entries() {
        match destination.get_entry(key) {
            Some(existing) => {
                for (index, handle) in handles.iter().enumerate() {
                    handle.merge_states(&states[index], &existing[index]);
                }
            }
            None => destination.insert_entry(key.to_vec(), states.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::expr::agg::{AggregationId, get_aggregate_function};
    use crate::exec::hash_table::GroupKeyTable;
    use crate::exec::types::TypedValue;
    use arrow::array::{ArrayRef, Int32Array, Int64Array};
    use arrow::datatypes::DataType;
    use std::sync::Arc;

    fn handles() -> Vec<Box<dyn AggregationHandle>> {
        vec![
            get_aggregate_function(AggregationId::Sum).create_handle(&[DataType::Int64]),
            get_aggregate_function(AggregationId::Count).create_handle(&[]),
        ]
    }

    fn table_from(handles: &[Box<dyn AggregationHandle>], keys: Vec<i32>, values: Vec<i64>) -> GroupKeyTable {
        let blank = handles.iter().map(|h| h.create_initial_state()).collect();
        let mut table = GroupKeyTable::with_capacity(blank, 8);
        let keys = vec![Arc::new(Int32Array::from(keys)) as ArrayRef];
        let values = Arc::new(Int64Array::from(values)) as ArrayRef;
        handles[0].accumulate_into_groups(&[values], &keys, &mut table, 0);
        handles[1].accumulate_into_groups(&[], &keys, &mut table, 1);
        table
    }

    #[test]
    fn whole_table_merge_unions_keys() {
        let handles = handles();
        let source = table_from(&handles, vec![1, 2, 2], vec![10, 20, 30]);
        let mut destination = table_from(&handles, vec![2, 3], vec![5, 7]);
        merge_group_by_hash_tables(&handles, &source, &mut destination);

        assert_eq!(destination.num_entries(), 3);
        let entry = destination.get_entry(&[TypedValue::Int32(2)]).unwrap();
        assert_eq!(handles[0].finalize(&entry[0]), TypedValue::Int64(55));
        assert_eq!(handles[1].finalize(&entry[1]), TypedValue::Int64(3));
        let entry = destination.get_entry(&[TypedValue::Int32(1)]).unwrap();
        assert_eq!(handles[0].finalize(&entry[0]), TypedValue::Int64(10));
        // Source is untouched.
        let entry = source.get_entry(&[TypedValue::Int32(2)]).unwrap();
        assert_eq!(handles[0].finalize(&entry[0]), TypedValue::Int64(50));
    }
}
