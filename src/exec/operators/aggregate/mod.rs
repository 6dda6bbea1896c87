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
//! Parallel ungrouped and grouped aggregation over in-memory batches.
//!
//! Responsibilities:
//! - Splits the input across worker threads, each with private states or a
//!   private group-by table; nothing is shared during the scan.
//! - Merges the partial results, pairwise on scoped threads (tree merge) or
//!   sequentially, then finalizes them into one output batch.
//!
//! Key exported interfaces:
//! - Types: `AggregationOperationState`, `AggregateInput`.

mod partial;

use std::sync::Arc;
use std::thread;

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

use crate::aggcore_logging::{debug, info};
use crate::common::config::{aggregation_worker_threads, tree_merge_enabled};
use crate::exec::expr::agg::{AggregationHandle, AggregationId, get_aggregate_function};
use crate::exec::hash_table::GroupKey;
use crate::exec::types::build_array;

use partial::{Partial, PartialStates};

/// One requested aggregate: the function, the columns feeding it (none for
/// COUNT(*)) and whether it aggregates distinct values only.
#[derive(Clone, Debug)]
pub struct AggregateInput {
    pub function: AggregationId,
    pub argument_ids: Vec<usize>,
    pub is_distinct: bool,
}

impl AggregateInput {
    pub fn new(function: AggregationId, argument_ids: Vec<usize>) -> Self {
        Self {
            function,
            argument_ids,
            is_distinct: false,
        }
    }

    pub fn distinct(function: AggregationId, argument_ids: Vec<usize>) -> Self {
        Self {
            function,
            argument_ids,
            is_distinct: true,
        }
    }
}

pub struct AggregationOperationState {
    handles: Vec<Box<dyn AggregationHandle>>,
    inputs: Vec<AggregateInput>,
    group_by_ids: Vec<usize>,
    key_types: Vec<DataType>,
    output_schema: SchemaRef,
    num_workers: usize,
    tree_merge: bool,
}

impl AggregationOperationState {
    /// Type-checks every aggregate against `input_schema`. Unsupported
    /// argument types are reported here, before any handle exists.
    pub fn try_new(
        input_schema: &Schema,
        inputs: Vec<AggregateInput>,
        group_by_ids: Vec<usize>,
    ) -> Result<Self, String> {
        let column_type = |id: usize| -> Result<DataType, String> {
            input_schema
                .fields()
                .get(id)
                .map(|f| f.data_type().clone())
                .ok_or_else(|| format!("column id {} out of range", id))
        };

        let mut handles = Vec::with_capacity(inputs.len());
        let mut fields = Vec::with_capacity(group_by_ids.len() + inputs.len());
        let mut key_types = Vec::with_capacity(group_by_ids.len());
        for (i, &id) in group_by_ids.iter().enumerate() {
            let data_type = column_type(id)?;
            fields.push(Field::new(format!("group_{}", i), data_type.clone(), true));
            key_types.push(data_type);
        }
        for (i, input) in inputs.iter().enumerate() {
            let argument_types = input
                .argument_ids
                .iter()
                .map(|&id| column_type(id))
                .collect::<Result<Vec<_>, _>>()?;
            let function = get_aggregate_function(input.function);
            if !function.can_apply_to_types(&argument_types) {
                return Err(format!(
                    "{} cannot be applied to argument types {:?}",
                    input.function.name(),
                    argument_types
                ));
            }
            if input.is_distinct && argument_types.is_empty() {
                return Err(format!("{}(DISTINCT) needs an argument", input.function.name()));
            }
            let handle = function.create_handle(&argument_types);
            let result_type = handle.result_type();
            fields.push(Field::new(
                format!("agg_{}", i),
                result_type.data_type.clone(),
                result_type.nullable,
            ));
            handles.push(handle);
        }

        Ok(Self {
            handles,
            inputs,
            group_by_ids,
            key_types,
            output_schema: Arc::new(Schema::new(fields)),
            num_workers: aggregation_worker_threads().max(1),
            tree_merge: tree_merge_enabled(),
        })
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    pub fn with_tree_merge(mut self, tree_merge: bool) -> Self {
        self.tree_merge = tree_merge;
        self
    }

    pub fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.output_schema)
    }

    pub fn handles(&self) -> &[Box<dyn AggregationHandle>] {
        &self.handles
    }

    pub fn execute(&self, batches: &[RecordBatch]) -> Result<RecordBatch, String> {
        let partials = self.scan(batches)?;
        let mut merged = if self.tree_merge {
            self.tree_reduce(partials)?
        } else {
            self.sequential_reduce(partials)
        };
        merged.resolve_distinct(&self.handles);
        self.finalize(merged)
    }

    fn scan(&self, batches: &[RecordBatch]) -> Result<Vec<Partial>, String> {
        if batches.is_empty() {
            return Ok(vec![self.new_partial()]);
        }
        let workers = self.num_workers.min(batches.len());
        let per_worker = batches.len().div_ceil(workers);
        info!(
            "aggregation scan: batches={} workers={} grouped={}",
            batches.len(),
            workers,
            !self.group_by_ids.is_empty()
        );

        thread::scope(|scope| {
            let mut running = Vec::with_capacity(workers);
            for (worker_id, slice) in batches.chunks(per_worker).enumerate() {
                let handle = thread::Builder::new()
                    .name(format!("agg_worker_{}", worker_id))
                    .spawn_scoped(scope, move || self.scan_slice(slice))
                    .map_err(|e| format!("failed to spawn aggregation worker: {}", e))?;
                running.push(handle);
            }
            running
                .into_iter()
                .map(|h| {
                    h.join()
                        .map_err(|_| "aggregation worker panicked".to_string())?
                })
                .collect()
        })
    }

    fn new_partial(&self) -> Partial {
        Partial::new(&self.handles, &self.inputs, &self.key_types)
    }

    fn scan_slice(&self, batches: &[RecordBatch]) -> Result<Partial, String> {
        let mut partial = self.new_partial();
        for batch in batches {
            let group_keys: Vec<ArrayRef> = self
                .group_by_ids
                .iter()
                .map(|&id| batch.column(id).clone())
                .collect();
            partial.consume(&self.handles, &self.inputs, batch, &group_keys)?;
        }
        debug!("aggregation worker consumed {} batches", batches.len());
        Ok(partial)
    }

    fn sequential_reduce(&self, partials: Vec<Partial>) -> Partial {
        let mut iter = partials.into_iter();
        let mut merged = iter.next().unwrap_or_else(|| self.new_partial());
        for partial in iter {
            merged.merge_from(&partial, &self.handles);
        }
        merged
    }

    /// Pairwise reduction: each round merges partial `2k+1` into `2k` on its
    /// own thread, halving the number of partials.
    fn tree_reduce(&self, mut partials: Vec<Partial>) -> Result<Partial, String> {
        let mut round = 0;
        while partials.len() > 1 {
            debug!("tree merge round {}: {} partials", round, partials.len());
            let mut pairs = Vec::with_capacity(partials.len().div_ceil(2));
            let mut iter = partials.into_iter();
            while let Some(left) = iter.next() {
                pairs.push((left, iter.next()));
            }
            partials = thread::scope(|scope| {
                let running: Vec<_> = pairs
                    .into_iter()
                    .map(|(mut left, right)| {
                        scope.spawn(move || {
                            if let Some(right) = right {
                                left.merge_from(&right, &self.handles);
                            }
                            left
                        })
                    })
                    .collect();
                running
                    .into_iter()
                    .map(|h| h.join().map_err(|_| "merge worker panicked".to_string()))
                    .collect::<Result<Vec<_>, _>>()
            })?;
            round += 1;
        }
        Ok(partials.pop().unwrap_or_else(|| self.new_partial()))
    }

    fn finalize(&self, partial: Partial) -> Result<RecordBatch, String> {
        let mut columns = Vec::with_capacity(self.output_schema.fields().len());
        match &partial.states {
            PartialStates::Ungrouped(states) => {
                for (handle, state) in self.handles.iter().zip(states) {
                    columns.push(build_array(
                        &handle.result_type().data_type,
                        &[handle.finalize(state)],
                    )?);
                }
            }
            PartialStates::Grouped(table) => {
                let mut group_keys: Vec<GroupKey> = Vec::new();
                let mut aggregate_columns = Vec::with_capacity(self.handles.len());
                for (index, handle) in self.handles.iter().enumerate() {
                    aggregate_columns.push(handle.finalize_hash_table(table, &mut group_keys, index)?);
                }
                for (position, key_type) in self.key_types.iter().enumerate() {
                    let values: Vec<_> = group_keys.iter().map(|k| k[position].clone()).collect();
                    columns.push(build_array(key_type, &values)?);
                }
                columns.extend(aggregate_columns);
                info!("aggregation produced {} groups", group_keys.len());
            }
        }
        RecordBatch::try_new(self.output_schema(), columns).map_err(|e| e.to_string())
    }
}
