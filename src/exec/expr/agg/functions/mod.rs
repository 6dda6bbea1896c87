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
//! Aggregate function factory: type checking, result types and handle
//! construction.

use arrow::datatypes::DataType;

use crate::aggcore_logging::debug;
use crate::exec::node::analytic::WindowFrame;
use crate::exec::operators::window_aggregate::WindowAggregationHandle;
use crate::exec::types::ValueType;

use super::{AggregationHandle, AggregationId};

mod avg;
mod common;
mod count;
mod min_max;
mod sum;

use avg::AvgAgg;
use count::CountAgg;
use min_max::ExtremeAgg;
use sum::SumAgg;

pub trait AggregateFunction: Sync {
    fn id(&self) -> AggregationId;

    /// Whether this function is defined for `argument_types`. A negative
    /// answer is what the planner reports as a query compilation error.
    fn can_apply_to_types(&self, argument_types: &[DataType]) -> bool;

    /// `None` exactly when `can_apply_to_types` is false.
    fn result_type_for_argument_types(&self, argument_types: &[DataType]) -> Option<ValueType>;

    /// Panics if `can_apply_to_types(argument_types)` is false.
    fn create_handle(&self, argument_types: &[DataType]) -> Box<dyn AggregationHandle>;

    /// Result type for a handle about to be created; unsupported argument
    /// types are a contract violation.
    fn checked_result_type(&self, argument_types: &[DataType]) -> ValueType {
        match self.result_type_for_argument_types(argument_types) {
            Some(result_type) => {
                debug!(
                    "create {} handle: arguments={:?} result={:?}",
                    self.id().name(),
                    argument_types,
                    result_type
                );
                result_type
            }
            None => panic!(
                "{} cannot be applied to argument types {:?}",
                self.id().name(),
                argument_types
            ),
        }
    }

    /// Builds the sliding-window variant of this function. Panics under the
    /// same conditions as `create_handle`.
    fn create_window_handle(
        &self,
        argument_types: &[DataType],
        partition_key_ids: Vec<usize>,
        order_key_ids: Vec<usize>,
        frame: WindowFrame,
    ) -> WindowAggregationHandle {
        let result_type = self.checked_result_type(argument_types);
        WindowAggregationHandle::new(
            self.id(),
            argument_types.to_vec(),
            result_type,
            partition_key_ids,
            order_key_ids,
            frame,
        )
    }
}

static SUM: SumAgg = SumAgg;
static MIN: ExtremeAgg = ExtremeAgg {
    id: AggregationId::Min,
};
static MAX: ExtremeAgg = ExtremeAgg {
    id: AggregationId::Max,
};
static COUNT: CountAgg = CountAgg;
static AVG: AvgAgg = AvgAgg;

pub fn get_aggregate_function(id: AggregationId) -> &'static dyn AggregateFunction {
    match id {
        AggregationId::Sum => &SUM,
        AggregationId::Min => &MIN,
        AggregationId::Max => &MAX,
        AggregationId::Count => &COUNT,
        AggregationId::Avg => &AVG,
    }
}

pub fn resolve_by_name(name: &str) -> Option<&'static dyn AggregateFunction> {
    AggregationId::from_name(name).map(get_aggregate_function)
}
