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
pub mod common;
pub mod exec;

// Convenience aliases, mirroring the module layout.
pub use common::app_config as aggcore_config;
pub use common::logging as aggcore_logging;

pub use exec::expr::agg::{
    AggregateFunction, AggregationHandle, AggregationId, AggregationState, get_aggregate_function,
    resolve_by_name,
};
pub use exec::hash_table::{GroupByHashTable, GroupKey, GroupKeyTable};
pub use exec::node::analytic::{FrameBound, WindowFrame, WindowType};
pub use exec::operators::{AggregateInput, AggregationOperationState, WindowAggregationHandle};
pub use exec::types::{TypedValue, ValueType};
