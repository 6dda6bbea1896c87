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

use super::super::{AggregationId, AggregationState, FloatArrayView, IntArrayView};

/// The single argument column of a unary aggregate, checked against the
/// handle's bound type.
pub(super) fn single_argument<'a>(
    id: AggregationId,
    expected: &DataType,
    arguments: &'a [ArrayRef],
) -> &'a ArrayRef {
    assert_eq!(
        arguments.len(),
        1,
        "{} expects exactly one argument, got {}",
        id.name(),
        arguments.len()
    );
    let argument = &arguments[0];
    assert_eq!(
        argument.data_type(),
        expected,
        "{} bound to {:?} received a {:?} column",
        id.name(),
        expected,
        argument.data_type()
    );
    argument
}

pub(super) fn int_view(id: AggregationId, argument: &ArrayRef) -> IntArrayView<'_> {
    match IntArrayView::new(argument) {
        Ok(view) => view,
        Err(e) => panic!("{}: {e}", id.name()),
    }
}

pub(super) fn float_view(id: AggregationId, argument: &ArrayRef) -> FloatArrayView<'_> {
    match FloatArrayView::new(argument) {
        Ok(view) => view,
        Err(e) => panic!("{}: {e}", id.name()),
    }
}

pub(super) fn state_mismatch(id: AggregationId, state: &AggregationState) -> ! {
    panic!(
        "{} handle received a {} state",
        id.name(),
        state.kind_name()
    )
}

/// Visits the state at `index` of every row's group, creating groups on
/// first sight.
#[inline]
pub(super) fn for_each_group_row(
    group_keys: &mut GroupKeyColumns<'_>,
    hash_table: &mut dyn GroupByHashTable,
    index: usize,
    mut f: impl FnMut(usize, &AggregationState),
) {
    for row in 0..group_keys.num_rows() {
        let key = group_keys.key_at(row);
        let states = hash_table.upsert(key);
        f(row, &states[index]);
    }
}
