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
use hashbrown::HashMap;

use crate::common::config::group_by_initial_capacity;
use crate::exec::expr::agg::AggregationState;
use crate::exec::types::{TypedColumnView, TypedValue};

/// Ordered group-by column values of one row.
pub type GroupKey = Vec<TypedValue>;

/// Storage for grouped aggregation: composite key to one state per aggregate.
///
/// The aggregation core only relies on this surface; the physical layout is
/// up to the implementor. Entries created by `upsert` start as a copy of
/// `blank_entry`, which holds every aggregate's initial state.
pub trait GroupByHashTable: Send {
    fn num_aggregates(&self) -> usize;

    fn blank_entry(&self) -> Vec<AggregationState>;

    /// Returns the states for `key`, inserting a blank entry first if the key
    /// is new.
    fn upsert(&mut self, key: &[TypedValue]) -> &mut [AggregationState];

    fn get_entry(&self, key: &[TypedValue]) -> Option<&[AggregationState]>;

    /// Inserts or replaces the entry for `key`.
    fn insert_entry(&mut self, key: GroupKey, states: Vec<AggregationState>);

    fn entries(&self) -> Box<dyn Iterator<Item = (&[TypedValue], &[AggregationState])> + '_>;

    fn num_entries(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.num_entries() == 0
    }
}

/// `GroupByHashTable` over a hashbrown map.
pub struct GroupKeyTable {
    map: HashMap<GroupKey, Vec<AggregationState>>,
    blank: Vec<AggregationState>,
}

impl GroupKeyTable {
    pub fn with_capacity(blank: Vec<AggregationState>, capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            blank,
        }
    }

    /// A table sized by the configured initial group-by capacity.
    pub fn new(blank: Vec<AggregationState>) -> Self {
        Self::with_capacity(blank, group_by_initial_capacity())
    }
}

impl GroupByHashTable for GroupKeyTable {
    fn num_aggregates(&self) -> usize {
        self.blank.len()
    }

    fn blank_entry(&self) -> Vec<AggregationState> {
        self.blank.clone()
    }

    fn upsert(&mut self, key: &[TypedValue]) -> &mut [AggregationState] {
        let blank = &self.blank;
        self.map.entry_ref(key).or_insert_with(|| blank.clone())
    }

    fn get_entry(&self, key: &[TypedValue]) -> Option<&[AggregationState]> {
        self.map.get(key).map(Vec::as_slice)
    }

    fn insert_entry(&mut self, key: GroupKey, states: Vec<AggregationState>) {
        assert_eq!(
            states.len(),
            self.blank.len(),
            "group entry must hold one state per aggregate"
        );
        self.map.insert(key, states);
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (&[TypedValue], &[AggregationState])> + '_> {
        Box::new(
            self.map
                .iter()
                .map(|(key, states)| (key.as_slice(), states.as_slice())),
        )
    }

    fn num_entries(&self) -> usize {
        self.map.len()
    }
}

/// Row-wise access to the group-by columns of a batch, with one reused key
/// buffer.
pub struct GroupKeyColumns<'a> {
    views: Vec<TypedColumnView<'a>>,
    num_rows: usize,
    buffer: GroupKey,
}

impl<'a> GroupKeyColumns<'a> {
    pub fn new(columns: &'a [ArrayRef]) -> Result<Self, String> {
        let first = columns
            .first()
            .ok_or_else(|| "group by requires at least one key column".to_string())?;
        let num_rows = first.len();
        let mut views = Vec::with_capacity(columns.len());
        for column in columns {
            if column.len() != num_rows {
                return Err(format!(
                    "group key column length mismatch: expected {}, got {}",
                    num_rows,
                    column.len()
                ));
            }
            views.push(TypedColumnView::new(column.as_ref())?);
        }
        Ok(Self {
            views,
            num_rows,
            buffer: Vec::with_capacity(columns.len()),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Key of `row`. Valid until the next call.
    #[inline]
    pub fn key_at(&mut self, row: usize) -> &[TypedValue] {
        self.buffer.clear();
        for view in &self.views {
            self.buffer.push(view.value_at(row));
        }
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::expr::agg::CountState;
    use arrow::array::{Int32Array, StringArray};
    use std::sync::Arc;

    fn count_blank() -> Vec<AggregationState> {
        vec![AggregationState::Count(CountState::default())]
    }

    #[test]
    fn upsert_creates_blank_once() {
        let mut table = GroupKeyTable::with_capacity(count_blank(), 4);
        let key = vec![TypedValue::Int32(1)];
        match &table.upsert(&key)[0] {
            AggregationState::Count(c) => c.add(2),
            other => panic!("unexpected state {:?}", other),
        }
        match &table.upsert(&key)[0] {
            AggregationState::Count(c) => assert_eq!(c.count(), 2),
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(table.num_entries(), 1);
        assert!(table.get_entry(&[TypedValue::Int32(2)]).is_none());
    }

    #[test]
    fn key_columns_include_nulls() {
        let ints = Arc::new(Int32Array::from(vec![Some(1), None])) as ArrayRef;
        let strs = Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef;
        let columns = vec![ints, strs];
        let mut keys = GroupKeyColumns::new(&columns).unwrap();
        assert_eq!(keys.num_rows(), 2);
        assert_eq!(
            keys.key_at(1).to_vec(),
            vec![TypedValue::Null, TypedValue::Utf8("b".to_string())]
        );
        assert!(GroupKeyColumns::new(&[]).is_err());
    }
}
