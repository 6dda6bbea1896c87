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
use hashbrown::HashSet;

use crate::exec::types::{TypedColumnView, TypedValue, build_array};

/// Set of distinct `(group key ..., argument ...)` tuples feeding a DISTINCT
/// aggregate. Tuples with a NULL argument never contribute to an aggregate
/// and are not stored.
pub struct DistinctifyTable {
    key_types: Vec<DataType>,
    argument_types: Vec<DataType>,
    tuples: HashSet<Vec<TypedValue>>,
}

impl DistinctifyTable {
    pub fn new(key_types: Vec<DataType>, argument_types: Vec<DataType>) -> Self {
        Self {
            key_types,
            argument_types,
            tuples: HashSet::new(),
        }
    }

    pub fn num_entries(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_grouped(&self) -> bool {
        !self.key_types.is_empty()
    }

    pub fn insert_rows(
        &mut self,
        arguments: &[ArrayRef],
        group_keys: &[ArrayRef],
    ) -> Result<(), String> {
        if arguments.len() != self.argument_types.len() || group_keys.len() != self.key_types.len()
        {
            return Err(format!(
                "distinctify table expects {} key and {} argument columns, got {} and {}",
                self.key_types.len(),
                self.argument_types.len(),
                group_keys.len(),
                arguments.len()
            ));
        }
        let num_rows = match arguments.first().or_else(|| group_keys.first()) {
            Some(column) => column.len(),
            None => return Ok(()),
        };
        let key_views = group_keys
            .iter()
            .map(|c| TypedColumnView::new(c.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let arg_views = arguments
            .iter()
            .map(|c| TypedColumnView::new(c.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tuple = Vec::with_capacity(key_views.len() + arg_views.len());
        for row in 0..num_rows {
            if arg_views.iter().any(|v| v.is_null(row)) {
                continue;
            }
            tuple.clear();
            tuple.extend(key_views.iter().map(|v| v.value_at(row)));
            tuple.extend(arg_views.iter().map(|v| v.value_at(row)));
            if !self.tuples.contains(tuple.as_slice()) {
                self.tuples.insert(tuple.clone());
            }
        }
        Ok(())
    }

    /// Set union with a table built over the same columns by another worker.
    pub fn merge_from(&mut self, other: &DistinctifyTable) {
        assert!(
            self.key_types == other.key_types && self.argument_types == other.argument_types,
            "cannot merge distinctify tables over different columns"
        );
        for tuple in &other.tuples {
            if !self.tuples.contains(tuple) {
                self.tuples.insert(tuple.clone());
            }
        }
    }

    /// Materializes the distinct tuples as `(group key columns, argument
    /// columns)`, row-aligned.
    pub fn to_columns(&self) -> Result<(Vec<ArrayRef>, Vec<ArrayRef>), String> {
        let width = self.key_types.len() + self.argument_types.len();
        let mut columns: Vec<Vec<TypedValue>> = vec![Vec::with_capacity(self.tuples.len()); width];
        for tuple in &self.tuples {
            for (column, value) in columns.iter_mut().zip(tuple.iter()) {
                column.push(value.clone());
            }
        }
        let mut arrays = Vec::with_capacity(width);
        for (data_type, values) in self
            .key_types
            .iter()
            .chain(self.argument_types.iter())
            .zip(columns.iter())
        {
            arrays.push(build_array(data_type, values)?);
        }
        let arguments = arrays.split_off(self.key_types.len());
        Ok((arrays, arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int32Array, Int64Array};
    use std::sync::Arc;

    #[test]
    fn duplicates_and_nulls_collapse() {
        let mut table = DistinctifyTable::new(vec![DataType::Int32], vec![DataType::Int64]);
        let keys = Arc::new(Int32Array::from(vec![1, 1, 1, 2, 2])) as ArrayRef;
        let args =
            Arc::new(Int64Array::from(vec![Some(5), Some(5), None, Some(5), Some(6)])) as ArrayRef;
        table.insert_rows(&[args.clone()], &[keys.clone()]).unwrap();
        table.insert_rows(&[args], &[keys]).unwrap();
        assert_eq!(table.num_entries(), 3);

        let (key_cols, arg_cols) = table.to_columns().unwrap();
        assert_eq!(key_cols.len(), 1);
        assert_eq!(arg_cols.len(), 1);
        assert_eq!(arg_cols[0].len(), 3);
        assert_eq!(arg_cols[0].null_count(), 0);
    }
}
