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
//! Frame bookkeeping shared by the sliding-window aggregates.
//!
//! Input rows are already sorted by partition key, then order key. A single
//! pass keeps the half-open row range `[start, end)` of the current frame and
//! moves both ends forward only, so every row enters and leaves a frame at
//! most once per partition.

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;

use crate::exec::node::analytic::{WindowFrame, WindowType};
use crate::exec::types::{
    CompareFn, TypedColumnView, TypedValue, is_integer_type, is_numeric_type, resolve_comparator,
};

/// Incrementally maintained aggregate over the rows of the current frame.
pub(crate) trait FrameAccumulator {
    /// Forgets every row; called at each partition start.
    fn reset(&mut self);
    fn add(&mut self, row: usize);
    /// Removes a row previously passed to `add`. Rows leave in the order
    /// they entered.
    fn remove(&mut self, row: usize);
    fn current(&self) -> TypedValue;
}

struct RangeOrder<'a> {
    order_key: TypedColumnView<'a>,
    compare: CompareFn,
    preceding: Option<u64>,
    following: Option<u64>,
}

pub(crate) struct FrameCursor<'a> {
    num_rows: usize,
    partition_keys: Vec<TypedColumnView<'a>>,
    frame: WindowFrame,
    range: Option<RangeOrder<'a>>,
}

/// The frame of one current row, with RANGE bounds already offset.
pub(crate) struct RowWindow {
    current: usize,
    lower: Option<TypedValue>,
    upper: Option<TypedValue>,
    current_is_null: bool,
}

/// `value` moved by `distance` on the order key's number line. Integer keys
/// are offset exactly; a bound past the LONG range is `None`, which leaves
/// that side of the frame open.
fn offset_bound(value: &TypedValue, distance: u64, forward: bool) -> Option<TypedValue> {
    if let Some(v) = value.as_i64() {
        let moved = if forward {
            i128::from(v) + i128::from(distance)
        } else {
            i128::from(v) - i128::from(distance)
        };
        return i64::try_from(moved).ok().map(TypedValue::Int64);
    }
    let v = value.as_f64()?;
    let distance = distance as f64;
    Some(TypedValue::Float64(if forward { v + distance } else { v - distance }))
}

impl<'a> FrameCursor<'a> {
    pub(crate) fn new(
        num_rows: usize,
        partition_keys: &'a [ArrayRef],
        order_keys: &'a [ArrayRef],
        frame: WindowFrame,
    ) -> Result<Self, String> {
        let mut views = Vec::with_capacity(partition_keys.len());
        for key in partition_keys {
            if key.len() != num_rows {
                return Err(format!(
                    "partition key length {} does not match {} rows",
                    key.len(),
                    num_rows
                ));
            }
            views.push(TypedColumnView::new(key.as_ref())?);
        }

        let range = match frame.window_type {
            WindowType::Rows => None,
            WindowType::Range => {
                let first = order_keys
                    .first()
                    .ok_or_else(|| "RANGE frame requires an order key".to_string())?;
                if first.len() != num_rows {
                    return Err(format!(
                        "order key length {} does not match {} rows",
                        first.len(),
                        num_rows
                    ));
                }
                let order_type = first.data_type();
                if !is_numeric_type(order_type) {
                    return Err(format!(
                        "RANGE frame needs a numeric order key, got {:?}",
                        order_type
                    ));
                }
                let bound_type = if is_integer_type(order_type) {
                    DataType::Int64
                } else {
                    DataType::Float64
                };
                let compare = resolve_comparator(order_type, &bound_type).ok_or_else(|| {
                    format!("cannot compare order key {:?} with its offsets", order_type)
                })?;
                Some(RangeOrder {
                    order_key: TypedColumnView::new(first.as_ref())?,
                    compare,
                    preceding: frame.preceding.distance(),
                    following: frame.following.distance(),
                })
            }
        };

        Ok(Self {
            num_rows,
            partition_keys: views,
            frame,
            range,
        })
    }

    pub(crate) fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// False when `test` is past the last row; otherwise whether every
    /// partition key of `test` equals that of `current`.
    pub(crate) fn same_partition(&self, current: usize, test: usize) -> bool {
        if test >= self.num_rows {
            return false;
        }
        self.partition_keys
            .iter()
            .all(|key| key.rows_equal(current, test))
    }

    pub(crate) fn window_at(&self, current: usize) -> RowWindow {
        let mut window = RowWindow {
            current,
            lower: None,
            upper: None,
            current_is_null: false,
        };
        if let Some(range) = &self.range {
            let value = range.order_key.value_at(current);
            if value.is_null() {
                window.current_is_null = true;
            } else {
                window.lower = range
                    .preceding
                    .and_then(|p| offset_bound(&value, p, false));
                window.upper = range
                    .following
                    .and_then(|f| offset_bound(&value, f, true));
            }
        }
        window
    }

    pub(crate) fn in_window(&self, current: usize, test: usize) -> bool {
        self.contains(&self.window_at(current), test)
    }

    pub(crate) fn contains(&self, window: &RowWindow, test: usize) -> bool {
        let current = window.current;
        if !self.same_partition(current, test) {
            return false;
        }
        if test == current {
            return true;
        }
        match &self.range {
            None => {
                if test < current
                    && let Some(p) = self.frame.preceding.distance()
                    && (current - test) as u64 > p
                {
                    return false;
                }
                if test > current
                    && let Some(f) = self.frame.following.distance()
                    && (test - current) as u64 > f
                {
                    return false;
                }
                true
            }
            Some(range) => {
                if window.current_is_null || range.order_key.is_null(test) {
                    return false;
                }
                let value = range.order_key.value_at(test);
                if let Some(lower) = &window.lower
                    && (range.compare)(lower, &value).is_gt()
                {
                    return false;
                }
                if let Some(upper) = &window.upper
                    && (range.compare)(&value, upper).is_gt()
                {
                    return false;
                }
                true
            }
        }
    }
}

/// Runs the two-pointer scan and returns one value per row.
pub(crate) fn slide_frames(
    cursor: &FrameCursor<'_>,
    accumulator: &mut dyn FrameAccumulator,
) -> Vec<TypedValue> {
    let num_rows = cursor.num_rows();
    let mut out = Vec::with_capacity(num_rows);
    let mut start = 0usize;
    let mut end = 0usize;
    for current in 0..num_rows {
        if current == 0 || !cursor.same_partition(current, current - 1) {
            accumulator.reset();
            start = current;
            end = current;
        }
        let window = cursor.window_at(current);
        while start < end && !cursor.contains(&window, start) {
            accumulator.remove(start);
            start += 1;
        }
        while cursor.contains(&window, end) {
            accumulator.add(end);
            end += 1;
        }
        debug_assert!(start <= current && current < end);
        out.push(accumulator.current());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::node::analytic::FrameBound;
    use arrow::array::{Float64Array, Int32Array};
    use std::sync::Arc;

    #[test]
    fn rows_window_respects_partitions_and_bounds() {
        let part = vec![Arc::new(Int32Array::from(vec![0, 0, 0, 1, 1])) as ArrayRef];
        let frame = WindowFrame::rows(FrameBound::Bounded(1), FrameBound::Unbounded);
        let cursor = FrameCursor::new(5, &part, &[], frame).unwrap();
        assert!(cursor.in_window(1, 0));
        assert!(!cursor.in_window(2, 0));
        assert!(cursor.in_window(0, 2));
        assert!(!cursor.in_window(2, 3));
        assert!(!cursor.in_window(4, 5));
        assert!(cursor.same_partition(3, 4));
        assert!(!cursor.same_partition(2, 3));
    }

    #[test]
    fn range_window_skips_null_order_keys() {
        let order = vec![Arc::new(Float64Array::from(vec![Some(1.0), Some(1.5), Some(3.0), None]))
            as ArrayRef];
        let frame = WindowFrame::range(FrameBound::Bounded(1), FrameBound::Bounded(0));
        let cursor = FrameCursor::new(4, &[], &order, frame).unwrap();
        assert!(cursor.in_window(1, 0));
        assert!(!cursor.in_window(2, 1));
        assert!(!cursor.in_window(3, 2));
        assert!(cursor.in_window(3, 3));
    }

    #[test]
    fn range_needs_numeric_order_key() {
        let order = vec![Arc::new(arrow::array::StringArray::from(vec!["a"])) as ArrayRef];
        let frame = WindowFrame::range(FrameBound::Unbounded, FrameBound::Bounded(0));
        assert!(FrameCursor::new(1, &[], &order, frame).is_err());
        assert!(FrameCursor::new(1, &[], &[], frame).is_err());
    }

    /// Records how often each row enters and leaves the frame.
    struct CountingFrame {
        adds: Vec<u32>,
        removes: Vec<u32>,
        live: Vec<usize>,
    }

    impl CountingFrame {
        fn new(num_rows: usize) -> Self {
            Self {
                adds: vec![0; num_rows],
                removes: vec![0; num_rows],
                live: Vec::new(),
            }
        }
    }

    impl FrameAccumulator for CountingFrame {
        fn reset(&mut self) {
            self.live.clear();
        }

        fn add(&mut self, row: usize) {
            self.adds[row] += 1;
            self.live.push(row);
        }

        fn remove(&mut self, row: usize) {
            self.removes[row] += 1;
            assert_eq!(self.live.first(), Some(&row), "rows leave in entry order");
            self.live.remove(0);
        }

        fn current(&self) -> TypedValue {
            TypedValue::Int64(self.live.len() as i64)
        }
    }

    #[test]
    fn every_row_enters_and_leaves_at_most_once() {
        let num_rows = 23;
        let part = vec![Arc::new(Int32Array::from(
            (0..num_rows as i32).map(|i| i / 7).collect::<Vec<_>>(),
        )) as ArrayRef];
        let order = vec![Arc::new(Int32Array::from(
            (0..num_rows as i32).map(|i| (i % 7) / 2 * 3).collect::<Vec<_>>(),
        )) as ArrayRef];
        let bounds = [
            FrameBound::Bounded(0),
            FrameBound::Bounded(2),
            FrameBound::Bounded(5),
            FrameBound::Unbounded,
        ];
        for preceding in bounds {
            for following in bounds {
                for frame in [
                    WindowFrame::rows(preceding, following),
                    WindowFrame::range(preceding, following),
                ] {
                    let cursor = FrameCursor::new(num_rows, &part, &order, frame).unwrap();
                    let mut acc = CountingFrame::new(num_rows);
                    let sizes = slide_frames(&cursor, &mut acc);
                    assert!(acc.adds.iter().all(|&n| n <= 1), "{frame:?}");
                    assert!(acc.removes.iter().all(|&n| n <= 1), "{frame:?}");
                    for (current, size) in sizes.iter().enumerate() {
                        let expected = (0..num_rows)
                            .filter(|&test| cursor.in_window(current, test))
                            .count();
                        assert_eq!(*size, TypedValue::Int64(expected as i64), "{frame:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn range_bounds_near_long_limits_stay_open() {
        let order = vec![Arc::new(arrow::array::Int64Array::from(vec![
            i64::MAX - 2,
            i64::MAX - 1,
            i64::MAX,
        ])) as ArrayRef];
        let frame = WindowFrame::range(FrameBound::Bounded(0), FrameBound::Bounded(5));
        let cursor = FrameCursor::new(3, &[], &order, frame).unwrap();
        assert!(cursor.in_window(0, 2));
        assert!(cursor.in_window(1, 2));
        assert!(!cursor.in_window(1, 0));

        let order = vec![Arc::new(arrow::array::Int64Array::from(vec![
            i64::MIN,
            i64::MIN + 1,
            i64::MAX,
        ])) as ArrayRef];
        let frame = WindowFrame::range(FrameBound::Bounded(u64::MAX), FrameBound::Bounded(0));
        let cursor = FrameCursor::new(3, &[], &order, frame).unwrap();
        assert!(cursor.in_window(1, 0));
        assert!(cursor.in_window(2, 0));
        assert!(!cursor.in_window(0, 1));
    }
}
