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
//! Sliding-window SUM, MIN, MAX, COUNT and AVG.

use std::cmp::Ordering;
use std::collections::VecDeque;

use arrow::array::{Array, ArrayRef, RecordBatch};
use arrow::datatypes::DataType;

use crate::aggcore_logging::debug;
use crate::exec::expr::agg::{AggregationId, FloatArrayView, IntArrayView};
use crate::exec::node::analytic::WindowFrame;
use crate::exec::types::{
    ArithmeticOperator, CompareFn, DivideFn, TypedColumnView, TypedValue, ValueType, build_array,
    resolve_add, resolve_comparator, resolve_divide_by_double, resolve_subtract,
    widened_sum_type,
};

use super::analytic_shared::{FrameAccumulator, FrameCursor, slide_frames};

/// Computes one aggregate value per input row over a sliding frame.
///
/// Created by `AggregateFunction::create_window_handle`. The handle only
/// stores column ids and resolved operators; `calculate` runs one
/// single-threaded pass per call.
pub struct WindowAggregationHandle {
    id: AggregationId,
    argument_types: Vec<DataType>,
    result_type: ValueType,
    partition_key_ids: Vec<usize>,
    order_key_ids: Vec<usize>,
    frame: WindowFrame,
    operators: WindowOperators,
}

enum WindowOperators {
    Count,
    Sum(RunningKind),
    Avg(RunningKind, DivideFn),
    Extreme { compare: CompareFn, wanted: Ordering },
}

#[derive(Clone, Copy)]
enum RunningKind {
    Long,
    Double,
    Typed {
        add: ArithmeticOperator,
        subtract: ArithmeticOperator,
    },
}

impl RunningKind {
    fn for_argument(argument_type: &DataType) -> Self {
        let sum_type = match widened_sum_type(argument_type) {
            Some(t) => t,
            None => panic!("no sum type for {:?}", argument_type),
        };
        match sum_type {
            DataType::Int64 => RunningKind::Long,
            DataType::Float64 => RunningKind::Double,
            _ => match (
                resolve_add(&sum_type, argument_type),
                resolve_subtract(&sum_type, argument_type),
            ) {
                (Some(add), Some(subtract)) => RunningKind::Typed { add, subtract },
                _ => panic!("{:?} lacks add/subtract for a running sum", sum_type),
            },
        }
    }
}

impl WindowAggregationHandle {
    pub(crate) fn new(
        id: AggregationId,
        argument_types: Vec<DataType>,
        result_type: ValueType,
        partition_key_ids: Vec<usize>,
        order_key_ids: Vec<usize>,
        frame: WindowFrame,
    ) -> Self {
        let operators = match id {
            AggregationId::Count => WindowOperators::Count,
            AggregationId::Sum => WindowOperators::Sum(RunningKind::for_argument(&argument_types[0])),
            AggregationId::Avg => {
                let running = RunningKind::for_argument(&argument_types[0]);
                let divide = match widened_sum_type(&argument_types[0])
                    .and_then(|t| resolve_divide_by_double(&t))
                {
                    Some((_, divide)) => divide,
                    None => panic!("avg cannot divide {:?}", argument_types[0]),
                };
                WindowOperators::Avg(running, divide)
            }
            AggregationId::Min | AggregationId::Max => {
                let compare = match resolve_comparator(&argument_types[0], &argument_types[0]) {
                    Some(compare) => compare,
                    None => panic!("{:?} has no ordering", argument_types[0]),
                };
                let wanted = if id == AggregationId::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                WindowOperators::Extreme { compare, wanted }
            }
        };
        debug!(
            "create window {} handle: frame={:?} partition_keys={:?} order_keys={:?}",
            id.name(),
            frame,
            partition_key_ids,
            order_key_ids
        );
        Self {
            id,
            argument_types,
            result_type,
            partition_key_ids,
            order_key_ids,
            frame,
            operators,
        }
    }

    pub fn id(&self) -> AggregationId {
        self.id
    }

    pub fn result_type(&self) -> &ValueType {
        &self.result_type
    }

    pub fn frame(&self) -> &WindowFrame {
        &self.frame
    }

    /// One output row per row of `batch`. Partition and order keys are read
    /// from `batch` by column id; `arguments` are the evaluated aggregate
    /// arguments, row-aligned with `batch` (none for COUNT(*)).
    pub fn calculate(&self, batch: &RecordBatch, arguments: &[ArrayRef]) -> Result<ArrayRef, String> {
        if arguments.len() != self.argument_types.len() {
            return Err(format!(
                "window {} expects {} arguments, got {}",
                self.id.name(),
                self.argument_types.len(),
                arguments.len()
            ));
        }
        for (argument, expected) in arguments.iter().zip(self.argument_types.iter()) {
            if argument.data_type() != expected {
                return Err(format!(
                    "window {} bound to {:?} received a {:?} column",
                    self.id.name(),
                    expected,
                    argument.data_type()
                ));
            }
            if argument.len() != batch.num_rows() {
                return Err(format!(
                    "window argument length {} does not match {} rows",
                    argument.len(),
                    batch.num_rows()
                ));
            }
        }
        let partition_keys = columns_by_id(batch, &self.partition_key_ids)?;
        let order_keys = columns_by_id(batch, &self.order_key_ids)?;
        let cursor = FrameCursor::new(batch.num_rows(), &partition_keys, &order_keys, self.frame)?;

        let values = match &self.operators {
            WindowOperators::Count => {
                let mut acc = CountFrame {
                    argument: arguments.first().map(|a| a.as_ref()),
                    count: 0,
                };
                slide_frames(&cursor, &mut acc)
            }
            WindowOperators::Sum(kind) => {
                let mut acc = SumFrame::new(*kind, &arguments[0])?;
                slide_frames(&cursor, &mut acc)
            }
            WindowOperators::Avg(kind, divide) => {
                let mut acc = AvgFrame {
                    sum: SumFrame::new(*kind, &arguments[0])?,
                    divide: *divide,
                };
                slide_frames(&cursor, &mut acc)
            }
            WindowOperators::Extreme { compare, wanted } => {
                let mut acc = ExtremeFrame {
                    values: TypedColumnView::new(arguments[0].as_ref())?,
                    compare: *compare,
                    wanted: *wanted,
                    candidates: VecDeque::new(),
                };
                slide_frames(&cursor, &mut acc)
            }
        };
        build_array(&self.result_type.data_type, &values)
    }
}

fn columns_by_id(batch: &RecordBatch, ids: &[usize]) -> Result<Vec<ArrayRef>, String> {
    ids.iter()
        .map(|&id| {
            if id < batch.num_columns() {
                Ok(batch.column(id).clone())
            } else {
                Err(format!(
                    "column id {} out of range ({} columns)",
                    id,
                    batch.num_columns()
                ))
            }
        })
        .collect()
}

struct CountFrame<'a> {
    argument: Option<&'a dyn Array>,
    count: i64,
}

impl CountFrame<'_> {
    fn counts(&self, row: usize) -> bool {
        self.argument.is_none_or(|a| !a.is_null(row))
    }
}

impl FrameAccumulator for CountFrame<'_> {
    fn reset(&mut self) {
        self.count = 0;
    }

    fn add(&mut self, row: usize) {
        if self.counts(row) {
            self.count += 1;
        }
    }

    fn remove(&mut self, row: usize) {
        if self.counts(row) {
            self.count -= 1;
        }
    }

    fn current(&self) -> TypedValue {
        TypedValue::Int64(self.count)
    }
}

/// Running DOUBLE sum. Infinities and NaN are counted apart from the finite
/// part so that one leaving the frame does not leave the sum poisoned.
#[derive(Default)]
struct DoubleSum {
    finite: f64,
    nan: u64,
    pos_inf: u64,
    neg_inf: u64,
}

impl DoubleSum {
    fn apply(&mut self, value: f64, sign: i64) {
        let slot = if value.is_nan() {
            &mut self.nan
        } else if value == f64::INFINITY {
            &mut self.pos_inf
        } else if value == f64::NEG_INFINITY {
            &mut self.neg_inf
        } else {
            self.finite += sign as f64 * value;
            return;
        };
        *slot = slot.wrapping_add_signed(sign);
    }

    fn value(&self) -> f64 {
        match (self.nan, self.pos_inf, self.neg_inf) {
            (0, 0, 0) => self.finite,
            (0, _, 0) => f64::INFINITY,
            (0, 0, _) => f64::NEG_INFINITY,
            _ => f64::NAN,
        }
    }
}

enum RunningSum<'a> {
    Long(IntArrayView<'a>, i64),
    Double(FloatArrayView<'a>, DoubleSum),
    Typed {
        values: TypedColumnView<'a>,
        add: ArithmeticOperator,
        subtract: ArithmeticOperator,
        sum: TypedValue,
    },
}

/// Running sum plus the number of non-null rows in the frame.
struct SumFrame<'a> {
    running: RunningSum<'a>,
    count: i64,
}

impl<'a> SumFrame<'a> {
    fn new(kind: RunningKind, argument: &'a ArrayRef) -> Result<Self, String> {
        let running = match kind {
            RunningKind::Long => RunningSum::Long(IntArrayView::new(argument)?, 0),
            RunningKind::Double => {
                RunningSum::Double(FloatArrayView::new(argument)?, DoubleSum::default())
            }
            RunningKind::Typed { add, subtract } => RunningSum::Typed {
                values: TypedColumnView::new(argument.as_ref())?,
                add,
                subtract,
                sum: TypedValue::Null,
            },
        };
        Ok(Self { running, count: 0 })
    }

    fn sum_value(&self) -> TypedValue {
        match &self.running {
            RunningSum::Long(_, sum) => TypedValue::Int64(*sum),
            RunningSum::Double(_, sum) => TypedValue::Float64(sum.value()),
            RunningSum::Typed { sum, .. } => sum.clone(),
        }
    }
}

impl FrameAccumulator for SumFrame<'_> {
    fn reset(&mut self) {
        self.count = 0;
        match &mut self.running {
            RunningSum::Long(_, sum) => *sum = 0,
            RunningSum::Double(_, sum) => *sum = DoubleSum::default(),
            RunningSum::Typed { sum, .. } => *sum = TypedValue::Null,
        }
    }

    fn add(&mut self, row: usize) {
        let added = match &mut self.running {
            RunningSum::Long(view, sum) => view.value_at(row).map(|v| *sum = sum.wrapping_add(v)),
            RunningSum::Double(view, sum) => view.value_at(row).map(|v| sum.apply(v, 1)),
            RunningSum::Typed {
                values, add, sum, ..
            } => {
                let value = values.value_at(row);
                (!value.is_null()).then(|| {
                    *sum = if sum.is_null() {
                        value
                    } else {
                        add.apply(sum, &value)
                    };
                })
            }
        };
        if added.is_some() {
            self.count += 1;
        }
    }

    fn remove(&mut self, row: usize) {
        let removed = match &mut self.running {
            RunningSum::Long(view, sum) => view.value_at(row).map(|v| *sum = sum.wrapping_sub(v)),
            RunningSum::Double(view, sum) => view.value_at(row).map(|v| sum.apply(v, -1)),
            RunningSum::Typed {
                values,
                subtract,
                sum,
                ..
            } => {
                let value = values.value_at(row);
                (!value.is_null()).then(|| *sum = subtract.apply(sum, &value))
            }
        };
        if removed.is_some() {
            self.count -= 1;
        }
    }

    fn current(&self) -> TypedValue {
        if self.count == 0 {
            TypedValue::Null
        } else {
            self.sum_value()
        }
    }
}

struct AvgFrame<'a> {
    sum: SumFrame<'a>,
    divide: DivideFn,
}

impl FrameAccumulator for AvgFrame<'_> {
    fn reset(&mut self) {
        self.sum.reset();
    }

    fn add(&mut self, row: usize) {
        self.sum.add(row);
    }

    fn remove(&mut self, row: usize) {
        self.sum.remove(row);
    }

    fn current(&self) -> TypedValue {
        if self.sum.count == 0 {
            return TypedValue::Null;
        }
        (self.divide)(&self.sum.sum_value(), self.sum.count as f64)
    }
}

/// MIN/MAX over a sliding frame. `candidates` holds row ids whose values
/// are strictly monotone towards the extreme; the front is the answer.
struct ExtremeFrame<'a> {
    values: TypedColumnView<'a>,
    compare: CompareFn,
    wanted: Ordering,
    candidates: VecDeque<(usize, TypedValue)>,
}

impl FrameAccumulator for ExtremeFrame<'_> {
    fn reset(&mut self) {
        self.candidates.clear();
    }

    fn add(&mut self, row: usize) {
        let value = self.values.value_at(row);
        if value.is_null() {
            return;
        }
        while let Some((_, back)) = self.candidates.back() {
            if (self.compare)(&value, back) == self.wanted.reverse() {
                break;
            }
            self.candidates.pop_back();
        }
        self.candidates.push_back((row, value));
    }

    fn remove(&mut self, row: usize) {
        if self.candidates.front().is_some_and(|(front, _)| *front == row) {
            self.candidates.pop_front();
        }
    }

    fn current(&self) -> TypedValue {
        self.candidates
            .front()
            .map(|(_, value)| value.clone())
            .unwrap_or(TypedValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::expr::agg::get_aggregate_function;
    use crate::exec::node::analytic::FrameBound;
    use arrow::array::{DurationMicrosecondArray, Float64Array, Int32Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn batch(partition: Vec<i32>, values: ArrayRef) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("p", DataType::Int32, false),
            Field::new("v", values.data_type().clone(), true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Int32Array::from(partition)) as ArrayRef, values],
        )
        .unwrap()
    }

    #[test]
    fn running_sum_resets_at_partition_start() {
        let values = Arc::new(Int64Array::from(vec![Some(1), None, Some(3), Some(10), Some(20)]))
            as ArrayRef;
        let input = batch(vec![0, 0, 0, 1, 1], values.clone());
        let handle = get_aggregate_function(AggregationId::Sum).create_window_handle(
            &[DataType::Int64],
            vec![0],
            vec![],
            WindowFrame::running(),
        );
        let out = handle.calculate(&input, &[values]).unwrap();
        let out = out.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(
            out.iter().collect::<Vec<_>>(),
            vec![Some(1), Some(1), Some(4), Some(10), Some(30)]
        );
    }

    #[test]
    fn all_null_frame_sums_to_null_and_counts_zero() {
        let values = Arc::new(Float64Array::from(vec![None, None, Some(2.0)])) as ArrayRef;
        let input = batch(vec![0, 0, 0], values.clone());
        let frame = WindowFrame::rows(FrameBound::Bounded(1), FrameBound::Bounded(0));

        let sum = get_aggregate_function(AggregationId::Sum)
            .create_window_handle(&[DataType::Float64], vec![0], vec![], frame)
            .calculate(&input, &[values.clone()])
            .unwrap();
        let sum = sum.as_any().downcast_ref::<Float64Array>().unwrap();
        assert!(sum.is_null(0) && sum.is_null(1));
        assert_eq!(sum.value(2), 2.0);

        let count = get_aggregate_function(AggregationId::Count)
            .create_window_handle(&[DataType::Float64], vec![0], vec![], frame)
            .calculate(&input, &[values])
            .unwrap();
        let count = count.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(count.values().to_vec(), vec![0, 0, 1]);
    }

    #[test]
    fn count_star_counts_frame_rows() {
        let input = batch(vec![0, 0, 0, 0], Arc::new(Int64Array::from(vec![None; 4])));
        let frame = WindowFrame::rows(FrameBound::Bounded(1), FrameBound::Bounded(1));
        let out = get_aggregate_function(AggregationId::Count)
            .create_window_handle(&[], vec![0], vec![], frame)
            .calculate(&input, &[])
            .unwrap();
        let out = out.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(out.values().to_vec(), vec![2, 3, 3, 2]);
    }

    #[test]
    fn sliding_max_over_strings() {
        let values = Arc::new(StringArray::from(vec![
            Some("b"),
            Some("d"),
            None,
            Some("a"),
            Some("c"),
        ])) as ArrayRef;
        let input = batch(vec![0; 5], values.clone());
        let frame = WindowFrame::rows(FrameBound::Bounded(1), FrameBound::Bounded(0));
        let out = get_aggregate_function(AggregationId::Max)
            .create_window_handle(&[DataType::Utf8], vec![0], vec![], frame)
            .calculate(&input, &[values])
            .unwrap();
        let out = out.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(
            out.iter().collect::<Vec<_>>(),
            vec![Some("b"), Some("d"), Some("d"), Some("a"), Some("c")]
        );
    }

    #[test]
    fn interval_avg_keeps_interval_type() {
        let values = Arc::new(DurationMicrosecondArray::from(vec![10, 20, 40])) as ArrayRef;
        let input = batch(vec![0; 3], values.clone());
        let handle = get_aggregate_function(AggregationId::Avg).create_window_handle(
            &[values.data_type().clone()],
            vec![0],
            vec![],
            WindowFrame::rows(FrameBound::Unbounded, FrameBound::Unbounded),
        );
        assert_eq!(handle.result_type().data_type, *values.data_type());
        let out = handle.calculate(&input, &[values]).unwrap();
        let out = out.as_any().downcast_ref::<DurationMicrosecondArray>().unwrap();
        assert_eq!(out.values().to_vec(), vec![23, 23, 23]);
    }

    #[test]
    fn infinity_leaving_the_frame_does_not_poison_the_sum() {
        let values = Arc::new(Float64Array::from(vec![
            f64::INFINITY,
            1.0,
            f64::NAN,
            2.0,
            4.0,
            f64::NEG_INFINITY,
        ])) as ArrayRef;
        let input = batch(vec![0; 6], values.clone());
        let frame = WindowFrame::rows(FrameBound::Bounded(1), FrameBound::Bounded(0));
        let out = get_aggregate_function(AggregationId::Sum)
            .create_window_handle(&[DataType::Float64], vec![0], vec![], frame)
            .calculate(&input, &[values])
            .unwrap();
        let out = out.as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(out.value(0), f64::INFINITY);
        assert_eq!(out.value(1), f64::INFINITY);
        assert!(out.value(2).is_nan());
        assert!(out.value(3).is_nan());
        assert_eq!(out.value(4), 6.0);
        assert_eq!(out.value(5), f64::NEG_INFINITY);
    }

    #[test]
    fn mismatched_argument_is_an_error() {
        let values = Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef;
        let input = batch(vec![0, 0], values.clone());
        let handle = get_aggregate_function(AggregationId::Sum).create_window_handle(
            &[DataType::Int64],
            vec![0],
            vec![],
            WindowFrame::running(),
        );
        assert!(handle.calculate(&input, &[values]).is_err());
        assert!(handle.calculate(&input, &[]).is_err());
    }
}
