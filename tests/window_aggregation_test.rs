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
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use aggcore::exec::expr::agg::{AggregationId, get_aggregate_function};
use aggcore::exec::node::analytic::{FrameBound, WindowFrame};
use aggcore::exec::types::{TypedColumnView, TypedValue};

/// Column 0 is the partition key, column 1 the order key, column 2 the value.
fn make_batch(partition: Vec<i32>, order: Vec<i32>, values: Vec<Option<i64>>) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("p", DataType::Int32, false),
        Field::new("o", DataType::Int32, false),
        Field::new("v", DataType::Int64, true),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int32Array::from(partition)) as ArrayRef,
            Arc::new(Int32Array::from(order)) as ArrayRef,
            Arc::new(Int64Array::from(values)) as ArrayRef,
        ],
    )
    .unwrap()
}

fn bound(b: FrameBound) -> usize {
    match b {
        FrameBound::Bounded(n) => n as usize,
        FrameBound::Unbounded => usize::MAX,
    }
}

/// Aggregates every row's frame from scratch.
fn brute_force(
    id: AggregationId,
    partition: &[i32],
    values: &[Option<i64>],
    frame: WindowFrame,
) -> Vec<TypedValue> {
    (0..values.len())
        .map(|current| {
            let in_frame: Vec<i64> = (0..values.len())
                .filter(|&row| partition[row] == partition[current])
                .filter(|&row| row >= current || current - row <= bound(frame.preceding))
                .filter(|&row| row <= current || row - current <= bound(frame.following))
                .filter_map(|row| values[row])
                .collect();
            let count = in_frame.len() as i64;
            match id {
                AggregationId::Count => TypedValue::Int64(count),
                _ if in_frame.is_empty() => TypedValue::Null,
                AggregationId::Sum => TypedValue::Int64(in_frame.iter().sum()),
                AggregationId::Min => TypedValue::Int64(*in_frame.iter().min().unwrap()),
                AggregationId::Max => TypedValue::Int64(*in_frame.iter().max().unwrap()),
                AggregationId::Avg => {
                    TypedValue::Float64(in_frame.iter().sum::<i64>() as f64 / count as f64)
                }
            }
        })
        .collect()
}

fn run_window(
    id: AggregationId,
    batch: &RecordBatch,
    order_key_ids: Vec<usize>,
    frame: WindowFrame,
) -> Vec<TypedValue> {
    let handle = get_aggregate_function(id).create_window_handle(
        &[DataType::Int64],
        vec![0],
        order_key_ids,
        frame,
    );
    let out = handle.calculate(batch, &[batch.column(2).clone()]).unwrap();
    assert_eq!(out.len(), batch.num_rows());
    let view = TypedColumnView::new(out.as_ref()).unwrap();
    (0..out.len()).map(|row| view.value_at(row)).collect()
}

#[test]
fn test_rows_frames_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let bounds = [
        FrameBound::Bounded(0),
        FrameBound::Bounded(1),
        FrameBound::Bounded(3),
        FrameBound::Unbounded,
    ];
    for _ in 0..20 {
        let num_rows = rng.gen_range(0..60);
        let mut partition = Vec::with_capacity(num_rows);
        let mut p = 0;
        for _ in 0..num_rows {
            if rng.gen_bool(0.15) {
                p += 1;
            }
            partition.push(p);
        }
        let values: Vec<Option<i64>> = (0..num_rows)
            .map(|_| rng.gen_bool(0.8).then(|| rng.gen_range(-50..50)))
            .collect();
        let order: Vec<i32> = (0..num_rows as i32).collect();
        let batch = make_batch(partition.clone(), order, values.clone());

        for preceding in bounds {
            for following in bounds {
                let frame = WindowFrame::rows(preceding, following);
                for id in [
                    AggregationId::Sum,
                    AggregationId::Min,
                    AggregationId::Max,
                    AggregationId::Count,
                    AggregationId::Avg,
                ] {
                    assert_eq!(
                        run_window(id, &batch, vec![1], frame),
                        brute_force(id, &partition, &values, frame),
                        "{} over {:?}",
                        id.name(),
                        frame
                    );
                }
            }
        }
    }
}

#[test]
fn test_avg_over_partitions_of_eight() {
    let partition: Vec<i32> = (0..100).map(|i| i / 8).collect();
    let order: Vec<i32> = (0..100).collect();
    let values: Vec<Option<i64>> = (0..100)
        .map(|i| if i % 25 == 0 { None } else { Some(i as i64) })
        .collect();
    let batch = make_batch(partition.clone(), order, values.clone());
    let frame = WindowFrame::rows(FrameBound::Bounded(2), FrameBound::Bounded(2));

    let result = run_window(AggregationId::Avg, &batch, vec![1], frame);
    assert_eq!(
        result,
        brute_force(AggregationId::Avg, &partition, &values, frame)
    );
    assert_eq!(result[0], TypedValue::Float64(1.5));
    assert_eq!(result[10], TypedValue::Float64(10.0));
    // Row 7 closes the first partition: rows 5..=7.
    assert_eq!(result[7], TypedValue::Float64(6.0));
    // Row 8 opens the second one: rows 8..=10.
    assert_eq!(result[8], TypedValue::Float64(9.0));
}

#[test]
fn test_range_frame_uses_order_key_values() {
    let batch = make_batch(
        vec![0, 0, 0, 0, 0, 0, 1, 1],
        vec![1, 2, 2, 5, 6, 10, 1, 2],
        vec![Some(1), Some(2), Some(2), Some(5), Some(6), Some(10), Some(100), None],
    );
    let frame = WindowFrame::range(FrameBound::Bounded(1), FrameBound::Bounded(0));
    assert_eq!(
        run_window(AggregationId::Sum, &batch, vec![1], frame),
        vec![
            TypedValue::Int64(1),
            TypedValue::Int64(5),
            TypedValue::Int64(5),
            TypedValue::Int64(5),
            TypedValue::Int64(11),
            TypedValue::Int64(10),
            TypedValue::Int64(100),
            TypedValue::Int64(100),
        ]
    );

    let unbounded = WindowFrame::range(FrameBound::Unbounded, FrameBound::Bounded(0));
    assert_eq!(
        run_window(AggregationId::Count, &batch, vec![1], unbounded),
        [1, 3, 3, 4, 5, 6, 1, 1]
            .into_iter()
            .map(TypedValue::Int64)
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_range_frame_without_order_key_is_an_error() {
    let batch = make_batch(vec![0], vec![0], vec![Some(1)]);
    let handle = get_aggregate_function(AggregationId::Sum).create_window_handle(
        &[DataType::Int64],
        vec![0],
        vec![],
        WindowFrame::range(FrameBound::Bounded(1), FrameBound::Bounded(1)),
    );
    assert!(handle.calculate(&batch, &[batch.column(2).clone()]).is_err());
}

#[test]
fn test_sliding_min_max_track_leaving_rows() {
    let values = vec![Some(5), Some(1), Some(4), Some(3), None, Some(9), Some(2)];
    let partition = vec![0; values.len()];
    let order: Vec<i32> = (0..values.len() as i32).collect();
    let batch = make_batch(partition.clone(), order, values.clone());
    let frame = WindowFrame::rows(FrameBound::Bounded(2), FrameBound::Bounded(0));

    let min = run_window(AggregationId::Min, &batch, vec![1], frame);
    assert_eq!(
        min,
        vec![
            TypedValue::Int64(5),
            TypedValue::Int64(1),
            TypedValue::Int64(1),
            TypedValue::Int64(1),
            TypedValue::Int64(3),
            TypedValue::Int64(3),
            TypedValue::Int64(2),
        ]
    );
    let max = run_window(AggregationId::Max, &batch, vec![1], frame);
    assert_eq!(max, brute_force(AggregationId::Max, &partition, &values, frame));
}

#[test]
fn test_float_window_sum() {
    let schema = Schema::new(vec![
        Field::new("p", DataType::Int32, false),
        Field::new("v", DataType::Float64, true),
    ]);
    let values = Arc::new(Float64Array::from(vec![Some(0.5), Some(0.25), None, Some(1.0)])) as ArrayRef;
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![Arc::new(Int32Array::from(vec![0, 0, 0, 0])) as ArrayRef, values.clone()],
    )
    .unwrap();
    let out = get_aggregate_function(AggregationId::Sum)
        .create_window_handle(&[DataType::Float64], vec![0], vec![], WindowFrame::running())
        .calculate(&batch, &[values])
        .unwrap();
    let out = out.as_any().downcast_ref::<Float64Array>().unwrap();
    assert_eq!(out.values().to_vec(), vec![0.5, 0.75, 0.75, 1.75]);
}

#[test]
fn test_signed_zero_partition_keys_are_one_partition() {
    let schema = Schema::new(vec![
        Field::new("p", DataType::Float64, false),
        Field::new("v", DataType::Int64, true),
    ]);
    let values = Arc::new(Int64Array::from(vec![1, 2, 4])) as ArrayRef;
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Float64Array::from(vec![0.0, -0.0, 0.0])) as ArrayRef,
            values.clone(),
        ],
    )
    .unwrap();
    let out = get_aggregate_function(AggregationId::Sum)
        .create_window_handle(&[DataType::Int64], vec![0], vec![], WindowFrame::running())
        .calculate(&batch, &[values])
        .unwrap();
    let out = out.as_any().downcast_ref::<Int64Array>().unwrap();
    assert_eq!(out.values().to_vec(), vec![1, 3, 7]);
}

#[test]
fn test_range_frame_near_long_limits() {
    let schema = Schema::new(vec![
        Field::new("p", DataType::Int32, false),
        Field::new("o", DataType::Int64, false),
        Field::new("v", DataType::Int64, true),
    ]);
    let batch = RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int32Array::from(vec![0, 0, 0])) as ArrayRef,
            Arc::new(Int64Array::from(vec![i64::MAX - 2, i64::MAX - 1, i64::MAX])) as ArrayRef,
            Arc::new(Int64Array::from(vec![1, 2, 4])) as ArrayRef,
        ],
    )
    .unwrap();
    let following = WindowFrame::range(FrameBound::Bounded(0), FrameBound::Bounded(5));
    assert_eq!(
        run_window(AggregationId::Sum, &batch, vec![1], following),
        vec![TypedValue::Int64(7), TypedValue::Int64(6), TypedValue::Int64(4)]
    );
    let preceding = WindowFrame::range(FrameBound::Bounded(u64::MAX), FrameBound::Bounded(0));
    assert_eq!(
        run_window(AggregationId::Sum, &batch, vec![1], preceding),
        vec![TypedValue::Int64(1), TypedValue::Int64(3), TypedValue::Int64(7)]
    );
}
