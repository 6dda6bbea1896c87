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
use arrow::array::{Array, ArrayRef, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;

/// Integer input widened to `i64`.
#[derive(Clone, Debug)]
pub enum IntArrayView<'a> {
    Int64(&'a Int64Array),
    Int32(&'a Int32Array),
}

impl<'a> IntArrayView<'a> {
    pub fn new(array: &'a ArrayRef) -> Result<Self, String> {
        match array.data_type() {
            DataType::Int64 => array
                .as_any()
                .downcast_ref::<Int64Array>()
                .map(Self::Int64)
                .ok_or_else(|| "failed to downcast to Int64Array".to_string()),
            DataType::Int32 => array
                .as_any()
                .downcast_ref::<Int32Array>()
                .map(Self::Int32)
                .ok_or_else(|| "failed to downcast to Int32Array".to_string()),
            other => Err(format!("unsupported int input type: {:?}", other)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IntArrayView::Int64(arr) => arr.len(),
            IntArrayView::Int32(arr) => arr.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn value_at(&self, row: usize) -> Option<i64> {
        match self {
            IntArrayView::Int64(arr) => (!arr.is_null(row)).then(|| arr.value(row)),
            IntArrayView::Int32(arr) => (!arr.is_null(row)).then(|| arr.value(row) as i64),
        }
    }

    /// Wrapping sum of the non-null values, `None` if there are none.
    pub fn sum_non_null(&self) -> Option<i64> {
        let mut sum = 0i64;
        let mut seen = false;
        for row in 0..self.len() {
            if let Some(v) = self.value_at(row) {
                sum = sum.wrapping_add(v);
                seen = true;
            }
        }
        seen.then_some(sum)
    }
}

/// Floating point input widened to `f64`.
#[derive(Clone, Debug)]
pub enum FloatArrayView<'a> {
    Float64(&'a Float64Array),
    Float32(&'a Float32Array),
}

impl<'a> FloatArrayView<'a> {
    pub fn new(array: &'a ArrayRef) -> Result<Self, String> {
        match array.data_type() {
            DataType::Float64 => array
                .as_any()
                .downcast_ref::<Float64Array>()
                .map(Self::Float64)
                .ok_or_else(|| "failed to downcast to Float64Array".to_string()),
            DataType::Float32 => array
                .as_any()
                .downcast_ref::<Float32Array>()
                .map(Self::Float32)
                .ok_or_else(|| "failed to downcast to Float32Array".to_string()),
            other => Err(format!("unsupported float input type: {:?}", other)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FloatArrayView::Float64(arr) => arr.len(),
            FloatArrayView::Float32(arr) => arr.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn value_at(&self, row: usize) -> Option<f64> {
        match self {
            FloatArrayView::Float64(arr) => (!arr.is_null(row)).then(|| arr.value(row)),
            FloatArrayView::Float32(arr) => (!arr.is_null(row)).then(|| arr.value(row) as f64),
        }
    }

    pub fn sum_non_null(&self) -> Option<f64> {
        let mut sum = 0.0f64;
        let mut seen = false;
        for row in 0..self.len() {
            if let Some(v) = self.value_at(row) {
                sum += v;
                seen = true;
            }
        }
        seen.then_some(sum)
    }
}

/// Number of non-null values in `array`.
pub fn non_null_count(array: &dyn Array) -> i64 {
    (array.len() - array.null_count()) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn int_view_widens_and_skips_nulls() {
        let arr = Arc::new(Int32Array::from(vec![Some(1), None, Some(3), Some(5)])) as ArrayRef;
        let view = IntArrayView::new(&arr).unwrap();
        assert_eq!(view.value_at(1), None);
        assert_eq!(view.sum_non_null(), Some(9));
        assert_eq!(non_null_count(arr.as_ref()), 3);
    }

    #[test]
    fn float_view_all_null_sum_is_none() {
        let arr = Arc::new(Float32Array::from(vec![None::<f32>, None])) as ArrayRef;
        let view = FloatArrayView::new(&arr).unwrap();
        assert_eq!(view.sum_non_null(), None);
        assert!(IntArrayView::new(&arr).is_err());
    }
}
