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
//! Accumulator states.
//!
//! Primitive numeric SUM and COUNT states are plain atomics and may be
//! updated from several threads at once. Everything that needs a
//! compare-then-replace or arithmetic on `TypedValue` is a plain value type
//! wrapped in a [`GuardedState`], which owns the lock for that one slot.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::exec::types::TypedValue;

/// Numeric accumulator types with a lock-free add. Types without one go
/// through [`GuardedState`] instead and never implement this trait.
pub trait AtomicAccumulate: Copy + Send + Sync + 'static {
    type Atomic: Send + Sync;
    const ZERO: Self;

    fn new_atomic(value: Self) -> Self::Atomic;
    fn fetch_add(atomic: &Self::Atomic, value: Self);
    fn load(atomic: &Self::Atomic) -> Self;
    fn into_typed(self) -> TypedValue;
}

impl AtomicAccumulate for i64 {
    type Atomic = AtomicI64;
    const ZERO: Self = 0;

    fn new_atomic(value: Self) -> AtomicI64 {
        AtomicI64::new(value)
    }

    #[inline]
    fn fetch_add(atomic: &AtomicI64, value: Self) {
        atomic.fetch_add(value, Ordering::Relaxed);
    }

    fn load(atomic: &AtomicI64) -> Self {
        atomic.load(Ordering::Relaxed)
    }

    fn into_typed(self) -> TypedValue {
        TypedValue::Int64(self)
    }
}

impl AtomicAccumulate for f64 {
    type Atomic = AtomicU64;
    const ZERO: Self = 0.0;

    fn new_atomic(value: Self) -> AtomicU64 {
        AtomicU64::new(value.to_bits())
    }

    /// No hardware float add: retry a compare-and-swap on the bit pattern.
    #[inline]
    fn fetch_add(atomic: &AtomicU64, value: Self) {
        let mut current = atomic.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match atomic.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn load(atomic: &AtomicU64) -> Self {
        f64::from_bits(atomic.load(Ordering::Relaxed))
    }

    fn into_typed(self) -> TypedValue {
        TypedValue::Float64(self)
    }
}

/// SUM over a primitive numeric column.
pub struct AtomicSumState<T: AtomicAccumulate> {
    sum: T::Atomic,
    is_null: AtomicBool,
}

impl<T: AtomicAccumulate> AtomicSumState<T> {
    pub fn new() -> Self {
        Self {
            sum: T::new_atomic(T::ZERO),
            is_null: AtomicBool::new(true),
        }
    }

    #[inline]
    pub fn add(&self, value: T) {
        T::fetch_add(&self.sum, value);
        self.is_null.store(false, Ordering::Relaxed);
    }

    pub fn merge_from(&self, source: &Self) {
        if source.is_null() {
            return;
        }
        self.add(source.sum());
    }

    pub fn sum(&self) -> T {
        T::load(&self.sum)
    }

    pub fn is_null(&self) -> bool {
        self.is_null.load(Ordering::Relaxed)
    }
}

impl<T: AtomicAccumulate> Default for AtomicSumState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AtomicAccumulate> Clone for AtomicSumState<T> {
    fn clone(&self) -> Self {
        Self {
            sum: T::new_atomic(self.sum()),
            is_null: AtomicBool::new(self.is_null()),
        }
    }
}

#[derive(Default)]
pub struct CountState {
    count: AtomicI64,
}

impl CountState {
    #[inline]
    pub fn add(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Clone for CountState {
    fn clone(&self) -> Self {
        Self {
            count: AtomicI64::new(self.count()),
        }
    }
}

/// AVG over a primitive numeric column: the SUM and COUNT components are
/// updated independently, each with its own atomic.
#[derive(Clone, Default)]
pub struct AtomicAvgState<T: AtomicAccumulate> {
    pub(super) sum: AtomicSumState<T>,
    pub(super) count: CountState,
}

/// SUM whose accumulator is a `TypedValue` (interval types).
#[derive(Clone, Debug, Default)]
pub struct TypedSumState {
    pub(super) sum: TypedValue,
    pub(super) is_null: bool,
}

impl TypedSumState {
    pub(super) fn with_zero(zero: TypedValue) -> Self {
        Self {
            sum: zero,
            is_null: true,
        }
    }
}

/// MIN or MAX. The extreme is NULL until the first non-null input.
#[derive(Clone, Debug, Default)]
pub struct ExtremeState {
    pub(super) extreme: TypedValue,
}

#[derive(Clone, Debug, Default)]
pub struct TypedAvgState {
    pub(super) sum: TypedValue,
    pub(super) count: i64,
}

/// One lock per state slot. The wrapped value is an ordinary value type;
/// copying a guarded state snapshots the value under the lock and gives the
/// copy a fresh lock.
#[derive(Default)]
pub struct GuardedState<T> {
    lock: Mutex<T>,
}

impl<T> GuardedState<T> {
    pub fn new(value: T) -> Self {
        Self {
            lock: Mutex::new(value),
        }
    }

    /// Runs `f` with exclusive access to the value. A poisoned lock only
    /// means another updater panicked; the value itself is still usable.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}

impl<T: Clone> GuardedState<T> {
    pub fn snapshot(&self) -> T {
        self.with_lock(|value| value.clone())
    }
}

impl<T: Clone> Clone for GuardedState<T> {
    fn clone(&self) -> Self {
        Self::new(self.snapshot())
    }
}

/// The running accumulation of one aggregate for one group.
///
/// The variant is fixed by the handle that created it; passing a state to a
/// handle of another kind is a contract violation and panics.
#[derive(Clone)]
pub enum AggregationState {
    Count(CountState),
    SumLong(AtomicSumState<i64>),
    SumDouble(AtomicSumState<f64>),
    SumTyped(GuardedState<TypedSumState>),
    Extreme(GuardedState<ExtremeState>),
    AvgLong(AtomicAvgState<i64>),
    AvgDouble(AtomicAvgState<f64>),
    AvgTyped(GuardedState<TypedAvgState>),
}

impl AggregationState {
    pub fn kind_name(&self) -> &'static str {
        match self {
            AggregationState::Count(_) => "count",
            AggregationState::SumLong(_) => "sum(long)",
            AggregationState::SumDouble(_) => "sum(double)",
            AggregationState::SumTyped(_) => "sum(typed)",
            AggregationState::Extreme(_) => "extreme",
            AggregationState::AvgLong(_) => "avg(long)",
            AggregationState::AvgDouble(_) => "avg(double)",
            AggregationState::AvgTyped(_) => "avg(typed)",
        }
    }

    /// `(sum, is_null)` of a SUM state; `None` for other kinds.
    pub fn sum_snapshot(&self) -> Option<(TypedValue, bool)> {
        match self {
            AggregationState::SumLong(s) => Some((s.sum().into_typed(), s.is_null())),
            AggregationState::SumDouble(s) => Some((s.sum().into_typed(), s.is_null())),
            AggregationState::SumTyped(s) => {
                let state = s.snapshot();
                Some((state.sum, state.is_null))
            }
            _ => None,
        }
    }

    /// Whether concurrent updates go through hardware atomics rather than a
    /// per-slot lock.
    pub fn is_lock_free(&self) -> bool {
        matches!(
            self,
            AggregationState::Count(_)
                | AggregationState::SumLong(_)
                | AggregationState::SumDouble(_)
                | AggregationState::AvgLong(_)
                | AggregationState::AvgDouble(_)
        )
    }
}

impl std::fmt::Debug for AggregationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationState::Count(s) => f.debug_struct("Count").field("count", &s.count()).finish(),
            AggregationState::SumLong(s) => f
                .debug_struct("SumLong")
                .field("sum", &s.sum())
                .field("is_null", &s.is_null())
                .finish(),
            AggregationState::SumDouble(s) => f
                .debug_struct("SumDouble")
                .field("sum", &s.sum())
                .field("is_null", &s.is_null())
                .finish(),
            AggregationState::SumTyped(s) => f.debug_tuple("SumTyped").field(&s.snapshot()).finish(),
            AggregationState::Extreme(s) => f.debug_tuple("Extreme").field(&s.snapshot()).finish(),
            AggregationState::AvgLong(s) => f
                .debug_struct("AvgLong")
                .field("sum", &s.sum.sum())
                .field("count", &s.count.count())
                .finish(),
            AggregationState::AvgDouble(s) => f
                .debug_struct("AvgDouble")
                .field("sum", &s.sum.sum())
                .field("count", &s.count.count())
                .finish(),
            AggregationState::AvgTyped(s) => f.debug_tuple("AvgTyped").field(&s.snapshot()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn float_cas_add_is_exact_under_contention() {
        let state = Arc::new(AtomicSumState::<f64>::new());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let state = Arc::clone(&state);
                scope.spawn(move || {
                    for _ in 0..1000 {
                        state.add(0.5);
                    }
                });
            }
        });
        assert_eq!(state.sum(), 2000.0);
        assert!(!state.is_null());
    }

    #[test]
    fn null_sum_merge_is_identity() {
        let dst = AtomicSumState::<i64>::new();
        dst.add(5);
        dst.merge_from(&AtomicSumState::new());
        assert_eq!(dst.sum(), 5);
        assert!(!dst.is_null());
    }

    #[test]
    fn guarded_clone_snapshots_value() {
        let guarded = GuardedState::new(ExtremeState {
            extreme: TypedValue::Int32(3),
        });
        let copy = guarded.clone();
        guarded.with_lock(|s| s.extreme = TypedValue::Int32(9));
        assert_eq!(copy.snapshot().extreme, TypedValue::Int32(3));
        assert_eq!(guarded.snapshot().extreme, TypedValue::Int32(9));
    }
}
