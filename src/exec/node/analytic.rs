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
//! Window frame specification.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowType {
    /// Bounds count rows relative to the current row.
    Rows,
    /// Bounds are value offsets on the first order key.
    Range,
}

/// One side of a frame: a non-negative distance from the current row, or
/// no limit at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameBound {
    Bounded(u64),
    Unbounded,
}

impl FrameBound {
    /// Converts the `-1 = UNBOUNDED` encoding used by plan descriptions.
    /// Other negative distances are rejected rather than clamped.
    pub fn from_legacy(value: i64) -> Result<Self, String> {
        match value {
            -1 => Ok(FrameBound::Unbounded),
            v if v >= 0 => Ok(FrameBound::Bounded(v as u64)),
            v => Err(format!(
                "window frame bound must be non-negative or -1 (unbounded), got {}",
                v
            )),
        }
    }

    /// The bounded distance, or `None` for no limit on that side.
    pub fn distance(&self) -> Option<u64> {
        match self {
            FrameBound::Bounded(n) => Some(*n),
            FrameBound::Unbounded => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowFrame {
    pub window_type: WindowType,
    pub preceding: FrameBound,
    pub following: FrameBound,
}

impl WindowFrame {
    pub fn rows(preceding: FrameBound, following: FrameBound) -> Self {
        Self {
            window_type: WindowType::Rows,
            preceding,
            following,
        }
    }

    pub fn range(preceding: FrameBound, following: FrameBound) -> Self {
        Self {
            window_type: WindowType::Range,
            preceding,
            following,
        }
    }

    /// `UNBOUNDED PRECEDING AND CURRENT ROW` in ROWS mode.
    pub fn running() -> Self {
        Self::rows(FrameBound::Unbounded, FrameBound::Bounded(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_bounds() {
        assert_eq!(FrameBound::from_legacy(-1), Ok(FrameBound::Unbounded));
        assert_eq!(FrameBound::from_legacy(3), Ok(FrameBound::Bounded(3)));
        assert!(FrameBound::from_legacy(-2).is_err());
        assert_eq!(FrameBound::from_legacy(0).unwrap().distance(), Some(0));
        assert_eq!(FrameBound::from_legacy(-1).unwrap().distance(), None);
    }
}
