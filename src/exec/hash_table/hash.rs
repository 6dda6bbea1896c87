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
//! Float canonicalization shared by key equality and key hashing.

/// Bit pattern used to hash and compare a DOUBLE key field. All NaN
/// payloads collapse to one value and `-0.0` is keyed as `0.0`.
pub(crate) fn canonical_f64_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

pub(crate) fn canonical_f32_bits(value: f32) -> u32 {
    if value.is_nan() {
        f32::NAN.to_bits()
    } else if value == 0.0 {
        0.0f32.to_bits()
    } else {
        value.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_payloads_collapse() {
        let quiet = f64::NAN;
        let other = f64::from_bits(f64::NAN.to_bits() | 1);
        assert!(other.is_nan());
        assert_eq!(canonical_f64_bits(quiet), canonical_f64_bits(other));
        assert_ne!(canonical_f64_bits(0.0), canonical_f64_bits(1.0));
        assert_eq!(canonical_f32_bits(-f32::NAN), canonical_f32_bits(f32::NAN));
    }

    #[test]
    fn signed_zeros_collapse() {
        assert_eq!(canonical_f64_bits(-0.0), canonical_f64_bits(0.0));
        assert_eq!(canonical_f32_bits(-0.0), canonical_f32_bits(0.0));
        assert_ne!(canonical_f64_bits(-1.0), canonical_f64_bits(1.0));
    }
}
