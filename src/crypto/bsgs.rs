//! Baby-step-giant-step discrete-log recovery for exponential ElGamal,
//! bounded by `MAX_SUM`.
//!
//! To search a signed range `[-max_abs, max_abs]` with the standard
//! non-negative BSGS recurrence, we shift the target point by `max_abs * G`
//! first: if `point == m*G` then `point + max_abs*G == (m + max_abs)*G`,
//! and `m + max_abs` lies in the non-negative range `[0, 2*max_abs]`.

use std::collections::HashMap;

use super::curve::{self, Point, Scalar};

/// Recover the signed integer `m` with `|m| <= max_abs` such that
/// `point == m * G`, or `None` if no such `m` exists in range.
pub fn bsgs_decode(point: &Point, max_abs: i64) -> Option<i64> {
    BsgsTable::new(max_abs).decode(point)
}

/// A precomputed baby-step table, reusable across many [`bsgs_decode`]
/// calls against the same bound (e.g. across many days of SUM recoveries).
pub struct BsgsTable {
    max_abs: i64,
    step: u64,
    baby_steps: HashMap<Vec<u8>, u64>,
    giant_stride: Point,
    shift: Point,
}

impl BsgsTable {
    /// Build a table covering `[-max_abs, max_abs]`.
    pub fn new(max_abs: i64) -> Self {
        let max_abs = max_abs.max(0);
        let span = 2u64.saturating_mul(max_abs as u64).saturating_add(1);
        let step = (span as f64).sqrt().ceil() as u64 + 1;
        let g = curve::generator();

        let mut baby_steps = HashMap::with_capacity(step as usize + 1);
        let mut acc = curve::identity();
        for j in 0..=step {
            baby_steps.entry(curve::point_to_bytes(&acc)).or_insert(j);
            acc = curve::add(&acc, &g);
        }

        let giant_stride = curve::neg(&curve::scalar_mul(&g, &Scalar::from(step)));
        let shift = curve::scalar_mul(&g, &Scalar::from(max_abs as u64));

        BsgsTable {
            max_abs,
            step,
            baby_steps,
            giant_stride,
            shift,
        }
    }

    /// Decode `point = m * G` for `|m| <= max_abs`, or `None` if out of range.
    pub fn decode(&self, point: &Point) -> Option<i64> {
        let span = 2u64.saturating_mul(self.max_abs as u64).saturating_add(1);
        let num_giants = span / self.step.max(1) + 2;

        let mut giant = curve::add(point, &self.shift);
        for i in 0..=num_giants {
            if let Some(&j) = self.baby_steps.get(&curve::point_to_bytes(&giant)) {
                let shifted = i * self.step + j;
                if shifted <= span {
                    let m = shifted as i64 - self.max_abs;
                    if m.abs() <= self.max_abs {
                        return Some(m);
                    }
                }
            }
            giant = curve::add(&giant, &self.giant_stride);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_small_positive_and_negative_values() {
        let g = curve::generator();
        for m in [0i64, 1, 16, -16, 1000, -1000] {
            let scalar = if m >= 0 {
                Scalar::from(m as u64)
            } else {
                -Scalar::from((-m) as u64)
            };
            let point = curve::scalar_mul(&g, &scalar);
            assert_eq!(bsgs_decode(&point, 2000), Some(m));
        }
    }

    #[test]
    fn out_of_range_fails() {
        let g = curve::generator();
        let point = curve::scalar_mul(&g, &Scalar::from(5000u64));
        assert_eq!(bsgs_decode(&point, 100), None);
    }

    #[test]
    fn zero_decodes_to_identity() {
        assert_eq!(bsgs_decode(&curve::identity(), 10), Some(0));
    }
}
