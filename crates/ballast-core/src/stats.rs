//! Generic numeric helpers shared by services — confidence, softmax,
//! normalize. Plain vector math, no model semantics.

use std::collections::HashMap;

/// `(max / sum) * (1 - e^(-n))`, clamped to `[0, 1]`.
///
/// Approaches the max/sum ratio as the vector grows; an empty or zero-sum
/// vector scores zero.
pub fn confidence(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().sum();
    if sum == 0.0 {
        return 0.0;
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let scaled = (max / sum) * (1.0 - (-(values.len() as f64)).exp());
    scaled.clamp(0.0, 1.0)
}

/// Numerically stable softmax: the max is subtracted before exponentiating,
/// so large inputs cannot overflow. Output sums to 1 for any finite input.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Each element divided by the vector sum, keyed `value_0..value_n`.
/// A zero-sum vector normalizes to all zeros.
pub fn normalize(values: &[f64]) -> HashMap<String, f64> {
    let sum: f64 = values.iter().sum();
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let share = if sum == 0.0 { 0.0 } else { v / sum };
            (format!("value_{}", i), share)
        })
        .collect()
}
