//! Batch aggregation

use stockflow_core::Batch;

/// Arithmetic mean of a batch's prices.
///
/// Prices are summed in ascending order so the result does not depend on the
/// order events arrived in. The batch itself is left untouched. A sum that
/// overflows f64 falls back to averaging pre-scaled prices.
pub fn mean_price(batch: &Batch) -> f64 {
    let mut prices: Vec<f64> = batch.prices().collect();
    prices.sort_by(|a, b| a.total_cmp(b));
    let count = prices.len() as f64;

    let total: f64 = prices.iter().sum();
    if total.is_finite() {
        return total / count;
    }
    // Scale first; each term is bounded by the largest price magnitude.
    prices.iter().map(|p| p / count).sum()
}
