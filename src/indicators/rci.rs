/// Calculate Rank Correlation Index (RCI)
///
/// Spearman correlation between time rank (newest = 1) and price rank
/// (highest = 1) over the last `period` closes, scaled to -100..=100.
/// Tied prices share the average of their ranks.
///
/// Returns `None` with fewer than `period` closes or `period < 2`.
pub fn calculate_rci(closes: &[f64], period: usize) -> Option<f64> {
    if period < 2 || closes.len() < period {
        return None;
    }

    // Newest first, so index + 1 is the time rank
    let window: Vec<f64> = closes.iter().rev().take(period).copied().collect();
    let price_ranks = rank_descending(&window);

    let d_squared: f64 = price_ranks
        .iter()
        .enumerate()
        .map(|(i, price_rank)| {
            let d = (i + 1) as f64 - price_rank;
            d * d
        })
        .sum();

    let n = period as f64;
    Some((1.0 - 6.0 * d_squared / (n * (n * n - 1.0))) * 100.0)
}

/// 1-based ranks, highest value first, ties averaged
fn rank_descending(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        // positions start..=end share ranks start+1..=end+1
        let shared = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = shared;
        }
        start = end + 1;
    }
    ranks
}
