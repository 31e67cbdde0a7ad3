use crate::models::{SignalSet, TrendPoint};

/// Week-over-week percent change between the two most recent periods.
/// Needs at least two points and a non-zero previous value.
pub fn pct_change(points: &[TrendPoint]) -> Option<i64> {
    if points.len() < 2 {
        return None;
    }
    let last = points[points.len() - 1].interest;
    let prev = points[points.len() - 2].interest;
    if prev == 0 {
        return None;
    }
    Some((100.0 * (last - prev) as f64 / prev as f64).round() as i64)
}

pub fn average(points: &[TrendPoint]) -> i64 {
    if points.is_empty() {
        return 0;
    }
    let sum: i64 = points.iter().map(|p| p.interest).sum();
    (sum as f64 / points.len() as f64).round() as i64
}

/// Percentage of consecutive transitions where interest did not drop.
/// Needs at least three points to say anything.
pub fn stability(points: &[TrendPoint]) -> i64 {
    if points.len() < 3 {
        return 0;
    }
    let rising = points
        .windows(2)
        .filter(|pair| pair[1].interest >= pair[0].interest)
        .count();
    (100.0 * rising as f64 / (points.len() - 1) as f64).round() as i64
}

pub fn derive(points: &[TrendPoint]) -> SignalSet {
    SignalSet {
        pct_change: pct_change(points),
        average: average(points),
        stability: stability(points),
    }
}

/// Growth weighted by volume and stability, used in the alert subject.
pub fn composite_score(signals: &SignalSet) -> i64 {
    let pct = signals.pct_change.unwrap_or(0) as f64;
    (pct * signals.average as f64 / 100.0 * signals.stability as f64 / 100.0).round() as i64
}
