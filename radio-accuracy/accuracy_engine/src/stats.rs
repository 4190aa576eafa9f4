//! Small statistics helpers shared by the scorers.

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Population standard deviation (divides by n).
pub fn std_dev(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64;
    Some(var.sqrt())
}

/// Pearson correlation coefficient. `None` when fewer than two points or when
/// either series has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Correlation of a difference sequence against its index.
///
/// A constant sequence (including a single difference) has no variance, so
/// Pearson is undefined; it is read as a perfectly monotone trend in the
/// direction of its sign, and as no trend when it is zero.
pub fn trend_correlation(diffs: &[f64]) -> Option<f64> {
    if diffs.is_empty() {
        return None;
    }
    let index: Vec<f64> = (0..diffs.len()).map(|i| i as f64).collect();
    pearson(&index, diffs).or_else(|| {
        let m = mean(diffs)?;
        Some(if m.abs() <= f64::EPSILON { 0.0 } else { m.signum() })
    })
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
