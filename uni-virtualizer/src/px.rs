//! Pixel arithmetic that works without `std` float intrinsics.

/// Largest whole number `<= value`.
pub(crate) fn floor(value: f64) -> f64 {
    let truncated = value as i64 as f64;
    if truncated > value {
        truncated - 1.0
    } else {
        truncated
    }
}

/// Rounds half up, the way browser layout code rounds pixel sizes.
pub(crate) fn round(value: f64) -> f64 {
    floor(value + 0.5)
}
