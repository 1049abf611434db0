use std::time::Duration;

/// Compact duration for log fields, two decimals in the largest fitting
/// unit: `850.00µs`, `1.94ms`, `12.30s`.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}
