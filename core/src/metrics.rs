//! Pure computations behind the §4.9 metrics aggregations. The store crate
//! owns the SQL queries that gather raw rows; this module owns the formulas
//! so they are unit-testable without a database.

/// `1 - |actual - estimated| / max(estimated, epsilon)`, clamped to [0,1].
pub fn estimation_accuracy(estimated: f64, actual: f64) -> f64 {
    const EPSILON: f64 = 1e-6;
    let denominator = estimated.max(EPSILON);
    let raw = 1.0 - (actual - estimated).abs() / denominator;
    raw.clamp(0.0, 1.0)
}

/// `YYYY-MM` bucket key for a completion timestamp, used for the monthly
/// feedback trend.
pub fn month_bucket(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    timestamp.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn perfect_estimate_scores_one() {
        assert_eq!(estimation_accuracy(10.0, 10.0), 1.0);
    }

    #[test]
    fn wildly_off_estimate_clamps_to_zero() {
        assert_eq!(estimation_accuracy(1.0, 100.0), 0.0);
    }

    #[test]
    fn zero_estimate_does_not_divide_by_zero() {
        let score = estimation_accuracy(0.0, 0.0);
        assert!(score.is_finite());
        assert_eq!(score, 1.0);
    }

    #[test]
    fn month_bucket_formats_year_month() {
        let ts = chrono::Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        assert_eq!(month_bucket(ts), "2026-03");
    }
}
