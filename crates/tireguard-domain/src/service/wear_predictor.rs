//! Tread wear forecasting from historical depth readings

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use tireguard_types::{Fingerprint, WearStatus};

/// Legal minimum tread depth (mm)
pub const MIN_TREAD_DEPTH_MM: f64 = 1.6;

/// Days reported when no measurable wear is observed
const HEALTHY_DAYS_REMAINING: i64 = 999;

const FORECAST_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthReading {
    pub date: NaiveDate,
    pub depth_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WearPrediction {
    pub current_depth_mm: f64,
    pub wear_rate_per_day: f64,
    pub days_remaining: i64,
    pub predicted_replacement_date: NaiveDate,
    pub status: WearStatus,
    pub confidence: f64,
}

/// Forecast remaining service life. Needs at least two readings.
pub fn predict(history: &[DepthReading], today: NaiveDate) -> Option<WearPrediction> {
    if history.len() < 2 {
        return None;
    }

    let mut sorted = history.to_vec();
    sorted.sort_by_key(|r| r.date);
    let first = sorted[0];
    let last = sorted[sorted.len() - 1];

    let wear_amount = first.depth_mm - last.depth_mm;
    if wear_amount <= 0.0 {
        return Some(WearPrediction {
            current_depth_mm: last.depth_mm,
            wear_rate_per_day: 0.0,
            days_remaining: HEALTHY_DAYS_REMAINING,
            predicted_replacement_date: add_days(today, HEALTHY_DAYS_REMAINING),
            status: WearStatus::Good,
            confidence: 0.0,
        });
    }

    // readings on the same day still count as one day of wear
    let days = (last.date - first.date).num_days().max(1) as f64;
    let wear_rate_per_day = wear_amount / days;
    let remaining_depth = last.depth_mm - MIN_TREAD_DEPTH_MM;

    if remaining_depth <= 0.0 {
        return Some(WearPrediction {
            current_depth_mm: last.depth_mm,
            wear_rate_per_day,
            days_remaining: 0,
            predicted_replacement_date: today,
            status: WearStatus::Critical,
            confidence: 1.0,
        });
    }

    let days_remaining = (remaining_depth / wear_rate_per_day).floor() as i64;

    Some(WearPrediction {
        current_depth_mm: last.depth_mm,
        wear_rate_per_day,
        days_remaining,
        predicted_replacement_date: add_days(today, days_remaining),
        status: WearStatus::from_days_remaining(days_remaining),
        confidence: FORECAST_CONFIDENCE,
    })
}

/// Depth readings carried by fingerprints (frames without a depth are skipped)
pub fn readings_from_frames<'a>(frames: impl IntoIterator<Item = &'a Fingerprint>) -> Vec<DepthReading> {
    frames
        .into_iter()
        .filter_map(|f| {
            f.tread_depth_mm.map(|depth_mm| DepthReading {
                date: f.captured_at.date_naive(),
                depth_mm,
            })
        })
        .collect()
}

fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_days(Days::new(days.max(0) as u64))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn reading(offset_days: i64, depth_mm: f64) -> DepthReading {
        DepthReading {
            date: day0() + Duration::days(offset_days),
            depth_mm,
        }
    }

    #[test]
    fn test_needs_two_points() {
        assert!(predict(&[], day0()).is_none());
        assert!(predict(&[reading(0, 10.0)], day0()).is_none());
    }

    #[test]
    fn test_thirty_day_wear_forecast() {
        let today = day0() + Duration::days(30);
        let prediction = predict(&[reading(0, 10.0), reading(30, 9.0)], today).unwrap();

        assert!((prediction.wear_rate_per_day - 0.0333).abs() < 0.0001);
        assert_eq!(prediction.days_remaining, 222);
        assert_eq!(prediction.status, WearStatus::Good);
        assert_eq!(prediction.confidence, 0.85);
        assert_eq!(prediction.predicted_replacement_date, today + Duration::days(222));
    }

    #[test]
    fn test_history_order_does_not_matter() {
        let shuffled = [reading(30, 9.0), reading(15, 9.4), reading(0, 10.0)];
        let prediction = predict(&shuffled, day0()).unwrap();
        assert_eq!(prediction.days_remaining, 222);
        assert_eq!(prediction.current_depth_mm, 9.0);
    }

    #[test]
    fn test_warning_below_ninety_days() {
        // 5 mm over 60 days, 3.4 mm left -> 40 days
        let prediction = predict(&[reading(0, 10.0), reading(60, 5.0)], day0()).unwrap();
        assert_eq!(prediction.days_remaining, 40);
        assert_eq!(prediction.status, WearStatus::Warning);
    }

    #[test]
    fn test_critical_below_thirty_days() {
        // 6 mm over 30 days, 2.4 mm left -> 11 days
        let prediction = predict(&[reading(0, 10.0), reading(30, 4.0)], day0()).unwrap();
        assert_eq!(prediction.days_remaining, 11);
        assert_eq!(prediction.status, WearStatus::Critical);
    }

    #[test]
    fn test_no_wear_is_degenerate_healthy() {
        for last in [10.0, 10.5] {
            let prediction = predict(&[reading(0, 10.0), reading(30, last)], day0()).unwrap();
            assert_eq!(prediction.days_remaining, 999);
            assert_eq!(prediction.confidence, 0.0);
            assert_eq!(prediction.status, WearStatus::Good);
        }
    }

    #[test]
    fn test_below_legal_minimum_is_critical_now() {
        let prediction = predict(&[reading(0, 4.0), reading(30, 1.5)], day0()).unwrap();
        assert_eq!(prediction.days_remaining, 0);
        assert_eq!(prediction.status, WearStatus::Critical);
        assert_eq!(prediction.confidence, 1.0);
        assert_eq!(prediction.predicted_replacement_date, day0());
    }

    #[test]
    fn test_same_day_readings_do_not_divide_by_zero() {
        let prediction = predict(&[reading(0, 10.0), reading(0, 9.0)], day0()).unwrap();
        assert_eq!(prediction.wear_rate_per_day, 1.0);
        assert_eq!(prediction.days_remaining, 7);
    }
}
