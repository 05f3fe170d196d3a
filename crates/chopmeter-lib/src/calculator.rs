use crate::data_structures::{AccountSettings, BurnRate, DashboardMetrics, MeterReading};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Turns readings and a balance checkpoint into dashboard metrics.
///
/// Holds only configuration; every call receives the full reading set, the settings and
/// `now`, so the same inputs always give the same output.
pub struct Calculator {
    usage_window: Duration,
    min_span_days: f64,
}

impl Calculator {
    pub fn new() -> Self {
        Self {
            usage_window: Duration::days(7),
            min_span_days: 1.0,
        }
    }

    pub fn with_window(usage_window: Duration) -> Self {
        Self {
            usage_window,
            ..Self::new()
        }
    }

    /// `now`'s time zone decides where "today" starts.
    pub fn compute_metrics<Tz: TimeZone>(
        &self,
        readings: &[MeterReading],
        settings: &AccountSettings,
        now: &DateTime<Tz>,
    ) -> DashboardMetrics {
        let now_utc = now.with_timezone(&Utc);
        let sorted = self.sort_readings(readings);
        let last_reading = sorted.first().map(|reading| (*reading).clone());

        let window_start = now_utc
            .checked_sub_signed(self.usage_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let weekly: Vec<&MeterReading> = sorted
            .iter()
            .copied()
            .filter(|reading| reading.timestamp() >= window_start)
            .collect();
        let weekly_usage = self.pairwise_usage(&weekly);
        let burn_rate = self.calculate_burn_rate(&weekly, settings.tariff_rate);

        let day_start = self.start_of_local_day(now);
        let today: Vec<&MeterReading> = sorted
            .iter()
            .copied()
            .filter(|reading| reading.timestamp() >= day_start)
            .collect();
        let today_usage = self.pairwise_usage(&today);

        let current_balance = self.project_balance(settings, &burn_rate, now_utc);
        let days_left = self.calculate_days_left(current_balance, &burn_rate);

        DashboardMetrics::new(
            current_balance,
            burn_rate,
            days_left,
            today_usage,
            weekly_usage,
            last_reading,
        )
    }

    /// Newest first. Equal timestamps are ordered by id.
    pub fn sort_readings<'a>(&self, readings: &'a [MeterReading]) -> Vec<&'a MeterReading> {
        let mut sorted: Vec<&MeterReading> = readings.iter().collect();
        sorted.sort_by(|a, b| {
            b.timestamp()
                .cmp(&a.timestamp())
                .then_with(|| a.id().cmp(b.id()))
        });
        sorted
    }

    /// Sum of absolute differences between neighbours of an already sorted sequence.
    ///
    /// A reading lower than its predecessor still counts as consumption; meter resets are
    /// not told apart from normal use.
    pub fn pairwise_usage(&self, sorted: &[&MeterReading]) -> f64 {
        sorted
            .windows(2)
            .map(|pair| (pair[0].value() - pair[1].value()).abs())
            .sum()
    }

    /// Days between newest and oldest reading, never less than one.
    pub fn span_days(&self, sorted: &[&MeterReading]) -> f64 {
        match (sorted.first(), sorted.last()) {
            (Some(newest), Some(oldest)) if sorted.len() > 1 => {
                let span = newest.timestamp() - oldest.timestamp();
                (span.num_milliseconds() as f64 / MILLIS_PER_DAY).max(self.min_span_days)
            }
            _ => self.min_span_days,
        }
    }

    pub fn calculate_burn_rate(&self, window: &[&MeterReading], tariff_rate: f64) -> BurnRate {
        if window.len() < 2 {
            return BurnRate::zero();
        }

        let kwh_per_day = self.pairwise_usage(window) / self.span_days(window);
        BurnRate::new(kwh_per_day, kwh_per_day * tariff_rate)
    }

    /// Linear decay of the balance checkpoint, clamped at zero.
    pub fn project_balance(
        &self,
        settings: &AccountSettings,
        burn_rate: &BurnRate,
        now: DateTime<Utc>,
    ) -> f64 {
        let elapsed = now - settings.last_balance_date;
        let elapsed_days = (elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY).max(0.0);

        (settings.last_balance - elapsed_days * burn_rate.cost_per_day()).max(0.0)
    }

    pub fn calculate_days_left(&self, current_balance: f64, burn_rate: &BurnRate) -> Option<i64> {
        let cost_per_day = burn_rate.cost_per_day();
        if cost_per_day <= 0.0 || !cost_per_day.is_finite() {
            return None;
        }

        Some((current_balance / cost_per_day).round() as i64)
    }

    /// Local midnight of `now`'s calendar day, as UTC.
    pub fn start_of_local_day<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Utc> {
        let tz = now.timezone();
        let midnight = now.date_naive().and_time(NaiveTime::MIN);

        // Midnight can fall inside a DST gap; the first hour after it always exists.
        tz.from_local_datetime(&midnight)
            .earliest()
            .or_else(|| {
                tz.from_local_datetime(&(midnight + Duration::hours(1)))
                    .earliest()
            })
            .map(|start| start.with_timezone(&Utc))
            .unwrap_or_else(|| now.with_timezone(&Utc))
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::ReadingSource;
    use chrono::FixedOffset;

    fn reading(id: &str, value: f64, timestamp: DateTime<Utc>) -> MeterReading {
        MeterReading::new(id.to_string(), value, timestamp, ReadingSource::Manual)
    }

    fn settings(tariff_rate: f64, last_balance: f64, date: DateTime<Utc>) -> AccountSettings {
        AccountSettings {
            tariff_rate,
            last_balance,
            last_balance_date: date,
            ..AccountSettings::default()
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_three_readings_near_exhaustion() {
        let calculator = Calculator::new();
        let now = t0() + Duration::days(2);
        let readings = vec![
            reading("a", 100.0, t0()),
            reading("b", 150.0, t0() + Duration::days(1)),
            reading("c", 200.0, now),
        ];

        let metrics = calculator.compute_metrics(&readings, &settings(2.0, 50.0, now), &now);

        assert_eq!(metrics.weekly_usage(), 100.0);
        assert_eq!(metrics.burn_rate().kwh_per_day(), 50.0);
        assert_eq!(metrics.daily_burn_rate(), 100.0);
        assert_eq!(metrics.current_balance(), 50.0);
        assert_eq!(metrics.days_left(), Some(1));
        assert_eq!(metrics.last_reading().unwrap().id(), "c");
    }

    #[test]
    fn test_single_reading_is_zero_state() {
        let calculator = Calculator::new();
        let now = t0() + Duration::days(3);
        let readings = vec![reading("a", 100.0, t0())];

        let metrics = calculator.compute_metrics(&readings, &settings(2.0, 80.0, t0()), &now);

        assert_eq!(metrics.weekly_usage(), 0.0);
        assert_eq!(metrics.daily_burn_rate(), 0.0);
        assert_eq!(metrics.days_left(), None);
        assert_eq!(metrics.current_balance(), 80.0);
        assert!(!metrics.has_sufficient_data());
    }

    #[test]
    fn test_empty_readings_never_fail() {
        let calculator = Calculator::new();
        let metrics = calculator.compute_metrics(&[], &settings(2.0, 10.0, t0()), &t0());

        assert!(metrics.last_reading().is_none());
        assert_eq!(metrics.today_usage(), 0.0);
        assert_eq!(metrics.days_left(), None);
        assert_eq!(metrics.current_balance(), 10.0);
    }

    #[test]
    fn test_identical_timestamps_floor_span_to_one_day() {
        let calculator = Calculator::new();
        let readings = vec![reading("a", 100.0, t0()), reading("b", 112.0, t0())];

        let metrics = calculator.compute_metrics(&readings, &settings(1.5, 90.0, t0()), &t0());

        assert_eq!(metrics.weekly_usage(), 12.0);
        assert_eq!(metrics.burn_rate().kwh_per_day(), 12.0);
        assert_eq!(metrics.daily_burn_rate(), 18.0);
        assert_eq!(metrics.days_left(), Some(5));
    }

    #[test]
    fn test_downward_reading_counts_as_usage() {
        let calculator = Calculator::new();
        let now = t0() + Duration::days(2);
        let readings = vec![
            reading("a", 500.0, t0()),
            reading("b", 20.0, t0() + Duration::days(1)),
            reading("c", 30.0, now),
        ];

        let metrics = calculator.compute_metrics(&readings, &settings(1.0, 100.0, now), &now);

        assert_eq!(metrics.weekly_usage(), 490.0);
        assert!(metrics.daily_burn_rate() >= 0.0);
    }

    #[test]
    fn test_readings_outside_window_are_ignored() {
        let calculator = Calculator::new();
        let now = t0() + Duration::days(10);
        let readings = vec![
            reading("old", 0.0, t0()),
            reading("a", 100.0, now - Duration::days(2)),
            reading("b", 110.0, now),
        ];

        let metrics = calculator.compute_metrics(&readings, &settings(1.0, 50.0, now), &now);

        assert_eq!(metrics.weekly_usage(), 10.0);
        assert_eq!(metrics.burn_rate().kwh_per_day(), 5.0);
    }

    #[test]
    fn test_only_one_reading_inside_window() {
        let calculator = Calculator::new();
        let now = t0() + Duration::days(10);
        let readings = vec![reading("old", 0.0, t0()), reading("a", 100.0, now)];

        let metrics = calculator.compute_metrics(&readings, &settings(1.0, 50.0, t0()), &now);

        assert_eq!(metrics.weekly_usage(), 0.0);
        assert_eq!(metrics.days_left(), None);
        assert_eq!(metrics.current_balance(), 50.0);
    }

    #[test]
    fn test_custom_window() {
        let calculator = Calculator::with_window(Duration::days(30));
        let now = t0() + Duration::days(10);
        let readings = vec![reading("a", 0.0, t0()), reading("b", 100.0, now)];

        let metrics = calculator.compute_metrics(&readings, &settings(1.0, 50.0, now), &now);

        assert_eq!(metrics.weekly_usage(), 100.0);
        assert_eq!(metrics.burn_rate().kwh_per_day(), 10.0);
    }

    #[test]
    fn test_window_beyond_calendar_range_covers_all_readings() {
        let calculator = Calculator::with_window(Duration::days(1_000_000_000));
        let now = t0() + Duration::days(400);
        let readings = vec![reading("a", 0.0, t0()), reading("b", 400.0, now)];

        let metrics = calculator.compute_metrics(&readings, &settings(1.0, 50.0, now), &now);

        assert_eq!(metrics.weekly_usage(), 400.0);
        assert_eq!(metrics.burn_rate().kwh_per_day(), 1.0);
    }

    #[test]
    fn test_balance_decays_and_clamps_at_zero() {
        let calculator = Calculator::new();
        let burn_rate = BurnRate::new(5.0, 10.0);

        let half_day = calculator.project_balance(
            &settings(2.0, 100.0, t0()),
            &burn_rate,
            t0() + Duration::hours(12),
        );
        assert!((half_day - 95.0).abs() < 1e-9);

        let long_after = calculator.project_balance(
            &settings(2.0, 100.0, t0()),
            &burn_rate,
            t0() + Duration::days(30),
        );
        assert_eq!(long_after, 0.0);
    }

    #[test]
    fn test_future_balance_date_does_not_grow_balance() {
        let calculator = Calculator::new();
        let balance = calculator.project_balance(
            &settings(2.0, 40.0, t0() + Duration::days(1)),
            &BurnRate::new(1.0, 2.0),
            t0(),
        );
        assert_eq!(balance, 40.0);
    }

    #[test]
    fn test_days_left_rounds_half_away_from_zero() {
        let calculator = Calculator::new();
        let burn_rate = BurnRate::new(1.0, 4.0);

        assert_eq!(calculator.calculate_days_left(10.0, &burn_rate), Some(3));
        assert_eq!(calculator.calculate_days_left(9.9, &burn_rate), Some(2));
        assert_eq!(calculator.calculate_days_left(0.0, &burn_rate), Some(0));
        assert_eq!(calculator.calculate_days_left(50.0, &BurnRate::zero()), None);
    }

    #[test]
    fn test_today_usage_uses_local_midnight() {
        let calculator = Calculator::new();
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        // 01:00 local on Jan 10 is 22:00 UTC on Jan 9; local midnight is 21:00 UTC.
        let now = offset.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap();
        let readings = vec![
            reading("a", 100.0, Utc.with_ymd_and_hms(2024, 1, 9, 20, 0, 0).unwrap()),
            reading("b", 104.0, Utc.with_ymd_and_hms(2024, 1, 9, 21, 30, 0).unwrap()),
            reading("c", 107.0, Utc.with_ymd_and_hms(2024, 1, 9, 21, 45, 0).unwrap()),
        ];

        let metrics = calculator.compute_metrics(&readings, &settings(1.0, 10.0, t0()), &now);

        assert_eq!(metrics.today_usage(), 3.0);
        assert_eq!(metrics.weekly_usage(), 7.0);
        assert_eq!(
            calculator.start_of_local_day(&now),
            Utc.with_ymd_and_hms(2024, 1, 9, 21, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        let calculator = Calculator::new();
        let now = t0() + Duration::days(1);
        let forward = vec![
            reading("b", 120.0, now),
            reading("a", 100.0, now),
            reading("c", 90.0, t0()),
        ];
        let mut backward = forward.clone();
        backward.reverse();
        let account = settings(2.0, 60.0, t0());

        let first = calculator.compute_metrics(&forward, &account, &now);
        let second = calculator.compute_metrics(&backward, &account, &now);

        assert_eq!(first, second);
        assert_eq!(first, calculator.compute_metrics(&forward, &account, &now));
        assert_eq!(first.last_reading().unwrap().id(), "a");
        // a(100) -> b(120) -> c(90)
        assert_eq!(first.weekly_usage(), 50.0);
    }

    #[test]
    fn test_invariants_hold_across_generated_inputs() {
        let calculator = Calculator::new();
        let now = t0() + Duration::days(7);

        for seed in 0..50u32 {
            let count = (seed % 6) as usize;
            let readings: Vec<MeterReading> = (0..count)
                .map(|i| {
                    let value = ((seed * 37 + i as u32 * 101) % 997) as f64;
                    let offset = Duration::hours(((seed + i as u32 * 13) % 200) as i64);
                    reading(&format!("{}-{}", seed, i), value, now - offset)
                })
                .collect();
            let account = settings(0.5 + seed as f64 / 10.0, seed as f64 * 3.0, t0());

            let metrics = calculator.compute_metrics(&readings, &account, &now);

            assert!(metrics.current_balance() >= 0.0);
            assert!(metrics.daily_burn_rate() >= 0.0);
            match metrics.days_left() {
                None => assert_eq!(metrics.daily_burn_rate(), 0.0),
                Some(days) => {
                    let expected = (metrics.current_balance() / metrics.daily_burn_rate()).round();
                    assert_eq!(days, expected as i64);
                }
            }
        }
    }
}
