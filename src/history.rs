//! History analytics
//!
//! Pure helpers over archived days: recency filters, rolling summaries, and
//! CSV export for sharing.

use crate::types::DailyHistory;
use chrono::NaiveDate;

/// Aggregated totals over a span of archived days
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HistorySummary {
    pub title: String,
    pub steps: u64,
    pub distance_meters: f64,
    pub calories_kcal: f64,
    pub moving_duration_ms: i64,
}

/// History analytics over archived days
pub struct HistoryAnalytics;

impl HistoryAnalytics {
    /// Keep only days within the last `days` calendar days ending at
    /// `today_epoch` (inclusive). `None` keeps everything.
    pub fn filter_by_last_days(
        history: &[DailyHistory],
        days: Option<u32>,
        today_epoch: i64,
    ) -> Vec<DailyHistory> {
        let Some(days) = days else {
            return history.to_vec();
        };

        let clamped_days = i64::from(days.max(1));
        let min_day = today_epoch - (clamped_days - 1);
        history
            .iter()
            .filter(|day| (min_day..=today_epoch).contains(&day.day_epoch))
            .cloned()
            .collect()
    }

    /// Totals over the last 7 days
    pub fn weekly_summary(history: &[DailyHistory], today_epoch: i64) -> HistorySummary {
        Self::summarize_last_days(history, 7, today_epoch, "last 7 days")
    }

    /// Totals over the last 30 days
    pub fn monthly_summary(history: &[DailyHistory], today_epoch: i64) -> HistorySummary {
        Self::summarize_last_days(history, 30, today_epoch, "last 30 days")
    }

    pub fn summarize_last_days(
        history: &[DailyHistory],
        days: u32,
        today_epoch: i64,
        title: &str,
    ) -> HistorySummary {
        let filtered = Self::filter_by_last_days(history, Some(days), today_epoch);

        HistorySummary {
            title: title.to_string(),
            steps: filtered.iter().map(|d| u64::from(d.steps)).sum(),
            distance_meters: filtered.iter().map(|d| d.total_distance_meters).sum(),
            calories_kcal: filtered.iter().map(|d| d.total_calories_kcal).sum(),
            moving_duration_ms: filtered.iter().map(|d| d.moving_duration_ms).sum(),
        }
    }

    /// Render history as CSV, oldest day first. Durations are exported in
    /// whole seconds and distances/calories with 3 decimals.
    pub fn to_csv(history: &[DailyHistory]) -> String {
        let mut rows: Vec<&DailyHistory> = history.iter().collect();
        rows.sort_by_key(|day| day.day_epoch);

        let mut out = String::from(
            "date,steps,total_distance_m,total_calories_kcal,moving_duration_s,\
             brisk_distance_m,brisk_duration_s,running_distance_m,running_duration_s\n",
        );

        for day in rows {
            let date = format_day_epoch(day.day_epoch);
            out.push_str(&format!(
                "{},{},{:.3},{:.3},{},{:.3},{},{:.3},{}\n",
                date,
                day.steps,
                day.total_distance_meters,
                day.total_calories_kcal,
                day.moving_duration_ms / 1_000,
                day.brisk_distance_meters,
                day.brisk_duration_ms / 1_000,
                day.running_distance_meters,
                day.running_duration_ms / 1_000,
            ));
        }

        out
    }
}

/// ISO date for a day epoch; falls back to the raw number if the epoch is
/// outside chrono's range.
fn format_day_epoch(day_epoch: i64) -> String {
    NaiveDate::from_num_days_from_ce_opt(
        (day_epoch + 719_163) as i32, // days between 0001-01-01 and 1970-01-01
    )
    .map(|date| date.format("%Y-%m-%d").to_string())
    .unwrap_or_else(|| day_epoch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(day_epoch: i64, steps: u32) -> DailyHistory {
        DailyHistory {
            day_epoch,
            steps,
            total_distance_meters: steps as f64 * 0.7,
            total_calories_kcal: steps as f64 * 0.04,
            moving_duration_ms: i64::from(steps) * 500,
            brisk_distance_meters: 0.0,
            brisk_duration_ms: 0,
            running_distance_meters: 0.0,
            running_duration_ms: 0,
        }
    }

    #[test]
    fn test_filter_by_last_days() {
        let history = vec![day(95, 100), day(98, 200), day(99, 300), day(100, 400)];

        let filtered = HistoryAnalytics::filter_by_last_days(&history, Some(3), 100);
        assert_eq!(filtered.len(), 3);
        assert!(filtered.iter().all(|d| d.day_epoch >= 98));

        let all = HistoryAnalytics::filter_by_last_days(&history, None, 100);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_filter_clamps_zero_days_to_one() {
        let history = vec![day(99, 100), day(100, 200)];
        let filtered = HistoryAnalytics::filter_by_last_days(&history, Some(0), 100);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].day_epoch, 100);
    }

    #[test]
    fn test_weekly_summary_totals() {
        let history = vec![day(94, 1_000), day(99, 2_000), day(100, 3_000)];
        let summary = HistoryAnalytics::weekly_summary(&history, 100);

        assert_eq!(summary.steps, 6_000);
        assert!((summary.distance_meters - 6_000.0 * 0.7).abs() < 1e-6);
        assert_eq!(summary.moving_duration_ms, 6_000 * 500);
        assert_eq!(summary.title, "last 7 days");
    }

    #[test]
    fn test_weekly_excludes_older_days() {
        // day 93 is 8 days before day 100
        let history = vec![day(93, 1_000), day(100, 500)];
        let summary = HistoryAnalytics::weekly_summary(&history, 100);
        assert_eq!(summary.steps, 500);
    }

    #[test]
    fn test_csv_rows_sorted_and_formatted() {
        let history = vec![day(19_724, 12), day(19_723, 8)];
        let csv = HistoryAnalytics::to_csv(&history);

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date,steps,total_distance_m"));
        // 19723 days from the epoch is 2024-01-01
        assert_eq!(lines[1], "2024-01-01,8,5.600,0.320,4,0.000,0,0.000,0");
        assert_eq!(lines[2], "2024-01-02,12,8.400,0.480,6,0.000,0,0.000,0");
    }

    #[test]
    fn test_csv_empty_history_is_header_only() {
        let csv = HistoryAnalytics::to_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
    }
}
