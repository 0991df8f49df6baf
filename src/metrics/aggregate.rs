use std::collections::HashMap;

use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;

use super::calendar::DayBoundary;
use super::locale::Locale;
use super::record::ContactRecord;

pub const TOP_REQUIREMENT_LIMIT: usize = 7;
pub const DAILY_WINDOW_DAYS: usize = 7;
pub const SATISFACTION_MIN: i64 = 1;
pub const SATISFACTION_MAX: i64 = 10;
const SATISFACTION_BUCKETS: usize = (SATISFACTION_MAX - SATISFACTION_MIN + 1) as usize;

/// Shown as the most frequent reason when there are no records.
pub const NO_DATA_LABEL: &str = "Sin datos";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelCount {
    pub level: u8,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedMetrics {
    pub reference_date: NaiveDate,
    pub total_count: u64,
    pub today_count: u64,
    pub top_requirement_types: Vec<RankedCount>,
    pub most_frequent_reason: String,
    pub satisfaction_histogram: Vec<LevelCount>,
    /// Records with a missing or out-of-range satisfaction level; they sit in no bucket.
    pub unrated_count: u64,
    pub daily_series: Vec<DailyCount>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationOptions {
    pub day_boundary: DayBoundary,
    pub locale: Locale,
}

/// Derive dashboard metrics with default options (UTC day boundary, es-ES labels).
pub fn compute_metrics(records: &[ContactRecord], reference_date: NaiveDate) -> DerivedMetrics {
    compute_metrics_with(records, reference_date, &AggregationOptions::default())
}

/// Derive every dashboard metric in a single pass over `records`.
///
/// Input order is irrelevant except for tie-breaking in the requirement-type ranking,
/// where groups with equal counts keep the order in which they were first seen.
pub fn compute_metrics_with(records: &[ContactRecord], reference_date: NaiveDate, opts: &AggregationOptions) -> DerivedMetrics {
    let mut today_count = 0u64;
    let mut unrated_count = 0u64;
    let mut histogram = [0u64; SATISFACTION_BUCKETS];
    let mut daily = [0u64; DAILY_WINDOW_DAYS];
    // groups in first-seen order, with an index for lookups
    let mut groups: Vec<RankedCount> = Vec::new();
    let mut group_index: HashMap<&str, usize> = HashMap::new();

    for rec in records {
        let day = opts.day_boundary.calendar_date(&rec.created_at);
        if day == reference_date {
            today_count += 1;
        }
        let age = (reference_date - day).num_days();
        if (0..DAILY_WINDOW_DAYS as i64).contains(&age) {
            daily[DAILY_WINDOW_DAYS - 1 - age as usize] += 1;
        }

        match group_index.get(rec.requirement_type.as_str()) {
            Some(&i) => groups[i].count += 1,
            None => {
                group_index.insert(rec.requirement_type.as_str(), groups.len());
                groups.push(RankedCount { label: rec.requirement_type.clone(), count: 1 });
            }
        }

        match rec.satisfaction_level {
            Some(level) if (SATISFACTION_MIN..=SATISFACTION_MAX).contains(&level) => {
                histogram[(level - SATISFACTION_MIN) as usize] += 1;
            }
            _ => unrated_count += 1,
        }
    }

    // sort_by is stable: ties keep first-seen order
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups.truncate(TOP_REQUIREMENT_LIMIT);

    let most_frequent_reason = groups
        .first()
        .map(|g| g.label.clone())
        .unwrap_or_else(|| NO_DATA_LABEL.to_string());

    let satisfaction_histogram = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| LevelCount { level: (SATISFACTION_MIN as usize + i) as u8, count })
        .collect();

    let daily_series = daily
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let back = (DAILY_WINDOW_DAYS - 1 - i) as i64;
            let date = reference_date
                .checked_sub_signed(TimeDelta::days(back))
                .unwrap_or(NaiveDate::MIN);
            DailyCount { date, label: opts.locale.day_label(date), count }
        })
        .collect();

    DerivedMetrics {
        reference_date,
        total_count: records.len() as u64,
        today_count,
        top_requirement_types: groups,
        most_frequent_reason,
        satisfaction_histogram,
        unrated_count,
        daily_series,
    }
}

impl DerivedMetrics {
    /// Metrics of an empty snapshot: all counts zero, sentinel reason, full-length series.
    pub fn empty(reference_date: NaiveDate, opts: &AggregationOptions) -> Self {
        compute_metrics_with(&[], reference_date, opts)
    }
}
