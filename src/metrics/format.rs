//! Display-ready view of `DerivedMetrics`. Raw counts are carried through untouched next to
//! their locale-formatted strings.

use serde::Serialize;

use super::aggregate::DerivedMetrics;
use super::locale::Locale;

/// Chart palette size; slices cycle through slots 1..=7.
pub const PALETTE_SLOTS: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareSlice {
    pub label: String,
    pub count: u64,
    pub formatted_count: String,
    /// Whole-number share of the plotted slices.
    pub percent: u64,
    pub caption: String,
    pub palette_slot: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedBucket {
    pub key: String,
    pub count: u64,
    pub formatted_count: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedMetrics {
    pub locale: &'static str,
    pub today_count: String,
    pub total_count: String,
    pub most_frequent_reason: String,
    pub top_requirement_types: Vec<ShareSlice>,
    pub satisfaction_histogram: Vec<FormattedBucket>,
    pub unrated_count: String,
    pub daily_series: Vec<FormattedBucket>,
}

// Round half up, as the chart labels did.
fn share_percent(count: u64, total: u64) -> u64 {
    if total == 0 { return 0; }
    (count * 200 + total) / (total * 2)
}

pub fn format_metrics(m: &DerivedMetrics, locale: Locale) -> FormattedMetrics {
    let plotted: u64 = m.top_requirement_types.iter().map(|g| g.count).sum();
    let top_requirement_types = m
        .top_requirement_types
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let percent = share_percent(g.count, plotted);
            ShareSlice {
                label: g.label.clone(),
                count: g.count,
                formatted_count: locale.format_count(g.count),
                percent,
                caption: format!("{} {}%", g.label, percent),
                palette_slot: (i % PALETTE_SLOTS) + 1,
            }
        })
        .collect();

    let satisfaction_histogram = m
        .satisfaction_histogram
        .iter()
        .map(|b| FormattedBucket { key: b.level.to_string(), count: b.count, formatted_count: locale.format_count(b.count) })
        .collect();

    let daily_series = m
        .daily_series
        .iter()
        .map(|d| FormattedBucket { key: d.label.clone(), count: d.count, formatted_count: locale.format_count(d.count) })
        .collect();

    FormattedMetrics {
        locale: locale.tag(),
        today_count: locale.format_count(m.today_count),
        total_count: locale.format_count(m.total_count),
        most_frequent_reason: m.most_frequent_reason.clone(),
        top_requirement_types,
        satisfaction_histogram,
        unrated_count: locale.format_count(m.unrated_count),
        daily_series,
    }
}
