//! Dashboard metrics: typed contact records and the pure aggregation over a snapshot of them.
//! Nothing here performs I/O or knows about identity.

mod aggregate;
mod calendar;
mod format;
mod locale;
mod record;

pub use aggregate::{
    compute_metrics, compute_metrics_with, AggregationOptions, DailyCount, DerivedMetrics, LevelCount, RankedCount,
    DAILY_WINDOW_DAYS, NO_DATA_LABEL, SATISFACTION_MAX, SATISFACTION_MIN, TOP_REQUIREMENT_LIMIT,
};
pub use calendar::DayBoundary;
pub use format::{format_metrics, FormattedBucket, FormattedMetrics, ShareSlice, PALETTE_SLOTS};
pub use locale::Locale;
pub use record::{parse_timestamp, ContactRecord, RecordError};
