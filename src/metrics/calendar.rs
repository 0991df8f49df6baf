use std::fmt::{Display, Formatter};

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};

/// How a `created_at` instant is truncated to a calendar date for day bucketing.
///
/// `Utc` truncates the UTC timestamp, which is what a store serving ISO-8601 UTC strings
/// naturally yields. `Offset` shifts into a fixed offset first; `local` in configuration is
/// resolved once to the host's current offset so aggregation stays deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBoundary {
    #[default]
    Utc,
    Offset(FixedOffset),
}

impl DayBoundary {
    /// Accepts `utc`, `local`, or an offset such as `+02:00`, `-0530`, `+1`.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
            return Some(DayBoundary::Utc);
        }
        if s.eq_ignore_ascii_case("local") {
            let offset = Local::now().offset().fix();
            return Some(DayBoundary::Offset(offset));
        }
        parse_offset(s).map(DayBoundary::Offset)
    }

    pub fn calendar_date(&self, ts: &DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Utc => ts.date_naive(),
            DayBoundary::Offset(off) => ts.with_timezone(off).date_naive(),
        }
    }

    /// Calendar date of "now" under this boundary; the reference date for a live dashboard.
    pub fn today(&self) -> NaiveDate {
        self.calendar_date(&Utc::now())
    }
}

impl Display for DayBoundary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DayBoundary::Utc => write!(f, "utc"),
            DayBoundary::Offset(off) => {
                let secs = off.local_minus_utc();
                let sign = if secs < 0 { '-' } else { '+' };
                let abs = secs.abs();
                write!(f, "{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
            }
        }
    }
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = if let Some(r) = s.strip_prefix('+') {
        (1, r)
    } else if let Some(r) = s.strip_prefix('-') {
        (-1, r)
    } else {
        return None;
    };
    // byte slicing below relies on ASCII
    if !rest.is_ascii() { return None; }
    let (hh, mm) = if let Some((h, m)) = rest.split_once(':') {
        (h, m)
    } else if rest.len() == 4 {
        rest.split_at(2)
    } else {
        (rest, "0")
    };
    let digits = |p: &str| !p.is_empty() && p.len() <= 2 && p.bytes().all(|b| b.is_ascii_digit());
    if !digits(hh) || !digits(mm) { return None; }
    let hours: i32 = hh.parse().ok()?;
    let minutes: i32 = mm.parse().ok()?;
    if hours > 23 || minutes > 59 { return None; }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
