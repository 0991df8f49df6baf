use chrono::{Datelike, NaiveDate, Weekday};

/// Display conventions for labels and counts. Aggregated values never depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    EsEs,
    EnUs,
}

impl Locale {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "es" | "es-es" => Some(Locale::EsEs),
            "en" | "en-us" => Some(Locale::EnUs),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Locale::EsEs => "es-ES",
            Locale::EnUs => "en-US",
        }
    }

    pub fn weekday_abbrev(&self, day: Weekday) -> &'static str {
        match self {
            Locale::EsEs => match day {
                Weekday::Mon => "lun",
                Weekday::Tue => "mar",
                Weekday::Wed => "mié",
                Weekday::Thu => "jue",
                Weekday::Fri => "vie",
                Weekday::Sat => "sáb",
                Weekday::Sun => "dom",
            },
            Locale::EnUs => match day {
                Weekday::Mon => "Mon",
                Weekday::Tue => "Tue",
                Weekday::Wed => "Wed",
                Weekday::Thu => "Thu",
                Weekday::Fri => "Fri",
                Weekday::Sat => "Sat",
                Weekday::Sun => "Sun",
            },
        }
    }

    /// Short day label: weekday abbreviation followed by the day of month ("lun 13").
    pub fn day_label(&self, date: NaiveDate) -> String {
        format!("{} {}", self.weekday_abbrev(date.weekday()), date.day())
    }

    fn group_separator(&self) -> char {
        match self {
            Locale::EsEs => '.',
            Locale::EnUs => ',',
        }
    }

    // es-ES leaves four-digit numbers ungrouped ("1234", "12.345").
    fn min_grouping_digits(&self) -> usize {
        match self {
            Locale::EsEs => 5,
            Locale::EnUs => 4,
        }
    }

    /// Render an integer with the locale's thousands grouping.
    pub fn format_count(&self, value: u64) -> String {
        let digits = value.to_string();
        if digits.len() < self.min_grouping_digits() {
            return digits;
        }
        let sep = self.group_separator();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(sep);
            }
            out.push(ch);
        }
        out
    }
}
