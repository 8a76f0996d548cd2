// ABOUTME: Upload-date normalization for chapter listings.
// ABOUTME: Parses per-source absolute formats and relative phrases, both localized per source.

//! Date normalization.
//!
//! Every adapter turns the date text printed next to a chapter into epoch milliseconds.
//! Absolute dates use chrono format strings declared by the adapter and resolve to midnight
//! UTC of that day. Relative phrases are computed against an injectable clock. Anything that
//! cannot be parsed yields `0`, which the data model treats as "unknown".

use chrono::{DateTime, Months, NaiveDate, TimeDelta, Utc};

/// Language of the month names a source prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateLocale {
    #[default]
    English,
    French,
    Spanish,
    Portuguese,
    Turkish,
}

impl DateLocale {
    /// Maps a locale code such as `"fr"` to a date locale; unknown codes read English.
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(|c| c.to_ascii_lowercase()).as_deref() {
            Some("fr") => DateLocale::French,
            Some("es") => DateLocale::Spanish,
            Some("pt") | Some("pt-br") => DateLocale::Portuguese,
            Some("tr") => DateLocale::Turkish,
            _ => DateLocale::English,
        }
    }

    fn month_names(self) -> &'static [(&'static str, usize)] {
        match self {
            DateLocale::English => &[],
            DateLocale::French => FRENCH_MONTHS,
            DateLocale::Spanish => SPANISH_MONTHS,
            DateLocale::Portuguese => PORTUGUESE_MONTHS,
            DateLocale::Turkish => TURKISH_MONTHS,
        }
    }

    fn is_today(self, text: &str, words: &[&str]) -> bool {
        let word = match self {
            DateLocale::English => return text.contains("today"),
            DateLocale::French => "aujourd'hui",
            DateLocale::Spanish => "hoy",
            DateLocale::Portuguese => "hoje",
            DateLocale::Turkish => "bugün",
        };
        text.contains("today") || words.contains(&word)
    }

    fn is_yesterday(self, text: &str, words: &[&str]) -> bool {
        let word = match self {
            DateLocale::English => return text.contains("yesterday"),
            DateLocale::French => "hier",
            DateLocale::Spanish => "ayer",
            DateLocale::Portuguese => "ontem",
            DateLocale::Turkish => "dün",
        };
        text.contains("yesterday") || words.contains(&word)
    }

    /// The words left once the "ago" marker is removed, or `None` when `text` has none.
    ///
    /// English "ago" is accepted for every locale.
    fn strip_ago(self, text: &str) -> Option<&str> {
        let (prefixes, suffixes): (&[&str], &[&str]) = match self {
            DateLocale::English => (&[], &[]),
            DateLocale::French => (&["il y a "], &[]),
            DateLocale::Spanish => (&["hace "], &[]),
            DateLocale::Portuguese => (&["há ", "ha "], &[" atrás"]),
            DateLocale::Turkish => (&[], &[" önce"]),
        };
        prefixes
            .iter()
            .find_map(|p| text.strip_prefix(p))
            .or_else(|| suffixes.iter().chain(&[" ago"]).find_map(|s| text.strip_suffix(s)))
    }

    fn amount(self, word: &str) -> Option<u32> {
        if let Ok(n) = word.parse::<u32>() {
            return Some(n);
        }
        let one: &[&str] = match self {
            DateLocale::English => &["a", "an"],
            DateLocale::French => &["un", "une"],
            DateLocale::Spanish => &["un", "una"],
            DateLocale::Portuguese => &["um", "uma"],
            DateLocale::Turkish => &["bir"],
        };
        one.contains(&word).then_some(1)
    }

    fn unit(self, word: &str) -> Option<Unit> {
        let localized = match self {
            DateLocale::English => None,
            DateLocale::French => match word {
                "minute" | "minutes" => Some(Unit::Minute),
                "heure" | "heures" => Some(Unit::Hour),
                "jour" | "jours" => Some(Unit::Day),
                "semaine" | "semaines" => Some(Unit::Week),
                "mois" => Some(Unit::Month),
                "an" | "ans" | "année" | "années" => Some(Unit::Year),
                _ => None,
            },
            DateLocale::Spanish => match word {
                "minuto" | "minutos" => Some(Unit::Minute),
                "hora" | "horas" => Some(Unit::Hour),
                "día" | "días" | "dia" | "dias" => Some(Unit::Day),
                "semana" | "semanas" => Some(Unit::Week),
                "mes" | "meses" => Some(Unit::Month),
                "año" | "años" => Some(Unit::Year),
                _ => None,
            },
            DateLocale::Portuguese => match word {
                "minuto" | "minutos" => Some(Unit::Minute),
                "hora" | "horas" => Some(Unit::Hour),
                "dia" | "dias" => Some(Unit::Day),
                "semana" | "semanas" => Some(Unit::Week),
                "mês" | "mes" | "meses" => Some(Unit::Month),
                "ano" | "anos" => Some(Unit::Year),
                _ => None,
            },
            DateLocale::Turkish => match word {
                "dakika" => Some(Unit::Minute),
                "saat" => Some(Unit::Hour),
                "gün" => Some(Unit::Day),
                "hafta" => Some(Unit::Week),
                "ay" => Some(Unit::Month),
                "yıl" => Some(Unit::Year),
                _ => None,
            },
        };
        localized.or(match word {
            "minute" | "minutes" | "min" | "mins" => Some(Unit::Minute),
            "hour" | "hours" => Some(Unit::Hour),
            "day" | "days" => Some(Unit::Day),
            "week" | "weeks" => Some(Unit::Week),
            "month" | "months" => Some(Unit::Month),
            "year" | "years" => Some(Unit::Year),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn before(self, now: DateTime<Utc>, amount: u32) -> Option<DateTime<Utc>> {
        let delta = match self {
            Unit::Minute => TimeDelta::try_minutes(amount.into()),
            Unit::Hour => TimeDelta::try_hours(amount.into()),
            Unit::Day => TimeDelta::try_days(amount.into()),
            Unit::Week => TimeDelta::try_weeks(amount.into()),
            Unit::Month => return now.checked_sub_months(Months::new(amount)),
            Unit::Year => {
                return amount
                    .checked_mul(12)
                    .and_then(|m| now.checked_sub_months(Months::new(m)))
            }
        };
        delta.and_then(|d| now.checked_sub_signed(d))
    }
}

const ENGLISH_MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const FRENCH_MONTHS: &[(&str, usize)] = &[
    ("janvier", 1), ("janv", 1), ("février", 2), ("fevrier", 2), ("févr", 2), ("mars", 3),
    ("avril", 4), ("avr", 4), ("mai", 5), ("juin", 6), ("juillet", 7), ("juil", 7),
    ("août", 8), ("aout", 8), ("septembre", 9), ("sept", 9), ("octobre", 10), ("oct", 10),
    ("novembre", 11), ("nov", 11), ("décembre", 12), ("decembre", 12), ("déc", 12),
];

const SPANISH_MONTHS: &[(&str, usize)] = &[
    ("enero", 1), ("ene", 1), ("febrero", 2), ("feb", 2), ("marzo", 3), ("mar", 3),
    ("abril", 4), ("abr", 4), ("mayo", 5), ("may", 5), ("junio", 6), ("jun", 6),
    ("julio", 7), ("jul", 7), ("agosto", 8), ("ago", 8), ("septiembre", 9), ("setiembre", 9),
    ("sep", 9), ("octubre", 10), ("oct", 10), ("noviembre", 11), ("nov", 11),
    ("diciembre", 12), ("dic", 12),
];

const PORTUGUESE_MONTHS: &[(&str, usize)] = &[
    ("janeiro", 1), ("jan", 1), ("fevereiro", 2), ("fev", 2), ("março", 3), ("marco", 3),
    ("mar", 3), ("abril", 4), ("abr", 4), ("maio", 5), ("mai", 5), ("junho", 6), ("jun", 6),
    ("julho", 7), ("jul", 7), ("agosto", 8), ("ago", 8), ("setembro", 9), ("set", 9),
    ("outubro", 10), ("out", 10), ("novembro", 11), ("nov", 11), ("dezembro", 12),
    ("dez", 12),
];

const TURKISH_MONTHS: &[(&str, usize)] = &[
    ("ocak", 1), ("şubat", 2), ("mart", 3), ("nisan", 4), ("mayıs", 5), ("haziran", 6),
    ("temmuz", 7), ("ağustos", 8), ("eylül", 9), ("ekim", 10), ("kasım", 11), ("aralık", 12),
];

/// How "N units ago" phrases resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelativePrecision {
    /// `now - amount * unit`, untruncated.
    #[default]
    Exact,
    /// Any "ago" phrase is today's midnight UTC, for sites that only use it on fresh chapters.
    Today,
}

/// Parses the date strings one source prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateNormalizer {
    formats: Vec<String>,
    locale: DateLocale,
    precision: RelativePrecision,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self {
            formats: Vec::new(),
            locale: DateLocale::English,
            precision: RelativePrecision::Exact,
        }
    }
}

impl DateNormalizer {
    /// A normalizer for one chrono date format, English month names.
    pub fn new(format: &str) -> Self {
        Self::default().with_format(format)
    }

    /// Adds another accepted absolute format; formats are tried in insertion order.
    pub fn with_format(mut self, format: &str) -> Self {
        self.formats.push(format.to_string());
        self
    }

    pub fn with_locale(mut self, locale: DateLocale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_precision(mut self, precision: RelativePrecision) -> Self {
        self.precision = precision;
        self
    }

    /// Epoch milliseconds for `text` relative to the current time, `0` when unparseable.
    pub fn parse(&self, text: &str) -> i64 {
        self.parse_at(text, Utc::now())
    }

    /// Like [`parse`](Self::parse) with an explicit clock.
    pub fn parse_at(&self, text: &str, now: DateTime<Utc>) -> i64 {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return 0;
        }
        if let Some(relative) = self.parse_relative(&text, now) {
            return relative;
        }
        self.parse_absolute(&text).unwrap_or(0)
    }

    /// `Some(ms)` when `text` looks relative (`Some(0)` if it is malformed), `None` otherwise.
    fn parse_relative(&self, text: &str, now: DateTime<Utc>) -> Option<i64> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower.split(' ').collect();
        if self.locale.is_today(&lower, &words) {
            return Some(midnight(now));
        }
        if self.locale.is_yesterday(&lower, &words) {
            return Some(midnight(now) - TimeDelta::days(1).num_milliseconds());
        }

        let rest = self.locale.strip_ago(&lower)?;
        if self.precision == RelativePrecision::Today {
            return Some(midnight(now));
        }
        let (amount, unit) = match rest.split(' ').collect::<Vec<_>>().as_slice() {
            [amount, unit] => (*amount, *unit),
            _ => return Some(0),
        };
        let instant = self
            .locale
            .amount(amount)
            .zip(self.locale.unit(unit))
            .and_then(|(amount, unit)| unit.before(now, amount));
        Some(instant.map_or(0, |at| at.timestamp_millis()))
    }

    fn parse_absolute(&self, text: &str) -> Option<i64> {
        let text = self.translate_months(text);
        self.formats.iter().find_map(|fmt| {
            let date = NaiveDate::parse_from_str(&text, fmt).ok()?;
            Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
        })
    }

    /// Replaces localized month names with English ones so chrono's `%B`/`%b` can read them.
    fn translate_months(&self, text: &str) -> String {
        let names = self.locale.month_names();
        if names.is_empty() {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut word = String::new();
        let flush = |word: &mut String, out: &mut String| {
            if word.is_empty() {
                return;
            }
            let lower = word.to_lowercase();
            match names.iter().find(|(name, _)| *name == lower) {
                Some((_, month)) => out.push_str(ENGLISH_MONTHS[month - 1]),
                None => out.push_str(word),
            }
            word.clear();
        };
        for c in text.chars() {
            if c.is_alphabetic() {
                word.push(c);
            } else {
                flush(&mut word, &mut out);
                out.push(c);
            }
        }
        flush(&mut word, &mut out);
        out
    }
}

fn midnight(at: DateTime<Utc>) -> i64 {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}
