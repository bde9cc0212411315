use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// `urgency` followed by a rating, e.g. "urgency 7", "Urgency: 10" or
/// "urgency of 3".
static KEYWORD_URGENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\burgency(?:\s+(?:of|is|at|was))?\W*(10|[1-9])\b").expect("valid regex")
});

/// Any standalone 1-10.
static BARE_URGENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(10|[1-9])\b").expect("valid regex"));

/// Self-reported severity, always within 1..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Urgency(u8);

impl Urgency {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Find the urgency rating in free text.
    ///
    /// A number right after the word "urgency" wins; otherwise the leftmost
    /// standalone 1-10 is used. Text without one yields `None`.
    pub fn extract(body: &str) -> Option<Self> {
        KEYWORD_URGENCY
            .captures(body)
            .or_else(|| BARE_URGENCY.captures(body))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .and_then(Self::new)
    }
}

impl TryFrom<u8> for Urgency {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("urgency out of range: {value}"))
    }
}

impl From<Urgency> for u8 {
    fn from(u: Urgency) -> Self {
        u.0
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|e| format!("invalid urgency {s:?}: {e}"))?;
        Self::try_from(value)
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One logged symptom report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomEntry {
    pub date: Date,
    pub time: Time,
    pub body: String,
    pub urgency: Option<Urgency>,
}

impl SymptomEntry {
    /// Build an entry stamped with the receipt time, truncated to whole seconds.
    pub fn received_at(
        now: OffsetDateTime,
        body: impl Into<String>,
        urgency: Option<Urgency>,
    ) -> Self {
        let time = now.time();
        Self {
            date: now.date(),
            time: time.replace_nanosecond(0).unwrap_or(time),
            body: body.into(),
            urgency,
        }
    }

    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).unwrap_or_default()
    }

    pub fn time_string(&self) -> String {
        self.time.format(TIME_FORMAT).unwrap_or_default()
    }

    /// Spreadsheet cells: date, time, body, urgency (empty when absent).
    pub fn to_row(&self) -> [String; 4] {
        [
            self.date_string(),
            self.time_string(),
            self.body.clone(),
            self.urgency.map(|u| u.to_string()).unwrap_or_default(),
        ]
    }

    /// Inverse of [`to_row`](Self::to_row). Rows without date, time and body
    /// are rejected. The urgency cell may be missing since spreadsheets drop
    /// trailing empty cells; a missing or bad urgency reads back as `None`.
    pub fn from_row<S: AsRef<str>>(row: &[S]) -> Option<Self> {
        let [date, time, body, rest @ ..] = row else {
            return None;
        };
        Some(Self {
            date: Date::parse(date.as_ref().trim(), DATE_FORMAT).ok()?,
            time: Time::parse(time.as_ref().trim(), TIME_FORMAT).ok()?,
            body: body.as_ref().to_string(),
            urgency: rest.first().and_then(|cell| cell.as_ref().parse().ok()),
        })
    }
}

impl fmt::Display for SymptomEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = self.date.format(DATE_FORMAT).map_err(|_| fmt::Error)?;
        let time = self.time.format(TIME_FORMAT).map_err(|_| fmt::Error)?;
        // one line per entry, whatever the body contains
        let body = self.body.replace(['\r', '\n'], " ");
        write!(f, "{date} {time} — {body} (urgency=")?;
        match self.urgency {
            Some(u) => write!(f, "{u})"),
            None => f.write_str("none)"),
        }
    }
}
