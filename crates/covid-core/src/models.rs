use std::fmt;
use std::pin::Pin;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::country::Country;
use crate::error::AppError;

/// The six counters every source reports, before they are tied to a
/// country and timestamp.
///
/// Values are taken as reported; negative or decreasing numbers are not
/// rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CaseCounts {
    pub confirmed: i64,
    pub recovered: i64,
    pub deceased: i64,
    pub confirmed_cumulative: i64,
    pub recovered_cumulative: i64,
    pub deceased_cumulative: i64,
}

/// Canonical normalized record produced from exactly one source payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DailySummary {
    /// Display name, e.g. "Indonesia".
    pub country: &'static str,
    pub country_id: Country,
    pub date_time: DateTime<Utc>,
    pub confirmed: i64,
    pub recovered: i64,
    pub deceased: i64,
    pub confirmed_cumulative: i64,
    pub recovered_cumulative: i64,
    pub deceased_cumulative: i64,
}

impl DailySummary {
    pub fn new(country: Country, date_time: DateTime<Utc>, counts: CaseCounts) -> Self {
        Self {
            country: country.name(),
            country_id: country,
            date_time,
            confirmed: counts.confirmed,
            recovered: counts.recovered,
            deceased: counts.deceased,
            confirmed_cumulative: counts.confirmed_cumulative,
            recovered_cumulative: counts.recovered_cumulative,
            deceased_cumulative: counts.deceased_cumulative,
        }
    }

    pub fn counts(&self) -> CaseCounts {
        CaseCounts {
            confirmed: self.confirmed,
            recovered: self.recovered,
            deceased: self.deceased,
            confirmed_cumulative: self.confirmed_cumulative,
            recovered_cumulative: self.recovered_cumulative,
            deceased_cumulative: self.deceased_cumulative,
        }
    }
}

/// Parse a zone-less date/time string as UTC.
pub fn parse_naive_utc(value: &str, pattern: &'static str) -> Result<DateTime<Utc>, AppError> {
    NaiveDateTime::parse_from_str(value.trim(), pattern)
        .map(|dt| dt.and_utc())
        .map_err(|_| AppError::TimestampFormat {
            value: value.to_string(),
            expected: pattern,
        })
}

/// Parse a calendar date as midnight UTC.
pub fn parse_date_utc(value: &str, pattern: &'static str) -> Result<DateTime<Utc>, AppError> {
    NaiveDate::parse_from_str(value.trim(), pattern)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::TimestampFormat {
            value: value.to_string(),
            expected: pattern,
        })
}

/// Parse an RFC 3339 timestamp and convert it to UTC.
pub fn parse_rfc3339_utc(value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::TimestampFormat {
            value: value.to_string(),
            expected: "RFC 3339",
        })
}

/// Raw document handle returned by a fetcher.
///
/// The payload owns its reader; dropping it releases the underlying file or
/// connection, whichever path the caller leaves by.
pub struct Payload {
    origin: String,
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl Payload {
    pub fn new(origin: impl Into<String>, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            origin: origin.into(),
            reader: Box::pin(reader),
        }
    }

    pub fn from_bytes(origin: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(origin, std::io::Cursor::new(bytes.into()))
    }

    /// Path or URL the payload was read from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Drain the stream into memory.
    pub async fn into_bytes(mut self) -> Result<Vec<u8>, AppError> {
        let mut buf = Vec::new();
        self.reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| AppError::FetchError(format!("reading {}: {e}", self.origin)))?;
        Ok(buf)
    }

    /// Drain the stream and decode it as UTF-8.
    pub async fn into_text(self) -> Result<String, AppError> {
        let origin = self.origin.clone();
        let bytes = self.into_bytes().await?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::ParseError(format!("{origin} is not valid UTF-8: {e}")))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
