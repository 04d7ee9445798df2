use serde::Deserialize;

use crate::country::Country;
use crate::error::AppError;
use crate::models::{CaseCounts, DailySummary, parse_date_utc};

pub const SOURCE_NAME: &str = "covid19japan";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Deserialize)]
pub struct Summary {
    pub daily: Vec<DailyEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DailyEntry {
    pub date: String,
    pub confirmed: i64,
    pub confirmed_cumulative: i64,
    pub recovered: i64,
    pub recovered_cumulative: i64,
    pub deceased: i64,
    pub deceased_cumulative: i64,
}

impl Summary {
    /// Normalize the most recent day; the API lists days oldest first.
    pub fn normalize(&self) -> Result<DailySummary, AppError> {
        let latest = self.daily.last().ok_or_else(|| {
            AppError::ExtractionError(format!("{SOURCE_NAME} summary has no daily entries"))
        })?;
        let date_time = parse_date_utc(&latest.date, DATE_FORMAT)?;

        Ok(DailySummary::new(
            Country::Japan,
            date_time,
            CaseCounts {
                confirmed: latest.confirmed,
                recovered: latest.recovered,
                deceased: latest.deceased,
                confirmed_cumulative: latest.confirmed_cumulative,
                recovered_cumulative: latest.recovered_cumulative,
                deceased_cumulative: latest.deceased_cumulative,
            },
        ))
    }
}

pub fn decode(body: &[u8]) -> Result<DailySummary, AppError> {
    let summary: Summary = serde_json::from_slice(body)
        .map_err(|e| AppError::ParseError(format!("{SOURCE_NAME} summary: {e}")))?;
    summary.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_uses_last_entry() {
        let body = r#"{"daily":[
            {"date":"2020-04-10","confirmed":600,"confirmedCumulative":5500},
            {"date":"2020-04-11","confirmed":720,"confirmedCumulative":6220,
             "recovered":30,"recoveredCumulative":760,"deceased":4,"deceasedCumulative":109}
        ],"updated":"ignored"}"#;
        let summary = decode(body.as_bytes()).unwrap();
        assert_eq!(summary.country_id, Country::Japan);
        assert_eq!(summary.confirmed, 720);
        assert_eq!(summary.confirmed_cumulative, 6220);
        assert_eq!(summary.recovered_cumulative, 760);
        assert_eq!(summary.deceased, 4);
        assert_eq!(
            summary.date_time,
            Utc.with_ymd_and_hms(2020, 4, 11, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_empty_daily_is_extraction_error() {
        let err = decode(br#"{"daily":[]}"#).unwrap_err();
        assert!(matches!(err, AppError::ExtractionError(_)));
    }

    #[test]
    fn test_bad_date_is_timestamp_error() {
        let err = decode(br#"{"daily":[{"date":"11/04/2020"}]}"#).unwrap_err();
        assert!(matches!(err, AppError::TimestampFormat { .. }));
    }

    #[test]
    fn test_missing_daily_is_parse_error() {
        let err = decode(br#"{"updated":"x"}"#).unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }
}
