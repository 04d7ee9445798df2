//! Indonesia: the national task force's `update.json` endpoint.
//!
//! ```json
//! {"update": {"penambahan": {"jumlah_positif": 10, ..., "created": "2020-04-01 10:00:00"},
//!             "total": {"jumlah_positif": 1000, ...}}}
//! ```
//!
//! `penambahan` ("additions") holds the daily deltas, `total` the running
//! totals. The timestamp is `penambahan.created`.

use serde::Deserialize;

use crate::country::Country;
use crate::error::AppError;
use crate::models::{CaseCounts, DailySummary, parse_naive_utc};

pub const SOURCE_NAME: &str = "covid19goid";

const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateResponse {
    pub update: Update,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub penambahan: Penambahan,
    pub total: Total,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Penambahan {
    pub jumlah_positif: i64,
    pub jumlah_meninggal: i64,
    pub jumlah_sembuh: i64,
    pub jumlah_dirawat: i64,
    pub tanggal: String,
    pub created: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Total {
    pub jumlah_positif: i64,
    pub jumlah_meninggal: i64,
    pub jumlah_sembuh: i64,
    pub jumlah_dirawat: i64,
}

/// Decode an `update.json` body.
pub fn parse_update(body: &[u8]) -> Result<UpdateResponse, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::ParseError(format!("{SOURCE_NAME} update: {e}")))
}

impl UpdateResponse {
    pub fn normalize(&self) -> Result<DailySummary, AppError> {
        let added = &self.update.penambahan;
        let total = &self.update.total;
        let date_time = parse_naive_utc(&added.created, CREATED_FORMAT)?;

        Ok(DailySummary::new(
            Country::Indonesia,
            date_time,
            CaseCounts {
                confirmed: added.jumlah_positif,
                recovered: added.jumlah_sembuh,
                deceased: added.jumlah_meninggal,
                confirmed_cumulative: total.jumlah_positif,
                recovered_cumulative: total.jumlah_sembuh,
                deceased_cumulative: total.jumlah_meninggal,
            },
        ))
    }
}

pub fn decode(body: &[u8]) -> Result<DailySummary, AppError> {
    parse_update(body)?.normalize()
}
