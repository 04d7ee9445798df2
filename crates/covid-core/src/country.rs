use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Countries the bot can report on.
///
/// The code doubles as the dispatch key and as the `country_id` of every
/// summary record. Add a member here before registering sources for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Country {
    #[serde(rename = "JP")]
    Japan,
    #[serde(rename = "ID")]
    Indonesia,
}

impl Country {
    pub const ALL: [Country; 2] = [Country::Japan, Country::Indonesia];

    /// ISO 3166-1 alpha-2 code.
    pub fn code(&self) -> &'static str {
        match self {
            Country::Japan => "JP",
            Country::Indonesia => "ID",
        }
    }

    /// English display name.
    pub fn name(&self) -> &'static str {
        match self {
            Country::Japan => "Japan",
            Country::Indonesia => "Indonesia",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Country {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Country::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(needle) || c.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| AppError::NotFound(format!("unknown country '{needle}'")))
    }
}
