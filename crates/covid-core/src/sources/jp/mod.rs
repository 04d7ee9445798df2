//! Japan: the covid19japan.com summary API and the Ministry of Health,
//! Labour and Welfare press feed.

pub mod covid19japan;
pub mod mhlw;
