//! Wire models for the surebets feed response. Deserialization is
//! deliberately tolerant of unknown fields: the feed may add fields over
//! time and this client must not hard-fail on them.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub id: String,
    pub profit: f64,
    #[serde(default)]
    pub created: Option<String>,
    pub prongs: Vec<RawLeg>,
    /// Non-empty when the two legs operate under different sporting rules.
    #[serde(default, rename = "rd")]
    pub different_rules: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLeg {
    pub bk: String,
    pub value: f64,
    pub time: i64,
    pub teams: (String, String),
    #[serde(rename = "type")]
    pub market: RawMarket,
    #[serde(default)]
    pub tournament: String,
    #[serde(default)]
    pub sport_id: String,
    #[serde(default)]
    pub nav: Option<RawNav>,
    /// Comma-separated per-leg generativeness markers, e.g. "0,2".
    #[serde(default)]
    pub generatives: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMarket {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub variety: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub game: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawNav {
    #[serde(default)]
    pub link: Option<String>,
}
