use super::market::MarketType;

/// One leg of a surebet record as received from the feed.
#[derive(Debug, Clone)]
pub struct Leg {
    pub bookmaker: String,
    pub odds: f64,
    pub market: MarketType,
    pub variety: String,
    pub event_time_ms: i64,
    pub teams: (String, String),
    pub tournament: String,
    pub sport_id: String,
    pub link: Option<String>,
}

/// A validated, soft-bookmaker-centric pick ready for calculation and
/// formatting. Frozen after construction: every field is set once by
/// `domain::dto::build_pick` and never mutated.
#[derive(Debug, Clone)]
pub struct Pick {
    pub teams: (String, String),
    pub event_time_ms: i64,
    pub tournament: String,
    pub sport_id: String,
    pub link: Option<String>,

    pub soft_bookmaker: String,
    pub soft_odds: f64,
    pub market: MarketType,
    pub variety: String,
    pub channel_id: i64,

    pub sharp_bookmaker: String,
    pub sharp_odds: f64,

    pub profit: f64,
}

impl Pick {
    /// Canonical dedup key: `{team1}:{team2}:{event_time_ms}:{market}:{variety}:{soft_bookmaker}`,
    /// normalized to lowercase/trimmed components.
    pub fn dedup_key(&self) -> String {
        build_key(
            &self.teams,
            self.event_time_ms,
            self.market.as_str(),
            &self.variety,
            &self.soft_bookmaker,
        )
    }

    /// Dedup keys for every market the opposite-market table considers
    /// equivalent to this pick's market.
    pub fn opposite_keys(&self) -> Vec<String> {
        self.market
            .opposites()
            .into_iter()
            .map(|opp| {
                build_key(
                    &self.teams,
                    self.event_time_ms,
                    opp.as_str(),
                    &self.variety,
                    &self.soft_bookmaker,
                )
            })
            .collect()
    }
}

fn build_key(
    teams: &(String, String),
    event_time_ms: i64,
    market: &str,
    variety: &str,
    soft_bookmaker: &str,
) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}",
        normalize(&teams.0),
        normalize(&teams.1),
        event_time_ms,
        market,
        variety.trim(),
        normalize(soft_bookmaker),
    )
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
