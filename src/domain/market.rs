//! Market type normalization and the opposite-market table used for
//! duplicate detection (if the "under" side was already sent, the "over"
//! side of the same market is a duplicate in spirit).

use std::collections::HashMap;
use std::sync::OnceLock;

/// A normalized market identifier (lower-cased, trimmed).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarketType(String);

impl MarketType {
    pub fn new(raw: &str) -> Self {
        MarketType(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// All markets considered the semantic opposite of this one. Usually a
    /// single entry; `_1x` maps to two (`_x2`, `_12`).
    pub fn opposites(&self) -> Vec<MarketType> {
        opposite_table()
            .get(self.0.as_str())
            .map(|v| v.iter().map(|s| MarketType::new(s)).collect())
            .unwrap_or_default()
    }
}

fn opposite_table() -> &'static HashMap<&'static str, Vec<&'static str>> {
    static TABLE: OnceLock<HashMap<&'static str, Vec<&'static str>>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        m.insert("win1", vec!["win2"]);
        m.insert("win2", vec!["win1"]);
        m.insert("over", vec!["under"]);
        m.insert("under", vec!["over"]);
        m.insert("ah1", vec!["ah2"]);
        m.insert("ah2", vec!["ah1"]);
        m.insert("odd", vec!["even"]);
        m.insert("even", vec!["odd"]);
        m.insert("yes", vec!["no"]);
        m.insert("no", vec!["yes"]);
        m.insert("_1x", vec!["_x2", "_12"]);
        m.insert("_x2", vec!["_1x", "_12"]);
        m.insert("_12", vec!["_1x", "_x2"]);
        m.insert("winonly1", vec!["winonly2"]);
        m.insert("winonly2", vec!["winonly1"]);
        m.insert("win1retx", vec!["win2retx"]);
        m.insert("win2retx", vec!["win1retx"]);
        m.insert("clean_sheet_1", vec!["clean_sheet_2"]);
        m.insert("clean_sheet_2", vec!["clean_sheet_1"]);
        m
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_under_are_mutual_opposites() {
        let over = MarketType::new(" Over ");
        assert_eq!(over.as_str(), "over");
        assert_eq!(over.opposites(), vec![MarketType::new("under")]);
        assert_eq!(MarketType::new("under").opposites(), vec![MarketType::new("over")]);
    }

    #[test]
    fn one_x_has_two_opposites() {
        let one_x = MarketType::new("_1x");
        assert_eq!(
            one_x.opposites(),
            vec![MarketType::new("_x2"), MarketType::new("_12")]
        );
    }

    #[test]
    fn double_chance_triangle_is_fully_mutual() {
        assert_eq!(
            MarketType::new("_x2").opposites(),
            vec![MarketType::new("_1x"), MarketType::new("_12")]
        );
        assert_eq!(
            MarketType::new("_12").opposites(),
            vec![MarketType::new("_1x"), MarketType::new("_x2")]
        );
    }

    #[test]
    fn handicap_odd_even_and_clean_sheet_pairs_are_mutual_opposites() {
        assert_eq!(MarketType::new("ah1").opposites(), vec![MarketType::new("ah2")]);
        assert_eq!(MarketType::new("ah2").opposites(), vec![MarketType::new("ah1")]);
        assert_eq!(MarketType::new("odd").opposites(), vec![MarketType::new("even")]);
        assert_eq!(MarketType::new("even").opposites(), vec![MarketType::new("odd")]);
        assert_eq!(
            MarketType::new("clean_sheet_1").opposites(),
            vec![MarketType::new("clean_sheet_2")]
        );
        assert_eq!(
            MarketType::new("clean_sheet_2").opposites(),
            vec![MarketType::new("clean_sheet_1")]
        );
    }

    #[test]
    fn formatter_substituted_markets_still_resolve_opposites() {
        // These ids are rewritten for display by the message formatter
        // (win1retx -> DNB1, winonly1 -> WIN1, ...) but duplicate detection
        // runs against the raw feed market id, which must still be mapped.
        assert_eq!(
            MarketType::new("win1retx").opposites(),
            vec![MarketType::new("win2retx")]
        );
        assert_eq!(
            MarketType::new("winonly1").opposites(),
            vec![MarketType::new("winonly2")]
        );
    }

    #[test]
    fn unmapped_market_has_no_opposites() {
        assert!(MarketType::new("handicap").opposites().is_empty());
    }
}
