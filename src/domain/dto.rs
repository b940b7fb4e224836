use crate::bookmakers::BookmakerConfig;
use crate::error::CoreError;
use crate::feed::models::{RawLeg, Record};

use super::market::MarketType;
use super::pick::Pick;

/// Reshapes a raw feed record into a soft-bookmaker-centric `Pick`.
///
/// When more than one leg's bookmaker is a configured sharp (only possible
/// with more than two legs, which is already rejected below, but kept as an
/// explicit rule for clarity and future multi-leg support): the first sharp
/// in `BookmakerConfig`'s declared priority order is used as the counterpart.
pub fn build_pick(record: &Record, bookmakers: &BookmakerConfig) -> Result<Pick, CoreError> {
    if record.prongs.len() != 2 {
        return Err(CoreError::InvalidRecord(format!(
            "expected 2 legs, got {}",
            record.prongs.len()
        )));
    }
    let legs = &record.prongs;

    let sharp_idx = bookmakers
        .sharp_order()
        .iter()
        .find_map(|sharp_id| legs.iter().position(|leg| normalize(&leg.bk) == *sharp_id));

    let sharp_idx = sharp_idx.ok_or_else(|| {
        CoreError::InvalidRecord("no configured sharp bookmaker present in record".into())
    })?;
    let soft_idx = 1 - sharp_idx;

    let sharp: &RawLeg = &legs[sharp_idx];
    let soft: &RawLeg = &legs[soft_idx];

    let sharp_id = normalize(&sharp.bk);
    let soft_id = normalize(&soft.bk);

    if !bookmakers.is_soft_target(&soft_id) {
        return Err(CoreError::InvalidPairing(format!(
            "{soft_id} is not a configured target bookmaker"
        )));
    }
    if !bookmakers.is_valid_pair(&sharp_id, &soft_id) {
        return Err(CoreError::InvalidPairing(format!(
            "{sharp_id} is not an allowed counterpart for {soft_id}"
        )));
    }

    let channel_id = bookmakers.channel_for(&soft_id).ok_or_else(|| {
        CoreError::InvalidPairing(format!("{soft_id} has no configured channel"))
    })?;

    if soft.teams != sharp.teams || soft.time != sharp.time {
        return Err(CoreError::InvalidRecord(
            "legs disagree on teams or event time".into(),
        ));
    }

    Ok(Pick {
        teams: soft.teams.clone(),
        event_time_ms: soft.time,
        tournament: soft.tournament.clone(),
        sport_id: soft.sport_id.clone(),
        link: soft.nav.as_ref().and_then(|n| n.link.clone()),
        soft_bookmaker: soft_id,
        soft_odds: soft.value,
        market: MarketType::new(&soft.market.type_),
        variety: soft.market.variety.clone(),
        channel_id,
        sharp_bookmaker: sharp_id,
        sharp_odds: sharp.value,
        profit: record.profit,
    })
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::models::{RawMarket, RawNav};

    fn leg(bk: &str, value: f64, market: &str) -> RawLeg {
        RawLeg {
            bk: bk.to_string(),
            value,
            time: 1_700_000_000_000,
            teams: ("Fnatic".into(), "G2".into()),
            market: RawMarket {
                type_: market.into(),
                variety: "2.5".into(),
                condition: None,
                game: None,
                period: None,
            },
            tournament: "LEC".into(),
            sport_id: "leagueoflegends".into(),
            nav: Some(RawNav {
                link: Some("https://bet365.com/dl/sport/foo".into()),
            }),
            generatives: None,
        }
    }

    fn record(legs: Vec<RawLeg>, profit: f64) -> Record {
        Record {
            id: "1".into(),
            profit,
            created: None,
            prongs: legs,
            different_rules: None,
        }
    }

    #[test]
    fn builds_pick_for_valid_pair() {
        let bookmakers = BookmakerConfig::default_table();
        let rec = record(
            vec![
                leg("pinnaclesports", 2.10, "under"),
                leg("retabet_apuestas", 2.05, "over"),
            ],
            2.5,
        );
        let pick = build_pick(&rec, &bookmakers).unwrap();
        assert_eq!(pick.sharp_bookmaker, "pinnaclesports");
        assert_eq!(pick.soft_bookmaker, "retabet_apuestas");
        assert_eq!(pick.channel_id, -1002294438792);
    }

    #[test]
    fn rejects_wrong_leg_count() {
        let bookmakers = BookmakerConfig::default_table();
        let rec = record(vec![leg("pinnaclesports", 2.10, "under")], 2.5);
        assert!(build_pick(&rec, &bookmakers).is_err());
    }

    #[test]
    fn rejects_disallowed_pairing() {
        let bookmakers = BookmakerConfig::default_table();
        let rec = record(
            vec![
                leg("bet365", 2.10, "under"),
                leg("retabet_apuestas", 2.05, "over"),
            ],
            2.5,
        );
        assert!(build_pick(&rec, &bookmakers).is_err());
    }

    #[test]
    fn rejects_unconfigured_soft() {
        let bookmakers = BookmakerConfig::default_table();
        let rec = record(
            vec![
                leg("pinnaclesports", 2.10, "under"),
                leg("unknownbook", 2.05, "over"),
            ],
            2.5,
        );
        assert!(build_pick(&rec, &bookmakers).is_err());
    }
}
