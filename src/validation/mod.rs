//! Ordered, fail-fast validation chain. Cheap CPU checks run before any I/O
//! check; the duplicate check is always last.

use std::sync::Arc;

use async_trait::async_trait;

use crate::dedupe::DedupeStore;
use crate::domain::Pick;
use crate::error::ValidationFailure;
use crate::feed::models::Record;

#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn validate(&self, pick: &Pick, record: &Record) -> Result<(), String>;
}

pub struct OddsValidator {
    pub min_odds: f64,
    pub max_odds: f64,
}

#[async_trait]
impl Validator for OddsValidator {
    fn name(&self) -> &'static str {
        "odds"
    }

    async fn validate(&self, pick: &Pick, _record: &Record) -> Result<(), String> {
        for odds in [pick.soft_odds, pick.sharp_odds] {
            if odds < self.min_odds || odds > self.max_odds {
                return Err(format!(
                    "odds {odds} outside [{}, {}]",
                    self.min_odds, self.max_odds
                ));
            }
        }
        Ok(())
    }
}

pub struct ProfitValidator {
    pub min_profit: f64,
    pub max_profit: f64,
}

#[async_trait]
impl Validator for ProfitValidator {
    fn name(&self) -> &'static str {
        "profit"
    }

    async fn validate(&self, pick: &Pick, _record: &Record) -> Result<(), String> {
        if pick.profit < self.min_profit || pick.profit > self.max_profit {
            return Err(format!(
                "profit {} outside [{}, {}]",
                pick.profit, self.min_profit, self.max_profit
            ));
        }
        Ok(())
    }
}

pub struct TimeValidator {
    pub min_event_time_secs: i64,
}

#[async_trait]
impl Validator for TimeValidator {
    fn name(&self) -> &'static str {
        "time"
    }

    async fn validate(&self, pick: &Pick, _record: &Record) -> Result<(), String> {
        let now_ms = crate::util::now_ms();
        let seconds_until = (pick.event_time_ms - now_ms) / 1000;
        if seconds_until < self.min_event_time_secs {
            return Err(format!(
                "event starts in {seconds_until}s, below minimum {}",
                self.min_event_time_secs
            ));
        }
        Ok(())
    }
}

/// Safety net: the feed's `hide-different-rules` filter normally removes
/// these, but a non-empty `rd` field is rejected here too.
pub struct RulesValidator;

#[async_trait]
impl Validator for RulesValidator {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn validate(&self, _pick: &Pick, record: &Record) -> Result<(), String> {
        match &record.different_rules {
            Some(rd) if !rd.trim().is_empty() => {
                Err(format!("record has differing rules marker: {rd}"))
            }
            _ => Ok(()),
        }
    }
}

/// Rejects legs whose "generativeness" marker (comma-separated per-leg,
/// e.g. "0,2") meets or exceeds the rejection threshold.
pub struct GenerativeValidator {
    pub reject_threshold: u32,
}

impl Default for GenerativeValidator {
    fn default() -> Self {
        GenerativeValidator { reject_threshold: 2 }
    }
}

#[async_trait]
impl Validator for GenerativeValidator {
    fn name(&self) -> &'static str {
        "generative"
    }

    async fn validate(&self, _pick: &Pick, record: &Record) -> Result<(), String> {
        for leg in &record.prongs {
            let markers = leg.generatives.as_deref().unwrap_or("0,0");
            for part in markers.split(',') {
                let value: u32 = part.trim().parse().unwrap_or(0);
                if value >= self.reject_threshold {
                    return Err(format!(
                        "leg generativeness {value} meets threshold {}",
                        self.reject_threshold
                    ));
                }
            }
        }
        Ok(())
    }
}

pub struct DuplicateValidator {
    pub store: Arc<dyn DedupeStore>,
}

#[async_trait]
impl Validator for DuplicateValidator {
    fn name(&self) -> &'static str {
        "duplicate"
    }

    async fn validate(&self, pick: &Pick, _record: &Record) -> Result<(), String> {
        if self.store.exists(&pick.dedup_key()).await {
            return Err("dedup key already present".into());
        }
        if self.store.exists_any(&pick.opposite_keys()).await {
            return Err("opposite-market key already present".into());
        }
        Ok(())
    }
}

pub struct ValidationChain {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidationChain {
    pub fn new(validators: Vec<Box<dyn Validator>>) -> Self {
        ValidationChain { validators }
    }

    /// Cheap-CPU-first, duplicate-check-last chain matching the defaults.
    pub fn default_chain(
        min_odds: f64,
        max_odds: f64,
        min_profit: f64,
        max_profit: f64,
        store: Arc<dyn DedupeStore>,
    ) -> Self {
        ValidationChain::new(vec![
            Box::new(OddsValidator { min_odds, max_odds }),
            Box::new(ProfitValidator { min_profit, max_profit }),
            Box::new(TimeValidator { min_event_time_secs: 0 }),
            Box::new(RulesValidator),
            Box::new(GenerativeValidator::default()),
            Box::new(DuplicateValidator { store }),
        ])
    }

    pub async fn run(&self, pick: &Pick, record: &Record) -> Result<(), ValidationFailure> {
        for validator in &self.validators {
            if let Err(reason) = validator.validate(pick, record).await {
                return Err(ValidationFailure {
                    validator: validator.name(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarketType;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tokio::sync::Mutex as TokioMutex;

    struct FakeStore(TokioMutex<HashSet<String>>);

    #[async_trait]
    impl DedupeStore for FakeStore {
        async fn exists(&self, key: &str) -> bool {
            self.0.lock().await.contains(key)
        }
        async fn exists_any(&self, keys: &[String]) -> bool {
            let seen = self.0.lock().await;
            keys.iter().any(|k| seen.contains(k))
        }
        async fn mark(&self, pick: &Pick, _now_ms: i64) -> bool {
            self.0.lock().await.insert(pick.dedup_key());
            true
        }
        async fn get_cursor(&self) -> Option<String> {
            None
        }
        async fn set_cursor(&self, _cursor: &str) -> bool {
            true
        }
    }

    fn pick_with(profit: f64, soft_odds: f64, event_time_ms: i64) -> Pick {
        Pick {
            teams: ("Fnatic".into(), "G2".into()),
            event_time_ms,
            tournament: "LEC".into(),
            sport_id: "leagueoflegends".into(),
            link: None,
            soft_bookmaker: "retabet_apuestas".into(),
            soft_odds,
            market: MarketType::new("under"),
            variety: "2.5".into(),
            channel_id: -1002294438792,
            sharp_bookmaker: "pinnaclesports".into(),
            sharp_odds: 2.10,
            profit,
        }
    }

    fn record_with(different_rules: Option<&str>, generatives: Option<&str>) -> Record {
        use crate::feed::models::{RawLeg, RawMarket};
        Record {
            id: "1".into(),
            profit: 2.5,
            created: None,
            different_rules: different_rules.map(String::from),
            prongs: vec![RawLeg {
                bk: "pinnaclesports".into(),
                value: 2.10,
                time: 1_700_000_000_000,
                teams: ("Fnatic".into(), "G2".into()),
                market: RawMarket {
                    type_: "under".into(),
                    variety: "2.5".into(),
                    condition: None,
                    game: None,
                    period: None,
                },
                tournament: "LEC".into(),
                sport_id: "leagueoflegends".into(),
                nav: None,
                generatives: generatives.map(String::from),
            }],
        }
    }

    #[tokio::test]
    async fn happy_path_passes_every_validator() {
        let store: Arc<dyn DedupeStore> = Arc::new(FakeStore(TokioMutex::new(HashSet::new())));
        let chain = ValidationChain::default_chain(1.10, 9.99, -1.0, 25.0, store);
        let pick = pick_with(2.5, 2.05, crate::util::now_ms() + 3_600_000);
        let record = record_with(None, None);
        assert!(chain.run(&pick, &record).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_odds_out_of_range() {
        let store: Arc<dyn DedupeStore> = Arc::new(FakeStore(TokioMutex::new(HashSet::new())));
        let chain = ValidationChain::default_chain(1.10, 9.99, -1.0, 25.0, store);
        let pick = pick_with(2.5, 1.05, crate::util::now_ms() + 3_600_000);
        let record = record_with(None, None);
        let err = chain.run(&pick, &record).await.unwrap_err();
        assert_eq!(err.validator, "odds");
    }

    #[tokio::test]
    async fn rejects_non_empty_rules_field() {
        let store: Arc<dyn DedupeStore> = Arc::new(FakeStore(TokioMutex::new(HashSet::new())));
        let chain = ValidationChain::default_chain(1.10, 9.99, -1.0, 25.0, store);
        let pick = pick_with(2.5, 2.05, crate::util::now_ms() + 3_600_000);
        let record = record_with(Some("different-card-count"), None);
        let err = chain.run(&pick, &record).await.unwrap_err();
        assert_eq!(err.validator, "rules");
    }

    #[tokio::test]
    async fn rejects_generative_legs() {
        let store: Arc<dyn DedupeStore> = Arc::new(FakeStore(TokioMutex::new(HashSet::new())));
        let chain = ValidationChain::default_chain(1.10, 9.99, -1.0, 25.0, store);
        let pick = pick_with(2.5, 2.05, crate::util::now_ms() + 3_600_000);
        let record = record_with(None, Some("0,2"));
        let err = chain.run(&pick, &record).await.unwrap_err();
        assert_eq!(err.validator, "generative");
    }

    #[tokio::test]
    async fn duplicate_check_runs_last() {
        let store: Arc<dyn DedupeStore> = Arc::new(FakeStore(TokioMutex::new(HashSet::new())));
        let pick = pick_with(2.5, 2.05, crate::util::now_ms() + 3_600_000);
        store.mark(&pick, crate::util::now_ms()).await;
        let chain = ValidationChain::default_chain(1.10, 9.99, -1.0, 25.0, store);
        let record = record_with(None, None);
        let err = chain.run(&pick, &record).await.unwrap_err();
        assert_eq!(err.validator, "duplicate");
    }
}
