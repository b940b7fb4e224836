//! Declarative bookmaker roles, channel mapping, and allowed pairings.
//!
//! Roles and pairings are a code-level table rather than an env-configured
//! surface: the set of target channels is operational knowledge, not a
//! per-deployment tunable.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmakerRole {
    Sharp,
    Soft,
}

#[derive(Debug, Clone)]
pub struct Bookmaker {
    pub id: String,
    pub role: BookmakerRole,
    pub telegram_channel_id: Option<i64>,
    pub allowed_counterparts: Vec<String>,
}

impl Bookmaker {
    pub fn is_sharp(&self) -> bool {
        self.role == BookmakerRole::Sharp
    }

    pub fn is_soft(&self) -> bool {
        self.role == BookmakerRole::Soft
    }

    /// Empty `allowed_counterparts` means any sharp counterpart is accepted.
    pub fn can_use_counterpart(&self, sharp_id: &str) -> bool {
        self.allowed_counterparts.is_empty()
            || self.allowed_counterparts.iter().any(|s| s == sharp_id)
    }
}

/// Immutable, process-lifetime bookmaker configuration.
#[derive(Debug, Clone)]
pub struct BookmakerConfig {
    bookmakers: HashMap<String, Bookmaker>,
    /// Priority-ordered sharp ids; first match wins when several sharp legs
    /// are eligible for the same record.
    sharp_order: Vec<String>,
}

impl BookmakerConfig {
    pub fn new(bookmakers: Vec<Bookmaker>) -> Self {
        let sharp_order = bookmakers
            .iter()
            .filter(|b| b.is_sharp())
            .map(|b| b.id.clone())
            .collect();
        let bookmakers = bookmakers.into_iter().map(|b| (b.id.clone(), b)).collect();
        BookmakerConfig {
            bookmakers,
            sharp_order,
        }
    }

    /// The default table: Pinnacle as the sole sharp, Retabet and Yaass
    /// Casino as soft targets, both restricted to Pinnacle as counterpart.
    pub fn default_table() -> Self {
        BookmakerConfig::new(vec![
            Bookmaker {
                id: "pinnaclesports".into(),
                role: BookmakerRole::Sharp,
                telegram_channel_id: None,
                allowed_counterparts: vec![],
            },
            Bookmaker {
                id: "retabet_apuestas".into(),
                role: BookmakerRole::Soft,
                telegram_channel_id: Some(-1002294438792),
                allowed_counterparts: vec!["pinnaclesports".into()],
            },
            Bookmaker {
                id: "yaasscasino".into(),
                role: BookmakerRole::Soft,
                telegram_channel_id: Some(-1002360901387),
                allowed_counterparts: vec!["pinnaclesports".into()],
            },
        ])
    }

    pub fn get(&self, id: &str) -> Option<&Bookmaker> {
        self.bookmakers.get(&normalize(id))
    }

    pub fn is_sharp(&self, id: &str) -> bool {
        self.get(id).map(|b| b.is_sharp()).unwrap_or(false)
    }

    pub fn is_soft_target(&self, id: &str) -> bool {
        self.get(id).map(|b| b.is_soft()).unwrap_or(false)
    }

    /// Priority-ordered sharp ids, for "first eligible sharp wins".
    pub fn sharp_order(&self) -> &[String] {
        &self.sharp_order
    }

    pub fn channel_for(&self, soft_id: &str) -> Option<i64> {
        self.get(soft_id).and_then(|b| b.telegram_channel_id)
    }

    pub fn is_valid_pair(&self, sharp_id: &str, soft_id: &str) -> bool {
        let sharp_ok = self.is_sharp(sharp_id);
        let soft = match self.get(soft_id) {
            Some(b) if b.is_soft() => b,
            _ => return false,
        };
        sharp_ok && soft.can_use_counterpart(sharp_id)
    }

    pub fn all_soft_ids(&self) -> HashSet<&str> {
        self.bookmakers
            .values()
            .filter(|b| b.is_soft())
            .map(|b| b.id.as_str())
            .collect()
    }

    /// Pipe-joined bookmaker id list for the feed request's `source` param.
    pub fn source_param(&self) -> String {
        self.bookmakers.keys().cloned().collect::<Vec<_>>().join("|")
    }
}

fn normalize(id: &str) -> String {
    id.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_one_sharp() {
        let cfg = BookmakerConfig::default_table();
        assert_eq!(cfg.sharp_order(), &["pinnaclesports".to_string()]);
    }

    #[test]
    fn valid_pair_respects_allowed_counterparts() {
        let cfg = BookmakerConfig::default_table();
        assert!(cfg.is_valid_pair("pinnaclesports", "retabet_apuestas"));
        assert!(!cfg.is_valid_pair("bet365", "retabet_apuestas"));
    }

    #[test]
    fn unknown_soft_is_invalid() {
        let cfg = BookmakerConfig::default_table();
        assert!(!cfg.is_valid_pair("pinnaclesports", "unknownbook"));
    }

    #[test]
    fn channel_lookup() {
        let cfg = BookmakerConfig::default_table();
        assert_eq!(cfg.channel_for("retabet_apuestas"), Some(-1002294438792));
    }
}
