//! Per-sharp calculation strategies: stake tier and minimum soft odds.
//!
//! Selected through a factory keyed by normalized sharp bookmaker id, with
//! an unmapped-sharp default of the Pinnacle calculator — the same
//! Strategy + Factory split the reference implementation uses.

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeTier {
    Low,
    MediumLow,
    MediumHigh,
    High,
}

impl StakeTier {
    pub fn emoji(&self) -> &'static str {
        match self {
            StakeTier::Low => "\u{1F534}",        // 🔴
            StakeTier::MediumLow => "\u{1F7E0}",  // 🟠
            StakeTier::MediumHigh => "\u{1F7E1}", // 🟡
            StakeTier::High => "\u{1F7E2}",       // 🟢
        }
    }
}

pub trait Calculator: Send + Sync {
    /// `None` when profit falls outside the acceptable range.
    fn stake_tier(&self, profit: f64, min_profit: f64, max_profit: f64) -> Option<StakeTier>;

    /// Minimum soft-leg odds at which the pick still clears the target
    /// profit against this sharp's odds.
    fn min_odds(&self, sharp_odds: f64) -> f64;
}

/// Reference calculator for Pinnacle-grade sharps: `1/(1.01 - 1/s)`. This is
/// the only accepted min-odds formula, including for sharps other than
/// Pinnacle that this calculator also serves as the default for.
pub struct PinnacleCalculator;

impl Calculator for PinnacleCalculator {
    fn stake_tier(&self, profit: f64, min_profit: f64, max_profit: f64) -> Option<StakeTier> {
        if profit < min_profit || profit > max_profit {
            return None;
        }
        Some(if profit <= -0.5 {
            StakeTier::Low
        } else if profit <= 1.5 {
            StakeTier::MediumLow
        } else if profit <= 4.0 {
            StakeTier::MediumHigh
        } else {
            StakeTier::High
        })
    }

    fn min_odds(&self, sharp_odds: f64) -> f64 {
        let denom = 1.01 - 1.0 / sharp_odds;
        if denom <= 0.0 {
            return 1000.0;
        }
        (1.0 / denom * 100.0).round() / 100.0
    }
}

/// Output of the calculation stage, combined with a `Pick` by the
/// formatter. `None` stake tier means the profit fell outside the
/// acceptable range after all (the validation chain should already have
/// rejected that pick; this is a defensive fallback, not the primary gate).
#[derive(Debug, Clone)]
pub struct Calculation {
    pub stake_tier: Option<StakeTier>,
    pub min_odds: f64,
}

pub fn calculate(
    sharp_id: &str,
    sharp_odds: f64,
    profit: f64,
    min_profit: f64,
    max_profit: f64,
    factory: &CalculatorFactory,
) -> Calculation {
    let calc = factory.get(sharp_id);
    Calculation {
        stake_tier: calc.stake_tier(profit, min_profit, max_profit),
        min_odds: calc.min_odds(sharp_odds),
    }
}

pub struct CalculatorFactory {
    calculators: HashMap<String, Arc<dyn Calculator>>,
    default: Arc<dyn Calculator>,
}

impl CalculatorFactory {
    pub fn new() -> Self {
        let mut calculators: HashMap<String, Arc<dyn Calculator>> = HashMap::new();
        calculators.insert("pinnaclesports".into(), Arc::new(PinnacleCalculator));
        CalculatorFactory {
            calculators,
            default: Arc::new(PinnacleCalculator),
        }
    }

    pub fn register(&mut self, sharp_id: &str, calculator: Arc<dyn Calculator>) {
        self.calculators.insert(sharp_id.trim().to_lowercase(), calculator);
    }

    pub fn get(&self, sharp_id: &str) -> Arc<dyn Calculator> {
        self.calculators
            .get(&sharp_id.trim().to_lowercase())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Default for CalculatorFactory {
    fn default() -> Self {
        Self::new()
    }
}
