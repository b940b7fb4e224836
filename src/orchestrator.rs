//! Wires the pipeline stages together and owns the per-batch concurrency
//! bound. Mirrors the reference `PickHandler`: a semaphore-bounded fan-out
//! over the batch, with per-pick failures folded into a stats summary
//! rather than aborting the batch.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bookmakers::BookmakerConfig;
use crate::calculation::{self, CalculatorFactory};
use crate::dedupe::DedupeStore;
use crate::domain::dto::build_pick;
use crate::error::CoreError;
use crate::feed::models::Record;
use crate::format::MessageFormatter;
use crate::telegram::TelegramGateway;
use crate::validation::ValidationChain;

#[derive(Debug, Default, Clone, Copy)]
pub struct BatchStats {
    pub total: usize,
    pub validated: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct PickHandler {
    bookmakers: Arc<BookmakerConfig>,
    chain: Arc<ValidationChain>,
    calculators: Arc<CalculatorFactory>,
    formatter: Arc<MessageFormatter>,
    gateway: Arc<TelegramGateway>,
    dedupe: Arc<dyn DedupeStore>,
    semaphore: Arc<tokio::sync::Semaphore>,
    min_profit: f64,
    max_profit: f64,
}

impl PickHandler {
    pub fn new(
        bookmakers: Arc<BookmakerConfig>,
        chain: Arc<ValidationChain>,
        calculators: Arc<CalculatorFactory>,
        formatter: Arc<MessageFormatter>,
        gateway: Arc<TelegramGateway>,
        dedupe: Arc<dyn DedupeStore>,
        concurrent_picks: usize,
        min_profit: f64,
        max_profit: f64,
    ) -> Self {
        PickHandler {
            bookmakers,
            chain,
            calculators,
            formatter,
            gateway,
            dedupe,
            semaphore: Arc::new(tokio::sync::Semaphore::new(concurrent_picks)),
            min_profit,
            max_profit,
        }
    }

    pub async fn process_batch(&self, records: Vec<Record>) -> BatchStats {
        let total = records.len();
        let mut tasks = Vec::with_capacity(total);

        for record in records {
            if record.prongs.len() != 2 {
                continue;
            }
            let permit = self.semaphore.clone().acquire_owned().await;
            let bookmakers = self.bookmakers.clone();
            let chain = self.chain.clone();
            let calculators = self.calculators.clone();
            let formatter = self.formatter.clone();
            let gateway = self.gateway.clone();
            let dedupe = self.dedupe.clone();
            let min_profit = self.min_profit;
            let max_profit = self.max_profit;

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                process_single(
                    &record,
                    &bookmakers,
                    &chain,
                    &calculators,
                    &formatter,
                    &gateway,
                    &dedupe,
                    min_profit,
                    max_profit,
                )
                .await
            }));
        }

        let results = futures_util::future::join_all(tasks).await;
        let mut stats = BatchStats {
            total,
            ..Default::default()
        };
        for result in results {
            match result {
                Ok(Outcome::Sent) => {
                    stats.validated += 1;
                    stats.sent += 1;
                }
                Ok(Outcome::Rejected) => {}
                Ok(Outcome::Failed) => stats.failed += 1,
                Err(_join_err) => stats.failed += 1,
            }
        }
        info!(
            total = stats.total,
            validated = stats.validated,
            sent = stats.sent,
            failed = stats.failed,
            "processed poll batch"
        );
        stats
    }
}

enum Outcome {
    Sent,
    Rejected,
    Failed,
}

#[allow(clippy::too_many_arguments)]
async fn process_single(
    record: &Record,
    bookmakers: &BookmakerConfig,
    chain: &ValidationChain,
    calculators: &CalculatorFactory,
    formatter: &MessageFormatter,
    gateway: &TelegramGateway,
    dedupe: &Arc<dyn DedupeStore>,
    min_profit: f64,
    max_profit: f64,
) -> Outcome {
    let pick = match build_pick(record, bookmakers) {
        Ok(p) => p,
        Err(_) => return Outcome::Rejected,
    };

    if chain.run(&pick, record).await.is_err() {
        return Outcome::Rejected;
    }

    let calc = calculation::calculate(
        &pick.sharp_bookmaker,
        pick.sharp_odds,
        pick.profit,
        min_profit,
        max_profit,
        calculators,
    );
    if calc.stake_tier.is_none() {
        return Outcome::Rejected;
    }

    let message = formatter.format(&pick, &calc).await;

    let receiver = match gateway.enqueue(pick.channel_id, pick.profit, message).await {
        Some(rx) => rx,
        None => {
            warn!("{}", CoreError::QueueFull);
            return Outcome::Failed;
        }
    };

    match receiver.await {
        Ok(true) => {
            dedupe.mark(&pick, crate::util::now_ms()).await;
            Outcome::Sent
        }
        _ => Outcome::Failed,
    }
}
