use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

mod bookmakers;
mod cache;
mod calculation;
mod config;
mod dedupe;
mod domain;
mod error;
mod feed;
mod format;
mod orchestrator;
mod ratelimiter;
mod telegram;
mod util;
mod validation;

use bookmakers::BookmakerConfig;
use cache::LocalCache;
use calculation::CalculatorFactory;
use config::Config;
use dedupe::RedisDedupeStore;
use feed::FeedClient;
use format::MessageFormatter;
use orchestrator::PickHandler;
use ratelimiter::AdaptiveRateLimiter;
use telegram::{HttpTelegramSender, TelegramGateway};
use validation::ValidationChain;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    info!("starting surebet-retador");

    let bookmakers = Arc::new(BookmakerConfig::default_table());

    let local_cache = Arc::new(LocalCache::new(config.cache_max_size));
    let dedupe: Arc<dyn dedupe::DedupeStore> = Arc::new(
        RedisDedupeStore::connect(&config.redis_url(), local_cache.clone())
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect to dedupe store: {e}"))?,
    );
    info!("connected to dedupe store");

    let limiter = Arc::new(AdaptiveRateLimiter::new(
        config.polling_base_interval,
        config.polling_max_interval,
    ));

    let feed_client = Arc::new(FeedClient::new(
        config.api_url.clone(),
        config.api_token.clone(),
        config.api_timeout,
        bookmakers.clone(),
        limiter.clone(),
        dedupe.clone(),
    )?);
    feed_client.recover_cursor().await;

    let chain = Arc::new(ValidationChain::default_chain(
        config.min_odds,
        config.max_odds,
        config.min_profit,
        config.max_profit,
        dedupe.clone(),
    ));
    let calculators = Arc::new(CalculatorFactory::new());
    let formatter = Arc::new(MessageFormatter::new(local_cache.clone()));

    let sender = Arc::new(HttpTelegramSender::new()?);
    let gateway = Arc::new(TelegramGateway::new(sender, config.telegram_bot_tokens.clone()));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let gateway_task = {
        let gateway = gateway.clone();
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { gateway.run(rx).await })
    };

    let cache_sweep_task = {
        let cache = local_cache.clone();
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let removed = cache.cleanup_expired().await;
                        if removed > 0 {
                            info!("local cache swept {removed} expired entries");
                        }
                    }
                    _ = rx.changed() => {
                        if *rx.borrow() {
                            return;
                        }
                    }
                }
            }
        })
    };

    let handler = Arc::new(PickHandler::new(
        bookmakers.clone(),
        chain,
        calculators,
        formatter,
        gateway.clone(),
        dedupe.clone(),
        config.concurrent_picks,
        config.min_profit,
        config.max_profit,
    ));

    let poll_task = {
        let handler = handler.clone();
        let feed_client = feed_client.clone();
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    records = feed_client.fetch() => {
                        if !records.is_empty() {
                            handler.process_batch(records).await;
                        }
                    }
                    _ = rx.changed() => {
                        if *rx.borrow() {
                            return;
                        }
                    }
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);

    for task in [poll_task, cache_sweep_task, gateway_task] {
        if let Err(e) = task.await {
            if e.is_panic() {
                error!("background task panicked during shutdown: {e}");
            } else {
                warn!("background task did not exit cleanly: {e}");
            }
        }
    }

    info!("shutdown complete");
    Ok(())
}
