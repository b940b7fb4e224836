pub mod models;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bookmakers::BookmakerConfig;
use crate::dedupe::DedupeStore;
use crate::error::CoreError;
use crate::ratelimiter::AdaptiveRateLimiter;

use models::{FeedResponse, Record};

const DEFAULT_SPORTS: &[&str] = &[
    "americanfootball",
    "badminton",
    "baseball",
    "basketball",
    "counterstrike",
    "cricket",
    "darts",
    "e_football",
    "football",
    "futsal",
    "handball",
    "hockey",
    "leagueoflegends",
    "rugby",
    "snooker",
    "tabletennis",
    "tennis",
    "valorant",
    "volleyball",
    "waterpolo",
];

const MAX_TRANSPORT_RETRIES: u32 = 3;

/// Recycle the session after an hour even if it's been error-free.
const SESSION_MAX_AGE: Duration = Duration::from_secs(3600);
/// Recycle the session after this many transport errors, whichever comes first.
const MAX_ERRORS_PER_SESSION: u32 = 10;

struct Session {
    client: reqwest::Client,
    created_at: Instant,
    error_count: u32,
}

pub struct FeedClient {
    session: Mutex<Session>,
    api_url: String,
    api_token: String,
    timeout_secs: u64,
    bookmakers: Arc<BookmakerConfig>,
    limiter: Arc<AdaptiveRateLimiter>,
    dedupe: Arc<dyn DedupeStore>,
    cursor: Mutex<Option<String>>,
}

impl FeedClient {
    pub fn new(
        api_url: String,
        api_token: String,
        timeout_secs: u64,
        bookmakers: Arc<BookmakerConfig>,
        limiter: Arc<AdaptiveRateLimiter>,
        dedupe: Arc<dyn DedupeStore>,
    ) -> anyhow::Result<Self> {
        let client = Self::build_client(timeout_secs)?;
        Ok(FeedClient {
            session: Mutex::new(Session {
                client,
                created_at: Instant::now(),
                error_count: 0,
            }),
            api_url,
            api_token,
            timeout_secs,
            bookmakers,
            limiter,
            dedupe,
            cursor: Mutex::new(None),
        })
    }

    fn build_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build feed HTTP client: {e}"))
    }

    /// Restores the cursor persisted in the dedupe store, if any, so polling
    /// resumes where a previous process left off.
    pub async fn recover_cursor(&self) {
        let recovered = self.dedupe.get_cursor().await;
        if recovered.is_some() {
            info!("recovered feed cursor from dedupe store");
        }
        *self.cursor.lock().await = recovered;
    }

    /// Waits out the rate limiter, then fetches the next batch of records.
    /// Never returns a fatal error: transport/rate-limit failures are
    /// logged and an empty batch is returned instead.
    pub async fn fetch(&self) -> Vec<Record> {
        self.limiter.acquire().await;

        let cursor = self.cursor.lock().await.clone();
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(cursor.as_deref()).await {
                Ok(records) => {
                    self.limiter.on_success();
                    if let Some(last) = records.last() {
                        let new_cursor = format!("created_at_desc:{}", last.id);
                        *self.cursor.lock().await = Some(new_cursor.clone());
                        self.dedupe.set_cursor(&new_cursor).await;
                    }
                    return records;
                }
                Err(CoreError::FeedRateLimited { retry_after }) => {
                    self.limiter.on_rate_limit();
                    if let Some(secs) = retry_after {
                        tokio::time::sleep(Duration::from_secs(secs)).await;
                    }
                    return Vec::new();
                }
                Err(CoreError::FeedTransport(e)) => {
                    self.note_transport_error().await;
                    attempt += 1;
                    if attempt > MAX_TRANSPORT_RETRIES {
                        warn!("feed request failed after {attempt} attempts: {e}");
                        return Vec::new();
                    }
                    let backoff = Duration::from_secs_f64(0.5 * 2f64.powi(attempt as i32 - 1));
                    debug!("feed transport error (attempt {attempt}): {e}, retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                }
                Err(other) => {
                    warn!("unexpected feed error: {other}");
                    return Vec::new();
                }
            }
        }
    }

    /// Rebuilds the HTTP session once it's aged past `SESSION_MAX_AGE` or
    /// accumulated `MAX_ERRORS_PER_SESSION` transport errors, whichever
    /// comes first. Checked before every request.
    async fn recycle_session_if_needed(&self) {
        let mut session = self.session.lock().await;
        let stale = session.created_at.elapsed() >= SESSION_MAX_AGE
            || session.error_count >= MAX_ERRORS_PER_SESSION;
        if !stale {
            return;
        }
        match Self::build_client(self.timeout_secs) {
            Ok(client) => {
                info!(
                    age_secs = session.created_at.elapsed().as_secs(),
                    errors = session.error_count,
                    "recycling feed HTTP session"
                );
                session.client = client;
                session.created_at = Instant::now();
                session.error_count = 0;
            }
            Err(e) => warn!("failed to recycle feed HTTP session, keeping existing one: {e}"),
        }
    }

    async fn note_transport_error(&self) {
        self.session.lock().await.error_count += 1;
    }

    async fn fetch_once(&self, cursor: Option<&str>) -> Result<Vec<Record>, CoreError> {
        self.recycle_session_if_needed().await;
        let client = self.session.lock().await.client.clone();

        let sports = DEFAULT_SPORTS.join("|");
        let mut req = client
            .get(format!("{}/surebets", self.api_url))
            .bearer_auth(&self.api_token)
            .query(&[
                ("product", "surebets"),
                ("order", "created_at_desc"),
                ("limit", "5000"),
                ("min-profit", "-1"),
                ("outcomes", "2"),
                ("hide-different-rules", "true"),
                ("start-age", "PT10M"),
                ("odds-format", "eu"),
                ("source", &self.bookmakers.source_param()),
                ("sport", &sports),
            ]);
        if let Some(cursor) = cursor {
            req = req.query(&[("cursor", cursor)]);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| CoreError::FeedTransport(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(CoreError::FeedRateLimited { retry_after });
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CoreError::FeedTransport(format!("{status}: {body}")));
        }

        let parsed: FeedResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::FeedTransport(format!("invalid JSON body: {e}")))?;
        Ok(parsed.records)
    }
}
