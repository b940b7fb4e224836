//! Priority-queued, multi-bot Telegram sender.
//!
//! A single background consumer task pops the highest-profit envelope from
//! a bounded max-heap, round-robins across configured bot tokens, and
//! applies a retry/backoff/rotation policy per message. A global sliding
//! window caps aggregate throughput across all bots.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, warn};

use crate::error::CoreError;

const DEFAULT_CAPACITY: usize = 1000;
const TOKEN_BUCKET_MAX: usize = 30;
const TOKEN_BUCKET_WINDOW: Duration = Duration::from_secs(1);

#[async_trait]
pub trait TelegramSender: Send + Sync {
    async fn send_message(
        &self,
        bot_token: &str,
        chat_id: i64,
        html: &str,
    ) -> Result<(), CoreError>;
}

/// Real sender hitting the Telegram bot HTTP API.
pub struct HttpTelegramSender {
    http: reqwest::Client,
}

impl HttpTelegramSender {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build telegram HTTP client: {e}"))?;
        Ok(HttpTelegramSender { http })
    }
}

#[async_trait]
impl TelegramSender for HttpTelegramSender {
    async fn send_message(
        &self,
        bot_token: &str,
        chat_id: i64,
        html: &str,
    ) -> Result<(), CoreError> {
        let url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": html,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
                "disable_notification": true,
            }))
            .send()
            .await
            .map_err(|e| CoreError::TelegramTransport(e.to_string()))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CoreError::TelegramTransport(format!("invalid JSON body: {e}")))?;

        if body.get("ok").and_then(|v| v.as_bool()) == Some(true) {
            return Ok(());
        }

        let description = body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
            .to_string();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(1);
            return Err(CoreError::TelegramRateLimited(retry_after));
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(CoreError::TelegramForbidden);
        }
        if status == reqwest::StatusCode::BAD_REQUEST {
            return Err(CoreError::TelegramBadRequest(description));
        }
        Err(CoreError::TelegramTransport(format!("{status}: {description}")))
    }
}

struct Envelope {
    profit: f64,
    seq: u64,
    channel_id: i64,
    message: String,
    result_tx: Option<oneshot::Sender<bool>>,
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.profit == other.profit && self.seq == other.seq
    }
}
impl Eq for Envelope {}

impl PartialOrd for Envelope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Envelope {
    /// Higher profit sorts greater (delivered first by a max-heap). Ties
    /// favor the earlier-enqueued message (smaller `seq` sorts greater), so
    /// a brand-new candidate at an exactly tied priority is never "greater"
    /// than what's already queued — matching the ties-rejected rule.
    fn cmp(&self, other: &Self) -> Ordering {
        match self.profit.total_cmp(&other.profit) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

struct GatewayState {
    heap: BinaryHeap<Envelope>,
    next_seq: u64,
    bot_index: usize,
    sliding_window: VecDeque<Instant>,
}

pub struct TelegramGateway {
    sender: Arc<dyn TelegramSender>,
    bot_tokens: Vec<String>,
    capacity: usize,
    max_wait: Duration,
    max_retries: u32,
    state: Mutex<GatewayState>,
    notify: Notify,
}

impl TelegramGateway {
    pub fn new(sender: Arc<dyn TelegramSender>, bot_tokens: Vec<String>) -> Self {
        TelegramGateway {
            sender,
            bot_tokens,
            capacity: DEFAULT_CAPACITY,
            max_wait: Duration::from_secs(30),
            max_retries: 3,
            state: Mutex::new(GatewayState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                bot_index: 0,
                sliding_window: VecDeque::new(),
            }),
            notify: Notify::new(),
        }
    }

    /// Enqueues a message and returns a receiver that resolves to whether
    /// the send ultimately succeeded. `None` means the queue was at
    /// capacity and this candidate did not outrank the current worst entry.
    pub async fn enqueue(
        &self,
        channel_id: i64,
        profit: f64,
        message: String,
    ) -> Option<oneshot::Receiver<bool>> {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        let candidate = Envelope {
            profit,
            seq,
            channel_id,
            message,
            result_tx: Some(tx),
        };

        if state.heap.len() < self.capacity {
            state.heap.push(candidate);
            drop(state);
            self.notify.notify_one();
            return Some(rx);
        }

        let worst_seq = state.heap.iter().min().map(|e| e.seq);
        let worst_is_weaker = state
            .heap
            .iter()
            .min()
            .map(|worst| candidate > *worst)
            .unwrap_or(false);

        if worst_is_weaker {
            if let Some(worst_seq) = worst_seq {
                let mut items: Vec<Envelope> = state.heap.drain().collect();
                if let Some(pos) = items.iter().position(|e| e.seq == worst_seq) {
                    let evicted = items.remove(pos);
                    if let Some(tx) = evicted.result_tx {
                        let _ = tx.send(false);
                    }
                }
                items.push(candidate);
                state.heap = items.into_iter().collect();
            }
            drop(state);
            self.notify.notify_one();
            Some(rx)
        } else {
            None
        }
    }

    /// Runs the consumer loop until `shutdown` resolves. Spawn this as a
    /// single background task; it never returns on its own otherwise.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            let envelope = loop {
                {
                    let mut state = self.state.lock().await;
                    if let Some(e) = state.heap.pop() {
                        break e;
                    }
                }
                tokio::select! {
                    _ = self.notify.notified() => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            };

            let ok = self.deliver(&envelope).await;
            if let Some(tx) = envelope.result_tx {
                let _ = tx.send(ok);
            }

            if *shutdown.borrow() {
                return;
            }
        }
    }

    async fn deliver(&self, envelope: &Envelope) -> bool {
        let deadline = Instant::now() + self.max_wait;
        let mut tried: HashSet<usize> = HashSet::new();
        let mut transport_attempts = 0u32;

        loop {
            if Instant::now() >= deadline {
                warn!("telegram delivery exceeded max_wait, dropping message");
                return false;
            }
            let bot_idx = match self.next_untried_bot(&tried).await {
                Some(idx) => idx,
                None => {
                    warn!("all bots attempted for this message, dropping");
                    return false;
                }
            };
            tried.insert(bot_idx);

            self.wait_for_token().await;

            let result = self
                .sender
                .send_message(&self.bot_tokens[bot_idx], envelope.channel_id, &envelope.message)
                .await;

            match result {
                Ok(()) => return true,
                Err(CoreError::TelegramRateLimited(secs)) => {
                    let wait = Duration::from_secs(secs).min(self.max_wait);
                    if Duration::from_secs(secs) > self.max_wait {
                        warn!("retry-after {secs}s clamped to max_wait {:?}", self.max_wait);
                    }
                    tokio::time::sleep(wait).await;
                }
                Err(CoreError::TelegramForbidden) => {
                    debug!("bot {bot_idx} forbidden on this chat, rotating");
                }
                Err(CoreError::TelegramBadRequest(reason)) => {
                    warn!("telegram rejected message, dropping: {reason}");
                    return false;
                }
                Err(CoreError::TelegramTransport(e)) => {
                    transport_attempts += 1;
                    if transport_attempts > self.max_retries {
                        warn!("telegram transport failed after {transport_attempts} attempts: {e}");
                        return false;
                    }
                    let backoff = Duration::from_secs_f64(0.5 * 2f64.powi(transport_attempts as i32 - 1));
                    tokio::time::sleep(backoff).await;
                }
                Err(other) => {
                    warn!("unexpected telegram error, dropping message: {other}");
                    return false;
                }
            }
        }
    }

    async fn next_untried_bot(&self, tried: &HashSet<usize>) -> Option<usize> {
        if tried.len() >= self.bot_tokens.len() {
            return None;
        }
        let mut state = self.state.lock().await;
        for _ in 0..self.bot_tokens.len() {
            let idx = state.bot_index;
            state.bot_index = (state.bot_index + 1) % self.bot_tokens.len();
            if !tried.contains(&idx) {
                return Some(idx);
            }
        }
        None
    }

    async fn wait_for_token(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                while let Some(front) = state.sliding_window.front() {
                    if now.duration_since(*front) >= TOKEN_BUCKET_WINDOW {
                        state.sliding_window.pop_front();
                    } else {
                        break;
                    }
                }
                if state.sliding_window.len() < TOKEN_BUCKET_MAX {
                    state.sliding_window.push_back(now);
                    None
                } else {
                    let oldest = *state.sliding_window.front().unwrap();
                    Some(TOKEN_BUCKET_WINDOW - now.duration_since(oldest))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}
