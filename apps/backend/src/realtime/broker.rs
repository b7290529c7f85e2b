//! Redis pub/sub bridge for change notifications across processes.
//!
//! Every committed change is published to `game:{id}`. A background task
//! pattern-subscribes to `game:*` and fans each message out to the local
//! `ChangeHub`. The subscriber reconnects with exponential backoff and jitter
//! until the cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::random;
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::realtime::RealtimeConfig;
use crate::error::AppError;
use crate::realtime::hub::ChangeHub;
use crate::realtime::{ChangeEvent, ChangePublisher};

// Subscriber retry configuration (background task)
const INITIAL_RETRY_DELAY_SECS: u64 = 1;
const MAX_RETRY_DELAY_SECS: u64 = 60;
const RETRY_DELAY_MULTIPLIER: f64 = 2.0;
const JITTER_PERCENT: f64 = 0.2;

// Publisher retry configuration (commit path)
const PUBLISHER_MAX_ATTEMPTS: u32 = 3;
const PUBLISHER_INITIAL_RETRY_DELAY_MS: u64 = 50;
const PUBLISHER_MAX_RETRY_DELAY_MS: u64 = 200;

pub struct RealtimeBroker {
    hub: ChangeHub,
    publisher: Mutex<ConnectionManager>,
    shutdown: CancellationToken,
}

impl RealtimeBroker {
    pub async fn connect(config: &RealtimeConfig, hub: ChangeHub) -> Result<Arc<Self>, AppError> {
        let client = Client::open(config.redis_url.as_str())
            .map_err(|err| AppError::config(format!("Invalid REDIS_URL: {err}")))?;

        let manager = ConnectionManager::new(client.clone())
            .await
            .map_err(|err| {
                AppError::store_unavailable(format!(
                    "Unable to initialize Redis connection manager: {err}"
                ))
            })?;

        let shutdown = CancellationToken::new();
        let broker = Arc::new(Self {
            hub: hub.clone(),
            publisher: Mutex::new(manager),
            shutdown: shutdown.clone(),
        });

        spawn_subscriber(client, hub, shutdown);

        Ok(broker)
    }

    pub fn hub(&self) -> ChangeHub {
        self.hub.clone()
    }

    /// Stop the background subscriber.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn publish_to_channel(&self, channel: String, encoded: String) -> Result<(), AppError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let publish_res = {
                let mut publisher = self.publisher.lock().await;
                publisher
                    .publish::<_, _, ()>(channel.clone(), encoded.clone())
                    .await
            };

            match publish_res {
                Ok(()) => return Ok(()),
                Err(err) => {
                    let app_err = AppError::store_unavailable(format!(
                        "Failed to publish change to Redis: {err}"
                    ));

                    if attempt >= PUBLISHER_MAX_ATTEMPTS || !is_transient_error(&app_err) {
                        return Err(app_err);
                    }

                    let delay_ms = publisher_retry_delay_ms(attempt);
                    warn!(
                        error = %app_err,
                        attempt,
                        retry_delay_ms = delay_ms,
                        "Redis publish failed, retrying"
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

impl Drop for RealtimeBroker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl ChangePublisher for RealtimeBroker {
    async fn publish(&self, event: ChangeEvent) -> Result<(), AppError> {
        let encoded = serde_json::to_string(&event)
            .map_err(|err| AppError::internal(format!("Failed to serialize change event: {err}")))?;
        self.publish_to_channel(game_channel(event.game_id), encoded)
            .await
    }
}

fn game_channel(game_id: i64) -> String {
    format!("game:{game_id}")
}

fn parse_game_channel(channel: &str) -> Option<i64> {
    let mut parts = channel.split(':');
    let prefix = parts.next()?;
    if prefix != "game" {
        return None;
    }
    let id = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    id.parse().ok()
}

fn publisher_retry_delay_ms(attempt: u32) -> u64 {
    PUBLISHER_INITIAL_RETRY_DELAY_MS
        .saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)))
        .min(PUBLISHER_MAX_RETRY_DELAY_MS)
}

fn is_transient_error(err: &AppError) -> bool {
    if let AppError::Config { .. } = err {
        return false;
    }

    let error_msg = err.to_string().to_lowercase();

    if error_msg.contains("authentication failed")
        || error_msg.contains("invalid redis_url")
        || error_msg.contains("unsupported")
        || error_msg.contains("non-tcp protocol")
    {
        return false;
    }

    true
}

fn calculate_retry_delay(attempt: u32) -> Duration {
    let base_delay =
        INITIAL_RETRY_DELAY_SECS as f64 * RETRY_DELAY_MULTIPLIER.powi(attempt as i32 - 1);
    let capped_delay = base_delay.min(MAX_RETRY_DELAY_SECS as f64);

    let jitter_range = capped_delay * JITTER_PERCENT;
    let jitter = (random::<f64>() * 2.0 - 1.0) * jitter_range;
    let final_delay = (capped_delay + jitter).max(0.1);

    Duration::from_secs_f64(final_delay)
}

fn spawn_subscriber(client: Client, hub: ChangeHub, shutdown: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => info!("Redis subscriber cancelled"),
            _ = run_subscription_loop_with_retry(&client, &hub) => {}
        }
    });
}

async fn run_subscription_loop_with_retry(client: &Client, hub: &ChangeHub) {
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match run_subscription_loop(client, hub).await {
            Ok(()) => {
                info!("Redis subscription loop completed normally");
                break;
            }
            Err(err) => {
                if !is_transient_error(&err) {
                    error!(
                        error = %err,
                        attempt,
                        "Redis subscription failed with permanent error, exiting"
                    );
                    break;
                }

                let delay = calculate_retry_delay(attempt);
                warn!(
                    error = %err,
                    attempt,
                    retry_delay_secs = delay.as_secs_f64(),
                    "Redis subscription failed, retrying"
                );
                sleep(delay).await;

                if attempt >= 20 {
                    attempt = 10;
                }
            }
        }
    }
}

async fn run_subscription_loop(client: &Client, hub: &ChangeHub) -> Result<(), AppError> {
    let conn_info = client.get_connection_info();

    let addr = match conn_info.addr().clone() {
        redis::ConnectionAddr::Tcp(host, port) => (host, port),
        _ => {
            return Err(AppError::config(
                "Only TCP protocol is supported for pubsub (unsupported, non-tcp protocol)",
            ));
        }
    };

    info!(host = %addr.0, port = addr.1, "Connecting to Redis for subscription");

    let stream = tokio::net::TcpStream::connect(addr)
        .await
        .map_err(|err| {
            AppError::store_unavailable(format!(
                "Failed to connect to Redis for subscription: {err}"
            ))
        })?;

    let mut pubsub = PubSub::new(conn_info.redis_settings(), stream)
        .await
        .map_err(|err| AppError::store_unavailable(format!("Failed to create Redis pubsub: {err}")))?;

    pubsub.psubscribe("game:*").await.map_err(|err| {
        AppError::store_unavailable(format!(
            "Failed to subscribe to Redis channel pattern game:*: {err}"
        ))
    })?;

    info!("Redis subscription established, processing messages");

    let mut messages = pubsub.into_on_message();
    while let Some(msg) = messages.next().await {
        let Ok(channel) = msg.get_channel::<String>() else {
            continue;
        };
        let Ok(payload) = msg.get_payload::<String>() else {
            continue;
        };

        match serde_json::from_str::<ChangeEvent>(&payload) {
            Ok(event) => {
                if parse_game_channel(&channel) != Some(event.game_id) {
                    warn!(
                        channel = %channel,
                        game_id = event.game_id,
                        "Change event received on mismatched channel"
                    );
                }
                hub.broadcast(event);
            }
            Err(err) => {
                error!(error = %err, channel = %channel, "Failed to decode Redis change payload");
            }
        }
    }

    warn!("Redis subscription stream ended, connection lost");
    Err(AppError::store_unavailable(
        "Redis subscription stream ended unexpectedly",
    ))
}
