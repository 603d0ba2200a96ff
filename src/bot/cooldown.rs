//! Denial-reply flood protection
//!
//! Cache-based cooldown so users refused an admin command receive the
//! denial reply only once per cooldown period. Repeated attempts are still
//! counted and logged (with throttling) without flooding Telegram.

use crate::config::{DENIAL_CACHE_MAX, DENIAL_COOLDOWN_SECS};
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tracks the last denial reply per user with automatic TTL cleanup
#[derive(Clone)]
pub struct DenialCache {
    cache: Cache<i64, ()>,
    silenced_count: Arc<AtomicU64>,
}

impl DenialCache {
    #[must_use]
    pub fn new() -> Self {
        // Entry expiry is the cooldown: once an entry lapses, the next
        // refused attempt gets a fresh denial reply.
        let cache = Cache::builder()
            .max_capacity(DENIAL_CACHE_MAX)
            .time_to_live(Duration::from_secs(DENIAL_COOLDOWN_SECS))
            .build();

        Self {
            cache,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a denial reply should be sent to this user now.
    ///
    /// Returns `true` on the first attempt or once the cooldown has passed;
    /// `false` while the user is still in cooldown.
    pub async fn should_send(&self, user_id: i64, user_name: &str) -> bool {
        if self.cache.get(&user_id).await.is_none() {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        // Log only every 100th silenced attempt to prevent log flooding
        if count % 100 == 0 {
            debug!(
                "⛔️ Silenced {} refused attempts (recent: user {} - {})",
                count, user_id, user_name
            );
        }

        false
    }

    /// Start the cooldown after a denial reply was delivered
    pub async fn mark_sent(&self, user_id: i64) {
        self.cache.insert(user_id, ()).await;
    }

    /// Total number of silenced attempts, for the stats surfaces
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }
}

impl Default for DenialCache {
    fn default() -> Self {
        Self::new()
    }
}
