//! 限流闸门
//!
//! 按调用方键做滑动窗口计数，注入到生成客户端中使用。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::GenerationError;

/// 限流闸门
pub struct RateLimitGate {
    max_requests: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimitGate {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// 登记一次调用；超出窗口配额时返回 `quota_exceeded`
    pub fn check(&self, key: &str) -> Result<(), GenerationError> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), GenerationError> {
        let window = self.window;
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());

        // 过期的记录和空键一并清理，键的数量不会无限增长
        hits.retain(|_, entries| {
            while entries
                .front()
                .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= window)
            {
                entries.pop_front();
            }
            !entries.is_empty()
        });

        let entries = hits.entry(key.to_string()).or_default();

        if entries.len() >= self.max_requests {
            warn!(
                "调用方 {} 在 {} 秒内已达到 {} 次上限",
                key,
                self.window.as_secs(),
                self.max_requests
            );
            return Err(GenerationError::quota_exceeded(format!(
                "limit of {} requests per {}s reached",
                self.max_requests,
                self.window.as_secs()
            )));
        }

        entries.push_back(now);
        Ok(())
    }

    /// 清空某个调用方的计数
    pub fn reset(&self, key: &str) {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        hits.remove(key);
    }
}
