//! Outbound reply pacing.
//!
//! Replies about mood changes are chatty by nature; each channel gets a
//! sliding-window limiter so a burst of inbound messages never turns into
//! a burst of outbound ones. This is separate from the profile update gate,
//! which paces the external avatar host rather than chat replies.

use crate::config::ReplyRateLimits;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use thiserror::Error;

/// Reply suppressed by the pacing window.
#[derive(Debug, Clone, Error)]
pub enum ReplyLimitError {
    #[error("reply limit exceeded; retry after {retry_after_secs}s")]
    Exceeded { retry_after_secs: u64 },
}

/// Sliding-window limiter for one channel.
#[derive(Debug, Clone)]
pub struct ReplyLimiter {
    max_replies_per_minute: u32,
    window: VecDeque<Instant>,
}

impl ReplyLimiter {
    #[must_use]
    pub fn new(max_replies_per_minute: u32) -> Self {
        Self {
            max_replies_per_minute,
            window: VecDeque::new(),
        }
    }

    /// Record a reply if the window has room.
    pub fn try_send(&mut self) -> Result<(), ReplyLimitError> {
        let now = Instant::now();
        let window_start = now - std::time::Duration::from_secs(60);

        while let Some(&first) = self.window.front() {
            if first < window_start {
                self.window.pop_front();
            } else {
                break;
            }
        }

        if self.window.len() >= self.max_replies_per_minute as usize {
            if let Some(&oldest) = self.window.front() {
                let age = now.duration_since(oldest);
                let remaining = std::time::Duration::from_secs(60).saturating_sub(age);
                return Err(ReplyLimitError::Exceeded {
                    retry_after_secs: remaining.as_secs().saturating_add(1),
                });
            }
        }

        self.window.push_back(now);
        Ok(())
    }

    /// Replies left in the current window.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.max_replies_per_minute
            .saturating_sub(self.window.len() as u32)
    }
}

/// Per-channel limiter set built from configuration.
#[derive(Debug)]
pub struct ReplyLimiters {
    limiters: HashMap<String, ReplyLimiter>,
}

impl ReplyLimiters {
    #[must_use]
    pub fn new(config: &ReplyRateLimits) -> Self {
        let mut limiters = HashMap::new();
        limiters.insert("discord".to_owned(), ReplyLimiter::new(config.discord));
        Self { limiters }
    }

    /// Record a reply on `channel`. Unknown channels are not limited.
    pub fn try_send(&mut self, channel: &str) -> Result<(), ReplyLimitError> {
        match self.limiters.get_mut(channel) {
            Some(limiter) => limiter.try_send(),
            None => Ok(()),
        }
    }

    /// Replies left for a channel, when it is limited at all.
    #[must_use]
    pub fn remaining(&self, channel: &str) -> Option<u32> {
        self.limiters.get(channel).map(ReplyLimiter::remaining)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn allows_up_to_the_limit() {
        let mut limiter = ReplyLimiter::new(3);
        for _ in 0..3 {
            assert!(limiter.try_send().is_ok());
        }
        match limiter.try_send() {
            Err(ReplyLimitError::Exceeded { retry_after_secs }) => {
                assert!(retry_after_secs > 0 && retry_after_secs <= 60);
            }
            Ok(()) => panic!("fourth reply should be limited"),
        }
    }

    #[test]
    fn remaining_decrements_per_reply() {
        let mut limiter = ReplyLimiter::new(5);
        assert_eq!(limiter.remaining(), 5);
        limiter.try_send().unwrap();
        limiter.try_send().unwrap();
        assert_eq!(limiter.remaining(), 3);
    }

    #[test]
    fn configured_channel_is_limited_and_unknown_is_not() {
        let mut limiters = ReplyLimiters::new(&ReplyRateLimits { discord: 1 });

        assert!(limiters.try_send("discord").is_ok());
        assert!(limiters.try_send("discord").is_err());
        assert_eq!(limiters.remaining("discord"), Some(0));

        assert!(limiters.try_send("carrier-pigeon").is_ok());
        assert!(limiters.remaining("carrier-pigeon").is_none());
    }
}
