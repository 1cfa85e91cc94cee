//! Retry policy for rate-limited requests.
//!
//! Everything here is pure: the caller owns the attempt state and the clock.
//! Delays follow `max(1s, hint ?? base * 2^retry_count)`, so server guidance
//! always wins over the computed backoff when present.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;
use uuid::Uuid;

/// Non-standard header carrying the epoch second at which the limit resets.
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Backoff and retry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay, doubled on every retry.
    pub base_delay: Duration,
    /// Floor applied to every delay, including server hints.
    pub min_delay: Duration,
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then re-issue the request.
    Retry {
        /// How long to wait before re-issuing.
        delay: Duration,
    },
    /// Surface the error to the caller.
    GiveUp(GiveUpReason),
}

/// Why a retry was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// The attempt already used every permitted retry.
    Exhausted,
    /// A retry for this call is already pending.
    AlreadyRetrying,
}

impl RetryPolicy {
    /// Default maximum retries.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// Default base delay.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
    /// Floor applied to every delay.
    pub const MIN_DELAY: Duration = Duration::from_millis(1000);

    /// Create a policy with the standard 1 second delay floor.
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            min_delay: Self::MIN_DELAY,
        }
    }

    /// Exponential backoff for a retry count, before the floor is applied.
    #[must_use]
    pub fn backoff(&self, retry_count: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(retry_count))
    }

    /// Delay before the next retry, preferring the server's hint.
    #[must_use]
    pub fn delay(&self, retry_count: u32, hint: Option<RateLimitHint>) -> Duration {
        hint.map_or_else(|| self.backoff(retry_count), |h| h.retry_after)
            .max(self.min_delay)
    }

    /// Decide whether a failed attempt should be retried.
    #[must_use]
    pub fn decide(&self, attempt: &RequestAttempt, hint: Option<RateLimitHint>) -> RetryDecision {
        if attempt.retrying {
            return RetryDecision::GiveUp(GiveUpReason::AlreadyRetrying);
        }
        if attempt.retry_count >= self.max_retries {
            return RetryDecision::GiveUp(GiveUpReason::Exhausted);
        }
        RetryDecision::Retry {
            delay: self.delay(attempt.retry_count, hint),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_BASE_DELAY)
    }
}

// =============================================================================
// RequestAttempt
// =============================================================================

/// One logical call's retry state.
///
/// Values are immutable: each transition returns a fresh attempt, so two
/// calls built from the same request can never share retry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestAttempt {
    /// Identifies the logical call across its retries (for tracing).
    pub id: Uuid,
    /// Retries issued so far.
    pub retry_count: u32,
    /// A retry has been scheduled and not yet dispatched.
    pub retrying: bool,
}

impl RequestAttempt {
    /// The initial attempt of a new logical call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            retry_count: 0,
            retrying: false,
        }
    }

    /// The attempt after a retry has been scheduled (waiting out its delay).
    #[must_use]
    pub const fn schedule_retry(self) -> Self {
        Self {
            id: self.id,
            retry_count: self.retry_count + 1,
            retrying: true,
        }
    }

    /// The attempt once the scheduled retry has been dispatched.
    #[must_use]
    pub const fn dispatched(self) -> Self {
        Self {
            id: self.id,
            retry_count: self.retry_count,
            retrying: false,
        }
    }

    /// Whether this is the initiating attempt of the call.
    #[must_use]
    pub const fn is_initial(&self) -> bool {
        self.retry_count == 0
    }
}

impl Default for RequestAttempt {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RateLimitHint
// =============================================================================

/// Server guidance on how long to wait before retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHint {
    /// Suggested wait, never below one second.
    pub retry_after: Duration,
}

impl RateLimitHint {
    /// Build a hint, applying the one second floor.
    #[must_use]
    pub fn new(retry_after: Duration) -> Self {
        Self {
            retry_after: retry_after.max(RetryPolicy::MIN_DELAY),
        }
    }

    /// Extract a hint from a rate-limited response.
    ///
    /// Sources, in priority order:
    /// 1. `Retry-After` as delta-seconds or an HTTP date
    /// 2. `X-RateLimit-Reset` as an epoch second, minus `now`
    /// 3. A `retryAfter` field (seconds) in the JSON error body
    #[must_use]
    pub fn from_response(headers: &HeaderMap, body: Option<&Value>, now: DateTime<Utc>) -> Option<Self> {
        header_str(headers, RETRY_AFTER.as_str())
            .and_then(|v| parse_retry_after(v, now))
            .or_else(|| header_str(headers, RATE_LIMIT_RESET).and_then(|v| parse_reset(v, now)))
            .or_else(|| body.and_then(parse_body_hint))
            .map(Self::new)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Parse `Retry-After`: delta-seconds, or an RFC 2822 (HTTP) date.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(delay) = parse_seconds(value) {
        return Some(delay);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(until(at.with_timezone(&Utc), now))
}

/// Parse `X-RateLimit-Reset` as an epoch second.
fn parse_reset(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let epoch = value.parse::<i64>().ok()?;
    let at = DateTime::from_timestamp(epoch, 0)?;
    Some(until(at, now))
}

/// Body hint: `{"retryAfter": 3}` or `{"retryAfter": "3"}`.
fn parse_body_hint(body: &Value) -> Option<Duration> {
    match body.get("retryAfter")? {
        Value::Number(n) => n.as_f64().and_then(seconds_to_duration),
        Value::String(s) => parse_seconds(s),
        _ => None,
    }
}

fn parse_seconds(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok().and_then(seconds_to_duration)
}

fn seconds_to_duration(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Time from `now` until `at`, zero if already past.
fn until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}
