//! Rate-limited gateway over the shared authenticated session.
//!
//! Every outbound call in the crate goes through here. The gateway enforces
//! the site's external quota contract (6 reads / 20 s, 3 cancels / 20 s) by
//! blocking the calling task until the window admits it: rate limiting
//! never fails a call. It also serializes access to the session, which is
//! shared, mutable, and not safe for uncoordinated concurrent use.

use crate::error::Result;
use crate::session::Transport;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Endpoint classes with independent quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    /// Quote, portfolio, open-order, and option-lookup reads, plus trade
    /// submission.
    Read,
    /// Order cancellation.
    Cancel,
}

/// The site's documented quota contract. Not configurable by end users in
/// normal operation, but injectable so tests can shrink the window.
#[derive(Debug, Clone)]
pub struct RateLimits {
    /// Calls admitted per window for read endpoints.
    pub read_calls: NonZeroU32,
    /// Calls admitted per window for cancellation.
    pub cancel_calls: NonZeroU32,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            read_calls: nonzero!(6u32),
            cancel_calls: nonzero!(3u32),
            window: Duration::from_secs(20),
        }
    }
}

impl RateLimits {
    /// Sets a custom window (test use).
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Builds the burst-within-window quota for a class.
    #[must_use]
    pub fn quota(&self, class: EndpointClass) -> Quota {
        let calls = match class {
            EndpointClass::Read => self.read_calls,
            EndpointClass::Cancel => self.cancel_calls,
        };
        // Replenish one cell per window/calls so a full burst spans the
        // window; with_period only fails on a zero duration.
        Quota::with_period(self.window / calls.get())
            .unwrap_or_else(|| Quota::per_second(calls))
            .allow_burst(calls)
    }
}

/// Rate-limited, serialized access to the authenticated session.
pub struct RateLimitedGateway {
    transport: Arc<dyn Transport>,
    session_lock: Mutex<()>,
    read_limiter: DirectLimiter,
    cancel_limiter: DirectLimiter,
    max_retries: u32,
}

impl std::fmt::Debug for RateLimitedGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedGateway")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl RateLimitedGateway {
    /// Creates a gateway over the single shared transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, limits: &RateLimits) -> Self {
        Self {
            transport,
            session_lock: Mutex::new(()),
            read_limiter: RateLimiter::direct(limits.quota(EndpointClass::Read)),
            cancel_limiter: RateLimiter::direct(limits.quota(EndpointClass::Cancel)),
            max_retries: 2,
        }
    }

    /// Sets the bounded retry count for transient transport errors.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn admit(&self, class: EndpointClass) {
        match class {
            EndpointClass::Read => self.read_limiter.until_ready().await,
            EndpointClass::Cancel => self.cancel_limiter.until_ready().await,
        }
    }

    /// Issues a rate-limited GET.
    ///
    /// # Errors
    /// Propagates transport errors after bounded retries; never fails due
    /// to rate limiting itself.
    pub async fn get(&self, class: EndpointClass, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            self.admit(class).await;
            let result = {
                let _session = self.session_lock.lock().await;
                self.transport.get(url).await
            };
            match result {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = e.retry_delay_secs().unwrap_or(1);
                    tracing::warn!(url, attempt, error = %e, "transient error, retrying");
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Issues a rate-limited form POST.
    ///
    /// POSTs are never retried: a timed-out submission may have landed.
    ///
    /// # Errors
    /// Propagates transport errors unchanged.
    pub async fn post_form(
        &self,
        class: EndpointClass,
        url: &str,
        form: &[(String, String)],
    ) -> Result<String> {
        self.admit(class).await;
        let _session = self.session_lock.lock().await;
        self.transport.post_form(url, form).await
    }
}
