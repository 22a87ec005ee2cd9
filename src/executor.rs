//! Trade submission.
//!
//! Submission is strictly gated: a trade must pass validation and the
//! per-trade share ceiling before any network traffic, and a submission
//! whose response lacks the confirmation indicator is reported as
//! unconfirmed rather than assumed filled. The queue serializes
//! submissions from concurrent strategies through a small worker pool.

use crate::client::Routes;
use crate::error::{Result, SimError};
use crate::gateway::{EndpointClass, RateLimitedGateway};
use crate::trade::{Instrument, Trade};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

// =============================================================================
// Configuration
// =============================================================================

/// Submission-side limits and confirmation settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Hard ceiling on shares or contracts per trade.
    pub max_shares_per_trade: u32,
    /// Substring whose presence in the response confirms acceptance.
    pub confirm_indicator: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_shares_per_trade: 1000,
            confirm_indicator: "Your order has been placed".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Sets the per-trade share ceiling.
    #[must_use]
    pub fn with_max_shares_per_trade(mut self, max: u32) -> Self {
        self.max_shares_per_trade = max;
        self
    }

    /// Sets the confirmation indicator substring.
    #[must_use]
    pub fn with_confirm_indicator(mut self, indicator: impl Into<String>) -> Self {
        self.confirm_indicator = indicator.into();
        self
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Validates and submits trades through the rate-limited gateway.
pub struct TradeExecutor {
    gateway: Arc<RateLimitedGateway>,
    routes: Routes,
    config: ExecutorConfig,
}

impl TradeExecutor {
    /// Creates an executor over a shared gateway.
    #[must_use]
    pub fn new(gateway: Arc<RateLimitedGateway>, routes: Routes, config: ExecutorConfig) -> Self {
        Self {
            gateway,
            routes,
            config,
        }
    }

    /// Validates and submits one trade.
    ///
    /// Validation and the share-ceiling check run before any network call.
    ///
    /// # Errors
    /// - Validation errors from [`Trade::validate`].
    /// - [`SimError::TradeExceedsMaxShares`] above the configured ceiling.
    /// - [`SimError::TradeNotValidated`] when the submission response lacks
    ///   the confirmation indicator; the trade's state is then unknown.
    pub async fn execute(&self, trade: &Trade) -> Result<()> {
        trade.validate()?;
        if trade.quantity > self.config.max_shares_per_trade {
            return Err(SimError::TradeExceedsMaxShares {
                quantity: trade.quantity,
                max: self.config.max_shares_per_trade,
            });
        }

        let url = match &trade.instrument {
            Instrument::Stock { .. } => self.routes.stock_trade(),
            Instrument::Option { .. } => self.routes.option_trade(),
        };
        tracing::info!(
            symbol = %trade.instrument.symbol(),
            trade_type = ?trade.trade_type,
            quantity = trade.quantity,
            "submitting trade"
        );

        let body = self
            .gateway
            .post_form(EndpointClass::Read, &url, &trade.to_form())
            .await?;

        if !body.contains(&self.config.confirm_indicator) {
            tracing::error!(symbol = %trade.instrument.symbol(), "no confirmation indicator in response");
            return Err(SimError::TradeNotValidated);
        }
        tracing::info!(symbol = %trade.instrument.symbol(), "trade confirmed");
        Ok(())
    }
}

// =============================================================================
// Queue
// =============================================================================

type QueuedTrade = (Trade, oneshot::Sender<Result<()>>);

/// A worker-pool front for the executor.
///
/// Trades are taken in submission order; each worker drains the shared
/// queue and reports the outcome through the handle returned at enqueue
/// time.
pub struct TradeQueue {
    sender: mpsc::UnboundedSender<QueuedTrade>,
}

impl TradeQueue {
    /// Spawns `workers` submission workers over a shared executor.
    #[must_use]
    pub fn new(executor: Arc<TradeExecutor>, workers: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<QueuedTrade>();
        let receiver = Arc::new(Mutex::new(receiver));
        for worker in 0..workers.max(1) {
            let executor = Arc::clone(&executor);
            let receiver = Arc::clone(&receiver);
            tokio::spawn(async move {
                loop {
                    let Some((trade, done)) = receiver.lock().await.recv().await else {
                        tracing::debug!(worker, "trade queue closed, worker exiting");
                        break;
                    };
                    let result = executor.execute(&trade).await;
                    // The submitter may have dropped its handle.
                    let _ = done.send(result);
                }
            });
        }
        Self { sender }
    }

    /// Enqueues a trade and returns a handle resolving to its outcome.
    ///
    /// # Errors
    /// [`SimError::Network`] when the worker pool has shut down.
    pub fn submit(&self, trade: Trade) -> Result<oneshot::Receiver<Result<()>>> {
        let (done, outcome) = oneshot::channel();
        self.sender
            .send((trade, done))
            .map_err(|_| SimError::Network("trade queue has shut down".to_string()))?;
        Ok(outcome)
    }
}
