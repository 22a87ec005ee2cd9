//! Client configuration, site routes, and the top-level facade.

use crate::document::MarkupParser;
use crate::error::{Result, SimError};
use crate::executor::{ExecutorConfig, TradeExecutor, TradeQueue};
use crate::gateway::{RateLimitedGateway, RateLimits};
use crate::portfolio::{build_portfolio, Portfolio};
use crate::quote::{OptionChainLookup, Quote, QuoteService};
use crate::session::{Credentials, Transport, WebSession};
use crate::trade::Trade;
use std::sync::Arc;

// =============================================================================
// Routes
// =============================================================================

/// URL layout of the simulator site.
///
/// Paths are fixed relative to one configurable base; the option-quote
/// service lives on its own absolute URL and is overridable separately.
#[derive(Debug, Clone)]
pub struct Routes {
    base: String,
    option_quote: String,
}

impl Routes {
    /// Routes rooted at a base URL.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        let option_quote = format!("{base}/simulator/options/GetQuotes");
        Self { base, option_quote }
    }

    /// Overrides the option-quote service URL.
    #[must_use]
    pub fn with_option_quote(mut self, url: impl Into<String>) -> Self {
        self.option_quote = url.into();
        self
    }

    /// Login form endpoint.
    #[must_use]
    pub fn login(&self) -> String {
        format!("{}/accounts/login.aspx", self.base)
    }

    /// Portfolio summary and position table page.
    #[must_use]
    pub fn portfolio(&self) -> String {
        format!("{}/simulator/portfolio/", self.base)
    }

    /// Open-orders page.
    #[must_use]
    pub fn open_orders(&self) -> String {
        format!("{}/simulator/trade/showopentrades.aspx", self.base)
    }

    /// Equity quote lookup page.
    #[must_use]
    pub fn stock_lookup(&self) -> String {
        format!("{}/simulator/stocks/symbol.aspx", self.base)
    }

    /// Option-chain page; the quote-service token is scraped from it.
    #[must_use]
    pub fn option_lookup(&self) -> String {
        format!("{}/simulator/trade/tradeoptions.aspx", self.base)
    }

    /// Equity trade submission endpoint.
    #[must_use]
    pub fn stock_trade(&self) -> String {
        format!("{}/simulator/trade/tradestock.aspx", self.base)
    }

    /// Option trade submission endpoint.
    #[must_use]
    pub fn option_trade(&self) -> String {
        format!("{}/simulator/trade/tradeoptions.aspx", self.base)
    }

    /// Option-quote service URL.
    #[must_use]
    pub fn option_quote(&self) -> String {
        self.option_quote.clone()
    }

    /// Resolves a scraped cancel link against the site.
    #[must_use]
    pub fn cancel(&self, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            link.to_string()
        } else if link.starts_with('/') {
            format!("{}{link}", self.base)
        } else {
            format!("{}/simulator/trade/{link}", self.base)
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Everything tunable about the client.
#[derive(Debug, Clone)]
pub struct SimClientConfig {
    /// Site base URL.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Endpoint-class rate budgets.
    pub rate_limits: RateLimits,
    /// How many strikes either side of the money to keep per expiration.
    pub strike_price_proximity: usize,
    /// Submission-side limits and confirmation settings.
    pub executor: ExecutorConfig,
}

impl Default for SimClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.investopedia.com".to_string(),
            timeout_secs: 30,
            rate_limits: RateLimits::default(),
            strike_price_proximity: 3,
            executor: ExecutorConfig::default(),
        }
    }
}

impl SimClientConfig {
    /// Sets the site base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the rate budgets.
    #[must_use]
    pub fn with_rate_limits(mut self, rate_limits: RateLimits) -> Self {
        self.rate_limits = rate_limits;
        self
    }

    /// Sets the strike-window half-width.
    #[must_use]
    pub fn with_strike_price_proximity(mut self, proximity: usize) -> Self {
        self.strike_price_proximity = proximity;
        self
    }

    /// Sets the executor configuration.
    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }
}

// =============================================================================
// Client
// =============================================================================

/// Authenticated facade over the whole client: quotes, portfolio
/// snapshots, and trade submission behind one shared gateway.
pub struct SimClient {
    gateway: Arc<RateLimitedGateway>,
    parser: Arc<dyn MarkupParser>,
    routes: Routes,
    quotes: Arc<QuoteService>,
    executor: Arc<TradeExecutor>,
}

impl std::fmt::Debug for SimClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimClient")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl SimClient {
    /// Logs in over an arbitrary transport and assembles the client.
    ///
    /// # Errors
    /// [`SimError::AuthenticationFailed`] when the login submission is
    /// rejected; transport errors otherwise.
    pub async fn connect(
        config: SimClientConfig,
        transport: Arc<dyn Transport>,
        parser: Arc<dyn MarkupParser>,
        credentials: &Credentials,
    ) -> Result<Self> {
        let routes = Routes::new(&config.base_url);
        let form = vec![
            ("username".to_string(), credentials.username.clone()),
            ("password".to_string(), credentials.password().to_string()),
        ];
        transport
            .post_form(&routes.login(), &form)
            .await
            .map_err(|e| match e {
                SimError::Api { status, message } if status < 500 => {
                    SimError::AuthenticationFailed(format!("login rejected: {status} {message}"))
                }
                other => other,
            })?;
        tracing::info!(username = %credentials.username, "logged in");
        Ok(Self::assemble(config, transport, parser))
    }

    /// Logs in over a fresh cookie-holding web session.
    ///
    /// # Errors
    /// As [`Self::connect`], plus session construction failures.
    pub async fn connect_web(
        config: SimClientConfig,
        parser: Arc<dyn MarkupParser>,
        credentials: &Credentials,
    ) -> Result<Self> {
        let session = WebSession::new(config.timeout_secs)?;
        session
            .login(&Routes::new(&config.base_url).login(), credentials)
            .await?;
        Ok(Self::assemble(config, Arc::new(session), parser))
    }

    fn assemble(
        config: SimClientConfig,
        transport: Arc<dyn Transport>,
        parser: Arc<dyn MarkupParser>,
    ) -> Self {
        let routes = Routes::new(&config.base_url);
        let gateway = Arc::new(RateLimitedGateway::new(transport, &config.rate_limits));
        let quotes = Arc::new(QuoteService::new(
            Arc::clone(&gateway),
            Arc::clone(&parser),
            routes.clone(),
            config.strike_price_proximity,
        ));
        let executor = Arc::new(TradeExecutor::new(
            Arc::clone(&gateway),
            routes.clone(),
            config.executor,
        ));
        Self {
            gateway,
            parser,
            routes,
            quotes,
            executor,
        }
    }

    /// Fetches a fresh portfolio snapshot.
    ///
    /// # Errors
    /// See [`build_portfolio`].
    pub async fn portfolio(&self) -> Result<Portfolio> {
        build_portfolio(&self.gateway, &self.parser, &self.routes, &self.quotes).await
    }

    /// Fetches an equity quote. `Ok(None)` when the page has no quote for
    /// the symbol.
    ///
    /// # Errors
    /// Transport errors.
    pub async fn stock_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        self.quotes.stock_quote(symbol).await
    }

    /// Fetches the near-the-money option chains for an underlying.
    ///
    /// # Errors
    /// See [`QuoteService::option_chain`].
    pub async fn option_chain(&self, underlying: &str) -> Result<OptionChainLookup> {
        self.quotes.option_chain(underlying).await
    }

    /// Validates and submits one trade.
    ///
    /// # Errors
    /// See [`TradeExecutor::execute`].
    pub async fn execute(&self, trade: &Trade) -> Result<()> {
        self.executor.execute(trade).await
    }

    /// The shared trade executor.
    #[must_use]
    pub fn executor(&self) -> Arc<TradeExecutor> {
        Arc::clone(&self.executor)
    }

    /// Spawns a trade queue with `workers` submission workers.
    #[must_use]
    pub fn trade_queue(&self, workers: usize) -> TradeQueue {
        TradeQueue::new(self.executor(), workers)
    }
}
