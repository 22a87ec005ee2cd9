//! Screen-scraping trading client for the simulated brokerage.
//!
//! This crate provides:
//! - Cookie-holding session gateway with per-endpoint-class rate limiting
//! - Tolerant extraction over scraped portfolio, quote, and order pages
//! - Option-chain lookup with near-the-money strike windowing
//! - Open-order reconciliation against the position table
//! - Validated trade execution with a worker-pool submission queue
//!
//! # Example
//!
//! ```ignore
//! use simscrape::{Credentials, SimClient, SimClientConfig, Trade, TradeType};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> simscrape::Result<()> {
//!     let config = SimClientConfig::default();
//!     let creds = Credentials::new("trader", "hunter2");
//!     let parser: Arc<dyn simscrape::MarkupParser> = my_markup_engine();
//!
//!     let client = SimClient::connect_web(config, parser, &creds).await?;
//!
//!     let portfolio = client.portfolio().await?;
//!     println!("account value: {}", portfolio.account_value);
//!
//!     let trade = Trade::stock("AAPL", TradeType::Buy, 10);
//!     client.execute(&trade).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Markup parsing
//!
//! The crate owns selector strings and extraction policy but not the
//! markup engine: callers supply a [`MarkupParser`] implementation and
//! the client hands it page bodies to turn into [`Document`] trees.
//!
//! # Rate limiting
//!
//! All traffic flows through one gateway holding the authenticated
//! session. Reads share a budget of 6 calls per 20 seconds; order
//! cancellations are held to 3 per 20 seconds. Callers are made to wait,
//! never rejected, when a budget is exhausted.

pub mod client;
pub mod contract;
pub mod document;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod quote;
pub mod session;
pub mod trade;

// Re-export main types for convenience
pub use client::{Routes, SimClient, SimClientConfig};
pub use contract::{OptionContract, OptionRight};
pub use document::{Document, FieldSpec, MarkupParser};
pub use error::{Result, SimError};
pub use executor::{ExecutorConfig, TradeExecutor, TradeQueue};
pub use gateway::{EndpointClass, RateLimitedGateway, RateLimits};
pub use order::{CancelHandle, OpenOrder, ReconciledPrice};
pub use portfolio::Portfolio;
pub use position::{ParsedPositions, Position, PositionKind};
pub use quote::{ContractQuote, OptionChain, OptionChainLookup, PriceResolver, Quote, QuoteService};
pub use session::{Credentials, Transport, WebSession};
pub use trade::{Instrument, OrderType, Trade, TradeDuration, TradeType};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_exports() {
        let _ = SimClientConfig::default();
        let _ = ExecutorConfig::default();
        let _ = RateLimits::default();
        let _ = TradeDuration::default();
    }

    #[test]
    fn test_error_types_accessible() {
        let err = SimError::api(400, "bad request");
        assert!(err.to_string().contains("400"));
    }

    #[test]
    fn test_types_accessible() {
        let trade = Trade::stock("AAPL", TradeType::Buy, 10);
        assert_eq!(trade.quantity, 10);
        assert_eq!(trade.order_type, OrderType::Market);
    }
}
