//! Full-portfolio snapshot assembly.
//!
//! One snapshot is two page fetches: the portfolio page (summary figures
//! plus the position table) and the open-orders page. Summary figures are
//! the only hard-required extractions in the client; a portfolio whose
//! account value cannot be read is useless, so absence fails the snapshot
//! instead of defaulting.

use crate::client::Routes;
use crate::document::{clean_decimal, extract, FieldSpec, MarkupParser};
use crate::error::{Result, SimError};
use crate::gateway::{EndpointClass, RateLimitedGateway};
use crate::order::{reconcile_open_orders, OpenOrder};
use crate::position::{parse_positions, Position};
use crate::quote::QuoteService;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

// =============================================================================
// Selectors
// =============================================================================

const SUMMARY_FIELDS: &[(&str, FieldSpec)] = &[
    (
        "account_value",
        FieldSpec::required(r#"//div[contains(@class,"account-summary")]//span[@id="accountvalue"]/text()"#),
    ),
    (
        "buying_power",
        FieldSpec::required(r#"//div[contains(@class,"account-summary")]//span[@id="buyingpower"]/text()"#),
    ),
    (
        "cash",
        FieldSpec::required(r#"//div[contains(@class,"account-summary")]//span[@id="cash"]/text()"#),
    ),
    (
        "annual_return_pct",
        FieldSpec::required(r#"//div[contains(@class,"account-summary")]//span[@id="annualreturn"]/text()"#),
    ),
];

// =============================================================================
// Portfolio
// =============================================================================

/// A point-in-time portfolio snapshot.
#[derive(Debug)]
pub struct Portfolio {
    /// Total account value.
    pub account_value: Decimal,
    /// Buying power.
    pub buying_power: Decimal,
    /// Cash balance.
    pub cash: Decimal,
    /// Annualized return, percent.
    pub annual_return_pct: Decimal,
    /// Long equity positions.
    pub stock: Vec<Position>,
    /// Short equity positions.
    pub short: Vec<Position>,
    /// Option positions.
    pub option: Vec<Position>,
    /// Open orders, reconciled against the position table.
    pub open_orders: Vec<OpenOrder>,
    /// When the snapshot was taken.
    pub fetched_at: DateTime<Utc>,
}

impl Portfolio {
    /// Total positions across all three collections.
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.stock.len() + self.short.len() + self.option.len()
    }

    /// All positions holding a given symbol.
    pub fn positions_for<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a Position> + 'a {
        self.stock
            .iter()
            .chain(self.short.iter())
            .chain(self.option.iter())
            .filter(move |p| p.symbol == symbol)
    }
}

// =============================================================================
// Snapshot
// =============================================================================

fn required_decimal(
    fields: &std::collections::HashMap<&'static str, Option<String>>,
    name: &'static str,
) -> Result<Decimal> {
    fields
        .get(name)
        .cloned()
        .flatten()
        .as_deref()
        .and_then(clean_decimal)
        .ok_or_else(|| SimError::extraction_incomplete(name))
}

/// Fetches and assembles a fresh portfolio snapshot.
///
/// Performs exactly two reads: the portfolio page, then the open-orders
/// page. Position prices are bound lazily and fetch nothing here.
///
/// # Errors
/// - [`SimError::ExtractionIncomplete`] when a summary figure is missing
///   or unparsable.
/// - Transport errors from either fetch.
pub async fn build_portfolio(
    gateway: &Arc<RateLimitedGateway>,
    parser: &Arc<dyn MarkupParser>,
    routes: &Routes,
    quotes: &Arc<QuoteService>,
) -> Result<Portfolio> {
    let body = gateway
        .get(EndpointClass::Read, &routes.portfolio())
        .await?;
    let doc = parser.parse(&body);

    let fields = extract(doc.as_ref(), SUMMARY_FIELDS)?;
    let account_value = required_decimal(&fields, "account_value")?;
    let buying_power = required_decimal(&fields, "buying_power")?;
    let cash = required_decimal(&fields, "cash")?;
    let annual_return_pct = required_decimal(&fields, "annual_return_pct")?;

    let positions = parse_positions(doc.as_ref(), quotes)?;

    let orders_body = gateway
        .get(EndpointClass::Read, &routes.open_orders())
        .await?;
    let orders_doc = parser.parse(&orders_body);
    let open_orders = reconcile_open_orders(orders_doc.as_ref(), &positions, gateway, routes)?;

    tracing::debug!(
        positions = positions.len(),
        open_orders = open_orders.len(),
        %account_value,
        "portfolio snapshot assembled"
    );

    Ok(Portfolio {
        account_value,
        buying_power,
        cash,
        annual_return_pct,
        stock: positions.stock,
        short: positions.short,
        option: positions.option,
        open_orders,
        fetched_at: Utc::now(),
    })
}
