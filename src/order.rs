//! Open-order reconciliation.
//!
//! The open-orders page omits the price for orders that have not filled,
//! printing "n/a" instead. Those rows are reconciled against the position
//! table: the portfolio annotates pending rows with the order id, and the
//! row's per-unit price times the ordered quantity recovers a derived
//! total. Orders that cannot be reconciled are kept with an explicitly
//! unknown price rather than dropped or silently zeroed.

use crate::client::Routes;
use crate::document::{clean_decimal, clean_integer, extract, Document, FieldSpec};
use crate::error::Result;
use crate::gateway::{EndpointClass, RateLimitedGateway};
use crate::position::ParsedPositions;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::OnceLock;

// =============================================================================
// Selectors
// =============================================================================

const ORDER_ROWS: &str = r#"//table[contains(@class,"table1")]/tbody/tr[td]"#;

const ORDER_FIELDS: &[(&str, FieldSpec)] = &[
    ("order_id", FieldSpec::optional("td[1]/@data-orderid")),
    ("cancel_link", FieldSpec::optional("td[1]/a/@href")),
    ("order_date", FieldSpec::optional("td[2]/text()")),
    ("trade_type", FieldSpec::optional("td[3]/text()")),
    ("symbol", FieldSpec::optional("td[4]/a/text()")),
    ("quantity", FieldSpec::optional("td[5]/text()")),
    ("price", FieldSpec::optional("td[6]/text()")),
];

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Order rows decorate the symbol with numeric/period suffixes; the
    // symbol proper runs up to the first digit or period, so hyphenated
    // class-share tickers survive intact.
    PATTERN.get_or_init(|| Regex::new(r"^([^.\d]+)").expect("symbol pattern"))
}

// =============================================================================
// Reconciled Price
// =============================================================================

/// The price attached to an open order, tagged by provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciledPrice {
    /// Printed directly on the orders page.
    Quoted(Decimal),
    /// Recovered from the matching position row: per-unit price times
    /// ordered quantity.
    Derived(Decimal),
    /// The page printed "n/a" and no position row matched.
    Unknown,
}

impl ReconciledPrice {
    /// The price amount, zero when unknown. Check [`Self::is_known`] before
    /// treating the amount as real.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        match self {
            Self::Quoted(p) | Self::Derived(p) => *p,
            Self::Unknown => Decimal::ZERO,
        }
    }

    /// False only for [`Self::Unknown`].
    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

// =============================================================================
// Open Orders
// =============================================================================

/// A deferred cancellation bound to one open order's cancel link.
pub struct CancelHandle {
    gateway: Arc<RateLimitedGateway>,
    url: String,
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl CancelHandle {
    /// Cancels the order. Counted against the stricter cancel budget, not
    /// the read budget.
    ///
    /// # Errors
    /// Propagates transport errors.
    pub async fn cancel(&self) -> Result<()> {
        tracing::info!(url = %self.url, "cancelling open order");
        self.gateway.get(EndpointClass::Cancel, &self.url).await?;
        Ok(())
    }
}

/// One unfilled order scraped off the open-orders page.
#[derive(Debug)]
pub struct OpenOrder {
    /// Broker-assigned order id, when the row exposes one.
    pub order_id: Option<String>,
    /// Normalized instrument symbol.
    pub symbol: String,
    /// Submission date, verbatim page text.
    pub order_date: String,
    /// Ordered quantity.
    pub quantity: i64,
    /// Reconciled order price with provenance.
    pub price: ReconciledPrice,
    /// Trade-type label, verbatim page text.
    pub trade_type: String,
    /// Cancellation capability, absent when the row has no cancel link.
    pub cancel: Option<CancelHandle>,
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Parses the open-orders document and reconciles "n/a" prices against the
/// position table.
///
/// Every scraped row survives: a row whose price cannot be recovered is
/// returned with [`ReconciledPrice::Unknown`] and logged.
///
/// # Errors
/// Only structural failures propagate; malformed rows are skipped with a
/// warning.
pub fn reconcile_open_orders(
    doc: &dyn Document,
    positions: &ParsedPositions,
    gateway: &Arc<RateLimitedGateway>,
    routes: &Routes,
) -> Result<Vec<OpenOrder>> {
    let mut orders = Vec::new();

    for row in doc.select_nodes(ORDER_ROWS) {
        let fields = extract(row.as_ref(), ORDER_FIELDS)?;
        let get = |name: &str| fields.get(name).cloned().flatten();

        let Some(raw_symbol) = get("symbol") else {
            tracing::warn!("order row missing symbol, skipping");
            continue;
        };
        let symbol = symbol_pattern()
            .captures(raw_symbol.trim())
            .and_then(|c| c.get(1))
            .map_or_else(
                || raw_symbol.trim().to_string(),
                |m| m.as_str().trim().to_string(),
            );

        let order_id = get("order_id");
        let quantity = get("quantity").and_then(|v| clean_integer(&v)).unwrap_or(0);

        let raw_price = get("price").unwrap_or_default();
        let price = match clean_decimal(&raw_price) {
            Some(p) => ReconciledPrice::Quoted(p),
            None => reconcile_missing_price(order_id.as_deref(), &symbol, quantity, positions),
        };

        let cancel = get("cancel_link").map(|link| CancelHandle {
            gateway: Arc::clone(gateway),
            url: routes.cancel(&link),
        });

        orders.push(OpenOrder {
            order_id,
            symbol,
            order_date: get("order_date").unwrap_or_default(),
            quantity,
            price,
            trade_type: get("trade_type").unwrap_or_default(),
            cancel,
        });
    }

    Ok(orders)
}

fn reconcile_missing_price(
    order_id: Option<&str>,
    symbol: &str,
    quantity: i64,
    positions: &ParsedPositions,
) -> ReconciledPrice {
    let matched = order_id.and_then(|id| positions.find_by_order_id(id));
    match matched.and_then(|p| p.current_price) {
        Some(unit) => ReconciledPrice::Derived(unit * Decimal::from(quantity)),
        None => {
            tracing::warn!(symbol, ?order_id, "open order price unavailable");
            ReconciledPrice::Unknown
        }
    }
}
