//! Portfolio position rows.
//!
//! The portfolio table mixes real holdings with header and informational
//! filler rows. A row is eligible only when it carries both a recognized
//! position-type flag and a trade-action link; everything else is skipped,
//! never merged into a collection.

use crate::contract::OptionContract;
use crate::document::{clean_decimal, clean_integer, extract, Document, FieldSpec};
use crate::error::Result;
use crate::quote::{PriceResolver, QuoteService};
use rust_decimal::Decimal;
use std::sync::Arc;

// =============================================================================
// Selectors
// =============================================================================

const POSITION_ROWS: &str = r#"//table[contains(@class,"table1")]/tbody/tr[not(contains(@class,"expandable")) and not(contains(@class,"no-border"))]"#;
const POSITION_TYPE: &str = "td[1]/div/@data-stocktype";
const TRADE_LINK: &str = "td[2]/a[2]/@href";

const POSITION_FIELDS: &[(&str, FieldSpec)] = &[
    ("portfolio_id", FieldSpec::optional("td[1]/div/@data-portfolioid")),
    ("order_id", FieldSpec::optional("td[1]/div/@data-orderid")),
    ("symbol", FieldSpec::optional("td[1]/div/@data-symbol")),
    ("description", FieldSpec::optional("td[4]/text()")),
    ("quantity", FieldSpec::optional("td[5]/text()")),
    ("purchase_price", FieldSpec::optional("td[6]/text()")),
    ("current_price", FieldSpec::optional("td[7]/text()")),
    ("total_value", FieldSpec::optional("td[8]/text()")),
];

// =============================================================================
// Position Types
// =============================================================================

/// Which collection a position belongs to. Disjoint by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    /// Long equity holding.
    Long,
    /// Short equity holding.
    Short,
    /// Option holding.
    Option,
}

impl PositionKind {
    fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "long" => Some(Self::Long),
            "short" => Some(Self::Short),
            "option" => Some(Self::Option),
            _ => None,
        }
    }
}

/// A held position scraped from one portfolio row.
///
/// The live price is not fetched eagerly: `price_resolver` is a deferred
/// capability evaluated on demand, so building the position table never
/// performs quote fetches.
#[derive(Debug)]
pub struct Position {
    /// Collection this position belongs to.
    pub kind: PositionKind,
    /// Scraped portfolio row id.
    pub portfolio_id: Option<String>,
    /// Pending-order id annotation, when the row carries one. Used to
    /// reconcile open orders whose price the orders page omits.
    pub order_id: Option<String>,
    /// Instrument symbol (contract symbol for options).
    pub symbol: String,
    /// Row description text.
    pub description: Option<String>,
    /// Signed quantity as scraped.
    pub quantity: i64,
    /// Per-unit purchase price.
    pub purchase_price: Option<Decimal>,
    /// Per-unit current price at scrape time.
    pub current_price: Option<Decimal>,
    /// Row total value.
    pub total_value: Option<Decimal>,
    /// Decoded contract metadata, for option rows.
    pub contract: Option<OptionContract>,
    price_resolver: PriceResolver,
}

impl Position {
    /// The deferred live-price capability bound to this position.
    #[must_use]
    pub fn price_resolver(&self) -> &PriceResolver {
        &self.price_resolver
    }

    /// Re-resolves the live per-unit price. Each call fetches fresh.
    ///
    /// # Errors
    /// Propagates transport and option-lookup errors.
    pub async fn live_price(&self) -> Result<Option<Decimal>> {
        self.price_resolver.current_price().await
    }
}

/// The freshly-parsed position table, partitioned by kind.
#[derive(Debug, Default)]
pub struct ParsedPositions {
    /// Long equity positions.
    pub stock: Vec<Position>,
    /// Short equity positions.
    pub short: Vec<Position>,
    /// Option positions.
    pub option: Vec<Position>,
}

impl ParsedPositions {
    /// Total positions across the three collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stock.len() + self.short.len() + self.option.len()
    }

    /// True when no rows were eligible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the position annotated with a given pending-order id.
    #[must_use]
    pub fn find_by_order_id(&self, order_id: &str) -> Option<&Position> {
        self.stock
            .iter()
            .chain(self.short.iter())
            .chain(self.option.iter())
            .find(|p| p.order_id.as_deref() == Some(order_id))
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Partitions the portfolio document's rows into typed position records.
///
/// Rows lacking a position-type flag or a trade link are headers or
/// non-tradable filler and produce nothing. Construction wires each
/// position to a [`PriceResolver`] without performing any fetch.
///
/// # Errors
/// Only structural failures propagate; individual malformed rows are
/// skipped with a warning.
pub fn parse_positions(
    doc: &dyn Document,
    quotes: &Arc<QuoteService>,
) -> Result<ParsedPositions> {
    let mut parsed = ParsedPositions::default();

    for row in doc.select_nodes(POSITION_ROWS) {
        let flag = row.select_first(POSITION_TYPE);
        let trade_link = row.select_first(TRADE_LINK);
        let (Some(flag), Some(_)) = (flag, trade_link) else {
            continue;
        };
        let Some(kind) = PositionKind::from_flag(flag.trim()) else {
            tracing::warn!(flag = %flag, "unrecognized position type, skipping row");
            continue;
        };

        let fields = extract(row.as_ref(), POSITION_FIELDS)?;
        let get = |name: &str| fields.get(name).cloned().flatten();

        let Some(symbol) = get("symbol") else {
            tracing::warn!("position row missing symbol, skipping");
            continue;
        };
        let current_price = get("current_price").and_then(|v| clean_decimal(&v));

        let (contract, price_resolver) = match kind {
            PositionKind::Option => {
                let contract: OptionContract = match symbol.parse() {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(symbol = %symbol, error = %e, "undecodable contract symbol, skipping row");
                        continue;
                    }
                };
                let resolver =
                    PriceResolver::contract(Arc::clone(quotes), contract.clone(), current_price);
                (Some(contract), resolver)
            }
            PositionKind::Long | PositionKind::Short => {
                (None, PriceResolver::equity(Arc::clone(quotes), symbol.clone()))
            }
        };

        let position = Position {
            kind,
            portfolio_id: get("portfolio_id"),
            order_id: get("order_id"),
            symbol,
            description: get("description"),
            quantity: get("quantity").and_then(|v| clean_integer(&v)).unwrap_or(0),
            purchase_price: get("purchase_price").and_then(|v| clean_decimal(&v)),
            current_price,
            total_value: get("total_value").and_then(|v| clean_decimal(&v)),
            contract,
            price_resolver,
        };

        match kind {
            PositionKind::Long => parsed.stock.push(position),
            PositionKind::Short => parsed.short.push(position),
            PositionKind::Option => parsed.option.push(position),
        }
    }

    Ok(parsed)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::Routes;
    use crate::document::fake::{KeyedParser, MapDocument};
    use crate::gateway::{RateLimitedGateway, RateLimits};
    use crate::session::fake::ScriptedTransport;
    use rust_decimal_macros::dec;

    pub(crate) const POSITION_ROWS_SELECTOR: &str = POSITION_ROWS;

    pub(crate) fn row(
        flag: Option<&str>,
        link: Option<&str>,
        symbol: &str,
        quantity: &str,
        current: &str,
    ) -> MapDocument {
        let mut doc = MapDocument::new()
            .with_field("td[1]/div/@data-symbol", symbol)
            .with_field("td[1]/div/@data-portfolioid", "5700657")
            .with_field("td[4]/text()", "description")
            .with_field("td[5]/text()", quantity)
            .with_field("td[6]/text()", "$140.00")
            .with_field("td[7]/text()", current)
            .with_field("td[8]/text()", "$1,500.00");
        if let Some(flag) = flag {
            doc = doc.with_field(POSITION_TYPE, flag);
        }
        if let Some(link) = link {
            doc = doc.with_field(TRADE_LINK, link);
        }
        doc
    }

    fn quotes() -> (Arc<ScriptedTransport>, Arc<QuoteService>) {
        let transport = Arc::new(ScriptedTransport::new());
        let gateway = Arc::new(RateLimitedGateway::new(
            transport.clone(),
            &RateLimits::default(),
        ));
        let service = Arc::new(QuoteService::new(
            gateway,
            Arc::new(KeyedParser::new()),
            Routes::new("http://sim.test"),
            3,
        ));
        (transport, service)
    }

    fn doc_with_rows(rows: Vec<MapDocument>) -> MapDocument {
        MapDocument::new().with_nodes(POSITION_ROWS, rows)
    }

    // ==================== Eligibility Tests ====================

    #[test]
    fn test_partitions_eligible_rows_and_skips_the_rest() {
        let doc = doc_with_rows(vec![
            row(Some("long"), Some("/trade?s=AAPL"), "AAPL", "10", "150.00"),
            row(Some("short"), Some("/trade?s=GE"), "GE", "5", "12.00"),
            row(
                Some("option"),
                Some("/trade?s=o"),
                "AAPL240119C00150000",
                "2",
                "3.40",
            ),
            // Header row: no flag, no link.
            row(None, None, "SYMBOL", "-", "-"),
            // Informational row: flag but no trade link.
            row(Some("long"), None, "PENDING", "1", "1.00"),
            // Tradeable-looking but unknown flag.
            row(Some("mystery"), Some("/trade"), "XXX", "1", "1.00"),
        ]);
        let (transport, quotes) = quotes();

        let parsed = parse_positions(&doc, &quotes).unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.stock.len(), 1);
        assert_eq!(parsed.short.len(), 1);
        assert_eq!(parsed.option.len(), 1);
        // Constructing the table never fetches quotes.
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_empty_document_yields_empty_table() {
        let (_, quotes) = quotes();
        let parsed = parse_positions(&MapDocument::new(), &quotes).unwrap();
        assert!(parsed.is_empty());
    }

    // ==================== Field Tests ====================

    #[test]
    fn test_long_position_fields() {
        let doc = doc_with_rows(vec![row(
            Some("long"),
            Some("/trade?s=AAPL"),
            "AAPL",
            "10",
            "$150.00",
        )]);
        let (_, quotes) = quotes();

        let parsed = parse_positions(&doc, &quotes).unwrap();
        let position = &parsed.stock[0];

        assert_eq!(position.kind, PositionKind::Long);
        assert_eq!(position.symbol, "AAPL");
        assert_eq!(position.quantity, 10);
        assert_eq!(position.purchase_price, Some(dec!(140.00)));
        assert_eq!(position.current_price, Some(dec!(150.00)));
        assert_eq!(position.total_value, Some(dec!(1500.00)));
        assert!(position.contract.is_none());
    }

    #[test]
    fn test_option_row_decodes_contract() {
        let doc = doc_with_rows(vec![row(
            Some("option"),
            Some("/trade?s=o"),
            "AAPL240119C00150000",
            "2",
            "3.40",
        )]);
        let (_, quotes) = quotes();

        let parsed = parse_positions(&doc, &quotes).unwrap();
        let contract = parsed.option[0].contract.as_ref().unwrap();

        assert_eq!(contract.underlying, "AAPL");
        assert_eq!(contract.strike, dec!(150));
    }

    #[test]
    fn test_option_row_with_undecodable_symbol_is_skipped() {
        let doc = doc_with_rows(vec![row(
            Some("option"),
            Some("/trade?s=o"),
            "NOT-A-CONTRACT",
            "2",
            "3.40",
        )]);
        let (_, quotes) = quotes();

        let parsed = parse_positions(&doc, &quotes).unwrap();
        assert!(parsed.is_empty());
    }

    // ==================== Order-Id Lookup Tests ====================

    #[test]
    fn test_find_by_order_id() {
        let tagged = row(Some("long"), Some("/trade"), "AAPL", "10", "150.00")
            .with_field("td[1]/div/@data-orderid", "98765");
        let doc = doc_with_rows(vec![
            tagged,
            row(Some("long"), Some("/trade"), "GE", "5", "12.00"),
        ]);
        let (_, quotes) = quotes();

        let parsed = parse_positions(&doc, &quotes).unwrap();
        assert_eq!(
            parsed.find_by_order_id("98765").map(|p| p.symbol.as_str()),
            Some("AAPL")
        );
        assert!(parsed.find_by_order_id("11111").is_none());
    }
}
