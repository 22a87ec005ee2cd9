//! Quote resolution for equities and option chains.
//!
//! Equities come from a scraped quote page; options come from a JSON quote
//! endpoint guarded by a short-lived token pair that has to be scraped off
//! an inline script first. An equity quote that cannot be parsed is a
//! legitimate "no quote" outcome; missing option quote data is an error.

use crate::client::Routes;
use crate::contract::{OptionContract, OptionRight};
use crate::document::{extract, FieldSpec, MarkupParser};
use crate::error::{Result, SimError};
use crate::gateway::{EndpointClass, RateLimitedGateway};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};

// =============================================================================
// Selectors
// =============================================================================

const QUOTE_FIELDS: &[(&str, FieldSpec)] = &[
    ("name", FieldSpec::optional(r#"//h3[@class="companyname"]/text()"#)),
    (
        "symbol",
        FieldSpec::optional(
            r#"//table[contains(@class,"table3")]/tbody/tr[1]/td[1]/h3[contains(@class,"pill")]/text()"#,
        ),
    ),
    (
        "exchange",
        FieldSpec::optional(r#"//table[contains(@class,"table3")]//div[@class="marketname"]/text()"#),
    ),
    (
        "last",
        FieldSpec::optional(
            r#"//table[@id="Table2"]/tbody/tr[1]/th[contains(text(),"Last")]/following-sibling::td/text()"#,
        ),
    ),
    (
        "change",
        FieldSpec::optional(
            r#"//table[@id="Table2"]/tbody/tr[2]/th[contains(text(),"Change")]/following-sibling::td/text()"#,
        ),
    ),
    (
        "change_percent",
        FieldSpec::optional(
            r#"//table[@id="Table2"]/tbody/tr[3]/th[contains(text(),"% Change")]/following-sibling::td/text()"#,
        ),
    ),
    (
        "volume",
        FieldSpec::optional(
            r#"//table[@id="Table2"]/tbody/tr[4]/th[contains(text(),"Volume")]/following-sibling::td/text()"#,
        ),
    ),
    (
        "day_high",
        FieldSpec::optional(
            r#"//table[@id="Table2"]/tbody/tr[5]/th[contains(text(),"Day's High")]/following-sibling::td/text()"#,
        ),
    ),
    (
        "day_low",
        FieldSpec::optional(
            r#"//table[@id="Table2"]/tbody/tr[6]/th[contains(text(),"Day's Low")]/following-sibling::td/text()"#,
        ),
    ),
];

const OPTION_TOKEN_SCRIPT: &str = r#"//script[contains(text(),"quoteOptions")]/text()"#;

fn exchange_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\(([^)]+)\)$").expect("exchange pattern"))
}

fn option_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"#get-quote-options'\),\s*'([^']+)'\s*,\s*(\d+)\s*\);").expect("token pattern")
    })
}

// =============================================================================
// Quote Types
// =============================================================================

/// A point-in-time equity quote. Built fresh on every resolution, never
/// cached beyond the caller's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Instrument symbol as printed on the quote page.
    pub symbol: String,
    /// Company name.
    pub name: String,
    /// Exchange, with the page's enclosing parentheses stripped.
    pub exchange: String,
    /// Last traded price.
    pub last: Decimal,
    /// Absolute change.
    pub change: Decimal,
    /// Percent change.
    pub change_percent: Decimal,
    /// Day volume.
    pub volume: i64,
    /// Day high.
    pub day_high: Decimal,
    /// Day low.
    pub day_low: Decimal,
    /// When this snapshot was fetched.
    pub fetched_at: DateTime<Utc>,
}

/// One contract's entry in a narrowed option ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractQuote {
    /// Encoded contract symbol, when the endpoint provides one.
    pub symbol: Option<String>,
    /// Expiration this entry belongs to.
    pub expiration: NaiveDate,
    /// Call/put flag.
    pub right: OptionRight,
    /// Strike price.
    pub strike: Decimal,
    /// Bid.
    pub bid: Option<Decimal>,
    /// Ask.
    pub ask: Option<Decimal>,
    /// Last trade.
    pub last: Option<Decimal>,
}

impl ContractQuote {
    /// Best available price: last trade, then bid/ask mid, then either side.
    #[must_use]
    pub fn price(&self) -> Option<Decimal> {
        if self.last.is_some() {
            return self.last;
        }
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            (Some(bid), None) => Some(bid),
            (None, Some(ask)) => Some(ask),
            (None, None) => None,
        }
    }
}

/// The narrowed calls/puts ladder for one expiration.
#[derive(Debug, Clone)]
pub struct OptionChain {
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Narrowed call ladder.
    pub calls: Vec<ContractQuote>,
    /// Narrowed put ladder.
    pub puts: Vec<ContractQuote>,
}

/// All narrowed chains for one underlying, indexable by contract symbol.
#[derive(Debug, Clone)]
pub struct OptionChainLookup {
    /// Underlying symbol the lookup was for.
    pub underlying: String,
    /// Underlying's last traded price at lookup time.
    pub last_price: Decimal,
    chains: Vec<OptionChain>,
}

impl OptionChainLookup {
    /// Per-expiration chains.
    #[must_use]
    pub fn chains(&self) -> &[OptionChain] {
        &self.chains
    }

    /// Finds a contract entry by its encoded symbol.
    #[must_use]
    pub fn get(&self, contract_symbol: &str) -> Option<&ContractQuote> {
        self.chains.iter().find_map(|chain| {
            chain
                .calls
                .iter()
                .chain(chain.puts.iter())
                .find(|c| c.symbol.as_deref() == Some(contract_symbol))
        })
    }
}

// =============================================================================
// JSON endpoint payload
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawChainResponse {
    #[serde(rename = "Quote")]
    quote: Option<RawChainQuote>,
    #[serde(rename = "Expirations", default)]
    expirations: Vec<RawExpiration>,
}

#[derive(Debug, Deserialize)]
struct RawChainQuote {
    #[serde(rename = "Last")]
    last: f64,
}

#[derive(Debug, Deserialize)]
struct RawExpiration {
    #[serde(rename = "ExpirationDate")]
    expiration_date: String,
    #[serde(rename = "Calls", default)]
    calls: Vec<RawContract>,
    #[serde(rename = "Puts", default)]
    puts: Vec<RawContract>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawContract {
    #[serde(rename = "SymbolName")]
    symbol: Option<String>,
    #[serde(rename = "StrikePrice")]
    strike: f64,
    #[serde(rename = "Bid")]
    bid: Option<f64>,
    #[serde(rename = "Ask")]
    ask: Option<f64>,
    #[serde(rename = "Last")]
    last: Option<f64>,
}

impl RawContract {
    fn into_quote(self, expiration: NaiveDate, right: OptionRight) -> ContractQuote {
        ContractQuote {
            symbol: self.symbol,
            expiration,
            right,
            strike: Decimal::try_from(self.strike).unwrap_or_default(),
            bid: self.bid.and_then(|v| Decimal::try_from(v).ok()),
            ask: self.ask.and_then(|v| Decimal::try_from(v).ok()),
            last: self.last.and_then(|v| Decimal::try_from(v).ok()),
        }
    }
}

/// Narrows a strike ladder to `proximity` entries each side of the first
/// strike strictly greater than the last traded price. Clipped at the
/// ladder's bounds, never wrapping; the result never exceeds 2×proximity.
fn strike_window<T>(list: &[T], strike_of: impl Fn(&T) -> Decimal, last: Decimal, proximity: usize) -> &[T] {
    let boundary = list
        .iter()
        .position(|c| strike_of(c) > last)
        .unwrap_or(list.len());
    let start = boundary.saturating_sub(proximity);
    let end = (boundary + proximity).min(list.len());
    &list[start..end]
}

fn parse_expiration(raw: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%Y%m%d"];
    let trimmed = raw.trim();
    // The endpoint has been seen emitting both bare dates and timestamps.
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(date_part, f).ok())
}

// =============================================================================
// QuoteService
// =============================================================================

/// Resolves equity and option quotes through the rate-limited gateway.
pub struct QuoteService {
    gateway: Arc<RateLimitedGateway>,
    parser: Arc<dyn MarkupParser>,
    routes: Routes,
    strike_proximity: usize,
}

impl std::fmt::Debug for QuoteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteService")
            .field("strike_proximity", &self.strike_proximity)
            .finish_non_exhaustive()
    }
}

impl QuoteService {
    /// Creates a quote service.
    #[must_use]
    pub fn new(
        gateway: Arc<RateLimitedGateway>,
        parser: Arc<dyn MarkupParser>,
        routes: Routes,
        strike_proximity: usize,
    ) -> Self {
        Self {
            gateway,
            parser,
            routes,
            strike_proximity,
        }
    }

    /// Resolves an equity quote.
    ///
    /// Returns `Ok(None)` when the quote page cannot be parsed; callers
    /// must treat "no quote available" as a legitimate, non-fatal outcome.
    ///
    /// # Errors
    /// Only transport errors propagate.
    pub async fn stock_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let body = self
            .gateway
            .post_form(
                EndpointClass::Read,
                &self.routes.stock_lookup(),
                &[("symbol".to_string(), symbol.to_string())],
            )
            .await?;
        let doc = self.parser.parse(&body);
        // All fields optional: a partial page degrades to "no quote".
        let fields = extract(doc.as_ref(), QUOTE_FIELDS)?;

        let get = |name: &str| fields.get(name).cloned().flatten();
        let dec = |name: &str| get(name).and_then(|v| crate::document::clean_decimal(&v));

        let quote = (|| {
            let raw_exchange = get("exchange")?;
            let exchange = exchange_pattern()
                .captures(&raw_exchange)
                .map(|c| c[1].to_string())
                .unwrap_or(raw_exchange);
            Some(Quote {
                symbol: get("symbol")?,
                name: get("name")?,
                exchange,
                last: dec("last")?,
                change: dec("change")?,
                change_percent: dec("change_percent")?,
                volume: get("volume").and_then(|v| crate::document::clean_integer(&v))?,
                day_high: dec("day_high")?,
                day_low: dec("day_low")?,
                fetched_at: Utc::now(),
            })
        })();

        if quote.is_none() {
            tracing::warn!(symbol, "unable to parse quote page");
        }
        Ok(quote)
    }

    /// Resolves the narrowed option chain for an underlying.
    ///
    /// # Errors
    /// [`SimError::ExtractionIncomplete`] when the token pair cannot be
    /// scraped; [`SimError::QuoteUnavailable`] when the endpoint reports no
    /// quote data; this path is always required, unlike equity quotes.
    pub async fn option_chain(&self, underlying: &str) -> Result<OptionChainLookup> {
        tracing::debug!(underlying, "option lookup");

        let page = self
            .gateway
            .get(EndpointClass::Read, &self.routes.option_lookup())
            .await?;
        let doc = self.parser.parse(&page);
        let script = doc
            .select_first(OPTION_TOKEN_SCRIPT)
            .ok_or_else(|| SimError::extraction_incomplete("option_token_script"))?;
        let caps = option_token_pattern()
            .captures(&script)
            .ok_or_else(|| SimError::extraction_incomplete("option_token"))?;

        let url = reqwest::Url::parse_with_params(
            &self.routes.option_quote(),
            &[
                ("IdentifierType", "Symbol"),
                ("Identifier", underlying),
                ("SymbologyType", "DTNSymbol"),
                ("_token", &caps[1]),
                ("_token_userid", &caps[2]),
            ],
        )
        .map_err(|e| SimError::Network(format!("bad option quote url: {e}")))?;

        let raw = self.gateway.get(EndpointClass::Read, url.as_str()).await?;
        let response: RawChainResponse = serde_json::from_str(&raw)?;
        let quote = response
            .quote
            .ok_or_else(|| SimError::quote_unavailable(underlying))?;
        let last = Decimal::try_from(quote.last).unwrap_or_default();

        let mut chains = Vec::with_capacity(response.expirations.len());
        for exp in response.expirations {
            let Some(expiration) = parse_expiration(&exp.expiration_date) else {
                tracing::warn!(raw = %exp.expiration_date, "skipping unparseable expiration");
                continue;
            };
            let calls = strike_window(
                &exp.calls,
                |c: &RawContract| Decimal::try_from(c.strike).unwrap_or_default(),
                last,
                self.strike_proximity,
            )
            .iter()
            .cloned()
            .map(|c| c.into_quote(expiration, OptionRight::Call))
            .collect();
            let puts = strike_window(
                &exp.puts,
                |c: &RawContract| Decimal::try_from(c.strike).unwrap_or_default(),
                last,
                self.strike_proximity,
            )
            .iter()
            .cloned()
            .map(|c| c.into_quote(expiration, OptionRight::Put))
            .collect();
            chains.push(OptionChain {
                expiration,
                calls,
                puts,
            });
        }

        Ok(OptionChainLookup {
            underlying: underlying.to_string(),
            last_price: last,
            chains,
        })
    }
}

// =============================================================================
// PriceResolver
// =============================================================================

#[derive(Debug, Clone)]
enum PriceBinding {
    Equity {
        symbol: String,
    },
    Contract {
        contract: OptionContract,
        last_scraped: Option<Decimal>,
    },
}

/// A deferred, zero-argument price capability bound to one position.
///
/// Invoked fresh on each read, never memoized across portfolio snapshots.
/// The back-reference is used only to re-derive the quote, never for
/// mutation.
pub struct PriceResolver {
    service: Arc<QuoteService>,
    binding: PriceBinding,
}

impl std::fmt::Debug for PriceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceResolver")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl PriceResolver {
    /// Binds a resolver to an equity symbol.
    #[must_use]
    pub fn equity(service: Arc<QuoteService>, symbol: impl Into<String>) -> Self {
        Self {
            service,
            binding: PriceBinding::Equity {
                symbol: symbol.into(),
            },
        }
    }

    /// Binds a resolver to an option contract. `last_scraped` is the
    /// per-unit price scraped off the portfolio row, returned verbatim for
    /// expired contracts.
    #[must_use]
    pub fn contract(
        service: Arc<QuoteService>,
        contract: OptionContract,
        last_scraped: Option<Decimal>,
    ) -> Self {
        Self {
            service,
            binding: PriceBinding::Contract {
                contract,
                last_scraped,
            },
        }
    }

    /// Resolves the live per-unit price.
    ///
    /// For an expired contract this returns the stored row data with zero
    /// network calls; an expired contract's price cannot move.
    ///
    /// # Errors
    /// Propagates transport and option-lookup errors.
    pub async fn current_price(&self) -> Result<Option<Decimal>> {
        match &self.binding {
            PriceBinding::Equity { symbol } => {
                Ok(self.service.stock_quote(symbol).await?.map(|q| q.last))
            }
            PriceBinding::Contract {
                contract,
                last_scraped,
            } => {
                if contract.is_expired(Utc::now().date_naive()) {
                    tracing::debug!(contract = %contract, "expired contract, skipping lookup");
                    return Ok(*last_scraped);
                }
                let lookup = self.service.option_chain(&contract.underlying).await?;
                Ok(lookup
                    .get(&contract.to_string())
                    .and_then(ContractQuote::price))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fake::{KeyedParser, MapDocument};
    use crate::gateway::RateLimits;
    use crate::session::fake::ScriptedTransport;
    use rust_decimal_macros::dec;

    fn quote_doc() -> MapDocument {
        let values = [
            "Apple Inc.",
            "AAPL",
            "(NASDAQ)",
            "150.00",
            "+1.25",
            "0.84%",
            "52,164,000",
            "151.10",
            "148.22",
        ];
        let mut doc = MapDocument::new();
        for ((_, spec), value) in QUOTE_FIELDS.iter().zip(values) {
            doc = doc.with_field(spec.selector, value);
        }
        doc
    }

    fn service_with(
        transport: Arc<ScriptedTransport>,
        parser: KeyedParser,
    ) -> Arc<QuoteService> {
        let gateway = Arc::new(RateLimitedGateway::new(transport, &RateLimits::default()));
        Arc::new(QuoteService::new(
            gateway,
            Arc::new(parser),
            Routes::new("http://sim.test"),
            3,
        ))
    }

    // ==================== Equity Quote Tests ====================

    #[tokio::test]
    async fn test_stock_quote_parses_and_normalizes_exchange() {
        let transport = Arc::new(ScriptedTransport::new().route("symbol.aspx", "quote-page"));
        let parser = KeyedParser::new().with_page("quote-page", quote_doc());
        let service = service_with(transport, parser);

        let quote = service.stock_quote("AAPL").await.unwrap().unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.exchange, "NASDAQ");
        assert_eq!(quote.last, dec!(150.00));
        assert_eq!(quote.change, dec!(1.25));
        assert_eq!(quote.volume, 52_164_000);
    }

    #[tokio::test]
    async fn test_stock_quote_partial_page_is_none_not_error() {
        // Page parses but the price cells are gone.
        let broken = MapDocument::new()
            .with_field(QUOTE_FIELDS[0].1.selector, "Apple Inc.")
            .with_field(QUOTE_FIELDS[1].1.selector, "AAPL");
        let transport = Arc::new(ScriptedTransport::new().route("symbol.aspx", "quote-page"));
        let parser = KeyedParser::new().with_page("quote-page", broken);
        let service = service_with(transport, parser);

        assert!(service.stock_quote("AAPL").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stock_quote_unwrapped_exchange_kept_verbatim() {
        let doc = quote_doc().with_field(QUOTE_FIELDS[2].1.selector, "NYSE");
        let transport = Arc::new(ScriptedTransport::new().route("symbol.aspx", "quote-page"));
        let parser = KeyedParser::new().with_page("quote-page", doc);
        let service = service_with(transport, parser);

        let quote = service.stock_quote("GE").await.unwrap().unwrap();
        assert_eq!(quote.exchange, "NYSE");
    }

    // ==================== Token Extraction Tests ====================

    #[test]
    fn test_token_pattern_captures_pair() {
        let script =
            r#"quoteOptions($('#get-quote-options'), 'a1b2-token', 987654);"#;
        let caps = option_token_pattern().captures(script).unwrap();
        assert_eq!(&caps[1], "a1b2-token");
        assert_eq!(&caps[2], "987654");
    }

    #[tokio::test]
    async fn test_option_chain_missing_token_is_extraction_incomplete() {
        let lookup_doc =
            MapDocument::new().with_field(OPTION_TOKEN_SCRIPT, "no tokens in here");
        let transport =
            Arc::new(ScriptedTransport::new().route("tradeoptions.aspx", "lookup-page"));
        let parser = KeyedParser::new().with_page("lookup-page", lookup_doc);
        let service = service_with(transport, parser);

        let err = service.option_chain("AAPL").await.unwrap_err();
        assert!(matches!(err, SimError::ExtractionIncomplete { .. }));
    }

    // ==================== Chain Parsing Tests ====================

    fn chain_json() -> String {
        serde_json::json!({
            "Quote": { "Last": 150.0 },
            "Expirations": [{
                "ExpirationDate": "01/19/2024",
                "Calls": (1..=10).map(|i| serde_json::json!({
                    "SymbolName": format!("AAPL240119C{:08}", i * 20_000),
                    "StrikePrice": (i * 20) as f64,
                    "Bid": 1.0, "Ask": 1.2, "Last": 1.1
                })).collect::<Vec<_>>(),
                "Puts": []
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_option_chain_window_and_index() {
        let lookup_doc = MapDocument::new().with_field(
            OPTION_TOKEN_SCRIPT,
            r#"quoteOptions($('#get-quote-options'), 'tok', 42);"#,
        );
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("tradeoptions.aspx", "lookup-page")
                .route("GetQuotes", &chain_json()),
        );
        let parser = KeyedParser::new().with_page("lookup-page", lookup_doc);
        let service = service_with(transport, parser);

        let lookup = service.option_chain("AAPL").await.unwrap();
        assert_eq!(lookup.last_price, dec!(150));
        // Strikes 20..=200 in 20s; first strictly above 150 is 160 (index 7).
        // Window of 3 each side: strikes 100 through 200, six entries.
        let chain = &lookup.chains()[0];
        assert_eq!(chain.calls.len(), 6);
        assert_eq!(chain.calls.first().unwrap().strike, dec!(100));
        assert_eq!(chain.calls.last().unwrap().strike, dec!(200));

        let entry = lookup.get("AAPL240119C00160000").unwrap();
        assert_eq!(entry.strike, dec!(160));
    }

    #[tokio::test]
    async fn test_option_chain_null_quote_raises() {
        let lookup_doc = MapDocument::new().with_field(
            OPTION_TOKEN_SCRIPT,
            r#"quoteOptions($('#get-quote-options'), 'tok', 42);"#,
        );
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("tradeoptions.aspx", "lookup-page")
                .route("GetQuotes", r#"{"Quote": null, "Expirations": []}"#),
        );
        let parser = KeyedParser::new().with_page("lookup-page", lookup_doc);
        let service = service_with(transport, parser);

        let err = service.option_chain("AAPL").await.unwrap_err();
        assert!(matches!(err, SimError::QuoteUnavailable { .. }));
    }

    // ==================== Strike Window Tests ====================

    fn strikes(values: &[i64]) -> Vec<Decimal> {
        values.iter().map(|v| Decimal::from(*v)).collect()
    }

    #[test]
    fn test_window_centers_on_first_strike_above_last() {
        let ladder = strikes(&[100, 110, 120, 130, 140, 150, 160]);
        let window = strike_window(&ladder, |s| *s, dec!(125), 2);
        assert_eq!(window, &strikes(&[110, 120, 130, 140])[..]);
    }

    #[test]
    fn test_window_never_exceeds_twice_proximity() {
        let ladder = strikes(&(1..=100).collect::<Vec<_>>());
        let window = strike_window(&ladder, |s| *s, dec!(50), 7);
        assert!(window.len() <= 14);
    }

    #[test]
    fn test_window_clips_at_lower_bound_without_wrapping() {
        let ladder = strikes(&[100, 110, 120]);
        let window = strike_window(&ladder, |s| *s, dec!(10), 5);
        assert_eq!(window, &ladder[..]);
    }

    #[test]
    fn test_window_clips_at_upper_bound() {
        let ladder = strikes(&[100, 110, 120]);
        let window = strike_window(&ladder, |s| *s, dec!(500), 2);
        // No strike exceeds last: boundary sits past the end.
        assert_eq!(window, &strikes(&[110, 120])[..]);
    }

    #[test]
    fn test_window_boundary_is_strictly_greater() {
        let ladder = strikes(&[100, 150, 200]);
        // A strike equal to last does not mark the boundary.
        let window = strike_window(&ladder, |s| *s, dec!(150), 1);
        assert_eq!(window, &strikes(&[150, 200])[..]);
    }

    #[test]
    fn test_window_empty_ladder() {
        let ladder: Vec<Decimal> = vec![];
        assert!(strike_window(&ladder, |s| *s, dec!(100), 3).is_empty());
    }

    // ==================== Expired Contract Tests ====================

    #[tokio::test]
    async fn test_expired_contract_short_circuits_without_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let service = service_with(transport.clone(), KeyedParser::new());

        let contract: OptionContract = "AAPL240119C00150000".parse().unwrap();
        let resolver = PriceResolver::contract(service, contract, Some(dec!(3.40)));

        let price = resolver.current_price().await.unwrap();
        assert_eq!(price, Some(dec!(3.40)));
        assert_eq!(transport.call_count(), 0);
    }

    // ==================== Expiration Parsing Tests ====================

    #[test]
    fn test_parse_expiration_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 19).unwrap();
        assert_eq!(parse_expiration("01/19/2024"), Some(expected));
        assert_eq!(parse_expiration("2024-01-19"), Some(expected));
        assert_eq!(parse_expiration("2024-01-19T00:00:00"), Some(expected));
        assert_eq!(parse_expiration("garbage"), None);
    }

    // ==================== ContractQuote Tests ====================

    #[test]
    fn test_contract_quote_price_preference() {
        let base = ContractQuote {
            symbol: None,
            expiration: NaiveDate::from_ymd_opt(2024, 1, 19).unwrap(),
            right: OptionRight::Call,
            strike: dec!(150),
            bid: Some(dec!(1.0)),
            ask: Some(dec!(1.2)),
            last: Some(dec!(1.15)),
        };
        assert_eq!(base.price(), Some(dec!(1.15)));

        let no_last = ContractQuote { last: None, ..base.clone() };
        assert_eq!(no_last.price(), Some(dec!(1.1)));

        let bid_only = ContractQuote { last: None, ask: None, ..base };
        assert_eq!(bid_only.price(), Some(dec!(1.0)));
    }
}
