//! Trade construction and validation.
//!
//! A trade is a plain value until it passes [`Trade::validate`]; the
//! executor refuses to submit anything that has not been checked against
//! the instrument's legal trade types, order types, and duration. Equity
//! and option instruments accept disjoint trade-type sets, and option
//! orders are further restricted to market or limit pricing with day
//! duration.

use crate::contract::OptionContract;
use crate::error::{Result, SimError};
use rust_decimal::Decimal;

// =============================================================================
// Instrument
// =============================================================================

/// What a trade buys or sells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instrument {
    /// An equity, identified by ticker symbol.
    Stock {
        /// Ticker symbol.
        symbol: String,
    },
    /// An option contract.
    Option {
        /// The contract being traded.
        contract: OptionContract,
    },
}

impl Instrument {
    /// The symbol submitted on the trade form.
    #[must_use]
    pub fn symbol(&self) -> String {
        match self {
            Self::Stock { symbol } => symbol.clone(),
            Self::Option { contract } => contract.to_string(),
        }
    }
}

// =============================================================================
// Trade Parameters
// =============================================================================

/// Direction of a trade, split by instrument class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeType {
    /// Buy shares (equity).
    Buy,
    /// Sell held shares (equity).
    Sell,
    /// Open a short position (equity).
    SellShort,
    /// Close a short position (equity).
    BuyToCover,
    /// Open a long option position.
    BuyToOpen,
    /// Open a short option position.
    SellToOpen,
    /// Close a short option position.
    BuyToClose,
    /// Close a long option position.
    SellToClose,
}

impl TradeType {
    fn is_equity(self) -> bool {
        matches!(
            self,
            Self::Buy | Self::Sell | Self::SellShort | Self::BuyToCover
        )
    }

    fn is_option(self) -> bool {
        !self.is_equity()
    }

    /// Form value for the transaction-type field.
    #[must_use]
    pub fn as_form_value(self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
            Self::SellShort => "Sell_Short",
            Self::BuyToCover => "Buy_to_Cover",
            Self::BuyToOpen => "Buy_to_Open",
            Self::SellToOpen => "Sell_to_Open",
            Self::BuyToClose => "Buy_to_Close",
            Self::SellToClose => "Sell_to_Close",
        }
    }
}

/// How the order is to be priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    /// Execute at the prevailing price.
    Market,
    /// Execute at or better than a limit price.
    Limit(Decimal),
    /// Become a market order once a stop price trades.
    Stop(Decimal),
    /// Become a limit order once a stop price trades.
    StopLimit {
        /// Trigger price.
        stop: Decimal,
        /// Limit once triggered.
        limit: Decimal,
    },
}

impl OrderType {
    fn prices(&self) -> (Option<Decimal>, Option<Decimal>) {
        match self {
            Self::Market => (None, None),
            Self::Limit(limit) => (Some(*limit), None),
            Self::Stop(stop) => (None, Some(*stop)),
            Self::StopLimit { stop, limit } => (Some(*limit), Some(*stop)),
        }
    }

    /// Form value for the price-type field.
    #[must_use]
    pub fn as_form_value(&self) -> &'static str {
        match self {
            Self::Market => "Market",
            Self::Limit(_) => "Limit",
            Self::Stop(_) => "Stop",
            Self::StopLimit { .. } => "StopLimit",
        }
    }
}

/// How long the order rests if it does not fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeDuration {
    /// Expires at the end of the trading day.
    #[default]
    Day,
    /// Rests until cancelled.
    GoodTillCancelled,
}

impl TradeDuration {
    /// Form value for the duration field.
    #[must_use]
    pub fn as_form_value(self) -> &'static str {
        match self {
            Self::Day => "Day_Order",
            Self::GoodTillCancelled => "Good_till_Cancelled",
        }
    }
}

// =============================================================================
// Trade
// =============================================================================

/// A trade order awaiting validation and submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    /// What is being traded.
    pub instrument: Instrument,
    /// Direction.
    pub trade_type: TradeType,
    /// Number of shares or contracts.
    pub quantity: u32,
    /// Pricing.
    pub order_type: OrderType,
    /// Resting duration.
    pub duration: TradeDuration,
}

impl Trade {
    /// A day market order for an equity.
    #[must_use]
    pub fn stock(symbol: impl Into<String>, trade_type: TradeType, quantity: u32) -> Self {
        Self {
            instrument: Instrument::Stock {
                symbol: symbol.into(),
            },
            trade_type,
            quantity,
            order_type: OrderType::Market,
            duration: TradeDuration::Day,
        }
    }

    /// A day market order for an option contract.
    #[must_use]
    pub fn option(contract: OptionContract, trade_type: TradeType, quantity: u32) -> Self {
        Self {
            instrument: Instrument::Option { contract },
            trade_type,
            quantity,
            order_type: OrderType::Market,
            duration: TradeDuration::Day,
        }
    }

    /// Replaces the order type.
    #[must_use]
    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = order_type;
        self
    }

    /// Replaces the duration.
    #[must_use]
    pub fn with_duration(mut self, duration: TradeDuration) -> Self {
        self.duration = duration;
        self
    }

    /// Checks the trade against the instrument's legal parameter space.
    ///
    /// # Errors
    /// - [`SimError::InvalidTradeType`] when the direction does not apply
    ///   to the instrument class.
    /// - [`SimError::InvalidOrderType`] for nonpositive limit/stop prices,
    ///   zero quantity, or stop pricing on an option.
    /// - [`SimError::InvalidOrderDuration`] for a good-till-cancelled
    ///   option order.
    pub fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(SimError::InvalidOrderType(
                "quantity must be positive".to_string(),
            ));
        }

        let (limit, stop) = self.order_type.prices();
        for price in [limit, stop].into_iter().flatten() {
            if price <= Decimal::ZERO {
                return Err(SimError::InvalidOrderType(format!(
                    "order price must be positive, got {price}"
                )));
            }
        }

        match &self.instrument {
            Instrument::Stock { symbol } => {
                if !self.trade_type.is_equity() {
                    return Err(SimError::InvalidTradeType(format!(
                        "{:?} does not apply to stock {symbol}",
                        self.trade_type
                    )));
                }
            }
            Instrument::Option { contract } => {
                if !self.trade_type.is_option() {
                    return Err(SimError::InvalidTradeType(format!(
                        "{:?} does not apply to option {contract}",
                        self.trade_type
                    )));
                }
                if !matches!(self.order_type, OrderType::Market | OrderType::Limit(_)) {
                    return Err(SimError::InvalidOrderType(
                        "option orders accept only market or limit pricing".to_string(),
                    ));
                }
                if self.duration != TradeDuration::Day {
                    return Err(SimError::InvalidOrderDuration(
                        "option orders accept only day duration".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Encodes the trade as the submission form's field list.
    #[must_use]
    pub fn to_form(&self) -> Vec<(String, String)> {
        let (limit, stop) = self.order_type.prices();
        let mut form = vec![
            ("symbolTextbox".to_string(), self.instrument.symbol()),
            (
                "transactionTypeDropDown".to_string(),
                self.trade_type.as_form_value().to_string(),
            ),
            ("quantityTextbox".to_string(), self.quantity.to_string()),
            (
                "Price".to_string(),
                self.order_type.as_form_value().to_string(),
            ),
            (
                "durationTypeDropDown".to_string(),
                self.duration.as_form_value().to_string(),
            ),
        ];
        if let Some(limit) = limit {
            form.push(("limitPriceTextBox".to_string(), limit.to_string()));
        }
        if let Some(stop) = stop {
            form.push(("stopPriceTextBox".to_string(), stop.to_string()));
        }
        form
    }
}
