// ===============================
// src/domain.rs
// ===============================
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calc::CalcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side { Buy, Sell }
impl Side {
    pub fn as_str(&self) -> &'static str { match self { Side::Buy => "buy", Side::Sell => "sell" } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind { Market, Limit }
impl OrderKind {
    pub fn as_str(&self) -> &'static str { match self { OrderKind::Market => "market", OrderKind::Limit => "limit" } }
}
impl std::str::FromStr for OrderKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(OrderKind::Market),
            "limit" => Ok(OrderKind::Limit),
            other => Err(format!("unknown order kind {other:?} (market|limit)")),
        }
    }
}

/// Account-level numbers of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub portfolio_value: Decimal,
    pub cash: Decimal,
    /// Equity at the previous close (reference for the daily change).
    pub last_equity: Decimal,
}

impl AccountSnapshot {
    /// Daily change is defined even when the percentage is not.
    pub fn daily_change(&self) -> Result<Decimal, CalcError> {
        self.portfolio_value
            .checked_sub(self.last_equity)
            .ok_or_else(|| crate::calc::overflow("daily_change"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Signed: negative = short.
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub current_price: Decimal,
    /// Signed like `quantity` (negative for shorts).
    pub market_value: Decimal,
    /// `quantity * avg_entry_price`, signed like `quantity`.
    pub cost_basis: Decimal,
}

impl Position {
    /// Builds a position, rejecting zero quantity and non-positive prices.
    pub fn new(
        symbol: impl Into<String>,
        quantity: Decimal,
        avg_entry_price: Decimal,
        current_price: Decimal,
        market_value: Decimal,
        cost_basis: Decimal,
    ) -> Result<Self, CalcError> {
        let p = Self {
            symbol: symbol.into(),
            quantity,
            avg_entry_price,
            current_price,
            market_value,
            cost_basis,
        };
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> Result<(), CalcError> {
        if self.symbol.trim().is_empty() {
            return Err(CalcError::InvalidParameter("empty symbol".into()));
        }
        if self.quantity.is_zero() {
            return Err(CalcError::InvalidParameter(format!("{}: zero quantity", self.symbol)));
        }
        if self.avg_entry_price <= Decimal::ZERO {
            return Err(CalcError::InvalidParameter(format!("{}: avg_entry_price must be > 0", self.symbol)));
        }
        if self.current_price <= Decimal::ZERO {
            return Err(CalcError::InvalidParameter(format!("{}: current_price must be > 0", self.symbol)));
        }
        let opposes = |v: Decimal| !v.is_zero() && v.is_sign_negative() != self.quantity.is_sign_negative();
        if opposes(self.cost_basis) || opposes(self.market_value) {
            return Err(CalcError::InvalidParameter(format!(
                "{}: market_value/cost_basis sign must follow quantity",
                self.symbol
            )));
        }
        Ok(())
    }

    pub fn is_short(&self) -> bool { self.quantity.is_sign_negative() }
}

/// One consistent point-in-time read of account + positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub account: AccountSnapshot,
    pub positions: Vec<Position>,
}

impl Snapshot {
    pub fn new(
        taken_at: DateTime<Utc>,
        account: AccountSnapshot,
        positions: Vec<Position>,
    ) -> Result<Self, CalcError> {
        let mut seen = HashSet::with_capacity(positions.len());
        for p in &positions {
            p.validate()?;
            if !seen.insert(p.symbol.as_str()) {
                return Err(CalcError::InvalidParameter(format!("duplicate symbol {}", p.symbol)));
            }
        }
        Ok(Self { taken_at, account, positions })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    /// Always positive.
    pub quantity: Decimal,
    pub order_kind: OrderKind,
    /// Some iff order_kind == Limit.
    pub limit_price: Option<Decimal>,
}

pub type LiquidationPlan = Vec<OrderIntent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce { Day, Gtc }
impl TimeInForce {
    pub fn as_str(&self) -> &'static str { match self { TimeInForce::Day => "day", TimeInForce::Gtc => "gtc" } }
}
impl std::str::FromStr for TimeInForce {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(TimeInForce::Day),
            "gtc" => Ok(TimeInForce::Gtc),
            other => Err(format!("unknown time-in-force {other:?} (day|gtc)")),
        }
    }
}

// Events for the JSONL recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Snapshot(Snapshot),
    Plan(LiquidationPlan),
    Order { intent: OrderIntent, tif: TimeInForce },
    Note(String),
}
