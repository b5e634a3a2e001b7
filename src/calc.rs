// ===============================
// src/calc.rs (portfolio metrics & liquidation plan)
// ===============================
//
// Pure functions only: no IO, no clock, no shared state.
// Undefined ratios are returned as `DivisionUndefined`; callers choose the
// fallback they display (lihat render.rs -> "N/A").
//
use ahash::AHashMap as HashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use crate::domain::{AccountSnapshot, LiquidationPlan, OrderIntent, OrderKind, Position, Side};

/// Bound for `PricePolicy::CurrentPriceWithOffset`, in percent.
pub const MAX_OFFSET_PCT: Decimal = dec!(10);

const HUNDRED: Decimal = dec!(100);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    #[error("ratio undefined: zero denominator")]
    DivisionUndefined,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("no limit price for {0}")]
    MissingPrice(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountMetrics {
    pub daily_change: Decimal,
    /// Percentage units (x100).
    pub daily_change_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionMetrics {
    pub unrealized_pl: Decimal,
    pub unrealized_pl_pct: Result<Decimal, CalcError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PricePolicy {
    /// limit = current_price * (1 + offset_pct / 100), offset_pct in [-10, 10]
    CurrentPriceWithOffset(Decimal),
    /// explicit price per symbol; every symbol of the plan must be present
    CustomPrice(HashMap<String, Decimal>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiquidationMode {
    Market,
    Limit(PricePolicy),
}

impl LiquidationMode {
    pub fn order_kind(&self) -> OrderKind {
        match self {
            LiquidationMode::Market => OrderKind::Market,
            LiquidationMode::Limit(_) => OrderKind::Limit,
        }
    }
}

pub(crate) fn overflow(what: &str) -> CalcError {
    CalcError::InvalidParameter(format!("{what} overflow"))
}

/// `numer / denom * 100`, undefined when `denom` is zero.
pub fn pct_of(numer: Decimal, denom: Decimal) -> Result<Decimal, CalcError> {
    if denom.is_zero() {
        return Err(CalcError::DivisionUndefined);
    }
    numer
        .checked_div(denom)
        .and_then(|r| r.checked_mul(HUNDRED))
        .ok_or_else(|| overflow("ratio"))
}

pub fn compute_account_metrics(snapshot: &AccountSnapshot) -> Result<AccountMetrics, CalcError> {
    if snapshot.last_equity < Decimal::ZERO {
        return Err(CalcError::InvalidParameter("last_equity must be >= 0".into()));
    }
    let daily_change = snapshot.daily_change()?;
    let daily_change_pct = pct_of(daily_change, snapshot.last_equity)?;
    Ok(AccountMetrics { daily_change, daily_change_pct })
}

/// `cost_basis` carries the sign of the quantity (see `Position`); the
/// percentage uses its magnitude so the sign of the return follows the P&L.
pub fn compute_position_metrics(position: &Position) -> Result<PositionMetrics, CalcError> {
    let unrealized_pl = position
        .market_value
        .checked_sub(position.cost_basis)
        .ok_or_else(|| overflow("unrealized_pl"))?;
    Ok(PositionMetrics {
        unrealized_pl,
        unrealized_pl_pct: pct_of(unrealized_pl, position.cost_basis.abs()),
    })
}

fn check_offset(offset_pct: Decimal) -> Result<(), CalcError> {
    if offset_pct < -MAX_OFFSET_PCT || offset_pct > MAX_OFFSET_PCT {
        return Err(CalcError::InvalidParameter(format!(
            "offset_pct {offset_pct} outside [-{MAX_OFFSET_PCT}, {MAX_OFFSET_PCT}]"
        )));
    }
    Ok(())
}

fn limit_price_for(p: &Position, policy: &PricePolicy) -> Result<Decimal, CalcError> {
    match policy {
        PricePolicy::CurrentPriceWithOffset(offset_pct) => {
            offset_pct
                .checked_div(HUNDRED)
                .and_then(|f| p.current_price.checked_mul(Decimal::ONE + f))
                .ok_or_else(|| overflow("limit price"))
        }
        PricePolicy::CustomPrice(prices) => {
            let px = *prices
                .get(&p.symbol)
                .ok_or_else(|| CalcError::MissingPrice(p.symbol.clone()))?;
            if px <= Decimal::ZERO {
                return Err(CalcError::InvalidParameter(format!("{}: limit price must be > 0", p.symbol)));
            }
            Ok(px)
        }
    }
}

/// Close every position. Input order is kept; any error discards the whole plan.
pub fn build_liquidation_plan(
    positions: &[Position],
    mode: &LiquidationMode,
) -> Result<LiquidationPlan, CalcError> {
    // precondition check first, even for an empty book
    if let LiquidationMode::Limit(PricePolicy::CurrentPriceWithOffset(off)) = mode {
        check_offset(*off)?;
    }

    let mut plan = Vec::with_capacity(positions.len());
    for p in positions {
        if p.quantity.is_zero() {
            return Err(CalcError::InvalidParameter(format!("{}: zero quantity", p.symbol)));
        }
        let side = if p.quantity.is_sign_positive() { Side::Sell } else { Side::Buy };
        let limit_price = match mode {
            LiquidationMode::Market => None,
            LiquidationMode::Limit(policy) => Some(limit_price_for(p, policy)?),
        };
        plan.push(OrderIntent {
            symbol: p.symbol.clone(),
            side,
            quantity: p.quantity.abs(),
            order_kind: mode.order_kind(),
            limit_price,
        });
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(value: Decimal, last: Decimal) -> AccountSnapshot {
        AccountSnapshot { portfolio_value: value, cash: dec!(1000), last_equity: last }
    }

    fn pos(sym: &str, qty: Decimal, px: Decimal) -> Position {
        Position {
            symbol: sym.into(),
            quantity: qty,
            avg_entry_price: dec!(90),
            current_price: px,
            market_value: qty * px,
            cost_basis: qty * dec!(90),
        }
    }

    #[test]
    fn daily_change_pct_matches_formula() {
        let a = account(dec!(10450.25), dec!(10000));
        let m = compute_account_metrics(&a).unwrap();
        assert_eq!(m.daily_change, dec!(450.25));
        assert_eq!(m.daily_change_pct, (dec!(10450.25) - dec!(10000)) / dec!(10000) * dec!(100));
        assert_eq!(m.daily_change_pct, dec!(4.5025));
    }

    #[test]
    fn daily_change_negative() {
        let m = compute_account_metrics(&account(dec!(9900), dec!(10000))).unwrap();
        assert_eq!(m.daily_change, dec!(-100));
        assert_eq!(m.daily_change_pct, dec!(-1));
    }

    #[test]
    fn zero_last_equity_is_undefined() {
        let err = compute_account_metrics(&account(dec!(500), dec!(0))).unwrap_err();
        assert_eq!(err, CalcError::DivisionUndefined);
    }

    #[test]
    fn negative_last_equity_rejected() {
        let err = compute_account_metrics(&account(dec!(500), dec!(-1))).unwrap_err();
        assert!(matches!(err, CalcError::InvalidParameter(_)));
    }

    #[test]
    fn position_metrics_long() {
        let m = compute_position_metrics(&pos("AAPL", dec!(100), dec!(99))).unwrap();
        assert_eq!(m.unrealized_pl, dec!(900));
        assert_eq!(m.unrealized_pl_pct, Ok(dec!(10)));
    }

    #[test]
    fn position_metrics_zero_cost_basis() {
        let mut p = pos("AAPL", dec!(10), dec!(5));
        p.cost_basis = Decimal::ZERO;
        let m = compute_position_metrics(&p).unwrap();
        assert_eq!(m.unrealized_pl, dec!(50));
        assert_eq!(m.unrealized_pl_pct, Err(CalcError::DivisionUndefined));
    }

    #[test]
    fn short_losing_money_has_negative_return() {
        // TSLA short 50 @ 750.75, now 760
        let p = Position {
            symbol: "TSLA".into(),
            quantity: dec!(-50),
            avg_entry_price: dec!(750.75),
            current_price: dec!(760),
            market_value: dec!(-38000),
            cost_basis: dec!(-37537.50),
        };
        let m = compute_position_metrics(&p).unwrap();
        assert_eq!(m.unrealized_pl, dec!(-462.50));
        assert_eq!(m.unrealized_pl_pct, pct_of(dec!(-462.50), dec!(37537.50)));
        assert!(m.unrealized_pl_pct.unwrap() < Decimal::ZERO);
    }

    #[test]
    fn short_gaining_money_has_positive_return() {
        let m = compute_position_metrics(&pos("TSLA", dec!(-10), dec!(81))).unwrap();
        // mv -810, cost -900
        assert_eq!(m.unrealized_pl, dec!(90));
        assert_eq!(m.unrealized_pl_pct, Ok(dec!(10)));
    }

    #[test]
    fn extreme_values_error_instead_of_panicking() {
        let mut p = pos("AAPL", dec!(1), dec!(1));
        p.market_value = Decimal::MAX;
        p.cost_basis = Decimal::MIN;
        assert!(matches!(compute_position_metrics(&p), Err(CalcError::InvalidParameter(_))));

        let a = account(Decimal::MIN, Decimal::MAX);
        assert!(matches!(compute_account_metrics(&a), Err(CalcError::InvalidParameter(_))));

        let p = pos("AAPL", dec!(1), Decimal::MAX);
        let mode = LiquidationMode::Limit(PricePolicy::CurrentPriceWithOffset(dec!(10)));
        assert!(matches!(build_liquidation_plan(&[p], &mode), Err(CalcError::InvalidParameter(_))));
    }

    #[test]
    fn position_metrics_idempotent() {
        let p = pos("GOOGL", dec!(-4), dec!(120));
        assert_eq!(compute_position_metrics(&p), compute_position_metrics(&p));
    }

    #[test]
    fn empty_plan() {
        let plan = build_liquidation_plan(&[], &LiquidationMode::Market).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn long_sells_short_buys() {
        let positions = vec![pos("MSFT", dec!(150), dec!(100)), pos("TSLA", dec!(-50), dec!(100))];
        let plan = build_liquidation_plan(&positions, &LiquidationMode::Market).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].symbol.as_str(), plan[0].side, plan[0].quantity), ("MSFT", Side::Sell, dec!(150)));
        assert_eq!((plan[1].symbol.as_str(), plan[1].side, plan[1].quantity), ("TSLA", Side::Buy, dec!(50)));
        assert!(plan.iter().all(|o| o.order_kind == OrderKind::Market && o.limit_price.is_none()));
    }

    #[test]
    fn limit_with_offset() {
        let mode = LiquidationMode::Limit(PricePolicy::CurrentPriceWithOffset(dec!(-0.5)));
        let plan = build_liquidation_plan(&[pos("AAPL", dec!(10), dec!(100.00))], &mode).unwrap();
        assert_eq!(plan[0].order_kind, OrderKind::Limit);
        assert_eq!(plan[0].limit_price, Some(dec!(99.50)));
    }

    #[test]
    fn offset_out_of_range_rejected_even_when_empty() {
        let mode = LiquidationMode::Limit(PricePolicy::CurrentPriceWithOffset(dec!(10.5)));
        assert!(matches!(build_liquidation_plan(&[], &mode), Err(CalcError::InvalidParameter(_))));
        let mode = LiquidationMode::Limit(PricePolicy::CurrentPriceWithOffset(dec!(-10)));
        assert!(build_liquidation_plan(&[], &mode).is_ok());
        let mode = LiquidationMode::Limit(PricePolicy::CurrentPriceWithOffset(dec!(10)));
        let plan = build_liquidation_plan(&[pos("AAPL", dec!(1), dec!(100))], &mode).unwrap();
        assert_eq!(plan[0].limit_price, Some(dec!(110)));
    }

    #[test]
    fn custom_price_missing_symbol_is_all_or_nothing() {
        let positions = vec![
            pos("AAPL", dec!(1), dec!(150)),
            pos("GOOGL", dec!(2), dec!(2800)),
            pos("AMZN", dec!(3), dec!(3300)),
        ];
        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), dec!(151));
        prices.insert("AMZN".to_string(), dec!(3301));
        let mode = LiquidationMode::Limit(PricePolicy::CustomPrice(prices));
        let res = build_liquidation_plan(&positions, &mode);
        assert_eq!(res, Err(CalcError::MissingPrice("GOOGL".into())));
    }

    #[test]
    fn custom_price_non_positive_rejected() {
        let positions = vec![
            pos("AAPL", dec!(1), dec!(150)),
            pos("GOOGL", dec!(2), dec!(2800)),
            pos("AMZN", dec!(3), dec!(3300)),
        ];
        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), dec!(151));
        prices.insert("GOOGL".to_string(), dec!(0));
        prices.insert("AMZN".to_string(), dec!(3301));
        let mode = LiquidationMode::Limit(PricePolicy::CustomPrice(prices));
        assert!(matches!(build_liquidation_plan(&positions, &mode), Err(CalcError::InvalidParameter(_))));
    }

    #[test]
    fn custom_price_used_verbatim() {
        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), dec!(151.25));
        let mode = LiquidationMode::Limit(PricePolicy::CustomPrice(prices));
        let plan = build_liquidation_plan(&[pos("AAPL", dec!(-7), dec!(150))], &mode).unwrap();
        assert_eq!(plan[0].side, Side::Buy);
        assert_eq!(plan[0].quantity, dec!(7));
        assert_eq!(plan[0].limit_price, Some(dec!(151.25)));
    }

    #[test]
    fn zero_quantity_rejected() {
        let p = pos("AAPL", dec!(0), dec!(10));
        assert!(matches!(
            build_liquidation_plan(&[p], &LiquidationMode::Market),
            Err(CalcError::InvalidParameter(_))
        ));
    }
}
