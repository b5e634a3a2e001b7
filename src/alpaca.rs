// ===============================
// src/alpaca.rs
// ===============================
//
// Alpaca REST payloads. Account/position numbers arrive as JSON strings,
// history equity as JSON numbers (kept verbatim via serde_json
// `arbitrary_precision`). Everything is parsed into Decimal here and
// validated before it becomes a domain type.
//
use chrono::DateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Number;

use crate::domain::{AccountSnapshot, Position};
use crate::history::ValuePoint;
use crate::source::SourceError;

/// Money fields follow the sign of the quantity, whatever sign the broker sent.
fn signed_like(qty: Decimal, v: Decimal) -> Decimal {
    if qty.is_sign_negative() { -v.abs() } else { v.abs() }
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, SourceError> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|_| SourceError::Parse { field, value: raw.to_string() })
}

// --- GET /v2/account ---
#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub portfolio_value: String,
    pub cash: String,
    pub last_equity: String,
}

impl AccountResponse {
    pub fn into_account(self) -> Result<AccountSnapshot, SourceError> {
        Ok(AccountSnapshot {
            portfolio_value: parse_decimal("portfolio_value", &self.portfolio_value)?,
            cash: parse_decimal("cash", &self.cash)?,
            last_equity: parse_decimal("last_equity", &self.last_equity)?,
        })
    }
}

// --- GET /v2/positions ---
#[derive(Debug, Deserialize)]
pub struct PositionResponse {
    pub symbol: String,
    pub qty: String,
    #[serde(default)]
    pub side: Option<String>, // "long" | "short"
    pub avg_entry_price: String,
    pub current_price: String,
    pub market_value: String,
    #[serde(default)]
    pub cost_basis: Option<String>,
}

impl PositionResponse {
    pub fn into_position(self) -> Result<Position, SourceError> {
        let mut qty = parse_decimal("qty", &self.qty)?;
        // short kadang dikirim dengan qty positif + side=short
        if self.side.as_deref() == Some("short") && qty.is_sign_positive() {
            qty = -qty;
        }
        let avg_entry_price = parse_decimal("avg_entry_price", &self.avg_entry_price)?;
        let cost_basis = match self.cost_basis.as_deref() {
            Some(raw) => signed_like(qty, parse_decimal("cost_basis", raw)?),
            None => qty
                .checked_mul(avg_entry_price)
                .ok_or_else(|| crate::calc::overflow("cost_basis"))?,
        };
        let market_value = signed_like(qty, parse_decimal("market_value", &self.market_value)?);
        let position = Position::new(
            self.symbol,
            qty,
            avg_entry_price,
            parse_decimal("current_price", &self.current_price)?,
            market_value,
            cost_basis,
        )?;
        Ok(position)
    }
}

// --- GET /v2/account/portfolio/history ---
#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub timestamp: Vec<i64>,
    pub equity: Vec<Option<Number>>,
}

fn number_to_decimal(n: &Number) -> Result<Decimal, SourceError> {
    let raw = n.to_string();
    raw.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| SourceError::Parse { field: "equity", value: raw })
}

impl HistoryResponse {
    /// Points without an equity value (market holidays) are skipped.
    pub fn into_points(self) -> Result<Vec<ValuePoint>, SourceError> {
        let mut out = Vec::with_capacity(self.timestamp.len());
        for (ts, eq) in self.timestamp.into_iter().zip(self.equity) {
            let Some(eq) = eq else { continue };
            let date = DateTime::from_timestamp(ts, 0)
                .ok_or(SourceError::Parse { field: "timestamp", value: ts.to_string() })?
                .date_naive();
            out.push(ValuePoint { date, value: number_to_decimal(&eq)? });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{compute_position_metrics, CalcError};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn account_payload() {
        // Contoh payload (dipotong):
        let raw = r#"{"id":"x","cash":"2500.10","portfolio_value":"10450.25","last_equity":"10000","equity":"10450.25"}"#;
        let acct = serde_json::from_str::<AccountResponse>(raw).unwrap().into_account().unwrap();
        assert_eq!(acct.portfolio_value, dec!(10450.25));
        assert_eq!(acct.cash, dec!(2500.10));
        assert_eq!(acct.last_equity, dec!(10000));
    }

    #[test]
    fn bad_number_names_field() {
        let raw = r#"{"cash":"n/a","portfolio_value":"1","last_equity":"1"}"#;
        let err = serde_json::from_str::<AccountResponse>(raw).unwrap().into_account().unwrap_err();
        match err {
            SourceError::Parse { field, value } => {
                assert_eq!(field, "cash");
                assert_eq!(value, "n/a");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_position_is_negative() {
        let raw = r#"{"symbol":"TSLA","qty":"50","side":"short","avg_entry_price":"750.75",
                      "current_price":"760","market_value":"-38000","cost_basis":"-37537.5"}"#;
        let p = serde_json::from_str::<PositionResponse>(raw).unwrap().into_position().unwrap();
        assert_eq!(p.quantity, dec!(-50));
        assert!(p.is_short());
    }

    #[test]
    fn short_pl_same_with_or_without_cost_basis() {
        let with = r#"{"symbol":"TSLA","qty":"-50","side":"short","avg_entry_price":"750.75",
                       "current_price":"760","market_value":"-38000","cost_basis":"-37537.5"}"#;
        let without = r#"{"symbol":"TSLA","qty":"-50","side":"short","avg_entry_price":"750.75",
                          "current_price":"760","market_value":"-38000"}"#;
        let unsigned = r#"{"symbol":"TSLA","qty":"50","side":"short","avg_entry_price":"750.75",
                           "current_price":"760","market_value":"38000","cost_basis":"37537.5"}"#;

        let metrics: Vec<_> = [with, without, unsigned]
            .iter()
            .map(|raw| {
                let p = serde_json::from_str::<PositionResponse>(raw).unwrap().into_position().unwrap();
                assert_eq!(p.cost_basis, dec!(-37537.5));
                assert_eq!(p.market_value, dec!(-38000));
                compute_position_metrics(&p).unwrap()
            })
            .collect();
        for m in &metrics {
            assert_eq!(m.unrealized_pl, dec!(-462.5));
            assert!(m.unrealized_pl_pct.clone().unwrap() < Decimal::ZERO);
        }
        assert_eq!(metrics[0], metrics[1]);
        assert_eq!(metrics[1], metrics[2]);
    }

    #[test]
    fn missing_cost_basis_is_derived() {
        let raw = r#"{"symbol":"AAPL","qty":"100","avg_entry_price":"150.25","current_price":"155.5","market_value":"15550"}"#;
        let p = serde_json::from_str::<PositionResponse>(raw).unwrap().into_position().unwrap();
        assert_eq!(p.cost_basis, dec!(15025));
    }

    #[test]
    fn zero_qty_rejected_at_boundary() {
        let raw = r#"{"symbol":"AAPL","qty":"0","avg_entry_price":"1","current_price":"1","market_value":"0"}"#;
        let err = serde_json::from_str::<PositionResponse>(raw).unwrap().into_position().unwrap_err();
        assert!(matches!(err, SourceError::Invalid(CalcError::InvalidParameter(_))));
    }

    #[test]
    fn history_skips_nulls() {
        let raw = r#"{"timestamp":[1767225600,1767312000,1767398400],"equity":[10000.0,null,10100.5]}"#;
        let pts = serde_json::from_str::<HistoryResponse>(raw).unwrap().into_points().unwrap();
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0].date, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(pts[1].value, dec!(10100.5));
    }

    #[test]
    fn history_equity_keeps_every_digit() {
        // lebih presisi dari f64
        let raw = r#"{"timestamp":[1767225600,1767312000],"equity":[10000.123456789012345678,1.5e3]}"#;
        let pts = serde_json::from_str::<HistoryResponse>(raw).unwrap().into_points().unwrap();
        assert_eq!(pts[0].value, dec!(10000.123456789012345678));
        assert_eq!(pts[1].value, dec!(1500));
    }
}
