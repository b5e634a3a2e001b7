// ===============================
// src/render.rs (text dashboard)
// ===============================
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;

use crate::calc::{compute_account_metrics, compute_position_metrics, CalcError};
use crate::domain::Snapshot;
use crate::history::PeriodChange;

const NA: &str = "N/A";

fn round2(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn group_thousands(int_part: &str) -> String {
    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `$1,234.50` / `-$12.00`
pub fn format_currency(v: Decimal) -> String {
    let r = round2(v);
    let body = format!("{:.2}", r.abs());
    let (int_part, frac) = body.split_once('.').unwrap_or((body.as_str(), "00"));
    let sign = if r.is_sign_negative() && !r.is_zero() { "-" } else { "" };
    format!("{sign}${}.{frac}", group_thousands(int_part))
}

/// `+4.50%` / `-0.25%` / `N/A`
pub fn format_pct(v: Result<Decimal, CalcError>) -> String {
    match v {
        Ok(p) => {
            let r = round2(p);
            let sign = if r.is_sign_negative() && !r.is_zero() { "-" } else { "+" };
            format!("{sign}{:.2}%", r.abs())
        }
        Err(_) => NA.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub label: &'static str,
    pub value: String,
    pub delta: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub symbol: String,
    pub quantity: String,
    pub entry: String,
    pub current: String,
    pub pl: String,
    pub pl_pct: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub cards: Vec<Card>,
    pub rows: Vec<PositionRow>,
}

impl DashboardView {
    pub fn build(snap: &Snapshot, period: Option<&PeriodChange>) -> Self {
        let acct = &snap.account;
        let pct = compute_account_metrics(acct).map(|m| m.daily_change_pct);

        let mut cards = vec![
            Card { label: "Portfolio Value", value: format_currency(acct.portfolio_value), delta: Some(format_pct(pct)) },
            Card {
                label: "Daily P&L",
                value: acct.daily_change().map(format_currency).unwrap_or_else(|_| NA.to_string()),
                delta: None,
            },
            Card { label: "Cash", value: format_currency(acct.cash), delta: None },
            Card {
                label: "Active Positions",
                value: snap.positions.len().to_string(),
                delta: Some(format!("{} short", snap.positions.iter().filter(|p| p.is_short()).count())),
            },
        ];
        if let Some(pc) = period {
            cards.push(Card {
                label: "Period Change",
                value: format!("{} {}", pc.timeframe.label(), format_currency(pc.change)),
                delta: Some(format_pct(pc.change_pct.clone())),
            });
        }

        let rows = snap
            .positions
            .iter()
            .map(|p| {
                let (pl, pl_pct) = match compute_position_metrics(p) {
                    Ok(m) => (format_currency(m.unrealized_pl), format_pct(m.unrealized_pl_pct)),
                    Err(_) => (NA.to_string(), NA.to_string()),
                };
                PositionRow {
                    symbol: p.symbol.clone(),
                    quantity: p.quantity.normalize().to_string(),
                    entry: format_currency(p.avg_entry_price),
                    current: format_currency(p.current_price),
                    pl,
                    pl_pct,
                }
            })
            .collect();

        Self { cards, rows }
    }

    pub fn log(&self) {
        for c in &self.cards {
            match &c.delta {
                Some(d) => info!(card = c.label, value = %c.value, delta = %d, "dashboard"),
                None => info!(card = c.label, value = %c.value, "dashboard"),
            }
        }
        for r in &self.rows {
            info!(
                symbol = %r.symbol,
                qty = %r.quantity,
                entry = %r.entry,
                current = %r.current,
                pl = %r.pl,
                pl_pct = %r.pl_pct,
                "position"
            );
        }
    }
}
