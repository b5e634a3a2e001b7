// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : portfolio_dash — portfolio dashboard backend in Rust
Module  : config.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Reads an account snapshot (mock/Alpaca), derives daily and
          per-position P&L, renders a text dashboard, plans manual
          liquidation orders for a paper gateway, exposes Prometheus
          metrics, and records JSONL events.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use ahash::AHashMap as HashMap;
use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use rust_decimal::Decimal;

use crate::calc::{LiquidationMode, PricePolicy};
use crate::domain::{OrderKind, TimeInForce};
use crate::history::Timeframe;

/// Sumber data snapshot, dipilih sekali saat startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceMode {
    Mock,
    Live,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Mock => "mock",
            SourceMode::Live => "live",
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(name = "portfolio_dash", version, about = "Portfolio dashboard with manual liquidation planning")]
pub struct Args {
    // data source
    #[arg(long, value_enum, env = "DATA_SOURCE", default_value = "mock")]
    pub source: SourceMode,
    #[arg(long, env = "ALPACA_BASE_URL", default_value = "https://paper-api.alpaca.markets")]
    pub alpaca_url: String,

    // refresh loop
    #[arg(long, env = "REFRESH_SECS", default_value_t = 30)]
    pub refresh_secs: u64,
    /// Refresh once and exit.
    #[arg(long)]
    pub once: bool,
    #[arg(long, env = "TIMEFRAME", default_value = "1M")]
    pub timeframe: Timeframe,

    // files/metrics
    #[arg(long, env = "METRICS_PORT", default_value_t = 9898)]
    pub metrics_port: u16,
    #[arg(long, env = "RECORD_FILE")]
    pub record_file: Option<String>,

    // liquidation
    /// Close every open position after the first refresh.
    #[arg(long)]
    pub liquidate: bool,
    #[arg(long, env = "ORDER_KIND", default_value = "market")]
    pub order_kind: OrderKind,
    /// Limit offset from current price, percent in [-10, 10].
    #[arg(long, env = "LIMIT_OFFSET_PCT", default_value = "0", allow_hyphen_values = true)]
    pub offset_pct: Decimal,
    /// Custom limit price, SYMBOL=PRICE (repeatable). Overrides --offset-pct.
    #[arg(long = "price", value_parser = parse_price)]
    pub prices: Vec<(String, Decimal)>,
    #[arg(long, env = "TIME_IN_FORCE", default_value = "day")]
    pub time_in_force: TimeInForce,
}

impl Args {
    pub fn liquidation_mode(&self) -> LiquidationMode {
        match self.order_kind {
            OrderKind::Market => LiquidationMode::Market,
            OrderKind::Limit if !self.prices.is_empty() => {
                let map: HashMap<String, Decimal> = self.prices.iter().cloned().collect();
                LiquidationMode::Limit(PricePolicy::CustomPrice(map))
            }
            OrderKind::Limit => LiquidationMode::Limit(PricePolicy::CurrentPriceWithOffset(self.offset_pct)),
        }
    }
}

fn parse_price(s: &str) -> Result<(String, Decimal), String> {
    let (sym, px) = s
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=PRICE, got {s:?}"))?;
    let sym = sym.trim().to_ascii_uppercase();
    if sym.is_empty() {
        return Err(format!("empty symbol in {s:?}"));
    }
    let px: Decimal = px.trim().parse().map_err(|e| format!("bad price in {s:?}: {e}"))?;
    Ok((sym, px))
}

pub fn load() -> Args {
    // Pastikan .env dibaca sebelum clap melihat env
    let _ = dotenv();
    Args::parse()
}
