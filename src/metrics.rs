// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{error, info};

use crate::calc::{compute_account_metrics, compute_position_metrics};
use crate::domain::Snapshot;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Account --------
pub static PORTFOLIO_VALUE: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("portfolio_value", "portfolio value (account currency)").unwrap());

pub static PORTFOLIO_CASH: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("portfolio_cash", "cash balance").unwrap());

pub static DAILY_CHANGE: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("portfolio_daily_change", "portfolio value minus last equity").unwrap());

// NaN while undefined (last_equity == 0)
pub static DAILY_CHANGE_PCT: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new("portfolio_daily_change_pct", "daily change in percent of last equity").unwrap()
});

// -------- Positions --------
pub static POSITIONS_ACTIVE: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("positions_active", "open positions in last snapshot").unwrap());

pub static POSITION_UNREALIZED_PL: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("position_unrealized_pl", "market value minus cost basis"),
        &["symbol"],
    )
    .unwrap()
});

// -------- Activity --------
pub static REFRESHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("refresh_total", "snapshot refreshes (label: result=ok|error)"),
        &["result"],
    )
    .unwrap()
});

pub static ORDERS_PLANNED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orders_planned_total", "liquidation orders handed to the paper gateway"),
        &["side", "kind"],
    )
    .unwrap()
});

// ---- Config visibility ----
pub static CONFIG_SOURCE_MODE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_source_mode", "data source mode (label: mode)"),
        &["mode"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(PORTFOLIO_VALUE.clone())),
        REGISTRY.register(Box::new(PORTFOLIO_CASH.clone())),
        REGISTRY.register(Box::new(DAILY_CHANGE.clone())),
        REGISTRY.register(Box::new(DAILY_CHANGE_PCT.clone())),
        REGISTRY.register(Box::new(POSITIONS_ACTIVE.clone())),
        REGISTRY.register(Box::new(POSITION_UNREALIZED_PL.clone())),
        REGISTRY.register(Box::new(REFRESHES.clone())),
        REGISTRY.register(Box::new(ORDERS_PLANNED.clone())),
        REGISTRY.register(Box::new(CONFIG_SOURCE_MODE.clone())),
    ] {
        let _ = m;
    }
}

fn to_f64(v: Decimal) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

/// Push one snapshot into the gauges.
pub fn observe_snapshot(snap: &Snapshot) {
    let acct = &snap.account;
    PORTFOLIO_VALUE.set(to_f64(acct.portfolio_value));
    PORTFOLIO_CASH.set(to_f64(acct.cash));
    DAILY_CHANGE.set(acct.daily_change().map(to_f64).unwrap_or(f64::NAN));
    // nilai lama tidak boleh tertinggal saat pct tidak terdefinisi
    match compute_account_metrics(acct) {
        Ok(m) => DAILY_CHANGE_PCT.set(to_f64(m.daily_change_pct)),
        Err(_) => DAILY_CHANGE_PCT.set(f64::NAN),
    }
    POSITIONS_ACTIVE.set(snap.positions.len() as i64);

    // symbol yang sudah ditutup tidak boleh tersisa di gauge
    POSITION_UNREALIZED_PL.reset();
    for p in &snap.positions {
        let pl = compute_position_metrics(p).map(|m| to_f64(m.unrealized_pl));
        POSITION_UNREALIZED_PL
            .with_label_values(&[&p.symbol])
            .set(pl.unwrap_or(f64::NAN));
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics) — tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Run the metrics server in a dedicated OS thread (keeps Tokio runtime clean)
pub fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                error!(%addr, ?e, "metrics bind failed, metrics disabled");
                return;
            }
        };
        info!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => error!(?e, "metrics accept error"),
            }
        }
    });
}
