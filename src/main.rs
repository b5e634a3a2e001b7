// ===============================
// src/main.rs
// ===============================
/*
 # satu kali refresh dengan mock data, lalu keluar
 cargo run -- --once

 # live (Alpaca paper), rencanakan likuidasi limit -0.5% dari harga sekarang
 DATA_SOURCE=live APCA_API_KEY_ID=... APCA_API_SECRET_KEY=... \
   cargo run -- --once --liquidate --order-kind limit --offset-pct -0.5

 curl -s localhost:9898/metrics | egrep '^portfolio_|^positions_active'
*/
/*
=============================================================================
Project : portfolio_dash — portfolio dashboard backend in Rust
Module  : main.rs
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
mod alpaca;    // REST payloads + boundary validation
mod calc;      // pure metrics & liquidation plan
mod config;
mod domain;
mod gateway;   // paper gateway (log + record, no broker)
mod history;
mod metrics;
mod recorder;
mod render;
mod source;    // DataSource::{Live, Mock}

use tokio::{
    select,
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::calc::build_liquidation_plan;
use crate::config::Args;
use crate::domain::{Event, OrderIntent, Snapshot};
use crate::history::period_change;
use crate::render::DashboardView;
use crate::source::{DataSource, SourceError};

async fn refresh(
    source: &mut DataSource,
    args: &Args,
    rec_tx: &mpsc::Sender<Event>,
) -> Result<Snapshot, SourceError> {
    let snap = source.fetch_snapshot().await?;

    let history = match source.fetch_history().await {
        Ok(h) => h,
        Err(e) => {
            warn!(?e, "history unavailable");
            Vec::new()
        }
    };
    let period = match period_change(&history, args.timeframe, snap.taken_at.date_naive()) {
        Ok(p) => Some(p),
        Err(e) => {
            debug!(%e, timeframe = args.timeframe.label(), "no period change");
            None
        }
    };

    metrics::observe_snapshot(&snap);
    DashboardView::build(&snap, period.as_ref()).log();
    let _ = rec_tx.try_send(Event::Snapshot(snap.clone()));
    Ok(snap)
}

async fn liquidate(
    snap: &Snapshot,
    args: &Args,
    ord_tx: &mpsc::Sender<OrderIntent>,
    rec_tx: &mpsc::Sender<Event>,
) {
    let mode = args.liquidation_mode();
    let plan = match build_liquidation_plan(&snap.positions, &mode) {
        Ok(plan) => plan,
        Err(e) => {
            warn!(%e, ?mode, "liquidation rejected, no orders sent");
            let _ = rec_tx.try_send(Event::Note(format!("liquidation rejected: {e}")));
            return;
        }
    };
    info!(orders = plan.len(), kind = mode.order_kind().as_str(), "liquidation plan");
    let _ = rec_tx.try_send(Event::Plan(plan.clone()));
    for intent in plan {
        if ord_tx.send(intent).await.is_err() {
            error!("paper gateway closed");
            break;
        }
    }
}

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Load config ----
    let args = config::load();

    // ---- Metrics ----
    metrics::init();
    metrics::serve_metrics(args.metrics_port);

    // ---- Data source (dipilih sekali) ----
    let mut source = match DataSource::from_args(&args) {
        Ok(s) => s,
        Err(e) => {
            error!(%e, "data source init failed");
            std::process::exit(2);
        }
    };
    let mode_str = source.mode().as_str();
    crate::metrics::CONFIG_SOURCE_MODE.with_label_values(&[mode_str]).set(1);

    info!(
        source = %mode_str,
        refresh_secs = args.refresh_secs,
        once = args.once,
        timeframe = args.timeframe.label(),
        liquidate = args.liquidate,
        order_kind = args.order_kind.as_str(),
        tif = args.time_in_force.as_str(),
        "startup config"
    );

    // ---- Recorder (optional) ----
    let (rec_tx, rec_rx) = mpsc::channel::<Event>(8192);
    let rec_task = args.record_file.clone().map(|path| tokio::spawn(recorder::run(rec_rx, path)));

    // ---- Paper gateway ----
    let (ord_tx, ord_rx) = mpsc::channel::<OrderIntent>(1024);
    let gw_task = tokio::spawn(gateway::run_paper(ord_rx, rec_tx.clone(), args.time_in_force));

    // ---- Refresh loop ----
    let mut tick = interval(Duration::from_secs(args.refresh_secs.max(1)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut liquidation_pending = args.liquidate;

    loop {
        select! {
            _ = tick.tick() => {
                match refresh(&mut source, &args, &rec_tx).await {
                    Ok(snap) => {
                        crate::metrics::REFRESHES.with_label_values(&["ok"]).inc();
                        info!(
                            value = %snap.account.portfolio_value,
                            positions = snap.positions.len(),
                            "refresh"
                        );
                        if liquidation_pending {
                            liquidation_pending = false;
                            liquidate(&snap, &args, &ord_tx, &rec_tx).await;
                        }
                    }
                    Err(e) => {
                        crate::metrics::REFRESHES.with_label_values(&["error"]).inc();
                        error!(%e, "refresh failed");
                    }
                }
                if args.once {
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c, shutting down");
                break;
            }
        }
    }

    // ---- Shutdown: tutup channel lalu tunggu task selesai ----
    drop(ord_tx);
    let _ = gw_task.await;
    drop(rec_tx);
    if let Some(t) = rec_task {
        let _ = t.await;
    }
}
