// ===============================
// src/gateway.rs (paper / dry-run)
// ===============================
use tokio::sync::mpsc;
use tracing::info;

use crate::domain::{Event, OrderIntent, TimeInForce};
use crate::metrics::ORDERS_PLANNED;

/// Consumes liquidation intents. Never talks to a broker: each intent is
/// logged, counted and recorded, then dropped.
pub async fn run_paper(
    mut rx: mpsc::Receiver<OrderIntent>,
    rec_tx: mpsc::Sender<Event>,
    tif: TimeInForce,
) -> u64 {
    let mut handled: u64 = 0;
    while let Some(intent) = rx.recv().await {
        let px = intent
            .limit_price
            .map(|p| p.round_dp(2).to_string())
            .unwrap_or_else(|| "MKT".to_string());
        info!(
            symbol = %intent.symbol,
            side = intent.side.as_str(),
            qty = %intent.quantity,
            kind = intent.order_kind.as_str(),
            px = %px,
            tif = tif.as_str(),
            "PAPER ORDER"
        );
        ORDERS_PLANNED
            .with_label_values(&[intent.side.as_str(), intent.order_kind.as_str()])
            .inc();
        let _ = rec_tx.try_send(Event::Order { intent, tif });
        handled += 1;
    }
    info!(orders = handled, "paper gateway stopped");
    handled
}
