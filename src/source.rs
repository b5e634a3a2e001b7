// ===============================
// src/source.rs
// ===============================
//
// Snapshot sources:
// - Mock : random-walk prices around a fixed seed book (no network)
// - Live : Alpaca REST (account + positions + portfolio history)
//
// The variant is chosen once at startup. A failed live refresh is an error,
// it never falls back to mock data.
//
use chrono::{Duration, NaiveDate, Utc};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::alpaca::{AccountResponse, HistoryResponse, PositionResponse};
use crate::calc::CalcError;
use crate::config::{Args, SourceMode};
use crate::domain::{AccountSnapshot, Position, Snapshot};
use crate::history::ValuePoint;

const HISTORY_DAYS: i64 = 100;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bad url: {0}")]
    Url(#[from] url::ParseError),
    #[error("broker returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("field {field}: cannot parse {value:?}")]
    Parse { field: &'static str, value: String },
    #[error("invalid broker data: {0}")]
    Invalid(#[from] CalcError),
    #[error("missing credential {0}")]
    MissingCredential(&'static str),
}

pub enum DataSource {
    Live(AlpacaSource),
    Mock(MockSource),
}

impl DataSource {
    pub fn from_args(args: &Args) -> Result<Self, SourceError> {
        match args.source {
            SourceMode::Mock => Ok(DataSource::Mock(MockSource::new())),
            SourceMode::Live => {
                let key_id = std::env::var("APCA_API_KEY_ID")
                    .map_err(|_| SourceError::MissingCredential("APCA_API_KEY_ID"))?;
                let secret = std::env::var("APCA_API_SECRET_KEY")
                    .map_err(|_| SourceError::MissingCredential("APCA_API_SECRET_KEY"))?;
                Ok(DataSource::Live(AlpacaSource::new(&args.alpaca_url, &key_id, &secret)?))
            }
        }
    }

    pub fn mode(&self) -> SourceMode {
        match self {
            DataSource::Live(_) => SourceMode::Live,
            DataSource::Mock(_) => SourceMode::Mock,
        }
    }

    pub async fn fetch_snapshot(&mut self) -> Result<Snapshot, SourceError> {
        match self {
            DataSource::Live(s) => s.fetch_snapshot().await,
            DataSource::Mock(s) => s.fetch_snapshot(),
        }
    }

    /// Daily portfolio values, oldest first.
    pub async fn fetch_history(&mut self) -> Result<Vec<ValuePoint>, SourceError> {
        match self {
            DataSource::Live(s) => s.fetch_history().await,
            DataSource::Mock(s) => Ok(s.history(Utc::now().date_naive())),
        }
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MockHolding {
    symbol: &'static str,
    qty: Decimal,
    entry: Decimal,
    price: Decimal,
}

pub struct MockSource {
    book: Vec<MockHolding>,
    cash: Decimal,
    last_equity: Decimal,
    past: Vec<Decimal>, // daily closes before today, oldest first
}

impl MockSource {
    pub fn new() -> Self {
        let seed = |symbol, qty, entry, price| MockHolding { symbol, qty, entry, price };
        let book = vec![
            seed("AAPL", dec!(100), dec!(150.25), dec!(155.50)),
            seed("GOOGL", dec!(50), dec!(2800.50), dec!(2850.25)),
            seed("TSLA", dec!(200), dec!(750.75), dec!(760.00)),
            seed("MSFT", dec!(150), dec!(285.25), dec!(290.75)),
            seed("AMZN", dec!(75), dec!(3300.50), dec!(3350.25)),
        ];
        let cash = dec!(10000);
        let last_equity = cash + book.iter().map(|h| h.qty * h.price).sum::<Decimal>();

        // walk backwards from last close, +-1.5% per day
        let mut rng = rand::thread_rng();
        let mut past = Vec::with_capacity(HISTORY_DAYS as usize);
        let mut v = last_equity;
        for _ in 0..HISTORY_DAYS - 1 {
            past.push(v);
            let step = Decimal::new(rng.gen_range(-150..=150), 4);
            v = (v / (Decimal::ONE + step)).round_dp(2);
        }
        past.reverse();

        Self { book, cash, last_equity, past }
    }

    fn portfolio_value(&self) -> Decimal {
        self.cash + self.book.iter().map(|h| h.qty * h.price).sum::<Decimal>()
    }

    pub fn fetch_snapshot(&mut self) -> Result<Snapshot, SourceError> {
        // jangan simpan ThreadRng melewati .await (fungsi ini sync)
        let mut rng = rand::thread_rng();
        for h in self.book.iter_mut() {
            let step = Decimal::new(rng.gen_range(-100..=100), 4); // +-1%
            h.price = (h.price * (Decimal::ONE + step)).round_dp(2).max(dec!(0.01));
        }

        let positions = self
            .book
            .iter()
            .map(|h| {
                Position::new(
                    h.symbol,
                    h.qty,
                    h.entry,
                    h.price,
                    h.qty * h.price,
                    h.qty * h.entry,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let account = AccountSnapshot {
            portfolio_value: self.portfolio_value(),
            cash: self.cash,
            last_equity: self.last_equity,
        };
        debug!(value = %account.portfolio_value, "mock snapshot");
        Ok(Snapshot::new(Utc::now(), account, positions)?)
    }

    pub fn history(&self, today: NaiveDate) -> Vec<ValuePoint> {
        let n = self.past.len() as i64;
        let mut pts: Vec<ValuePoint> = self
            .past
            .iter()
            .enumerate()
            .map(|(i, v)| ValuePoint { date: today - Duration::days(n - i as i64), value: *v })
            .collect();
        pts.push(ValuePoint { date: today, value: self.portfolio_value() });
        pts
    }
}

impl Default for MockSource {
    fn default() -> Self { Self::new() }
}

// ---------------------------------------------------------------------------
// Live (Alpaca)
// ---------------------------------------------------------------------------

pub struct AlpacaSource {
    http: reqwest::Client,
    base: Url,
}

impl AlpacaSource {
    pub fn new(base_url: &str, key_id: &str, secret: &str) -> Result<Self, SourceError> {
        let base = Url::parse(base_url)?;
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(key_id).map_err(|_| SourceError::MissingCredential("APCA_API_KEY_ID"))?;
        let sec = HeaderValue::from_str(secret).map_err(|_| SourceError::MissingCredential("APCA_API_SECRET_KEY"))?;
        headers.insert("APCA-API-KEY-ID", key);
        headers.insert("APCA-API-SECRET-KEY", sec);
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        info!(%base, "alpaca source ready");
        Ok(Self { http, base })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let url = self.base.join(path)?;
        let rsp = self.http.get(url).send().await?;
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(SourceError::Status { code: status.as_u16(), body });
        }
        Ok(rsp.json::<T>().await?)
    }

    pub async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
        // account & positions diambil bersamaan agar snapshot konsisten
        let (acct, positions) = futures_util::future::try_join(
            self.get_json::<AccountResponse>("/v2/account"),
            self.get_json::<Vec<PositionResponse>>("/v2/positions"),
        )
        .await?;

        let account = acct.into_account()?;
        let positions = positions
            .into_iter()
            .map(PositionResponse::into_position)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Snapshot::new(Utc::now(), account, positions)?)
    }

    pub async fn fetch_history(&self) -> Result<Vec<ValuePoint>, SourceError> {
        let rsp = self
            .get_json::<HistoryResponse>("/v2/account/portfolio/history?period=1A&timeframe=1D")
            .await?;
        rsp.into_points()
    }
}
