// ===============================
// src/history.rs (performance over a timeframe)
// ===============================
use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calc::{pct_of, CalcError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe { D1, W1, M1, M3, M6, Y1, Ytd }

impl Timeframe {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1D" => Some(Timeframe::D1),
            "1W" => Some(Timeframe::W1),
            "1M" => Some(Timeframe::M1),
            "3M" => Some(Timeframe::M3),
            "6M" => Some(Timeframe::M6),
            "1Y" => Some(Timeframe::Y1),
            "YTD" => Some(Timeframe::Ytd),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::D1 => "1D",
            Timeframe::W1 => "1W",
            Timeframe::M1 => "1M",
            Timeframe::M3 => "3M",
            Timeframe::M6 => "6M",
            Timeframe::Y1 => "1Y",
            Timeframe::Ytd => "YTD",
        }
    }

    /// Reference day of the window ending at `today`. The baseline is the last
    /// close on or before this day (YTD: last close of the previous year).
    pub fn window_start(&self, today: NaiveDate) -> NaiveDate {
        let back = |days: i64| today - Duration::days(days);
        match self {
            Timeframe::D1 => back(1),
            Timeframe::W1 => back(7),
            Timeframe::M1 => back(30),
            Timeframe::M3 => back(91),
            Timeframe::M6 => back(182),
            Timeframe::Y1 => back(365),
            Timeframe::Ytd => NaiveDate::from_ymd_opt(today.year() - 1, 12, 31).unwrap_or(today),
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::parse(s).ok_or_else(|| format!("unknown timeframe {s:?} (1D|1W|1M|3M|6M|1Y|YTD)"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodChange {
    pub timeframe: Timeframe,
    pub start_value: Decimal,
    pub end_value: Decimal,
    pub change: Decimal,
    pub change_pct: Result<Decimal, CalcError>,
}

/// `history` must be sorted by date ascending.
///
/// Baseline: last point on or before the window start (weekends and holidays
/// have no point), else the first point inside the window when history is
/// shorter than the timeframe.
pub fn period_change(
    history: &[ValuePoint],
    timeframe: Timeframe,
    today: NaiveDate,
) -> Result<PeriodChange, CalcError> {
    let start = timeframe.window_start(today);
    let upto_today = &history[..history.partition_point(|p| p.date <= today)];
    let last = match upto_today.last() {
        Some(l) if l.date >= start => l,
        _ => {
            return Err(CalcError::InvalidParameter(format!(
                "no history points in {} window",
                timeframe.label()
            )))
        }
    };
    let split = upto_today.partition_point(|p| p.date <= start);
    let first = match split {
        0 => &upto_today[0],
        n => &upto_today[n - 1],
    };
    let change = last
        .value
        .checked_sub(first.value)
        .ok_or_else(|| crate::calc::overflow("period change"))?;
    Ok(PeriodChange {
        timeframe,
        start_value: first.value,
        end_value: last.value,
        change,
        change_pct: pct_of(change, first.value),
    })
}
