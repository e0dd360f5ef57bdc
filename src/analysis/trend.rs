// src/analysis/trend.rs
use crate::extractors::MetricRecord;
use serde::{Deserialize, Serialize};

// Average margin change (percentage points) needed to call a direction.
const MARGIN_TREND_THRESHOLD: f64 = 0.3;
// Keeps values like 20.3 - 20.0 from crossing the threshold by rounding noise.
const THRESHOLD_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginTrend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    #[serde(default)]
    pub revenue_qoq_pct: Option<f64>,
    #[serde(default)]
    pub net_profit_qoq_pct: Option<f64>,
    #[serde(default)]
    pub margin_trend: Option<MarginTrend>,
}

/// Records plus the trend computed over them, as handed to synthesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericResults {
    pub quarters: Vec<MetricRecord>,
    pub trend_summary: TrendSummary,
}

impl NumericResults {
    pub fn from_records(quarters: Vec<MetricRecord>) -> Self {
        let trend_summary = summarize(&quarters);
        Self { quarters, trend_summary }
    }

    pub fn periods(&self) -> Vec<String> {
        self.quarters.iter().map(|q| q.period.clone()).collect()
    }
}

/// Percentage change from `previous` to `latest`; absent when either side is
/// missing or `previous` is zero.
pub fn pct_change(latest: Option<f64>, previous: Option<f64>) -> Option<f64> {
    let (latest, previous) = (latest?, previous?);
    if previous == 0.0 {
        return None;
    }
    Some((latest - previous) / previous.abs() * 100.0)
}

/// Operating margin for one record: the stated percent, or one derived from
/// operating profit over revenue.
pub fn margin_of(record: &MetricRecord) -> Option<f64> {
    if let Some(pct) = record.operating_margin_pct {
        return Some(pct);
    }
    match (record.operating_profit_amt, record.revenue_cr) {
        (Some(amount), Some(revenue)) if revenue != 0.0 => Some(amount / revenue * 100.0),
        _ => None,
    }
}

pub fn classify_margins(margins: &[f64]) -> Option<MarginTrend> {
    match margins.len() {
        0 => None,
        1 => Some(MarginTrend::Stable),
        _ => {
            let diffs: Vec<f64> = margins.windows(2).map(|w| w[1] - w[0]).collect();
            let avg = diffs.iter().sum::<f64>() / diffs.len() as f64;
            if avg > MARGIN_TREND_THRESHOLD + THRESHOLD_TOLERANCE {
                Some(MarginTrend::Improving)
            } else if avg < -MARGIN_TREND_THRESHOLD - THRESHOLD_TOLERANCE {
                Some(MarginTrend::Declining)
            } else {
                Some(MarginTrend::Stable)
            }
        }
    }
}

/// Builds the trend summary for records ordered oldest first.
pub fn summarize(records: &[MetricRecord]) -> TrendSummary {
    let (revenue_qoq_pct, net_profit_qoq_pct) = match records {
        [.., previous, latest] => (
            pct_change(latest.revenue_cr, previous.revenue_cr),
            pct_change(latest.net_profit_cr, previous.net_profit_cr),
        ),
        _ => (None, None),
    };

    let margins: Vec<f64> = records.iter().filter_map(margin_of).collect();

    TrendSummary {
        revenue_qoq_pct,
        net_profit_qoq_pct,
        margin_trend: classify_margins(&margins),
    }
}
