// src/extractors/report.rs
use crate::extractors::classifier::{self, MetricKind, MetricValue};
use serde::{Deserialize, Serialize};

/// Metrics recovered from one quarterly report. Amounts are in crores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub period: String,
    #[serde(default)]
    pub revenue_cr: Option<f64>,
    #[serde(default)]
    pub net_profit_cr: Option<f64>,
    #[serde(default)]
    pub operating_margin_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_profit_amt: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
}

impl MetricRecord {
    pub fn new(period: impl Into<String>) -> Self {
        Self { period: period.into(), ..Self::default() }
    }

    fn holds(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Revenue => self.revenue_cr.is_some(),
            MetricKind::NetProfit => self.net_profit_cr.is_some(),
            MetricKind::Operating => self.operating_margin_pct.is_some() || self.operating_profit_amt.is_some(),
            MetricKind::Eps => self.eps.is_some(),
        }
    }

    /// First value wins; a field that is already set is left alone.
    fn merge(&mut self, value: MetricValue) {
        let (slot, n) = match value {
            MetricValue::Revenue(n) => (&mut self.revenue_cr, n),
            MetricValue::NetProfit(n) => (&mut self.net_profit_cr, n),
            MetricValue::OperatingMarginPct(n) => (&mut self.operating_margin_pct, n),
            MetricValue::OperatingProfitAmt(n) => (&mut self.operating_profit_amt, n),
            MetricValue::Eps(n) => (&mut self.eps, n),
        };
        slot.get_or_insert(n);
    }
}

/// Scans a report's text line by line and assembles its metric record.
pub fn extract_metrics(text: &str, period: &str) -> MetricRecord {
    let mut record = MetricRecord::new(period);

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let values = classifier::classify_line(line, |kind| record.holds(kind));
        for value in values {
            record.merge(value);
        }
    }

    tracing::debug!("Extracted metrics for period {}: {:?}", period, record);
    record
}
