// src/analysis/forecast.rs
use crate::analysis::qualitative::QualitativeSummary;
use crate::analysis::trend::{NumericResults, TrendSummary};
use crate::extractors::MetricRecord;
use crate::llm::LanguageModel;
use crate::utils::decode::{decode_or_else, DecodeStage};
use crate::utils::AppError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardView {
    pub revenue_view: String,
    pub margin_view: String,
    pub overall_sentiment: String,
}

impl ForwardView {
    pub fn neutral_fallback() -> Self {
        Self {
            revenue_view: "neutral (fallback)".to_string(),
            margin_view: "stable".to_string(),
            overall_sentiment: "neutral".to_string(),
        }
    }
}

/// Final answer returned by `POST /forecast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDocument {
    pub company: String,
    pub periods_analyzed: Vec<String>,
    pub numeric_metrics: Vec<MetricRecord>,
    #[serde(default)]
    pub trend_summary: TrendSummary,
    pub qualitative_analysis: QualitativeSummary,
    pub forecast_next_quarter: ForwardView,
    #[serde(default)]
    pub generated_at: String,
}

impl ForecastDocument {
    /// Deterministic document built straight from the inputs.
    pub fn fallback(company: &str, numeric: &NumericResults, qualitative: &QualitativeSummary) -> Self {
        Self {
            company: company.to_string(),
            periods_analyzed: numeric.periods(),
            numeric_metrics: numeric.quarters.clone(),
            trend_summary: numeric.trend_summary.clone(),
            qualitative_analysis: qualitative.clone(),
            forecast_next_quarter: ForwardView::neutral_fallback(),
            generated_at: String::new(),
        }
    }
}

#[derive(Serialize)]
struct SynthesisPayload<'a> {
    numeric_results: &'a NumericResults,
    qualitative_results: &'a QualitativeSummary,
}

const SYSTEM_INSTRUCTION: &str = "You are a concise financial analyst. Produce only valid JSON with these fields:\n\
- company (string)\n\
- periods_analyzed (list of str)\n\
- numeric_metrics (list of objects: period,revenue_cr,net_profit_cr,operating_margin_pct,eps)\n\
- trend_summary (object)\n\
- qualitative_analysis (object)\n\
- forecast_next_quarter (object with keys revenue_view, margin_view, overall_sentiment)\n\
- generated_at (ISO string)\n\n\
DO NOT output any text outside the JSON.";

fn synthesis_prompt(company: &str, numeric: &NumericResults, qualitative: &QualitativeSummary) -> Result<String, AppError> {
    let payload = serde_json::to_string(&SynthesisPayload { numeric_results: numeric, qualitative_results: qualitative })?;
    Ok(format!("{}\n\nCompany: {}\n\nInput:\n{}\n\nReturn JSON now.", SYSTEM_INSTRUCTION, company, payload))
}

/// Parses the model's forecast, substituting the deterministic document when
/// it is not usable. `generated_at` is always the current time.
pub fn parse_forecast(
    raw: &str,
    company: &str,
    numeric: &NumericResults,
    qualitative: &QualitativeSummary,
) -> (ForecastDocument, DecodeStage) {
    let decoded = decode_or_else(raw, || ForecastDocument::fallback(company, numeric, qualitative));
    let mut document = decoded.value;
    document.generated_at = chrono::Utc::now().to_rfc3339();
    (document, decoded.stage)
}

/// Asks the model to combine numeric and qualitative results into a forecast.
pub async fn synthesize_forecast(
    company: &str,
    numeric: &NumericResults,
    qualitative: &QualitativeSummary,
    model: &dyn LanguageModel,
) -> Result<ForecastDocument, AppError> {
    let prompt = synthesis_prompt(company, numeric, qualitative)?;
    let raw = model.complete(&prompt).await?;

    let (document, stage) = parse_forecast(&raw, company, numeric, qualitative);
    if stage == DecodeStage::Fallback {
        tracing::warn!("Forecast synthesis returned unusable JSON for {}; using neutral fallback", company);
    } else {
        tracing::info!("Forecast synthesized for {} ({} periods)", company, document.periods_analyzed.len());
    }
    Ok(document)
}
