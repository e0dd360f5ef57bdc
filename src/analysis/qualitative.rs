// src/analysis/qualitative.rs
use crate::index::SemanticIndex;
use crate::llm::{Embedder, LanguageModel};
use crate::utils::decode::{decode_or_else, truncate_chars};
use crate::utils::AppError;
use serde::{Deserialize, Serialize};

pub const ANALYST_QUERY: &str =
    "Summarize management sentiment, recurring themes, guidance, risks and opportunities for the next quarter.";
pub const TOP_K: usize = 8;

const PASSAGE_SEPARATOR: &str = "\n\n---\n\n";
const RAW_EXCERPT_CHARS: usize = 4000;
const FALLBACK_SENTIMENT_CHARS: usize = 400;

fn unknown() -> String {
    "unknown".to_string()
}

/// Structured read of the earnings-call transcripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeSummary {
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default = "unknown")]
    pub management_sentiment: String,
    #[serde(default)]
    pub forward_looking_statements: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(rename = "_raw_excerpt", default)]
    pub raw_excerpt: String,
    #[serde(rename = "_generated_at", default)]
    pub generated_at: String,
}

impl QualitativeSummary {
    /// Used when the model's structured answer cannot be decoded: the free-text
    /// summary stands in for the sentiment and every list is empty.
    pub fn fallback(raw_summary: &str) -> Self {
        Self {
            themes: Vec::new(),
            management_sentiment: truncate_chars(raw_summary.trim(), FALLBACK_SENTIMENT_CHARS),
            forward_looking_statements: Vec::new(),
            risks: Vec::new(),
            opportunities: Vec::new(),
            raw_excerpt: String::new(),
            generated_at: String::new(),
        }
    }
}

fn summary_prompt(query: &str, passages: &str) -> String {
    format!(
        "You are an analyst assistant. Based on the transcript snippets below, summarize recurring themes, \
         management sentiment, forward-looking statements, risks and opportunities in concise bullet points.\n\n\
         Query: {}\n\nDocuments:\n{}\n\nProvide the answer.",
        query, passages
    )
}

fn schema_prompt(notes: &str) -> String {
    format!(
        "You MUST return valid JSON only with keys: themes (list of short strings), \
         management_sentiment (string), forward_looking_statements (list), risks (list), opportunities (list). \
         Do not output anything else. If unsure, use empty lists or 'unknown'.\n\n\
         Input notes:\n{}\n\nReturn JSON now.",
        notes
    )
}

/// Turns the model's structured answer into a summary, stamping provenance.
/// Never fails: undecodable output falls back to [`QualitativeSummary::fallback`].
pub fn parse_structured(structured: &str, raw_summary: &str) -> QualitativeSummary {
    let decoded = decode_or_else(structured, || QualitativeSummary::fallback(raw_summary));
    tracing::debug!("Qualitative summary decoded via {:?}", decoded.stage);

    let mut summary = decoded.value;
    summary.raw_excerpt = truncate_chars(raw_summary, RAW_EXCERPT_CHARS);
    summary.generated_at = chrono::Utc::now().to_rfc3339();
    summary
}

/// Retrieves the passages most relevant to `query` and asks the model for a
/// free-text summary, then for the same summary as JSON.
pub async fn summarize_transcripts(
    index: &SemanticIndex,
    query: &str,
    embedder: &dyn Embedder,
    model: &dyn LanguageModel,
) -> Result<QualitativeSummary, AppError> {
    let hits = index.search(query, TOP_K, embedder).await?;
    tracing::info!("Retrieved {} transcript passages for qualitative analysis", hits.len());
    for hit in &hits {
        tracing::debug!("  passage {}#{}", hit.source, hit.chunk);
    }
    let passages = hits.iter().map(|h| h.text.as_str()).collect::<Vec<_>>().join(PASSAGE_SEPARATOR);

    let raw_summary = model.complete(&summary_prompt(query, &passages)).await?;
    let structured = model.complete(&schema_prompt(&raw_summary)).await?;

    Ok(parse_structured(&structured, &raw_summary))
}
