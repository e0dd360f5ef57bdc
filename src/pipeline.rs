// src/pipeline.rs
use crate::analysis::forecast::{synthesize_forecast, ForecastDocument};
use crate::analysis::qualitative::{summarize_transcripts, ANALYST_QUERY};
use crate::analysis::NumericResults;
use crate::config::AppConfig;
use crate::extractors::extract_metrics;
use crate::extractors::text::{list_sources, period_label, read_source_text_lossy};
use crate::index::SemanticIndex;
use crate::llm::{Embedder, LanguageModel};
use crate::utils::AppError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs one forecast request end to end: report metrics, trend, transcript
/// summary, synthesis. Steps run one after another; errors propagate as-is.
pub struct Orchestrator {
    config: AppConfig,
    model: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
}

impl Orchestrator {
    pub fn new(config: AppConfig, model: Arc<dyn LanguageModel>, embedder: Arc<dyn Embedder>) -> Self {
        Self { config, model, embedder }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The most recent `quarters` report files, oldest first.
    pub fn select_reports(&self, quarters: usize) -> Result<Vec<PathBuf>, AppError> {
        let reports_dir = self.config.reports_dir();
        let all = list_sources(&reports_dir, &self.config.report_extensions)?;
        let chosen: Vec<PathBuf> = all.iter().skip(all.len().saturating_sub(quarters)).cloned().collect();
        if chosen.is_empty() {
            return Err(AppError::NoReports(reports_dir.display().to_string()));
        }
        tracing::info!("Selected {} of {} reports in {}", chosen.len(), all.len(), reports_dir.display());
        Ok(chosen)
    }

    /// Rebuilds the transcript index. Fails with `Busy` if a build is running.
    pub async fn build_index(&self) -> Result<SemanticIndex, AppError> {
        let index = SemanticIndex::build(
            &self.config.index_dir,
            &self.config.transcripts_dir(),
            &self.config.transcript_extensions,
            self.embedder.as_ref(),
        )
        .await?;
        Ok(index)
    }

    pub async fn run(
        &self,
        company: &str,
        report_paths: &[PathBuf],
        transcripts_dir: &Path,
    ) -> Result<ForecastDocument, AppError> {
        let paths = report_paths.to_vec();
        let numeric = tokio::task::spawn_blocking(move || extract_numeric(&paths)).await?;
        tracing::info!("Numeric extraction done for {}: {:?}", company, numeric.trend_summary);

        let index_dir = self.config.index_dir.clone();
        let embedding_model = self.embedder.model_name().to_string();
        let index =
            tokio::task::spawn_blocking(move || SemanticIndex::load_or_empty(&index_dir, &embedding_model)).await??;
        if index.is_empty() {
            let waiting = list_sources(transcripts_dir, &self.config.transcript_extensions)?.len();
            if waiting > 0 {
                tracing::warn!(
                    "{} transcript(s) in {} are not indexed; qualitative analysis runs without passages",
                    waiting,
                    transcripts_dir.display()
                );
            }
        }
        let qualitative =
            summarize_transcripts(&index, ANALYST_QUERY, self.embedder.as_ref(), self.model.as_ref()).await?;

        synthesize_forecast(company, &numeric, &qualitative, self.model.as_ref()).await
    }
}

/// Extracts one metric record per report (in file-name order) and the trend
/// across them. Unreadable reports still yield an empty record.
pub fn extract_numeric(report_paths: &[PathBuf]) -> NumericResults {
    let mut paths = report_paths.to_vec();
    paths.sort();
    let records = paths
        .iter()
        .map(|path| extract_metrics(&read_source_text_lossy(path), &period_label(path)))
        .collect();
    NumericResults::from_records(records)
}
