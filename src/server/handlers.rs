// src/server/handlers.rs
use crate::analysis::ForecastDocument;
use crate::pipeline::Orchestrator;
use crate::storage::RequestLogStore;
use crate::utils::error::StorageError;
use crate::utils::AppError;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for the HTTP handlers
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub logs: RequestLogStore,
}

fn default_quarters() -> u32 {
    2
}

fn default_company() -> String {
    "TCS".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    #[serde(default = "default_quarters")]
    pub quarters: u32,
    #[serde(default = "default_company")]
    pub company: String,
    /// Accepted for compatibility; market data is not fetched.
    #[serde(default)]
    pub include_market_data: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NoReports(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}

/// Health check endpoint - GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn run_forecast(state: &AppState, req: &ForecastRequest) -> Result<ForecastDocument, AppError> {
    let reports = state.orchestrator.select_reports(req.quarters as usize)?;
    let transcripts_dir = state.orchestrator.config().transcripts_dir();
    state.orchestrator.run(&req.company, &reports, &transcripts_dir).await
}

/// Runs a request-log operation on the blocking pool.
async fn with_log_store<T, F>(state: &Arc<AppState>, op: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&RequestLogStore) -> Result<T, StorageError> + Send + 'static,
{
    let state = Arc::clone(state);
    Ok(tokio::task::spawn_blocking(move || op(&state.logs)).await??)
}

/// Forecast endpoint - POST /forecast
///
/// Every request gets a `request_logs` row: `processing` on arrival, then
/// `done` with the document or `error` with the message.
pub async fn forecast_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForecastRequest>,
) -> Response {
    tracing::info!("Forecast requested for {} over {} quarter(s)", req.company, req.quarters);
    if req.include_market_data {
        tracing::debug!("include_market_data is set but market data is not used");
    }

    let request_json = match serde_json::to_string(&req) {
        Ok(json) => json,
        Err(e) => return AppError::from(e).into_response(),
    };
    let log_id = match with_log_store(&state, move |logs| logs.begin(&request_json)).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("Failed to create request log: {}", e);
            return e.into_response();
        }
    };

    match run_forecast(&state, &req).await {
        Ok(document) => {
            let recorded = match serde_json::to_string(&document) {
                Ok(json) => with_log_store(&state, move |logs| logs.complete(log_id, &json)).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = recorded {
                tracing::error!("Failed to record response for request {}: {}", log_id, e);
            }
            (StatusCode::OK, Json(document)).into_response()
        }
        Err(e) => {
            tracing::error!("Forecast request {} failed: {}", log_id, e);
            let message = e.to_string();
            if let Err(log_err) = with_log_store(&state, move |logs| logs.fail(log_id, &message)).await {
                tracing::error!("Failed to record error for request {}: {}", log_id, log_err);
            }
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::testing::{HashEmbedder, ScriptedModel};
    use crate::storage::request_log::RequestStatus;
    use std::fs;
    use std::path::Path;

    fn state_for(root: &Path, model: ScriptedModel) -> Arc<AppState> {
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.data_root = root.to_path_buf();
        config.index_dir = root.join("index");
        config.report_extensions = vec!["txt".to_string()];
        let logs = RequestLogStore::open(None, &root.join("db").join("log.sqlite")).unwrap();
        Arc::new(AppState {
            orchestrator: Orchestrator::new(config, Arc::new(model), Arc::new(HashEmbedder)),
            logs,
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let req: ForecastRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.quarters, 2);
        assert_eq!(req.company, "TCS");
        assert!(!req.include_market_data);
    }

    #[tokio::test]
    async fn test_no_reports_returns_400_and_logs_error() {
        let root = tempfile::tempdir().unwrap();
        let state = state_for(root.path(), ScriptedModel::new(&[]));

        let req = ForecastRequest { quarters: 2, company: "TCS".to_string(), include_market_data: false };
        let response = forecast_handler(State(state.clone()), Json(req)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().starts_with("No financial reports found"));

        let row = state.logs.get(1).unwrap().unwrap();
        assert_eq!(row.status, RequestStatus::Error);
    }

    #[tokio::test]
    async fn test_success_returns_document_and_logs_done() {
        let root = tempfile::tempdir().unwrap();
        let reports = root.path().join("financial_reports");
        fs::create_dir_all(&reports).unwrap();
        fs::write(reports.join("Q1.txt"), "Total Revenue 12,345\nNet profit 2,000").unwrap();
        fs::write(reports.join("Q2.txt"), "Total Revenue 13,000\nNet profit 2,200").unwrap();
        let state = state_for(root.path(), ScriptedModel::new(&["summary", "{}", "not json"]));

        let req: ForecastRequest = serde_json::from_str(r#"{"company": "TCS"}"#).unwrap();
        let response = forecast_handler(State(state.clone()), Json(req)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["numeric_metrics"].as_array().unwrap().len(), 2);
        assert!((body["trend_summary"]["net_profit_qoq_pct"].as_f64().unwrap() - 10.0).abs() < 1e-9);

        let row = state.logs.get(1).unwrap().unwrap();
        assert_eq!(row.status, RequestStatus::Done);
        assert!(row.response_json.unwrap().contains("\"company\":\"TCS\""));
    }

    #[tokio::test]
    async fn test_model_failure_returns_500() {
        let root = tempfile::tempdir().unwrap();
        let reports = root.path().join("financial_reports");
        fs::create_dir_all(&reports).unwrap();
        fs::write(reports.join("Q1.txt"), "Total Revenue 12,345").unwrap();
        let state = state_for(root.path(), ScriptedModel::failing());

        let req: ForecastRequest = serde_json::from_str("{}").unwrap();
        let response = forecast_handler(State(state.clone()), Json(req)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("Language model call failed"));
        assert_eq!(state.logs.get(1).unwrap().unwrap().status, RequestStatus::Error);
    }

    #[tokio::test]
    async fn test_health() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }
}
