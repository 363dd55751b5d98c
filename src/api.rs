use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::aggregator::{RunProgress, RunReport, RunStatistics};
use crate::config::{Config, RunPlan};
use crate::orchestrator;

#[derive(OpenApi)]
#[openapi(
    paths(start_run, list_runs, get_run, cancel_run),
    components(schemas(RunRequest, RunResponse, RunStatus, RunState, RunStatistics)),
    tags((name = "runs", description = "Roster scrape runs"))
)]
pub struct ApiDoc;

pub struct AppState {
    pub config: Config,
    pub runs: Mutex<HashMap<String, RunEntry>>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            runs: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Cancels every active run and waits until each has written its
    /// partial output and recorded its final state.
    pub async fn drain(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        if !self.tasks.is_empty() {
            info!("⏳ Waiting for {} run(s) to finish", self.tasks.len());
        }
        self.tasks.wait().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

pub struct RunEntry {
    started_at: String,
    state: RunState,
    progress: watch::Receiver<RunProgress>,
    cancel: CancellationToken,
    output: PathBuf,
    records_written: Option<usize>,
    error: Option<String>,
}

impl RunEntry {
    fn finish(&mut self, outcome: Result<RunReport>) {
        match outcome {
            Ok(report) => {
                self.records_written = Some(report.records.len());
                self.state = if report.cancelled {
                    RunState::Cancelled
                } else {
                    RunState::Completed
                };
            }
            Err(e) => {
                self.error = Some(format!("{e:#}"));
                self.state = RunState::Failed;
            }
        }
    }

    fn status(&self, run_id: &str) -> RunStatus {
        let progress = *self.progress.borrow();
        RunStatus {
            run_id: run_id.to_string(),
            state: self.state,
            started_at: self.started_at.clone(),
            completed: progress.completed,
            total: progress.total,
            stats: progress.stats,
            output: self.output.display().to_string(),
            records_written: self.records_written,
            error: self.error.clone(),
        }
    }
}

/// Overrides applied on top of the configured run plan.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RunRequest {
    pub categories: Option<Vec<String>>,
    pub start_year: Option<u16>,
    pub end_year: Option<u16>,
    pub workers: Option<usize>,
}

impl RunRequest {
    fn apply(self, base: &RunPlan) -> RunPlan {
        let mut plan = base.clone();
        if let Some(categories) = self.categories {
            plan.categories = categories;
        }
        if let Some(year) = self.start_year {
            plan.start_year = year;
        }
        if let Some(year) = self.end_year {
            plan.end_year = year;
        }
        if let Some(workers) = self.workers {
            plan.workers = workers;
        }
        plan
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunResponse {
    pub run_id: String,
    pub total_tasks: usize,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunStatus {
    pub run_id: String,
    pub state: RunState,
    pub started_at: String,
    pub completed: usize,
    pub total: usize,
    pub stats: RunStatistics,
    pub output: String,
    pub records_written: Option<usize>,
    pub error: Option<String>,
}

#[utoipa::path(
    post,
    path = "/runs",
    request_body = RunRequest,
    responses(
        (status = 200, description = "Run started", body = RunResponse),
        (status = 400, description = "Run plan rejected")
    ),
    tag = "runs"
)]
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunResponse>, (StatusCode, String)> {
    let plan = payload.apply(&state.config.plan);
    plan.check()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let run_id = Uuid::new_v4().to_string();
    let total = plan.task_count();
    let cancel = state.shutdown.child_token();
    let output = state.config.output_dir.join(format!("{run_id}.csv"));
    let (progress_tx, progress_rx) = watch::channel(RunProgress {
        total,
        ..RunProgress::default()
    });

    state.runs.lock().await.insert(
        run_id.clone(),
        RunEntry {
            started_at: Utc::now().to_rfc3339(),
            state: RunState::Running,
            progress: progress_rx,
            cancel: cancel.clone(),
            output: output.clone(),
            records_written: None,
            error: None,
        },
    );
    info!("📥 Run {} queued: {} tasks", run_id, total);

    let task_state = state.clone();
    let task_run_id = run_id.clone();
    state.tasks.spawn(async move {
        let outcome =
            orchestrator::run_to_csv(&task_state.config, &plan, cancel, Some(progress_tx), &output).await;
        if let Err(e) = &outcome {
            error!("🔥 Run {} failed: {:#}", task_run_id, e);
        }
        if let Some(entry) = task_state.runs.lock().await.get_mut(&task_run_id) {
            entry.finish(outcome);
        }
    });

    Ok(Json(RunResponse {
        run_id,
        total_tasks: total,
        message: "Run started".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/runs",
    responses(
        (status = 200, description = "All runs, newest first", body = Vec<RunStatus>)
    ),
    tag = "runs"
)]
pub async fn list_runs(State(state): State<Arc<AppState>>) -> Json<Vec<RunStatus>> {
    let runs = state.runs.lock().await;
    let mut statuses: Vec<RunStatus> = runs.iter().map(|(id, entry)| entry.status(id)).collect();
    statuses.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Json(statuses)
}

#[utoipa::path(
    get,
    path = "/runs/{run_id}",
    params(("run_id" = String, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run status", body = RunStatus),
        (status = 404, description = "Unknown run")
    ),
    tag = "runs"
)]
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunStatus>, StatusCode> {
    let runs = state.runs.lock().await;
    runs.get(&run_id)
        .map(|entry| Json(entry.status(&run_id)))
        .ok_or(StatusCode::NOT_FOUND)
}

#[utoipa::path(
    post,
    path = "/runs/{run_id}/cancel",
    params(("run_id" = String, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Cancellation requested", body = RunStatus),
        (status = 404, description = "Unknown run")
    ),
    tag = "runs"
)]
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunStatus>, StatusCode> {
    let runs = state.runs.lock().await;
    let entry = runs.get(&run_id).ok_or(StatusCode::NOT_FOUND)?;
    if entry.state == RunState::Running {
        warn!("🛑 Cancelling run {}", run_id);
        entry.cancel.cancel();
    }
    Ok(Json(entry.status(&run_id)))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/roster-crawler-swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/runs", post(start_run).get(list_runs))
        .route("/runs/:run_id", get(get_run))
        .route("/runs/:run_id/cancel", post(cancel_run))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(config));
    let shutdown = state.shutdown.clone();
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, cancelling active runs");
            }
            shutdown.cancel();
        })
        .await?;

    state.drain().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::FetchSettings;

    fn test_config(base_url: String, output_dir: PathBuf) -> Config {
        Config {
            base_url,
            plan: RunPlan {
                categories: vec!["mens-lacrosse".to_string()],
                start_year: 2010,
                end_year: 2010,
                workers: 1,
                min_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                progress_every: 1,
            },
            fetch: FetchSettings {
                timeout: Duration::from_secs(2),
                max_attempts: 1,
                base_backoff: Duration::from_millis(1),
            },
            output: output_dir.join("unused.csv"),
            output_dir,
            port: 0,
        }
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn run_lifecycle_writes_csv() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sports/mens-lacrosse/roster/2010"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><head><title>2010 Men's Lacrosse Roster</title></head><body>\
                 <h1>2010 Roster</h1>\
                 <table><tr><th>Name</th><th>Pos.</th></tr>\
                 <tr><td>Jane Doe</td><td>M</td></tr></table></body></html>",
            ))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let app = router(Arc::new(AppState::new(test_config(server.uri(), dir.path().to_path_buf()))));

        let (status, started) = call(&app, "POST", "/runs", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["total_tasks"], 1);
        let run_id = started["run_id"].as_str().unwrap().to_string();

        let mut finished = Value::Null;
        for _ in 0..100 {
            let (status, body) = call(&app, "GET", &format!("/runs/{run_id}"), None).await;
            assert_eq!(status, StatusCode::OK);
            if body["state"] != "running" {
                finished = body;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert_eq!(finished["state"], "completed");
        assert_eq!(finished["records_written"], 1);
        assert_eq!(finished["stats"]["succeeded"], 1);

        let csv = std::fs::read_to_string(dir.path().join(format!("{run_id}.csv"))).unwrap();
        assert!(csv.contains("Jane Doe,Mens Lacrosse,2010"));

        let (_, listed) = call(&app, "GET", "/runs", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn drain_lets_the_active_run_finish_and_write() {
        let server = MockServer::start().await;
        for year in ["2010", "2011", "2012"] {
            Mock::given(method("GET"))
                .and(path(format!("/sports/mens-lacrosse/roster/{year}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_delay(Duration::from_millis(300))
                        .set_body_string(format!(
                            "<html><head><title>{year} Roster</title></head><body>\
                             <table><tr><th>Name</th><th>Pos.</th></tr>\
                             <tr><td>Jane Doe</td><td>M</td></tr></table></body></html>"
                        )),
                )
                .mount(&server)
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(server.uri(), dir.path().to_path_buf());
        config.plan.end_year = 2012;
        let state = Arc::new(AppState::new(config));
        let app = router(state.clone());

        let (_, started) = call(&app, "POST", "/runs", Some(json!({}))).await;
        let run_id = started["run_id"].as_str().unwrap().to_string();

        // Let the first fetch get in flight, then shut down.
        tokio::time::sleep(Duration::from_millis(100)).await;
        state.drain().await;

        let fetched = server.received_requests().await.unwrap().len();
        assert!(fetched < 3);

        let (_, finished) = call(&app, "GET", &format!("/runs/{run_id}"), None).await;
        assert_eq!(finished["state"], "cancelled");
        assert_eq!(finished["records_written"], fetched);

        let csv = std::fs::read_to_string(dir.path().join(format!("{run_id}.csv"))).unwrap();
        assert!(csv.starts_with("Name,Category,Year"));
    }

    #[tokio::test]
    async fn inverted_year_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(Arc::new(AppState::new(test_config(
            "http://127.0.0.1:9".to_string(),
            dir.path().to_path_buf(),
        ))));

        let (status, _) = call(
            &app,
            "POST",
            "/runs",
            Some(json!({ "start_year": 2020, "end_year": 2010 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, listed) = call(&app, "GET", "/runs", None).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_run_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(Arc::new(AppState::new(test_config(
            "http://127.0.0.1:9".to_string(),
            dir.path().to_path_buf(),
        ))));

        let (status, _) = call(&app, "GET", "/runs/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, "POST", "/runs/nope/cancel", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn request_overrides_only_what_it_names() {
        let base = RunPlan::default();
        let plan = RunRequest {
            end_year: Some(1999),
            workers: Some(2),
            ..RunRequest::default()
        }
        .apply(&base);
        assert_eq!(plan.start_year, base.start_year);
        assert_eq!(plan.end_year, 1999);
        assert_eq!(plan.workers, 2);
        assert_eq!(plan.categories, base.categories);
    }
}
