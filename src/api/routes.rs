use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::advice::{AdvicePayload, AdviceService};
use crate::analytics::locator::PercentilePlacement;
use crate::api::health::HealthState;
use crate::api::latency::{LatencySnapshot, LatencyStats, ReportKind};
use crate::config::{DEFAULT_REF_TIME, METRIC_LABEL};
use crate::db::source::{GroupFilter, SpendingSource};
use crate::error::{AppError, Result};
use crate::report::{ranking_report, spending_report, RankingQuery, SpendingQuery};
use crate::types::{
    AdviceMode, BudgetStatus, CategoryAmount, GroupBy, LeaderboardRow, SpendCategory, TimeWindow,
};

pub struct ApiState<S> {
    pub source: Arc<S>,
    pub advice: Arc<AdviceService>,
    pub latency: Arc<LatencyStats>,
    pub health: Arc<HealthState>,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            advice: Arc::clone(&self.advice),
            latency: Arc::clone(&self.latency),
            health: Arc::clone(&self.health),
        }
    }
}

impl<S: SpendingSource> ApiState<S> {
    pub fn new(source: S, advice: AdviceService) -> Result<Self> {
        Ok(Self {
            source: Arc::new(source),
            advice: Arc::new(advice),
            latency: Arc::new(LatencyStats::new()?),
            health: Arc::new(HealthState::new()),
        })
    }
}

pub fn router<S: SpendingSource>(state: ApiState<S>) -> Router {
    Router::new()
        .route("/api/analytics", get(get_analytics::<S>))
        .route("/api/rankings", get(get_rankings::<S>))
        .route("/health", get(get_health::<S>))
        .route("/stats/latency", get(get_stats_latency::<S>))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsParams {
    pub user_id: Option<String>,
    pub time: Option<String>,
    /// Older clients send `timeframe` instead of `time`.
    pub timeframe: Option<String>,
    pub ref_time: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsParams {
    pub user_id: Option<String>,
    pub category: Option<String>,
    pub time: Option<String>,
    pub group: Option<String>,
    pub group_value: Option<String>,
    pub ref_time: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub ok: bool,
    pub pie: Vec<CategoryAmount>,
    pub total: f64,
    pub budget: f64,
    pub budget_delta: f64,
    pub budget_status: BudgetStatus,
    pub advice: String,
    pub raw: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingsResponse {
    pub ok: bool,
    pub rows: Vec<LeaderboardRow>,
    pub metric_label: String,
    pub user_spent_ratio: f64,
    pub user_rank: Option<u32>,
    pub num_users: usize,
    pub top_percent: Option<f64>,
    pub placement: Option<PercentilePlacement>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub requests_served: u64,
    pub requests_failed: u64,
    pub last_request_at: Option<u64>,
}

// ---------------------------------------------------------------------------
// Param parsing
// ---------------------------------------------------------------------------

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// RFC 3339 or a bare `YYYY-MM-DD`; anything else falls back to the
/// dataset's reference date.
fn reference_time(param: Option<&str>) -> Result<DateTime<Utc>> {
    if let Some(raw) = param {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Some(dt) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(dt.and_utc());
        }
        debug!(ref_time = raw, "unparseable refTime; using default");
    }
    DateTime::parse_from_rfc3339(DEFAULT_REF_TIME)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Config(format!("DEFAULT_REF_TIME: {e}")))
}

fn spending_query(params: &AnalyticsParams) -> Result<(SpendingQuery, AdviceMode)> {
    let user_id = non_empty(&params.user_id)
        .ok_or_else(|| AppError::InvalidRequest("missing parameters: userId".to_string()))?;
    let time = non_empty(&params.time)
        .or(non_empty(&params.timeframe))
        .and_then(TimeWindow::from_code)
        .unwrap_or(TimeWindow::Month);

    let query = SpendingQuery {
        user_id: user_id.to_string(),
        time,
        reference: reference_time(non_empty(&params.ref_time))?,
    };
    Ok((query, AdviceMode::from_param(params.mode.as_deref())))
}

fn ranking_query(params: &RankingsParams) -> Result<RankingQuery> {
    let (user_id, category, time) = (
        non_empty(&params.user_id),
        non_empty(&params.category),
        non_empty(&params.time),
    );
    let (Some(user_id), Some(category), Some(time)) = (user_id, category, time) else {
        let missing: Vec<&str> = [("userId", user_id), ("category", category), ("time", time)]
            .into_iter()
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| name)
            .collect();
        return Err(AppError::InvalidRequest(format!(
            "missing parameters: {}",
            missing.join(", ")
        )));
    };

    let category = SpendCategory::from_name(category)
        .ok_or_else(|| AppError::InvalidRequest(format!("unknown category '{category}'")))?;
    let time = TimeWindow::from_code(time)
        .ok_or_else(|| AppError::InvalidRequest(format!("unknown time window '{time}'")))?;
    let group = non_empty(&params.group)
        .map(|g| {
            GroupBy::from_name(g)
                .ok_or_else(|| AppError::InvalidRequest(format!("unknown group '{g}'")))
        })
        .transpose()?;

    Ok(RankingQuery {
        user_id: user_id.to_string(),
        category,
        time,
        reference: reference_time(non_empty(&params.ref_time))?,
        filter: GroupFilter::from_query(group, non_empty(&params.group_value))?,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Latency and counters for a finished report request.
fn observe<S, T>(state: &ApiState<S>, kind: ReportKind, started: Instant, result: &Result<T>) {
    state.health.record_request(result.is_ok());
    match result {
        Ok(_) => state.latency.record(kind, started.elapsed()),
        Err(e) if e.status().is_server_error() => warn!(?kind, "report failed: {e}"),
        Err(e) => debug!(?kind, "report rejected: {e}"),
    }
}

async fn get_analytics<S: SpendingSource>(
    State(state): State<ApiState<S>>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<AnalyticsResponse>> {
    let started = Instant::now();
    let result = analytics(&state, &params, started).await;
    observe(&state, ReportKind::Analytics, started, &result);
    result.map(Json)
}

async fn analytics<S: SpendingSource>(
    state: &ApiState<S>,
    params: &AnalyticsParams,
    started: Instant,
) -> Result<AnalyticsResponse> {
    let (query, mode) = spending_query(params)?;
    let report = spending_report(state.source.as_ref(), &query).await?;

    let payload = AdvicePayload::new(
        mode,
        &query.user_id,
        query.time,
        report.total,
        report.budget,
        report.budget_delta,
        &report.shares.rows,
    );
    let advice = state.advice.advise(&payload).await;

    info!(
        user_id = %query.user_id,
        time = %query.time,
        categories = report.shares.rows.len(),
        total = report.total,
        budget_delta = report.budget_delta,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "analytics served"
    );

    Ok(AnalyticsResponse {
        ok: true,
        pie: report.shares.rows,
        total: report.total,
        budget: report.budget,
        budget_delta: report.budget_delta,
        budget_status: report.budget_status,
        advice,
        raw: report.raw,
    })
}

async fn get_rankings<S: SpendingSource>(
    State(state): State<ApiState<S>>,
    Query(params): Query<RankingsParams>,
) -> Result<Json<RankingsResponse>> {
    let started = Instant::now();
    let result = rankings(&state, &params, started).await;
    observe(&state, ReportKind::Rankings, started, &result);
    result.map(Json)
}

async fn rankings<S: SpendingSource>(
    state: &ApiState<S>,
    params: &RankingsParams,
    started: Instant,
) -> Result<RankingsResponse> {
    let query = ranking_query(params)?;
    let report = ranking_report(state.source.as_ref(), &query).await?;

    info!(
        user_id = %query.user_id,
        category = %query.category,
        time = %query.time,
        population = report.num_users,
        rank = ?report.user_rank,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "rankings served"
    );

    Ok(RankingsResponse {
        ok: true,
        rows: report.rows,
        metric_label: METRIC_LABEL.to_string(),
        user_spent_ratio: report.user_spent_ratio,
        user_rank: report.user_rank,
        num_users: report.num_users,
        top_percent: report.top_percent,
        placement: report.placement,
    })
}

async fn get_health<S: SpendingSource>(
    State(state): State<ApiState<S>>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.source.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("health check: database unreachable: {e}");
            false
        }
    };
    let status = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        requests_served: state.health.requests_served(),
        requests_failed: state.health.requests_failed(),
        last_request_at: state.health.last_request_at(),
    };
    (status, Json(body))
}

async fn get_stats_latency<S: SpendingSource>(
    State(state): State<ApiState<S>>,
) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::AdviceStore;
    use crate::report::tests::{ago, reference, MemorySource};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::SecondsFormat;
    use tower::ServiceExt;

    fn source() -> MemorySource {
        let mut source = MemorySource::default().with_user("EuLe21", Some(36_500.0));
        for (i, peer) in ["p1", "p2", "p3"].into_iter().enumerate() {
            source = source
                .with_user(peer, Some(36_500.0))
                .spend(peer, ago(1.0), "grocery", 10.0 * (i + 1) as f64)
                .spend(peer, ago(1.0), "home", 50.0);
        }
        source
            .spend("EuLe21", ago(1.0), "grocery", 75.0)
            .spend("EuLe21", ago(2.0), "home", 25.0)
    }

    fn app(dir: &tempfile::TempDir) -> (Router, ApiState<MemorySource>) {
        let advice = AdviceService::new(AdviceStore::new(dir.path().join("advice.json")), None);
        let state = ApiState::new(source(), advice).unwrap();
        (router(state.clone()), state)
    }

    fn ref_time() -> String {
        reference().to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    async fn fetch(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[derive(Clone, Default)]
    struct LogCapture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogCapture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn ref_time_falls_back_to_dataset_date() {
        let default = reference_time(None).unwrap();
        assert_eq!(default.to_rfc3339_opts(SecondsFormat::Secs, true), DEFAULT_REF_TIME);
        assert_eq!(reference_time(Some("yesterday")).unwrap(), default);
        let day = reference_time(Some("2019-01-31")).unwrap();
        assert_eq!(day.to_rfc3339_opts(SecondsFormat::Secs, true), "2019-01-31T00:00:00Z");
    }

    #[test]
    fn missing_ranking_params_are_listed() {
        let err = ranking_query(&RankingsParams {
            user_id: Some("u".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid request: missing parameters: category, time");
    }

    #[tokio::test]
    async fn analytics_returns_pie_and_budget() {
        let dir = tempfile::tempdir().unwrap();
        let (router, state) = app(&dir);
        let uri = format!("/api/analytics?userId=EuLe21&time=w&refTime={}", ref_time());

        let (status, body) = fetch(router, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["total"], 100.0);
        assert_eq!(body["budget"], 700.0);
        assert_eq!(body["budgetDelta"], 600.0);
        assert_eq!(body["budgetStatus"], "under_budget");
        assert_eq!(body["advice"], "");
        assert_eq!(body["pie"][0]["category"], "grocery");
        assert_eq!(body["pie"][0]["proportion"], 0.75);
        assert_eq!(body["raw"]["total"], 100.0);

        assert_eq!(state.health.requests_served(), 1);
        assert_eq!(state.latency.snapshot().analytics.samples, 1);
    }

    #[tokio::test]
    async fn analytics_accepts_timeframe_alias_and_defaults_to_month() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(&dir);

        let uri = format!("/api/analytics?userId=EuLe21&timeframe=d&refTime={}", ref_time());
        let (_, body) = fetch(router.clone(), &uri).await;
        assert_eq!(body["budget"], 100.0);

        let uri = format!("/api/analytics?userId=EuLe21&time=zz&refTime={}", ref_time());
        let (_, body) = fetch(router, &uri).await;
        assert_eq!(body["budget"], 3_000.0);
    }

    #[tokio::test]
    async fn analytics_without_user_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let (router, state) = app(&dir);

        let (status, body) = fetch(router, "/api/analytics?time=m").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "Invalid request: missing parameters: userId");
        assert_eq!(state.health.requests_failed(), 1);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(&dir);
        let (status, body) = fetch(router, "/api/analytics?userId=ghost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn rankings_return_window_and_placement() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(&dir);
        let uri = format!(
            "/api/rankings?userId=EuLe21&category=grocery&time=m&refTime={}",
            ref_time()
        );

        let (status, body) = fetch(router, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metricLabel"], "Spent Ratio");
        assert_eq!(body["numUsers"], 4);
        assert_eq!(body["userRank"], 4);
        assert_eq!(body["topPercent"], 100.0);
        assert_eq!(body["userSpentRatio"], 0.75);
        let rows = body["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r["kind"] == "entry"));
        assert_eq!(rows[3]["isUser"], true);
        assert!(body["placement"]["displayZ"].as_f64().unwrap() >= -4.0);
    }

    #[tokio::test]
    async fn rankings_reject_bad_params() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(&dir);

        let (status, _) = fetch(router.clone(), "/api/rankings?userId=EuLe21&time=m").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            fetch(router.clone(), "/api/rankings?userId=EuLe21&category=yachts&time=m").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request: unknown category 'yachts'");

        let (status, _) =
            fetch(router.clone(), "/api/rankings?userId=EuLe21&category=home&time=y").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = fetch(
            router,
            "/api/rankings?userId=EuLe21&category=home&time=m&group=Age&groupValue=old",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn served_reports_log_subject_window_and_latency() {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(&dir);
        let rt = ref_time();
        let uri = format!("/api/analytics?userId=EuLe21&time=w&refTime={rt}");
        let (status, _) = fetch(router.clone(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        let uri = format!("/api/rankings?userId=EuLe21&category=grocery&time=w&refTime={rt}");
        let (status, _) = fetch(router, &uri).await;
        assert_eq!(status, StatusCode::OK);

        let logs = capture.text();
        for event in ["analytics served", "rankings served"] {
            let line = logs
                .lines()
                .find(|l| l.contains(event))
                .unwrap_or_else(|| panic!("no '{event}' line in:\n{logs}"));
            assert!(line.contains("user_id=EuLe21"), "{line}");
            assert!(line.contains("time=weekly"), "{line}");
            assert!(line.contains("elapsed_ms="), "{line}");
        }
    }

    #[tokio::test]
    async fn health_and_latency_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = app(&dir);

        let (status, body) = fetch(router.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);

        let (status, body) = fetch(router, "/stats/latency").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rankings"]["samples"], 0);
        assert!(body["analytics"]["p50_ms"].is_null());
    }
}
