use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::chart;
use crate::error::TriggerError;
use crate::mailer;
use crate::models::{RunReport, TrendPoint};
use crate::run::{self, RunDeps};

pub struct AppState {
    pub deps: RunDeps,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/check-alerts", get(check_alerts))
        .route("/api/trends", get(trends_probe))
        .route("/api/chart", get(chart_link))
        .route("/api/email-test", get(email_test))
        .route("/api/trends-ping", get(ping))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "trigger interface listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        let status = match err {
            TriggerError::Unauthorized => StatusCode::UNAUTHORIZED,
            TriggerError::MissingCredential(_) | TriggerError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "ok": false, "error": self.message }));
        (self.status, body).into_response()
    }
}

#[derive(Deserialize)]
struct CheckAlertsParams {
    key: Option<String>,
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
struct TriggerResponse {
    ok: bool,
    #[serde(flatten)]
    report: RunReport,
}

/// The trigger. Completed runs answer 200 whatever the per-subscription
/// mix of sent, skipped and errored looks like.
async fn check_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CheckAlertsParams>,
) -> Result<Json<TriggerResponse>, ApiError> {
    if !state.deps.config.authorizes(params.key.as_deref()) {
        return Err(TriggerError::Unauthorized.into());
    }
    // Fail before touching the store when no mail could ever go out.
    state.deps.config.mailer_key()?;

    let report = run::execute(&state.deps, params.force).await?;
    Ok(Json(TriggerResponse { ok: true, report }))
}

#[derive(Deserialize)]
struct TrendsParams {
    q: Option<String>,
    geo: Option<String>,
}

/// Diagnostic passthrough of the trend source. The adapter's error comes
/// back verbatim with a 502.
async fn trends_probe(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrendsParams>,
) -> Response {
    let keyword = params
        .q
        .unwrap_or_else(|| "artificial intelligence".to_string());
    let keyword = keyword.trim();
    let region = params
        .geo
        .or_else(|| state.deps.config.trend_geo.clone());

    match state.deps.trends.fetch(keyword, region.as_deref()).await {
        Ok(points) => Json(json!({ "trends": points, "source": "serpapi" })).into_response(),
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "trends": [], "error": err.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct ChartParams {
    q: Option<String>,
    points: Option<String>,
}

async fn chart_link(Query(params): Query<ChartParams>) -> Result<Json<serde_json::Value>, ApiError> {
    let keyword = params.q.unwrap_or_else(|| "trend".to_string());
    let raw = params
        .points
        .ok_or_else(|| ApiError::bad_request("missing points"))?;
    let points: Vec<TrendPoint> = serde_json::from_str(&raw)
        .map_err(|e| ApiError::bad_request(format!("invalid points: {e}")))?;

    Ok(Json(json!({ "ok": true, "url": chart::chart_url(&keyword, &points) })))
}

#[derive(Deserialize)]
struct EmailTestParams {
    to: Option<String>,
}

async fn email_test(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EmailTestParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let to = params.to.ok_or_else(|| ApiError::bad_request("Missing ?to="))?;
    state.deps.config.mailer_key()?;

    state
        .deps
        .mailer
        .send(&mailer::delivery_test_message(&to))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(json!({ "ok": true })))
}

async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "pong": true, "version": env!("CARGO_PKG_VERSION") }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::SubscriptionStore;
    use crate::error::StageError;
    use crate::mailer::{EmailMessage, Mailer};
    use crate::models::Subscription;
    use crate::trends::TrendSource;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{DateTime, Utc};
    use tower::util::ServiceExt;
    use uuid::Uuid;

    struct StubStore {
        subs: Vec<Subscription>,
    }

    #[async_trait]
    impl SubscriptionStore for StubStore {
        async fn list_active(&self, _limit: i64) -> Result<Vec<Subscription>, TriggerError> {
            Ok(self.subs.clone())
        }

        async fn update_last_notified(
            &self,
            _id: Uuid,
            _at: DateTime<Utc>,
        ) -> Result<(), StageError> {
            Ok(())
        }

        async fn upsert_history(
            &self,
            _keyword: &str,
            _points: &[TrendPoint],
        ) -> Result<(), StageError> {
            Ok(())
        }
    }

    struct StubTrends;

    #[async_trait]
    impl TrendSource for StubTrends {
        async fn fetch(
            &self,
            _keyword: &str,
            _region: Option<&str>,
        ) -> Result<Vec<TrendPoint>, StageError> {
            Err(StageError::Fetch("SERPAPI_KEY is not set".to_string()))
        }
    }

    struct StubMailer;

    #[async_trait]
    impl Mailer for StubMailer {
        async fn send(&self, _message: &EmailMessage) -> Result<(), StageError> {
            Ok(())
        }
    }

    fn config(resend_api_key: Option<&str>) -> Config {
        Config {
            alert_secret: Some("s3cret".to_string()),
            resend_api_key: resend_api_key.map(str::to_string),
            email_from: "Trendily <alerts@trendily.app>".to_string(),
            serpapi_key: None,
            trend_geo: None,
            test_recipient: None,
            volume_floor: None,
            cooldown_hours: 24,
            send_delay_ms: 0,
            subscription_limit: 200,
        }
    }

    fn state(config: Config) -> Arc<AppState> {
        Arc::new(AppState {
            deps: RunDeps {
                store: Arc::new(StubStore { subs: Vec::new() }),
                trends: Arc::new(StubTrends),
                mailer: Arc::new(StubMailer),
                config,
            },
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_or_wrong_key_answers_401() {
        for uri in ["/api/check-alerts", "/api/check-alerts?key=wrong"] {
            let response = router(state(config(Some("re_123"))))
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body = body_json(response).await;
            assert_eq!(body["ok"], false);
            assert_eq!(body["error"], "unauthorized");
        }
    }

    #[tokio::test]
    async fn missing_mailer_key_answers_500() {
        let response = router(state(config(None)))
            .oneshot(
                Request::builder()
                    .uri("/api/check-alerts?key=s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Missing RESEND_API_KEY");
    }

    #[tokio::test]
    async fn empty_subscription_list_still_completes_with_200() {
        let response = router(state(config(Some("re_123"))))
            .oneshot(
                Request::builder()
                    .uri("/api/check-alerts?key=s3cret&force=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["forced"], true);
        assert_eq!(body["sent"], 0);
        assert_eq!(body["attempts"], 0);
        assert_eq!(body["details"], json!([]));
    }

    #[tokio::test]
    async fn trends_probe_maps_adapter_failure_to_502() {
        let response = router(state(config(Some("re_123"))))
            .oneshot(
                Request::builder()
                    .uri("/api/trends?q=sourdough")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["trends"], json!([]));
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("SERPAPI_KEY is not set"));
    }

    #[tokio::test]
    async fn chart_link_requires_points() {
        let app = router(state(config(Some("re_123"))));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/chart?q=sourdough")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let points = serde_json::to_string(&vec![
            TrendPoint {
                label: "w1".to_string(),
                interest: 50,
            },
            TrendPoint {
                label: "w2".to_string(),
                interest: 65,
            },
        ])
        .unwrap();
        let uri = format!(
            "/api/chart?q=sourdough&points={}",
            urlencoded(&points)
        );
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert!(body["url"]
            .as_str()
            .unwrap()
            .starts_with("https://quickchart.io/chart?c="));
    }

    #[tokio::test]
    async fn email_test_requires_a_recipient() {
        let response = router(state(config(Some("re_123"))))
            .oneshot(
                Request::builder()
                    .uri("/api/email-test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router(state(config(Some("re_123"))))
            .oneshot(
                Request::builder()
                    .uri("/api/email-test?to=ops%40example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ping_answers() {
        let response = router(state(config(None)))
            .oneshot(
                Request::builder()
                    .uri("/api/trends-ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["pong"], true);
    }

    fn urlencoded(raw: &str) -> String {
        let mut out = String::new();
        for byte in raw.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(byte as char)
                }
                _ => out.push_str(&format!("%{byte:02X}")),
            }
        }
        out
    }
}
