use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use phonebook_db::DbPool;
use serde::Serialize;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoreProbe {
    pub status: Readiness,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `GET /health`. Only the store can degrade readiness; the process
/// answering at all means the service itself is up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: Readiness,
    pub version: &'static str,
    pub store: StoreProbe,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(db_pool)
}

pub async fn health(State(db_pool): State<DbPool>) -> (StatusCode, Json<HealthReport>) {
    let store = probe_store(&db_pool).await;
    if let Some(error) = &store.error {
        warn!(
            event_name = "system.health.degraded",
            correlation_id = "health",
            error = %error,
            "contact store is not answering"
        );
    }

    let report = HealthReport {
        status: store.status,
        version: env!("CARGO_PKG_VERSION"),
        store,
        checked_at: Utc::now().to_rfc3339(),
    };
    let code = match report.status {
        Readiness::Ready => StatusCode::OK,
        Readiness::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}

async fn probe_store(pool: &DbPool) -> StoreProbe {
    let counted = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contacts")
        .fetch_one(pool)
        .await;
    match counted {
        Ok(count) => StoreProbe { status: Readiness::Ready, contacts: Some(count), error: None },
        Err(error) => {
            StoreProbe { status: Readiness::Degraded, contacts: None, error: Some(error.to_string()) }
        }
    }
}
