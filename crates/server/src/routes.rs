use std::sync::Arc;

use axum::Router;
use phonebook_agent::runtime::AgentRuntime;
use phonebook_db::DbPool;
use tower_http::cors::CorsLayer;

use crate::{gateway, health};

/// Health and command routes behind a permissive CORS layer, so a browser
/// front end served from another origin can call the API.
pub fn app_router(db_pool: DbPool, runtime: Arc<AgentRuntime>) -> Router {
    health::router(db_pool).merge(gateway::router(runtime)).layer(CorsLayer::permissive())
}
