pub mod config;
pub mod error;
pub mod routes;
pub mod startup;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Platform Factory API",
        version = "0.1.0",
        description = "Provisions a complete tenant application stack per project slug"
    ),
    paths(
        routes::health_check,
        routes::start_provisioning,
        routes::resume_provisioning,
        routes::get_provision_status,
        routes::delete_provision_run,
        routes::list_provision_runs,
    ),
    components(schemas(
        routes::HealthResponse,
        factory_core::ProvisionRequest,
        factory_core::ProvisionRun,
        factory_core::ProvisionState,
        factory_core::RunMetadata,
        orchestrator::RunReport,
        orchestrator::RunOutcome,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "provision", description = "Tenant provisioning runs"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route(
            "/api/provision",
            axum::routing::delete(routes::delete_provision_run),
        )
        .route("/api/provision/start", post(routes::start_provisioning))
        .route("/api/provision/resume", post(routes::resume_provisioning))
        .route("/api/provision/status", get(routes::get_provision_status))
        .route("/api/provision/runs", get(routes::list_provision_runs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
