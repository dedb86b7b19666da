use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, State},
    middleware,
    routing::get,
    Router,
};
use server_api::ApiContext;
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod auth;
mod config;
mod templates;
mod views;

use app_state::{AppState, SiteConfig};
use auth::SessionKeys;
use config::{load_settings, normalize_database_url, DEV_SESSION_SECRET};
use templates::Templates;
use views::PageError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    if settings.session_secret == DEV_SESSION_SECRET {
        warn!("using the built-in development session secret; set APP__SESSION_SECRET");
    }

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext {
            storage,
            import_key: settings.import_match_key,
        },
        templates: Templates::load()?,
        sessions: SessionKeys::new(&settings.session_secret, settings.session_ttl_seconds),
        site: SiteConfig::from_settings(&settings),
        max_upload_bytes: settings.max_upload_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, import_key = ?settings.import_match_key, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let staff_only = Router::new()
        .route("/dashboard/", get(views::dashboard).post(views::create_order))
        .route("/staff/", get(views::staff))
        .route("/staff/detail/:staff_id/", get(views::staff_detail))
        .route("/product/", get(views::products).post(views::product_action))
        .route(
            "/product/delete/:product_id/",
            get(views::product_delete_confirm).post(views::product_delete),
        )
        .route(
            "/product/update/:product_id/",
            get(views::product_update_form).post(views::product_update),
        )
        .route("/order/", get(views::orders))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_staff,
        ));

    Router::new()
        .route("/", get(views::root))
        .route("/healthz", get(healthz))
        .route("/login/", get(views::login_form).post(views::login))
        .route("/logout/", get(views::logout))
        .merge(staff_only)
        .fallback(views::not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_upload_bytes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            views::render_error_pages,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, PageError> {
    server_api::health(&state.api).await?;
    Ok("ok")
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
