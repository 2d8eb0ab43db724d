use std::net::SocketAddr;

use anyhow::Context;
use axum::{extract::State, routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::StorageConfig;
use crate::error::ApiError;
use crate::meals;
use crate::state::AppState;

async fn health(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.meals.repo().health_check().await?;
    Ok("ok")
}

pub fn build_app(state: AppState) -> Router {
    let mut router = Router::new().nest(
        "/api/v1",
        Router::new()
            .merge(meals::router(state.config.max_upload_bytes))
            .route("/health", get(health)),
    );

    // local backend serves its own objects; S3 hands out bucket URLs
    if let StorageConfig::Local(local) = &state.config.storage {
        let mount = local.public_base_url.trim_end_matches('/');
        if mount.starts_with('/') && mount.len() > 1 {
            router = router.nest_service(mount, ServeDir::new(&local.root));
        }
    }

    router
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let status = res.status();
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
