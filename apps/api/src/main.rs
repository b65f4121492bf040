mod env;
mod openapi;

use std::net::SocketAddr;
use std::time::Duration;

use axum::{Router, body::Body, extract::MatchedPath, http::Request};
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tower::ServiceBuilder;
use tower_http::{
    classify::ServerErrorsFailureClass,
    cors::{self, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::prelude::*;

use vox_api_jobs::{JobsConfig, JobsState};

use env::env;

fn app(state: JobsState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(version))
        .route("/openapi.json", axum::routing::get(openapi_json))
        .merge(vox_api_jobs::router(state))
        .layer(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods(cors::Any)
                .allow_headers(cors::Any),
        )
        .layer(
            ServiceBuilder::new()
                .layer(NewSentryLayer::<Request<Body>>::new_from_top())
                .layer(SentryHttpLayer::new().enable_transaction())
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|request: &Request<Body>| {
                            let path = request.uri().path();

                            if path == "/health" {
                                return tracing::Span::none();
                            }

                            let method = request.method();
                            let matched_path = request
                                .extensions()
                                .get::<MatchedPath>()
                                .map(MatchedPath::as_str)
                                .unwrap_or(path);
                            let span_op = if path.starts_with("/jobs") {
                                "http.server.jobs"
                            } else {
                                "http.server"
                            };

                            tracing::info_span!(
                                "http_request",
                                method = %method,
                                http.route = %matched_path,
                                otel.name = %format!("{} {}", method, matched_path),
                                span.op = %span_op,
                            )
                        })
                        .on_request(|request: &Request<Body>, _span: &tracing::Span| {
                            if request.uri().path() == "/health" {
                                return;
                            }
                            tracing::info!(
                                method = %request.method(),
                                path = %request.uri().path(),
                                "http_request_started"
                            );
                        })
                        .on_response(
                            |response: &axum::http::Response<axum::body::Body>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                if span.is_disabled() {
                                    return;
                                }
                                tracing::info!(
                                    parent: span,
                                    http_status = %response.status().as_u16(),
                                    latency_ms = %latency.as_millis(),
                                    "http_request_finished"
                                );
                            },
                        )
                        .on_failure(
                            |failure_class: ServerErrorsFailureClass,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                if span.is_disabled() {
                                    return;
                                }
                                tracing::error!(
                                    parent: span,
                                    failure_class = ?failure_class,
                                    latency_ms = %latency.as_millis(),
                                    "http_request_failed"
                                );
                            },
                        ),
                ),
        )
}

fn main() -> std::io::Result<()> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    let _ = openapi::write_openapi_json();

    let env = env();

    let _guard = sentry::init(sentry::ClientOptions {
        dsn: env.sentry_dsn.as_ref().and_then(|s| s.parse().ok()),
        release: option_env!("APP_VERSION").map(|v| format!("vox-api@{}", v).into()),
        environment: Some(
            if cfg!(debug_assertions) {
                "development"
            } else {
                "production"
            }
            .into(),
        ),
        traces_sample_rate: 1.0,
        sample_rate: 1.0,
        send_default_pii: true,
        auto_session_tracking: true,
        session_mode: sentry::SessionMode::Request,
        attach_stacktrace: true,
        max_breadcrumbs: 100,
        ..Default::default()
    });

    sentry::configure_scope(|scope| {
        scope.set_tag("service", "vox-api");
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .init();

    let config = JobsConfig::new(&env.supabase, &env.elevenlabs, &env.worker);
    let state = JobsState::new(config).map_err(std::io::Error::other)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            if env.worker.worker_background {
                state.start_background(None).await;
            }

            let addr = SocketAddr::from(([0, 0, 0, 0], env.port));
            tracing::info!(addr = %addr, "server_listening");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app(state.clone()))
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            if let Some(summary) = state.stop_background().await {
                tracing::info!(
                    processed = summary.processed,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "background_worker_drained"
                );
            }

            Ok::<_, std::io::Error>(())
        })?;

    if let Some(client) = sentry::Hub::current().client() {
        client.close(Some(Duration::from_secs(2)));
    }

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("shutdown_signal_received");
}

async fn openapi_json() -> axum::Json<utoipa::openapi::OpenApi> {
    axum::Json(openapi::openapi())
}

async fn version() -> &'static str {
    option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
}
