use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, Server};
use chrono::{DateTime, Utc};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use arti_proxy::config::Configuration;
use arti_proxy::storage::fs_storage::FsStorageProvider;
use arti_proxy::util::validating_http_downloader::ValidatingHttpDownloader;
use arti_proxy::{RepositoryEngine, ResolveError, ResolvedFile};

const MAX_DEPLOY_SIZE: usize = 1024 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(version, about = "Caching proxy for Maven repositories")]
struct Args {
    /// JSON configuration file, re-read on SIGHUP
    #[arg(long, env = "ARTI_PROXY_CONFIG")]
    config: PathBuf,
    /// overrides `server.bind` from the configuration file
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let configuration = Configuration::load(&args.config)?;
    let bind = args.bind.clone()
        .unwrap_or_else(|| configuration.server.bind.clone());
    let addr: SocketAddr = bind.parse()
        .with_context(|| format!("invalid bind address {:?}", bind))?;

    let engine = RepositoryEngine::new(
        configuration,
        Arc::new(FsStorageProvider::new()),
        Arc::new(ValidatingHttpDownloader::new()),
    );
    reload_on_sighup(engine.clone(), args.config.clone())?;
    evict_periodically(engine.clone());

    let app = Router::new()
        .route("/repository/:repository_id/*path", get(get_from_repository).put(deploy))
        .route("/group/:group_id/*path", get(get_from_group))
        .route("/remote/:remote_id/check", get(check_remote))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(MAX_DEPLOY_SIZE))
        )
        .with_state(engine);

    info!("serving {}", addr);
    Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("server failed")?;
    Ok(())
}

fn reload_on_sighup(engine: RepositoryEngine, config_path: PathBuf) -> anyhow::Result<()> {
    let mut hangups = signal(SignalKind::hangup())
        .context("failed to install SIGHUP handler")?;

    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            info!("reloading configuration from {}", config_path.display());
            match Configuration::load(&config_path) {
                Ok(configuration) => engine.reconfigure(configuration),
                Err(e) => error!("keeping previous configuration: {:#}", e),
            }
        }
    });
    Ok(())
}

fn evict_periodically(engine: RepositoryEngine) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            engine.evict_expired();
        }
    });
}

async fn get_from_repository(State(engine): State<RepositoryEngine>, Path((repository_id, path)): Path<(String, String)>) -> Response {
    file_response(engine.resolve(&repository_id, &path).await)
}

async fn get_from_group(State(engine): State<RepositoryEngine>, Path((group_id, path)): Path<(String, String)>) -> Response {
    file_response(engine.resolve_group(&group_id, &path).await)
}

async fn deploy(State(engine): State<RepositoryEngine>, Path((repository_id, path)): Path<(String, String)>, body: Bytes) -> Response {
    match engine.deploy(&repository_id, &path, body).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => error_response(e),
    }
}

async fn check_remote(State(engine): State<RepositoryEngine>, Path(remote_id): Path<String>) -> Response {
    match engine.check_remote(&remote_id).await {
        Ok(()) => "reachable".into_response(),
        Err(e) => error_response(e),
    }
}

async fn health() -> &'static str {
    "ok"
}

fn file_response(result: Result<ResolvedFile, ResolveError>) -> Response {
    let file = match result {
        Ok(file) => file,
        Err(e) => return error_response(e),
    };

    let last_modified = DateTime::<Utc>::from(file.last_modified)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    let mut response = file.data.into_response();
    if let Ok(value) = HeaderValue::from_str(&last_modified) {
        response.headers_mut().insert(header::LAST_MODIFIED, value);
    }
    response
}

fn error_response(e: ResolveError) -> Response {
    let status = e.status_code();
    if status.is_server_error() {
        warn!("{}", e);
    }
    (status, e.to_string()).into_response()
}
