//! HTTP transport for the Nexus JSON-RPC surface: authenticates a request,
//! builds an `OperationContext`, and hands it straight to `ApiDispatcher`
//! (spec.md §6 "RPC Surface"). Mirrors the teacher's `apps/server/src/main.rs`
//! layering (`Args` → tracing init → axum `Router` → graceful shutdown) with
//! the daemon-proxy `daemon_rpc` handler replaced by an in-process dispatch
//! call, since Nexus has no separate daemon process to proxy to.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use clap::Parser;
use serde_json::{json, Value};
use tokio::signal;
use tracing::info;

use nexus_core::api::{ApiDispatcher, ApiError, RequestMetadata, RpcRequest, RpcResponse};
use nexus_core::backend::{Backend, LocalBackend};
use nexus_core::config::NexusConfig;
use nexus_core::db::{MetadataStore, StoreConfig};
use nexus_core::rebac::{build_engine, DecisionCache};
use nexus_core::router::Router as MountRouter;
use nexus_core::NexusError;

#[derive(Parser, Debug)]
#[command(name = "nexus-server", about = "Nexus JSON-RPC server")]
struct Args {
	/// Directory holding the metadata database, config file, and local blobs.
	#[arg(long, env = "DATA_DIR")]
	data_dir: Option<PathBuf>,

	/// Port to bind the HTTP server on.
	#[arg(long, env = "PORT")]
	port: Option<u16>,
}

#[derive(Clone)]
struct AppState {
	dispatcher: Arc<ApiDispatcher<MetadataStore>>,
	store: Arc<MetadataStore>,
	jwt_secret: String,
	default_deadline_ms: u64,
}

/// Liveness probe — no auth, no dependency on the dispatcher (spec.md §6
/// "Health"), grounded on the teacher's `health()` handler.
async fn healthz() -> &'static str {
	"OK"
}

/// Static capability description served at the well-known agent-card path
/// (spec.md §6 "Agent Card"), so a discovering client can learn the RPC
/// surface without a side channel.
async fn agent_card() -> Json<Value> {
	Json(json!({
		"name": "nexus",
		"version": env!("CARGO_PKG_VERSION"),
		"rpc_endpoint": "/rpc",
		"methods": [
			"read", "write", "delete", "mkdir", "list", "glob", "grep", "file_info",
			"rebac_create", "rebac_delete", "rebac_check", "rebac_list_tuples", "rebac_explain",
			"admin_create_key", "register_workspace", "add_mount", "list_mounts", "sync_mount",
			"provision_user",
		],
		"auth_schemes": ["bearer_jwt", "api_key"],
		"capabilities": {
			"streaming": true,
		},
	}))
}

/// Pull the bearer credential out of either the standard `Authorization`
/// header or the infrastructure-only `X-Nexus-API-Key` alternative (spec.md
/// §6 "Authentication headers").
fn extract_credential(headers: &HeaderMap) -> Option<String> {
	if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
		if let Ok(text) = value.to_str() {
			if let Some(token) = text.strip_prefix("Bearer ") {
				return Some(token.to_string());
			}
		}
	}
	headers.get("x-nexus-api-key").and_then(|v| v.to_str().ok()).map(|s| s.to_string())
}

async fn rpc(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<RpcRequest>) -> Response {
	let id = request.id.clone();

	let Some(credential) = extract_credential(&headers) else {
		let err = ApiError::Core(NexusError::Unauthenticated);
		return Json(RpcResponse::failure(id, &err)).into_response();
	};

	let subject = match nexus_core::api::auth::authenticate(&state.store, state.jwt_secret.as_bytes(), &credential).await {
		Ok(subject) => subject,
		Err(err) => {
			let err = ApiError::Core(err);
			return Json(RpcResponse::failure(id, &err)).into_response();
		}
	};

	let client_ip = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()).map(|s| s.to_string());
	let user_agent = headers.get(axum::http::header::USER_AGENT).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
	let ctx = RequestMetadata::http_request(client_ip, user_agent).into_context(subject, state.default_deadline_ms);

	match state.dispatcher.dispatch(&ctx, &request.method, request.params).await {
		Ok(result) => Json(RpcResponse::success(id, result)).into_response(),
		Err(err) => Json(RpcResponse::failure(id, &err)).into_response(),
	}
}

async fn not_found() -> impl IntoResponse {
	(StatusCode::NOT_FOUND, "404 Not Found")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,nexus_core=debug,nexus_server=debug".into()))
		.init();

	let args = Args::parse();

	let data_dir = args.data_dir.unwrap_or_else(|| {
		std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./data"))
	});

	let mut config = NexusConfig::load_or_create(&data_dir)?;
	if let Some(port) = args.port {
		config.server.port = port;
	}

	info!(data_dir = %data_dir.display(), "starting nexus-server");

	let store_config = if config.metadata.url.starts_with("sqlite:") {
		StoreConfig::sqlite(data_dir.join("nexus.db"))
	} else {
		StoreConfig::postgres(config.metadata.url.clone(), config.metadata.writer_role())
	};
	let store = Arc::new(MetadataStore::connect(store_config).await?);
	store.migrate().await?;

	let router = Arc::new(MountRouter::new());

	let mut backends: HashMap<String, Arc<dyn Backend>> = HashMap::new();
	backends.insert("local".to_string(), Arc::new(LocalBackend::new(config.storage.local_root.clone())));

	let l2_ttl = (config.cache.l2_ttl_secs > 0).then(|| std::time::Duration::from_secs(config.cache.l2_ttl_secs));
	let decisions = Arc::new(DecisionCache::new(config.cache.l1_size_mb * 1000, 10_000, l2_ttl));
	let engine = Arc::new(build_engine(store.clone(), decisions));

	let fs = Arc::new(nexus_core::fs::FilesystemCore::new(store.clone(), router.clone(), backends.clone(), engine.clone()));
	let dispatcher = Arc::new(ApiDispatcher::new(fs, engine, router, store.clone(), backends, &config));

	let state = AppState {
		dispatcher,
		store,
		jwt_secret: config.jwt.secret.clone(),
		default_deadline_ms: config.default_deadline_ms,
	};

	let app = axum::Router::new()
		.route("/healthz", get(healthz))
		.route("/.well-known/agent.json", get(agent_card))
		.route("/rpc", post(rpc))
		.fallback(not_found)
		.layer(tower_http::trace::TraceLayer::new_for_http())
		.layer(tower_http::cors::CorsLayer::permissive())
		.with_state(state);

	let mut addr = "[::]:0".parse::<SocketAddr>().unwrap();
	addr.set_port(config.server.port);

	info!(port = config.server.port, "listening");
	let listener = tokio::net::TcpListener::bind(addr).await?;
	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => {
			info!("received ctrl+c, shutting down gracefully...");
		}
		() = terminate => {
			info!("received sigterm, shutting down gracefully...");
		}
	}
}
