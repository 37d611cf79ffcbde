//!
//! dirserve HTTP server
//! --------------------
//! Axum routes around the index and policy core.
//!
//! Responsibilities:
//! - JSON listings and index search under `/-/json`, plain file download on `GET /{path}`.
//! - Upload (multipart POST), edit (PUT), delete (DELETE) and mkdir, each gated by the
//!   effective policy resolved for the target path and the caller identity.
//! - Background index refresh started alongside the listener.
//! - Access logging of every request.

use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRef, Multipart, Path, Query, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeFile;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{AuthSettings, Caller};
use crate::index::{spawn_refresh_loop, SharedIndex};
use crate::listing::{self, Listing};
use crate::paths;
use crate::policy::{write_fragment, AccessPolicy, PolicyFragment, PolicyResolver, POLICY_FILE_NAME};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Absolute served root.
    pub root: Arc<PathBuf>,
    pub index: SharedIndex,
    pub resolver: Arc<PolicyResolver>,
    pub auth: Arc<AuthSettings>,
}

impl FromRef<AppState> for Arc<AuthSettings> {
    fn from_ref(state: &AppState) -> Self { state.auth.clone() }
}

impl AppState {
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let root = paths::normalize_root(&config.root)
            .with_context(|| format!("While normalizing root: {}", config.root))?;
        if !root.is_dir() {
            anyhow::bail!("root directory does not exist: {}", root.display());
        }
        let resolver = PolicyResolver::new(root.clone(), config.default_policy());
        let auth = AuthSettings::from_config(&config);
        Ok(Self {
            index: SharedIndex::new(root.clone()),
            root: Arc::new(root),
            resolver: Arc::new(resolver),
            auth: Arc::new(auth),
            config: Arc::new(config),
        })
    }

    fn policy_for(&self, rel: &str) -> AccessPolicy { self.resolver.resolve(rel) }
}

pub fn router(state: AppState) -> Router {
    let cors = state.config.cors;
    let app = Router::new()
        .route("/-/sysinfo", get(sysinfo))
        .route("/-/status", get(status))
        .route("/-/json", get(json_root))
        .route("/-/json/{*path}", get(json_list))
        .route("/-/info/{*path}", get(file_info))
        .route("/-/mkdir", post(mkdir_root))
        .route("/-/mkdir/{*path}", post(mkdir))
        .route("/", get(serve_root).post(upload_root))
        .route("/{*path}", get(serve_path).post(upload).put(edit).delete(delete_path))
        // uploads are streamed to disk, so no request body cap
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn(access_log))
        .with_state(state);
    if cors { app.layer(CorsLayer::permissive()) } else { app }
}

/// Serve on an already bound listener until the future is dropped.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

/// Start the index refresher and the HTTP listener described by `config`.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.addr.clone();
    let schedule = config.refresh_schedule();
    let state = AppState::new(config)?;
    info!(
        target: "startup",
        "root={}, upload={}, delete={}, mkdir={}, basic_auth={}, cors={}",
        state.root.display(), state.config.upload, state.config.delete, state.config.mkdir,
        state.auth.basic.is_some(), state.config.cors
    );

    let refresher = spawn_refresh_loop(state.index.clone(), schedule);

    let listener = TcpListener::bind(&addr).await
        .with_context(|| format!("Failed to bind listen address: {}", addr))?;
    info!(target: "startup", "listening on {}", addr);
    let app = router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresher.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn access_log(req: Request, next: Next) -> Response {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = req.method().clone();
    let uri = req.uri().clone();
    let resp = next.run(req).await;
    info!(target: "access", "{} - {} {} {}", remote, method, resp.status().as_u16(), uri);
    resp
}

fn clean(raw: &str) -> AppResult<String> {
    paths::clean_request_path(raw).map_err(|e| AppError::user("bad_path", &e.to_string()))
}

/// Policy fragments are managed on the host, never through upload/edit/delete.
fn reject_policy_file(name: &str) -> AppResult<()> {
    if name == POLICY_FILE_NAME {
        return Err(AppError::forbidden("policy_file", format!("{} cannot be modified over HTTP", POLICY_FILE_NAME)));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    search: Option<String>,
    download: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MkdirForm {
    #[serde(rename = "folderName")]
    folder_name: String,
}

#[derive(Debug, Deserialize)]
struct EditForm { content: String }

async fn sysinfo() -> impl IntoResponse {
    Json(json!({"version": env!("CARGO_PKG_VERSION")}))
}

async fn status(State(state): State<AppState>, _caller: Caller) -> impl IntoResponse {
    let current = state.index.current();
    Json(json!({
        "title": state.config.title,
        "root": state.root.display().to_string(),
        "upload": state.config.upload,
        "delete": state.config.delete,
        "mkdir": state.config.mkdir,
        "index": {
            "generation": current.generation(),
            "files": current.snapshot().len(),
            "bytes": current.snapshot().total_size(),
            "cachedDirs": current.cached_dirs(),
            "builtAt": current.built_at().to_rfc3339(),
        },
    }))
}

fn listing_for(state: &AppState, caller: &Caller, rel: &str, q: &ListQuery) -> AppResult<Listing> {
    let policy = state.policy_for(rel);
    let local = paths::local_path(&state.root, rel);
    if q.search.is_none() && !paths::is_dir(&local) {
        return Err(AppError::not_found("not_found", &format!("no such directory: /{}", rel)));
    }
    listing::build_listing(&state.root, rel, q.search.as_deref(), &policy, caller.identity(), &state.index.current())
}

async fn json_root(State(state): State<AppState>, caller: Caller, Query(q): Query<ListQuery>) -> AppResult<Json<Listing>> {
    listing_for(&state, &caller, "", &q).map(Json)
}

async fn json_list(
    State(state): State<AppState>,
    caller: Caller,
    Path(path): Path<String>,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Listing>> {
    let rel = clean(&path)?;
    listing_for(&state, &caller, &rel, &q).map(Json)
}

async fn file_info(State(state): State<AppState>, _caller: Caller, Path(path): Path<String>) -> AppResult<Response> {
    let rel = clean(&path)?;
    let local = paths::local_path(&state.root, &rel);
    if !paths::is_file(&local) {
        return Err(AppError::forbidden("not_a_file", "Not a file"));
    }
    let meta = std::fs::metadata(&local)?;
    let kind = match local.extension().and_then(|e| e.to_str()) {
        Some("md") => "markdown",
        _ => "text",
    };
    let mtime = meta.modified().map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis()).unwrap_or(0);
    Ok(Json(json!({
        "name": paths::base_name(&rel),
        "type": kind,
        "size": meta.len(),
        "path": rel,
        "mtime": mtime,
    })).into_response())
}

async fn serve_root(State(state): State<AppState>, caller: Caller, Query(q): Query<ListQuery>, req: Request) -> AppResult<Response> {
    serve_inner(&state, &caller, "", &q, req).await
}

async fn serve_path(
    State(state): State<AppState>,
    caller: Caller,
    Path(path): Path<String>,
    Query(q): Query<ListQuery>,
    req: Request,
) -> AppResult<Response> {
    let rel = clean(&path)?;
    serve_inner(&state, &caller, &rel, &q, req).await
}

async fn serve_inner(state: &AppState, caller: &Caller, rel: &str, q: &ListQuery, req: Request) -> AppResult<Response> {
    let local = paths::local_path(&state.root, rel);
    if paths::is_dir(&local) {
        return listing_for(state, caller, rel, q).map(|l| Json(l).into_response());
    }
    if !paths::is_file(&local) {
        return Err(AppError::not_found("not_found", format!("no such file: /{}", rel)));
    }
    // ServeFile handles content type, HEAD, Range and conditional requests
    let resp = ServeFile::new(&local).oneshot(req).await.unwrap_or_else(|never| match never {});
    let mut resp = resp.map(Body::new);
    if q.download.as_deref() == Some("true") && resp.status().is_success() {
        let disposition = format!("attachment; filename={:?}", paths::base_name(rel));
        let value = HeaderValue::from_str(&disposition).unwrap_or_else(|_| HeaderValue::from_static("attachment"));
        resp.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(resp)
}

async fn mkdir_root(State(state): State<AppState>, caller: Caller, Form(form): Form<MkdirForm>) -> AppResult<Response> {
    mkdir_inner(&state, &caller, "", &form.folder_name)
}

async fn mkdir(
    State(state): State<AppState>,
    caller: Caller,
    Path(path): Path<String>,
    Form(form): Form<MkdirForm>,
) -> AppResult<Response> {
    let rel = clean(&path)?;
    mkdir_inner(&state, &caller, &rel, &form.folder_name)
}

fn mkdir_inner(state: &AppState, caller: &Caller, rel: &str, folder_name: &str) -> AppResult<Response> {
    let policy = state.policy_for(rel);
    if !policy.can_mkdir(caller.identity()) {
        return Err(AppError::forbidden("mkdir_forbidden", "Mkdir forbidden"));
    }
    let target = clean(&paths::join_logical(rel, folder_name))?;
    if target.is_empty() || !paths::is_under(&target, rel) {
        return Err(AppError::user("bad_folder_name", "folder name must name a new child directory"));
    }
    reject_policy_file(paths::base_name(&target))?;
    let local = paths::local_path(&state.root, &target);
    if let Err(e) = std::fs::create_dir(&local) {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            return Err(AppError::forbidden("mkdir_exists", "Mkdir forbidden: directory already exists"));
        }
        return Err(e.into());
    }
    if let Err(e) = write_fragment(&local, &PolicyFragment::for_new_directory()) {
        warn!(target: "policy", dir = %local.display(), "failed to write default policy fragment: {}", e);
    }
    info!(target: "access", identity = ?caller.identity(), "mkdir /{}", target);
    Ok((StatusCode::OK, "Success").into_response())
}

async fn upload_root(State(state): State<AppState>, caller: Caller, multipart: Multipart) -> AppResult<Response> {
    upload_inner(&state, &caller, "", multipart).await
}

async fn upload(
    State(state): State<AppState>,
    caller: Caller,
    Path(path): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let rel = clean(&path)?;
    upload_inner(&state, &caller, &rel, multipart).await
}

async fn upload_inner(state: &AppState, caller: &Caller, rel: &str, mut multipart: Multipart) -> AppResult<Response> {
    let policy = state.policy_for(rel);
    if !policy.can_upload(caller.identity()) {
        return Err(AppError::forbidden("upload_forbidden", "Upload forbidden"));
    }
    let dir = paths::local_path(&state.root, rel);
    if !paths::is_dir(&dir) {
        return Err(AppError::not_found("not_found", &format!("no such directory: /{}", rel)));
    }
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::user("bad_multipart", &e.to_string()))? {
        if field.name() != Some("file") { continue; }
        let raw_name = field.file_name().unwrap_or_default().to_string();
        let file_name = paths::base_name(&clean(&raw_name)?).to_string();
        if file_name.is_empty() {
            return Err(AppError::user("bad_file_name", "uploaded file needs a name"));
        }
        reject_policy_file(&file_name)?;
        let dest = dir.join(&file_name);
        let written = match write_field(&dest, field).await {
            Ok(n) => n,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&dest).await {
                    warn!(target: "access", dest = %dest.display(), "failed to remove partial upload: {}", rm);
                }
                return Err(e);
            }
        };
        let logical = paths::join_logical(rel, &file_name);
        info!(target: "access", identity = ?caller.identity(), bytes = written, "upload /{}", logical);
        return Ok(Json(json!({"success": true, "destination": logical})).into_response());
    }
    Err(AppError::user("missing_file", "multipart field 'file' is required"))
}

/// Stream one multipart field into `dest` chunk by chunk.
async fn write_field(dest: &FsPath, mut field: Field<'_>) -> AppResult<u64> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(|e| AppError::user("bad_multipart", e.body_text()))? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

async fn edit(
    State(state): State<AppState>,
    caller: Caller,
    Path(path): Path<String>,
    Form(form): Form<EditForm>,
) -> AppResult<Response> {
    let rel = clean(&path)?;
    reject_policy_file(paths::base_name(&rel))?;
    // editing needs upload rights
    if !state.policy_for(&rel).can_upload(caller.identity()) {
        return Err(AppError::forbidden("edit_forbidden", "Edit forbidden"));
    }
    let local = paths::local_path(&state.root, &rel);
    if paths::is_dir(&local) {
        return Err(AppError::forbidden("edit_forbidden", &format!("Edit forbidden: directory can't be modified: /{}", rel)));
    }
    if !paths::is_file(&local) {
        return Err(AppError::forbidden("edit_forbidden", "Edit forbidden: file not exists"));
    }
    tokio::fs::write(&local, form.content.as_bytes()).await?;
    info!(target: "access", identity = ?caller.identity(), "edit /{}", rel);
    Ok((StatusCode::OK, "Success").into_response())
}

async fn delete_path(State(state): State<AppState>, caller: Caller, Path(path): Path<String>) -> AppResult<Response> {
    let rel = clean(&path)?;
    if !state.policy_for(&rel).can_delete(caller.identity()) {
        return Err(AppError::forbidden("delete_forbidden", "Delete forbidden"));
    }
    if rel.is_empty() {
        return Err(AppError::forbidden("delete_forbidden", "Delete forbidden: served root"));
    }
    reject_policy_file(paths::base_name(&rel))?;
    let local = paths::local_path(&state.root, &rel);
    if paths::is_file(&local) {
        tokio::fs::remove_file(&local).await?;
    } else if paths::is_dir(&local) {
        tokio::fs::remove_dir_all(&local).await?;
    } else {
        return Err(AppError::not_found("not_found", &format!("no such file or directory: /{}", rel)));
    }
    info!(target: "access", identity = ?caller.identity(), "delete /{}", rel);
    Ok((StatusCode::OK, "Success").into_response())
}
