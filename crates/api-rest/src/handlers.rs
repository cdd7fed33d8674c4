//! Request handlers.
//!
//! Handlers resolve the caller from the `X-Token` header, call into the core services, and
//! convert the outcome into wire types. Credential hashing runs on the blocking pool.

use crate::error::ApiError;
use crate::AppState;
use api_shared::auth::{basic_credentials, bearer_token, TOKEN_HEADER};
use api_shared::{
    ConnectRes, CreateFileReq, CreateUserReq, ErrorRes, FileDataQuery, FileRes, HealthRes,
    HealthService, ListFilesQuery, ListFilesRes, PathRes, RenameFileReq, UserRes,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use drive_core::{NewNode, ShardableUuid};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// The signed-in user, or 401.
fn require_user(state: &AppState, headers: &HeaderMap) -> Result<ShardableUuid, ApiError> {
    let token = bearer_token(header(headers, TOKEN_HEADER)).ok_or_else(ApiError::unauthorized)?;
    Ok(state.services.sessions.resolve(token)?)
}

/// The signed-in user if the request carries a valid token. An unknown or expired token reads
/// as anonymous.
fn optional_user(state: &AppState, headers: &HeaderMap) -> Result<Option<ShardableUuid>, ApiError> {
    match require_user(state, headers) {
        Ok(user) => Ok(Some(user)),
        Err(e) if e.status() == StatusCode::UNAUTHORIZED => Ok(None),
        Err(e) => Err(e),
    }
}

/// Path ids that are not canonical cannot name a node.
fn node_id(raw: &str) -> Result<ShardableUuid, ApiError> {
    ShardableUuid::parse(raw).map_err(|_| ApiError::not_found())
}

/// The parent named by a `parentId` value: `Some(None)` for the root, `None` when the value
/// cannot be an id.
pub(crate) fn parent_id(raw: Option<&str>) -> Option<Option<ShardableUuid>> {
    match raw.map(str::trim).filter(|p| !p.is_empty()) {
        None => Some(None),
        Some(p) => ShardableUuid::parse(p).ok().map(Some),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!("blocking task failed: {}", e);
        ApiError::internal()
    })?
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/connect",
    responses(
        (status = 200, description = "Session token", body = ConnectRes),
        (status = 401, description = "Invalid credentials", body = ErrorRes)
    )
)]
/// Exchanges `Authorization: Basic base64(email:password)` for a session token.
#[axum::debug_handler]
pub async fn connect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConnectRes>, ApiError> {
    let credentials = header(&headers, AUTHORIZATION.as_str())
        .and_then(basic_credentials)
        .ok_or_else(ApiError::unauthorized)?
        .to_owned();

    let sessions = state.services.sessions.clone();
    let token = blocking(move || Ok(sessions.authenticate(&credentials)?)).await?;
    Ok(Json(ConnectRes { token }))
}

#[utoipa::path(
    get,
    path = "/disconnect",
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Unauthorized", body = ErrorRes)
    )
)]
/// Revokes the caller's token.
#[axum::debug_handler]
pub async fn disconnect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    require_user(&state, &headers)?;
    if let Some(token) = bearer_token(header(&headers, TOKEN_HEADER)) {
        state.services.sessions.revoke(token)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User registered", body = UserRes),
        (status = 400, description = "Missing or invalid email or password", body = ErrorRes),
        (status = 409, description = "Email already registered", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserReq>, JsonRejection>,
) -> Result<(StatusCode, Json<UserRes>), ApiError> {
    let Json(req) = payload?;
    let credentials = state.services.credentials.clone();

    let user = blocking(move || Ok(credentials.register(&req.email, &req.password)?)).await?;
    Ok((StatusCode::CREATED, Json(UserRes::from(&user))))
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The signed-in user", body = UserRes),
        (status = 401, description = "Unauthorized", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserRes>, ApiError> {
    let token = bearer_token(header(&headers, TOKEN_HEADER)).ok_or_else(ApiError::unauthorized)?;
    let user = state.services.sessions.current_user(token)?;
    Ok(Json(UserRes::from(&user)))
}

#[utoipa::path(
    get,
    path = "/files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "Direct children of the folder", body = ListFilesRes),
        (status = 401, description = "Unauthorized", body = ErrorRes)
    )
)]
/// Lists the caller's nodes directly under `parentId` (the root when absent).
#[axum::debug_handler]
pub async fn list_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<ListFilesRes>, ApiError> {
    let owner = require_user(&state, &headers)?;

    // A parent that cannot exist has no children.
    let files = match parent_id(query.parent_id.as_deref()) {
        Some(parent) => state
            .services
            .files
            .list(&owner, parent.as_ref())
            .iter()
            .map(FileRes::from)
            .collect(),
        None => Vec::new(),
    };
    Ok(Json(ListFilesRes { files }))
}

#[utoipa::path(
    post,
    path = "/files",
    request_body = CreateFileReq,
    responses(
        (status = 201, description = "Node created", body = FileRes),
        (status = 400, description = "Validation failed", body = ErrorRes),
        (status = 401, description = "Unauthorized", body = ErrorRes),
        (status = 403, description = "Parent belongs to another user", body = ErrorRes),
        (status = 404, description = "Parent not found", body = ErrorRes)
    )
)]
/// Creates a folder, or a file from base64 `data`.
#[axum::debug_handler]
pub async fn create_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateFileReq>, JsonRejection>,
) -> Result<(StatusCode, Json<FileRes>), ApiError> {
    let owner = require_user(&state, &headers)?;
    let Json(req) = payload?;

    let parent = parent_id(req.parent_id.as_deref())
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Parent not found"))?;

    let node = state.services.files.create(
        &owner,
        NewNode {
            name: &req.name,
            kind: &req.kind,
            parent_id: parent,
            data: req.data.as_deref(),
        },
    )?;
    Ok((StatusCode::CREATED, Json(FileRes::from(&node))))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(("id" = String, Path, description = "Node id")),
    responses(
        (status = 200, description = "The node", body = FileRes),
        (status = 401, description = "Private node and no valid token", body = ErrorRes),
        (status = 403, description = "Private node of another user", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn get_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<FileRes>, ApiError> {
    let requester = optional_user(&state, &headers)?;
    let id = node_id(&id)?;

    let node = state
        .services
        .files
        .get(&id, requester.as_ref())
        .map_err(|e| ApiError::for_requester(e, requester.as_ref()))?;
    Ok(Json(FileRes::from(&node)))
}

#[utoipa::path(
    get,
    path = "/files/{id}/data",
    params(("id" = String, Path, description = "Node id"), FileDataQuery),
    responses(
        (status = 200, description = "File bytes with the node's content type"),
        (status = 400, description = "Folder, or unsupported size", body = ErrorRes),
        (status = 401, description = "Private file and no valid token", body = ErrorRes),
        (status = 403, description = "Private file of another user", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
/// Streams a file's bytes, or a derived representation when `size` is given.
#[axum::debug_handler]
pub async fn file_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<FileDataQuery>,
) -> Result<Response, ApiError> {
    let requester = optional_user(&state, &headers)?;
    let id = node_id(&id)?;

    // An unparsable size becomes 0, which no derived representation has, so it is rejected
    // after the access check like any other unsupported size.
    let size_hint = match query.size.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<u32>().unwrap_or(0)),
    };

    let (node, bytes) = state
        .services
        .files
        .read_content(&id, requester.as_ref(), size_hint)
        .map_err(|e| ApiError::for_requester(e, requester.as_ref()))?;

    let mut response = bytes.into_response();
    if let Some(content_type) = node.mime_type().and_then(|m| HeaderValue::from_str(m).ok()) {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    if query.download() {
        response
            .headers_mut()
            .insert(CONTENT_DISPOSITION, attachment(node.name.as_str()));
    }

    Ok(response)
}

fn attachment(name: &str) -> HeaderValue {
    let safe: String = name.chars().filter(|c| *c != '"' && *c != '\\').collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[utoipa::path(
    get,
    path = "/files/{id}/path",
    params(("id" = String, Path, description = "Node id")),
    responses(
        (status = 200, description = "Breadcrumbs from the root to the node", body = PathRes),
        (status = 401, description = "Private node and no valid token", body = ErrorRes),
        (status = 403, description = "Private node of another user", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes),
        (status = 500, description = "Corrupt hierarchy", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn file_path(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PathRes>, ApiError> {
    let requester = optional_user(&state, &headers)?;
    let id = node_id(&id)?;

    let path = state
        .services
        .files
        .breadcrumbs(&id, requester.as_ref())
        .map_err(|e| ApiError::for_requester(e, requester.as_ref()))?;
    Ok(Json(PathRes {
        path: path.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/files/{id}/publish",
    params(("id" = String, Path, description = "Node id")),
    responses(
        (status = 200, description = "Node is now public", body = FileRes),
        (status = 401, description = "Unauthorized", body = ErrorRes),
        (status = 403, description = "Not the owner", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<FileRes>, ApiError> {
    set_visibility(&state, &headers, &id, true)
}

#[utoipa::path(
    put,
    path = "/files/{id}/unpublish",
    params(("id" = String, Path, description = "Node id")),
    responses(
        (status = 200, description = "Node is now private", body = FileRes),
        (status = 401, description = "Unauthorized", body = ErrorRes),
        (status = 403, description = "Not the owner", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn unpublish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<FileRes>, ApiError> {
    set_visibility(&state, &headers, &id, false)
}

fn set_visibility(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    public: bool,
) -> Result<Json<FileRes>, ApiError> {
    let owner = require_user(state, headers)?;
    let id = node_id(id)?;
    let node = state.services.files.set_visibility(&id, &owner, public)?;
    Ok(Json(FileRes::from(&node)))
}

#[utoipa::path(
    patch,
    path = "/files/{id}",
    params(("id" = String, Path, description = "Node id")),
    request_body = RenameFileReq,
    responses(
        (status = 200, description = "Node renamed", body = FileRes),
        (status = 400, description = "Missing name", body = ErrorRes),
        (status = 401, description = "Unauthorized", body = ErrorRes),
        (status = 403, description = "Not the owner", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn rename_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<RenameFileReq>, JsonRejection>,
) -> Result<Json<FileRes>, ApiError> {
    let owner = require_user(&state, &headers)?;
    let id = node_id(&id)?;
    let Json(req) = payload?;

    let node = state.services.files.rename(&id, &owner, &req.name)?;
    Ok(Json(FileRes::from(&node)))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = String, Path, description = "Node id")),
    responses(
        (status = 204, description = "Node and all descendants deleted"),
        (status = 401, description = "Unauthorized", body = ErrorRes),
        (status = 403, description = "Not the owner", body = ErrorRes),
        (status = 404, description = "Not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let owner = require_user(&state, &headers)?;
    let id = node_id(&id)?;
    state.services.files.delete(&id, &owner)?;
    Ok(StatusCode::NO_CONTENT)
}
