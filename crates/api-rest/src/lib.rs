//! # API REST
//!
//! REST API implementation for Drive.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! Uses `api-shared` for wire types and `drive-core` for everything else.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod handlers;

use api_shared::{
    ConnectRes, CreateFileReq, CreateUserReq, ErrorRes, FileRes, HealthRes, ListFilesRes,
    PathEntryRes, PathRes, RenameFileReq, UserRes,
};
use axum::routing::{get, post, put};
use axum::Router;
use drive_core::DriveServices;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;

/// Application state shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: DriveServices,
}

impl AppState {
    pub fn new(services: DriveServices) -> Self {
        Self { services }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::connect,
        handlers::disconnect,
        handlers::create_user,
        handlers::current_user,
        handlers::list_files,
        handlers::create_file,
        handlers::get_file,
        handlers::file_data,
        handlers::file_path,
        handlers::publish,
        handlers::unpublish,
        handlers::rename_file,
        handlers::delete_file,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        ConnectRes,
        CreateUserReq,
        UserRes,
        CreateFileReq,
        RenameFileReq,
        FileRes,
        ListFilesRes,
        PathEntryRes,
        PathRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full application: routes, Swagger UI and CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/connect", get(handlers::connect))
        .route("/disconnect", get(handlers::disconnect))
        .route("/users", post(handlers::create_user))
        .route("/users/me", get(handlers::current_user))
        .route(
            "/files",
            get(handlers::list_files).post(handlers::create_file),
        )
        .route(
            "/files/:id",
            get(handlers::get_file)
                .patch(handlers::rename_file)
                .delete(handlers::delete_file),
        )
        .route("/files/:id/data", get(handlers::file_data))
        .route("/files/:id/path", get(handlers::file_path))
        .route("/files/:id/publish", put(handlers::publish))
        .route("/files/:id/unpublish", put(handlers::unpublish))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
