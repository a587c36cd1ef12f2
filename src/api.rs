use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::{CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::node::identity::PATH_DELIMITER;
use crate::store::{DocumentStore, SearchHits, SearchQuery, StoreError};

pub const TOTAL_COUNT_HEADER: HeaderName = HeaderName::from_static("x-total-count");

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0} argument must be set")]
    MissingParameter(&'static str),
    #[error("{0} argument must be an absolute path")]
    NotAbsolute(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingParameter(_) | ApiError::NotAbsolute(_) => {
                (StatusCode::BAD_REQUEST, self.to_string()).into_response()
            }
            ApiError::Store(err) => {
                tracing::error!(error = %err, "store query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to query the document store",
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WatchParams {
    folder: Option<String>,
}

/// Read-only query surface over the store.
pub fn router(store: Arc<dyn DocumentStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([ORIGIN, CONTENT_TYPE])
        .expose_headers([TOTAL_COUNT_HEADER]);

    Router::new()
        .route("/all", get(list_all))
        .route("/watch", get(list_watch_folder))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// GET /all - every node, sorted by path.
async fn list_all(State(store): State<Arc<dyn DocumentStore>>) -> Result<Response, ApiError> {
    let hits = store.search(&SearchQuery::All).await?;
    Ok(counted(hits))
}

/// GET /watch?folder=<path> - nodes at or beneath `folder`, sorted by path.
/// `folder` must be absolute; `/` lists everything.
async fn list_watch_folder(
    State(store): State<Arc<dyn DocumentStore>>,
    Query(params): Query<WatchParams>,
) -> Result<Response, ApiError> {
    let folder = params.folder.ok_or(ApiError::MissingParameter("folder"))?;
    if !folder.starts_with(PATH_DELIMITER) {
        return Err(ApiError::NotAbsolute("folder"));
    }
    let hits = store.search(&SearchQuery::Subtree(folder)).await?;
    Ok(counted(hits))
}

fn counted(hits: SearchHits) -> Response {
    let mut response = Json(hits.nodes).into_response();
    response
        .headers_mut()
        .insert(TOTAL_COUNT_HEADER, HeaderValue::from(hits.total));
    response
}
