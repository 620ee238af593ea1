use crate::{
    auth::{AuthError, Authenticator},
    bookmarks::ListedBookmark,
    enrich::{EnrichError, PageContent, Summarizer, SummaryResponse, SummaryTagsResponse},
    ids::OwnerId,
    rag::{AskRequest, AskResponse, QueryEngine, QueryError},
    store::{StoreError, BOOKMARK_LIST_LIMIT},
};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct SharedState {
    pub engine: Arc<QueryEngine>,
    pub summarizer: Arc<Summarizer>,
    pub auth: Arc<Authenticator>,
}

impl SharedState {
    /// The summarizer shares the engine's generator.
    pub fn new(engine: QueryEngine, auth: Authenticator) -> Self {
        let summarizer = Summarizer::new(engine.generator().clone());
        Self {
            engine: Arc::new(engine),
            summarizer: Arc::new(summarizer),
            auth: Arc::new(auth),
        }
    }
}

/// Builds the API router. Everything but `/api/health` requires an owner.
pub fn router(state: SharedState) -> Router {
    let owned = Router::new()
        .route("/api/rag_query", post(rag_query))
        .route("/api/tags", get(tags))
        .route("/api/bookmarks", get(bookmarks))
        .route("/api/summaries", post(summaries))
        .route("/api/summary_tags", post(summary_tags))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_owner));

    Router::new()
        .route("/api/health", get(health))
        .merge(owned)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn start_app(state: SharedState, addr: String) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::warn!("received Ctrl+C, shutting down"),
        _ = terminate => log::warn!("received SIGTERM, shutting down"),
    }
}

pub fn start_daemon(state: SharedState, addr: String) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(state, addr))
}

/// Resolves the caller's owner id from the bearer token before any handler runs.
async fn require_owner(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let owner = state.auth.authenticate(header)?;

    req.extensions_mut().insert(owner);
    Ok(next.run(req).await)
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error("{0}")]
    BadRequest(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Auth(_) => StatusCode::UNAUTHORIZED,
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Query(QueryError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            HttpError::Query(err) if err.is_upstream() => StatusCode::BAD_GATEWAY,
            HttpError::Query(_) => StatusCode::BAD_REQUEST,
            HttpError::Enrich(EnrichError::Validation(_)) => StatusCode::BAD_REQUEST,
            HttpError::Enrich(_) | HttpError::Store(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{self:?}");
        }

        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn rag_query(
    State(state): State<SharedState>,
    Extension(owner): Extension<OwnerId>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, HttpError> {
    let Json(request) = payload.map_err(|err| HttpError::BadRequest(err.body_text()))?;

    let outcome = state.engine.ask(&owner, request).await?;
    Ok(Json(outcome.into_response()))
}

async fn tags(
    State(state): State<SharedState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Json<Vec<String>>, HttpError> {
    let tags = state.engine.store().tags(&owner).await?;
    Ok(Json(tags))
}

async fn bookmarks(
    State(state): State<SharedState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Json<Vec<ListedBookmark>>, HttpError> {
    let listed = state
        .engine
        .store()
        .list_bookmarks(&owner, BOOKMARK_LIST_LIMIT)
        .await?;
    Ok(Json(listed))
}

async fn summaries(
    State(state): State<SharedState>,
    payload: Result<Json<PageContent>, JsonRejection>,
) -> Result<Json<SummaryResponse>, HttpError> {
    let Json(page) = payload.map_err(|err| HttpError::BadRequest(err.body_text()))?;

    let summary = state.summarizer.summarize(&page).await?;
    Ok(Json(SummaryResponse { summary }))
}

async fn summary_tags(
    State(state): State<SharedState>,
    payload: Result<Json<PageContent>, JsonRejection>,
) -> Result<Json<SummaryTagsResponse>, HttpError> {
    let Json(page) = payload.map_err(|err| HttpError::BadRequest(err.body_text()))?;

    let tags = state.summarizer.suggest_tags(&page).await?;
    Ok(Json(SummaryTagsResponse { tags }))
}
