use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, Method};
use axum::response::Html;
use axum::routing::get;
use axum::{Form, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::ChatForm;
use crate::rag::RagChain;

pub const CHAT_PAGE: &str = include_str!("../templates/chat.html");

pub struct AppState {
    pub chain: RagChain,
}

pub fn router(state: Arc<AppState>, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/get", get(chat).post(chat))
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// The `msg` field of `/get`: read from the query string on GET and from an
/// urlencoded or multipart body on POST. Bodies of any other type carry no field.
pub struct ChatMessage(pub Option<String>);

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

#[async_trait]
impl<S> FromRequest<S> for ChatMessage
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_multipart(&req) {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidForm(e.body_text()))?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| ApiError::InvalidForm(e.body_text()))?
            {
                if field.name() == Some("msg") {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidForm(e.body_text()))?;
                    return Ok(Self(Some(text)));
                }
            }
            return Ok(Self(None));
        }

        match Form::<ChatForm>::from_request(req, state).await {
            Ok(Form(form)) => Ok(Self(form.msg)),
            Err(rejection) => {
                tracing::debug!("No form body on /get: {}", rejection.body_text());
                Ok(Self(None))
            }
        }
    }
}

async fn chat(
    State(state): State<Arc<AppState>>,
    ChatMessage(msg): ChatMessage,
) -> Result<String, ApiError> {
    let request_id = Uuid::new_v4();
    let msg = msg.ok_or(ApiError::MissingField("msg"))?;
    tracing::info!(%request_id, "Input: {}", msg);

    let output = state.chain.invoke(&msg).await?;
    tracing::info!(
        %request_id,
        "Response ({} documents): {}",
        output.context.len(),
        output.answer
    );

    Ok(output.answer)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
