//! Chat and session-inspection API.
//!
//! JSON endpoints:
//! - `POST /api/chat`                           — run one chat turn
//! - `GET  /api/sessions`                       — list sessions
//! - `GET  /api/sessions/{id}/messages`         — raw message log for a session
//! - `GET  /api/sessions/{id}/tool_calls`       — tool invocations for a session
//!
//! The static frontend under the configured `static_dir` is served for every
//! non-API path, with `/` falling back to `index.html`.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::services::{ServeDir, ServeFile};
use tracing::error;
use uuid::Uuid;

use shelfdesk_agent::{AgentRuntime, ToolInvocation};
use shelfdesk_core::domain::conversation::SessionId;
use shelfdesk_db::repositories::{ConversationRepository, SqlConversationRepository};
use shelfdesk_db::DbPool;

use crate::health;

#[derive(Clone)]
pub struct ApiState {
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub response: String,
    pub tool_calls: Vec<ToolInvocation>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct MessageRow {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ToolCallRow {
    pub id: i64,
    pub name: String,
    pub args_json: Value,
    pub result_json: Value,
    pub created_at: String,
}

pub fn router(state: ApiState, static_dir: &FsPath) -> Router {
    let frontend = ServeDir::new(static_dir)
        .fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{session_id}/messages", get(session_messages))
        .route("/api/sessions/{session_id}/tool_calls", get(session_tool_calls))
        .with_state(state.clone())
        .merge(health::router(state.db_pool))
        .fallback_service(frontend)
}

async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    if request.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError { error: "Message cannot be empty".to_string() }),
        ));
    }

    // Mint a fresh session when the client does not continue one.
    let session = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .map(SessionId)
        .unwrap_or_else(|| SessionId(Uuid::new_v4().to_string()));

    match state.runtime.handle_turn(&session, &request.message).await {
        Ok(outcome) => Ok(Json(ChatResponse {
            session_id: session.0,
            response: outcome.response,
            tool_calls: outcome.tool_calls,
        })),
        Err(err) => {
            error!(session = %session, error = %err, "chat turn failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError { error: err.to_string() }),
            ))
        }
    }
}

async fn list_sessions(
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<ApiError>)> {
    let log = SqlConversationRepository::new(state.db_pool.clone());
    let sessions = log.list_sessions().await.map_err(internal_error)?;
    let rows = sessions
        .into_iter()
        .map(|summary| {
            serde_json::json!({
                "session_id": summary.session_id.0,
                "started": summary.started.to_rfc3339(),
                "message_count": summary.message_count,
            })
        })
        .collect::<Vec<_>>();
    Ok(Json(Value::Array(rows)))
}

async fn session_messages(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<MessageRow>>, (StatusCode, Json<ApiError>)> {
    let log = SqlConversationRepository::new(state.db_pool.clone());
    let messages =
        log.raw_messages(&SessionId(session_id)).await.map_err(internal_error)?;
    let rows = messages
        .into_iter()
        .map(|message| MessageRow {
            id: message.id,
            role: message.role,
            content: message.content,
            created_at: message.created_at.to_rfc3339(),
        })
        .collect();
    Ok(Json(rows))
}

async fn session_tool_calls(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ToolCallRow>>, (StatusCode, Json<ApiError>)> {
    let log = SqlConversationRepository::new(state.db_pool.clone());
    let calls = log.tool_calls(&SessionId(session_id)).await.map_err(internal_error)?;
    let rows = calls
        .into_iter()
        .map(|call| ToolCallRow {
            id: call.id,
            name: call.name,
            args_json: parse_or_string(&call.args_json),
            result_json: parse_or_string(&call.result_json),
            created_at: call.created_at.to_rfc3339(),
        })
        .collect();
    Ok(Json(rows))
}

/// Stored payloads should be JSON, but a row that is not still renders as a
/// plain string rather than failing the whole listing.
fn parse_or_string(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn internal_error(error: shelfdesk_db::RepositoryError) -> (StatusCode, Json<ApiError>) {
    error!(%error, "session query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiError { error: error.to_string() }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use shelfdesk_agent::llm::{CompletionTurn, LlmClient, ToolDefinition, WireMessage};
    use shelfdesk_agent::{AgentRuntime, ToolRegistry};
    use shelfdesk_db::repositories::{
        SqlCatalogRepository, SqlConversationRepository, SqlOrderRepository,
    };
    use shelfdesk_db::{connect_with_settings, migrations};

    use super::{router, ApiState};

    struct CannedLlm {
        reply: String,
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn chat(
            &self,
            _messages: &[WireMessage],
            _tools: &[ToolDefinition],
        ) -> Result<CompletionTurn> {
            Ok(CompletionTurn { content: Some(self.reply.clone()), tool_calls: Vec::new() })
        }
    }

    async fn test_state(reply: &str) -> ApiState {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let catalog = Arc::new(SqlCatalogRepository::new(pool.clone()));
        let orders = Arc::new(SqlOrderRepository::new(pool.clone()));
        let log = Arc::new(SqlConversationRepository::new(pool.clone()));
        let runtime = Arc::new(AgentRuntime::new(
            Arc::new(CannedLlm { reply: reply.to_string() }),
            ToolRegistry::standard(catalog, orders),
            log,
            "be helpful".to_string(),
            4,
        ));

        ApiState { db_pool: pool, runtime }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn chat_mints_a_session_and_replies() {
        let state = test_state("Hello from the desk.").await;
        let app = router(state, std::path::Path::new("app"));

        let response = app
            .oneshot(
                Request::post("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"message": "hi"}).to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["response"], "Hello from the desk.");
        assert!(!body["session_id"].as_str().expect("session id").is_empty());
        assert_eq!(body["tool_calls"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn blank_message_is_a_bad_request() {
        let state = test_state("unused").await;
        let app = router(state, std::path::Path::new("app"));

        let response = app
            .oneshot(
                Request::post("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"message": "   "}).to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Message cannot be empty");
    }

    #[tokio::test]
    async fn chat_turns_show_up_in_session_listings() {
        let state = test_state("noted").await;
        let app = router(state, std::path::Path::new("app"));

        let chat_response = app
            .clone()
            .oneshot(
                Request::post("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"session_id": "s-1", "message": "remember this"}).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(chat_response.status(), StatusCode::OK);

        let sessions = app
            .clone()
            .oneshot(Request::get("/api/sessions").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let sessions = json_body(sessions).await;
        assert_eq!(sessions[0]["session_id"], "s-1");
        assert_eq!(sessions[0]["message_count"], 2);

        let messages = app
            .oneshot(
                Request::get("/api/sessions/s-1/messages").body(Body::empty()).expect("request"),
            )
            .await
            .expect("response");
        let messages = json_body(messages).await;
        let rows = messages.as_array().expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["role"], "user");
        assert_eq!(rows[1]["role"], "assistant");
        assert_eq!(rows[1]["content"], "noted");
    }

    #[tokio::test]
    async fn unknown_session_returns_empty_collections() {
        let state = test_state("unused").await;
        let app = router(state, std::path::Path::new("app"));

        let response = app
            .oneshot(
                Request::get("/api/sessions/ghost/tool_calls")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body.as_array().map(Vec::len), Some(0));
    }
}
