pub mod chat;
pub mod documents;
pub mod health;
pub mod ui;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::api::{middleware::request_logger, state::AppState};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/", get(ui::index))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", api_v1_routes(state.max_upload_bytes))
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

fn api_v1_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/documents",
            post(documents::upload_document)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_upload_bytes))
                .get(documents::list_documents)
                .delete(documents::clear_collection),
        )
        .route("/documents/text", post(documents::ingest_text))
        .route("/documents/count", get(documents::count_chunks))
        .route("/documents/search", post(documents::search_documents))
        .route("/documents/{id}", delete(documents::delete_document))
        .route("/chunks", post(documents::get_chunks))
        .route("/chat", post(chat::chat_handler))
        .route(
            "/chat/{session_id}",
            get(chat::get_history).delete(chat::delete_session),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::application::{ChatService, DocumentProcessor, RagService, RetrievalService};
    use crate::infrastructure::{LocalVectorStore, PromptsConfig};
    use crate::testing::{KeywordEmbedding, ScriptedLlm};

    fn state_with(llm: ScriptedLlm) -> AppState {
        let rag = Arc::new(RagService::new(
            Arc::new(KeywordEmbedding::default()),
            Arc::new(LocalVectorStore::in_memory()),
            5,
        ));
        let retrieval = Arc::new(RetrievalService::new(rag.clone(), 5, 0.0));
        let assistant = Arc::new(ChatService::new(
            retrieval,
            Arc::new(llm),
            PromptsConfig::default(),
        ));

        AppState::new(Arc::new(DocumentProcessor::default()), rag, assistant)
    }

    fn app_with(llm: ScriptedLlm) -> Router {
        create_router(state_with(llm))
    }

    fn app() -> Router {
        app_with(ScriptedLlm::replying("The manual says 40 psi."))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn upload_request(file_name: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{content}\r\n--BOUNDARY--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/api/v1/documents")
            .header("content-type", "multipart/form-data; boundary=BOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app(), get_request("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chunks"], 0);
    }

    #[tokio::test]
    async fn test_index_page_served() {
        let response = app().oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("RAG Chat Assistant"));
    }

    #[tokio::test]
    async fn test_upload_list_and_delete() {
        let app = app();

        let (status, body) = send(&app, upload_request("manual.md", "Pump pressure is 40 psi.")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["chunks_added"], 1);
        assert_eq!(body["source_file"], "manual.md");
        let document_id = body["document_id"].as_str().unwrap().to_string();

        let (_, body) = send(&app, get_request("/api/v1/documents")).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["documents"][0]["document_id"], document_id.as_str());

        let (_, body) = send(&app, get_request("/api/v1/documents/count")).await;
        assert_eq!(body["count"], 1);

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/documents/{document_id}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, delete).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chunks_removed"], 1);

        let delete_again = Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/documents/{document_id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete_again).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_type() {
        let (status, body) = send(&app(), upload_request("data.csv", "a,b,c")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unsupported file type. Allowed: .pdf, .txt, .md");
    }

    #[tokio::test]
    async fn test_upload_without_content_is_unprocessable() {
        let (status, body) = send(&app(), upload_request("empty.txt", "   ")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], documents::NO_CONTENT_EXTRACTED);
    }

    #[tokio::test]
    async fn test_chat_requires_documents() {
        let app = app();
        let (status, body) = send(
            &app,
            json_request("POST", "/api/v1/chat", json!({"message": "What pressure?"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], chat::EMPTY_COLLECTION_REPLY);
        assert_eq!(body["is_error"], false);

        let session_id = body["session_id"].as_str().unwrap();
        let (_, history) = send(&app, get_request(&format!("/api/v1/chat/{session_id}"))).await;
        assert_eq!(history["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_chat_answers_and_keeps_session() {
        let app = app();
        send(
            &app,
            json_request(
                "POST",
                "/api/v1/documents/text",
                json!({"name": "manual.txt", "content": "The pump runs at 40 psi."}),
            ),
        )
        .await;

        let (_, first) = send(
            &app,
            json_request("POST", "/api/v1/chat", json!({"message": "<|pump|> pressure?"})),
        )
        .await;
        assert_eq!(first["reply"], "The manual says 40 psi.");
        assert_eq!(first["sources"][0]["source_file"], "manual.txt");

        let session_id = first["session_id"].as_str().unwrap();
        send(
            &app,
            json_request(
                "POST",
                "/api/v1/chat",
                json!({"message": "and again?", "session_id": session_id}),
            ),
        )
        .await;

        let (_, history) = send(&app, get_request(&format!("/api/v1/chat/{session_id}"))).await;
        let messages = history["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["content"], "pump pressure?");
        assert_eq!(messages[0]["role"], "user");
    }

    #[tokio::test]
    async fn test_chat_failure_is_recorded() {
        let app = app_with(ScriptedLlm::failing("upstream unavailable"));
        send(
            &app,
            json_request(
                "POST",
                "/api/v1/documents/text",
                json!({"name": "manual.txt", "content": "The pump runs at 40 psi."}),
            ),
        )
        .await;

        let (status, body) = send(
            &app,
            json_request("POST", "/api/v1/chat", json!({"message": "pressure?"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_error"], true);
        assert!(body["reply"]
            .as_str()
            .unwrap()
            .starts_with("Sorry, I encountered an error: "));
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (status, _) = send(
            &app(),
            json_request("POST", "/api/v1/chat", json!({"message": " <<>> "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_and_fetch_chunks() {
        let app = app();
        send(
            &app,
            json_request(
                "POST",
                "/api/v1/documents/text",
                json!({"name": "boilers.md", "content": "Boiler service every spring."}),
            ),
        )
        .await;

        let (status, results) = send(
            &app,
            json_request(
                "POST",
                "/api/v1/documents/search",
                json!({"query": "boiler service", "top_k": 3}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let chunk_id = results[0]["chunk_id"].as_str().unwrap().to_string();
        assert!(results[0]["relevance_score"].as_f64().unwrap() > 0.0);

        let (_, chunks) = send(
            &app,
            json_request("POST", "/api/v1/chunks", json!({"ids": [chunk_id]})),
        )
        .await;
        assert_eq!(chunks[0]["content"], "Boiler service every spring.");
    }

    #[tokio::test]
    async fn test_clear_collection_drops_sessions() {
        let app = app();
        send(
            &app,
            json_request(
                "POST",
                "/api/v1/documents/text",
                json!({"name": "a.txt", "content": "alpha beta"}),
            ),
        )
        .await;
        let (_, chat) = send(
            &app,
            json_request("POST", "/api/v1/chat", json!({"message": "alpha?"})),
        )
        .await;
        let session_id = chat["session_id"].as_str().unwrap().to_string();

        let clear = Request::builder()
            .method("DELETE")
            .uri("/api/v1/documents")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, clear).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cleared"], 1);
        assert_eq!(body["message"], "Cleared 1 chunks from the collection!");

        let (status, _) = send(&app, get_request(&format!("/api/v1/chat/{session_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_limit_is_configurable() {
        let app = create_router(state_with(ScriptedLlm::replying("ok")).with_max_upload_bytes(256));

        let (status, _) = send(&app, upload_request("big.txt", &"x".repeat(1024))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let (status, _) = send(&app, upload_request("small.txt", "tiny notes")).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_session_do_not_interleave() {
        let app = app_with(
            ScriptedLlm::replying("answer").with_delay(Duration::from_millis(50)),
        );
        send(
            &app,
            json_request(
                "POST",
                "/api/v1/documents/text",
                json!({"name": "a.txt", "content": "alpha beta"}),
            ),
        )
        .await;

        let session_id = uuid::Uuid::new_v4().to_string();
        let turn = |message: &str| {
            json_request(
                "POST",
                "/api/v1/chat",
                json!({"message": message, "session_id": session_id}),
            )
        };
        let (first, second) = tokio::join!(send(&app, turn("alpha?")), send(&app, turn("beta?")));
        assert_eq!(first.0, StatusCode::OK);
        assert_eq!(second.0, StatusCode::OK);

        let (_, history) = send(&app, get_request(&format!("/api/v1/chat/{session_id}"))).await;
        let roles: Vec<&str> = history["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
    }
}
