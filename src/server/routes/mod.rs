//! API routes for the RAG server

pub mod generate;
pub mod rag;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all /api routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Knowledge base
        .route(
            "/rag/upload",
            post(rag::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/rag/query", post(rag::query_documents))
        .route("/rag/stats", get(rag::stats))
        .route("/rag/documents", get(rag::list_documents))
        .route("/rag/documents/:id", delete(rag::delete_document))
        // Streaming chat (keyword-routed between RAG and plain generation)
        .route("/chat/stream", post(generate::chat_stream))
}
