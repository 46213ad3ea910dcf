//! Generation endpoints: legacy passthrough and streaming chat

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;

use crate::error::Result;
use crate::generation::PromptBuilder;
use crate::providers::ollama::RawGenerateRequest;
use crate::retrieval::QueryPipeline;
use crate::server::state::AppState;

/// Keywords that route a chat question through retrieval first. The chat
/// entry point is the only place this heuristic applies; the query endpoint
/// always attempts retrieval.
const RAG_KEYWORDS: &[&str] = &[
    "document",
    "policy",
    "report",
    "contract",
    "procedure",
    "handbook",
    "regulation",
    "guideline",
    "invoice",
    "onboarding",
    "company",
    "corporate",
    "internal",
    "knowledge base",
];

/// Keyword-membership test over the lowercased question
pub fn should_attempt_retrieval(question: &str) -> bool {
    let lower = question.to_lowercase();
    RAG_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// POST /generate - raw passthrough to the generation provider.
///
/// Returns the upstream NDJSON lines joined into one string, unparsed.
pub async fn generate_raw(
    State(state): State<AppState>,
    Json(request): Json<RawGenerateRequest>,
) -> Result<Json<String>> {
    let raw = state.ollama().generate_raw(&request).await?;
    Ok(Json(raw))
}

/// POST /generate_formatted - passthrough that concatenates the `response`
/// field of each upstream NDJSON line.
pub async fn generate_formatted(
    State(state): State<AppState>,
    Json(request): Json<RawGenerateRequest>,
) -> Result<Json<serde_json::Value>> {
    let formatted = state.ollama().generate_formatted(&request).await?;
    Ok(Json(serde_json::json!({ "response": formatted })))
}

/// Request body for /api/chat/stream
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

/// POST /api/chat/stream - stream a chat answer as server-sent events.
///
/// Questions matching the retrieval keywords are grounded in the knowledge
/// base; everything else goes straight to the model. The final event carries
/// the source attribution.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl futures_util::Stream<Item = std::result::Result<Event, Infallible>>>> {
    let question = request.question.trim().to_string();
    if question.is_empty() {
        return Err(crate::error::Error::validation("question must not be empty"));
    }

    let mut sources: Vec<String> = Vec::new();
    let prompt = if should_attempt_retrieval(&question) {
        match state.query_pipeline().retrieve(&question).await {
            Ok(hits) => {
                let context = QueryPipeline::assemble_context(&hits);
                sources = hits
                    .iter()
                    .take(3)
                    .map(|hit| hit.chunk.source_file_name.clone())
                    .collect();
                if context.is_empty() {
                    PromptBuilder::general(&question)
                } else {
                    PromptBuilder::grounded(&context, &question)
                }
            }
            Err(e) => {
                tracing::warn!("Retrieval failed for chat, answering without context: {}", e);
                PromptBuilder::general(&question)
            }
        }
    } else {
        PromptBuilder::general(&question)
    };

    let stream = state.ollama().generate_stream(&prompt).await?;

    let events = stream
        .map(|chunk| {
            let event = match chunk {
                Ok(text) => Event::default()
                    .json_data(serde_json::json!({ "chunk": text }))
                    .unwrap_or_else(|_| Event::default()),
                Err(e) => Event::default()
                    .json_data(serde_json::json!({ "error": e.to_string() }))
                    .unwrap_or_else(|_| Event::default()),
            };
            Ok(event)
        })
        .chain(futures_util::stream::once(async move {
            Ok(Event::default()
                .json_data(serde_json::json!({ "done": true, "sources": sources }))
                .unwrap_or_else(|_| Event::default()))
        }));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_keywords() {
        assert!(should_attempt_retrieval("What does the vacation POLICY say?"));
        assert!(should_attempt_retrieval("summarize the quarterly report"));
        assert!(!should_attempt_retrieval("What is the weather like today?"));
        assert!(!should_attempt_retrieval("Tell me a joke"));
    }
}
