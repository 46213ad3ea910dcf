//! Knowledge-base endpoints: upload, query, stats, documents

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::response::{
    DocumentSummary, QueryResponse, StatsResponse, UploadResponse,
};
use crate::types::FileType;

/// POST /api/rag/upload - upload a file into the knowledge base
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Internal(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::Internal(format!("Failed to read file: {}", e)))?;

        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) =
        upload.ok_or_else(|| Error::validation("multipart request carries no file"))?;

    if !FileType::from_filename(&filename).is_upload_supported() {
        return Err(Error::UnsupportedFileType(filename));
    }

    tracing::info!("Uploading file: {} ({} bytes)", filename, data.len());

    // Strip any path components a client may have smuggled into the name
    let safe_name = std::path::Path::new(&filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
        .to_string();

    let saved_path = state.uploads_dir().join(&safe_name);
    tokio::fs::write(&saved_path, &data).await?;

    let report = state.ingest_pipeline().ingest_path(&saved_path).await?;
    state.add_document(report.document.clone());

    Ok(Json(UploadResponse {
        success: true,
        filename: safe_name,
        message: "Document successfully added to knowledge base".to_string(),
        document_id: report.document.id,
    }))
}

/// Request body for /api/rag/query
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

/// POST /api/rag/query - answer a question from the knowledge base
pub async fn query_documents(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Response {
    if request.question.trim().is_empty() {
        return Error::validation("question must not be empty").into_response();
    }

    tracing::info!("Query: \"{}\"", request.question);

    let outcome = state.query_pipeline().query(&request.question).await;
    let failed = outcome.error.is_some();
    let response = QueryResponse::from_outcome(request.question, outcome);

    if failed {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
    } else {
        Json(response).into_response()
    }
}

/// GET /api/rag/stats - knowledge base statistics
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        knowledge_base_status: "ready".to_string(),
        statistics: state.stats(),
    })
}

/// GET /api/rag/documents - list registered documents
pub async fn list_documents(State(state): State<AppState>) -> Json<Vec<DocumentSummary>> {
    let mut docs = state.list_documents();
    docs.sort_by(|a, b| b.ingested_at.cmp(&a.ingested_at));
    Json(docs.iter().map(DocumentSummary::from).collect())
}

/// DELETE /api/rag/documents/:id - remove a document and its index entries
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    match state.remove_document(&id)? {
        Some(deleted) => {
            tracing::info!("Deleted document {} ({} index entries)", id, deleted);
            Ok(Json(serde_json::json!({
                "success": true,
                "document_id": id,
                "entries_deleted": deleted,
            })))
        }
        None => Err(Error::DocumentNotFound(id.to_string())),
    }
}
