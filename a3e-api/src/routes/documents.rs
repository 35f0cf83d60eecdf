/// Evidence documents
///
/// Uploads are `multipart/form-data` with a `file` part and an optional
/// `standard_set` text part (`sacscoc` or `hlc`). Bytes go to the configured
/// storage backend under `documents/{user}/{document}/{filename}`; the row in
/// `documents` records where.
///
/// # Endpoints
///
/// - `POST /api/documents` - Upload (counts against the document quota)
/// - `GET /api/documents` - List, newest first (`?limit=&offset=`)
/// - `GET /api/documents/:id` - Metadata plus analysis, if any
/// - `DELETE /api/documents/:id` - Remove row and stored bytes
/// - `GET /api/documents/:id/download` - Original bytes

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::Pagination,
};
use a3e_shared::{
    auth::middleware::AuthContext,
    models::{
        analysis::DocumentAnalysis,
        document::{CreateDocument, Document},
        usage_event::{UsageEvent, UsageKind},
    },
    quota::QuotaType,
    standards::StandardSet,
    storage::{
        content_digest, document_key, guess_content_type, is_allowed_extension, sanitize_filename,
        ALLOWED_EXTENSIONS, MAX_UPLOAD_BYTES,
    },
};
use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
    Extension, Json,
};
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use uuid::Uuid;

/// Parsed upload form
#[derive(Debug)]
pub struct UploadForm {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
    pub standard_set: StandardSet,
}

#[derive(Debug, Serialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub analysis: Option<DocumentAnalysis>,
}

/// Reads a part into memory, refusing to buffer more than the upload cap
async fn read_capped(mut field: Field<'_>) -> ApiResult<Bytes> {
    let mut buf = BytesMut::new();

    while let Some(chunk) = field.chunk().await? {
        if buf.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::PayloadTooLarge(format!(
                "Files are limited to {} MiB",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}

pub fn parse_standard_set(raw: &str) -> ApiResult<StandardSet> {
    StandardSet::from_str(raw.trim()).ok_or_else(|| {
        ApiError::BadRequest(format!("Unknown standard set '{}'; expected sacscoc or hlc", raw.trim()))
    })
}

async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut standard_set = StandardSet::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = read_capped(field).await?;
                file = Some((filename, content_type, data));
            }
            Some("standard_set") => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    standard_set = parse_standard_set(&raw)?;
                }
            }
            _ => {}
        }
    }

    let (raw_name, content_type, data) =
        file.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'file'".to_string()))?;

    Ok(UploadForm {
        filename: sanitize_filename(&raw_name),
        content_type,
        data,
        standard_set,
    })
}

/// Content type from the part unless it is missing or generic
pub fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
        _ => guess_content_type(filename).to_string(),
    }
}

/// Checks an upload before anything is stored
pub fn check_upload(form: &UploadForm) -> ApiResult<()> {
    if !is_allowed_extension(&form.filename) {
        return Err(ApiError::UnsupportedMediaType(format!(
            "Allowed file types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    if form.data.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    Ok(())
}

/// Upload a document
///
/// # Errors
///
/// - `400 Bad Request`: Missing `file`, empty file, unknown standard set
/// - `402 Payment Required`: Trial over without a subscription
/// - `403 Forbidden`: Document quota reached
/// - `413 Payload Too Large`: Over 25 MiB
/// - `415 Unsupported Media Type`: Extension not allowed
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Document>)> {
    state.quota.enforce(auth.user_id, QuotaType::Documents).await?;

    let form = read_upload_form(multipart).await?;
    check_upload(&form)?;

    let document_id = Uuid::new_v4();
    let key = document_key(auth.user_id, document_id, &form.filename);
    let content_type = resolve_content_type(form.content_type.as_deref(), &form.filename);
    let size_bytes = form.data.len() as i64;
    let sha256 = content_digest(&form.data);

    state.storage.put(&key, form.data, &content_type).await?;

    let created = Document::create(
        &state.db,
        CreateDocument {
            id: document_id,
            user_id: auth.user_id,
            filename: form.filename,
            content_type,
            size_bytes,
            storage_key: key.clone(),
            storage_backend: state.storage.name().to_string(),
            sha256,
            standard_set: form.standard_set,
        },
    )
    .await;

    let document = match created {
        Ok(document) => document,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&key).await {
                tracing::warn!(error = %cleanup, %key, "Failed to remove orphaned upload");
            }
            return Err(e.into());
        }
    };

    UsageEvent::record_with_counter(
        &state.db,
        auth.user_id,
        UsageKind::DocumentUpload,
        serde_json::json!({ "document_id": document.id, "size_bytes": size_bytes }),
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        document_id = %document.id,
        size_bytes,
        standard_set = form.standard_set.as_str(),
        "Document uploaded"
    );

    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn list_documents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<DocumentList>> {
    let (limit, offset) = page.resolve();

    let documents = Document::list_by_user(&state.db, auth.user_id, limit, offset).await?;
    let total = Document::count_by_user(&state.db, auth.user_id).await?;

    Ok(Json(DocumentList {
        documents,
        total,
        limit,
        offset,
    }))
}

/// Ownership-scoped fetch; other users' documents are 404
pub(crate) async fn owned_document(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<Document> {
    Document::find_for_user(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))
}

pub async fn get_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DocumentDetail>> {
    let document = owned_document(&state, &auth, id).await?;
    let analysis = DocumentAnalysis::find_by_document(&state.db, document.id).await?;

    Ok(Json(DocumentDetail { document, analysis }))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let document = owned_document(&state, &auth, id).await?;

    Document::delete(&state.db, document.id).await?;

    if let Err(e) = state.storage.delete(&document.storage_key).await {
        tracing::warn!(error = %e, document_id = %document.id, "Stored bytes not removed");
    }

    tracing::info!(user_id = %auth.user_id, document_id = %document.id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `attachment; filename="..."` with quotes and control characters removed
pub fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

pub async fn download_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let document = owned_document(&state, &auth, id).await?;
    let data = state.storage.get(&document.storage_key).await?;

    UsageEvent::record(
        &state.db,
        auth.user_id,
        UsageKind::Download,
        serde_json::json!({ "document_id": document.id }),
    )
    .await?;

    let content_type = HeaderValue::from_str(&document.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&content_disposition(&document.filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let mut response = Response::new(Body::from(data));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(
        header::HeaderName::from_static("x-content-sha256"),
        HeaderValue::from_str(&document.sha256).unwrap_or_else(|_| HeaderValue::from_static("")),
    );

    Ok(response)
}
