//! # Documents API
//!
//! Uploaded files are written to `{MEDIA_ROOT}/documents/{user_id}/{id}.{ext}`
//! before the metadata row is committed; a failed insert removes the file
//! again. Deleting a document row deletes its file.
//!
//! ## Endpoints
//!
//! - `POST /api/v1/documents/upload`: multipart upload
//! - `GET /api/v1/documents`: the caller's documents
//! - `GET|DELETE /api/v1/documents/:id`, `GET /api/v1/documents/:id/download`
//! - `GET /api/v1/documents/admin/all`: every document (admin)
//! - `PATCH /api/v1/documents/:id/verify`, `PATCH /api/v1/documents/:id/unverify` (admin)
//! - `DELETE /api/v1/documents/admin/:id`, `GET /api/v1/documents/admin/:id/download` (admin)

use std::io;

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use hims_core::document::{check_upload, mime_for_extension, size_mb, storage_path, NewDocument, MAX_FILE_SIZE};
use hims_core::store::DocumentFilter;
use hims_core::{Document, DocumentType, User, ValidationError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AdminUser, CurrentUser};
use crate::db::{Change, Kind};
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::AppState;

/// Request body cap for uploads: the file limit plus room for the other
/// multipart fields. Files between the two limits get a precise 413 from
/// [`check_upload`].
const UPLOAD_BODY_LIMIT: usize = MAX_FILE_SIZE as usize + 1024 * 1024;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub document_type: DocumentType,
    pub document_type_display: String,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    /// Bytes.
    pub file_size: i64,
    pub file_size_mb: f64,
    pub mime_type: Option<String>,
    pub registration_id: Option<Uuid>,
    pub person_id: Option<Uuid>,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Document> for DocumentResponse {
    fn from(d: &Document) -> Self {
        Self {
            id: d.id,
            document_type: d.document_type,
            document_type_display: d.document_type.label_fa().to_string(),
            title: d.title.clone(),
            description: d.description.clone(),
            file_name: d.file_name.clone(),
            file_size: d.file_size,
            file_size_mb: size_mb(d.file_size),
            mime_type: d.mime_type.clone(),
            registration_id: d.registration_id,
            person_id: d.person_id,
            is_verified: d.is_verified,
            verified_at: d.verified_at,
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentList {
    pub documents: Vec<DocumentResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminDocumentResponse {
    #[serde(flatten)]
    pub document: DocumentResponse,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: Option<String>,
    pub verified_by: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminDocumentList {
    pub documents: Vec<AdminDocumentResponse>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub document_type: Option<DocumentType>,
    pub registration_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AdminDocumentQuery {
    pub user_id: Option<Uuid>,
    pub is_verified: Option<bool>,
    pub document_type: Option<DocumentType>,
}

/// Multipart form fields of an upload.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    document_type: DocumentType,
    title: String,
    description: Option<String>,
    registration_id: Option<Uuid>,
    person_id: Option<Uuid>,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/documents/upload",
            post(upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v1/documents", get(list_documents))
        .route("/api/v1/documents/admin/all", get(admin_list_documents))
        .route("/api/v1/documents/admin/:id", delete(admin_delete_document))
        .route("/api/v1/documents/admin/:id/download", get(admin_download_document))
        .route("/api/v1/documents/:id", get(get_document).delete(delete_document))
        .route("/api/v1/documents/:id/download", get(download_document))
        .route("/api/v1/documents/:id/verify", patch(verify_document))
        .route("/api/v1/documents/:id/unverify", patch(unverify_document))
}

// ── Upload parsing ──────────────────────────────────────────────────

struct UploadedFile {
    name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct UploadFields {
    file: Option<UploadedFile>,
    document_type: Option<String>,
    title: Option<String>,
    description: Option<String>,
    registration_id: Option<String>,
    person_id: Option<String>,
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("upload exceeds {} bytes", MAX_FILE_SIZE))
    } else {
        AppError::BadRequest(err.body_text())
    }
}

async fn read_fields(mut multipart: Multipart) -> Result<UploadFields, AppError> {
    let mut fields = UploadFields::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            fields.file = Some(UploadedFile {
                name: file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }
        let value = field.text().await.map_err(multipart_error)?;
        let slot = match name.as_str() {
            "document_type" => &mut fields.document_type,
            "title" => &mut fields.title,
            "description" => &mut fields.description,
            "registration_id" => &mut fields.registration_id,
            "person_id" => &mut fields.person_id,
            _ => continue,
        };
        *slot = Some(value);
    }
    Ok(fields)
}

/// Blank form values count as absent.
fn optional_id(field: &str, value: Option<String>) -> Result<Option<Uuid>, AppError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{field} is not a valid UUID: {raw}"))),
    }
}

fn upload_error(err: ValidationError) -> AppError {
    match err {
        ValidationError::FileTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
        other => AppError::BadRequest(other.to_string()),
    }
}

// ── Download helpers ────────────────────────────────────────────────

/// `Content-Disposition` for `name`: an ASCII fallback plus the RFC 5987
/// UTF-8 form.
fn content_disposition(name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut encoded = String::with_capacity(name.len() * 3);
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{b:02X}"));
        }
    }
    HeaderValue::from_str(&format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}"))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

async fn file_response(state: &AppState, doc: &Document) -> Result<Response, AppError> {
    let bytes = match state.files.read(&doc.file_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(document_id = %doc.id, path = %doc.file_path, "document file missing");
            return Err(AppError::NotFound(format!("file for document {} not found", doc.id)));
        }
        Err(e) => return Err(AppError::Internal(format!("reading {}: {e}", doc.file_path))),
    };
    let mime = doc
        .mime_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let content_type =
        HeaderValue::from_str(&mime).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, content_disposition(&doc.file_name)),
        ],
        bytes,
    )
        .into_response())
}

fn owned_document(state: &AppState, owner: Uuid, id: Uuid) -> Result<Document, AppError> {
    state
        .db
        .get_document(&id)
        .filter(|d| d.user_id == owner)
        .ok_or_else(|| AppError::NotFound(format!("document {id} not found")))
}

fn any_document(state: &AppState, id: Uuid) -> Result<Document, AppError> {
    state
        .db
        .get_document(&id)
        .ok_or_else(|| AppError::NotFound(format!("document {id} not found")))
}

async fn remove_document(state: &AppState, id: Uuid) -> Result<(), AppError> {
    let summary = state.db.delete_document(&id)?;
    state.persist(Change::Delete(Kind::Documents, id)).await?;
    state.files.remove_all(summary.file_paths()).await;
    Ok(())
}

fn admin_view(users: &[User], doc: &Document) -> AdminDocumentResponse {
    let owner = users.iter().find(|u| u.id == doc.user_id);
    AdminDocumentResponse {
        document: DocumentResponse::from(doc),
        user_id: doc.user_id,
        user_name: owner.map(User::full_name).unwrap_or_default(),
        user_email: owner.and_then(|u| u.email.clone()),
        verified_by: doc.verified_by,
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /api/v1/documents/upload: Store a file and its metadata.
#[utoipa::path(
    post,
    path = "/api/v1/documents/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Document stored", body = DocumentResponse),
        (status = 400, description = "Missing field, bad extension, unknown type or empty file", body = crate::error::ErrorBody),
        (status = 404, description = "Registration or person not the caller's", body = crate::error::ErrorBody),
        (status = 413, description = "File larger than 10 MiB", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn upload(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), AppError> {
    let multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let fields = read_fields(multipart).await?;

    let file = fields
        .file
        .ok_or_else(|| AppError::BadRequest("file is required".to_string()))?;
    let ext = check_upload(&file.name, file.bytes.len() as u64).map_err(upload_error)?;
    let document_type: DocumentType = fields
        .document_type
        .ok_or_else(|| AppError::BadRequest("document_type is required".to_string()))?
        .parse()
        .map_err(upload_error)?;
    let title = fields
        .title
        .ok_or_else(|| AppError::BadRequest("title is required".to_string()))?;
    let registration_id = optional_id("registration_id", fields.registration_id)?;
    let person_id = optional_id("person_id", fields.person_id)?;

    let id = Uuid::new_v4();
    let path = storage_path(user.id, id, &ext);
    state
        .files
        .save(&path, &file.bytes)
        .await
        .map_err(|e| AppError::Internal(format!("writing {path}: {e}")))?;

    let inserted = state.db.insert_document(NewDocument {
        id,
        user_id: user.id,
        registration_id,
        person_id,
        document_type,
        title,
        description: fields.description.filter(|d| !d.trim().is_empty()),
        file_path: path.clone(),
        file_name: file.name,
        file_size: file.bytes.len() as i64,
        mime_type: Some(
            file.content_type
                .unwrap_or_else(|| mime_for_extension(&ext).to_string()),
        ),
    });
    let doc = match inserted {
        Ok(doc) => doc,
        Err(e) => {
            state.files.remove_all(vec![path]).await;
            return Err(e.into());
        }
    };
    state.persist(Change::Document(&doc)).await?;
    tracing::info!(document_id = %doc.id, user_id = %user.id, size = doc.file_size, "document uploaded");
    Ok((StatusCode::CREATED, Json(DocumentResponse::from(&doc))))
}

/// GET /api/v1/documents: The caller's documents, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/documents",
    params(
        ("document_type" = Option<DocumentType>, Query, description = "Only this type"),
        ("registration_id" = Option<Uuid>, Query, description = "Only those attached to this registration"),
    ),
    responses(
        (status = 200, description = "Documents", body = DocumentList),
        (status = 400, description = "Malformed filter", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn list_documents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<DocumentQuery>, QueryRejection>,
) -> Result<Json<DocumentList>, AppError> {
    let q = extract_query(query)?;
    let documents: Vec<DocumentResponse> = state
        .db
        .list_documents(DocumentFilter {
            user_id: Some(user.id),
            document_type: q.document_type,
            registration_id: q.registration_id,
            is_verified: None,
        })
        .iter()
        .map(DocumentResponse::from)
        .collect();
    Ok(Json(DocumentList {
        total: documents.len(),
        documents,
    }))
}

/// GET /api/v1/documents/:id
#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document metadata", body = DocumentResponse),
        (status = 404, description = "Not found or not the caller's", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn get_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, AppError> {
    Ok(Json(DocumentResponse::from(&owned_document(&state, user.id, id)?)))
}

/// GET /api/v1/documents/:id/download: The file as an attachment.
#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}/download",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "File contents with the stored MIME type"),
        (status = 404, description = "Document or file not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn download_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let doc = owned_document(&state, user.id, id)?;
    file_response(&state, &doc).await
}

/// DELETE /api/v1/documents/:id: Remove the row and the file.
#[utoipa::path(
    delete,
    path = "/api/v1/documents/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Not found or not the caller's", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn delete_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    owned_document(&state, user.id, id)?;
    remove_document(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/documents/admin/all: Every document with its owner.
#[utoipa::path(
    get,
    path = "/api/v1/documents/admin/all",
    params(
        ("user_id" = Option<Uuid>, Query, description = "Only this owner's"),
        ("is_verified" = Option<bool>, Query, description = "Only verified or unverified"),
        ("document_type" = Option<DocumentType>, Query, description = "Only this type"),
    ),
    responses(
        (status = 200, description = "Documents", body = AdminDocumentList),
        (status = 400, description = "Malformed filter", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn admin_list_documents(
    State(state): State<AppState>,
    _admin: AdminUser,
    query: Result<Query<AdminDocumentQuery>, QueryRejection>,
) -> Result<Json<AdminDocumentList>, AppError> {
    let q = extract_query(query)?;
    let docs = state.db.list_documents(DocumentFilter {
        user_id: q.user_id,
        document_type: q.document_type,
        registration_id: None,
        is_verified: q.is_verified,
    });
    let users = state.db.list_users();
    let documents: Vec<AdminDocumentResponse> = docs.iter().map(|d| admin_view(&users, d)).collect();
    Ok(Json(AdminDocumentList {
        total: documents.len(),
        documents,
    }))
}

/// PATCH /api/v1/documents/:id/verify: Mark verified by the caller.
#[utoipa::path(
    patch,
    path = "/api/v1/documents/{id}/verify",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document verified", body = AdminDocumentResponse),
        (status = 404, description = "Document not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn verify_document(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminDocumentResponse>, AppError> {
    let doc = state.db.update_document(&id, |d| d.verify(admin.id, Utc::now()))?;
    state.persist(Change::Document(&doc)).await?;
    tracing::info!(document_id = %id, admin_id = %admin.id, "document verified");
    Ok(Json(admin_view(&state.db.list_users(), &doc)))
}

/// PATCH /api/v1/documents/:id/unverify: Clear verification.
#[utoipa::path(
    patch,
    path = "/api/v1/documents/{id}/unverify",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Verification cleared", body = AdminDocumentResponse),
        (status = 404, description = "Document not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn unverify_document(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AdminDocumentResponse>, AppError> {
    let doc = state.db.update_document(&id, Document::unverify)?;
    state.persist(Change::Document(&doc)).await?;
    Ok(Json(admin_view(&state.db.list_users(), &doc)))
}

/// DELETE /api/v1/documents/admin/:id: Remove any user's document.
#[utoipa::path(
    delete,
    path = "/api/v1/documents/admin/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn admin_delete_document(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    any_document(&state, id)?;
    remove_document(&state, id).await?;
    tracing::info!(document_id = %id, admin_id = %admin.id, "document deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/documents/admin/:id/download
#[utoipa::path(
    get,
    path = "/api/v1/documents/admin/{id}/download",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "File contents with the stored MIME type"),
        (status = 404, description = "Document or file not found", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
async fn admin_download_document(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let doc = any_document(&state, id)?;
    file_response(&state, &doc).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_keeps_ascii_names() {
        let v = content_disposition("report 2024.pdf");
        assert_eq!(
            v.to_str().unwrap(),
            "attachment; filename=\"report 2024.pdf\"; filename*=UTF-8''report%202024.pdf"
        );
    }

    #[test]
    fn content_disposition_encodes_persian_names() {
        let v = content_disposition("کارت.pdf");
        let s = v.to_str().unwrap();
        assert!(s.starts_with("attachment; filename=\"____.pdf\""));
        assert!(s.contains("filename*=UTF-8''%DA%A9"));
    }

    #[test]
    fn content_disposition_strips_quotes() {
        let v = content_disposition("a\"b.pdf");
        assert!(v.to_str().unwrap().starts_with("attachment; filename=\"a_b.pdf\""));
    }

    #[test]
    fn blank_optional_ids_are_absent() {
        assert_eq!(optional_id("person_id", None).unwrap(), None);
        assert_eq!(optional_id("person_id", Some("  ".into())).unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(optional_id("person_id", Some(id.to_string())).unwrap(), Some(id));
        assert!(matches!(
            optional_id("person_id", Some("nope".into())),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn oversized_upload_maps_to_413() {
        let err = check_upload("a.pdf", MAX_FILE_SIZE + 1).unwrap_err();
        assert!(matches!(upload_error(err), AppError::PayloadTooLarge(_)));
        let err = check_upload("a.exe", 10).unwrap_err();
        assert!(matches!(upload_error(err), AppError::BadRequest(_)));
        let err = check_upload("a.pdf", 0).unwrap_err();
        assert!(matches!(upload_error(err), AppError::BadRequest(_)));
    }
}
