//! # Supporting Documents
//!
//! Metadata for files a user uploads (national id card scans, birth
//! certificates, ...). The bytes live on disk under
//! `documents/{user_id}/{document_id}.{ext}`; this module owns the upload
//! rules and the path layout, the API crate owns the actual file I/O.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::DocumentType;
use crate::error::ValidationError;
use crate::validation;

/// Accepted file extensions (lower case, without the dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "doc", "docx", "zip", "rar"];

/// Upload size cap: 10 MiB.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Title length bounds.
pub const TITLE_LEN: (usize, usize) = (1, 200);

/// Metadata row for an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Cleared when the registration is deleted.
    pub registration_id: Option<Uuid>,
    /// Cleared when the person is deleted.
    pub person_id: Option<Uuid>,
    pub document_type: DocumentType,
    pub title: String,
    pub description: Option<String>,
    /// Path relative to the media root.
    pub file_path: String,
    /// Original client-side file name.
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub is_verified: bool,
    /// Cleared when the verifying admin is deleted.
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// File size in MiB, rounded to two decimals.
    pub fn file_size_mb(&self) -> f64 {
        size_mb(self.file_size)
    }

    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.title = validation::text("title", &self.title, TITLE_LEN.0, TITLE_LEN.1)?;
        self.description = validation::optional_text("description", self.description.as_deref(), 2000)?;
        Ok(())
    }

    /// Mark as verified by `admin_id` at `at`.
    pub fn verify(&mut self, admin_id: Uuid, at: DateTime<Utc>) {
        self.is_verified = true;
        self.verified_by = Some(admin_id);
        self.verified_at = Some(at);
    }

    /// Clear verification state.
    pub fn unverify(&mut self) {
        self.is_verified = false;
        self.verified_by = None;
        self.verified_at = None;
    }
}

/// Fields supplied when recording an upload. The id is chosen by the caller
/// because it is also part of the on-disk path.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub registration_id: Option<Uuid>,
    pub person_id: Option<Uuid>,
    pub document_type: DocumentType,
    pub title: String,
    pub description: Option<String>,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
}

impl NewDocument {
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> Document {
        Document {
            id: self.id,
            user_id: self.user_id,
            registration_id: self.registration_id,
            person_id: self.person_id,
            document_type: self.document_type,
            title: self.title,
            description: self.description,
            file_path: self.file_path,
            file_name: self.file_name,
            file_size: self.file_size,
            mime_type: self.mime_type,
            is_verified: false,
            verified_by: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Check an upload against the extension allow-list and size cap.
///
/// Returns the normalized (lower-case) extension.
pub fn check_upload(file_name: &str, size: u64) -> Result<String, ValidationError> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidationError::FileExtension(ext));
    }
    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::FileTooLarge {
            size,
            max: MAX_FILE_SIZE,
        });
    }
    Ok(ext)
}

/// Relative storage path for a document: `documents/{user}/{id}.{ext}`.
pub fn storage_path(user_id: Uuid, document_id: Uuid, ext: &str) -> String {
    format!("documents/{user_id}/{document_id}.{ext}")
}

/// MIME type for an allowed extension.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "zip" => "application/zip",
        "rar" => "application/vnd.rar",
        _ => "application/octet-stream",
    }
}

/// Bytes to MiB with two decimals.
pub fn size_mb(bytes: i64) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_extension_is_case_insensitive() {
        assert_eq!(check_upload("Scan.PDF", 10).unwrap(), "pdf");
        assert_eq!(check_upload("a.b.docx", 10).unwrap(), "docx");
    }

    #[test]
    fn upload_rejects_disallowed_and_missing_extension() {
        assert_eq!(
            check_upload("run.exe", 10),
            Err(ValidationError::FileExtension("exe".into()))
        );
        assert!(matches!(
            check_upload("noext", 10),
            Err(ValidationError::FileExtension(_))
        ));
    }

    #[test]
    fn upload_size_limits() {
        assert_eq!(check_upload("a.png", 0), Err(ValidationError::EmptyFile));
        assert!(check_upload("a.png", MAX_FILE_SIZE).is_ok());
        assert!(matches!(
            check_upload("a.png", MAX_FILE_SIZE + 1),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn storage_path_layout() {
        let user = Uuid::nil();
        let doc = Uuid::nil();
        assert_eq!(
            storage_path(user, doc, "pdf"),
            format!("documents/{user}/{doc}.pdf")
        );
    }

    #[test]
    fn size_in_mb_rounds_to_two_places() {
        assert_eq!(size_mb(1024 * 1024), 1.0);
        assert_eq!(size_mb(1_500_000), 1.43);
        assert_eq!(size_mb(0), 0.0);
    }

    #[test]
    fn verify_then_unverify() {
        let mut doc = NewDocument {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            registration_id: None,
            person_id: None,
            document_type: DocumentType::NationalId,
            title: "کارت ملی".into(),
            description: None,
            file_path: "documents/x/y.pdf".into(),
            file_name: "card.pdf".into(),
            file_size: 100,
            mime_type: Some("application/pdf".into()),
        }
        .into_record(Utc::now());
        let admin = Uuid::new_v4();
        doc.verify(admin, Utc::now());
        assert!(doc.is_verified);
        assert_eq!(doc.verified_by, Some(admin));
        doc.unverify();
        assert!(!doc.is_verified);
        assert!(doc.verified_at.is_none());
    }
}
