//! Document metadata persistence operations. File contents live in
//! [`FileStorage`](crate::storage::FileStorage), not in the database.

use chrono::{DateTime, Utc};
use hims_core::{Document, DocumentType};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::choice;

pub async fn upsert(conn: &mut PgConnection, doc: &Document) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO documents (id, user_id, registration_id, person_id, document_type, title,
                                description, file_path, file_name, file_size, mime_type,
                                is_verified, verified_by, verified_at, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
         ON CONFLICT (id) DO UPDATE SET
             registration_id = EXCLUDED.registration_id, person_id = EXCLUDED.person_id,
             document_type = EXCLUDED.document_type, title = EXCLUDED.title,
             description = EXCLUDED.description, is_verified = EXCLUDED.is_verified,
             verified_by = EXCLUDED.verified_by, verified_at = EXCLUDED.verified_at,
             updated_at = EXCLUDED.updated_at
         WHERE documents.updated_at <= EXCLUDED.updated_at",
    )
    .bind(doc.id)
    .bind(doc.user_id)
    .bind(doc.registration_id)
    .bind(doc.person_id)
    .bind(doc.document_type.as_str())
    .bind(&doc.title)
    .bind(&doc.description)
    .bind(&doc.file_path)
    .bind(&doc.file_name)
    .bind(doc.file_size)
    .bind(&doc.mime_type)
    .bind(doc.is_verified)
    .bind(doc.verified_by)
    .bind(doc.verified_at)
    .bind(doc.created_at)
    .bind(doc.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Load all document rows from the database into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Document>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, user_id, registration_id, person_id, document_type, title, description,
                file_path, file_name, file_size, mime_type, is_verified, verified_by, verified_at,
                created_at, updated_at
         FROM documents ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(DocumentRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    user_id: Uuid,
    registration_id: Option<Uuid>,
    person_id: Option<Uuid>,
    document_type: String,
    title: String,
    description: Option<String>,
    file_path: String,
    file_name: String,
    file_size: i64,
    mime_type: Option<String>,
    is_verified: bool,
    verified_by: Option<Uuid>,
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_record(self) -> Document {
        Document {
            id: self.id,
            user_id: self.user_id,
            registration_id: self.registration_id,
            person_id: self.person_id,
            document_type: choice("documents", self.id, &self.document_type, DocumentType::Other),
            title: self.title,
            description: self.description,
            file_path: self.file_path,
            file_name: self.file_name,
            file_size: self.file_size,
            mime_type: self.mime_type,
            is_verified: self.is_verified,
            verified_by: self.verified_by,
            verified_at: self.verified_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
