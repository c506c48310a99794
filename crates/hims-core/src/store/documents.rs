//! Document metadata operations. File bytes are handled by the caller.

use chrono::Utc;
use uuid::Uuid;

use super::{newest_first, touched, CascadeSummary, Database, Tables};
use crate::document::{Document, NewDocument};
use crate::domain::DocumentType;
use crate::error::HimsError;

/// Selection for [`Database::list_documents`]. Empty fields match all.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentFilter {
    pub user_id: Option<Uuid>,
    pub document_type: Option<DocumentType>,
    pub registration_id: Option<Uuid>,
    pub is_verified: Option<bool>,
}

impl DocumentFilter {
    fn matches(&self, doc: &Document) -> bool {
        self.user_id.map_or(true, |u| doc.user_id == u)
            && self.document_type.map_or(true, |d| doc.document_type == d)
            && self.registration_id.map_or(true, |r| doc.registration_id == Some(r))
            && self.is_verified.map_or(true, |v| doc.is_verified == v)
    }
}

impl Database {
    /// Record an uploaded document. The owner must exist; an attached
    /// registration or person must belong to the owner.
    pub fn insert_document(&self, new: NewDocument) -> Result<Document, HimsError> {
        let mut doc = new.into_record(Utc::now());
        doc.validate()?;
        self.write(|t| {
            if !t.users.contains(&doc.user_id) {
                return Err(HimsError::not_found("user", doc.user_id));
            }
            check_document_refs(t, &doc)?;
            t.documents.insert(doc.id, doc.clone());
            Ok(doc)
        })
    }

    pub fn get_document(&self, id: &Uuid) -> Option<Document> {
        self.read(|t| t.documents.get(id).cloned())
    }

    /// Documents matching `filter`, newest first.
    pub fn list_documents(&self, filter: DocumentFilter) -> Vec<Document> {
        let mut docs: Vec<Document> = self.read(|t| {
            t.documents
                .values()
                .filter(|d| filter.matches(d))
                .cloned()
                .collect()
        });
        newest_first(&mut docs, |d| (d.created_at, d.id));
        docs
    }

    /// Update metadata. Owner, file fields and creation time are immutable.
    pub fn update_document(&self, id: &Uuid, f: impl FnOnce(&mut Document)) -> Result<Document, HimsError> {
        self.write(|t| {
            let current = t.documents.get(id).ok_or_else(|| HimsError::not_found("document", id))?;
            let mut next = current.clone();
            f(&mut next);
            next.id = current.id;
            next.user_id = current.user_id;
            next.file_path = current.file_path.clone();
            next.file_name = current.file_name.clone();
            next.file_size = current.file_size;
            next.mime_type = current.mime_type.clone();
            next.created_at = current.created_at;
            next.validate()?;
            check_document_refs(t, &next)?;
            if let Some(admin) = next.verified_by {
                if !t.users.contains(&admin) {
                    return Err(HimsError::not_found("user", admin));
                }
            }
            next.updated_at = touched(current.updated_at);
            t.documents.insert(next.id, next.clone());
            Ok(next)
        })
    }

    /// Remove the metadata row. The returned summary carries the row so the
    /// caller can delete the file.
    pub fn delete_document(&self, id: &Uuid) -> Result<CascadeSummary, HimsError> {
        self.write(|t| {
            let doc = t.documents.remove(id).ok_or_else(|| HimsError::not_found("document", id))?;
            let mut summary = CascadeSummary::default();
            summary.add("documents", 1);
            summary.documents.push(doc);
            Ok(summary)
        })
    }
}

fn check_document_refs(t: &Tables, doc: &Document) -> Result<(), HimsError> {
    if let Some(reg_id) = doc.registration_id {
        match t.registrations.get(&reg_id) {
            Some(r) if r.user_id == doc.user_id => {}
            _ => return Err(HimsError::not_found("registration", reg_id)),
        }
    }
    if let Some(person_id) = doc.person_id {
        match t.persons.get(&person_id) {
            Some(p) if p.user_id == doc.user_id => {}
            _ => return Err(HimsError::not_found("person", person_id)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;
    use crate::document::storage_path;
    use crate::domain::PlanType;

    fn upload(user_id: Uuid, document_type: DocumentType) -> NewDocument {
        let id = Uuid::new_v4();
        NewDocument {
            id,
            user_id,
            registration_id: None,
            person_id: None,
            document_type,
            title: "مدرک".into(),
            description: None,
            file_path: storage_path(user_id, id, "pdf"),
            file_name: "scan.pdf".into(),
            file_size: 2048,
            mime_type: Some("application/pdf".into()),
        }
    }

    #[test]
    fn attachments_must_belong_to_owner() {
        let db = Database::new();
        let owner = fixtures::user(&db, "1111111111", None);
        let other = fixtures::user(&db, "2222222222", None);
        let foreign = fixtures::person(&db, other.id, "5555555555");

        let mut new = upload(owner.id, DocumentType::BirthCertificate);
        new.person_id = Some(foreign.id);
        assert!(matches!(
            db.insert_document(new),
            Err(HimsError::NotFound { entity: "person", .. })
        ));

        let mut new = upload(owner.id, DocumentType::Other);
        new.registration_id = Some(Uuid::new_v4());
        assert!(matches!(
            db.insert_document(new),
            Err(HimsError::NotFound { entity: "registration", .. })
        ));
    }

    #[test]
    fn filters_combine() {
        let db = Database::new();
        let a = fixtures::user(&db, "1111111111", None);
        let b = fixtures::user(&db, "2222222222", None);
        let id_card = db.insert_document(upload(a.id, DocumentType::NationalId)).unwrap();
        db.insert_document(upload(a.id, DocumentType::MedicalRecords)).unwrap();
        db.insert_document(upload(b.id, DocumentType::NationalId)).unwrap();
        db.update_document(&id_card.id, |d| d.verify(b.id, Utc::now())).unwrap();

        let mine = DocumentFilter {
            user_id: Some(a.id),
            ..Default::default()
        };
        assert_eq!(db.list_documents(mine).len(), 2);
        let verified = db.list_documents(DocumentFilter {
            is_verified: Some(true),
            ..mine
        });
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].verified_by, Some(b.id));
        let cards = db.list_documents(DocumentFilter {
            document_type: Some(DocumentType::NationalId),
            ..Default::default()
        });
        assert_eq!(cards.len(), 2);
    }

    #[test]
    fn update_keeps_file_fields() {
        let db = Database::new();
        let user = fixtures::user(&db, "1111111111", None);
        let doc = db.insert_document(upload(user.id, DocumentType::MedicalRecords)).unwrap();
        let updated = db
            .update_document(&doc.id, |d| {
                d.title = "عکس پرسنلی".into();
                d.file_path = "elsewhere".into();
            })
            .unwrap();
        assert_eq!(updated.title, "عکس پرسنلی");
        assert_eq!(updated.file_path, doc.file_path);
    }

    #[test]
    fn registration_delete_detaches_documents() {
        let db = Database::new();
        let user = fixtures::user(&db, "1111111111", None);
        let chain = fixtures::chain(&db, "01");
        let plan = fixtures::plan(&db, "پایه", PlanType::Basic, 500_000);
        let reg = fixtures::registration(&db, user.id, plan.id, chain.school.id);
        let mut new = upload(user.id, DocumentType::InsuranceRequest);
        new.registration_id = Some(reg.id);
        let doc = db.insert_document(new).unwrap();

        db.delete_registration(&reg.id).unwrap();
        let doc = db.get_document(&doc.id).unwrap();
        assert_eq!(doc.registration_id, None);
    }

    #[test]
    fn user_delete_returns_documents_and_clears_verifier() {
        let db = Database::new();
        let admin = fixtures::user(&db, "1111111111", None);
        let user = fixtures::user(&db, "2222222222", None);
        let owned = db.insert_document(upload(admin.id, DocumentType::MedicalRecords)).unwrap();
        let verified = db.insert_document(upload(user.id, DocumentType::MedicalRecords)).unwrap();
        db.update_document(&verified.id, |d| d.verify(admin.id, Utc::now())).unwrap();

        let summary = db.delete_user(&admin.id).unwrap();
        assert_eq!(summary.documents.len(), 1);
        assert_eq!(summary.documents[0].id, owned.id);
        assert_eq!(db.get_document(&verified.id).unwrap().verified_by, None);
    }

    #[test]
    fn delete_hands_back_row() {
        let db = Database::new();
        let user = fixtures::user(&db, "1111111111", None);
        let doc = db.insert_document(upload(user.id, DocumentType::MedicalRecords)).unwrap();
        let summary = db.delete_document(&doc.id).unwrap();
        assert_eq!(summary.file_paths(), vec![doc.file_path.clone()]);
        assert!(db.get_document(&doc.id).is_none());
    }
}
