//! User and person operations.

use chrono::Utc;
use uuid::Uuid;

use super::{mentions, newest_first, touched, CascadeSummary, Database, Tables};
use crate::error::HimsError;
use crate::identity::NationalId;
use crate::user::{NewPerson, NewUser, Person, User};
use crate::validation::same_email;

/// Selection for [`Database::search_users`]. Empty fields match all.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    /// Substring of the national id, email, first or last name, or phone.
    pub search: Option<String>,
}

impl UserFilter {
    fn matches(&self, user: &User) -> bool {
        self.is_admin.map_or(true, |v| user.is_admin == v)
            && self.is_active.map_or(true, |v| user.is_active == v)
            && self.is_staff.map_or(true, |v| user.is_staff == v)
            && self.search.as_deref().map_or(true, |needle| {
                mentions(
                    needle,
                    [
                        Some(user.national_id.as_str()),
                        user.email.as_deref(),
                        Some(user.first_name.as_str()),
                        Some(user.last_name.as_str()),
                        user.phone.as_deref(),
                    ],
                )
            })
    }
}

impl Database {
    // -- Users -------------------------------------------------------------------

    /// Create a user. National id and email must be unused.
    pub fn insert_user(&self, new: NewUser) -> Result<User, HimsError> {
        let mut user = new.into_record(Utc::now());
        user.validate()?;
        self.write(|t| {
            check_user_unique(t, &user)?;
            t.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    pub fn get_user(&self, id: &Uuid) -> Option<User> {
        self.read(|t| t.users.get(id).cloned())
    }

    /// Look a user up by login name.
    pub fn find_user_by_national_id(&self, national_id: &NationalId) -> Option<User> {
        self.read(|t| t.users.values().find(|u| &u.national_id == national_id).cloned())
    }

    /// All users, newest first.
    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.read(|t| t.users.values().cloned().collect());
        newest_first(&mut users, |u| (u.created_at, u.id));
        users
    }

    /// Users matching `filter`, newest first.
    pub fn search_users(&self, filter: &UserFilter) -> Vec<User> {
        let mut users: Vec<User> = self.read(|t| t.users.values().filter(|u| filter.matches(u)).cloned().collect());
        newest_first(&mut users, |u| (u.created_at, u.id));
        users
    }

    /// Apply `f` to a copy of the user, re-validate, re-check uniqueness
    /// (excluding the user itself) and commit. The id and creation time are
    /// immutable.
    pub fn update_user(&self, id: &Uuid, f: impl FnOnce(&mut User)) -> Result<User, HimsError> {
        self.write(|t| {
            let current = t.users.get(id).ok_or_else(|| HimsError::not_found("user", id))?;
            let mut next = current.clone();
            f(&mut next);
            next.id = current.id;
            next.created_at = current.created_at;
            next.validate()?;
            check_user_unique(t, &next)?;
            next.updated_at = touched(current.updated_at);
            t.users.insert(next.id, next.clone());
            Ok(next)
        })
    }

    /// Install a user row read back from durable storage. The cached copy
    /// is kept when it is newer; otherwise the row replaces it (or is added)
    /// after the uniqueness checks. Returns the row now cached.
    pub fn restore_user(&self, user: User) -> Result<User, HimsError> {
        self.write(|t| {
            if let Some(current) = t.users.get(&user.id) {
                if current.updated_at > user.updated_at {
                    return Ok(current.clone());
                }
            }
            check_user_unique(t, &user)?;
            t.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    /// Delete a user with everything it owns: persons, registrations and
    /// documents. Documents it verified keep existing with `verified_by`
    /// cleared.
    pub fn delete_user(&self, id: &Uuid) -> Result<CascadeSummary, HimsError> {
        self.write(|t| {
            t.users.remove(id).ok_or_else(|| HimsError::not_found("user", id))?;
            let mut summary = CascadeSummary::default();
            summary.add("users", 1);

            let persons = t.persons.remove_where(|p| p.user_id == *id);
            summary.add("persons", persons.len());
            let registrations = t.registrations.remove_where(|r| r.user_id == *id);
            summary.add("registrations", registrations.len());

            let documents = t.documents.remove_where(|d| d.user_id == *id);
            summary.add("documents", documents.len());
            summary.documents = documents;
            for doc in t.documents.values_mut() {
                if doc.verified_by == Some(*id) {
                    doc.verified_by = None;
                }
            }
            Ok(summary)
        })
    }

    // -- Persons -----------------------------------------------------------------

    /// Create a dependent. The owning user must exist and must not already
    /// have a dependent with the same national code.
    pub fn insert_person(&self, new: NewPerson) -> Result<Person, HimsError> {
        let now = Utc::now();
        let mut person = new.into_record(now);
        person.validate(now.date_naive())?;
        self.write(|t| {
            if !t.users.contains(&person.user_id) {
                return Err(HimsError::not_found("user", person.user_id));
            }
            check_person_unique(t, &person)?;
            t.persons.insert(person.id, person.clone());
            Ok(person)
        })
    }

    pub fn get_person(&self, id: &Uuid) -> Option<Person> {
        self.read(|t| t.persons.get(id).cloned())
    }

    /// Dependents of one user (or of everyone when `user_id` is `None`),
    /// newest first.
    pub fn list_persons(&self, user_id: Option<Uuid>) -> Vec<Person> {
        let mut persons: Vec<Person> = self.read(|t| {
            t.persons
                .values()
                .filter(|p| user_id.map_or(true, |u| p.user_id == u))
                .cloned()
                .collect()
        });
        newest_first(&mut persons, |p| (p.created_at, p.id));
        persons
    }

    /// Partial update. The owner cannot be changed.
    pub fn update_person(&self, id: &Uuid, f: impl FnOnce(&mut Person)) -> Result<Person, HimsError> {
        let now = Utc::now();
        self.write(|t| {
            let current = t.persons.get(id).ok_or_else(|| HimsError::not_found("person", id))?;
            let mut next = current.clone();
            f(&mut next);
            next.id = current.id;
            next.user_id = current.user_id;
            next.created_at = current.created_at;
            next.validate(now.date_naive())?;
            check_person_unique(t, &next)?;
            next.updated_at = touched(current.updated_at);
            t.persons.insert(next.id, next.clone());
            Ok(next)
        })
    }

    /// Delete a dependent. It is unlinked from registrations and its
    /// documents lose their person reference.
    pub fn delete_person(&self, id: &Uuid) -> Result<CascadeSummary, HimsError> {
        self.write(|t| {
            t.persons.remove(id).ok_or_else(|| HimsError::not_found("person", id))?;
            for reg in t.registrations.values_mut() {
                reg.person_ids.retain(|p| p != id);
            }
            for doc in t.documents.values_mut() {
                if doc.person_id == Some(*id) {
                    doc.person_id = None;
                }
            }
            let mut summary = CascadeSummary::default();
            summary.add("persons", 1);
            Ok(summary)
        })
    }
}

fn check_user_unique(t: &Tables, user: &User) -> Result<(), HimsError> {
    for other in t.users.values().filter(|u| u.id != user.id) {
        if other.national_id == user.national_id {
            return Err(HimsError::Conflict(format!(
                "a user with national id {} already exists",
                user.national_id
            )));
        }
        if let (Some(a), Some(b)) = (&other.email, &user.email) {
            if same_email(a, b) {
                return Err(HimsError::Conflict(format!("email {b} is already in use")));
            }
        }
    }
    Ok(())
}

fn check_person_unique(t: &Tables, person: &Person) -> Result<(), HimsError> {
    let taken = t.persons.values().any(|p| {
        p.id != person.id && p.user_id == person.user_id && p.national_code == person.national_code
    });
    if taken {
        return Err(HimsError::Conflict(format!(
            "a person with national code {} is already registered for this user",
            person.national_code
        )));
    }
    Ok(())
}
