//! # Accounts and Dependents
//!
//! [`User`] is the account holder who logs in with a national id and
//! password. [`Person`] is a dependent the user insures (spouse, child, ...).
//! A person belongs to exactly one user and disappears with it.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::Relation;
use crate::error::ValidationError;
use crate::identity::NationalId;
use crate::validation;

/// Minimum and maximum length of first/last names.
pub const NAME_LEN: (usize, usize) = (2, 100);

/// An account holder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub national_id: NationalId,
    pub first_name: String,
    pub last_name: String,
    /// Unique (case-insensitive) when present.
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// `"{first_name} {last_name}"`.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Normalize and check every field in place.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        let (min, max) = NAME_LEN;
        self.first_name = validation::text("first_name", &self.first_name, min, max)?;
        self.last_name = validation::text("last_name", &self.last_name, min, max)?;
        self.email = validation::email(self.email.as_deref())?;
        self.phone = validation::phone(self.phone.as_deref())?;
        Ok(())
    }
}

/// Fields supplied when creating a [`User`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub national_id: NationalId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_admin: bool,
}

impl NewUser {
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            national_id: self.national_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            password_hash: self.password_hash,
            is_active: true,
            is_staff: self.is_staff,
            is_admin: self.is_admin,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A dependent insured through a [`User`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Unique per owning user.
    pub national_code: NationalId,
    pub birth_date: NaiveDate,
    pub relation: Relation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Whole years lived as of `today`.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        age_on(self.birth_date, today)
    }

    /// Normalize and check every field in place. `today` bounds the birth
    /// date.
    pub fn validate(&mut self, today: NaiveDate) -> Result<(), ValidationError> {
        let (min, max) = NAME_LEN;
        self.first_name = validation::text("first_name", &self.first_name, min, max)?;
        self.last_name = validation::text("last_name", &self.last_name, min, max)?;
        if self.birth_date > today {
            return Err(ValidationError::FutureBirthDate(self.birth_date));
        }
        Ok(())
    }
}

/// Fields supplied when creating a [`Person`].
#[derive(Debug, Clone)]
pub struct NewPerson {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub national_code: NationalId,
    pub birth_date: NaiveDate,
    pub relation: Relation,
}

impl NewPerson {
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> Person {
        Person {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            national_code: self.national_code,
            birth_date: self.birth_date,
            relation: self.relation,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Calendar age: full years between `birth` and `today`, never negative.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    if today <= birth {
        return 0;
    }
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}
