//! User and person persistence operations.

use chrono::{DateTime, NaiveDate, Utc};
use hims_core::{NationalId, Person, Relation, User};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::choice;

pub async fn upsert_user(conn: &mut PgConnection, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, national_id, first_name, last_name, email, phone, password_hash,
                            is_active, is_staff, is_admin, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (id) DO UPDATE SET
             national_id = EXCLUDED.national_id, first_name = EXCLUDED.first_name,
             last_name = EXCLUDED.last_name, email = EXCLUDED.email, phone = EXCLUDED.phone,
             password_hash = EXCLUDED.password_hash, is_active = EXCLUDED.is_active,
             is_staff = EXCLUDED.is_staff, is_admin = EXCLUDED.is_admin,
             updated_at = EXCLUDED.updated_at
         WHERE users.updated_at <= EXCLUDED.updated_at",
    )
    .bind(user.id)
    .bind(user.national_id.as_str())
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(&user.phone)
    .bind(&user.password_hash)
    .bind(user.is_active)
    .bind(user.is_staff)
    .bind(user.is_admin)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_person(conn: &mut PgConnection, person: &Person) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO persons (id, user_id, first_name, last_name, national_code, birth_date,
                              relation, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET
             first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name,
             national_code = EXCLUDED.national_code, birth_date = EXCLUDED.birth_date,
             relation = EXCLUDED.relation, updated_at = EXCLUDED.updated_at
         WHERE persons.updated_at <= EXCLUDED.updated_at",
    )
    .bind(person.id)
    .bind(person.user_id)
    .bind(&person.first_name)
    .bind(&person.last_name)
    .bind(person.national_code.as_str())
    .bind(person.birth_date)
    .bind(person.relation.as_str())
    .bind(person.created_at)
    .bind(person.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Load all users. Rows whose national id no longer validates are skipped.
pub async fn load_users(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, national_id, first_name, last_name, email, phone, password_hash,
                is_active, is_staff, is_admin, created_at, updated_at
         FROM users ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(UserRow::into_record).collect())
}

/// One user by login name, or `None` when no row (or no valid row) exists.
pub async fn find_user_by_national_id(pool: &PgPool, national_id: &NationalId) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, national_id, first_name, last_name, email, phone, password_hash,
                is_active, is_staff, is_admin, created_at, updated_at
         FROM users WHERE national_id = $1",
    )
    .bind(national_id.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(UserRow::into_record))
}

pub async fn load_persons(pool: &PgPool) -> Result<Vec<Person>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PersonRow>(
        "SELECT id, user_id, first_name, last_name, national_code, birth_date, relation,
                created_at, updated_at
         FROM persons ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(PersonRow::into_record).collect())
}

fn national_id(table: &'static str, id: Uuid, raw: String) -> Option<NationalId> {
    match NationalId::new(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(table, id = %id, error = %e, "invalid national id in database; row skipped");
            None
        }
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    national_id: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    password_hash: String,
    is_active: bool,
    is_staff: bool,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_record(self) -> Option<User> {
        Some(User {
            id: self.id,
            national_id: national_id("users", self.id, self.national_id)?,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            password_hash: self.password_hash,
            is_active: self.is_active,
            is_staff: self.is_staff,
            is_admin: self.is_admin,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PersonRow {
    id: Uuid,
    user_id: Uuid,
    first_name: String,
    last_name: String,
    national_code: String,
    birth_date: NaiveDate,
    relation: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PersonRow {
    fn into_record(self) -> Option<Person> {
        Some(Person {
            id: self.id,
            user_id: self.user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            national_code: national_id("persons", self.id, self.national_code)?,
            birth_date: self.birth_date,
            relation: choice("persons", self.id, &self.relation, Relation::Other),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
