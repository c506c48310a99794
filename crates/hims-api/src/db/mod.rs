//! # Database Persistence Layer
//!
//! Provides Postgres persistence for the relational tables via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, the
//! service hydrates the in-memory [`Tables`] from PostgreSQL on startup
//! and writes every committed mutation through as a [`Change`]. When
//! absent, the API operates in in-memory-only mode (suitable for
//! development and testing).
//!
//! Constraint checks happen in memory first. The Postgres foreign keys
//! mirror the in-memory rules (cascade, protect, set null), so a single
//! `DELETE` of the root row reproduces the whole cascade.
//!
//! Enumerated columns are stored as their snake_case wire form. A value
//! the code no longer recognizes is logged and replaced by a default on
//! load rather than failing the whole hydration.

pub mod documents;
pub mod insurance;
pub mod locations;
pub mod users;

use std::fmt;

use chrono::{DateTime, Utc};
use hims_core::location::{CityTier, CountyTier, DistrictTier, RegionTier};
use hims_core::store::Table;
use hims_core::{
    City, County, District, Document, InsurancePlan, InsuranceRegistration, PlanCoverage, Region, School, State,
    Tables,
};
use hims_core::{Person, User};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use uuid::Uuid;

/// Connect to PostgreSQL and run migrations.
///
/// Returns `None` if no URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!(
            "DATABASE_URL not set: running in-memory only mode. \
             State will not survive restarts."
        );
        return Ok(None);
    };

    let pool = connect(url).await?;
    migrate(&pool).await?;
    Ok(Some(pool))
}

/// Open a connection pool without migrating.
pub async fn connect(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;
    tracing::info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Apply the embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

// -- Changes ------------------------------------------------------------------

/// Persisted tables, named as in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Users,
    Persons,
    States,
    Cities,
    Counties,
    Regions,
    Districts,
    Schools,
    Plans,
    Coverages,
    Registrations,
    Documents,
}

impl Kind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Persons => "persons",
            Self::States => "states",
            Self::Cities => "cities",
            Self::Counties => "counties",
            Self::Regions => "regions",
            Self::Districts => "districts",
            Self::Schools => "schools",
            Self::Plans => "insurance_plans",
            Self::Coverages => "plan_coverages",
            Self::Registrations => "insurance_registrations",
            Self::Documents => "documents",
        }
    }
}

/// One committed in-memory mutation: the new state of a row, or the
/// removal of a row (and, through foreign keys, its cascade).
#[derive(Debug, Clone, Copy)]
pub enum Change<'a> {
    User(&'a User),
    Person(&'a Person),
    State(&'a State),
    City(&'a City),
    County(&'a County),
    Region(&'a Region),
    District(&'a District),
    School(&'a School),
    Plan(&'a InsurancePlan),
    Coverage(&'a PlanCoverage),
    Registration(&'a InsuranceRegistration),
    Document(&'a Document),
    Delete(Kind, Uuid),
}

impl Change<'_> {
    fn target(&self) -> (&'static str, Uuid) {
        match self {
            Self::User(r) => (Kind::Users.table(), r.id),
            Self::Person(r) => (Kind::Persons.table(), r.id),
            Self::State(r) => (Kind::States.table(), r.id),
            Self::City(r) => (Kind::Cities.table(), r.id),
            Self::County(r) => (Kind::Counties.table(), r.id),
            Self::Region(r) => (Kind::Regions.table(), r.id),
            Self::District(r) => (Kind::Districts.table(), r.id),
            Self::School(r) => (Kind::Schools.table(), r.id),
            Self::Plan(r) => (Kind::Plans.table(), r.id),
            Self::Coverage(r) => (Kind::Coverages.table(), r.id),
            Self::Registration(r) => (Kind::Registrations.table(), r.id),
            Self::Document(r) => (Kind::Documents.table(), r.id),
            Self::Delete(kind, id) => (kind.table(), *id),
        }
    }
}

impl fmt::Display for Change<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (table, id) = self.target();
        match self {
            Self::Delete(..) => write!(f, "delete {table} {id}"),
            _ => write!(f, "upsert {table} {id}"),
        }
    }
}

/// Write one change in its own transaction.
pub async fn apply(pool: &PgPool, change: &Change<'_>) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    write(&mut *tx, change).await?;
    tx.commit().await
}

async fn write(conn: &mut PgConnection, change: &Change<'_>) -> Result<(), sqlx::Error> {
    match *change {
        Change::User(r) => users::upsert_user(conn, r).await,
        Change::Person(r) => users::upsert_person(conn, r).await,
        Change::State(r) => locations::upsert_state(conn, r).await,
        Change::City(r) => locations::upsert_division::<CityTier>(conn, r).await,
        Change::County(r) => locations::upsert_division::<CountyTier>(conn, r).await,
        Change::Region(r) => locations::upsert_division::<RegionTier>(conn, r).await,
        Change::District(r) => locations::upsert_division::<DistrictTier>(conn, r).await,
        Change::School(r) => locations::upsert_school(conn, r).await,
        Change::Plan(r) => insurance::upsert_plan(conn, r).await,
        Change::Coverage(r) => insurance::upsert_coverage(conn, r).await,
        Change::Registration(r) => insurance::upsert_registration(conn, r).await,
        Change::Document(r) => documents::upsert(conn, r).await,
        Change::Delete(kind, id) => {
            sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
                .bind(id)
                .execute(conn)
                .await?;
            Ok(())
        }
    }
}

/// Upsert the rows of `after` that are new, or carry a different
/// `updated_at`, relative to `before`, in foreign-key order and in one
/// transaction. Rows nobody touched are left alone, so a command working
/// on a loaded copy never writes back rows others changed or deleted
/// meanwhile. Returns the number of rows written.
pub async fn save_changes(pool: &PgPool, before: &Tables, after: &Tables) -> Result<usize, sqlx::Error> {
    let changes = changes_between(before, after);
    if changes.is_empty() {
        return Ok(0);
    }
    let mut tx = pool.begin().await?;
    for change in &changes {
        write(&mut *tx, change).await?;
    }
    tx.commit().await?;
    Ok(changes.len())
}

/// The upserts [`save_changes`] would issue, in foreign-key order.
pub fn changes_between<'a>(before: &Tables, after: &'a Tables) -> Vec<Change<'a>> {
    let mut changes: Vec<Change<'a>> = Vec::new();
    changes.extend(touched(&before.users, &after.users).into_iter().map(Change::User));
    changes.extend(touched(&before.persons, &after.persons).into_iter().map(Change::Person));
    changes.extend(touched(&before.states, &after.states).into_iter().map(Change::State));
    changes.extend(touched(&before.cities, &after.cities).into_iter().map(Change::City));
    changes.extend(touched(&before.counties, &after.counties).into_iter().map(Change::County));
    changes.extend(touched(&before.regions, &after.regions).into_iter().map(Change::Region));
    changes.extend(touched(&before.districts, &after.districts).into_iter().map(Change::District));
    changes.extend(touched(&before.schools, &after.schools).into_iter().map(Change::School));
    changes.extend(touched(&before.plans, &after.plans).into_iter().map(Change::Plan));
    changes.extend(touched(&before.coverages, &after.coverages).into_iter().map(Change::Coverage));
    changes.extend(
        touched(&before.registrations, &after.registrations)
            .into_iter()
            .map(Change::Registration),
    );
    changes.extend(touched(&before.documents, &after.documents).into_iter().map(Change::Document));
    changes
}

/// Rows of `after` absent from `before` or restamped since.
fn touched<'a, T: Stamped>(before: &Table<T>, after: &'a Table<T>) -> Vec<&'a T> {
    after
        .values()
        .filter(|row| {
            before
                .get(&row.id())
                .map_or(true, |old| old.updated_at() != row.updated_at())
        })
        .collect()
}

/// Primary key and last-modified stamp of a persisted row.
trait Stamped: Clone {
    fn id(&self) -> Uuid;
    fn updated_at(&self) -> DateTime<Utc>;
}

macro_rules! stamped {
    ($($ty:ty),+ $(,)?) => {$(
        impl Stamped for $ty {
            fn id(&self) -> Uuid {
                self.id
            }
            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }
        }
    )+};
}

stamped!(
    User,
    Person,
    State,
    City,
    County,
    Region,
    District,
    School,
    InsurancePlan,
    PlanCoverage,
    InsuranceRegistration,
    Document,
);

/// Read every table into memory.
pub async fn load_tables(pool: &PgPool) -> Result<Tables, sqlx::Error> {
    Ok(Tables {
        users: users::load_users(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        persons: users::load_persons(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        states: locations::load_states(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        cities: locations::load_divisions::<CityTier>(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        counties: locations::load_divisions::<CountyTier>(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        regions: locations::load_divisions::<RegionTier>(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        districts: locations::load_divisions::<DistrictTier>(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        schools: locations::load_schools(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        plans: insurance::load_plans(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        coverages: insurance::load_coverages(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        registrations: insurance::load_registrations(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
        documents: documents::load_all(pool).await?.into_iter().map(|r| (r.id, r)).collect(),
    })
}

/// Parse an enumerated column, falling back to `fallback` for values this
/// build does not know.
pub(crate) fn choice<E>(table: &'static str, id: Uuid, raw: &str, fallback: E) -> E
where
    E: std::str::FromStr + fmt::Display,
    E::Err: fmt::Display,
{
    raw.parse().unwrap_or_else(|e: E::Err| {
        tracing::warn!(
            table,
            id = %id,
            value = %raw,
            error = %e,
            fallback = %fallback,
            "unknown enumerated value in database; using fallback"
        );
        fallback
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hims_core::RegistrationStatus;

    #[test]
    fn change_display_names_table_and_id() {
        let id = Uuid::nil();
        assert_eq!(
            Change::Delete(Kind::Registrations, id).to_string(),
            format!("delete insurance_registrations {id}")
        );
    }

    #[test]
    fn kind_tables_match_migration() {
        let sql = include_str!("../../migrations/0001_init.sql");
        for kind in [
            Kind::Users,
            Kind::Persons,
            Kind::States,
            Kind::Cities,
            Kind::Counties,
            Kind::Regions,
            Kind::Districts,
            Kind::Schools,
            Kind::Plans,
            Kind::Coverages,
            Kind::Registrations,
            Kind::Documents,
        ] {
            assert!(
                sql.contains(&format!("CREATE TABLE {} (", kind.table())),
                "missing table {}",
                kind.table()
            );
        }
    }

    fn user(db: &hims_core::Database, national_id: &str) -> User {
        db.insert_user(hims_core::user::NewUser {
            national_id: hims_core::NationalId::new(national_id).unwrap(),
            first_name: "Sara".into(),
            last_name: "Ahmadi".into(),
            email: None,
            phone: None,
            password_hash: "$argon2id$stub".into(),
            is_staff: false,
            is_admin: false,
        })
        .unwrap()
    }

    #[test]
    fn only_new_and_restamped_rows_are_saved() {
        let db = hims_core::Database::new();
        let untouched = user(&db, "1111111111");
        let renamed = user(&db, "2222222222");
        let before = db.snapshot();

        db.update_user(&renamed.id, |u| u.first_name = "Mina".into()).unwrap();
        let added = user(&db, "3333333333");
        let after = db.snapshot();

        let changes = changes_between(&before, &after);
        let mut ids: Vec<Uuid> = changes
            .iter()
            .map(|c| match c {
                Change::User(u) => u.id,
                other => panic!("unexpected change {other}"),
            })
            .collect();
        ids.sort();
        let mut expected = vec![renamed.id, added.id];
        expected.sort();
        assert_eq!(ids, expected);
        assert!(!ids.contains(&untouched.id));
        assert!(changes_between(&after, &after).is_empty());
    }

    #[test]
    fn deleted_rows_are_not_resurrected() {
        let db = hims_core::Database::new();
        let gone = user(&db, "1111111111");
        let before = db.snapshot();
        db.delete_user(&gone.id).unwrap();
        assert!(changes_between(&before, &db.snapshot()).is_empty());
    }

    #[test]
    fn every_upsert_keeps_the_newer_row() {
        let sources = [
            include_str!("users.rs"),
            include_str!("locations.rs"),
            include_str!("insurance.rs"),
            include_str!("documents.rs"),
        ];
        for source in sources {
            let upserts = source.matches("ON CONFLICT (id) DO UPDATE").count();
            let guarded = source.matches(".updated_at <= EXCLUDED.updated_at").count();
            assert!(upserts > 0);
            assert_eq!(upserts, guarded);
        }
    }

    #[test]
    fn unknown_choice_falls_back() {
        let id = Uuid::new_v4();
        assert_eq!(
            choice("insurance_registrations", id, "active", RegistrationStatus::Pending),
            RegistrationStatus::Active
        );
        assert_eq!(
            choice("insurance_registrations", id, "archived", RegistrationStatus::Pending),
            RegistrationStatus::Pending
        );
    }
}
