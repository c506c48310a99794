//! # Relational Store
//!
//! All tables live behind one `parking_lot::RwLock`. Every write operation
//! takes the write lock once and, while holding it, validates the record,
//! checks referential existence and uniqueness, applies cascades, and
//! commits. Constraint checks and the write they guard are therefore atomic
//! with respect to every other request.
//!
//! The lock is never held across an `.await`: all methods are synchronous.
//! `parking_lot::RwLock` does not poison, so a panicking writer leaves the
//! tables usable.
//!
//! ## Referential rules
//!
//! | Child → Parent                  | On parent delete |
//! |---------------------------------|------------------|
//! | person → user                   | cascade          |
//! | city/county/region/district → parent level | cascade |
//! | school → district               | cascade          |
//! | coverage → plan                 | n/a (plans are only deactivated) |
//! | registration → user             | cascade          |
//! | registration → plan, school     | protect          |
//! | registration ↔ person           | unlink           |
//! | document → user                 | cascade          |
//! | document → registration, person | set null         |
//! | document.verified_by → user     | set null         |

mod documents;
mod insurance;
mod locations;
mod users;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::document::Document;
use crate::insurance::{InsurancePlan, InsuranceRegistration, PlanCoverage};
use crate::location::{City, County, District, Region, School, State};
use crate::user::{Person, User};

pub use documents::DocumentFilter;
pub use insurance::RegistrationFilter;
pub use locations::{DivisionTable, SchoolFilter};
pub use users::UserFilter;

// -- Table ---------------------------------------------------------------------

/// One table: rows keyed by primary key.
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: HashMap<Uuid, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<T> FromIterator<(Uuid, T)> for Table<T> {
    fn from_iter<I: IntoIterator<Item = (Uuid, T)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl<T: Clone> Table<T> {
    /// Retrieve a row by primary key.
    pub fn get(&self, id: &Uuid) -> Option<&T> {
        self.rows.get(id)
    }

    /// Whether a row with this key exists.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.rows.contains_key(id)
    }

    /// Iterate over all rows in unspecified order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn insert(&mut self, id: Uuid, row: T) -> Option<T> {
        self.rows.insert(id, row)
    }

    pub(crate) fn remove(&mut self, id: &Uuid) -> Option<T> {
        self.rows.remove(id)
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.rows.values_mut()
    }

    /// Remove every row matching `pred`, returning the removed rows.
    pub(crate) fn remove_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        let ids: Vec<Uuid> = self
            .rows
            .iter()
            .filter(|(_, row)| pred(row))
            .map(|(id, _)| *id)
            .collect();
        ids.iter().filter_map(|id| self.rows.remove(id)).collect()
    }
}

// -- Tables --------------------------------------------------------------------

/// The full schema. Cloning yields a consistent point-in-time snapshot.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub users: Table<User>,
    pub persons: Table<Person>,
    pub states: Table<State>,
    pub cities: Table<City>,
    pub counties: Table<County>,
    pub regions: Table<Region>,
    pub districts: Table<District>,
    pub schools: Table<School>,
    pub plans: Table<InsurancePlan>,
    pub coverages: Table<PlanCoverage>,
    pub registrations: Table<InsuranceRegistration>,
    pub documents: Table<Document>,
}

impl Tables {
    /// Row count per table, keyed by table name.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            ("users", self.users.len()),
            ("persons", self.persons.len()),
            ("states", self.states.len()),
            ("cities", self.cities.len()),
            ("counties", self.counties.len()),
            ("regions", self.regions.len()),
            ("districts", self.districts.len()),
            ("schools", self.schools.len()),
            ("plans", self.plans.len()),
            ("coverages", self.coverages.len()),
            ("registrations", self.registrations.len()),
            ("documents", self.documents.len()),
        ])
    }
}

/// Rows removed by a delete, including everything reached by cascade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeSummary {
    /// Removed row count per table name. Tables with no removals are absent.
    pub removed: BTreeMap<&'static str, usize>,
    /// Removed document rows, so the caller can delete their files.
    pub documents: Vec<Document>,
}

impl CascadeSummary {
    pub(crate) fn add(&mut self, table: &'static str, n: usize) {
        if n > 0 {
            *self.removed.entry(table).or_insert(0) += n;
        }
    }

    /// Removed row count for `table`.
    pub fn count(&self, table: &str) -> usize {
        self.removed.get(table).copied().unwrap_or(0)
    }

    /// Stored file paths of the removed documents.
    pub fn file_paths(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.file_path.clone()).collect()
    }
}

// -- Database ------------------------------------------------------------------

/// Thread-safe, cloneable handle to the tables. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct Database {
    tables: Arc<RwLock<Tables>>,
}

impl Database {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap pre-loaded tables (database hydration). Rows are trusted as-is.
    pub fn from_tables(tables: Tables) -> Self {
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// Replace the entire contents with `tables`.
    pub fn load(&self, tables: Tables) {
        *self.tables.write() = tables;
    }

    /// Point-in-time copy of every table.
    pub fn snapshot(&self) -> Tables {
        self.tables.read().clone()
    }

    /// Run `f` against a consistent read view without copying.
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        f(&mut self.tables.write())
    }
}

/// Next `updated_at` for a row last stamped at `previous`: now, truncated to
/// the microsecond precision PostgreSQL keeps, and strictly after
/// `previous`. Conditional upserts rely on successive writes of one row
/// carrying increasing stamps.
pub(crate) fn touched(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    now.max(previous.trunc_subsecs(6) + Duration::microseconds(1))
}

/// Whether any of `fields` contains `needle`, ignoring case and surrounding
/// whitespace. A blank needle matches everything.
pub(crate) fn mentions<'a>(needle: &str, fields: impl IntoIterator<Item = Option<&'a str>>) -> bool {
    let needle = needle.trim().to_lowercase();
    needle.is_empty()
        || fields
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
}

/// Sort newest-first by `key`, breaking ties by id so listings are stable.
pub(crate) fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Uuid)) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared builders for store tests.

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{PlanType, Relation, SchoolType};
    use crate::identity::NationalId;
    use crate::insurance::{NewPlan, NewRegistration};
    use crate::location::{CityTier, CountyTier, DistrictTier, NewDivision, NewSchool, NewState, RegionTier};
    use crate::user::{NewPerson, NewUser};

    pub fn user(db: &Database, national_id: &str, email: Option<&str>) -> User {
        db.insert_user(NewUser {
            national_id: NationalId::new(national_id).unwrap(),
            first_name: "Test".into(),
            last_name: "User".into(),
            email: email.map(str::to_string),
            phone: None,
            password_hash: "$argon2id$stub".into(),
            is_staff: false,
            is_admin: false,
        })
        .unwrap()
    }

    pub fn person(db: &Database, user_id: Uuid, code: &str) -> Person {
        db.insert_person(NewPerson {
            user_id,
            first_name: "Dep".into(),
            last_name: "Endent".into(),
            national_code: NationalId::new(code).unwrap(),
            birth_date: NaiveDate::from_ymd_opt(2010, 5, 1).unwrap(),
            relation: Relation::Child,
        })
        .unwrap()
    }

    /// Full chain state → district plus one school.
    pub struct Chain {
        pub state: State,
        pub city: City,
        pub county: County,
        pub region: Region,
        pub district: District,
        pub school: School,
    }

    pub fn chain(db: &Database, code: &str) -> Chain {
        let state = db
            .insert_state(NewState {
                name_fa: format!("استان {code}"),
                code: code.into(),
                order_index: 1,
            })
            .unwrap();
        let div = |parent_id: Uuid, suffix: &str| NewDivision {
            parent_id,
            name_fa: format!("بخش {code}{suffix}"),
            code: format!("{code}{suffix}"),
        };
        let city = db.insert_division::<CityTier>(div(state.id, "1")).unwrap();
        let county = db.insert_division::<CountyTier>(div(city.id, "2")).unwrap();
        let region = db.insert_division::<RegionTier>(div(county.id, "3")).unwrap();
        let district = db.insert_division::<DistrictTier>(div(region.id, "4")).unwrap();
        let school = db
            .insert_school(NewSchool {
                district_id: district.id,
                name_fa: format!("مدرسه {code}"),
                code: format!("SCH{code}"),
                school_type: SchoolType::High,
                address: None,
                phone: None,
            })
            .unwrap();
        Chain {
            state,
            city,
            county,
            region,
            district,
            school,
        }
    }

    pub fn plan(db: &Database, name: &str, plan_type: PlanType, premium: i64) -> InsurancePlan {
        db.insert_plan(NewPlan {
            name_fa: name.into(),
            plan_type,
            description_fa: String::new(),
            monthly_premium: premium,
        })
        .unwrap()
    }

    pub fn registration(db: &Database, user_id: Uuid, plan_id: Uuid, school_id: Uuid) -> InsuranceRegistration {
        db.insert_registration(NewRegistration {
            user_id,
            plan_id,
            school_id,
            person_ids: vec![],
            additional_info: serde_json::json!({}),
        })
        .unwrap()
    }
}
