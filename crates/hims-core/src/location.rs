//! # Location Hierarchy
//!
//! ```text
//! State → City → County → Region → District → School
//! ```
//!
//! [`State`] is the root and [`School`] the leaf. The four intermediate
//! levels have identical shape (a parent link, a Persian name and a code that
//! is unique within the parent), so they share one generic record,
//! [`Division<T>`], parameterized by a sealed [`Tier`] marker. A
//! `Division<CityTier>` and a `Division<CountyTier>` are distinct types: a
//! county id can't be passed where a city is expected.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::SchoolType;
use crate::error::ValidationError;
use crate::validation;

/// Name length bounds for states and divisions.
pub const NAME_LEN: (usize, usize) = (2, 100);
/// Name length bounds for schools.
pub const SCHOOL_NAME_LEN: (usize, usize) = (2, 200);
/// Code length bounds for every level.
pub const CODE_LEN: (usize, usize) = (1, 20);

// ── State ───────────────────────────────────────────────────────────

/// Province. Name and code are globally unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct State {
    pub id: Uuid,
    pub name_fa: String,
    pub code: String,
    /// Listing position; ties are broken by name.
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl State {
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.name_fa = validation::text("name_fa", &self.name_fa, NAME_LEN.0, NAME_LEN.1)?;
        self.code = validation::text("code", &self.code, CODE_LEN.0, CODE_LEN.1)?;
        if self.order_index < 0 {
            return Err(ValidationError::OutOfRange {
                field: "order_index",
                constraint: "zero or greater",
                actual: i64::from(self.order_index),
            });
        }
        Ok(())
    }
}

/// Fields supplied when creating a [`State`].
#[derive(Debug, Clone)]
pub struct NewState {
    pub name_fa: String,
    pub code: String,
    pub order_index: i32,
}

impl NewState {
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> State {
        State {
            id: Uuid::new_v4(),
            name_fa: self.name_fa,
            code: self.code,
            order_index: self.order_index,
            created_at: now,
            updated_at: now,
        }
    }
}

// ── Intermediate divisions ──────────────────────────────────────────

/// Marker for the four intermediate levels. Sealed: only the markers in
/// this module implement it.
pub trait Tier: private::Sealed + Copy + std::fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Singular entity name, used in errors and logs.
    const NAME: &'static str;
    /// Singular name of the parent level.
    const PARENT: &'static str;
}

/// City level (parent: [`State`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CityTier;
/// County level (parent: [`City`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountyTier;
/// Region level (parent: [`County`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionTier;
/// District level (parent: [`Region`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistrictTier;

mod private {
    pub trait Sealed {}
    impl Sealed for super::CityTier {}
    impl Sealed for super::CountyTier {}
    impl Sealed for super::RegionTier {}
    impl Sealed for super::DistrictTier {}
}

impl Tier for CityTier {
    const NAME: &'static str = "city";
    const PARENT: &'static str = "state";
}
impl Tier for CountyTier {
    const NAME: &'static str = "county";
    const PARENT: &'static str = "city";
}
impl Tier for RegionTier {
    const NAME: &'static str = "region";
    const PARENT: &'static str = "county";
}
impl Tier for DistrictTier {
    const NAME: &'static str = "district";
    const PARENT: &'static str = "region";
}

/// An intermediate level of the hierarchy. `(parent_id, code)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound(serialize = ""))]
pub struct Division<T: Tier> {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub name_fa: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    tier: PhantomData<T>,
}

pub type City = Division<CityTier>;
pub type County = Division<CountyTier>;
pub type Region = Division<RegionTier>;
pub type District = Division<DistrictTier>;

impl<T: Tier> Division<T> {
    /// Rebuild a stored row (database hydration).
    pub fn from_parts(
        id: Uuid,
        parent_id: Uuid,
        name_fa: String,
        code: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            parent_id,
            name_fa,
            code,
            created_at,
            updated_at,
            tier: PhantomData,
        }
    }

    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.name_fa = validation::text("name_fa", &self.name_fa, NAME_LEN.0, NAME_LEN.1)?;
        self.code = validation::text("code", &self.code, CODE_LEN.0, CODE_LEN.1)?;
        Ok(())
    }
}

/// Fields supplied when creating a [`Division`].
#[derive(Debug, Clone)]
pub struct NewDivision {
    pub parent_id: Uuid,
    pub name_fa: String,
    pub code: String,
}

impl NewDivision {
    pub(crate) fn into_record<T: Tier>(self, now: DateTime<Utc>) -> Division<T> {
        Division::from_parts(Uuid::new_v4(), self.parent_id, self.name_fa, self.code, now, now)
    }
}

// ── School ──────────────────────────────────────────────────────────

/// Leaf of the hierarchy. The code is unique across all schools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct School {
    pub id: Uuid,
    pub district_id: Uuid,
    pub name_fa: String,
    pub code: String,
    pub school_type: SchoolType,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl School {
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        let (min, max) = SCHOOL_NAME_LEN;
        self.name_fa = validation::text("name_fa", &self.name_fa, min, max)?;
        self.code = validation::text("code", &self.code, CODE_LEN.0, CODE_LEN.1)?;
        self.address = validation::optional_text("address", self.address.as_deref(), 500)?;
        self.phone = validation::phone(self.phone.as_deref())?;
        Ok(())
    }
}

/// Fields supplied when creating a [`School`].
#[derive(Debug, Clone)]
pub struct NewSchool {
    pub district_id: Uuid,
    pub name_fa: String,
    pub code: String,
    pub school_type: SchoolType,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl NewSchool {
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> School {
        School {
            id: Uuid::new_v4(),
            district_id: self.district_id,
            name_fa: self.name_fa,
            code: self.code,
            school_type: self.school_type,
            address: self.address,
            phone: self.phone,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_types_are_distinct_but_share_behavior() {
        let mut city: City = NewDivision {
            parent_id: Uuid::new_v4(),
            name_fa: " تهران ".into(),
            code: "0101".into(),
        }
        .into_record(Utc::now());
        city.validate().unwrap();
        assert_eq!(city.name_fa, "تهران");
        assert_eq!(<CityTier as Tier>::PARENT, "state");
        assert_eq!(<DistrictTier as Tier>::NAME, "district");
    }

    #[test]
    fn division_serializes_without_marker() {
        let county: County =
            Division::from_parts(Uuid::nil(), Uuid::nil(), "ری".into(), "010102".into(), Utc::now(), Utc::now());
        let json = serde_json::to_value(&county).unwrap();
        assert_eq!(json["code"], "010102");
        assert!(json.get("tier").is_none());
    }

    #[test]
    fn state_rejects_negative_order_and_blank_code() {
        let mut state = NewState {
            name_fa: "فارس".into(),
            code: "03".into(),
            order_index: -1,
        }
        .into_record(Utc::now());
        assert!(state.validate().is_err());
        state.order_index = 3;
        state.code = "  ".into();
        assert!(state.validate().is_err());
    }

    #[test]
    fn school_validates_phone_and_trims_address() {
        let mut school = NewSchool {
            district_id: Uuid::new_v4(),
            name_fa: "دبستان حافظ".into(),
            code: "SCH0202".into(),
            school_type: SchoolType::Elementary,
            address: Some("  ".into()),
            phone: Some("0313234567".into()),
        }
        .into_record(Utc::now());
        assert!(school.validate().is_err());
        school.phone = Some("03132345678".into());
        school.validate().unwrap();
        assert_eq!(school.address, None);
    }
}
