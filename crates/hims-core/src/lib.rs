//! # hims-core: Domain Model for the Health Insurance Management Stack
//!
//! Everything the REST service and the operator CLI share lives here:
//!
//! - **Records**: [`User`], [`Person`], the location hierarchy
//!   ([`State`], [`Division`], [`School`]), [`InsurancePlan`],
//!   [`PlanCoverage`], [`InsuranceRegistration`] and [`Document`]. Each
//!   record normalizes and checks its own fields in `validate()`.
//! - **Store**: [`Database`], the in-memory relational store. It enforces
//!   foreign keys, uniqueness, the single-open-registration rule, cascades
//!   and protected references atomically under one lock.
//! - **Statistics**: pure aggregate functions in [`stats`].
//! - **Passwords**: Argon2id hashing in [`password`].
//! - **Seed data**: reference rows for a fresh deployment in [`seed`].
//!
//! ## Crate Policy
//!
//! - No I/O. Persistence to PostgreSQL and file storage belong to the API
//!   crate; this crate only describes what is stored.
//! - No `.unwrap()` outside tests.
//! - Identifiers with a fixed shape are newtypes validated on construction
//!   ([`NationalId`]).

pub mod document;
pub mod domain;
pub mod error;
pub mod identity;
pub mod insurance;
pub mod location;
pub mod password;
pub mod seed;
pub mod stats;
pub mod store;
pub mod user;
pub mod validation;

pub use document::Document;
pub use domain::{CoverageType, DocumentType, PlanType, Relation, RegistrationStatus, SchoolType};
pub use error::{HimsError, ValidationError};
pub use identity::NationalId;
pub use insurance::{InsurancePlan, InsuranceRegistration, PlanCoverage};
pub use location::{City, County, District, Division, Region, School, State, Tier};
pub use store::{CascadeSummary, Database, Tables};
pub use user::{Person, User};
