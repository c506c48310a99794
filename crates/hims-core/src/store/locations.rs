//! Location hierarchy operations.
//!
//! Deleting any level removes the whole subtree beneath it. The delete is
//! refused with [`HimsError::Protected`] when any school in that subtree is
//! still referenced by an insurance registration; nothing is removed in that
//! case.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use super::{mentions, touched, CascadeSummary, Database, Table, Tables};
use crate::domain::SchoolType;
use crate::error::HimsError;
use crate::location::{
    CityTier, CountyTier, Division, DistrictTier, NewDivision, NewSchool, NewState, RegionTier, School, State,
    Tier,
};

/// Table access for one intermediate level.
///
/// Implemented for the four [`Tier`] markers so the division operations
/// can be written once.
pub trait DivisionTable: Tier {
    /// Plural table name, used in cascade summaries.
    const TABLE: &'static str;
    /// Depth below the state level (city = 1 ... district = 4).
    const DEPTH: usize;

    fn rows(t: &Tables) -> &Table<Division<Self>>;
    fn rows_mut(t: &mut Tables) -> &mut Table<Division<Self>>;
    fn parent_exists(t: &Tables, parent_id: &Uuid) -> bool;
}

impl DivisionTable for CityTier {
    const TABLE: &'static str = "cities";
    const DEPTH: usize = 1;

    fn rows(t: &Tables) -> &Table<Division<Self>> {
        &t.cities
    }
    fn rows_mut(t: &mut Tables) -> &mut Table<Division<Self>> {
        &mut t.cities
    }
    fn parent_exists(t: &Tables, parent_id: &Uuid) -> bool {
        t.states.contains(parent_id)
    }
}

impl DivisionTable for CountyTier {
    const TABLE: &'static str = "counties";
    const DEPTH: usize = 2;

    fn rows(t: &Tables) -> &Table<Division<Self>> {
        &t.counties
    }
    fn rows_mut(t: &mut Tables) -> &mut Table<Division<Self>> {
        &mut t.counties
    }
    fn parent_exists(t: &Tables, parent_id: &Uuid) -> bool {
        t.cities.contains(parent_id)
    }
}

impl DivisionTable for RegionTier {
    const TABLE: &'static str = "regions";
    const DEPTH: usize = 3;

    fn rows(t: &Tables) -> &Table<Division<Self>> {
        &t.regions
    }
    fn rows_mut(t: &mut Tables) -> &mut Table<Division<Self>> {
        &mut t.regions
    }
    fn parent_exists(t: &Tables, parent_id: &Uuid) -> bool {
        t.counties.contains(parent_id)
    }
}

impl DivisionTable for DistrictTier {
    const TABLE: &'static str = "districts";
    const DEPTH: usize = 4;

    fn rows(t: &Tables) -> &Table<Division<Self>> {
        &t.districts
    }
    fn rows_mut(t: &mut Tables) -> &mut Table<Division<Self>> {
        &mut t.districts
    }
    fn parent_exists(t: &Tables, parent_id: &Uuid) -> bool {
        t.regions.contains(parent_id)
    }
}

// -- Subtree -------------------------------------------------------------------

/// Ids reached from one root, per depth (0 = state ... 4 = district).
#[derive(Debug, Default)]
struct Subtree {
    levels: [Vec<Uuid>; 5],
    schools: Vec<Uuid>,
}

fn children_of<T: Tier>(table: &Table<Division<T>>, parents: &[Uuid]) -> Vec<Uuid> {
    let parents: HashSet<&Uuid> = parents.iter().collect();
    table
        .values()
        .filter(|row| parents.contains(&row.parent_id))
        .map(|row| row.id)
        .collect()
}

impl Subtree {
    fn collect(t: &Tables, depth: usize, root: Uuid) -> Self {
        let mut sub = Subtree::default();
        sub.levels[depth].push(root);
        for d in depth..4 {
            let parents = &sub.levels[d];
            let children = match d {
                0 => children_of(&t.cities, parents),
                1 => children_of(&t.counties, parents),
                2 => children_of(&t.regions, parents),
                _ => children_of(&t.districts, parents),
            };
            sub.levels[d + 1] = children;
        }
        let districts: HashSet<&Uuid> = sub.levels[4].iter().collect();
        sub.schools = t
            .schools
            .values()
            .filter(|s| districts.contains(&s.district_id))
            .map(|s| s.id)
            .collect();
        sub
    }

    /// Fail if any school in the subtree is still registered against.
    fn check_unprotected(&self, t: &Tables, entity: &'static str, id: &Uuid) -> Result<(), HimsError> {
        let schools: HashSet<&Uuid> = self.schools.iter().collect();
        let count = t
            .registrations
            .values()
            .filter(|r| schools.contains(&r.school_id))
            .count();
        if count > 0 {
            return Err(HimsError::Protected {
                entity,
                id: id.to_string(),
                referrer: "insurance registrations",
                count,
            });
        }
        Ok(())
    }

    fn remove(self, t: &mut Tables) -> CascadeSummary {
        let mut summary = CascadeSummary::default();
        let [states, cities, counties, regions, districts] = self.levels;
        summary.add("schools", remove_ids(&mut t.schools, &self.schools));
        summary.add("districts", remove_ids(&mut t.districts, &districts));
        summary.add("regions", remove_ids(&mut t.regions, &regions));
        summary.add("counties", remove_ids(&mut t.counties, &counties));
        summary.add("cities", remove_ids(&mut t.cities, &cities));
        summary.add("states", remove_ids(&mut t.states, &states));
        summary
    }
}

/// Selection for [`Database::search_schools`]. Empty fields match all.
#[derive(Debug, Clone, Default)]
pub struct SchoolFilter {
    pub district_id: Option<Uuid>,
    /// Province the school's district belongs to, through every level.
    pub state_id: Option<Uuid>,
    pub school_type: Option<SchoolType>,
    /// Substring of the name, code, address or phone.
    pub search: Option<String>,
}

impl SchoolFilter {
    fn matches(&self, t: &Tables, school: &School) -> bool {
        self.district_id.map_or(true, |d| school.district_id == d)
            && self.school_type.map_or(true, |k| school.school_type == k)
            && self.state_id.map_or(true, |s| state_of(t, school) == Some(s))
            && self.search.as_deref().map_or(true, |needle| {
                mentions(
                    needle,
                    [
                        Some(school.name_fa.as_str()),
                        Some(school.code.as_str()),
                        school.address.as_deref(),
                        school.phone.as_deref(),
                    ],
                )
            })
    }
}

/// The province above a school, if the chain is intact.
fn state_of(t: &Tables, school: &School) -> Option<Uuid> {
    let district = t.districts.get(&school.district_id)?;
    let region = t.regions.get(&district.parent_id)?;
    let county = t.counties.get(&region.parent_id)?;
    let city = t.cities.get(&county.parent_id)?;
    Some(city.parent_id)
}

fn remove_ids<T: Clone>(table: &mut Table<T>, ids: &[Uuid]) -> usize {
    ids.iter().filter(|id| table.remove(id).is_some()).count()
}

fn by_name<T>(rows: &mut [T], key: impl Fn(&T) -> (&str, Uuid)) {
    rows.sort_by(|a, b| key(a).cmp(&key(b)));
}

impl Database {
    // -- States ------------------------------------------------------------------

    /// Create a province. Name and code must both be unused.
    pub fn insert_state(&self, new: NewState) -> Result<State, HimsError> {
        let mut state = new.into_record(Utc::now());
        state.validate()?;
        self.write(|t| {
            check_state_unique(t, &state)?;
            t.states.insert(state.id, state.clone());
            Ok(state)
        })
    }

    pub fn get_state(&self, id: &Uuid) -> Option<State> {
        self.read(|t| t.states.get(id).cloned())
    }

    /// All provinces ordered by `order_index`, then name.
    pub fn list_states(&self) -> Vec<State> {
        let mut states: Vec<State> = self.read(|t| t.states.values().cloned().collect());
        states.sort_by(|a, b| {
            (a.order_index, a.name_fa.as_str(), a.id).cmp(&(b.order_index, b.name_fa.as_str(), b.id))
        });
        states
    }

    pub fn update_state(&self, id: &Uuid, f: impl FnOnce(&mut State)) -> Result<State, HimsError> {
        self.write(|t| {
            let current = t.states.get(id).ok_or_else(|| HimsError::not_found("state", id))?;
            let mut next = current.clone();
            f(&mut next);
            next.id = current.id;
            next.created_at = current.created_at;
            next.validate()?;
            check_state_unique(t, &next)?;
            next.updated_at = touched(current.updated_at);
            t.states.insert(next.id, next.clone());
            Ok(next)
        })
    }

    /// Delete a province and its whole subtree.
    pub fn delete_state(&self, id: &Uuid) -> Result<CascadeSummary, HimsError> {
        self.write(|t| {
            if !t.states.contains(id) {
                return Err(HimsError::not_found("state", id));
            }
            let sub = Subtree::collect(t, 0, *id);
            sub.check_unprotected(t, "state", id)?;
            Ok(sub.remove(t))
        })
    }

    // -- Divisions ---------------------------------------------------------------

    /// Create a city, county, region or district. The parent must exist and
    /// the code must be unused among its siblings.
    pub fn insert_division<T: DivisionTable>(&self, new: NewDivision) -> Result<Division<T>, HimsError> {
        let mut row: Division<T> = new.into_record(Utc::now());
        row.validate()?;
        self.write(|t| {
            if !T::parent_exists(t, &row.parent_id) {
                return Err(HimsError::not_found(T::PARENT, row.parent_id));
            }
            check_division_unique(t, &row)?;
            T::rows_mut(t).insert(row.id, row.clone());
            Ok(row)
        })
    }

    pub fn get_division<T: DivisionTable>(&self, id: &Uuid) -> Option<Division<T>> {
        self.read(|t| T::rows(t).get(id).cloned())
    }

    /// Rows of one level ordered by name, optionally restricted to one parent.
    pub fn list_divisions<T: DivisionTable>(&self, parent_id: Option<Uuid>) -> Vec<Division<T>> {
        let mut rows: Vec<Division<T>> = self.read(|t| {
            T::rows(t)
                .values()
                .filter(|d| parent_id.map_or(true, |p| d.parent_id == p))
                .cloned()
                .collect()
        });
        by_name(&mut rows, |d| (d.name_fa.as_str(), d.id));
        rows
    }

    /// Update a division. Moving it to another parent is allowed as long as
    /// the new parent exists.
    pub fn update_division<T: DivisionTable>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut Division<T>),
    ) -> Result<Division<T>, HimsError> {
        self.write(|t| {
            let current = T::rows(t).get(id).ok_or_else(|| HimsError::not_found(T::NAME, id))?;
            let mut next = current.clone();
            f(&mut next);
            next.id = current.id;
            next.created_at = current.created_at;
            next.validate()?;
            if !T::parent_exists(t, &next.parent_id) {
                return Err(HimsError::not_found(T::PARENT, next.parent_id));
            }
            check_division_unique(t, &next)?;
            next.updated_at = touched(current.updated_at);
            T::rows_mut(t).insert(next.id, next.clone());
            Ok(next)
        })
    }

    /// Delete a division and its whole subtree.
    pub fn delete_division<T: DivisionTable>(&self, id: &Uuid) -> Result<CascadeSummary, HimsError> {
        self.write(|t| {
            if !T::rows(t).contains(id) {
                return Err(HimsError::not_found(T::NAME, id));
            }
            let sub = Subtree::collect(t, T::DEPTH, *id);
            sub.check_unprotected(t, T::NAME, id)?;
            Ok(sub.remove(t))
        })
    }

    // -- Schools -----------------------------------------------------------------

    /// Create a school. The district must exist and the code must be unused
    /// across all schools.
    pub fn insert_school(&self, new: NewSchool) -> Result<School, HimsError> {
        let mut school = new.into_record(Utc::now());
        school.validate()?;
        self.write(|t| {
            if !t.districts.contains(&school.district_id) {
                return Err(HimsError::not_found("district", school.district_id));
            }
            check_school_unique(t, &school)?;
            t.schools.insert(school.id, school.clone());
            Ok(school)
        })
    }

    pub fn get_school(&self, id: &Uuid) -> Option<School> {
        self.read(|t| t.schools.get(id).cloned())
    }

    /// Schools ordered by name, optionally restricted to one district.
    pub fn list_schools(&self, district_id: Option<Uuid>) -> Vec<School> {
        self.search_schools(&SchoolFilter {
            district_id,
            ..Default::default()
        })
    }

    /// Schools matching `filter`, ordered by name.
    pub fn search_schools(&self, filter: &SchoolFilter) -> Vec<School> {
        let mut schools: Vec<School> =
            self.read(|t| t.schools.values().filter(|s| filter.matches(t, s)).cloned().collect());
        by_name(&mut schools, |s| (s.name_fa.as_str(), s.id));
        schools
    }

    pub fn update_school(&self, id: &Uuid, f: impl FnOnce(&mut School)) -> Result<School, HimsError> {
        self.write(|t| {
            let current = t.schools.get(id).ok_or_else(|| HimsError::not_found("school", id))?;
            let mut next = current.clone();
            f(&mut next);
            next.id = current.id;
            next.created_at = current.created_at;
            next.validate()?;
            if !t.districts.contains(&next.district_id) {
                return Err(HimsError::not_found("district", next.district_id));
            }
            check_school_unique(t, &next)?;
            next.updated_at = touched(current.updated_at);
            t.schools.insert(next.id, next.clone());
            Ok(next)
        })
    }

    /// Delete a school. Refused while registrations reference it.
    pub fn delete_school(&self, id: &Uuid) -> Result<CascadeSummary, HimsError> {
        self.write(|t| {
            if !t.schools.contains(id) {
                return Err(HimsError::not_found("school", id));
            }
            let sub = Subtree {
                schools: vec![*id],
                ..Subtree::default()
            };
            sub.check_unprotected(t, "school", id)?;
            Ok(sub.remove(t))
        })
    }
}

fn check_state_unique(t: &Tables, state: &State) -> Result<(), HimsError> {
    for other in t.states.values().filter(|s| s.id != state.id) {
        if other.name_fa == state.name_fa {
            return Err(HimsError::Conflict(format!("state name {} is already in use", state.name_fa)));
        }
        if other.code == state.code {
            return Err(HimsError::Conflict(format!("state code {} is already in use", state.code)));
        }
    }
    Ok(())
}

fn check_division_unique<T: DivisionTable>(t: &Tables, row: &Division<T>) -> Result<(), HimsError> {
    let taken = T::rows(t)
        .values()
        .any(|d| d.id != row.id && d.parent_id == row.parent_id && d.code == row.code);
    if taken {
        return Err(HimsError::Conflict(format!(
            "{} code {} is already in use within this {}",
            T::NAME,
            row.code,
            T::PARENT
        )));
    }
    Ok(())
}

fn check_school_unique(t: &Tables, school: &School) -> Result<(), HimsError> {
    if t.schools.values().any(|s| s.id != school.id && s.code == school.code) {
        return Err(HimsError::Conflict(format!("school code {} is already in use", school.code)));
    }
    Ok(())
}
