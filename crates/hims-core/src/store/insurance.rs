//! Plan, coverage and registration operations.

use chrono::Utc;
use uuid::Uuid;

use super::{mentions, newest_first, touched, CascadeSummary, Database, Tables};
use crate::domain::RegistrationStatus;
use crate::error::HimsError;
use crate::insurance::{InsurancePlan, InsuranceRegistration, NewCoverage, NewPlan, NewRegistration, PlanCoverage};

/// Selection for [`Database::list_registrations`]. Empty fields match all.
#[derive(Debug, Clone, Default)]
pub struct RegistrationFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<RegistrationStatus>,
    pub plan_id: Option<Uuid>,
    /// Substring of the owner's national id, first or last name, or email.
    pub search: Option<String>,
}

impl RegistrationFilter {
    fn matches(&self, t: &Tables, reg: &InsuranceRegistration) -> bool {
        self.user_id.map_or(true, |u| reg.user_id == u)
            && self.status.map_or(true, |s| reg.status == s)
            && self.plan_id.map_or(true, |p| reg.plan_id == p)
            && self.search.as_deref().map_or(true, |needle| {
                let owner = t.users.get(&reg.user_id);
                mentions(
                    needle,
                    [
                        owner.map(|u| u.national_id.as_str()),
                        owner.map(|u| u.first_name.as_str()),
                        owner.map(|u| u.last_name.as_str()),
                        owner.and_then(|u| u.email.as_deref()),
                    ],
                )
            })
    }
}

impl Database {
    // -- Plans -------------------------------------------------------------------

    /// Create an active plan. Names are unique.
    pub fn insert_plan(&self, new: NewPlan) -> Result<InsurancePlan, HimsError> {
        let mut plan = new.into_record(Utc::now());
        plan.validate()?;
        self.write(|t| {
            check_plan_unique(t, &plan)?;
            t.plans.insert(plan.id, plan.clone());
            Ok(plan)
        })
    }

    pub fn get_plan(&self, id: &Uuid) -> Option<InsurancePlan> {
        self.read(|t| t.plans.get(id).cloned())
    }

    /// Plans ordered by tier, then name.
    pub fn list_plans(&self, active_only: bool) -> Vec<InsurancePlan> {
        let mut plans: Vec<InsurancePlan> = self.read(|t| {
            t.plans
                .values()
                .filter(|p| !active_only || p.is_active)
                .cloned()
                .collect()
        });
        plans.sort_by(|a, b| {
            (a.plan_type, a.name_fa.as_str(), a.id).cmp(&(b.plan_type, b.name_fa.as_str(), b.id))
        });
        plans
    }

    /// Update a plan. Plans are never deleted; set `is_active = false`
    /// to withdraw one.
    pub fn update_plan(&self, id: &Uuid, f: impl FnOnce(&mut InsurancePlan)) -> Result<InsurancePlan, HimsError> {
        self.write(|t| {
            let current = t.plans.get(id).ok_or_else(|| HimsError::not_found("plan", id))?;
            let mut next = current.clone();
            f(&mut next);
            next.id = current.id;
            next.created_at = current.created_at;
            next.validate()?;
            check_plan_unique(t, &next)?;
            next.updated_at = touched(current.updated_at);
            t.plans.insert(next.id, next.clone());
            Ok(next)
        })
    }

    // -- Coverages ---------------------------------------------------------------

    /// Add a coverage line. A plan carries at most one line per coverage type.
    pub fn insert_coverage(&self, new: NewCoverage) -> Result<PlanCoverage, HimsError> {
        let mut coverage = new.into_record(Utc::now());
        coverage.validate()?;
        self.write(|t| {
            if !t.plans.contains(&coverage.plan_id) {
                return Err(HimsError::not_found("plan", coverage.plan_id));
            }
            check_coverage_unique(t, &coverage)?;
            t.coverages.insert(coverage.id, coverage.clone());
            Ok(coverage)
        })
    }

    pub fn get_coverage(&self, id: &Uuid) -> Option<PlanCoverage> {
        self.read(|t| t.coverages.get(id).cloned())
    }

    /// Coverage lines ordered by plan and coverage type.
    pub fn list_coverages(&self, plan_id: Option<Uuid>) -> Vec<PlanCoverage> {
        let mut rows: Vec<PlanCoverage> = self.read(|t| {
            t.coverages
                .values()
                .filter(|c| plan_id.map_or(true, |p| c.plan_id == p))
                .cloned()
                .collect()
        });
        rows.sort_by(|a, b| (a.plan_id, a.coverage_type, a.id).cmp(&(b.plan_id, b.coverage_type, b.id)));
        rows
    }

    pub fn update_coverage(&self, id: &Uuid, f: impl FnOnce(&mut PlanCoverage)) -> Result<PlanCoverage, HimsError> {
        self.write(|t| {
            let current = t.coverages.get(id).ok_or_else(|| HimsError::not_found("coverage", id))?;
            let mut next = current.clone();
            f(&mut next);
            next.id = current.id;
            next.plan_id = current.plan_id;
            next.created_at = current.created_at;
            next.validate()?;
            check_coverage_unique(t, &next)?;
            next.updated_at = touched(current.updated_at);
            t.coverages.insert(next.id, next.clone());
            Ok(next)
        })
    }

    pub fn delete_coverage(&self, id: &Uuid) -> Result<CascadeSummary, HimsError> {
        self.write(|t| {
            t.coverages.remove(id).ok_or_else(|| HimsError::not_found("coverage", id))?;
            let mut summary = CascadeSummary::default();
            summary.add("coverages", 1);
            Ok(summary)
        })
    }

    // -- Registrations -----------------------------------------------------------

    /// Enrol a user in an active plan through a school.
    ///
    /// Fails with [`HimsError::NotFound`] when the user, an active plan, the
    /// school or one of the user's own persons is missing, and with
    /// [`HimsError::Conflict`] when the user already holds an open
    /// (pending, approved or active) registration.
    pub fn insert_registration(&self, new: NewRegistration) -> Result<InsuranceRegistration, HimsError> {
        let mut reg = new.into_record(Utc::now());
        reg.validate()?;
        self.write(|t| {
            if !t.users.contains(&reg.user_id) {
                return Err(HimsError::not_found("user", reg.user_id));
            }
            match t.plans.get(&reg.plan_id) {
                Some(plan) if plan.is_active => {}
                _ => return Err(HimsError::not_found("plan", reg.plan_id)),
            }
            check_registration_refs(t, &reg)?;
            check_single_open(t, &reg)?;
            t.registrations.insert(reg.id, reg.clone());
            Ok(reg)
        })
    }

    pub fn get_registration(&self, id: &Uuid) -> Option<InsuranceRegistration> {
        self.read(|t| t.registrations.get(id).cloned())
    }

    /// Registrations matching `filter`, most recent first.
    pub fn list_registrations(&self, filter: RegistrationFilter) -> Vec<InsuranceRegistration> {
        let mut rows: Vec<InsuranceRegistration> = self.read(|t| {
            t.registrations
                .values()
                .filter(|r| filter.matches(t, r))
                .cloned()
                .collect()
        });
        newest_first(&mut rows, |r| (r.registration_date, r.id));
        rows
    }

    /// Update a registration. Owner and registration date are immutable.
    /// Any status may move to any other status, but an update that would
    /// leave the user with two open registrations is a conflict.
    pub fn update_registration(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut InsuranceRegistration),
    ) -> Result<InsuranceRegistration, HimsError> {
        self.write(|t| {
            let current = t
                .registrations
                .get(id)
                .ok_or_else(|| HimsError::not_found("registration", id))?;
            let mut next = current.clone();
            f(&mut next);
            next.id = current.id;
            next.user_id = current.user_id;
            next.registration_date = current.registration_date;
            next.validate()?;
            if !t.plans.contains(&next.plan_id) {
                return Err(HimsError::not_found("plan", next.plan_id));
            }
            check_registration_refs(t, &next)?;
            check_single_open(t, &next)?;
            next.updated_at = touched(current.updated_at);
            t.registrations.insert(next.id, next.clone());
            Ok(next)
        })
    }

    /// Delete a registration. Documents attached to it stay with the user.
    pub fn delete_registration(&self, id: &Uuid) -> Result<CascadeSummary, HimsError> {
        self.write(|t| {
            t.registrations
                .remove(id)
                .ok_or_else(|| HimsError::not_found("registration", id))?;
            for doc in t.documents.values_mut() {
                if doc.registration_id == Some(*id) {
                    doc.registration_id = None;
                }
            }
            let mut summary = CascadeSummary::default();
            summary.add("registrations", 1);
            Ok(summary)
        })
    }
}

fn check_plan_unique(t: &Tables, plan: &InsurancePlan) -> Result<(), HimsError> {
    if t.plans.values().any(|p| p.id != plan.id && p.name_fa == plan.name_fa) {
        return Err(HimsError::Conflict(format!("plan name {} is already in use", plan.name_fa)));
    }
    Ok(())
}

fn check_coverage_unique(t: &Tables, coverage: &PlanCoverage) -> Result<(), HimsError> {
    let taken = t.coverages.values().any(|c| {
        c.id != coverage.id && c.plan_id == coverage.plan_id && c.coverage_type == coverage.coverage_type
    });
    if taken {
        return Err(HimsError::Conflict(format!(
            "plan already has a {} coverage",
            coverage.coverage_type
        )));
    }
    Ok(())
}

/// School must exist; every person must exist and belong to the registrant.
fn check_registration_refs(t: &Tables, reg: &InsuranceRegistration) -> Result<(), HimsError> {
    if !t.schools.contains(&reg.school_id) {
        return Err(HimsError::not_found("school", reg.school_id));
    }
    for person_id in &reg.person_ids {
        match t.persons.get(person_id) {
            Some(p) if p.user_id == reg.user_id => {}
            _ => return Err(HimsError::not_found("person", person_id)),
        }
    }
    Ok(())
}

fn check_single_open(t: &Tables, reg: &InsuranceRegistration) -> Result<(), HimsError> {
    if !reg.status.is_open() {
        return Ok(());
    }
    let open = t
        .registrations
        .values()
        .any(|r| r.id != reg.id && r.user_id == reg.user_id && r.status.is_open());
    if open {
        return Err(HimsError::Conflict(
            "user already has an open insurance registration".into(),
        ));
    }
    Ok(())
}
