//! # Plans, Coverages and Registrations
//!
//! Amounts are integer rial. A plan owns its coverage lines; a registration
//! joins a user, a plan and a school and carries the lifecycle status.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{CoverageType, PlanType, RegistrationStatus};
use crate::error::ValidationError;
use crate::validation;

/// Name/title length bounds.
pub const TITLE_LEN: (usize, usize) = (2, 100);

/// An insurance product users can register for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsurancePlan {
    pub id: Uuid,
    /// Globally unique.
    pub name_fa: String,
    pub plan_type: PlanType,
    pub description_fa: String,
    /// Monthly premium in rial, strictly positive.
    pub monthly_premium: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsurancePlan {
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.name_fa = validation::text("name_fa", &self.name_fa, TITLE_LEN.0, TITLE_LEN.1)?;
        self.description_fa = self.description_fa.trim().to_string();
        positive("monthly_premium", self.monthly_premium)
    }
}

#[derive(Debug, Clone)]
pub struct NewPlan {
    pub name_fa: String,
    pub plan_type: PlanType,
    pub description_fa: String,
    pub monthly_premium: i64,
}

impl NewPlan {
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> InsurancePlan {
        InsurancePlan {
            id: Uuid::new_v4(),
            name_fa: self.name_fa,
            plan_type: self.plan_type,
            description_fa: self.description_fa,
            monthly_premium: self.monthly_premium,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One coverage line of a plan. `(plan_id, coverage_type)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanCoverage {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub coverage_type: CoverageType,
    pub title_fa: String,
    pub description_fa: String,
    /// Payout cap in rial, strictly positive.
    pub coverage_amount: i64,
    /// Share of the cost the plan pays, 0 through 100.
    pub coverage_percentage: i32,
    /// Maximum claims per period; `None` means unlimited.
    pub max_usage_count: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlanCoverage {
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.title_fa = validation::text("title_fa", &self.title_fa, TITLE_LEN.0, TITLE_LEN.1)?;
        self.description_fa = self.description_fa.trim().to_string();
        positive("coverage_amount", self.coverage_amount)?;
        if !(0..=100).contains(&self.coverage_percentage) {
            return Err(ValidationError::OutOfRange {
                field: "coverage_percentage",
                constraint: "between 0 and 100",
                actual: i64::from(self.coverage_percentage),
            });
        }
        if let Some(n) = self.max_usage_count {
            if n < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "max_usage_count",
                    constraint: "zero or greater",
                    actual: i64::from(n),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewCoverage {
    pub plan_id: Uuid,
    pub coverage_type: CoverageType,
    pub title_fa: String,
    pub description_fa: String,
    pub coverage_amount: i64,
    pub coverage_percentage: i32,
    pub max_usage_count: Option<i32>,
}

impl NewCoverage {
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> PlanCoverage {
        PlanCoverage {
            id: Uuid::new_v4(),
            plan_id: self.plan_id,
            coverage_type: self.coverage_type,
            title_fa: self.title_fa,
            description_fa: self.description_fa,
            coverage_amount: self.coverage_amount,
            coverage_percentage: self.coverage_percentage,
            max_usage_count: self.max_usage_count,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A user's enrolment in a plan through a school.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsuranceRegistration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub school_id: Uuid,
    /// Dependents covered by this registration; all owned by `user_id`.
    pub person_ids: Vec<Uuid>,
    pub status: RegistrationStatus,
    pub registration_date: DateTime<Utc>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Free-form JSON object.
    pub additional_info: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl InsuranceRegistration {
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ValidationError::DateOrder { start, end });
            }
        }
        if self.additional_info.is_null() {
            self.additional_info = serde_json::Value::Object(Default::default());
        }
        if !self.additional_info.is_object() {
            return Err(ValidationError::AdditionalInfoNotObject);
        }
        self.person_ids.sort_unstable();
        self.person_ids.dedup();
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub school_id: Uuid,
    pub person_ids: Vec<Uuid>,
    pub additional_info: serde_json::Value,
}

impl NewRegistration {
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> InsuranceRegistration {
        InsuranceRegistration {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            plan_id: self.plan_id,
            school_id: self.school_id,
            person_ids: self.person_ids,
            status: RegistrationStatus::Pending,
            registration_date: now,
            start_date: None,
            end_date: None,
            additional_info: self.additional_info,
            updated_at: now,
        }
    }
}

fn positive(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            constraint: "greater than 0",
            actual: value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage() -> PlanCoverage {
        NewCoverage {
            plan_id: Uuid::new_v4(),
            coverage_type: CoverageType::Dental,
            title_fa: "دندانپزشکی".into(),
            description_fa: "".into(),
            coverage_amount: 3_000_000,
            coverage_percentage: 70,
            max_usage_count: Some(5),
        }
        .into_record(Utc::now())
    }

    #[test]
    fn plan_premium_must_be_positive() {
        let mut plan = NewPlan {
            name_fa: "بیمه پایه".into(),
            plan_type: PlanType::Basic,
            description_fa: "".into(),
            monthly_premium: 0,
        }
        .into_record(Utc::now());
        assert!(plan.validate().is_err());
        plan.monthly_premium = 500_000;
        plan.validate().unwrap();
        assert!(plan.is_active);
    }

    #[test]
    fn coverage_percentage_bounds() {
        let mut c = coverage();
        c.coverage_percentage = 101;
        assert!(c.validate().is_err());
        c.coverage_percentage = 100;
        c.validate().unwrap();
        c.coverage_percentage = 0;
        c.validate().unwrap();
    }

    #[test]
    fn coverage_rejects_negative_usage_count() {
        let mut c = coverage();
        c.max_usage_count = Some(-1);
        assert!(c.validate().is_err());
        c.max_usage_count = None;
        c.validate().unwrap();
    }

    #[test]
    fn registration_defaults_and_date_order() {
        let mut reg = NewRegistration {
            user_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            person_ids: vec![],
            additional_info: serde_json::Value::Null,
        }
        .into_record(Utc::now());
        reg.validate().unwrap();
        assert_eq!(reg.status, RegistrationStatus::Pending);
        assert!(reg.additional_info.is_object());

        reg.start_date = NaiveDate::from_ymd_opt(2025, 3, 1);
        reg.end_date = NaiveDate::from_ymd_opt(2025, 2, 1);
        assert!(matches!(reg.validate(), Err(ValidationError::DateOrder { .. })));
    }

    #[test]
    fn registration_rejects_non_object_info() {
        let mut reg = NewRegistration {
            user_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            school_id: Uuid::new_v4(),
            person_ids: vec![],
            additional_info: serde_json::json!([1, 2]),
        }
        .into_record(Utc::now());
        assert_eq!(reg.validate(), Err(ValidationError::AdditionalInfoNotObject));
    }
}
