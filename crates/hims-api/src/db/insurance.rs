//! Insurance plan, coverage and registration persistence operations.
//!
//! A registration's covered persons live in the `registration_persons`
//! join table. Upserting a registration replaces its join rows.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use hims_core::{CoverageType, InsurancePlan, InsuranceRegistration, PlanCoverage, PlanType, RegistrationStatus};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::choice;

pub async fn upsert_plan(conn: &mut PgConnection, plan: &InsurancePlan) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO insurance_plans (id, name_fa, plan_type, description_fa, monthly_premium,
                                      is_active, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (id) DO UPDATE SET
             name_fa = EXCLUDED.name_fa, plan_type = EXCLUDED.plan_type,
             description_fa = EXCLUDED.description_fa, monthly_premium = EXCLUDED.monthly_premium,
             is_active = EXCLUDED.is_active, updated_at = EXCLUDED.updated_at
         WHERE insurance_plans.updated_at <= EXCLUDED.updated_at",
    )
    .bind(plan.id)
    .bind(&plan.name_fa)
    .bind(plan.plan_type.as_str())
    .bind(&plan.description_fa)
    .bind(plan.monthly_premium)
    .bind(plan.is_active)
    .bind(plan.created_at)
    .bind(plan.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_coverage(conn: &mut PgConnection, coverage: &PlanCoverage) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO plan_coverages (id, plan_id, coverage_type, title_fa, description_fa,
                                     coverage_amount, coverage_percentage, max_usage_count,
                                     is_active, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (id) DO UPDATE SET
             coverage_type = EXCLUDED.coverage_type, title_fa = EXCLUDED.title_fa,
             description_fa = EXCLUDED.description_fa, coverage_amount = EXCLUDED.coverage_amount,
             coverage_percentage = EXCLUDED.coverage_percentage,
             max_usage_count = EXCLUDED.max_usage_count, is_active = EXCLUDED.is_active,
             updated_at = EXCLUDED.updated_at
         WHERE plan_coverages.updated_at <= EXCLUDED.updated_at",
    )
    .bind(coverage.id)
    .bind(coverage.plan_id)
    .bind(coverage.coverage_type.as_str())
    .bind(&coverage.title_fa)
    .bind(&coverage.description_fa)
    .bind(coverage.coverage_amount)
    .bind(coverage.coverage_percentage)
    .bind(coverage.max_usage_count)
    .bind(coverage.is_active)
    .bind(coverage.created_at)
    .bind(coverage.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_registration(
    conn: &mut PgConnection,
    registration: &InsuranceRegistration,
) -> Result<(), sqlx::Error> {
    let written = sqlx::query(
        "INSERT INTO insurance_registrations (id, user_id, plan_id, school_id, status,
                                              registration_date, start_date, end_date,
                                              additional_info, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (id) DO UPDATE SET
             plan_id = EXCLUDED.plan_id, school_id = EXCLUDED.school_id,
             status = EXCLUDED.status, start_date = EXCLUDED.start_date,
             end_date = EXCLUDED.end_date, additional_info = EXCLUDED.additional_info,
             updated_at = EXCLUDED.updated_at
         WHERE insurance_registrations.updated_at <= EXCLUDED.updated_at",
    )
    .bind(registration.id)
    .bind(registration.user_id)
    .bind(registration.plan_id)
    .bind(registration.school_id)
    .bind(registration.status.as_str())
    .bind(registration.registration_date)
    .bind(registration.start_date)
    .bind(registration.end_date)
    .bind(&registration.additional_info)
    .bind(registration.updated_at)
    .execute(&mut *conn)
    .await?;
    if written.rows_affected() == 0 {
        // A newer version of the row is already stored; keep its persons too.
        return Ok(());
    }

    sqlx::query("DELETE FROM registration_persons WHERE registration_id = $1")
        .bind(registration.id)
        .execute(&mut *conn)
        .await?;

    if !registration.person_ids.is_empty() {
        sqlx::query(
            "INSERT INTO registration_persons (registration_id, person_id)
             SELECT $1, person_id FROM UNNEST($2::uuid[]) AS t(person_id)",
        )
        .bind(registration.id)
        .bind(&registration.person_ids)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn load_plans(pool: &PgPool) -> Result<Vec<InsurancePlan>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PlanRow>(
        "SELECT id, name_fa, plan_type, description_fa, monthly_premium, is_active, created_at, updated_at
         FROM insurance_plans",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PlanRow::into_record).collect())
}

pub async fn load_coverages(pool: &PgPool) -> Result<Vec<PlanCoverage>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CoverageRow>(
        "SELECT id, plan_id, coverage_type, title_fa, description_fa, coverage_amount,
                coverage_percentage, max_usage_count, is_active, created_at, updated_at
         FROM plan_coverages",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(CoverageRow::into_record).collect())
}

/// Load all registrations together with their covered persons.
pub async fn load_registrations(pool: &PgPool) -> Result<Vec<InsuranceRegistration>, sqlx::Error> {
    let links: Vec<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT registration_id, person_id FROM registration_persons ORDER BY registration_id, person_id",
    )
    .fetch_all(pool)
    .await?;
    let mut persons: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (registration_id, person_id) in links {
        persons.entry(registration_id).or_default().push(person_id);
    }

    let rows = sqlx::query_as::<_, RegistrationRow>(
        "SELECT id, user_id, plan_id, school_id, status, registration_date, start_date, end_date,
                additional_info, updated_at
         FROM insurance_registrations ORDER BY registration_date",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let person_ids = persons.remove(&row.id).unwrap_or_default();
            row.into_record(person_ids)
        })
        .collect())
}

/// Internal row types for SQLx mapping.
#[derive(sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    name_fa: String,
    plan_type: String,
    description_fa: String,
    monthly_premium: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PlanRow {
    fn into_record(self) -> InsurancePlan {
        InsurancePlan {
            id: self.id,
            plan_type: choice("insurance_plans", self.id, &self.plan_type, PlanType::Basic),
            name_fa: self.name_fa,
            description_fa: self.description_fa,
            monthly_premium: self.monthly_premium,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CoverageRow {
    id: Uuid,
    plan_id: Uuid,
    coverage_type: String,
    title_fa: String,
    description_fa: String,
    coverage_amount: i64,
    coverage_percentage: i32,
    max_usage_count: Option<i32>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CoverageRow {
    fn into_record(self) -> PlanCoverage {
        PlanCoverage {
            id: self.id,
            plan_id: self.plan_id,
            coverage_type: choice("plan_coverages", self.id, &self.coverage_type, CoverageType::Outpatient),
            title_fa: self.title_fa,
            description_fa: self.description_fa,
            coverage_amount: self.coverage_amount,
            coverage_percentage: self.coverage_percentage,
            max_usage_count: self.max_usage_count,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RegistrationRow {
    id: Uuid,
    user_id: Uuid,
    plan_id: Uuid,
    school_id: Uuid,
    status: String,
    registration_date: DateTime<Utc>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    additional_info: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl RegistrationRow {
    fn into_record(self, person_ids: Vec<Uuid>) -> InsuranceRegistration {
        InsuranceRegistration {
            id: self.id,
            user_id: self.user_id,
            plan_id: self.plan_id,
            school_id: self.school_id,
            person_ids,
            status: choice(
                "insurance_registrations",
                self.id,
                &self.status,
                RegistrationStatus::default(),
            ),
            registration_date: self.registration_date,
            start_date: self.start_date,
            end_date: self.end_date,
            additional_info: self.additional_info,
            updated_at: self.updated_at,
        }
    }
}
