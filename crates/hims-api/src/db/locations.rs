//! Location hierarchy persistence operations.
//!
//! The four intermediate levels share one generic implementation: the table
//! name comes from [`DivisionTable::TABLE`] and the parent column from
//! [`Tier::PARENT`](hims_core::Tier::PARENT).

use chrono::{DateTime, Utc};
use hims_core::store::DivisionTable;
use hims_core::{Division, School, SchoolType, State};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::choice;

pub async fn upsert_state(conn: &mut PgConnection, state: &State) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO states (id, name_fa, code, order_index, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (id) DO UPDATE SET
             name_fa = EXCLUDED.name_fa, code = EXCLUDED.code,
             order_index = EXCLUDED.order_index, updated_at = EXCLUDED.updated_at
         WHERE states.updated_at <= EXCLUDED.updated_at",
    )
    .bind(state.id)
    .bind(&state.name_fa)
    .bind(&state.code)
    .bind(state.order_index)
    .bind(state.created_at)
    .bind(state.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

fn parent_column<T: DivisionTable>() -> String {
    format!("{}_id", T::PARENT)
}

pub async fn upsert_division<T: DivisionTable>(conn: &mut PgConnection, row: &Division<T>) -> Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT INTO {table} (id, {parent}, name_fa, code, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (id) DO UPDATE SET
             {parent} = EXCLUDED.{parent}, name_fa = EXCLUDED.name_fa,
             code = EXCLUDED.code, updated_at = EXCLUDED.updated_at
         WHERE {table}.updated_at <= EXCLUDED.updated_at",
        table = T::TABLE,
        parent = parent_column::<T>(),
    );
    sqlx::query(&sql)
        .bind(row.id)
        .bind(row.parent_id)
        .bind(&row.name_fa)
        .bind(&row.code)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn upsert_school(conn: &mut PgConnection, school: &School) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO schools (id, district_id, name_fa, code, school_type, address, phone,
                              created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET
             district_id = EXCLUDED.district_id, name_fa = EXCLUDED.name_fa,
             code = EXCLUDED.code, school_type = EXCLUDED.school_type,
             address = EXCLUDED.address, phone = EXCLUDED.phone,
             updated_at = EXCLUDED.updated_at
         WHERE schools.updated_at <= EXCLUDED.updated_at",
    )
    .bind(school.id)
    .bind(school.district_id)
    .bind(&school.name_fa)
    .bind(&school.code)
    .bind(school.school_type.as_str())
    .bind(&school.address)
    .bind(&school.phone)
    .bind(school.created_at)
    .bind(school.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn load_states(pool: &PgPool) -> Result<Vec<State>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StateRow>(
        "SELECT id, name_fa, code, order_index, created_at, updated_at FROM states ORDER BY order_index",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| State {
            id: r.id,
            name_fa: r.name_fa,
            code: r.code,
            order_index: r.order_index,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
        .collect())
}

pub async fn load_divisions<T: DivisionTable>(pool: &PgPool) -> Result<Vec<Division<T>>, sqlx::Error> {
    let sql = format!(
        "SELECT id, {parent} AS parent_id, name_fa, code, created_at, updated_at FROM {table}",
        table = T::TABLE,
        parent = parent_column::<T>(),
    );
    let rows = sqlx::query_as::<_, DivisionRow>(&sql).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|r| Division::from_parts(r.id, r.parent_id, r.name_fa, r.code, r.created_at, r.updated_at))
        .collect())
}

pub async fn load_schools(pool: &PgPool) -> Result<Vec<School>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SchoolRow>(
        "SELECT id, district_id, name_fa, code, school_type, address, phone, created_at, updated_at
         FROM schools",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SchoolRow::into_record).collect())
}

/// Internal row types for SQLx mapping.
#[derive(sqlx::FromRow)]
struct StateRow {
    id: Uuid,
    name_fa: String,
    code: String,
    order_index: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct DivisionRow {
    id: Uuid,
    parent_id: Uuid,
    name_fa: String,
    code: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SchoolRow {
    id: Uuid,
    district_id: Uuid,
    name_fa: String,
    code: String,
    school_type: String,
    address: Option<String>,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SchoolRow {
    fn into_record(self) -> School {
        School {
            id: self.id,
            district_id: self.district_id,
            school_type: choice("schools", self.id, &self.school_type, SchoolType::Combined),
            name_fa: self.name_fa,
            code: self.code,
            address: self.address,
            phone: self.phone,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hims_core::location::{CityTier, DistrictTier};

    #[test]
    fn parent_columns_follow_the_hierarchy() {
        assert_eq!(parent_column::<CityTier>(), "state_id");
        assert_eq!(parent_column::<DistrictTier>(), "region_id");
    }

    #[test]
    fn unknown_school_type_falls_back_to_combined() {
        let now = Utc::now();
        let school = SchoolRow {
            id: Uuid::new_v4(),
            district_id: Uuid::new_v4(),
            name_fa: "دبیرستان البرز".into(),
            code: "SCH1".into(),
            school_type: "university".into(),
            address: None,
            phone: None,
            created_at: now,
            updated_at: now,
        }
        .into_record();
        assert_eq!(school.school_type, SchoolType::Combined);
    }
}
