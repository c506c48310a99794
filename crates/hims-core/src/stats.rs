//! # Aggregate Statistics
//!
//! Dashboard figures computed from a consistent read view of [`Tables`].
//! Every function is pure: the caller supplies the tables and the clock, so
//! month buckets and "last 30 days" windows are deterministic under test.
//!
//! Enumerated breakdowns (`by_relation`, `by_type`, per-status counts)
//! always carry every variant, zero or not, keyed by the wire form.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{PlanType, Relation, RegistrationStatus, SchoolType};
use crate::store::Tables;
use crate::user::{age_on, User};

/// Length of the "recent" window, in days.
pub const RECENT_DAYS: i64 = 30;
/// Number of calendar months in the registration trend.
pub const TREND_MONTHS: u32 = 6;
/// Cap on the top-schools list.
pub const TOP_SCHOOLS: usize = 10;

// -- Admin ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OverviewStats {
    pub total_users: usize,
    pub total_admins: usize,
    pub total_regular_users: usize,
    pub total_persons: usize,
    pub total_registrations: usize,
    pub total_schools: usize,
    pub total_plans: usize,
    pub active_registrations: usize,
    pub pending_registrations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlanCount {
    pub plan_id: Uuid,
    pub plan_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MonthCount {
    /// `YYYY-MM`.
    pub month: String,
    /// English month name and year, e.g. `March 2025`.
    pub month_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegistrationStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub active: usize,
    pub expired: usize,
    pub cancelled: usize,
    /// Every plan, in listing order.
    pub by_plan: Vec<PlanCount>,
    /// The last [`TREND_MONTHS`] calendar months, oldest first.
    pub by_month: Vec<MonthCount>,
    /// Registrations in the last [`RECENT_DAYS`] days.
    pub recent_registrations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PersonStats {
    pub total: usize,
    pub by_relation: BTreeMap<String, usize>,
    /// Persons per user that has at least one, two decimals.
    pub average_per_user: f64,
    /// Buckets `0-10`, `11-20`, `21-30`, `31-40`, `41-50`, `51+`.
    pub age_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StateCount {
    pub state_id: Uuid,
    pub state_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SchoolRank {
    pub school_id: Uuid,
    pub school_name: String,
    pub school_type: SchoolType,
    pub registration_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SchoolStats {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    /// States with at least one school, in state listing order.
    pub by_state: Vec<StateCount>,
    pub top_schools: Vec<SchoolRank>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlanRank {
    pub plan_id: Uuid,
    pub plan_name: String,
    pub plan_type: PlanType,
    pub registration_count: usize,
    pub monthly_premium: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlanStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub by_type: BTreeMap<String, usize>,
    /// Every plan, most registrations first.
    pub popularity: Vec<PlanRank>,
    pub average_premium: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserStats {
    pub total: usize,
    pub admins: usize,
    pub regular: usize,
    pub with_registrations: usize,
    pub without_registrations: usize,
    pub recent_signups: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DashboardStats {
    pub overview: OverviewStats,
    pub registrations: RegistrationStats,
    pub persons: PersonStats,
    pub schools: SchoolStats,
    pub plans: PlanStats,
    pub users: UserStats,
}

pub fn overview(t: &Tables) -> OverviewStats {
    let admins = t.users.values().filter(|u| u.is_admin).count();
    OverviewStats {
        total_users: t.users.len(),
        total_admins: admins,
        total_regular_users: t.users.len() - admins,
        total_persons: t.persons.len(),
        total_registrations: t.registrations.len(),
        total_schools: t.schools.len(),
        total_plans: t.plans.len(),
        active_registrations: count_status(t, None, RegistrationStatus::Active),
        pending_registrations: count_status(t, None, RegistrationStatus::Pending),
    }
}

pub fn registrations(t: &Tables, now: DateTime<Utc>) -> RegistrationStats {
    let per_plan = registrations_per(t, |r| r.plan_id);
    let mut plans: Vec<_> = t.plans.values().collect();
    plans.sort_by(|a, b| (a.plan_type, &a.name_fa, a.id).cmp(&(b.plan_type, &b.name_fa, b.id)));
    let by_plan = plans
        .into_iter()
        .map(|p| PlanCount {
            plan_id: p.id,
            plan_name: p.name_fa.clone(),
            count: per_plan.get(&p.id).copied().unwrap_or(0),
        })
        .collect();

    let by_month = trend_months(now.date_naive())
        .into_iter()
        .map(|first| MonthCount {
            month: first.format("%Y-%m").to_string(),
            month_name: first.format("%B %Y").to_string(),
            count: t
                .registrations
                .values()
                .filter(|r| {
                    let d = r.registration_date.date_naive();
                    (d.year(), d.month()) == (first.year(), first.month())
                })
                .count(),
        })
        .collect();

    let since = now - Duration::days(RECENT_DAYS);
    let status = |s| count_status(t, None, s);
    RegistrationStats {
        total: t.registrations.len(),
        pending: status(RegistrationStatus::Pending),
        approved: status(RegistrationStatus::Approved),
        rejected: status(RegistrationStatus::Rejected),
        active: status(RegistrationStatus::Active),
        expired: status(RegistrationStatus::Expired),
        cancelled: status(RegistrationStatus::Cancelled),
        by_plan,
        by_month,
        recent_registrations: t
            .registrations
            .values()
            .filter(|r| r.registration_date >= since)
            .count(),
    }
}

pub fn persons(t: &Tables, today: NaiveDate) -> PersonStats {
    let mut age_distribution: BTreeMap<String, usize> = ["0-10", "11-20", "21-30", "31-40", "41-50", "51+"]
        .into_iter()
        .map(|k| (k.to_string(), 0))
        .collect();
    for p in t.persons.values() {
        let bucket = match p.age_on(today) {
            0..=10 => "0-10",
            11..=20 => "11-20",
            21..=30 => "21-30",
            31..=40 => "31-40",
            41..=50 => "41-50",
            _ => "51+",
        };
        *age_distribution.entry(bucket.to_string()).or_insert(0) += 1;
    }

    let owners = distinct_count(t.persons.values().map(|p| p.user_id));
    PersonStats {
        total: t.persons.len(),
        by_relation: by_relation(t.persons.values().map(|p| p.relation)),
        average_per_user: ratio(t.persons.len(), owners),
        age_distribution,
    }
}

pub fn schools(t: &Tables) -> SchoolStats {
    let mut by_type: BTreeMap<String, usize> = SchoolType::ALL.iter().map(|s| (s.to_string(), 0)).collect();
    for s in t.schools.values() {
        *by_type.entry(s.school_type.to_string()).or_insert(0) += 1;
    }

    let mut per_state: HashMap<Uuid, usize> = HashMap::new();
    for s in t.schools.values() {
        if let Some(state_id) = state_of_district(t, &s.district_id) {
            *per_state.entry(state_id).or_insert(0) += 1;
        }
    }
    let mut states: Vec<_> = t.states.values().collect();
    states.sort_by(|a, b| (a.order_index, &a.name_fa, a.id).cmp(&(b.order_index, &b.name_fa, b.id)));
    let by_state = states
        .into_iter()
        .filter_map(|s| {
            per_state.get(&s.id).map(|&count| StateCount {
                state_id: s.id,
                state_name: s.name_fa.clone(),
                count,
            })
        })
        .collect();

    let per_school = registrations_per(t, |r| r.school_id);
    let mut top_schools: Vec<SchoolRank> = t
        .schools
        .values()
        .map(|s| SchoolRank {
            school_id: s.id,
            school_name: s.name_fa.clone(),
            school_type: s.school_type,
            registration_count: per_school.get(&s.id).copied().unwrap_or(0),
        })
        .collect();
    top_schools.sort_by(|a, b| {
        b.registration_count
            .cmp(&a.registration_count)
            .then_with(|| a.school_name.cmp(&b.school_name))
            .then_with(|| a.school_id.cmp(&b.school_id))
    });
    top_schools.truncate(TOP_SCHOOLS);

    SchoolStats {
        total: t.schools.len(),
        by_type,
        by_state,
        top_schools,
    }
}

pub fn plans(t: &Tables) -> PlanStats {
    let active = t.plans.values().filter(|p| p.is_active).count();
    let mut by_type: BTreeMap<String, usize> = PlanType::ALL.iter().map(|p| (p.to_string(), 0)).collect();
    for p in t.plans.values() {
        *by_type.entry(p.plan_type.to_string()).or_insert(0) += 1;
    }

    let per_plan = registrations_per(t, |r| r.plan_id);
    let mut popularity: Vec<PlanRank> = t
        .plans
        .values()
        .map(|p| PlanRank {
            plan_id: p.id,
            plan_name: p.name_fa.clone(),
            plan_type: p.plan_type,
            registration_count: per_plan.get(&p.id).copied().unwrap_or(0),
            monthly_premium: p.monthly_premium,
        })
        .collect();
    popularity.sort_by(|a, b| {
        b.registration_count
            .cmp(&a.registration_count)
            .then_with(|| (a.plan_type, &a.plan_name, a.plan_id).cmp(&(b.plan_type, &b.plan_name, b.plan_id)))
    });

    let premium_sum: i64 = t.plans.values().map(|p| p.monthly_premium).sum();
    let average_premium = if t.plans.is_empty() {
        0.0
    } else {
        round2(premium_sum as f64 / t.plans.len() as f64)
    };

    PlanStats {
        total: t.plans.len(),
        active,
        inactive: t.plans.len() - active,
        by_type,
        popularity,
        average_premium,
    }
}

pub fn users(t: &Tables, now: DateTime<Utc>) -> UserStats {
    let admins = t.users.values().filter(|u| u.is_admin).count();
    let with_registrations = distinct_count(t.registrations.values().map(|r| r.user_id));
    let since = now - Duration::days(RECENT_DAYS);
    UserStats {
        total: t.users.len(),
        admins,
        regular: t.users.len() - admins,
        with_registrations,
        without_registrations: t.users.len().saturating_sub(with_registrations),
        recent_signups: t.users.values().filter(|u| u.created_at >= since).count(),
    }
}

/// All admin figures in one object.
pub fn dashboard(t: &Tables, now: DateTime<Utc>) -> DashboardStats {
    DashboardStats {
        overview: overview(t),
        registrations: registrations(t, now),
        persons: persons(t, now.date_naive()),
        schools: schools(t),
        plans: plans(t),
        users: users(t, now),
    }
}

// -- Per user ------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserInfo {
    pub name: String,
    pub email: Option<String>,
    pub national_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserOverviewStats {
    pub total_registrations: usize,
    pub active_registrations: usize,
    pub pending_registrations: usize,
    pub total_persons: usize,
    /// Active plans open for registration.
    pub available_plans: usize,
    pub user_info: UserInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserRegistrationRow {
    pub registration_id: Uuid,
    pub plan_name: String,
    pub status: RegistrationStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserRegistrationStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    /// One row per registration, most recent first.
    pub by_plan: Vec<UserRegistrationRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgeGroups {
    /// 18 and under.
    pub children: usize,
    /// 19 through 60.
    pub adults: usize,
    /// Over 60.
    pub seniors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserPersonStats {
    pub total: usize,
    pub by_relation: BTreeMap<String, usize>,
    pub age_groups: AgeGroups,
}

pub fn user_overview(t: &Tables, user: &User) -> UserOverviewStats {
    let uid = Some(user.id);
    UserOverviewStats {
        total_registrations: t.registrations.values().filter(|r| r.user_id == user.id).count(),
        active_registrations: count_status(t, uid, RegistrationStatus::Active),
        pending_registrations: count_status(t, uid, RegistrationStatus::Pending),
        total_persons: t.persons.values().filter(|p| p.user_id == user.id).count(),
        available_plans: t.plans.values().filter(|p| p.is_active).count(),
        user_info: UserInfo {
            name: user.full_name(),
            email: user.email.clone(),
            national_id: user.national_id.to_string(),
        },
    }
}

pub fn user_registrations(t: &Tables, user_id: Uuid) -> UserRegistrationStats {
    let mut regs: Vec<_> = t.registrations.values().filter(|r| r.user_id == user_id).collect();
    regs.sort_by(|a, b| (b.registration_date, b.id).cmp(&(a.registration_date, a.id)));

    let mut by_status: BTreeMap<String, usize> =
        RegistrationStatus::ALL.iter().map(|s| (s.to_string(), 0)).collect();
    for r in &regs {
        *by_status.entry(r.status.to_string()).or_insert(0) += 1;
    }

    let by_plan = regs
        .iter()
        .map(|r| UserRegistrationRow {
            registration_id: r.id,
            plan_name: t.plans.get(&r.plan_id).map(|p| p.name_fa.clone()).unwrap_or_default(),
            status: r.status,
            start_date: r.start_date,
            end_date: r.end_date,
        })
        .collect();

    UserRegistrationStats {
        total: regs.len(),
        by_status,
        by_plan,
    }
}

pub fn user_persons(t: &Tables, user_id: Uuid, today: NaiveDate) -> UserPersonStats {
    let own: Vec<_> = t.persons.values().filter(|p| p.user_id == user_id).collect();
    let mut age_groups = AgeGroups {
        children: 0,
        adults: 0,
        seniors: 0,
    };
    for p in &own {
        match age_on(p.birth_date, today) {
            0..=18 => age_groups.children += 1,
            19..=60 => age_groups.adults += 1,
            _ => age_groups.seniors += 1,
        }
    }
    UserPersonStats {
        total: own.len(),
        by_relation: by_relation(own.iter().map(|p| p.relation)),
        age_groups,
    }
}

// -- Helpers -------------------------------------------------------------------

fn count_status(t: &Tables, user_id: Option<Uuid>, status: RegistrationStatus) -> usize {
    t.registrations
        .values()
        .filter(|r| r.status == status && user_id.map_or(true, |u| r.user_id == u))
        .count()
}

fn registrations_per(
    t: &Tables,
    key: impl Fn(&crate::insurance::InsuranceRegistration) -> Uuid,
) -> HashMap<Uuid, usize> {
    let mut counts = HashMap::new();
    for r in t.registrations.values() {
        *counts.entry(key(r)).or_insert(0) += 1;
    }
    counts
}

/// Number of distinct ids.
fn distinct_count(ids: impl Iterator<Item = Uuid>) -> usize {
    let mut ids: Vec<Uuid> = ids.collect();
    ids.sort_unstable();
    ids.dedup();
    ids.len()
}

fn by_relation(relations: impl Iterator<Item = Relation>) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = Relation::ALL.iter().map(|r| (r.to_string(), 0)).collect();
    for r in relations {
        *counts.entry(r.to_string()).or_insert(0) += 1;
    }
    counts
}

fn state_of_district(t: &Tables, district_id: &Uuid) -> Option<Uuid> {
    let region = t.districts.get(district_id)?.parent_id;
    let county = t.regions.get(&region)?.parent_id;
    let city = t.counties.get(&county)?.parent_id;
    Some(t.cities.get(&city)?.parent_id)
}

/// First day of each of the last [`TREND_MONTHS`] calendar months ending
/// with the month of `today`, oldest first.
fn trend_months(today: NaiveDate) -> Vec<NaiveDate> {
    let current = today.year() * 12 + today.month0() as i32;
    (0..TREND_MONTHS as i32)
        .rev()
        .filter_map(|back| {
            let idx = current - back;
            NaiveDate::from_ymd_opt(idx.div_euclid(12), idx.rem_euclid(12) as u32 + 1, 1)
        })
        .collect()
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        round2(n as f64 / d as f64)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlanType;
    use crate::store::{fixtures, Database};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn trend_spans_year_boundary() {
        let months = trend_months(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        let labels: Vec<_> = months.iter().map(|d| d.format("%Y-%m").to_string()).collect();
        assert_eq!(labels, ["2024-10", "2024-11", "2024-12", "2025-01", "2025-02", "2025-03"]);
    }

    #[test]
    fn empty_tables_produce_zeroes() {
        let t = Tables::default();
        let d = dashboard(&t, now());
        assert_eq!(d.overview.total_users, 0);
        assert_eq!(d.persons.average_per_user, 0.0);
        assert_eq!(d.plans.average_premium, 0.0);
        assert_eq!(d.persons.by_relation.len(), 5);
        assert_eq!(d.schools.by_type.len(), 4);
        assert_eq!(d.plans.by_type.len(), 3);
        assert_eq!(d.registrations.by_month.len(), 6);
        assert_eq!(d.registrations.by_month[5].month_name, "March 2025");
        assert!(d.schools.by_state.is_empty());
    }

    #[test]
    fn counts_over_a_small_dataset() {
        let db = Database::new();
        let u1 = fixtures::user(&db, "1111111111", None);
        let u2 = fixtures::user(&db, "2222222222", None);
        fixtures::user(&db, "3333333333", None);
        db.update_user(&u1.id, |u| u.is_admin = true).unwrap();
        fixtures::person(&db, u1.id, "5555555555");
        fixtures::person(&db, u1.id, "6666666666");
        fixtures::person(&db, u2.id, "7777777777");

        let a = fixtures::chain(&db, "01");
        let b = fixtures::chain(&db, "02");
        let basic = fixtures::plan(&db, "پایه", PlanType::Basic, 500_000);
        let premium = fixtures::plan(&db, "ویژه", PlanType::Premium, 2_000_001);
        fixtures::registration(&db, u1.id, premium.id, b.school.id);
        let r2 = fixtures::registration(&db, u2.id, premium.id, b.school.id);
        db.update_registration(&r2.id, |r| r.status = RegistrationStatus::Active).unwrap();

        let t = db.snapshot();
        let ov = overview(&t);
        assert_eq!((ov.total_users, ov.total_admins, ov.total_regular_users), (3, 1, 2));
        assert_eq!((ov.active_registrations, ov.pending_registrations), (1, 1));

        let p = persons(&t, Utc::now().date_naive());
        assert_eq!(p.average_per_user, 1.5);
        assert_eq!(p.by_relation["child"], 3);

        let s = schools(&t);
        assert_eq!(s.top_schools[0].school_id, b.school.id);
        assert_eq!(s.top_schools[0].registration_count, 2);
        assert_eq!(s.top_schools[1].school_id, a.school.id);
        assert_eq!(s.by_state.len(), 2);
        assert_eq!(s.by_type["high"], 2);

        let pl = plans(&t);
        assert_eq!(pl.popularity[0].plan_id, premium.id);
        assert_eq!(pl.popularity[1].plan_id, basic.id);
        assert_eq!(pl.average_premium, 1_250_000.5);

        let us = users(&t, Utc::now());
        assert_eq!((us.with_registrations, us.without_registrations, us.recent_signups), (2, 1, 3));

        let regs = registrations(&t, Utc::now());
        assert_eq!(regs.recent_registrations, 2);
        assert_eq!(regs.by_month.last().unwrap().count, 2);
        assert_eq!(regs.by_plan.len(), 2);
    }

    #[test]
    fn user_scoped_figures() {
        let db = Database::new();
        let user = fixtures::user(&db, "1111111111", Some("u@example.com"));
        let other = fixtures::user(&db, "2222222222", None);
        fixtures::person(&db, user.id, "5555555555");
        fixtures::person(&db, other.id, "6666666666");
        let chain = fixtures::chain(&db, "01");
        let plan = fixtures::plan(&db, "پایه", PlanType::Basic, 500_000);
        let reg = fixtures::registration(&db, user.id, plan.id, chain.school.id);

        let t = db.snapshot();
        let ov = user_overview(&t, &user);
        assert_eq!(ov.total_registrations, 1);
        assert_eq!(ov.total_persons, 1);
        assert_eq!(ov.available_plans, 1);
        assert_eq!(ov.user_info.name, "Test User");
        assert_eq!(ov.user_info.national_id, "1111111111");

        let r = user_registrations(&t, user.id);
        assert_eq!(r.by_status["pending"], 1);
        assert_eq!(r.by_plan[0].registration_id, reg.id);
        assert_eq!(r.by_plan[0].plan_name, "پایه");

        // Fixture persons are born 2010-05-01.
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let p = user_persons(&t, user.id, today);
        assert_eq!(p.total, 1);
        assert_eq!(p.age_groups.children, 1);
    }

    #[test]
    fn age_buckets_use_calendar_years() {
        let db = Database::new();
        let user = fixtures::user(&db, "1111111111", None);
        fixtures::person(&db, user.id, "5555555555");
        let t = db.snapshot();
        // Born 2010-05-01, so the person turns 11 on 2021-05-01.
        let p = persons(&t, NaiveDate::from_ymd_opt(2021, 4, 30).unwrap());
        assert_eq!(p.age_distribution["0-10"], 1);
        let p = persons(&t, NaiveDate::from_ymd_opt(2021, 5, 1).unwrap());
        assert_eq!(p.age_distribution["11-20"], 1);
    }
}
