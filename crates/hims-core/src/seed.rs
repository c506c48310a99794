//! # Reference and Sample Data
//!
//! [`seed`] installs the data a fresh deployment needs: the bootstrap
//! administrator, the ten provinces, a Tehran/Isfahan location hierarchy
//! with schools, and the three insurance plans with their coverage lines.
//! With [`SeedOptions::sample`] it also adds demo users, their dependents
//! and registrations spread over the last six months.
//!
//! Seeding is idempotent. Rows are matched on their natural keys (national
//! id, code, plan name) and existing rows are left untouched, so running it
//! twice creates nothing the second time.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{CoverageType, PlanType, Relation, RegistrationStatus, SchoolType};
use crate::error::HimsError;
use crate::identity::NationalId;
use crate::insurance::{InsurancePlan, NewCoverage, NewPlan, NewRegistration};
use crate::location::{
    CityTier, CountyTier, Division, DistrictTier, NewDivision, NewSchool, NewState, RegionTier, School, State,
};
use crate::password::hash_password;
use crate::store::{Database, DivisionTable};
use crate::user::{NewPerson, NewUser, User};

/// National id of the bootstrap administrator.
pub const ADMIN_NATIONAL_ID: &str = "0000000000";
/// Email of the bootstrap administrator.
pub const ADMIN_EMAIL: &str = "admin@example.com";
/// Initial password of the bootstrap administrator. Change it after the
/// first login.
pub const ADMIN_PASSWORD: &str = "admin123";
/// Password shared by every sample user.
pub const SAMPLE_PASSWORD: &str = "user1234";
/// Number of sample users created with [`SeedOptions::sample`].
pub const SAMPLE_USERS: usize = 20;

const STATES: &[(&str, &str, i32)] = &[
    ("تهران", "01", 1),
    ("اصفهان", "02", 2),
    ("فارس", "03", 3),
    ("خراسان رضوی", "04", 4),
    ("آذربایجان شرقی", "05", 5),
    ("خوزستان", "06", 6),
    ("مازندران", "07", 7),
    ("گیلان", "08", 8),
    ("کرمان", "09", 9),
    ("آذربایجان غربی", "10", 10),
];

const TEHRAN_COUNTIES: &[(&str, &str)] = &[
    ("شهرستان تهران", "010101"),
    ("شهرستان ری", "010102"),
    ("شهرستان شمیرانات", "010103"),
];

/// Per-district school templates: name prefix, code suffix, type, address.
const TEHRAN_SCHOOLS: &[(&str, &str, SchoolType, &str)] = &[
    ("دبستان شهید بهشتی", "01", SchoolType::Elementary, "خیابان ولیعصر، پلاک 123"),
    ("دبستان دخترانه فاطمیه", "02", SchoolType::Elementary, "خیابان انقلاب، پلاک 456"),
    ("دبیرستان علامه حلی", "03", SchoolType::High, "میدان ونک، پلاک 789"),
    ("دبیرستان فرزانگان", "04", SchoolType::High, "خیابان آزادی، پلاک 321"),
    ("مدرسه راهنمایی امام خمینی", "05", SchoolType::Middle, "میدان تجریش، پلاک 654"),
];

const ISFAHAN_SCHOOLS: &[(&str, &str, SchoolType, &str)] = &[
    ("دبستان شهید چمران", "SCH0201", SchoolType::Elementary, "خیابان چهارباغ، اصفهان"),
    ("دبیرستان حافظ", "SCH0202", SchoolType::High, "میدان نقش جهان، اصفهان"),
    ("مدرسه راهنمایی سعدی", "SCH0203", SchoolType::Middle, "خیابان سی و سه پل، اصفهان"),
];

type CoverageRow = (CoverageType, &'static str, &'static str, i64, i32, Option<i32>);

struct PlanSeed {
    name_fa: &'static str,
    plan_type: PlanType,
    description_fa: &'static str,
    monthly_premium: i64,
    coverages: &'static [CoverageRow],
}

const OUTPATIENT: (&str, &str) = ("درمان سرپایی", "پوشش هزینه‌های ویزیت و درمان سرپایی");
const HOSPITAL: (&str, &str) = ("بستری", "پوشش هزینه‌های بستری در بیمارستان");
const MEDICATION: (&str, &str) = ("دارو", "پوشش هزینه‌های دارویی");
const LAB: (&str, &str) = ("آزمایش", "پوشش هزینه‌های آزمایشگاهی");
const IMAGING: (&str, &str) = ("تصویربرداری", "پوشش هزینه‌های تصویربرداری پزشکی");
const DENTAL: (&str, &str) = ("دندانپزشکی", "پوشش هزینه‌های دندانپزشکی");
const EYE: (&str, &str) = ("چشم‌پزشکی", "پوشش هزینه‌های چشم‌پزشکی");
const PHYSIO: (&str, &str) = ("فیزیوتراپی", "پوشش هزینه‌های فیزیوتراپی");

const PLANS: &[PlanSeed] = &[
    PlanSeed {
        name_fa: "بیمه پایه",
        plan_type: PlanType::Basic,
        description_fa: "بیمه تکمیلی پایه برای کارکنان آموزش و پرورش با پوشش‌های اساسی",
        monthly_premium: 500_000,
        coverages: &[
            (CoverageType::Outpatient, OUTPATIENT.0, OUTPATIENT.1, 5_000_000, 70, Some(10)),
            (CoverageType::Hospitalization, HOSPITAL.0, HOSPITAL.1, 50_000_000, 90, None),
            (CoverageType::Medication, MEDICATION.0, MEDICATION.1, 3_000_000, 80, None),
            (CoverageType::Laboratory, LAB.0, LAB.1, 2_000_000, 75, None),
        ],
    },
    PlanSeed {
        name_fa: "بیمه استاندارد",
        plan_type: PlanType::Standard,
        description_fa: "بیمه تکمیلی استاندارد با پوشش بیشتر و خدمات گسترده‌تر",
        monthly_premium: 800_000,
        coverages: &[
            (CoverageType::Outpatient, OUTPATIENT.0, OUTPATIENT.1, 8_000_000, 80, Some(15)),
            (CoverageType::Hospitalization, HOSPITAL.0, HOSPITAL.1, 80_000_000, 95, None),
            (CoverageType::Medication, MEDICATION.0, MEDICATION.1, 5_000_000, 85, None),
            (CoverageType::Laboratory, LAB.0, LAB.1, 3_000_000, 80, None),
            (CoverageType::Imaging, IMAGING.0, IMAGING.1, 4_000_000, 75, None),
            (CoverageType::Dental, DENTAL.0, DENTAL.1, 3_000_000, 70, Some(5)),
        ],
    },
    PlanSeed {
        name_fa: "بیمه ویژه",
        plan_type: PlanType::Premium,
        description_fa: "بیمه تکمیلی ویژه با بالاترین پوشش و خدمات کامل",
        monthly_premium: 1_200_000,
        coverages: &[
            (CoverageType::Outpatient, OUTPATIENT.0, OUTPATIENT.1, 12_000_000, 90, Some(20)),
            (CoverageType::Hospitalization, HOSPITAL.0, HOSPITAL.1, 100_000_000, 100, None),
            (CoverageType::Medication, MEDICATION.0, MEDICATION.1, 8_000_000, 90, None),
            (CoverageType::Laboratory, LAB.0, LAB.1, 5_000_000, 85, None),
            (CoverageType::Imaging, IMAGING.0, IMAGING.1, 6_000_000, 85, None),
            (CoverageType::Dental, DENTAL.0, DENTAL.1, 5_000_000, 80, Some(10)),
            (CoverageType::Ophthalmology, EYE.0, EYE.1, 4_000_000, 75, Some(5)),
            (CoverageType::Physiotherapy, PHYSIO.0, PHYSIO.1, 3_000_000, 70, Some(10)),
        ],
    },
];

const FIRST_NAMES: &[&str] = &[
    "علی", "فاطمه", "محمد", "زهرا", "حسین", "مریم", "رضا", "زینب", "مهدی", "سارا",
];
const LAST_NAMES: &[&str] = &[
    "احمدی", "محمدی", "حسینی", "رضایی", "موسوی", "کریمی", "جعفری", "صادقی", "رحیمی", "کاظمی",
];

/// What to seed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedOptions {
    /// Also create demo users, dependents and registrations.
    pub sample: bool,
}

/// Rows created per table. Tables where nothing was created are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub created: BTreeMap<&'static str, usize>,
}

impl SeedReport {
    fn bump(&mut self, table: &'static str) {
        *self.created.entry(table).or_insert(0) += 1;
    }

    /// Rows created in `table`.
    pub fn count(&self, table: &str) -> usize {
        self.created.get(table).copied().unwrap_or(0)
    }

    /// Total rows created.
    pub fn total(&self) -> usize {
        self.created.values().sum()
    }
}

/// Install reference data (and optionally sample data) into `db`.
pub fn seed(db: &Database, options: SeedOptions) -> Result<SeedReport, HimsError> {
    let mut report = SeedReport::default();
    seed_admin(db, &mut report)?;
    seed_states(db, &mut report)?;
    let schools = seed_locations(db, &mut report)?;
    let plans = seed_plans(db, &mut report)?;
    if options.sample {
        seed_sample(db, &schools, &plans, &mut report)?;
    }
    tracing::info!(created = report.total(), sample = options.sample, "seed complete");
    Ok(report)
}

fn national_id(raw: &str) -> Result<NationalId, HimsError> {
    Ok(NationalId::new(raw)?)
}

fn seed_admin(db: &Database, report: &mut SeedReport) -> Result<User, HimsError> {
    let id = national_id(ADMIN_NATIONAL_ID)?;
    if let Some(existing) = db.find_user_by_national_id(&id) {
        return Ok(existing);
    }
    let user = db.insert_user(NewUser {
        national_id: id,
        first_name: "مدیر".into(),
        last_name: "سیستم".into(),
        email: Some(ADMIN_EMAIL.into()),
        phone: None,
        password_hash: hash_password(ADMIN_PASSWORD)?,
        is_staff: true,
        is_admin: true,
    })?;
    report.bump("users");
    Ok(user)
}

fn state(db: &Database, name: &str, code: &str, order: i32, report: &mut SeedReport) -> Result<State, HimsError> {
    if let Some(existing) = db.list_states().into_iter().find(|s| s.code == code) {
        return Ok(existing);
    }
    let state = db.insert_state(NewState {
        name_fa: name.into(),
        code: code.into(),
        order_index: order,
    })?;
    report.bump("states");
    Ok(state)
}

fn seed_states(db: &Database, report: &mut SeedReport) -> Result<(), HimsError> {
    for (name, code, order) in STATES {
        state(db, name, code, *order, report)?;
    }
    Ok(())
}

fn division<T: DivisionTable>(
    db: &Database,
    parent_id: Uuid,
    name: &str,
    code: &str,
    report: &mut SeedReport,
) -> Result<Division<T>, HimsError> {
    if let Some(existing) = db
        .list_divisions::<T>(Some(parent_id))
        .into_iter()
        .find(|d| d.code == code)
    {
        return Ok(existing);
    }
    let row = db.insert_division::<T>(NewDivision {
        parent_id,
        name_fa: name.into(),
        code: code.into(),
    })?;
    report.bump(T::TABLE);
    Ok(row)
}

fn school(
    db: &Database,
    district_id: Uuid,
    (name, code, school_type, address): (&str, &str, SchoolType, &str),
    phone: &str,
    report: &mut SeedReport,
) -> Result<School, HimsError> {
    if let Some(existing) = db.list_schools(None).into_iter().find(|s| s.code == code) {
        return Ok(existing);
    }
    let row = db.insert_school(NewSchool {
        district_id,
        name_fa: name.into(),
        code: code.into(),
        school_type,
        address: Some(address.into()),
        phone: Some(phone.into()),
    })?;
    report.bump("schools");
    Ok(row)
}

/// Tehran and Isfahan hierarchies. Returns every seeded school.
fn seed_locations(db: &Database, report: &mut SeedReport) -> Result<Vec<School>, HimsError> {
    let mut schools = Vec::new();

    let tehran = state(db, "تهران", "01", 1, report)?;
    let city = division::<CityTier>(db, tehran.id, "تهران", "0101", report)?;
    for (county_name, county_code) in TEHRAN_COUNTIES {
        let county = division::<CountyTier>(db, city.id, county_name, county_code, report)?;
        let short = &county_code[county_code.len() - 2..];
        for r in 1..=2 {
            let region_code = format!("{county_code}{r:02}");
            let region = division::<RegionTier>(db, county.id, &format!("منطقه {r}"), &region_code, report)?;
            for d in 1..=2 {
                let district_code = format!("{region_code}{d:02}");
                let district =
                    division::<DistrictTier>(db, region.id, &format!("ناحیه {d}"), &district_code, report)?;
                for (prefix, suffix, school_type, address) in TEHRAN_SCHOOLS {
                    let name = format!("{prefix} {r}-{d}");
                    let code = format!("SCH{short}{r}{d}{suffix}");
                    schools.push(school(
                        db,
                        district.id,
                        (&name, &code, *school_type, *address),
                        "02112345678",
                        report,
                    )?);
                }
            }
        }
    }

    let isfahan = state(db, "اصفهان", "02", 2, report)?;
    let city = division::<CityTier>(db, isfahan.id, "اصفهان", "0201", report)?;
    let county = division::<CountyTier>(db, city.id, "شهرستان اصفهان", "020101", report)?;
    let region = division::<RegionTier>(db, county.id, "منطقه 1", "02010101", report)?;
    let district = division::<DistrictTier>(db, region.id, "ناحیه 1", "0201010101", report)?;
    for (name, code, school_type, address) in ISFAHAN_SCHOOLS {
        schools.push(school(
            db,
            district.id,
            (*name, *code, *school_type, *address),
            "03132345678",
            report,
        )?);
    }
    Ok(schools)
}

/// The three standard plans. Coverage lines are only added to plans
/// created by this run.
fn seed_plans(db: &Database, report: &mut SeedReport) -> Result<Vec<InsurancePlan>, HimsError> {
    let mut plans = Vec::with_capacity(PLANS.len());
    for template in PLANS {
        if let Some(existing) = db.list_plans(false).into_iter().find(|p| p.name_fa == template.name_fa) {
            plans.push(existing);
            continue;
        }
        let plan = db.insert_plan(NewPlan {
            name_fa: template.name_fa.into(),
            plan_type: template.plan_type,
            description_fa: template.description_fa.into(),
            monthly_premium: template.monthly_premium,
        })?;
        report.bump("plans");
        for (coverage_type, title, description, amount, percentage, max_usage) in template.coverages {
            db.insert_coverage(NewCoverage {
                plan_id: plan.id,
                coverage_type: *coverage_type,
                title_fa: (*title).into(),
                description_fa: (*description).into(),
                coverage_amount: *amount,
                coverage_percentage: *percentage,
                max_usage_count: *max_usage,
            })?;
            report.bump("coverages");
        }
        plans.push(plan);
    }
    Ok(plans)
}

/// Deterministic demo data: user `i` gets `1 + i % 3` dependents, and two
/// out of three users get one registration, backdated up to six months.
fn seed_sample(
    db: &Database,
    schools: &[School],
    plans: &[InsurancePlan],
    report: &mut SeedReport,
) -> Result<(), HimsError> {
    const RELATIONS: [Relation; 5] = [
        Relation::Spouse,
        Relation::Child,
        Relation::Parent,
        Relation::Sibling,
        Relation::Other,
    ];
    const STATUSES: [RegistrationStatus; 5] = [
        RegistrationStatus::Pending,
        RegistrationStatus::Approved,
        RegistrationStatus::Rejected,
        RegistrationStatus::Active,
        RegistrationStatus::Expired,
    ];

    if schools.is_empty() || plans.is_empty() {
        return Ok(());
    }
    let password_hash = hash_password(SAMPLE_PASSWORD)?;
    let now = Utc::now();

    for i in 0..SAMPLE_USERS {
        let id = national_id(&format!("91{i:08}"))?;
        if db.find_user_by_national_id(&id).is_some() {
            continue;
        }
        let user = db.insert_user(NewUser {
            national_id: id,
            first_name: FIRST_NAMES[i % FIRST_NAMES.len()].into(),
            last_name: LAST_NAMES[(i * 7) % LAST_NAMES.len()].into(),
            email: Some(format!("user{i}@example.com")),
            phone: Some(format!("0912{:07}", 1_000_000 + i * 4_321)),
            password_hash: password_hash.clone(),
            is_staff: false,
            is_admin: false,
        })?;
        report.bump("users");

        let mut person_ids = Vec::new();
        for k in 0..=(i % 3) {
            let relation = RELATIONS[(i + k) % RELATIONS.len()];
            let birth_year = match relation {
                Relation::Spouse => 1975 + (i % 15) as i32,
                Relation::Child => 2006 + ((i + k) % 12) as i32,
                Relation::Parent => 1950 + (i % 20) as i32,
                Relation::Sibling | Relation::Other => 1978 + ((i + k) % 20) as i32,
            };
            let birth_date = NaiveDate::from_ymd_opt(birth_year, (i % 12) as u32 + 1, (k % 28) as u32 + 1)
                .unwrap_or(NaiveDate::MIN);
            let person = db.insert_person(NewPerson {
                user_id: user.id,
                first_name: FIRST_NAMES[(i + k + 1) % FIRST_NAMES.len()].into(),
                last_name: user.last_name.clone(),
                national_code: national_id(&format!("92{i:04}{k:04}"))?,
                birth_date,
                relation,
            })?;
            report.bump("persons");
            person_ids.push(person.id);
        }

        if i % 3 == 2 {
            continue;
        }
        let status = STATUSES[i % STATUSES.len()];
        person_ids.truncate(i % 4);
        let reg = db.insert_registration(NewRegistration {
            user_id: user.id,
            plan_id: plans[i % plans.len()].id,
            school_id: schools[(i * 5) % schools.len()].id,
            person_ids,
            additional_info: serde_json::json!({ "source": "sample" }),
        })?;
        report.bump("registrations");

        let registered = now - Duration::days(1 + (i as i64 * 37) % 180);
        let start = registered.date_naive() + Duration::days(1 + (i as i64 % 30));
        let end = matches!(status, RegistrationStatus::Active | RegistrationStatus::Expired)
            .then(|| start + Duration::days(365));
        db.update_registration(&reg.id, |r| {
            r.status = status;
            r.start_date = Some(start);
            r.end_date = end;
        })?;
        db.write(|t| {
            if let Some(row) = t.registrations.values_mut().find(|r| r.id == reg.id) {
                row.registration_date = registered;
            }
        });
    }
    Ok(())
}
