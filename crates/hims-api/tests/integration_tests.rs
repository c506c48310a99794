//! # Integration Tests for hims-api
//!
//! Drive the assembled router end to end with `tower::ServiceExt::oneshot`.
//! Every test runs against a fresh in-memory [`AppState`]; uploads land in a
//! per-test temporary media root.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use hims_api::state::{AppConfig, AppState};
use hims_core::insurance::{NewCoverage, NewPlan};
use hims_core::location::{CityTier, CountyTier, DistrictTier, NewDivision, NewSchool, NewState, RegionTier};
use hims_core::user::NewUser;
use hims_core::document::MAX_FILE_SIZE;
use hims_core::{CoverageType, NationalId, PlanType, SchoolType, User};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const PASSWORD: &str = "password123";

/// One Argon2 hash shared by every directly inserted account.
fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hims_core::password::hash_password(PASSWORD).unwrap())
}

struct TestApp {
    state: AppState,
    router: Router,
    _media: tempfile::TempDir,
}

fn test_app() -> TestApp {
    test_app_with(|_| {})
}

fn test_app_with(tweak: impl FnOnce(&mut AppConfig)) -> TestApp {
    let media = tempfile::tempdir().unwrap();
    let mut config = AppConfig {
        media_root: media.path().to_path_buf(),
        ..AppConfig::default()
    };
    tweak(&mut config);
    let state = AppState::new(config);
    TestApp {
        router: hims_api::app(state.clone()),
        state,
        _media: media,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request("GET", uri, token, Body::empty())).await
    }

    async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request("DELETE", uri, token, Body::empty())).await
    }

    async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = request(method, uri, token, Body::from(body.to_string()));
        req.headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        self.send(req).await
    }

    /// Insert an account directly and mint an access token for it.
    fn account(&self, national_id: &str, is_admin: bool) -> (User, String) {
        let user = self
            .state
            .db
            .insert_user(NewUser {
                national_id: NationalId::new(national_id).unwrap(),
                first_name: "کاربر".into(),
                last_name: "آزمایشی".into(),
                email: None,
                phone: None,
                password_hash: password_hash().to_string(),
                is_staff: is_admin,
                is_admin,
            })
            .unwrap();
        let token = self.state.tokens.issue_pair(&user).unwrap().access_token;
        (user, token)
    }

    /// A state → school chain and an active plan with one coverage line.
    fn catalogue(&self) -> Catalogue {
        let db = &self.state.db;
        let state = db
            .insert_state(NewState {
                name_fa: "تهران".into(),
                code: "THR".into(),
                order_index: 1,
            })
            .unwrap();
        let city = db
            .insert_division::<CityTier>(NewDivision {
                parent_id: state.id,
                name_fa: "تهران".into(),
                code: "THR-01".into(),
            })
            .unwrap();
        let county = db
            .insert_division::<CountyTier>(NewDivision {
                parent_id: city.id,
                name_fa: "شمیرانات".into(),
                code: "SHM".into(),
            })
            .unwrap();
        let region = db
            .insert_division::<RegionTier>(NewDivision {
                parent_id: county.id,
                name_fa: "منطقه یک".into(),
                code: "R1".into(),
            })
            .unwrap();
        let district = db
            .insert_division::<DistrictTier>(NewDivision {
                parent_id: region.id,
                name_fa: "ناحیه یک".into(),
                code: "D1".into(),
            })
            .unwrap();
        let school = db
            .insert_school(NewSchool {
                district_id: district.id,
                name_fa: "دبستان نمونه".into(),
                code: "SCH-001".into(),
                school_type: SchoolType::Elementary,
                address: None,
                phone: None,
            })
            .unwrap();
        let plan = db
            .insert_plan(NewPlan {
                name_fa: "طرح پایه".into(),
                plan_type: PlanType::Basic,
                description_fa: "پوشش پایه".into(),
                monthly_premium: 500_000,
            })
            .unwrap();
        db.insert_coverage(NewCoverage {
            plan_id: plan.id,
            coverage_type: CoverageType::Outpatient,
            title_fa: "درمان سرپایی".into(),
            description_fa: String::new(),
            coverage_amount: 10_000_000,
            coverage_percentage: 70,
            max_usage_count: Some(12),
        })
        .unwrap();
        Catalogue {
            state: state.id,
            city: city.id,
            school: school.id,
            plan: plan.id,
        }
    }

    async fn add_person(&self, token: &str, national_code: &str) -> Uuid {
        let (status, body) = self
            .json(
                "POST",
                "/api/v1/persons",
                Some(token),
                json!({
                    "first_name": "مریم",
                    "last_name": "احمدی",
                    "national_code": national_code,
                    "birth_date": "2015-03-21",
                    "relation": "child",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    async fn enrol(&self, token: &str, cat: &Catalogue, person_ids: &[Uuid]) -> (StatusCode, Value) {
        self.json(
            "POST",
            "/api/v1/insurance/register",
            Some(token),
            json!({ "plan_id": cat.plan, "school_id": cat.school, "person_ids": person_ids }),
        )
        .await
    }
}

struct Catalogue {
    state: Uuid,
    city: Uuid,
    school: Uuid,
    plan: Uuid,
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(body).unwrap()
}

const BOUNDARY: &str = "hims-test-boundary";

/// `multipart/form-data` body with text fields and one file part.
fn multipart_body(fields: &[(&str, &str)], file_name: &str, file: &[u8]) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn upload_request(token: &str, fields: &[(&str, &str)], file_name: &str, file: &[u8]) -> Request<Body> {
    let mut req = request("POST", "/api/v1/documents/upload", Some(token), multipart_body(fields, file_name, file));
    req.headers_mut().insert(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}").parse().unwrap(),
    );
    req
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_register_login_and_me() {
    let app = test_app();
    let (status, body) = app
        .json(
            "POST",
            "/api/v1/auth/register",
            None,
            json!({
                "national_id": "0012345678",
                "first_name": "علی",
                "last_name": "رضایی",
                "email": "ali@example.com",
                "password": PASSWORD,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["token_type"], "bearer");

    let (status, body) = app
        .json(
            "POST",
            "/api/v1/auth/login",
            None,
            json!({ "national_id": "0012345678", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access_token"].as_str().unwrap().to_string();

    let (status, me) = app.get("/api/v1/auth/me", Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["national_id"], "0012345678");
    assert_eq!(me["is_admin"], false);
}

#[tokio::test]
async fn test_register_rejects_duplicate_national_id() {
    let app = test_app();
    app.account("0012345678", false);
    let (status, body) = app
        .json(
            "POST",
            "/api/v1/auth/register",
            None,
            json!({
                "national_id": "0012345678",
                "first_name": "علی",
                "last_name": "رضایی",
                "password": PASSWORD,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let app = test_app();
    app.account("0012345678", false);
    let (status, _) = app
        .json(
            "POST",
            "/api/v1/auth/login",
            None,
            json!({ "national_id": "0012345678", "password": "not-the-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_for_unknown_account_is_unauthorized() {
    let app = test_app();
    let (status, body) = app
        .json(
            "POST",
            "/api/v1/auth/login",
            None,
            json!({ "national_id": "0099999999", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_refresh_requires_a_refresh_token() {
    let app = test_app();
    let (user, access) = app.account("0012345678", false);
    let pair = app.state.tokens.issue_pair(&user).unwrap();

    let (status, _) = app
        .json("POST", "/api/v1/auth/refresh", None, json!({ "refresh_token": access }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .json(
            "POST",
            "/api/v1/auth/refresh",
            None,
            json!({ "refresh_token": pair.refresh_token }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());

    // A refresh token is not an access token either.
    let (status, _) = app.get("/api/v1/auth/me", Some(&pair.refresh_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deactivated_account_is_forbidden() {
    let app = test_app();
    let (user, token) = app.account("0012345678", false);
    app.state
        .db
        .update_user(&user.id, |u| u.is_active = false)
        .unwrap();
    let (status, _) = app.get("/api/v1/users/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = test_app();
    let mut req = request("POST", "/api/v1/auth/login", None, Body::from("{not json"));
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// -- Profile & Persons --------------------------------------------------------

#[tokio::test]
async fn test_profile_update() {
    let app = test_app();
    let (_, token) = app.account("0012345678", false);
    let (status, body) = app
        .json(
            "PUT",
            "/api/v1/users/profile",
            Some(&token),
            json!({ "phone": "09121234567" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["phone"], "09121234567");
}

#[tokio::test]
async fn test_profile_email_taken_by_another_account_conflicts() {
    let app = test_app();
    let (_, alice) = app.account("0012345678", false);
    let (_, bob) = app.account("0087654321", false);
    let (status, _) = app
        .json("PUT", "/api/v1/users/profile", Some(&alice), json!({ "email": "shared@example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .json("PUT", "/api/v1/users/profile", Some(&bob), json!({ "email": "shared@example.com" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    let (_, me) = app.get("/api/v1/users/profile", Some(&bob)).await;
    assert!(me["email"].is_null());
}

#[tokio::test]
async fn test_persons_are_scoped_to_their_owner() {
    let app = test_app();
    let (_, alice) = app.account("0012345678", false);
    let (_, bob) = app.account("0087654321", false);
    let person = app.add_person(&alice, "1234567890").await;

    let (status, list) = app.get("/api/v1/persons", Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let uri = format!("/api/v1/persons/{person}");
    let (status, _) = app.get(&uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .json("PUT", &uri, Some(&alice), json!({ "first_name": "زهرا" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "زهرا");

    let (status, _) = app.delete(&uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, list) = app.get("/api/v1/persons", Some(&alice)).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_person_with_future_birth_date_is_rejected() {
    let app = test_app();
    let (_, token) = app.account("0012345678", false);
    let (status, _) = app
        .json(
            "POST",
            "/api/v1/persons",
            Some(&token),
            json!({
                "first_name": "مریم",
                "last_name": "احمدی",
                "national_code": "1234567890",
                "birth_date": "2999-01-01",
                "relation": "child",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Locations ----------------------------------------------------------------

#[tokio::test]
async fn test_location_lists_require_their_parent() {
    let app = test_app();
    let cat = app.catalogue();

    let (status, _) = app.get("/api/v1/locations/cities", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, cities) = app
        .get(&format!("/api/v1/locations/cities?state_id={}", cat.state), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cities[0]["id"], cat.city.to_string());

    let (status, states) = app.get("/api/v1/locations/states", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(states.as_array().unwrap().len(), 1);
}

// -- Insurance ----------------------------------------------------------------

#[tokio::test]
async fn test_plan_catalogue_lists_active_plans_with_coverages() {
    let app = test_app();
    let cat = app.catalogue();
    let (status, plans) = app.get("/api/v1/insurance/plans", None).await;
    assert_eq!(status, StatusCode::OK);
    let plans = plans.as_array().unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0]["plan_type_display"], "پایه");
    assert_eq!(plans[0]["coverages"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .get(&format!("/api/v1/insurance/plans/{}", Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&format!("/api/v1/insurance/plans/{}", cat.plan), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_insurance_registration_flow() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, token) = app.account("0012345678", false);
    let person = app.add_person(&token, "1234567890").await;

    let (status, reg) = app.enrol(&token, &cat, &[person]).await;
    assert_eq!(status, StatusCode::CREATED, "{reg}");
    assert_eq!(reg["status"], "pending");
    assert_eq!(reg["person_ids"][0], person.to_string());

    // A second open registration is refused.
    let (status, body) = app.enrol(&token, &cat, &[]).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, list) = app.get("/api/v1/insurance/registrations", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (_, other) = app.account("0087654321", false);
    let uri = format!("/api/v1/insurance/registrations/{}", reg["id"].as_str().unwrap());
    let (status, _) = app.get(&uri, Some(&other)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registration_cannot_cover_someone_elses_dependent() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, alice) = app.account("0012345678", false);
    let (_, bob) = app.account("0087654321", false);
    let person = app.add_person(&alice, "1234567890").await;

    let (status, _) = app.enrol(&bob, &cat, &[person]).await;
    assert!(status.is_client_error());
    assert_ne!(status, StatusCode::CREATED);
}

// -- Administration -----------------------------------------------------------

#[tokio::test]
async fn test_admin_routes_reject_regular_users() {
    let app = test_app();
    let (_, token) = app.account("0012345678", false);
    let (status, _) = app.get("/api/v1/admin/users", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/admin/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/api/v1/statistics/admin/overview", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_cannot_deactivate_themselves() {
    let app = test_app();
    let (admin, token) = app.account("0000000001", true);
    let (status, _) = app
        .json(
            "PUT",
            &format!("/api/v1/admin/users/{}/status", admin.id),
            Some(&token),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .delete(&format!("/api/v1/admin/users/{}", admin.id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_deactivates_another_account() {
    let app = test_app();
    let (_, admin) = app.account("0000000001", true);
    let (user, user_token) = app.account("0012345678", false);
    let (status, body) = app
        .json(
            "PUT",
            &format!("/api/v1/admin/users/{}/status", user.id),
            Some(&admin),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, _) = app.get("/api/v1/auth/me", Some(&user_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_reset_password_returns_temporary_password() {
    let app = test_app();
    let (_, admin) = app.account("0000000001", true);
    let (user, _) = app.account("0012345678", false);
    let (status, body) = app
        .json(
            "POST",
            &format!("/api/v1/admin/users/{}/reset-password", user.id),
            Some(&admin),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let temporary = body["temporary_password"].as_str().unwrap();
    assert_eq!(temporary.chars().count(), 12);

    let (status, _) = app
        .json(
            "POST",
            "/api/v1/auth/login",
            None,
            json!({ "national_id": "0012345678", "password": temporary }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_reviews_a_registration() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, admin) = app.account("0000000001", true);
    let (_, token) = app.account("0012345678", false);
    let (_, reg) = app.enrol(&token, &cat, &[]).await;
    let id = reg["id"].as_str().unwrap();

    let (status, list) = app
        .get("/api/v1/admin/registrations?status=pending", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list[0]["school_name"], "دبستان نمونه");

    let uri = format!("/api/v1/admin/registrations/{id}/status");
    let (status, _) = app
        .json(
            "PUT",
            &uri,
            Some(&admin),
            json!({ "status": "active", "start_date": "2026-02-01", "end_date": "2026-01-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app
        .json(
            "PUT",
            &uri,
            Some(&admin),
            json!({ "status": "active", "start_date": "2026-01-01", "end_date": "2026-12-31" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "active");

    let (status, detail) = app
        .get(&format!("/api/v1/admin/registrations/{id}"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["user_national_id"], "0012345678");
    assert_eq!(
        detail["start_date"].as_str().unwrap().parse::<NaiveDate>().unwrap(),
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    );
}

#[tokio::test]
async fn test_admin_user_list_filters() {
    let app = test_app();
    let (_, admin) = app.account("0000000001", true);
    let (user, _) = app.account("0012345678", false);
    app.account("0087654321", false);
    app.state.db.update_user(&user.id, |u| u.is_active = false).unwrap();

    let (status, admins) = app.get("/api/v1/admin/users?is_admin=true", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(admins.as_array().unwrap().len(), 1);
    assert_eq!(admins[0]["national_id"], "0000000001");

    let (_, inactive) = app.get("/api/v1/admin/users?is_active=false", Some(&admin)).await;
    assert_eq!(inactive.as_array().unwrap().len(), 1);
    assert_eq!(inactive[0]["national_id"], "0012345678");

    let (_, found) = app
        .get("/api/v1/admin/users?is_staff=false&search=00876", Some(&admin))
        .await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["national_id"], "0087654321");

    let (status, _) = app.get("/api/v1/admin/users?is_admin=maybe", Some(&admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_registration_list_filters() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, admin) = app.account("0000000001", true);
    let (_, token) = app.account("0012345678", false);
    let person = app.add_person(&token, "1234567890").await;
    let (status, _) = app.enrol(&token, &cat, &[person]).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, by_plan) = app
        .get(&format!("/api/v1/admin/registrations?plan_id={}", cat.plan), Some(&admin))
        .await;
    assert_eq!(by_plan.as_array().unwrap().len(), 1);
    let (_, other_plan) = app
        .get(&format!("/api/v1/admin/registrations?plan_id={}", Uuid::new_v4()), Some(&admin))
        .await;
    assert!(other_plan.as_array().unwrap().is_empty());

    let (_, by_owner) = app
        .get("/api/v1/admin/registrations?search=0012345678", Some(&admin))
        .await;
    assert_eq!(by_owner.as_array().unwrap().len(), 1);
    let (_, nobody) = app
        .get("/api/v1/admin/registrations?search=0087654321", Some(&admin))
        .await;
    assert!(nobody.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_school_and_coverage_filters() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, admin) = app.account("0000000001", true);

    let (status, schools) = app
        .get(
            &format!("/api/v1/admin/schools?state_id={}&school_type=elementary", cat.state),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(schools.as_array().unwrap().len(), 1);
    let (_, schools) = app
        .get(&format!("/api/v1/admin/schools?state_id={}&school_type=high", cat.state), Some(&admin))
        .await;
    assert!(schools.as_array().unwrap().is_empty());
    let (_, schools) = app
        .get(&format!("/api/v1/admin/schools?state_id={}", Uuid::new_v4()), Some(&admin))
        .await;
    assert!(schools.as_array().unwrap().is_empty());

    let (_, coverages) = app
        .get("/api/v1/admin/coverages?coverage_type=outpatient", Some(&admin))
        .await;
    assert_eq!(coverages.as_array().unwrap().len(), 1);
    let (_, coverages) = app
        .get("/api/v1/admin/coverages?coverage_type=dental", Some(&admin))
        .await;
    assert!(coverages.as_array().unwrap().is_empty());
    let (status, _) = app
        .get("/api/v1/admin/coverages?coverage_type=cosmetic", Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_school_with_registrations_cannot_be_deleted() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, admin) = app.account("0000000001", true);
    let (_, token) = app.account("0012345678", false);
    let (status, _) = app.enrol(&token, &cat, &[]).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .delete(&format!("/api/v1/admin/schools/{}", cat.school), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["details"]["referrer"], "insurance registrations");
    assert_eq!(body["error"]["details"]["count"], 1);

    let (status, _) = app
        .delete(&format!("/api/v1/admin/states/{}", cat.state), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unreferenced_state_delete_cascades() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, admin) = app.account("0000000001", true);
    let (status, _) = app
        .delete(&format!("/api/v1/admin/states/{}", cat.state), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, schools) = app.get("/api/v1/admin/schools", Some(&admin)).await;
    assert!(schools.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_division_endpoints_accept_level_parent_names() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, admin) = app.account("0000000001", true);
    let (status, body) = app
        .json(
            "POST",
            "/api/v1/admin/cities",
            Some(&admin),
            json!({ "state_id": cat.state, "name_fa": "ری", "code": "THR-02" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["state_id"], cat.state.to_string());

    let (status, cities) = app
        .get(&format!("/api/v1/admin/cities?state_id={}", cat.state), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cities.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_deactivated_plan_leaves_the_public_catalogue() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, admin) = app.account("0000000001", true);
    let (status, _) = app
        .delete(&format!("/api/v1/admin/plans/{}", cat.plan), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, plans) = app.get("/api/v1/insurance/plans", None).await;
    assert!(plans.as_array().unwrap().is_empty());
    let (_, all) = app.get("/api/v1/admin/plans", Some(&admin)).await;
    assert_eq!(all[0]["is_active"], false);

    let (_, token) = app.account("0012345678", false);
    let (status, _) = app.enrol(&token, &cat, &[]).await;
    assert!(status.is_client_error());
}

// -- Documents ----------------------------------------------------------------

#[tokio::test]
async fn test_document_upload_download_and_delete() {
    let app = test_app();
    let (_, token) = app.account("0012345678", false);
    let contents = b"%PDF-1.4 test document";

    let (status, doc) = app
        .send(upload_request(
            &token,
            &[("document_type", "national_id"), ("title", "کارت ملی")],
            "کارت.pdf",
            contents,
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{doc}");
    assert_eq!(doc["file_size"], contents.len());
    assert_eq!(doc["is_verified"], false);
    let id = doc["id"].as_str().unwrap().to_string();

    let (_, list) = app.get("/api/v1/documents", Some(&token)).await;
    assert_eq!(list["total"], 1);

    let response = app
        .router
        .clone()
        .oneshot(request("GET", &format!("/api/v1/documents/{id}/download"), Some(&token), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("filename*=UTF-8''"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], contents);

    let (_, other) = app.account("0087654321", false);
    let (status, _) = app.get(&format!("/api/v1/documents/{id}"), Some(&other)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&format!("/api/v1/documents/{id}"), Some(&token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, list) = app.get("/api/v1/documents", Some(&token)).await;
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn test_upload_rejects_disallowed_extension() {
    let app = test_app();
    let (_, token) = app.account("0012345678", false);
    let (status, body) = app
        .send(upload_request(
            &token,
            &[("document_type", "other"), ("title", "script")],
            "payload.exe",
            b"MZ",
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn test_admin_verifies_a_document() {
    let app = test_app();
    let (_, admin) = app.account("0000000001", true);
    let (_, token) = app.account("0012345678", false);
    let (_, doc) = app
        .send(upload_request(
            &token,
            &[("document_type", "birth_certificate"), ("title", "شناسنامه")],
            "scan.pdf",
            b"%PDF",
        ))
        .await;
    let id = doc["id"].as_str().unwrap();

    let verify = format!("/api/v1/documents/{id}/verify");
    let (status, _) = app.json("PATCH", &verify, Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.json("PATCH", &verify, Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["is_verified"], true);

    let (_, all) = app
        .get("/api/v1/documents/admin/all?is_verified=true", Some(&admin))
        .await;
    assert_eq!(all["total"], 1);
    assert_eq!(all["documents"][0]["user_name"], "کاربر آزمایشی");

    let (status, body) = app
        .json("PATCH", &format!("/api/v1/documents/{id}/unverify"), Some(&admin), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_verified"], false);
}

#[tokio::test]
async fn test_upload_over_ten_mebibytes_is_payload_too_large() {
    let app = test_app();
    let (_, token) = app.account("0012345678", false);
    let fields = [("document_type", "other"), ("title", "large scan")];

    // Within the body limit, refused by the file size check.
    let just_over = vec![0u8; MAX_FILE_SIZE as usize + 1];
    let (status, body) = app.send(upload_request(&token, &fields, "scan.pdf", &just_over)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{body}");
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");

    // Past the body limit, cut off while the multipart stream is read.
    let far_over = vec![0u8; MAX_FILE_SIZE as usize + 2 * 1024 * 1024];
    let (status, body) = app.send(upload_request(&token, &fields, "scan.pdf", &far_over)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{body}");

    assert!(app.state.db.snapshot().documents.values().next().is_none());
}

#[tokio::test]
async fn test_upload_cannot_attach_to_someone_elses_records() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, alice) = app.account("0012345678", false);
    let (_, bob) = app.account("0087654321", false);
    let person = app.add_person(&alice, "1234567890").await;
    let (_, registration) = app.enrol(&alice, &cat, &[person]).await;
    let registration = registration["id"].as_str().unwrap().to_string();
    let person = person.to_string();

    for field in [("registration_id", registration.as_str()), ("person_id", person.as_str())] {
        let (status, body) = app
            .send(upload_request(
                &bob,
                &[("document_type", "other"), ("title", "scan"), field],
                "scan.pdf",
                b"%PDF",
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}: {body}", field.0);
    }
    assert!(app.state.db.snapshot().documents.values().next().is_none());

    let (status, _) = app
        .send(upload_request(
            &alice,
            &[("document_type", "other"), ("title", "scan"), ("person_id", person.as_str())],
            "scan.pdf",
            b"%PDF",
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_admin_deletes_any_document() {
    let app = test_app();
    let (_, admin) = app.account("0000000001", true);
    let (_, token) = app.account("0012345678", false);
    let (_, doc) = app
        .send(upload_request(&token, &[("document_type", "other"), ("title", "scan")], "scan.pdf", b"%PDF"))
        .await;
    let id: Uuid = doc["id"].as_str().unwrap().parse().unwrap();
    let stored = app.state.files.root().join(app.state.db.get_document(&id).unwrap().file_path);
    assert!(stored.exists());

    let uri = format!("/api/v1/documents/admin/{id}");
    let (status, _) = app.delete(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.state.db.get_document(&id).is_none());
    assert!(!stored.exists());

    let (status, _) = app.delete(&uri, Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_user_delete_removes_documents_and_files() {
    let app = test_app();
    let (_, admin) = app.account("0000000001", true);
    let (user, token) = app.account("0012345678", false);
    let mut stored = Vec::new();
    for title in ["first", "second"] {
        let (status, doc) = app
            .send(upload_request(&token, &[("document_type", "other"), ("title", title)], "scan.pdf", b"%PDF"))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id: Uuid = doc["id"].as_str().unwrap().parse().unwrap();
        stored.push((id, app.state.files.root().join(app.state.db.get_document(&id).unwrap().file_path)));
    }
    assert!(stored.iter().all(|(_, path)| path.exists()));

    let (status, _) = app
        .delete(&format!("/api/v1/admin/users/{}", user.id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.state.db.get_user(&user.id).is_none());
    for (id, path) in &stored {
        assert!(app.state.db.get_document(id).is_none());
        assert!(!path.exists(), "{} left behind", path.display());
    }
}

// -- Statistics ---------------------------------------------------------------

#[tokio::test]
async fn test_statistics_reflect_the_tables() {
    let app = test_app();
    let cat = app.catalogue();
    let (_, admin) = app.account("0000000001", true);
    let (_, token) = app.account("0012345678", false);
    let person = app.add_person(&token, "1234567890").await;
    app.enrol(&token, &cat, &[person]).await;

    let (status, overview) = app.get("/api/v1/statistics/admin/overview", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["total_users"], 2);
    assert_eq!(overview["total_persons"], 1);
    assert_eq!(overview["total_registrations"], 1);

    let (status, _) = app.get("/api/v1/statistics/admin/dashboard", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, mine) = app.get("/api/v1/statistics/user/overview", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["total_persons"], 1);
}

// -- Rate limiting ------------------------------------------------------------

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let app = test_app_with(|c| c.rate_limit_per_minute = 2);
    for _ in 0..2 {
        let (status, _) = app.get("/api/v1/locations/states", None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app.get("/api/v1/locations/states", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    // Service probes sit outside the limiter.
    let (status, _) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

// -- OpenAPI ------------------------------------------------------------------

#[tokio::test]
async fn test_openapi_lists_document_upload() {
    let app = test_app();
    let (status, spec) = app.get("/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(spec["paths"]["/api/v1/documents/upload"]["post"].is_object());
    assert!(spec["components"]["securitySchemes"]["bearer"].is_object());
}
