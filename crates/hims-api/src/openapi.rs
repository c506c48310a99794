//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI 3.1 spec,
//! served at `/openapi.json`.
//!
//! The admin city/county/region/district endpoints are generic over the
//! level and are not listed here; their shapes mirror the public
//! location responses plus `created_at`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "HIMS API: Health Insurance Management",
        version = "1.0.0",
        description = "Self-service enrolment of school staff and their dependents in health insurance plans, with document uploads, administration and statistics.",
        license(name = "BUSL-1.1")
    ),
    paths(
        // Auth
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::me,
        // Users
        crate::routes::users::get_profile,
        crate::routes::users::update_profile,
        // Persons
        crate::routes::persons::list_persons,
        crate::routes::persons::create_person,
        crate::routes::persons::get_person,
        crate::routes::persons::update_person,
        crate::routes::persons::delete_person,
        // Locations
        crate::routes::locations::list_states,
        crate::routes::locations::list_cities,
        crate::routes::locations::list_counties,
        crate::routes::locations::list_regions,
        crate::routes::locations::list_districts,
        crate::routes::locations::list_schools,
        // Insurance
        crate::routes::insurance::list_plans,
        crate::routes::insurance::get_plan,
        crate::routes::insurance::register,
        crate::routes::insurance::list_registrations,
        crate::routes::insurance::get_registration,
        // Documents
        crate::routes::documents::upload,
        crate::routes::documents::list_documents,
        crate::routes::documents::get_document,
        crate::routes::documents::download_document,
        crate::routes::documents::delete_document,
        crate::routes::documents::admin_list_documents,
        crate::routes::documents::verify_document,
        crate::routes::documents::unverify_document,
        crate::routes::documents::admin_delete_document,
        crate::routes::documents::admin_download_document,
        // Statistics
        crate::routes::statistics::admin_overview,
        crate::routes::statistics::admin_registrations,
        crate::routes::statistics::admin_persons,
        crate::routes::statistics::admin_schools,
        crate::routes::statistics::admin_plans,
        crate::routes::statistics::admin_users,
        crate::routes::statistics::admin_dashboard,
        crate::routes::statistics::user_overview,
        crate::routes::statistics::user_registrations,
        crate::routes::statistics::user_persons,
        // Admin: accounts and registrations
        crate::routes::admin::list_users,
        crate::routes::admin::set_password,
        crate::routes::admin::reset_password,
        crate::routes::admin::update_status,
        crate::routes::admin::delete_user,
        crate::routes::admin::list_persons,
        crate::routes::admin::delete_person,
        crate::routes::admin::list_registrations,
        crate::routes::admin::get_registration,
        crate::routes::admin::update_registration_status,
        crate::routes::admin::delete_registration,
        // Admin: catalogue
        crate::routes::admin_insurance::list_plans,
        crate::routes::admin_insurance::create_plan,
        crate::routes::admin_insurance::update_plan,
        crate::routes::admin_insurance::deactivate_plan,
        crate::routes::admin_insurance::list_coverages,
        crate::routes::admin_insurance::create_coverage,
        crate::routes::admin_insurance::update_coverage,
        crate::routes::admin_insurance::delete_coverage,
        // Admin: locations
        crate::routes::admin_locations::list_states,
        crate::routes::admin_locations::create_state,
        crate::routes::admin_locations::update_state,
        crate::routes::admin_locations::delete_state,
        crate::routes::admin_locations::list_schools,
        crate::routes::admin_locations::create_school,
        crate::routes::admin_locations::update_school,
        crate::routes::admin_locations::delete_school,
    ),
    components(schemas(
        // Error types
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::MessageResponse,
        crate::middleware::metrics::MetricsSnapshot,
        // Choices
        hims_core::Relation,
        hims_core::SchoolType,
        hims_core::PlanType,
        hims_core::CoverageType,
        hims_core::RegistrationStatus,
        hims_core::DocumentType,
        // Auth DTOs
        crate::auth::TokenPair,
        crate::routes::auth::RegisterRequest,
        crate::routes::auth::LoginRequest,
        crate::routes::auth::RefreshRequest,
        crate::routes::auth::MeResponse,
        // User DTOs
        crate::routes::users::ProfileResponse,
        crate::routes::users::UpdateProfileRequest,
        // Person DTOs
        crate::routes::persons::PersonResponse,
        crate::routes::persons::CreatePersonRequest,
        crate::routes::persons::UpdatePersonRequest,
        // Location DTOs
        crate::routes::locations::StateResponse,
        crate::routes::locations::CityResponse,
        crate::routes::locations::CountyResponse,
        crate::routes::locations::RegionResponse,
        crate::routes::locations::DistrictResponse,
        crate::routes::locations::SchoolResponse,
        // Insurance DTOs
        crate::routes::insurance::PlanResponse,
        crate::routes::insurance::CoverageResponse,
        crate::routes::insurance::RegisterInsuranceRequest,
        crate::routes::insurance::RegistrationResponse,
        // Document DTOs
        crate::routes::documents::DocumentResponse,
        crate::routes::documents::DocumentList,
        crate::routes::documents::AdminDocumentResponse,
        crate::routes::documents::AdminDocumentList,
        crate::routes::documents::UploadForm,
        // Statistics
        hims_core::stats::OverviewStats,
        hims_core::stats::PlanCount,
        hims_core::stats::MonthCount,
        hims_core::stats::RegistrationStats,
        hims_core::stats::PersonStats,
        hims_core::stats::StateCount,
        hims_core::stats::SchoolRank,
        hims_core::stats::SchoolStats,
        hims_core::stats::PlanRank,
        hims_core::stats::PlanStats,
        hims_core::stats::UserStats,
        hims_core::stats::DashboardStats,
        hims_core::stats::UserInfo,
        hims_core::stats::UserOverviewStats,
        hims_core::stats::UserRegistrationRow,
        hims_core::stats::UserRegistrationStats,
        hims_core::stats::AgeGroups,
        hims_core::stats::UserPersonStats,
        // Admin DTOs
        crate::routes::admin::SetPasswordRequest,
        crate::routes::admin::ResetPasswordResponse,
        crate::routes::admin::UpdateUserStatusRequest,
        crate::routes::admin::AdminPersonResponse,
        crate::routes::admin::AdminRegistrationResponse,
        crate::routes::admin::AdminRegistrationDetail,
        crate::routes::admin::UpdateRegistrationStatusRequest,
        crate::routes::admin_insurance::AdminPlanResponse,
        crate::routes::admin_insurance::AdminCoverageResponse,
        crate::routes::admin_insurance::CreatePlanRequest,
        crate::routes::admin_insurance::UpdatePlanRequest,
        crate::routes::admin_insurance::CreateCoverageRequest,
        crate::routes::admin_insurance::UpdateCoverageRequest,
        crate::routes::admin_locations::AdminStateResponse,
        crate::routes::admin_locations::CreateStateRequest,
        crate::routes::admin_locations::UpdateStateRequest,
        crate::routes::admin_locations::AdminSchoolResponse,
        crate::routes::admin_locations::CreateSchoolRequest,
        crate::routes::admin_locations::UpdateSchoolRequest,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "users", description = "The caller's profile"),
        (name = "persons", description = "The caller's dependents"),
        (name = "locations", description = "State → school hierarchy (public)"),
        (name = "insurance", description = "Plan catalogue and enrolment"),
        (name = "documents", description = "Uploads, downloads and verification"),
        (name = "statistics", description = "Admin dashboards and per-user summaries"),
        (name = "admin", description = "Administration"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT security scheme.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
