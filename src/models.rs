use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::ApiError;

// --- Role & impact constants ---

// Access tiers are numeric and inverted: a LOWER number means MORE privilege.
// Every privilege check in the API compares against these thresholds.
pub const ROLE_ADMIN: i32 = 1;
pub const ROLE_MANAGER: i32 = 2;
pub const ROLE_USER: i32 = 3;

// The five discrete severity levels a risk's impact may take.
pub const IMPACT_INSIGNIFICANT: f64 = 0.05;
pub const IMPACT_SMALL: f64 = 0.1;
pub const IMPACT_MEDIUM: f64 = 0.2;
pub const IMPACT_BIG: f64 = 0.4;
pub const IMPACT_EXTRAORDINARY: f64 = 0.8;

/// Lower bound (inclusive) of the valid project date range.
pub fn date_min() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

/// Upper bound (exclusive) of the valid project date range.
pub fn date_max() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 1, 1).unwrap()
}

/// Parses a project's start/end strings with the configured format and checks
/// the date invariants: both dates inside `[date_min, date_max)` and start
/// strictly before end.
pub fn validate_project_dates(start: &str, end: &str, format: &str) -> Result<(), ApiError> {
    let start = NaiveDate::parse_from_str(start, format).map_err(|_| ApiError::BadDateFormat)?;
    let end = NaiveDate::parse_from_str(end, format).map_err(|_| ApiError::BadDateFormat)?;

    let (min, max) = (date_min(), date_max());
    if start < min || start >= max || end < min || end >= max {
        return Err(ApiError::DateOutOfRange);
    }
    if start >= end {
        return Err(ApiError::StartDateAfterEnd);
    }
    Ok(())
}

/// Risk dates only have to parse; they are not constrained to the project
/// date range.
pub fn validate_risk_dates(start: &str, end: &str, format: &str) -> Result<(), ApiError> {
    NaiveDate::parse_from_str(start, format).map_err(|_| ApiError::BadDateFormat)?;
    NaiveDate::parse_from_str(end, format).map_err(|_| ApiError::BadDateFormat)?;
    Ok(())
}

// --- Database rows ---

// Row structs map 1:1 onto tables and are internal to the repository and
// handlers; responses are shaped through the *Response structs below so the
// password and the soft-delete marker never leak into JSON.

/// A user account. `password` is an opaque string compared by equality;
/// clients submit values already hashed on their side.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: i32,
    pub skills: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A project. Start/end are kept as formatted date strings; the format lives
/// in the configuration and is validated at the API boundary.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[sqlx(rename = "start_date")]
    pub start: String,
    #[sqlx(rename = "end_date")]
    pub end: String,
    pub is_finished: bool,
    // Plain integer reference to the managing user; not a database relation.
    pub manager_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A risk owned by one user and shared across projects. The countermeasure
/// fields are embedded inline; the join-table association to the standalone
/// CounterMeasure entity is the deprecated older form.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Risk {
    pub id: i64,
    pub value: f64,
    pub cost: i32,
    pub probability: f64,
    pub risk: f64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub threat: String,
    pub status: String,
    pub trigger: String,
    pub impact: f64,
    #[sqlx(rename = "start_date")]
    pub start: String,
    #[sqlx(rename = "end_date")]
    pub end: String,
    pub user_id: i64,
    pub counter_measure_used: bool,
    pub counter_measure_cost: i32,
    pub counter_measure_desc: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A standalone countermeasure (deprecated subsystem, still served).
#[derive(Debug, Clone, FromRow, Default)]
pub struct CounterMeasure {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub cost: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// --- Response shapes ---

/// UserResponse
///
/// JSON shape of a user. The password is never part of it. Association lists
/// are only populated on the detail endpoint.
#[derive(Debug, Clone, Serialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase")]
pub struct UserResponse {
    #[serde(rename = "ID")]
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: i32,
    pub skills: String,
    pub status: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<ProjectResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<RiskResponse>>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        UserResponse {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            skills: u.skills,
            status: u.status,
            created_at: u.created_at,
            updated_at: u.updated_at,
            projects: None,
            risks: None,
        }
    }
}

/// ProjectResponse
///
/// JSON shape of a project; `users` and `risks` are only filled on the detail
/// endpoint, with team members' passwords stripped.
#[derive(Debug, Clone, Serialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectResponse {
    #[serde(rename = "ID")]
    pub id: i64,
    pub name: String,
    pub description: String,
    pub start: String,
    pub end: String,
    pub is_finished: bool,
    #[serde(rename = "ManagerID")]
    pub manager_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<RiskResponse>>,
}

impl From<Project> for ProjectResponse {
    fn from(p: Project) -> Self {
        ProjectResponse {
            id: p.id,
            name: p.name,
            description: p.description,
            start: p.start,
            end: p.end,
            is_finished: p.is_finished,
            manager_id: p.manager_id,
            created_at: p.created_at,
            updated_at: p.updated_at,
            users: None,
            risks: None,
        }
    }
}

/// RiskResponse
///
/// JSON shape of a risk. Associations are carried as plain id lists on the
/// detail endpoint.
#[derive(Debug, Clone, Serialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase")]
pub struct RiskResponse {
    #[serde(rename = "ID")]
    pub id: i64,
    pub value: f64,
    pub cost: i32,
    pub probability: f64,
    pub risk: f64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub threat: String,
    pub status: String,
    pub trigger: String,
    pub impact: f64,
    pub start: String,
    pub end: String,
    #[serde(rename = "UserID")]
    pub user_id: i64,
    pub counter_measure_used: bool,
    pub counter_measure_cost: i32,
    pub counter_measure_desc: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_measures: Option<Vec<i64>>,
}

impl From<Risk> for RiskResponse {
    fn from(r: Risk) -> Self {
        RiskResponse {
            id: r.id,
            value: r.value,
            cost: r.cost,
            probability: r.probability,
            risk: r.risk,
            name: r.name,
            description: r.description,
            category: r.category,
            threat: r.threat,
            status: r.status,
            trigger: r.trigger,
            impact: r.impact,
            start: r.start,
            end: r.end,
            user_id: r.user_id,
            counter_measure_used: r.counter_measure_used,
            counter_measure_cost: r.counter_measure_cost,
            counter_measure_desc: r.counter_measure_desc,
            created_at: r.created_at,
            updated_at: r.updated_at,
            projects: None,
            counter_measures: None,
        }
    }
}

/// CounterMeasureResponse
#[derive(Debug, Clone, Serialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase")]
pub struct CounterMeasureResponse {
    #[serde(rename = "ID")]
    pub id: i64,
    pub name: String,
    pub description: String,
    pub cost: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risks: Option<Vec<i64>>,
}

impl From<CounterMeasure> for CounterMeasureResponse {
    fn from(cm: CounterMeasure) -> Self {
        CounterMeasureResponse {
            id: cm.id,
            name: cm.name,
            description: cm.description,
            cost: cm.cost,
            created_at: cm.created_at,
            updated_at: cm.updated_at,
            risks: None,
        }
    }
}

/// LoginResponse
///
/// Returned on a successful `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase")]
pub struct LoginResponse {
    #[serde(rename = "ID")]
    pub id: i64,
    pub token: String,
    pub name: String,
    pub role: i32,
}

// --- Request payloads ---

// Request structs use `#[serde(default)]` so a missing field binds to its
// zero value and is then caught by the validator, mirroring the
// bind-then-validate flow of the API contract.

/// Credentials submitted to `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Payload for `POST /users` (admin only).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateUserRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(range(min = 1, max = 3))]
    pub role: i32,
    pub skills: String,
    pub status: String,
}

/// Partial payload for `PUT /users/{id}`. Absent fields keep their stored
/// values (overlay-update semantics).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase", default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(range(min = 1, max = 3))]
    pub role: Option<i32>,
    pub skills: Option<String>,
    pub status: Option<String>,
}

/// Payload for `POST /users/{id}/changepassword`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase", default)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    #[validate(length(min = 1))]
    pub new_password: String,
}

/// Payload for `POST /projects` and `PUT /projects/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProjectRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub description: String,
    #[validate(length(min = 1))]
    pub start: String,
    #[validate(length(min = 1))]
    pub end: String,
    #[serde(rename = "ManagerID")]
    #[validate(range(min = 1))]
    pub manager_id: i64,
}

/// Payload for `POST /risks` and `PUT /risks/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase", default)]
pub struct RiskRequest {
    pub value: f64,
    pub cost: i32,
    pub probability: f64,
    pub risk: f64,
    #[validate(length(min = 1))]
    pub name: String,
    pub description: String,
    pub category: String,
    pub threat: String,
    pub status: String,
    pub trigger: String,
    pub impact: f64,
    #[validate(length(min = 1))]
    pub start: String,
    #[validate(length(min = 1))]
    pub end: String,
    #[serde(rename = "UserID")]
    pub user_id: i64,
    pub counter_measure_used: bool,
    pub counter_measure_cost: i32,
    pub counter_measure_desc: String,
}

/// Payload for `POST /cms` and `PUT /cms/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "PascalCase", default)]
pub struct CounterMeasureRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub description: String,
    pub cost: i32,
}

/// A set of entity ids, used by every bulk assign/unassign endpoint and the
/// batch risk lookup.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema, Default)]
#[ts(export)]
#[serde(default)]
pub struct IdsRequest {
    #[serde(rename = "IDs")]
    pub ids: Vec<i64>,
}

// --- List filters ---

// Query-parameter filters for the list endpoints: the collapsed form of the
// per-field lookup methods. Equality only; absent parameters do not restrict.

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserFilter {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<i32>,
    pub skills: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProjectFilter {
    pub name: Option<String>,
    pub is_finished: Option<bool>,
    #[serde(rename = "ManagerID")]
    pub manager_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct RiskFilter {
    pub name: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "UserID")]
    pub user_id: Option<i64>,
}

// --- Update patches (repository layer) ---

// Overlay patches applied with COALESCE: a `None` field never clears the
// stored value. Built by the handlers, consumed by the repository.

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<i32>,
    pub skills: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub is_finished: Option<bool>,
    pub manager_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct RiskPatch {
    pub value: Option<f64>,
    pub cost: Option<i32>,
    pub probability: Option<f64>,
    pub risk: Option<f64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub threat: Option<String>,
    pub status: Option<String>,
    pub trigger: Option<String>,
    pub impact: Option<f64>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub user_id: Option<i64>,
    pub counter_measure_used: Option<bool>,
    pub counter_measure_cost: Option<i32>,
    pub counter_measure_desc: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CounterMeasurePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cost: Option<i32>,
}

impl From<&ProjectRequest> for ProjectPatch {
    fn from(req: &ProjectRequest) -> Self {
        ProjectPatch {
            name: Some(req.name.clone()),
            description: Some(req.description.clone()),
            start: Some(req.start.clone()),
            end: Some(req.end.clone()),
            // The request carries no finished flag; the stored value stays.
            is_finished: None,
            manager_id: Some(req.manager_id),
        }
    }
}

impl From<&RiskRequest> for RiskPatch {
    fn from(req: &RiskRequest) -> Self {
        RiskPatch {
            value: Some(req.value),
            cost: Some(req.cost),
            probability: Some(req.probability),
            risk: Some(req.risk),
            name: Some(req.name.clone()),
            description: Some(req.description.clone()),
            category: Some(req.category.clone()),
            threat: Some(req.threat.clone()),
            status: Some(req.status.clone()),
            trigger: Some(req.trigger.clone()),
            impact: Some(req.impact),
            start: Some(req.start.clone()),
            end: Some(req.end.clone()),
            user_id: Some(req.user_id),
            counter_measure_used: Some(req.counter_measure_used),
            counter_measure_cost: Some(req.counter_measure_cost),
            counter_measure_desc: Some(req.counter_measure_desc.clone()),
        }
    }
}

impl From<&CounterMeasureRequest> for CounterMeasurePatch {
    fn from(req: &CounterMeasureRequest) -> Self {
        CounterMeasurePatch {
            name: Some(req.name.clone()),
            description: Some(req.description.clone()),
            cost: Some(req.cost),
        }
    }
}
