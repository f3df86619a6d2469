use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, require_admin_or_owner},
    error::ApiError,
    handlers::parse_path_id,
    models::{
        IdsRequest, ROLE_ADMIN, Risk, RiskFilter, RiskPatch, RiskRequest, RiskResponse,
        validate_risk_dates,
    },
};

/// Loads a risk and enforces the shared mutation rule: admin always, every
/// lower tier only on risks they own.
async fn owned_risk(auth: &AuthUser, state: &AppState, raw_id: &str) -> Result<Risk, ApiError> {
    let id = parse_path_id(raw_id)?;

    let risk = state
        .repo
        .get_risk(id)
        .await?
        .ok_or(ApiError::NotFound("risk"))?;
    require_admin_or_owner(auth, risk.user_id)?;
    Ok(risk)
}

/// create_risk
///
/// Anyone may record a risk they own; only an admin may record one for
/// another user.
#[utoipa::path(
    post,
    path = "/risks",
    request_body = RiskRequest,
    responses((status = 200, description = "Created", body = RiskResponse))
)]
pub async fn create_risk(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<RiskRequest>,
) -> Result<Json<RiskResponse>, ApiError> {
    payload.validate()?;
    validate_risk_dates(&payload.start, &payload.end, &state.config.date_format)?;

    if auth.role > ROLE_ADMIN && payload.user_id != auth.id {
        return Err(ApiError::InsufficientPrivileges);
    }

    let risk = state.repo.create_risk(&payload).await?;
    Ok(Json(RiskResponse::from(risk)))
}

/// list_risks
#[utoipa::path(
    get,
    path = "/risks",
    params(RiskFilter),
    responses((status = 200, description = "Risks", body = [RiskResponse]))
)]
pub async fn list_risks(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<RiskFilter>,
) -> Result<Json<Vec<RiskResponse>>, ApiError> {
    let risks = state.repo.find_risks(&filter).await?;
    Ok(Json(risks.into_iter().map(RiskResponse::from).collect()))
}

/// get_risk
///
/// Risk detail; associated projects and countermeasures are carried as id
/// lists.
#[utoipa::path(
    get,
    path = "/risks/{id}",
    params(("id" = i64, Path, description = "Risk ID")),
    responses(
        (status = 200, description = "Risk detail", body = RiskResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_risk(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<RiskResponse>, ApiError> {
    let id = parse_path_id(&raw_id)?;

    let risk = state
        .repo
        .get_risk(id)
        .await?
        .ok_or(ApiError::NotFound("risk"))?;

    let projects = state.repo.projects_of_risk(id).await?;
    let cms = state.repo.countermeasures_of_risk(id).await?;

    let mut response = RiskResponse::from(risk);
    response.projects = Some(projects.into_iter().map(|p| p.id).collect());
    response.counter_measures = Some(cms.into_iter().map(|cm| cm.id).collect());

    Ok(Json(response))
}

/// update_risk
#[utoipa::path(
    put,
    path = "/risks/{id}",
    request_body = RiskRequest,
    params(("id" = i64, Path, description = "Risk ID")),
    responses((status = 200, description = "Updated", body = RiskResponse))
)]
pub async fn update_risk(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(payload): Json<RiskRequest>,
) -> Result<Json<RiskResponse>, ApiError> {
    let risk = owned_risk(&auth, &state, &raw_id).await?;

    payload.validate()?;
    validate_risk_dates(&payload.start, &payload.end, &state.config.date_format)?;

    let updated = state
        .repo
        .update_risk(risk.id, &RiskPatch::from(&payload))
        .await?
        .ok_or(ApiError::NotFound("risk"))?;

    Ok(Json(RiskResponse::from(updated)))
}

/// delete_risk
#[utoipa::path(
    delete,
    path = "/risks/{id}",
    params(("id" = i64, Path, description = "Risk ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_risk(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let risk = owned_risk(&auth, &state, &raw_id).await?;

    state.repo.delete_risk(risk.id).await?;
    Ok(StatusCode::OK)
}

/// assign_countermeasures
///
/// Links standalone countermeasures to a risk (deprecated subsystem; the
/// inline fields on the risk are the current form). Unknown ids are skipped.
#[utoipa::path(
    post,
    path = "/risks/{id}/assigncms",
    request_body = IdsRequest,
    params(("id" = i64, Path, description = "Risk ID")),
    responses((status = 200, description = "Assigned"))
)]
pub async fn assign_countermeasures(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(ids): Json<IdsRequest>,
) -> Result<StatusCode, ApiError> {
    let risk = owned_risk(&auth, &state, &raw_id).await?;

    for id in ids.ids {
        let Ok(Some(cm)) = state.repo.get_countermeasure(id).await else {
            continue;
        };
        let _ = state.repo.assign_cm_to_risk(risk.id, cm.id).await;
    }

    Ok(StatusCode::OK)
}

/// unassign_countermeasures
#[utoipa::path(
    post,
    path = "/risks/{id}/unassigncms",
    request_body = IdsRequest,
    params(("id" = i64, Path, description = "Risk ID")),
    responses((status = 200, description = "Unassigned"))
)]
pub async fn unassign_countermeasures(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(ids): Json<IdsRequest>,
) -> Result<StatusCode, ApiError> {
    let risk = owned_risk(&auth, &state, &raw_id).await?;

    for id in ids.ids {
        let Ok(Some(cm)) = state.repo.get_countermeasure(id).await else {
            continue;
        };
        let _ = state.repo.unassign_cm_from_risk(risk.id, cm.id).await;
    }

    Ok(StatusCode::OK)
}
