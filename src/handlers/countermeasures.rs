//! Controller for the standalone CounterMeasure entity. The subsystem is
//! deprecated in favor of the countermeasure fields embedded on risks, but
//! the CRUD surface is still served.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, require_admin, require_manager_tier},
    error::ApiError,
    handlers::parse_path_id,
    models::{CounterMeasurePatch, CounterMeasureRequest, CounterMeasureResponse},
};

/// create_countermeasure
#[utoipa::path(
    post,
    path = "/cms",
    request_body = CounterMeasureRequest,
    responses((status = 200, description = "Created", body = CounterMeasureResponse))
)]
pub async fn create_countermeasure(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CounterMeasureRequest>,
) -> Result<Json<CounterMeasureResponse>, ApiError> {
    payload.validate()?;

    let cm = state.repo.create_countermeasure(&payload).await?;
    Ok(Json(CounterMeasureResponse::from(cm)))
}

/// list_countermeasures
#[utoipa::path(
    get,
    path = "/cms",
    responses((status = 200, description = "CounterMeasures", body = [CounterMeasureResponse]))
)]
pub async fn list_countermeasures(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CounterMeasureResponse>>, ApiError> {
    let cms = state.repo.all_countermeasures().await?;
    Ok(Json(
        cms.into_iter().map(CounterMeasureResponse::from).collect(),
    ))
}

/// get_countermeasure
///
/// Admin-only detail view, expanded with the ids of the risks it mitigates.
#[utoipa::path(
    get,
    path = "/cms/{id}",
    params(("id" = i64, Path, description = "CounterMeasure ID")),
    responses(
        (status = 200, description = "CounterMeasure detail", body = CounterMeasureResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_countermeasure(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<CounterMeasureResponse>, ApiError> {
    let id = parse_path_id(&raw_id)?;
    require_admin(&auth)?;

    let cm = state
        .repo
        .get_countermeasure(id)
        .await?
        .ok_or(ApiError::NotFound("countermeasure"))?;

    let risks = state.repo.risks_of_countermeasure(id).await?;

    let mut response = CounterMeasureResponse::from(cm);
    response.risks = Some(risks.into_iter().map(|r| r.id).collect());

    Ok(Json(response))
}

/// update_countermeasure
///
/// Manager tier and above.
#[utoipa::path(
    put,
    path = "/cms/{id}",
    request_body = CounterMeasureRequest,
    params(("id" = i64, Path, description = "CounterMeasure ID")),
    responses((status = 200, description = "Updated", body = CounterMeasureResponse))
)]
pub async fn update_countermeasure(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(payload): Json<CounterMeasureRequest>,
) -> Result<Json<CounterMeasureResponse>, ApiError> {
    let id = parse_path_id(&raw_id)?;
    require_manager_tier(&auth)?;
    payload.validate()?;

    let updated = state
        .repo
        .update_countermeasure(id, &CounterMeasurePatch::from(&payload))
        .await?
        .ok_or(ApiError::NotFound("countermeasure"))?;

    Ok(Json(CounterMeasureResponse::from(updated)))
}

/// delete_countermeasure
///
/// Manager tier and above. Soft delete.
#[utoipa::path(
    delete,
    path = "/cms/{id}",
    params(("id" = i64, Path, description = "CounterMeasure ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_countermeasure(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_path_id(&raw_id)?;
    require_manager_tier(&auth)?;

    state
        .repo
        .get_countermeasure(id)
        .await?
        .ok_or(ApiError::NotFound("countermeasure"))?;

    state.repo.delete_countermeasure(id).await?;
    Ok(StatusCode::OK)
}
