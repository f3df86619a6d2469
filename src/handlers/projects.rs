use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, require_admin_or_owner, require_manager_tier},
    error::ApiError,
    handlers::parse_path_id,
    models::{
        IdsRequest, Project, ProjectFilter, ProjectPatch, ProjectRequest, ProjectResponse,
        ROLE_MANAGER, RiskResponse, UserResponse, validate_project_dates,
    },
};

/// Loads a project for an association mutation and enforces the shared rule:
/// manager tier required, and a manager may only touch projects they manage.
async fn project_for_assignment(
    auth: &AuthUser,
    state: &AppState,
    raw_id: &str,
) -> Result<Project, ApiError> {
    let id = parse_path_id(raw_id)?;
    require_manager_tier(auth)?;

    let project = state
        .repo
        .get_project(id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;

    if auth.role == ROLE_MANAGER && project.manager_id != auth.id {
        return Err(ApiError::InsufficientPrivileges);
    }
    Ok(project)
}

/// create_project
///
/// Manager tier and above. A manager may only name themself as `ManagerID`;
/// an admin may name any manager-tier user. After insertion the manager is
/// added to the project team in a second, independent store call.
#[utoipa::path(
    post,
    path = "/projects",
    request_body = ProjectRequest,
    responses(
        (status = 200, description = "Created", body = ProjectResponse),
        (status = 400, description = "Invalid dates")
    )
)]
pub async fn create_project(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ProjectRequest>,
) -> Result<Json<ProjectResponse>, ApiError> {
    require_manager_tier(&auth)?;
    payload.validate()?;
    validate_project_dates(&payload.start, &payload.end, &state.config.date_format)?;

    let manager = state
        .repo
        .get_user(payload.manager_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if auth.role == ROLE_MANAGER {
        if payload.manager_id != auth.id {
            return Err(ApiError::CannotCreateProjectForOthers);
        }
    } else if payload.manager_id != auth.id && manager.role > ROLE_MANAGER {
        // An admin may hand the project to someone else, but only to a user
        // who is at least a manager.
        return Err(ApiError::InsufficientPrivileges);
    }

    let project = state.repo.create_project(&payload).await?;
    // Two independent calls; a crash in between leaves a project without its
    // manager on the team.
    state
        .repo
        .assign_user_to_project(project.id, manager.id)
        .await?;

    Ok(Json(ProjectResponse::from(project)))
}

/// list_projects
#[utoipa::path(
    get,
    path = "/projects",
    params(ProjectFilter),
    responses((status = 200, description = "Projects", body = [ProjectResponse]))
)]
pub async fn list_projects(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<ProjectFilter>,
) -> Result<Json<Vec<ProjectResponse>>, ApiError> {
    let projects = state.repo.find_projects(&filter).await?;
    Ok(Json(
        projects.into_iter().map(ProjectResponse::from).collect(),
    ))
}

/// get_project
///
/// Project detail with the assigned team (passwords stripped) and risks.
#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(("id" = i64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project detail", body = ProjectResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_project(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let id = parse_path_id(&raw_id)?;

    let project = state
        .repo
        .get_project(id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;

    let users = state.repo.users_of_project(id).await?;
    let risks = state.repo.risks_of_project(id).await?;

    let mut response = ProjectResponse::from(project);
    response.users = Some(users.into_iter().map(UserResponse::from).collect());
    response.risks = Some(risks.into_iter().map(RiskResponse::from).collect());

    Ok(Json(response))
}

/// update_project
///
/// Admin, or the project's own manager. Dates are re-validated on every
/// update.
#[utoipa::path(
    put,
    path = "/projects/{id}",
    request_body = ProjectRequest,
    params(("id" = i64, Path, description = "Project ID")),
    responses((status = 200, description = "Updated", body = ProjectResponse))
)]
pub async fn update_project(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(payload): Json<ProjectRequest>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let id = parse_path_id(&raw_id)?;

    let project = state
        .repo
        .get_project(id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    require_admin_or_owner(&auth, project.manager_id)?;

    payload.validate()?;
    validate_project_dates(&payload.start, &payload.end, &state.config.date_format)?;

    let updated = state
        .repo
        .update_project(id, &ProjectPatch::from(&payload))
        .await?
        .ok_or(ApiError::NotFound("project"))?;

    Ok(Json(ProjectResponse::from(updated)))
}

/// delete_project
///
/// Admin, or the project's own manager. Soft delete.
#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(("id" = i64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_project(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_path_id(&raw_id)?;

    let project = state
        .repo
        .get_project(id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    require_admin_or_owner(&auth, project.manager_id)?;

    state.repo.delete_project(id).await?;
    Ok(StatusCode::OK)
}

/// assign_users
///
/// Adds the given users to the project team. Unknown or failing ids are
/// skipped, the rest of the batch continues.
#[utoipa::path(
    post,
    path = "/projects/{id}/assignusers",
    request_body = IdsRequest,
    params(("id" = i64, Path, description = "Project ID")),
    responses((status = 200, description = "Assigned"))
)]
pub async fn assign_users(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(ids): Json<IdsRequest>,
) -> Result<StatusCode, ApiError> {
    let project = project_for_assignment(&auth, &state, &raw_id).await?;

    for id in ids.ids {
        let Ok(Some(user)) = state.repo.get_user(id).await else {
            continue;
        };
        let _ = state.repo.assign_user_to_project(project.id, user.id).await;
    }

    Ok(StatusCode::OK)
}

/// unassign_users
///
/// Removes users from the team; the project's manager themself cannot be
/// unassigned.
#[utoipa::path(
    post,
    path = "/projects/{id}/unassignusers",
    request_body = IdsRequest,
    params(("id" = i64, Path, description = "Project ID")),
    responses((status = 200, description = "Unassigned"))
)]
pub async fn unassign_users(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(ids): Json<IdsRequest>,
) -> Result<StatusCode, ApiError> {
    let project = project_for_assignment(&auth, &state, &raw_id).await?;

    for id in ids.ids {
        if id == project.manager_id {
            continue;
        }
        let Ok(Some(user)) = state.repo.get_user(id).await else {
            continue;
        };
        let _ = state
            .repo
            .unassign_user_from_project(project.id, user.id)
            .await;
    }

    Ok(StatusCode::OK)
}

/// assign_risks
#[utoipa::path(
    post,
    path = "/projects/{id}/assignrisks",
    request_body = IdsRequest,
    params(("id" = i64, Path, description = "Project ID")),
    responses((status = 200, description = "Assigned"))
)]
pub async fn assign_risks(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(ids): Json<IdsRequest>,
) -> Result<StatusCode, ApiError> {
    let project = project_for_assignment(&auth, &state, &raw_id).await?;

    for id in ids.ids {
        let Ok(Some(risk)) = state.repo.get_risk(id).await else {
            continue;
        };
        let _ = state.repo.assign_risk_to_project(project.id, risk.id).await;
    }

    Ok(StatusCode::OK)
}

/// unassign_risks
#[utoipa::path(
    post,
    path = "/projects/{id}/unassignrisks",
    request_body = IdsRequest,
    params(("id" = i64, Path, description = "Project ID")),
    responses((status = 200, description = "Unassigned"))
)]
pub async fn unassign_risks(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(ids): Json<IdsRequest>,
) -> Result<StatusCode, ApiError> {
    let project = project_for_assignment(&auth, &state, &raw_id).await?;

    for id in ids.ids {
        let Ok(Some(risk)) = state.repo.get_risk(id).await else {
            continue;
        };
        let _ = state
            .repo
            .unassign_risk_from_project(project.id, risk.id)
            .await;
    }

    Ok(StatusCode::OK)
}

/// risks_of_projects
///
/// Batch lookup: the distinct risks associated with any of the given
/// projects.
#[utoipa::path(
    post,
    path = "/projects/risks",
    request_body = IdsRequest,
    responses((status = 200, description = "Risks", body = [RiskResponse]))
)]
pub async fn risks_of_projects(
    _auth: AuthUser,
    State(state): State<AppState>,
    Json(ids): Json<IdsRequest>,
) -> Result<Json<Vec<RiskResponse>>, ApiError> {
    let risks = state.repo.risks_of_projects(&ids.ids).await?;
    Ok(Json(risks.into_iter().map(RiskResponse::from).collect()))
}
