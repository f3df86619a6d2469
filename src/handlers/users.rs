use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::{
    AppState,
    auth::{self, AuthUser, require_admin, require_manager_tier_or_self},
    error::ApiError,
    handlers::parse_path_id,
    models::{
        ChangePasswordRequest, CreateUserRequest, LoginRequest, LoginResponse, ProjectFilter,
        ProjectResponse, ROLE_MANAGER, RiskResponse, UpdateUserRequest, UserFilter, UserPatch,
        UserResponse,
    },
};

/// login
///
/// The only public endpoint. Compares the submitted credentials against the
/// stored record (opaque equality, clients pre-hash) and issues a session
/// token on match.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Wrong credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.validate()?;

    let filter = UserFilter {
        email: Some(payload.email.clone()),
        ..UserFilter::default()
    };
    let matches = state.repo.find_users(&filter).await?;

    let user = match matches.into_iter().next() {
        Some(user) if user.password == payload.password => user,
        _ => return Err(ApiError::WrongEmailOrPassword),
    };

    let token = auth::create_token(user.id, user.role, &state.config.jwt_secret)?;

    Ok(Json(LoginResponse {
        id: user.id,
        token,
        name: user.name,
        role: user.role,
    }))
}

/// create_user
///
/// Admin-only account creation. Duplicate emails surface as a 400 from the
/// store's uniqueness constraint.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses((status = 200, description = "Created", body = UserResponse))
)]
pub async fn create_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&auth)?;
    payload.validate()?;

    let user = state.repo.create_user(&payload).await?;
    Ok(Json(UserResponse::from(user)))
}

/// list_users
///
/// Lists users, optionally narrowed by equality filters. Available to any
/// authenticated caller; passwords never appear in the response.
#[utoipa::path(
    get,
    path = "/users",
    params(UserFilter),
    responses((status = 200, description = "Users", body = [UserResponse]))
)]
pub async fn list_users(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.repo.find_users(&filter).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// get_user
///
/// User detail with expanded project and risk associations. Manager tier may
/// inspect anyone; user tier only themselves.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User detail", body = UserResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_path_id(&raw_id)?;
    require_manager_tier_or_self(&auth, id)?;

    let user = state.repo.get_user(id).await?.ok_or(ApiError::NotFound("user"))?;

    let projects = state.repo.projects_of_user(id).await?;
    let risks = state.repo.risks_of_user(id).await?;

    let mut response = UserResponse::from(user);
    response.projects = Some(projects.into_iter().map(ProjectResponse::from).collect());
    response.risks = Some(risks.into_iter().map(RiskResponse::from).collect());

    Ok(Json(response))
}

/// update_user
///
/// Overlay update of a user record. Only an admin may change `Role`, and a
/// manager-or-above cannot be downgraded while still managing a project.
#[utoipa::path(
    put,
    path = "/users/{id}",
    request_body = UpdateUserRequest,
    params(("id" = i64, Path, description = "User ID")),
    responses((status = 200, description = "Updated", body = UserResponse))
)]
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_path_id(&raw_id)?;
    require_manager_tier_or_self(&auth, id)?;
    payload.validate()?;

    let mut patch = UserPatch {
        name: payload.name.clone(),
        email: payload.email.clone(),
        skills: payload.skills.clone(),
        status: payload.status.clone(),
        ..UserPatch::default()
    };

    if require_admin(&auth).is_ok() {
        patch.role = payload.role;

        if let Some(new_role) = payload.role {
            let old = state.repo.get_user(id).await?.ok_or(ApiError::NotFound("user"))?;
            // Downgrading a manager-or-above below manager tier is blocked
            // while they are still the manager of record of any project.
            if old.role <= ROLE_MANAGER && new_role > ROLE_MANAGER {
                let led = state
                    .repo
                    .find_projects(&ProjectFilter {
                        manager_id: Some(id),
                        ..ProjectFilter::default()
                    })
                    .await?;
                if !led.is_empty() {
                    return Err(ApiError::ManagerStillLeadsProjects);
                }
            }
        }
    }

    let updated = state
        .repo
        .update_user(id, &patch)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(Json(UserResponse::from(updated)))
}

/// delete_user
///
/// Admin-only soft delete, refused when it would remove the last admin.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 400, description = "Last admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_path_id(&raw_id)?;
    require_admin(&auth)?;

    state.repo.get_user(id).await?.ok_or(ApiError::NotFound("user"))?;

    if state.repo.count_admins_excluding(id).await? == 0 {
        return Err(ApiError::CannotDeleteOnlyAdmin);
    }

    state.repo.delete_user(id).await?;
    Ok(StatusCode::OK)
}

/// change_password
///
/// Self-service only: the caller must be the target user and present the
/// current password. Re-reads the record and writes it back whole.
#[utoipa::path(
    post,
    path = "/users/{id}/changepassword",
    request_body = ChangePasswordRequest,
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Changed"),
        (status = 401, description = "Wrong password or not yourself")
    )
)]
pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let id = parse_path_id(&raw_id)?;

    let mut user = state.repo.get_user(id).await?.ok_or(ApiError::NotFound("user"))?;

    if user.id != auth.id {
        return Err(ApiError::InsufficientPrivileges);
    }

    payload.validate()?;

    if payload.old_password != user.password {
        return Err(ApiError::WrongPassword);
    }

    user.password = payload.new_password;
    state.repo.replace_user(&user).await?;

    Ok(StatusCode::OK)
}
