use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind the token-verifying middleware layered on in
/// `create_router`; handlers receive a resolved `AuthUser` and apply the
/// operation-specific role/ownership rules themselves.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Users ---
        // POST /users — admin-only account creation.
        // GET /users — list with optional equality filters.
        .route(
            "/users",
            post(handlers::users::create_user).get(handlers::users::list_users),
        )
        // Detail (expanded with projects/risks), overlay update, soft delete.
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        // POST /users/{id}/changepassword — self-service only.
        .route(
            "/users/{id}/changepassword",
            post(handlers::users::change_password),
        )
        // --- Projects ---
        .route(
            "/projects",
            post(handlers::projects::create_project).get(handlers::projects::list_projects),
        )
        // POST /projects/risks — batch risk lookup for a set of project ids.
        // Registered before the {id} routes purely for readability; axum
        // matches static segments ahead of captures either way.
        .route(
            "/projects/risks",
            post(handlers::projects::risks_of_projects),
        )
        .route(
            "/projects/{id}",
            get(handlers::projects::get_project)
                .put(handlers::projects::update_project)
                .delete(handlers::projects::delete_project),
        )
        // Team and risk association management, manager-tier gated.
        .route(
            "/projects/{id}/assignusers",
            post(handlers::projects::assign_users),
        )
        .route(
            "/projects/{id}/unassignusers",
            post(handlers::projects::unassign_users),
        )
        .route(
            "/projects/{id}/assignrisks",
            post(handlers::projects::assign_risks),
        )
        .route(
            "/projects/{id}/unassignrisks",
            post(handlers::projects::unassign_risks),
        )
        // --- Risks ---
        .route(
            "/risks",
            post(handlers::risks::create_risk).get(handlers::risks::list_risks),
        )
        .route(
            "/risks/{id}",
            get(handlers::risks::get_risk)
                .put(handlers::risks::update_risk)
                .delete(handlers::risks::delete_risk),
        )
        // Deprecated countermeasure association, kept for the standalone
        // CounterMeasure subsystem.
        .route(
            "/risks/{id}/assigncms",
            post(handlers::risks::assign_countermeasures),
        )
        .route(
            "/risks/{id}/unassigncms",
            post(handlers::risks::unassign_countermeasures),
        )
        // --- CounterMeasures (deprecated subsystem) ---
        .route(
            "/cms",
            post(handlers::countermeasures::create_countermeasure)
                .get(handlers::countermeasures::list_countermeasures),
        )
        .route(
            "/cms/{id}",
            get(handlers::countermeasures::get_countermeasure)
                .put(handlers::countermeasures::update_countermeasure)
                .delete(handlers::countermeasures::delete_countermeasure),
        )
}
