use crate::{
    error::ApiError,
    models::{CreateUserRequest, ROLE_ADMIN, User, UserFilter},
    repository::RepositoryState,
};

/// Email of the account every fresh deployment starts with.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@admin.com";

/// Opaque stored credential for the default admin. Clients hash passwords on
/// their side before submitting, so this is the hash of the well-known
/// default password, not a plaintext value.
pub const DEFAULT_ADMIN_PASSWORD: &str = "d8578edf8458ce06fbc5bb76a58c5ca4";

/// seed_default_admin
///
/// Idempotent bootstrap step run once at startup: creates the default admin
/// account unless a live user with its email already exists. Returns the
/// created user, or `None` when seeding was skipped.
pub async fn seed_default_admin(repo: &RepositoryState) -> Result<Option<User>, ApiError> {
    let filter = UserFilter {
        email: Some(DEFAULT_ADMIN_EMAIL.to_string()),
        ..UserFilter::default()
    };
    if !repo.find_users(&filter).await?.is_empty() {
        return Ok(None);
    }

    let admin = repo
        .create_user(&CreateUserRequest {
            name: "admin".to_string(),
            email: DEFAULT_ADMIN_EMAIL.to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
            role: ROLE_ADMIN,
            skills: String::new(),
            status: String::new(),
        })
        .await?;

    tracing::info!(id = admin.id, "seeded default admin account");
    Ok(Some(admin))
}
