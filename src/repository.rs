use crate::models::{
    CounterMeasure, CounterMeasurePatch, CounterMeasureRequest, CreateUserRequest, Project,
    ProjectFilter, ProjectPatch, ProjectRequest, Risk, RiskFilter, RiskPatch, RiskRequest, User,
    UserFilter, UserPatch,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;

/// Repository
///
/// The abstract contract for all persistence operations, shared through the
/// application state as `Arc<dyn Repository>` so handlers never know the
/// concrete backend. Per entity it offers the same generic surface: create,
/// read-by-id, equality-filter find, overlay update, full-row replace, soft
/// delete, bulk reads, and join-table association management.
///
/// Storage errors propagate unchanged; there is no retrying and no
/// transaction spanning multiple calls (create-then-associate flows are two
/// independent statements).
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn create_user(&self, req: &CreateUserRequest) -> Result<User, sqlx::Error>;
    async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error>;
    /// Equality match on every `Some` field of the filter.
    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<User>, sqlx::Error>;
    async fn all_users(&self) -> Result<Vec<User>, sqlx::Error>;
    async fn users_updated_after(&self, ts: DateTime<Utc>) -> Result<Vec<User>, sqlx::Error>;
    /// Overlay update: `None` fields keep their stored values.
    async fn update_user(&self, id: i64, patch: &UserPatch) -> Result<Option<User>, sqlx::Error>;
    /// Full-row overwrite of every mutable column.
    async fn replace_user(&self, user: &User) -> Result<Option<User>, sqlx::Error>;
    /// Soft delete; returns whether a live row was marked.
    async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error>;
    /// Number of live admin accounts other than `id`; backs the last-admin guard.
    async fn count_admins_excluding(&self, id: i64) -> Result<i64, sqlx::Error>;
    async fn projects_of_user(&self, user_id: i64) -> Result<Vec<Project>, sqlx::Error>;
    /// Risks owned via the `user_id` column (value reference, not a join).
    async fn risks_of_user(&self, user_id: i64) -> Result<Vec<Risk>, sqlx::Error>;

    // --- Projects ---
    async fn create_project(&self, req: &ProjectRequest) -> Result<Project, sqlx::Error>;
    async fn get_project(&self, id: i64) -> Result<Option<Project>, sqlx::Error>;
    async fn find_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, sqlx::Error>;
    async fn all_projects(&self) -> Result<Vec<Project>, sqlx::Error>;
    async fn projects_updated_after(&self, ts: DateTime<Utc>) -> Result<Vec<Project>, sqlx::Error>;
    async fn update_project(
        &self,
        id: i64,
        patch: &ProjectPatch,
    ) -> Result<Option<Project>, sqlx::Error>;
    async fn replace_project(&self, project: &Project) -> Result<Option<Project>, sqlx::Error>;
    async fn delete_project(&self, id: i64) -> Result<bool, sqlx::Error>;
    async fn assign_user_to_project(&self, project_id: i64, user_id: i64)
    -> Result<(), sqlx::Error>;
    async fn unassign_user_from_project(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<(), sqlx::Error>;
    async fn users_of_project(&self, project_id: i64) -> Result<Vec<User>, sqlx::Error>;
    async fn assign_risk_to_project(&self, project_id: i64, risk_id: i64)
    -> Result<(), sqlx::Error>;
    async fn unassign_risk_from_project(
        &self,
        project_id: i64,
        risk_id: i64,
    ) -> Result<(), sqlx::Error>;
    async fn risks_of_project(&self, project_id: i64) -> Result<Vec<Risk>, sqlx::Error>;
    /// Batch variant backing `POST /projects/risks`: distinct risks associated
    /// with any of the given projects.
    async fn risks_of_projects(&self, project_ids: &[i64]) -> Result<Vec<Risk>, sqlx::Error>;

    // --- Risks ---
    async fn create_risk(&self, req: &RiskRequest) -> Result<Risk, sqlx::Error>;
    async fn get_risk(&self, id: i64) -> Result<Option<Risk>, sqlx::Error>;
    async fn find_risks(&self, filter: &RiskFilter) -> Result<Vec<Risk>, sqlx::Error>;
    async fn all_risks(&self) -> Result<Vec<Risk>, sqlx::Error>;
    async fn risks_updated_after(&self, ts: DateTime<Utc>) -> Result<Vec<Risk>, sqlx::Error>;
    async fn update_risk(&self, id: i64, patch: &RiskPatch) -> Result<Option<Risk>, sqlx::Error>;
    async fn replace_risk(&self, risk: &Risk) -> Result<Option<Risk>, sqlx::Error>;
    async fn delete_risk(&self, id: i64) -> Result<bool, sqlx::Error>;
    async fn projects_of_risk(&self, risk_id: i64) -> Result<Vec<Project>, sqlx::Error>;
    async fn assign_cm_to_risk(&self, risk_id: i64, cm_id: i64) -> Result<(), sqlx::Error>;
    async fn unassign_cm_from_risk(&self, risk_id: i64, cm_id: i64) -> Result<(), sqlx::Error>;
    async fn countermeasures_of_risk(
        &self,
        risk_id: i64,
    ) -> Result<Vec<CounterMeasure>, sqlx::Error>;

    // --- CounterMeasures (deprecated subsystem) ---
    async fn create_countermeasure(
        &self,
        req: &CounterMeasureRequest,
    ) -> Result<CounterMeasure, sqlx::Error>;
    async fn get_countermeasure(&self, id: i64) -> Result<Option<CounterMeasure>, sqlx::Error>;
    async fn all_countermeasures(&self) -> Result<Vec<CounterMeasure>, sqlx::Error>;
    async fn update_countermeasure(
        &self,
        id: i64,
        patch: &CounterMeasurePatch,
    ) -> Result<Option<CounterMeasure>, sqlx::Error>;
    async fn delete_countermeasure(&self, id: i64) -> Result<bool, sqlx::Error>;
    async fn risks_of_countermeasure(&self, cm_id: i64) -> Result<Vec<Risk>, sqlx::Error>;
}

/// The concrete type shared across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` implementation backed by the PostgreSQL pool. Every read
/// filters `deleted_at IS NULL`; deletes only ever mark that column.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLS: &str =
    "id, name, email, password, role, skills, status, created_at, updated_at, deleted_at";
const PROJECT_COLS: &str =
    "id, name, description, start_date, end_date, is_finished, manager_id, created_at, updated_at, deleted_at";
const RISK_COLS: &str = "id, value, cost, probability, risk, name, description, category, threat, \
     status, trigger, impact, start_date, end_date, user_id, counter_measure_used, \
     counter_measure_cost, counter_measure_desc, created_at, updated_at, deleted_at";
const CM_COLS: &str = "id, name, description, cost, created_at, updated_at, deleted_at";

/// Prefixes every column in a comma-separated list with a table alias, for
/// join queries.
fn qualify(alias: &str, cols: &str) -> String {
    cols.split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- Users ---

    async fn create_user(&self, req: &CreateUserRequest) -> Result<User, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users (name, email, password, role, skills, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&req.name)
            .bind(&req.email)
            .bind(&req.password)
            .bind(req.role)
            .bind(&req.skills)
            .bind(&req.status)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<User>, sqlx::Error> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLS} FROM users WHERE deleted_at IS NULL"));

        if let Some(name) = &filter.name {
            builder.push(" AND name = ");
            builder.push_bind(name.clone());
        }
        if let Some(email) = &filter.email {
            builder.push(" AND email = ");
            builder.push_bind(email.clone());
        }
        if let Some(role) = filter.role {
            builder.push(" AND role = ");
            builder.push_bind(role);
        }
        if let Some(skills) = &filter.skills {
            builder.push(" AND skills = ");
            builder.push_bind(skills.clone());
        }
        if let Some(status) = &filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status.clone());
        }
        builder.push(" ORDER BY id");

        builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
    }

    async fn all_users(&self) -> Result<Vec<User>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLS} FROM users WHERE deleted_at IS NULL ORDER BY id");
        sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await
    }

    async fn users_updated_after(&self, ts: DateTime<Utc>) -> Result<Vec<User>, sqlx::Error> {
        let sql = format!(
            "SELECT {USER_COLS} FROM users \
             WHERE updated_at > $1 AND deleted_at IS NULL ORDER BY id"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(ts)
            .fetch_all(&self.pool)
            .await
    }

    async fn update_user(&self, id: i64, patch: &UserPatch) -> Result<Option<User>, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                password = COALESCE($4, password), \
                role = COALESCE($5, role), \
                skills = COALESCE($6, skills), \
                status = COALESCE($7, status), \
                updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.email)
            .bind(&patch.password)
            .bind(patch.role)
            .bind(&patch.skills)
            .bind(&patch.status)
            .fetch_optional(&self.pool)
            .await
    }

    async fn replace_user(&self, user: &User) -> Result<Option<User>, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET \
                name = $2, email = $3, password = $4, role = $5, skills = $6, status = $7, \
                updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {USER_COLS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password)
            .bind(user.role)
            .bind(&user.skills)
            .bind(&user.status)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_admins_excluding(&self, id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE role = 1 AND id <> $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
    }

    async fn projects_of_user(&self, user_id: i64) -> Result<Vec<Project>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM projects p \
             JOIN user_projects up ON up.project_id = p.id \
             WHERE up.user_id = $1 AND p.deleted_at IS NULL ORDER BY p.id",
            qualify("p", PROJECT_COLS)
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn risks_of_user(&self, user_id: i64) -> Result<Vec<Risk>, sqlx::Error> {
        let sql = format!(
            "SELECT {RISK_COLS} FROM risks \
             WHERE user_id = $1 AND deleted_at IS NULL ORDER BY id"
        );
        sqlx::query_as::<_, Risk>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }

    // --- Projects ---

    async fn create_project(&self, req: &ProjectRequest) -> Result<Project, sqlx::Error> {
        let sql = format!(
            "INSERT INTO projects (name, description, start_date, end_date, is_finished, manager_id) \
             VALUES ($1, $2, $3, $4, false, $5) RETURNING {PROJECT_COLS}"
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(&req.name)
            .bind(&req.description)
            .bind(&req.start)
            .bind(&req.end)
            .bind(req.manager_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_project(&self, id: i64) -> Result<Option<Project>, sqlx::Error> {
        let sql =
            format!("SELECT {PROJECT_COLS} FROM projects WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, sqlx::Error> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {PROJECT_COLS} FROM projects WHERE deleted_at IS NULL"
        ));

        if let Some(name) = &filter.name {
            builder.push(" AND name = ");
            builder.push_bind(name.clone());
        }
        if let Some(is_finished) = filter.is_finished {
            builder.push(" AND is_finished = ");
            builder.push_bind(is_finished);
        }
        if let Some(manager_id) = filter.manager_id {
            builder.push(" AND manager_id = ");
            builder.push_bind(manager_id);
        }
        builder.push(" ORDER BY id");

        builder
            .build_query_as::<Project>()
            .fetch_all(&self.pool)
            .await
    }

    async fn all_projects(&self) -> Result<Vec<Project>, sqlx::Error> {
        let sql =
            format!("SELECT {PROJECT_COLS} FROM projects WHERE deleted_at IS NULL ORDER BY id");
        sqlx::query_as::<_, Project>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    async fn projects_updated_after(
        &self,
        ts: DateTime<Utc>,
    ) -> Result<Vec<Project>, sqlx::Error> {
        let sql = format!(
            "SELECT {PROJECT_COLS} FROM projects \
             WHERE updated_at > $1 AND deleted_at IS NULL ORDER BY id"
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(ts)
            .fetch_all(&self.pool)
            .await
    }

    async fn update_project(
        &self,
        id: i64,
        patch: &ProjectPatch,
    ) -> Result<Option<Project>, sqlx::Error> {
        let sql = format!(
            "UPDATE projects SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                start_date = COALESCE($4, start_date), \
                end_date = COALESCE($5, end_date), \
                is_finished = COALESCE($6, is_finished), \
                manager_id = COALESCE($7, manager_id), \
                updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {PROJECT_COLS}"
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.description)
            .bind(&patch.start)
            .bind(&patch.end)
            .bind(patch.is_finished)
            .bind(patch.manager_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn replace_project(&self, project: &Project) -> Result<Option<Project>, sqlx::Error> {
        let sql = format!(
            "UPDATE projects SET \
                name = $2, description = $3, start_date = $4, end_date = $5, \
                is_finished = $6, manager_id = $7, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {PROJECT_COLS}"
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(project.id)
            .bind(&project.name)
            .bind(&project.description)
            .bind(&project.start)
            .bind(&project.end)
            .bind(project.is_finished)
            .bind(project.manager_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_project(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE projects SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn assign_user_to_project(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_projects (user_id, project_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(project_id)
        .execute(&self.pool)
        .await?;
        // Association changes count as an update of the owning project.
        self.touch_project(project_id).await
    }

    async fn unassign_user_from_project(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM user_projects WHERE user_id = $1 AND project_id = $2")
            .bind(user_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        self.touch_project(project_id).await
    }

    async fn users_of_project(&self, project_id: i64) -> Result<Vec<User>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM users u \
             JOIN user_projects up ON up.user_id = u.id \
             WHERE up.project_id = $1 AND u.deleted_at IS NULL ORDER BY u.id",
            qualify("u", USER_COLS)
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn assign_risk_to_project(
        &self,
        project_id: i64,
        risk_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO risk_projects (risk_id, project_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(risk_id)
        .bind(project_id)
        .execute(&self.pool)
        .await?;
        self.touch_project(project_id).await
    }

    async fn unassign_risk_from_project(
        &self,
        project_id: i64,
        risk_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM risk_projects WHERE risk_id = $1 AND project_id = $2")
            .bind(risk_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        self.touch_project(project_id).await
    }

    async fn risks_of_project(&self, project_id: i64) -> Result<Vec<Risk>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM risks r \
             JOIN risk_projects rp ON rp.risk_id = r.id \
             WHERE rp.project_id = $1 AND r.deleted_at IS NULL ORDER BY r.id",
            qualify("r", RISK_COLS)
        );
        sqlx::query_as::<_, Risk>(&sql)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn risks_of_projects(&self, project_ids: &[i64]) -> Result<Vec<Risk>, sqlx::Error> {
        let sql = format!(
            "SELECT DISTINCT {} FROM risks r \
             JOIN risk_projects rp ON rp.risk_id = r.id \
             WHERE rp.project_id = ANY($1) AND r.deleted_at IS NULL ORDER BY r.id",
            qualify("r", RISK_COLS)
        );
        sqlx::query_as::<_, Risk>(&sql)
            .bind(project_ids.to_vec())
            .fetch_all(&self.pool)
            .await
    }

    // --- Risks ---

    async fn create_risk(&self, req: &RiskRequest) -> Result<Risk, sqlx::Error> {
        let sql = format!(
            "INSERT INTO risks (value, cost, probability, risk, name, description, category, \
                threat, status, trigger, impact, start_date, end_date, user_id, \
                counter_measure_used, counter_measure_cost, counter_measure_desc) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {RISK_COLS}"
        );
        sqlx::query_as::<_, Risk>(&sql)
            .bind(req.value)
            .bind(req.cost)
            .bind(req.probability)
            .bind(req.risk)
            .bind(&req.name)
            .bind(&req.description)
            .bind(&req.category)
            .bind(&req.threat)
            .bind(&req.status)
            .bind(&req.trigger)
            .bind(req.impact)
            .bind(&req.start)
            .bind(&req.end)
            .bind(req.user_id)
            .bind(req.counter_measure_used)
            .bind(req.counter_measure_cost)
            .bind(&req.counter_measure_desc)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_risk(&self, id: i64) -> Result<Option<Risk>, sqlx::Error> {
        let sql = format!("SELECT {RISK_COLS} FROM risks WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Risk>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_risks(&self, filter: &RiskFilter) -> Result<Vec<Risk>, sqlx::Error> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {RISK_COLS} FROM risks WHERE deleted_at IS NULL"));

        if let Some(name) = &filter.name {
            builder.push(" AND name = ");
            builder.push_bind(name.clone());
        }
        if let Some(category) = &filter.category {
            builder.push(" AND category = ");
            builder.push_bind(category.clone());
        }
        if let Some(status) = &filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status.clone());
        }
        if let Some(user_id) = filter.user_id {
            builder.push(" AND user_id = ");
            builder.push_bind(user_id);
        }
        builder.push(" ORDER BY id");

        builder
            .build_query_as::<Risk>()
            .fetch_all(&self.pool)
            .await
    }

    async fn all_risks(&self) -> Result<Vec<Risk>, sqlx::Error> {
        let sql = format!("SELECT {RISK_COLS} FROM risks WHERE deleted_at IS NULL ORDER BY id");
        sqlx::query_as::<_, Risk>(&sql).fetch_all(&self.pool).await
    }

    async fn risks_updated_after(&self, ts: DateTime<Utc>) -> Result<Vec<Risk>, sqlx::Error> {
        let sql = format!(
            "SELECT {RISK_COLS} FROM risks \
             WHERE updated_at > $1 AND deleted_at IS NULL ORDER BY id"
        );
        sqlx::query_as::<_, Risk>(&sql)
            .bind(ts)
            .fetch_all(&self.pool)
            .await
    }

    async fn update_risk(&self, id: i64, patch: &RiskPatch) -> Result<Option<Risk>, sqlx::Error> {
        let sql = format!(
            "UPDATE risks SET \
                value = COALESCE($2, value), \
                cost = COALESCE($3, cost), \
                probability = COALESCE($4, probability), \
                risk = COALESCE($5, risk), \
                name = COALESCE($6, name), \
                description = COALESCE($7, description), \
                category = COALESCE($8, category), \
                threat = COALESCE($9, threat), \
                status = COALESCE($10, status), \
                trigger = COALESCE($11, trigger), \
                impact = COALESCE($12, impact), \
                start_date = COALESCE($13, start_date), \
                end_date = COALESCE($14, end_date), \
                user_id = COALESCE($15, user_id), \
                counter_measure_used = COALESCE($16, counter_measure_used), \
                counter_measure_cost = COALESCE($17, counter_measure_cost), \
                counter_measure_desc = COALESCE($18, counter_measure_desc), \
                updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {RISK_COLS}"
        );
        sqlx::query_as::<_, Risk>(&sql)
            .bind(id)
            .bind(patch.value)
            .bind(patch.cost)
            .bind(patch.probability)
            .bind(patch.risk)
            .bind(&patch.name)
            .bind(&patch.description)
            .bind(&patch.category)
            .bind(&patch.threat)
            .bind(&patch.status)
            .bind(&patch.trigger)
            .bind(patch.impact)
            .bind(&patch.start)
            .bind(&patch.end)
            .bind(patch.user_id)
            .bind(patch.counter_measure_used)
            .bind(patch.counter_measure_cost)
            .bind(&patch.counter_measure_desc)
            .fetch_optional(&self.pool)
            .await
    }

    async fn replace_risk(&self, risk: &Risk) -> Result<Option<Risk>, sqlx::Error> {
        let sql = format!(
            "UPDATE risks SET \
                value = $2, cost = $3, probability = $4, risk = $5, name = $6, \
                description = $7, category = $8, threat = $9, status = $10, trigger = $11, \
                impact = $12, start_date = $13, end_date = $14, user_id = $15, \
                counter_measure_used = $16, counter_measure_cost = $17, \
                counter_measure_desc = $18, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {RISK_COLS}"
        );
        sqlx::query_as::<_, Risk>(&sql)
            .bind(risk.id)
            .bind(risk.value)
            .bind(risk.cost)
            .bind(risk.probability)
            .bind(risk.risk)
            .bind(&risk.name)
            .bind(&risk.description)
            .bind(&risk.category)
            .bind(&risk.threat)
            .bind(&risk.status)
            .bind(&risk.trigger)
            .bind(risk.impact)
            .bind(&risk.start)
            .bind(&risk.end)
            .bind(risk.user_id)
            .bind(risk.counter_measure_used)
            .bind(risk.counter_measure_cost)
            .bind(&risk.counter_measure_desc)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_risk(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE risks SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn projects_of_risk(&self, risk_id: i64) -> Result<Vec<Project>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM projects p \
             JOIN risk_projects rp ON rp.project_id = p.id \
             WHERE rp.risk_id = $1 AND p.deleted_at IS NULL ORDER BY p.id",
            qualify("p", PROJECT_COLS)
        );
        sqlx::query_as::<_, Project>(&sql)
            .bind(risk_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn assign_cm_to_risk(&self, risk_id: i64, cm_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO risk_counter_measures (risk_id, counter_measure_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(risk_id)
        .bind(cm_id)
        .execute(&self.pool)
        .await?;
        self.touch_risk(risk_id).await
    }

    async fn unassign_cm_from_risk(&self, risk_id: i64, cm_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "DELETE FROM risk_counter_measures WHERE risk_id = $1 AND counter_measure_id = $2",
        )
        .bind(risk_id)
        .bind(cm_id)
        .execute(&self.pool)
        .await?;
        self.touch_risk(risk_id).await
    }

    async fn countermeasures_of_risk(
        &self,
        risk_id: i64,
    ) -> Result<Vec<CounterMeasure>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM counter_measures cm \
             JOIN risk_counter_measures rcm ON rcm.counter_measure_id = cm.id \
             WHERE rcm.risk_id = $1 AND cm.deleted_at IS NULL ORDER BY cm.id",
            qualify("cm", CM_COLS)
        );
        sqlx::query_as::<_, CounterMeasure>(&sql)
            .bind(risk_id)
            .fetch_all(&self.pool)
            .await
    }

    // --- CounterMeasures ---

    async fn create_countermeasure(
        &self,
        req: &CounterMeasureRequest,
    ) -> Result<CounterMeasure, sqlx::Error> {
        let sql = format!(
            "INSERT INTO counter_measures (name, description, cost) \
             VALUES ($1, $2, $3) RETURNING {CM_COLS}"
        );
        sqlx::query_as::<_, CounterMeasure>(&sql)
            .bind(&req.name)
            .bind(&req.description)
            .bind(req.cost)
            .fetch_one(&self.pool)
            .await
    }

    async fn get_countermeasure(&self, id: i64) -> Result<Option<CounterMeasure>, sqlx::Error> {
        let sql =
            format!("SELECT {CM_COLS} FROM counter_measures WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, CounterMeasure>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn all_countermeasures(&self) -> Result<Vec<CounterMeasure>, sqlx::Error> {
        let sql = format!(
            "SELECT {CM_COLS} FROM counter_measures WHERE deleted_at IS NULL ORDER BY id"
        );
        sqlx::query_as::<_, CounterMeasure>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    async fn update_countermeasure(
        &self,
        id: i64,
        patch: &CounterMeasurePatch,
    ) -> Result<Option<CounterMeasure>, sqlx::Error> {
        let sql = format!(
            "UPDATE counter_measures SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                cost = COALESCE($4, cost), \
                updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {CM_COLS}"
        );
        sqlx::query_as::<_, CounterMeasure>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.description)
            .bind(patch.cost)
            .fetch_optional(&self.pool)
            .await
    }

    async fn delete_countermeasure(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE counter_measures SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn risks_of_countermeasure(&self, cm_id: i64) -> Result<Vec<Risk>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM risks r \
             JOIN risk_counter_measures rcm ON rcm.risk_id = r.id \
             WHERE rcm.counter_measure_id = $1 AND r.deleted_at IS NULL ORDER BY r.id",
            qualify("r", RISK_COLS)
        );
        sqlx::query_as::<_, Risk>(&sql)
            .bind(cm_id)
            .fetch_all(&self.pool)
            .await
    }
}

impl PostgresRepository {
    async fn touch_project(&self, project_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE projects SET updated_at = NOW() WHERE id = $1")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_risk(&self, risk_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE risks SET updated_at = NOW() WHERE id = $1")
            .bind(risk_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
