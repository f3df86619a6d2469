//! Shared test support: an in-memory `Repository` implementation plus state
//! and seeding helpers used by the handler test suites.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use risk_portal::{
    AppState,
    config::AppConfig,
    models::{
        CounterMeasure, CounterMeasurePatch, CounterMeasureRequest, CreateUserRequest, Project,
        ProjectFilter, ProjectPatch, ProjectRequest, Risk, RiskFilter, RiskPatch, RiskRequest,
        User, UserFilter, UserPatch,
    },
    repository::{Repository, RepositoryState},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicI64, Ordering},
};

/// MockRepo
///
/// A stateful in-memory stand-in for the Postgres repository. It reproduces
/// the store's observable semantics (soft delete, overlay updates, join
/// management) so handler tests can run full scenarios without a database.
#[derive(Default)]
pub struct MockRepo {
    pub users: Mutex<Vec<User>>,
    pub projects: Mutex<Vec<Project>>,
    pub risks: Mutex<Vec<Risk>>,
    pub cms: Mutex<Vec<CounterMeasure>>,
    // (user_id, project_id)
    pub user_projects: Mutex<Vec<(i64, i64)>>,
    // (risk_id, project_id)
    pub risk_projects: Mutex<Vec<(i64, i64)>>,
    // (risk_id, counter_measure_id)
    pub risk_cms: Mutex<Vec<(i64, i64)>>,
    next_id: AtomicI64,
}

impl MockRepo {
    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn live<T: Clone>(rows: &[T], deleted_at: impl Fn(&T) -> Option<DateTime<Utc>>) -> Vec<T> {
        rows.iter()
            .filter(|r| deleted_at(r).is_none())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Repository for MockRepo {
    // --- Users ---

    async fn create_user(&self, req: &CreateUserRequest) -> Result<User, sqlx::Error> {
        let user = User {
            id: self.next_id(),
            name: req.name.clone(),
            email: req.email.clone(),
            password: req.password.clone(),
            role: req.role,
            skills: req.skills.clone(),
            status: req.status.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<User>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .filter(|u| filter.name.as_ref().is_none_or(|v| &u.name == v))
            .filter(|u| filter.email.as_ref().is_none_or(|v| &u.email == v))
            .filter(|u| filter.role.is_none_or(|v| u.role == v))
            .filter(|u| filter.skills.as_ref().is_none_or(|v| &u.skills == v))
            .filter(|u| filter.status.as_ref().is_none_or(|v| &u.status == v))
            .cloned()
            .collect())
    }

    async fn all_users(&self) -> Result<Vec<User>, sqlx::Error> {
        Ok(Self::live(&self.users.lock().unwrap(), |u| u.deleted_at))
    }

    async fn users_updated_after(&self, ts: DateTime<Utc>) -> Result<Vec<User>, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.deleted_at.is_none() && u.updated_at > ts)
            .cloned()
            .collect())
    }

    async fn update_user(&self, id: i64, patch: &UserPatch) -> Result<Option<User>, sqlx::Error> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id && u.deleted_at.is_none()) else {
            return Ok(None);
        };
        if let Some(v) = &patch.name {
            user.name = v.clone();
        }
        if let Some(v) = &patch.email {
            user.email = v.clone();
        }
        if let Some(v) = &patch.password {
            user.password = v.clone();
        }
        if let Some(v) = patch.role {
            user.role = v;
        }
        if let Some(v) = &patch.skills {
            user.skills = v.clone();
        }
        if let Some(v) = &patch.status {
            user.status = v.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn replace_user(&self, new: &User) -> Result<Option<User>, sqlx::Error> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users
            .iter_mut()
            .find(|u| u.id == new.id && u.deleted_at.is_none())
        else {
            return Ok(None);
        };
        user.name = new.name.clone();
        user.email = new.email.clone();
        user.password = new.password.clone();
        user.role = new.role;
        user.skills = new.skills.clone();
        user.status = new.status.clone();
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| u.id == id && u.deleted_at.is_none()) {
            Some(user) => {
                user.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_admins_excluding(&self, id: i64) -> Result<i64, sqlx::Error> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.role == 1 && u.id != id && u.deleted_at.is_none())
            .count() as i64)
    }

    async fn projects_of_user(&self, user_id: i64) -> Result<Vec<Project>, sqlx::Error> {
        let joins = self.user_projects.lock().unwrap();
        Ok(self
            .projects
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.deleted_at.is_none())
            .filter(|p| joins.contains(&(user_id, p.id)))
            .cloned()
            .collect())
    }

    async fn risks_of_user(&self, user_id: i64) -> Result<Vec<Risk>, sqlx::Error> {
        Ok(self
            .risks
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.deleted_at.is_none() && r.user_id == user_id)
            .cloned()
            .collect())
    }

    // --- Projects ---

    async fn create_project(&self, req: &ProjectRequest) -> Result<Project, sqlx::Error> {
        let project = Project {
            id: self.next_id(),
            name: req.name.clone(),
            description: req.description.clone(),
            start: req.start.clone(),
            end: req.end.clone(),
            is_finished: false,
            manager_id: req.manager_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        self.projects.lock().unwrap().push(project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: i64) -> Result<Option<Project>, sqlx::Error> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id && p.deleted_at.is_none())
            .cloned())
    }

    async fn find_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, sqlx::Error> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.deleted_at.is_none())
            .filter(|p| filter.name.as_ref().is_none_or(|v| &p.name == v))
            .filter(|p| filter.is_finished.is_none_or(|v| p.is_finished == v))
            .filter(|p| filter.manager_id.is_none_or(|v| p.manager_id == v))
            .cloned()
            .collect())
    }

    async fn all_projects(&self) -> Result<Vec<Project>, sqlx::Error> {
        Ok(Self::live(&self.projects.lock().unwrap(), |p| p.deleted_at))
    }

    async fn projects_updated_after(
        &self,
        ts: DateTime<Utc>,
    ) -> Result<Vec<Project>, sqlx::Error> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.deleted_at.is_none() && p.updated_at > ts)
            .cloned()
            .collect())
    }

    async fn update_project(
        &self,
        id: i64,
        patch: &ProjectPatch,
    ) -> Result<Option<Project>, sqlx::Error> {
        let mut projects = self.projects.lock().unwrap();
        let Some(project) = projects
            .iter_mut()
            .find(|p| p.id == id && p.deleted_at.is_none())
        else {
            return Ok(None);
        };
        if let Some(v) = &patch.name {
            project.name = v.clone();
        }
        if let Some(v) = &patch.description {
            project.description = v.clone();
        }
        if let Some(v) = &patch.start {
            project.start = v.clone();
        }
        if let Some(v) = &patch.end {
            project.end = v.clone();
        }
        if let Some(v) = patch.is_finished {
            project.is_finished = v;
        }
        if let Some(v) = patch.manager_id {
            project.manager_id = v;
        }
        project.updated_at = Utc::now();
        Ok(Some(project.clone()))
    }

    async fn replace_project(&self, new: &Project) -> Result<Option<Project>, sqlx::Error> {
        let mut projects = self.projects.lock().unwrap();
        let Some(project) = projects
            .iter_mut()
            .find(|p| p.id == new.id && p.deleted_at.is_none())
        else {
            return Ok(None);
        };
        project.name = new.name.clone();
        project.description = new.description.clone();
        project.start = new.start.clone();
        project.end = new.end.clone();
        project.is_finished = new.is_finished;
        project.manager_id = new.manager_id;
        project.updated_at = Utc::now();
        Ok(Some(project.clone()))
    }

    async fn delete_project(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut projects = self.projects.lock().unwrap();
        match projects
            .iter_mut()
            .find(|p| p.id == id && p.deleted_at.is_none())
        {
            Some(project) => {
                project.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn assign_user_to_project(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<(), sqlx::Error> {
        let mut joins = self.user_projects.lock().unwrap();
        if !joins.contains(&(user_id, project_id)) {
            joins.push((user_id, project_id));
        }
        Ok(())
    }

    async fn unassign_user_from_project(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<(), sqlx::Error> {
        self.user_projects
            .lock()
            .unwrap()
            .retain(|&(u, p)| !(u == user_id && p == project_id));
        Ok(())
    }

    async fn users_of_project(&self, project_id: i64) -> Result<Vec<User>, sqlx::Error> {
        let joins = self.user_projects.lock().unwrap();
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.deleted_at.is_none())
            .filter(|u| joins.contains(&(u.id, project_id)))
            .cloned()
            .collect())
    }

    async fn assign_risk_to_project(
        &self,
        project_id: i64,
        risk_id: i64,
    ) -> Result<(), sqlx::Error> {
        let mut joins = self.risk_projects.lock().unwrap();
        if !joins.contains(&(risk_id, project_id)) {
            joins.push((risk_id, project_id));
        }
        Ok(())
    }

    async fn unassign_risk_from_project(
        &self,
        project_id: i64,
        risk_id: i64,
    ) -> Result<(), sqlx::Error> {
        self.risk_projects
            .lock()
            .unwrap()
            .retain(|&(r, p)| !(r == risk_id && p == project_id));
        Ok(())
    }

    async fn risks_of_project(&self, project_id: i64) -> Result<Vec<Risk>, sqlx::Error> {
        let joins = self.risk_projects.lock().unwrap();
        Ok(self
            .risks
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.deleted_at.is_none())
            .filter(|r| joins.contains(&(r.id, project_id)))
            .cloned()
            .collect())
    }

    async fn risks_of_projects(&self, project_ids: &[i64]) -> Result<Vec<Risk>, sqlx::Error> {
        let joins = self.risk_projects.lock().unwrap();
        Ok(self
            .risks
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.deleted_at.is_none())
            .filter(|r| {
                project_ids
                    .iter()
                    .any(|&p| joins.contains(&(r.id, p)))
            })
            .cloned()
            .collect())
    }

    // --- Risks ---

    async fn create_risk(&self, req: &RiskRequest) -> Result<Risk, sqlx::Error> {
        let risk = Risk {
            id: self.next_id(),
            value: req.value,
            cost: req.cost,
            probability: req.probability,
            risk: req.risk,
            name: req.name.clone(),
            description: req.description.clone(),
            category: req.category.clone(),
            threat: req.threat.clone(),
            status: req.status.clone(),
            trigger: req.trigger.clone(),
            impact: req.impact,
            start: req.start.clone(),
            end: req.end.clone(),
            user_id: req.user_id,
            counter_measure_used: req.counter_measure_used,
            counter_measure_cost: req.counter_measure_cost,
            counter_measure_desc: req.counter_measure_desc.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        self.risks.lock().unwrap().push(risk.clone());
        Ok(risk)
    }

    async fn get_risk(&self, id: i64) -> Result<Option<Risk>, sqlx::Error> {
        Ok(self
            .risks
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id && r.deleted_at.is_none())
            .cloned())
    }

    async fn find_risks(&self, filter: &RiskFilter) -> Result<Vec<Risk>, sqlx::Error> {
        Ok(self
            .risks
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.deleted_at.is_none())
            .filter(|r| filter.name.as_ref().is_none_or(|v| &r.name == v))
            .filter(|r| filter.category.as_ref().is_none_or(|v| &r.category == v))
            .filter(|r| filter.status.as_ref().is_none_or(|v| &r.status == v))
            .filter(|r| filter.user_id.is_none_or(|v| r.user_id == v))
            .cloned()
            .collect())
    }

    async fn all_risks(&self) -> Result<Vec<Risk>, sqlx::Error> {
        Ok(Self::live(&self.risks.lock().unwrap(), |r| r.deleted_at))
    }

    async fn risks_updated_after(&self, ts: DateTime<Utc>) -> Result<Vec<Risk>, sqlx::Error> {
        Ok(self
            .risks
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.deleted_at.is_none() && r.updated_at > ts)
            .cloned()
            .collect())
    }

    async fn update_risk(&self, id: i64, patch: &RiskPatch) -> Result<Option<Risk>, sqlx::Error> {
        let mut risks = self.risks.lock().unwrap();
        let Some(risk) = risks.iter_mut().find(|r| r.id == id && r.deleted_at.is_none()) else {
            return Ok(None);
        };
        if let Some(v) = patch.value {
            risk.value = v;
        }
        if let Some(v) = patch.cost {
            risk.cost = v;
        }
        if let Some(v) = patch.probability {
            risk.probability = v;
        }
        if let Some(v) = patch.risk {
            risk.risk = v;
        }
        if let Some(v) = &patch.name {
            risk.name = v.clone();
        }
        if let Some(v) = &patch.description {
            risk.description = v.clone();
        }
        if let Some(v) = &patch.category {
            risk.category = v.clone();
        }
        if let Some(v) = &patch.threat {
            risk.threat = v.clone();
        }
        if let Some(v) = &patch.status {
            risk.status = v.clone();
        }
        if let Some(v) = &patch.trigger {
            risk.trigger = v.clone();
        }
        if let Some(v) = patch.impact {
            risk.impact = v;
        }
        if let Some(v) = &patch.start {
            risk.start = v.clone();
        }
        if let Some(v) = &patch.end {
            risk.end = v.clone();
        }
        if let Some(v) = patch.user_id {
            risk.user_id = v;
        }
        if let Some(v) = patch.counter_measure_used {
            risk.counter_measure_used = v;
        }
        if let Some(v) = patch.counter_measure_cost {
            risk.counter_measure_cost = v;
        }
        if let Some(v) = &patch.counter_measure_desc {
            risk.counter_measure_desc = v.clone();
        }
        risk.updated_at = Utc::now();
        Ok(Some(risk.clone()))
    }

    async fn replace_risk(&self, new: &Risk) -> Result<Option<Risk>, sqlx::Error> {
        let mut risks = self.risks.lock().unwrap();
        let Some(risk) = risks
            .iter_mut()
            .find(|r| r.id == new.id && r.deleted_at.is_none())
        else {
            return Ok(None);
        };
        let id = risk.id;
        let created_at = risk.created_at;
        *risk = new.clone();
        risk.id = id;
        risk.created_at = created_at;
        risk.updated_at = Utc::now();
        risk.deleted_at = None;
        Ok(Some(risk.clone()))
    }

    async fn delete_risk(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut risks = self.risks.lock().unwrap();
        match risks.iter_mut().find(|r| r.id == id && r.deleted_at.is_none()) {
            Some(risk) => {
                risk.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn projects_of_risk(&self, risk_id: i64) -> Result<Vec<Project>, sqlx::Error> {
        let joins = self.risk_projects.lock().unwrap();
        Ok(self
            .projects
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.deleted_at.is_none())
            .filter(|p| joins.contains(&(risk_id, p.id)))
            .cloned()
            .collect())
    }

    async fn assign_cm_to_risk(&self, risk_id: i64, cm_id: i64) -> Result<(), sqlx::Error> {
        let mut joins = self.risk_cms.lock().unwrap();
        if !joins.contains(&(risk_id, cm_id)) {
            joins.push((risk_id, cm_id));
        }
        Ok(())
    }

    async fn unassign_cm_from_risk(&self, risk_id: i64, cm_id: i64) -> Result<(), sqlx::Error> {
        self.risk_cms
            .lock()
            .unwrap()
            .retain(|&(r, c)| !(r == risk_id && c == cm_id));
        Ok(())
    }

    async fn countermeasures_of_risk(
        &self,
        risk_id: i64,
    ) -> Result<Vec<CounterMeasure>, sqlx::Error> {
        let joins = self.risk_cms.lock().unwrap();
        Ok(self
            .cms
            .lock()
            .unwrap()
            .iter()
            .filter(|cm| cm.deleted_at.is_none())
            .filter(|cm| joins.contains(&(risk_id, cm.id)))
            .cloned()
            .collect())
    }

    // --- CounterMeasures ---

    async fn create_countermeasure(
        &self,
        req: &CounterMeasureRequest,
    ) -> Result<CounterMeasure, sqlx::Error> {
        let cm = CounterMeasure {
            id: self.next_id(),
            name: req.name.clone(),
            description: req.description.clone(),
            cost: req.cost,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        self.cms.lock().unwrap().push(cm.clone());
        Ok(cm)
    }

    async fn get_countermeasure(&self, id: i64) -> Result<Option<CounterMeasure>, sqlx::Error> {
        Ok(self
            .cms
            .lock()
            .unwrap()
            .iter()
            .find(|cm| cm.id == id && cm.deleted_at.is_none())
            .cloned())
    }

    async fn all_countermeasures(&self) -> Result<Vec<CounterMeasure>, sqlx::Error> {
        Ok(Self::live(&self.cms.lock().unwrap(), |cm| cm.deleted_at))
    }

    async fn update_countermeasure(
        &self,
        id: i64,
        patch: &CounterMeasurePatch,
    ) -> Result<Option<CounterMeasure>, sqlx::Error> {
        let mut cms = self.cms.lock().unwrap();
        let Some(cm) = cms.iter_mut().find(|c| c.id == id && c.deleted_at.is_none()) else {
            return Ok(None);
        };
        if let Some(v) = &patch.name {
            cm.name = v.clone();
        }
        if let Some(v) = &patch.description {
            cm.description = v.clone();
        }
        if let Some(v) = patch.cost {
            cm.cost = v;
        }
        cm.updated_at = Utc::now();
        Ok(Some(cm.clone()))
    }

    async fn delete_countermeasure(&self, id: i64) -> Result<bool, sqlx::Error> {
        let mut cms = self.cms.lock().unwrap();
        match cms.iter_mut().find(|c| c.id == id && c.deleted_at.is_none()) {
            Some(cm) => {
                cm.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn risks_of_countermeasure(&self, cm_id: i64) -> Result<Vec<Risk>, sqlx::Error> {
        let joins = self.risk_cms.lock().unwrap();
        Ok(self
            .risks
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.deleted_at.is_none())
            .filter(|r| joins.contains(&(r.id, cm_id)))
            .cloned()
            .collect())
    }
}

// --- State & seeding helpers ---

/// Builds an `AppState` over a fresh mock repository and hands back the mock
/// for direct inspection.
pub fn app_state() -> (Arc<MockRepo>, AppState) {
    let mock = Arc::new(MockRepo::default());
    let state = AppState {
        repo: mock.clone() as RepositoryState,
        config: AppConfig::default(),
    };
    (mock, state)
}

pub fn seed_user(mock: &MockRepo, role: i32, email: &str, password: &str) -> User {
    let user = User {
        id: mock.next_id(),
        name: format!("user-{email}"),
        email: email.to_string(),
        password: password.to_string(),
        role,
        skills: String::new(),
        status: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    };
    mock.users.lock().unwrap().push(user.clone());
    user
}

pub fn seed_project(mock: &MockRepo, name: &str, manager_id: i64) -> Project {
    let project = Project {
        id: mock.next_id(),
        name: name.to_string(),
        description: String::new(),
        start: "01-01-2024".to_string(),
        end: "31-12-2024".to_string(),
        is_finished: false,
        manager_id,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    };
    mock.projects.lock().unwrap().push(project.clone());
    project
}

pub fn seed_risk(mock: &MockRepo, name: &str, user_id: i64) -> Risk {
    let risk = Risk {
        id: mock.next_id(),
        value: 1.0,
        cost: 100,
        probability: 0.5,
        risk: 0.25,
        name: name.to_string(),
        description: String::new(),
        category: "technical".to_string(),
        threat: String::new(),
        status: "open".to_string(),
        trigger: String::new(),
        impact: 0.2,
        start: "01-02-2024".to_string(),
        end: "01-06-2024".to_string(),
        user_id,
        counter_measure_used: false,
        counter_measure_cost: 0,
        counter_measure_desc: String::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    };
    mock.risks.lock().unwrap().push(risk.clone());
    risk
}

pub fn seed_countermeasure(mock: &MockRepo, name: &str) -> CounterMeasure {
    let cm = CounterMeasure {
        id: mock.next_id(),
        name: name.to_string(),
        description: String::new(),
        cost: 50,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    };
    mock.cms.lock().unwrap().push(cm.clone());
    cm
}
