use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ClassId, EvaluationId, FormField, FormId, ProjectId, ProjectStatus, Role, TeamId, UserId,
};

pub const DEFAULT_EVALUATION_TIME_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub user_id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSummary {
    pub class_id: ClassId,
    pub name: String,
    pub semester: String,
    pub students: Vec<String>,
    pub teacher: UserRef,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRef {
    pub class_id: ClassId,
    pub name: String,
    pub semester: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub class: ClassRef,
    pub created_by: UserId,
    pub team_size: i64,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSummary {
    pub team_id: TeamId,
    pub name: String,
    pub description: String,
    pub class_id: ClassId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    pub members: Vec<String>,
    #[serde(default)]
    pub evaluation_ids: Vec<EvaluationId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationFormSummary {
    /// `None` for the blank placeholder returned when a project has no form.
    pub form_id: Option<FormId>,
    pub title: String,
    pub description: String,
    pub fields: Vec<FormField>,
    pub evaluation_time: i64,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
}

impl EvaluationFormSummary {
    pub fn blank(project_id: ProjectId) -> Self {
        Self {
            form_id: None,
            title: String::new(),
            description: String::new(),
            fields: Vec::new(),
            evaluation_time: DEFAULT_EVALUATION_TIME_SECS,
            project_id,
            created_by: None,
        }
    }
}

pub type Responses = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub evaluation_id: EvaluationId,
    pub form_id: FormId,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    pub submitted_by: UserRef,
    pub responses: Responses,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiStatus {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
