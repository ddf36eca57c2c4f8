use serde::Deserialize;
use shared::{
    domain::{ClassId, ProjectId, ProjectStatus},
    error::ApiError,
    protocol::{MessageResponse, ProjectSummary},
};
use storage::{NewProject, ProjectUpdate};
use tracing::info;

use crate::{forbidden, internal, not_found, present, validation, ApiContext, Caller};

#[derive(Debug, Default, Deserialize)]
pub struct CreateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "classId", alias = "class")]
    pub class_id: Option<i64>,
    #[serde(alias = "teamSize")]
    pub team_size: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "teamSize")]
    pub team_size: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

pub async fn create_project(
    ctx: &ApiContext,
    caller: Caller,
    req: CreateProjectRequest,
) -> Result<ProjectSummary, ApiError> {
    caller.require_staff_or_teacher()?;
    let (Some(title), Some(description), Some(class_id), Some(team_size)) = (
        present(req.title.as_deref()),
        present(req.description.as_deref()),
        req.class_id.map(ClassId),
        req.team_size,
    ) else {
        return Err(validation(
            "Title, description, class and team size are required",
        ));
    };
    check_team_size(team_size)?;
    ctx.storage
        .class_teacher(class_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Class not found"))?;

    let project_id = ctx
        .storage
        .create_project(NewProject {
            title,
            description,
            class_id,
            created_by: caller.user_id,
            team_size,
        })
        .await
        .map_err(internal)?;
    info!(project_id = project_id.0, class_id = class_id.0, "project created");
    load(ctx, project_id).await
}

pub async fn list_projects(ctx: &ApiContext) -> Result<Vec<ProjectSummary>, ApiError> {
    ctx.storage.list_projects().await.map_err(internal)
}

pub async fn get_project(ctx: &ApiContext, project_id: ProjectId) -> Result<ProjectSummary, ApiError> {
    load(ctx, project_id).await
}

pub async fn update_project(
    ctx: &ApiContext,
    caller: Caller,
    project_id: ProjectId,
    req: UpdateProjectRequest,
) -> Result<ProjectSummary, ApiError> {
    created_by_caller(ctx, caller, project_id).await?;
    if let Some(team_size) = req.team_size {
        check_team_size(team_size)?;
    }
    let status = req.status.as_deref().map(parse_status).transpose()?;

    ctx.storage
        .update_project(
            project_id,
            ProjectUpdate {
                title: present(req.title.as_deref()),
                description: present(req.description.as_deref()),
                team_size: req.team_size,
                status,
            },
        )
        .await
        .map_err(internal)?;
    load(ctx, project_id).await
}

pub async fn set_status(
    ctx: &ApiContext,
    caller: Caller,
    project_id: ProjectId,
    req: StatusRequest,
) -> Result<ProjectSummary, ApiError> {
    created_by_caller(ctx, caller, project_id).await?;
    let status = parse_status(req.status.as_deref().unwrap_or_default())?;
    ctx.storage
        .update_project(
            project_id,
            ProjectUpdate {
                status: Some(status),
                ..ProjectUpdate::default()
            },
        )
        .await
        .map_err(internal)?;
    info!(project_id = project_id.0, status = status.as_str(), "project status changed");
    load(ctx, project_id).await
}

pub async fn delete_project(
    ctx: &ApiContext,
    caller: Caller,
    project_id: ProjectId,
) -> Result<MessageResponse, ApiError> {
    created_by_caller(ctx, caller, project_id).await?;
    ctx.storage
        .delete_project(project_id)
        .await
        .map_err(internal)?;
    info!(project_id = project_id.0, "project deleted");
    Ok(MessageResponse::new("Project deleted successfully"))
}

pub(crate) async fn load(ctx: &ApiContext, project_id: ProjectId) -> Result<ProjectSummary, ApiError> {
    ctx.storage
        .load_project(project_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Project not found"))
}

async fn created_by_caller(
    ctx: &ApiContext,
    caller: Caller,
    project_id: ProjectId,
) -> Result<ProjectSummary, ApiError> {
    let project = load(ctx, project_id).await?;
    if project.created_by != caller.user_id {
        return Err(forbidden("Not authorized"));
    }
    Ok(project)
}

fn check_team_size(team_size: i64) -> Result<(), ApiError> {
    if team_size < 1 {
        return Err(validation("Team size must be at least 1"));
    }
    Ok(())
}

fn parse_status(raw: &str) -> Result<ProjectStatus, ApiError> {
    raw.trim()
        .parse::<ProjectStatus>()
        .map_err(|_| validation("Invalid status"))
}

#[cfg(test)]
#[path = "tests/projects_tests.rs"]
mod tests;
