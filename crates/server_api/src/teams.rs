use serde::Deserialize;
use serde_json::{Map, Value};
use shared::{
    domain::{ClassId, ProjectId, TeamId},
    error::ApiError,
    presentation::{MemberAddedPayload, TeamEvent, TEAMS_CHANNEL},
    protocol::{MessageResponse, TeamSummary},
};
use storage::NewTeam;
use tracing::info;

use crate::{
    classes::{normalize_usn, owned_by_caller},
    internal, not_found, present, projects, validation, ApiContext, Caller,
};

const UPDATABLE_FIELDS: [&str; 2] = ["name", "description"];

#[derive(Debug, Default, Deserialize)]
pub struct CreateTeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "classId")]
    pub class_id: Option<i64>,
    #[serde(alias = "projectId", alias = "project")]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddMemberRequest {
    #[serde(alias = "memberId")]
    pub member_id: Option<String>,
}

pub async fn create_team(ctx: &ApiContext, req: CreateTeamRequest) -> Result<TeamSummary, ApiError> {
    let Some(class_id) = req.class_id.map(ClassId) else {
        return Err(validation("Class ID is required"));
    };
    ctx.storage
        .class_teacher(class_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Class not found"))?;

    let Some(name) = present(req.name.as_deref()) else {
        return Err(validation("Team name is required"));
    };
    let description = req.description.as_deref().map(str::trim).unwrap_or_default();

    let mut members: Vec<String> = Vec::with_capacity(req.members.len());
    for raw in &req.members {
        let usn = normalize_usn(raw)?;
        if members.contains(&usn) {
            return Err(validation(format!("Duplicate member: {usn}")));
        }
        members.push(usn);
    }
    if members.is_empty() {
        return Err(validation("Team needs at least one member"));
    }

    let project_id = req.project_id.map(ProjectId);
    if let Some(project_id) = project_id {
        let project = projects::load(ctx, project_id).await?;
        if project.class.class_id != class_id {
            return Err(validation("Project does not belong to this class"));
        }
        if members.len() as i64 > project.team_size {
            return Err(validation(format!(
                "Team exceeds the project team size of {}",
                project.team_size
            )));
        }
    }

    let team_id = ctx
        .storage
        .create_team(NewTeam {
            name,
            description,
            class_id,
            project_id,
            members: &members,
        })
        .await
        .map_err(internal)?;
    info!(team_id = team_id.0, class_id = class_id.0, members = members.len(), "team created");
    load(ctx, team_id).await
}

pub async fn list_teams_for_class(
    ctx: &ApiContext,
    class_id: ClassId,
) -> Result<Vec<TeamSummary>, ApiError> {
    ctx.storage
        .list_teams_for_class(class_id)
        .await
        .map_err(internal)
}

pub async fn list_teams_for_project(
    ctx: &ApiContext,
    project_id: ProjectId,
) -> Result<Vec<TeamSummary>, ApiError> {
    ctx.storage
        .list_teams_for_project(project_id)
        .await
        .map_err(internal)
}

pub async fn get_team(ctx: &ApiContext, team_id: TeamId) -> Result<TeamSummary, ApiError> {
    load(ctx, team_id).await
}

/// Accepts only `name` and `description`; any other key rejects the whole
/// update.
pub async fn update_team(
    ctx: &ApiContext,
    caller: Caller,
    team_id: TeamId,
    updates: Map<String, Value>,
) -> Result<TeamSummary, ApiError> {
    if updates
        .keys()
        .any(|key| !UPDATABLE_FIELDS.contains(&key.as_str()))
    {
        return Err(validation("Invalid updates"));
    }
    let text = |key: &str| -> Result<Option<String>, ApiError> {
        match updates.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.trim().to_string())),
            Some(_) => Err(validation("Invalid data")),
        }
    };
    let name = text("name")?;
    let description = text("description")?;
    if name.as_deref() == Some("") {
        return Err(validation("Team name is required"));
    }

    let team = load(ctx, team_id).await?;
    owned_by_caller(ctx, caller, team.class_id, "Not authorized").await?;

    ctx.storage
        .update_team(team_id, name.as_deref(), description.as_deref())
        .await
        .map_err(internal)?;
    let team = load(ctx, team_id).await?;

    let payload = serde_json::to_value(&team).map_err(|err| internal(err.into()))?;
    ctx.relay
        .notify(TEAMS_CHANNEL, TeamEvent::Updated.as_str(), &payload)
        .await;
    Ok(team)
}

pub async fn delete_team(
    ctx: &ApiContext,
    caller: Caller,
    team_id: TeamId,
) -> Result<MessageResponse, ApiError> {
    let team = load(ctx, team_id).await?;
    owned_by_caller(ctx, caller, team.class_id, "Not authorized").await?;
    ctx.storage.delete_team(team_id).await.map_err(internal)?;
    info!(team_id = team_id.0, "team deleted");
    Ok(MessageResponse::new("Team deleted successfully"))
}

pub async fn add_member(
    ctx: &ApiContext,
    caller: Caller,
    team_id: TeamId,
    req: AddMemberRequest,
) -> Result<TeamSummary, ApiError> {
    let Some(raw) = present(req.member_id.as_deref()) else {
        return Err(validation("Member ID is required"));
    };
    let usn = normalize_usn(raw)?;

    let team = load(ctx, team_id).await?;
    owned_by_caller(ctx, caller, team.class_id, "Not authorized").await?;
    if team.members.contains(&usn) {
        return Err(validation("Member already in team"));
    }
    if let Some(project_id) = team.project_id {
        let project = projects::load(ctx, project_id).await?;
        if team.members.len() as i64 >= project.team_size {
            return Err(validation("Team is full"));
        }
    }

    let added = ctx
        .storage
        .add_team_member(team_id, &usn)
        .await
        .map_err(internal)?;
    if !added {
        return Err(validation("Member already in team"));
    }

    let payload = serde_json::to_value(MemberAddedPayload {
        team_id,
        member_id: usn,
    })
    .map_err(|err| internal(err.into()))?;
    ctx.relay
        .notify(TEAMS_CHANNEL, TeamEvent::MemberAdded.as_str(), &payload)
        .await;
    load(ctx, team_id).await
}

async fn load(ctx: &ApiContext, team_id: TeamId) -> Result<TeamSummary, ApiError> {
    ctx.storage
        .load_team(team_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Team not found"))
}

#[cfg(test)]
#[path = "tests/teams_tests.rs"]
mod tests;
