use serde::Deserialize;
use shared::{
    domain::{FormField, FormId, ProjectId, TeamId},
    error::ApiError,
    presentation::{presentation_channel, EvaluationSubmittedPayload, PresentationEvent},
    protocol::{
        EvaluationFormSummary, EvaluationRecord, MessageResponse, Responses,
        DEFAULT_EVALUATION_TIME_SECS,
    },
    session::truthy,
};
use storage::{NewEvaluation, NewForm};
use tracing::info;

use crate::{forbidden, internal, not_found, present, projects, validation, ApiContext, Caller};

#[derive(Debug, Default, Deserialize)]
pub struct FormRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Option<Vec<FormField>>,
    #[serde(alias = "projectId", alias = "project")]
    pub project_id: Option<i64>,
    #[serde(alias = "evaluationTime")]
    pub evaluation_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitFormRequest {
    pub responses: Option<Responses>,
    #[serde(alias = "teamId")]
    pub team_id: Option<i64>,
}

pub async fn create_form(
    ctx: &ApiContext,
    caller: Caller,
    req: FormRequest,
) -> Result<EvaluationFormSummary, ApiError> {
    caller.require_staff_or_teacher()?;
    let (Some(title), Some(description), Some(fields), Some(project_id)) = (
        present(req.title.as_deref()),
        present(req.description.as_deref()),
        req.fields.as_deref(),
        req.project_id.map(ProjectId),
    ) else {
        return Err(validation("Missing required fields"));
    };
    projects::load(ctx, project_id).await?;

    let evaluation_time = req
        .evaluation_time
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_EVALUATION_TIME_SECS);
    let form_id = ctx
        .storage
        .create_form(NewForm {
            title,
            description,
            fields,
            evaluation_time,
            created_by: caller.user_id,
            project_id,
        })
        .await
        .map_err(internal)?;
    info!(form_id = form_id.0, project_id = project_id.0, "evaluation form created");
    load(ctx, form_id).await
}

/// The project's newest form, or a blank placeholder when it has none.
pub async fn form_for_project(
    ctx: &ApiContext,
    project_id: ProjectId,
) -> Result<EvaluationFormSummary, ApiError> {
    let form = ctx
        .storage
        .latest_form_for_project(project_id)
        .await
        .map_err(internal)?;
    Ok(form.unwrap_or_else(|| EvaluationFormSummary::blank(project_id)))
}

pub async fn update_form(
    ctx: &ApiContext,
    caller: Caller,
    form_id: FormId,
    req: FormRequest,
) -> Result<EvaluationFormSummary, ApiError> {
    let (Some(title), Some(description), Some(fields)) = (
        present(req.title.as_deref()),
        present(req.description.as_deref()),
        req.fields.as_deref(),
    ) else {
        return Err(validation("Missing required fields"));
    };
    let form = load(ctx, form_id).await?;
    if form.created_by != Some(caller.user_id) {
        return Err(forbidden("Not authorized to update this form"));
    }

    ctx.storage
        .update_form(
            form_id,
            title,
            description,
            fields,
            req.evaluation_time.filter(|secs| *secs > 0),
        )
        .await
        .map_err(internal)?;
    load(ctx, form_id).await
}

pub async fn delete_form(
    ctx: &ApiContext,
    caller: Caller,
    form_id: FormId,
) -> Result<MessageResponse, ApiError> {
    let form = load(ctx, form_id).await?;
    if form.created_by != Some(caller.user_id) {
        return Err(forbidden("Not authorized to delete this form"));
    }
    ctx.storage.delete_form(form_id).await.map_err(internal)?;
    info!(form_id = form_id.0, "evaluation form deleted");
    Ok(MessageResponse::new("Evaluation form deleted successfully"))
}

/// Records a peer's evaluation against the project's newest form.
pub async fn submit(
    ctx: &ApiContext,
    caller: Caller,
    project_id: ProjectId,
    req: SubmitFormRequest,
) -> Result<EvaluationRecord, ApiError> {
    let (Some(responses), Some(team_id)) = (req.responses, req.team_id.map(TeamId)) else {
        return Err(validation("Responses and team ID are required"));
    };
    let form = ctx
        .storage
        .latest_form_for_project(project_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Evaluation form not found"))?;
    let form_id = form
        .form_id
        .ok_or_else(|| not_found("Evaluation form not found"))?;

    record_evaluation(ctx, caller, project_id, form_id, &form.fields, Some(team_id), &responses)
        .await
}

/// Labels of required fields whose response is absent or falsy.
pub fn missing_required_fields(fields: &[FormField], responses: &Responses) -> Vec<String> {
    fields
        .iter()
        .filter(|field| field.required)
        .filter(|field| !responses.get(&field.label).is_some_and(truthy))
        .map(|field| field.label.clone())
        .collect()
}

/// Validates and stores one evaluation, then announces it on the project's
/// presentation channel.
pub(crate) async fn record_evaluation(
    ctx: &ApiContext,
    caller: Caller,
    project_id: ProjectId,
    form_id: FormId,
    fields: &[FormField],
    team_id: Option<TeamId>,
    responses: &Responses,
) -> Result<EvaluationRecord, ApiError> {
    let missing = missing_required_fields(fields, responses);
    if !missing.is_empty() {
        return Err(validation("Missing required fields").with_fields(missing));
    }

    if let Some(team_id) = team_id {
        let team = ctx
            .storage
            .load_team(team_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("Team not found"))?;
        if team.project_id != Some(project_id) {
            return Err(validation("Team is not part of this project"));
        }
    }

    let evaluation_id = ctx
        .storage
        .insert_evaluation(NewEvaluation {
            form_id,
            project_id,
            team_id,
            submitted_by: caller.user_id,
            responses,
        })
        .await
        .map_err(internal)?;
    info!(
        evaluation_id = evaluation_id.0,
        project_id = project_id.0,
        submitted_by = caller.user_id.0,
        "evaluation submitted"
    );

    let payload = serde_json::to_value(EvaluationSubmittedPayload {
        evaluation_id,
        team_id,
        submitted_by: caller.user_id,
    })
    .map_err(|err| internal(err.into()))?;
    ctx.relay
        .notify(
            &presentation_channel(project_id),
            PresentationEvent::EvaluationSubmitted.as_str(),
            &payload,
        )
        .await;

    ctx.storage
        .load_evaluation(evaluation_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Evaluation not found"))
}

async fn load(ctx: &ApiContext, form_id: FormId) -> Result<EvaluationFormSummary, ApiError> {
    ctx.storage
        .load_form(form_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Evaluation form not found"))
}

#[cfg(test)]
#[path = "tests/forms_tests.rs"]
mod tests;
