use serde::Deserialize;
use shared::{
    domain::{EvaluationId, FormId, ProjectId, TeamId},
    error::ApiError,
    protocol::{EvaluationRecord, MessageResponse, Responses},
};
use tracing::info;

use crate::{forbidden, forms::record_evaluation, internal, not_found, validation, ApiContext, Caller};

#[derive(Debug, Default, Deserialize)]
pub struct SubmitEvaluationRequest {
    #[serde(alias = "formId")]
    pub form_id: Option<i64>,
    #[serde(alias = "teamId")]
    pub team_id: Option<i64>,
    pub responses: Option<Responses>,
}

pub async fn list_for_project(
    ctx: &ApiContext,
    project_id: ProjectId,
) -> Result<Vec<EvaluationRecord>, ApiError> {
    ctx.storage
        .list_evaluations_for_project(project_id)
        .await
        .map_err(internal)
}

pub async fn get_evaluation(
    ctx: &ApiContext,
    evaluation_id: EvaluationId,
) -> Result<EvaluationRecord, ApiError> {
    load(ctx, evaluation_id).await
}

/// Submits against an explicitly chosen form rather than the project's newest.
pub async fn submit(
    ctx: &ApiContext,
    caller: Caller,
    project_id: ProjectId,
    req: SubmitEvaluationRequest,
) -> Result<EvaluationRecord, ApiError> {
    let (Some(form_id), Some(responses)) = (req.form_id.map(FormId), req.responses) else {
        return Err(validation("Form ID and responses are required"));
    };
    let form = ctx
        .storage
        .load_form(form_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Form not found"))?;
    if form.project_id != project_id {
        return Err(validation("Form does not belong to this project"));
    }

    record_evaluation(
        ctx,
        caller,
        project_id,
        form_id,
        &form.fields,
        req.team_id.map(TeamId),
        &responses,
    )
    .await
}

pub async fn delete_evaluation(
    ctx: &ApiContext,
    caller: Caller,
    evaluation_id: EvaluationId,
) -> Result<MessageResponse, ApiError> {
    let evaluation = load(ctx, evaluation_id).await?;
    if evaluation.submitted_by.user_id != caller.user_id {
        return Err(forbidden("Not authorized to delete this evaluation"));
    }
    ctx.storage
        .delete_evaluation(evaluation_id)
        .await
        .map_err(internal)?;
    info!(evaluation_id = evaluation_id.0, "evaluation deleted");
    Ok(MessageResponse::new("Evaluation deleted successfully"))
}

async fn load(ctx: &ApiContext, evaluation_id: EvaluationId) -> Result<EvaluationRecord, ApiError> {
    ctx.storage
        .load_evaluation(evaluation_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Evaluation not found"))
}

#[cfg(test)]
#[path = "tests/evaluations_tests.rs"]
mod tests;
