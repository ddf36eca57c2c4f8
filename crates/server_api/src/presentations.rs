//! The live-session relay. Each operation forwards its body to one channel
//! and keeps nothing; subscribers treat the newest message as the truth.

use serde::Deserialize;
use serde_json::{json, Value};
use shared::{
    domain::ProjectId,
    error::{ApiError, ErrorCode},
    presentation::{
        presentation_channel, queue_channel, EvaluationTogglePayload, PresentationEvent,
    },
    protocol::MessageResponse,
};
use tracing::warn;

use crate::{internal, validation, ApiContext};

#[derive(Debug, Default, Deserialize)]
pub struct TeamBody {
    #[serde(default)]
    pub team: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueueBody {
    #[serde(default)]
    pub teams: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleBody {
    #[serde(default)]
    pub enabled: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimerBody {
    #[serde(default)]
    pub timer: Value,
    #[serde(default)]
    pub team: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormPushBody {
    #[serde(default)]
    pub form: Value,
}

pub async fn start(
    ctx: &ApiContext,
    project_id: ProjectId,
    body: TeamBody,
) -> Result<MessageResponse, ApiError> {
    ctx.relay
        .publish(
            &presentation_channel(project_id),
            PresentationEvent::PresentationStart.as_str(),
            &json!({ "team": body.team, "timer": 0 }),
            "Failed to start presentation",
        )
        .await?;
    Ok(MessageResponse::new("Presentation started"))
}

pub async fn end(
    ctx: &ApiContext,
    project_id: ProjectId,
    body: TeamBody,
) -> Result<MessageResponse, ApiError> {
    ctx.relay
        .publish(
            &presentation_channel(project_id),
            PresentationEvent::PresentationEnd.as_str(),
            &json!({ "team": body.team }),
            "Failed to end presentation",
        )
        .await?;
    Ok(MessageResponse::new("Presentation ended"))
}

pub async fn update_queue(
    ctx: &ApiContext,
    project_id: ProjectId,
    body: QueueBody,
) -> Result<MessageResponse, ApiError> {
    ctx.relay
        .publish(
            &queue_channel(project_id),
            PresentationEvent::QueueUpdate.as_str(),
            &json!({ "teams": body.teams }),
            "Failed to update queue",
        )
        .await?;
    Ok(MessageResponse::new("Queue updated"))
}

pub async fn toggle_evaluation(
    ctx: &ApiContext,
    project_id: ProjectId,
    body: ToggleBody,
) -> Result<MessageResponse, ApiError> {
    let payload = EvaluationTogglePayload {
        enabled: body.enabled,
        time_limit: None,
    };
    ctx.relay
        .publish(
            &presentation_channel(project_id),
            PresentationEvent::EvaluationToggle.as_str(),
            &to_value(&payload)?,
            "Failed to toggle evaluation",
        )
        .await?;
    Ok(MessageResponse::new("Evaluation toggled"))
}

pub async fn update_current_team(
    ctx: &ApiContext,
    project_id: ProjectId,
    body: TeamBody,
) -> Result<MessageResponse, ApiError> {
    ctx.relay
        .publish(
            &presentation_channel(project_id),
            PresentationEvent::CurrentTeamUpdate.as_str(),
            &json!({ "team": body.team }),
            "Failed to update current team",
        )
        .await?;
    Ok(MessageResponse::new("Current team updated"))
}

pub async fn update_timer(
    ctx: &ApiContext,
    project_id: ProjectId,
    body: TimerBody,
) -> Result<MessageResponse, ApiError> {
    if !body.timer.is_number() {
        return Err(validation("Timer must be a number"));
    }
    if !ctx.relay.is_enabled() {
        warn!(project_id = project_id.0, "timer update dropped; realtime not available");
        return Ok(MessageResponse::new("Timer updated (realtime not available)"));
    }
    ctx.relay
        .publish(
            &presentation_channel(project_id),
            PresentationEvent::TimerUpdate.as_str(),
            &json!({ "timer": body.timer, "team": body.team }),
            "Failed to update timer",
        )
        .await?;
    Ok(MessageResponse::new("Timer and team updated"))
}

/// Sends the form, then opens the evaluation window for the form's
/// evaluation time. The two publishes are not atomic.
pub async fn push_evaluation_form(
    ctx: &ApiContext,
    project_id: ProjectId,
    body: FormPushBody,
) -> Result<MessageResponse, ApiError> {
    if !ctx.relay.is_enabled() {
        return Err(ApiError::new(
            ErrorCode::Unavailable,
            "Realtime transport not configured",
        ));
    }
    if !body.form.is_object() {
        return Err(validation("Form is required"));
    }

    let failure = "Failed to push evaluation form";
    let channel = presentation_channel(project_id);
    ctx.relay
        .publish(
            &channel,
            PresentationEvent::EvaluationFormUpdate.as_str(),
            &body.form,
            failure,
        )
        .await?;

    let time_limit = body
        .form
        .get("evaluationTime")
        .or_else(|| body.form.get("evaluation_time"))
        .filter(|v| !v.is_null())
        .cloned();
    let toggle = EvaluationTogglePayload {
        enabled: Value::Bool(true),
        time_limit,
    };
    ctx.relay
        .publish(
            &channel,
            PresentationEvent::EvaluationToggle.as_str(),
            &to_value(&toggle)?,
            failure,
        )
        .await?;
    Ok(MessageResponse::new("Evaluation form pushed to peers"))
}

fn to_value(payload: &EvaluationTogglePayload) -> Result<Value, ApiError> {
    serde_json::to_value(payload).map_err(|err| internal(err.into()))
}

#[cfg(test)]
#[path = "tests/presentations_tests.rs"]
mod tests;
