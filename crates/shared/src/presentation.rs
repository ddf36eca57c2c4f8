//! Channel and event names shared by the relay and its subscribers.
//!
//! Channels address one project's live session; events name the kind of
//! message. Payload keys follow the browser client (`timeLimit`, `teamId`).

use serde::{Deserialize, Serialize};

use crate::domain::{EvaluationId, ProjectId, TeamId, UserId};

pub const TEAMS_CHANNEL: &str = "teams";

pub fn presentation_channel(project_id: ProjectId) -> String {
    format!("presentation-{}", project_id.0)
}

pub fn queue_channel(project_id: ProjectId) -> String {
    format!("queue-{}", project_id.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresentationEvent {
    TimerUpdate,
    QueueUpdate,
    EvaluationToggle,
    PresentationStart,
    PresentationEnd,
    CurrentTeamUpdate,
    EvaluationFormUpdate,
    EvaluationSubmitted,
}

impl PresentationEvent {
    pub const ALL: [PresentationEvent; 8] = [
        PresentationEvent::TimerUpdate,
        PresentationEvent::QueueUpdate,
        PresentationEvent::EvaluationToggle,
        PresentationEvent::PresentationStart,
        PresentationEvent::PresentationEnd,
        PresentationEvent::CurrentTeamUpdate,
        PresentationEvent::EvaluationFormUpdate,
        PresentationEvent::EvaluationSubmitted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PresentationEvent::TimerUpdate => "timer-update",
            PresentationEvent::QueueUpdate => "queue-update",
            PresentationEvent::EvaluationToggle => "evaluation-toggle",
            PresentationEvent::PresentationStart => "presentation-start",
            PresentationEvent::PresentationEnd => "presentation-end",
            PresentationEvent::CurrentTeamUpdate => "current-team-update",
            PresentationEvent::EvaluationFormUpdate => "evaluation-form-update",
            PresentationEvent::EvaluationSubmitted => "evaluation-submitted",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeamEvent {
    Updated,
    MemberAdded,
}

impl TeamEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            TeamEvent::Updated => "updated",
            TeamEvent::MemberAdded => "member-added",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationTogglePayload {
    pub enabled: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSubmittedPayload {
    pub evaluation_id: EvaluationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    pub submitted_by: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberAddedPayload {
    pub team_id: TeamId,
    pub member_id: String,
}

/// One message as delivered to a subscriber: which channel, which event, and
/// the JSON body the publisher sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedEvent {
    pub channel: String,
    pub event: String,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_embed_project_id() {
        assert_eq!(presentation_channel(ProjectId(12)), "presentation-12");
        assert_eq!(queue_channel(ProjectId(12)), "queue-12");
    }

    #[test]
    fn event_names_parse_back() {
        for event in PresentationEvent::ALL {
            assert_eq!(PresentationEvent::parse(event.as_str()), Some(event));
        }
        assert_eq!(PresentationEvent::parse("presentation-pause"), None);
    }

    #[test]
    fn toggle_payload_uses_client_key_names() {
        let payload = EvaluationTogglePayload {
            enabled: serde_json::Value::Bool(true),
            time_limit: Some(serde_json::json!(300)),
        };
        let value = serde_json::to_value(payload).expect("json");
        assert_eq!(value, serde_json::json!({ "enabled": true, "timeLimit": 300 }));
    }
}
