use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use realtime::{Broadcaster, TriggerError};
use serde_json::Value;
use shared::{
    domain::{ClassId, ProjectId, Role, TeamId},
    presentation::RelayedEvent,
};
use storage::{NewProject, NewTeam, Storage};

use crate::{
    auth::{create_account, NewAccount},
    ApiContext, AuthConfig, Caller, Relay,
};

/// Captures every publish; optionally rejects them all.
#[derive(Default)]
pub(crate) struct RecordingBroadcaster {
    pub(crate) events: Mutex<Vec<RelayedEvent>>,
    pub(crate) fail: bool,
}

impl RecordingBroadcaster {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn events(&self) -> Vec<RelayedEvent> {
        self.events.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn trigger(&self, channel: &str, event: &str, data: &Value) -> Result<(), TriggerError> {
        if self.fail {
            return Err(TriggerError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.events.lock().expect("lock").push(RelayedEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            data: data.clone(),
        });
        Ok(())
    }
}

pub(crate) fn test_auth() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".into(),
        token_ttl_seconds: 3600,
        bcrypt_cost: 4,
    }
}

pub(crate) async fn context_with(relay: Relay) -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext {
        storage,
        auth: test_auth(),
        relay,
    }
}

pub(crate) async fn context() -> ApiContext {
    context_with(Relay::disabled()).await
}

pub(crate) async fn recording_context() -> (ApiContext, Arc<RecordingBroadcaster>) {
    let recorder = Arc::new(RecordingBroadcaster::default());
    let sink: Arc<dyn Broadcaster> = recorder.clone();
    let ctx = context_with(Relay::new(vec![sink])).await;
    (ctx, recorder)
}

pub(crate) async fn account(ctx: &ApiContext, role: Role, email: &str) -> Caller {
    let user = create_account(
        ctx,
        NewAccount {
            email,
            password: "secret-pass",
            name: email,
            role,
        },
    )
    .await
    .expect("account");
    Caller {
        user_id: user.user_id,
        role,
    }
}

pub(crate) struct Fixture {
    pub(crate) teacher: Caller,
    pub(crate) class_id: ClassId,
    pub(crate) project_id: ProjectId,
    pub(crate) team_id: TeamId,
}

/// A teacher owning one class with one project (team size 3) and a
/// two-member team.
pub(crate) async fn fixture(ctx: &ApiContext) -> Fixture {
    let teacher = account(ctx, Role::Teacher, "teacher@school.edu").await;
    let class_id = ctx
        .storage
        .create_class("CS-A", "5", &[], teacher.user_id)
        .await
        .expect("class");
    let project_id = ctx
        .storage
        .create_project(NewProject {
            title: "Compiler",
            description: "Build a compiler",
            class_id,
            created_by: teacher.user_id,
            team_size: 3,
        })
        .await
        .expect("project");
    let members = vec!["1RV21CS001".to_string(), "1RV21CS002".to_string()];
    let team_id = ctx
        .storage
        .create_team(NewTeam {
            name: "Alpha",
            description: "first team",
            class_id,
            project_id: Some(project_id),
            members: &members,
        })
        .await
        .expect("team");
    Fixture {
        teacher,
        class_id,
        project_id,
        team_id,
    }
}
