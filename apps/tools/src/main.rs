use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use futures::{stream, StreamExt};
use server_api::{
    auth::{create_account, NewAccount},
    ApiContext, AuthConfig, Relay,
};
use shared::{
    domain::{ProjectId, Role},
    presentation::{presentation_channel, queue_channel, RelayedEvent},
    session::{format_clock, PresentationView},
};
use storage::Storage;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/team_sync.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seeds a lab instructor, the role that manages teacher accounts.
    CreateLabInstructor {
        email: String,
        password: String,
        #[arg(long, default_value = "Lab Instructor")]
        name: String,
    },
    CreateTeacher {
        email: String,
        password: String,
        name: String,
    },
    ListTeachers,
    /// Follows a project's live session through the server's websocket hub.
    Watch {
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        server_url: String,
        #[arg(long)]
        project: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::CreateLabInstructor {
            email,
            password,
            name,
        } => {
            let ctx = open_context(&cli.database_url).await?;
            seed_account(&ctx, &email, &password, &name, Role::LabInstructor).await?;
        }
        Command::CreateTeacher {
            email,
            password,
            name,
        } => {
            let ctx = open_context(&cli.database_url).await?;
            seed_account(&ctx, &email, &password, &name, Role::Teacher).await?;
        }
        Command::ListTeachers => {
            let storage = Storage::new(&cli.database_url).await?;
            for teacher in storage.list_users_by_role(Role::Teacher).await? {
                println!(
                    "{}\t{}\t{}",
                    teacher.user_id.0,
                    teacher.email.as_deref().unwrap_or("-"),
                    teacher.name
                );
            }
        }
        Command::Watch {
            server_url,
            project,
        } => watch(&server_url, ProjectId(project)).await?,
    }

    Ok(())
}

async fn open_context(database_url: &str) -> Result<ApiContext> {
    let storage = Storage::new(database_url).await?;
    Ok(ApiContext {
        storage,
        auth: AuthConfig::new(String::new()),
        relay: Relay::disabled(),
    })
}

async fn seed_account(
    ctx: &ApiContext,
    email: &str,
    password: &str,
    name: &str,
    role: Role,
) -> Result<()> {
    let user = create_account(
        ctx,
        NewAccount {
            email,
            password,
            name,
            role,
        },
    )
    .await
    .map_err(|err| anyhow!(err.message))?;
    println!("created {} user_id={}", role.as_str(), user.user_id.0);
    Ok(())
}

async fn watch(server_url: &str, project_id: ProjectId) -> Result<()> {
    let ws_base = if server_url.starts_with("https://") {
        server_url.replacen("https://", "wss://", 1)
    } else if server_url.starts_with("http://") {
        server_url.replacen("http://", "ws://", 1)
    } else {
        return Err(anyhow!("server_url must start with http:// or https://"));
    };

    let mut feeds = Vec::new();
    for channel in [presentation_channel(project_id), queue_channel(project_id)] {
        let ws_url = format!("{ws_base}/ws?channel={channel}");
        let (ws_stream, _) = connect_async(&ws_url)
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        let (_, reader) = ws_stream.split();
        feeds.push(reader);
    }
    let mut events = stream::select_all(feeds);

    let mut view = PresentationView::default();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut last_line = String::new();
    loop {
        tokio::select! {
            msg = events.next() => match msg {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<RelayedEvent>(&text) {
                    Ok(event) => {
                        if !view.apply(&event.event, &event.data) {
                            debug!(event = %event.event, "ignoring untracked event");
                        }
                    }
                    Err(err) => warn!(error = %err, "undecodable relay message"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(err).context("websocket read failed"),
            },
            _ = ticker.tick() => view.tick(),
        }

        let line = render(&view);
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
    }
    Ok(())
}

fn render(view: &PresentationView) -> String {
    let team = view
        .current_team
        .as_ref()
        .map(|team| match team.get("name").and_then(|name| name.as_str()) {
            Some(name) => name.to_string(),
            None => team.to_string(),
        })
        .unwrap_or_else(|| "-".to_string());
    let state = if view.running { "presenting" } else { "idle" };
    let evaluation = match (view.evaluation_enabled, view.evaluation_remaining_secs) {
        (true, Some(secs)) => format!("open {}", format_clock(secs)),
        (true, None) => "open".to_string(),
        (false, _) => "closed".to_string(),
    };
    format!(
        "[{state}] team={team} timer={} queue={} evaluation={evaluation} submissions={}",
        format_clock(view.timer_secs),
        view.queue.len(),
        view.submissions_seen
    )
}
