use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{ProjectId, Role, UserId},
    error::{ApiError, ErrorCode},
    protocol::{AuthResponse, MessageResponse, UserRef, UserSummary},
};
use storage::{normalize_email, NewUser, StoredUser};
use tracing::info;

use crate::{forbidden, internal, not_found, present, validation, ApiContext};

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    iat: i64,
    exp: i64,
}

/// Identity recovered from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(forbidden("Not authorized"))
        }
    }

    pub fn require_staff_or_teacher(&self) -> Result<(), ApiError> {
        self.require_role(&[Role::Admin, Role::LabInstructor, Role::Teacher])
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeerLoginRequest {
    pub usn: Option<String>,
    #[serde(alias = "projectId")]
    pub project_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTeacherRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

/// Input for creating a password account of any role.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: &'a str,
    pub role: Role,
}

pub fn issue_token(cfg: &AuthConfig, user_id: UserId, role: Role) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.0.to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + Duration::seconds(cfg.token_ttl_seconds)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
    )
    .map_err(|err| internal(err.into()))
}

pub fn verify_token(cfg: &AuthConfig, token: &str) -> Result<Caller, ApiError> {
    let invalid = || ApiError::new(ErrorCode::Unauthorized, "Invalid token");
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| invalid())?;
    let user_id = data.claims.sub.parse::<i64>().map_err(|_| invalid())?;
    Ok(Caller {
        user_id: UserId(user_id),
        role: data.claims.role,
    })
}

pub async fn hash_password(cfg: &AuthConfig, password: &str) -> Result<String, ApiError> {
    let password = password.to_owned();
    let cost = cfg.bcrypt_cost;
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|err| internal(err.into()))?
        .map_err(|err| internal(err.into()))
}

async fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|err| internal(err.into()))?
        .map_err(|err| internal(err.into()))
}

pub async fn create_account(
    ctx: &ApiContext,
    account: NewAccount<'_>,
) -> Result<UserSummary, ApiError> {
    let email = normalize_email(account.email);
    if !email.contains('@') {
        return Err(validation("A valid email is required"));
    }
    if ctx
        .storage
        .user_by_email(&email)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(validation("User already exists"));
    }

    let password_hash = hash_password(&ctx.auth, account.password).await?;
    let user_id = ctx
        .storage
        .create_user(NewUser {
            email: Some(&email),
            password_hash: Some(&password_hash),
            name: account.name,
            role: account.role,
            usn: None,
        })
        .await
        .map_err(internal)?;
    info!(user_id = user_id.0, role = account.role.as_str(), "account created");

    Ok(UserSummary {
        user_id,
        email: Some(email),
        name: account.name.to_string(),
        role: account.role,
        usn: None,
    })
}

pub async fn register(ctx: &ApiContext, req: RegisterRequest) -> Result<AuthResponse, ApiError> {
    let (Some(email), Some(password)) = (
        present(req.email.as_deref()),
        present(req.password.as_deref()),
    ) else {
        return Err(validation("Email and password are required"));
    };
    let role = match present(req.role.as_deref()) {
        None => Role::Peer,
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|_| validation("Invalid role"))?,
    };
    if !matches!(role, Role::Teacher | Role::Peer) {
        return Err(forbidden("Role cannot be self-assigned"));
    }
    let name = present(req.name.as_deref())
        .or_else(|| email.split('@').next())
        .unwrap_or(email);

    let user = create_account(
        ctx,
        NewAccount {
            email,
            password,
            name,
            role,
        },
    )
    .await?;
    let token = issue_token(&ctx.auth, user.user_id, user.role)?;
    Ok(AuthResponse { token, user })
}

pub async fn login(ctx: &ApiContext, req: LoginRequest) -> Result<AuthResponse, ApiError> {
    let (Some(email), Some(password)) = (
        present(req.email.as_deref()),
        present(req.password.as_deref()),
    ) else {
        return Err(invalid_credentials());
    };
    let user = authenticate(ctx, email, password).await?;
    respond_with_token(ctx, &user)
}

pub async fn teacher_login(ctx: &ApiContext, req: LoginRequest) -> Result<AuthResponse, ApiError> {
    let (Some(email), Some(password)) = (
        present(req.email.as_deref()),
        present(req.password.as_deref()),
    ) else {
        return Err(validation("Email and password are required"));
    };
    let user = authenticate(ctx, email, password).await?;
    if user.role != Role::Teacher {
        return Err(invalid_credentials());
    }
    respond_with_token(ctx, &user)
}

/// Peers sign in with only a USN; membership in one of the project's teams
/// is the credential.
pub async fn peer_login(ctx: &ApiContext, req: PeerLoginRequest) -> Result<AuthResponse, ApiError> {
    let (Some(usn), Some(project_id)) = (present(req.usn.as_deref()), req.project_id) else {
        return Err(validation("USN and project ID are required"));
    };
    let usn = usn.to_ascii_uppercase();

    let team = ctx
        .storage
        .find_team_for_member(ProjectId(project_id), &usn)
        .await
        .map_err(internal)?;
    if team.is_none() {
        return Err(ApiError::new(
            ErrorCode::Unauthorized,
            "USN not found in any team for this project",
        ));
    }

    let existing = ctx.storage.peer_by_usn(&usn).await.map_err(internal)?;
    let user = match existing {
        Some(user) => user,
        None => {
            let user_id = ctx
                .storage
                .create_user(NewUser {
                    email: None,
                    password_hash: None,
                    name: &usn,
                    role: Role::Peer,
                    usn: Some(&usn),
                })
                .await
                .map_err(internal)?;
            info!(user_id = user_id.0, %usn, "peer account created");
            StoredUser {
                user_id,
                email: None,
                password_hash: None,
                name: usn.clone(),
                role: Role::Peer,
                usn: Some(usn.clone()),
            }
        }
    };
    respond_with_token(ctx, &user)
}

pub async fn create_teacher(
    ctx: &ApiContext,
    caller: Caller,
    req: CreateTeacherRequest,
) -> Result<UserSummary, ApiError> {
    caller.require_role(&[Role::LabInstructor])?;
    let (Some(email), Some(password), Some(name)) = (
        present(req.email.as_deref()),
        present(req.password.as_deref()),
        present(req.name.as_deref()),
    ) else {
        return Err(validation("Email, password and name are required"));
    };
    create_account(
        ctx,
        NewAccount {
            email,
            password,
            name,
            role: Role::Teacher,
        },
    )
    .await
}

pub async fn list_teachers(ctx: &ApiContext, caller: Caller) -> Result<Vec<UserSummary>, ApiError> {
    caller.require_role(&[Role::LabInstructor])?;
    ctx.storage
        .list_users_by_role(Role::Teacher)
        .await
        .map_err(internal)
}

pub async fn public_teachers(ctx: &ApiContext) -> Result<Vec<UserRef>, ApiError> {
    let teachers = ctx
        .storage
        .list_users_by_role(Role::Teacher)
        .await
        .map_err(internal)?;
    Ok(teachers
        .into_iter()
        .map(|teacher| UserRef {
            user_id: teacher.user_id,
            name: teacher.name,
            email: teacher.email,
        })
        .collect())
}

pub async fn delete_teacher(
    ctx: &ApiContext,
    caller: Caller,
    teacher_id: UserId,
) -> Result<MessageResponse, ApiError> {
    caller.require_role(&[Role::LabInstructor])?;
    let user = ctx
        .storage
        .user_by_id(teacher_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Teacher not found"))?;
    if user.role != Role::Teacher {
        return Err(validation("User is not a teacher"));
    }
    let owned = ctx
        .storage
        .owned_record_count(teacher_id)
        .await
        .map_err(internal)?;
    if owned > 0 {
        return Err(validation(
            "Teacher still owns classes, projects or forms; reassign them first",
        ));
    }

    ctx.storage.delete_user(teacher_id).await.map_err(internal)?;
    info!(user_id = teacher_id.0, "teacher deleted");
    Ok(MessageResponse::new("Teacher deleted successfully"))
}

pub async fn me(ctx: &ApiContext, caller: Caller) -> Result<UserSummary, ApiError> {
    ctx.storage
        .user_by_id(caller.user_id)
        .await
        .map_err(internal)?
        .map(|user| user.summary())
        .ok_or_else(|| not_found("User not found"))
}

/// Creates the configured lab-instructor account unless the email is taken.
/// Returns the new account, or `None` when nothing was created.
pub async fn ensure_bootstrap_account(
    ctx: &ApiContext,
    email: &str,
    password: &str,
) -> Result<Option<UserSummary>, ApiError> {
    if ctx
        .storage
        .user_by_email(email)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Ok(None);
    }
    create_account(
        ctx,
        NewAccount {
            email,
            password,
            name: "Lab Instructor",
            role: Role::LabInstructor,
        },
    )
    .await
    .map(Some)
}

async fn authenticate(ctx: &ApiContext, email: &str, password: &str) -> Result<StoredUser, ApiError> {
    let user = ctx
        .storage
        .user_by_email(email)
        .await
        .map_err(internal)?
        .ok_or_else(invalid_credentials)?;
    let Some(hash) = user.password_hash.as_deref() else {
        return Err(invalid_credentials());
    };
    if !verify_password(password, hash).await? {
        return Err(invalid_credentials());
    }
    Ok(user)
}

fn respond_with_token(ctx: &ApiContext, user: &StoredUser) -> Result<AuthResponse, ApiError> {
    let token = issue_token(&ctx.auth, user.user_id, user.role)?;
    Ok(AuthResponse {
        token,
        user: user.summary(),
    })
}

fn invalid_credentials() -> ApiError {
    ApiError::new(ErrorCode::Unauthorized, "Invalid credentials")
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
