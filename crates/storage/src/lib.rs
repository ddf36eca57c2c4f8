use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{
        ClassId, EvaluationId, FormField, FormId, ProjectId, ProjectStatus, Role, TeamId, UserId,
    },
    protocol::{
        ClassRef, ClassSummary, EvaluationFormSummary, EvaluationRecord, ProjectSummary,
        Responses, TeamSummary, UserRef, UserSummary,
    },
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// A user row including the password hash; never serialized.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user_id: UserId,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub name: String,
    pub role: Role,
    pub usn: Option<String>,
}

impl StoredUser {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            user_id: self.user_id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            usn: self.usn.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub name: &'a str,
    pub role: Role,
    pub usn: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct NewProject<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub class_id: ClassId,
    pub created_by: UserId,
    pub team_size: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub team_size: Option<i64>,
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Clone)]
pub struct NewTeam<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub class_id: ClassId,
    pub project_id: Option<ProjectId>,
    pub members: &'a [String],
}

#[derive(Debug, Clone)]
pub struct NewForm<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub fields: &'a [FormField],
    pub evaluation_time: i64,
    pub created_by: UserId,
    pub project_id: ProjectId,
}

#[derive(Debug, Clone)]
pub struct NewEvaluation<'a> {
    pub form_id: FormId,
    pub project_id: ProjectId,
    pub team_id: Option<TeamId>,
    pub submitted_by: UserId,
    pub responses: &'a Responses,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    // ---- users ----

    pub async fn create_user(&self, user: NewUser<'_>) -> Result<UserId> {
        let now = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO users (email, password_hash, name, role, usn, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.name)
        .bind(user.role.as_str())
        .bind(user.usn)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert user")?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn user_by_id(&self, user_id: UserId) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, name, role, usn FROM users WHERE id = ?",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| stored_user(&r)).transpose()
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, name, role, usn FROM users WHERE email = ?",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| stored_user(&r)).transpose()
    }

    pub async fn peer_by_usn(&self, usn: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, name, role, usn FROM users
             WHERE usn = ? AND role = 'peer'",
        )
        .bind(usn)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| stored_user(&r)).transpose()
    }

    pub async fn list_users_by_role(&self, role: Role) -> Result<Vec<UserSummary>> {
        let rows = sqlx::query(
            "SELECT id, email, password_hash, name, role, usn FROM users
             WHERE role = ?
             ORDER BY lower(name) ASC, id ASC",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| stored_user(r).map(|user| user.summary()))
            .collect()
    }

    /// Classes, projects and forms that still reference this user.
    pub async fn owned_record_count(&self, user_id: UserId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT
                (SELECT COUNT(*) FROM classes WHERE teacher_user_id = ?1)
              + (SELECT COUNT(*) FROM projects WHERE created_by_user_id = ?1)
              + (SELECT COUNT(*) FROM evaluation_forms WHERE created_by_user_id = ?1)",
        )
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn delete_user(&self, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .context("failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    // ---- classes ----

    pub async fn create_class(
        &self,
        name: &str,
        semester: &str,
        students: &[String],
        teacher: UserId,
    ) -> Result<ClassId> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO classes (name, semester, teacher_user_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(name)
        .bind(semester)
        .bind(teacher.0)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let class_id = ClassId(rec.get::<i64, _>(0));

        for (position, usn) in students.iter().enumerate() {
            sqlx::query(
                "INSERT OR IGNORE INTO class_students (class_id, usn, position) VALUES (?, ?, ?)",
            )
            .bind(class_id.0)
            .bind(usn)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(class_id)
    }

    pub async fn load_class(&self, class_id: ClassId) -> Result<Option<ClassSummary>> {
        let row = sqlx::query(
            "SELECT c.id, c.name, c.semester, c.created_at, u.id, u.name, u.email
             FROM classes c
             INNER JOIN users u ON u.id = c.teacher_user_id
             WHERE c.id = ?",
        )
        .bind(class_id.0)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let students = self.class_students(class_id).await?;
        Ok(Some(class_summary(&row, students)))
    }

    pub async fn list_classes(&self) -> Result<Vec<ClassSummary>> {
        let rows = sqlx::query(
            "SELECT c.id, c.name, c.semester, c.created_at, u.id, u.name, u.email
             FROM classes c
             INNER JOIN users u ON u.id = c.teacher_user_id
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let student_rows =
            sqlx::query("SELECT class_id, usn FROM class_students ORDER BY class_id, position")
                .fetch_all(&self.pool)
                .await?;
        let mut students: HashMap<i64, Vec<String>> = HashMap::new();
        for r in student_rows {
            students
                .entry(r.get::<i64, _>(0))
                .or_default()
                .push(r.get::<String, _>(1));
        }

        Ok(rows
            .iter()
            .map(|r| {
                let roster = students.remove(&r.get::<i64, _>(0)).unwrap_or_default();
                class_summary(r, roster)
            })
            .collect())
    }

    pub async fn class_teacher(&self, class_id: ClassId) -> Result<Option<UserId>> {
        let row = sqlx::query("SELECT teacher_user_id FROM classes WHERE id = ?")
            .bind(class_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| UserId(r.get::<i64, _>(0))))
    }

    async fn class_students(&self, class_id: ClassId) -> Result<Vec<String>> {
        let rows =
            sqlx::query("SELECT usn FROM class_students WHERE class_id = ? ORDER BY position")
                .bind(class_id.0)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
    }

    /// `None` fields are left unchanged; `Some(students)` replaces the roster.
    pub async fn update_class(
        &self,
        class_id: ClassId,
        name: Option<&str>,
        semester: Option<&str>,
        students: Option<&[String]>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE classes
             SET name = COALESCE(?, name), semester = COALESCE(?, semester), updated_at = ?
             WHERE id = ?",
        )
        .bind(name)
        .bind(semester)
        .bind(Utc::now())
        .bind(class_id.0)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(students) = students {
            sqlx::query("DELETE FROM class_students WHERE class_id = ?")
                .bind(class_id.0)
                .execute(&mut *tx)
                .await?;
            for (position, usn) in students.iter().enumerate() {
                sqlx::query(
                    "INSERT OR IGNORE INTO class_students (class_id, usn, position) VALUES (?, ?, ?)",
                )
                .bind(class_id.0)
                .bind(usn)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(true)
    }

    /// Returns `false` when the student is already enrolled.
    pub async fn add_class_student(&self, class_id: ClassId, usn: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO class_students (class_id, usn, position)
             SELECT ?1, ?2, COALESCE(MAX(position) + 1, 0) FROM class_students WHERE class_id = ?1",
        )
        .bind(class_id.0)
        .bind(usn)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_class_student(&self, class_id: ClassId, usn: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM class_students WHERE class_id = ? AND usn = ?")
            .bind(class_id.0)
            .bind(usn)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_class_teacher(&self, class_id: ClassId, teacher: UserId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE classes SET teacher_user_id = ?, updated_at = ? WHERE id = ?")
                .bind(teacher.0)
                .bind(Utc::now())
                .bind(class_id.0)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_class(&self, class_id: ClassId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM classes WHERE id = ?")
            .bind(class_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- projects ----

    pub async fn create_project(&self, project: NewProject<'_>) -> Result<ProjectId> {
        let now = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO projects
                (title, description, class_id, created_by_user_id, team_size, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'active', ?, ?)
             RETURNING id",
        )
        .bind(project.title)
        .bind(project.description)
        .bind(project.class_id.0)
        .bind(project.created_by.0)
        .bind(project.team_size)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert project")?;
        Ok(ProjectId(rec.get::<i64, _>(0)))
    }

    pub async fn load_project(&self, project_id: ProjectId) -> Result<Option<ProjectSummary>> {
        let row = sqlx::query(
            "SELECT p.id, p.title, p.description, c.id, c.name, c.semester,
                    p.created_by_user_id, p.team_size, p.status, p.created_at, p.updated_at
             FROM projects p
             INNER JOIN classes c ON c.id = p.class_id
             WHERE p.id = ?",
        )
        .bind(project_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| project_summary(&r)).transpose()
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let rows = sqlx::query(
            "SELECT p.id, p.title, p.description, c.id, c.name, c.semester,
                    p.created_by_user_id, p.team_size, p.status, p.created_at, p.updated_at
             FROM projects p
             INNER JOIN classes c ON c.id = p.class_id
             ORDER BY p.created_at DESC, p.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(project_summary).collect()
    }

    pub async fn update_project(
        &self,
        project_id: ProjectId,
        update: ProjectUpdate<'_>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE projects
             SET title = COALESCE(?, title),
                 description = COALESCE(?, description),
                 team_size = COALESCE(?, team_size),
                 status = COALESCE(?, status),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(update.title)
        .bind(update.description)
        .bind(update.team_size)
        .bind(update.status.map(ProjectStatus::as_str))
        .bind(Utc::now())
        .bind(project_id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_project(&self, project_id: ProjectId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- teams ----

    pub async fn create_team(&self, team: NewTeam<'_>) -> Result<TeamId> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO teams (name, description, class_id, project_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(team.name)
        .bind(team.description)
        .bind(team.class_id.0)
        .bind(team.project_id.map(|id| id.0))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert team")?;
        let team_id = TeamId(rec.get::<i64, _>(0));

        for (position, usn) in team.members.iter().enumerate() {
            sqlx::query("INSERT INTO team_members (team_id, usn, position) VALUES (?, ?, ?)")
                .bind(team_id.0)
                .bind(usn)
                .bind(position as i64)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to add member '{usn}'"))?;
        }
        tx.commit().await?;
        Ok(team_id)
    }

    pub async fn load_team(&self, team_id: TeamId) -> Result<Option<TeamSummary>> {
        let row = sqlx::query(
            "SELECT id, name, description, class_id, project_id, created_at FROM teams WHERE id = ?",
        )
        .bind(team_id.0)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_team(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn list_teams_for_class(&self, class_id: ClassId) -> Result<Vec<TeamSummary>> {
        let rows = sqlx::query(
            "SELECT id, name, description, class_id, project_id, created_at
             FROM teams WHERE class_id = ? ORDER BY id ASC",
        )
        .bind(class_id.0)
        .fetch_all(&self.pool)
        .await?;
        let mut teams = Vec::with_capacity(rows.len());
        for row in &rows {
            teams.push(self.hydrate_team(row).await?);
        }
        Ok(teams)
    }

    pub async fn list_teams_for_project(&self, project_id: ProjectId) -> Result<Vec<TeamSummary>> {
        let rows = sqlx::query(
            "SELECT id, name, description, class_id, project_id, created_at
             FROM teams WHERE project_id = ? ORDER BY id ASC",
        )
        .bind(project_id.0)
        .fetch_all(&self.pool)
        .await?;
        let mut teams = Vec::with_capacity(rows.len());
        for row in &rows {
            teams.push(self.hydrate_team(row).await?);
        }
        Ok(teams)
    }

    async fn hydrate_team(&self, row: &SqliteRow) -> Result<TeamSummary> {
        let team_id = TeamId(row.get::<i64, _>(0));
        let members =
            sqlx::query("SELECT usn FROM team_members WHERE team_id = ? ORDER BY position")
                .bind(team_id.0)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|r| r.get::<String, _>(0))
                .collect();
        let evaluation_ids = sqlx::query("SELECT id FROM evaluations WHERE team_id = ? ORDER BY id")
            .bind(team_id.0)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|r| EvaluationId(r.get::<i64, _>(0)))
            .collect();

        Ok(TeamSummary {
            team_id,
            name: row.get::<String, _>(1),
            description: row.get::<String, _>(2),
            class_id: ClassId(row.get::<i64, _>(3)),
            project_id: row.get::<Option<i64>, _>(4).map(ProjectId),
            members,
            evaluation_ids,
            created_at: row.get::<DateTime<Utc>, _>(5),
        })
    }

    pub async fn update_team(
        &self,
        team_id: TeamId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE teams
             SET name = COALESCE(?, name), description = COALESCE(?, description), updated_at = ?
             WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(Utc::now())
        .bind(team_id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_team(&self, team_id: TeamId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(team_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `false` when the member is already on the team.
    pub async fn add_team_member(&self, team_id: TeamId, usn: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO team_members (team_id, usn, position)
             SELECT ?1, ?2, COALESCE(MAX(position) + 1, 0) FROM team_members WHERE team_id = ?1",
        )
        .bind(team_id.0)
        .bind(usn)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_team_for_member(
        &self,
        project_id: ProjectId,
        usn: &str,
    ) -> Result<Option<TeamId>> {
        let row = sqlx::query(
            "SELECT t.id
             FROM teams t
             INNER JOIN team_members m ON m.team_id = t.id
             WHERE t.project_id = ? AND m.usn = ?
             ORDER BY t.id ASC
             LIMIT 1",
        )
        .bind(project_id.0)
        .bind(usn)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| TeamId(r.get::<i64, _>(0))))
    }

    // ---- evaluation forms ----

    pub async fn create_form(&self, form: NewForm<'_>) -> Result<FormId> {
        let now = Utc::now();
        let fields_json =
            serde_json::to_string(form.fields).context("failed to encode form fields")?;
        let rec = sqlx::query(
            "INSERT INTO evaluation_forms
                (title, description, fields_json, evaluation_time, created_by_user_id, project_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(form.title)
        .bind(form.description)
        .bind(fields_json)
        .bind(form.evaluation_time)
        .bind(form.created_by.0)
        .bind(form.project_id.0)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert evaluation form")?;
        Ok(FormId(rec.get::<i64, _>(0)))
    }

    pub async fn load_form(&self, form_id: FormId) -> Result<Option<EvaluationFormSummary>> {
        let row = sqlx::query(
            "SELECT id, title, description, fields_json, evaluation_time, project_id, created_by_user_id
             FROM evaluation_forms WHERE id = ?",
        )
        .bind(form_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| form_summary(&r)).transpose()
    }

    /// The most recently created form wins when a project has several.
    pub async fn latest_form_for_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<EvaluationFormSummary>> {
        let row = sqlx::query(
            "SELECT id, title, description, fields_json, evaluation_time, project_id, created_by_user_id
             FROM evaluation_forms
             WHERE project_id = ?
             ORDER BY id DESC
             LIMIT 1",
        )
        .bind(project_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| form_summary(&r)).transpose()
    }

    pub async fn update_form(
        &self,
        form_id: FormId,
        title: &str,
        description: &str,
        fields: &[FormField],
        evaluation_time: Option<i64>,
    ) -> Result<bool> {
        let fields_json = serde_json::to_string(fields).context("failed to encode form fields")?;
        let result = sqlx::query(
            "UPDATE evaluation_forms
             SET title = ?, description = ?, fields_json = ?,
                 evaluation_time = COALESCE(?, evaluation_time), updated_at = ?
             WHERE id = ?",
        )
        .bind(title)
        .bind(description)
        .bind(fields_json)
        .bind(evaluation_time)
        .bind(Utc::now())
        .bind(form_id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_form(&self, form_id: FormId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM evaluation_forms WHERE id = ?")
            .bind(form_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- evaluations ----

    pub async fn insert_evaluation(&self, evaluation: NewEvaluation<'_>) -> Result<EvaluationId> {
        let responses_json = serde_json::to_string(evaluation.responses)
            .context("failed to encode evaluation responses")?;
        let rec = sqlx::query(
            "INSERT INTO evaluations
                (form_id, project_id, team_id, submitted_by_user_id, responses_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(evaluation.form_id.0)
        .bind(evaluation.project_id.0)
        .bind(evaluation.team_id.map(|id| id.0))
        .bind(evaluation.submitted_by.0)
        .bind(responses_json)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert evaluation")?;
        Ok(EvaluationId(rec.get::<i64, _>(0)))
    }

    pub async fn load_evaluation(
        &self,
        evaluation_id: EvaluationId,
    ) -> Result<Option<EvaluationRecord>> {
        let row = sqlx::query(
            "SELECT e.id, e.form_id, e.project_id, e.team_id, u.id, u.name, u.email,
                    e.responses_json, e.created_at
             FROM evaluations e
             INNER JOIN users u ON u.id = e.submitted_by_user_id
             WHERE e.id = ?",
        )
        .bind(evaluation_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| evaluation_record(&r)).transpose()
    }

    pub async fn list_evaluations_for_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<EvaluationRecord>> {
        let rows = sqlx::query(
            "SELECT e.id, e.form_id, e.project_id, e.team_id, u.id, u.name, u.email,
                    e.responses_json, e.created_at
             FROM evaluations e
             INNER JOIN users u ON u.id = e.submitted_by_user_id
             WHERE e.project_id = ?
             ORDER BY e.id ASC",
        )
        .bind(project_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(evaluation_record).collect()
    }

    pub async fn delete_evaluation(&self, evaluation_id: EvaluationId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM evaluations WHERE id = ?")
            .bind(evaluation_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Emails are stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn stored_user(r: &SqliteRow) -> Result<StoredUser> {
    let role: String = r.try_get(4)?;
    Ok(StoredUser {
        user_id: UserId(r.try_get::<i64, _>(0)?),
        email: r.try_get(1)?,
        password_hash: r.try_get(2)?,
        name: r.try_get(3)?,
        role: role.parse::<Role>()?,
        usn: r.try_get(5)?,
    })
}

fn class_summary(r: &SqliteRow, students: Vec<String>) -> ClassSummary {
    ClassSummary {
        class_id: ClassId(r.get::<i64, _>(0)),
        name: r.get::<String, _>(1),
        semester: r.get::<String, _>(2),
        students,
        teacher: UserRef {
            user_id: UserId(r.get::<i64, _>(4)),
            name: r.get::<String, _>(5),
            email: r.get::<Option<String>, _>(6),
        },
        created_at: r.get::<DateTime<Utc>, _>(3),
    }
}

fn project_summary(r: &SqliteRow) -> Result<ProjectSummary> {
    let status: String = r.try_get(8)?;
    Ok(ProjectSummary {
        project_id: ProjectId(r.try_get::<i64, _>(0)?),
        title: r.try_get(1)?,
        description: r.try_get(2)?,
        class: ClassRef {
            class_id: ClassId(r.try_get::<i64, _>(3)?),
            name: r.try_get(4)?,
            semester: r.try_get(5)?,
        },
        created_by: UserId(r.try_get::<i64, _>(6)?),
        team_size: r.try_get(7)?,
        status: status.parse::<ProjectStatus>()?,
        created_at: r.try_get(9)?,
        updated_at: r.try_get(10)?,
    })
}

fn form_summary(r: &SqliteRow) -> Result<EvaluationFormSummary> {
    let fields_json: String = r.try_get(3)?;
    let fields: Vec<FormField> =
        serde_json::from_str(&fields_json).context("corrupt evaluation form fields")?;
    Ok(EvaluationFormSummary {
        form_id: Some(FormId(r.try_get::<i64, _>(0)?)),
        title: r.try_get(1)?,
        description: r.try_get(2)?,
        fields,
        evaluation_time: r.try_get(4)?,
        project_id: ProjectId(r.try_get::<i64, _>(5)?),
        created_by: Some(UserId(r.try_get::<i64, _>(6)?)),
    })
}

fn evaluation_record(r: &SqliteRow) -> Result<EvaluationRecord> {
    let responses_json: String = r.try_get(7)?;
    let responses: Responses =
        serde_json::from_str(&responses_json).context("corrupt evaluation responses")?;
    Ok(EvaluationRecord {
        evaluation_id: EvaluationId(r.try_get::<i64, _>(0)?),
        form_id: FormId(r.try_get::<i64, _>(1)?),
        project_id: ProjectId(r.try_get::<i64, _>(2)?),
        team_id: r.try_get::<Option<i64>, _>(3)?.map(TeamId),
        submitted_by: UserRef {
            user_id: UserId(r.try_get::<i64, _>(4)?),
            name: r.try_get(5)?,
            email: r.try_get(6)?,
        },
        responses,
        created_at: r.try_get(8)?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
