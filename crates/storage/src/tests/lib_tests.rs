use super::*;
use serde_json::json;
use shared::domain::FieldKind;

async fn storage() -> Storage {
    Storage::new("sqlite::memory:").await.expect("db")
}

async fn teacher(storage: &Storage, email: &str) -> UserId {
    storage
        .create_user(NewUser {
            email: Some(email),
            password_hash: Some("hash"),
            name: "Teacher",
            role: Role::Teacher,
            usn: None,
        })
        .await
        .expect("teacher")
}

async fn project_in_new_class(storage: &Storage, owner: UserId, team_size: i64) -> ProjectId {
    let class = storage
        .create_class("CS-A", "5", &[], owner)
        .await
        .expect("class");
    storage
        .create_project(NewProject {
            title: "Compiler",
            description: "Build a compiler",
            class_id: class,
            created_by: owner,
            team_size,
        })
        .await
        .expect("project")
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = storage().await;
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[test]
fn sqlite_path_skips_memory_urls() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://data/app.db?mode=rwc"),
        Some(PathBuf::from("data/app.db"))
    );
}

#[tokio::test]
async fn users_are_found_by_normalized_email_and_role() {
    let storage = storage().await;
    let id = teacher(&storage, "ada@school.edu").await;

    let found = storage
        .user_by_email("  ADA@school.edu ")
        .await
        .expect("lookup")
        .expect("user");
    assert_eq!(found.user_id, id);
    assert_eq!(found.role, Role::Teacher);
    assert_eq!(found.password_hash.as_deref(), Some("hash"));

    let teachers = storage
        .list_users_by_role(Role::Teacher)
        .await
        .expect("teachers");
    assert_eq!(teachers.len(), 1);
    assert!(storage
        .list_users_by_role(Role::Peer)
        .await
        .expect("peers")
        .is_empty());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let storage = storage().await;
    teacher(&storage, "dup@school.edu").await;
    let second = storage
        .create_user(NewUser {
            email: Some("dup@school.edu"),
            password_hash: Some("hash"),
            name: "Other",
            role: Role::Teacher,
            usn: None,
        })
        .await;
    assert!(second.is_err());
}

#[tokio::test]
async fn class_roster_keeps_insertion_order() {
    let storage = storage().await;
    let owner = teacher(&storage, "t@school.edu").await;
    let roster = vec!["1RV21CS002".to_string(), "1RV21CS001".to_string()];
    let class = storage
        .create_class("CS-B", "6", &roster, owner)
        .await
        .expect("class");

    assert!(storage
        .add_class_student(class, "1RV21CS003")
        .await
        .expect("add"));
    assert!(!storage
        .add_class_student(class, "1RV21CS001")
        .await
        .expect("duplicate add"));
    assert!(storage
        .remove_class_student(class, "1RV21CS002")
        .await
        .expect("remove"));
    assert!(!storage
        .remove_class_student(class, "1RV21CS002")
        .await
        .expect("second remove"));

    let loaded = storage.load_class(class).await.expect("load").expect("class");
    assert_eq!(loaded.students, vec!["1RV21CS001", "1RV21CS003"]);
    assert_eq!(loaded.teacher.user_id, owner);
}

#[tokio::test]
async fn classes_list_newest_first() {
    let storage = storage().await;
    let owner = teacher(&storage, "t@school.edu").await;
    let first = storage.create_class("A", "1", &[], owner).await.expect("a");
    let second = storage.create_class("B", "1", &[], owner).await.expect("b");

    let classes = storage.list_classes().await.expect("list");
    let ids: Vec<_> = classes.iter().map(|c| c.class_id).collect();
    assert_eq!(ids, vec![second, first]);
}

#[tokio::test]
async fn partial_project_update_keeps_other_fields() {
    let storage = storage().await;
    let owner = teacher(&storage, "t@school.edu").await;
    let project = project_in_new_class(&storage, owner, 4).await;

    storage
        .update_project(
            project,
            ProjectUpdate {
                status: Some(ProjectStatus::Completed),
                ..ProjectUpdate::default()
            },
        )
        .await
        .expect("update");

    let loaded = storage
        .load_project(project)
        .await
        .expect("load")
        .expect("project");
    assert_eq!(loaded.status, ProjectStatus::Completed);
    assert_eq!(loaded.title, "Compiler");
    assert_eq!(loaded.team_size, 4);
    assert_eq!(loaded.class.name, "CS-A");
}

#[tokio::test]
async fn team_lookup_by_member_is_scoped_to_project() {
    let storage = storage().await;
    let owner = teacher(&storage, "t@school.edu").await;
    let project = project_in_new_class(&storage, owner, 3).await;
    let other = project_in_new_class(&storage, owner, 3).await;
    let class = storage
        .load_project(project)
        .await
        .expect("load")
        .expect("project")
        .class
        .class_id;

    let members = vec!["1RV21CS001".to_string(), "1RV21CS002".to_string()];
    let team = storage
        .create_team(NewTeam {
            name: "Alpha",
            description: "first",
            class_id: class,
            project_id: Some(project),
            members: &members,
        })
        .await
        .expect("team");

    assert_eq!(
        storage
            .find_team_for_member(project, "1RV21CS002")
            .await
            .expect("lookup"),
        Some(team)
    );
    assert_eq!(
        storage
            .find_team_for_member(other, "1RV21CS002")
            .await
            .expect("lookup"),
        None
    );

    assert!(storage
        .add_team_member(team, "1RV21CS003")
        .await
        .expect("add"));
    assert!(!storage
        .add_team_member(team, "1RV21CS003")
        .await
        .expect("duplicate"));
    let loaded = storage.load_team(team).await.expect("load").expect("team");
    assert_eq!(loaded.members.len(), 3);
    assert_eq!(
        storage
            .list_teams_for_project(project)
            .await
            .expect("list")
            .len(),
        1
    );
}

#[tokio::test]
async fn latest_form_wins_and_evaluations_link_back_to_team() {
    let storage = storage().await;
    let owner = teacher(&storage, "t@school.edu").await;
    let project = project_in_new_class(&storage, owner, 3).await;
    let class = storage
        .load_project(project)
        .await
        .expect("load")
        .expect("project")
        .class
        .class_id;
    let fields = vec![FormField {
        kind: FieldKind::Rating,
        label: "Clarity".into(),
        required: true,
    }];

    storage
        .create_form(NewForm {
            title: "Round 1",
            description: "",
            fields: &fields,
            evaluation_time: 300,
            created_by: owner,
            project_id: project,
        })
        .await
        .expect("first form");
    let latest = storage
        .create_form(NewForm {
            title: "Round 2",
            description: "",
            fields: &fields,
            evaluation_time: 120,
            created_by: owner,
            project_id: project,
        })
        .await
        .expect("second form");

    let form = storage
        .latest_form_for_project(project)
        .await
        .expect("latest")
        .expect("form");
    assert_eq!(form.form_id, Some(latest));
    assert_eq!(form.fields, fields);

    let members = vec!["1RV21CS001".to_string()];
    let team = storage
        .create_team(NewTeam {
            name: "Alpha",
            description: "",
            class_id: class,
            project_id: Some(project),
            members: &members,
        })
        .await
        .expect("team");

    let mut responses = Responses::new();
    responses.insert("Clarity".into(), json!(4));
    let evaluation = storage
        .insert_evaluation(NewEvaluation {
            form_id: latest,
            project_id: project,
            team_id: Some(team),
            submitted_by: owner,
            responses: &responses,
        })
        .await
        .expect("evaluation");

    let record = storage
        .load_evaluation(evaluation)
        .await
        .expect("load")
        .expect("evaluation");
    assert_eq!(record.responses["Clarity"], json!(4));
    assert_eq!(record.submitted_by.user_id, owner);

    let team = storage.load_team(team).await.expect("load").expect("team");
    assert_eq!(team.evaluation_ids, vec![evaluation]);
}

#[tokio::test]
async fn deleting_a_project_cascades_to_its_forms() {
    let storage = storage().await;
    let owner = teacher(&storage, "t@school.edu").await;
    let project = project_in_new_class(&storage, owner, 3).await;
    let form = storage
        .create_form(NewForm {
            title: "Round 1",
            description: "",
            fields: &[],
            evaluation_time: 300,
            created_by: owner,
            project_id: project,
        })
        .await
        .expect("form");

    assert!(storage.delete_project(project).await.expect("delete"));
    assert!(storage.load_form(form).await.expect("load").is_none());
    assert_eq!(storage.owned_record_count(owner).await.expect("count"), 1);
}
