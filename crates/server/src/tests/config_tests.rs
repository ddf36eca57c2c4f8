use super::*;

use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| vars.get(name).cloned()
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn creates_parent_dir_for_sqlite_url() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("data").join("test.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.path().join("data").exists());
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("server.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );
}

#[test]
fn file_values_are_overridden_by_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("server.toml");
    fs::write(
        &path,
        "bind_addr = \"0.0.0.0:9000\"\njwt_secret = \"from-file\"\nlocal_hub_capacity = 64\n",
    )
    .expect("write config");

    let settings = load_settings_from(
        &path,
        env_from(&[("JWT_SECRET", "plain"), ("APP__JWT_SECRET", "namespaced")]),
    );
    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.jwt_secret, "namespaced");
    assert_eq!(settings.local_hub_capacity, 64);
}

#[test]
fn port_binds_all_interfaces() {
    let settings = load_settings_from(Path::new("missing.toml"), env_from(&[("PORT", "5050")]));
    assert_eq!(settings.server_bind, "0.0.0.0:5050");

    let settings = load_settings_from(Path::new("missing.toml"), env_from(&[("PORT", "http")]));
    assert_eq!(settings.server_bind, Settings::default().server_bind);
}

#[test]
fn pusher_needs_every_credential() {
    let partial = load_settings_from(
        Path::new("missing.toml"),
        env_from(&[("PUSHER_APP_ID", "1"), ("PUSHER_KEY", "k")]),
    );
    assert!(partial.pusher().is_none());

    let full = load_settings_from(
        Path::new("missing.toml"),
        env_from(&[
            ("PUSHER_APP_ID", "1"),
            ("PUSHER_KEY", "k"),
            ("PUSHER_SECRET", "s"),
            ("PUSHER_CLUSTER", "ap2"),
        ]),
    );
    let pusher = full.pusher().expect("pusher");
    assert_eq!(pusher.base_url(), "https://api-ap2.pusher.com");
}

#[test]
fn cors_origins_split_on_commas() {
    let settings = load_settings_from(
        Path::new("missing.toml"),
        env_from(&[(
            "CORS_ALLOWED_ORIGINS",
            "http://localhost:3000, https://eval.example.edu",
        )]),
    );
    assert_eq!(
        settings.cors_allowed_origins,
        vec!["http://localhost:3000", "https://eval.example.edu"]
    );
}

#[test]
fn file_origin_lists_are_accepted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("server.toml");
    fs::write(
        &path,
        "cors_allowed_origins = [\"http://a.test\", \"http://b.test\"]\nunknown = 1\n",
    )
    .expect("write config");

    let settings = load_settings_from(&path, |_: &str| None);
    assert_eq!(settings.cors_allowed_origins, vec!["http://a.test", "http://b.test"]);
}
