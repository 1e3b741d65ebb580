//! Full generation cycles against a temporary migrations directory.

use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use oxide_automigrate::prelude::*;
use oxide_automigrate::snapshot::{BACKUP_FILE, CURRENT_FILE};

const USERS_AND_LOGS: &str = r#"{
    "users": {
        "columns": {
            "id": { "type": "INTEGER", "primaryKey": true, "autoIncrement": true },
            "name": { "type": "STRING", "allowNull": false }
        }
    },
    "logs": {
        "columns": {
            "id": { "type": "BIGINT", "primaryKey": true },
            "message": { "type": "TEXT" }
        }
    }
}"#;

const USERS_WITH_EMAIL: &str = r#"{
    "users": {
        "columns": {
            "id": { "type": "INTEGER", "primaryKey": true, "autoIncrement": true },
            "name": { "type": "STRING", "allowNull": false },
            "email": { "type": "STRING" }
        }
    }
}"#;

const INDEXED_USERS: &str = r#"{
    "users": {
        "columns": {
            "id": { "type": "INTEGER", "primaryKey": true },
            "email": { "type": "STRING" }
        },
        "indexes": { "users_email": { "fields": ["email"], "unique": true } }
    }
}"#;

const RENAMED_INDEX_WITH_AGE: &str = r#"{
    "users": {
        "columns": {
            "id": { "type": "INTEGER", "primaryKey": true },
            "email": { "type": "STRING" },
            "age": { "type": "INTEGER" }
        },
        "indexes": { "users_email_unique": { "fields": ["email"], "unique": true } }
    }
}"#;

const UNINDEXED_USERS_WITH_AGE: &str = r#"{
    "users": {
        "columns": {
            "id": { "type": "INTEGER", "primaryKey": true },
            "email": { "type": "STRING" },
            "age": { "type": "INTEGER" }
        }
    }
}"#;

fn at(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 8, 30, second).unwrap()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

struct Project {
    _root: tempfile::TempDir,
    migrations: std::path::PathBuf,
    model: std::path::PathBuf,
}

impl Project {
    fn new(model: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        let migrations = root.path().join("migrations");
        let model_path = root.path().join("schema.json");
        fs::write(&model_path, model).unwrap();
        Self {
            _root: root,
            migrations,
            model: model_path,
        }
    }

    fn set_model(&self, model: &str) {
        fs::write(&self.model, model).unwrap();
    }

    fn migrator(&self) -> Migrator<JsonModelReflector> {
        Migrator::new(
            SnapshotStore::new(&self.migrations),
            JsonModelReflector::new(&self.model),
        )
    }
}

fn written(outcome: GenerationOutcome) -> (Migration, WrittenMigration) {
    match outcome {
        GenerationOutcome::Written { migration, written } => (migration, written),
        other => panic!("expected a written migration, got {other:?}"),
    }
}

#[test]
fn users_and_logs_scenario() {
    let project = Project::new(USERS_AND_LOGS);
    project
        .migrator()
        .generate(&GenerateOptions::default(), at(0))
        .unwrap();

    project.set_model(USERS_WITH_EMAIL);
    let options = GenerateOptions {
        name: "add email".to_string(),
        comment: "drop logs too".to_string(),
        preview: false,
    };
    let (migration, written) = written(project.migrator().generate(&options, at(5)).unwrap());

    assert_eq!(migration.actions.len(), 2);
    assert!(matches!(
        &migration.actions[0],
        Action::AddColumn { table, column, .. } if table == "users" && column == "email"
    ));
    assert!(matches!(
        &migration.actions[1],
        Action::RemoveTable { table, .. } if table == "logs"
    ));
    assert_eq!(
        migration.log_lines,
        vec!["Add column 'email' to table 'users'", "Drop table 'logs'"]
    );
    assert_eq!(written.filename, "20260601083005-add_email.json");

    let artifact = MigrationArtifact::load(&written.path).unwrap();
    assert_eq!(artifact.info.comment, "drop logs too");
    assert_eq!(
        artifact.down.iter().map(ToString::to_string).collect::<Vec<_>>(),
        vec!["createTable logs", "removeColumn users.email"]
    );
}

#[test]
fn snapshot_files_after_two_cycles() {
    let project = Project::new(USERS_AND_LOGS);
    project
        .migrator()
        .generate(&GenerateOptions::default(), at(0))
        .unwrap();
    project.set_model(USERS_WITH_EMAIL);
    project
        .migrator()
        .generate(&GenerateOptions::default(), at(1))
        .unwrap();

    assert_eq!(
        file_names(&project.migrations),
        vec![
            "20260601083000-noname.json".to_string(),
            "20260601083001-noname.json".to_string(),
            CURRENT_FILE.to_string(),
            format!("{CURRENT_FILE}.20260601083000"),
            format!("{CURRENT_FILE}.20260601083001"),
            BACKUP_FILE.to_string(),
        ]
    );

    let store = SnapshotStore::new(&project.migrations);
    assert_eq!(store.load().unwrap().revision, "20260601083001");
    assert!(store.load_revision("20260601083000").unwrap().tables.contains_key("logs"));
}

#[test]
fn no_changes_writes_nothing() {
    let project = Project::new(USERS_AND_LOGS);
    project
        .migrator()
        .generate(&GenerateOptions::default(), at(0))
        .unwrap();
    let before = file_names(&project.migrations);

    let outcome = project
        .migrator()
        .generate(&GenerateOptions::default(), at(9))
        .unwrap();
    assert!(matches!(outcome, GenerationOutcome::NoChanges));
    assert_eq!(file_names(&project.migrations), before);
}

#[test]
fn revisions_increase_within_one_second() {
    let project = Project::new(USERS_AND_LOGS);
    project
        .migrator()
        .generate(&GenerateOptions::default(), at(0))
        .unwrap();
    project.set_model(USERS_WITH_EMAIL);

    let (migration, _) = written(
        project
            .migrator()
            .generate(&GenerateOptions::default(), at(0))
            .unwrap(),
    );
    assert_eq!(migration.revision, "20260601083001");
}

#[test]
fn unsupported_type_stops_the_cycle() {
    let project = Project::new(r#"{ "places": { "columns": { "area": { "type": "POLYGON" } } } }"#);
    let result = project
        .migrator()
        .generate(&GenerateOptions::default(), at(0));

    assert!(matches!(
        result,
        Err(MigrateError::UnsupportedType { ref type_tag, .. }) if type_tag == "POLYGON"
    ));
    assert!(!project.migrations.exists());
}

#[test]
fn name_collision_keeps_snapshot() {
    let project = Project::new(USERS_AND_LOGS);
    fs::create_dir_all(&project.migrations).unwrap();
    fs::write(project.migrations.join("20260601083000-noname.json"), "{}").unwrap();

    let result = project
        .migrator()
        .generate(&GenerateOptions::default(), at(0));
    assert!(matches!(result, Err(MigrateError::NameCollision(_))));
    assert!(matches!(
        SnapshotStore::new(&project.migrations).load(),
        Err(MigrateError::NotFound(_))
    ));
}

#[test]
fn renamed_index_keeps_recorded_name_across_cycles() {
    let project = Project::new(INDEXED_USERS);
    let mut database = SchemaState::new();

    let cycles = [
        (0, INDEXED_USERS),
        (1, RENAMED_INDEX_WITH_AGE),
        (2, UNINDEXED_USERS_WITH_AGE),
    ];
    for (second, model) in cycles {
        project.set_model(model);
        let (migration, _) = written(
            project
                .migrator()
                .generate(&GenerateOptions::default(), at(second))
                .unwrap(),
        );
        database.apply_all(&migration.forward_ops).unwrap();

        let ops: Vec<String> = migration.forward_ops.iter().map(ToString::to_string).collect();
        match second {
            1 => assert_eq!(ops, vec!["addColumn users.age"]),
            2 => assert_eq!(ops, vec!["removeIndex users.users_email"]),
            _ => {}
        }
    }

    let recorded = SnapshotStore::new(&project.migrations).load().unwrap();
    assert_eq!(database.tables(), &recorded.tables);
    assert!(recorded.tables["users"].indexes.is_empty());
}

#[test]
fn failed_snapshot_save_removes_migration() {
    let project = Project::new(USERS_AND_LOGS);
    let store = SnapshotStore::new(&project.migrations);
    fs::create_dir_all(&project.migrations).unwrap();
    fs::write(store.archive_path("20260601083000"), "{}").unwrap();

    let result = project
        .migrator()
        .generate(&GenerateOptions::default(), at(0));
    assert!(matches!(result, Err(MigrateError::NameCollision(_))));
    assert_eq!(
        file_names(&project.migrations),
        vec![format!("{CURRENT_FILE}.20260601083000")]
    );
    assert!(matches!(store.load(), Err(MigrateError::NotFound(_))));
}
