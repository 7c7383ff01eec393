mod common;

use std::sync::Arc;

use common::{
    backends, connect, MigrationDirs, CREATE_PEOPLE_TABLE, CREATE_TESTS_TABLE, SEED_TESTS,
};
use tessera_orm::migrations::MigrationStatus;
use tessera_orm::{
    ConnectionConfig, DatabaseService, MigrationError, MigrationOptions, MigrationSettings,
    Migrator, OrmError,
};

async fn has_table(db: &Arc<DatabaseService>, table: &str) -> bool {
    db.resolve(None)
        .await
        .unwrap()
        .schema()
        .has_table(table)
        .await
        .unwrap()
}

fn migrator(db: &Arc<DatabaseService>, dirs: &MigrationDirs) -> Migrator {
    Migrator::with_settings(Arc::clone(db), &dirs.settings(), None).unwrap()
}

#[tokio::test]
async fn test_group_filtered_up_and_down() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        let dirs = MigrationDirs::new();
        dirs.write_migration("2024_01_01_create_tests_table.yaml", CREATE_TESTS_TABLE);
        dirs.write_migration("2024_01_02_create_people_table.yaml", CREATE_PEOPLE_TABLE);
        let migrator = migrator(&db, &dirs);

        let testing = MigrationOptions::default().group("testing");
        let result = migrator.up(&testing).await.unwrap();
        assert_eq!(result.applied, vec!["2024_01_01_create_tests_table"], "{}", backend);
        assert_eq!(result.batch, Some(1), "{}", backend);
        assert!(has_table(&db, "tests").await, "{}", backend);
        assert!(!has_table(&db, "people").await, "{}", backend);

        let rolled_back = migrator.down(&testing).await.unwrap();
        assert_eq!(rolled_back.rolled_back, vec!["2024_01_01_create_tests_table"]);
        assert!(!has_table(&db, "tests").await, "{}", backend);
        assert_eq!(db.table("migrations").count().await.unwrap(), 0, "{}", backend);
    }
}

#[tokio::test]
async fn test_seeders_insert_and_remove_rows() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        let dirs = MigrationDirs::new();
        dirs.write_migration("2024_01_01_create_tests_table.yaml", CREATE_TESTS_TABLE);
        dirs.write_seeder("2024_01_01_seed_tests.yaml", SEED_TESTS);
        let migrator = migrator(&db, &dirs);

        migrator.up(&MigrationOptions::default()).await.unwrap();
        let seeded = migrator.seed_up(&MigrationOptions::default()).await.unwrap();
        assert_eq!(seeded.applied, vec!["2024_01_01_seed_tests"], "{}", backend);

        let people = db.table("tests").order_by("name").get().await.unwrap();
        let names: Vec<&str> = people.iter().filter_map(|p| p["name"].as_str()).collect();
        assert_eq!(names, vec!["Jane", "John"], "{}", backend);

        // Seeder and migration records share the store but not their batches
        let records = db.table("migrations").where_eq("type", "seeder").count().await.unwrap();
        assert_eq!(records, 1, "{}", backend);

        migrator.seed_down(&MigrationOptions::default()).await.unwrap();
        assert_eq!(db.table("tests").count().await.unwrap(), 0, "{}", backend);
        assert!(has_table(&db, "tests").await, "{}", backend);
    }
}

#[tokio::test]
async fn test_up_is_idempotent() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        let dirs = MigrationDirs::new();
        dirs.write_migration("2024_01_01_create_tests_table.yaml", CREATE_TESTS_TABLE);
        let migrator = migrator(&db, &dirs);

        migrator.up(&MigrationOptions::default()).await.unwrap();
        let again = migrator.up(&MigrationOptions::default()).await.unwrap();
        assert!(again.applied.is_empty(), "{}", backend);
        assert_eq!(again.batch, None, "{}", backend);
        assert_eq!(db.table("migrations").count().await.unwrap(), 1, "{}", backend);
    }
}

#[tokio::test]
async fn test_rollback_reverts_exactly_one_batch() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        let dirs = MigrationDirs::new();
        dirs.write_migration("2024_01_01_create_tests_table.yaml", CREATE_TESTS_TABLE);
        let migrator = migrator(&db, &dirs);
        migrator.up(&MigrationOptions::default()).await.unwrap();

        dirs.write_migration("2024_01_02_create_people_table.yaml", CREATE_PEOPLE_TABLE);
        let second = migrator.up(&MigrationOptions::default()).await.unwrap();
        assert_eq!(second.batch, Some(2), "{}", backend);

        let rolled_back = migrator.down(&MigrationOptions::default()).await.unwrap();
        assert_eq!(rolled_back.batch, Some(2), "{}", backend);
        assert_eq!(rolled_back.rolled_back, vec!["2024_01_02_create_people_table"]);
        assert!(!has_table(&db, "people").await, "{}", backend);
        assert!(has_table(&db, "tests").await, "{}", backend);

        let first = migrator.down(&MigrationOptions::default().batch(1)).await.unwrap();
        assert_eq!(first.rolled_back, vec!["2024_01_01_create_tests_table"]);
        assert!(!has_table(&db, "tests").await, "{}", backend);

        let nothing = migrator.down(&MigrationOptions::default()).await.unwrap();
        assert_eq!(nothing.batch, None, "{}", backend);
    }
}

#[tokio::test]
async fn test_rollback_runs_in_descending_order() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        let dirs = MigrationDirs::new();
        dirs.write_migration("2024_01_01_create_tests_table.yaml", CREATE_TESTS_TABLE);
        dirs.write_migration(
            "2024_01_02_index_tests.yaml",
            "up:\n  - op: create_index\n    table: tests\n    columns: [name]\ndown:\n  - op: raw\n    statement: definitely not valid\n",
        );
        let migrator = migrator(&db, &dirs);

        let applied = migrator.up(&MigrationOptions::default()).await.unwrap();
        assert_eq!(applied.applied.len(), 2, "{}", backend);

        // The later file is reverted first, and its failure stops the rollback
        let err = migrator.down(&MigrationOptions::default()).await.unwrap_err();
        assert!(
            matches!(err, OrmError::Migration(MigrationError::Failed { ref name, .. }) if name == "2024_01_02_index_tests"),
            "{}: {:?}",
            backend,
            err
        );
        assert!(has_table(&db, "tests").await, "{}", backend);
        assert_eq!(db.table("migrations").count().await.unwrap(), 2, "{}", backend);
    }
}

#[tokio::test]
async fn test_checksum_drift_fails_fast() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        let dirs = MigrationDirs::new();
        dirs.write_migration("2024_01_01_create_tests_table.yaml", CREATE_TESTS_TABLE);
        let migrator = migrator(&db, &dirs);
        migrator.up(&MigrationOptions::default()).await.unwrap();

        dirs.write_migration(
            "2024_01_01_create_tests_table.yaml",
            &format!("{}# edited\n", CREATE_TESTS_TABLE),
        );
        dirs.write_migration("2024_01_02_create_people_table.yaml", CREATE_PEOPLE_TABLE);

        let err = migrator.up(&MigrationOptions::default()).await.unwrap_err();
        assert!(
            matches!(err, OrmError::Migration(MigrationError::ChecksumDrift { ref name, .. }) if name == "2024_01_01_create_tests_table"),
            "{}: {:?}",
            backend,
            err
        );
        assert!(!has_table(&db, "people").await, "{}", backend);

        let status = migrator.status().await.unwrap();
        assert_eq!(status[0].status, MigrationStatus::Drifted { batch: 1 }, "{}", backend);
        assert_eq!(status[1].status, MigrationStatus::Pending, "{}", backend);
    }
}

#[tokio::test]
async fn test_failing_up_is_not_recorded() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        let dirs = MigrationDirs::new();
        dirs.write_migration("2024_01_01_create_tests_table.yaml", CREATE_TESTS_TABLE);
        dirs.write_migration(
            "2024_01_02_broken.yaml",
            "up:\n  - op: rename_table\n    from: does_not_exist\n    to: still_missing\n",
        );
        dirs.write_migration("2024_01_03_create_people_table.yaml", CREATE_PEOPLE_TABLE);
        let migrator = migrator(&db, &dirs);

        let err = migrator.up(&MigrationOptions::default()).await.unwrap_err();
        assert!(
            matches!(err, OrmError::Migration(MigrationError::Failed { ref name, .. }) if name == "2024_01_02_broken"),
            "{}: {:?}",
            backend,
            err
        );

        let recorded = db.table("migrations").order_by("name").get().await.unwrap();
        let names: Vec<&str> = recorded.iter().filter_map(|r| r["name"].as_str()).collect();
        assert_eq!(names, vec!["2024_01_01_create_tests_table"], "{}", backend);
        assert!(!has_table(&db, "people").await, "{}", backend);
    }
}

#[tokio::test]
async fn test_adapter_tagged_files_are_skipped_elsewhere() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        let dirs = MigrationDirs::new();
        dirs.write_migration(
            "2024_01_01_documents_only.yaml",
            "adapter: document\nup:\n  - op: create_table\n    table: events\n",
        );
        dirs.write_migration(
            "2024_01_02_relational_only.sql",
            "-- Up migration\nCREATE TABLE audit (id VARCHAR(36) PRIMARY KEY, note TEXT);\n\n-- Down migration\nDROP TABLE audit;\n",
        );
        let migrator = migrator(&db, &dirs);

        let result = migrator.up(&MigrationOptions::default()).await.unwrap();
        let status = migrator.status().await.unwrap();
        if backend == "sqlite" {
            assert_eq!(result.applied, vec!["2024_01_02_relational_only"]);
            assert_eq!(result.skipped, vec!["2024_01_01_documents_only"]);
            assert!(has_table(&db, "audit").await);
            assert_eq!(status[0].status, MigrationStatus::Skipped);
        } else {
            assert_eq!(result.applied, vec!["2024_01_01_documents_only"]);
            assert_eq!(result.skipped, vec!["2024_01_02_relational_only"]);
            assert!(has_table(&db, "events").await);
            assert_eq!(status[1].status, MigrationStatus::Skipped);
        }
    }
}

#[tokio::test]
async fn test_fresh_rebuilds_and_seeds() {
    for (backend, config) in backends() {
        let db = connect(config).await;
        let dirs = MigrationDirs::new();
        dirs.write_migration("2024_01_01_create_tests_table.yaml", CREATE_TESTS_TABLE);
        dirs.write_seeder("2024_01_01_seed_tests.yaml", SEED_TESTS);
        let migrator = migrator(&db, &dirs);

        migrator.up(&MigrationOptions::default()).await.unwrap();
        migrator.seed_up(&MigrationOptions::default()).await.unwrap();
        migrator.seed_up(&MigrationOptions::default()).await.unwrap();
        assert_eq!(db.table("tests").count().await.unwrap(), 2, "{}", backend);

        let fresh = migrator.fresh(&MigrationOptions::default()).await.unwrap();
        assert!(fresh.dropped.contains(&"tests".to_string()), "{}", backend);
        assert_eq!(fresh.migrations.applied.len(), 1, "{}", backend);
        assert!(fresh.seeders.is_none());
        assert_eq!(db.table("tests").count().await.unwrap(), 0, "{}", backend);

        let seeded = migrator.fresh(&MigrationOptions::default().with_seed()).await.unwrap();
        assert_eq!(seeded.seeders.map(|s| s.applied.len()), Some(1), "{}", backend);
        assert_eq!(db.table("tests").count().await.unwrap(), 2, "{}", backend);
        assert_eq!(db.table("migrations").count().await.unwrap(), 2, "{}", backend);
    }
}

#[tokio::test]
async fn test_file_filter_accepts_extension() {
    let db = connect(ConnectionConfig::memory()).await;
    let dirs = MigrationDirs::new();
    dirs.write_migration("2024_01_01_create_tests_table.yaml", CREATE_TESTS_TABLE);
    dirs.write_migration("2024_01_02_create_people_table.yaml", CREATE_PEOPLE_TABLE);
    let migrator = migrator(&db, &dirs);

    let result = migrator
        .up(&MigrationOptions::default().file("2024_01_02_create_people_table.yaml"))
        .await
        .unwrap();
    assert_eq!(result.applied, vec!["2024_01_02_create_people_table"]);
    assert!(!has_table(&db, "tests").await);
}

#[tokio::test]
async fn test_missing_directories_are_configuration_errors() {
    let db = connect(ConnectionConfig::memory()).await;
    let dirs = MigrationDirs::new();

    let missing = MigrationSettings {
        directory: dirs.root.path().join("nowhere"),
        ..dirs.settings()
    };
    let err = Migrator::with_settings(Arc::clone(&db), &missing, None).err().unwrap();
    assert!(matches!(err, OrmError::Migration(MigrationError::DirectoryNotFound(_))));

    let missing_seeders = MigrationSettings {
        seeders: Some(dirs.root.path().join("no_seeders")),
        ..dirs.settings()
    };
    assert!(Migrator::with_settings(Arc::clone(&db), &missing_seeders, None).is_err());

    let without_seeders = MigrationSettings {
        seeders: None,
        ..dirs.settings()
    };
    let migrator = Migrator::with_settings(Arc::clone(&db), &without_seeders, None).unwrap();
    assert!(!migrator.has_seeders());
    assert!(matches!(
        migrator.seed_up(&MigrationOptions::default()).await.unwrap_err(),
        OrmError::Configuration(_)
    ));
}

#[tokio::test]
async fn test_missing_file_blocks_rollback() {
    let db = connect(ConnectionConfig::memory()).await;
    let dirs = MigrationDirs::new();
    dirs.write_migration("2024_01_01_create_tests_table.yaml", CREATE_TESTS_TABLE);
    let migrator = migrator(&db, &dirs);
    migrator.up(&MigrationOptions::default()).await.unwrap();

    std::fs::remove_file(dirs.migrations().join("2024_01_01_create_tests_table.yaml")).unwrap();
    let status = migrator.status().await.unwrap();
    assert_eq!(status[0].status, MigrationStatus::Missing { batch: 1 });

    let err = migrator.down(&MigrationOptions::default()).await.unwrap_err();
    assert!(matches!(err, OrmError::Migration(MigrationError::MissingFile(_))));
    assert!(has_table(&db, "tests").await);
}
