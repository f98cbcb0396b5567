//! Statement generation tests for the query boilerplates.
//!
//! Run with: cargo test --package sqlward-runtime --test boilerplate_tests

mod common;

use chrono::NaiveDate;
use common::RecordingPool;
use pretty_assertions::assert_eq;
use sqlward_core::{ColumnSelection, DbVersion, Filter, SqlValue, TableData};
use sqlward_runtime::{PoolError, QueryBoilerplates, QueryError};
use sqlward_sanitize::{FixedClock, Parameterizer};
use std::sync::Arc;

fn setup() -> (Arc<RecordingPool>, QueryBoilerplates) {
    let pool = Arc::new(RecordingPool::new());
    let clock = FixedClock(
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap(),
    );
    let qb = QueryBoilerplates::new(pool.clone(), Parameterizer::new(Arc::new(clock)));
    (pool, qb)
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn describe_users(pool: &RecordingPool) {
    pool.respond(
        "DESCRIBE",
        &["Field", "Type", "Null", "Key", "Default", "Extra"],
        vec![
            vec![
                "id".into(),
                "int".into(),
                "NO".into(),
                "PRI".into(),
                SqlValue::Null,
                "auto_increment".into(),
            ],
            vec![
                "name".into(),
                "varchar(64)".into(),
                "YES".into(),
                "".into(),
                SqlValue::Null,
                "".into(),
            ],
        ],
    );
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_select_with_fragments() {
    let (pool, qb) = setup();
    qb.get_data_from_table(
        "users",
        &ColumnSelection::from(vec!["id", "name"]),
        &Filter::from(vec!["age > 18", "status = 'active'"]),
        false,
    )
    .await
    .unwrap();

    let stmt = pool.last();
    assert_eq!(
        stmt.sql,
        "SELECT `id`, `name` FROM `users` WHERE age>? AND status=?"
    );
    assert_eq!(stmt.params, vec![SqlValue::Int(18), SqlValue::from("active")]);
}

#[tokio::test]
async fn test_empty_filter_has_no_where() {
    let (pool, qb) = setup();
    qb.get_data_from_table("users", &ColumnSelection::All, &Filter::None, false)
        .await
        .unwrap();
    qb.get_data_from_table("users", &ColumnSelection::All, &Filter::from(Vec::<String>::new()), false)
        .await
        .unwrap();

    for stmt in pool.statements() {
        assert_eq!(stmt.sql, "SELECT * FROM `users`");
        assert!(stmt.params.is_empty());
    }
}

#[tokio::test]
async fn test_beautified_rows_become_records() {
    let (pool, qb) = setup();
    pool.respond("SELECT", &["id", "name"], vec![vec![1.into(), "ada".into()]]);

    let data = qb
        .get_data_from_table("users", &ColumnSelection::All, &Filter::None, true)
        .await
        .unwrap();
    match data {
        TableData::Records(records) => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0]["name"], SqlValue::from("ada"));
        }
        other => panic!("expected records, got {:?}", other),
    }
}

#[tokio::test]
async fn test_table_size() {
    let (pool, qb) = setup();
    pool.respond("SELECT COUNT", &["COUNT(*)"], vec![vec![SqlValue::Int(3)]]);

    let size = qb
        .get_table_size("users", "*", &Filter::from("age > 18"))
        .await
        .unwrap();
    assert_eq!(size, 3);
    assert_eq!(pool.last().sql, "SELECT COUNT(*) FROM `users` WHERE age>?");

    qb.get_table_size("users", "email", &Filter::None).await.unwrap();
    assert_eq!(pool.last().sql, "SELECT COUNT(`email`) FROM `users`");
}

#[tokio::test]
async fn test_describe_and_column_names() {
    let (pool, qb) = setup();
    describe_users(&pool);

    let described = qb.describe_table("users").await.unwrap();
    assert_eq!(described.len(), 2);
    assert_eq!(described[0].field, "id");
    assert!(!described[0].nullable);
    assert_eq!(described[0].key, "PRI");
    assert_eq!(described[0].default, None);
    assert!(described[1].nullable);

    assert_eq!(
        qb.get_table_column_names("users").await.unwrap(),
        columns(&["id", "name"])
    );
    assert_eq!(pool.sql()[0], "DESCRIBE `users`");
}

#[tokio::test]
async fn test_database_version_is_stored() {
    let (pool, qb) = setup();
    pool.respond("SELECT VERSION()", &["VERSION()"], vec![vec!["8.0.36-log".into()]]);

    assert_eq!(qb.database_version().await, None);
    let version = qb.get_database_version().await.unwrap();
    assert_eq!((version.major, version.minor, version.patch), (8, 0, 36));
    assert_eq!(qb.database_version().await, Some(version));
}

#[tokio::test]
async fn test_trigger_reads() {
    let (pool, qb) = setup();
    pool.respond(
        "SHOW CREATE TRIGGER",
        &["Trigger", "sql_mode", "SQL Original Statement"],
        vec![vec![
            "audit".into(),
            "".into(),
            "CREATE TRIGGER audit AFTER INSERT ON users FOR EACH ROW SET @n = 1".into(),
        ]],
    );
    pool.respond(
        "SELECT TRIGGER_NAME FROM",
        &["TRIGGER_NAME"],
        vec![vec!["audit".into()]],
    );

    let definition = qb.get_trigger("audit", Some("shop")).await.unwrap();
    assert!(definition.unwrap().starts_with("CREATE TRIGGER audit"));
    assert_eq!(pool.last().sql, "SHOW CREATE TRIGGER `shop`.`audit`");

    let names = qb.get_trigger_names(Some("shop")).await.unwrap();
    assert_eq!(names, vec!["audit".to_string()]);
    let stmt = pool.last();
    assert!(stmt.sql.contains("TRIGGER_SCHEMA = ?"));
    assert_eq!(stmt.params, vec![SqlValue::from("shop")]);

    qb.get_trigger_names(None).await.unwrap();
    assert!(pool.last().sql.contains("TRIGGER_SCHEMA = DATABASE()"));
}

#[tokio::test]
async fn test_missing_trigger_is_none() {
    let (_, qb) = setup();
    assert_eq!(qb.get_trigger("ghost", None).await.unwrap(), None);
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_injection_never_reaches_pool() {
    let (pool, qb) = setup();

    let bad_table = qb
        .get_data_from_table("users; DROP TABLE x", &ColumnSelection::All, &Filter::None, false)
        .await
        .unwrap_err();
    assert!(bad_table.is_injection());

    let bad_filter = qb
        .remove_data_from_table("users", &Filter::from("id = 1; DROP TABLE users"))
        .await
        .unwrap_err();
    assert!(bad_filter.is_injection());

    let bad_column = qb
        .get_data_from_table("users", &ColumnSelection::from(vec!["id", "name--"]), &Filter::None, false)
        .await
        .unwrap_err();
    assert!(bad_column.is_injection());

    assert!(pool.statements().is_empty());
}

#[tokio::test]
async fn test_select_expressions_are_checked_then_rendered() {
    let (pool, qb) = setup();
    pool.respond("SELECT COUNT", &["COUNT(id)"], vec![vec![SqlValue::Int(2)]]);

    qb.get_data_from_table("users", &ColumnSelection::from("COUNT(id)"), &Filter::None, false)
        .await
        .unwrap();
    assert_eq!(pool.last().sql, "SELECT COUNT(id) FROM `users`");

    qb.get_data_from_table(
        "orders",
        &ColumnSelection::expression("MAX(price), MIN(price)"),
        &Filter::from("status = 'paid'"),
        false,
    )
    .await
    .unwrap();
    assert_eq!(
        pool.last().sql,
        "SELECT MAX(price), MIN(price) FROM `orders` WHERE status=?"
    );

    pool.clear();
    for expr in ["id; DROP TABLE users", "DISTINCT name", "name -- x", "(SELECT 1)"] {
        let err = qb
            .get_data_from_table("users", &ColumnSelection::expression(expr), &Filter::None, false)
            .await
            .unwrap_err();
        assert!(err.is_injection(), "{expr} should be rejected");
    }
    assert!(pool.statements().is_empty());
}

#[tokio::test]
async fn test_pool_failures_are_classified() {
    let (pool, qb) = setup();
    pool.fail_queries("SHOW TABLES", PoolError::connectivity("connection refused"));

    let err = qb.get_table_names().await.unwrap_err();
    assert!(err.is_connectivity());
    assert!(matches!(err, QueryError::Pool(_)));
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_create_table_downgrades_on_unknown_version() {
    let (pool, qb) = setup();
    let definition = vec![
        ("id".to_string(), "INT AUTO_INCREMENT PRIMARY KEY".to_string()),
        ("created_at".to_string(), "DATETIME DEFAULT CURRENT_TIMESTAMP".to_string()),
    ];

    qb.create_table("users", &definition).await.unwrap();
    assert_eq!(
        pool.last().sql,
        "CREATE TABLE IF NOT EXISTS `users` (`id` INT AUTO_INCREMENT PRIMARY KEY, `created_at` DATETIME NULL) ENGINE=InnoDB"
    );

    qb.set_database_version(DbVersion::parse("8.0.36")).await;
    qb.create_table("users", &definition).await.unwrap();
    assert!(pool.last().sql.contains("`created_at` DATETIME DEFAULT CURRENT_TIMESTAMP"));
}

#[tokio::test]
async fn test_create_table_rejects_bad_definitions() {
    let (pool, qb) = setup();
    let bad = vec![("name".to_string(), "VARCHAR(10); DROP TABLE users".to_string())];
    assert!(qb.create_table("users", &bad).await.unwrap_err().is_injection());

    let empty: Vec<(String, String)> = Vec::new();
    assert!(matches!(
        qb.create_table("users", &empty).await,
        Err(QueryError::InvalidInput(_))
    ));
    assert!(pool.statements().is_empty());
}

#[tokio::test]
async fn test_multi_row_insert() {
    let (pool, qb) = setup();
    let cols = columns(&["id", "name"]);
    let rows = vec![
        vec![1.into(), "ada".into()],
        vec![2.into(), "bob".into(), "dropped".into()],
    ];

    let outcome = qb
        .insert_data_into_table("users", &rows, Some(cols.as_slice()))
        .await
        .unwrap();
    assert_eq!(outcome.rows_affected, 1);

    let stmt = pool.last();
    assert_eq!(stmt.sql, "INSERT INTO `users` (`id`, `name`) VALUES (?, ?), (?, ?)");
    assert_eq!(
        stmt.params,
        vec![1.into(), "ada".into(), 2.into(), "bob".into()]
    );
}

#[tokio::test]
async fn test_short_rows_are_rejected() {
    let (pool, qb) = setup();
    let cols = columns(&["id", "name"]);
    let err = qb
        .insert_data_into_table("users", &[vec![1.into()]], Some(cols.as_slice()))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidInput(_)));
    assert!(pool.statements().is_empty());
}

#[tokio::test]
async fn test_insert_fetches_columns_and_substitutes_now() {
    let (pool, qb) = setup();
    describe_users(&pool);

    qb.insert_data_into_table("users", &[vec![7.into(), "now".into()]], None)
        .await
        .unwrap();

    assert_eq!(
        pool.sql(),
        vec![
            "DESCRIBE `users`".to_string(),
            "INSERT INTO `users` (`id`, `name`) VALUES (?, ?)".to_string(),
        ]
    );
    assert_eq!(
        pool.last().params,
        vec![7.into(), SqlValue::from("2024-03-09 14:05:07")]
    );
}

#[tokio::test]
async fn test_update_binds_values_before_filter() {
    let (pool, qb) = setup();
    let cols = columns(&["name"]);
    qb.update_data_in_table("users", &["bob".into()], Some(cols.as_slice()), &Filter::from("id = 2"))
        .await
        .unwrap();

    let stmt = pool.last();
    assert_eq!(stmt.sql, "UPDATE `users` SET `name` = ? WHERE id=?");
    assert_eq!(stmt.params, vec![SqlValue::from("bob"), SqlValue::Int(2)]);
}

#[tokio::test]
async fn test_upsert_updates_existing_and_inserts_new() {
    let (pool, qb) = setup();
    let cols = columns(&["id", "name"]);

    pool.respond("SELECT COUNT(*)", &["COUNT(*)"], vec![vec![SqlValue::Int(1)]]);
    qb.insert_or_update_data_into_table("users", &[vec![1.into(), "ada".into()]], Some(cols.as_slice()))
        .await
        .unwrap();
    assert_eq!(
        pool.sql(),
        vec![
            "SELECT COUNT(*) FROM `users` WHERE `id` = ?".to_string(),
            "UPDATE `users` SET `id` = ?, `name` = ? WHERE `id` = ?".to_string(),
        ]
    );
    assert_eq!(pool.last().params, vec![1.into(), "ada".into(), 1.into()]);

    pool.clear();
    pool.respond("SELECT COUNT(*)", &["COUNT(*)"], vec![vec![SqlValue::Int(0)]]);
    qb.insert_or_update_data_into_table("users", &[vec![2.into(), "bob".into()]], Some(cols.as_slice()))
        .await
        .unwrap();
    assert_eq!(pool.last().sql, "INSERT INTO `users` (`id`, `name`) VALUES (?, ?)");
}

#[tokio::test]
async fn test_delete_and_drop() {
    let (pool, qb) = setup();
    qb.drop_data_from_table("users").await.unwrap();
    qb.remove_data_from_table("users", &Filter::from("id = 3")).await.unwrap();
    qb.drop_table("users").await.unwrap();

    assert_eq!(
        pool.sql(),
        vec![
            "DELETE FROM `users`".to_string(),
            "DELETE FROM `users` WHERE id=?".to_string(),
            "DROP TABLE IF EXISTS `users`".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_trigger_is_replaced() {
    let (pool, qb) = setup();
    qb.insert_trigger(
        "audit_users",
        "users",
        "after insert",
        "INSERT INTO audit_log (user_id) VALUES (NEW.id);",
    )
    .await
    .unwrap();

    let sql = pool.sql();
    assert_eq!(sql.len(), 2);
    assert_eq!(sql[0], "DROP TRIGGER IF EXISTS `audit_users`");
    assert!(sql[1].starts_with(
        "CREATE TRIGGER `audit_users` AFTER INSERT ON `users` FOR EACH ROW INSERT INTO audit_log"
    ));
}

#[tokio::test]
async fn test_failed_create_after_drop_returns_the_error() {
    let (pool, qb) = setup();
    pool.fail_writes_matching("CREATE TRIGGER", PoolError::integrity("unknown table"));

    let err = qb
        .insert_trigger(
            "audit_users",
            "users",
            "AFTER INSERT",
            "INSERT INTO audit_log (user_id) VALUES (NEW.id);",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Pool(_)));
    assert!(!err.is_connectivity());

    let sql = pool.sql();
    assert_eq!(sql.len(), 2);
    assert_eq!(sql[0], "DROP TRIGGER IF EXISTS `audit_users`");
    assert!(sql[1].starts_with("CREATE TRIGGER `audit_users`"));
}

#[tokio::test]
async fn test_rejected_trigger_keeps_the_old_one() {
    let (pool, qb) = setup();
    let err = qb
        .insert_or_update_trigger("audit_users", "users", "AFTER INSERT", "DROP TABLE users")
        .await
        .unwrap_err();
    assert!(err.is_injection());
    assert!(pool.statements().is_empty());
}
