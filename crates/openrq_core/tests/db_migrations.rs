use openrq_core::db::migrations::latest_version;
use openrq_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

fn user_version(conn: &Connection) -> u32 {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .expect("read user_version")
}

fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name;")
        .expect("prepare table listing");
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .expect("list tables")
        .collect::<Result<Vec<_>, _>>()
        .expect("collect tables");
    names
}

#[test]
fn fresh_database_reaches_latest_schema() {
    let conn = open_db_in_memory().expect("open in memory");

    assert_eq!(user_version(&conn), latest_version());
    let tables = table_names(&conn);
    for expected in ["project_info", "requirements", "solution_members", "solutions"] {
        assert!(
            tables.iter().any(|name| name == expected),
            "missing table {expected}, have {tables:?}"
        );
    }
}

#[test]
fn project_file_survives_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("reopen.orq");

    {
        let conn = open_db(&path).expect("first open");
        conn.execute("INSERT INTO requirements (uid) VALUES (42);", [])
            .expect("insert requirement");
    }

    let conn = open_db(&path).expect("second open");
    assert_eq!(user_version(&conn), latest_version());
    let uid: i64 = conn
        .query_row("SELECT uid FROM requirements;", [], |row| row.get(0))
        .expect("single requirement row");
    assert_eq!(uid, 42);
}

#[test]
fn file_from_newer_build_is_refused() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("future.orq");
    Connection::open(&path)
        .and_then(|conn| conn.pragma_update(None, "user_version", 999))
        .expect("stamp future version");

    let err = open_db(&path).expect_err("newer schema must be refused");
    let DbError::UnsupportedSchemaVersion {
        db_version,
        latest_supported,
    } = err
    else {
        panic!("expected schema version error, got {err}");
    };
    assert_eq!((db_version, latest_supported), (999, latest_version()));
}

#[test]
fn half_set_parent_pointer_violates_check() {
    let conn = open_db_in_memory().expect("open in memory");
    let inserted = conn.execute(
        "INSERT INTO solutions (uid, parent_id, parent_kind) VALUES (1, 7, NULL);",
        [],
    );
    assert!(inserted.is_err());
}

#[test]
fn member_rows_follow_their_solution() {
    let conn = open_db_in_memory().expect("open in memory");
    conn.execute_batch(
        "INSERT INTO solutions (id, uid) VALUES (1, 10);
         INSERT INTO solution_members (solution_id, member_id, member_kind, position)
         VALUES (1, 5, 'requirement', 0);
         DELETE FROM solutions WHERE id = 1;",
    )
    .expect("cascade script");

    let members: i64 = conn
        .query_row("SELECT COUNT(*) FROM solution_members;", [], |row| row.get(0))
        .expect("count members");
    assert_eq!(members, 0);
}
