//! DDL succeeds without chunks and later calls observe it.

use crate::e2e_tests::helpers::*;
use crate::proto::google::rpc::Code;

#[test]
fn test_create_table_then_read() {
    let mut test = TestClient::new();

    let created = test.query("CREATE TABLE t (a UInt8) ENGINE = Memory");
    created.assert_ok();
    assert!(created.chunks.is_empty());

    assert_eq!(test.tokens("SHOW TABLES"), vec!["t"]);
    assert!(test.tokens("SELECT * FROM t").is_empty());
    assert_eq!(test.tokens("SELECT count() FROM t"), vec!["0"]);
}

#[test]
fn test_insert_is_visible_to_next_call() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (id UInt32, name String)").assert_ok();

    let inserted = test.query("INSERT INTO t VALUES (1, 'one'), (2, 'two')");
    inserted.assert_ok();
    assert!(inserted.chunks.is_empty());

    assert_eq!(test.tokens("SELECT count() FROM t"), vec!["2"]);
    assert_eq!(
        test.tokens("SELECT name FROM t WHERE id = 2"),
        vec!["two"]
    );
}

#[test]
fn test_truncate_and_drop() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (a UInt8)").assert_ok();
    test.query("INSERT INTO t VALUES (1), (2)").assert_ok();

    test.query("TRUNCATE TABLE t").assert_ok();
    assert!(test.tokens("SELECT a FROM t").is_empty());

    test.query("DROP TABLE t").assert_ok();
    assert!(test.tokens("SHOW TABLES").is_empty());
    assert_eq!(test.query("SELECT a FROM t").code(), Code::NotFound);
}

#[test]
fn test_drop_missing_table() {
    let mut test = TestClient::new();
    assert_eq!(test.query("DROP TABLE missing").code(), Code::NotFound);
    test.query("DROP TABLE IF EXISTS missing").assert_ok();
}

#[test]
fn test_tables_are_shared_across_connections() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE shared (a UInt8)").assert_ok();
    test.query("INSERT INTO shared VALUES (7)").assert_ok();

    let result = test.execute(
        &default_auth(),
        crate::types::QuerySpec::new("SELECT a FROM shared"),
    );
    result.assert_ok();
    assert_eq!(result.tokens(), vec!["7"]);
}
