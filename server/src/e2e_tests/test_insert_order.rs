//! Rows inserted by statement and by raw payload come back in ORDER BY order.

use crate::e2e_tests::helpers::*;

#[test]
fn test_values_and_formatted_insert_ordered() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (a UInt8) ENGINE = Memory").assert_ok();
    test.query("INSERT INTO t VALUES (1),(2),(3)").assert_ok();
    test.query("INSERT INTO t FORMAT TabSeparated 10\n11\n12\n").assert_ok();

    assert_eq!(
        test.tokens("SELECT a FROM t ORDER BY a"),
        vec!["1", "2", "3", "10", "11", "12"]
    );
}

#[test]
fn test_order_is_by_value_not_insertion() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (a UInt8)").assert_ok();
    test.query("INSERT INTO t FORMAT TabSeparated 12\n3\n").assert_ok();
    test.query("INSERT INTO t VALUES (11),(1)").assert_ok();
    test.query("INSERT INTO t FORMAT CSV 10\n2\n").assert_ok();

    assert_eq!(
        test.tokens("SELECT a FROM t ORDER BY a"),
        vec!["1", "2", "3", "10", "11", "12"]
    );
    assert_eq!(
        test.tokens("SELECT a FROM t ORDER BY a DESC LIMIT 2"),
        vec!["12", "11"]
    );
}

#[test]
fn test_order_by_string_column() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE people (name String, age UInt8)").assert_ok();
    test.query("INSERT INTO people VALUES ('carol', 30), ('alice', 25), ('bob', 30)")
        .assert_ok();

    assert_eq!(
        test.tokens("SELECT name FROM people ORDER BY age DESC, name"),
        vec!["bob", "carol", "alice"]
    );
}
