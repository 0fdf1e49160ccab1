//! A second CREATE TABLE for the same name fails the same way every time.

use crate::e2e_tests::helpers::*;
use crate::proto::google::rpc::Code;

#[test]
fn test_duplicate_create_is_already_exists() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (a UInt8) ENGINE = Memory").assert_ok();

    for _ in 0..5 {
        let result = test.query("CREATE TABLE t (a UInt8) ENGINE = Memory");
        assert_eq!(result.code(), Code::AlreadyExists);
        assert!(result.chunks.is_empty());
        assert_eq!(result.status.message, "query error: table t already exists");
    }
}

#[test]
fn test_duplicate_create_if_not_exists_is_idempotent() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (a UInt8)").assert_ok();
    test.query("INSERT INTO t VALUES (5)").assert_ok();

    for _ in 0..3 {
        let result = test.query("CREATE TABLE IF NOT EXISTS t (a UInt8)");
        result.assert_ok();
        assert!(result.chunks.is_empty());
    }
    // The existing table is untouched.
    assert_eq!(test.tokens("SELECT a FROM t"), vec!["5"]);
}

#[test]
fn test_failed_create_does_not_break_the_connection() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (a UInt8)").assert_ok();
    assert_eq!(test.query("CREATE TABLE t (a UInt8)").code(), Code::AlreadyExists);
    assert_eq!(test.tokens("SELECT 1"), vec!["1"]);
}
