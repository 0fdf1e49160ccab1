//! Engine failures surface as structured query errors with no chunks.

use crate::e2e_tests::helpers::*;
use crate::proto::google::rpc::Code;

#[test]
fn test_syntax_error() {
    let mut test = TestClient::new();
    let result = test.query("SELEC 1");
    assert_eq!(result.code(), Code::InvalidArgument);
    assert!(result.status.message.starts_with("query error: syntax error"));
    assert!(result.chunks.is_empty());
}

#[test]
fn test_unknown_table_and_column() {
    let mut test = TestClient::new();
    assert_eq!(test.query("SELECT * FROM nowhere").code(), Code::NotFound);
    assert_eq!(test.query("SELECT nope FROM numbers(3)").code(), Code::NotFound);
}

#[test]
fn test_out_of_range_insert() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (a UInt8)").assert_ok();
    let result = test.query("INSERT INTO t VALUES (256)");
    assert_eq!(result.code(), Code::InvalidArgument);
    assert_eq!(test.tokens("SELECT count() FROM t"), vec!["0"]);
}

#[test]
fn test_unsupported_statement_shapes() {
    let mut test = TestClient::new();
    assert_eq!(
        test.query("SELECT count() FROM system.numbers").code(),
        Code::InvalidArgument
    );
    assert_eq!(
        test.query("SELECT number FROM system.numbers ORDER BY number").code(),
        Code::InvalidArgument
    );
    assert_eq!(
        test.query("CREATE TABLE t (a UInt8) ENGINE = MergeTree").code(),
        Code::InvalidArgument
    );
}

#[test]
fn test_bad_type_name() {
    let mut test = TestClient::new();
    assert_eq!(
        test.query("CREATE TABLE t (a Decimal)").code(),
        Code::InvalidArgument
    );
}
