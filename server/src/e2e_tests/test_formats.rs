//! Output formats, requested on the `QuerySpec` or in the statement text.

use crate::e2e_tests::helpers::*;
use crate::proto::{self, google::rpc::Code};

fn run_with_format(test: &mut TestClient, query: &str, format: &str) -> CallResult {
    let request_id = test.request_id();
    let reply = test.send(query_request(
        request_id,
        proto::AuthContext {
            user: "default".to_owned(),
            ..Default::default()
        },
        proto::QuerySpec {
            query: query.to_owned(),
            format: format.to_owned(),
            ..Default::default()
        },
    ));
    match reply {
        Some(reply) => CallResult {
            query_id: reply.query_id,
            chunks: vec![],
            status: match reply.payload {
                Some(proto::server_message::Payload::Status(status)) => status,
                other => panic!("unexpected reply {other:?}"),
            },
        },
        None => test.collect(request_id),
    }
}

fn setup(test: &mut TestClient) {
    test.query("CREATE TABLE t (id UInt8, name String)").assert_ok();
    test.query("INSERT INTO t VALUES (1, 'a\tb'), (2, 'say \"hi\"')")
        .assert_ok();
}

#[test]
fn test_tab_separated_with_names() {
    let mut test = TestClient::new();
    setup(&mut test);
    let result = run_with_format(&mut test, "SELECT * FROM t", "TabSeparatedWithNames");
    result.assert_ok();
    assert_eq!(result.payload(), "id\tname\n1\ta\\tb\n2\tsay \"hi\"\n");
}

#[test]
fn test_csv() {
    let mut test = TestClient::new();
    setup(&mut test);
    let result = run_with_format(&mut test, "SELECT * FROM t", "CSV");
    result.assert_ok();
    assert_eq!(result.payload(), "1,\"a\tb\"\n2,\"say \"\"hi\"\"\"\n");
}

#[test]
fn test_format_clause_wins_over_requested_format() {
    let mut test = TestClient::new();
    let result = run_with_format(&mut test, "SELECT 'x' FORMAT CSVWithNames", "TabSeparated");
    result.assert_ok();
    assert_eq!(result.payload(), "\"'x'\"\n\"x\"\n");
}

#[test]
fn test_header_is_sent_for_empty_result() {
    let mut test = TestClient::new();
    let result = run_with_format(
        &mut test,
        "SELECT number FROM numbers(0)",
        "TabSeparatedWithNames",
    );
    result.assert_ok();
    assert_eq!(result.chunks, vec!["number\n".to_owned()]);
}

#[test]
fn test_empty_result_without_header_has_no_chunks() {
    let mut test = TestClient::new();
    let result = run_with_format(&mut test, "SELECT number FROM numbers(0)", "");
    result.assert_ok();
    assert!(result.chunks.is_empty());
}

#[test]
fn test_unknown_format_is_a_protocol_error() {
    let mut test = TestClient::new();
    let result = run_with_format(&mut test, "SELECT 1", "Parquet");
    assert_eq!(result.code(), Code::InvalidArgument);
    assert!(result.status.message.starts_with("protocol error:"));
    assert!(result.chunks.is_empty());
}

#[test]
fn test_unknown_format_in_statement_is_a_query_error() {
    let mut test = TestClient::new();
    let result = run_with_format(&mut test, "SELECT 1 FORMAT Parquet", "");
    assert_eq!(result.code(), Code::InvalidArgument);
    assert!(result.status.message.starts_with("query error:"));
}
