//! Empty query text yields no chunks and a success status.

use crate::e2e_tests::helpers::*;
use crate::proto::google::rpc::Code;

#[test]
fn test_empty_query_succeeds_without_chunks() {
    let mut test = TestClient::new();

    for text in ["", "   ", "\n\t", ";", " ; "] {
        let result = test.query(text);
        assert_eq!(result.code(), Code::Ok, "query {text:?}");
        assert!(result.chunks.is_empty(), "query {text:?} produced chunks");
    }
}

#[test]
fn test_empty_query_still_requires_auth() {
    let test = TestClient::new();
    let result = test.execute(
        &crate::types::AuthContext::new("nobody", ""),
        crate::types::QuerySpec::new(""),
    );
    assert_eq!(result.code(), Code::Unauthenticated);
    assert!(result.chunks.is_empty());
}
