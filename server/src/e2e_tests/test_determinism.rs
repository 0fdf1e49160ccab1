//! The same query over the same data produces the same payload.

use crate::e2e_tests::helpers::*;

fn run_sequence() -> Vec<String> {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (id UInt32, name String, score Float64)")
        .assert_ok();
    test.query("INSERT INTO t VALUES (3, 'c', 1.5), (1, 'a', -2), (2, 'b', 0.25)")
        .assert_ok();

    let mut payloads = Vec::new();
    for query in [
        "SELECT * FROM t",
        "SELECT * FROM t ORDER BY id",
        "SELECT name, score FROM t WHERE score > 0 ORDER BY name FORMAT CSVWithNames",
        "SELECT count() FROM numbers(12345)",
    ] {
        let result = test.query(query);
        result.assert_ok();
        payloads.push(result.payload());
    }
    payloads
}

#[test]
fn test_deterministic_sequence() {
    let run1 = run_sequence();
    let run2 = run_sequence();
    assert_eq!(run1, run2);
}

#[test]
fn test_repeated_calls_on_one_service() {
    let mut test = TestClient::new();
    let first = test.query("SELECT number FROM numbers(5000)");
    first.assert_ok();
    for _ in 0..5 {
        assert_eq!(test.query("SELECT number FROM numbers(5000)").payload(), first.payload());
    }
}

#[test]
fn test_unordered_scan_keeps_insertion_order() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (a UInt8)").assert_ok();
    test.query("INSERT INTO t VALUES (3),(1),(2)").assert_ok();
    assert_eq!(test.tokens("SELECT a FROM t"), vec!["3", "1", "2"]);
}
