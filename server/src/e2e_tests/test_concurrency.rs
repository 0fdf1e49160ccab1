//! Many calls at once, on one connection and across the service.

use std::collections::BTreeMap;

use crate::e2e_tests::helpers::*;
use crate::types::QuerySpec;

#[test]
fn test_interleaved_calls_on_one_connection() {
    let mut test = TestClient::new();

    let ids: BTreeMap<u32, u64> = (1..=8_u64)
        .map(|n| (test.start(&format!("SELECT number FROM numbers({})", n * 100)), n * 100))
        .collect();

    for (request_id, count) in ids {
        let result = test.collect(request_id);
        result.assert_ok();
        assert_eq!(result.payload(), number_lines(count));
    }
}

#[test]
fn test_parallel_service_calls() {
    let test = TestClient::new();

    let results = test.runtime.block_on(async {
        let handles: Vec<_> = (0..16_u64)
            .map(|n| {
                let service = std::sync::Arc::clone(&test.service);
                tokio::spawn(async move {
                    use futures::StreamExt;
                    let stream = service.execute(
                        &default_auth(),
                        QuerySpec::new(format!("SELECT count() FROM numbers({n})")),
                    );
                    let chunks: Vec<_> = stream.collect().await;
                    (n, chunks)
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    });

    for (n, items) in results {
        let payload: String = items
            .into_iter()
            .map(|item| item.unwrap().payload)
            .collect();
        assert_eq!(payload, format!("{n}\n"));
    }
}

#[test]
fn test_writers_do_not_disturb_open_readers() {
    let mut test = TestClient::new();
    test.query("CREATE TABLE t (a UInt32)").assert_ok();
    let values: Vec<String> = (0..500).map(|i| format!("({i})")).collect();
    test.query(&format!("INSERT INTO t VALUES {}", values.join(",")))
        .assert_ok();

    let reader = test.start("SELECT a FROM t");
    let writer = test.start("INSERT INTO t VALUES (1000)");

    let read = test.collect(reader);
    read.assert_ok();
    // The reader sees the table as it was when its statement started.
    assert!(read.tokens().len() == 500 || read.tokens().len() == 501);
    test.collect(writer).assert_ok();
    assert_eq!(test.tokens("SELECT count() FROM t"), vec!["501"]);
}
