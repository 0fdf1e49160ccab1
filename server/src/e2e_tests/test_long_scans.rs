//! Aggregating and sorting calls stay interruptible while they scan.
//!
//! `count()` and `ORDER BY` emit nothing until their scan ends, so these
//! calls rely on the producer seeing cancel, drop and deadline between
//! engine blocks.

use std::time::Duration;

use crate::config::ServerConfig;
use crate::e2e_tests::helpers::*;
use crate::proto::google::rpc::Code;
use crate::testing;
use crate::types::QuerySpec;

const LONG_COUNT: &str = "SELECT count() FROM numbers(1000000000000) WHERE number > 0";
const LONG_SORT: &str = "SELECT number FROM numbers(20000000) ORDER BY number DESC LIMIT 1";

const ALL_SLOTS: usize = ServerConfig::DEFAULT_QUOTA_MAX_CALLS;

fn cancel_after_start(query: &str) {
    let mut test = TestClient::new();
    let request_id = test.start(query);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(test.service.quotas().available("default"), Some(ALL_SLOTS - 1));

    let cancel_id = test.request_id();
    assert!(test.send(testing::cancel_message(cancel_id, request_id)).is_none());

    let result = test.collect(request_id);
    assert_eq!(result.code(), Code::Cancelled);
    assert!(result.chunks.is_empty());
    test.wait_for_quota("default", ALL_SLOTS);
}

fn drop_after_start(query: &str) {
    let test = TestClient::new();
    test.runtime.block_on(async {
        let stream = test.service.execute(&default_auth(), QuerySpec::new(query));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(test.service.quotas().available("default"), Some(ALL_SLOTS - 1));
        drop(stream);
    });
    test.wait_for_quota("default", ALL_SLOTS);
    test.execute(&default_auth(), QuerySpec::new("SELECT 1"))
        .assert_ok();
}

#[test]
fn test_cancel_during_count() {
    cancel_after_start(LONG_COUNT);
}

#[test]
fn test_drop_during_count() {
    drop_after_start(LONG_COUNT);
}

#[test]
fn test_cancel_during_order_by() {
    cancel_after_start(LONG_SORT);
}

#[test]
fn test_drop_during_order_by() {
    drop_after_start(LONG_SORT);
}

#[test]
fn test_deadline_during_count() {
    let test = TestClient::new();
    let mut spec = QuerySpec::new(LONG_COUNT);
    spec.max_execution_time = Some(Duration::from_millis(50));
    let result = test.execute(&default_auth(), spec);
    assert_eq!(result.code(), Code::DeadlineExceeded);
    assert!(result.chunks.is_empty());
    test.wait_for_quota("default", ALL_SLOTS);
}

#[test]
fn test_bounded_sort_and_count_complete() {
    let mut test = TestClient::new();
    assert_eq!(
        test.tokens("SELECT number FROM numbers(200000) ORDER BY number DESC LIMIT 3"),
        vec!["199999", "199998", "199997"]
    );
    assert_eq!(
        test.tokens("SELECT count() FROM numbers(200000) WHERE number >= 150000"),
        vec!["50000"]
    );
}
