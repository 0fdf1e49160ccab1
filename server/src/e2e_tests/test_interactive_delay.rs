//! Flush pacing: chunk boundaries move, the concatenated payload does not.

use std::time::Duration;

use crate::config::ServerConfig;
use crate::e2e_tests::helpers::*;
use crate::types::QuerySpec;

fn small_blocks() -> ServerConfig {
    ServerConfig {
        max_block_size: 10,
        ..ServerConfig::default()
    }
}

#[test]
fn test_zero_delay_streams_every_block() {
    let test = TestClient::with_config(&small_blocks());
    let result = test.execute(
        &default_auth(),
        QuerySpec::new("SELECT number FROM numbers(100)"),
    );
    result.assert_ok();
    assert_eq!(result.chunks.len(), 10);
    assert_eq!(result.payload(), number_lines(100));
    assert!(result.chunks.iter().all(|chunk| !chunk.is_empty()));
}

#[test]
fn test_long_delay_coalesces_into_one_chunk() {
    let test = TestClient::with_config(&small_blocks());
    let mut spec = QuerySpec::new("SELECT number FROM numbers(100)");
    spec.interactive_delay = Duration::from_secs(3600);
    let result = test.execute(&default_auth(), spec);
    result.assert_ok();
    assert_eq!(result.chunks, vec![number_lines(100)]);
}

#[test]
fn test_chunk_size_limit_splits_output() {
    let config = ServerConfig {
        max_chunk_bytes: 64,
        ..ServerConfig::default()
    };
    let test = TestClient::with_config(&config);
    let mut spec = QuerySpec::new("SELECT number FROM numbers(1000)");
    spec.interactive_delay = Duration::from_secs(3600);
    let result = test.execute(&default_auth(), spec);
    result.assert_ok();
    assert!(result.chunks.len() > 1);
    assert_eq!(result.payload(), number_lines(1000));
    // Every chunk ends on a row boundary.
    assert!(result.chunks.iter().all(|chunk| chunk.ends_with('\n')));
}

#[test]
fn test_deadline_stops_long_call() {
    let test = TestClient::with_config(&small_blocks());
    let mut spec = QuerySpec::new("SELECT number FROM system.numbers");
    spec.max_execution_time = Some(Duration::from_millis(50));
    spec.interactive_delay = Duration::from_millis(10);
    let result = test.execute(&default_auth(), spec);
    assert_eq!(
        result.code(),
        crate::proto::google::rpc::Code::DeadlineExceeded
    );
    // Whatever was streamed before the deadline is a clean prefix.
    let payload = result.payload();
    let lines: Vec<&str> = payload.lines().collect();
    for (index, line) in lines.iter().enumerate() {
        assert_eq!(line.parse::<usize>().unwrap(), index);
    }
}
