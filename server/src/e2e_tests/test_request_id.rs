//! Request ids and query ids are echoed on every frame of a call.

use crate::e2e_tests::helpers::*;
use crate::proto::{self, google::rpc::Code};
use crate::testing;

#[test]
fn test_request_id_preserved() {
    let mut test = TestClient::new();

    for request_id in [1, 100, 999, u32::MAX] {
        let reply = test.send(testing::query_message(
            request_id,
            "SELECT number FROM numbers(3)",
        ));
        assert!(reply.is_none());
        let result = test.collect(request_id);
        result.assert_ok();
        assert_eq!(result.tokens(), vec!["0", "1", "2"]);
    }
}

#[test]
fn test_request_id_none() {
    let mut test = TestClient::new();
    let mut message = testing::query_message(1, "SELECT 1");
    message.request_id = None;

    let reply = test.send(message).unwrap();
    assert_eq!(reply.request_id, None);
    assert_eq!(status_code(&reply), Some(Code::InvalidArgument));
}

#[test]
fn test_query_id_is_echoed_on_every_frame() {
    let config = crate::config::ServerConfig {
        max_block_size: 2,
        ..Default::default()
    };
    let mut test = TestClient::with_config(&config);
    let reply = test.send(query_request(
        7,
        proto::AuthContext {
            user: "default".to_owned(),
            ..Default::default()
        },
        proto::QuerySpec {
            query: "SELECT number FROM numbers(6)".to_owned(),
            query_id: "123".to_owned(),
            ..Default::default()
        },
    ));
    assert!(reply.is_none());

    let mut frames = 0;
    loop {
        let frame = test.next_frame_for(7);
        assert_eq!(frame.query_id, "123");
        frames += 1;
        if status_code(&frame).is_some() {
            break;
        }
    }
    assert_eq!(frames, 4);
}

#[test]
fn test_generated_query_id() {
    let mut test = TestClient::new();
    let result = test.query("SELECT 1");
    assert_eq!(result.query_id.len(), 36);
    assert!(uuid::Uuid::parse_str(&result.query_id).is_ok());
    assert_ne!(result.query_id, test.query("SELECT 1").query_id);
}

#[test]
fn test_missing_sub_messages_are_protocol_errors() {
    let mut test = TestClient::new();
    let message = proto::ClientMessage {
        request_id: Some(5),
        payload: Some(proto::client_message::Payload::Query(proto::QueryRequest {
            auth: None,
            query: Some(proto::QuerySpec::default()),
        })),
    };
    let reply = test.send(message).unwrap();
    assert_eq!(reply.request_id, Some(5));
    assert_eq!(status_code(&reply), Some(Code::InvalidArgument));

    let message = proto::ClientMessage {
        request_id: Some(6),
        payload: None,
    };
    let reply = test.send(message).unwrap();
    assert_eq!(status_code(&reply), Some(Code::InvalidArgument));
}

#[test]
fn test_request_id_reusable_after_completion() {
    let mut test = TestClient::new();
    for _ in 0..3 {
        assert!(test.send(testing::query_message(1, "SELECT 1")).is_none());
        test.collect(1).assert_ok();
        test.wait_idle();
    }
}
