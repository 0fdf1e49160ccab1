//! Admission failures: no chunks, a precise status, and no leaked quota slots.

use std::collections::BTreeMap;

use jsonwebtoken::{EncodingKey, Header, encode};

use crate::config::ServerConfig;
use crate::e2e_tests::helpers::*;
use crate::proto::google::rpc::Code;
use crate::types::{AuthContext, QuerySpec};

fn config() -> ServerConfig {
    ServerConfig {
        users: BTreeMap::from([
            ("default".to_owned(), String::new()),
            ("alice".to_owned(), "secret".to_owned()),
        ]),
        jwt_secret: Some(b"e2e-jwt-secret".to_vec()),
        quotas: BTreeMap::from([
            ("default".to_owned(), 4),
            ("single".to_owned(), 1),
        ]),
        ..ServerConfig::default()
    }
}

#[test]
fn test_password_credential() {
    let test = TestClient::with_config(&config());

    let ok = test.execute(&AuthContext::new("alice", "secret"), QuerySpec::new("SELECT 1"));
    ok.assert_ok();
    assert_eq!(ok.tokens(), vec!["1"]);

    let bad = test.execute(&AuthContext::new("alice", "guess"), QuerySpec::new("SELECT 1"));
    assert_eq!(bad.code(), Code::Unauthenticated);
    assert!(bad.chunks.is_empty());
}

#[test]
fn test_unknown_user() {
    let test = TestClient::with_config(&config());
    let result = test.execute(&AuthContext::new("mallory", ""), QuerySpec::new("SELECT 1"));
    assert_eq!(result.code(), Code::Unauthenticated);
    assert!(result.chunks.is_empty());
}

#[test]
fn test_jwt_credential() {
    #[derive(serde::Serialize)]
    struct Claims {
        sub: String,
    }
    let token = encode(
        &Header::default(),
        &Claims {
            sub: "alice".to_owned(),
        },
        &EncodingKey::from_secret(b"e2e-jwt-secret"),
    )
    .unwrap();

    let test = TestClient::with_config(&config());
    let result = test.execute(&AuthContext::new("alice", token), QuerySpec::new("SELECT 1"));
    result.assert_ok();
}

#[test]
fn test_unknown_quota_class() {
    let test = TestClient::with_config(&config());
    let result = test.execute(
        &default_auth().with_quota("gold"),
        QuerySpec::new("SELECT 1"),
    );
    assert_eq!(result.code(), Code::PermissionDenied);
    assert!(result.chunks.is_empty());
}

#[test]
fn test_quota_exhausted_while_call_runs() {
    let mut config = config();
    config.call_channel_capacity = 1;
    config.max_block_size = 10;
    let test = TestClient::with_config(&config);
    let auth = default_auth().with_quota("single");

    // Holds the only slot: an unbounded scan that nobody reads.
    let running = test.runtime.block_on(async {
        test.service
            .execute(&auth, QuerySpec::new("SELECT number FROM system.numbers"))
    });

    let rejected = test.execute(&auth, QuerySpec::new("SELECT 1"));
    assert_eq!(rejected.code(), Code::ResourceExhausted);
    assert!(rejected.chunks.is_empty());

    drop(running);
    test.wait_for_quota("single", 1);
    test.execute(&auth, QuerySpec::new("SELECT 1")).assert_ok();
}

#[test]
fn test_rejections_do_not_consume_quota() {
    let test = TestClient::with_config(&config());
    for _ in 0..10 {
        let result = test.execute(&AuthContext::new("alice", "wrong"), QuerySpec::new("SELECT 1"));
        assert_eq!(result.code(), Code::Unauthenticated);
    }
    assert_eq!(test.service.quotas().available("default"), Some(4));
}
