//! Hub Integration Tests
//!
//! Each test starts an in-process hub on an ephemeral port with in-memory
//! identity and participant collaborators, so no external services are needed.
//!
//! Run with: cargo test -p integration-tests --test hub_tests

use chat_common::{HubConfig, JwtService};
use chat_core::UserId;
use integration_tests::{assert_status, wait_until, TestHub, INTERNAL_TOKEN};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

fn message_body(id: i64, conversation_id: i64, sender_id: i64, content: &str) -> Value {
    json!({
        "senderId": sender_id,
        "message": {
            "id": id,
            "conversation_id": conversation_id,
            "sender_id": sender_id,
            "content": content,
            "timestamp": "2024-05-01T12:00:00Z",
        }
    })
}

// ============================================================================
// Presence
// ============================================================================

#[tokio::test]
async fn test_two_users_in_shared_conversation() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    hub.participants.set_members(7, [1, 2]);

    let (mut alice, snapshot) = hub.connect_as(1).await.unwrap();
    assert_eq!(snapshot["onlineUserIds"], json!([]));

    let (mut bob, snapshot) = hub.connect_as(2).await.unwrap();
    assert_eq!(snapshot["onlineUserIds"], json!([1]));

    let update = alice.expect_event("presenceUpdate").await.unwrap();
    assert_eq!(update["userId"], 2);
    assert_eq!(update["status"], "online");

    // Typing reaches the other participant only
    alice.subscribe(7).await.unwrap();
    alice.typing(7, true).await.unwrap();

    let typing = bob.expect_event("typingUpdate").await.unwrap();
    assert_eq!(typing["conversationId"], 7);
    assert_eq!(typing["userId"], 1);
    assert_eq!(typing["isTyping"], true);
    alice.expect_silence().await.unwrap();

    // A stored message reaches both participants, sender included
    hub.trigger("/messages", &message_body(100, 7, 1, "hello"))
        .await
        .unwrap();

    for client in [&mut alice, &mut bob] {
        let event = client.expect_event("newMessage").await.unwrap();
        assert_eq!(event["message"]["id"], 100);
        assert_eq!(event["message"]["content"], "hello");
        assert_eq!(event["message"]["timestamp"], "2024-05-01T12:00:00Z");
    }

    // Disconnect announces offline exactly once
    bob.close().await.unwrap();
    let update = alice.expect_event("presenceUpdate").await.unwrap();
    assert_eq!(update["userId"], 2);
    assert_eq!(update["status"], "offline");
    alice.expect_silence().await.unwrap();

    wait_until(|| !hub.state.presence().is_online(UserId::new(2)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_snapshot_lists_everyone_else_sorted() {
    let hub = TestHub::start().await.expect("Failed to start hub");

    let (_u5, _) = hub.connect_as(5).await.unwrap();
    let (_u2, _) = hub.connect_as(2).await.unwrap();
    let (_u9, snapshot) = hub.connect_as(9).await.unwrap();

    assert_eq!(snapshot["onlineUserIds"], json!([2, 5]));
    assert_eq!(
        hub.state.presence().online(),
        vec![UserId::new(2), UserId::new(5), UserId::new(9)]
    );
}

#[tokio::test]
async fn test_second_connection_supersedes_first() {
    let hub = TestHub::start().await.expect("Failed to start hub");

    let (mut observer, _) = hub.connect_as(2).await.unwrap();
    let (mut first, _) = hub.connect_as(1).await.unwrap();
    observer.expect_event("presenceUpdate").await.unwrap();

    let (mut second, snapshot) = hub.connect_as(1).await.unwrap();
    assert_eq!(snapshot["onlineUserIds"], json!([2]));

    let closed = first.expect_close().await.unwrap();
    assert_eq!(closed.code, 4006);
    assert_eq!(closed.reason, "Connected elsewhere");

    // One online delta for the new session, no offline for the evicted one
    let update = observer.expect_event("presenceUpdate").await.unwrap();
    assert_eq!(update["userId"], 1);
    assert_eq!(update["status"], "online");
    observer.expect_silence().await.unwrap();

    // Deliveries target the surviving session
    hub.trigger("/blocks", &json!({ "blockerId": 2, "blockedId": 1 }))
        .await
        .unwrap();
    let blocked = second.expect_event("userBlocked").await.unwrap();
    assert_eq!(blocked["blockerId"], 2);
    assert!(hub.state.presence().is_online(UserId::new(1)));
}

// ============================================================================
// Typing
// ============================================================================

#[tokio::test]
async fn test_typing_ignored_without_subscription() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    hub.participants.set_members(7, [1, 2]);

    let (mut alice, _) = hub.connect_as(1).await.unwrap();
    let (mut bob, _) = hub.connect_as(2).await.unwrap();
    alice.expect_event("presenceUpdate").await.unwrap();

    alice.typing(7, true).await.unwrap();
    bob.expect_silence().await.unwrap();

    // Unsubscribing stops relaying again
    alice.subscribe(7).await.unwrap();
    alice
        .send_json(&json!({ "type": "unsubscribeConversation" }))
        .await
        .unwrap();
    alice.typing(7, false).await.unwrap();
    bob.expect_silence().await.unwrap();
}

#[tokio::test]
async fn test_typing_lookup_failure_keeps_connection_open() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let (mut alice, _) = hub.connect_as(1).await.unwrap();

    hub.participants.set_unavailable(true);
    alice.subscribe(7).await.unwrap();
    alice.typing(7, true).await.unwrap();

    let error = alice.expect_event("error").await.unwrap();
    assert_eq!(error["message"], "Error processing message.");

    alice.send_json(&json!({ "type": "ping" })).await.unwrap();
    alice.expect_event("pong").await.unwrap();
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_ping_pong() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let (mut alice, _) = hub.connect_as(1).await.unwrap();

    alice.send_json(&json!({ "type": "ping" })).await.unwrap();
    let pong = alice.recv_event().await.unwrap();
    assert_eq!(pong, json!({ "type": "pong" }));
}

#[tokio::test]
async fn test_intent_before_authenticate_closes() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let mut ws = hub.connect().await.unwrap();

    ws.send_json(&json!({ "type": "ping" })).await.unwrap();

    let closed = ws.expect_close().await.unwrap();
    assert_eq!(closed.code, 4003);
    assert_eq!(closed.reason, "Authentication required");
}

#[tokio::test]
async fn test_invalid_credential_sends_error_then_closes() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let mut ws = hub.connect().await.unwrap();

    ws.send_json(&json!({ "type": "authenticate", "userId": 1, "token": "forged" }))
        .await
        .unwrap();

    let error = ws.expect_event("error").await.unwrap();
    assert_eq!(error["message"], "Authentication failed.");

    let closed = ws.expect_close().await.unwrap();
    assert_eq!(closed.code, 4004);
    assert!(!hub.state.presence().is_online(UserId::new(1)));
}

#[tokio::test]
async fn test_unauthenticated_sockets_leave_presence_untouched() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let (mut observer, _) = hub.connect_as(1).await.unwrap();

    // Opens and leaves without ever authenticating.
    let idle = hub.connect().await.unwrap();
    wait_until(|| hub.state.open_connections() == 2).await.unwrap();
    idle.close().await.unwrap();

    // Claims the observer's identity with a bad credential.
    let mut forger = hub.connect().await.unwrap();
    forger
        .send_json(&json!({ "type": "authenticate", "userId": 1, "token": "forged" }))
        .await
        .unwrap();
    forger.expect_event("error").await.unwrap();
    assert_eq!(forger.expect_close().await.unwrap().code, 4004);

    wait_until(|| hub.state.open_connections() == 1).await.unwrap();
    observer.expect_silence().await.unwrap();
    assert_eq!(hub.state.presence().online(), vec![UserId::new(1)]);
}

#[tokio::test]
async fn test_credential_for_other_identity_is_rejected() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let token = hub.tokens.issue(1);
    let mut ws = hub.connect().await.unwrap();

    ws.send_json(&json!({ "type": "authenticate", "userId": 2, "token": token }))
        .await
        .unwrap();

    ws.expect_event("error").await.unwrap();
    assert_eq!(ws.expect_close().await.unwrap().code, 4004);
}

#[tokio::test]
async fn test_second_authenticate_closes_and_goes_offline() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let (mut observer, _) = hub.connect_as(2).await.unwrap();
    let (mut alice, _) = hub.connect_as(1).await.unwrap();
    observer.expect_event("presenceUpdate").await.unwrap();

    let token = hub.tokens.issue(1);
    alice
        .send_json(&json!({ "type": "authenticate", "userId": 1, "token": token }))
        .await
        .unwrap();

    assert_eq!(alice.expect_close().await.unwrap().code, 4005);

    let update = observer.expect_event("presenceUpdate").await.unwrap();
    assert_eq!(update["userId"], 1);
    assert_eq!(update["status"], "offline");
}

#[tokio::test]
async fn test_malformed_frames_close_with_decode_error() {
    let hub = TestHub::start().await.expect("Failed to start hub");

    let mut ws = hub.connect().await.unwrap();
    ws.send_text("not json").await.unwrap();
    assert_eq!(ws.expect_close().await.unwrap().code, 4002);

    let (mut ws, _) = hub.connect_as(1).await.unwrap();
    ws.send_json(&json!({ "type": "shout" })).await.unwrap();
    assert_eq!(ws.expect_close().await.unwrap().code, 4002);

    let mut ws = hub.connect().await.unwrap();
    ws.send_binary(vec![1, 2, 3]).await.unwrap();
    assert_eq!(ws.expect_close().await.unwrap().code, 4002);
}

#[tokio::test]
async fn test_jwt_bearer_credential_is_accepted() {
    let jwt = Arc::new(JwtService::new("integration-secret", 900));
    let token = jwt.issue_access_token(UserId::new(42)).unwrap();
    let hub = TestHub::start_with_verifier(jwt).await.expect("Failed to start hub");

    let mut ws = hub.connect().await.unwrap();
    let snapshot = ws.authenticate(42, &format!("Bearer {token}")).await.unwrap();

    assert_eq!(snapshot["onlineUserIds"], json!([]));
    assert!(hub.state.presence().is_online(UserId::new(42)));
}

// ============================================================================
// Triggers
// ============================================================================

#[tokio::test]
async fn test_block_and_unblock_reach_only_the_target() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let (mut blocker, _) = hub.connect_as(1).await.unwrap();
    let (mut target, _) = hub.connect_as(2).await.unwrap();
    blocker.expect_event("presenceUpdate").await.unwrap();

    hub.trigger("/blocks", &json!({ "blockerId": 1, "blockedId": 2 }))
        .await
        .unwrap();
    let event = target.expect_event("userBlocked").await.unwrap();
    assert_eq!(event["blockerId"], 1);

    hub.trigger("/unblocks", &json!({ "blockerId": 1, "unblockedId": 2 }))
        .await
        .unwrap();
    let event = target.expect_event("userUnblocked").await.unwrap();
    assert_eq!(event["blockerId"], 1);

    blocker.expect_silence().await.unwrap();
}

#[tokio::test]
async fn test_group_membership_changes() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let (mut owner, _) = hub.connect_as(1).await.unwrap();
    let (mut member, _) = hub.connect_as(2).await.unwrap();
    owner.expect_event("presenceUpdate").await.unwrap();

    hub.participants.set_members(30, [1, 2]);
    hub.trigger(
        "/groups/members/added",
        &json!({ "conversationId": 30, "userId": 2, "groupName": "Climbers" }),
    )
    .await
    .unwrap();

    let added = member.expect_event("addedToGroup").await.unwrap();
    assert_eq!(added["conversationId"], 30);
    assert_eq!(added["groupName"], "Climbers");
    owner.expect_silence().await.unwrap();

    hub.participants.remove_member(30, 2);
    hub.trigger(
        "/groups/members/removed",
        &json!({ "conversationId": 30, "userId": 2 }),
    )
    .await
    .unwrap();

    let removed = member.expect_event("removedFromGroup").await.unwrap();
    assert_eq!(removed["conversationId"], 30);
    assert!(removed.get("groupName").is_none());

    let left = owner.expect_event("participantLeftGroup").await.unwrap();
    assert_eq!(left["conversationId"], 30);
    assert_eq!(left["userId"], 2);
    member.expect_silence().await.unwrap();
}

#[tokio::test]
async fn test_messages_are_delivered_in_trigger_order() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    hub.participants.set_members(7, [1, 2]);
    let (mut bob, _) = hub.connect_as(2).await.unwrap();

    for id in 1..=5 {
        hub.trigger("/messages", &message_body(id, 7, 1, "burst"))
            .await
            .unwrap();
    }

    for id in 1..=5 {
        let event = bob.expect_event("newMessage").await.unwrap();
        assert_eq!(event["message"]["id"], id);
    }
}

#[tokio::test]
async fn test_internal_routes_require_token() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let body = json!({ "blockerId": 1, "blockedId": 2 });

    let response = hub.post("/internal/blocks", &body).await.unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();

    let response = hub
        .post_auth("/internal/blocks", "wrong-token", &body)
        .await
        .unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();

    let response = hub
        .post_auth("/internal/blocks", INTERNAL_TOKEN, &body)
        .await
        .unwrap();
    assert_status(response, StatusCode::ACCEPTED).await.unwrap();
}

#[tokio::test]
async fn test_internal_routes_disabled_without_token() {
    let hub = TestHub::start_with_config(HubConfig::default())
        .await
        .expect("Failed to start hub");

    let response = hub
        .post_auth(
            "/internal/blocks",
            INTERNAL_TOKEN,
            &json!({ "blockerId": 1, "blockedId": 2 }),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::NOT_FOUND).await.unwrap();
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let response = hub.get("/health").await.expect("Request failed");
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_stats_counts_connections() {
    let hub = TestHub::start().await.expect("Failed to start hub");
    let (_alice, _) = hub.connect_as(1).await.unwrap();
    let _pending = hub.connect().await.unwrap();

    wait_until(|| hub.state.open_connections() == 2).await.unwrap();

    let stats: Value = hub.get("/stats").await.unwrap().json().await.unwrap();
    assert_eq!(stats["connections"], 2);
    assert_eq!(stats["online"], 1);
    assert_eq!(stats["pendingFanouts"], 0);
}
