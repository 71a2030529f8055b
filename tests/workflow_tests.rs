//! End-to-end workflow tests against a live Postgres
//!
//! These drive the resolver, the message pipeline (with an in-memory log
//! sink) and the friend-request workflow through their real SQL. Each test
//! skips itself when `DATABASE_URL` is not set.

mod common;

use std::sync::Arc;

use chrono::Utc;

use common::mock_bus::MockPublisher;
use ripple::bus::Publisher;
use ripple::models::{ConversationKind, FriendRequestStatus, GroupRole, JoinPolicy};
use ripple::service::messages::MessagePipeline;
use ripple::service::{conversations, friends, groups};
use ripple::wire::{FriendRequestEvent, InboundRecord, OutboundEnvelope};

const OUTBOUND: &str = "test-outbound";
const FRIEND_TOPIC: &str = "test-friend-requests";

fn inbound_text(sender: i64, receiver: i64, content: &str) -> Vec<u8> {
    serde_json::to_vec(&InboundRecord {
        id: Some(uuid::Uuid::new_v4().to_string()),
        kind: ripple::models::MessageKind::Text,
        content: content.to_string(),
        sender_id: sender.to_string(),
        receiver_id: receiver.to_string(),
        conversation_id: None,
        timestamp: Utc::now(),
        file_name: None,
        file_size: None,
    })
    .unwrap()
}

#[tokio::test]
async fn undecodable_records_are_skipped_not_retried() {
    // No live database needed: a record that fails to decode is swallowed
    // before any query runs, so the consumer can commit and move on.
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://postgres@localhost/unused")
        .unwrap();
    let publisher = Arc::new(MockPublisher::new());
    let pipeline = MessagePipeline::new(pool.clone(), publisher.clone(), OUTBOUND.to_string());

    assert!(pipeline.process(b"not json at all").await.is_ok());
    assert!(friends::process_event(&pool, b"{\"broken\":").await.is_ok());
    assert!(publisher.records().is_empty());
}

#[tokio::test]
async fn private_send_creates_conversation_and_fans_out() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let sender = common::create_user(&pool, "sender").await;
    let receiver = common::create_user(&pool, "receiver").await;

    let publisher = Arc::new(MockPublisher::new());
    let pipeline = MessagePipeline::new(
        pool.clone(),
        publisher.clone(),
        OUTBOUND.to_string(),
    );

    pipeline
        .process(&inbound_text(sender, receiver, "hi"))
        .await
        .expect("pipeline should succeed");

    // Conversation exists with exactly the two participants.
    let conversation = ripple::repo::conversations::find_private_between(
        &pool,
        sender.min(receiver),
        sender.max(receiver),
    )
    .await
    .unwrap()
    .expect("conversation created");
    assert_eq!(conversation.kind, ConversationKind::Private);
    assert_eq!(conversation.target_id, None);

    let participants = ripple::repo::conversations::participants_of(&pool, conversation.id)
        .await
        .unwrap();
    assert_eq!(participants.len(), 2);

    // The tail pointer references the persisted message.
    let refreshed = ripple::repo::conversations::get_by_id(&pool, conversation.id)
        .await
        .unwrap()
        .unwrap();
    let last_message_id = refreshed.last_message_id.expect("tail advanced");
    let message = ripple::repo::messages::get_by_id(&pool, last_message_id)
        .await
        .unwrap()
        .expect("message persisted");
    assert_eq!(message.conversation_id, conversation.id);
    assert_eq!(message.content, "hi");

    // Exactly one outbound record, keyed and addressed to the receiver.
    let outbound = publisher.records_for(OUTBOUND);
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].key, receiver.to_string());
    let envelope: OutboundEnvelope = serde_json::from_slice(&outbound[0].payload).unwrap();
    assert_eq!(envelope.sender_id, sender.to_string());
    assert_eq!(envelope.receiver_id, receiver.to_string());
    assert_eq!(envelope.conversation_id, conversation.id.to_string());
    assert_eq!(envelope.content, "hi");
}

#[tokio::test]
async fn pipeline_retry_with_same_client_id_is_deduplicated() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let sender = common::create_user(&pool, "dedup-sender").await;
    let receiver = common::create_user(&pool, "dedup-receiver").await;

    let publisher = Arc::new(MockPublisher::new());
    let pipeline = MessagePipeline::new(
        pool.clone(),
        publisher.clone(),
        OUTBOUND.to_string(),
    );

    let payload = inbound_text(sender, receiver, "only once");
    pipeline.process(&payload).await.unwrap();
    pipeline.process(&payload).await.unwrap();

    let conversation = ripple::repo::conversations::find_private_between(
        &pool,
        sender.min(receiver),
        sender.max(receiver),
    )
    .await
    .unwrap()
    .unwrap();
    let messages =
        ripple::repo::messages::list_for_conversation(&pool, conversation.id, 10, 0)
            .await
            .unwrap();
    assert_eq!(messages.len(), 1, "retry must not duplicate the message");
}

#[tokio::test]
async fn group_fanout_reaches_everyone_but_the_sender() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let owner = common::create_user(&pool, "owner").await;
    let member_a = common::create_user(&pool, "member-a").await;
    let member_b = common::create_user(&pool, "member-b").await;

    let (_group, conversation) = groups::create_group(
        &pool,
        owner,
        "fanout-test",
        "",
        "",
        true,
        JoinPolicy::DirectJoin,
        &[member_a, member_b],
    )
    .await
    .unwrap();

    let publisher = Arc::new(MockPublisher::new());
    let pipeline = MessagePipeline::new(
        pool.clone(),
        publisher.clone(),
        OUTBOUND.to_string(),
    );

    let record = InboundRecord {
        id: None,
        kind: ripple::models::MessageKind::Text,
        content: "hello".to_string(),
        sender_id: owner.to_string(),
        receiver_id: String::new(),
        conversation_id: Some(conversation.id.to_string()),
        timestamp: Utc::now(),
        file_name: None,
        file_size: None,
    };
    pipeline
        .process(&serde_json::to_vec(&record).unwrap())
        .await
        .unwrap();

    let outbound = publisher.records_for(OUTBOUND);
    assert_eq!(outbound.len(), 2, "one record per recipient, none for the sender");
    let mut keys: Vec<String> = outbound.iter().map(|r| r.key.clone()).collect();
    keys.sort();
    let mut expected = vec![member_a.to_string(), member_b.to_string()];
    expected.sort();
    assert_eq!(keys, expected);
}

#[tokio::test]
async fn sender_outside_conversation_is_rejected_without_retry() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let owner = common::create_user(&pool, "gc-owner").await;
    let outsider = common::create_user(&pool, "outsider").await;

    let (_group, conversation) = groups::create_group(
        &pool,
        owner,
        "members-only",
        "",
        "",
        true,
        JoinPolicy::DirectJoin,
        &[],
    )
    .await
    .unwrap();

    let publisher = Arc::new(MockPublisher::new());
    let pipeline = MessagePipeline::new(
        pool.clone(),
        publisher.clone(),
        OUTBOUND.to_string(),
    );

    let record = InboundRecord {
        id: None,
        kind: ripple::models::MessageKind::Text,
        content: "let me in".to_string(),
        sender_id: outsider.to_string(),
        receiver_id: String::new(),
        conversation_id: Some(conversation.id.to_string()),
        timestamp: Utc::now(),
        file_name: None,
        file_size: None,
    };

    // Permanent rejection: Ok (commit the offset), but nothing persisted or
    // fanned out.
    pipeline
        .process(&serde_json::to_vec(&record).unwrap())
        .await
        .expect("permanent rejection must not request a retry");
    assert!(publisher.records_for(OUTBOUND).is_empty());
}

#[tokio::test]
async fn concurrent_private_resolves_converge_on_one_conversation() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let a = common::create_user(&pool, "race-a").await;
    let b = common::create_user(&pool, "race-b").await;

    let mut handles = Vec::new();
    for i in 0..100 {
        let pool = pool.clone();
        // Alternate argument order to exercise canonicalization under race.
        let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
        handles.push(tokio::spawn(async move {
            conversations::resolve_private(&pool, x, y).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let conversation = handle.await.unwrap().expect("resolve should succeed");
        ids.push(conversation.id);
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 1, "every resolver must return the same conversation");

    let participants = ripple::repo::conversations::participants_of(&pool, ids[0])
        .await
        .unwrap();
    assert_eq!(participants.len(), 2);
}

#[tokio::test]
async fn group_resolution_is_idempotent_and_repair_restores_members() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let owner = common::create_user(&pool, "repair-owner").await;
    let member = common::create_user(&pool, "repair-member").await;

    let (group, conversation) = groups::create_group(
        &pool,
        owner,
        "repairable",
        "",
        "",
        true,
        JoinPolicy::DirectJoin,
        &[member],
    )
    .await
    .unwrap();

    // Resolving again returns the same conversation.
    let again = conversations::resolve_group(&pool, group.id, owner, &[member])
        .await
        .unwrap();
    assert_eq!(again.id, conversation.id);

    // Wipe the participants, then repair from the member rows.
    for participant in ripple::repo::conversations::participants_of(&pool, conversation.id)
        .await
        .unwrap()
    {
        ripple::repo::conversations::remove_participant(
            &pool,
            conversation.id,
            participant.user_id,
        )
        .await
        .unwrap();
    }
    conversations::repair_group_participants(&pool, group.id)
        .await
        .unwrap();

    let participants = ripple::repo::conversations::participants_of(&pool, conversation.id)
        .await
        .unwrap();
    let mut participant_ids: Vec<i64> = participants.iter().map(|p| p.user_id).collect();
    participant_ids.sort_unstable();
    let mut member_ids: Vec<i64> =
        ripple::repo::groups::list_members(&pool, group.id, 100, 0)
            .await
            .unwrap()
            .iter()
            .map(|m| m.user_id)
            .collect();
    member_ids.sort_unstable();
    assert_eq!(participant_ids, member_ids);

    // The owner's participant row mirrors the admin role.
    let owner_participant = participants.iter().find(|p| p.user_id == owner).unwrap();
    assert!(owner_participant.is_admin);
}

#[tokio::test]
async fn friend_request_workflow_end_to_end() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let requester = common::create_user(&pool, "fr-requester").await;
    let recipient = common::create_user(&pool, "fr-recipient").await;

    let publisher = Arc::new(MockPublisher::new());
    let publisher_dyn: Arc<dyn Publisher> = publisher.clone();

    // Send path publishes one keyed event.
    friends::send_request(&pool, &publisher_dyn, FRIEND_TOPIC, requester, recipient)
        .await
        .unwrap();
    let events = publisher.records_for(FRIEND_TOPIC);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, format!("{requester}-{recipient}"));

    // Consume path materializes the pending record; a redelivery is a no-op.
    friends::process_event(&pool, &events[0].payload).await.unwrap();
    friends::process_event(&pool, &events[0].payload).await.unwrap();

    let pending = friends::list_pending(&pool, recipient).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request.requester_id, requester);
    let request_id = pending[0].request.id;

    // A second send while pending is a conflict.
    let err = friends::send_request(&pool, &publisher_dyn, FRIEND_TOPIC, requester, recipient)
        .await
        .unwrap_err();
    assert!(matches!(err, ripple::error::AppError::Conflict(_)));

    // Only the recipient may accept.
    let err = friends::accept(&pool, requester, request_id).await.unwrap_err();
    assert!(matches!(err, ripple::error::AppError::Forbidden(_)));

    let accepted = friends::accept(&pool, recipient, request_id).await.unwrap();
    assert_eq!(accepted.status, FriendRequestStatus::Accepted);

    // Exactly one canonicalized friendship row.
    let friendship = ripple::repo::friendships::get_between(&pool, recipient, requester)
        .await
        .unwrap()
        .expect("friendship created");
    assert_eq!(friendship.user_lo, requester.min(recipient));
    assert_eq!(friendship.user_hi, requester.max(recipient));

    // Both sides now list each other.
    let friends_of_requester = friends::list_friends(&pool, requester).await.unwrap();
    assert!(friends_of_requester.iter().any(|f| f.id == recipient));

    // Another request between friends is a conflict, and a stale event for
    // the same pair is swallowed by the consumer.
    let err = friends::send_request(&pool, &publisher_dyn, FRIEND_TOPIC, recipient, requester)
        .await
        .unwrap_err();
    assert!(matches!(err, ripple::error::AppError::Conflict(_)));

    let stale = serde_json::to_vec(&FriendRequestEvent {
        requester_user_id: requester,
        recipient_user_id: recipient,
        timestamp: Utc::now(),
    })
    .unwrap();
    friends::process_event(&pool, &stale).await.unwrap();
    assert!(friends::list_pending(&pool, recipient).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_request_leaves_no_friendship() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let requester = common::create_user(&pool, "rej-requester").await;
    let recipient = common::create_user(&pool, "rej-recipient").await;

    let event = serde_json::to_vec(&FriendRequestEvent {
        requester_user_id: requester,
        recipient_user_id: recipient,
        timestamp: Utc::now(),
    })
    .unwrap();
    friends::process_event(&pool, &event).await.unwrap();

    let pending = friends::list_pending(&pool, recipient).await.unwrap();
    let request_id = pending[0].request.id;

    let rejected = friends::reject(&pool, recipient, request_id).await.unwrap();
    assert_eq!(rejected.status, FriendRequestStatus::Rejected);

    assert!(
        !ripple::repo::friendships::are_friends(&pool, requester, recipient)
            .await
            .unwrap()
    );

    // Rejecting twice is a conflict (no longer pending).
    let err = friends::reject(&pool, recipient, request_id).await.unwrap_err();
    assert!(matches!(err, ripple::error::AppError::Conflict(_)));
}

#[tokio::test]
async fn non_direct_join_groups_refuse_members() {
    let Some(pool) = common::test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let owner = common::create_user(&pool, "guarded-owner").await;
    let joiner = common::create_user(&pool, "joiner").await;

    let (group, _conversation) = groups::create_group(
        &pool,
        owner,
        "invite-only-club",
        "",
        "",
        false,
        JoinPolicy::InviteOnly,
        &[],
    )
    .await
    .unwrap();

    let err = groups::join(&pool, joiner, group.id).await.unwrap_err();
    assert!(matches!(err, ripple::error::AppError::Forbidden(_)));

    // Membership and roles still work through the admin path.
    let (direct_group, _) = groups::create_group(
        &pool,
        owner,
        "open-club",
        "",
        "",
        true,
        JoinPolicy::DirectJoin,
        &[],
    )
    .await
    .unwrap();
    let member = groups::join(&pool, joiner, direct_group.id).await.unwrap();
    assert_eq!(member.role, GroupRole::Member);

    let promoted =
        groups::update_member_role(&pool, owner, direct_group.id, joiner, GroupRole::Admin)
            .await
            .unwrap();
    assert_eq!(promoted.role, GroupRole::Admin);
}
